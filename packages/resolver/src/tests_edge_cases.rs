use crate::config::ResolverOptions;
use crate::node::{Props, VirtualTreeNode, VirtualTreeStore};
use crate::registry::{Component, ComponentRegistry, FetchError, InMemoryRegistry};
use crate::resolver::{wait_all, NodeState, ResolveError, Resolver};
use crate::test_utils::*;
use crate::vdom::VNode;
use futures_util::future::{BoxFuture, FutureExt};
use serde_json::json;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Registry that never has anything and counts fetch requests
#[derive(Default)]
struct CountingRegistry {
    fetches: Arc<AtomicUsize>,
}

impl ComponentRegistry for CountingRegistry {
    fn lookup(&self, _name: &str) -> Option<Arc<dyn Component>> {
        None
    }

    fn fetch(&self, name: &str) -> BoxFuture<'static, Result<(), FetchError>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let name = name.to_string();
        async move {
            Err(FetchError::Failed {
                name,
                message: "offline".to_string(),
            })
        }
        .boxed()
    }
}

#[test]
fn test_one_fetch_per_missing_name_per_pass() {
    let tree = VirtualTreeNode::new("div")
        .with_child(VirtualTreeNode::new("slider"))
        .with_child(VirtualTreeNode::new("rich"))
        .with_child(VirtualTreeNode::new("slider"))
        .with_child(VirtualTreeNode::new("list"));
    let mut resolver = Resolver::new(registry_with_remote_blocks(), VirtualTreeStore::new());

    let resolution = resolver.resolve_node(&tree, &json!({})).unwrap();

    let fetched: Vec<&str> = resolution.fetches.iter().map(|f| f.component()).collect();
    assert_eq!(fetched, vec!["slider", "list"]);
    assert_eq!(resolution.deferred, vec!["slider", "list"]);
    assert_eq!(resolution.stats.fetch_pending, 3);
    assert_eq!(resolution.stats.resolved, 2);
}

#[test]
fn test_missing_root_renders_nothing() {
    let mut resolver = Resolver::new(InMemoryRegistry::new(), store(SHELF_TREES));

    let resolution = resolver.resolve("someTreeId", &json!({})).unwrap();

    assert!(resolution.root.is_none());
    assert_eq!(resolution.deferred, vec!["div"]);
    // Children of a missing node are not visited
    assert_eq!(resolution.fetches.len(), 1);
}

#[test]
fn test_unlimited_fetch_policy_requests_every_pass() {
    let registry = CountingRegistry::default();
    let fetches = Arc::clone(&registry.fetches);
    let mut resolver = Resolver::new(registry, VirtualTreeStore::new());
    let tree = VirtualTreeNode::new("ghost");

    for _ in 0..5 {
        resolver.resolve_node(&tree, &json!({})).unwrap();
    }

    assert_eq!(fetches.load(Ordering::SeqCst), 5);
    assert_eq!(resolver.fetch_attempts("ghost"), 5);
}

#[test]
fn test_fetch_attempts_are_capped() {
    let registry = CountingRegistry::default();
    let fetches = Arc::clone(&registry.fetches);
    let options = ResolverOptions::default().with_max_fetch_attempts(2);
    let mut resolver = Resolver::with_options(registry, VirtualTreeStore::new(), options);
    let tree = VirtualTreeNode::new("ghost");

    let states: Vec<usize> = (0..4)
        .map(|_| {
            let resolution = resolver.resolve_node(&tree, &json!({})).unwrap();
            assert!(resolution.root.is_none());
            resolution.fetches.len()
        })
        .collect();

    assert_eq!(states, vec![1, 1, 0, 0]);
    assert_eq!(fetches.load(Ordering::SeqCst), 2);

    let exhausted = resolver.resolve_node(&tree, &json!({})).unwrap();
    assert_eq!(exhausted.stats.empty, 1);
    assert_eq!(exhausted.deferred, vec!["ghost"]);

    resolver.reset_fetch_attempts();
    let retried = resolver.resolve_node(&tree, &json!({})).unwrap();
    assert_eq!(retried.fetches.len(), 1);
}

#[tokio::test]
async fn test_successful_lookup_clears_attempts() {
    let registry = InMemoryRegistry::new();
    registry.register_remote("rich", rich);
    let options = ResolverOptions::default().with_max_fetch_attempts(1);
    let mut resolver = Resolver::with_options(registry, VirtualTreeStore::new(), options);
    let tree = VirtualTreeNode::new("rich").with_prop("text", "hi");

    let mut first = resolver.resolve_node(&tree, &json!({})).unwrap();
    assert_eq!(resolver.fetch_attempts("rich"), 1);
    wait_all(first.take_fetches()).await;

    let second = resolver.resolve_node(&tree, &json!({})).unwrap();
    assert!(second.is_complete());
    assert_eq!(resolver.fetch_attempts("rich"), 0);
}

#[tokio::test]
async fn test_failed_fetch_is_treated_as_still_missing() {
    let mut resolver = Resolver::new(full_registry(), VirtualTreeStore::new());
    let tree = VirtualTreeNode::new("div")
        .with_child(VirtualTreeNode::new("rich").with_prop("text", "kept"))
        .with_child(VirtualTreeNode::new("carousel"));

    let mut first = resolver.resolve_node(&tree, &json!({})).unwrap();
    let outcomes = wait_all(first.take_fetches()).await;
    assert_eq!(
        outcomes,
        vec![(
            "carousel".to_string(),
            Err(FetchError::NotFound {
                name: "carousel".to_string()
            })
        )]
    );

    let second = resolver.resolve_node(&tree, &json!({})).unwrap();
    assert_eq!(first.root, second.root);
    assert_eq!(second.deferred, vec!["carousel"]);
}

#[tokio::test]
async fn test_late_fetch_for_removed_node_is_harmless() {
    let registry = registry_with_remote_blocks();
    let mut resolver = Resolver::new(registry.clone(), VirtualTreeStore::new());

    let with_slider = VirtualTreeNode::new("div").with_child(VirtualTreeNode::new("slider"));
    let mut first = resolver.resolve_node(&with_slider, &json!({})).unwrap();
    let pending = first.take_fetches();

    // The tree changes before the fetch lands
    let without_slider = VirtualTreeNode::new("div").with_child(VirtualTreeNode::new("rich"));
    let second = resolver.resolve_node(&without_slider, &json!({})).unwrap();
    assert!(second.is_complete());

    wait_all(pending).await;
    let third = resolver.resolve_node(&without_slider, &json!({})).unwrap();
    assert_eq!(second.root, third.root);
    assert!(registry.contains("slider"));
}

#[test]
fn test_unknown_tree_id() {
    let mut resolver = Resolver::new(full_registry(), store(SHELF_TREES));

    let err = resolver.resolve("nope", &json!({})).unwrap_err();

    assert_eq!(
        err,
        ResolveError::TreeNotFound {
            tree_id: "nope".to_string()
        }
    );
}

#[test]
fn test_unknown_embedded_tree_id() {
    let tree = VirtualTreeNode::new("VirtualComponent").with_prop("virtualTreeId", "missing");
    let mut resolver = Resolver::new(full_registry(), VirtualTreeStore::new());

    let err = resolver.resolve_node(&tree, &json!({})).unwrap_err();

    assert!(matches!(err, ResolveError::TreeNotFound { tree_id } if tree_id == "missing"));
}

#[test]
fn test_embedded_tree_id_from_placeholder() {
    let trees = VirtualTreeStore::new().with_tree(
        "promo",
        VirtualTreeNode::new("rich").with_prop("text", "$label"),
    );
    let tree = VirtualTreeNode::new("VirtualComponent")
        .with_prop("virtualTreeId", "$which")
        .with_prop("label", "$label");
    let mut resolver = Resolver::new(full_registry(), trees);

    let resolution = resolver
        .resolve_node(&tree, &json!({ "which": "promo", "label": "Sale" }))
        .unwrap();

    assert_eq!(resolution.root.unwrap().text_content(), "Sale");
}

#[test]
fn test_virtual_component_without_tree_id() {
    let tree = VirtualTreeNode::new("VirtualComponent").with_prop("virtualTreeId", 42);
    let mut resolver = Resolver::new(full_registry(), VirtualTreeStore::new());

    let err = resolver.resolve_node(&tree, &json!({})).unwrap_err();

    assert_eq!(
        err,
        ResolveError::MissingTreeId {
            component: "VirtualComponent".to_string()
        }
    );
}

#[test]
fn test_direct_tree_recursion() {
    let trees = VirtualTreeStore::new().with_tree(
        "loop",
        VirtualTreeNode::new("div").with_child(
            VirtualTreeNode::new("VirtualComponent").with_prop("virtualTreeId", "loop"),
        ),
    );
    let mut resolver = Resolver::new(full_registry(), trees);

    match resolver.resolve("loop", &json!({})) {
        Err(ResolveError::RecursiveTree {
            tree_id,
            call_stack,
        }) => {
            assert_eq!(tree_id, "loop");
            assert_eq!(call_stack, vec!["loop", "loop"]);
        }
        other => panic!("Expected RecursiveTree error but got: {:?}", other),
    }
}

#[test]
fn test_indirect_tree_recursion() {
    let embed = |id: &str| VirtualTreeNode::new("VirtualComponent").with_prop("virtualTreeId", id);
    let trees = VirtualTreeStore::new()
        .with_tree("a", VirtualTreeNode::new("div").with_child(embed("b")))
        .with_tree("b", VirtualTreeNode::new("div").with_child(embed("c")))
        .with_tree("c", embed("a"));
    let mut resolver = Resolver::new(full_registry(), trees);

    let err = resolver.resolve("a", &json!({})).unwrap_err();

    assert_eq!(
        err,
        ResolveError::RecursiveTree {
            tree_id: "a".to_string(),
            call_stack: vec!["a", "b", "c", "a"].into_iter().map(String::from).collect(),
        }
    );
}

#[test]
fn test_same_tree_embedded_twice_is_not_recursion() {
    let embed = || VirtualTreeNode::new("VirtualComponent").with_prop("virtualTreeId", "leaf");
    let trees = VirtualTreeStore::new()
        .with_tree("leaf", VirtualTreeNode::new("rich").with_prop("text", "x"))
        .with_tree(
            "page",
            VirtualTreeNode::new("div").with_child(embed()).with_child(embed()),
        );
    let mut resolver = Resolver::new(full_registry(), trees);

    let resolution = resolver.resolve("page", &json!({})).unwrap();

    assert_eq!(resolution.root.unwrap().text_content(), "xx");
}

#[test]
fn test_depth_limit() {
    let mut tree = VirtualTreeNode::new("div");
    for _ in 0..10 {
        tree = VirtualTreeNode::new("div").with_child(tree);
    }
    let options = ResolverOptions::default().with_max_depth(5);
    let mut resolver = Resolver::with_options(full_registry(), VirtualTreeStore::new(), options);

    let err = resolver.resolve_node(&tree, &json!({})).unwrap_err();

    assert_eq!(
        err,
        ResolveError::DepthExceeded {
            component: "div".to_string(),
            max_depth: 5
        }
    );

    let shallow = Resolver::with_options(
        full_registry(),
        VirtualTreeStore::new(),
        ResolverOptions::default().with_max_depth(11),
    )
    .resolve_node(&tree, &json!({}))
    .unwrap();
    assert_eq!(shallow.stats.resolved, 11);
}

#[test]
fn test_custom_virtual_component_name() {
    let options = ResolverOptions {
        virtual_component_name: "Embed".to_string(),
        ..ResolverOptions::default()
    };
    let trees = VirtualTreeStore::new()
        .with_tree("inner", VirtualTreeNode::new("rich").with_prop("text", "$t"));
    let registry = full_registry();
    // Under a custom name, "VirtualComponent" is an ordinary component
    registry.register("VirtualComponent", |_: &Props, _: Vec<VNode>| VNode::text("plain"));
    let mut resolver = Resolver::with_options(registry, trees, options);

    let tree = VirtualTreeNode::new("div")
        .with_child(
            VirtualTreeNode::new("Embed")
                .with_prop("virtualTreeId", "inner")
                .with_prop("t", "embedded"),
        )
        .with_child(VirtualTreeNode::new("VirtualComponent").with_prop("virtualTreeId", "inner"));

    let resolution = resolver.resolve_node(&tree, &json!({})).unwrap();

    assert_eq!(resolution.root.unwrap().text_content(), "embeddedplain");
}

#[test]
fn test_node_state_counts() {
    let options = ResolverOptions::default().with_max_fetch_attempts(0);
    let mut resolver =
        Resolver::with_options(registry_with_remote_blocks(), VirtualTreeStore::new(), options);
    let tree = VirtualTreeNode::new("div").with_child(VirtualTreeNode::new("slider"));

    let resolution = resolver.resolve_node(&tree, &json!({})).unwrap();

    assert!(resolution.fetches.is_empty());
    assert_eq!(resolution.stats.resolved, 1);
    assert_eq!(resolution.stats.empty, 1);
    assert_eq!(resolution.stats.fetch_pending, 0);
    assert_ne!(NodeState::Empty, NodeState::FetchPending);
}

#[test]
fn test_in_flight_components_are_not_fetched_or_counted() {
    let registry = CountingRegistry::default();
    let fetches = Arc::clone(&registry.fetches);
    let options = ResolverOptions::default().with_max_fetch_attempts(1);
    let trees = VirtualTreeStore::new().with_tree(
        "page",
        VirtualTreeNode::new("ghost").with_child(VirtualTreeNode::new("phantom")),
    );
    let mut resolver = Resolver::with_options(registry, trees, options);
    let in_flight: HashSet<String> = ["ghost".to_string()].into_iter().collect();

    for _ in 0..3 {
        let resolution = resolver
            .resolve_with_in_flight("page", &json!({}), &in_flight)
            .unwrap();

        assert!(resolution.root.is_none());
        assert!(resolution.fetches.is_empty());
        assert_eq!(resolution.deferred, vec!["ghost"]);
        assert_eq!(resolution.stats.fetch_pending, 1);
    }

    assert_eq!(fetches.load(Ordering::SeqCst), 0);
    assert_eq!(resolver.fetch_attempts("ghost"), 0);

    // Once nothing is in flight the budget is still intact
    let resolution = resolver.resolve("page", &json!({})).unwrap();
    assert_eq!(resolution.fetches.len(), 1);
    assert_eq!(resolver.fetch_attempts("ghost"), 1);
}
