//! # Virtual Tree Resolver
//!
//! Resolves a [`VirtualTreeNode`] into a [`VNode`] tree, one *pass* at a time.
//!
//! ## Per-node algorithm
//!
//! 1. Flatten the ambient props of the current scope (`potato.title` keys).
//! 2. Substitute `$path` placeholders in the node's own props.
//! 3. Look the component up in the [`ComponentRegistry`]:
//!    - found: resolve children against the **same** ambient scope, then render;
//!    - missing: request a fetch and render nothing for this subtree.
//!
//! A node named after the virtual component (`VirtualComponent` by default)
//! embeds another tree from the [`TreeStore`], using its own resolved props
//! (minus `virtualTreeId`) as the ambient scope of the embedded tree.
//!
//! ## Passes
//!
//! A pass is synchronous and deterministic for a given registry state. Missing
//! components never fail a pass: their subtree is empty and a [`PendingFetch`]
//! is handed back to the caller, at most once per name per pass. Once the
//! caller has driven the fetch, it runs another pass and the subtree fills in.
//! The resolver never awaits anything itself.
//!
//! ## Failure boundaries
//!
//! - Missing placeholder path: the prop is absent. Not an error.
//! - Missing component: empty subtree plus one fetch. Not an error.
//! - Unknown or cyclic embedded tree, missing `virtualTreeId`, runaway depth:
//!   [`ResolveError`]. These are authoring defects that another pass won't fix.

use crate::config::ResolverOptions;
use crate::node::{Props, TreeStore, VirtualTreeNode};
use crate::placeholder::substitute_props;
use crate::registry::{ComponentRegistry, FetchError};
use crate::vdom::VNode;
use futures_util::future::{join_all, BoxFuture};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};
use vtree_common::{flatten, FlatProps};

pub type ResolveResult<T> = Result<T, ResolveError>;

/// Prop on a virtual component node naming the tree to embed
pub const VIRTUAL_TREE_ID_PROP: &str = "virtualTreeId";

const BLOCK_CLASS_PROP: &str = "blockClass";
const CLASS_NAME_PROP: &str = "className";

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ResolveError {
    #[error("Virtual tree '{tree_id}' not found")]
    TreeNotFound { tree_id: String },

    #[error("'{component}' node has no string '{}' prop", VIRTUAL_TREE_ID_PROP)]
    MissingTreeId { component: String },

    #[error("Recursive virtual tree detected: {tree_id}\nCall stack: {}", call_stack.join(" → "))]
    RecursiveTree {
        tree_id: String,
        call_stack: Vec<String>,
    },

    #[error("Virtual tree nesting exceeds {max_depth} levels at component '{component}'")]
    DepthExceeded { component: String, max_depth: usize },
}

/// Outcome of one node in one pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    /// Implementation found and rendered
    Resolved,
    /// Implementation missing, fetch requested (this pass or earlier in it)
    FetchPending,
    /// Implementation missing and the fetch policy forbids asking again
    Empty,
}

/// A fetch the caller should drive before the next pass
pub struct PendingFetch {
    component: String,
    future: BoxFuture<'static, Result<(), FetchError>>,
}

impl PendingFetch {
    pub fn component(&self) -> &str {
        &self.component
    }

    pub async fn wait(self) -> Result<(), FetchError> {
        self.future.await
    }

    pub(crate) fn into_parts(self) -> (String, BoxFuture<'static, Result<(), FetchError>>) {
        (self.component, self.future)
    }
}

impl fmt::Debug for PendingFetch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingFetch")
            .field("component", &self.component)
            .finish_non_exhaustive()
    }
}

/// Drive several fetches to completion, keeping their order
pub async fn wait_all(fetches: Vec<PendingFetch>) -> Vec<(String, Result<(), FetchError>)> {
    join_all(fetches.into_iter().map(|fetch| async move {
        let (component, future) = fetch.into_parts();
        (component, future.await)
    }))
    .await
}

/// Node counts for one pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolutionStats {
    pub resolved: usize,
    pub fetch_pending: usize,
    pub empty: usize,
}

impl ResolutionStats {
    fn record(&mut self, state: NodeState) {
        match state {
            NodeState::Resolved => self.resolved += 1,
            NodeState::FetchPending => self.fetch_pending += 1,
            NodeState::Empty => self.empty += 1,
        }
    }
}

/// Output of one resolution pass
#[derive(Debug)]
pub struct Resolution {
    /// Rendered tree, `None` when the root itself is still missing
    pub root: Option<VNode>,
    /// Fetches requested during this pass, one per missing component name
    pub fetches: Vec<PendingFetch>,
    /// Missing component names whose subtrees rendered empty, in first-seen order
    pub deferred: Vec<String>,
    pub stats: ResolutionStats,
}

impl Resolution {
    /// True when every component in the tree was available
    pub fn is_complete(&self) -> bool {
        self.deferred.is_empty()
    }

    pub fn take_fetches(&mut self) -> Vec<PendingFetch> {
        std::mem::take(&mut self.fetches)
    }
}

/// Bookkeeping for a single pass
#[derive(Default)]
struct Pass {
    fetches: Vec<PendingFetch>,
    requested: HashSet<String>,
    exhausted: HashSet<String>,
    deferred: Vec<String>,
    tree_stack: Vec<String>,
    stats: ResolutionStats,
}

impl Pass {
    fn defer(&mut self, component: &str) {
        if !self.deferred.iter().any(|name| name == component) {
            self.deferred.push(component.to_string());
        }
    }

    fn finish(self, root: Option<VNode>) -> Resolution {
        Resolution {
            root,
            fetches: self.fetches,
            deferred: self.deferred,
            stats: self.stats,
        }
    }
}

/// Resolves virtual trees against a component registry
pub struct Resolver {
    registry: Arc<dyn ComponentRegistry>,
    trees: Arc<dyn TreeStore>,
    options: ResolverOptions,
    /// Fetches issued per missing component, across passes
    fetch_attempts: HashMap<String, u32>,
}

impl Resolver {
    pub fn new(
        registry: impl ComponentRegistry + 'static,
        trees: impl TreeStore + 'static,
    ) -> Self {
        Self::with_options(registry, trees, ResolverOptions::default())
    }

    pub fn with_options(
        registry: impl ComponentRegistry + 'static,
        trees: impl TreeStore + 'static,
        options: ResolverOptions,
    ) -> Self {
        Self::from_shared(Arc::new(registry), Arc::new(trees), options)
    }

    pub fn from_shared(
        registry: Arc<dyn ComponentRegistry>,
        trees: Arc<dyn TreeStore>,
        options: ResolverOptions,
    ) -> Self {
        Self {
            registry,
            trees,
            options,
            fetch_attempts: HashMap::new(),
        }
    }

    pub fn options(&self) -> &ResolverOptions {
        &self.options
    }

    pub fn registry(&self) -> &Arc<dyn ComponentRegistry> {
        &self.registry
    }

    /// Fetches issued so far for a component that has not resolved since
    pub fn fetch_attempts(&self, component: &str) -> u32 {
        self.fetch_attempts.get(component).copied().unwrap_or(0)
    }

    /// Forget fetch attempts, letting capped components be requested again
    pub fn reset_fetch_attempts(&mut self) {
        self.fetch_attempts.clear();
    }

    /// Run one pass over the tree stored under `tree_id`
    #[instrument(skip(self, props))]
    pub fn resolve(&mut self, tree_id: &str, props: &Value) -> ResolveResult<Resolution> {
        self.resolve_tree(tree_id, props, Pass::default())
    }

    /// Run one pass, treating components in `in_flight` as already requested
    ///
    /// A missing component named in `in_flight` renders empty like any other,
    /// but no new fetch is issued for it and no attempt is counted against
    /// `fetch.maxAttempts`.
    #[instrument(skip(self, props, in_flight), fields(in_flight = in_flight.len()))]
    pub fn resolve_with_in_flight(
        &mut self,
        tree_id: &str,
        props: &Value,
        in_flight: &HashSet<String>,
    ) -> ResolveResult<Resolution> {
        let pass = Pass {
            requested: in_flight.clone(),
            ..Pass::default()
        };
        self.resolve_tree(tree_id, props, pass)
    }

    fn resolve_tree(
        &mut self,
        tree_id: &str,
        props: &Value,
        mut pass: Pass,
    ) -> ResolveResult<Resolution> {
        let trees = Arc::clone(&self.trees);
        let tree = trees.tree(tree_id).ok_or_else(|| {
            error!(tree_id, "Virtual tree not found");
            ResolveError::TreeNotFound {
                tree_id: tree_id.to_string(),
            }
        })?;

        pass.tree_stack.push(tree_id.to_string());
        self.run_pass(tree, props, pass)
    }

    /// Run one pass over an ad-hoc node
    #[instrument(skip_all, fields(component = %node.component))]
    pub fn resolve_node(
        &mut self,
        node: &VirtualTreeNode,
        props: &Value,
    ) -> ResolveResult<Resolution> {
        self.run_pass(node, props, Pass::default())
    }

    fn run_pass(
        &mut self,
        node: &VirtualTreeNode,
        props: &Value,
        mut pass: Pass,
    ) -> ResolveResult<Resolution> {
        let flat = flatten(props);
        let root = self.resolve_in_scope(node, &flat, &mut pass, 1)?;
        let resolution = pass.finish(root);

        info!(
            resolved = resolution.stats.resolved,
            fetch_pending = resolution.stats.fetch_pending,
            empty = resolution.stats.empty,
            fetches = resolution.fetches.len(),
            "Resolution pass complete"
        );
        Ok(resolution)
    }

    fn resolve_in_scope(
        &mut self,
        node: &VirtualTreeNode,
        flat: &FlatProps,
        pass: &mut Pass,
        depth: usize,
    ) -> ResolveResult<Option<VNode>> {
        if depth > self.options.max_depth {
            error!(component = %node.component, depth, "Virtual tree nesting too deep");
            return Err(ResolveError::DepthExceeded {
                component: node.component.clone(),
                max_depth: self.options.max_depth,
            });
        }

        let props = substitute_props(&node.props, flat);

        if node.component == self.options.virtual_component_name {
            return self.resolve_embedded(&node.component, props, pass, depth);
        }

        let Some(component) = self.registry.lookup(&node.component) else {
            let state = self.request_fetch(&node.component, pass);
            debug!(
                component = %node.component,
                ?state,
                "Component not available, rendering empty subtree"
            );
            pass.stats.record(state);
            return Ok(None);
        };

        if !self.fetch_attempts.is_empty() {
            self.fetch_attempts.remove(&node.component);
        }

        let mut children = Vec::with_capacity(node.children.len());
        for child in &node.children {
            if let Some(vnode) = self.resolve_in_scope(child, flat, pass, depth + 1)? {
                children.push(vnode);
            }
        }

        debug!(component = %node.component, children = children.len(), "Rendering component");
        pass.stats.record(NodeState::Resolved);
        Ok(Some(component.render(&with_structural_props(props), children)))
    }

    /// Resolve the tree named by a virtual component node's `virtualTreeId`
    fn resolve_embedded(
        &mut self,
        component: &str,
        mut props: Props,
        pass: &mut Pass,
        depth: usize,
    ) -> ResolveResult<Option<VNode>> {
        let tree_id = match props.remove(VIRTUAL_TREE_ID_PROP) {
            Some(Value::String(tree_id)) => tree_id,
            _ => {
                error!(component, "Virtual component without a tree id");
                return Err(ResolveError::MissingTreeId {
                    component: component.to_string(),
                });
            }
        };

        if pass.tree_stack.contains(&tree_id) {
            let mut call_stack = pass.tree_stack.clone();
            call_stack.push(tree_id.clone());
            error!(tree_id = %tree_id, stack = ?call_stack, "Recursive virtual tree detected");
            return Err(ResolveError::RecursiveTree {
                tree_id,
                call_stack,
            });
        }

        let trees = Arc::clone(&self.trees);
        let Some(tree) = trees.tree(&tree_id) else {
            error!(tree_id = %tree_id, "Embedded virtual tree not found");
            return Err(ResolveError::TreeNotFound { tree_id });
        };

        debug!(tree_id = %tree_id, scope_props = props.len(), "Embedding virtual tree");
        let flat = flatten(&Value::Object(props));

        pass.tree_stack.push(tree_id);
        let result = self.resolve_in_scope(tree, &flat, pass, depth + 1);
        pass.tree_stack.pop();

        result
    }

    fn request_fetch(&mut self, component: &str, pass: &mut Pass) -> NodeState {
        pass.defer(component);

        if pass.requested.contains(component) {
            return NodeState::FetchPending;
        }

        let attempts = self
            .fetch_attempts
            .entry(component.to_string())
            .or_insert(0);

        if let Some(max_attempts) = self.options.fetch.max_attempts {
            if *attempts >= max_attempts {
                if pass.exhausted.insert(component.to_string()) {
                    warn!(
                        component,
                        attempts = *attempts,
                        "Fetch attempts exhausted, not requesting again"
                    );
                }
                return NodeState::Empty;
            }
        }

        *attempts += 1;
        debug!(component, attempt = *attempts, "Requesting component fetch");

        pass.requested.insert(component.to_string());
        pass.fetches.push(PendingFetch {
            component: component.to_string(),
            future: self.registry.fetch(component),
        });
        NodeState::FetchPending
    }
}

impl fmt::Debug for Resolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolver")
            .field("options", &self.options)
            .field("fetch_attempts", &self.fetch_attempts)
            .finish_non_exhaustive()
    }
}

/// Add host-facing fields derived from resolved props (`blockClass` → `className`)
fn with_structural_props(mut props: Props) -> Props {
    if !props.contains_key(CLASS_NAME_PROP) {
        if let Some(class_name) = props.get(BLOCK_CLASS_PROP).and_then(class_name_from) {
            props.insert(CLASS_NAME_PROP.to_string(), Value::String(class_name));
        }
    }
    props
}

fn class_name_from(value: &Value) -> Option<String> {
    match value {
        Value::String(class) => Some(class.clone()),
        Value::Array(items) => {
            let classes: Vec<&str> = items.iter().filter_map(Value::as_str).collect();
            (!classes.is_empty()).then(|| classes.join(" "))
        }
        _ => None,
    }
}
