//! Components and trees shared by the in-crate test modules

use crate::node::{Props, VirtualTreeStore};
use crate::registry::InMemoryRegistry;
use crate::vdom::VNode;
use serde_json::Value;

pub fn div(props: &Props, children: Vec<VNode>) -> VNode {
    VNode::element("div")
        .with_prop_attr("class", props.get("blockClass"))
        .with_children(children)
}

pub fn rich(props: &Props, _children: Vec<VNode>) -> VNode {
    let text = props.get("text").and_then(Value::as_str).unwrap_or_default();
    VNode::element("span").with_child(VNode::text(text))
}

pub fn slider(_props: &Props, children: Vec<VNode>) -> VNode {
    VNode::element("ul")
        .with_attr("data-slider", "true")
        .with_children(children)
}

pub fn list(props: &Props, children: Vec<VNode>) -> VNode {
    VNode::element("ul")
        .with_prop_attr("data-category", props.get("categoryId"))
        .with_children(children)
}

/// Registry with `div` and `rich` registered and `slider`/`list` fetchable
pub fn registry_with_remote_blocks() -> InMemoryRegistry {
    let registry = InMemoryRegistry::new();
    registry.register("div", div);
    registry.register("rich", rich);
    registry.register_remote("slider", slider);
    registry.register_remote("list", list);
    registry
}

/// Registry with every test block registered
pub fn full_registry() -> InMemoryRegistry {
    let registry = InMemoryRegistry::new();
    registry.register("div", div);
    registry.register("rich", rich);
    registry.register("slider", slider);
    registry.register("list", list);
    registry
}

pub fn store(json: &str) -> VirtualTreeStore {
    VirtualTreeStore::from_json(json).expect("test trees are valid JSON")
}

/// `div.shelf > (rich "some title", slider > list)`
pub const SHELF_TREES: &str = r#"{
    "someTreeId": {
        "$component": "div",
        "props": { "blockClass": "shelf" },
        "children": [
            { "$component": "rich", "props": { "text": "some title" } },
            {
                "$component": "slider",
                "children": [
                    { "$component": "list", "props": { "categoryId": "some-category" } }
                ]
            }
        ]
    }
}"#;

pub const SHELF_HTML: &str = concat!(
    r#"<div class="shelf"><span>some title</span>"#,
    r#"<ul data-slider="true"><ul data-category="some-category"></ul></ul>"#,
    "</div>"
);
