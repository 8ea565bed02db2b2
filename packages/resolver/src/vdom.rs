use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Rendered output node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum VNode {
    /// HTML-like element
    Element {
        tag: String,
        attributes: BTreeMap<String, String>,
        children: Vec<VNode>,
    },

    /// Text node
    Text { content: String },

    /// Children without a wrapping element
    Fragment { children: Vec<VNode> },
}

impl VNode {
    pub fn element(tag: impl Into<String>) -> Self {
        VNode::Element {
            tag: tag.into(),
            attributes: BTreeMap::new(),
            children: Vec::new(),
        }
    }

    pub fn text(content: impl Into<String>) -> Self {
        VNode::Text {
            content: content.into(),
        }
    }

    pub fn fragment(children: Vec<VNode>) -> Self {
        VNode::Fragment { children }
    }

    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        if let VNode::Element {
            ref mut attributes, ..
        } = self
        {
            attributes.insert(key.into(), value.into());
        }
        self
    }

    /// Set an attribute from a prop value; absent and null props are skipped
    pub fn with_prop_attr(self, key: impl Into<String>, value: Option<&Value>) -> Self {
        match value.and_then(attribute_value) {
            Some(value) => self.with_attr(key, value),
            None => self,
        }
    }

    pub fn with_child(mut self, child: VNode) -> Self {
        match self {
            VNode::Element {
                ref mut children, ..
            }
            | VNode::Fragment {
                ref mut children, ..
            } => children.push(child),
            VNode::Text { .. } => {}
        }
        self
    }

    pub fn with_children(mut self, new_children: Vec<VNode>) -> Self {
        match self {
            VNode::Element {
                ref mut children, ..
            }
            | VNode::Fragment {
                ref mut children, ..
            } => children.extend(new_children),
            VNode::Text { .. } => {}
        }
        self
    }

    pub fn tag(&self) -> Option<&str> {
        match self {
            VNode::Element { tag, .. } => Some(tag),
            _ => None,
        }
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        match self {
            VNode::Element { attributes, .. } => attributes.get(key).map(String::as_str),
            _ => None,
        }
    }

    pub fn children(&self) -> &[VNode] {
        match self {
            VNode::Element { children, .. } | VNode::Fragment { children } => children,
            VNode::Text { .. } => &[],
        }
    }

    /// Concatenated text content of this node and its descendants
    pub fn text_content(&self) -> String {
        match self {
            VNode::Text { content } => content.clone(),
            _ => self.children().iter().map(VNode::text_content).collect(),
        }
    }
}

/// Convert a prop value to its attribute string form
///
/// Strings are used as-is, numbers and booleans are stringified, `null` has
/// no attribute form. Arrays and objects fall back to compact JSON.
pub fn attribute_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Array(_) | Value::Object(_) => Some(value.to_string()),
    }
}
