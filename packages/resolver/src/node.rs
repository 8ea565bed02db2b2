//! Virtual tree model and the store that names trees by id
//!
//! Trees are authored as JSON:
//!
//! ```json
//! {
//!   "someTreeId": {
//!     "$component": "div",
//!     "props": { "blockClass": "shelf" },
//!     "children": [{ "$component": "rich", "props": { "text": "$title" } }]
//!   }
//! }
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::Path;
use vtree_common::CommonResult;

/// Declared props of a node, and the resolved props handed to components
pub type Props = Map<String, Value>;

/// One node of a virtual tree: a component name, its props and its children
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VirtualTreeNode {
    #[serde(rename = "$component", alias = "component")]
    pub component: String,

    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub props: Props,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<VirtualTreeNode>,
}

impl VirtualTreeNode {
    pub fn new(component: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            props: Props::new(),
            children: Vec::new(),
        }
    }

    pub fn with_prop(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.props.insert(key.into(), value.into());
        self
    }

    pub fn with_child(mut self, child: VirtualTreeNode) -> Self {
        self.children.push(child);
        self
    }

    /// Parse a single node from JSON
    pub fn from_json(source: &str) -> CommonResult<Self> {
        Ok(serde_json::from_str(source)?)
    }

    /// Number of nodes in this subtree, including this one
    pub fn size(&self) -> usize {
        1 + self.children.iter().map(VirtualTreeNode::size).sum::<usize>()
    }
}

/// Lookup of virtual trees by id
pub trait TreeStore: Send + Sync {
    fn tree(&self, id: &str) -> Option<&VirtualTreeNode>;
}

impl TreeStore for HashMap<String, VirtualTreeNode> {
    fn tree(&self, id: &str) -> Option<&VirtualTreeNode> {
        self.get(id)
    }
}

/// In-memory collection of named virtual trees
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VirtualTreeStore {
    trees: HashMap<String, VirtualTreeNode>,
}

impl VirtualTreeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a store from a JSON object of `treeId -> node`
    pub fn from_json(source: &str) -> CommonResult<Self> {
        Ok(serde_json::from_str(source)?)
    }

    /// Load a store from a JSON file
    pub fn load(path: impl AsRef<Path>) -> CommonResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn insert(&mut self, id: impl Into<String>, tree: VirtualTreeNode) {
        self.trees.insert(id.into(), tree);
    }

    pub fn with_tree(mut self, id: impl Into<String>, tree: VirtualTreeNode) -> Self {
        self.insert(id, tree);
        self
    }

    pub fn get(&self, id: &str) -> Option<&VirtualTreeNode> {
        self.trees.get(id)
    }

    pub fn len(&self) -> usize {
        self.trees.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trees.is_empty()
    }
}

impl TreeStore for VirtualTreeStore {
    fn tree(&self, id: &str) -> Option<&VirtualTreeNode> {
        self.get(id)
    }
}
