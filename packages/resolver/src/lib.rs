pub mod config;
#[cfg(feature = "async")]
pub mod host;
pub mod html;
pub mod node;
pub mod placeholder;
pub mod registry;
pub mod resolver;
pub mod vdom;

#[cfg(test)]
mod test_utils;


#[cfg(test)]
mod tests_edge_cases;


pub use config::{FetchPolicy, ResolverOptions};
#[cfg(feature = "async")]
pub use host::{FetchEvent, Host, Settled};
pub use html::{render_html, render_root, HtmlOptions};
pub use node::{Props, TreeStore, VirtualTreeNode, VirtualTreeStore};
pub use placeholder::{placeholder_path, resolve_placeholder, substitute_props};
pub use registry::{Component, ComponentRegistry, FetchError, InMemoryRegistry};
pub use resolver::{
    wait_all, NodeState, PendingFetch, Resolution, ResolutionStats, ResolveError, ResolveResult,
    Resolver, VIRTUAL_TREE_ID_PROP,
};
pub use vdom::VNode;

// Object utilities the resolver is built on
pub use vtree_common::{flatten, transform_leaves, FlatProps};
