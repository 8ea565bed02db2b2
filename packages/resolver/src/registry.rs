//! Component implementation registry
//!
//! The resolver never owns component implementations. It asks a
//! [`ComponentRegistry`] to `lookup` a name and, when that fails, to `fetch` it.
//! A successful fetch means later lookups for that name succeed.

use crate::node::Props;
use crate::vdom::VNode;
use futures_util::future::{BoxFuture, FutureExt};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};
use thiserror::Error;
use tracing::debug;

/// A renderable component implementation
pub trait Component: Send + Sync {
    /// Render with resolved props and already-resolved children
    fn render(&self, props: &Props, children: Vec<VNode>) -> VNode;
}

impl<F> Component for F
where
    F: Fn(&Props, Vec<VNode>) -> VNode + Send + Sync,
{
    fn render(&self, props: &Props, children: Vec<VNode>) -> VNode {
        self(props, children)
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FetchError {
    #[error("Component '{name}' is not available for fetching")]
    NotFound { name: String },

    #[error("Fetching component '{name}' failed: {message}")]
    Failed { name: String, message: String },
}

/// Name-to-implementation lookup with asynchronous population
pub trait ComponentRegistry: Send + Sync {
    fn lookup(&self, name: &str) -> Option<Arc<dyn Component>>;

    /// Request that `name` become available. Resolves once `lookup(name)`
    /// would succeed, or with an error if it never will.
    fn fetch(&self, name: &str) -> BoxFuture<'static, Result<(), FetchError>>;
}

type ComponentMap = HashMap<String, Arc<dyn Component>>;

/// Registry backed by shared in-memory maps
///
/// `remote` holds implementations that are not registered yet; `fetch` moves
/// them into the registered set. Clones share the same maps.
#[derive(Clone, Default)]
pub struct InMemoryRegistry {
    components: Arc<RwLock<ComponentMap>>,
    remote: Arc<RwLock<ComponentMap>>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an implementation that lookups see immediately
    pub fn register(&self, name: impl Into<String>, component: impl Component + 'static) {
        self.components
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.into(), Arc::new(component));
    }

    /// Make an implementation available to `fetch` without registering it
    pub fn register_remote(&self, name: impl Into<String>, component: impl Component + 'static) {
        self.remote
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.into(), Arc::new(component));
    }

    pub fn unregister(&self, name: &str) -> bool {
        self.components
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(name)
            .is_some()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.components
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
    }
}

impl fmt::Debug for InMemoryRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut components: Vec<String> = self
            .components
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        let mut remote: Vec<String> = self
            .remote
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        components.sort();
        remote.sort();

        f.debug_struct("InMemoryRegistry")
            .field("components", &components)
            .field("remote", &remote)
            .finish()
    }
}

impl ComponentRegistry for InMemoryRegistry {
    fn lookup(&self, name: &str) -> Option<Arc<dyn Component>> {
        self.components
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    fn fetch(&self, name: &str) -> BoxFuture<'static, Result<(), FetchError>> {
        let name = name.to_string();
        let components = Arc::clone(&self.components);
        let remote = Arc::clone(&self.remote);

        async move {
            let fetched = remote
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&name);

            match fetched {
                Some(component) => {
                    debug!(component = %name, "Fetched remote component");
                    components
                        .write()
                        .unwrap_or_else(PoisonError::into_inner)
                        .insert(name, component);
                    Ok(())
                }
                // Already registered by an earlier fetch or another caller
                None if components
                    .read()
                    .unwrap_or_else(PoisonError::into_inner)
                    .contains_key(&name) =>
                {
                    Ok(())
                }
                None => Err(FetchError::NotFound { name }),
            }
        }
        .boxed()
    }
}
