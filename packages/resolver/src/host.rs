//! Tokio-driven host for resolution passes
//!
//! [`Resolver`] hands pending fetches back to its caller. [`Host`] is a small
//! caller that spawns them on the tokio runtime and re-renders as they land,
//! standing in for the re-render a UI framework would schedule.

use crate::registry::FetchError;
use crate::resolver::{ResolveResult, Resolver};
use crate::vdom::VNode;
use serde_json::Value;
use std::collections::HashSet;
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};

/// Completion of a spawned fetch
#[derive(Debug, Clone, PartialEq)]
pub enum FetchEvent {
    Completed { component: String },
    Failed { component: String, error: FetchError },
}

impl FetchEvent {
    pub fn component(&self) -> &str {
        match self {
            FetchEvent::Completed { component } | FetchEvent::Failed { component, .. } => component,
        }
    }
}

/// Result of rendering until no fetch is in flight
#[derive(Debug, Clone, PartialEq)]
pub struct Settled {
    pub root: Option<VNode>,
    /// Passes run, the first one included
    pub passes: usize,
    /// Components still missing after the last pass
    pub deferred: Vec<String>,
}

/// Owns a resolver and drives its fetches on tokio
pub struct Host {
    resolver: Resolver,
    events_tx: mpsc::UnboundedSender<FetchEvent>,
    events_rx: mpsc::UnboundedReceiver<FetchEvent>,
    in_flight: HashSet<String>,
}

impl Host {
    pub fn new(resolver: Resolver) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            resolver,
            events_tx,
            events_rx,
            in_flight: HashSet::new(),
        }
    }

    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    pub fn resolver_mut(&mut self) -> &mut Resolver {
        &mut self.resolver
    }

    /// Fetches spawned and not yet reported through [`Host::next_event`]
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Run one pass and spawn the fetches it requested
    ///
    /// A component whose fetch is already in flight is neither fetched again
    /// nor charged another attempt.
    /// Must be called from within a tokio runtime.
    pub fn render(&mut self, tree_id: &str, props: &Value) -> ResolveResult<Option<VNode>> {
        self.render_pass(tree_id, props).map(|(root, _)| root)
    }

    fn render_pass(
        &mut self,
        tree_id: &str,
        props: &Value,
    ) -> ResolveResult<(Option<VNode>, Vec<String>)> {
        let mut resolution = self
            .resolver
            .resolve_with_in_flight(tree_id, props, &self.in_flight)?;

        for fetch in resolution.take_fetches() {
            let component = fetch.component().to_string();
            self.in_flight.insert(component.clone());

            let events_tx = self.events_tx.clone();
            debug!(component = %component, "Spawning component fetch");

            tokio::spawn(async move {
                let event = match fetch.wait().await {
                    Ok(()) => FetchEvent::Completed { component },
                    Err(error) => FetchEvent::Failed { component, error },
                };
                // The host may be gone by now; nothing left to re-render then
                let _ = events_tx.send(event);
            });
        }

        Ok((resolution.root, resolution.deferred))
    }

    /// Wait for the next spawned fetch to finish; `None` when nothing is in flight
    pub async fn next_event(&mut self) -> Option<FetchEvent> {
        if self.in_flight.is_empty() {
            return None;
        }

        let event = self.events_rx.recv().await?;
        self.in_flight.remove(event.component());

        if let FetchEvent::Failed { component, error } = &event {
            warn!(component = %component, error = %error, "Component fetch failed");
        }
        Some(event)
    }

    /// Render, then re-render after every fetch completion until nothing is
    /// in flight or `max_passes` passes have run
    #[instrument(skip(self, props))]
    pub async fn render_settled(&mut self, tree_id: &str, props: &Value) -> ResolveResult<Settled> {
        let max_passes = self.resolver.options().max_passes.max(1);
        let (mut root, mut deferred) = self.render_pass(tree_id, props)?;
        let mut passes = 1;

        while passes < max_passes {
            if self.next_event().await.is_none() {
                break;
            }
            (root, deferred) = self.render_pass(tree_id, props)?;
            passes += 1;
        }

        info!(passes, deferred = deferred.len(), "Render settled");

        Ok(Settled {
            root,
            passes,
            deferred,
        })
    }
}
