//! Session context
//!
//! One `Session` per editing view. It owns the graph store, the selection,
//! the view state and the install job, and is the only way to mutate any of
//! them. `Session` is `Send + Sync`; share it behind an `Arc`. Internal
//! locks are never held across an await.

use crate::config::RangeConfig;
use crate::error::{RangeError, Result};
use crate::events::{EventBus, GraphSnapshot, Notice, SessionEvent, ViewState};
use crate::install::JobState;
use crate::lock::UiLock;
use crate::pending::PendingOps;
use parking_lot::Mutex;
use range_backend::Backend;
use range_graph::{GraphError, GraphStore, Removal, RemovedElements};
use range_model::{Edge, IndustrialKind, Instance, InstanceId, RoleClassifier, SubstringClassifier};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Editing session bound to one backend
pub struct Session<B: Backend> {
    pub(crate) backend: Arc<B>,
    pub(crate) config: RangeConfig,
    pub(crate) classifier: Arc<dyn RoleClassifier>,
    pub(crate) graph: Mutex<GraphStore>,
    pub(crate) selected: Mutex<Option<InstanceId>>,
    pub(crate) view: Mutex<ViewState>,
    pub(crate) job: Mutex<JobState>,
    pub(crate) install_log: Mutex<Vec<crate::events::LogLine>>,
    pub(crate) lock: Arc<UiLock>,
    pub(crate) pending: PendingOps,
    pub(crate) events: EventBus,
}

impl<B: Backend> std::fmt::Debug for Session<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("instances", &self.graph.lock().instance_count())
            .field("selected", &*self.selected.lock())
            .field("view", &*self.view.lock())
            .field("job", &*self.job.lock())
            .field("locked", &self.lock.is_held())
            .finish_non_exhaustive()
    }
}

impl<B: Backend> Session<B> {
    /// Create a session with an empty graph
    pub fn new(backend: Arc<B>, config: RangeConfig) -> Self {
        Self {
            backend,
            config,
            classifier: Arc::new(SubstringClassifier),
            graph: Mutex::new(GraphStore::new()),
            selected: Mutex::new(None),
            view: Mutex::new(ViewState::Empty),
            job: Mutex::new(JobState::Idle),
            install_log: Mutex::new(Vec::new()),
            lock: Arc::new(UiLock::new()),
            pending: PendingOps::new(),
            events: EventBus::new(),
        }
    }

    /// With a custom role classifier for names without a structured role
    #[must_use]
    pub fn with_classifier(mut self, classifier: Arc<dyn RoleClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    /// Subscribe to session events
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    #[must_use]
    pub fn config(&self) -> &RangeConfig {
        &self.config
    }

    #[must_use]
    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    /// Full copy of the graph
    #[must_use]
    pub fn snapshot(&self) -> GraphSnapshot {
        GraphSnapshot::from(&*self.graph.lock())
    }

    /// Copy of one instance, by id or name
    #[must_use]
    pub fn instance(&self, key: &str) -> Option<Instance> {
        self.graph.lock().resolve(key).cloned()
    }

    /// Instances matching a predicate
    pub fn query_instances<P>(&self, predicate: P) -> Vec<Instance>
    where
        P: Fn(&Instance) -> bool,
    {
        self.graph
            .lock()
            .query_instances(predicate)
            .into_iter()
            .cloned()
            .collect()
    }

    #[must_use]
    pub fn view_state(&self) -> ViewState {
        *self.view.lock()
    }

    /// Whether an install job holds the UI lock
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.lock.is_held()
    }

    /// Whether a tool operation is in flight on an instance
    #[must_use]
    pub fn is_pending(&self, id: &InstanceId) -> bool {
        self.pending.is_pending(id)
    }

    pub(crate) fn set_view(&self, view: ViewState) {
        *self.view.lock() = view;
        self.events.publish(SessionEvent::ViewChanged(view));
    }

    pub(crate) fn publish_graph(&self) {
        let snapshot = self.snapshot();
        self.events.publish(SessionEvent::GraphChanged(snapshot));
    }

    /// Id of the instance a key refers to
    pub(crate) fn resolve_id(&self, key: &str) -> Result<InstanceId> {
        self.graph
            .lock()
            .resolve(key)
            .map(|i| i.id.clone())
            .ok_or_else(|| RangeError::UnknownInstance(key.to_string()))
    }

    /// Run a graph mutation under the UI lock check, then publish the graph
    pub(crate) fn mutate_graph<T, F>(&self, mutation: F) -> Result<T>
    where
        F: FnOnce(&mut GraphStore) -> std::result::Result<T, GraphError>,
    {
        self.lock.ensure_free()?;
        let outcome = {
            let mut graph = self.graph.lock();
            mutation(&mut graph)
        };
        match outcome {
            Ok(value) => {
                self.publish_graph();
                Ok(value)
            }
            Err(e) => {
                tracing::warn!(error = %e, "graph mutation rejected");
                Err(e.into())
            }
        }
    }

    /// Connect two instances
    ///
    /// # Errors
    /// `Locked`, `UnknownInstance`, or a `Graph` invariant violation
    pub fn connect(&self, source: &str, target: &str) -> Result<Edge> {
        let source = self.resolve_id(source)?;
        let target = self.resolve_id(target)?;
        self.mutate_graph(|graph| graph.connect(&source, &target).cloned())
    }

    /// Attach an industrial component of `kind` to a base instance
    ///
    /// # Errors
    /// `Locked`, `UnknownInstance`, `Model` for a bad kind or non-base target
    pub fn attach_industrial(&self, kind: &str, base: &str) -> Result<Instance> {
        let kind = IndustrialKind::new(kind)?;
        let base = self.resolve_id(base)?;
        let offset = self.config.layout.industrial_offset;
        let component =
            self.mutate_graph(|graph| graph.attach_industrial(kind, &base, offset).cloned())?;
        tracing::info!(component = %component.id, base = %base, "industrial component attached");
        Ok(component)
    }

    /// Delete from the industrial overlay: a component or an edge, never a base
    ///
    /// # Errors
    /// `Locked`, or `Graph` (`ForbiddenDeletion`, `LinkEdge`, `UnknownElement`)
    pub fn delete_element(&self, id: &str) -> Result<RemovedElements> {
        let removed = self.mutate_graph(|graph| graph.remove_overlay_element(id))?;
        self.clear_selection_if_removed(&removed);
        Ok(removed)
    }

    /// Remove an instance
    ///
    /// # Errors
    /// `Locked`, `UnknownInstance`, or `ForbiddenDeletion` for a direct
    /// removal of a base that industrial components depend on
    pub fn remove_instance(&self, key: &str, removal: Removal) -> Result<RemovedElements> {
        let id = self.resolve_id(key)?;
        let removed = self.mutate_graph(|graph| graph.remove_instance(&id, removal))?;
        self.clear_selection_if_removed(&removed);
        Ok(removed)
    }

    /// Remove every industrial component and its edges
    ///
    /// # Errors
    /// `Locked`
    pub fn clear_industrial(&self) -> Result<RemovedElements> {
        let removed = self.mutate_graph(|graph| Ok(graph.cascade_remove_industrial()))?;
        self.clear_selection_if_removed(&removed);
        if !removed.is_empty() {
            self.events.notice(Notice::info(format!(
                "removed {} industrial components",
                removed.instances.len()
            )));
        }
        Ok(removed)
    }

    fn clear_selection_if_removed(&self, removed: &RemovedElements) {
        let cleared = {
            let mut selected = self.selected.lock();
            let gone = selected
                .as_ref()
                .is_some_and(|id| removed.instances.iter().any(|i| &i.id == id));
            if gone {
                *selected = None;
            }
            gone
        };
        if cleared {
            self.events.publish(SessionEvent::SelectionChanged(None));
        }
    }
}
