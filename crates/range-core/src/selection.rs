//! Selection and authoritative tool refresh
//!
//! Selecting an instance always re-pulls its tool list from the backend and
//! overwrites the local copy; the local list is never trusted across a
//! selection boundary. Selection is read-only and stays allowed while the
//! UI lock is held.

use crate::error::{RangeError, Result};
use crate::events::{Notice, SessionEvent};
use crate::session::Session;
use range_backend::Backend;
use range_model::{Instance, InstanceId};

impl<B: Backend> Session<B> {
    /// Currently selected instance
    #[must_use]
    pub fn selected(&self) -> Option<Instance> {
        let id = self.selected.lock().clone()?;
        self.graph.lock().get(&id).cloned()
    }

    /// Select an instance by id or name and refresh its tools
    ///
    /// # Errors
    /// `UnknownInstance`, or the refresh failure (see `refresh`)
    pub async fn select(&self, key: &str) -> Result<Vec<String>> {
        let id = self.resolve_id(key)?;
        *self.selected.lock() = Some(id.clone());
        tracing::debug!(instance = %id, "selected");
        self.events
            .publish(SessionEvent::SelectionChanged(Some(id.clone())));
        self.refresh(&id).await
    }

    /// Clear the selection
    pub fn deselect(&self) {
        let previous = self.selected.lock().take();
        if previous.is_some() {
            self.events.publish(SessionEvent::SelectionChanged(None));
        }
    }

    /// Overwrite an instance's tools with the backend's record
    ///
    /// A malformed response counts as an empty record. A transport failure
    /// or rejection leaves the local list untouched and is returned.
    ///
    /// # Errors
    /// `UnknownInstance`, or `Backend` for transport failures and rejections
    pub async fn refresh(&self, id: &InstanceId) -> Result<Vec<String>> {
        let lookup = self
            .graph
            .lock()
            .get(id)
            .map(|i| i.lookup_key().to_string())
            .ok_or_else(|| RangeError::UnknownInstance(id.to_string()))?;

        let tools = match self.backend.fetch_tools(&lookup).await {
            Ok(listing) => listing.tools,
            Err(e) if e.is_malformed() => {
                tracing::warn!(instance = %id, error = %e, "malformed tool listing, treating as empty");
                Vec::new()
            }
            Err(e) => {
                self.events
                    .notice(Notice::error(format!("could not refresh tools of {lookup}: {e}")));
                return Err(e.into());
            }
        };

        let applied = {
            let mut graph = self.graph.lock();
            match graph.tools_mut(id) {
                Some(local) => {
                    local.clear();
                    for tool in &tools {
                        if !local.contains(tool) {
                            local.push(tool.clone());
                        }
                    }
                    Some(local.clone())
                }
                None => None,
            }
        };

        let Some(applied) = applied else {
            tracing::debug!(instance = %id, "instance removed while refreshing");
            return Ok(tools);
        };

        tracing::debug!(instance = %id, tools = applied.len(), "tools refreshed");
        self.events.publish(SessionEvent::ToolsRefreshed {
            instance: id.clone(),
            tools: applied.clone(),
        });
        self.publish_graph();
        Ok(applied)
    }
}
