//! Tool lifecycle
//!
//! Three operations, three consistency contracts:
//! - `add_tool`: optimistic append, then persist the full record
//! - `soft_remove_tool`: edit the record only, nothing is uninstalled
//! - `uninstall_tool`: real removal; the local list changes only after the
//!   backend confirms with status `success` and exit code 0
//!
//! Each operation checks the UI lock, claims a per-instance pending token,
//! and finishes with a refresh of the same instance.

use crate::error::{RangeError, Result};
use crate::events::Notice;
use crate::session::Session;
use range_backend::wire::{ToolConfigListing, ToolRecordPayload, UninstallRequest};
use range_backend::{Backend, BackendError};
use range_model::InstanceId;

/// Operator answer to the uninstall confirmation prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    Confirmed,
    Declined,
}

/// Result of a real uninstall
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UninstallOutcome {
    /// Backend confirmed removal; the record was updated
    Removed,
    /// Removal not confirmed; the tool is still shown as installed
    Retained { reason: String },
    /// Operator declined; nothing was sent
    Declined,
}

impl<B: Backend> Session<B> {
    fn begin_tool_operation(&self, key: &str, tool: &str) -> Result<(InstanceId, String)> {
        self.lock.ensure_free()?;
        let tool = tool.trim();
        if tool.is_empty() {
            return Err(RangeError::EmptyToolName);
        }
        Ok((self.resolve_id(key)?, tool.to_string()))
    }

    /// Apply a local edit to the tool list and build the record to persist
    fn edit_tools<F>(&self, id: &InstanceId, edit: F) -> Result<ToolRecordPayload>
    where
        F: FnOnce(&mut range_model::Instance) -> bool,
    {
        let payload = {
            let mut graph = self.graph.lock();
            let instance = graph
                .get(id)
                .cloned()
                .ok_or_else(|| RangeError::UnknownInstance(id.to_string()))?;
            let mut edited = instance;
            let changed = edit(&mut edited);
            if changed {
                if let Some(tools) = graph.tools_mut(id) {
                    tools.clone_from(&edited.tools);
                }
            }
            ToolRecordPayload::from(&edited)
        };
        self.publish_graph();
        Ok(payload)
    }

    async fn persist(&self, payload: &ToolRecordPayload) -> std::result::Result<(), BackendError> {
        self.backend.persist_tools(payload).await.map_err(|e| {
            tracing::warn!(instance = %payload.instance, error = %e, "persisting tool record failed");
            e
        })
    }

    /// Reconcile after an operation; failures are already surfaced as notices
    async fn settle(&self, id: &InstanceId) {
        if let Err(e) = self.refresh(id).await {
            tracing::debug!(instance = %id, error = %e, "post-operation refresh failed");
        }
    }

    /// Record `tool` as installed on an instance
    ///
    /// The tool is appended locally before the backend is asked to persist.
    /// A failed persist leaves the local list as it is; the closing refresh
    /// re-pulls the authoritative list.
    ///
    /// # Errors
    /// Local rejections (`Locked`, `Busy`, `UnknownInstance`, `EmptyToolName`)
    /// or the persist failure
    pub async fn add_tool(&self, key: &str, tool: &str) -> Result<()> {
        let (id, tool) = self.begin_tool_operation(key, tool)?;
        let _token = self.pending.begin(&id, "add-tool")?;

        let payload = self.edit_tools(&id, |instance| instance.add_tool(tool.clone()))?;
        let persisted = self.persist(&payload).await;
        match &persisted {
            Ok(()) => {
                tracing::info!(instance = %id, %tool, "tool added");
                self.events
                    .notice(Notice::info(format!("{tool} added to {}", payload.instance)));
            }
            Err(e) => self.events.notice(Notice::error(format!(
                "could not save {tool} for {}: {e}",
                payload.instance
            ))),
        }

        self.settle(&id).await;
        persisted.map_err(Into::into)
    }

    /// Remove `tool` from the record only; nothing is uninstalled
    ///
    /// # Errors
    /// Local rejections or the persist failure
    pub async fn soft_remove_tool(&self, key: &str, tool: &str) -> Result<()> {
        let (id, tool) = self.begin_tool_operation(key, tool)?;
        let _token = self.pending.begin(&id, "soft-remove-tool")?;

        let payload = self.edit_tools(&id, |instance| instance.remove_tool(&tool))?;
        let persisted = self.persist(&payload).await;
        match &persisted {
            Ok(()) => {
                tracing::info!(instance = %id, %tool, "tool removed from record");
                self.events.notice(Notice::info(format!(
                    "{tool} removed from the record of {}",
                    payload.instance
                )));
            }
            Err(e) => self.events.notice(Notice::error(format!(
                "could not update the record of {}: {e}",
                payload.instance
            ))),
        }

        self.settle(&id).await;
        persisted.map_err(Into::into)
    }

    /// Uninstall `tool` from the real instance
    ///
    /// The local list loses the tool only when the backend answers with
    /// status `success` and exit code 0. Any other answer, including a
    /// rejection, keeps the tool listed and raises a warning notice.
    ///
    /// # Errors
    /// Local rejections, or a transport failure of the uninstall request
    pub async fn uninstall_tool(
        &self,
        key: &str,
        tool: &str,
        confirmation: Confirmation,
    ) -> Result<UninstallOutcome> {
        let (id, tool) = self.begin_tool_operation(key, tool)?;
        if confirmation == Confirmation::Declined {
            tracing::debug!(instance = %id, %tool, "uninstall declined");
            return Ok(UninstallOutcome::Declined);
        }
        let _token = self.pending.begin(&id, "uninstall")?;

        let request = {
            let graph = self.graph.lock();
            let instance = graph
                .get(&id)
                .ok_or_else(|| RangeError::UnknownInstance(id.to_string()))?;
            UninstallRequest::for_instance(instance, &tool)
        };

        let outcome = match self.backend.uninstall_tool(&request).await {
            Ok(response) if response.is_confirmed() => {
                let payload = self.edit_tools(&id, |instance| instance.remove_tool(&tool))?;
                tracing::info!(instance = %id, %tool, "uninstall confirmed");
                match self.persist(&payload).await {
                    Ok(()) => self.events.notice(Notice::info(format!(
                        "{tool} uninstalled from {}",
                        request.instance
                    ))),
                    Err(e) => self.events.notice(Notice::warning(format!(
                        "{tool} uninstalled from {} but the record could not be saved: {e}",
                        request.instance
                    ))),
                }
                Ok(UninstallOutcome::Removed)
            }
            Ok(response) => {
                let reason = response.describe();
                tracing::warn!(instance = %id, %tool, %reason, "uninstall not confirmed");
                self.events.notice(Notice::warning(format!(
                    "{tool} is still installed on {}: {reason}",
                    request.instance
                )));
                Ok(UninstallOutcome::Retained { reason })
            }
            Err(e @ BackendError::Transport(_)) => {
                self.events.notice(Notice::error(format!(
                    "uninstall of {tool} on {} failed: {e}",
                    request.instance
                )));
                Err(RangeError::from(e))
            }
            Err(e) => {
                let reason = e.to_string();
                tracing::warn!(instance = %id, %tool, %reason, "uninstall rejected");
                self.events.notice(Notice::warning(format!(
                    "{tool} is still installed on {}: {reason}",
                    request.instance
                )));
                Ok(UninstallOutcome::Retained { reason })
            }
        };

        self.settle(&id).await;
        outcome
    }

    /// Every tool record the backend holds
    ///
    /// # Errors
    /// `Backend` failures, except a malformed listing which reads as empty
    pub async fn tool_configs(&self) -> Result<ToolConfigListing> {
        match self.backend.read_tool_configs().await {
            Ok(listing) => Ok(listing),
            Err(e) if e.is_malformed() => {
                tracing::warn!(error = %e, "malformed tool record listing, treating as empty");
                Ok(ToolConfigListing::default())
            }
            Err(e) => Err(e.into()),
        }
    }
}
