//! Session events for the rendering layer
//!
//! The renderer re-derives every visual from these events and holds no
//! authoritative state of its own. `GraphChanged` always carries the full
//! instance and edge set.

use crate::install::JobState;
use chrono::{DateTime, Utc};
use range_graph::GraphStore;
use range_model::{Edge, Instance, InstanceId};
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

/// Buffered events per subscriber before the slowest one starts lagging
pub const EVENT_CAPACITY: usize = 256;

/// Full copy of the graph
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub instances: Vec<Instance>,
    pub edges: Vec<Edge>,
}

impl From<&GraphStore> for GraphSnapshot {
    fn from(store: &GraphStore) -> Self {
        Self {
            instances: store.instances().cloned().collect(),
            edges: store.edges().cloned().collect(),
        }
    }
}

impl GraphSnapshot {
    #[must_use]
    pub fn instance(&self, id: &InstanceId) -> Option<&Instance> {
        self.instances.iter().find(|i| &i.id == id)
    }
}

/// Severity of an operator message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

/// Operator-facing message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Warning,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.level {
            NoticeLevel::Info => "info",
            NoticeLevel::Warning => "warning",
            NoticeLevel::Error => "error",
        };
        write!(f, "[{level}] {}", self.message)
    }
}

/// One record emitted by a streaming job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogLine {
    pub at: DateTime<Utc>,
    pub text: String,
}

impl LogLine {
    pub fn now(text: impl Into<String>) -> Self {
        Self {
            at: Utc::now(),
            text: text.into(),
        }
    }
}

/// What the main view shows
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ViewState {
    /// Nothing loaded yet
    #[default]
    Empty,
    /// A scenario or infrastructure listing is on screen
    Loaded,
    /// Load found nothing to show
    NoScenario,
}

/// Everything the rendering layer is told
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    GraphChanged(GraphSnapshot),
    SelectionChanged(Option<InstanceId>),
    ToolsRefreshed {
        instance: InstanceId,
        tools: Vec<String>,
    },
    LockChanged(bool),
    InstallLine(LogLine),
    JobStateChanged(JobState),
    Notice(Notice),
    ViewChanged(ViewState),
}

/// Broadcast sender shared by the session and its guards
#[derive(Debug, Clone)]
pub(crate) struct EventBus {
    sender: broadcast::Sender<SessionEvent>,
}

impl EventBus {
    pub(crate) fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_CAPACITY);
        Self { sender }
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.sender.subscribe()
    }

    /// Publish; having no subscriber is fine
    pub(crate) fn publish(&self, event: SessionEvent) {
        let _ = self.sender.send(event);
    }

    pub(crate) fn notice(&self, notice: Notice) {
        match notice.level {
            NoticeLevel::Info => tracing::info!(target: "range::notice", "{}", notice.message),
            NoticeLevel::Warning => tracing::warn!(target: "range::notice", "{}", notice.message),
            NoticeLevel::Error => tracing::error!(target: "range::notice", "{}", notice.message),
        }
        self.publish(SessionEvent::Notice(notice));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publish_without_subscribers_is_silent() {
        let bus = EventBus::new();
        bus.publish(SessionEvent::LockChanged(true));

        let mut rx = bus.subscribe();
        bus.notice(Notice::warning("tool still installed"));

        assert_eq!(
            rx.try_recv().unwrap(),
            SessionEvent::Notice(Notice::warning("tool still installed"))
        );
    }

    #[test]
    fn notice_display() {
        assert_eq!(Notice::error("down").to_string(), "[error] down");
    }
}
