//! Per-instance pending-operation tokens
//!
//! At most one tool operation runs per instance. A second one is rejected
//! with `RangeError::Busy` instead of racing the first.

use crate::error::RangeError;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use range_model::InstanceId;
use std::fmt;
use std::sync::Arc;
use ulid::Ulid;

/// Operation identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OpId(Ulid);

impl OpId {
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for OpId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for OpId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "op-{}", self.0)
    }
}

#[derive(Debug, Clone)]
struct PendingEntry {
    op: OpId,
    operation: &'static str,
    started: DateTime<Utc>,
}

/// Registry of in-flight operations
#[derive(Debug, Clone, Default)]
pub struct PendingOps {
    inflight: Arc<DashMap<InstanceId, PendingEntry>>,
}

impl PendingOps {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the instance for `operation`
    ///
    /// # Errors
    /// `RangeError::Busy` if another operation holds it
    pub fn begin(
        &self,
        instance: &InstanceId,
        operation: &'static str,
    ) -> Result<PendingToken, RangeError> {
        match self.inflight.entry(instance.clone()) {
            Entry::Occupied(held) => {
                let entry = held.get();
                tracing::warn!(
                    %instance,
                    held_by = entry.operation,
                    op = %entry.op,
                    since = %entry.started,
                    rejected = operation,
                    "instance busy"
                );
                Err(RangeError::Busy {
                    instance: instance.clone(),
                    operation: entry.operation.to_string(),
                })
            }
            Entry::Vacant(slot) => {
                let op = OpId::new();
                slot.insert(PendingEntry {
                    op,
                    operation,
                    started: Utc::now(),
                });
                tracing::debug!(%instance, %op, operation, "operation started");
                Ok(PendingToken {
                    inflight: Arc::clone(&self.inflight),
                    instance: instance.clone(),
                    op,
                })
            }
        }
    }

    #[must_use]
    pub fn is_pending(&self, instance: &InstanceId) -> bool {
        self.inflight.contains_key(instance)
    }

    /// Operation currently holding an instance
    #[must_use]
    pub fn operation_on(&self, instance: &InstanceId) -> Option<&'static str> {
        self.inflight.get(instance).map(|e| e.operation)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inflight.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inflight.is_empty()
    }
}

/// Holds an instance until dropped
#[derive(Debug)]
pub struct PendingToken {
    inflight: Arc<DashMap<InstanceId, PendingEntry>>,
    instance: InstanceId,
    op: OpId,
}

impl PendingToken {
    #[inline]
    #[must_use]
    pub fn op(&self) -> OpId {
        self.op
    }
}

impl Drop for PendingToken {
    fn drop(&mut self) {
        self.inflight
            .remove_if(&self.instance, |_, entry| entry.op == self.op);
        tracing::debug!(instance = %self.instance, op = %self.op, "operation finished");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_operation_on_same_instance_is_busy() {
        let ops = PendingOps::new();
        let v1 = InstanceId::from("v1");

        let token = ops.begin(&v1, "uninstall").unwrap();
        let err = ops.begin(&v1, "add-tool").unwrap_err();
        assert!(matches!(err, RangeError::Busy { ref operation, .. } if operation == "uninstall"));

        assert!(ops.begin(&InstanceId::from("a1"), "add-tool").is_ok());

        drop(token);
        assert!(!ops.is_pending(&v1));
        assert!(ops.begin(&v1, "add-tool").is_ok());
    }

    #[test]
    fn tokens_have_distinct_ids() {
        let ops = PendingOps::new();
        let a = ops.begin(&"a".into(), "x").unwrap();
        let b = ops.begin(&"b".into(), "x").unwrap();

        assert_ne!(a.op(), b.op());
        assert_eq!(ops.len(), 2);
    }
}
