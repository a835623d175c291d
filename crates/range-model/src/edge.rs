//! Edge records

use crate::ids::{EdgeId, InstanceId};
use serde::{Deserialize, Serialize};

/// Directed connection between two instances
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edge {
    pub id: EdgeId,
    pub source: InstanceId,
    pub target: InstanceId,
}

impl Edge {
    /// Create an edge with an explicit id
    #[must_use]
    pub fn new(id: impl Into<EdgeId>, source: InstanceId, target: InstanceId) -> Self {
        Self {
            id: id.into(),
            source,
            target,
        }
    }

    /// Create an edge with the directional id `edge_<source>_<target>`
    #[must_use]
    pub fn between(source: InstanceId, target: InstanceId) -> Self {
        let id = EdgeId::directed(&source, &target);
        Self { id, source, target }
    }

    /// Whether this edge touches the given instance
    #[inline]
    #[must_use]
    pub fn touches(&self, instance: &InstanceId) -> bool {
        &self.source == instance || &self.target == instance
    }

    /// Same ordered `(source, target)` pair
    #[inline]
    #[must_use]
    pub fn same_direction(&self, source: &InstanceId, target: &InstanceId) -> bool {
        &self.source == source && &self.target == target
    }

    /// Same endpoints regardless of direction
    #[must_use]
    pub fn same_endpoints(&self, a: &InstanceId, b: &InstanceId) -> bool {
        self.same_direction(a, b) || self.same_direction(b, a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn between_uses_directional_id() {
        let edge = Edge::between("a".into(), "b".into());
        assert_eq!(edge.id.as_str(), "edge_a_b");
        assert!(edge.touches(&"a".into()));
        assert!(!edge.touches(&"c".into()));
    }

    #[test]
    fn endpoint_matching() {
        let edge = Edge::between("a".into(), "b".into());
        let (a, b) = (InstanceId::from("a"), InstanceId::from("b"));

        assert!(edge.same_direction(&a, &b));
        assert!(!edge.same_direction(&b, &a));
        assert!(edge.same_endpoints(&b, &a));
    }
}
