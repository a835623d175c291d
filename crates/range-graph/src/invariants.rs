//! Whole-store invariant audit

use crate::error::GraphError;
use crate::store::GraphStore;
use std::collections::HashSet;

impl GraphStore {
    /// Check every structural invariant
    ///
    /// Mutations keep these true on their own; this is an audit used by
    /// tests and after bulk loads.
    ///
    /// # Errors
    /// The first violation found
    pub fn check_invariants(&self) -> Result<(), GraphError> {
        let mut pairs = HashSet::new();
        for edge in self.edges.values() {
            if !self.instances.contains_key(&edge.source) || !self.instances.contains_key(&edge.target) {
                return Err(GraphError::DanglingEdge(edge.id.clone()));
            }
            if edge.source == edge.target {
                return Err(GraphError::SelfLoop(edge.source.clone()));
            }
            if !pairs.insert((&edge.source, &edge.target)) {
                return Err(GraphError::DuplicateConnection {
                    from: edge.source.clone(),
                    to: edge.target.clone(),
                });
            }
        }

        for instance in self.instances.values() {
            instance.validate()?;

            let Some(base) = &instance.linked_to else {
                continue;
            };
            if !self.instances.get(base).is_some_and(|b| b.is_base()) {
                return Err(GraphError::InvalidBase {
                    component: instance.id.clone(),
                    base: base.clone(),
                });
            }

            let count = self
                .edges
                .values()
                .filter(|e| e.same_endpoints(base, &instance.id))
                .count();
            if count != 1 {
                return Err(GraphError::LinkCount {
                    id: instance.id.clone(),
                    count,
                });
            }
        }

        Ok(())
    }
}
