//! Graph store
//!
//! Owns every `Instance` and `Edge` of an editing session. All mutations go
//! through here and preserve:
//! - every edge references instances present in the store
//! - at most one edge per ordered `(source, target)` pair
//! - every industrial component links to a present base instance through
//!   exactly one edge
//!
//! A rejected mutation leaves the store untouched.

use crate::error::GraphError;
use indexmap::IndexMap;
use range_model::{
    Edge, EdgeId, IndustrialAttachment, IndustrialKind, Instance, InstanceId, Position,
    Provisioning,
};

/// How `remove_instance` treats dependents
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Removal {
    /// Refuse when industrial components are linked to the instance
    Direct,
    /// Remove linked industrial components first
    Cascade,
}

/// Elements taken out of the store by a removal
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RemovedElements {
    pub instances: Vec<Instance>,
    pub edges: Vec<Edge>,
}

impl RemovedElements {
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.instances.is_empty() && self.edges.is_empty()
    }

    fn absorb(&mut self, other: RemovedElements) {
        self.instances.extend(other.instances);
        self.edges.extend(other.edges);
    }
}

/// Outcome of a full-content replacement
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplaceReport {
    /// Instances accepted
    pub instances: usize,
    /// Edges accepted (link edges included)
    pub edges: usize,
    /// Instances rejected by an invariant
    pub dropped_instances: Vec<InstanceId>,
    /// Edges rejected by an invariant
    pub dropped_edges: Vec<EdgeId>,
}

impl ReplaceReport {
    /// Whether anything was dropped
    #[inline]
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.dropped_instances.is_empty() && self.dropped_edges.is_empty()
    }
}

/// Mutable collection of instances and edges
#[derive(Debug, Clone, Default)]
pub struct GraphStore {
    pub(crate) instances: IndexMap<InstanceId, Instance>,
    pub(crate) edges: IndexMap<EdgeId, Edge>,
}

impl GraphStore {
    /// Create an empty store
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    #[must_use]
    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }

    #[inline]
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.instances.is_empty() && self.edges.is_empty()
    }

    /// Instances in insertion order
    pub fn instances(&self) -> impl Iterator<Item = &Instance> {
        self.instances.values()
    }

    /// Edges in insertion order
    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.values()
    }

    #[must_use]
    pub fn get(&self, id: &InstanceId) -> Option<&Instance> {
        self.instances.get(id)
    }

    #[must_use]
    pub fn contains(&self, id: &InstanceId) -> bool {
        self.instances.contains_key(id)
    }

    #[must_use]
    pub fn edge(&self, id: &EdgeId) -> Option<&Edge> {
        self.edges.get(id)
    }

    /// Find an instance by name (trimmed, case-insensitive)
    #[must_use]
    pub fn find_by_name(&self, name: &str) -> Option<&Instance> {
        let wanted = name.trim().to_lowercase();
        self.instances
            .values()
            .find(|i| i.name.trim().to_lowercase() == wanted)
    }

    /// Resolve an operator-supplied key: id first, then name
    #[must_use]
    pub fn resolve(&self, key: &str) -> Option<&Instance> {
        self.instances
            .get(&InstanceId::from(key))
            .or_else(|| self.find_by_name(key))
    }

    /// Instances matching a predicate
    pub fn query_instances<P>(&self, predicate: P) -> Vec<&Instance>
    where
        P: Fn(&Instance) -> bool,
    {
        self.instances.values().filter(|i| predicate(i)).collect()
    }

    /// Edges touching an instance
    pub fn incident_edges<'a>(&'a self, id: &'a InstanceId) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges.values().filter(move |e| e.touches(id))
    }

    /// Edge over the ordered pair, if any
    #[must_use]
    pub fn edge_between(&self, source: &InstanceId, target: &InstanceId) -> Option<&Edge> {
        self.edges.values().find(|e| e.same_direction(source, target))
    }

    /// Industrial components linked to a base
    #[must_use]
    pub fn dependents_of(&self, base: &InstanceId) -> Vec<InstanceId> {
        self.instances
            .values()
            .filter(|i| i.linked_to.as_ref() == Some(base))
            .map(|i| i.id.clone())
            .collect()
    }

    /// Link edge of an industrial component
    #[must_use]
    pub fn link_edge_of(&self, component: &InstanceId) -> Option<&Edge> {
        let base = self.instances.get(component)?.linked_to.as_ref()?;
        self.edges.values().find(|e| e.same_endpoints(base, component))
    }

    /// Whether the edge is the link between an industrial component and its base
    #[must_use]
    pub fn is_link_edge(&self, edge: &Edge) -> bool {
        let links = |component: &InstanceId, base: &InstanceId| {
            self.instances
                .get(component)
                .is_some_and(|c| c.is_industrial() && c.linked_to.as_ref() == Some(base))
        };
        links(&edge.target, &edge.source) || links(&edge.source, &edge.target)
    }

    /// Mutable tool list of an instance
    pub fn tools_mut(&mut self, id: &InstanceId) -> Option<&mut Vec<String>> {
        self.instances.get_mut(id).map(|i| &mut i.tools)
    }

    /// Move an instance
    pub fn set_position(&mut self, id: &InstanceId, position: Position) -> Result<(), GraphError> {
        let instance = self
            .instances
            .get_mut(id)
            .ok_or_else(|| GraphError::UnknownInstance(id.clone()))?;
        instance.position = Some(position);
        Ok(())
    }

    /// Replace provisioning details reported by the infrastructure
    pub fn set_provisioning(
        &mut self,
        id: &InstanceId,
        provisioning: Provisioning,
    ) -> Result<(), GraphError> {
        let instance = self
            .instances
            .get_mut(id)
            .ok_or_else(|| GraphError::UnknownInstance(id.clone()))?;
        instance.provisioning = provisioning;
        Ok(())
    }

    /// Add an instance
    ///
    /// An industrial component is inserted together with its link edge
    /// `base -> component`.
    ///
    /// # Errors
    /// - `Model` if the record fails validation
    /// - `DuplicateInstance` if the id is taken
    /// - `InvalidBase` if an industrial component's base is absent or not a base role
    pub fn add_instance(&mut self, instance: Instance) -> Result<&Instance, GraphError> {
        self.insert_instance(instance, None)
    }

    /// Create an industrial component of `kind` attached to `base`
    ///
    /// # Errors
    /// - `UnknownInstance` if the base is not in the store
    /// - `Model(NotABase)` if the base is not monitor, victim or attack
    pub fn attach_industrial(
        &mut self,
        kind: IndustrialKind,
        base: &InstanceId,
        offset: f64,
    ) -> Result<&Instance, GraphError> {
        let base = self
            .instances
            .get(base)
            .ok_or_else(|| GraphError::UnknownInstance(base.clone()))?;
        let IndustrialAttachment { component, link } = IndustrialAttachment::build(kind, base, offset)?;
        self.insert_instance(component, Some(link))
    }

    fn insert_instance(
        &mut self,
        instance: Instance,
        link: Option<Edge>,
    ) -> Result<&Instance, GraphError> {
        instance.validate()?;

        if self.instances.contains_key(&instance.id) {
            return Err(GraphError::DuplicateInstance(instance.id));
        }

        let link = match &instance.linked_to {
            Some(base_id) => {
                let base_ok = self.instances.get(base_id).is_some_and(Instance::is_base);
                if !base_ok {
                    return Err(GraphError::InvalidBase {
                        component: instance.id.clone(),
                        base: base_id.clone(),
                    });
                }
                let link = link
                    .filter(|l| l.same_endpoints(base_id, &instance.id))
                    .unwrap_or_else(|| Edge::between(base_id.clone(), instance.id.clone()));
                if self.edges.contains_key(&link.id) {
                    return Err(GraphError::LinkEdge(link.id));
                }
                Some(link)
            }
            None => None,
        };

        let id = instance.id.clone();
        tracing::debug!(instance = %id, role = %instance.role, "instance added");
        self.instances.insert(id.clone(), instance);
        if let Some(link) = link {
            self.edges.insert(link.id.clone(), link);
        }

        Ok(&self.instances[&id])
    }

    /// Add an edge
    ///
    /// Idempotent: an edge whose id is already present, or whose ordered
    /// pair is already connected, returns the existing edge unchanged. The
    /// reverse pair is a different connection. A connection between an
    /// industrial component and its base, in either direction, resolves to
    /// the existing link edge.
    ///
    /// # Errors
    /// - `UnknownInstance` if either endpoint is absent
    /// - `SelfLoop` if source equals target
    pub fn add_edge(&mut self, edge: Edge) -> Result<&Edge, GraphError> {
        if let Some(index) = self.edges.get_index_of(&edge.id) {
            return Ok(&self.edges[index]);
        }

        for endpoint in [&edge.source, &edge.target] {
            if !self.instances.contains_key(endpoint) {
                return Err(GraphError::UnknownInstance(endpoint.clone()));
            }
        }
        if edge.source == edge.target {
            return Err(GraphError::SelfLoop(edge.source));
        }

        let existing = self
            .edges
            .values()
            .position(|e| e.same_direction(&edge.source, &edge.target))
            .or_else(|| {
                if !self.is_link_edge(&edge) {
                    return None;
                }
                self.edges
                    .values()
                    .position(|e| self.is_link_edge(e) && e.same_endpoints(&edge.source, &edge.target))
            });
        if let Some(index) = existing {
            tracing::debug!(edge = %edge.id, existing = %self.edges[index].id, "connection already present");
            return Ok(&self.edges[index]);
        }

        let id = edge.id.clone();
        self.edges.insert(id.clone(), edge);
        Ok(&self.edges[&id])
    }

    /// Connect two instances with the directional id scheme
    ///
    /// # Errors
    /// See `add_edge`
    pub fn connect(&mut self, source: &InstanceId, target: &InstanceId) -> Result<&Edge, GraphError> {
        self.add_edge(Edge::between(source.clone(), target.clone()))
    }

    /// Remove an edge
    ///
    /// Returns `Ok(None)` if no edge has this id.
    ///
    /// # Errors
    /// `LinkEdge` if the edge links an industrial component to its base
    pub fn remove_edge(&mut self, id: &EdgeId) -> Result<Option<Edge>, GraphError> {
        let Some(edge) = self.edges.get(id) else {
            return Ok(None);
        };
        if self.is_link_edge(edge) {
            return Err(GraphError::LinkEdge(id.clone()));
        }
        Ok(self.edges.shift_remove(id))
    }

    /// Remove an instance and every edge touching it
    ///
    /// # Errors
    /// - `UnknownInstance` if absent
    /// - `ForbiddenDeletion` for `Removal::Direct` on a base that industrial
    ///   components link to
    pub fn remove_instance(
        &mut self,
        id: &InstanceId,
        removal: Removal,
    ) -> Result<RemovedElements, GraphError> {
        if !self.instances.contains_key(id) {
            return Err(GraphError::UnknownInstance(id.clone()));
        }

        let dependents = self.dependents_of(id);
        let mut removed = RemovedElements::default();

        if !dependents.is_empty() {
            if removal == Removal::Direct {
                let names: Vec<String> = dependents.iter().map(ToString::to_string).collect();
                return Err(GraphError::forbidden(
                    id.clone(),
                    format!("linked industrial components: {}", names.join(", ")),
                ));
            }
            for dependent in &dependents {
                removed.absorb(self.detach(dependent));
            }
        }

        removed.absorb(self.detach(id));
        tracing::debug!(instance = %id, removed = removed.instances.len(), "instance removed");
        Ok(removed)
    }

    /// Delete from the industrial overlay editor
    ///
    /// Accepts an instance or edge id. Base instances are never deletable
    /// here; removing an industrial component takes its link edge with it.
    ///
    /// # Errors
    /// - `ForbiddenDeletion` for base instances
    /// - `LinkEdge` for a link edge
    /// - `UnknownElement` if nothing has this id
    pub fn remove_overlay_element(&mut self, id: &str) -> Result<RemovedElements, GraphError> {
        let instance_id = InstanceId::from(id);
        if let Some(instance) = self.instances.get(&instance_id) {
            if instance.is_base() {
                return Err(GraphError::forbidden(instance_id, "base instances are not deletable"));
            }
            return self.remove_instance(&instance_id, Removal::Direct);
        }

        match self.remove_edge(&EdgeId::from(id))? {
            Some(edge) => Ok(RemovedElements {
                instances: Vec::new(),
                edges: vec![edge],
            }),
            None => Err(GraphError::UnknownElement(id.to_string())),
        }
    }

    /// Remove every industrial component and every edge touching one
    ///
    /// Base instances and edges between them are left untouched.
    pub fn cascade_remove_industrial(&mut self) -> RemovedElements {
        let industrial: Vec<InstanceId> = self
            .instances
            .values()
            .filter(|i| i.is_industrial())
            .map(|i| i.id.clone())
            .collect();

        let mut removed = RemovedElements::default();
        for id in &industrial {
            removed.absorb(self.detach(id));
        }

        tracing::info!(
            instances = removed.instances.len(),
            edges = removed.edges.len(),
            "industrial overlay cleared"
        );
        removed
    }

    /// Remove everything
    pub fn clear(&mut self) {
        self.instances.clear();
        self.edges.clear();
    }

    /// Replace the whole content
    ///
    /// Base and generic instances go in first, then industrial components
    /// (with their link edges), then the remaining edges. Elements that would
    /// break an invariant are dropped and reported.
    pub fn replace_all(&mut self, instances: Vec<Instance>, edges: Vec<Edge>) -> ReplaceReport {
        self.clear();
        let mut report = ReplaceReport::default();
        let mut pending_edges = edges;

        let (industrial, plain): (Vec<Instance>, Vec<Instance>) =
            instances.into_iter().partition(Instance::is_industrial);

        for instance in plain {
            let id = instance.id.clone();
            if let Err(e) = self.insert_instance(instance, None) {
                tracing::warn!(instance = %id, error = %e, "dropping instance on replace");
                report.dropped_instances.push(id);
            }
        }

        for instance in industrial {
            let id = instance.id.clone();
            let link = instance.linked_to.as_ref().and_then(|base| {
                pending_edges
                    .iter()
                    .position(|e| e.same_endpoints(base, &id))
                    .map(|index| pending_edges.remove(index))
            });
            if let Err(e) = self.insert_instance(instance, link) {
                tracing::warn!(instance = %id, error = %e, "dropping industrial component on replace");
                report.dropped_instances.push(id);
            }
        }

        for edge in pending_edges {
            let id = edge.id.clone();
            if let Err(e) = self.add_edge(edge) {
                tracing::warn!(edge = %id, error = %e, "dropping edge on replace");
                report.dropped_edges.push(id);
            }
        }

        report.instances = self.instances.len();
        report.edges = self.edges.len();
        report
    }

    /// Remove an instance and its incident edges without dependency checks
    fn detach(&mut self, id: &InstanceId) -> RemovedElements {
        let mut removed = RemovedElements::default();
        let Some(instance) = self.instances.shift_remove(id) else {
            return removed;
        };

        let incident: Vec<EdgeId> = self
            .edges
            .values()
            .filter(|e| e.touches(id))
            .map(|e| e.id.clone())
            .collect();
        for edge_id in incident {
            if let Some(edge) = self.edges.shift_remove(&edge_id) {
                removed.edges.push(edge);
            }
        }

        removed.instances.push(instance);
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use range_model::Role;

    fn plc() -> IndustrialKind {
        IndustrialKind::new("plc").unwrap()
    }

    fn seeded() -> GraphStore {
        let mut store = GraphStore::new();
        store.add_instance(Instance::from_name("m1", "monitor-1")).unwrap();
        store.add_instance(Instance::from_name("v1", "victim-1")).unwrap();
        store.add_instance(Instance::from_name("a1", "attack-1")).unwrap();
        store
    }

    fn ids(store: &GraphStore) -> Vec<String> {
        store.instances().map(|i| i.id.to_string()).collect()
    }

    #[test]
    fn add_instance_rejects_duplicates() {
        let mut store = seeded();
        let result = store.add_instance(Instance::from_name("m1", "other"));

        assert!(matches!(result, Err(GraphError::DuplicateInstance(_))));
        assert_eq!(store.instance_count(), 3);
    }

    #[test]
    fn add_edge_is_idempotent_on_id() {
        let mut store = seeded();
        let edge = Edge::new("e1", "a1".into(), "v1".into());

        store.add_edge(edge.clone()).unwrap();
        let again = store.add_edge(Edge::new("e1", "m1".into(), "v1".into())).unwrap();

        assert_eq!(again, &edge);
        assert_eq!(store.edge_count(), 1);
    }

    #[test]
    fn add_edge_rejects_unknown_endpoint_and_self_loop() {
        let mut store = seeded();

        assert!(matches!(
            store.connect(&"a1".into(), &"ghost".into()),
            Err(GraphError::UnknownInstance(_))
        ));
        assert!(matches!(
            store.connect(&"a1".into(), &"a1".into()),
            Err(GraphError::SelfLoop(_))
        ));
        assert_eq!(store.edge_count(), 0);
    }

    #[test]
    fn same_pair_under_new_id_returns_existing() {
        let mut store = seeded();
        store.connect(&"a1".into(), &"v1".into()).unwrap();

        let existing = store.add_edge(Edge::new("other", "a1".into(), "v1".into())).unwrap();

        assert_eq!(existing.id.as_str(), "edge_a1_v1");
        assert_eq!(store.edge_count(), 1);
    }

    #[test]
    fn reverse_pair_is_distinct_connection() {
        let mut store = seeded();
        store.connect(&"a1".into(), &"v1".into()).unwrap();
        store.connect(&"v1".into(), &"a1".into()).unwrap();

        assert_eq!(store.edge_count(), 2);
        assert!(store.edge_between(&"v1".into(), &"a1".into()).is_some());
    }

    #[test]
    fn attach_industrial_creates_node_and_link() {
        let mut store = seeded();
        let component = store.attach_industrial(plc(), &"v1".into(), 120.0).unwrap().id.clone();

        assert_eq!(store.instance_count(), 4);
        assert_eq!(store.edge_count(), 1);
        let link = store.link_edge_of(&component).unwrap();
        assert_eq!(link.source.as_str(), "v1");
        assert!(store.check_invariants().is_ok());
    }

    #[test]
    fn attach_industrial_rejects_generic_base() {
        let mut store = seeded();
        store.add_instance(Instance::from_name("g1", "router")).unwrap();

        let result = store.attach_industrial(plc(), &"g1".into(), 120.0);

        assert!(matches!(result, Err(GraphError::Model(_))));
        assert_eq!(store.instance_count(), 4);
    }

    #[test]
    fn add_industrial_requires_present_base() {
        let mut store = seeded();
        let orphan = Instance::new("plc_x", "PLC", Role::Industrial(plc())).with_link("ghost".into());

        assert!(matches!(
            store.add_instance(orphan),
            Err(GraphError::InvalidBase { .. })
        ));
    }

    #[test]
    fn remove_base_with_dependents_is_forbidden() {
        let mut store = seeded();
        let component = store.attach_industrial(plc(), &"m1".into(), 120.0).unwrap().id.clone();

        let result = store.remove_instance(&"m1".into(), Removal::Direct);
        assert!(matches!(result, Err(GraphError::ForbiddenDeletion { .. })));
        assert_eq!(store.instance_count(), 4);

        store.remove_instance(&component, Removal::Direct).unwrap();
        let removed = store.remove_instance(&"m1".into(), Removal::Direct).unwrap();
        assert_eq!(removed.instances.len(), 1);
        assert_eq!(ids(&store), vec!["v1", "a1"]);
    }

    #[test]
    fn cascade_removal_takes_dependents() {
        let mut store = seeded();
        store.attach_industrial(plc(), &"m1".into(), 120.0).unwrap();
        store.connect(&"m1".into(), &"v1".into()).unwrap();

        let removed = store.remove_instance(&"m1".into(), Removal::Cascade).unwrap();

        assert_eq!(removed.instances.len(), 2);
        assert_eq!(removed.edges.len(), 2);
        assert_eq!(store.edge_count(), 0);
        assert!(store.check_invariants().is_ok());
    }

    #[test]
    fn link_edge_cannot_be_removed_alone() {
        let mut store = seeded();
        let component = store.attach_industrial(plc(), &"a1".into(), 120.0).unwrap().id.clone();
        let link = store.link_edge_of(&component).unwrap().id.clone();

        assert!(matches!(store.remove_edge(&link), Err(GraphError::LinkEdge(_))));
        assert_eq!(store.edge_count(), 1);
    }

    #[test]
    fn overlay_delete_refuses_bases() {
        let mut store = seeded();
        let component = store.attach_industrial(plc(), &"a1".into(), 120.0).unwrap().id.clone();
        store.connect(&"a1".into(), &"v1".into()).unwrap();

        assert!(matches!(
            store.remove_overlay_element("v1"),
            Err(GraphError::ForbiddenDeletion { .. })
        ));

        let removed = store.remove_overlay_element(component.as_str()).unwrap();
        assert_eq!(removed.instances.len(), 1);

        let removed = store.remove_overlay_element("edge_a1_v1").unwrap();
        assert_eq!(removed.edges.len(), 1);

        assert!(matches!(
            store.remove_overlay_element("nothing"),
            Err(GraphError::UnknownElement(_))
        ));
    }

    #[test]
    fn replace_all_uses_payload_link_and_drops_dangling() {
        let mut store = seeded();
        let component = Instance::new("plc_1", "PLC", Role::Industrial(plc())).with_link("v1".into());
        let instances = vec![
            Instance::from_name("v1", "victim-1"),
            component,
            Instance::from_name("a1", "attack-1"),
        ];
        let edges = vec![
            Edge::new("custom-link", "v1".into(), "plc_1".into()),
            Edge::new("e2", "a1".into(), "v1".into()),
            Edge::new("e3", "a1".into(), "ghost".into()),
        ];

        let report = store.replace_all(instances, edges);

        assert_eq!(report.instances, 3);
        assert_eq!(report.edges, 2);
        assert_eq!(report.dropped_edges, vec![EdgeId::from("e3")]);
        assert!(store.edge(&"custom-link".into()).is_some());
        assert!(store.check_invariants().is_ok());
    }

    #[test]
    fn resolve_by_id_or_name() {
        let store = seeded();

        assert_eq!(store.resolve("v1").unwrap().name, "victim-1");
        assert_eq!(store.resolve(" Victim-1 ").unwrap().id.as_str(), "v1");
        assert!(store.resolve("nope").is_none());
    }
}
