//! Scenario load and save
//!
//! Loading always overwrites the whole graph; there is no merge. A failed,
//! malformed or empty load clears the graph and switches the view to
//! `NoScenario`, which is a normal outcome rather than an error. Saving
//! always sends the full graph.

use crate::error::Result;
use crate::events::{Notice, ViewState};
use crate::session::Session;
use range_backend::wire::{
    IndustrialNode, IndustrialScenarioDocument, IndustrialScenarioEnvelope, InstanceRecord,
    ScenarioDocument, ScenarioNode,
};
use range_backend::{Backend, BackendError};
use range_model::{Edge, Instance, InstanceId, Network, Provisioning, Role, Scenario};
use serde_json::{json, Map, Value};

impl<B: Backend> Session<B> {
    /// Load the graph from the provisioned infrastructure
    ///
    /// # Errors
    /// `Locked` while an install job runs; backend failures end in
    /// `ViewState::NoScenario` instead
    pub async fn load_infrastructure(&self) -> Result<ViewState> {
        self.lock.ensure_free()?;
        self.deselect();

        let listing = match self.backend.list_instances().await {
            Ok(listing) => listing,
            Err(e) => return Ok(self.enter_no_scenario("infrastructure", &e)),
        };

        let instances: Vec<Instance> = listing
            .instances
            .iter()
            .enumerate()
            .map(|(index, record)| self.instance_from_record(index, record))
            .collect();
        tracing::info!(instances = instances.len(), "infrastructure listing received");
        Ok(self.install_graph("infrastructure", instances, Vec::new()))
    }

    /// Load a saved scenario by name
    ///
    /// # Errors
    /// `Locked` while an install job runs; backend failures end in
    /// `ViewState::NoScenario` instead
    pub async fn load_scenario(&self, name: &str) -> Result<ViewState> {
        self.lock.ensure_free()?;
        self.deselect();

        let document = match self.backend.fetch_scenario(name).await {
            Ok(document) => document,
            Err(e) => return Ok(self.enter_no_scenario(name, &e)),
        };

        let instances: Vec<Instance> = document
            .nodes
            .iter()
            .enumerate()
            .map(|(index, node)| self.instance_from_node(index, node))
            .collect();
        tracing::info!(
            scenario = name,
            instances = instances.len(),
            edges = document.edges.len(),
            "scenario received"
        );
        Ok(self.install_graph(name, instances, document.edges))
    }

    /// Save the whole graph as a named scenario
    ///
    /// # Errors
    /// `Locked`, or `Backend` if the save request fails
    pub async fn save_scenario(&self, name: &str) -> Result<()> {
        self.lock.ensure_free()?;
        let document = self.scenario_document(name);
        let (nodes, edges) = (document.nodes.len(), document.edges.len());

        if let Err(e) = self.backend.save_scenario(&document).await {
            self.events
                .notice(Notice::error(format!("could not save scenario {name}: {e}")));
            return Err(e.into());
        }
        tracing::info!(scenario = name, nodes, edges, "scenario saved");
        self.events
            .notice(Notice::info(format!("scenario {name} saved")));
        Ok(())
    }

    /// Save the graph with its industrial overlay
    ///
    /// # Errors
    /// `Locked`, or `Backend` if the save request fails
    pub async fn save_industrial(&self) -> Result<()> {
        self.lock.ensure_free()?;
        let envelope = self.industrial_envelope();
        let name = envelope.scenario.scenario_name.clone();

        if let Err(e) = self.backend.save_industrial_scenario(&envelope).await {
            self.events.notice(Notice::error(format!(
                "could not save industrial scenario {name}: {e}"
            )));
            return Err(e.into());
        }
        tracing::info!(
            scenario = %name,
            nodes = envelope.scenario.nodes.len(),
            "industrial scenario saved"
        );
        self.events
            .notice(Notice::info(format!("industrial scenario {name} saved")));
        Ok(())
    }

    /// Current graph as a named aggregate
    #[must_use]
    pub fn scenario(&self, name: &str) -> Scenario {
        let graph = self.graph.lock();
        Scenario::new(name).with_contents(
            graph.instances().cloned().collect(),
            graph.edges().cloned().collect(),
        )
    }

    /// Document `save_scenario` sends
    #[must_use]
    pub fn scenario_document(&self, name: &str) -> ScenarioDocument {
        let scenario = self.scenario(name);
        ScenarioDocument {
            nodes: scenario.instances.iter().map(node_from_instance).collect(),
            scenario_name: Some(scenario.name),
            edges: scenario.edges,
        }
    }

    /// Envelope `save_industrial` sends
    #[must_use]
    pub fn industrial_envelope(&self) -> IndustrialScenarioEnvelope {
        let config = &self.config.scenario;
        let scenario = self
            .scenario(&config.industrial_name)
            .with_base(config.base_reference.clone());
        let nodes = scenario
            .instances
            .iter()
            .map(|instance| IndustrialNode {
                id: instance.id.to_string(),
                name: instance.name.clone(),
                kind: instance.role.as_wire(),
                industrial: instance.is_industrial(),
                linked_to: instance.linked_to.as_ref().map(ToString::to_string),
                position: instance.position.unwrap_or_default(),
            })
            .collect();

        IndustrialScenarioEnvelope {
            scenario: IndustrialScenarioDocument {
                scenario_name: scenario.name,
                base_scenario: scenario.base_scenario.unwrap_or_default(),
                nodes,
                edges: scenario.edges,
            },
        }
    }

    fn enter_no_scenario(&self, source: &str, error: &BackendError) -> ViewState {
        tracing::warn!(source, %error, "load failed, clearing graph");
        self.graph.lock().clear();
        self.publish_graph();
        self.set_view(ViewState::NoScenario);
        let notice = if error.is_malformed() {
            Notice::warning(format!("no scenario available from {source}"))
        } else {
            Notice::error(format!("could not load {source}: {error}"))
        };
        self.events.notice(notice);
        ViewState::NoScenario
    }

    fn install_graph(&self, source: &str, instances: Vec<Instance>, edges: Vec<Edge>) -> ViewState {
        let report = self.graph.lock().replace_all(instances, edges);
        self.publish_graph();

        if !report.is_clean() {
            self.events.notice(Notice::warning(format!(
                "{source}: dropped {} instances and {} edges that broke graph rules",
                report.dropped_instances.len(),
                report.dropped_edges.len()
            )));
        }

        let view = if report.instances == 0 {
            self.events
                .notice(Notice::info(format!("{source} has no instances")));
            ViewState::NoScenario
        } else {
            ViewState::Loaded
        };
        tracing::info!(
            source,
            instances = report.instances,
            edges = report.edges,
            view = ?view,
            "graph loaded"
        );
        self.set_view(view);
        view
    }

    fn instance_from_record(&self, index: usize, record: &InstanceRecord) -> Instance {
        let id = if record.id.is_empty() {
            record.name.as_str()
        } else {
            record.id.as_str()
        };
        let role = self.classifier.classify(&record.name);
        Instance::new(id, record.name.clone(), role)
            .with_network(Network::new(
                record.ip_private.clone(),
                record.ip_floating.clone(),
            ))
            .with_provisioning(Provisioning {
                image: record.image_name.clone(),
                flavor: record.flavor_name.clone(),
                status: record.status.clone(),
            })
            .with_position(self.config.layout.row_position(index))
    }

    fn instance_from_node(&self, index: usize, node: &ScenarioNode) -> Instance {
        let id = if node.id.is_empty() {
            node.name.as_str()
        } else {
            node.id.as_str()
        };
        let role = node
            .kind
            .as_deref()
            .and_then(|kind| kind.parse::<Role>().ok())
            .unwrap_or_else(|| self.classifier.classify(&node.name));
        let link = node
            .linked_to
            .as_deref()
            .or_else(|| node.property("linked_to"))
            .filter(|_| role.is_industrial())
            .map(InstanceId::from);

        let mut instance = Instance::new(id, node.name.clone(), role)
            .with_network(Network::new(
                node.property("ip_private").map(str::to_string),
                node.property("ip_floating").map(str::to_string),
            ))
            .with_provisioning(Provisioning {
                image: node.property("image").map(str::to_string),
                flavor: node.property("flavor").map(str::to_string),
                status: node.property("status").map(str::to_string),
            })
            .with_tools(node.tools())
            .with_position(
                node.position
                    .unwrap_or_else(|| self.config.layout.row_position(index)),
            );
        instance.linked_to = link;
        instance
    }
}

fn node_from_instance(instance: &Instance) -> ScenarioNode {
    let mut properties = Map::new();
    properties.insert("ip".into(), json!(instance.ip()));
    let optional = [
        ("ip_private", &instance.network.ip_private),
        ("ip_floating", &instance.network.ip_floating),
        ("image", &instance.provisioning.image),
        ("flavor", &instance.provisioning.flavor),
        ("status", &instance.provisioning.status),
    ];
    for (key, value) in optional
        .into_iter()
        .filter_map(|(key, value)| value.as_ref().map(|v| (key, v)))
    {
        properties.insert(key.into(), Value::String(value.clone()));
    }
    properties.insert("tools".into(), json!(instance.tools));

    ScenarioNode {
        id: instance.id.to_string(),
        name: instance.name.clone(),
        kind: Some(instance.role.as_wire()),
        position: instance.position,
        properties,
        linked_to: instance.linked_to.as_ref().map(ToString::to_string),
    }
}
