//! Wire types exchanged with the infrastructure backend
//!
//! Every response type tolerates missing fields: an absent list decodes as
//! empty so callers can treat "missing" and "empty" alike.

use range_model::{Edge, Instance, Position};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One provisioned VM as reported by the infrastructure
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceRecord {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub ip_private: Option<String>,
    #[serde(default)]
    pub ip_floating: Option<String>,
    #[serde(default)]
    pub image_name: Option<String>,
    #[serde(default)]
    pub flavor_name: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

impl InstanceRecord {
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            ..Self::default()
        }
    }

    /// With private and floating addresses
    #[must_use]
    pub fn with_ips(mut self, private: Option<&str>, floating: Option<&str>) -> Self {
        self.ip_private = private.map(str::to_string);
        self.ip_floating = floating.map(str::to_string);
        self
    }

    /// With provisioning details
    #[must_use]
    pub fn with_provisioning(mut self, image: &str, flavor: &str, status: &str) -> Self {
        self.image_name = Some(image.to_string());
        self.flavor_name = Some(flavor.to_string());
        self.status = Some(status.to_string());
        self
    }
}

/// `GET instances` response
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceListing {
    #[serde(default)]
    pub instances: Vec<InstanceRecord>,
}

/// `GET tools` response
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolListing {
    #[serde(default)]
    pub instance: Option<String>,
    #[serde(default)]
    pub tools: Vec<String>,
}

/// Full instance record persisted on every tool-list change
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolRecordPayload {
    /// Lookup key the backend files the record under
    pub instance: String,
    pub id: String,
    pub name: String,
    #[serde(alias = "type")]
    pub role: String,
    pub ip_private: Option<String>,
    pub ip_floating: Option<String>,
    pub ip: String,
    pub status: Option<String>,
    pub image: Option<String>,
    pub flavor: Option<String>,
    #[serde(default)]
    pub tools: Vec<String>,
}

impl From<&Instance> for ToolRecordPayload {
    fn from(instance: &Instance) -> Self {
        Self {
            instance: instance.lookup_key().to_string(),
            id: instance.id.to_string(),
            name: instance.name.clone(),
            role: instance.role.as_wire(),
            ip_private: instance.network.ip_private.clone(),
            ip_floating: instance.network.ip_floating.clone(),
            ip: instance.ip().to_string(),
            status: instance.provisioning.status.clone(),
            image: instance.provisioning.image.clone(),
            flavor: instance.provisioning.flavor.clone(),
            tools: instance.tools.clone(),
        }
    }
}

/// `POST tool-uninstall` body
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UninstallRequest {
    pub instance: String,
    #[serde(default)]
    pub ip_private: String,
    #[serde(default)]
    pub ip_floating: String,
    pub tool: String,
}

impl UninstallRequest {
    /// Request removal of `tool` from `instance`
    #[must_use]
    pub fn for_instance(instance: &Instance, tool: &str) -> Self {
        Self {
            instance: instance.lookup_key().to_string(),
            ip_private: instance.network.ip_private.clone().unwrap_or_default(),
            ip_floating: instance.network.ip_floating.clone().unwrap_or_default(),
            tool: tool.to_string(),
        }
    }
}

/// Status value that, together with exit code 0, confirms an uninstall
pub const STATUS_SUCCESS: &str = "success";

/// `POST tool-uninstall` response
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UninstallResponse {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub exit_code: Option<i64>,
    #[serde(default)]
    pub msg: Option<String>,
    #[serde(default)]
    pub stdout: Option<String>,
    #[serde(default)]
    pub stderr: Option<String>,
    #[serde(default)]
    pub tools: Option<Vec<String>>,
}

impl UninstallResponse {
    /// Response with a status and exit code
    #[must_use]
    pub fn new(status: impl Into<String>, exit_code: Option<i64>) -> Self {
        Self {
            status: status.into(),
            exit_code,
            ..Self::default()
        }
    }

    /// With a human message
    #[must_use]
    pub fn with_msg(mut self, msg: impl Into<String>) -> Self {
        self.msg = Some(msg.into());
        self
    }

    /// Removal happened: success status and exit code 0, nothing less
    #[inline]
    #[must_use]
    pub fn is_confirmed(&self) -> bool {
        self.status == STATUS_SUCCESS && self.exit_code == Some(0)
    }

    /// Operator-facing description of the outcome
    #[must_use]
    pub fn describe(&self) -> String {
        let code = self
            .exit_code
            .map_or_else(|| "none".to_string(), |c| c.to_string());
        match &self.msg {
            Some(msg) => format!("{msg} (status {}, exit code {code})", self.status),
            None => format!("status {}, exit code {code}", self.status),
        }
    }
}

/// Node of a saved scenario
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScenarioNode {
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// Role wire form, when the document carries one
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
    #[serde(default)]
    pub properties: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linked_to: Option<String>,
}

impl ScenarioNode {
    /// String property, ignoring empty values
    #[must_use]
    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties
            .get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }

    /// Tool names listed under `properties.tools`
    #[must_use]
    pub fn tools(&self) -> Vec<String> {
        self.properties
            .get("tools")
            .and_then(Value::as_array)
            .map(|tools| {
                tools
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// `GET scenario/<name>` response and `POST save-scenario` body
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScenarioDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scenario_name: Option<String>,
    #[serde(default)]
    pub nodes: Vec<ScenarioNode>,
    #[serde(default)]
    pub edges: Vec<Edge>,
}

/// Node of a saved industrial overlay
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndustrialNode {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub industrial: bool,
    pub linked_to: Option<String>,
    pub position: Position,
}

/// Industrial overlay snapshot
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndustrialScenarioDocument {
    pub scenario_name: String,
    pub base_scenario: String,
    #[serde(default)]
    pub nodes: Vec<IndustrialNode>,
    #[serde(default)]
    pub edges: Vec<Edge>,
}

/// `POST save-industrial-scenario` body
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndustrialScenarioEnvelope {
    pub scenario: IndustrialScenarioDocument,
}

/// One persisted tool record
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolConfigFile {
    pub file: String,
    #[serde(default)]
    pub instance: Option<String>,
    #[serde(default)]
    pub tools: Vec<String>,
}

/// `GET read_tools_configs` response
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolConfigListing {
    #[serde(default)]
    pub files: Vec<ToolConfigFile>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use range_model::{Network, Role};
    use serde_json::json;

    #[test]
    fn confirmation_needs_success_and_zero_exit() {
        assert!(UninstallResponse::new("success", Some(0)).is_confirmed());
        assert!(!UninstallResponse::new("success", Some(1)).is_confirmed());
        assert!(!UninstallResponse::new("warning", Some(0)).is_confirmed());
        assert!(!UninstallResponse::new("success", None).is_confirmed());
    }

    #[test]
    fn uninstall_response_tolerates_missing_fields() {
        let response: UninstallResponse =
            serde_json::from_value(json!({"status": "error", "msg": "no script"})).unwrap();

        assert_eq!(response.exit_code, None);
        assert!(!response.is_confirmed());
        assert_eq!(response.describe(), "no script (status error, exit code none)");
    }

    #[test]
    fn tool_record_carries_full_instance() {
        let instance = Instance::new("i-1", "victim-1", Role::Victim)
            .with_network(Network::new(Some("10.0.0.5".into()), None))
            .with_tools(["nmap"]);

        let payload = ToolRecordPayload::from(&instance);

        assert_eq!(payload.instance, "victim-1");
        assert_eq!(payload.role, "victim");
        assert_eq!(payload.ip, "10.0.0.5");
        assert_eq!(payload.tools, vec!["nmap".to_string()]);
    }

    #[test]
    fn scenario_node_reads_properties() {
        let node: ScenarioNode = serde_json::from_value(json!({
            "id": "n1",
            "name": "attack-1",
            "properties": {"ip_private": "10.0.0.9", "image": "", "tools": ["hydra", 3]}
        }))
        .unwrap();

        assert_eq!(node.kind, None);
        assert_eq!(node.property("ip_private"), Some("10.0.0.9"));
        assert_eq!(node.property("image"), None);
        assert_eq!(node.tools(), vec!["hydra".to_string()]);
    }

    #[test]
    fn industrial_envelope_shape() {
        let envelope = IndustrialScenarioEnvelope {
            scenario: IndustrialScenarioDocument {
                scenario_name: "industrial_file".into(),
                base_scenario: "scenario/scenario_file.json".into(),
                nodes: vec![IndustrialNode {
                    id: "plc_1".into(),
                    name: "PLC".into(),
                    kind: "industrial_plc".into(),
                    industrial: true,
                    linked_to: Some("v1".into()),
                    position: Position::new(1.0, 2.0),
                }],
                edges: Vec::new(),
            },
        };

        let value = serde_json::to_value(&envelope).unwrap();

        assert_eq!(value["scenario"]["nodes"][0]["type"], "industrial_plc");
        assert_eq!(value["scenario"]["nodes"][0]["linked_to"], "v1");
        assert_eq!(value["scenario"]["base_scenario"], "scenario/scenario_file.json");
    }
}
