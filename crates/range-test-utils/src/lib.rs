//! Testing utilities for the range workspace
//!
//! Shared fixtures: a small provisioned range, a scenario with an
//! industrial overlay, and sessions wired to the in-memory backend.

#![allow(missing_docs)]

use range_backend::wire::{InstanceRecord, ScenarioDocument, ScenarioNode, UninstallResponse};
use range_backend::InMemoryBackend;
use range_core::{RangeConfig, Session};
use range_model::{Edge, Position};
use serde_json::json;
use std::sync::Arc;

/// Four provisioned VMs, one per classifier outcome
pub fn sample_listing() -> Vec<InstanceRecord> {
    vec![
        InstanceRecord::new("i-mon", "monitor-1")
            .with_ips(Some("10.0.0.2"), Some("172.24.4.2"))
            .with_provisioning("ubuntu-22.04", "m1.small", "ACTIVE"),
        InstanceRecord::new("i-vic", "victim-1")
            .with_ips(Some("10.0.0.3"), None)
            .with_provisioning("debian-12", "m1.small", "ACTIVE"),
        InstanceRecord::new("i-att", "attack-1")
            .with_ips(Some("10.0.0.4"), Some("172.24.4.4"))
            .with_provisioning("kali-2024", "m1.medium", "ACTIVE"),
        InstanceRecord::new("i-gw", "gateway").with_ips(Some("10.0.0.1"), None),
    ]
}

/// Backend holding `sample_listing` with tools on the victim and attacker
pub fn seeded_backend() -> InMemoryBackend {
    InMemoryBackend::new()
        .with_instances(sample_listing())
        .with_tools("victim-1", ["nmap", "tcpdump"])
        .with_tools("attack-1", ["metasploit"])
}

fn scenario_node(id: &str, name: &str, kind: &str, x: f64) -> ScenarioNode {
    ScenarioNode {
        id: id.to_string(),
        name: name.to_string(),
        kind: Some(kind.to_string()),
        position: Some(Position::new(x, 150.0)),
        ..ScenarioNode::default()
    }
}

/// Saved scenario: monitor, victim and a PLC attached to the victim
pub fn scenario_document(name: &str) -> ScenarioDocument {
    let mut victim = scenario_node("v1", "victim-1", "victim", 400.0);
    victim
        .properties
        .insert("ip_private".into(), json!("10.0.0.3"));
    victim.properties.insert("tools".into(), json!(["nmap"]));

    let mut plc = scenario_node("plc_1", "PLC", "industrial_plc", 520.0);
    plc.linked_to = Some("v1".to_string());

    ScenarioDocument {
        scenario_name: Some(name.to_string()),
        nodes: vec![
            scenario_node("m1", "monitor-1", "monitor", 200.0),
            victim,
            plc,
        ],
        edges: vec![
            Edge::between("m1".into(), "v1".into()),
            Edge::between("v1".into(), "plc_1".into()),
        ],
    }
}

/// Session over a shared backend with default configuration
pub fn session_with(backend: InMemoryBackend) -> (Arc<InMemoryBackend>, Session<InMemoryBackend>) {
    let backend = Arc::new(backend);
    let session = Session::new(Arc::clone(&backend), RangeConfig::default());
    (backend, session)
}

/// Session over `seeded_backend`
pub fn seeded_session() -> (Arc<InMemoryBackend>, Session<InMemoryBackend>) {
    session_with(seeded_backend())
}

/// Install output split the way a proxy may split it
pub fn split_install_chunks() -> Vec<&'static str> {
    vec!["data: line1\n", "data: li", "ne2\n"]
}

/// Install output ending with the exit-code record
pub fn finished_install_chunks(code: i32) -> Vec<String> {
    vec![
        "data: installing nmap\n\n".to_string(),
        "data: installing tcpdump\n\n".to_string(),
        format!("data: [FIN] Exit Code: {code}\n\n"),
    ]
}

pub fn confirmed_uninstall() -> UninstallResponse {
    UninstallResponse::new("success", Some(0)).with_msg("removed")
}

pub fn unconfirmed_uninstall(exit_code: i64) -> UninstallResponse {
    UninstallResponse::new("success", Some(exit_code)).with_msg("script exited early")
}
