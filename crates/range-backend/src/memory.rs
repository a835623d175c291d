//! In-process backend
//!
//! Keeps the authoritative records in memory and behaves like the real
//! backend for every route: tool lists keyed by normalized instance name,
//! scenarios stored on save and served on fetch, install output replayed
//! from a script. Used for offline runs and as the test double.

use crate::error::{BackendError, Result};
use crate::wire::{
    IndustrialScenarioEnvelope, InstanceListing, InstanceRecord, ScenarioDocument,
    ToolConfigFile, ToolConfigListing, ToolListing, ToolRecordPayload, UninstallRequest,
    UninstallResponse,
};
use crate::{Backend, ByteStream};
use async_trait::async_trait;
use futures::StreamExt;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, VecDeque};

/// Backend operations, for failure injection and call counting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    ListInstances,
    FetchTools,
    PersistTools,
    Uninstall,
    InstallAll,
    FetchScenario,
    SaveScenario,
    SaveIndustrial,
    ReadToolConfigs,
}

#[derive(Debug, Default)]
struct MemoryState {
    instances: Vec<InstanceRecord>,
    tools: BTreeMap<String, Vec<String>>,
    records: Vec<ToolRecordPayload>,
    scenarios: HashMap<String, ScenarioDocument>,
    industrial: HashMap<String, IndustrialScenarioEnvelope>,
    uninstall_script: VecDeque<UninstallResponse>,
    install_script: Vec<Result<Vec<u8>>>,
    install_stalls: bool,
    failures: HashMap<Operation, BackendError>,
    calls: HashMap<Operation, usize>,
}

impl MemoryState {
    fn enter(&mut self, op: Operation) -> Result<()> {
        *self.calls.entry(op).or_default() += 1;
        match self.failures.remove(&op) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

fn normalize(instance: &str) -> String {
    instance.trim().to_lowercase()
}

/// In-memory `Backend`
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    state: Mutex<MemoryState>,
}

impl InMemoryBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With an infrastructure listing
    #[must_use]
    pub fn with_instances(self, instances: Vec<InstanceRecord>) -> Self {
        self.state.lock().instances = instances;
        self
    }

    /// With a tool record for an instance
    #[must_use]
    pub fn with_tools<I, S>(self, instance: &str, tools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.state
            .lock()
            .tools
            .insert(normalize(instance), tools.into_iter().map(Into::into).collect());
        self
    }

    /// With a stored scenario
    #[must_use]
    pub fn with_scenario(self, name: &str, document: ScenarioDocument) -> Self {
        self.state.lock().scenarios.insert(name.to_string(), document);
        self
    }

    /// With install output, one entry per chunk
    #[must_use]
    pub fn with_install_chunks<I, C>(self, chunks: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Vec<u8>>,
    {
        self.state
            .lock()
            .install_script
            .extend(chunks.into_iter().map(|c| Ok(c.into())));
        self
    }

    /// Break the install stream after the scripted chunks
    #[must_use]
    pub fn with_install_interrupted(self, reason: &str) -> Self {
        self.state
            .lock()
            .install_script
            .push(Err(BackendError::Transport(reason.to_string())));
        self
    }

    /// Keep the install stream open forever after the scripted chunks
    #[must_use]
    pub fn with_install_stalled(self) -> Self {
        self.state.lock().install_stalls = true;
        self
    }

    /// Queue the response for the next uninstall call
    ///
    /// Without a scripted response the tool is removed if present and the
    /// call confirms with exit code 0.
    pub fn script_uninstall(&self, response: UninstallResponse) {
        self.state.lock().uninstall_script.push_back(response);
    }

    /// Make the next call of `op` fail with `error`
    pub fn fail_next(&self, op: Operation, error: BackendError) {
        self.state.lock().failures.insert(op, error);
    }

    /// Tools on record for an instance
    #[must_use]
    pub fn tools_of(&self, instance: &str) -> Vec<String> {
        self.state
            .lock()
            .tools
            .get(&normalize(instance))
            .cloned()
            .unwrap_or_default()
    }

    /// Every record persisted so far, in order
    #[must_use]
    pub fn persisted_records(&self) -> Vec<ToolRecordPayload> {
        self.state.lock().records.clone()
    }

    #[must_use]
    pub fn saved_scenario(&self, name: &str) -> Option<ScenarioDocument> {
        self.state.lock().scenarios.get(name).cloned()
    }

    #[must_use]
    pub fn saved_industrial(&self, name: &str) -> Option<IndustrialScenarioEnvelope> {
        self.state.lock().industrial.get(name).cloned()
    }

    /// How many times `op` was called
    #[must_use]
    pub fn calls(&self, op: Operation) -> usize {
        self.state.lock().calls.get(&op).copied().unwrap_or(0)
    }
}

#[async_trait]
impl Backend for InMemoryBackend {
    async fn list_instances(&self) -> Result<InstanceListing> {
        let mut state = self.state.lock();
        state.enter(Operation::ListInstances)?;
        Ok(InstanceListing {
            instances: state.instances.clone(),
        })
    }

    async fn fetch_tools(&self, instance: &str) -> Result<ToolListing> {
        let mut state = self.state.lock();
        state.enter(Operation::FetchTools)?;
        let key = normalize(instance);
        let tools = state.tools.get(&key).cloned().unwrap_or_default();
        Ok(ToolListing {
            instance: Some(key),
            tools,
        })
    }

    async fn persist_tools(&self, record: &ToolRecordPayload) -> Result<()> {
        let mut state = self.state.lock();
        state.enter(Operation::PersistTools)?;
        if record.instance.trim().is_empty() {
            return Err(BackendError::rejected(400, "missing instance name"));
        }
        state
            .tools
            .insert(normalize(&record.instance), record.tools.clone());
        state.records.push(record.clone());
        Ok(())
    }

    async fn uninstall_tool(&self, request: &UninstallRequest) -> Result<UninstallResponse> {
        let mut state = self.state.lock();
        state.enter(Operation::Uninstall)?;
        if request.instance.is_empty() || request.tool.is_empty() {
            return Err(BackendError::rejected(400, "instance and tool are required"));
        }
        if let Some(response) = state.uninstall_script.pop_front() {
            return Ok(response);
        }

        let Some(tools) = state.tools.get_mut(&normalize(&request.instance)) else {
            return Ok(UninstallResponse::new("error", None)
                .with_msg(format!("no tool record for {}", request.instance)));
        };
        if !tools.contains(&request.tool) {
            return Ok(UninstallResponse::new("error", None)
                .with_msg(format!("no uninstall script for {}", request.tool)));
        }
        tools.retain(|t| t != &request.tool);
        let mut response = UninstallResponse::new("success", Some(0))
            .with_msg(format!("{} removed from {}", request.tool, request.instance));
        response.tools = Some(tools.clone());
        Ok(response)
    }

    async fn install_all(&self) -> Result<ByteStream> {
        let mut state = self.state.lock();
        state.enter(Operation::InstallAll)?;
        let chunks = futures::stream::iter(state.install_script.clone());
        if state.install_stalls {
            Ok(chunks.chain(futures::stream::pending()).boxed())
        } else {
            Ok(chunks.boxed())
        }
    }

    async fn fetch_scenario(&self, name: &str) -> Result<ScenarioDocument> {
        let mut state = self.state.lock();
        state.enter(Operation::FetchScenario)?;
        state
            .scenarios
            .get(name)
            .cloned()
            .ok_or_else(|| BackendError::rejected(404, format!("scenario '{name}' not found")))
    }

    async fn save_scenario(&self, document: &ScenarioDocument) -> Result<()> {
        let mut state = self.state.lock();
        state.enter(Operation::SaveScenario)?;
        let Some(name) = document.scenario_name.clone() else {
            return Err(BackendError::rejected(400, "missing scenario_name"));
        };
        state.scenarios.insert(name, document.clone());
        Ok(())
    }

    async fn save_industrial_scenario(&self, envelope: &IndustrialScenarioEnvelope) -> Result<()> {
        let mut state = self.state.lock();
        state.enter(Operation::SaveIndustrial)?;
        state
            .industrial
            .insert(envelope.scenario.scenario_name.clone(), envelope.clone());
        Ok(())
    }

    async fn read_tool_configs(&self) -> Result<ToolConfigListing> {
        let mut state = self.state.lock();
        state.enter(Operation::ReadToolConfigs)?;
        let files = state
            .tools
            .iter()
            .map(|(instance, tools)| ToolConfigFile {
                file: format!("{instance}_tools.json"),
                instance: Some(instance.clone()),
                tools: tools.clone(),
            })
            .collect();
        Ok(ToolConfigListing { files })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;
    use pretty_assertions::assert_eq;

    fn request(tool: &str) -> UninstallRequest {
        UninstallRequest {
            instance: "Victim-1".into(),
            tool: tool.into(),
            ..UninstallRequest::default()
        }
    }

    #[tokio::test]
    async fn tools_are_keyed_case_insensitively() {
        let backend = InMemoryBackend::new().with_tools(" Victim-1 ", ["nmap"]);

        let listing = backend.fetch_tools("victim-1").await.unwrap();

        assert_eq!(listing.tools, vec!["nmap".to_string()]);
    }

    #[tokio::test]
    async fn default_uninstall_confirms_known_tool() {
        let backend = InMemoryBackend::new().with_tools("victim-1", ["nmap", "hydra"]);

        let response = backend.uninstall_tool(&request("nmap")).await.unwrap();
        assert!(response.is_confirmed());
        assert_eq!(backend.tools_of("victim-1"), vec!["hydra".to_string()]);

        let response = backend.uninstall_tool(&request("nmap")).await.unwrap();
        assert!(!response.is_confirmed());
    }

    #[tokio::test]
    async fn scripted_uninstall_wins() {
        let backend = InMemoryBackend::new().with_tools("victim-1", ["nmap"]);
        backend.script_uninstall(UninstallResponse::new("success", Some(1)));

        let response = backend.uninstall_tool(&request("nmap")).await.unwrap();

        assert_eq!(response.exit_code, Some(1));
        assert_eq!(backend.tools_of("victim-1"), vec!["nmap".to_string()]);
    }

    #[tokio::test]
    async fn injected_failure_fires_once() {
        let backend = InMemoryBackend::new();
        backend.fail_next(Operation::ListInstances, BackendError::Transport("down".into()));

        assert!(backend.list_instances().await.is_err());
        assert!(backend.list_instances().await.is_ok());
        assert_eq!(backend.calls(Operation::ListInstances), 2);
    }

    #[tokio::test]
    async fn install_replays_script() {
        let backend = InMemoryBackend::new()
            .with_install_chunks(["data: a\n", "data: b\n"])
            .with_install_interrupted("reset");

        let stream = backend.install_all().await.unwrap();
        let collected: Vec<Result<Vec<u8>>> = stream.collect().await;

        assert_eq!(collected.len(), 3);
        assert_eq!(collected[0].as_deref(), Ok(&b"data: a\n"[..]));
        assert!(collected[2].is_err());

        let clean = InMemoryBackend::new().with_install_chunks(["x"]);
        let chunks: Vec<Vec<u8>> = clean.install_all().await.unwrap().try_collect().await.unwrap();
        assert_eq!(chunks, vec![b"x".to_vec()]);
    }

    #[tokio::test]
    async fn unknown_scenario_is_rejected() {
        let backend = InMemoryBackend::new();

        let err = backend.fetch_scenario("missing").await.unwrap_err();

        assert!(matches!(err, BackendError::Rejected { status: 404, .. }));
    }
}
