//! Failure injection through a mocked backend

use async_trait::async_trait;
use mockall::mock;
use pretty_assertions::assert_eq;
use range_backend::wire::{
    IndustrialScenarioEnvelope, InstanceListing, InstanceRecord, ScenarioDocument,
    ToolConfigListing, ToolListing, ToolRecordPayload, UninstallRequest, UninstallResponse,
};
use range_backend::{Backend, BackendError, ByteStream};
use range_core::{
    CancelToken, Confirmation, JobState, NoticeLevel, RangeConfig, RangeError, Session,
    SessionEvent, ViewState,
};
use std::sync::Arc;

mock! {
    pub Authority {}

    #[async_trait]
    impl Backend for Authority {
        async fn list_instances(&self) -> range_backend::Result<InstanceListing>;
        async fn fetch_tools(&self, instance: &str) -> range_backend::Result<ToolListing>;
        async fn persist_tools(&self, record: &ToolRecordPayload) -> range_backend::Result<()>;
        async fn uninstall_tool(&self, request: &UninstallRequest) -> range_backend::Result<UninstallResponse>;
        async fn install_all(&self) -> range_backend::Result<ByteStream>;
        async fn fetch_scenario(&self, name: &str) -> range_backend::Result<ScenarioDocument>;
        async fn save_scenario(&self, document: &ScenarioDocument) -> range_backend::Result<()>;
        async fn save_industrial_scenario(&self, envelope: &IndustrialScenarioEnvelope) -> range_backend::Result<()>;
        async fn read_tool_configs(&self) -> range_backend::Result<ToolConfigListing>;
    }
}

fn listing() -> InstanceListing {
    InstanceListing {
        instances: vec![
            InstanceRecord::new("i-vic", "victim-1").with_ips(Some("10.0.0.3"), None),
            InstanceRecord::new("i-mon", "monitor-1"),
        ],
    }
}

fn tools(names: &[&str]) -> ToolListing {
    ToolListing {
        instance: Some("victim-1".to_string()),
        tools: names.iter().map(ToString::to_string).collect(),
    }
}

async fn loaded(mut mock: MockAuthority) -> Session<MockAuthority> {
    mock.expect_list_instances()
        .times(1)
        .returning(|| Ok(listing()));
    let session = Session::new(Arc::new(mock), RangeConfig::default());
    assert_eq!(session.load_infrastructure().await.unwrap(), ViewState::Loaded);
    session
}

fn error_notices(rx: &mut tokio::sync::broadcast::Receiver<SessionEvent>) -> Vec<String> {
    let mut messages = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if let SessionEvent::Notice(n) = event {
            if n.level == NoticeLevel::Error {
                messages.push(n.message);
            }
        }
    }
    messages
}

#[tokio::test]
async fn failed_persist_is_surfaced_and_refresh_wins() {
    let mut mock = MockAuthority::new();
    mock.expect_persist_tools()
        .withf(|record| record.instance == "victim-1" && record.tools == vec!["nmap".to_string()])
        .times(1)
        .returning(|_| Err(BackendError::Transport("connection refused".into())));
    mock.expect_fetch_tools()
        .withf(|instance| instance == "victim-1")
        .times(1)
        .returning(|_| Ok(tools(&[])));
    let session = loaded(mock).await;
    let mut rx = session.subscribe();

    let err = session.add_tool("victim-1", "nmap").await.unwrap_err();

    assert!(matches!(err, RangeError::Backend(BackendError::Transport(_))));
    assert!(session.instance("victim-1").unwrap().tools.is_empty());
    assert_eq!(error_notices(&mut rx).len(), 1);
}

#[tokio::test]
async fn uninstall_transport_failure_keeps_tool() {
    let mut mock = MockAuthority::new();
    mock.expect_fetch_tools()
        .returning(|_| Ok(tools(&["nmap"])));
    mock.expect_uninstall_tool()
        .withf(|request| request.tool == "nmap" && request.ip_private == "10.0.0.3")
        .times(1)
        .returning(|_| Err(BackendError::Transport("timed out".into())));
    mock.expect_persist_tools().never();
    let session = loaded(mock).await;
    session.select("victim-1").await.unwrap();

    let err = session
        .uninstall_tool("victim-1", "nmap", Confirmation::Confirmed)
        .await
        .unwrap_err();

    assert!(matches!(err, RangeError::Backend(BackendError::Transport(_))));
    assert!(session.instance("victim-1").unwrap().has_tool("nmap"));
}

#[tokio::test]
async fn local_rejections_never_reach_the_backend() {
    let session = loaded(MockAuthority::new()).await;

    assert!(matches!(
        session.connect("victim-1", "ghost"),
        Err(RangeError::UnknownInstance(_))
    ));
    assert!(matches!(
        session.add_tool("ghost", "nmap").await,
        Err(RangeError::UnknownInstance(_))
    ));
    assert!(matches!(
        session.attach_industrial("plc", "nobody").map(|_| ()),
        Err(RangeError::UnknownInstance(_))
    ));
    assert!(session.connect("victim-1", "victim-1").is_err());
}

#[tokio::test]
async fn install_transport_failure_ends_failed() {
    let mut mock = MockAuthority::new();
    mock.expect_install_all()
        .times(1)
        .returning(|| Err(BackendError::Transport("connection refused".into())));
    let session = Session::new(Arc::new(mock), RangeConfig::default());

    let report = session.run_install(&CancelToken::new()).await.unwrap();

    assert!(matches!(report.state, JobState::Failed(_)));
    assert!(!session.is_locked());
}

#[tokio::test]
async fn transport_failure_on_load_clears_into_no_scenario() {
    let mut mock = MockAuthority::new();
    mock.expect_list_instances()
        .times(1)
        .returning(|| Err(BackendError::Transport("connection refused".into())));
    let session = Session::new(Arc::new(mock), RangeConfig::default());
    let mut rx = session.subscribe();

    let view = session.load_infrastructure().await.unwrap();

    assert_eq!(view, ViewState::NoScenario);
    assert_eq!(error_notices(&mut rx).len(), 1);
}

#[tokio::test]
async fn save_rejection_is_returned() {
    let mut mock = MockAuthority::new();
    mock.expect_save_scenario()
        .withf(|document| document.scenario_name.as_deref() == Some("lab") && document.nodes.len() == 2)
        .times(1)
        .returning(|_| Err(BackendError::rejected(409, "exists")));
    let session = loaded(mock).await;

    let err = session.save_scenario("lab").await.unwrap_err();

    assert_eq!(err, RangeError::Backend(BackendError::rejected(409, "exists")));
}
