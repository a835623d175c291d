//! Range Backend - contract with the infrastructure authority
//!
//! The backend is the source of record for tool lists and scenarios. This
//! crate defines:
//! - `Backend`: the async trait the session talks to
//! - `HttpBackend`: HTTP+JSON client over reqwest
//! - `InMemoryBackend`: in-process authority for offline runs and tests
//! - `wire`: request and response shapes
//!
//! # Example
//!
//! ```rust
//! use range_backend::InMemoryBackend;
//!
//! let backend = InMemoryBackend::new().with_tools("victim-1", ["nmap"]);
//! assert_eq!(backend.tools_of("VICTIM-1"), vec!["nmap".to_string()]);
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod error;
pub mod http;
pub mod memory;
pub mod settings;
pub mod wire;

use async_trait::async_trait;
use futures::stream::BoxStream;

pub use error::{BackendError, Result};
pub use http::HttpBackend;
pub use memory::{InMemoryBackend, Operation};
pub use settings::{BackendSettings, Routes};

use wire::{
    IndustrialScenarioEnvelope, InstanceListing, ScenarioDocument, ToolConfigListing, ToolListing,
    ToolRecordPayload, UninstallRequest, UninstallResponse,
};

/// Raw body chunks of a streamed response, in arrival order
pub type ByteStream = BoxStream<'static, Result<Vec<u8>>>;

/// Remote infrastructure authority
///
/// Every call is a suspension point; no call has an implicit timeout.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Provisioned instances
    async fn list_instances(&self) -> Result<InstanceListing>;

    /// Tools on record for an instance, looked up by name
    async fn fetch_tools(&self, instance: &str) -> Result<ToolListing>;

    /// Persist the full instance record including its tool list
    async fn persist_tools(&self, record: &ToolRecordPayload) -> Result<()>;

    /// Remove a tool from the real instance
    async fn uninstall_tool(&self, request: &UninstallRequest) -> Result<UninstallResponse>;

    /// Start the install job and stream its output
    ///
    /// A non-success status is returned as `Rejected` before any chunk.
    async fn install_all(&self) -> Result<ByteStream>;

    /// Saved scenario by name
    async fn fetch_scenario(&self, name: &str) -> Result<ScenarioDocument>;

    /// Save a full scenario snapshot
    async fn save_scenario(&self, document: &ScenarioDocument) -> Result<()>;

    /// Save a full industrial overlay snapshot
    async fn save_industrial_scenario(&self, envelope: &IndustrialScenarioEnvelope) -> Result<()>;

    /// Every persisted tool record
    async fn read_tool_configs(&self) -> Result<ToolConfigListing>;
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
