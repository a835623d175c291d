//! Range Core - editing session over a backend-owned scenario graph
//!
//! A `Session` ties one graph store to one backend and exposes every
//! operator action:
//! - selection with an authoritative tool refresh
//! - tool add, soft remove and confirmed uninstall
//! - the streaming install job, under a session-wide UI lock
//! - scenario load (full overwrite) and save (full snapshot)
//!
//! The backend stays the authority. Local state is an optimistic cache that
//! every selection re-synchronizes, and rendering layers follow the session
//! through `SessionEvent`s.
//!
//! # Example
//!
//! ```rust
//! use range_backend::wire::InstanceRecord;
//! use range_backend::InMemoryBackend;
//! use range_core::{RangeConfig, Session, ViewState};
//! use std::sync::Arc;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> range_core::Result<()> {
//! let backend = InMemoryBackend::new()
//!     .with_instances(vec![InstanceRecord::new("i-1", "victim-1")])
//!     .with_tools("victim-1", ["nmap"]);
//! let session = Session::new(Arc::new(backend), RangeConfig::default());
//!
//! assert_eq!(session.load_infrastructure().await?, ViewState::Loaded);
//! assert_eq!(session.select("victim-1").await?, vec!["nmap".to_string()]);
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod config;
pub mod decoder;
pub mod error;
pub mod events;
pub mod install;
pub mod lock;
pub mod pending;
mod reconcile;
mod selection;
pub mod session;
pub mod tools;

pub use config::{LayoutConfig, RangeConfig, ScenarioConfig, StreamConfig, ENV_BACKEND_URL};
pub use decoder::{parse_exit_code, LineDecoder, FIN_PREFIX};
pub use error::{ErrorKind, RangeError, Result};
pub use events::{GraphSnapshot, LogLine, Notice, NoticeLevel, SessionEvent, ViewState};
pub use install::{CancelToken, InstallReport, JobState, LogCursor};
pub use lock::{UiLock, UiLockGuard};
pub use pending::{OpId, PendingOps, PendingToken};
pub use session::Session;
pub use tools::{Confirmation, UninstallOutcome};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
