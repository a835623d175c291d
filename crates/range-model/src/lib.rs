//! Range Model - entity types for scenario graphs
//!
//! Defines the records the rest of the workspace moves around:
//! - `Instance`: a provisioned virtual machine with a security role
//! - `Edge`: a directed connection between two instances
//! - `Role`: monitor / victim / attack / generic / industrial component
//! - `Scenario`: the named aggregate that is loaded and saved as a whole
//!
//! Everything here is pure data plus validation; no I/O happens in this crate.
//!
//! # Example
//!
//! ```rust
//! use range_model::{derive_role, Role};
//!
//! assert_eq!(derive_role("Monitor-Attack-01"), Role::Monitor);
//! assert_eq!(derive_role("db-server"), Role::Generic);
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod edge;
pub mod error;
pub mod ids;
pub mod industrial;
pub mod instance;
pub mod role;
pub mod scenario;

pub use edge::Edge;
pub use error::ModelError;
pub use ids::{EdgeId, InstanceId};
pub use industrial::IndustrialAttachment;
pub use instance::{Instance, Network, Position, Provisioning, UNKNOWN_IP};
pub use role::{derive_role, IndustrialKind, Role, RoleClassifier, SubstringClassifier};
pub use scenario::Scenario;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
