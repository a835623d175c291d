//! Range Graph - invariant-preserving store for scenario graphs
//!
//! `GraphStore` owns the instances and edges of one editing session.
//! Every mutation either succeeds with all invariants intact or fails
//! leaving the store untouched:
//! - edges only reference present instances
//! - one edge per ordered `(source, target)` pair
//! - industrial components link to a present base through exactly one edge
//! - base instances cannot be deleted from the industrial overlay
//!
//! # Example
//!
//! ```rust
//! use range_graph::{GraphStore, Removal};
//! use range_model::{IndustrialKind, Instance};
//!
//! let mut store = GraphStore::new();
//! store.add_instance(Instance::from_name("v1", "victim-1")).unwrap();
//! let plc = store
//!     .attach_industrial(IndustrialKind::new("plc").unwrap(), &"v1".into(), 120.0)
//!     .unwrap()
//!     .id
//!     .clone();
//!
//! assert_eq!(store.edge_count(), 1);
//! assert!(store.remove_instance(&"v1".into(), Removal::Direct).is_err());
//! assert!(store.remove_instance(&plc, Removal::Direct).is_ok());
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod error;
mod invariants;
pub mod store;

pub use error::GraphError;
pub use store::{GraphStore, Removal, RemovedElements, ReplaceReport};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
