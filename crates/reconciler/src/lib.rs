//! Reconciliation core for Cosmos DB MongoDB databases.
//!
//! This crate manages the lifecycle of one MongoDB database inside a Cosmos DB
//! account by reconciling a declared configuration against the remote control
//! plane:
//!
//! - **Identifier codec** ([`id`]): builds and parses resource IDs
//! - **Capacity policy** ([`capacity`]): fixed throughput vs autoscale
//! - **Schema migrator** ([`migration`]): upgrades persisted state
//! - **Reconciler** ([`reconciler`]): the create/read/update/delete state
//!   machine, talking to the remote through [`RemoteClient`]
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use cosmosdb_mongo_reconciler::{
//!     AccountEntry, Capacity, DatabaseAccountId, DesiredConfig, InMemoryControlPlane,
//!     OperationContext, ReconcilerBuilder,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let plane = InMemoryControlPlane::new_arc();
//!     plane
//!         .add_account(&DatabaseAccountId::new("sub", "rg1", "acct1"), AccountEntry::provisioned())
//!         .await;
//!
//!     let reconciler = ReconcilerBuilder::new()
//!         .with_client(plane)
//!         .subscription_id("sub")
//!         .build()?;
//!
//!     let desired = DesiredConfig::new("orders", "rg1", "acct1").with_capacity(Capacity::Fixed(400));
//!     let ctx = OperationContext::with_deadline(Duration::from_secs(60));
//!     let state = reconciler.create(&desired, &ctx).await?;
//!     assert_eq!(state.throughput, Some(400));
//!     Ok(())
//! }
//! ```

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![forbid(clippy::panic)]

pub mod capacity;
pub mod client;
pub mod context;
pub mod error;
pub mod id;
pub mod memory;
pub mod migration;
pub mod reconciler;
pub mod state;
pub mod validate;

// Re-export main types
pub use capacity::{AutoscaleSettings, Capacity, CapacityMode};
pub use client::{
    CreateUpdateOptions, CreateUpdateParameters, DatabaseAccount, MongoDatabaseRecord, Poller,
    RemoteClient, RemoteError, RemoteResult, ThroughputSettings, ThroughputUpdate,
};
pub use context::{Canceller, OperationContext, Timeouts};
pub use error::{Error, ErrorKind, RemoteOperation, Result};
pub use id::{DatabaseAccountId, MongoDatabaseId};
pub use memory::{AccountEntry, ControlPlaneSnapshot, DatabaseEntry, InMemoryControlPlane, RemoteCall};
pub use migration::{CURRENT_SCHEMA_VERSION, RawState};
pub use reconciler::{Reconciler, ReconcilerBuilder, ReconcilerConfig};
pub use state::{DatabaseConfig, DesiredConfig, PersistedState, ReadOutcome};
