//! The seam to the remote control plane.
//!
//! Transport, authentication and retry/backoff live behind [`RemoteClient`];
//! the reconciler only sees typed results where "not found" is a first-class
//! [`RemoteError::NotFound`] rather than a status code to inspect.

use std::fmt;

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::capacity::AutoscaleSettings;
use crate::id::{DatabaseAccountId, MongoDatabaseId};

/// Result type for calls against the remote control plane.
pub type RemoteResult<T> = std::result::Result<T, RemoteError>;

/// Failure reported by the remote control plane or its client.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RemoteError {
    #[error("resource was not found")]
    NotFound,

    #[error("remote API returned status {status}: {message}")]
    Api { status: u16, message: String },

    #[error("transport failure: {reason}")]
    Transport { reason: String },
}

impl RemoteError {
    /// Create an API error.
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// Create a transport error.
    pub fn transport(reason: impl Into<String>) -> Self {
        Self::Transport {
            reason: reason.into(),
        }
    }
}

/// The control plane's view of a MongoDB database.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MongoDatabaseRecord {
    /// Canonical resource ID assigned by the remote.
    pub id: Option<String>,
    /// Database name as stored in the resource block.
    pub name: Option<String>,
}

/// Options sent alongside a create/update request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateUpdateOptions {
    pub throughput: Option<i64>,
    pub autoscale_settings: Option<AutoscaleSettings>,
}

/// Body of a create/update request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateUpdateParameters {
    /// Name of the database resource; always present.
    pub resource_name: String,
    pub options: CreateUpdateOptions,
}

impl CreateUpdateParameters {
    /// Parameters with no capacity options.
    pub fn new(resource_name: impl Into<String>) -> Self {
        Self {
            resource_name: resource_name.into(),
            options: CreateUpdateOptions::default(),
        }
    }
}

/// Dedicated throughput of a database as reported by the remote.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThroughputSettings {
    pub throughput: Option<i64>,
    pub autoscale_settings: Option<AutoscaleSettings>,
}

/// Body of a throughput update; exactly one field is set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ThroughputUpdate {
    Manual { throughput: i64 },
    Autoscale { settings: AutoscaleSettings },
}

/// Capability flag that marks an account as serverless.
pub const SERVERLESS_CAPABILITY: &str = "EnableServerless";

/// The owning database account.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseAccount {
    pub id: Option<String>,
    #[serde(default)]
    pub capabilities: Vec<String>,
}

impl DatabaseAccount {
    /// Serverless accounts do not support per-database throughput queries.
    #[must_use]
    pub fn is_serverless(&self) -> bool {
        self.capabilities
            .iter()
            .any(|c| c.eq_ignore_ascii_case(SERVERLESS_CAPABILITY))
    }
}

/// Handle to a long-running remote operation.
///
/// Polling to completion is the client's business; callers only await
/// [`Poller::wait`].
pub struct Poller {
    completion: BoxFuture<'static, RemoteResult<()>>,
}

impl Poller {
    /// Wrap a future that resolves once the remote operation finishes.
    pub fn new<F>(completion: F) -> Self
    where
        F: std::future::Future<Output = RemoteResult<()>> + Send + 'static,
    {
        Self {
            completion: completion.boxed(),
        }
    }

    /// A poller for an operation that already finished.
    #[must_use]
    pub fn completed() -> Self {
        Self::new(futures::future::ready(Ok(())))
    }

    /// A poller whose operation finished with an error.
    #[must_use]
    pub fn failed(err: RemoteError) -> Self {
        Self::new(futures::future::ready(Err(err)))
    }

    /// Block until the remote reports completion.
    pub async fn wait(self) -> RemoteResult<()> {
        self.completion.await
    }
}

impl fmt::Debug for Poller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Poller").finish_non_exhaustive()
    }
}

/// Operations the reconciler needs from the remote control plane.
#[async_trait]
pub trait RemoteClient: Send + Sync {
    /// Fetch a database by identity.
    async fn get_database(&self, id: &MongoDatabaseId) -> RemoteResult<MongoDatabaseRecord>;

    /// Create or update (idempotent upsert) a database.
    async fn create_update_database(
        &self,
        id: &MongoDatabaseId,
        parameters: CreateUpdateParameters,
    ) -> RemoteResult<Poller>;

    /// Fetch the dedicated throughput of a database.
    async fn get_throughput(&self, id: &MongoDatabaseId) -> RemoteResult<ThroughputSettings>;

    /// Replace the dedicated throughput of a database.
    async fn update_throughput(
        &self,
        id: &MongoDatabaseId,
        update: ThroughputUpdate,
    ) -> RemoteResult<Poller>;

    /// Switch a manually provisioned database to autoscale.
    async fn migrate_to_autoscale(&self, id: &MongoDatabaseId) -> RemoteResult<Poller>;

    /// Switch an autoscale database to manually provisioned throughput.
    async fn migrate_to_manual_throughput(&self, id: &MongoDatabaseId) -> RemoteResult<Poller>;

    /// Delete a database.
    async fn delete_database(&self, id: &MongoDatabaseId) -> RemoteResult<Poller>;

    /// Fetch the owning account.
    async fn get_account(&self, id: &DatabaseAccountId) -> RemoteResult<DatabaseAccount>;
}
