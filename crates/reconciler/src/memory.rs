//! In-memory control plane.
//!
//! Implements [`RemoteClient`] against process-local state, with the same
//! not-found, serverless and throughput-retrofit behavior as the real remote.
//! Faults can be injected per call, and every call is logged so tests can
//! assert which requests were (or were not) issued.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::capacity::AutoscaleSettings;
use crate::client::{
    CreateUpdateParameters, DatabaseAccount, MongoDatabaseRecord, Poller, RemoteClient,
    RemoteError, RemoteResult, SERVERLESS_CAPABILITY, ThroughputSettings, ThroughputUpdate,
};
use crate::id::{DatabaseAccountId, MongoDatabaseId};

/// Identifies a [`RemoteClient`] method in the call log and fault table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemoteCall {
    GetDatabase,
    CreateUpdateDatabase,
    GetThroughput,
    UpdateThroughput,
    MigrateToAutoscale,
    MigrateToManualThroughput,
    DeleteDatabase,
    GetAccount,
}

/// A stored account.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountEntry {
    #[serde(default)]
    pub capabilities: Vec<String>,
}

impl AccountEntry {
    /// A provisioned-throughput account.
    #[must_use]
    pub fn provisioned() -> Self {
        Self::default()
    }

    /// A serverless account.
    #[must_use]
    pub fn serverless() -> Self {
        Self {
            capabilities: vec![SERVERLESS_CAPABILITY.to_string()],
        }
    }

    fn is_serverless(&self) -> bool {
        self.capabilities
            .iter()
            .any(|c| c.eq_ignore_ascii_case(SERVERLESS_CAPABILITY))
    }
}

/// A stored database with its dedicated throughput, if any.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseEntry {
    pub name: String,
    #[serde(default)]
    pub throughput: Option<i64>,
    #[serde(default)]
    pub autoscale_settings: Option<AutoscaleSettings>,
}

impl DatabaseEntry {
    fn has_dedicated_throughput(&self) -> bool {
        self.throughput.is_some() || self.autoscale_settings.is_some()
    }
}

/// Serializable contents of the control plane, keyed by resource ID.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlPlaneSnapshot {
    #[serde(default)]
    pub accounts: BTreeMap<String, AccountEntry>,
    #[serde(default)]
    pub databases: BTreeMap<String, DatabaseEntry>,
}

#[derive(Default)]
struct Faults {
    on_call: HashMap<RemoteCall, RemoteError>,
    on_completion: HashMap<RemoteCall, RemoteError>,
    completion_delay: HashMap<RemoteCall, Duration>,
    blank_ids: HashSet<RemoteCall>,
}

/// In-memory [`RemoteClient`] for tests and local emulation.
#[derive(Default)]
pub struct InMemoryControlPlane {
    snapshot: RwLock<ControlPlaneSnapshot>,
    faults: RwLock<Faults>,
    calls: RwLock<Vec<RemoteCall>>,
}

impl InMemoryControlPlane {
    /// Create an empty control plane.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty control plane wrapped in an Arc.
    pub fn new_arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Restore a control plane from a snapshot.
    pub fn from_snapshot(snapshot: ControlPlaneSnapshot) -> Self {
        Self {
            snapshot: RwLock::new(snapshot),
            ..Self::default()
        }
    }

    /// Copy of the current contents.
    pub async fn snapshot(&self) -> ControlPlaneSnapshot {
        self.snapshot.read().await.clone()
    }

    /// Register an account.
    pub async fn add_account(&self, id: &DatabaseAccountId, entry: AccountEntry) {
        self.snapshot
            .write()
            .await
            .accounts
            .insert(id.to_string(), entry);
    }

    /// Current stored database, if any.
    pub async fn database(&self, id: &MongoDatabaseId) -> Option<DatabaseEntry> {
        self.snapshot
            .read()
            .await
            .databases
            .get(&id.to_string())
            .cloned()
    }

    /// Remove a database behind the reconciler's back.
    pub async fn remove_database(&self, id: &MongoDatabaseId) -> Option<DatabaseEntry> {
        self.snapshot
            .write()
            .await
            .databases
            .remove(&id.to_string())
    }

    /// Make the next `call` fail with `err` before doing anything.
    pub async fn fail_next(&self, call: RemoteCall, err: RemoteError) {
        self.faults.write().await.on_call.insert(call, err);
    }

    /// Make the next long-running `call` report `err` from its poller.
    pub async fn fail_completion(&self, call: RemoteCall, err: RemoteError) {
        self.faults.write().await.on_completion.insert(call, err);
    }

    /// Delay completion of every long-running `call`.
    pub async fn delay_completion(&self, call: RemoteCall, delay: Duration) {
        self.faults.write().await.completion_delay.insert(call, delay);
    }

    /// Make every `GetDatabase` or `GetAccount` response carry a blank ID.
    pub async fn blank_ids(&self, call: RemoteCall) {
        self.faults.write().await.blank_ids.insert(call);
    }

    /// Every call issued so far, in order.
    pub async fn calls(&self) -> Vec<RemoteCall> {
        self.calls.read().await.clone()
    }

    /// Number of times `call` was issued.
    pub async fn call_count(&self, call: RemoteCall) -> usize {
        self.calls.read().await.iter().filter(|c| **c == call).count()
    }

    async fn enter(&self, call: RemoteCall) -> RemoteResult<()> {
        self.calls.write().await.push(call);
        match self.faults.write().await.on_call.remove(&call) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn poller(&self, call: RemoteCall) -> Poller {
        let mut faults = self.faults.write().await;
        let outcome = faults.on_completion.remove(&call).map_or(Ok(()), Err);
        match faults.completion_delay.get(&call).copied() {
            Some(delay) => Poller::new(async move {
                tokio::time::sleep(delay).await;
                outcome
            }),
            None => Poller::new(futures::future::ready(outcome)),
        }
    }

    async fn reported_id(&self, call: RemoteCall, id: String) -> Option<String> {
        if self.faults.read().await.blank_ids.contains(&call) {
            None
        } else {
            Some(id)
        }
    }

    fn account_of<'a>(
        snapshot: &'a ControlPlaneSnapshot,
        id: &MongoDatabaseId,
    ) -> RemoteResult<&'a AccountEntry> {
        snapshot
            .accounts
            .get(&id.account_id().to_string())
            .ok_or(RemoteError::NotFound)
    }
}

#[async_trait]
impl RemoteClient for InMemoryControlPlane {
    async fn get_database(&self, id: &MongoDatabaseId) -> RemoteResult<MongoDatabaseRecord> {
        self.enter(RemoteCall::GetDatabase).await?;
        let snapshot = self.snapshot.read().await;
        Self::account_of(&snapshot, id)?;
        let name = snapshot
            .databases
            .get(&id.to_string())
            .ok_or(RemoteError::NotFound)?
            .name
            .clone();
        drop(snapshot);
        Ok(MongoDatabaseRecord {
            id: self
                .reported_id(RemoteCall::GetDatabase, id.to_string())
                .await,
            name: Some(name),
        })
    }

    async fn create_update_database(
        &self,
        id: &MongoDatabaseId,
        parameters: CreateUpdateParameters,
    ) -> RemoteResult<Poller> {
        self.enter(RemoteCall::CreateUpdateDatabase).await?;
        {
            let mut snapshot = self.snapshot.write().await;
            let serverless = Self::account_of(&snapshot, id)?.is_serverless();
            let options = parameters.options;
            let wants_throughput =
                options.throughput.is_some() || options.autoscale_settings.is_some();

            if wants_throughput && serverless {
                return Err(RemoteError::api(
                    400,
                    "Setting offer throughput or autopilot on resource is not supported for serverless accounts",
                ));
            }
            if options.throughput.is_some() && options.autoscale_settings.is_some() {
                return Err(RemoteError::api(
                    400,
                    "Only one of throughput or autoscale settings may be specified",
                ));
            }

            match snapshot.databases.get_mut(&id.to_string()) {
                Some(existing) => {
                    existing.name = parameters.resource_name;
                    if wants_throughput {
                        existing.throughput = options.throughput;
                        existing.autoscale_settings = options.autoscale_settings;
                    }
                }
                None => {
                    snapshot.databases.insert(
                        id.to_string(),
                        DatabaseEntry {
                            name: parameters.resource_name,
                            throughput: options.throughput,
                            autoscale_settings: options.autoscale_settings,
                        },
                    );
                }
            }
        }
        Ok(self.poller(RemoteCall::CreateUpdateDatabase).await)
    }

    async fn get_throughput(&self, id: &MongoDatabaseId) -> RemoteResult<ThroughputSettings> {
        self.enter(RemoteCall::GetThroughput).await?;
        let snapshot = self.snapshot.read().await;
        if Self::account_of(&snapshot, id)?.is_serverless() {
            return Err(RemoteError::api(
                400,
                "Reading or replacing offers is not supported for serverless accounts",
            ));
        }
        let entry = snapshot
            .databases
            .get(&id.to_string())
            .filter(|e| e.has_dedicated_throughput())
            .ok_or(RemoteError::NotFound)?;
        // Autoscale offers also report their current scaled throughput,
        // which idles at a tenth of the ceiling.
        let scaled = entry
            .autoscale_settings
            .as_ref()
            .and_then(|a| a.max_throughput)
            .map(|max| max / 10);
        Ok(ThroughputSettings {
            throughput: entry.throughput.or(scaled),
            autoscale_settings: entry.autoscale_settings.clone(),
        })
    }

    async fn update_throughput(
        &self,
        id: &MongoDatabaseId,
        update: ThroughputUpdate,
    ) -> RemoteResult<Poller> {
        self.enter(RemoteCall::UpdateThroughput).await?;
        {
            let mut snapshot = self.snapshot.write().await;
            Self::account_of(&snapshot, id)?;
            let entry = snapshot
                .databases
                .get_mut(&id.to_string())
                .filter(|e| e.has_dedicated_throughput())
                .ok_or(RemoteError::NotFound)?;

            match update {
                ThroughputUpdate::Manual { throughput } if entry.throughput.is_some() => {
                    entry.throughput = Some(throughput);
                }
                ThroughputUpdate::Autoscale { settings } if entry.autoscale_settings.is_some() => {
                    entry.autoscale_settings = Some(settings);
                }
                _ => {
                    return Err(RemoteError::api(
                        400,
                        "Throughput mode does not match the offer; migrate the offer first",
                    ));
                }
            }
        }
        Ok(self.poller(RemoteCall::UpdateThroughput).await)
    }

    async fn migrate_to_autoscale(&self, id: &MongoDatabaseId) -> RemoteResult<Poller> {
        self.enter(RemoteCall::MigrateToAutoscale).await?;
        {
            let mut snapshot = self.snapshot.write().await;
            Self::account_of(&snapshot, id)?;
            let entry = snapshot
                .databases
                .get_mut(&id.to_string())
                .filter(|e| e.has_dedicated_throughput())
                .ok_or(RemoteError::NotFound)?;
            if let Some(throughput) = entry.throughput.take() {
                let max = throughput.saturating_mul(10).max(4000);
                entry.autoscale_settings = Some(AutoscaleSettings::with_max_throughput(max));
            }
        }
        Ok(self.poller(RemoteCall::MigrateToAutoscale).await)
    }

    async fn migrate_to_manual_throughput(&self, id: &MongoDatabaseId) -> RemoteResult<Poller> {
        self.enter(RemoteCall::MigrateToManualThroughput).await?;
        {
            let mut snapshot = self.snapshot.write().await;
            Self::account_of(&snapshot, id)?;
            let entry = snapshot
                .databases
                .get_mut(&id.to_string())
                .filter(|e| e.has_dedicated_throughput())
                .ok_or(RemoteError::NotFound)?;
            if let Some(settings) = entry.autoscale_settings.take() {
                let max = settings.max_throughput.unwrap_or(4000);
                entry.throughput = Some((max / 10).max(400));
            }
        }
        Ok(self.poller(RemoteCall::MigrateToManualThroughput).await)
    }

    async fn delete_database(&self, id: &MongoDatabaseId) -> RemoteResult<Poller> {
        self.enter(RemoteCall::DeleteDatabase).await?;
        self.snapshot
            .write()
            .await
            .databases
            .remove(&id.to_string())
            .ok_or(RemoteError::NotFound)?;
        Ok(self.poller(RemoteCall::DeleteDatabase).await)
    }

    async fn get_account(&self, id: &DatabaseAccountId) -> RemoteResult<DatabaseAccount> {
        self.enter(RemoteCall::GetAccount).await?;
        let snapshot = self.snapshot.read().await;
        let capabilities = snapshot
            .accounts
            .get(&id.to_string())
            .ok_or(RemoteError::NotFound)?
            .capabilities
            .clone();
        drop(snapshot);
        let reported = self
            .reported_id(RemoteCall::GetAccount, id.to_string())
            .await
            .unwrap_or_default();
        Ok(DatabaseAccount {
            id: Some(reported),
            capabilities,
        })
    }
}
