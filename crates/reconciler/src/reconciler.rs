//! Reconciler implementation.
//!
//! Drives a single Mongo database through its lifecycle:
//!
//! ```text
//! Absent -> Creating -> Present -> Updating -> Present -> Deleting -> Absent
//!                          \___________ vanished out-of-band ________/
//! ```
//!
//! Each operation takes an [`OperationContext`] and runs to completion or
//! fails as a whole; nothing is persisted on failure.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::capacity::{self, Capacity, CapacityMode};
use crate::client::{CreateUpdateParameters, RemoteClient, RemoteError};
use crate::context::{OperationContext, Timeouts};
use crate::error::{Error, RemoteOperation, Result};
use crate::id::MongoDatabaseId;
use crate::state::{DesiredConfig, PersistedState, ReadOutcome};

/// Configuration for the reconciler.
#[derive(Debug, Clone, Default)]
pub struct ReconcilerConfig {
    /// Subscription the managed databases live in.
    pub subscription_id: String,
    /// Default deadlines for building operation contexts.
    pub timeouts: Timeouts,
}

/// Reconciles a Mongo database against the remote control plane.
pub struct Reconciler {
    client: Arc<dyn RemoteClient>,
    config: ReconcilerConfig,
}

impl Reconciler {
    /// Create a new reconciler.
    pub fn new(client: Arc<dyn RemoteClient>, config: ReconcilerConfig) -> Self {
        Self { client, config }
    }

    /// Get the configuration.
    pub fn config(&self) -> &ReconcilerConfig {
        &self.config
    }

    /// Create the database described by `desired`.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::AlreadyExists`] if the database is already there,
    /// with [`Error::InvalidConfig`] for an autoscale block without a ceiling,
    /// with [`Error::InvariantViolation`] if the remote does not hand back a
    /// canonical ID, and with a wrapped remote error otherwise.
    pub async fn create(
        &self,
        desired: &DesiredConfig,
        ctx: &OperationContext,
    ) -> Result<PersistedState> {
        ctx.run("create", self.create_inner(desired)).await
    }

    /// Apply `desired` to a database previously recorded as `prior`.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::MalformedIdentifier`] for a corrupt `prior.id`,
    /// with [`Error::ConflictingCapacityMode`] on a direct manual/autoscale
    /// crossover, with [`Error::ThroughputNotConfigurable`] when throughput is
    /// added to a database created without any, and with a wrapped remote
    /// error otherwise.
    pub async fn update(
        &self,
        prior: &PersistedState,
        desired: &DesiredConfig,
        ctx: &OperationContext,
    ) -> Result<PersistedState> {
        ctx.run("update", self.update_inner(prior, desired)).await
    }

    /// Refresh state for `id` from the remote.
    ///
    /// A database that no longer exists yields [`ReadOutcome::Absent`].
    ///
    /// # Errors
    ///
    /// Any failure other than the database being gone. The caller's existing
    /// state must be kept in that case.
    pub async fn read(&self, id: &str, ctx: &OperationContext) -> Result<ReadOutcome> {
        ctx.run("read", async {
            let id = MongoDatabaseId::parse(id)?;
            self.read_inner(&id).await
        })
        .await
    }

    /// Adopt an existing database into state.
    ///
    /// # Errors
    ///
    /// Unlike [`Reconciler::read`], a missing database is an error here.
    pub async fn import(&self, id: &str, ctx: &OperationContext) -> Result<PersistedState> {
        ctx.run("import", async {
            let id = MongoDatabaseId::parse(id)?;
            match self.read_inner(&id).await? {
                ReadOutcome::Present(state) => {
                    info!(id = %id, "Imported Cosmos Mongo Database");
                    Ok(state)
                }
                ReadOutcome::Absent => Err(remote_error(RemoteOperation::Get, &id)(
                    RemoteError::NotFound,
                )),
            }
        })
        .await
    }

    /// Delete the database at `id`. Already-deleted is success.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::MalformedIdentifier`] for a corrupt `id` and with a
    /// wrapped remote error if the delete or its completion fails.
    pub async fn delete(&self, id: &str, ctx: &OperationContext) -> Result<()> {
        ctx.run("delete", async {
            let id = MongoDatabaseId::parse(id)?;
            self.delete_inner(&id).await
        })
        .await
    }

    /// Switch the throughput mode of the database at `id`.
    ///
    /// This is the first half of a manual/autoscale crossover; a following
    /// [`Reconciler::update`] applies the values of the new mode.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::ThroughputNotConfigurable`] if the database has no
    /// dedicated throughput, and with a wrapped remote error otherwise.
    pub async fn migrate_capacity(
        &self,
        id: &str,
        target: CapacityMode,
        ctx: &OperationContext,
    ) -> Result<PersistedState> {
        ctx.run("migrate_capacity", async {
            let id = MongoDatabaseId::parse(id)?;
            self.migrate_capacity_inner(&id, target).await
        })
        .await
    }

    async fn create_inner(&self, desired: &DesiredConfig) -> Result<PersistedState> {
        if desired.capacity.is_autoscale_without_max() {
            return Err(Error::invalid_config(
                "autoscale_settings.max_throughput",
                "is required when creating a database with autoscale",
            ));
        }

        let id = desired.id(&self.config.subscription_id);
        info!(
            database = %id.name,
            account = %id.account_name,
            resource_group = %id.resource_group,
            "Creating Cosmos Mongo Database"
        );

        match self.client.get_database(&id).await {
            Ok(existing) => {
                let existing_id = canonical_id(existing.id, &id, "generating import ID")?;
                warn!(id = %existing_id, "Cosmos Mongo Database already exists");
                return Err(Error::already_exists(existing_id));
            }
            Err(RemoteError::NotFound) => {}
            Err(e) => return Err(remote_error(RemoteOperation::CheckExisting, &id)(e)),
        }

        let parameters = CreateUpdateParameters {
            options: desired.capacity.to_create_options(),
            ..CreateUpdateParameters::new(&id.name)
        };
        debug!(options = ?parameters.options, "Submitting create request");

        self.client
            .create_update_database(&id, parameters)
            .await
            .map_err(remote_error(RemoteOperation::IssueCreateUpdate, &id))?
            .wait()
            .await
            .map_err(remote_error(RemoteOperation::WaitCreateUpdate, &id))?;

        let record = self
            .client
            .get_database(&id)
            .await
            .map_err(remote_error(RemoteOperation::Get, &id))?;
        let canonical = canonical_id(record.id, &id, "getting ID after create")?;
        let canonical = MongoDatabaseId::parse(&canonical)?;
        info!(id = %canonical, "Created Cosmos Mongo Database");

        self.refresh_after_write(&canonical, "create").await
    }

    async fn update_inner(
        &self,
        prior: &PersistedState,
        desired: &DesiredConfig,
    ) -> Result<PersistedState> {
        let id = MongoDatabaseId::parse(&prior.id)?;
        ensure_immutable_fields(&id, desired)?;

        let prior_capacity = prior.capacity();
        capacity::check_mode_transition(
            &id.name,
            &id.account_name,
            &prior_capacity,
            &desired.capacity,
        )?;

        info!(database = %id.name, account = %id.account_name, "Updating Cosmos Mongo Database");

        // Capacity goes through the dedicated throughput call below.
        self.client
            .create_update_database(&id, CreateUpdateParameters::new(&id.name))
            .await
            .map_err(remote_error(RemoteOperation::IssueCreateUpdate, &id))?
            .wait()
            .await
            .map_err(remote_error(RemoteOperation::WaitCreateUpdate, &id))?;

        let throughput_update = capacity::has_throughput_change(&prior_capacity, &desired.capacity)
            .then(|| desired.capacity.to_update_payload())
            .flatten();

        if let Some(update) = throughput_update {
            debug!(update = ?update, "Updating throughput");
            let poller = match self.client.update_throughput(&id, update).await {
                Ok(poller) => poller,
                Err(RemoteError::NotFound) => {
                    return Err(Error::ThroughputNotConfigurable {
                        database: id.name.clone(),
                        account: id.account_name.clone(),
                        source: RemoteError::NotFound,
                    });
                }
                Err(e) => return Err(remote_error(RemoteOperation::IssueThroughputUpdate, &id)(e)),
            };
            poller
                .wait()
                .await
                .map_err(remote_error(RemoteOperation::WaitThroughputUpdate, &id))?;
        }

        self.client
            .get_database(&id)
            .await
            .map_err(remote_error(RemoteOperation::Get, &id))?;

        self.refresh_after_write(&id, "update").await
    }

    async fn read_inner(&self, id: &MongoDatabaseId) -> Result<ReadOutcome> {
        let record = match self.client.get_database(id).await {
            Ok(record) => record,
            Err(RemoteError::NotFound) => {
                info!(
                    database = %id.name,
                    account = %id.account_name,
                    "Cosmos Mongo Database not found - removing from state"
                );
                return Ok(ReadOutcome::Absent);
            }
            Err(e) => return Err(remote_error(RemoteOperation::Get, id)(e)),
        };

        let mut state = PersistedState::from_id(id);
        if let Some(name) = record.name {
            state.name = name;
        }

        let account_id = id.account_id();
        let account = self
            .client
            .get_account(&account_id)
            .await
            .map_err(remote_error(RemoteOperation::GetAccount, id))?;
        if account.id.as_deref().is_none_or(str::is_empty) {
            return Err(Error::invariant_violation(format!(
                "Cosmos DB Account {:?} (Resource Group {:?}) has an empty ID",
                account_id.name, account_id.resource_group
            )));
        }

        let observed = if account.is_serverless() {
            debug!(account = %account_id.name, "Serverless account - skipping throughput lookup");
            Capacity::Unset
        } else {
            match self.client.get_throughput(id).await {
                Ok(settings) => Capacity::from_remote(&settings),
                Err(RemoteError::NotFound) => Capacity::Unset,
                Err(source) => {
                    return Err(Error::RemoteReadFailure {
                        database: id.name.clone(),
                        account: id.account_name.clone(),
                        source,
                    });
                }
            }
        };
        state.set_capacity(&observed);

        debug!(id = %state.id, throughput = ?state.throughput, "Read Cosmos Mongo Database");
        Ok(ReadOutcome::Present(state))
    }

    async fn delete_inner(&self, id: &MongoDatabaseId) -> Result<()> {
        info!(database = %id.name, account = %id.account_name, "Deleting Cosmos Mongo Database");

        let poller = match self.client.delete_database(id).await {
            Ok(poller) => poller,
            Err(RemoteError::NotFound) => {
                info!(database = %id.name, "Cosmos Mongo Database already deleted");
                return Ok(());
            }
            Err(e) => return Err(remote_error(RemoteOperation::Delete, id)(e)),
        };

        match poller.wait().await {
            Ok(()) | Err(RemoteError::NotFound) => {
                info!(database = %id.name, "Deleted Cosmos Mongo Database");
                Ok(())
            }
            Err(e) => Err(remote_error(RemoteOperation::WaitDelete, id)(e)),
        }
    }

    async fn migrate_capacity_inner(
        &self,
        id: &MongoDatabaseId,
        target: CapacityMode,
    ) -> Result<PersistedState> {
        info!(
            database = %id.name,
            account = %id.account_name,
            target = %target,
            "Migrating throughput mode"
        );

        let issued = match target {
            CapacityMode::Autoscale => self.client.migrate_to_autoscale(id).await,
            CapacityMode::Manual => self.client.migrate_to_manual_throughput(id).await,
        };
        let poller = match issued {
            Ok(poller) => poller,
            Err(RemoteError::NotFound) => {
                return Err(Error::ThroughputNotConfigurable {
                    database: id.name.clone(),
                    account: id.account_name.clone(),
                    source: RemoteError::NotFound,
                });
            }
            Err(e) => return Err(remote_error(RemoteOperation::IssueThroughputMigration, id)(e)),
        };
        poller
            .wait()
            .await
            .map_err(remote_error(RemoteOperation::WaitThroughputMigration, id))?;

        self.refresh_after_write(id, "migrate_capacity").await
    }

    /// Read back a database that was just written; it has to be there.
    async fn refresh_after_write(
        &self,
        id: &MongoDatabaseId,
        operation: &str,
    ) -> Result<PersistedState> {
        match self.read_inner(id).await? {
            ReadOutcome::Present(state) => Ok(state),
            ReadOutcome::Absent => Err(Error::invariant_violation(format!(
                "Cosmos Mongo Database {id} was not found right after {operation}"
            ))),
        }
    }
}

/// Wrap a remote failure with the database it concerns.
fn remote_error(
    operation: RemoteOperation,
    id: &MongoDatabaseId,
) -> impl FnOnce(RemoteError) -> Error + '_ {
    move |source| Error::remote(operation, &id.name, &id.account_name, source)
}

fn canonical_id(raw: Option<String>, id: &MongoDatabaseId, action: &str) -> Result<String> {
    raw.filter(|value| !value.is_empty()).ok_or_else(|| {
        Error::invariant_violation(format!(
            "{action} for Cosmos Mongo Database {:?} (Account: {:?}): remote returned an empty ID",
            id.name, id.account_name
        ))
    })
}

fn ensure_immutable_fields(id: &MongoDatabaseId, desired: &DesiredConfig) -> Result<()> {
    let fields = [
        ("name", id.name.as_str(), desired.name.as_str()),
        (
            "resource_group_name",
            id.resource_group.as_str(),
            desired.resource_group_name.as_str(),
        ),
        (
            "account_name",
            id.account_name.as_str(),
            desired.account_name.as_str(),
        ),
    ];
    match fields.iter().find(|(_, current, wanted)| current != wanted) {
        Some((field, current, wanted)) => Err(Error::invalid_config(
            *field,
            format!("cannot change from {current:?} to {wanted:?}; the database must be replaced"),
        )),
        None => Ok(()),
    }
}

/// Builder for Reconciler.
pub struct ReconcilerBuilder {
    client: Option<Arc<dyn RemoteClient>>,
    config: ReconcilerConfig,
}

impl ReconcilerBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self {
            client: None,
            config: ReconcilerConfig::default(),
        }
    }

    /// Set the remote client.
    pub fn with_client(mut self, client: Arc<dyn RemoteClient>) -> Self {
        self.client = Some(client);
        self
    }

    /// Set the configuration.
    pub fn with_config(mut self, config: ReconcilerConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the subscription.
    pub fn subscription_id(mut self, subscription_id: impl Into<String>) -> Self {
        self.config.subscription_id = subscription_id.into();
        self
    }

    /// Set the default deadlines.
    pub fn timeouts(mut self, timeouts: Timeouts) -> Self {
        self.config.timeouts = timeouts;
        self
    }

    /// Build the reconciler.
    pub fn build(self) -> Result<Reconciler> {
        let client = self
            .client
            .ok_or_else(|| Error::invalid_config("client", "a remote client is required"))?;

        if self.config.subscription_id.trim().is_empty() {
            return Err(Error::invalid_config(
                "subscription_id",
                "must not be empty",
            ));
        }
        self.config.timeouts.validate()?;

        Ok(Reconciler::new(client, self.config))
    }
}

impl Default for ReconcilerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
