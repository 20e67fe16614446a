//! Desired configuration and persisted state.

use serde::{Deserialize, Serialize};

use crate::capacity::{AutoscaleSettings, Capacity};
use crate::error::{Error, Result};
use crate::id::MongoDatabaseId;
use crate::migration::{self, RawState};
use crate::validate;

/// Raw configuration as written by the user.
///
/// Converted into a [`DesiredConfig`] with [`DesiredConfig::try_from`], which
/// runs every validator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub name: String,
    pub resource_group_name: String,
    pub account_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub throughput: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub autoscale_settings: Option<AutoscaleSettings>,
}

/// Validated desired configuration for one database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesiredConfig {
    pub name: String,
    pub resource_group_name: String,
    pub account_name: String,
    pub capacity: Capacity,
}

impl DesiredConfig {
    /// Desired configuration with no dedicated capacity.
    pub fn new(
        name: impl Into<String>,
        resource_group_name: impl Into<String>,
        account_name: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            resource_group_name: resource_group_name.into(),
            account_name: account_name.into(),
            capacity: Capacity::Unset,
        }
    }

    /// Set the desired capacity.
    #[must_use]
    pub fn with_capacity(mut self, capacity: Capacity) -> Self {
        self.capacity = capacity;
        self
    }

    /// Identifier of the database this configuration describes.
    #[must_use]
    pub fn id(&self, subscription_id: &str) -> MongoDatabaseId {
        MongoDatabaseId::new(
            subscription_id,
            &self.resource_group_name,
            &self.account_name,
            &self.name,
        )
    }
}

impl TryFrom<DatabaseConfig> for DesiredConfig {
    type Error = Error;

    fn try_from(raw: DatabaseConfig) -> Result<Self> {
        validate::entity_name("name", &raw.name)?;
        validate::resource_group_name("resource_group_name", &raw.resource_group_name)?;
        validate::account_name("account_name", &raw.account_name)?;
        if let Some(throughput) = raw.throughput {
            validate::throughput("throughput", throughput)?;
        }
        if let Some(max) = raw
            .autoscale_settings
            .as_ref()
            .and_then(|settings| settings.max_throughput)
        {
            validate::max_throughput("autoscale_settings.max_throughput", max)?;
        }

        let capacity = Capacity::from_fields(
            &raw.name,
            &raw.account_name,
            raw.throughput,
            raw.autoscale_settings,
        )?;

        Ok(Self {
            name: raw.name,
            resource_group_name: raw.resource_group_name,
            account_name: raw.account_name,
            capacity,
        })
    }
}

/// The reconciler's durable record of a database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedState {
    /// Serialized [`MongoDatabaseId`]; the primary key.
    pub id: String,
    pub name: String,
    pub resource_group_name: String,
    pub account_name: String,
    pub throughput: Option<i64>,
    pub autoscale_settings: Option<AutoscaleSettings>,
}

impl PersistedState {
    /// State holding only the identifier, before a read fills it in.
    #[must_use]
    pub fn from_id(id: &MongoDatabaseId) -> Self {
        Self {
            id: id.to_string(),
            name: id.name.clone(),
            resource_group_name: id.resource_group.clone(),
            account_name: id.account_name.clone(),
            throughput: None,
            autoscale_settings: None,
        }
    }

    /// Capacity as recorded in state.
    ///
    /// Autoscale wins if state somehow holds both.
    #[must_use]
    pub fn capacity(&self) -> Capacity {
        match (&self.autoscale_settings, self.throughput) {
            (Some(settings), _) => Capacity::Autoscale(settings.clone()),
            (None, Some(t)) => Capacity::Fixed(t),
            (None, None) => Capacity::Unset,
        }
    }

    /// Record an observed capacity.
    pub fn set_capacity(&mut self, capacity: &Capacity) {
        self.throughput = capacity.throughput();
        self.autoscale_settings = capacity.autoscale_settings();
    }

    /// Load state stored at `schema_version`, upgrading it first.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MigrationFailure`] if the upgrade fails or the
    /// upgraded attributes do not form a valid state.
    pub fn from_raw(schema_version: u32, raw: RawState) -> Result<Self> {
        let upgraded = migration::upgrade(schema_version, raw)?;
        serde_json::from_value(serde_json::Value::Object(upgraded)).map_err(|e| {
            Error::migration_failure(schema_version, format!("decoding persisted state: {e}"))
        })
    }

    /// Raw attributes at [`migration::CURRENT_SCHEMA_VERSION`].
    #[must_use]
    pub fn to_raw(&self) -> RawState {
        match serde_json::to_value(self) {
            Ok(serde_json::Value::Object(map)) => map,
            _ => RawState::new(),
        }
    }
}

/// Result of a read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    /// The database exists; state refreshed.
    Present(PersistedState),
    /// The database is gone; state must be cleared.
    Absent,
}

impl ReadOutcome {
    /// The refreshed state, if present.
    #[must_use]
    pub fn into_state(self) -> Option<PersistedState> {
        match self {
            Self::Present(state) => Some(state),
            Self::Absent => None,
        }
    }
}
