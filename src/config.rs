//! Configuration file for the `cosmosdb-mongo` binary.
//!
//! ```toml
//! [provider]
//! subscription_id = "00000000-0000-0000-0000-000000000000"
//!
//! [provider.timeouts]
//! create_secs = 1800
//!
//! [database]
//! name = "orders"
//! resource_group_name = "rg1"
//! account_name = "acct1"
//! throughput = 400
//! ```

use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use cosmosdb_mongo_reconciler::{DatabaseConfig, DesiredConfig, ReconcilerConfig, Timeouts};

/// Environment variable that overrides `provider.subscription_id`.
pub const SUBSCRIPTION_ENV: &str = "COSMOSDB_SUBSCRIPTION_ID";

/// Provider-level settings shared by every operation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Subscription the database lives in.
    #[serde(default)]
    pub subscription_id: String,

    /// Per-operation deadlines.
    #[serde(default)]
    pub timeouts: Timeouts,
}

/// Contents of the configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub provider: ProviderConfig,

    /// The managed database. Only commands that apply a desired
    /// configuration need it.
    #[serde(default)]
    pub database: Option<DatabaseConfig>,
}

impl FileConfig {
    /// Parse a configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns error if the text is not valid TOML for this layout.
    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).context("Failed to parse configuration")
    }

    /// Load the configuration at `path`, then apply environment overrides.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let mut config = Self::from_toml(&text)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Apply overrides from the environment, looked up through `lookup`.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(subscription) = lookup(SUBSCRIPTION_ENV).filter(|s| !s.trim().is_empty()) {
            self.provider.subscription_id = subscription;
        }
    }

    /// Reconciler settings from the `[provider]` table.
    #[must_use]
    pub fn reconciler_config(&self) -> ReconcilerConfig {
        ReconcilerConfig {
            subscription_id: self.provider.subscription_id.clone(),
            timeouts: self.provider.timeouts.clone(),
        }
    }

    /// Validated desired state from the `[database]` table.
    ///
    /// # Errors
    ///
    /// Returns error if the table is missing or fails validation.
    pub fn desired(&self) -> Result<DesiredConfig> {
        let raw = self
            .database
            .clone()
            .ok_or_else(|| anyhow!("config has no [database] table"))?;
        DesiredConfig::try_from(raw).context("Invalid [database] configuration")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cosmosdb_mongo_reconciler::Capacity;

    const EXAMPLE: &str = r#"
[provider]
subscription_id = "sub-from-file"

[provider.timeouts]
create_secs = 60

[database]
name = "orders"
resource_group_name = "rg1"
account_name = "acct1"
throughput = 400
"#;

    #[test]
    fn test_parse_example() {
        let config = FileConfig::from_toml(EXAMPLE);
        assert!(config.is_ok());
        let Ok(config) = config else { return };

        assert_eq!(config.provider.subscription_id, "sub-from-file");
        assert_eq!(config.provider.timeouts.create_secs, 60);
        assert_eq!(config.provider.timeouts.delete_secs, 1800);
        assert_eq!(
            config.desired().ok().map(|d| d.capacity),
            Some(Capacity::Fixed(400))
        );
    }

    #[test]
    fn test_env_overrides_subscription() {
        let mut config = FileConfig::from_toml(EXAMPLE).unwrap_or_default();
        config.apply_env_overrides(|key| {
            (key == SUBSCRIPTION_ENV).then(|| "sub-from-env".to_string())
        });
        assert_eq!(config.reconciler_config().subscription_id, "sub-from-env");
    }

    #[test]
    fn test_blank_env_is_ignored() {
        let mut config = FileConfig::from_toml(EXAMPLE).unwrap_or_default();
        config.apply_env_overrides(|_| Some("  ".to_string()));
        assert_eq!(config.provider.subscription_id, "sub-from-file");
    }

    #[test]
    fn test_missing_database_table() {
        let config = FileConfig::from_toml("[provider]\nsubscription_id = \"s\"\n");
        assert!(config.is_ok_and(|c| c.desired().is_err()));
    }

    #[test]
    fn test_both_capacity_modes_rejected() {
        let config = FileConfig::from_toml(
            r#"
[database]
name = "orders"
resource_group_name = "rg1"
account_name = "acct1"
throughput = 400

[database.autoscale_settings]
max_throughput = 4000
"#,
        );
        assert!(config.is_ok_and(|c| c.desired().is_err()));
    }
}
