//! JSON state file.
//!
//! Persisted state is stored together with the schema version it was written
//! at, so older files are upgraded on load.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use cosmosdb_mongo_reconciler::{CURRENT_SCHEMA_VERSION, PersistedState, RawState};

/// On-disk layout of the state file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateFile {
    /// Files written before versioning are version 0.
    #[serde(default)]
    pub schema_version: u32,
    pub state: RawState,
}

impl StateFile {
    /// Wrap `state` at the current schema version.
    #[must_use]
    pub fn current(state: &PersistedState) -> Self {
        Self {
            schema_version: CURRENT_SCHEMA_VERSION,
            state: state.to_raw(),
        }
    }

    /// Decode, upgrading to the current schema version first.
    ///
    /// # Errors
    ///
    /// Returns error if the stored attributes cannot be upgraded.
    pub fn into_state(self) -> Result<PersistedState> {
        let from = self.schema_version;
        let state = PersistedState::from_raw(from, self.state)?;
        if from < CURRENT_SCHEMA_VERSION {
            info!(
                from,
                to = CURRENT_SCHEMA_VERSION,
                id = %state.id,
                "Upgraded persisted state"
            );
        }
        Ok(state)
    }
}

/// Load state from `path`. A missing file means no state.
///
/// # Errors
///
/// Returns error if the file exists but cannot be read, parsed or upgraded.
pub fn load(path: &Path) -> Result<Option<PersistedState>> {
    if !path.exists() {
        debug!(path = %path.display(), "No state file");
        return Ok(None);
    }
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read state file {}", path.display()))?;
    let file: StateFile = serde_json::from_str(&text)
        .with_context(|| format!("Invalid state file {}", path.display()))?;
    file.into_state()
        .with_context(|| format!("Failed to load state from {}", path.display()))
        .map(Some)
}

/// Write `state` to `path` at the current schema version.
///
/// # Errors
///
/// Returns error if the file cannot be written.
pub fn save(path: &Path, state: &PersistedState) -> Result<()> {
    let text = serde_json::to_string_pretty(&StateFile::current(state))
        .context("Failed to serialize state")?;
    std::fs::write(path, text)
        .with_context(|| format!("Failed to write state file {}", path.display()))?;
    debug!(path = %path.display(), id = %state.id, "Saved state");
    Ok(())
}

/// Remove the state file. Already-absent is fine.
///
/// # Errors
///
/// Returns error if an existing file cannot be removed.
pub fn clear(path: &Path) -> Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => {
            info!(path = %path.display(), "Cleared state");
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => {
            Err(e).with_context(|| format!("Failed to remove state file {}", path.display()))
        }
    }
}
