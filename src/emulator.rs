//! File-backed local emulator of the control plane.
//!
//! The binary talks to an [`InMemoryControlPlane`] whose contents are loaded
//! from and saved back to a JSON snapshot around every command.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::debug;

use cosmosdb_mongo_reconciler::{ControlPlaneSnapshot, InMemoryControlPlane};

/// Load the emulator at `path`. A missing file is an empty control plane.
///
/// # Errors
///
/// Returns error if the file exists but cannot be read or parsed.
pub fn load(path: &Path) -> Result<Arc<InMemoryControlPlane>> {
    let snapshot = if path.exists() {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read emulator file {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("Invalid emulator file {}", path.display()))?
    } else {
        ControlPlaneSnapshot::default()
    };
    debug!(
        path = %path.display(),
        accounts = snapshot.accounts.len(),
        databases = snapshot.databases.len(),
        "Loaded emulator"
    );
    Ok(Arc::new(InMemoryControlPlane::from_snapshot(snapshot)))
}

/// Save the emulator's current contents to `path`.
///
/// # Errors
///
/// Returns error if the file cannot be written.
pub async fn save(path: &Path, plane: &InMemoryControlPlane) -> Result<()> {
    let snapshot = plane.snapshot().await;
    let text =
        serde_json::to_string_pretty(&snapshot).context("Failed to serialize emulator snapshot")?;
    std::fs::write(path, text)
        .with_context(|| format!("Failed to write emulator file {}", path.display()))
}
