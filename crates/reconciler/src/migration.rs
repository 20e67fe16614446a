//! Persisted-state schema upgrades.
//!
//! Each step rewrites raw persisted state from one schema version to the
//! next. [`upgrade`] applies them in order from the stored version up to
//! [`CURRENT_SCHEMA_VERSION`]. Steps are pure format transforms and never
//! reach the remote.

use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{Error, Result};
use crate::id::{MongoDatabaseId, key_value_segments};

/// Schema version written by this crate.
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

/// Raw persisted attributes, keyed by attribute name.
pub type RawState = Map<String, Value>;

/// A single upgrade step.
#[derive(Debug, Clone, Copy)]
pub struct MigrationStep {
    /// Version this step upgrades from; it produces `from_version + 1`.
    pub from_version: u32,
    pub description: &'static str,
    pub apply: fn(RawState) -> Result<RawState>,
}

/// All known steps, ordered by `from_version`.
pub const STEPS: &[MigrationStep] = &[MigrationStep {
    from_version: 0,
    description: "rewrite legacy apis/mongodb/databases ID to mongodbDatabases layout",
    apply: legacy_id_to_v1,
}];

/// Upgrade raw state written at `version` to the current schema.
///
/// # Errors
///
/// Returns [`Error::MigrationFailure`] if the version is newer than this
/// crate understands, if a step is missing, or if a step fails.
pub fn upgrade(version: u32, mut state: RawState) -> Result<RawState> {
    if version > CURRENT_SCHEMA_VERSION {
        return Err(Error::migration_failure(
            version,
            format!("state was written by a newer schema (current is {CURRENT_SCHEMA_VERSION})"),
        ));
    }

    for from_version in version..CURRENT_SCHEMA_VERSION {
        let step = STEPS
            .iter()
            .find(|s| s.from_version == from_version)
            .ok_or_else(|| Error::migration_failure(from_version, "no upgrade step registered"))?;

        debug!(
            from_version,
            to_version = from_version + 1,
            step = step.description,
            "Upgrading persisted state"
        );
        state = (step.apply)(state)?;
    }

    Ok(state)
}

/// Version 0 addressed databases as
/// `.../databaseAccounts/{account}/apis/mongodb/databases/{name}`.
fn legacy_id_to_v1(mut state: RawState) -> Result<RawState> {
    let legacy = state
        .get("id")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::migration_failure(0, "state has no string `id` attribute"))?;

    let id = parse_legacy_id(legacy)?;
    debug!(old_id = legacy, new_id = %id, "Rewriting legacy Mongo Database ID");

    state.insert("id".to_string(), Value::String(id.to_string()));
    Ok(state)
}

fn parse_legacy_id(legacy: &str) -> Result<MongoDatabaseId> {
    let fail = |reason: &str| {
        Error::migration_failure(0, format!("cannot decompose legacy ID {legacy:?}: {reason}"))
    };

    let segments = key_value_segments(legacy).map_err(|e| fail(&e.to_string()))?;

    let expected = [
        "subscriptions",
        "resourceGroups",
        "providers",
        "databaseAccounts",
        "apis",
        "databases",
    ];
    let keys_match = segments.len() == expected.len()
        && segments.iter().zip(expected).all(|((key, _), want)| *key == want);
    if !keys_match {
        return Err(fail("unexpected segment layout"));
    }

    let values = segments.iter().map(|(_, value)| *value).collect::<Vec<_>>();
    match values.as_slice() {
        [subscription, group, "Microsoft.DocumentDB", account, "mongodb", name]
            if [subscription, group, account, name].iter().all(|v| !v.is_empty()) =>
        {
            Ok(MongoDatabaseId::new(*subscription, *group, *account, *name))
        }
        _ => Err(fail("missing component or unexpected provider/api")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use serde_json::json;

    fn raw(value: Value) -> RawState {
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    #[test]
    fn test_legacy_id_is_rewritten() {
        let state = raw(json!({
            "id": "/subscriptions/sub/resourceGroups/rg1/providers/Microsoft.DocumentDB/databaseAccounts/acct1/apis/mongodb/databases/orders",
            "name": "orders",
            "throughput": 400,
        }));

        let upgraded = upgrade(0, state);
        assert!(upgraded.is_ok());
        let upgraded = upgraded.ok().unwrap_or_default();

        let id = upgraded.get("id").and_then(Value::as_str).unwrap_or_default();
        let parsed = MongoDatabaseId::parse(id);
        assert_eq!(
            parsed.ok(),
            Some(MongoDatabaseId::new("sub", "rg1", "acct1", "orders"))
        );
        assert_eq!(upgraded.get("throughput"), Some(&json!(400)));
    }

    #[test]
    fn test_current_version_is_untouched() {
        let state = raw(json!({ "id": "anything" }));
        let upgraded = upgrade(CURRENT_SCHEMA_VERSION, state.clone());
        assert_eq!(upgraded.ok(), Some(state));
    }

    #[test]
    fn test_corrupted_legacy_id_fails() {
        let corrupted = [
            json!({ "id": "rg1|acct1" }),
            json!({ "id": "/subscriptions/sub/resourceGroups/rg1/providers/Microsoft.DocumentDB/databaseAccounts/acct1/apis/mongodb/databases/" }),
            json!({ "id": "/subscriptions/sub/resourceGroups/rg1/providers/Microsoft.DocumentDB/databaseAccounts/acct1/apis/sql/databases/orders" }),
            json!({ "id": 42 }),
            json!({}),
        ];
        for state in corrupted {
            let kind = upgrade(0, raw(state.clone())).err().map(|e| e.kind());
            assert_eq!(kind, Some(ErrorKind::MigrationFailure), "{state}");
        }
    }

    #[test]
    fn test_future_version_fails() {
        let kind = upgrade(CURRENT_SCHEMA_VERSION + 1, Map::new())
            .err()
            .map(|e| e.kind());
        assert_eq!(kind, Some(ErrorKind::MigrationFailure));
    }
}
