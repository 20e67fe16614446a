//! Resource identifiers for MongoDB databases and their owning accounts.
//!
//! The serialized form follows the remote API's resource-path convention:
//!
//! ```text
//! /subscriptions/{subscription}/resourceGroups/{group}/providers/Microsoft.DocumentDB/databaseAccounts/{account}/mongodbDatabases/{name}
//! ```
//!
//! Parsing only accepts this layout. State written by schema version 0 used a
//! different layout and goes through [`crate::migration`] instead.

use std::fmt;
use std::str::FromStr;

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

const SUBSCRIPTIONS: &str = "subscriptions";
const RESOURCE_GROUPS: &str = "resourceGroups";
const PROVIDERS: &str = "providers";
const PROVIDER_NAMESPACE: &str = "Microsoft.DocumentDB";
const DATABASE_ACCOUNTS: &str = "databaseAccounts";
const MONGODB_DATABASES: &str = "mongodbDatabases";

/// Identifier of a MongoDB database inside a database account.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MongoDatabaseId {
    pub subscription_id: String,
    pub resource_group: String,
    pub account_name: String,
    pub name: String,
}

/// Identifier of a database account.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DatabaseAccountId {
    pub subscription_id: String,
    pub resource_group: String,
    pub name: String,
}

impl MongoDatabaseId {
    /// Build an identifier from its components.
    ///
    /// No syntax validation happens here; see [`crate::validate`].
    pub fn new(
        subscription_id: impl Into<String>,
        resource_group: impl Into<String>,
        account_name: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            subscription_id: subscription_id.into(),
            resource_group: resource_group.into(),
            account_name: account_name.into(),
            name: name.into(),
        }
    }

    /// Parse a serialized identifier in the current layout.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedIdentifier`] for any other shape.
    pub fn parse(input: &str) -> Result<Self> {
        let segments = key_value_segments(input)?;

        let expected = [
            SUBSCRIPTIONS,
            RESOURCE_GROUPS,
            PROVIDERS,
            DATABASE_ACCOUNTS,
            MONGODB_DATABASES,
        ];
        if segments.len() != expected.len() {
            return Err(Error::malformed_identifier(
                input,
                format!(
                    "expected {} key/value segments, found {}",
                    expected.len(),
                    segments.len()
                ),
            ));
        }

        for ((key, value), want) in segments.iter().zip(expected) {
            if *key != want {
                return Err(Error::malformed_identifier(
                    input,
                    format!("expected segment {want:?}, found {key:?}"),
                ));
            }
            if value.is_empty() {
                return Err(Error::malformed_identifier(
                    input,
                    format!("segment {want:?} has an empty value"),
                ));
            }
        }

        let value_of = |index: usize| {
            segments
                .get(index)
                .map(|(_, value)| (*value).to_string())
                .unwrap_or_default()
        };

        let provider = value_of(2);
        if provider != PROVIDER_NAMESPACE {
            return Err(Error::malformed_identifier(
                input,
                format!("expected provider {PROVIDER_NAMESPACE:?}, found {provider:?}"),
            ));
        }

        Ok(Self {
            subscription_id: value_of(0),
            resource_group: value_of(1),
            account_name: value_of(3),
            name: value_of(4),
        })
    }

    /// The account this database lives in.
    #[must_use]
    pub fn account_id(&self) -> DatabaseAccountId {
        DatabaseAccountId::new(
            &self.subscription_id,
            &self.resource_group,
            &self.account_name,
        )
    }
}

impl fmt::Display for MongoDatabaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "/{SUBSCRIPTIONS}/{}/{RESOURCE_GROUPS}/{}/{PROVIDERS}/{PROVIDER_NAMESPACE}/{DATABASE_ACCOUNTS}/{}/{MONGODB_DATABASES}/{}",
            self.subscription_id, self.resource_group, self.account_name, self.name
        )
    }
}

impl FromStr for MongoDatabaseId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl DatabaseAccountId {
    /// Build an account identifier from its components.
    pub fn new(
        subscription_id: impl Into<String>,
        resource_group: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            subscription_id: subscription_id.into(),
            resource_group: resource_group.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for DatabaseAccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "/{SUBSCRIPTIONS}/{}/{RESOURCE_GROUPS}/{}/{PROVIDERS}/{PROVIDER_NAMESPACE}/{DATABASE_ACCOUNTS}/{}",
            self.subscription_id, self.resource_group, self.name
        )
    }
}

/// Split a resource path into `(key, value)` pairs.
///
/// The path must start with `/`, must not end with one and must hold an
/// even number of segments.
pub(crate) fn key_value_segments(input: &str) -> Result<Vec<(&str, &str)>> {
    let trimmed = input
        .strip_prefix('/')
        .ok_or_else(|| Error::malformed_identifier(input, "must start with '/'"))?;

    if trimmed.is_empty() || trimmed.ends_with('/') {
        return Err(Error::malformed_identifier(
            input,
            "must not be empty or end with '/'",
        ));
    }

    let parts = trimmed.split('/').collect_vec();
    if parts.len() % 2 != 0 {
        return Err(Error::malformed_identifier(
            input,
            "segments must come in key/value pairs",
        ));
    }

    Ok(parts.into_iter().tuples::<(&str, &str)>().collect_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    const SAMPLE: &str = "/subscriptions/00000000-0000-0000-0000-000000000000/resourceGroups/rg1/providers/Microsoft.DocumentDB/databaseAccounts/acct1/mongodbDatabases/orders";

    #[test]
    fn test_display_matches_remote_layout() {
        let id = MongoDatabaseId::new(
            "00000000-0000-0000-0000-000000000000",
            "rg1",
            "acct1",
            "orders",
        );
        assert_eq!(id.to_string(), SAMPLE);
    }

    #[test]
    fn test_parse_current_layout() {
        let id = MongoDatabaseId::parse(SAMPLE);
        assert!(id.is_ok());
        let id = id.ok();
        assert_eq!(id.as_ref().map(|i| i.resource_group.as_str()), Some("rg1"));
        assert_eq!(id.as_ref().map(|i| i.account_name.as_str()), Some("acct1"));
        assert_eq!(id.as_ref().map(|i| i.name.as_str()), Some("orders"));
    }

    #[test]
    fn test_parse_rejects_legacy_layout() {
        let legacy = "/subscriptions/sub/resourceGroups/rg1/providers/Microsoft.DocumentDB/databaseAccounts/acct1/apis/mongodb/databases/orders";
        let err = MongoDatabaseId::parse(legacy).err();
        assert_eq!(
            err.map(|e| e.kind()),
            Some(ErrorKind::MalformedIdentifier)
        );
    }

    #[test]
    fn test_parse_rejects_bad_shapes() {
        let bad = [
            "",
            "/",
            "subscriptions/sub/resourceGroups/rg1",
            "/subscriptions/sub/resourceGroups/rg1/providers/Microsoft.DocumentDB/databaseAccounts/acct1/mongodbDatabases/",
            "/subscriptions/sub/resourceGroups//providers/Microsoft.DocumentDB/databaseAccounts/acct1/mongodbDatabases/orders",
            "/subscriptions/sub/resourceGroups/rg1/providers/Microsoft.Storage/databaseAccounts/acct1/mongodbDatabases/orders",
            "/subscriptions/sub/resourceGroups/rg1/providers/Microsoft.DocumentDB/databaseAccounts/acct1/sqlDatabases/orders",
            "/subscriptions/sub/resourceGroups/rg1/providers/Microsoft.DocumentDB/databaseAccounts/acct1/mongodbDatabases/orders/collections/c1",
            "/subscriptions/sub/resourceGroups/rg1/providers/Microsoft.DocumentDB/databaseAccounts/acct1",
            "rg1|acct1|orders",
        ];
        for input in bad {
            let kind = MongoDatabaseId::parse(input).err().map(|e| e.kind());
            assert_eq!(kind, Some(ErrorKind::MalformedIdentifier), "{input}");
        }
    }

    #[test]
    fn test_account_id() {
        let id = MongoDatabaseId::new("sub", "rg1", "acct1", "orders");
        assert_eq!(
            id.account_id().to_string(),
            "/subscriptions/sub/resourceGroups/rg1/providers/Microsoft.DocumentDB/databaseAccounts/acct1"
        );
    }
}
