//! Error types for the reconciler crate.
//!
//! Every failure that leaves the core is one of the variants below. Remote
//! failures always carry the database and account they were issued for.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::client::RemoteError;

/// Result type alias for reconciler operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The remote call that failed, used to phrase wrapped remote errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteOperation {
    CheckExisting,
    IssueCreateUpdate,
    WaitCreateUpdate,
    Get,
    IssueThroughputUpdate,
    WaitThroughputUpdate,
    IssueThroughputMigration,
    WaitThroughputMigration,
    Delete,
    WaitDelete,
    GetAccount,
}

impl fmt::Display for RemoteOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let phrase = match self {
            Self::CheckExisting => "checking for presence of",
            Self::IssueCreateUpdate => "issuing create/update request for",
            Self::WaitCreateUpdate => "waiting on create/update future for",
            Self::Get => "retrieving",
            Self::IssueThroughputUpdate => "issuing throughput update for",
            Self::WaitThroughputUpdate => "waiting on throughput update future for",
            Self::IssueThroughputMigration => "issuing throughput migration for",
            Self::WaitThroughputMigration => "waiting on throughput migration future for",
            Self::Delete => "deleting",
            Self::WaitDelete => "waiting on delete future for",
            Self::GetAccount => "retrieving the owning account of",
        };
        f.write_str(phrase)
    }
}

/// Coarse classification of [`Error`], stable for callers that branch on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    AlreadyExists,
    MalformedIdentifier,
    MigrationFailure,
    ConflictingCapacityMode,
    RemoteReadFailure,
    Remote,
    ThroughputNotConfigurable,
    InvariantViolation,
    InvalidConfig,
    Timeout,
    Cancelled,
}

/// Reconciler error types.
#[derive(Debug, Error)]
pub enum Error {
    #[error(
        "a Cosmos Mongo Database with ID {id:?} already exists - to be managed it needs to be imported"
    )]
    AlreadyExists { id: String },

    #[error("malformed Cosmos Mongo Database ID {input:?}: {reason}")]
    MalformedIdentifier { input: String, reason: String },

    #[error("upgrading state from schema version {from_version}: {reason}")]
    MigrationFailure { from_version: u32, reason: String },

    #[error("updating Cosmos Mongo Database {database:?} (Account: {account:?}): {reason}")]
    ConflictingCapacityMode {
        database: String,
        account: String,
        reason: String,
    },

    #[error("reading throughput on Cosmos Mongo Database {database:?} (Account: {account:?}): {source}")]
    RemoteReadFailure {
        database: String,
        account: String,
        #[source]
        source: RemoteError,
    },

    #[error("{operation} Cosmos Mongo Database {database:?} (Account: {account:?}): {source}")]
    Remote {
        operation: RemoteOperation,
        database: String,
        account: String,
        #[source]
        source: RemoteError,
    },

    #[error(
        "setting throughput for Cosmos Mongo Database {database:?} (Account: {account:?}): {source} - \
         if the database has not been created with an initial throughput, it cannot be configured later"
    )]
    ThroughputNotConfigurable {
        database: String,
        account: String,
        #[source]
        source: RemoteError,
    },

    #[error("remote contract violated: {reason}")]
    InvariantViolation { reason: String },

    #[error("invalid value for {field:?}: {reason}")]
    InvalidConfig { field: String, reason: String },

    #[error("{operation} did not finish within {timeout:?}")]
    Timeout {
        operation: &'static str,
        timeout: Duration,
    },

    #[error("{operation} was cancelled before it finished")]
    Cancelled { operation: &'static str },
}

impl Error {
    /// Create an already-exists error.
    pub fn already_exists(id: impl Into<String>) -> Self {
        Self::AlreadyExists { id: id.into() }
    }

    /// Create a malformed identifier error.
    pub fn malformed_identifier(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedIdentifier {
            input: input.into(),
            reason: reason.into(),
        }
    }

    /// Create a migration failure.
    pub fn migration_failure(from_version: u32, reason: impl Into<String>) -> Self {
        Self::MigrationFailure {
            from_version,
            reason: reason.into(),
        }
    }

    /// Create a conflicting capacity mode error.
    pub fn conflicting_capacity_mode(
        database: impl Into<String>,
        account: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::ConflictingCapacityMode {
            database: database.into(),
            account: account.into(),
            reason: reason.into(),
        }
    }

    /// Wrap a remote failure with the database it was issued for.
    pub fn remote(
        operation: RemoteOperation,
        database: impl Into<String>,
        account: impl Into<String>,
        source: RemoteError,
    ) -> Self {
        Self::Remote {
            operation,
            database: database.into(),
            account: account.into(),
            source,
        }
    }

    /// Create an invariant violation.
    pub fn invariant_violation(reason: impl Into<String>) -> Self {
        Self::InvariantViolation {
            reason: reason.into(),
        }
    }

    /// Create an invalid config error.
    pub fn invalid_config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Classify this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::AlreadyExists { .. } => ErrorKind::AlreadyExists,
            Self::MalformedIdentifier { .. } => ErrorKind::MalformedIdentifier,
            Self::MigrationFailure { .. } => ErrorKind::MigrationFailure,
            Self::ConflictingCapacityMode { .. } => ErrorKind::ConflictingCapacityMode,
            Self::RemoteReadFailure { .. } => ErrorKind::RemoteReadFailure,
            Self::Remote { .. } => ErrorKind::Remote,
            Self::ThroughputNotConfigurable { .. } => ErrorKind::ThroughputNotConfigurable,
            Self::InvariantViolation { .. } => ErrorKind::InvariantViolation,
            Self::InvalidConfig { .. } => ErrorKind::InvalidConfig,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Cancelled { .. } => ErrorKind::Cancelled,
        }
    }

    /// Whether re-running the same operation unchanged could succeed.
    ///
    /// Only transport-level remote failures, timeouts and cancellations
    /// qualify; everything else needs a change in configuration or state.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Remote { source, .. } | Self::RemoteReadFailure { source, .. } => {
                matches!(source, RemoteError::Transport { .. })
            }
            Self::Timeout { .. } | Self::Cancelled { .. } => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_error_carries_context() {
        let err = Error::remote(
            RemoteOperation::IssueCreateUpdate,
            "orders",
            "acct1",
            RemoteError::api(500, "boom"),
        );
        let msg = err.to_string();
        assert!(msg.contains("issuing create/update request for"));
        assert!(msg.contains("orders"));
        assert!(msg.contains("acct1"));
        assert!(msg.contains("boom"));
        assert_eq!(err.kind(), ErrorKind::Remote);
    }

    #[test]
    fn test_retrofit_error_explains_itself() {
        let err = Error::ThroughputNotConfigurable {
            database: "orders".to_string(),
            account: "acct1".to_string(),
            source: RemoteError::NotFound,
        };
        assert!(err.to_string().contains("cannot be configured later"));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_retryable_classification() {
        let transport = Error::remote(
            RemoteOperation::Get,
            "orders",
            "acct1",
            RemoteError::transport("connection reset"),
        );
        assert!(transport.is_retryable());

        let api = Error::remote(
            RemoteOperation::Get,
            "orders",
            "acct1",
            RemoteError::api(400, "bad request"),
        );
        assert!(!api.is_retryable());
        assert!(!Error::already_exists("x").is_retryable());
    }
}
