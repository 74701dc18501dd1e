//! Error types for the synchronization core.
//!
//! # Design
//! Only caller defects and codec failures surface as `SyncError`. Network
//! failures and unparsable server bodies never do: the adapter folds them into
//! the record's own error state (see `normalize`). A `SyncError` returned from
//! an adapter operation therefore always means the request was never issued,
//! or the caller handed the core something it cannot work with.

use thiserror::Error;

/// Errors returned by the synchronization core.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The record was destroyed by a successful delete and must not be used.
    #[error("record for `{resource}` was destroyed by a previous delete")]
    Destroyed { resource: &'static str },

    /// The resource type declares no primary key field.
    #[error("resource type `{resource}` has no primary key field")]
    MissingPrimaryKeyField { resource: &'static str },

    /// The resource type has an empty name, so no network path can be derived.
    #[error("resource type has an empty name")]
    MissingResourceName,

    /// The operation targets a single record but no key is known for it.
    #[error("`{resource}` record has no key to address it by")]
    MissingKey { resource: &'static str },

    /// A resource did not serialize to a field map.
    #[error("`{resource}` does not serialize to an object")]
    NotAnObject { resource: &'static str },

    /// The request payload could not be encoded.
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// A body could not be decoded or applied to the resource.
    #[error("deserialization failed: {0}")]
    Deserialization(String),
}

impl SyncError {
    /// True for errors that indicate a caller defect rather than bad data.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            SyncError::Destroyed { .. }
                | SyncError::MissingPrimaryKeyField { .. }
                | SyncError::MissingResourceName
                | SyncError::MissingKey { .. }
        )
    }
}
