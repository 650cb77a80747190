//! Error types for synchronization passes and credential caching.
//!
//! Every error in this module is safe to log: key material is never part of
//! an error message, and cache errors only ever carry the cache file path.

use crate::sync::AggregatedError;
use std::path::PathBuf;
use thiserror::Error;

/// Message the provider attaches to request failures caused by missing
/// authorization. Matched exactly when classifying fetch errors.
pub const ACCESS_DENIED_MESSAGE: &str = "Access Denied";

/// Main error type for cloudsync operations.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The provider rejected or failed a list/describe request
    #[error("{service}: {operation} failed with status {status_code}: {message}")]
    RequestFailure {
        service: String,
        operation: String,
        status_code: u16,
        message: String,
    },

    /// Provider-agnostic authorization failure while fetching a resource type
    #[error("access denied while fetching {resource_type}")]
    AccessDenied { resource_type: String },

    /// A raw provider record could not be converted into a resource
    #[error("Cannot convert {resource_type} record: {reason}")]
    Conversion {
        resource_type: String,
        reason: String,
    },

    /// A resource with the same type and identifier is already in the graph
    #[error("Duplicate resource {resource_type}[{id}]")]
    DuplicateResource { resource_type: String, id: String },

    /// A relationship edge references a resource absent from the graph
    #[error("Relation {parent} -> {child} references a resource missing from the graph")]
    DanglingRelation { parent: String, child: String },

    /// Relationship resolution failed for a raw record
    #[error("Cannot resolve relations for {resource_type}: {reason}")]
    Relationship {
        resource_type: String,
        reason: String,
    },

    /// The service does not declare the requested resource type
    #[error("{service}: unsupported fetch for type {resource_type}")]
    UnsupportedType {
        service: String,
        resource_type: String,
    },

    /// A cache file exists but does not hold a valid cached credential
    #[error("Cannot read cached credentials from {}", path.display())]
    CacheRead {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The wrapped authentication provider failed
    #[error("Credential retrieval failed: {context}")]
    CredentialRetrieval {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Filesystem operation failed
    #[error("I/O operation failed: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// Serialization or deserialization failed
    #[error("Serialization failed: {context}")]
    Serialization {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    /// Configuration or validation error
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// One or more errors recorded during a synchronization pass
    #[error(transparent)]
    Aggregate(#[from] AggregatedError),
}

/// Convenience type alias for Results with SyncError
pub type Result<T> = std::result::Result<T, SyncError>;

impl SyncError {
    /// Creates a request failure as reported by the provider.
    pub fn request_failure(
        service: impl Into<String>,
        operation: impl Into<String>,
        status_code: u16,
        message: impl Into<String>,
    ) -> Self {
        Self::RequestFailure {
            service: service.into(),
            operation: operation.into(),
            status_code,
            message: message.into(),
        }
    }

    /// Creates the access-denied sentinel for a resource type.
    pub fn access_denied(resource_type: impl Into<String>) -> Self {
        Self::AccessDenied {
            resource_type: resource_type.into(),
        }
    }

    /// Creates a conversion error for a raw record.
    pub fn conversion(resource_type: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Conversion {
            resource_type: resource_type.into(),
            reason: reason.into(),
        }
    }

    /// Creates a relationship resolution error.
    pub fn relationship(resource_type: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Relationship {
            resource_type: resource_type.into(),
            reason: reason.into(),
        }
    }

    /// Wraps a failure of the underlying authentication provider.
    pub fn credential_retrieval<E>(context: impl Into<String>, error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::CredentialRetrieval {
            context: context.into(),
            source: Box::new(error),
        }
    }

    /// Creates an I/O error with context.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Creates a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Returns true for the normalized access-denied sentinel.
    pub fn is_access_denied(&self) -> bool {
        matches!(self, Self::AccessDenied { .. })
    }

    /// Returns true for a raw provider request failure whose message is the
    /// provider's authorization-denied text.
    pub fn is_access_denied_failure(&self) -> bool {
        matches!(self, Self::RequestFailure { message, .. } if message == ACCESS_DENIED_MESSAGE)
    }
}
