//! Error types for the PretzelAI Operator

use std::time::Duration;

use thiserror::Error;

/// Result type for the operator
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for the operator
#[derive(Debug, Error)]
pub enum Error {
    /// Kubernetes API error other than a version conflict
    #[error("Kubernetes API error: {0}")]
    Kube(#[source] kube::Error),

    /// Optimistic concurrency failure: someone else wrote the object first
    #[error("Version conflict writing {kind} {namespace}/{name}")]
    Conflict {
        kind: String,
        namespace: String,
        name: String,
    },

    /// A write targeted an object that no longer exists
    #[error("{kind} {namespace}/{name} not found")]
    NotFound {
        kind: String,
        namespace: String,
        name: String,
    },

    /// Object is missing metadata the operator relies on (uid, namespace)
    #[error("Invalid object: {0}")]
    InvalidObject(String),

    /// Spec rejected before any resource was touched
    #[error("Validation error: {0}")]
    Validation(String),

    /// Object store failure that is not a Kubernetes API error
    #[error("Object store error: {0}")]
    Store(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The pass exceeded its deadline
    #[error("Reconcile pass timed out after {0:?}")]
    Timeout(Duration),

    /// The pass was abandoned because the operator is shutting down
    #[error("Reconcile pass cancelled")]
    Cancelled,
}

impl Error {
    /// Create a validation error with the given message
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a store error with the given message
    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    /// Create a conflict error for the given object identity
    pub fn conflict(kind: &str, namespace: &str, name: &str) -> Self {
        Self::Conflict {
            kind: kind.to_string(),
            namespace: namespace.to_string(),
            name: name.to_string(),
        }
    }

    /// Create a not-found error for the given object identity
    pub fn not_found(kind: &str, namespace: &str, name: &str) -> Self {
        Self::NotFound {
            kind: kind.to_string(),
            namespace: namespace.to_string(),
            name: name.to_string(),
        }
    }

    /// Map a kube client error, turning HTTP 409 into [`Error::Conflict`]
    pub fn from_kube(err: kube::Error, kind: &str, namespace: &str, name: &str) -> Self {
        match err {
            kube::Error::Api(ae) if ae.code == 409 => Self::conflict(kind, namespace, name),
            other => Self::Kube(other),
        }
    }

    /// Whether the pass should simply be re-run from a fresh read
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    /// Whether the failure stems from the user's spec
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}
