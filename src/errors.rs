// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Error types for the restore engine.
//!
//! This module provides specialized error types for:
//! - Request shape validation (missing or malformed fields)
//! - Backup storage access (missing archives, corrupt payloads)
//! - Kubernetes cluster access (API errors, discovery, permissions)
//! - Restore lifecycle failures (duplicates, unknown operations, cancellation)
//!
//! The composite [`EngineError`] maps every failure to an HTTP status and a
//! stable error code for the response envelope, and classifies transience so
//! per-resource failures can be recorded with an honest `retryable` flag.

use thiserror::Error;

/// Errors produced while validating the shape of an incoming request.
///
/// These are rejected before any operation state is created.
#[derive(Error, Debug, Clone)]
pub enum RequestError {
    /// A required field was empty or absent
    #[error("Missing required field '{field}'")]
    MissingField {
        /// Name of the missing field
        field: String,
    },

    /// A field was present but carried an unusable value
    #[error("Invalid value for field '{field}': {reason}")]
    InvalidField {
        /// Name of the offending field
        field: String,
        /// Explanation of what is invalid
        reason: String,
    },
}

/// Errors produced by the external security collaborator.
#[derive(Error, Debug, Clone)]
pub enum SecurityError {
    /// The caller is not allowed to submit this restore
    #[error("Restore request denied: {reason}")]
    Denied {
        /// Why the request was rejected
        reason: String,
    },
}

/// Errors produced while accessing backup object storage.
#[derive(Error, Debug, Clone)]
pub enum StorageError {
    /// No archive exists for the requested backup
    #[error("Backup '{backup_id}' for cluster '{cluster_name}' not found in storage")]
    BackupNotFound {
        /// Source cluster name
        cluster_name: String,
        /// Backup identifier
        backup_id: String,
    },

    /// The archive exists but could not be decoded
    #[error("Backup archive '{key}' is corrupt: {reason}")]
    ArchiveCorrupt {
        /// Object storage key of the archive
        key: String,
        /// What failed while decoding
        reason: String,
    },

    /// The archive's manifest is missing or does not parse
    #[error("Backup manifest in '{key}' is invalid: {reason}")]
    ManifestInvalid {
        /// Object storage key of the archive
        key: String,
        /// What failed while parsing
        reason: String,
    },

    /// The storage backend failed to serve the object
    #[error("Object storage error for '{key}': {reason}")]
    Io {
        /// Object storage key involved
        key: String,
        /// Backend error description
        reason: String,
    },
}

/// Errors produced while talking to the target Kubernetes cluster.
#[derive(Error, Debug, Clone)]
pub enum ClusterError {
    /// The API server could not be reached at all
    #[error("Cluster unreachable: {reason}")]
    Unreachable {
        /// Connection-level error description
        reason: String,
    },

    /// The API server answered with an error status
    #[error("Kubernetes API error (HTTP {code}): {reason}")]
    Api {
        /// HTTP status code returned by the API server
        code: u16,
        /// Status message returned by the API server
        reason: String,
    },

    /// Discovery could not resolve an apiVersion/kind pair
    #[error("No server resource for {api_version}/{kind}: {reason}")]
    DiscoveryFailed {
        /// API version that failed to resolve
        api_version: String,
        /// Kind that failed to resolve
        kind: String,
        /// Discovery error description
        reason: String,
    },
}

impl ClusterError {
    /// Whether a rerun of the same call could plausibly succeed.
    ///
    /// Rate limiting (429) and server-side errors (5xx) are transient;
    /// client errors (4xx) are not. Connection failures are transient.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            ClusterError::Unreachable { .. } => true,
            ClusterError::Api { code, .. } => *code == 429 || (*code >= 500 && *code < 600),
            ClusterError::DiscoveryFailed { .. } => false,
        }
    }
}

impl From<kube::Error> for ClusterError {
    fn from(err: kube::Error) -> Self {
        match err {
            kube::Error::Api(api_err) => ClusterError::Api {
                code: api_err.code,
                reason: api_err.message,
            },
            kube::Error::Service(e) => ClusterError::Unreachable {
                reason: e.to_string(),
            },
            other => ClusterError::Unreachable {
                reason: other.to_string(),
            },
        }
    }
}

/// Composite error type for all restore engine operations.
///
/// This is the primary error type returned by the engine's public operations
/// and surfaced through the API response envelope.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Request shape validation failed
    #[error(transparent)]
    Request(#[from] RequestError),

    /// The security collaborator rejected the request
    #[error(transparent)]
    Security(#[from] SecurityError),

    /// A restore with the same identifier is already active
    #[error("Restore '{restore_id}' is already active")]
    DuplicateRestore {
        /// The conflicting restore identifier
        restore_id: String,
    },

    /// No active operation carries the requested identifier
    #[error("Restore '{restore_id}' not found")]
    NotFound {
        /// The unknown restore identifier
        restore_id: String,
    },

    /// Strict validation found errors and refused execution
    #[error("Validation failed with {error_count} error(s)")]
    ValidationFailed {
        /// Number of validation errors found
        error_count: usize,
    },

    /// Backup storage failed
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Kubernetes access failed
    #[error(transparent)]
    Cluster(#[from] ClusterError),

    /// The operation was cancelled by a client
    #[error("Restore operation cancelled")]
    Cancelled,

    /// Unclassified internal failure
    #[error("Internal error: {0}")]
    Internal(String),
}

impl EngineError {
    /// HTTP status code this error surfaces as.
    #[must_use]
    pub fn http_status(&self) -> u16 {
        match self {
            EngineError::Request(_) => 400,
            EngineError::Security(_) => 401,
            EngineError::DuplicateRestore { .. } => 409,
            EngineError::NotFound { .. } => 404,
            EngineError::Storage(StorageError::BackupNotFound { .. }) => 404,
            EngineError::ValidationFailed { .. }
            | EngineError::Storage(_)
            | EngineError::Cluster(_)
            | EngineError::Cancelled
            | EngineError::Internal(_) => 500,
        }
    }

    /// Stable error code carried in the response envelope.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            EngineError::Request(_) => "validation_error",
            EngineError::Security(_) => "unauthorized",
            EngineError::DuplicateRestore { .. } => "conflict",
            EngineError::NotFound { .. } => "not_found",
            EngineError::ValidationFailed { .. } => "validation_failed",
            EngineError::Storage(StorageError::BackupNotFound { .. }) => "backup_not_found",
            EngineError::Storage(_) => "backup_corrupt",
            EngineError::Cluster(_) => "cluster_error",
            EngineError::Cancelled => "cancelled",
            EngineError::Internal(_) => "internal_error",
        }
    }
}

// Conversion from anyhow::Error for orchestration-level glue
impl From<anyhow::Error> for EngineError {
    fn from(err: anyhow::Error) -> Self {
        EngineError::Internal(err.to_string())
    }
}

#[cfg(test)]
#[path = "errors_tests.rs"]
mod errors_tests;
