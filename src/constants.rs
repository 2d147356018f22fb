// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Global constants for the Restory engine.
//!
//! This module contains all numeric and string constants used throughout the codebase.
//! Constants are organized by category for easy maintenance.

// ============================================================================
// API Constants
// ============================================================================

/// Base path for the restore API
pub const API_BASE_PATH: &str = "/api/v1";

/// Default page size for restore history listings
pub const DEFAULT_HISTORY_LIMIT: usize = 50;

/// Maximum page size for restore history listings
pub const MAX_HISTORY_LIMIT: usize = 500;

// ============================================================================
// Engine Constants
// ============================================================================

/// Default bound on retained history records (FIFO eviction beyond this)
pub const DEFAULT_HISTORY_RETENTION: usize = 1000;

/// Prefix for server-generated restore identifiers
pub const RESTORE_ID_PREFIX: &str = "restore-";

/// Default archive extension for backup objects in storage
pub const BACKUP_ARCHIVE_EXTENSION: &str = "tar.gz";

/// Alternate archive extension accepted when resolving backup objects
pub const BACKUP_ARCHIVE_EXTENSION_SHORT: &str = "tgz";

/// File name of the manifest inside a backup archive
pub const BACKUP_MANIFEST_FILE: &str = "backup-manifest.yaml";

// ============================================================================
// Validation Constants
// ============================================================================

/// Maximum length of a DNS-1123 label (namespace name)
pub const DNS1123_LABEL_MAX_LEN: usize = 63;

/// Resources probed by the permission check matrix
pub const PERMISSION_CHECK_RESOURCES: &[&str] =
    &["namespaces", "pods", "services", "configmaps", "secrets"];

/// Verbs probed by the permission check matrix
pub const PERMISSION_CHECK_VERBS: &[&str] = &["create", "update", "patch", "get", "list"];

/// Weight of an error finding in the validation score
pub const SCORE_ERROR_WEIGHT: f64 = 1.0;

/// Weight of a warning finding in the validation score
pub const SCORE_WARNING_WEIGHT: f64 = 0.3;

// ============================================================================
// Kubernetes Field Constants
// ============================================================================

/// Field paths never copied from a backup resource onto the cluster
pub const DEFAULT_IGNORE_FIELDS: &[&str] = &[
    "metadata.resourceVersion",
    "metadata.uid",
    "metadata.generation",
    "metadata.creationTimestamp",
    "metadata.managedFields",
    "status",
];

/// Field paths where the backup value always wins without a conflict record
pub const DEFAULT_FORCE_FIELDS: &[&str] = &["spec"];

/// Annotation keys whose live values survive a restore
pub const DEFAULT_PRESERVE_ANNOTATIONS: &[&str] = &[
    "kubectl.kubernetes.io/last-applied-configuration",
    "deployment.kubernetes.io/revision",
];

/// Label keys whose live values survive a restore
pub const DEFAULT_PRESERVE_LABELS: &[&str] = &["app.kubernetes.io/managed-by", "pod-template-hash"];

/// Sentinel substituted for Secret values in conflict and change records
pub const REDACTED_SENTINEL: &str = "[REDACTED]";

// ============================================================================
// Runtime Constants
// ============================================================================

/// Number of worker threads for Tokio runtime
pub const TOKIO_WORKER_THREADS: usize = 4;

// ============================================================================
// HTTP Server Constants
// ============================================================================

/// Port for the restore API and Prometheus metrics HTTP server
pub const HTTP_SERVER_PORT: u16 = 8080;

/// Path for Prometheus metrics endpoint
pub const METRICS_SERVER_PATH: &str = "/metrics";

/// Bind address for the HTTP server
pub const HTTP_SERVER_BIND_ADDRESS: &str = "0.0.0.0";
