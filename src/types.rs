// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Core data model for restore operations.
//!
//! This module defines the request, operation, progress, and history types
//! shared by the engine, validator, and API surface. All types serialize as
//! camelCase JSON, matching the wire format of the REST API; enum values use
//! snake_case identifiers (`complete`, `keep_existing`, ...).
//!
//! Ownership rules:
//!
//! - [`RestoreRequest`] is immutable once submitted.
//! - Operation state is mutated exclusively by the owning worker; the API
//!   surface only ever sees [`RestoreOperationView`] snapshots.
//! - [`RestoreRecord`] rows are immutable once appended to history.

use crate::selector::LabelSelector;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

// ============================================================================
// Request Types
// ============================================================================

/// How much of the backup a restore applies.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RestoreMode {
    /// Restore every resource in the backup
    #[default]
    Complete,
    /// Restore only the resources matched by the request filters
    Selective,
    /// Restore resources missing from or differing in the target cluster
    Incremental,
    /// Run validation and report, apply nothing
    Validation,
}

impl RestoreMode {
    /// Stable identifier used in metrics labels and log fields.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            RestoreMode::Complete => "complete",
            RestoreMode::Selective => "selective",
            RestoreMode::Incremental => "incremental",
            RestoreMode::Validation => "validation",
        }
    }
}

/// How strictly pre-flight validation gates execution.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ValidationMode {
    /// Any validation error fails the operation before execution
    #[default]
    Strict,
    /// Validation runs and is reported, execution proceeds regardless
    Permissive,
    /// Validation is bypassed entirely
    Skip,
}

/// What to do when a backup resource already exists in the target cluster.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConflictStrategy {
    /// Leave the live resource untouched and record the resource as skipped
    #[default]
    Skip,
    /// Replace the live resource with the backup version
    Overwrite,
    /// Three-way merge the backup version into the live resource
    Merge,
    /// Abort the operation on the first conflict
    Fail,
}

impl ConflictStrategy {
    /// Stable identifier used in metrics labels and log fields.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictStrategy::Skip => "skip",
            ConflictStrategy::Overwrite => "overwrite",
            ConflictStrategy::Merge => "merge",
            ConflictStrategy::Fail => "fail",
        }
    }
}

/// A request to restore a backup into a target cluster.
///
/// Immutable once submitted. `restore_id` may be omitted, in which case the
/// engine generates one; an explicit id that is already active is refused.
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct RestoreRequest {
    /// Client-supplied identifier for this restore; generated when empty
    #[serde(default)]
    pub restore_id: String,

    /// Identifier of the backup to restore
    #[serde(default)]
    pub backup_id: String,

    /// Name of the source cluster the backup was taken from
    #[serde(default)]
    pub cluster_name: String,

    /// Namespaces to restore into; empty or `["*"]` means all
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub target_namespaces: Vec<String>,

    /// Resource kinds to restore (e.g. `Deployment`); empty means all
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resource_types: Vec<String>,

    /// Label selector applied to backup resources before restoring
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label_selector: Option<LabelSelector>,

    /// How much of the backup to apply
    #[serde(default)]
    pub restore_mode: RestoreMode,

    /// How strictly validation gates execution
    #[serde(default)]
    pub validation_mode: ValidationMode,

    /// What to do when a resource already exists
    #[serde(default)]
    pub conflict_strategy: ConflictStrategy,

    /// Perform all reads, validation, and merges but no writes
    #[serde(default)]
    pub dry_run: bool,

    /// Free-form configuration passed through to collaborators
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub config: BTreeMap<String, String>,

    /// Free-form metadata recorded with the operation
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

impl RestoreRequest {
    /// SHA-256 fingerprint of the request, recorded in history rows.
    ///
    /// The fingerprint covers the identifying and behavioural fields so a
    /// resubmitted request can be correlated with its earlier runs.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.backup_id.as_bytes());
        hasher.update(self.cluster_name.as_bytes());
        for ns in &self.target_namespaces {
            hasher.update(ns.as_bytes());
        }
        for kind in &self.resource_types {
            hasher.update(kind.as_bytes());
        }
        hasher.update(self.restore_mode.as_str().as_bytes());
        hasher.update(self.conflict_strategy.as_str().as_bytes());
        hasher.update([u8::from(self.dry_run)]);
        let digest = hasher.finalize();
        digest.iter().map(|b| format!("{b:02x}")).collect()
    }
}

// ============================================================================
// Operation State
// ============================================================================

/// Lifecycle state of a restore operation.
///
/// Transitions are forward-only:
///
/// ```text
/// pending -> validating -> restoring -> completed
///                       \->          \-> failed
///                                     -> cancelled
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RestoreStatus {
    /// Created, worker not yet running
    #[default]
    Pending,
    /// Pre-flight validation in progress
    Validating,
    /// Iterating backup resources
    Restoring,
    /// All resources processed
    Completed,
    /// Operation aborted by an error
    Failed,
    /// Operation aborted by client cancellation
    Cancelled,
}

impl RestoreStatus {
    /// Whether this status ends the operation lifecycle.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RestoreStatus::Completed | RestoreStatus::Failed | RestoreStatus::Cancelled
        )
    }

    /// Whether moving from `self` to `next` is a permitted transition.
    ///
    /// `failed` and `cancelled` may be entered from any non-terminal state;
    /// the happy path only moves forward.
    #[must_use]
    pub fn can_transition_to(&self, next: RestoreStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        match next {
            RestoreStatus::Pending => false,
            RestoreStatus::Validating => *self == RestoreStatus::Pending,
            RestoreStatus::Restoring => {
                matches!(self, RestoreStatus::Pending | RestoreStatus::Validating)
            }
            RestoreStatus::Completed => *self == RestoreStatus::Restoring,
            RestoreStatus::Failed | RestoreStatus::Cancelled => true,
        }
    }

    /// Stable identifier used in metrics labels and log fields.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            RestoreStatus::Pending => "pending",
            RestoreStatus::Validating => "validating",
            RestoreStatus::Restoring => "restoring",
            RestoreStatus::Completed => "completed",
            RestoreStatus::Failed => "failed",
            RestoreStatus::Cancelled => "cancelled",
        }
    }
}

/// Progress counters for an active restore operation.
///
/// Maintains `processed = successful + failed + skipped` after every update;
/// all counters are monotonic for the lifetime of the operation.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoreProgress {
    /// Number of resources selected for this restore
    pub total_resources: u64,

    /// Number of resources the worker has finished handling
    pub processed: u64,

    /// Resources created, updated, or merged successfully
    pub successful: u64,

    /// Resources that could not be applied
    pub failed: u64,

    /// Resources skipped by strategy or filter
    pub skipped: u64,

    /// Namespace of the resource currently being applied
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_namespace: Option<String>,

    /// `Kind/name` of the resource currently being applied
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_resource: Option<String>,

    /// Percentage of `total_resources` processed, 0..=100
    pub percent_complete: f64,

    /// Processed counts keyed by `group-version/kind`
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub resource_breakdown: BTreeMap<String, u64>,
}

impl RestoreProgress {
    /// Recompute `percent_complete` from the counters.
    #[allow(clippy::cast_precision_loss)]
    pub fn update_percent(&mut self) {
        self.percent_complete = if self.total_resources == 0 {
            100.0
        } else {
            (self.processed as f64 / self.total_resources as f64) * 100.0
        };
    }
}

/// Outcome recorded for a resource the worker applied.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoredResource {
    /// API version of the resource (e.g. `apps/v1`)
    pub api_version: String,
    /// Kind of the resource
    pub kind: String,
    /// Namespace, absent for cluster-scoped resources
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    /// Resource name
    pub name: String,
    /// How the resource was applied (`created`, `updated`, `merged`)
    pub action: String,
}

/// Outcome recorded for a resource the worker skipped.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedResource {
    /// API version of the resource
    pub api_version: String,
    /// Kind of the resource
    pub kind: String,
    /// Namespace, absent for cluster-scoped resources
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    /// Resource name
    pub name: String,
    /// Why the resource was skipped
    pub reason: String,
}

/// Outcome recorded for a resource the worker failed to apply.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedResource {
    /// API version of the resource
    pub api_version: String,
    /// Kind of the resource
    pub kind: String,
    /// Namespace, absent for cluster-scoped resources
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    /// Resource name
    pub name: String,
    /// Error that prevented the apply
    pub error: String,
    /// Whether rerunning the restore could succeed for this resource
    pub retryable: bool,
}

/// Top-level error attached to an operation that aborted.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationError {
    /// Stable error category (e.g. `validation_failed`, `backup_not_found`)
    pub error_type: String,
    /// Human-readable description
    pub message: String,
    /// Whether resubmitting the request could succeed
    pub recoverable: bool,
    /// When the error was recorded
    pub timestamp: DateTime<Utc>,
}

/// Serializable snapshot of a restore operation.
///
/// Returned by the status and listing endpoints; consumers poll for fresh
/// snapshots rather than observing live state.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoreOperationView {
    /// The originating request
    pub request: RestoreRequest,
    /// Current lifecycle state
    pub status: RestoreStatus,
    /// When the operation was accepted
    pub start_time: DateTime<Utc>,
    /// When the operation reached a terminal state
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    /// Progress counters
    pub progress: RestoreProgress,
    /// Resources applied successfully
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub restored_resources: Vec<RestoredResource>,
    /// Resources skipped
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skipped_resources: Vec<SkippedResource>,
    /// Resources that failed to apply
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failed_resources: Vec<FailedResource>,
    /// Pre-flight validation report, absent when validation was skipped
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation_report: Option<crate::validation::ValidationReport>,
    /// Operation-level errors
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<OperationError>,
}

// ============================================================================
// History
// ============================================================================

/// Aggregate counters for a finished restore operation.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoreSummary {
    /// Wall-clock duration in seconds
    pub duration_secs: f64,
    /// Number of resources handled
    pub processed: u64,
    /// Resources applied successfully
    pub successful: u64,
    /// Resources that failed
    pub failed: u64,
    /// Resources skipped
    pub skipped: u64,
    /// `successful / processed * 100`, or 100 when nothing was processed
    pub success_rate: f64,
}

impl RestoreSummary {
    /// Build a summary from final progress counters and a duration.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn from_progress(progress: &RestoreProgress, duration_secs: f64) -> Self {
        let success_rate = if progress.processed == 0 {
            100.0
        } else {
            (progress.successful as f64 / progress.processed as f64) * 100.0
        };
        RestoreSummary {
            duration_secs,
            processed: progress.processed,
            successful: progress.successful,
            failed: progress.failed,
            skipped: progress.skipped,
            success_rate,
        }
    }
}

/// Trimmed, append-only history row for a finished restore operation.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoreRecord {
    /// Identifier of the restore operation
    pub restore_id: String,
    /// Identifier of the backup that was restored
    pub backup_id: String,
    /// Source cluster name
    pub cluster_name: String,
    /// Terminal status of the operation
    pub status: RestoreStatus,
    /// When the operation was accepted
    pub start_time: DateTime<Utc>,
    /// When the operation reached a terminal state
    pub end_time: DateTime<Utc>,
    /// Aggregate counters
    pub summary: RestoreSummary,
    /// SHA-256 fingerprint of the originating request
    pub request_fingerprint: String,
}

// ============================================================================
// Backup Types
// ============================================================================

/// A single Kubernetes resource decoded from a backup archive.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupResource {
    /// API version of the resource (e.g. `apps/v1`)
    pub api_version: String,
    /// Kind of the resource
    pub kind: String,
    /// Namespace, absent for cluster-scoped resources
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    /// Resource name
    pub name: String,
    /// The full resource document as stored in the backup
    pub content: serde_json::Value,
    /// Sidecar metadata recorded by the backup producer
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

impl BackupResource {
    /// `group-version/kind` key used for progress breakdowns.
    #[must_use]
    pub fn gvk_key(&self) -> String {
        format!("{}/{}", self.api_version, self.kind)
    }

    /// Labels carried on the resource, empty when none are set.
    #[must_use]
    pub fn labels(&self) -> BTreeMap<String, String> {
        self.content
            .pointer("/metadata/labels")
            .and_then(|v| v.as_object())
            .map(|map| {
                map.iter()
                    .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Manifest recorded by the backup producer alongside the resource files.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupManifest {
    /// When the backup was taken
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    /// Cluster the backup was taken from
    #[serde(default)]
    pub cluster_name: String,
    /// Namespace the backup covers, absent for cluster-wide backups
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    /// Resource counts keyed by kind
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub resource_counts: BTreeMap<String, u64>,
    /// Files contained in the archive
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<String>,
    /// Total archive payload size in bytes
    #[serde(default)]
    pub total_size: u64,
    /// Arbitrary metadata recorded by the producer
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

#[cfg(test)]
#[path = "types_tests.rs"]
mod types_tests;
