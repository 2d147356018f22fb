// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! The per-operation restore worker.
//!
//! One worker task owns each operation and is the only writer of its state.
//! The run proceeds in phases: pre-flight validation, backup load and
//! filtering, sequential resource application, finalisation. The cancellation
//! token is polled at every resource boundary; an in-flight API call
//! completes before cancellation is observed.
//!
//! Per-resource failures never abort the run (partial success is a normal
//! outcome) except under the `fail` conflict strategy, which stops at the
//! first conflict.

use super::{filter, Operation, RestoreEngine};
use crate::cluster::ResourceRef;
use crate::errors::StorageError;
use crate::metrics;
use crate::types::{
    BackupResource, ConflictStrategy, RestoreMode, RestoreRequest, RestoreStatus, ValidationMode,
};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Outcome of applying a single backup resource.
enum ApplyOutcome {
    /// Resource was absent and has been created
    Created,
    /// Resource existed and was replaced wholesale
    Updated,
    /// Resource existed and the merged form was applied
    Merged,
    /// Resource existed and the strategy skipped it
    Skipped(&'static str),
    /// Resource could not be applied
    Failed { error: String, retryable: bool },
    /// Strategy `fail` hit an existing resource; the operation must stop
    ConflictAbort,
}

/// Run one restore operation to a terminal state.
pub(super) async fn run(engine: Arc<RestoreEngine>, operation: Arc<Operation>) {
    let request = operation.request().clone();
    let cancel = operation.cancel_token().clone();

    // Validation phase
    if request.validation_mode != ValidationMode::Skip {
        if cancel.is_cancelled() {
            operation.finalize(RestoreStatus::Cancelled);
            return;
        }
        operation.transition(RestoreStatus::Validating);

        let report = engine.validator().validate(&request, &cancel).await;
        let error_count = report.errors.len();
        operation.set_validation_report(report);

        if cancel.is_cancelled() {
            operation.finalize(RestoreStatus::Cancelled);
            return;
        }
        if request.validation_mode == ValidationMode::Strict && error_count > 0 {
            warn!(
                restore_id = operation.restore_id(),
                errors = error_count,
                "Strict validation refused execution"
            );
            operation.add_error(
                "validation_failed",
                format!("validation failed with {error_count} error(s)"),
                true,
            );
            operation.finalize(RestoreStatus::Failed);
            return;
        }
    }

    operation.transition(RestoreStatus::Restoring);

    // Validation-only runs stop here with nothing to apply
    if request.restore_mode == RestoreMode::Validation {
        operation.finalize(RestoreStatus::Completed);
        return;
    }

    // Load phase
    let archive = match engine
        .backups()
        .load_archive(&request.cluster_name, &request.backup_id)
        .await
    {
        Ok(archive) => archive,
        Err(err) => {
            let error_type = match &err {
                StorageError::BackupNotFound { .. } => "backup_not_found",
                _ => "backup_corrupt",
            };
            operation.add_error(error_type, err.to_string(), false);
            operation.finalize(RestoreStatus::Failed);
            return;
        }
    };

    let resources = filter::filter_resources(&request, archive.resources);
    operation.set_total(resources.len() as u64);
    info!(
        restore_id = operation.restore_id(),
        total = resources.len(),
        dry_run = request.dry_run,
        "Loaded backup, starting execution"
    );

    // Execution phase: backup order, one resource at a time
    for resource in &resources {
        if cancel.is_cancelled() {
            info!(
                restore_id = operation.restore_id(),
                "Cancellation observed at resource boundary"
            );
            operation.finalize(RestoreStatus::Cancelled);
            return;
        }

        operation.begin_resource(resource);
        let outcome = apply_resource(&engine, &request, resource).await;

        match outcome {
            ApplyOutcome::Created => {
                operation.record_restored(resource, "created");
                metrics::record_resource_outcome(&resource.kind, "created");
            }
            ApplyOutcome::Updated => {
                operation.record_restored(resource, "updated");
                metrics::record_resource_outcome(&resource.kind, "updated");
            }
            ApplyOutcome::Merged => {
                operation.record_restored(resource, "merged");
                metrics::record_resource_outcome(&resource.kind, "merged");
            }
            ApplyOutcome::Skipped(reason) => {
                operation.record_skipped(resource, reason);
                metrics::record_resource_outcome(&resource.kind, "skipped");
            }
            ApplyOutcome::Failed { error, retryable } => {
                operation.record_failed(resource, &error, retryable);
                metrics::record_resource_outcome(&resource.kind, "failed");
            }
            ApplyOutcome::ConflictAbort => {
                operation.record_failed(resource, "resource already exists", false);
                metrics::record_resource_outcome(&resource.kind, "failed");
                operation.add_error(
                    "conflict",
                    format!(
                        "{} {}/{} already exists and the conflict strategy is 'fail'",
                        resource.kind,
                        resource.namespace.as_deref().unwrap_or("-"),
                        resource.name
                    ),
                    false,
                );
                operation.finalize(RestoreStatus::Failed);
                return;
            }
        }
    }

    operation.finalize(RestoreStatus::Completed);
}

/// Apply one backup resource against the live cluster.
async fn apply_resource(
    engine: &Arc<RestoreEngine>,
    request: &RestoreRequest,
    resource: &BackupResource,
) -> ApplyOutcome {
    let resource_ref = ResourceRef {
        api_version: resource.api_version.clone(),
        kind: resource.kind.clone(),
        namespace: resource.namespace.clone(),
        name: resource.name.clone(),
    };

    let existing = match engine.cluster().get_resource(&resource_ref).await {
        Ok(existing) => existing,
        Err(err) => {
            return ApplyOutcome::Failed {
                error: err.to_string(),
                retryable: err.is_transient(),
            }
        }
    };

    match existing {
        None => {
            if !request.dry_run {
                if let Err(err) = engine
                    .cluster()
                    .create_resource(&resource_ref, &resource.content)
                    .await
                {
                    return ApplyOutcome::Failed {
                        error: err.to_string(),
                        retryable: err.is_transient(),
                    };
                }
            }
            ApplyOutcome::Created
        }
        Some(existing) => {
            debug!(
                kind = %resource.kind,
                name = %resource.name,
                strategy = request.conflict_strategy.as_str(),
                "Resource exists, dispatching on conflict strategy"
            );
            match request.conflict_strategy {
                ConflictStrategy::Skip => ApplyOutcome::Skipped("conflict"),
                ConflictStrategy::Fail => ApplyOutcome::ConflictAbort,
                ConflictStrategy::Overwrite => {
                    overwrite_resource(engine, request, resource, &resource_ref, &existing).await
                }
                ConflictStrategy::Merge => {
                    merge_resource(engine, request, resource, &resource_ref, &existing).await
                }
            }
        }
    }
}

/// Replace the live resource with the backup version.
///
/// The live `metadata.resourceVersion` is copied onto the backup document so
/// the replace call passes the API server's concurrency check.
async fn overwrite_resource(
    engine: &Arc<RestoreEngine>,
    request: &RestoreRequest,
    resource: &BackupResource,
    resource_ref: &ResourceRef,
    existing: &Value,
) -> ApplyOutcome {
    let mut desired = resource.content.clone();
    if let Some(resource_version) = existing.pointer("/metadata/resourceVersion").cloned() {
        match desired.pointer_mut("/metadata").and_then(Value::as_object_mut) {
            Some(metadata) => {
                metadata.insert("resourceVersion".to_string(), resource_version);
            }
            None => {
                if let Some(root) = desired.as_object_mut() {
                    root.insert(
                        "metadata".to_string(),
                        serde_json::json!({ "resourceVersion": resource_version }),
                    );
                }
            }
        }
    }

    if !request.dry_run {
        if let Err(err) = engine.cluster().update_resource(resource_ref, &desired).await {
            return ApplyOutcome::Failed {
                error: err.to_string(),
                retryable: err.is_transient(),
            };
        }
    }
    ApplyOutcome::Updated
}

/// Three-way merge the backup version into the live resource and apply it.
async fn merge_resource(
    engine: &Arc<RestoreEngine>,
    request: &RestoreRequest,
    resource: &BackupResource,
    resource_ref: &ResourceRef,
    existing: &Value,
) -> ApplyOutcome {
    let result = engine
        .resolver()
        .merge(&resource.kind, existing, &resource.content);

    for conflict in &result.conflicts {
        metrics::record_merge_conflict(&resource.kind, conflict.resolution.as_str());
    }

    if !result.success {
        let error = result
            .failure_reason()
            .unwrap_or_else(|| "merge refused by immutable fields".to_string());
        return ApplyOutcome::Failed {
            error,
            retryable: false,
        };
    }

    if !request.dry_run {
        if let Err(err) = engine
            .cluster()
            .update_resource(resource_ref, &result.resource)
            .await
        {
            return ApplyOutcome::Failed {
                error: err.to_string(),
                retryable: err.is_transient(),
            };
        }
    }
    ApplyOutcome::Merged
}
