// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! In-memory state of a single restore operation.
//!
//! An [`Operation`] is created by the engine, mutated exclusively by its
//! worker task, and observed by API readers through point-in-time
//! [`RestoreOperationView`] snapshots taken under the operation-local lock,
//! so readers never see torn counters. The cancellation token and the
//! completion channel are the only cross-task signals.

use crate::types::{
    BackupResource, FailedResource, OperationError, RestoreOperationView, RestoreProgress,
    RestoreRecord, RestoreRequest, RestoreStatus, RestoreSummary, RestoredResource,
    SkippedResource,
};
use crate::validation::ValidationReport;
use chrono::{DateTime, Utc};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Mutable operation state, guarded by the operation-local lock.
struct OperationState {
    status: RestoreStatus,
    start_time: DateTime<Utc>,
    end_time: Option<DateTime<Utc>>,
    progress: RestoreProgress,
    restored: Vec<RestoredResource>,
    skipped: Vec<SkippedResource>,
    failed: Vec<FailedResource>,
    validation_report: Option<ValidationReport>,
    errors: Vec<OperationError>,
}

/// A live restore operation.
pub struct Operation {
    request: RestoreRequest,
    cancel: CancellationToken,
    done_tx: watch::Sender<bool>,
    done_rx: watch::Receiver<bool>,
    state: RwLock<OperationState>,
}

impl Operation {
    /// Create a pending operation for a submitted request.
    #[must_use]
    pub fn new(request: RestoreRequest) -> Self {
        let (done_tx, done_rx) = watch::channel(false);
        Operation {
            request,
            cancel: CancellationToken::new(),
            done_tx,
            done_rx,
            state: RwLock::new(OperationState {
                status: RestoreStatus::Pending,
                start_time: Utc::now(),
                end_time: None,
                progress: RestoreProgress::default(),
                restored: Vec::new(),
                skipped: Vec::new(),
                failed: Vec::new(),
                validation_report: None,
                errors: Vec::new(),
            }),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, OperationState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, OperationState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// The originating request.
    #[must_use]
    pub fn request(&self) -> &RestoreRequest {
        &self.request
    }

    /// The operation's restore identifier.
    #[must_use]
    pub fn restore_id(&self) -> &str {
        &self.request.restore_id
    }

    /// The operation's cancellation token.
    #[must_use]
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Signal cancellation; the worker observes it at its next poll point.
    pub fn trigger_cancel(&self) {
        self.cancel.cancel();
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn status(&self) -> RestoreStatus {
        self.read().status
    }

    /// Whether the operation has reached a terminal state.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.status().is_terminal()
    }

    /// When the operation was accepted.
    #[must_use]
    pub fn start_time(&self) -> DateTime<Utc> {
        self.read().start_time
    }

    /// Move to `next` if the state machine permits it.
    ///
    /// Returns whether the transition was applied. Illegal transitions are
    /// logged and ignored, never applied.
    pub fn transition(&self, next: RestoreStatus) -> bool {
        let mut state = self.write();
        if !state.status.can_transition_to(next) {
            debug!(
                restore_id = %self.request.restore_id,
                from = state.status.as_str(),
                to = next.as_str(),
                "Ignoring illegal status transition"
            );
            return false;
        }
        state.status = next;
        true
    }

    /// Attach the pre-flight validation report.
    pub fn set_validation_report(&self, report: ValidationReport) {
        self.write().validation_report = Some(report);
    }

    /// Set the number of resources selected for this restore.
    pub fn set_total(&self, total: u64) {
        let mut state = self.write();
        state.progress.total_resources = total;
        state.progress.update_percent();
    }

    /// Publish which resource the worker is about to apply.
    pub fn begin_resource(&self, resource: &BackupResource) {
        let mut state = self.write();
        state.progress.current_namespace = resource.namespace.clone();
        state.progress.current_resource = Some(format!("{}/{}", resource.kind, resource.name));
    }

    /// Record a successful apply (`created`, `updated`, or `merged`).
    pub fn record_restored(&self, resource: &BackupResource, action: &str) {
        let mut state = self.write();
        state.restored.push(RestoredResource {
            api_version: resource.api_version.clone(),
            kind: resource.kind.clone(),
            namespace: resource.namespace.clone(),
            name: resource.name.clone(),
            action: action.to_string(),
        });
        state.progress.successful += 1;
        Self::complete_resource(&mut state, resource);
    }

    /// Record a skipped resource.
    pub fn record_skipped(&self, resource: &BackupResource, reason: &str) {
        let mut state = self.write();
        state.skipped.push(SkippedResource {
            api_version: resource.api_version.clone(),
            kind: resource.kind.clone(),
            namespace: resource.namespace.clone(),
            name: resource.name.clone(),
            reason: reason.to_string(),
        });
        state.progress.skipped += 1;
        Self::complete_resource(&mut state, resource);
    }

    /// Record a failed resource.
    pub fn record_failed(&self, resource: &BackupResource, error: &str, retryable: bool) {
        let mut state = self.write();
        state.failed.push(FailedResource {
            api_version: resource.api_version.clone(),
            kind: resource.kind.clone(),
            namespace: resource.namespace.clone(),
            name: resource.name.clone(),
            error: error.to_string(),
            retryable,
        });
        state.progress.failed += 1;
        Self::complete_resource(&mut state, resource);
    }

    /// Shared tail of every outcome: processed count, breakdown, percent.
    fn complete_resource(state: &mut OperationState, resource: &BackupResource) {
        state.progress.processed += 1;
        *state
            .progress
            .resource_breakdown
            .entry(resource.gvk_key())
            .or_default() += 1;
        state.progress.update_percent();
    }

    /// Attach a top-level operation error.
    pub fn add_error(&self, error_type: &str, message: impl Into<String>, recoverable: bool) {
        self.write().errors.push(OperationError {
            error_type: error_type.to_string(),
            message: message.into(),
            recoverable,
            timestamp: Utc::now(),
        });
    }

    /// Enter a terminal state, stamp the end time, and signal completion.
    ///
    /// Safe to call once per operation; later calls on an already-terminal
    /// operation are ignored.
    pub fn finalize(&self, status: RestoreStatus) {
        {
            let mut state = self.write();
            if state.status.is_terminal() {
                return;
            }
            if state.status.can_transition_to(status) {
                state.status = status;
            } else {
                // a finalization target is always terminal; failed/cancelled
                // are reachable from anywhere, so this only guards Completed
                state.status = RestoreStatus::Failed;
            }
            state.end_time = Some(Utc::now());
        }
        let _ = self.done_tx.send(true);
    }

    /// Wait until the operation reaches a terminal state.
    pub async fn wait_terminal(&self) {
        let mut rx = self.done_rx.clone();
        // wait_for returns immediately when the value is already true
        let _ = rx.wait_for(|done| *done).await;
    }

    /// Point-in-time snapshot for API consumers.
    #[must_use]
    pub fn snapshot(&self) -> RestoreOperationView {
        let state = self.read();
        RestoreOperationView {
            request: self.request.clone(),
            status: state.status,
            start_time: state.start_time,
            end_time: state.end_time,
            progress: state.progress.clone(),
            restored_resources: state.restored.clone(),
            skipped_resources: state.skipped.clone(),
            failed_resources: state.failed.clone(),
            validation_report: state.validation_report.clone(),
            errors: state.errors.clone(),
        }
    }

    /// Build the trimmed history row for a finished operation.
    #[must_use]
    pub fn to_record(&self) -> RestoreRecord {
        let state = self.read();
        let end_time = state.end_time.unwrap_or_else(Utc::now);
        let duration_secs = (end_time - state.start_time)
            .to_std()
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0);
        RestoreRecord {
            restore_id: self.request.restore_id.clone(),
            backup_id: self.request.backup_id.clone(),
            cluster_name: self.request.cluster_name.clone(),
            status: state.status,
            start_time: state.start_time,
            end_time,
            summary: RestoreSummary::from_progress(&state.progress, duration_secs),
            request_fingerprint: self.request.fingerprint(),
        }
    }
}

#[cfg(test)]
#[path = "operation_tests.rs"]
mod operation_tests;
