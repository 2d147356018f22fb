// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Restore operation lifecycle management.
//!
//! The engine owns two collections: the active-registry (restore id to live
//! [`Operation`]) and the bounded history of finished operations. An
//! operation is present in the registry exactly while its status is
//! non-terminal; when its worker finishes, the operation is removed and a
//! trimmed [`RestoreRecord`](crate::types::RestoreRecord) is appended to
//! history, evicting the oldest row beyond the retention bound.
//!
//! Each accepted request runs on its own worker task. Within one operation,
//! resources apply sequentially in backup order; across operations nothing
//! is serialized, not even per target cluster.

pub mod filter;
mod operation;
mod worker;

pub use operation::Operation;

use crate::backup::BackupStore;
use crate::cluster::ClusterApi;
use crate::constants::{DEFAULT_HISTORY_LIMIT, DEFAULT_HISTORY_RETENTION, MAX_HISTORY_LIMIT, RESTORE_ID_PREFIX};
use crate::errors::{EngineError, RequestError, SecurityError};
use crate::merge::ConflictResolver;
use crate::metrics;
use crate::types::{RestoreOperationView, RestoreRecord, RestoreRequest};
use crate::validation::Validator;
use async_trait::async_trait;
use futures::FutureExt;
use std::collections::{HashMap, VecDeque};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

/// External security collaborator consulted before a restore is accepted.
#[async_trait]
pub trait SecurityPolicy: Send + Sync {
    /// Authorize a restore request; errors surface as 401 immediately.
    async fn authorize(&self, request: &RestoreRequest) -> Result<(), SecurityError>;
}

/// Policy that accepts every request.
///
/// Deployments put real authorization in front of the API surface; this
/// default keeps the engine usable without one.
pub struct AllowAllPolicy;

#[async_trait]
impl SecurityPolicy for AllowAllPolicy {
    async fn authorize(&self, _request: &RestoreRequest) -> Result<(), SecurityError> {
        Ok(())
    }
}

/// Engine-wide configuration.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// How many history records to retain (FIFO eviction beyond this)
    pub history_retention: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            history_retention: DEFAULT_HISTORY_RETENTION,
        }
    }
}

/// The restore engine: accepts requests, runs workers, serves status.
pub struct RestoreEngine {
    cluster: Arc<dyn ClusterApi>,
    backups: Arc<BackupStore>,
    validator: Arc<Validator>,
    resolver: ConflictResolver,
    security: Arc<dyn SecurityPolicy>,
    config: EngineConfig,
    active: RwLock<HashMap<String, Arc<Operation>>>,
    history: RwLock<VecDeque<RestoreRecord>>,
}

impl RestoreEngine {
    /// Create an engine with default resolver, security policy, and config.
    #[must_use]
    pub fn new(
        cluster: Arc<dyn ClusterApi>,
        backups: Arc<BackupStore>,
        validator: Arc<Validator>,
    ) -> Arc<Self> {
        Self::with_options(
            cluster,
            backups,
            validator,
            ConflictResolver::default(),
            Arc::new(AllowAllPolicy),
            EngineConfig::default(),
        )
    }

    /// Create an engine with explicit collaborators and configuration.
    #[must_use]
    pub fn with_options(
        cluster: Arc<dyn ClusterApi>,
        backups: Arc<BackupStore>,
        validator: Arc<Validator>,
        resolver: ConflictResolver,
        security: Arc<dyn SecurityPolicy>,
        config: EngineConfig,
    ) -> Arc<Self> {
        Arc::new(RestoreEngine {
            cluster,
            backups,
            validator,
            resolver,
            security,
            config,
            active: RwLock::new(HashMap::new()),
            history: RwLock::new(VecDeque::new()),
        })
    }

    pub(crate) fn cluster(&self) -> &Arc<dyn ClusterApi> {
        &self.cluster
    }

    pub(crate) fn backups(&self) -> &Arc<BackupStore> {
        &self.backups
    }

    pub(crate) fn validator(&self) -> &Arc<Validator> {
        &self.validator
    }

    pub(crate) fn resolver(&self) -> &ConflictResolver {
        &self.resolver
    }

    /// Accept a restore request and spawn its worker.
    ///
    /// Validates request shape, consults the security collaborator, refuses
    /// duplicate active ids, registers the operation, and returns a snapshot
    /// immediately; the worker runs in the background.
    ///
    /// # Errors
    ///
    /// - [`EngineError::Request`] when identity fields are missing
    /// - [`EngineError::Security`] when the security collaborator refuses
    /// - [`EngineError::DuplicateRestore`] when the id is already active
    pub async fn start_restore(
        self: &Arc<Self>,
        mut request: RestoreRequest,
    ) -> Result<RestoreOperationView, EngineError> {
        if request.restore_id.trim().is_empty() {
            request.restore_id = format!("{RESTORE_ID_PREFIX}{}", uuid::Uuid::new_v4());
        }
        if request.backup_id.trim().is_empty() {
            return Err(RequestError::MissingField {
                field: "backupId".to_string(),
            }
            .into());
        }
        if request.cluster_name.trim().is_empty() {
            return Err(RequestError::MissingField {
                field: "clusterName".to_string(),
            }
            .into());
        }

        self.security.authorize(&request).await?;

        let operation = Arc::new(Operation::new(request));
        let restore_id = operation.restore_id().to_string();

        {
            let mut active = self.active.write().await;
            if active.contains_key(&restore_id) {
                return Err(EngineError::DuplicateRestore { restore_id });
            }
            active.insert(restore_id.clone(), Arc::clone(&operation));
        }

        metrics::record_restore_started(
            &operation.request().cluster_name,
            operation.request().restore_mode.as_str(),
        );
        info!(
            restore_id = %restore_id,
            cluster = %operation.request().cluster_name,
            backup = %operation.request().backup_id,
            mode = operation.request().restore_mode.as_str(),
            dry_run = operation.request().dry_run,
            "Accepted restore operation"
        );

        let engine = Arc::clone(self);
        let worker_op = Arc::clone(&operation);
        tokio::spawn(async move {
            let outcome = AssertUnwindSafe(worker::run(Arc::clone(&engine), Arc::clone(&worker_op)))
                .catch_unwind()
                .await;
            if let Err(panic) = outcome {
                let message = panic
                    .downcast_ref::<&str>()
                    .map(ToString::to_string)
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "worker panicked".to_string());
                error!(
                    restore_id = worker_op.restore_id(),
                    panic = %message,
                    "Restore worker panicked"
                );
                worker_op.add_error("panic", message, false);
                worker_op.finalize(crate::types::RestoreStatus::Failed);
            }
            engine.finish_operation(&worker_op).await;
        });

        Ok(operation.snapshot())
    }

    /// Snapshot an active operation.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotFound`] when no active operation carries the
    /// id; finished operations are served through [`history`](Self::history).
    pub async fn restore_status(&self, restore_id: &str) -> Result<RestoreOperationView, EngineError> {
        let active = self.active.read().await;
        active
            .get(restore_id)
            .map(|op| op.snapshot())
            .ok_or_else(|| EngineError::NotFound {
                restore_id: restore_id.to_string(),
            })
    }

    /// Signal cancellation for an operation. Idempotent.
    ///
    /// Cancelling an operation that already finished (and moved to history)
    /// is a no-op; an id the engine has never seen is an error.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotFound`] for unknown ids.
    pub async fn cancel_restore(&self, restore_id: &str) -> Result<(), EngineError> {
        {
            let active = self.active.read().await;
            if let Some(operation) = active.get(restore_id) {
                info!(restore_id = %restore_id, "Cancelling restore operation");
                operation.trigger_cancel();
                return Ok(());
            }
        }

        let history = self.history.read().await;
        if history.iter().any(|record| record.restore_id == restore_id) {
            return Ok(());
        }
        Err(EngineError::NotFound {
            restore_id: restore_id.to_string(),
        })
    }

    /// Snapshots of all active operations.
    pub async fn list_active(&self) -> Vec<RestoreOperationView> {
        let active = self.active.read().await;
        active.values().map(|op| op.snapshot()).collect()
    }

    /// Finished operations, most recent first.
    ///
    /// `limit` defaults to 50 and is capped at 500.
    pub async fn history(&self, limit: Option<usize>) -> Vec<RestoreRecord> {
        let limit = limit.unwrap_or(DEFAULT_HISTORY_LIMIT).min(MAX_HISTORY_LIMIT);
        let history = self.history.read().await;
        history.iter().rev().take(limit).cloned().collect()
    }

    /// Fetch an active operation handle; used by tests to await completion.
    pub async fn operation(&self, restore_id: &str) -> Option<Arc<Operation>> {
        self.active.read().await.get(restore_id).cloned()
    }

    /// Move a finished operation from the registry into history.
    async fn finish_operation(&self, operation: &Arc<Operation>) {
        if !operation.is_terminal() {
            // the worker exited without finalizing, which is a bug upstream
            warn!(
                restore_id = operation.restore_id(),
                "Worker returned without a terminal status; marking failed"
            );
            operation.add_error("incomplete", "worker exited without finalizing", false);
            operation.finalize(crate::types::RestoreStatus::Failed);
        }

        let record = operation.to_record();
        let duration = std::time::Duration::from_secs_f64(record.summary.duration_secs.max(0.0));
        metrics::record_restore_completed(
            &record.cluster_name,
            record.status.as_str(),
            duration,
        );
        info!(
            restore_id = %record.restore_id,
            status = record.status.as_str(),
            processed = record.summary.processed,
            successful = record.summary.successful,
            failed = record.summary.failed,
            skipped = record.summary.skipped,
            "Restore operation finished"
        );

        {
            let mut active = self.active.write().await;
            active.remove(operation.restore_id());
        }
        {
            let mut history = self.history.write().await;
            history.push_back(record);
            while history.len() > self.config.history_retention {
                history.pop_front();
            }
        }
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod mod_tests;
