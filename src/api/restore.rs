// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Restore lifecycle endpoints.

use super::{respond, respond_error, respond_error_parts, respond_message, ApiState};
use crate::types::RestoreRequest;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Response;
use axum::Json;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

/// `POST /api/v1/restore` - accept a restore and start its worker.
pub(super) async fn submit_restore(
    State(state): State<ApiState>,
    Json(request): Json<RestoreRequest>,
) -> Response {
    match state.engine.start_restore(request).await {
        Ok(view) => respond(StatusCode::ACCEPTED, view),
        Err(err) => respond_error(&err),
    }
}

/// `GET /api/v1/restore/{id}` - snapshot one active operation.
pub(super) async fn get_restore(
    State(state): State<ApiState>,
    Path(restore_id): Path<String>,
) -> Response {
    match state.engine.restore_status(&restore_id).await {
        Ok(view) => respond(StatusCode::OK, view),
        Err(err) => respond_error(&err),
    }
}

/// `DELETE /api/v1/restore/{id}` - request cancellation.
pub(super) async fn cancel_restore(
    State(state): State<ApiState>,
    Path(restore_id): Path<String>,
) -> Response {
    match state.engine.cancel_restore(&restore_id).await {
        Ok(()) => respond_message(
            StatusCode::OK,
            format!("cancellation requested for '{restore_id}'"),
        ),
        Err(err) => respond_error(&err),
    }
}

/// `GET /api/v1/restore` - snapshots of all active operations.
pub(super) async fn list_active(State(state): State<ApiState>) -> Response {
    respond(StatusCode::OK, state.engine.list_active().await)
}

/// Query parameters for the history listing.
#[derive(Debug, Deserialize)]
pub(super) struct HistoryParams {
    limit: Option<usize>,
}

/// `GET /api/v1/restore/history?limit=N` - finished operations, newest first.
pub(super) async fn history(
    State(state): State<ApiState>,
    Query(params): Query<HistoryParams>,
) -> Response {
    respond(StatusCode::OK, state.engine.history(params.limit).await)
}

/// `POST /api/v1/restore/validate` - run validation only, no execution.
pub(super) async fn validate_only(
    State(state): State<ApiState>,
    Json(mut request): Json<RestoreRequest>,
) -> Response {
    request.dry_run = true;
    let report = state
        .validator
        .validate(&request, &CancellationToken::new())
        .await;
    respond(StatusCode::OK, report)
}

/// One phase of a restore plan.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct PlanPhase {
    name: String,
    description: String,
}

/// Deterministic execution plan for a restore request.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct RestorePlan {
    backup_id: String,
    cluster_name: String,
    phases: Vec<PlanPhase>,
    estimated_resources: u64,
    prerequisites: Vec<String>,
}

/// `POST /api/v1/restore/plan` - summarize what a restore would do.
///
/// Reads only the backup manifest; no cluster access, no side effects.
pub(super) async fn plan(
    State(state): State<ApiState>,
    Json(request): Json<RestoreRequest>,
) -> Response {
    if request.backup_id.is_empty() || request.cluster_name.is_empty() {
        return respond_error_parts(
            400,
            "validation_error",
            "backupId and clusterName are required".to_string(),
            None,
        );
    }

    let manifest = match state
        .backups
        .load_manifest(&request.cluster_name, &request.backup_id)
        .await
    {
        Ok(manifest) => manifest,
        Err(err) => return respond_error(&err.into()),
    };

    let estimated_resources = manifest
        .resource_counts
        .iter()
        .filter(|(kind, _)| {
            request.resource_types.is_empty() || request.resource_types.contains(kind)
        })
        .map(|(_, count)| *count)
        .sum();

    let phases = vec![
        PlanPhase {
            name: "validation".to_string(),
            description: "pre-flight cluster, permission, and compatibility checks".to_string(),
        },
        PlanPhase {
            name: "load".to_string(),
            description: "fetch and decode the backup archive from object storage".to_string(),
        },
        PlanPhase {
            name: "execution".to_string(),
            description: format!(
                "apply resources in backup order with the '{}' conflict strategy",
                request.conflict_strategy.as_str()
            ),
        },
        PlanPhase {
            name: "finalization".to_string(),
            description: "compute the summary and append the history record".to_string(),
        },
    ];

    respond(
        StatusCode::OK,
        RestorePlan {
            backup_id: request.backup_id.clone(),
            cluster_name: request.cluster_name.clone(),
            phases,
            estimated_resources,
            prerequisites: vec![
                "cluster reachable with restore permissions".to_string(),
                "backup archive present in object storage".to_string(),
                "target namespaces legal or creatable".to_string(),
            ],
        },
    )
}
