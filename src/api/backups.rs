// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Backup inspection endpoints, delegating to the backup storage collaborator.

use super::{respond, respond_error, respond_error_parts, ApiState};
use crate::backup::BackupInfo;
use crate::types::BackupManifest;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Response;
use serde::{Deserialize, Serialize};

/// Query parameters for the backup listing.
#[derive(Debug, Deserialize)]
pub(super) struct ListParams {
    cluster: Option<String>,
}

/// `GET /api/v1/backups?cluster=...` - enumerate stored backups.
pub(super) async fn list_backups(
    State(state): State<ApiState>,
    Query(params): Query<ListParams>,
) -> Response {
    match state.backups.list_backups(params.cluster.as_deref()).await {
        Ok(backups) => respond(StatusCode::OK, backups),
        Err(err) => respond_error(&err.into()),
    }
}

/// Backup identity plus its manifest.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct BackupDetails {
    #[serde(flatten)]
    info: BackupInfo,
    manifest: BackupManifest,
}

/// Find a backup by id across all clusters.
async fn find_backup(state: &ApiState, backup_id: &str) -> Result<Option<BackupInfo>, Response> {
    match state.backups.list_backups(None).await {
        Ok(backups) => Ok(backups.into_iter().find(|b| b.backup_id == backup_id)),
        Err(err) => Err(respond_error(&err.into())),
    }
}

/// `GET /api/v1/backups/{id}` - backup details including the manifest.
pub(super) async fn get_backup(
    State(state): State<ApiState>,
    Path(backup_id): Path<String>,
) -> Response {
    let info = match find_backup(&state, &backup_id).await {
        Ok(Some(info)) => info,
        Ok(None) => {
            return respond_error_parts(
                404,
                "not_found",
                format!("backup '{backup_id}' not found"),
                None,
            )
        }
        Err(response) => return response,
    };

    match state
        .backups
        .load_manifest(&info.cluster_name, &info.backup_id)
        .await
    {
        Ok(manifest) => respond(StatusCode::OK, BackupDetails { info, manifest }),
        Err(err) => respond_error(&err.into()),
    }
}

/// `POST /api/v1/backups/{id}/validate` - validate a stored backup.
pub(super) async fn validate_backup(
    State(state): State<ApiState>,
    Path(backup_id): Path<String>,
) -> Response {
    let info = match find_backup(&state, &backup_id).await {
        Ok(Some(info)) => info,
        Ok(None) => {
            return respond_error_parts(
                404,
                "not_found",
                format!("backup '{backup_id}' not found"),
                None,
            )
        }
        Err(response) => return response,
    };

    match state
        .backups
        .validate_backup(&info.cluster_name, &info.backup_id)
        .await
    {
        Ok(validation) => respond(StatusCode::OK, validation),
        Err(err) => respond_error(&err.into()),
    }
}
