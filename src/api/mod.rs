// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! HTTP surface for the restore engine.
//!
//! A thin request/response layer: handlers validate request shape, delegate
//! to the engine or its collaborators, and wrap every payload in the uniform
//! envelope `{success, data?, error?, message?, timestamp, requestId}`.
//! Authentication middleware is wired in front of this router by the
//! deployment, not here.

mod backups;
mod clusters;
mod dr;
mod restore;

pub use dr::{DrRequest, ScenarioDescriptor};

use crate::backup::BackupStore;
use crate::constants::{API_BASE_PATH, METRICS_SERVER_PATH};
use crate::engine::RestoreEngine;
use crate::errors::EngineError;
use crate::metrics;
use crate::validation::Validator;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct ApiState {
    /// The restore engine
    pub engine: Arc<RestoreEngine>,
    /// Pre-flight validator for the validate-only and cluster endpoints
    pub validator: Arc<Validator>,
    /// Backup storage for the backup listing endpoints
    pub backups: Arc<BackupStore>,
}

/// Uniform response envelope.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T: Serialize> {
    /// Whether the call succeeded
    pub success: bool,
    /// Payload on success
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    /// Error details on failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiErrorBody>,
    /// Optional human-readable note
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// When the response was produced
    pub timestamp: DateTime<Utc>,
    /// Unique id for correlating logs with this response
    pub request_id: String,
}

/// Error details inside the envelope.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiErrorBody {
    /// Stable error code (e.g. `not_found`, `conflict`)
    pub code: String,
    /// Human-readable description
    pub message: String,
    /// Resource or namespace context, when available
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// A success response with the given status code.
pub(crate) fn respond<T: Serialize>(status: StatusCode, data: T) -> Response {
    let body = ApiResponse {
        success: true,
        data: Some(data),
        error: None,
        message: None,
        timestamp: Utc::now(),
        request_id: uuid::Uuid::new_v4().to_string(),
    };
    (status, Json(body)).into_response()
}

/// A success response with a note instead of a payload.
pub(crate) fn respond_message(status: StatusCode, message: impl Into<String>) -> Response {
    let body: ApiResponse<serde_json::Value> = ApiResponse {
        success: true,
        data: None,
        error: None,
        message: Some(message.into()),
        timestamp: Utc::now(),
        request_id: uuid::Uuid::new_v4().to_string(),
    };
    (status, Json(body)).into_response()
}

/// An error response from an engine error.
pub(crate) fn respond_error(err: &EngineError) -> Response {
    respond_error_parts(err.http_status(), err.error_code(), err.to_string(), None)
}

/// An error response from explicit parts.
pub(crate) fn respond_error_parts(
    status: u16,
    code: &str,
    message: String,
    details: Option<serde_json::Value>,
) -> Response {
    let body: ApiResponse<serde_json::Value> = ApiResponse {
        success: false,
        data: None,
        error: Some(ApiErrorBody {
            code: code.to_string(),
            message,
            details,
        }),
        message: None,
        timestamp: Utc::now(),
        request_id: uuid::Uuid::new_v4().to_string(),
    };
    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(body)).into_response()
}

/// Build the full API router.
#[must_use]
pub fn router(state: ApiState) -> Router {
    let api = Router::new()
        .route(
            "/restore",
            post(restore::submit_restore).get(restore::list_active),
        )
        .route("/restore/history", get(restore::history))
        .route("/restore/validate", post(restore::validate_only))
        .route("/restore/plan", post(restore::plan))
        .route(
            "/restore/{id}",
            get(restore::get_restore).delete(restore::cancel_restore),
        )
        .route("/dr/execute", post(dr::execute_scenario))
        .route("/dr/scenarios", get(dr::list_scenarios))
        .route("/backups", get(backups::list_backups))
        .route("/backups/{id}", get(backups::get_backup))
        .route("/backups/{id}/validate", post(backups::validate_backup))
        .route("/clusters", get(clusters::list_clusters))
        .route("/clusters/{name}/validate", post(clusters::validate_cluster))
        .route("/clusters/{name}/readiness", get(clusters::cluster_readiness))
        .with_state(state);

    Router::new()
        .nest(API_BASE_PATH, api)
        .route(METRICS_SERVER_PATH, get(serve_metrics))
        .route("/healthz", get(healthz))
}

/// Liveness probe.
async fn healthz() -> &'static str {
    "ok"
}

/// Prometheus metrics in text format.
async fn serve_metrics() -> Response {
    match metrics::gather_metrics() {
        Ok(text) => (StatusCode::OK, text).into_response(),
        Err(err) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("metrics encoding failed: {err}"),
        )
            .into_response(),
    }
}
