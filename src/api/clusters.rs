// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Cluster inspection endpoints, delegating to the validator.

use super::{respond, respond_error, ApiState};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Response;
use serde::Serialize;

/// `GET /api/v1/clusters` - facts about the connected cluster.
///
/// The engine holds one cluster handle, so the listing carries one entry.
pub(super) async fn list_clusters(State(state): State<ApiState>) -> Response {
    match state.validator.cluster_overview().await {
        Ok(info) => respond(StatusCode::OK, vec![info]),
        Err(err) => respond_error(&err.into()),
    }
}

/// `POST /api/v1/clusters/{name}/validate` - run the cluster-side checks.
pub(super) async fn validate_cluster(
    State(state): State<ApiState>,
    Path(name): Path<String>,
) -> Response {
    let report = state.validator.cluster_readiness(&name).await;
    respond(StatusCode::OK, report)
}

/// Condensed readiness verdict.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct ReadinessSummary {
    cluster_name: String,
    ready: bool,
    score: f64,
    error_count: usize,
    warning_count: usize,
}

/// `GET /api/v1/clusters/{name}/readiness` - boiled-down readiness verdict.
pub(super) async fn cluster_readiness(
    State(state): State<ApiState>,
    Path(name): Path<String>,
) -> Response {
    let report = state.validator.cluster_readiness(&name).await;
    respond(
        StatusCode::OK,
        ReadinessSummary {
            cluster_name: name,
            ready: report.valid,
            score: report.score,
            error_count: report.errors.len(),
            warning_count: report.warnings.len(),
        },
    )
}
