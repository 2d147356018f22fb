// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Disaster-recovery scenario endpoints.
//!
//! A scenario is a named preset that projects a recovery intent into a
//! concrete restore request. The mapping from scenario to restore mode and
//! conflict strategy is fixed; callers supply only the backup identity and
//! optional scope.

use super::{respond, respond_error, respond_error_parts, ApiState};
use crate::types::{ConflictStrategy, RestoreMode, RestoreRequest};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Response;
use axum::Json;
use serde::{Deserialize, Serialize};

/// A named disaster-recovery preset.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioDescriptor {
    /// Scenario identifier (e.g. `cluster_rebuild`)
    pub id: String,
    /// Display name
    pub name: String,
    /// What the scenario is for
    pub description: String,
    /// Restore mode the scenario projects to
    pub restore_mode: RestoreMode,
    /// Conflict strategy the scenario projects to
    pub conflict_strategy: ConflictStrategy,
}

/// The fixed scenario table.
#[must_use]
pub fn scenarios() -> Vec<ScenarioDescriptor> {
    vec![
        ScenarioDescriptor {
            id: "cluster_rebuild".to_string(),
            name: "Cluster rebuild".to_string(),
            description: "Rebuild an empty replacement cluster from the last full backup"
                .to_string(),
            restore_mode: RestoreMode::Complete,
            conflict_strategy: ConflictStrategy::Overwrite,
        },
        ScenarioDescriptor {
            id: "namespace_recovery".to_string(),
            name: "Namespace recovery".to_string(),
            description: "Recover selected namespaces, preserving healthy live state".to_string(),
            restore_mode: RestoreMode::Selective,
            conflict_strategy: ConflictStrategy::Merge,
        },
        ScenarioDescriptor {
            id: "data_corruption".to_string(),
            name: "Data corruption rollback".to_string(),
            description: "Replace corrupted cluster state wholesale from a known-good backup"
                .to_string(),
            restore_mode: RestoreMode::Complete,
            conflict_strategy: ConflictStrategy::Overwrite,
        },
        ScenarioDescriptor {
            id: "configuration_rollback".to_string(),
            name: "Configuration rollback".to_string(),
            description: "Roll back configuration resources while keeping runtime state"
                .to_string(),
            restore_mode: RestoreMode::Selective,
            conflict_strategy: ConflictStrategy::Merge,
        },
    ]
}

/// Request body for executing a scenario.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrRequest {
    /// Scenario identifier from [`scenarios`]
    pub scenario: String,
    /// Backup to restore from
    pub backup_id: String,
    /// Source cluster of the backup
    pub cluster_name: String,
    /// Explicit restore id; generated when absent
    #[serde(default)]
    pub restore_id: Option<String>,
    /// Namespaces to recover; empty means all
    #[serde(default)]
    pub target_namespaces: Vec<String>,
    /// Rehearse without writing
    #[serde(default)]
    pub dry_run: bool,
}

/// Project a scenario request into a restore request.
///
/// Returns `None` for an unknown scenario id.
#[must_use]
pub fn build_request(dr: &DrRequest) -> Option<RestoreRequest> {
    let scenario = scenarios().into_iter().find(|s| s.id == dr.scenario)?;
    Some(RestoreRequest {
        restore_id: dr.restore_id.clone().unwrap_or_default(),
        backup_id: dr.backup_id.clone(),
        cluster_name: dr.cluster_name.clone(),
        target_namespaces: dr.target_namespaces.clone(),
        restore_mode: scenario.restore_mode,
        conflict_strategy: scenario.conflict_strategy,
        dry_run: dr.dry_run,
        metadata: std::collections::BTreeMap::from([(
            "drScenario".to_string(),
            scenario.id.clone(),
        )]),
        ..RestoreRequest::default()
    })
}

/// `GET /api/v1/dr/scenarios` - the scenario table.
pub(super) async fn list_scenarios() -> Response {
    respond(StatusCode::OK, scenarios())
}

/// `POST /api/v1/dr/execute` - build and submit a scenario restore.
pub(super) async fn execute_scenario(
    State(state): State<ApiState>,
    Json(dr): Json<DrRequest>,
) -> Response {
    let Some(request) = build_request(&dr) else {
        return respond_error_parts(
            400,
            "validation_error",
            format!("unknown disaster-recovery scenario '{}'", dr.scenario),
            None,
        );
    };

    match state.engine.start_restore(request).await {
        Ok(view) => respond(StatusCode::ACCEPTED, view),
        Err(err) => respond_error(&err),
    }
}

#[cfg(test)]
#[path = "dr_tests.rs"]
mod dr_tests;
