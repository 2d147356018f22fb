// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Validation report types and scoring.
//!
//! A report collects typed findings from every pre-flight check, summarizes
//! what the backup contains and what the cluster offers, and derives a 0-100
//! score for human triage. The score never gates execution by itself; strict
//! validation refuses execution on any error regardless of score.

use crate::constants::{SCORE_ERROR_WEIGHT, SCORE_WARNING_WEIGHT};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// How serious a validation finding is.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Informational; restore is unaffected
    Low,
    /// May degrade the restored workload
    Medium,
    /// Likely to fail part of the restore
    High,
    /// The restore cannot proceed
    Critical,
}

/// A single typed validation finding.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationIssue {
    /// Stable finding code (e.g. `cluster_unreachable`, `permission_missing`)
    pub code: String,
    /// Human-readable description
    pub message: String,
    /// How serious the finding is
    pub severity: Severity,
    /// Resource kind or name the finding concerns, when scoped
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,
    /// Namespace the finding concerns, when scoped
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    /// Concrete remediation suggestions
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub suggestions: Vec<String>,
}

impl ValidationIssue {
    /// Build a finding with no resource scope.
    #[must_use]
    pub fn new(code: &str, message: impl Into<String>, severity: Severity) -> Self {
        ValidationIssue {
            code: code.to_string(),
            message: message.into(),
            severity,
            resource: None,
            namespace: None,
            suggestions: Vec::new(),
        }
    }

    /// Attach a resource scope.
    #[must_use]
    pub fn with_resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = Some(resource.into());
        self
    }

    /// Attach a namespace scope.
    #[must_use]
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Attach remediation suggestions.
    #[must_use]
    pub fn with_suggestions(mut self, suggestions: &[&str]) -> Self {
        self.suggestions = suggestions.iter().map(ToString::to_string).collect();
        self
    }
}

/// What the backup contains, broken down for the report.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourcesSummary {
    /// Total resource documents
    pub total: usize,
    /// Counts keyed by kind
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub by_kind: BTreeMap<String, usize>,
    /// Counts keyed by namespace
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub by_namespace: BTreeMap<String, usize>,
    /// Resources without a namespace
    pub cluster_scoped: usize,
    /// Resources with a namespace
    pub namespaced: usize,
}

/// Facts gathered about the target cluster.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterInfo {
    /// API server version string (e.g. `v1.31.2`)
    pub server_version: String,
    /// Detected platform (`openshift`, `eks`, `gke`, `aks`, or `kubernetes`)
    pub platform: String,
    /// Number of nodes
    pub node_count: usize,
    /// Number of namespaces
    pub namespace_count: usize,
    /// Preferred API group-versions served by the cluster
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub api_versions: Vec<String>,
}

/// Availability verdict for one apiVersion/kind pair referenced by the backup.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiVersionCheck {
    /// API version checked (e.g. `extensions/v1beta1`)
    pub api_version: String,
    /// Kind checked
    pub kind: String,
    /// Whether the cluster serves this pair
    pub available: bool,
    /// Whether the pair is a known deprecated-and-removed API
    pub deprecated: bool,
    /// Replacement hint for deprecated pairs
    #[serde(skip_serializing_if = "Option::is_none")]
    pub migration_hint: Option<String>,
}

/// Compatibility facts between the backup's needs and the cluster's offer.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompatibilityCheck {
    /// Kubernetes version recorded in the backup manifest, when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backup_kubernetes_version: Option<String>,
    /// Kubernetes version of the target cluster
    pub target_kubernetes_version: String,
    /// Per-API availability verdicts
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub api_checks: Vec<ApiVersionCheck>,
    /// Relevant feature availability (e.g. `customResources`)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub features: BTreeMap<String, bool>,
    /// Whether any storage class exists
    pub storage_classes_available: bool,
    /// Whether a default storage class exists
    pub default_storage_class: bool,
}

/// Scored outcome of a pre-flight validation run.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    /// `true` when no errors were found
    pub valid: bool,
    /// Findings that block or are likely to break the restore
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ValidationIssue>,
    /// Findings worth surfacing that do not block the restore
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<ValidationIssue>,
    /// What the backup contains
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resources_summary: Option<ResourcesSummary>,
    /// Facts about the target cluster
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cluster_info: Option<ClusterInfo>,
    /// Compatibility verdicts
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compatibility: Option<CompatibilityCheck>,
    /// Weighted 0-100 triage score
    pub score: f64,
}

impl ValidationReport {
    /// Start an empty report; call [`finalize`](Self::finalize) after checks.
    #[must_use]
    pub fn new() -> Self {
        ValidationReport::default()
    }

    /// Record an error finding.
    pub fn add_error(&mut self, issue: ValidationIssue) {
        self.errors.push(issue);
    }

    /// Record a warning finding.
    pub fn add_warning(&mut self, issue: ValidationIssue) {
        self.warnings.push(issue);
    }

    /// Compute `valid` and the weighted score from the recorded findings.
    ///
    /// `score = max(0, 100 * (W - weighted) / W)` with
    /// `weighted = errors * 1.0 + warnings * 0.3` and `W = errors + warnings`.
    /// An empty finding set scores 100.
    pub fn finalize(&mut self) {
        self.valid = self.errors.is_empty();
        self.score = score(self.errors.len(), self.warnings.len());
    }
}

/// Weighted validation score over finding counts.
#[must_use]
pub fn score(errors: usize, warnings: usize) -> f64 {
    let total = errors + warnings;
    if total == 0 {
        return 100.0;
    }
    #[allow(clippy::cast_precision_loss)]
    let weighted = errors as f64 * SCORE_ERROR_WEIGHT + warnings as f64 * SCORE_WARNING_WEIGHT;
    #[allow(clippy::cast_precision_loss)]
    let max_weight = total as f64;
    (100.0 * (max_weight - weighted) / max_weight).max(0.0)
}

#[cfg(test)]
#[path = "report_tests.rs"]
mod report_tests;
