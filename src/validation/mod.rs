// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Pre-flight validation of restore requests.
//!
//! The validator inspects a restore request and the target cluster and
//! produces a scored [`ValidationReport`] sufficient to decide whether the
//! restore can proceed safely. It never mutates cluster state.
//!
//! # Check Sequence
//!
//! 1. **Cluster access** - list namespaces; failure is fatal and aborts the run
//! 2. **Cluster info** - server version, counts, API enumeration, platform
//! 3. **Backup metadata** - identity fields, archive presence, manifest parse
//! 4. **Target namespaces** - DNS-1123 syntax, existence
//! 5. **Permissions** - self-subject-access-review over a fixed verb matrix
//! 6. **API compatibility** - discovery probes plus the deprecated-API table
//! 7. **Storage** - storage class presence and default-class marker
//!
//! Every check after the first continues past individual failures; findings
//! accumulate in the report. The cancellation token is honoured between
//! checks so a cancelled operation stops probing promptly.

mod cluster;
mod compat;
mod permissions;
pub mod report;
mod storage;

pub use report::{
    ApiVersionCheck, ClusterInfo, CompatibilityCheck, ResourcesSummary, Severity,
    ValidationIssue, ValidationReport,
};

use crate::backup::{BackupArchive, BackupStore};
use crate::cluster::ClusterApi;
use crate::constants::{
    DNS1123_LABEL_MAX_LEN, PERMISSION_CHECK_RESOURCES, PERMISSION_CHECK_VERBS,
};
use crate::metrics;
use crate::types::{BackupResource, RestoreRequest};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// An API version/kind pair that Kubernetes has deprecated and removed.
#[derive(Clone, Debug)]
pub struct DeprecatedApi {
    /// The removed API version (e.g. `extensions/v1beta1`)
    pub api_version: String,
    /// The kind served under it
    pub kind: String,
    /// What to use instead
    pub migration_hint: String,
}

/// Deprecated-and-removed APIs the validator knows out of the box.
#[must_use]
pub fn default_deprecated_apis() -> Vec<DeprecatedApi> {
    let table = [
        ("extensions/v1beta1", "Ingress", "Use networking.k8s.io/v1 Ingress"),
        ("extensions/v1beta1", "Deployment", "Use apps/v1 Deployment"),
        ("extensions/v1beta1", "DaemonSet", "Use apps/v1 DaemonSet"),
        ("extensions/v1beta1", "ReplicaSet", "Use apps/v1 ReplicaSet"),
        ("networking.k8s.io/v1beta1", "Ingress", "Use networking.k8s.io/v1 Ingress"),
        ("apps/v1beta1", "Deployment", "Use apps/v1 Deployment"),
        ("apps/v1beta1", "StatefulSet", "Use apps/v1 StatefulSet"),
        ("apps/v1beta2", "Deployment", "Use apps/v1 Deployment"),
        ("policy/v1beta1", "PodSecurityPolicy", "Migrate to Pod Security Admission"),
        ("batch/v1beta1", "CronJob", "Use batch/v1 CronJob"),
    ];
    table
        .iter()
        .map(|(api_version, kind, hint)| DeprecatedApi {
            api_version: (*api_version).to_string(),
            kind: (*kind).to_string(),
            migration_hint: (*hint).to_string(),
        })
        .collect()
}

/// API pairs probed when the backup archive cannot be read.
const FALLBACK_COMPAT_APIS: &[(&str, &str)] = &[
    ("apps/v1", "Deployment"),
    ("v1", "Service"),
    ("v1", "ConfigMap"),
    ("v1", "Secret"),
    ("v1", "PersistentVolumeClaim"),
    ("networking.k8s.io/v1", "Ingress"),
];

/// Engine-wide validator configuration.
#[derive(Clone, Debug)]
pub struct ValidatorConfig {
    /// Resources probed by the permission matrix
    pub permission_resources: Vec<String>,
    /// Verbs probed by the permission matrix
    pub permission_verbs: Vec<String>,
    /// Known deprecated-and-removed APIs
    pub deprecated_apis: Vec<DeprecatedApi>,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        ValidatorConfig {
            permission_resources: PERMISSION_CHECK_RESOURCES
                .iter()
                .map(ToString::to_string)
                .collect(),
            permission_verbs: PERMISSION_CHECK_VERBS
                .iter()
                .map(ToString::to_string)
                .collect(),
            deprecated_apis: default_deprecated_apis(),
        }
    }
}

/// Pre-flight validator over a cluster handle and backup storage.
///
/// Stateless across calls; one instance serves all operations concurrently.
pub struct Validator {
    cluster: Arc<dyn ClusterApi>,
    backups: Arc<BackupStore>,
    config: ValidatorConfig,
}

impl Validator {
    /// Create a validator with default configuration.
    #[must_use]
    pub fn new(cluster: Arc<dyn ClusterApi>, backups: Arc<BackupStore>) -> Self {
        Validator {
            cluster,
            backups,
            config: ValidatorConfig::default(),
        }
    }

    /// Create a validator with explicit configuration.
    #[must_use]
    pub fn with_config(
        cluster: Arc<dyn ClusterApi>,
        backups: Arc<BackupStore>,
        config: ValidatorConfig,
    ) -> Self {
        Validator {
            cluster,
            backups,
            config,
        }
    }

    /// Run the full check sequence for a restore request.
    ///
    /// Always returns a report; catastrophic cluster inaccessibility is
    /// reported as a critical finding with the remaining checks skipped.
    pub async fn validate(
        &self,
        request: &RestoreRequest,
        cancel: &CancellationToken,
    ) -> ValidationReport {
        let started = Instant::now();
        let mut report = ValidationReport::new();

        info!(
            cluster = %request.cluster_name,
            backup = %request.backup_id,
            "Starting pre-flight validation"
        );

        // 1. Cluster access - fatal on failure
        let namespaces =
            match cluster::check_cluster_access(self.cluster.as_ref(), &mut report).await {
                Some(namespaces) => namespaces,
                None => {
                    report.finalize();
                    metrics::record_validation(&request.cluster_name, report.valid, started.elapsed());
                    return report;
                }
            };

        // 2. Cluster info
        if cancel.is_cancelled() {
            report.finalize();
            return report;
        }
        match cluster::collect_cluster_info(self.cluster.as_ref(), namespaces.len()).await {
            Ok(info) => report.cluster_info = Some(info),
            Err(err) => report.add_warning(
                ValidationIssue::new(
                    "cluster_info_unavailable",
                    format!("could not gather cluster facts: {err}"),
                    Severity::Low,
                ),
            ),
        }

        // 3. Backup metadata
        if cancel.is_cancelled() {
            report.finalize();
            return report;
        }
        let archive = self.check_backup(request, &mut report).await;
        if let Some(archive) = &archive {
            report.resources_summary = Some(summarize_resources(&archive.resources));
        }

        // 4. Target namespaces
        check_namespaces(&request.target_namespaces, &namespaces, &mut report);

        // 5. Permissions
        if cancel.is_cancelled() {
            report.finalize();
            return report;
        }
        permissions::check_permissions(
            self.cluster.as_ref(),
            &self.config,
            request
                .target_namespaces
                .iter()
                .find(|ns| ns.as_str() != "*")
                .map(String::as_str),
            &mut report,
        )
        .await;

        // 6. API compatibility
        if cancel.is_cancelled() {
            report.finalize();
            return report;
        }
        let gvks = archive.as_ref().map_or_else(fallback_gvks, |archive| {
            referenced_gvks(&archive.resources)
        });
        let api_checks = compat::check_api_compatibility(
            self.cluster.as_ref(),
            &self.config.deprecated_apis,
            &gvks,
            &mut report,
        )
        .await;

        // 7. Storage
        if cancel.is_cancelled() {
            report.finalize();
            return report;
        }
        let (storage_available, default_class) =
            storage::check_storage(self.cluster.as_ref(), &mut report).await;

        let target_version = report
            .cluster_info
            .as_ref()
            .map(|info| info.server_version.clone())
            .unwrap_or_default();
        let mut features = BTreeMap::new();
        features.insert(
            "customResources".to_string(),
            self.cluster
                .has_api("apiextensions.k8s.io/v1", "CustomResourceDefinition")
                .await
                .unwrap_or(false),
        );
        report.compatibility = Some(CompatibilityCheck {
            backup_kubernetes_version: archive
                .as_ref()
                .and_then(|a| a.manifest.as_ref())
                .and_then(|m| m.metadata.get("kubernetesVersion").cloned()),
            target_kubernetes_version: target_version,
            api_checks,
            features,
            storage_classes_available: storage_available,
            default_storage_class: default_class,
        });

        report.finalize();
        metrics::record_validation(&request.cluster_name, report.valid, started.elapsed());
        info!(
            cluster = %request.cluster_name,
            errors = report.errors.len(),
            warnings = report.warnings.len(),
            score = report.score,
            "Pre-flight validation finished"
        );
        report
    }

    /// Gather cluster facts for the cluster inspection endpoints.
    ///
    /// # Errors
    ///
    /// Returns the underlying cluster error when the API server is unreachable.
    pub async fn cluster_overview(
        &self,
    ) -> Result<ClusterInfo, crate::errors::ClusterError> {
        let namespaces = self.cluster.list_namespaces().await?;
        cluster::collect_cluster_info(self.cluster.as_ref(), namespaces.len()).await
    }

    /// Run only the cluster-side checks: access, facts, permissions, storage.
    ///
    /// Used by the cluster validation and readiness endpoints, which have no
    /// backup in hand.
    pub async fn cluster_readiness(&self, cluster_name: &str) -> ValidationReport {
        let started = Instant::now();
        let mut report = ValidationReport::new();

        let namespaces =
            match cluster::check_cluster_access(self.cluster.as_ref(), &mut report).await {
                Some(namespaces) => namespaces,
                None => {
                    report.finalize();
                    metrics::record_validation(cluster_name, report.valid, started.elapsed());
                    return report;
                }
            };

        match cluster::collect_cluster_info(self.cluster.as_ref(), namespaces.len()).await {
            Ok(info) => report.cluster_info = Some(info),
            Err(err) => report.add_warning(ValidationIssue::new(
                "cluster_info_unavailable",
                format!("could not gather cluster facts: {err}"),
                Severity::Low,
            )),
        }

        permissions::check_permissions(self.cluster.as_ref(), &self.config, None, &mut report)
            .await;
        storage::check_storage(self.cluster.as_ref(), &mut report).await;

        report.finalize();
        metrics::record_validation(cluster_name, report.valid, started.elapsed());
        report
    }

    /// Verify backup identity fields and archive readability.
    async fn check_backup(
        &self,
        request: &RestoreRequest,
        report: &mut ValidationReport,
    ) -> Option<BackupArchive> {
        let mut identity_ok = true;
        if request.backup_id.trim().is_empty() {
            report.add_error(ValidationIssue::new(
                "backup_id_missing",
                "request carries no backup id",
                Severity::Critical,
            ));
            identity_ok = false;
        }
        if request.cluster_name.trim().is_empty() {
            report.add_error(ValidationIssue::new(
                "cluster_name_missing",
                "request carries no cluster name",
                Severity::Critical,
            ));
            identity_ok = false;
        }
        if !identity_ok {
            return None;
        }

        match self
            .backups
            .load_archive(&request.cluster_name, &request.backup_id)
            .await
        {
            Ok(archive) => {
                if archive.manifest.is_none() {
                    report.add_error(ValidationIssue::new(
                        "backup_manifest_missing",
                        format!(
                            "backup '{}' carries no parseable manifest",
                            request.backup_id
                        ),
                        Severity::High,
                    ));
                }
                Some(archive)
            }
            Err(err) => {
                report.add_error(
                    ValidationIssue::new("backup_unreadable", err.to_string(), Severity::Critical)
                        .with_suggestions(&[
                            "Check that the backup id and cluster name are correct",
                            "Check object storage connectivity",
                        ]),
                );
                None
            }
        }
    }
}

/// Validate namespace names and warn about namespaces to be created.
fn check_namespaces(
    targets: &[String],
    existing: &[String],
    report: &mut ValidationReport,
) {
    for namespace in targets {
        if namespace == "*" {
            continue;
        }
        if !is_dns1123_label(namespace) {
            report.add_error(
                ValidationIssue::new(
                    "namespace_invalid",
                    format!("'{namespace}' is not a legal namespace name"),
                    Severity::High,
                )
                .with_namespace(namespace.clone())
                .with_suggestions(&[
                    "Namespace names must be DNS-1123 labels: 1-63 lowercase alphanumerics or '-', starting and ending with an alphanumeric",
                ]),
            );
        } else if !existing.iter().any(|ns| ns == namespace) {
            report.add_warning(
                ValidationIssue::new(
                    "namespace_missing",
                    format!("namespace '{namespace}' does not exist and will be created"),
                    Severity::Low,
                )
                .with_namespace(namespace.clone()),
            );
        }
    }
}

/// Whether `name` is a legal DNS-1123 label.
pub(crate) fn is_dns1123_label(name: &str) -> bool {
    if name.is_empty() || name.len() > DNS1123_LABEL_MAX_LEN {
        return false;
    }
    let bytes = name.as_bytes();
    if bytes[0] == b'-' || bytes[bytes.len() - 1] == b'-' {
        return false;
    }
    bytes
        .iter()
        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || *b == b'-')
}

/// Summarize what the backup contains for the report.
fn summarize_resources(resources: &[BackupResource]) -> ResourcesSummary {
    let mut summary = ResourcesSummary {
        total: resources.len(),
        ..ResourcesSummary::default()
    };
    for resource in resources {
        *summary.by_kind.entry(resource.kind.clone()).or_default() += 1;
        match &resource.namespace {
            Some(namespace) => {
                *summary.by_namespace.entry(namespace.clone()).or_default() += 1;
                summary.namespaced += 1;
            }
            None => summary.cluster_scoped += 1,
        }
    }
    summary
}

/// Unique apiVersion/kind pairs referenced by the backup, in first-seen order.
fn referenced_gvks(resources: &[BackupResource]) -> Vec<(String, String)> {
    let mut seen = Vec::new();
    for resource in resources {
        let pair = (resource.api_version.clone(), resource.kind.clone());
        if !seen.contains(&pair) {
            seen.push(pair);
        }
    }
    debug!(count = seen.len(), "Collected API pairs referenced by backup");
    seen
}

/// The declared probe set used when the backup cannot be read.
fn fallback_gvks() -> Vec<(String, String)> {
    FALLBACK_COMPAT_APIS
        .iter()
        .map(|(api_version, kind)| ((*api_version).to_string(), (*kind).to_string()))
        .collect()
}
