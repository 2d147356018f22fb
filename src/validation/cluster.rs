// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Cluster reachability and fact gathering.

use super::{ClusterInfo, Severity, ValidationIssue, ValidationReport};
use crate::cluster::{ClusterApi, NodeInfo};
use crate::errors::ClusterError;
use tracing::debug;

/// Probe cluster access by listing namespaces.
///
/// Returns the namespace names on success; on failure records a critical
/// finding and returns `None`, which aborts the remaining checks.
pub(super) async fn check_cluster_access(
    api: &dyn ClusterApi,
    report: &mut ValidationReport,
) -> Option<Vec<String>> {
    match api.list_namespaces().await {
        Ok(namespaces) => Some(namespaces),
        Err(err) => {
            report.add_error(
                ValidationIssue::new(
                    "cluster_unreachable",
                    format!("cannot list namespaces: {err}"),
                    Severity::Critical,
                )
                .with_suggestions(&[
                    "Check kubeconfig credentials",
                    "Check network connectivity to the API server",
                ]),
            );
            None
        }
    }
}

/// Gather server version, counts, served APIs, and the platform flavour.
pub(super) async fn collect_cluster_info(
    api: &dyn ClusterApi,
    namespace_count: usize,
) -> Result<ClusterInfo, ClusterError> {
    let server_version = api.server_version().await?;
    let nodes = api.list_nodes().await?;
    let api_versions = api.preferred_api_versions().await?;
    let platform = detect_platform(api, &nodes).await;

    debug!(
        version = %server_version,
        platform = %platform,
        nodes = nodes.len(),
        "Collected cluster facts"
    );

    Ok(ClusterInfo {
        server_version,
        platform,
        node_count: nodes.len(),
        namespace_count,
        api_versions,
    })
}

/// Identify the platform flavour.
///
/// OpenShift is probed through its config API; the managed clouds are
/// identified from the first node's provider id prefix.
async fn detect_platform(api: &dyn ClusterApi, nodes: &[NodeInfo]) -> String {
    if api
        .has_api("config.openshift.io/v1", "ClusterVersion")
        .await
        .unwrap_or(false)
    {
        return "openshift".to_string();
    }

    let provider = nodes
        .first()
        .and_then(|node| node.provider_id.as_deref())
        .and_then(|id| id.split(':').next())
        .unwrap_or_default();

    match provider {
        "aws" => "eks".to_string(),
        "gce" => "gke".to_string(),
        "azure" => "aks".to_string(),
        _ => "kubernetes".to_string(),
    }
}

#[cfg(test)]
#[path = "cluster_tests.rs"]
mod cluster_tests;
