// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for cluster fact gathering and platform detection.

use super::{check_cluster_access, collect_cluster_info};
use crate::cluster::NodeInfo;
use crate::testing::FakeCluster;
use crate::validation::ValidationReport;

#[tokio::test]
async fn test_access_check_returns_namespaces() {
    let cluster = FakeCluster::new();
    let mut report = ValidationReport::new();

    let namespaces = check_cluster_access(&cluster, &mut report).await;

    assert_eq!(
        namespaces.unwrap(),
        vec!["default".to_string(), "kube-system".to_string()]
    );
    assert!(report.errors.is_empty());
}

#[tokio::test]
async fn test_access_failure_is_critical_with_suggestions() {
    let mut cluster = FakeCluster::new();
    cluster.unreachable = true;
    let mut report = ValidationReport::new();

    let namespaces = check_cluster_access(&cluster, &mut report).await;

    assert!(namespaces.is_none());
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].code, "cluster_unreachable");
    assert!(!report.errors[0].suggestions.is_empty());
}

#[tokio::test]
async fn test_collect_cluster_info() {
    let cluster = FakeCluster::new();

    let info = collect_cluster_info(&cluster, 2).await.unwrap();

    assert_eq!(info.server_version, "v1.31.0");
    assert_eq!(info.node_count, 1);
    assert_eq!(info.namespace_count, 2);
    assert_eq!(info.platform, "kubernetes");
    assert!(info.api_versions.contains(&"apps/v1".to_string()));
}

#[tokio::test]
async fn test_platform_detection_from_provider_prefix() {
    for (provider_id, expected) in [
        ("aws:///us-east-1a/i-0abc123", "eks"),
        ("gce://project/zone/instance", "gke"),
        ("azure:///subscriptions/abc/vm", "aks"),
    ] {
        let mut cluster = FakeCluster::new();
        cluster.nodes = vec![NodeInfo {
            name: "node-1".to_string(),
            provider_id: Some(provider_id.to_string()),
        }];

        let info = collect_cluster_info(&cluster, 1).await.unwrap();
        assert_eq!(info.platform, expected, "provider {provider_id}");
    }
}

#[tokio::test]
async fn test_platform_detection_openshift_wins() {
    let mut cluster = FakeCluster::new();
    cluster
        .available_apis
        .push(("config.openshift.io/v1".to_string(), "ClusterVersion".to_string()));
    cluster.nodes = vec![NodeInfo {
        name: "node-1".to_string(),
        provider_id: Some("aws:///us-east-1a/i-0abc".to_string()),
    }];

    let info = collect_cluster_info(&cluster, 1).await.unwrap();
    assert_eq!(info.platform, "openshift");
}
