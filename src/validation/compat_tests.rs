// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for API availability and deprecation checks.

use super::check_api_compatibility;
use crate::testing::FakeCluster;
use crate::validation::{default_deprecated_apis, ValidationReport};

#[tokio::test]
async fn test_removed_deprecated_api_is_error_with_hint() {
    let cluster = FakeCluster::new();
    let table = default_deprecated_apis();
    let gvks = vec![("extensions/v1beta1".to_string(), "Ingress".to_string())];
    let mut report = ValidationReport::new();

    let checks = check_api_compatibility(&cluster, &table, &gvks, &mut report).await;

    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].code, "api_deprecated");
    assert!(report.errors[0]
        .suggestions
        .iter()
        .any(|s| s == "Use networking.k8s.io/v1 Ingress"));

    assert_eq!(checks.len(), 1);
    assert!(!checks[0].available);
    assert!(checks[0].deprecated);
    assert_eq!(
        checks[0].migration_hint.as_deref(),
        Some("Use networking.k8s.io/v1 Ingress")
    );
}

#[tokio::test]
async fn test_available_api_produces_no_finding() {
    let cluster = FakeCluster::new();
    let table = default_deprecated_apis();
    let gvks = vec![("apps/v1".to_string(), "Deployment".to_string())];
    let mut report = ValidationReport::new();

    let checks = check_api_compatibility(&cluster, &table, &gvks, &mut report).await;

    assert!(report.errors.is_empty());
    assert!(report.warnings.is_empty());
    assert!(checks[0].available);
    assert!(!checks[0].deprecated);
}

#[tokio::test]
async fn test_unknown_unavailable_api_is_error() {
    let cluster = FakeCluster::new();
    let table = default_deprecated_apis();
    let gvks = vec![("example.com/v1".to_string(), "Widget".to_string())];
    let mut report = ValidationReport::new();

    check_api_compatibility(&cluster, &table, &gvks, &mut report).await;

    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].code, "api_unavailable");
}

#[tokio::test]
async fn test_still_served_deprecated_api_is_warning() {
    let mut cluster = FakeCluster::new();
    cluster
        .available_apis
        .push(("extensions/v1beta1".to_string(), "Ingress".to_string()));
    let table = default_deprecated_apis();
    let gvks = vec![("extensions/v1beta1".to_string(), "Ingress".to_string())];
    let mut report = ValidationReport::new();

    check_api_compatibility(&cluster, &table, &gvks, &mut report).await;

    assert!(report.errors.is_empty());
    assert_eq!(report.warnings.len(), 1);
    assert_eq!(report.warnings[0].code, "api_deprecated");
}
