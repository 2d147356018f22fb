// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for the generic recursive merge.

use super::super::{ChangeAction, ConflictResolution, ConflictResolver, MergeOptions};
use serde_json::json;

fn resolver_without_force() -> ConflictResolver {
    ConflictResolver::new(MergeOptions {
        force_fields: Vec::new(),
        ..MergeOptions::default()
    })
}

#[test]
fn test_scalar_divergence_records_use_desired_conflict() {
    let existing = json!({"metadata": {"name": "x"}, "spec": {"schedule": "0 * * * *"}});
    let desired = json!({"metadata": {"name": "x"}, "spec": {"schedule": "30 * * * *"}});

    let result = resolver_without_force().merge("CronJob", &existing, &desired);

    assert_eq!(
        result.resource.pointer("/spec/schedule"),
        Some(&json!("30 * * * *"))
    );
    let conflict = result
        .conflicts
        .iter()
        .find(|c| c.field == "spec.schedule")
        .expect("divergence should record a conflict");
    assert_eq!(conflict.resolution, ConflictResolution::UseDesired);
    let change = result
        .changes
        .iter()
        .find(|c| c.field == "spec.schedule")
        .unwrap();
    assert_eq!(change.action, ChangeAction::Modified);
}

#[test]
fn test_forced_path_records_no_conflict() {
    let existing = json!({"metadata": {"name": "x"}, "spec": {"schedule": "0 * * * *"}});
    let desired = json!({"metadata": {"name": "x"}, "spec": {"schedule": "30 * * * *"}});

    // Default options force everything under `spec`
    let result = ConflictResolver::default().merge("CronJob", &existing, &desired);

    assert_eq!(
        result.resource.pointer("/spec/schedule"),
        Some(&json!("30 * * * *"))
    );
    assert!(result.conflicts.is_empty());
    let change = result
        .changes
        .iter()
        .find(|c| c.field == "spec.schedule")
        .unwrap();
    assert_eq!(change.action, ChangeAction::Forced);
}

#[test]
fn test_nested_maps_recurse_instead_of_replacing() {
    let existing = json!({
        "metadata": {"name": "x"},
        "spec": {
            "template": {"spec": {"nodeSelector": {"zone": "a"}, "hostNetwork": true}}
        }
    });
    let desired = json!({
        "metadata": {"name": "x"},
        "spec": {
            "template": {"spec": {"nodeSelector": {"zone": "b"}}}
        }
    });

    let result = ConflictResolver::default().merge("CronJob", &existing, &desired);

    assert_eq!(
        result.resource.pointer("/spec/template/spec/nodeSelector/zone"),
        Some(&json!("b"))
    );
    // existing-only fields survive a recursive merge
    assert_eq!(
        result.resource.pointer("/spec/template/spec/hostNetwork"),
        Some(&json!(true))
    );
}

#[test]
fn test_desired_only_key_is_added() {
    let existing = json!({"metadata": {"name": "x"}, "spec": {}});
    let desired = json!({"metadata": {"name": "x"}, "spec": {"suspend": true}});

    let result = resolver_without_force().merge("CronJob", &existing, &desired);

    assert_eq!(result.resource.pointer("/spec/suspend"), Some(&json!(true)));
    let change = result
        .changes
        .iter()
        .find(|c| c.field == "spec.suspend")
        .unwrap();
    assert_eq!(change.action, ChangeAction::Added);
}

#[test]
fn test_ingress_uses_generic_rules() {
    let existing = json!({
        "apiVersion": "networking.k8s.io/v1",
        "kind": "Ingress",
        "metadata": {"name": "web"},
        "spec": {"ingressClassName": "nginx"}
    });
    let desired = json!({
        "apiVersion": "networking.k8s.io/v1",
        "kind": "Ingress",
        "metadata": {"name": "web"},
        "spec": {"ingressClassName": "traefik"}
    });

    let result = ConflictResolver::default().merge("Ingress", &existing, &desired);

    assert_eq!(result.strategy, "ingress");
    assert!(result.success);
    assert_eq!(
        result.resource.pointer("/spec/ingressClassName"),
        Some(&json!("traefik"))
    );
}
