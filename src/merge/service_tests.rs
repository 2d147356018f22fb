// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for the Service merge rules.

use super::super::{ConflictResolution, ConflictResolver};
use serde_json::json;

#[test]
fn test_cluster_ip_and_node_port_survive_merge() {
    let existing = json!({
        "apiVersion": "v1",
        "kind": "Service",
        "metadata": {"name": "api", "namespace": "shop"},
        "spec": {
            "clusterIP": "10.0.0.7",
            "ports": [
                {"name": "http", "port": 80, "protocol": "TCP", "nodePort": 30080}
            ]
        }
    });
    let desired = json!({
        "apiVersion": "v1",
        "kind": "Service",
        "metadata": {"name": "api", "namespace": "shop"},
        "spec": {
            "clusterIP": "10.0.0.99",
            "ports": [
                {"name": "http", "port": 80, "protocol": "TCP"}
            ]
        }
    });

    let result = ConflictResolver::default().merge("Service", &existing, &desired);

    assert!(result.success);
    assert_eq!(
        result.resource.pointer("/spec/clusterIP"),
        Some(&json!("10.0.0.7"))
    );
    assert_eq!(
        result.resource.pointer("/spec/ports/0/nodePort"),
        Some(&json!(30080))
    );

    let conflict = result
        .conflicts
        .iter()
        .find(|c| c.field == "spec.clusterIP")
        .expect("clusterIP divergence should record a conflict");
    assert_eq!(conflict.resolution, ConflictResolution::KeepExisting);
}

#[test]
fn test_ports_match_by_composite_key_with_tcp_default() {
    let existing = json!({
        "metadata": {"name": "api"},
        "spec": {
            "ports": [
                // protocol omitted - defaults to TCP for matching
                {"name": "http", "port": 80, "nodePort": 31000},
                {"name": "dns", "port": 53, "protocol": "UDP", "nodePort": 31053}
            ]
        }
    });
    let desired = json!({
        "metadata": {"name": "api"},
        "spec": {
            "ports": [
                {"name": "http", "port": 80, "protocol": "TCP"},
                {"name": "dns", "port": 53, "protocol": "UDP"},
                {"name": "metrics", "port": 9090, "protocol": "TCP"}
            ]
        }
    });

    let result = ConflictResolver::default().merge("Service", &existing, &desired);

    let ports = result
        .resource
        .pointer("/spec/ports")
        .and_then(|v| v.as_array())
        .unwrap();
    assert_eq!(ports.len(), 3);
    assert_eq!(ports[0].get("nodePort"), Some(&json!(31000)));
    assert_eq!(ports[1].get("nodePort"), Some(&json!(31053)));
    // no live counterpart - no nodePort to carry over
    assert_eq!(ports[2].get("nodePort"), None);
}

#[test]
fn test_desired_port_fields_win() {
    let existing = json!({
        "metadata": {"name": "api"},
        "spec": {
            "ports": [{"name": "http", "port": 80, "protocol": "TCP", "targetPort": 8080}]
        }
    });
    let desired = json!({
        "metadata": {"name": "api"},
        "spec": {
            "ports": [{"name": "http", "port": 80, "protocol": "TCP", "targetPort": 9090}]
        }
    });

    let result = ConflictResolver::default().merge("Service", &existing, &desired);

    assert_eq!(
        result.resource.pointer("/spec/ports/0/targetPort"),
        Some(&json!(9090))
    );
}
