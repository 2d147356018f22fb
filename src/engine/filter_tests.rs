// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for restore scope filtering.

use super::filter_resources;
use crate::selector::{LabelSelector, LabelSelectorRequirement};
use crate::types::{BackupResource, RestoreRequest};
use serde_json::json;
use std::collections::BTreeMap;

fn resource(kind: &str, namespace: Option<&str>, name: &str, labels: &[(&str, &str)]) -> BackupResource {
    let label_map: serde_json::Map<String, serde_json::Value> = labels
        .iter()
        .map(|(k, v)| ((*k).to_string(), json!(v)))
        .collect();
    BackupResource {
        api_version: "v1".to_string(),
        kind: kind.to_string(),
        namespace: namespace.map(String::from),
        name: name.to_string(),
        content: json!({
            "apiVersion": "v1",
            "kind": kind,
            "metadata": {"name": name, "labels": label_map}
        }),
        metadata: BTreeMap::new(),
    }
}

fn backup() -> Vec<BackupResource> {
    vec![
        resource("Namespace", None, "shop", &[]),
        resource("ConfigMap", Some("shop"), "cfg", &[("app", "web")]),
        resource("ConfigMap", Some("billing"), "cfg", &[("app", "billing")]),
        resource("Service", Some("shop"), "web", &[("app", "web")]),
    ]
}

#[test]
fn test_no_filters_passes_everything_in_order() {
    let request = RestoreRequest::default();
    let filtered = filter_resources(&request, backup());
    let names: Vec<&str> = filtered.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["shop", "cfg", "cfg", "web"]);
}

#[test]
fn test_wildcard_namespace_passes_everything() {
    let request = RestoreRequest {
        target_namespaces: vec!["*".to_string()],
        ..RestoreRequest::default()
    };
    assert_eq!(filter_resources(&request, backup()).len(), 4);
}

#[test]
fn test_namespace_filter_keeps_cluster_scoped_resources() {
    let request = RestoreRequest {
        target_namespaces: vec!["shop".to_string()],
        ..RestoreRequest::default()
    };
    let filtered = filter_resources(&request, backup());
    let names: Vec<&str> = filtered.iter().map(|r| r.name.as_str()).collect();
    // the billing ConfigMap is dropped; the cluster-scoped Namespace survives
    assert_eq!(names, vec!["shop", "cfg", "web"]);
}

#[test]
fn test_kind_filter() {
    let request = RestoreRequest {
        resource_types: vec!["ConfigMap".to_string()],
        ..RestoreRequest::default()
    };
    let filtered = filter_resources(&request, backup());
    assert_eq!(filtered.len(), 2);
    assert!(filtered.iter().all(|r| r.kind == "ConfigMap"));
}

#[test]
fn test_label_selector_filter() {
    let request = RestoreRequest {
        label_selector: Some(LabelSelector {
            match_labels: Some(BTreeMap::from([("app".to_string(), "web".to_string())])),
            match_expressions: None,
        }),
        ..RestoreRequest::default()
    };
    let filtered = filter_resources(&request, backup());
    let names: Vec<&str> = filtered.iter().map(|r| r.name.as_str()).collect();
    // the unlabeled Namespace does not match app=web
    assert_eq!(names, vec!["cfg", "web"]);
}

#[test]
fn test_match_expressions_filter() {
    let request = RestoreRequest {
        label_selector: Some(LabelSelector {
            match_labels: None,
            match_expressions: Some(vec![LabelSelectorRequirement {
                key: "app".to_string(),
                operator: "In".to_string(),
                values: Some(vec!["web".to_string(), "billing".to_string()]),
            }]),
        }),
        ..RestoreRequest::default()
    };
    let filtered = filter_resources(&request, backup());
    assert_eq!(filtered.len(), 3);
}

#[test]
fn test_filters_compose() {
    let request = RestoreRequest {
        target_namespaces: vec!["shop".to_string()],
        resource_types: vec!["Service".to_string()],
        ..RestoreRequest::default()
    };
    let filtered = filter_resources(&request, backup());
    assert_eq!(filtered.len(), 1);
    assert_eq!(filtered[0].name, "web");
}
