// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Restore scope filtering.
//!
//! The request's scope filters are applied to the decoded backup before
//! execution: namespace targets (exact name or `*` wildcard), resource kinds,
//! and an optional label selector. Cluster-scoped resources are not subject
//! to namespace filtering; a backup that interleaves them with namespaced
//! resources keeps its apply order either way.

use crate::types::{BackupResource, RestoreRequest};

/// Apply the request's scope filters, preserving backup order.
#[must_use]
pub fn filter_resources(
    request: &RestoreRequest,
    resources: Vec<BackupResource>,
) -> Vec<BackupResource> {
    resources
        .into_iter()
        .filter(|resource| {
            namespace_matches(&request.target_namespaces, resource.namespace.as_deref())
                && kind_matches(&request.resource_types, &resource.kind)
                && selector_matches(request, resource)
        })
        .collect()
}

/// Whether a resource's namespace passes the target list.
fn namespace_matches(targets: &[String], namespace: Option<&str>) -> bool {
    if targets.is_empty() || targets.iter().any(|t| t == "*") {
        return true;
    }
    match namespace {
        Some(namespace) => targets.iter().any(|t| t == namespace),
        // cluster-scoped resources are never namespace-filtered
        None => true,
    }
}

/// Whether a resource's kind passes the kind list.
fn kind_matches(kinds: &[String], kind: &str) -> bool {
    kinds.is_empty() || kinds.iter().any(|k| k == kind)
}

/// Whether a resource's labels satisfy the request's label selector.
fn selector_matches(request: &RestoreRequest, resource: &BackupResource) -> bool {
    match &request.label_selector {
        Some(selector) => selector.matches(&resource.labels()),
        None => true,
    }
}

#[cfg(test)]
#[path = "filter_tests.rs"]
mod filter_tests;
