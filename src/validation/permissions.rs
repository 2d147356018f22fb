// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! RBAC sufficiency probing via self-subject-access-review.

use super::{Severity, ValidationIssue, ValidationReport, ValidatorConfig};
use crate::cluster::ClusterApi;
use tracing::debug;

/// Probe the configured `(resource x verb)` matrix.
///
/// Namespaced resources are probed in the first target namespace when one is
/// given; `namespaces` itself is always probed cluster-wide. Denied probes
/// become high-severity errors; probes the API server refuses to answer are
/// recorded as warnings so a broken authorizer does not masquerade as a
/// permission grant.
pub(super) async fn check_permissions(
    api: &dyn ClusterApi,
    config: &ValidatorConfig,
    target_namespace: Option<&str>,
    report: &mut ValidationReport,
) {
    for resource in &config.permission_resources {
        let namespace = if resource == "namespaces" {
            None
        } else {
            target_namespace
        };

        for verb in &config.permission_verbs {
            match api.allowed(verb, resource, namespace).await {
                Ok(true) => {}
                Ok(false) => {
                    report.add_error(
                        ValidationIssue::new(
                            "permission_missing",
                            format!("not permitted to {verb} {resource}"),
                            Severity::High,
                        )
                        .with_resource(resource.clone())
                        .with_suggestions(&[
                            "Grant the restore service account a role covering this verb",
                        ]),
                    );
                }
                Err(err) => {
                    debug!(
                        resource = %resource,
                        verb = %verb,
                        error = %err,
                        "Permission probe failed"
                    );
                    report.add_warning(
                        ValidationIssue::new(
                            "permission_check_failed",
                            format!("could not check {verb} on {resource}: {err}"),
                            Severity::Medium,
                        )
                        .with_resource(resource.clone()),
                    );
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "permissions_tests.rs"]
mod permissions_tests;
