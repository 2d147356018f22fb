// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! API availability and deprecation checks.

use super::{ApiVersionCheck, DeprecatedApi, Severity, ValidationIssue, ValidationReport};
use crate::cluster::ClusterApi;

/// Probe every referenced apiVersion/kind pair against discovery.
///
/// Known deprecated-and-removed pairs produce high-severity errors carrying a
/// migration hint when the cluster no longer serves them, and warnings when
/// it (still) does. Unknown-but-available pairs produce no finding.
pub(super) async fn check_api_compatibility(
    api: &dyn ClusterApi,
    deprecated_table: &[DeprecatedApi],
    gvks: &[(String, String)],
    report: &mut ValidationReport,
) -> Vec<ApiVersionCheck> {
    let mut checks = Vec::with_capacity(gvks.len());

    for (api_version, kind) in gvks {
        let available = api.has_api(api_version, kind).await.unwrap_or(false);
        let deprecated = deprecated_table
            .iter()
            .find(|d| &d.api_version == api_version && &d.kind == kind);

        match (available, deprecated) {
            (false, Some(deprecated)) => {
                report.add_error(
                    ValidationIssue::new(
                        "api_deprecated",
                        format!(
                            "{api_version} {kind} has been removed from Kubernetes"
                        ),
                        Severity::High,
                    )
                    .with_resource(kind.clone())
                    .with_suggestions(&[deprecated.migration_hint.as_str()]),
                );
            }
            (true, Some(deprecated)) => {
                report.add_warning(
                    ValidationIssue::new(
                        "api_deprecated",
                        format!("{api_version} {kind} is deprecated"),
                        Severity::Medium,
                    )
                    .with_resource(kind.clone())
                    .with_suggestions(&[deprecated.migration_hint.as_str()]),
                );
            }
            (false, None) => {
                report.add_error(
                    ValidationIssue::new(
                        "api_unavailable",
                        format!("cluster does not serve {api_version} {kind}"),
                        Severity::High,
                    )
                    .with_resource(kind.clone())
                    .with_suggestions(&[
                        "Install the CRD or controller providing this API before restoring",
                    ]),
                );
            }
            (true, None) => {}
        }

        checks.push(ApiVersionCheck {
            api_version: api_version.clone(),
            kind: kind.clone(),
            available,
            deprecated: deprecated.is_some(),
            migration_hint: deprecated.map(|d| d.migration_hint.clone()),
        });
    }

    checks
}

#[cfg(test)]
#[path = "compat_tests.rs"]
mod compat_tests;
