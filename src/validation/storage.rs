// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Storage class availability checks.

use super::{Severity, ValidationIssue, ValidationReport};
use crate::cluster::ClusterApi;

/// Check storage class presence and the default-class marker.
///
/// Returns `(any_class_exists, default_class_exists)` for the compatibility
/// block. Claims without an explicit `storageClassName` cannot bind without a
/// default class, hence the second warning.
pub(super) async fn check_storage(
    api: &dyn ClusterApi,
    report: &mut ValidationReport,
) -> (bool, bool) {
    let classes = match api.list_storage_classes().await {
        Ok(classes) => classes,
        Err(err) => {
            report.add_warning(ValidationIssue::new(
                "storage_check_failed",
                format!("could not list storage classes: {err}"),
                Severity::Medium,
            ));
            return (false, false);
        }
    };

    if classes.is_empty() {
        report.add_warning(
            ValidationIssue::new(
                "storage_class_missing",
                "cluster has no storage classes; persistent volume claims cannot bind",
                Severity::Medium,
            )
            .with_suggestions(&["Install a CSI driver and define a storage class"]),
        );
        return (false, false);
    }

    let has_default = classes.iter().any(|class| class.is_default);
    if !has_default {
        report.add_warning(
            ValidationIssue::new(
                "default_storage_class_missing",
                "no default storage class; claims without storageClassName will not bind",
                Severity::Medium,
            )
            .with_suggestions(&[
                "Annotate one class with storageclass.kubernetes.io/is-default-class=true",
            ]),
        );
    }

    (true, has_default)
}

#[cfg(test)]
#[path = "storage_tests.rs"]
mod storage_tests;
