// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Merge rules for `Deployment` resources.
//!
//! A backup's replica count is stale by definition: an autoscaler or operator
//! in the live cluster likely owns it. The live count is therefore preserved
//! and the divergence recorded as a conflict, while the rest of the spec
//! (including the pod template) follows the backup.

use super::{generic, ChangeAction, ConflictResolution, MergeContext};
use serde_json::Value;

/// Merge a desired Deployment into the live one.
pub(super) fn merge_deployment(
    ctx: &mut MergeContext<'_>,
    merged: &mut Value,
    existing: &Value,
    desired: &Value,
) {
    super::merge_metadata(ctx, merged, desired);

    let existing_replicas = existing.pointer("/spec/replicas");
    let desired_replicas = desired.pointer("/spec/replicas");
    if let (Some(existing_replicas), Some(desired_replicas)) =
        (existing_replicas, desired_replicas)
    {
        if existing_replicas != desired_replicas {
            ctx.record_conflict(
                "spec.replicas",
                existing_replicas,
                desired_replicas,
                ConflictResolution::KeepExisting,
                "replica count is owned by the live cluster",
            );
            ctx.record_change(
                "spec.replicas",
                Some(desired_replicas),
                Some(existing_replicas),
                ChangeAction::Preserved,
            );
        }
    }

    // handled above; the generic walk must not copy the backup's count
    ctx.extra_ignores.push("spec.replicas".to_string());

    generic::merge_top_level(ctx, merged, desired);
}

#[cfg(test)]
#[path = "workload_tests.rs"]
mod workload_tests;
