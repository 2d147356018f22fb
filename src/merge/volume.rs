// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Merge rules for `PersistentVolumeClaim` resources.
//!
//! `accessModes`, `storageClassName`, and `volumeMode` cannot change after a
//! claim is created. Divergence on any of them fails the merge so the caller
//! can recreate or skip instead of issuing an update the API server would
//! reject.

use super::{generic, ConflictResolution, MergeContext, IMMUTABLE_REASON};
use serde_json::Value;

/// Immutable claim fields checked before the generic walk.
const IMMUTABLE_FIELDS: &[(&str, &str)] = &[
    ("spec.accessModes", "/spec/accessModes"),
    ("spec.storageClassName", "/spec/storageClassName"),
    ("spec.volumeMode", "/spec/volumeMode"),
];

/// Merge a desired PersistentVolumeClaim into the live one.
///
/// Returns `false` when any immutable field diverges.
pub(super) fn merge_pvc(
    ctx: &mut MergeContext<'_>,
    merged: &mut Value,
    existing: &Value,
    desired: &Value,
) -> bool {
    super::merge_metadata(ctx, merged, desired);

    let mut success = true;
    for (path, pointer) in IMMUTABLE_FIELDS {
        let existing_value = existing.pointer(pointer);
        let desired_value = desired.pointer(pointer);
        if let Some(desired_value) = desired_value {
            if existing_value != Some(desired_value) {
                ctx.record_conflict(
                    path,
                    existing_value.unwrap_or(&Value::Null),
                    desired_value,
                    ConflictResolution::KeepExisting,
                    IMMUTABLE_REASON,
                );
                success = false;
            }
        }
        ctx.extra_ignores.push((*path).to_string());
    }

    generic::merge_top_level(ctx, merged, desired);
    success
}

#[cfg(test)]
#[path = "volume_tests.rs"]
mod volume_tests;
