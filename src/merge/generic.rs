// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Generic recursive merge for kinds without specialized rules.
//!
//! Walks the desired document key-by-key: ignored paths are never copied,
//! forced paths follow desired without a conflict record, and everything else
//! records a `use_desired` conflict when the two sides disagree. Keys present
//! only in the live resource are left untouched.

use super::{ChangeAction, ConflictResolution, MergeContext};
use serde_json::Value;

/// Merge metadata plus every remaining top-level field of `desired`.
pub(super) fn merge_resource(ctx: &mut MergeContext<'_>, merged: &mut Value, desired: &Value) {
    super::merge_metadata(ctx, merged, desired);
    merge_top_level(ctx, merged, desired);
}

/// Walk all top-level desired keys except the identity fields.
pub(super) fn merge_top_level(ctx: &mut MergeContext<'_>, merged: &mut Value, desired: &Value) {
    let Some(desired_map) = desired.as_object() else {
        return;
    };
    let Some(merged_map) = merged.as_object_mut() else {
        return;
    };

    for (key, desired_value) in desired_map {
        if matches!(key.as_str(), "apiVersion" | "kind" | "metadata") {
            continue;
        }
        merge_key(ctx, merged_map, key, desired_value, key);
    }
}

/// Reconcile one desired key into the merged parent object.
///
/// Recurses when both sides are maps; otherwise applies the ignore/force/
/// conflict rules at this path.
pub(super) fn merge_key(
    ctx: &mut MergeContext<'_>,
    parent: &mut serde_json::Map<String, Value>,
    key: &str,
    desired: &Value,
    path: &str,
) {
    if ctx.ignored(path) {
        return;
    }

    match parent.get_mut(key) {
        Some(existing) => {
            if existing.is_object() && desired.is_object() {
                let desired_map = desired.as_object().cloned().unwrap_or_default();
                let Some(existing_map) = existing.as_object_mut() else {
                    return;
                };
                for (child_key, child_desired) in &desired_map {
                    let child_path = format!("{path}.{child_key}");
                    merge_key(ctx, existing_map, child_key, child_desired, &child_path);
                }
            } else if *existing != *desired {
                let old = existing.clone();
                if ctx.forced(path) {
                    ctx.record_change(path, Some(&old), Some(desired), ChangeAction::Forced);
                } else {
                    ctx.record_conflict(
                        path,
                        &old,
                        desired,
                        ConflictResolution::UseDesired,
                        "backup value applied over differing live value",
                    );
                    ctx.record_change(path, Some(&old), Some(desired), ChangeAction::Modified);
                }
                *existing = desired.clone();
            }
        }
        None => {
            parent.insert(key.to_string(), desired.clone());
            ctx.record_change(path, None, Some(desired), ChangeAction::Added);
        }
    }
}

#[cfg(test)]
#[path = "generic_tests.rs"]
mod generic_tests;
