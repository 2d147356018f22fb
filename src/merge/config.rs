// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Merge rules for `ConfigMap` and `Secret` resources.
//!
//! Both kinds key-merge their payload maps with the backup winning on
//! divergence. Secret values never appear in audit records - a sentinel is
//! substituted - and a Secret's `type` cannot change after creation, so a
//! diverging type fails the merge.

use super::{ChangeAction, ConflictResolution, MergeContext, IMMUTABLE_REASON};
use serde_json::Value;

/// Merge a desired ConfigMap into the live one.
pub(super) fn merge_config_map(
    ctx: &mut MergeContext<'_>,
    merged: &mut Value,
    existing: &Value,
    desired: &Value,
) {
    super::merge_metadata(ctx, merged, desired);
    merge_data_map(ctx, merged, existing, desired, "data");
    merge_data_map(ctx, merged, existing, desired, "binaryData");
}

/// Merge a desired Secret into the live one.
///
/// Returns `false` when the two sides carry different `type` values - the
/// field is immutable and a plain update would be rejected by the API server.
pub(super) fn merge_secret(
    ctx: &mut MergeContext<'_>,
    merged: &mut Value,
    existing: &Value,
    desired: &Value,
) -> bool {
    super::merge_metadata(ctx, merged, desired);

    let mut success = true;
    if let (Some(existing_type), Some(desired_type)) = (existing.get("type"), desired.get("type"))
    {
        if existing_type != desired_type {
            ctx.record_conflict(
                "type",
                existing_type,
                desired_type,
                ConflictResolution::KeepExisting,
                IMMUTABLE_REASON,
            );
            success = false;
        }
    }

    ctx.redact = true;
    merge_data_map(ctx, merged, existing, desired, "data");
    merge_data_map(ctx, merged, existing, desired, "stringData");
    ctx.redact = false;

    success
}

/// Key-merge one payload map; the backup wins, divergence is recorded.
fn merge_data_map(
    ctx: &mut MergeContext<'_>,
    merged: &mut Value,
    existing: &Value,
    desired: &Value,
    field: &str,
) {
    let Some(desired_map) = desired.get(field).and_then(Value::as_object) else {
        return;
    };
    let existing_map = existing.get(field).and_then(Value::as_object);

    for (key, desired_value) in desired_map {
        let path = format!("{field}.{key}");
        let existing_value = existing_map.and_then(|m| m.get(key));
        match existing_value {
            Some(existing_value) if existing_value != desired_value => {
                ctx.record_conflict(
                    &path,
                    existing_value,
                    desired_value,
                    ConflictResolution::UseDesired,
                    "backup value applied over differing live value",
                );
                ctx.record_change(
                    &path,
                    Some(existing_value),
                    Some(desired_value),
                    ChangeAction::Modified,
                );
                super::set_map_key(merged, &format!("/{field}"), key, desired_value.clone());
            }
            Some(_) => {}
            None => {
                ctx.record_change(&path, None, Some(desired_value), ChangeAction::Added);
                super::set_map_key(merged, &format!("/{field}"), key, desired_value.clone());
            }
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod config_tests;
