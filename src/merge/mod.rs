// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Per-kind three-way merging of backup resources against live cluster state.
//!
//! Given two representations of the same resource - `existing` (live cluster
//! state) and `desired` (from a backup) - the resolver produces a merged form
//! that satisfies Kubernetes' field mutability rules while preserving
//! server-allocated state the backup could not know, plus an audit trail of
//! every conflict and change.
//!
//! # Merge Rules
//!
//! | Kind | Special handling |
//! |------|------------------|
//! | `Deployment` | `spec.replicas` preserved from existing (autoscalers own it) |
//! | `Service` | `spec.clusterIP` preserved; `nodePort` carried onto matching ports |
//! | `ConfigMap` | `data`/`binaryData` key-merged, desired wins |
//! | `Secret` | as `ConfigMap`, values redacted in audit records; `type` immutable |
//! | `Ingress` | generic recursive merge |
//! | `PersistentVolumeClaim` | immutable field divergence fails the merge |
//! | anything else | generic recursive merge of metadata and remaining fields |
//!
//! The resolver never errors: on immutable-field divergence it returns a
//! [`MergeResult`] with `success = false` and a populated conflict list, and
//! the caller decides whether to recreate, skip, or fail the resource.

mod config;
mod generic;
mod service;
mod volume;
mod workload;

use crate::constants::{
    DEFAULT_FORCE_FIELDS, DEFAULT_IGNORE_FIELDS, DEFAULT_PRESERVE_ANNOTATIONS,
    DEFAULT_PRESERVE_LABELS, REDACTED_SENTINEL,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// How a field conflict was resolved.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictResolution {
    /// The live cluster value was kept
    KeepExisting,
    /// The backup value was applied
    UseDesired,
}

impl ConflictResolution {
    /// Stable identifier used in audit records and metrics labels.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictResolution::KeepExisting => "keep_existing",
            ConflictResolution::UseDesired => "use_desired",
        }
    }
}

/// What the merge did to a field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeAction {
    /// Field absent from existing, copied from desired
    Added,
    /// Field present on both sides, desired value applied
    Modified,
    /// Field removed from the merged resource
    Removed,
    /// Existing value kept in place of a differing desired value
    Preserved,
    /// Desired value applied without conflict inspection
    Forced,
}

/// A field where existing cluster state and backup state disagreed.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldConflict {
    /// Dotted path of the conflicting field (e.g. `spec.replicas`)
    pub field: String,
    /// Value currently live in the cluster
    pub existing_value: Value,
    /// Value carried by the backup
    pub desired_value: Value,
    /// How the conflict was resolved
    pub resolution: ConflictResolution,
    /// Why this resolution was chosen
    pub reason: String,
}

/// A field the merge altered (or deliberately preserved).
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldChange {
    /// Dotted path of the changed field
    pub field: String,
    /// Value before the merge, absent for additions
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old_value: Option<Value>,
    /// Value after the merge, absent for removals
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_value: Option<Value>,
    /// What the merge did
    pub action: ChangeAction,
}

/// Outcome of merging a backup resource against live cluster state.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeResult {
    /// The merged resource document
    pub resource: Value,
    /// Fields where the two sides disagreed
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conflicts: Vec<FieldConflict>,
    /// Fields the merge altered or preserved
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub changes: Vec<FieldChange>,
    /// Which merge strategy produced this result (e.g. `deployment`, `generic`)
    pub strategy: String,
    /// `false` when an immutable field diverges and a plain update would be rejected
    pub success: bool,
}

/// Reason text attached to conflicts on fields Kubernetes forbids changing.
const IMMUTABLE_REASON: &str = "field is immutable after creation";

impl MergeResult {
    /// Diagnostic naming the immutable fields that made this merge unappliable.
    ///
    /// Returns `None` while `success` is `true`.
    #[must_use]
    pub fn failure_reason(&self) -> Option<String> {
        if self.success {
            return None;
        }
        let fields: Vec<&str> = self
            .conflicts
            .iter()
            .filter(|c| c.reason == IMMUTABLE_REASON)
            .map(|c| c.field.as_str())
            .collect();
        Some(format!(
            "immutable field(s) diverge from live resource: {}",
            fields.join(", ")
        ))
    }
}

/// Lists controlling merge behaviour.
///
/// The four lists are engine-wide configuration; per-kind rules apply on top
/// of them.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeOptions {
    /// Label keys whose existing values must never be replaced
    pub preserve_labels: Vec<String>,

    /// Annotation keys whose existing values must never be replaced
    pub preserve_annotations: Vec<String>,

    /// Dotted field paths never copied from desired
    pub ignore_fields: Vec<String>,

    /// Dotted field paths where desired always wins without a conflict record
    pub force_fields: Vec<String>,
}

impl Default for MergeOptions {
    fn default() -> Self {
        MergeOptions {
            preserve_labels: DEFAULT_PRESERVE_LABELS
                .iter()
                .map(ToString::to_string)
                .collect(),
            preserve_annotations: DEFAULT_PRESERVE_ANNOTATIONS
                .iter()
                .map(ToString::to_string)
                .collect(),
            ignore_fields: DEFAULT_IGNORE_FIELDS
                .iter()
                .map(ToString::to_string)
                .collect(),
            force_fields: DEFAULT_FORCE_FIELDS
                .iter()
                .map(ToString::to_string)
                .collect(),
        }
    }
}

/// Whether `path` equals `entry` or sits underneath it.
fn path_matches(path: &str, entry: &str) -> bool {
    path == entry || path.strip_prefix(entry).is_some_and(|rest| rest.starts_with('.'))
}

/// Accumulates the audit trail while a merge walks the resource tree.
///
/// Kind-specific rules push extra ignore paths before delegating to the
/// generic walk so fields they already handled are not visited twice.
struct MergeContext<'a> {
    options: &'a MergeOptions,
    conflicts: Vec<FieldConflict>,
    changes: Vec<FieldChange>,
    extra_ignores: Vec<String>,
    /// Substitute a sentinel for values in audit records (Secrets)
    redact: bool,
}

impl<'a> MergeContext<'a> {
    fn new(options: &'a MergeOptions) -> Self {
        MergeContext {
            options,
            conflicts: Vec::new(),
            changes: Vec::new(),
            extra_ignores: Vec::new(),
            redact: false,
        }
    }

    fn ignored(&self, path: &str) -> bool {
        self.options
            .ignore_fields
            .iter()
            .chain(self.extra_ignores.iter())
            .any(|entry| path_matches(path, entry))
    }

    fn forced(&self, path: &str) -> bool {
        self.options
            .force_fields
            .iter()
            .any(|entry| path_matches(path, entry))
    }

    fn audit_value(&self, value: &Value) -> Value {
        if self.redact {
            Value::String(REDACTED_SENTINEL.to_string())
        } else {
            value.clone()
        }
    }

    fn record_conflict(
        &mut self,
        field: &str,
        existing: &Value,
        desired: &Value,
        resolution: ConflictResolution,
        reason: &str,
    ) {
        let existing_value = self.audit_value(existing);
        let desired_value = self.audit_value(desired);
        self.conflicts.push(FieldConflict {
            field: field.to_string(),
            existing_value,
            desired_value,
            resolution,
            reason: reason.to_string(),
        });
    }

    fn record_change(
        &mut self,
        field: &str,
        old: Option<&Value>,
        new: Option<&Value>,
        action: ChangeAction,
    ) {
        let old_value = old.map(|v| self.audit_value(v));
        let new_value = new.map(|v| self.audit_value(v));
        self.changes.push(FieldChange {
            field: field.to_string(),
            old_value,
            new_value,
            action,
        });
    }
}

/// Stateless per-kind conflict resolver.
///
/// Cheap to clone; a single instance is shared by all restore workers.
#[derive(Clone, Debug, Default)]
pub struct ConflictResolver {
    options: MergeOptions,
}

impl ConflictResolver {
    /// Create a resolver with explicit merge options.
    #[must_use]
    pub fn new(options: MergeOptions) -> Self {
        ConflictResolver { options }
    }

    /// The options this resolver was configured with.
    #[must_use]
    pub fn options(&self) -> &MergeOptions {
        &self.options
    }

    /// Merge a desired (backup) resource into an existing (live) resource.
    ///
    /// Dispatches to kind-specific rules for the kinds Kubernetes treats
    /// specially; every other kind falls through to the generic recursive
    /// merge. Never fails - immutable-field divergence is reported through
    /// `MergeResult::success`.
    ///
    /// # Arguments
    ///
    /// * `kind` - Kubernetes kind of both documents (e.g. `Deployment`)
    /// * `existing` - The live resource as returned by the cluster
    /// * `desired` - The resource as stored in the backup
    #[must_use]
    pub fn merge(&self, kind: &str, existing: &Value, desired: &Value) -> MergeResult {
        let mut ctx = MergeContext::new(&self.options);
        let mut merged = existing.clone();
        let mut success = true;

        let strategy = match kind {
            "Deployment" => {
                workload::merge_deployment(&mut ctx, &mut merged, existing, desired);
                "deployment"
            }
            "Service" => {
                service::merge_service(&mut ctx, &mut merged, existing, desired);
                "service"
            }
            "ConfigMap" => {
                config::merge_config_map(&mut ctx, &mut merged, existing, desired);
                "configmap"
            }
            "Secret" => {
                success = config::merge_secret(&mut ctx, &mut merged, existing, desired);
                "secret"
            }
            "Ingress" => {
                generic::merge_resource(&mut ctx, &mut merged, desired);
                "ingress"
            }
            "PersistentVolumeClaim" => {
                success = volume::merge_pvc(&mut ctx, &mut merged, existing, desired);
                "persistentvolumeclaim"
            }
            _ => {
                generic::merge_resource(&mut ctx, &mut merged, desired);
                "generic"
            }
        };

        MergeResult {
            resource: merged,
            conflicts: ctx.conflicts,
            changes: ctx.changes,
            strategy: strategy.to_string(),
            success,
        }
    }
}

/// Merge `metadata.labels` and `metadata.annotations` key-by-key.
///
/// Preserved keys keep their existing values and record a `keep_existing`
/// conflict; all other desired keys override with a change record.
fn merge_metadata(ctx: &mut MergeContext<'_>, merged: &mut Value, desired: &Value) {
    merge_string_map(
        ctx,
        merged,
        desired,
        "metadata.labels",
        "/metadata/labels",
        true,
    );
    merge_string_map(
        ctx,
        merged,
        desired,
        "metadata.annotations",
        "/metadata/annotations",
        false,
    );
}

/// Key-merge one of the metadata string maps.
fn merge_string_map(
    ctx: &mut MergeContext<'_>,
    merged: &mut Value,
    desired: &Value,
    path: &str,
    pointer: &str,
    labels: bool,
) {
    let Some(desired_map) = desired.pointer(pointer).and_then(Value::as_object).cloned() else {
        return;
    };
    // label and annotation keys may contain '/', so index maps directly
    // rather than through JSON pointers
    let existing_map = merged
        .pointer(pointer)
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();

    for (key, desired_value) in &desired_map {
        let field = format!("{path}.{key}");
        let preserved = if labels {
            ctx.options.preserve_labels.iter().any(|k| k == key)
        } else {
            ctx.options.preserve_annotations.iter().any(|k| k == key)
        };

        let existing_value = existing_map.get(key).cloned();
        match existing_value {
            Some(existing_value) if existing_value != *desired_value => {
                if preserved {
                    ctx.record_conflict(
                        &field,
                        &existing_value,
                        desired_value,
                        ConflictResolution::KeepExisting,
                        "existing value is preserved by configuration",
                    );
                } else {
                    ctx.record_change(
                        &field,
                        Some(&existing_value),
                        Some(desired_value),
                        ChangeAction::Modified,
                    );
                    set_map_key(merged, pointer, key, desired_value.clone());
                }
            }
            Some(_) => {}
            None => {
                ctx.record_change(&field, None, Some(desired_value), ChangeAction::Added);
                set_map_key(merged, pointer, key, desired_value.clone());
            }
        }
    }
}

/// Insert `key = value` into the object at `pointer`, creating the object
/// (and its parent chain inside `metadata`) when absent.
fn set_map_key(root: &mut Value, pointer: &str, key: &str, value: Value) {
    let segments: Vec<&str> = pointer.trim_start_matches('/').split('/').collect();
    let mut node = root;
    for segment in segments {
        if !node.is_object() {
            *node = Value::Object(serde_json::Map::new());
        }
        let Some(map) = node.as_object_mut() else {
            return;
        };
        node = map
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(serde_json::Map::new()));
    }
    if !node.is_object() {
        *node = Value::Object(serde_json::Map::new());
    }
    if let Some(map) = node.as_object_mut() {
        map.insert(key.to_string(), value);
    }
}
