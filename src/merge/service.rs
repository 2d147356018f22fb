// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Merge rules for `Service` resources.
//!
//! `spec.clusterIP` is allocated by the cluster and immutable once assigned,
//! so the live value always survives. Ports are matched by the composite key
//! `(name, port, protocol)` - protocol defaulting to `TCP` - and a live
//! port's allocated `nodePort` is carried onto the matching merged port.

use super::{generic, ChangeAction, ConflictResolution, MergeContext};
use serde_json::Value;

/// Merge a desired Service into the live one.
pub(super) fn merge_service(
    ctx: &mut MergeContext<'_>,
    merged: &mut Value,
    existing: &Value,
    desired: &Value,
) {
    super::merge_metadata(ctx, merged, desired);

    let existing_ip = existing.pointer("/spec/clusterIP");
    let desired_ip = desired.pointer("/spec/clusterIP");
    if let (Some(existing_ip), Some(desired_ip)) = (existing_ip, desired_ip) {
        if existing_ip != desired_ip {
            ctx.record_conflict(
                "spec.clusterIP",
                existing_ip,
                desired_ip,
                ConflictResolution::KeepExisting,
                "cluster-allocated address is immutable once assigned",
            );
            ctx.record_change(
                "spec.clusterIP",
                Some(desired_ip),
                Some(existing_ip),
                ChangeAction::Preserved,
            );
        }
    }
    ctx.extra_ignores.push("spec.clusterIP".to_string());

    merge_ports(ctx, merged, existing, desired);
    ctx.extra_ignores.push("spec.ports".to_string());

    generic::merge_top_level(ctx, merged, desired);
}

/// Composite identity of a service port: `(name, port, protocol)`.
fn port_key(port: &Value) -> (String, i64, String) {
    (
        port.get("name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        port.get("port").and_then(Value::as_i64).unwrap_or_default(),
        port.get("protocol")
            .and_then(Value::as_str)
            .unwrap_or("TCP")
            .to_string(),
    )
}

/// Rebuild `spec.ports` from the desired ports, carrying live nodePorts over.
fn merge_ports(
    ctx: &mut MergeContext<'_>,
    merged: &mut Value,
    existing: &Value,
    desired: &Value,
) {
    let Some(desired_ports) = desired.pointer("/spec/ports").and_then(Value::as_array) else {
        return;
    };
    let existing_ports = existing
        .pointer("/spec/ports")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    let mut merged_ports = Vec::with_capacity(desired_ports.len());
    for desired_port in desired_ports {
        let mut port = desired_port.clone();
        let key = port_key(desired_port);
        let node_port = existing_ports
            .iter()
            .find(|p| port_key(p) == key)
            .and_then(|p| p.get("nodePort"))
            .cloned();
        if let (Some(node_port), Some(map)) = (node_port, port.as_object_mut()) {
            map.insert("nodePort".to_string(), node_port);
        }
        merged_ports.push(port);
    }

    let new_ports = Value::Array(merged_ports);
    let old_ports = existing.pointer("/spec/ports").cloned();
    if old_ports.as_ref() != Some(&new_ports) {
        ctx.record_change(
            "spec.ports",
            old_ports.as_ref(),
            Some(&new_ports),
            ChangeAction::Modified,
        );
    }
    super::set_map_key(merged, "/spec", "ports", new_ports);
}

#[cfg(test)]
#[path = "service_tests.rs"]
mod service_tests;
