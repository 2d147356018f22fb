// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Label selector matching for restore scope filters.
//!
//! A restore request may carry a label selector; only backup resources whose
//! labels satisfy it are restored. Matching follows Kubernetes semantics:
//! `matchLabels` and `matchExpressions` are ANDed, and an empty selector
//! matches every resource.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Label selector to match Kubernetes resources.
///
/// A label selector is a label query over a set of resources. The result of matchLabels and
/// matchExpressions are `ANDed`. An empty label selector matches all objects.
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct LabelSelector {
    /// Map of {key,value} pairs. A single {key,value} in the matchLabels map is equivalent
    /// to an element of matchExpressions, whose key field is "key", the operator is "In",
    /// and the values array contains only "value". All requirements must be satisfied.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub match_labels: Option<BTreeMap<String, String>>,

    /// List of label selector requirements. All requirements must be satisfied.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub match_expressions: Option<Vec<LabelSelectorRequirement>>,
}

/// A label selector requirement is a selector that contains values, a key, and an operator
/// that relates the key and values.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelSelectorRequirement {
    /// The label key that the selector applies to.
    pub key: String,

    /// Operator represents a key's relationship to a set of values.
    /// Valid operators are In, `NotIn`, Exists and `DoesNotExist`.
    pub operator: String,

    /// An array of string values. If the operator is In or `NotIn`,
    /// the values array must be non-empty. If the operator is Exists or `DoesNotExist`,
    /// the values array must be empty.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub values: Option<Vec<String>>,
}

impl LabelSelector {
    /// Whether the given labels satisfy this selector.
    #[must_use]
    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        matches_selector(self, labels)
    }
}

/// Check whether a resource's labels satisfy a label selector.
///
/// # Arguments
///
/// * `selector` - The label selector to evaluate
/// * `labels` - The labels carried by the resource
///
/// # Returns
///
/// `true` when every `matchLabels` entry and every `matchExpressions`
/// requirement is satisfied. Unknown operators never match.
#[must_use]
pub fn matches_selector(selector: &LabelSelector, labels: &BTreeMap<String, String>) -> bool {
    if let Some(ref match_labels) = selector.match_labels {
        for (key, value) in match_labels {
            if labels.get(key) != Some(value) {
                return false;
            }
        }
    }

    if let Some(ref expressions) = selector.match_expressions {
        for requirement in expressions {
            if !matches_requirement(requirement, labels) {
                return false;
            }
        }
    }

    true
}

/// Evaluate a single selector requirement against resource labels.
fn matches_requirement(
    requirement: &LabelSelectorRequirement,
    labels: &BTreeMap<String, String>,
) -> bool {
    let actual = labels.get(&requirement.key);
    let values = requirement.values.as_deref().unwrap_or(&[]);

    match requirement.operator.as_str() {
        "In" => actual.is_some_and(|v| values.contains(v)),
        "NotIn" => actual.is_none_or(|v| !values.contains(v)),
        "Exists" => actual.is_some(),
        "DoesNotExist" => actual.is_none(),
        _ => false,
    }
}

#[cfg(test)]
#[path = "selector_tests.rs"]
mod selector_tests;
