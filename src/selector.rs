// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Label selector model and matching utilities.
//!
//! Discovery queries identify their VirtualMachineInstance through a label
//! selector. This module provides the selector type as it appears in the run
//! configuration, in-process matching (used by tests and by the ambiguity
//! guard), and conversion to the Kubernetes list-parameter string used for
//! the server-side query.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Label selector to match Kubernetes resources.
///
/// A label selector is a label query over a set of resources. The result of
/// matchLabels and matchExpressions are `ANDed`. An empty label selector
/// matches all objects — the discovery stage rejects empty selectors during
/// configuration validation, since the query must identify exactly one
/// instance.
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LabelSelector {
    /// Map of {key,value} pairs. A single {key,value} in the matchLabels map
    /// is equivalent to an element of matchExpressions whose key field is
    /// "key", the operator is "In", and the values array contains only
    /// "value". All requirements must be satisfied.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub match_labels: Option<BTreeMap<String, String>>,

    /// List of label selector requirements. All requirements must be satisfied.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub match_expressions: Option<Vec<LabelSelectorRequirement>>,
}

/// A label selector requirement is a selector that contains values, a key,
/// and an operator that relates the key and values.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct LabelSelectorRequirement {
    /// The label key that the selector applies to.
    pub key: String,

    /// Operator represents a key's relationship to a set of values.
    /// Valid operators are In, `NotIn`, Exists and `DoesNotExist`.
    pub operator: String,

    /// An array of string values. If the operator is In or `NotIn`,
    /// the values array must be non-empty. If the operator is Exists or
    /// `DoesNotExist`, the values array must be empty.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub values: Option<Vec<String>>,
}

impl LabelSelector {
    /// Returns true if the selector has no requirements at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.match_labels.as_ref().is_none_or(BTreeMap::is_empty)
            && self.match_expressions.as_ref().is_none_or(Vec::is_empty)
    }

    /// Check whether a resource's labels satisfy every requirement.
    ///
    /// Semantics follow the Kubernetes apimachinery rules: matchLabels
    /// entries are exact equality, matchExpressions support In, `NotIn`,
    /// Exists and `DoesNotExist`, and everything is `ANDed`.
    #[must_use]
    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        if let Some(ref match_labels) = self.match_labels {
            for (key, value) in match_labels {
                if labels.get(key) != Some(value) {
                    return false;
                }
            }
        }

        if let Some(ref expressions) = self.match_expressions {
            for requirement in expressions {
                if !requirement.matches(labels) {
                    return false;
                }
            }
        }

        true
    }

    /// Convert the selector into the string form accepted by the Kubernetes
    /// list API (`ListParams::labels`).
    ///
    /// # Errors
    ///
    /// Returns an error for unknown operators, or for In/NotIn requirements
    /// without values — both are configuration mistakes, surfaced before any
    /// query is made.
    pub fn to_api_selector(&self) -> Result<String> {
        let mut parts = Vec::new();

        if let Some(ref match_labels) = self.match_labels {
            for (key, value) in match_labels {
                parts.push(format!("{key}={value}"));
            }
        }

        if let Some(ref expressions) = self.match_expressions {
            for requirement in expressions {
                parts.push(requirement.to_api_selector()?);
            }
        }

        Ok(parts.join(","))
    }
}

impl LabelSelectorRequirement {
    /// Check a single requirement against a resource's labels.
    fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        let value = labels.get(&self.key);
        let requirement_values = self.values.as_deref().unwrap_or_default();

        match self.operator.as_str() {
            "In" => value.is_some_and(|v| requirement_values.iter().any(|rv| rv == v)),
            "NotIn" => !value.is_some_and(|v| requirement_values.iter().any(|rv| rv == v)),
            "Exists" => value.is_some(),
            "DoesNotExist" => value.is_none(),
            _ => false,
        }
    }

    /// Render this requirement in list-API syntax.
    fn to_api_selector(&self) -> Result<String> {
        let values = self.values.as_deref().unwrap_or_default();

        match self.operator.as_str() {
            "In" => {
                if values.is_empty() {
                    bail!("selector requirement '{}': In requires values", self.key);
                }
                Ok(format!("{} in ({})", self.key, values.join(",")))
            }
            "NotIn" => {
                if values.is_empty() {
                    bail!("selector requirement '{}': NotIn requires values", self.key);
                }
                Ok(format!("{} notin ({})", self.key, values.join(",")))
            }
            "Exists" => Ok(self.key.clone()),
            "DoesNotExist" => Ok(format!("!{}", self.key)),
            other => bail!(
                "selector requirement '{}': unknown operator '{other}' \
                 (expected In, NotIn, Exists or DoesNotExist)",
                self.key
            ),
        }
    }
}

#[cfg(test)]
#[path = "selector_tests.rs"]
mod selector_tests;
