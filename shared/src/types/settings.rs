//! Cluster settings layers
//!
//! Cluster settings live in several layers with different priority:
//! transient overrides persistent, persistent overrides the node's effective
//! (configured or default) value. Each layer is kept as a flat map of dotted
//! keys to their string form.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// One precedence layer of cluster settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SettingsLayer(BTreeMap<String, String>);

impl SettingsLayer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a layer from a settings JSON object, nested or flat.
    ///
    /// Nested objects are joined with `.`; arrays become comma-separated
    /// strings; `null` entries are dropped.
    pub fn from_json(value: &Value) -> Self {
        let mut layer = Self::new();
        flatten_into(&mut layer.0, String::new(), value);
        layer
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

fn flatten_into(out: &mut BTreeMap<String, String>, prefix: String, value: &Value) {
    let join = |key: &str| {
        if prefix.is_empty() {
            key.to_string()
        } else {
            format!("{}.{}", prefix, key)
        }
    };
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                flatten_into(out, join(key), child);
            }
        }
        Value::Null => {}
        Value::String(s) => {
            out.insert(prefix, s.clone());
        }
        Value::Array(items) => {
            let joined = items
                .iter()
                .map(|item| match item {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect::<Vec<_>>()
                .join(",");
            out.insert(prefix, joined);
        }
        other => {
            out.insert(prefix, other.to_string());
        }
    }
}

/// All settings layers returned by the cluster state, highest priority first
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterSettingsLayers {
    pub transient: SettingsLayer,
    pub persistent: SettingsLayer,

    /// Effective node-level values (explicitly configured or defaults)
    pub effective: SettingsLayer,
}

impl ClusterSettingsLayers {
    /// Layers in resolution order: transient, persistent, effective.
    pub fn in_priority_order(&self) -> [&SettingsLayer; 3] {
        [&self.transient, &self.persistent, &self.effective]
    }
}
