//! Cluster health data structures
//!
//! Mirrors the `_cluster/health?level=shards` response. Fields the exporter
//! does not read are ignored on deserialization.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Traffic-light health of a cluster or an index
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    #[default]
    Green,
    Yellow,
    Red,
}

impl HealthStatus {
    /// Numeric encoding used for the status gauges (0 green, 1 yellow, 2 red)
    pub fn as_value(&self) -> f64 {
        match self {
            Self::Green => 0.0,
            Self::Yellow => 1.0,
            Self::Red => 2.0,
        }
    }
}

/// Cluster health as reported by the local node
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterHealth {
    pub cluster_name: String,
    pub status: HealthStatus,
    pub timed_out: bool,
    pub number_of_nodes: u64,
    pub number_of_data_nodes: u64,
    pub active_primary_shards: u64,
    pub active_shards: u64,
    pub relocating_shards: u64,
    pub initializing_shards: u64,
    pub unassigned_shards: u64,
    pub delayed_unassigned_shards: u64,
    pub number_of_pending_tasks: u64,
    pub number_of_in_flight_fetch: u64,
    pub task_max_waiting_in_queue_millis: u64,
    pub active_shards_percent_as_number: f64,

    /// Per-index health, keyed by index name
    pub indices: BTreeMap<String, IndexHealth>,
}

/// Health of a single index
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexHealth {
    pub status: HealthStatus,
    pub number_of_shards: u64,
    pub number_of_replicas: u64,
    pub active_primary_shards: u64,
    pub active_shards: u64,
    pub relocating_shards: u64,
    pub initializing_shards: u64,
    pub unassigned_shards: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_health() {
        let json = r#"{
            "cluster_name": "test-cluster",
            "status": "yellow",
            "timed_out": false,
            "number_of_nodes": 3,
            "number_of_data_nodes": 2,
            "active_shards_percent_as_number": 87.5,
            "discovered_cluster_manager": true,
            "indices": {
                "logs": { "status": "red", "number_of_shards": 5, "number_of_replicas": 1 }
            }
        }"#;
        let health: ClusterHealth = serde_json::from_str(json).unwrap();
        assert_eq!(health.cluster_name, "test-cluster");
        assert_eq!(health.status, HealthStatus::Yellow);
        assert_eq!(health.number_of_nodes, 3);
        assert_eq!(health.indices["logs"].status, HealthStatus::Red);
        assert_eq!(health.indices["logs"].number_of_shards, 5);
    }

    #[test]
    fn test_status_values() {
        assert_eq!(HealthStatus::Green.as_value(), 0.0);
        assert_eq!(HealthStatus::Yellow.as_value(), 1.0);
        assert_eq!(HealthStatus::Red.as_value(), 2.0);
    }
}
