//! Node identity and per-node statistics

use super::indices::CommonStats;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Identity of the node answering the scrape
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalNodeInfo {
    pub cluster_name: String,
    pub node_name: String,
    pub node_id: String,
}

/// Raw `_nodes/{filter}/stats` response; node IDs are map keys
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NodesStatsResponse {
    pub cluster_name: String,
    pub nodes: BTreeMap<String, NodeStats>,
}

impl NodesStatsResponse {
    /// Flatten into a list, moving each map key into `NodeStats::id`.
    pub fn into_nodes(self) -> Vec<NodeStats> {
        self.nodes
            .into_iter()
            .map(|(id, mut stats)| {
                stats.id = id;
                stats
            })
            .collect()
    }
}

/// Statistics of a single node
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeStats {
    pub id: String,
    pub name: String,
    pub host: String,
    pub roles: Vec<String>,
    pub indices: Option<CommonStats>,
    pub os: Option<OsStats>,
    pub process: Option<ProcessStats>,
    pub jvm: Option<JvmStats>,
    pub thread_pool: BTreeMap<String, ThreadPoolStats>,
    pub fs: Option<FsStats>,
    pub transport: Option<TransportStats>,
    pub http: Option<HttpStats>,
    pub breakers: BTreeMap<String, BreakerStats>,
    pub script: Option<ScriptStats>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OsStats {
    pub cpu: OsCpu,
    pub mem: MemStats,
    pub swap: MemStats,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OsCpu {
    pub percent: f64,

    /// Keyed by window: `1m`, `5m`, `15m`
    pub load_average: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MemStats {
    pub total_in_bytes: u64,
    pub free_in_bytes: u64,
    pub used_in_bytes: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessStats {
    pub open_file_descriptors: i64,
    pub max_file_descriptors: i64,
    pub cpu: ProcessCpu,
    pub mem: ProcessMem,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessCpu {
    pub percent: f64,
    /// `-1` when the platform cannot report it
    pub total_in_millis: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessMem {
    /// `-1` when the platform cannot report it
    pub total_virtual_in_bytes: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct JvmStats {
    pub uptime_in_millis: u64,
    pub mem: JvmMem,
    pub threads: JvmThreads,
    pub gc: JvmGc,
    pub buffer_pools: BTreeMap<String, BufferPool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct JvmMem {
    pub heap_used_in_bytes: u64,
    pub heap_used_percent: f64,
    pub heap_committed_in_bytes: u64,
    pub heap_max_in_bytes: u64,
    pub non_heap_used_in_bytes: u64,
    pub non_heap_committed_in_bytes: u64,
    pub pools: BTreeMap<String, JvmPool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct JvmPool {
    pub used_in_bytes: u64,
    pub max_in_bytes: u64,
    pub peak_used_in_bytes: u64,
    pub peak_max_in_bytes: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct JvmThreads {
    pub count: u64,
    pub peak_count: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct JvmGc {
    pub collectors: BTreeMap<String, GcCollector>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GcCollector {
    pub collection_count: u64,
    pub collection_time_in_millis: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BufferPool {
    pub count: u64,
    pub used_in_bytes: u64,
    pub total_capacity_in_bytes: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ThreadPoolStats {
    pub threads: u64,
    pub queue: u64,
    pub active: u64,
    pub rejected: u64,
    pub largest: u64,
    pub completed: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FsStats {
    pub total: FsUsage,
    pub data: Vec<FsPath>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FsUsage {
    pub total_in_bytes: u64,
    pub free_in_bytes: u64,
    pub available_in_bytes: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FsPath {
    pub path: String,
    pub mount: String,
    #[serde(rename = "type")]
    pub fs_type: String,
    pub total_in_bytes: u64,
    pub free_in_bytes: u64,
    pub available_in_bytes: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportStats {
    pub server_open: u64,
    pub rx_count: u64,
    pub rx_size_in_bytes: u64,
    pub tx_count: u64,
    pub tx_size_in_bytes: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpStats {
    pub current_open: u64,
    pub total_opened: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakerStats {
    pub limit_size_in_bytes: i64,
    pub estimated_size_in_bytes: i64,
    pub overhead: f64,
    pub tripped: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScriptStats {
    pub compilations: u64,
    pub cache_evictions: u64,
    pub compilation_limit_triggered: u64,
}
