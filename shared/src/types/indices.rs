//! Index-level statistics
//!
//! `CommonStats` is the shape shared by the `indices` section of node stats
//! and by every entry of the indices stats API.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Result of the indices stats API
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IndicesStats {
    #[serde(rename = "_shards")]
    pub shards: ShardsSummary,

    #[serde(rename = "_all")]
    pub all: IndexStatsGroup,

    /// Per-index statistics, keyed by index name
    pub indices: BTreeMap<String, IndexStatsGroup>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ShardsSummary {
    pub total: u64,
    pub successful: u64,
    pub failed: u64,
}

/// Statistics over primaries only and over all shard copies
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexStatsGroup {
    pub primaries: CommonStats,
    pub total: CommonStats,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CommonStats {
    pub docs: Option<DocsStats>,
    pub store: Option<StoreStats>,
    pub indexing: Option<IndexingStats>,
    pub get: Option<GetStats>,
    pub search: Option<SearchStats>,
    pub merges: Option<MergeStats>,
    pub refresh: Option<RefreshStats>,
    pub flush: Option<FlushStats>,
    pub query_cache: Option<QueryCacheStats>,
    pub fielddata: Option<FieldDataStats>,
    pub segments: Option<SegmentsStats>,
    pub translog: Option<TranslogStats>,
    pub request_cache: Option<RequestCacheStats>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DocsStats {
    pub count: u64,
    pub deleted: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreStats {
    pub size_in_bytes: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexingStats {
    pub index_total: u64,
    pub index_time_in_millis: u64,
    pub index_current: u64,
    pub index_failed: u64,
    pub delete_total: u64,
    pub delete_time_in_millis: u64,
    pub delete_current: u64,
    pub noop_update_total: u64,
    pub throttle_time_in_millis: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GetStats {
    pub total: u64,
    pub time_in_millis: u64,
    pub exists_total: u64,
    pub exists_time_in_millis: u64,
    pub missing_total: u64,
    pub missing_time_in_millis: u64,
    pub current: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchStats {
    pub open_contexts: u64,
    pub query_total: u64,
    pub query_time_in_millis: u64,
    pub query_current: u64,
    pub fetch_total: u64,
    pub fetch_time_in_millis: u64,
    pub fetch_current: u64,
    pub scroll_total: u64,
    pub scroll_time_in_millis: u64,
    pub scroll_current: u64,
    pub suggest_total: u64,
    pub suggest_time_in_millis: u64,
    pub suggest_current: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeStats {
    pub current: u64,
    pub current_docs: u64,
    pub current_size_in_bytes: u64,
    pub total: u64,
    pub total_time_in_millis: u64,
    pub total_docs: u64,
    pub total_size_in_bytes: u64,
    pub total_stopped_time_in_millis: u64,
    pub total_throttled_time_in_millis: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RefreshStats {
    pub total: u64,
    pub total_time_in_millis: u64,
    pub listeners: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FlushStats {
    pub total: u64,
    pub periodic: u64,
    pub total_time_in_millis: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryCacheStats {
    pub memory_size_in_bytes: u64,
    pub total_count: u64,
    pub hit_count: u64,
    pub miss_count: u64,
    pub cache_size: u64,
    pub cache_count: u64,
    pub evictions: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldDataStats {
    pub memory_size_in_bytes: u64,
    pub evictions: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentsStats {
    pub count: u64,
    pub memory_in_bytes: u64,
    pub terms_memory_in_bytes: u64,
    pub stored_fields_memory_in_bytes: u64,
    pub doc_values_memory_in_bytes: u64,
    pub index_writer_memory_in_bytes: u64,
    pub version_map_memory_in_bytes: u64,
    pub fixed_bit_set_memory_in_bytes: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslogStats {
    pub operations: u64,
    pub size_in_bytes: u64,
    pub uncommitted_operations: u64,
    pub uncommitted_size_in_bytes: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestCacheStats {
    pub memory_size_in_bytes: u64,
    pub evictions: u64,
    pub hit_count: u64,
    pub miss_count: u64,
}
