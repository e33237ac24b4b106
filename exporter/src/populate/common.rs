//! Index statistics shared by the node level (`indices_*`, summed over the
//! node's shards) and the index level (`index_*{index,context}`).

use super::{register_family, Target};
use crate::catalog::{Catalog, MetricKind, Result, Scope};
use osprom_shared::CommonStats;
use std::collections::HashSet;

const NODE_PREFIX: &str = "indices_";
const INDEX_PREFIX: &str = "index_";
const INDEX_LABELS: [&str; 2] = ["index", "context"];
const TYPE_LABEL: &str = "type";

struct CommonStat {
    suffix: &'static str,
    help: &'static str,
    kind: MetricKind,
    /// Value of the `type` label for families split by type
    type_label: Option<&'static str>,
    value: fn(&CommonStats) -> Option<f64>,
}

macro_rules! stat {
    ($kind:ident $suffix:literal [$type:literal], $help:literal, $section:ident.$field:ident) => {
        CommonStat {
            suffix: $suffix,
            help: $help,
            kind: MetricKind::$kind,
            type_label: Some($type),
            value: |s| s.$section.as_ref().map(|x| x.$field as f64),
        }
    };
    ($kind:ident $suffix:literal, $help:literal, $section:ident.$field:ident ms) => {
        CommonStat {
            suffix: $suffix,
            help: $help,
            kind: MetricKind::$kind,
            type_label: None,
            value: |s| s.$section.as_ref().map(|x| x.$field as f64 / 1000.0),
        }
    };
    ($kind:ident $suffix:literal, $help:literal, $section:ident.$field:ident) => {
        CommonStat {
            suffix: $suffix,
            help: $help,
            kind: MetricKind::$kind,
            type_label: None,
            value: |s| s.$section.as_ref().map(|x| x.$field as f64),
        }
    };
}

static COMMON_STATS: &[CommonStat] = &[
    // docs, store
    stat!(Gauge "doc_number", "Count of documents", docs.count),
    stat!(Gauge "doc_deleted_number", "Count of deleted documents", docs.deleted),
    stat!(Gauge "store_size_bytes", "Store size of the indices in bytes", store.size_in_bytes),
    // indexing
    stat!(Counter "indexing_index_count", "Count of documents indexed", indexing.index_total),
    stat!(Gauge "indexing_index_current_number", "Current rate of documents indexed", indexing.index_current),
    stat!(Counter "indexing_index_failed_count", "Count of failed to index documents", indexing.index_failed),
    stat!(Counter "indexing_index_time_seconds", "Time spent while indexing documents", indexing.index_time_in_millis ms),
    stat!(Counter "indexing_delete_count", "Count of documents deleted", indexing.delete_total),
    stat!(Gauge "indexing_delete_current_number", "Current rate of documents deleted", indexing.delete_current),
    stat!(Counter "indexing_delete_time_seconds", "Time spent while deleting documents", indexing.delete_time_in_millis ms),
    stat!(Counter "indexing_noop_update_count", "Count of noop document updates", indexing.noop_update_total),
    stat!(Counter "indexing_throttle_time_seconds", "Time spent while throttling", indexing.throttle_time_in_millis ms),
    // get
    stat!(Counter "get_count", "Count of get commands", get.total),
    stat!(Counter "get_time_seconds", "Time spent while get commands", get.time_in_millis ms),
    stat!(Counter "get_exists_count", "Count of existing documents when get command", get.exists_total),
    stat!(Counter "get_exists_time_seconds", "Time spent while existing documents get command", get.exists_time_in_millis ms),
    stat!(Counter "get_missing_count", "Count of missing documents when get command", get.missing_total),
    stat!(Counter "get_missing_time_seconds", "Time spent while missing documents get command", get.missing_time_in_millis ms),
    stat!(Gauge "get_current_number", "Current rate of get commands", get.current),
    // search
    stat!(Gauge "search_open_contexts_number", "Number of search open contexts", search.open_contexts),
    stat!(Counter "search_query_count", "Count of search queries", search.query_total),
    stat!(Gauge "search_query_current_number", "Current rate of search queries", search.query_current),
    stat!(Counter "search_query_time_seconds", "Total search query time", search.query_time_in_millis ms),
    stat!(Counter "search_fetch_count", "Count of search fetches", search.fetch_total),
    stat!(Gauge "search_fetch_current_number", "Current rate of search fetches", search.fetch_current),
    stat!(Counter "search_fetch_time_seconds", "Total search fetch time", search.fetch_time_in_millis ms),
    stat!(Counter "search_scroll_count", "Count of search scrolls", search.scroll_total),
    stat!(Gauge "search_scroll_current_number", "Current rate of search scrolls", search.scroll_current),
    stat!(Counter "search_scroll_time_seconds", "Total search scroll time", search.scroll_time_in_millis ms),
    stat!(Counter "search_suggest_count", "Count of search suggests", search.suggest_total),
    stat!(Gauge "search_suggest_current_number", "Current rate of search suggests", search.suggest_current),
    stat!(Counter "search_suggest_time_seconds", "Total search suggest time", search.suggest_time_in_millis ms),
    // merges
    stat!(Gauge "merges_current_number", "Current rate of merges", merges.current),
    stat!(Gauge "merges_current_docs_number", "Current rate of documents merged", merges.current_docs),
    stat!(Gauge "merges_current_size_bytes", "Current rate of bytes merged", merges.current_size_in_bytes),
    stat!(Counter "merges_total_number", "Count of merges", merges.total),
    stat!(Counter "merges_total_time_seconds", "Time spent while merging", merges.total_time_in_millis ms),
    stat!(Counter "merges_total_docs_count", "Count of documents merged", merges.total_docs),
    stat!(Counter "merges_total_size_bytes", "Count of bytes of merged documents", merges.total_size_in_bytes),
    stat!(Counter "merges_total_stopped_time_seconds", "Time spent while merge process stopped", merges.total_stopped_time_in_millis ms),
    stat!(Counter "merges_total_throttled_time_seconds", "Time spent while merging when throttling", merges.total_throttled_time_in_millis ms),
    // refresh, flush
    stat!(Counter "refresh_total_count", "Count of refreshes", refresh.total),
    stat!(Counter "refresh_total_time_seconds", "Time spent while refreshes", refresh.total_time_in_millis ms),
    stat!(Gauge "refresh_listeners_number", "Number of refresh listeners", refresh.listeners),
    stat!(Counter "flush_total_count", "Count of flushes", flush.total),
    stat!(Counter "flush_periodic_count", "Count of periodic flushes", flush.periodic),
    stat!(Counter "flush_total_time_seconds", "Total time spent while flushes", flush.total_time_in_millis ms),
    // caches
    stat!(Gauge "querycache_memory_size_bytes", "Query cache memory size in bytes", query_cache.memory_size_in_bytes),
    stat!(Counter "querycache_total_count", "Count of query cache lookups", query_cache.total_count),
    stat!(Counter "querycache_hit_count", "Count of hits in query cache", query_cache.hit_count),
    stat!(Counter "querycache_miss_count", "Count of misses in query cache", query_cache.miss_count),
    stat!(Gauge "querycache_cache_size_number", "Number of entries in query cache", query_cache.cache_size),
    stat!(Counter "querycache_cache_count", "Count of entries ever added to query cache", query_cache.cache_count),
    stat!(Counter "querycache_evictions_count", "Count of evictions in query cache", query_cache.evictions),
    stat!(Gauge "fielddata_memory_size_bytes", "Field data cache memory usage in bytes", fielddata.memory_size_in_bytes),
    stat!(Counter "fielddata_evictions_count", "Count of evictions in field data cache", fielddata.evictions),
    stat!(Gauge "requestcache_memory_size_bytes", "Memory used for request cache", request_cache.memory_size_in_bytes),
    stat!(Counter "requestcache_hit_count", "Number of hits in request cache", request_cache.hit_count),
    stat!(Counter "requestcache_miss_count", "Number of misses in request cache", request_cache.miss_count),
    stat!(Counter "requestcache_evictions_count", "Number of evictions in request cache", request_cache.evictions),
    // segments
    stat!(Gauge "segments_number", "Current number of segments", segments.count),
    stat!(Gauge "segments_memory_bytes" ["all"], "Memory used by segments", segments.memory_in_bytes),
    stat!(Gauge "segments_memory_bytes" ["terms"], "Memory used by segments", segments.terms_memory_in_bytes),
    stat!(Gauge "segments_memory_bytes" ["stored_fields"], "Memory used by segments", segments.stored_fields_memory_in_bytes),
    stat!(Gauge "segments_memory_bytes" ["doc_values"], "Memory used by segments", segments.doc_values_memory_in_bytes),
    stat!(Gauge "segments_memory_bytes" ["index_writer"], "Memory used by segments", segments.index_writer_memory_in_bytes),
    stat!(Gauge "segments_memory_bytes" ["version_map"], "Memory used by segments", segments.version_map_memory_in_bytes),
    stat!(Gauge "segments_memory_bytes" ["fixed_bit_set"], "Memory used by segments", segments.fixed_bit_set_memory_in_bytes),
    // translog
    stat!(Gauge "translog_operations_number", "Current number of translog operations", translog.operations),
    stat!(Gauge "translog_size_bytes", "Translog size", translog.size_in_bytes),
    stat!(Gauge "translog_uncommitted_operations_number", "Current number of uncommitted translog operations", translog.uncommitted_operations),
    stat!(Gauge "translog_uncommitted_size_bytes", "Translog uncommitted size", translog.uncommitted_size_in_bytes),
];

fn prefix_for(scope: Scope) -> &'static str {
    match scope {
        Scope::Cluster => INDEX_PREFIX,
        Scope::Node => NODE_PREFIX,
    }
}

/// Declare the families; node scope yields `indices_*`, cluster scope the
/// per-index `index_*` families.
pub(super) fn register(catalog: &mut Catalog, scope: Scope) -> Result<()> {
    let prefix = prefix_for(scope);
    let mut seen = HashSet::new();
    for stat in COMMON_STATS {
        if !seen.insert(stat.suffix) {
            continue;
        }
        let mut labels: Vec<&str> = match scope {
            Scope::Cluster => INDEX_LABELS.to_vec(),
            Scope::Node => Vec::new(),
        };
        if stat.type_label.is_some() {
            labels.push(TYPE_LABEL);
        }
        let name = format!("{}{}", prefix, stat.suffix);
        register_family(catalog, scope, stat.kind, &name, stat.help, &labels)?;
    }
    Ok(())
}

/// Set the families from `stats`. `labels` holds the index and context
/// values at index level and is empty at node level. Absent sections are
/// skipped.
pub(super) fn populate(catalog: &Catalog, target: Target<'_>, stats: &CommonStats, labels: &[&str]) -> Result<()> {
    let prefix = match target {
        Target::Cluster => prefix_for(Scope::Cluster),
        Target::Node(_) => prefix_for(Scope::Node),
    };
    for stat in COMMON_STATS {
        let Some(value) = (stat.value)(stats) else {
            continue;
        };
        let mut values = labels.to_vec();
        if let Some(type_label) = stat.type_label {
            values.push(type_label);
        }
        let name = format!("{}{}", prefix, stat.suffix);
        target.set(catalog, stat.kind, &name, value, &values)?;
    }
    Ok(())
}
