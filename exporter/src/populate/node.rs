//! Per-node families: roles, thread pools, JVM, OS, process, file system,
//! transport, HTTP, circuit breakers and scripts.

use super::{bool_value, counter, gauge, millis_to_seconds, register_defs, FamilyDef};
use crate::catalog::{Catalog, NodeContext, Result, Scope};
use osprom_shared::NodeStats;

/// Roles every node is reported against, whether it holds them or not
pub const BUILT_IN_ROLES: [&str; 5] = ["cluster_manager", "data", "ingest", "remote_cluster_client", "search"];

const FAMILIES: &[FamilyDef] = &[
    gauge("node_role_bool", "Node role", &["role"]),
    // thread pools
    gauge("threadpool_threads_number", "Number of threads in thread pool", &["name", "type"]),
    counter("threadpool_threads_count", "Count of threads in thread pool", &["name", "type"]),
    gauge("threadpool_tasks_number", "Number of tasks in thread pool", &["name", "type"]),
    // jvm
    gauge("jvm_uptime_seconds", "JVM uptime", &[]),
    gauge("jvm_mem_heap_max_bytes", "Maximum used memory in heap", &[]),
    gauge("jvm_mem_heap_used_bytes", "Memory used in heap", &[]),
    gauge("jvm_mem_heap_used_percent", "Percentage of memory used in heap", &[]),
    gauge("jvm_mem_heap_committed_bytes", "Committed bytes in heap", &[]),
    gauge("jvm_mem_nonheap_used_bytes", "Memory used apart from heap", &[]),
    gauge("jvm_mem_nonheap_committed_bytes", "Committed bytes apart from heap", &[]),
    gauge("jvm_mem_pool_max_bytes", "Maximum usage of memory pool", &["pool"]),
    gauge("jvm_mem_pool_peak_max_bytes", "Maximum usage peak of memory pool", &["pool"]),
    gauge("jvm_mem_pool_used_bytes", "Used memory in memory pool", &["pool"]),
    gauge("jvm_mem_pool_peak_used_bytes", "Used memory peak in memory pool", &["pool"]),
    gauge("jvm_threads_number", "Number of threads", &[]),
    gauge("jvm_threads_peak_number", "Peak number of threads", &[]),
    counter("jvm_gc_collection_count", "Count of GC collections", &["gc"]),
    counter("jvm_gc_collection_time_seconds", "Time spent for GC collections", &["gc"]),
    gauge("jvm_bufferpool_number", "Number of buffer pools", &["bufferpool"]),
    gauge("jvm_bufferpool_total_capacity_bytes", "Total capacity provided by buffer pools", &["bufferpool"]),
    gauge("jvm_bufferpool_used_bytes", "Used memory in buffer pools", &["bufferpool"]),
    // os
    gauge("os_cpu_percent", "CPU usage in percent", &[]),
    gauge("os_load_average_one_minute", "CPU load", &[]),
    gauge("os_load_average_five_minutes", "CPU load", &[]),
    gauge("os_load_average_fifteen_minutes", "CPU load", &[]),
    gauge("os_mem_free_bytes", "Memory free", &[]),
    gauge("os_mem_used_bytes", "Memory used", &[]),
    gauge("os_mem_total_bytes", "Total memory size", &[]),
    gauge("os_swap_free_bytes", "Swap free", &[]),
    gauge("os_swap_used_bytes", "Swap used", &[]),
    gauge("os_swap_total_bytes", "Total swap size", &[]),
    // process
    gauge("process_cpu_percent", "CPU percentage used by OpenSearch process", &[]),
    counter("process_cpu_time_seconds", "CPU time used by OpenSearch process", &[]),
    gauge("process_mem_total_virtual_bytes", "Memory used by OpenSearch process", &[]),
    gauge("process_file_descriptors_open_number", "Open file descriptors", &[]),
    gauge("process_file_descriptors_max_number", "Max file descriptors", &[]),
    // fs
    gauge("fs_total_total_bytes", "Total disk space for all mount points", &[]),
    gauge("fs_total_available_bytes", "Available disk space for all mount points", &[]),
    gauge("fs_total_free_bytes", "Free disk space for all mountpoints", &[]),
    gauge("fs_path_total_bytes", "Total disk space", &["path", "mount", "type"]),
    gauge("fs_path_available_bytes", "Available disk space", &["path", "mount", "type"]),
    gauge("fs_path_free_bytes", "Free disk space", &["path", "mount", "type"]),
    // transport, http
    gauge("transport_server_open_number", "Opened server connections", &[]),
    counter("transport_rx_packets_count", "Received packets", &[]),
    counter("transport_tx_packets_count", "Sent packets", &[]),
    counter("transport_rx_bytes_count", "Bytes received", &[]),
    counter("transport_tx_bytes_count", "Bytes sent", &[]),
    gauge("http_open_server_number", "Number of open server connections", &[]),
    counter("http_open_total_count", "Count of opened connections", &[]),
    // breakers
    gauge("circuitbreaker_estimated_bytes", "Circuit breaker estimated size", &["name"]),
    gauge("circuitbreaker_limit_bytes", "Circuit breaker size limit", &["name"]),
    gauge("circuitbreaker_overhead_ratio", "Circuit breaker overhead ratio", &["name"]),
    counter("circuitbreaker_tripped_count", "Circuit breaker tripped count", &["name"]),
    // script
    counter("script_compilations_count", "Count of script compilations", &[]),
    counter("script_cache_evictions_count", "Count of evictions in script cache", &[]),
    counter("script_compilation_limit_triggered_count", "Count of times the script compilation limit was triggered", &[]),
];

pub(super) fn register(catalog: &mut Catalog) -> Result<()> {
    register_defs(catalog, Scope::Node, FAMILIES)
}

pub(super) fn populate(catalog: &Catalog, node: &NodeContext, stats: &NodeStats) -> Result<()> {
    let set_gauge = |metric: &str, value: f64, labels: &[&str]| catalog.set_node_gauge(node, metric, value, labels);
    let set_counter = |metric: &str, value: f64, labels: &[&str]| catalog.set_node_counter(node, metric, value, labels);

    for role in BUILT_IN_ROLES {
        let held = stats.roles.iter().any(|r| r == role);
        set_gauge("node_role_bool", bool_value(held), &[role])?;
    }
    for role in stats.roles.iter().filter(|r| !BUILT_IN_ROLES.contains(&r.as_str())) {
        set_gauge("node_role_bool", 1.0, &[role.as_str()])?;
    }

    for (name, pool) in &stats.thread_pool {
        let name = name.as_str();
        set_gauge("threadpool_threads_number", pool.threads as f64, &[name, "threads"])?;
        set_gauge("threadpool_threads_number", pool.active as f64, &[name, "active"])?;
        set_gauge("threadpool_threads_number", pool.largest as f64, &[name, "largest"])?;
        set_counter("threadpool_threads_count", pool.completed as f64, &[name, "completed"])?;
        set_counter("threadpool_threads_count", pool.rejected as f64, &[name, "rejected"])?;
        set_gauge("threadpool_tasks_number", pool.queue as f64, &[name, "queue"])?;
    }

    if let Some(jvm) = &stats.jvm {
        set_gauge("jvm_uptime_seconds", millis_to_seconds(jvm.uptime_in_millis), &[])?;
        set_gauge("jvm_mem_heap_max_bytes", jvm.mem.heap_max_in_bytes as f64, &[])?;
        set_gauge("jvm_mem_heap_used_bytes", jvm.mem.heap_used_in_bytes as f64, &[])?;
        set_gauge("jvm_mem_heap_used_percent", jvm.mem.heap_used_percent, &[])?;
        set_gauge("jvm_mem_heap_committed_bytes", jvm.mem.heap_committed_in_bytes as f64, &[])?;
        set_gauge("jvm_mem_nonheap_used_bytes", jvm.mem.non_heap_used_in_bytes as f64, &[])?;
        set_gauge("jvm_mem_nonheap_committed_bytes", jvm.mem.non_heap_committed_in_bytes as f64, &[])?;
        for (pool, mem) in &jvm.mem.pools {
            let pool = pool.as_str();
            set_gauge("jvm_mem_pool_max_bytes", mem.max_in_bytes as f64, &[pool])?;
            set_gauge("jvm_mem_pool_peak_max_bytes", mem.peak_max_in_bytes as f64, &[pool])?;
            set_gauge("jvm_mem_pool_used_bytes", mem.used_in_bytes as f64, &[pool])?;
            set_gauge("jvm_mem_pool_peak_used_bytes", mem.peak_used_in_bytes as f64, &[pool])?;
        }
        set_gauge("jvm_threads_number", jvm.threads.count as f64, &[])?;
        set_gauge("jvm_threads_peak_number", jvm.threads.peak_count as f64, &[])?;
        for (gc, collector) in &jvm.gc.collectors {
            let gc = gc.as_str();
            set_counter("jvm_gc_collection_count", collector.collection_count as f64, &[gc])?;
            set_counter(
                "jvm_gc_collection_time_seconds",
                millis_to_seconds(collector.collection_time_in_millis),
                &[gc],
            )?;
        }
        for (name, pool) in &jvm.buffer_pools {
            let name = name.as_str();
            set_gauge("jvm_bufferpool_number", pool.count as f64, &[name])?;
            set_gauge("jvm_bufferpool_total_capacity_bytes", pool.total_capacity_in_bytes as f64, &[name])?;
            set_gauge("jvm_bufferpool_used_bytes", pool.used_in_bytes as f64, &[name])?;
        }
    }

    if let Some(os) = &stats.os {
        set_gauge("os_cpu_percent", os.cpu.percent, &[])?;
        for (key, metric) in [
            ("1m", "os_load_average_one_minute"),
            ("5m", "os_load_average_five_minutes"),
            ("15m", "os_load_average_fifteen_minutes"),
        ] {
            if let Some(load) = os.cpu.load_average.get(key) {
                set_gauge(metric, *load, &[])?;
            }
        }
        set_gauge("os_mem_free_bytes", os.mem.free_in_bytes as f64, &[])?;
        set_gauge("os_mem_used_bytes", os.mem.used_in_bytes as f64, &[])?;
        set_gauge("os_mem_total_bytes", os.mem.total_in_bytes as f64, &[])?;
        set_gauge("os_swap_free_bytes", os.swap.free_in_bytes as f64, &[])?;
        set_gauge("os_swap_used_bytes", os.swap.used_in_bytes as f64, &[])?;
        set_gauge("os_swap_total_bytes", os.swap.total_in_bytes as f64, &[])?;
    }

    if let Some(process) = &stats.process {
        set_gauge("process_cpu_percent", process.cpu.percent, &[])?;
        // negative means unavailable; a counter cannot carry it
        if let Ok(millis) = u64::try_from(process.cpu.total_in_millis) {
            set_counter("process_cpu_time_seconds", millis_to_seconds(millis), &[])?;
        }
        set_gauge("process_mem_total_virtual_bytes", process.mem.total_virtual_in_bytes as f64, &[])?;
        set_gauge("process_file_descriptors_open_number", process.open_file_descriptors as f64, &[])?;
        set_gauge("process_file_descriptors_max_number", process.max_file_descriptors as f64, &[])?;
    }

    if let Some(fs) = &stats.fs {
        set_gauge("fs_total_total_bytes", fs.total.total_in_bytes as f64, &[])?;
        set_gauge("fs_total_available_bytes", fs.total.available_in_bytes as f64, &[])?;
        set_gauge("fs_total_free_bytes", fs.total.free_in_bytes as f64, &[])?;
        for path in &fs.data {
            let labels = [path.path.as_str(), path.mount.as_str(), path.fs_type.as_str()];
            set_gauge("fs_path_total_bytes", path.total_in_bytes as f64, &labels)?;
            set_gauge("fs_path_available_bytes", path.available_in_bytes as f64, &labels)?;
            set_gauge("fs_path_free_bytes", path.free_in_bytes as f64, &labels)?;
        }
    }

    if let Some(transport) = &stats.transport {
        set_gauge("transport_server_open_number", transport.server_open as f64, &[])?;
        set_counter("transport_rx_packets_count", transport.rx_count as f64, &[])?;
        set_counter("transport_tx_packets_count", transport.tx_count as f64, &[])?;
        set_counter("transport_rx_bytes_count", transport.rx_size_in_bytes as f64, &[])?;
        set_counter("transport_tx_bytes_count", transport.tx_size_in_bytes as f64, &[])?;
    }

    if let Some(http) = &stats.http {
        set_gauge("http_open_server_number", http.current_open as f64, &[])?;
        set_counter("http_open_total_count", http.total_opened as f64, &[])?;
    }

    for (name, breaker) in &stats.breakers {
        let name = name.as_str();
        set_gauge("circuitbreaker_estimated_bytes", breaker.estimated_size_in_bytes as f64, &[name])?;
        set_gauge("circuitbreaker_limit_bytes", breaker.limit_size_in_bytes as f64, &[name])?;
        set_gauge("circuitbreaker_overhead_ratio", breaker.overhead, &[name])?;
        set_counter("circuitbreaker_tripped_count", breaker.tripped as f64, &[name])?;
    }

    if let Some(script) = &stats.script {
        set_counter("script_compilations_count", script.compilations as f64, &[])?;
        set_counter("script_cache_evictions_count", script.cache_evictions as f64, &[])?;
        set_counter(
            "script_compilation_limit_triggered_count",
            script.compilation_limit_triggered as f64,
            &[],
        )?;
    }

    Ok(())
}
