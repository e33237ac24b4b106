//! Cluster-scoped families: health, per-index health and the disk
//! allocation thresholds.

use super::{bool_value, gauge, millis_to_seconds, register_defs, FamilyDef};
use crate::catalog::{Catalog, Result, Scope};
use crate::disk::{DiskThresholdSettings, WatermarkSetting};
use osprom_shared::ClusterHealth;

const HEALTH_FAMILIES: &[FamilyDef] = &[
    gauge("cluster_status", "Health status of the cluster, based on the state of its primary and replica shards", &[]),
    gauge("cluster_nodes_number", "Number of nodes in the cluster", &[]),
    gauge("cluster_datanodes_number", "Number of data nodes in the cluster", &[]),
    gauge("cluster_shards_active_percent", "Percent of active shards", &[]),
    gauge("cluster_shards_number", "Number of shards", &["type"]),
    gauge("cluster_pending_tasks_number", "Number of cluster-level changes which have not yet been executed", &[]),
    gauge("cluster_task_max_waiting_time_seconds", "Max waiting time for tasks", &[]),
    gauge("cluster_is_timedout_bool", "Is the cluster timed out?", &[]),
    gauge("cluster_inflight_fetch_number", "Number of in flight fetches", &[]),
];

const INDEX_HEALTH_FAMILIES: &[FamilyDef] = &[
    gauge("index_status", "Index status", &["index"]),
    gauge("index_replicas_number", "Number of replicas", &["index"]),
    gauge("index_shards_number", "Number of shards", &["index", "type"]),
];

const DISK_FAMILIES: &[FamilyDef] = &[
    gauge("cluster_routing_allocation_disk_threshold_enabled", "Disk allocation decider is enabled", &[]),
    gauge("cluster_routing_allocation_disk_watermark_low_bytes", "Low watermark for disk usage in bytes", &[]),
    gauge("cluster_routing_allocation_disk_watermark_high_bytes", "High watermark for disk usage in bytes", &[]),
    gauge("cluster_routing_allocation_disk_watermark_flood_stage_bytes", "Flood stage watermark for disk usage in bytes", &[]),
    gauge("cluster_routing_allocation_disk_watermark_low_pct", "Low watermark for disk usage in pct", &[]),
    gauge("cluster_routing_allocation_disk_watermark_high_pct", "High watermark for disk usage in pct", &[]),
    gauge("cluster_routing_allocation_disk_watermark_flood_stage_pct", "Flood stage watermark for disk usage in pct", &[]),
];

pub(super) fn register_health(catalog: &mut Catalog) -> Result<()> {
    register_defs(catalog, Scope::Cluster, HEALTH_FAMILIES)
}

pub(super) fn register_index_health(catalog: &mut Catalog) -> Result<()> {
    register_defs(catalog, Scope::Cluster, INDEX_HEALTH_FAMILIES)
}

pub(super) fn register_disk(catalog: &mut Catalog) -> Result<()> {
    register_defs(catalog, Scope::Cluster, DISK_FAMILIES)
}

pub(super) fn populate_health(catalog: &Catalog, health: &ClusterHealth, with_indices: bool) -> Result<()> {
    catalog.set_cluster_gauge("cluster_status", health.status.as_value(), &[])?;
    catalog.set_cluster_gauge("cluster_nodes_number", health.number_of_nodes as f64, &[])?;
    catalog.set_cluster_gauge("cluster_datanodes_number", health.number_of_data_nodes as f64, &[])?;
    catalog.set_cluster_gauge("cluster_shards_active_percent", health.active_shards_percent_as_number, &[])?;

    for (kind, value) in [
        ("active_primary", health.active_primary_shards),
        ("active", health.active_shards),
        ("relocating", health.relocating_shards),
        ("initializing", health.initializing_shards),
        ("unassigned", health.unassigned_shards),
        ("delayed_unassigned", health.delayed_unassigned_shards),
    ] {
        catalog.set_cluster_gauge("cluster_shards_number", value as f64, &[kind])?;
    }

    catalog.set_cluster_gauge("cluster_pending_tasks_number", health.number_of_pending_tasks as f64, &[])?;
    catalog.set_cluster_gauge(
        "cluster_task_max_waiting_time_seconds",
        millis_to_seconds(health.task_max_waiting_in_queue_millis),
        &[],
    )?;
    catalog.set_cluster_gauge("cluster_is_timedout_bool", bool_value(health.timed_out), &[])?;
    catalog.set_cluster_gauge("cluster_inflight_fetch_number", health.number_of_in_flight_fetch as f64, &[])?;

    if !with_indices {
        return Ok(());
    }
    for (index, index_health) in &health.indices {
        let index = index.as_str();
        catalog.set_cluster_gauge("index_status", index_health.status.as_value(), &[index])?;
        catalog.set_cluster_gauge("index_replicas_number", index_health.number_of_replicas as f64, &[index])?;
        for (kind, value) in [
            ("shards", index_health.number_of_shards),
            ("active_primary", index_health.active_primary_shards),
            ("active", index_health.active_shards),
            ("relocating", index_health.relocating_shards),
            ("initializing", index_health.initializing_shards),
            ("unassigned", index_health.unassigned_shards),
        ] {
            catalog.set_cluster_gauge("index_shards_number", value as f64, &[index, kind])?;
        }
    }
    Ok(())
}

/// Only resolved quantities are exposed; a watermark sets either its
/// `_bytes` or its `_pct` family, never both.
pub(super) fn populate_disk(catalog: &Catalog, disk: &DiskThresholdSettings) -> Result<()> {
    if let Some(enabled) = disk.threshold_enabled {
        catalog.set_cluster_gauge("cluster_routing_allocation_disk_threshold_enabled", bool_value(enabled), &[])?;
    }
    for (name, watermark) in [("low", &disk.low), ("high", &disk.high), ("flood_stage", &disk.flood_stage)] {
        set_watermark(catalog, name, watermark)?;
    }
    Ok(())
}

fn set_watermark(catalog: &Catalog, name: &str, watermark: &WatermarkSetting) -> Result<()> {
    if let Some(bytes) = watermark.bytes {
        let metric = format!("cluster_routing_allocation_disk_watermark_{}_bytes", name);
        catalog.set_cluster_gauge(&metric, bytes as f64, &[])?;
    }
    if let Some(pct) = watermark.pct {
        let metric = format!("cluster_routing_allocation_disk_watermark_{}_pct", name);
        catalog.set_cluster_gauge(&metric, pct, &[])?;
    }
    Ok(())
}
