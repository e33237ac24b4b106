//! Snapshot to catalog
//!
//! [`register_metrics`] declares every family a scrape may expose;
//! [`populate`] walks a [`CollectionSnapshot`] and sets them. Index-level and
//! cluster-settings families are only declared when their collection stage
//! is enabled, so a disabled stage leaves no trace in the rendered text.

mod cluster;
mod common;
mod node;

use crate::catalog::{Catalog, CatalogError, MetricKind, NodeContext, Result, Scope};
use crate::collect::CollectionSnapshot;
use crate::settings::SettingsSnapshot;

pub const GENERATE_TIME_METRIC: &str = "metrics_generate_time_seconds";

/// Declaration of one metric family
#[derive(Debug, Clone, Copy)]
pub(crate) struct FamilyDef {
    pub name: &'static str,
    pub help: &'static str,
    pub kind: MetricKind,
    pub labels: &'static [&'static str],
}

pub(crate) const fn gauge(
    name: &'static str,
    help: &'static str,
    labels: &'static [&'static str],
) -> FamilyDef {
    FamilyDef {
        name,
        help,
        kind: MetricKind::Gauge,
        labels,
    }
}

pub(crate) const fn counter(
    name: &'static str,
    help: &'static str,
    labels: &'static [&'static str],
) -> FamilyDef {
    FamilyDef {
        name,
        help,
        kind: MetricKind::Counter,
        labels,
    }
}

pub(crate) fn register_family(
    catalog: &mut Catalog,
    scope: Scope,
    kind: MetricKind,
    name: &str,
    help: &str,
    labels: &[&str],
) -> Result<()> {
    match (scope, kind) {
        (Scope::Cluster, MetricKind::Gauge) => catalog.register_cluster_gauge(name, help, labels),
        (Scope::Node, MetricKind::Gauge) => catalog.register_node_gauge(name, help, labels),
        (Scope::Cluster, MetricKind::Counter) => catalog.register_cluster_counter(name, help, labels),
        (Scope::Node, MetricKind::Counter) => catalog.register_node_counter(name, help, labels),
        (_, MetricKind::Summary) => catalog.register_summary_timer(name, help, labels),
    }
}

pub(crate) fn register_defs(catalog: &mut Catalog, scope: Scope, defs: &[FamilyDef]) -> Result<()> {
    for def in defs {
        register_family(catalog, scope, def.kind, def.name, def.help, def.labels)?;
    }
    Ok(())
}

/// Where a value goes: cluster-scoped or attached to one node
#[derive(Debug, Clone, Copy)]
pub(crate) enum Target<'a> {
    Cluster,
    Node(&'a NodeContext),
}

impl Target<'_> {
    pub fn set(
        &self,
        catalog: &Catalog,
        kind: MetricKind,
        metric: &str,
        value: f64,
        labels: &[&str],
    ) -> Result<()> {
        match (self, kind) {
            (Target::Cluster, MetricKind::Gauge) => catalog.set_cluster_gauge(metric, value, labels),
            (Target::Node(node), MetricKind::Gauge) => catalog.set_node_gauge(node, metric, value, labels),
            (Target::Cluster, MetricKind::Counter) => catalog.set_cluster_counter(metric, value, labels),
            (Target::Node(node), MetricKind::Counter) => {
                catalog.set_node_counter(node, metric, value, labels)
            }
            (_, MetricKind::Summary) => Err(CatalogError::KindMismatch {
                metric: metric.to_string(),
                expected: MetricKind::Gauge,
                actual: MetricKind::Summary,
            }),
        }
    }
}

pub(crate) fn millis_to_seconds(millis: u64) -> f64 {
    millis as f64 / 1000.0
}

pub(crate) fn bool_value(flag: bool) -> f64 {
    if flag {
        1.0
    } else {
        0.0
    }
}

/// Declare every family a scrape under `settings` may set.
pub fn register_metrics(catalog: &mut Catalog, settings: &SettingsSnapshot) -> Result<()> {
    catalog.register_summary_timer(GENERATE_TIME_METRIC, "Time spent while generating metrics", &[])?;

    cluster::register_health(catalog)?;
    node::register(catalog)?;
    common::register(catalog, Scope::Node)?;

    if settings.indices_enabled() {
        cluster::register_index_health(catalog)?;
        common::register(catalog, Scope::Cluster)?;
    }
    if settings.cluster_settings_enabled() {
        cluster::register_disk(catalog)?;
    }
    Ok(())
}

/// Set every registered family from `snapshot`. Population time is recorded
/// in the generate-time summary of the local node.
pub fn populate(catalog: &Catalog, snapshot: &CollectionSnapshot) -> Result<()> {
    let local = NodeContext::from(&snapshot.local_node);
    let timer = catalog.start_summary_timer(&local, GENERATE_TIME_METRIC, &[])?;

    cluster::populate_health(catalog, &snapshot.health, snapshot.indices_stats.is_some())?;

    for stats in &snapshot.node_stats {
        let node = NodeContext::from(stats);
        node::populate(catalog, &node, stats)?;
        if let Some(indices) = &stats.indices {
            common::populate(catalog, Target::Node(&node), indices, &[])?;
        }
    }

    if let Some(indices) = &snapshot.indices_stats {
        for (index, group) in &indices.indices {
            common::populate(catalog, Target::Cluster, &group.primaries, &[index.as_str(), "primaries"])?;
            common::populate(catalog, Target::Cluster, &group.total, &[index.as_str(), "total"])?;
        }
    }

    if let Some(data) = &snapshot.cluster_settings {
        cluster::populate_disk(catalog, &data.disk)?;
    }

    timer.observe_duration();
    Ok(())
}
