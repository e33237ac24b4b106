//! Exporter self-metrics
//!
//! These describe the exporter process (scrape outcomes, latency, failing
//! stages) and live in the process-global default registry. The cluster
//! metrics served on the scrape route never touch this registry: each
//! scrape builds its own catalog.

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_gauge, register_histogram, CounterVec, Encoder, Gauge,
    Histogram, TextEncoder,
};

// ── Scrape metrics ───────────────────────────────────────────────────────────

pub static SCRAPE_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "osprom_scrapes_total",
        "Scrapes served, by outcome",
        &["status"]
    )
    .unwrap()
});

pub static SCRAPE_DURATION: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "osprom_scrape_duration_seconds",
        "End-to-end scrape latency",
        vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]
    )
    .unwrap()
});

pub static LAST_SCRAPE_FAMILIES: Lazy<Gauge> = Lazy::new(|| {
    register_gauge!(
        "osprom_last_scrape_metric_families",
        "Metric families registered by the last successful scrape"
    )
    .unwrap()
});

// ── Collection metrics ───────────────────────────────────────────────────────

pub static STAGE_FAILURES: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "osprom_collect_stage_failures_total",
        "Collection stages that failed, by stage",
        &["stage"]
    )
    .unwrap()
});

// ── Settings metrics ─────────────────────────────────────────────────────────

pub static SETTINGS_UPDATES: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "osprom_settings_updates_total",
        "Dynamic settings update requests, by outcome",
        &["status"]
    )
    .unwrap()
});

/// Render all registered self-metrics to Prometheus text format.
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_includes_touched_metrics() {
        STAGE_FAILURES.with_label_values(&["nodes_stats"]).inc();
        SCRAPE_TOTAL.with_label_values(&["ok"]).inc();

        let text = encode_metrics().unwrap();
        assert!(text.contains("osprom_collect_stage_failures_total{stage=\"nodes_stats\"}"));
        assert!(text.contains("osprom_scrapes_total{status=\"ok\"}"));
    }
}
