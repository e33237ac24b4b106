//! Scrape handling
//!
//! One scrape = one settings snapshot, one pipeline run, one fresh catalog.
//! The pipeline runs on its own task; if it outlives the scrape timeout the
//! task is left to finish on its own and its result is discarded.

use crate::catalog::Catalog;
use crate::client::ClusterClient;
use crate::collect::Orchestrator;
use crate::metrics::{LAST_SCRAPE_FAMILIES, SCRAPE_DURATION, SCRAPE_TOTAL};
use crate::populate::{populate, register_metrics};
use crate::settings::{SettingsSnapshot, SettingsStore};
use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, warn};

/// The scrape did not finish within its deadline
#[derive(Debug, Error)]
#[error("scrape did not complete within {0:?}")]
pub struct ScrapeTimeout(pub Duration);

/// Collect, register, populate and render with a fresh catalog.
pub async fn render_scrape<C>(client: &C, prefix: &str, settings: &SettingsSnapshot) -> Result<String>
where
    C: ClusterClient + ?Sized,
{
    let snapshot = Orchestrator::new(client)
        .collect(settings)
        .await
        .context("failed to collect cluster statistics")?;

    let cluster_name = if snapshot.local_node.cluster_name.is_empty() {
        snapshot.health.cluster_name.as_str()
    } else {
        snapshot.local_node.cluster_name.as_str()
    };

    let mut catalog = Catalog::new(cluster_name, prefix).context("failed to create metrics catalog")?;
    register_metrics(&mut catalog, settings).context("failed to register metrics")?;
    populate(&catalog, &snapshot).context("failed to populate metrics")?;
    let text = catalog.render_text().context("failed to render metrics")?;

    LAST_SCRAPE_FAMILIES.set(catalog.len() as f64);
    Ok(text)
}

pub struct ScrapeHandler {
    client: Arc<dyn ClusterClient>,
    settings: Arc<SettingsStore>,
    prefix: String,
    timeout: Duration,
}

impl ScrapeHandler {
    pub fn new(
        client: Arc<dyn ClusterClient>,
        settings: Arc<SettingsStore>,
        prefix: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            client,
            settings,
            prefix: prefix.into(),
            timeout,
        }
    }

    pub fn settings(&self) -> &SettingsStore {
        &self.settings
    }

    /// Serve one scrape. Fails with [`ScrapeTimeout`] in the chain when the
    /// deadline passes first.
    pub async fn scrape(&self) -> Result<String> {
        let settings = self.settings.snapshot();
        let client = Arc::clone(&self.client);
        let prefix = self.prefix.clone();
        let started = Instant::now();

        let task = tokio::spawn(async move { render_scrape(client.as_ref(), &prefix, &settings).await });

        let result = match tokio::time::timeout(self.timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) => Err(anyhow::Error::new(join_err).context("scrape task failed")),
            Err(_) => Err(ScrapeTimeout(self.timeout).into()),
        };

        let elapsed = started.elapsed();
        SCRAPE_DURATION.observe(elapsed.as_secs_f64());
        let status = match &result {
            Ok(_) => "ok",
            Err(e) if e.is::<ScrapeTimeout>() => "timeout",
            Err(_) => "error",
        };
        SCRAPE_TOTAL.with_label_values(&[status]).inc();

        match &result {
            Ok(text) => debug!(bytes = text.len(), elapsed_ms = elapsed.as_millis() as u64, "Scrape completed"),
            Err(e) => warn!(status, "Scrape failed: {:#}", e),
        }
        result
    }
}
