//! Disk-based shard allocation settings
//!
//! The low, high and flood-stage watermarks can each be set either as a
//! percentage or as an absolute byte size, never both, and can be changed on
//! the fly at any settings layer. This module resolves them into one typed
//! value per watermark so that consumers never need to re-parse strings.

use osprom_shared::utils::{parse_bool, parse_byte_size, parse_ratio_percent};
use osprom_shared::{ClusterSettingsLayers, SettingsLayer};
use tracing::trace;

pub const THRESHOLD_ENABLED_KEY: &str = "cluster.routing.allocation.disk.threshold_enabled";
pub const WATERMARK_LOW_KEY: &str = "cluster.routing.allocation.disk.watermark.low";
pub const WATERMARK_HIGH_KEY: &str = "cluster.routing.allocation.disk.watermark.high";
pub const WATERMARK_FLOOD_STAGE_KEY: &str = "cluster.routing.allocation.disk.watermark.flood_stage";

/// A successfully parsed watermark value
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Watermark {
    Percent(f64),
    Bytes(i64),
}

/// Parse a watermark, trying a ratio first and a byte size second.
pub fn parse_watermark(value: &str) -> Option<Watermark> {
    match parse_ratio_percent(value) {
        Ok(pct) => Some(Watermark::Percent(pct)),
        Err(ratio_err) => match parse_byte_size(value) {
            Ok(bytes) => Some(Watermark::Bytes(bytes)),
            Err(bytes_err) => {
                trace!("Ignoring watermark [{}]: {}; {}", value, ratio_err, bytes_err);
                None
            }
        },
    }
}

/// Resolved state of a single watermark. At most one field is set.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WatermarkSetting {
    pub pct: Option<f64>,
    pub bytes: Option<i64>,
}

impl WatermarkSetting {
    pub fn is_resolved(&self) -> bool {
        self.pct.is_some() || self.bytes.is_some()
    }

    /// Take `value` unless a higher-priority layer already resolved this
    /// watermark.
    fn resolve_from(&mut self, value: Option<&str>) {
        if self.is_resolved() {
            return;
        }
        match value.and_then(parse_watermark) {
            Some(Watermark::Percent(pct)) => self.pct = Some(pct),
            Some(Watermark::Bytes(bytes)) => self.bytes = Some(bytes),
            None => {}
        }
    }
}

impl From<Watermark> for WatermarkSetting {
    fn from(watermark: Watermark) -> Self {
        match watermark {
            Watermark::Percent(pct) => Self {
                pct: Some(pct),
                bytes: None,
            },
            Watermark::Bytes(bytes) => Self {
                pct: None,
                bytes: Some(bytes),
            },
        }
    }
}

/// Disk threshold settings resolved across all settings layers
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DiskThresholdSettings {
    pub threshold_enabled: Option<bool>,
    pub low: WatermarkSetting,
    pub high: WatermarkSetting,
    pub flood_stage: WatermarkSetting,
}

impl DiskThresholdSettings {
    /// Resolve from layers given highest priority first. For every quantity
    /// the first layer holding a parseable value wins.
    pub fn resolve<'a, I>(layers: I) -> Self
    where
        I: IntoIterator<Item = &'a SettingsLayer>,
    {
        let mut resolved = Self::default();
        for layer in layers {
            if resolved.threshold_enabled.is_none() {
                resolved.threshold_enabled = layer
                    .get(THRESHOLD_ENABLED_KEY)
                    .and_then(|v| parse_bool(v).ok());
            }
            resolved.low.resolve_from(layer.get(WATERMARK_LOW_KEY));
            resolved.high.resolve_from(layer.get(WATERMARK_HIGH_KEY));
            resolved.flood_stage.resolve_from(layer.get(WATERMARK_FLOOD_STAGE_KEY));
        }
        resolved
    }
}

/// Data derived from the cluster-wide settings
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ClusterStatsData {
    pub disk: DiskThresholdSettings,
}

impl ClusterStatsData {
    pub fn from_layers(layers: &ClusterSettingsLayers) -> Self {
        Self {
            disk: DiskThresholdSettings::resolve(layers.in_priority_order()),
        }
    }
}
