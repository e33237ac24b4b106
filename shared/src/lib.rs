//! Shared types and utilities for osprom
//!
//! This crate contains the typed view of the cluster-administration responses
//! the exporter consumes (health, node info, node stats, indices stats and
//! settings layers), plus parsers for the ratio and byte-size values used by
//! cluster settings.

pub mod types;
pub mod utils;

// Re-export commonly used types
pub use types::{health::*, indices::*, nodes::*, settings::*};
