//! OpenSearch Prometheus exporter library

pub mod audit;
pub mod catalog;
pub mod client;
pub mod collect;
pub mod config;
pub mod disk;
pub mod handler;
pub mod metrics;
pub mod populate;
pub mod server;
pub mod settings;
