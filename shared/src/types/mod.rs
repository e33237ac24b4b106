//! Typed views of the cluster-administration responses

pub mod health;
pub mod indices;
pub mod nodes;
pub mod settings;
