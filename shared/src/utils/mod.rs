//! Utility functions and helpers

pub mod units;

pub use units::{parse_bool, parse_byte_size, parse_ratio_percent, UnitError};
