//! Parsers for the value formats used by cluster settings
//!
//! Watermark-style settings accept either a ratio (`"85%"`, `"0.85"`) or an
//! absolute byte size (`"500mb"`). These follow the cluster's own parsing
//! rules so that a value accepted by the cluster is accepted here.

use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum UnitError {
    #[error("invalid ratio [{0}]")]
    InvalidRatio(String),

    #[error("ratio [{0}] out of range, must be between 0 and 100% (or 0.0 and 1.0)")]
    RatioOutOfRange(String),

    #[error("invalid byte size [{0}], unit is missing or unrecognized")]
    MissingUnit(String),

    #[error("invalid byte size [{0}]")]
    InvalidByteSize(String),

    #[error("invalid boolean [{0}], only [true] or [false] are allowed")]
    InvalidBool(String),
}

const KB: f64 = 1024.0;
const UNITS: &[(&str, f64)] = &[
    ("kb", KB),
    ("k", KB),
    ("mb", KB * KB),
    ("m", KB * KB),
    ("gb", KB * KB * KB),
    ("g", KB * KB * KB),
    ("tb", KB * KB * KB * KB),
    ("t", KB * KB * KB * KB),
    ("pb", KB * KB * KB * KB * KB),
    ("p", KB * KB * KB * KB * KB),
    ("b", 1.0),
];

/// Parse a ratio value and return it as a percentage.
///
/// `"85%"` and `"85.5%"` are percentages in `[0, 100]`; a bare number is a
/// ratio in `[0, 1]` and is scaled by 100 (`"0.85"` -> `85.0`).
pub fn parse_ratio_percent(s: &str) -> Result<f64, UnitError> {
    let s = s.trim();
    if let Some(num_str) = s.strip_suffix('%') {
        let percent = parse_finite(num_str).ok_or_else(|| UnitError::InvalidRatio(s.into()))?;
        if !(0.0..=100.0).contains(&percent) {
            return Err(UnitError::RatioOutOfRange(s.into()));
        }
        Ok(percent)
    } else {
        let ratio = parse_finite(s).ok_or_else(|| UnitError::InvalidRatio(s.into()))?;
        if !(0.0..=1.0).contains(&ratio) {
            return Err(UnitError::RatioOutOfRange(s.into()));
        }
        Ok(ratio * 100.0)
    }
}

/// Parse a byte size such as `"500mb"`, `"1.5gb"` or `"1024b"`.
///
/// A unit is mandatory except for the sentinels `"-1"` and `"0"`.
pub fn parse_byte_size(s: &str) -> Result<i64, UnitError> {
    let lower = s.trim().to_lowercase();
    for (suffix, multiplier) in UNITS {
        if let Some(num_str) = lower.strip_suffix(suffix) {
            let num_str = num_str.trim();
            if let Ok(n) = num_str.parse::<i64>() {
                if n < 0 {
                    return Err(UnitError::InvalidByteSize(s.into()));
                }
                return Ok((n as f64 * multiplier) as i64);
            }
            return match parse_finite(num_str) {
                Some(f) if f >= 0.0 => Ok((f * multiplier) as i64),
                _ => Err(UnitError::InvalidByteSize(s.into())),
            };
        }
    }
    match lower.as_str() {
        "-1" => Ok(-1),
        "0" => Ok(0),
        _ => Err(UnitError::MissingUnit(s.into())),
    }
}

/// Strict boolean parsing: only `true` and `false` are accepted.
pub fn parse_bool(s: &str) -> Result<bool, UnitError> {
    match s.trim() {
        "true" => Ok(true),
        "false" => Ok(false),
        other => Err(UnitError::InvalidBool(other.into())),
    }
}

fn parse_finite(s: &str) -> Option<f64> {
    s.trim().parse::<f64>().ok().filter(|f| f.is_finite())
}
