//! Resource quantity parsing.
//!
//! Two unit families are in play and never compared with each other:
//!
//! - **Usage metrics** from the metrics API: cpu in nano-cores (`"123456n"`),
//!   memory in kibibytes (`"1048576Ki"`).
//! - **Requests and allocatable capacity**: cpu in milli-cores (`"1500m"`) or
//!   a decimal core count (`"2"`, `"0.5"`) normalized to milli-cores.

use thiserror::Error;

/// Resource name used for cpu in request and allocatable maps.
pub const CPU: &str = "cpu";

/// Quantity parsing errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {kind} quantity {value:?}")]
pub struct QuantityError {
    pub kind: &'static str,
    pub value: String,
}

impl QuantityError {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

/// Parse a cpu usage metric into nano-cores.
pub fn cpu_usage_nanos(value: &str) -> Result<i64, QuantityError> {
    let digits = value.strip_suffix('n').unwrap_or(value);
    digits
        .parse()
        .map_err(|_| QuantityError::new("cpu usage", value))
}

/// Parse a memory usage metric into kibibytes.
pub fn memory_usage_kib(value: &str) -> Result<i64, QuantityError> {
    let digits = value.strip_suffix("Ki").unwrap_or(value);
    digits
        .parse()
        .map_err(|_| QuantityError::new("memory usage", value))
}

/// Parse a cpu request counted towards usage and demand.
///
/// Only milli-core requests are counted. Whole-core strings such as `"1"`
/// yield `Ok(None)` and are left out of every sum.
pub fn milli_cpu_request(value: &str) -> Result<Option<i64>, QuantityError> {
    match value.strip_suffix('m') {
        Some(millis) => millis
            .parse()
            .map(Some)
            .map_err(|_| QuantityError::new("cpu request", value)),
        None => Ok(None),
    }
}

/// Parse an allocatable cpu value into milli-cores.
pub fn allocatable_milli_cpu(value: &str) -> Result<i64, QuantityError> {
    if let Some(millis) = value.strip_suffix('m') {
        return millis
            .parse()
            .map_err(|_| QuantityError::new("allocatable cpu", value));
    }

    let cores: f64 = value
        .parse()
        .map_err(|_| QuantityError::new("allocatable cpu", value))?;
    if !cores.is_finite() || cores < 0.0 {
        return Err(QuantityError::new("allocatable cpu", value));
    }
    Ok((cores * 1000.0).round() as i64)
}
