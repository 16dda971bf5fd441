//! String parsing and formatting utilities

use crate::error::{ProbeError, Result};

/// Placeholder shown for any value the host could not supply
pub const UNKNOWN: &str = "N/A";

/// Extract value after a colon and space
pub fn extract_after_colon(line: &str) -> Option<String> {
    line.split_once(':')
        .map(|(_, rest)| rest.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Parse a `MemTotal:  16326452 kB` style line into bytes
pub fn meminfo_line_to_bytes(line: &str) -> Result<u64> {
    let value = extract_after_colon(line)
        .ok_or_else(|| ProbeError::Parse(format!("No value in meminfo line: {}", line)))?;
    let kb: u64 = value
        .trim_end_matches("kB")
        .trim()
        .parse()
        .map_err(|_| ProbeError::Parse(format!("Invalid memory value: {}", value)))?;
    Ok(kb * 1024)
}

/// Parse a numeric telemetry cell. `[N/A]`, `[Not Supported]` and blanks are unknown.
pub fn parse_metric(cell: &str) -> Option<f64> {
    let cell = cell.trim();
    if cell.is_empty() || cell.starts_with('[') {
        return None;
    }
    cell.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// `0.42` -> `42.00%`
pub fn format_percent(fraction: f64) -> String {
    format!("{:.2}%", fraction * 100.0)
}

/// Decimal gigabytes, as storage vendors count them
pub fn format_gb(bytes: u64) -> String {
    format!("{:.2} GB", bytes as f64 / 1e9)
}

pub fn format_mhz(mhz: f64) -> String {
    format!("{:.2} MHz", mhz)
}

/// Whole numbers print without a fraction, like the query tool reports them
pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

pub fn format_or_unknown<T>(value: Option<T>, f: impl FnOnce(T) -> String) -> String {
    value.map(f).unwrap_or_else(|| UNKNOWN.to_string())
}
