//! File reading utilities

use crate::error::{ProbeError, Result};
use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Safely read a file to string with error handling
pub fn read_file_safe<P: AsRef<Path>>(path: P) -> Result<String> {
    fs::read_to_string(path).map_err(ProbeError::from)
}

/// Read first line of a file, trimmed.
/// Meant for single-value sysfs files like `cpuinfo_max_freq`.
pub fn read_first_line<P: AsRef<Path>>(path: P) -> Result<String> {
    let file = File::open(path)?;
    let mut line = String::with_capacity(32);
    BufReader::new(file).read_line(&mut line)?;
    Ok(line.trim().to_string())
}

/// Return the first line starting with `prefix`, stopping early once found
pub fn find_line_with_prefix<P: AsRef<Path>>(path: P, prefix: &str) -> Result<Option<String>> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    let mut line = String::with_capacity(128);

    loop {
        line.clear();
        if reader.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        if line.starts_with(prefix) {
            return Ok(Some(line.trim_end().to_string()));
        }
    }
}
