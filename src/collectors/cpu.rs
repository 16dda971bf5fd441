//! CPU and memory collection

use crate::data::CpuReport;
use crate::error::{ProbeError, Result};
use crate::utils::{file::*, parsing::*};
use std::thread;
use sysinfo::System;
use tracing::{debug, warn};

const CPUINFO: &str = "/proc/cpuinfo";
const MEMINFO: &str = "/proc/meminfo";
const MAX_FREQ: &str = "/sys/devices/system/cpu/cpu0/cpufreq/cpuinfo_max_freq";

/// Collect CPU information. Fields the host cannot supply come back as `None`.
pub fn collect_cpu_info() -> CpuReport {
    if !sysinfo::IS_SUPPORTED_SYSTEM {
        debug!("sysinfo does not support this platform, relying on fallbacks");
    }

    let mut sys = System::new();
    sys.refresh_cpu_all();
    sys.refresh_memory();
    let cpus = sys.cpus();

    let processor_name = cpus
        .first()
        .map(|cpu| cpu.brand().trim().to_string())
        .filter(|brand| !brand.is_empty())
        .or_else(|| read_model_name().ok().flatten())
        .or_else(uname_machine);

    let logical_cores = if cpus.is_empty() {
        thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
    } else {
        cpus.len()
    }
    .max(1);

    let physical_cores = System::physical_core_count().filter(|&n| n > 0);

    // sysinfo only knows the current clock, so without cpufreq the max is unknown
    let max_frequency_mhz = max_frequency_from(read_first_line(MAX_FREQ));

    let total_ram_bytes = match sys.total_memory() {
        0 => read_total_memory().unwrap_or_else(|err| {
            warn!(error = %err, "Total memory could not be determined");
            0
        }),
        bytes => bytes,
    };

    let report = CpuReport {
        processor_name,
        architecture: word_size(),
        machine: std::env::consts::ARCH.to_string(),
        logical_cores,
        physical_cores,
        max_frequency_mhz,
        total_ram_bytes,
    };
    debug!(?report, "Collected CPU info");
    report
}

/// Pointer width of this build, e.g. `64bit`
pub fn word_size() -> String {
    format!("{}bit", usize::BITS)
}

fn read_model_name() -> Result<Option<String>> {
    Ok(find_line_with_prefix(CPUINFO, "model name")?
        .and_then(|line| extract_after_colon(&line)))
}

fn max_frequency_from(raw: Result<String>) -> Option<f64> {
    match raw.and_then(|raw| parse_khz_to_mhz(&raw)) {
        Ok(mhz) => Some(mhz),
        Err(err) => {
            debug!(error = %err, "Max CPU frequency unavailable");
            None
        }
    }
}

/// sysfs reports cpufreq values in kHz
pub fn parse_khz_to_mhz(raw: &str) -> Result<f64> {
    let khz: u64 = raw
        .trim()
        .parse()
        .map_err(|_| ProbeError::Parse(format!("Invalid frequency value: {}", raw)))?;
    if khz == 0 {
        return Err(ProbeError::Detection("CPU frequency reported as 0".to_string()));
    }
    Ok(khz as f64 / 1000.0)
}

fn read_total_memory() -> Result<u64> {
    match find_line_with_prefix(MEMINFO, "MemTotal")? {
        Some(line) => meminfo_line_to_bytes(&line),
        None => Err(ProbeError::Detection("MemTotal not found".to_string())),
    }
}

#[cfg(unix)]
fn uname_machine() -> Option<String> {
    use std::ffi::CStr;

    // SAFETY: utsname is plain old data and uname fills it in place
    unsafe {
        let mut uts: libc::utsname = std::mem::zeroed();
        if libc::uname(&mut uts) != 0 {
            return None;
        }
        let machine = CStr::from_ptr(uts.machine.as_ptr()).to_string_lossy().trim().to_string();
        Some(machine).filter(|m| !m.is_empty())
    }
}

#[cfg(not(unix))]
fn uname_machine() -> Option<String> {
    None
}
