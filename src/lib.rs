//! devprobe library
//!
//! Best-effort CPU and GPU capability probe. Missing data sources degrade
//! to unknown fields or an explicit "unavailable" GPU report, never to an
//! error.

pub mod capabilities;
pub mod collectors;
pub mod config;
pub mod data;
pub mod display;
pub mod error;
pub mod probe;
pub mod utils;

pub use capabilities::{Capabilities, EnumerationCommand, EnumerationFormat, Fallback};
pub use config::Config;
pub use data::{
    CpuReport, DeviceReport, GpuEntry, GpuReport, GpuSource, QueryFailure, QueryFailureKind,
    UnavailableReason,
};
pub use error::{ProbeError, Result};
pub use probe::DeviceProbe;
pub use utils::command::{CommandRunner, SystemRunner};

/// Probe the host and print both sections to `out`
pub fn run<W: std::io::Write>(config: &Config, out: &mut W) -> std::io::Result<()> {
    let probe = DeviceProbe::from_config(&config.probe);
    let report = probe.probe();
    display::render_report(
        out,
        &report,
        &display::Style::from_config(config),
        &display::PlainTable,
    )
}
