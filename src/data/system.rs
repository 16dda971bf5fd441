//! Whole-host report

use super::hardware::{CpuReport, GpuReport};

/// Everything one probe run gathered
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceReport {
    pub cpu: CpuReport,
    pub gpu: GpuReport,
}
