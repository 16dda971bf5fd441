//! Best-effort host capability probe.

use crate::capabilities::Capabilities;
use crate::collectors::{cpu::collect_cpu_info, gpu::collect_gpu_info};
use crate::config::ProbeConfig;
use crate::data::{CpuReport, DeviceReport, GpuReport};
use crate::utils::command::{CommandRunner, SystemRunner};
use std::time::Duration;

/// Stateless: every call re-reads the host.
pub struct DeviceProbe<R = SystemRunner> {
    capabilities: Capabilities,
    runner: R,
    timeout: Duration,
}

impl DeviceProbe<SystemRunner> {
    /// Detect the host's GPU tooling and spawn real processes
    pub fn from_config(config: &ProbeConfig) -> Self {
        Self::new(
            Capabilities::detect(config),
            SystemRunner,
            config.command_timeout(),
        )
    }
}

impl<R: CommandRunner> DeviceProbe<R> {
    pub fn new(capabilities: Capabilities, runner: R, timeout: Duration) -> Self {
        Self {
            capabilities,
            runner,
            timeout,
        }
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    pub fn probe_cpu(&self) -> CpuReport {
        collect_cpu_info()
    }

    pub fn probe_gpu(&self) -> GpuReport {
        collect_gpu_info(&self.capabilities, &self.runner, self.timeout)
    }

    /// CPU first, then GPU
    pub fn probe(&self) -> DeviceReport {
        DeviceReport {
            cpu: self.probe_cpu(),
            gpu: self.probe_gpu(),
        }
    }
}
