//! Report structures produced by the collectors

pub mod hardware;
pub mod system;

pub use hardware::{
    CpuReport, GpuEntry, GpuReport, GpuSource, QueryFailure, QueryFailureKind, UnavailableReason,
};
pub use system::DeviceReport;
