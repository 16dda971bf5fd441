//! Hardware-specific information structures

use std::fmt;

/// Snapshot of the host CPU and memory.
///
/// `None` marks a fact the platform could not supply.
#[derive(Debug, Clone, PartialEq)]
pub struct CpuReport {
    pub processor_name: Option<String>,
    /// Pointer width of the running build, e.g. `64bit`
    pub architecture: String,
    /// Instruction set, e.g. `x86_64`
    pub machine: String,
    /// Always at least 1
    pub logical_cores: usize,
    pub physical_cores: Option<usize>,
    pub max_frequency_mhz: Option<f64>,
    pub total_ram_bytes: u64,
}

/// One GPU as reported by a data source.
///
/// Telemetry is only present when it came from the vendor query tool; the
/// fallback enumeration knows device names and nothing else.
#[derive(Debug, Clone, PartialEq)]
pub struct GpuEntry {
    pub id: u32,
    pub name: String,
    pub memory_total_mb: Option<f64>,
    pub memory_used_mb: Option<f64>,
    pub memory_free_mb: Option<f64>,
    /// In `[0, 1]`
    pub load_fraction: Option<f64>,
    pub temperature_celsius: Option<f64>,
}

impl GpuEntry {
    /// Entry with a name only
    pub fn named(id: u32, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            memory_total_mb: None,
            memory_used_mb: None,
            memory_free_mb: None,
            load_fraction: None,
            temperature_celsius: None,
        }
    }
}

/// Where a set of GPU entries came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GpuSource {
    /// Vendor telemetry tool (full telemetry)
    QueryTool,
    /// Hardware enumeration command (names only)
    Enumeration,
}

/// Why a failed GPU query failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryFailureKind {
    /// The tool ran but could not reach the driver
    PermissionDenied,
    TimedOut,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryFailure {
    pub kind: QueryFailureKind,
    pub detail: String,
}

/// Reason a GPU report carries no entries
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnavailableReason {
    /// No telemetry source, and enumeration was not allowed
    NoQueryLibrary,
    /// A source ran and found no devices
    NoDevicesFound,
    /// A source was present but failed while querying
    QueryError(QueryFailure),
    /// Neither the query tool nor the enumeration command is installed
    FallbackToolMissing,
}

impl UnavailableReason {
    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            UnavailableReason::NoQueryLibrary => "no_query_library",
            UnavailableReason::NoDevicesFound => "no_devices_found",
            UnavailableReason::QueryError(_) => "query_error",
            UnavailableReason::FallbackToolMissing => "fallback_tool_missing",
        }
    }

    /// Fixed message shown in place of the GPU table
    pub fn message(&self) -> &'static str {
        match self {
            UnavailableReason::NoQueryLibrary => {
                "GPU query library is not installed. Skipping GPU info."
            }
            UnavailableReason::NoDevicesFound => "No GPU found.",
            UnavailableReason::QueryError(_) => "GPU query failed.",
            UnavailableReason::FallbackToolMissing => {
                "No GPU query library or hardware enumeration tool found. Skipping GPU info."
            }
        }
    }

    /// All four messages, in code order
    pub fn all_messages() -> [&'static str; 4] {
        [
            UnavailableReason::NoQueryLibrary.message(),
            UnavailableReason::NoDevicesFound.message(),
            UnavailableReason::QueryError(QueryFailure {
                kind: QueryFailureKind::Failed,
                detail: String::new(),
            })
            .message(),
            UnavailableReason::FallbackToolMissing.message(),
        ]
    }
}

impl fmt::Display for QueryFailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            QueryFailureKind::PermissionDenied => "permission denied",
            QueryFailureKind::TimedOut => "timed out",
            QueryFailureKind::Failed => "error",
        };
        f.write_str(s)
    }
}

impl fmt::Display for UnavailableReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnavailableReason::QueryError(failure) if !failure.detail.is_empty() => write!(
                f,
                "{} ({}: {})",
                self.message(),
                failure.kind,
                failure.detail
            ),
            UnavailableReason::QueryError(failure) => {
                write!(f, "{} ({})", self.message(), failure.kind)
            }
            _ => f.write_str(self.message()),
        }
    }
}

/// GPU half of the device report
#[derive(Debug, Clone, PartialEq)]
pub enum GpuReport {
    /// Never empty; build through [`GpuReport::from_entries`]
    Available {
        source: GpuSource,
        entries: Vec<GpuEntry>,
    },
    Unavailable(UnavailableReason),
}

impl GpuReport {
    /// An empty list becomes `Unavailable(NoDevicesFound)`
    pub fn from_entries(source: GpuSource, entries: Vec<GpuEntry>) -> Self {
        if entries.is_empty() {
            GpuReport::Unavailable(UnavailableReason::NoDevicesFound)
        } else {
            GpuReport::Available { source, entries }
        }
    }

    pub fn entries(&self) -> &[GpuEntry] {
        match self {
            GpuReport::Available { entries, .. } => entries,
            GpuReport::Unavailable(_) => &[],
        }
    }

    pub fn unavailable_reason(&self) -> Option<&UnavailableReason> {
        match self {
            GpuReport::Unavailable(reason) => Some(reason),
            GpuReport::Available { .. } => None,
        }
    }
}
