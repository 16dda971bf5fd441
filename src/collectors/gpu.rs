//! GPU collection: vendor telemetry first, name-only enumeration second

use crate::capabilities::{Capabilities, EnumerationCommand, EnumerationFormat, Fallback};
use crate::data::{GpuEntry, GpuReport, GpuSource, QueryFailure, QueryFailureKind, UnavailableReason};
use crate::error::{ProbeError, Result};
use crate::utils::command::CommandRunner;
use crate::utils::parsing::{extract_after_colon, parse_metric};
use std::io;
use std::time::Duration;
use tracing::{debug, warn};

/// Columns requested from the query tool, in `GpuEntry` field order
pub const QUERY_FIELDS: &str =
    "index,name,memory.total,memory.used,memory.free,utilization.gpu,temperature.gpu";

/// nvidia-smi exit code when the driver sees no devices
const NO_DEVICES_EXIT_CODE: i32 = 6;

/// Collect GPU information from whichever source the host has
pub fn collect_gpu_info(
    caps: &Capabilities,
    runner: &dyn CommandRunner,
    timeout: Duration,
) -> GpuReport {
    if caps.has_gpu_library {
        return query_telemetry(&caps.gpu_query_command, runner, timeout);
    }
    debug!(tool = %caps.gpu_query_command, "GPU query tool not installed");

    match &caps.fallback {
        Fallback::Disabled => GpuReport::Unavailable(UnavailableReason::NoQueryLibrary),
        Fallback::Missing(program) => {
            debug!(%program, "Enumeration tool not installed either");
            GpuReport::Unavailable(UnavailableReason::FallbackToolMissing)
        }
        Fallback::Available(command) => enumerate_devices(command, runner, timeout),
    }
}

fn query_telemetry(program: &str, runner: &dyn CommandRunner, timeout: Duration) -> GpuReport {
    let query = format!("--query-gpu={}", QUERY_FIELDS);
    let args = [query.as_str(), "--format=csv,noheader,nounits"];

    let output = match runner.run(program, &args, timeout) {
        Ok(output) => output,
        Err(err) if reports_no_devices(&err) => {
            return GpuReport::Unavailable(UnavailableReason::NoDevicesFound);
        }
        Err(err) => return query_failed(program, err),
    };

    match parse_query_output(&output) {
        Ok(entries) => GpuReport::from_entries(GpuSource::QueryTool, entries),
        Err(err) => query_failed(program, err),
    }
}

fn enumerate_devices(
    command: &EnumerationCommand,
    runner: &dyn CommandRunner,
    timeout: Duration,
) -> GpuReport {
    let args: Vec<&str> = command.args.iter().map(String::as_str).collect();
    match runner.run(&command.program, &args, timeout) {
        Ok(output) => {
            let entries = parse_enumeration_output(command.format, &output)
                .into_iter()
                .enumerate()
                .map(|(id, name)| GpuEntry::named(id as u32, name))
                .collect();
            GpuReport::from_entries(GpuSource::Enumeration, entries)
        }
        Err(ProbeError::CommandNotFound(program)) => {
            // Removed between detection and use
            debug!(%program, "Enumeration tool disappeared");
            GpuReport::Unavailable(UnavailableReason::FallbackToolMissing)
        }
        Err(err) => query_failed(&command.program, err),
    }
}

fn query_failed(program: &str, err: ProbeError) -> GpuReport {
    let failure = classify_failure(&err);
    warn!(%program, kind = %failure.kind, error = %err, "GPU query failed");
    GpuReport::Unavailable(UnavailableReason::QueryError(failure))
}

fn reports_no_devices(err: &ProbeError) -> bool {
    match err {
        ProbeError::CommandFailed { code, stderr, .. } => {
            *code == Some(NO_DEVICES_EXIT_CODE) || stderr.contains("No devices were found")
        }
        _ => false,
    }
}

/// Separate "driver refused us" from every other failure
pub fn classify_failure(err: &ProbeError) -> QueryFailure {
    let kind = match err {
        ProbeError::CommandTimedOut { .. } => QueryFailureKind::TimedOut,
        ProbeError::Io(io_err) if io_err.kind() == io::ErrorKind::PermissionDenied => {
            QueryFailureKind::PermissionDenied
        }
        ProbeError::CommandFailed { stderr, .. } if mentions_permission(stderr) => {
            QueryFailureKind::PermissionDenied
        }
        _ => QueryFailureKind::Failed,
    };
    QueryFailure {
        kind,
        detail: err.to_string(),
    }
}

fn mentions_permission(text: &str) -> bool {
    let lower = text.to_lowercase();
    lower.contains("permission denied") || lower.contains("insufficient permissions")
}

/// Parse `--format=csv,noheader,nounits` rows
pub fn parse_query_output(output: &str) -> Result<Vec<GpuEntry>> {
    output
        .lines()
        .filter(|line| !line.trim().is_empty())
        .enumerate()
        .map(|(position, line)| parse_query_row(position, line))
        .collect()
}

fn parse_query_row(position: usize, line: &str) -> Result<GpuEntry> {
    let cells: Vec<&str> = line.split(',').map(str::trim).collect();
    if cells.len() < 7 {
        return Err(ProbeError::Parse(format!(
            "Expected 7 GPU query columns, got {}: {}",
            cells.len(),
            line
        )));
    }

    // Names may contain commas; the five numeric columns are always last
    let tail = cells.len() - 5;
    let name = cells[1..tail].join(",");
    let id = cells[0].parse::<u32>().unwrap_or(position as u32);

    Ok(GpuEntry {
        id,
        name,
        memory_total_mb: parse_metric(cells[tail]),
        memory_used_mb: parse_metric(cells[tail + 1]),
        memory_free_mb: parse_metric(cells[tail + 2]),
        load_fraction: parse_metric(cells[tail + 3]).map(|pct| (pct / 100.0).clamp(0.0, 1.0)),
        temperature_celsius: parse_metric(cells[tail + 4]),
    })
}

/// Device names from an enumeration command, in listing order
pub fn parse_enumeration_output(format: EnumerationFormat, output: &str) -> Vec<String> {
    match format {
        EnumerationFormat::Lspci => output.lines().filter_map(parse_lspci_line).collect(),
        EnumerationFormat::SystemProfiler => output
            .lines()
            .map(str::trim)
            .filter(|line| line.starts_with("Chipset Model:"))
            .filter_map(extract_after_colon)
            .collect(),
        EnumerationFormat::Wmic => non_empty_lines(output).skip(1).collect(),
        EnumerationFormat::Lines => non_empty_lines(output).collect(),
    }
}

fn non_empty_lines(output: &str) -> impl Iterator<Item = String> + '_ {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
}

const DISPLAY_CLASSES: [&str; 3] = [
    "VGA compatible controller",
    "3D controller",
    "Display controller",
];

/// `01:00.0 VGA compatible controller: NVIDIA Corporation GA102 [GeForce RTX 3080] (rev a1)`
fn parse_lspci_line(line: &str) -> Option<String> {
    if !DISPLAY_CLASSES.iter().any(|class| line.contains(class)) {
        return None;
    }
    let (_, description) = line.split_once(": ")?;
    let cleaned = description
        .split(" (rev ")
        .next()
        .unwrap_or(description)
        .trim();
    if cleaned.is_empty() {
        return None;
    }
    Some(gpu_model_name(cleaned))
}

fn gpu_model_name(description: &str) -> String {
    if description.contains("NVIDIA") || description.contains("GeForce") {
        return nvidia_model_name(description);
    }
    if description.contains("AMD") || description.contains("Advanced Micro Devices") {
        return amd_model_name(description);
    }
    if let Some(rest) = description.strip_prefix("Intel Corporation ") {
        return format!("Intel {}", rest.split(" [").next().unwrap_or(rest).trim());
    }

    // Unknown vendor: prefer a model in brackets, skipping vendor-only ones like [AMD/ATI]
    match last_bracket(description) {
        Some(inner) if !inner.contains('/') && inner.len() > 3 => inner.to_string(),
        _ => description.to_string(),
    }
}

fn nvidia_model_name(description: &str) -> String {
    if let Some(pos) = description.find("GeForce") {
        let after = &description[pos..];
        return after
            .split(" [")
            .next()
            .unwrap_or(after)
            .trim()
            .trim_end_matches(']')
            .to_string();
    }
    match last_bracket(description) {
        Some(inner) if inner.contains("RTX") || inner.contains("GTX") || inner.contains("Tesla") => {
            format!("NVIDIA {}", inner)
        }
        _ => description.replace(" Corporation", ""),
    }
}

fn amd_model_name(description: &str) -> String {
    if let Some(inner) = last_bracket(description) {
        if inner.contains("Radeon") {
            // "Radeon RX 7700 XT / 7800 XT" lists a family; keep the last model
            let model = inner.rsplit(" / ").next().unwrap_or(inner).trim();
            return format!("AMD {}", model);
        }
        if !inner.contains('/') && inner.len() > 2 {
            return format!("AMD {}", inner);
        }
    }
    "AMD GPU".to_string()
}

fn last_bracket(text: &str) -> Option<&str> {
    let start = text.rfind('[')?;
    let end = text[start..].find(']')?;
    Some(&text[start + 1..start + end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    /// Replays one canned response and records what was asked
    struct FakeRunner {
        response: RefCell<Option<Result<String>>>,
        calls: RefCell<Vec<String>>,
    }

    impl FakeRunner {
        fn replying(response: Result<String>) -> Self {
            Self {
                response: RefCell::new(Some(response)),
                calls: RefCell::new(Vec::new()),
            }
        }
    }

    impl CommandRunner for FakeRunner {
        fn run(&self, program: &str, _args: &[&str], _timeout: Duration) -> Result<String> {
            self.calls.borrow_mut().push(program.to_string());
            self.response
                .borrow_mut()
                .take()
                .expect("runner called more than once")
        }
    }

    fn caps(has_gpu_library: bool, fallback: Fallback) -> Capabilities {
        Capabilities {
            has_gpu_library,
            gpu_query_command: "nvidia-smi".to_string(),
            fallback,
        }
    }

    const TIMEOUT: Duration = Duration::from_secs(5);

    #[test]
    fn parses_query_rows() {
        let out = "0, NVIDIA GeForce RTX 3080, 10240, 1024, 9216, 42, 55\n\
                   1, Tesla T4, 15360, [N/A], [N/A], [Not Supported], 40\n";
        let entries = parse_query_output(out).unwrap();
        assert_eq!(entries.len(), 2);

        assert_eq!(entries[0].id, 0);
        assert_eq!(entries[0].name, "NVIDIA GeForce RTX 3080");
        assert_eq!(entries[0].memory_total_mb, Some(10240.0));
        assert_eq!(entries[0].load_fraction, Some(0.42));
        assert_eq!(entries[0].temperature_celsius, Some(55.0));

        assert_eq!(entries[1].memory_used_mb, None);
        assert_eq!(entries[1].load_fraction, None);
    }

    #[test]
    fn names_with_commas_survive() {
        let entries = parse_query_output("3, Odd, Name, 100, 10, 90, 0, 30").unwrap();
        assert_eq!(entries[0].id, 3);
        assert_eq!(entries[0].name, "Odd,Name");
        assert_eq!(entries[0].memory_free_mb, Some(90.0));
    }

    #[test]
    fn short_rows_are_parse_errors() {
        assert!(matches!(
            parse_query_output("0, only, three"),
            Err(ProbeError::Parse(_))
        ));
    }

    #[test]
    fn load_is_clamped() {
        let entries = parse_query_output("0, Weird, 1, 1, 0, 180, 30").unwrap();
        assert_eq!(entries[0].load_fraction, Some(1.0));
    }

    #[test]
    fn lspci_keeps_display_devices_only() {
        let out = "\
00:00.0 Host bridge: Intel Corporation 8th Gen Core Processor Host Bridge (rev 07)
00:02.0 VGA compatible controller: Intel Corporation UHD Graphics 630 (rev 02)
01:00.0 VGA compatible controller: NVIDIA Corporation GA102 [GeForce RTX 3080] (rev a1)
03:00.0 Display controller: Advanced Micro Devices, Inc. [AMD/ATI] Navi 32 [Radeon RX 7700 XT / 7800 XT]
04:00.0 3D controller: Matrox Electronics Systems Ltd. [Foo G200]
";
        let names = parse_enumeration_output(EnumerationFormat::Lspci, out);
        assert_eq!(
            names,
            vec![
                "Intel UHD Graphics 630".to_string(),
                "GeForce RTX 3080".to_string(),
                "AMD 7800 XT".to_string(),
                "Foo G200".to_string(),
            ]
        );
    }

    #[test]
    fn system_profiler_and_wmic() {
        let profiler = "Graphics/Displays:\n\n    Apple M2 Pro:\n\n      Chipset Model: Apple M2 Pro\n      Type: GPU\n";
        assert_eq!(
            parse_enumeration_output(EnumerationFormat::SystemProfiler, profiler),
            vec!["Apple M2 Pro".to_string()]
        );

        let wmic = "Name  \r\nNVIDIA GeForce RTX 4090  \r\n\r\nIntel(R) UHD Graphics 770\r\n";
        assert_eq!(
            parse_enumeration_output(EnumerationFormat::Wmic, wmic),
            vec![
                "NVIDIA GeForce RTX 4090".to_string(),
                "Intel(R) UHD Graphics 770".to_string()
            ]
        );
    }

    #[test]
    fn no_tools_at_all_is_fallback_tool_missing() {
        let runner = FakeRunner::replying(Ok(String::new()));
        let report = collect_gpu_info(
            &caps(false, Fallback::Missing("lspci".to_string())),
            &runner,
            TIMEOUT,
        );
        assert_eq!(
            report,
            GpuReport::Unavailable(UnavailableReason::FallbackToolMissing)
        );
        assert!(runner.calls.borrow().is_empty());
    }

    #[test]
    fn disabled_fallback_is_no_query_library() {
        let runner = FakeRunner::replying(Ok(String::new()));
        let report = collect_gpu_info(&caps(false, Fallback::Disabled), &runner, TIMEOUT);
        assert_eq!(report, GpuReport::Unavailable(UnavailableReason::NoQueryLibrary));
    }

    #[test]
    fn zero_devices_is_no_devices_found() {
        let runner = FakeRunner::replying(Ok(String::new()));
        let report = collect_gpu_info(&caps(true, Fallback::Disabled), &runner, TIMEOUT);
        assert_eq!(report, GpuReport::Unavailable(UnavailableReason::NoDevicesFound));
        assert_eq!(*runner.calls.borrow(), vec!["nvidia-smi".to_string()]);
    }

    #[test]
    fn no_devices_exit_code_is_no_devices_found() {
        let runner = FakeRunner::replying(Err(ProbeError::CommandFailed {
            program: "nvidia-smi".to_string(),
            code: Some(6),
            stderr: String::new(),
        }));
        let report = collect_gpu_info(&caps(true, Fallback::Disabled), &runner, TIMEOUT);
        assert_eq!(report, GpuReport::Unavailable(UnavailableReason::NoDevicesFound));
    }

    #[test]
    fn query_tool_wins_over_fallback() {
        let runner = FakeRunner::replying(Ok("0, Tesla T4, 15360, 0, 15360, 0, 35".to_string()));
        let lspci = EnumerationCommand::new("lspci", &[]);
        let report = collect_gpu_info(&caps(true, Fallback::Available(lspci)), &runner, TIMEOUT);
        match report {
            GpuReport::Available { source, entries } => {
                assert_eq!(source, GpuSource::QueryTool);
                assert_eq!(entries[0].name, "Tesla T4");
            }
            other => panic!("unexpected report: {other:?}"),
        }
    }

    #[test]
    fn fallback_lists_names_only() {
        let runner = FakeRunner::replying(Ok(
            "01:00.0 VGA compatible controller: NVIDIA Corporation GA102 [GeForce RTX 3080] (rev a1)"
                .to_string(),
        ));
        let lspci = EnumerationCommand::new("lspci", &[]);
        let report = collect_gpu_info(&caps(false, Fallback::Available(lspci)), &runner, TIMEOUT);
        assert_eq!(
            report,
            GpuReport::Available {
                source: GpuSource::Enumeration,
                entries: vec![GpuEntry::named(0, "GeForce RTX 3080")],
            }
        );
        assert_eq!(*runner.calls.borrow(), vec!["lspci".to_string()]);
    }

    fn lspci_caps() -> Capabilities {
        caps(false, Fallback::Available(EnumerationCommand::new("lspci", &[])))
    }

    #[test]
    fn fallback_without_display_devices_is_no_devices_found() {
        let runner = FakeRunner::replying(Ok(
            "00:00.0 Host bridge: Intel Corporation 8th Gen Core Processor Host Bridge (rev 07)\n\
             00:1f.3 Audio device: Intel Corporation Cannon Lake PCH cAVS (rev 10)"
                .to_string(),
        ));
        let report = collect_gpu_info(&lspci_caps(), &runner, TIMEOUT);
        assert_eq!(report, GpuReport::Unavailable(UnavailableReason::NoDevicesFound));
        assert_eq!(*runner.calls.borrow(), vec!["lspci".to_string()]);
    }

    #[test]
    fn failing_fallback_is_query_error() {
        let runner = FakeRunner::replying(Err(ProbeError::CommandFailed {
            program: "lspci".to_string(),
            code: Some(1),
            stderr: "pcilib: Cannot open /proc/bus/pci".to_string(),
        }));
        let report = collect_gpu_info(&lspci_caps(), &runner, TIMEOUT);
        assert!(matches!(
            report.unavailable_reason(),
            Some(UnavailableReason::QueryError(QueryFailure { kind: QueryFailureKind::Failed, .. }))
        ));
    }

    #[test]
    fn hung_fallback_is_query_error() {
        let runner = FakeRunner::replying(Err(ProbeError::CommandTimedOut {
            program: "lspci".to_string(),
            timeout: TIMEOUT,
        }));
        let report = collect_gpu_info(&lspci_caps(), &runner, TIMEOUT);
        assert!(matches!(
            report.unavailable_reason(),
            Some(UnavailableReason::QueryError(QueryFailure { kind: QueryFailureKind::TimedOut, .. }))
        ));
    }

    #[test]
    fn fallback_removed_after_detection_is_fallback_tool_missing() {
        let runner = FakeRunner::replying(Err(ProbeError::CommandNotFound("lspci".to_string())));
        let report = collect_gpu_info(&lspci_caps(), &runner, TIMEOUT);
        assert_eq!(
            report,
            GpuReport::Unavailable(UnavailableReason::FallbackToolMissing)
        );
    }

    #[test]
    fn permission_errors_are_distinguished() {
        let runner = FakeRunner::replying(Err(ProbeError::CommandFailed {
            program: "nvidia-smi".to_string(),
            code: Some(4),
            stderr: "Failed to initialize NVML: Insufficient Permissions".to_string(),
        }));
        let report = collect_gpu_info(&caps(true, Fallback::Disabled), &runner, TIMEOUT);
        match report.unavailable_reason() {
            Some(UnavailableReason::QueryError(failure)) => {
                assert_eq!(failure.kind, QueryFailureKind::PermissionDenied);
            }
            other => panic!("unexpected reason: {other:?}"),
        }
    }

    #[test]
    fn timeouts_are_query_errors() {
        let runner = FakeRunner::replying(Err(ProbeError::CommandTimedOut {
            program: "nvidia-smi".to_string(),
            timeout: TIMEOUT,
        }));
        let report = collect_gpu_info(&caps(true, Fallback::Disabled), &runner, TIMEOUT);
        let reason = report.unavailable_reason().unwrap();
        assert_eq!(reason.code(), "query_error");
        assert!(matches!(
            reason,
            UnavailableReason::QueryError(QueryFailure { kind: QueryFailureKind::TimedOut, .. })
        ));
    }

    #[test]
    fn garbage_output_is_query_error() {
        let runner = FakeRunner::replying(Ok("NVIDIA-SMI has failed".to_string()));
        let report = collect_gpu_info(&caps(true, Fallback::Disabled), &runner, TIMEOUT);
        assert_eq!(report.unavailable_reason().map(|r| r.code()), Some("query_error"));
    }
}
