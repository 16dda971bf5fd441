//! Startup detection of the GPU data sources present on this host.
//!
//! Computed once and handed to [`crate::probe::DeviceProbe`], so tests can
//! describe any host without the tools being installed.

use crate::config::ProbeConfig;
use crate::utils::command::command_exists;
use std::path::Path;
use tracing::debug;

/// Output layout of a hardware enumeration command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumerationFormat {
    /// `lspci`, display-class lines only
    Lspci,
    /// macOS `system_profiler SPDisplaysDataType`
    SystemProfiler,
    /// Windows `wmic ... get name`, first line is the column header
    Wmic,
    /// One device name per non-empty line
    Lines,
}

impl EnumerationFormat {
    /// Guess the layout from the program name
    pub fn for_program(program: &str) -> Self {
        let stem = Path::new(program)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(program)
            .to_lowercase();
        match stem.as_str() {
            "lspci" => EnumerationFormat::Lspci,
            "system_profiler" => EnumerationFormat::SystemProfiler,
            "wmic" => EnumerationFormat::Wmic,
            _ => EnumerationFormat::Lines,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumerationCommand {
    pub program: String,
    pub args: Vec<String>,
    pub format: EnumerationFormat,
}

impl EnumerationCommand {
    pub fn new(program: impl Into<String>, args: &[&str]) -> Self {
        let program = program.into();
        Self {
            format: EnumerationFormat::for_program(&program),
            args: args.iter().map(|a| a.to_string()).collect(),
            program,
        }
    }

    /// The enumeration command normally available on this platform
    pub fn platform_default() -> Self {
        if cfg!(target_os = "macos") {
            Self::new("system_profiler", &["SPDisplaysDataType"])
        } else if cfg!(target_os = "windows") {
            Self::new("wmic", &["path", "win32_VideoController", "get", "name"])
        } else {
            Self::new("lspci", &[])
        }
    }

    /// `["prog", "arg", ...]` from config; `None` if empty
    pub fn from_argv(argv: &[String]) -> Option<Self> {
        let (program, args) = argv.split_first()?;
        if program.trim().is_empty() {
            return None;
        }
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        Some(Self::new(program.trim(), &args))
    }
}

/// State of the name-only enumeration fallback
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fallback {
    /// Turned off in config
    Disabled,
    /// Not installed; carries the program that was looked for
    Missing(String),
    Available(EnumerationCommand),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capabilities {
    /// Whether the vendor telemetry tool is on PATH
    pub has_gpu_library: bool,
    pub gpu_query_command: String,
    pub fallback: Fallback,
}

impl Capabilities {
    /// Look the configured tools up on PATH
    pub fn detect(config: &ProbeConfig) -> Self {
        let has_gpu_library = command_exists(&config.gpu_query_command);

        let fallback = if !config.fallback_enabled {
            Fallback::Disabled
        } else {
            let command = config
                .fallback_command
                .as_deref()
                .and_then(EnumerationCommand::from_argv)
                .unwrap_or_else(EnumerationCommand::platform_default);
            if command_exists(&command.program) {
                Fallback::Available(command)
            } else {
                Fallback::Missing(command.program)
            }
        };

        let caps = Self {
            has_gpu_library,
            gpu_query_command: config.gpu_query_command.clone(),
            fallback,
        };
        debug!(?caps, "Detected GPU data sources");
        caps
    }

    /// A host with no GPU tooling at all
    pub fn none() -> Self {
        Self {
            has_gpu_library: false,
            gpu_query_command: ProbeConfig::default().gpu_query_command,
            fallback: Fallback::Missing(EnumerationCommand::platform_default().program),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_follows_program_name() {
        assert_eq!(EnumerationFormat::for_program("lspci"), EnumerationFormat::Lspci);
        assert_eq!(
            EnumerationFormat::for_program("/usr/sbin/system_profiler"),
            EnumerationFormat::SystemProfiler
        );
        assert_eq!(EnumerationFormat::for_program("WMIC.exe"), EnumerationFormat::Wmic);
        assert_eq!(EnumerationFormat::for_program("lshw"), EnumerationFormat::Lines);
    }

    #[test]
    fn empty_argv_is_ignored() {
        assert_eq!(EnumerationCommand::from_argv(&[]), None);
        assert_eq!(EnumerationCommand::from_argv(&[" ".to_string()]), None);
        let cmd = EnumerationCommand::from_argv(&["lspci".to_string(), "-mm".to_string()]).unwrap();
        assert_eq!(cmd.args, vec!["-mm".to_string()]);
        assert_eq!(cmd.format, EnumerationFormat::Lspci);
    }

    #[test]
    fn disabled_fallback_is_not_looked_up() {
        let config = ProbeConfig {
            gpu_query_command: "devprobe-no-such-query-tool".to_string(),
            fallback_enabled: false,
            ..ProbeConfig::default()
        };
        let caps = Capabilities::detect(&config);
        assert!(!caps.has_gpu_library);
        assert_eq!(caps.fallback, Fallback::Disabled);
    }

    #[test]
    fn missing_tools_are_reported_missing() {
        let config = ProbeConfig {
            gpu_query_command: "devprobe-no-such-query-tool".to_string(),
            fallback_command: Some(vec!["devprobe-no-such-lister".to_string()]),
            ..ProbeConfig::default()
        };
        let caps = Capabilities::detect(&config);
        assert!(!caps.has_gpu_library);
        assert_eq!(caps.fallback, Fallback::Missing("devprobe-no-such-lister".to_string()));
    }
}
