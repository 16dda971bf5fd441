//! Plain-text rendering of the CPU and GPU sections

use crate::config::Config;
use crate::data::{CpuReport, DeviceReport, GpuEntry, GpuReport};
use crate::utils::parsing::*;
use std::collections::HashMap;
use std::io::{self, Write};
use tracing::warn;
use unicode_width::UnicodeWidthStr;

pub const CPU_TITLE: &str = "=== CPU Information ===";
pub const GPU_TITLE: &str = "=== GPU Information ===";

pub const GPU_HEADERS: [&str; 7] = [
    "ID",
    "Name",
    "Total Memory",
    "Used Memory",
    "Free Memory",
    "Load",
    "Temperature",
];

const RESET: &str = "\x1b[0m";

pub fn hex_to_ansi(color: &str) -> Option<String> {
    // First try ANSI color names
    if let Some(ansi_code) = get_ansi_color_code(color) {
        return Some(ansi_code.to_string());
    }

    // Fallback to hex color parsing for custom colors
    let hex = color.strip_prefix('#').filter(|h| h.len() == 6)?;
    let channel = |range: std::ops::Range<usize>| u8::from_str_radix(hex.get(range)?, 16).ok();
    let (r, g, b) = (channel(0..2)?, channel(2..4)?, channel(4..6)?);
    Some(format!("\x1b[38;2;{};{};{}m", r, g, b))
}

fn get_ansi_color_code(color_name: &str) -> Option<&'static str> {
    let code = match color_name.to_lowercase().as_str() {
        "black" => "\x1b[30m",
        "red" => "\x1b[31m",
        "green" => "\x1b[32m",
        "yellow" => "\x1b[33m",
        "blue" => "\x1b[34m",
        "magenta" | "purple" => "\x1b[35m",
        "cyan" => "\x1b[36m",
        "white" => "\x1b[37m",
        "bright_black" | "gray" | "grey" => "\x1b[90m",
        "bright_red" | "orange" => "\x1b[91m",
        "bright_green" => "\x1b[92m",
        "bright_yellow" => "\x1b[93m",
        "bright_blue" => "\x1b[94m",
        "bright_magenta" | "violet" => "\x1b[95m",
        "bright_cyan" => "\x1b[96m",
        "bright_white" => "\x1b[97m",
        "reset" | "default" => RESET,
        _ => return None,
    };
    Some(code)
}

/// Look a color up in the `[colors]` map first, then as a name or hex value
fn resolve_color(key: Option<&str>, colors: &HashMap<String, String>) -> Option<String> {
    let key = key?;
    let value = colors.get(key).map(String::as_str).unwrap_or(key);
    let code = hex_to_ansi(value);
    if code.is_none() {
        warn!(color = key, "Unknown color, printing uncolored");
    }
    code
}

/// Presentation settings resolved from config
#[derive(Debug, Clone, Default)]
pub struct Style {
    pub separator: String,
    pub key_color: Option<String>,
    pub title_color: Option<String>,
}

impl Style {
    pub fn plain() -> Self {
        Self {
            separator: ": ".to_string(),
            ..Self::default()
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self {
            separator: config.display.separator.clone(),
            key_color: resolve_color(config.display.key_color.as_deref(), &config.colors),
            title_color: resolve_color(config.display.title_color.as_deref(), &config.colors),
        }
    }

    fn paint(&self, color: &Option<String>, text: &str) -> String {
        match color {
            Some(code) => format!("{}{}{}", code, text, RESET),
            None => text.to_string(),
        }
    }
}

/// Draws the GPU table; swappable so callers can observe or restyle it
pub trait TableRenderer {
    fn render_table(&self, headers: &[&str], rows: &[Vec<String>]) -> String;
}

/// Left-aligned columns, dashed rule under the header
#[derive(Debug, Default, Clone, Copy)]
pub struct PlainTable;

impl TableRenderer for PlainTable {
    fn render_table(&self, headers: &[&str], rows: &[Vec<String>]) -> String {
        let mut widths: Vec<usize> = headers.iter().map(|h| UnicodeWidthStr::width(*h)).collect();
        for row in rows {
            for (i, cell) in row.iter().enumerate() {
                if let Some(width) = widths.get_mut(i) {
                    *width = (*width).max(UnicodeWidthStr::width(cell.as_str()));
                }
            }
        }

        let header_cells: Vec<String> = headers.iter().map(|h| h.to_string()).collect();
        let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();

        let mut lines = vec![pad_row(&header_cells, &widths), pad_row(&rule, &widths)];
        lines.extend(rows.iter().map(|row| pad_row(row, &widths)));
        lines.join("\n")
    }
}

fn pad_row(cells: &[String], widths: &[usize]) -> String {
    cells
        .iter()
        .zip(widths)
        .map(|(cell, width)| {
            // format! pads by char count, not display width
            let fill = width.saturating_sub(UnicodeWidthStr::width(cell.as_str()));
            format!("{}{}", cell, " ".repeat(fill))
        })
        .collect::<Vec<_>>()
        .join("  ")
        .trim_end()
        .to_string()
}

/// Labeled CPU facts in display order
pub fn cpu_lines(cpu: &CpuReport) -> Vec<(&'static str, String)> {
    vec![
        (
            "Processor",
            cpu.processor_name.clone().unwrap_or_else(|| UNKNOWN.to_string()),
        ),
        ("Architecture", cpu.architecture.clone()),
        ("Machine", cpu.machine.clone()),
        ("Cores (Logical)", cpu.logical_cores.to_string()),
        (
            "Cores (Physical)",
            format_or_unknown(cpu.physical_cores, |n| n.to_string()),
        ),
        ("CPU Frequency", format_or_unknown(cpu.max_frequency_mhz, format_mhz)),
        ("Total RAM", format_gb(cpu.total_ram_bytes)),
    ]
}

/// One table row, columns in `GPU_HEADERS` order
pub fn gpu_row(gpu: &GpuEntry) -> Vec<String> {
    let mb = |v: Option<f64>| format_or_unknown(v, |v| format!("{} MB", format_number(v)));
    vec![
        gpu.id.to_string(),
        gpu.name.clone(),
        mb(gpu.memory_total_mb),
        mb(gpu.memory_used_mb),
        mb(gpu.memory_free_mb),
        format_or_unknown(gpu.load_fraction, format_percent),
        format_or_unknown(gpu.temperature_celsius, |t| format!("{} °C", format_number(t))),
    ]
}

pub fn render_cpu_section<W: Write>(out: &mut W, cpu: &CpuReport, style: &Style) -> io::Result<()> {
    writeln!(out, "{}\n", style.paint(&style.title_color, CPU_TITLE))?;
    for (key, value) in cpu_lines(cpu) {
        writeln!(
            out,
            "{}{}{}",
            style.paint(&style.key_color, key),
            style.separator,
            value
        )?;
    }
    Ok(())
}

/// Table for devices, the reason message otherwise. An unavailable report
/// never reaches `table`.
pub fn render_gpu_section<W: Write>(
    out: &mut W,
    gpu: &GpuReport,
    style: &Style,
    table: &dyn TableRenderer,
) -> io::Result<()> {
    writeln!(out, "{}\n", style.paint(&style.title_color, GPU_TITLE))?;
    match gpu {
        GpuReport::Available { entries, .. } if !entries.is_empty() => {
            let rows: Vec<Vec<String>> = entries.iter().map(gpu_row).collect();
            writeln!(out, "{}", table.render_table(&GPU_HEADERS, &rows))
        }
        GpuReport::Available { .. } => {
            writeln!(out, "{}", crate::data::UnavailableReason::NoDevicesFound)
        }
        GpuReport::Unavailable(reason) => writeln!(out, "{}", reason),
    }
}

pub fn render_report<W: Write>(
    out: &mut W,
    report: &DeviceReport,
    style: &Style,
    table: &dyn TableRenderer,
) -> io::Result<()> {
    writeln!(out)?;
    render_cpu_section(out, &report.cpu, style)?;
    writeln!(out)?;
    render_gpu_section(out, &report.gpu, style, table)
}
