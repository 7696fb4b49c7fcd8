//! Console output for the CLI
//!
//! Boxed headers, one-line status markers, the end-of-run summary, and the
//! writer used to tee log output to a file.

use crate::core::ingest::{DeviceStatus, RunReport};
use crate::core::transfer::TransferOutcome;
use std::io::Write;
use std::time::Duration;

const HEADER_WIDTH: usize = 68;

/// Print a header section with a box
pub fn print_header(title: &str) {
    let inner = HEADER_WIDTH - 2;
    println!();
    println!("╔{}╗", "═".repeat(inner));
    println!("║{:^inner$}║", title, inner = inner);
    println!("╚{}╝", "═".repeat(inner));
    println!();
}

pub fn print_success(msg: &str) {
    println!("  ✓ {}", msg);
}

pub fn print_info(msg: &str) {
    println!("  • {}", msg);
}

pub fn print_warning(msg: &str) {
    println!("  ⚠ {}", msg);
}

pub fn print_error(msg: &str) {
    println!("  ✗ {}", msg);
}

/// Print the per-device lines and totals of a finished run
pub fn print_run_summary(report: &RunReport) {
    let elapsed = (report.finished_at - report.started_at)
        .to_std()
        .unwrap_or_default();

    print_header("Import Summary");

    if report.devices.is_empty() {
        print_info("No portable devices found.");
    }

    for device in &report.devices {
        let copied = device.items.iter().filter(|i| i.outcome.is_copied()).count();
        match &device.status {
            DeviceStatus::Ingested => print_success(&format!(
                "{}: {} of {} item(s) copied",
                device.name,
                copied,
                device.items.len()
            )),
            DeviceStatus::Interrupted => print_warning(&format!(
                "{}: interrupted after {} item(s)",
                device.name,
                device.items.len()
            )),
            DeviceStatus::Skipped { reason } => {
                print_info(&format!("{}: skipped ({})", device.name, reason))
            }
            DeviceStatus::Failed { reason } => {
                print_error(&format!("{}: {}", device.name, reason))
            }
        }

        for item in &device.items {
            if let TransferOutcome::Failed { reason } = &item.outcome {
                print_error(&format!("    {}: {}", item.file_name, reason));
            }
            for warning in &item.warnings {
                print_warning(&format!("    {}", warning));
            }
        }
    }

    let totals = report.totals();
    println!();
    print_info(&format!(
        "Copied {} file(s), {} in {}",
        totals.items_copied,
        format_bytes(totals.bytes_copied),
        format_duration(elapsed)
    ));
    if totals.items_skipped > 0 {
        print_info(&format!(
            "Skipped {} item(s) that were not transferable",
            totals.items_skipped
        ));
    }
    if totals.items_failed > 0 {
        print_error(&format!("{} item(s) failed", totals.items_failed));
    }
    if report.interrupted {
        print_warning("Import was interrupted before all devices were processed");
    }
    print_info(&format!(
        "Destination: {}",
        report.destination_root.display()
    ));
}

/// Format bytes as human-readable string
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    match bytes {
        b if b >= GB => format!("{:.2} GB", b as f64 / GB as f64),
        b if b >= MB => format!("{:.2} MB", b as f64 / MB as f64),
        b if b >= KB => format!("{:.1} KB", b as f64 / KB as f64),
        b => format!("{} bytes", b),
    }
}

/// Format duration as human-readable string
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    match secs {
        s if s >= 3600 => format!("{}h {}m", s / 3600, (s % 3600) / 60),
        s if s >= 60 => format!("{}m {}s", s / 60, s % 60),
        _ => format!("{:.1}s", duration.as_secs_f64()),
    }
}

/// A writer that writes to both stderr and a log file
pub struct DualWriter {
    pub console: std::io::Stderr,
    pub file: std::fs::File,
}

impl Write for DualWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let _ = self.console.write(buf);
        self.file.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        let _ = self.console.flush();
        self.file.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(500), "500 bytes");
        assert_eq!(format_bytes(1536), "1.5 KB");
        assert_eq!(format_bytes(3 * 1048576), "3.00 MB");
        assert_eq!(format_bytes(1073741824), "1.00 GB");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_millis(2500)), "2.5s");
        assert_eq!(format_duration(Duration::from_secs(125)), "2m 5s");
        assert_eq!(format_duration(Duration::from_secs(7260)), "2h 1m");
    }
}
