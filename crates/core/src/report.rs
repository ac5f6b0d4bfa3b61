//! Result output
//!
//! Two things live here:
//!
//! - [`Comparison`]: the three stdout lines (approximation, reference π,
//!   exact equality).
//! - The optional statistics report, controlled by `BBPI_REPORT`:
//!   - Unset, empty or `0` → no report
//!   - `1` → human-readable to stderr
//!   - `json` → JSON to stderr
//!   - `json:/path` → JSON to file

use std::f64::consts::PI;
use std::fs;
use std::io::{self, Write};

use tracing::warn;

use crate::error::ReportError;
use crate::stats::Stats;

/// Environment variable selecting the statistics report
pub const REPORT_ENV: &str = "BBPI_REPORT";

// =============================================================================
// Comparison
// =============================================================================

/// An approximation next to the reference constant
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Comparison {
    pub approximation: f64,
    pub reference: f64,
    /// Exact `==`, no tolerance
    pub equal: bool,
}

impl Comparison {
    pub fn against_pi(approximation: f64) -> Self {
        Comparison {
            approximation,
            reference: PI,
            equal: approximation == PI,
        }
    }

    /// Write the three result lines
    pub fn write_to<W: Write>(&self, out: &mut W) -> io::Result<()> {
        writeln!(out, "{:?}", self.approximation)?;
        writeln!(out, "{:?}", self.reference)?;
        writeln!(out, "{}", self.equal)
    }
}

// =============================================================================
// Report Configuration (parsed from BBPI_REPORT or --report)
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportFormat {
    Human,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportDestination {
    Stderr,
    File(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportConfig {
    pub format: ReportFormat,
    pub destination: ReportDestination,
}

impl ReportConfig {
    /// Parse a `BBPI_REPORT` value. `None` means no report.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "" | "0" => None,
            "1" => Some(ReportConfig {
                format: ReportFormat::Human,
                destination: ReportDestination::Stderr,
            }),
            "json" => Some(ReportConfig {
                format: ReportFormat::Json,
                destination: ReportDestination::Stderr,
            }),
            s if s.starts_with("json:") && s.len() > 5 => Some(ReportConfig {
                format: ReportFormat::Json,
                destination: ReportDestination::File(s[5..].to_string()),
            }),
            _ => {
                warn!("{}='{}' not recognized, ignoring", REPORT_ENV, value);
                None
            }
        }
    }

    /// Parse from the BBPI_REPORT environment variable
    pub fn from_env() -> Option<Self> {
        let val = std::env::var(REPORT_ENV).ok()?;
        Self::parse(&val)
    }

    /// Render `stats` in this format and write it to the destination
    pub fn emit(&self, stats: &Stats) -> Result<(), ReportError> {
        let text = match self.format {
            ReportFormat::Human => format_human(stats),
            ReportFormat::Json => format_json(stats)?,
        };

        match &self.destination {
            ReportDestination::Stderr => {
                let mut stderr = io::stderr().lock();
                stderr.write_all(text.as_bytes())?;
                stderr.flush()?;
            }
            ReportDestination::File(path) => fs::write(path, text)?,
        }
        Ok(())
    }
}

// =============================================================================
// Formatting
// =============================================================================

pub fn format_human(stats: &Stats) -> String {
    let server = &stats.server;
    let mut out = String::new();
    out.push_str("=== BBPI REPORT ===\n");
    out.push_str(&format!(
        "PI (decimals = {}): {}\n",
        stats.pi.decimal_count, stats.pi.pi
    ));
    out.push_str(&format!("Total terms:     {}\n", server.total_terms));
    out.push_str(&format!("Term size:       {}\n", server.term_size));
    out.push_str(&format!(
        "Jobs:            {} ({} merged, {} lost, {} reassigned)\n",
        server.jobs.len(),
        stats.merged_jobs(),
        stats.lost_jobs(),
        server.reassigned
    ));
    out.push_str(&format!("Workers:         {}\n", server.workers.len()));

    if !server.jobs.is_empty() {
        out.push_str("\n--- Jobs ---\n");
        for job in &server.jobs {
            let elapsed = job
                .elapsed_ms
                .map(|ms| format!("{} ms", ms))
                .unwrap_or_else(|| "pending".to_string());
            out.push_str(&format!(
                "  {:>6} {:20} terms {}..{} {}\n",
                job.id,
                job.worker,
                job.start_term,
                job.start_term + job.num_terms,
                elapsed
            ));
        }
    }

    out.push_str("===================\n");
    out
}

pub fn format_json(stats: &Stats) -> Result<String, serde_json::Error> {
    let mut text = serde_json::to_string_pretty(stats)?;
    text.push('\n');
    Ok(text)
}
