//! Coverage logging
//!
//! One entry per coverage-improving driver, ordered by timestamp, and a
//! CSV summary emitted at end of run for plotting.

use std::path::Path;

use crate::error::Result;
use crate::exec::CoverageReport;

const CSV_HEADER: &str =
    "time, line, linetot, branch, branchtot, func, functot, linecov, branchcov, funccov";

/// One coverage-improvement event.
#[derive(Debug, Clone, Copy)]
pub struct CoverageLogEntry {
    /// Seconds since loop start
    pub timestamp_secs: u64,
    /// Counters observed at that point
    pub report: CoverageReport,
}

impl CoverageLogEntry {
    fn csv_row(&self) -> String {
        let r = &self.report;
        let (line_pct, branch_pct, func_pct) = r.percentages();
        format!(
            "{},{},{},{},{},{},{},{line_pct},{branch_pct},{func_pct}",
            self.timestamp_secs, r.line, r.line_total, r.branch, r.branch_total, r.func,
            r.func_total
        )
    }
}

/// Accumulates coverage-improvement events for the CSV summary.
#[derive(Debug, Default)]
pub struct CoverageLog {
    entries: Vec<CoverageLogEntry>,
}

impl CoverageLog {
    /// Empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one improvement.
    pub fn append(&mut self, timestamp_secs: u64, report: CoverageReport) {
        self.entries.push(CoverageLogEntry {
            timestamp_secs,
            report,
        });
    }

    /// Entries in admission order.
    #[must_use]
    pub fn entries(&self) -> &[CoverageLogEntry] {
        &self.entries
    }

    /// Render the CSV summary: header, one row per entry, a final row
    /// at the timeout repeating the last observation, and the corpus
    /// counts.
    #[must_use]
    pub fn to_csv(&self, timeout_secs: u64, counts: (usize, usize, usize)) -> String {
        let mut out = String::from(CSV_HEADER);
        out.push('\n');
        for entry in &self.entries {
            out.push_str(&entry.csv_row());
            out.push('\n');
        }
        if let Some(last) = self.entries.last() {
            let final_row = CoverageLogEntry {
                timestamp_secs: timeout_secs,
                report: last.report,
            };
            out.push_str(&final_row.csv_row());
            out.push('\n');
        }
        out.push_str("valid, crash, uncompilable\n");
        out.push_str(&format!("{},{},{}\n", counts.0, counts.1, counts.2));
        out
    }

    /// Write the CSV summary as `out_report.csv` under `out_dir`.
    pub fn write_csv(
        &self,
        out_dir: &Path,
        timeout_secs: u64,
        counts: (usize, usize, usize),
    ) -> Result<()> {
        let path = out_dir.join("out_report.csv");
        std::fs::write(path, self.to_csv(timeout_secs, counts))?;
        Ok(())
    }
}
