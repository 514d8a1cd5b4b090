//! Process-backed execute + coverage collaborator
//!
//! Runs the driver binary under a wall-clock limit, then captures gcov
//! counters through `lcov` and sums them into a [`CoverageReport`],
//! keeping only records under the configured source directory. The
//! accumulated `.gcda` counters are removed between iterations so each
//! measurement reflects exactly one run.

use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::mpsc;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::exec::{CoverageReport, CoverageRunner, ExecutionOutcome};

/// Exit code reported for a timed-out driver run, matching the
/// convention of coreutils `timeout`.
pub const TIMEOUT_RETURN_CODE: i32 = 124;

/// Default per-run wall-clock limit.
pub const DEFAULT_EXEC_TIMEOUT_MS: u64 = 5000;

/// Wait for a child with a wall-clock limit, reaping it on timeout.
pub fn wait_with_timeout(mut child: Child, timeout: Duration) -> Result<Option<i32>> {
    let (tx, rx) = mpsc::channel();
    let waiter = std::thread::spawn(move || {
        let result = child.wait();
        let _ = tx.send(result);
        child
    });
    match rx.recv_timeout(timeout) {
        Ok(Ok(status)) => {
            let _ = waiter.join();
            Ok(status.code())
        }
        Ok(Err(e)) => {
            let _ = waiter.join();
            Err(Error::Execution(format!("wait failed: {e}")))
        }
        Err(mpsc::RecvTimeoutError::Timeout) => {
            if let Ok(mut child) = waiter.join() {
                let _ = child.kill();
                let _ = child.wait();
            }
            Err(Error::Timeout(timeout.as_millis() as u64))
        }
        Err(mpsc::RecvTimeoutError::Disconnected) => {
            let _ = waiter.join();
            Err(Error::Execution("wait channel disconnected".to_string()))
        }
    }
}

/// Sum the counters of an lcov tracefile, keeping only records whose
/// source path starts with `source_prefix` (all records when empty).
#[must_use]
pub fn parse_lcov_info(content: &str, source_prefix: &str) -> CoverageReport {
    let mut report = CoverageReport::default();
    let mut in_scope = source_prefix.is_empty();
    for line in content.lines() {
        let line = line.trim();
        if let Some(path) = line.strip_prefix("SF:") {
            in_scope = source_prefix.is_empty() || path.starts_with(source_prefix);
            continue;
        }
        if !in_scope {
            continue;
        }
        let parse = |s: &str| s.trim().parse::<u64>().unwrap_or(0);
        if let Some(v) = line.strip_prefix("LH:") {
            report.line += parse(v);
        } else if let Some(v) = line.strip_prefix("LF:") {
            report.line_total += parse(v);
        } else if let Some(v) = line.strip_prefix("BRH:") {
            report.branch += parse(v);
        } else if let Some(v) = line.strip_prefix("BRF:") {
            report.branch_total += parse(v);
        } else if let Some(v) = line.strip_prefix("FNH:") {
            report.func += parse(v);
        } else if let Some(v) = line.strip_prefix("FNF:") {
            report.func_total += parse(v);
        }
    }
    report
}

fn remove_files_with_extension(dir: &Path, extension: &str) -> Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            remove_files_with_extension(&path, extension)?;
        } else if path.extension().is_some_and(|e| e == extension) {
            std::fs::remove_file(&path)?;
        }
    }
    Ok(())
}

fn any_file_with_extension(dir: &Path, extension: &str) -> bool {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return false;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            if any_file_with_extension(&path, extension) {
                return true;
            }
        } else if path.extension().is_some_and(|e| e == extension) {
            return true;
        }
    }
    false
}

/// Coverage runner backed by `lcov` over gcov-instrumented objects.
#[derive(Debug)]
pub struct LcovRunner {
    output_dir: PathBuf,
    object_files_dir: PathBuf,
    source_files_dir: PathBuf,
    exec_timeout_ms: u64,
}

impl LcovRunner {
    /// New runner; `output_dir` receives the tracefile.
    #[must_use]
    pub fn new(
        output_dir: PathBuf,
        object_files_dir: PathBuf,
        source_files_dir: PathBuf,
        exec_timeout_ms: u64,
    ) -> Self {
        Self {
            output_dir,
            object_files_dir,
            source_files_dir,
            exec_timeout_ms,
        }
    }

    fn execute(&self, executable: &Path) -> Result<i32> {
        let child = Command::new(executable)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| Error::Execution(format!("failed to spawn driver: {e}")))?;
        match wait_with_timeout(child, Duration::from_millis(self.exec_timeout_ms)) {
            Ok(code) => Ok(code.unwrap_or(-1)),
            Err(Error::Timeout(_)) => Ok(TIMEOUT_RETURN_CODE),
            Err(e) => Err(e),
        }
    }

    /// Capture counters into a tracefile and sum them.
    pub fn measure(&self) -> Result<CoverageReport> {
        let tracefile = self.output_dir.join("coverage.info");
        let output = Command::new("lcov")
            .arg("--capture")
            .arg("--directory")
            .arg(&self.object_files_dir)
            .arg("--output-file")
            .arg(&tracefile)
            .arg("--rc")
            .arg("lcov_branch_coverage=1")
            .output()
            .map_err(|e| Error::Execution(format!("failed to spawn lcov: {e}")))?;
        if !output.status.success() {
            return Err(Error::Execution(format!(
                "lcov capture failed: {}",
                String::from_utf8_lossy(&output.stderr)
            )));
        }
        let content = std::fs::read_to_string(&tracefile)?;
        Ok(parse_lcov_info(
            &content,
            &self.source_files_dir.to_string_lossy(),
        ))
    }
}

impl CoverageRunner for LcovRunner {
    fn has_artifacts(&self) -> bool {
        any_file_with_extension(&self.object_files_dir, "gcno")
    }

    fn reset(&mut self) -> Result<()> {
        remove_files_with_extension(&self.object_files_dir, "gcda")
    }

    fn execute_and_measure(&mut self, executable: &Path) -> Result<ExecutionOutcome> {
        self.reset()?;
        let return_code = self.execute(executable)?;
        let report = match self.measure() {
            Ok(report) => Some(report),
            Err(e) => {
                tracing::warn!(%e, "coverage measurement failed");
                None
            }
        };
        Ok(ExecutionOutcome {
            return_code,
            report,
        })
    }
}
