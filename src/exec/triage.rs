//! Process-backed crash triage
//!
//! Re-runs a crashing driver under gdb in batch mode (`run` + `bt`),
//! walks the backtrace, and squashes the frames that resolve into the
//! configured source directory into a crash fingerprint. Crashes whose
//! innermost `main`-adjacent frame dereferences a null invoking object
//! are marked invalid — those are trivially generated, not findings.

use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::{Error, Result};
use crate::exec::{CrashMemo, CrashTriager};

const GDB_COMMANDS: &str = "run\n\nbt\n";
const GDB_TIMEOUT_SECS: u64 = 5;

fn is_start_of_backtrace(line: &str) -> bool {
    line.starts_with("#0")
}

/// Extract the `at file:line` location of one backtrace frame.
#[must_use]
pub fn parse_frame_location(line: &str) -> Option<&str> {
    let tokens: Vec<&str> = line.split(' ').filter(|t| !t.is_empty()).collect();
    let at_pos = tokens.iter().rposition(|t| *t == "at")?;
    tokens.get(at_pos + 1).copied()
}

/// Space-join the in-source frame locations into a crash identity.
#[must_use]
pub fn squash_stack_trace(locations: &[String]) -> String {
    locations.join(" ")
}

/// Parsed view of one gdb run.
#[derive(Debug, Default)]
pub struct BacktraceSummary {
    /// All frame locations inside the source directory, outermost last
    pub in_source: Vec<String>,
    /// Location of the innermost frame (often the driver's `main`)
    pub last_frame: Option<String>,
    /// Whether the frame called from `main` dereferenced `this=0x0`
    pub null_invoking_object: bool,
}

/// Walk gdb output and collect the backtrace information the loop
/// needs. `driver_file` is the temporary driver source filename used
/// to spot the `main` frame.
#[must_use]
pub fn parse_backtrace(output: &str, source_dir: &str, driver_file: &str) -> BacktraceSummary {
    let lines: Vec<&str> = output.lines().collect();

    // null-invoking-object check: the frame called directly from the
    // driver's main carries this=0x0
    let mut null_invoking_object = false;
    if let Some(main_pos) = lines
        .iter()
        .rposition(|l| l.contains("main") && l.contains(driver_file))
    {
        if main_pos > 0 {
            null_invoking_object = lines[main_pos - 1].contains("this=0x0");
        }
    }

    let mut summary = BacktraceSummary {
        null_invoking_object,
        ..BacktraceSummary::default()
    };
    let mut in_backtrace = false;
    for raw in &lines {
        let line = raw.trim();
        if is_start_of_backtrace(line) {
            in_backtrace = true;
        } else if in_backtrace && line.is_empty() {
            break;
        }
        if !in_backtrace {
            continue;
        }
        if let Some(location) = parse_frame_location(line) {
            if location.starts_with(source_dir) {
                summary.in_source.push(location.to_string());
            }
            summary.last_frame = Some(location.to_string());
        }
    }
    summary
}

/// Crash line number within the driver, recovered from the innermost
/// frame when it points back at the driver source.
#[must_use]
pub fn driver_line_number(last_frame: Option<&str>, driver_file: &str) -> Option<u32> {
    let frame = last_frame?;
    let (file, line) = frame.rsplit_once(':')?;
    if !file.ends_with(driver_file) {
        return None;
    }
    line.parse().ok()
}

/// Triager invoking gdb in batch mode.
#[derive(Debug)]
pub struct GdbTriager {
    command_file: PathBuf,
    driver_file: String,
}

impl GdbTriager {
    /// New triager; `scratch_dir` receives the gdb command file and
    /// `driver_file` is the temporary driver source filename.
    #[must_use]
    pub fn new(scratch_dir: &Path, driver_file: impl Into<String>) -> Self {
        Self {
            command_file: scratch_dir.join("triage.gdb"),
            driver_file: driver_file.into(),
        }
    }

    /// Whether gdb responds on this system.
    #[must_use]
    pub fn is_available() -> bool {
        Command::new("gdb")
            .arg("--version")
            .output()
            .is_ok_and(|o| o.status.success())
    }

    fn run_gdb(&self, executable: &Path) -> Result<String> {
        std::fs::write(&self.command_file, GDB_COMMANDS)?;
        let output = Command::new("timeout")
            .arg(GDB_TIMEOUT_SECS.to_string())
            .arg("gdb")
            .arg("--batch")
            .arg(format!("--command={}", self.command_file.display()))
            .arg("--args")
            .arg(executable)
            .output()
            .map_err(|e| Error::Triage(format!("failed to spawn gdb: {e}")))?;
        let mut text = String::from_utf8_lossy(&output.stdout).to_string();
        text.push_str(&String::from_utf8_lossy(&output.stderr));
        Ok(text)
    }
}

impl CrashTriager for GdbTriager {
    fn triage(&mut self, executable: &Path, source_dir: &Path) -> Result<CrashMemo> {
        let output = self.run_gdb(executable)?;
        let summary = parse_backtrace(
            &output,
            &source_dir.to_string_lossy(),
            &self.driver_file,
        );

        if summary.null_invoking_object {
            return Ok(CrashMemo {
                valid_crash: false,
                debugger_output: Some(output),
                ..CrashMemo::default()
            });
        }

        let fingerprint = squash_stack_trace(&summary.in_source);
        let crash_line = driver_line_number(summary.last_frame.as_deref(), &self.driver_file);
        Ok(CrashMemo {
            valid_crash: true,
            location: summary.in_source.first().cloned(),
            fingerprint: Some(fingerprint),
            crash_line,
            debugger_output: Some(output),
            compile_error: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_BT: &str = "\
Program received signal SIGSEGV, Segmentation fault.
0x0000555555555555 in widget::poke (this=0x55, n=3) at /src/lib/widget.cpp:42
#0  widget::poke (this=0x55, n=3) at /src/lib/widget.cpp:42
#1  0x0000555555554444 in widget::run (this=0x55) at /src/lib/widget.cpp:77
#2  0x0000555555553333 in main () at /tmp/out/tmp_driver.cpp:9

No symbol table info available.
";

    #[test]
    fn test_parse_frame_location() {
        assert_eq!(
            parse_frame_location("#0  widget::poke (this=0x55) at /src/lib/widget.cpp:42"),
            Some("/src/lib/widget.cpp:42")
        );
        assert_eq!(parse_frame_location("#0  ?? ()"), None);
    }

    #[test]
    fn test_parse_backtrace_in_source_frames() {
        let summary = parse_backtrace(SAMPLE_BT, "/src/lib", "tmp_driver.cpp");
        assert_eq!(
            summary.in_source,
            vec![
                "/src/lib/widget.cpp:42".to_string(),
                "/src/lib/widget.cpp:77".to_string(),
            ]
        );
        assert_eq!(
            summary.last_frame.as_deref(),
            Some("/tmp/out/tmp_driver.cpp:9")
        );
        assert!(!summary.null_invoking_object);
    }

    #[test]
    fn test_fingerprint_squashing() {
        let summary = parse_backtrace(SAMPLE_BT, "/src/lib", "tmp_driver.cpp");
        assert_eq!(
            squash_stack_trace(&summary.in_source),
            "/src/lib/widget.cpp:42 /src/lib/widget.cpp:77"
        );
    }

    #[test]
    fn test_driver_line_number() {
        let summary = parse_backtrace(SAMPLE_BT, "/src/lib", "tmp_driver.cpp");
        assert_eq!(
            driver_line_number(summary.last_frame.as_deref(), "tmp_driver.cpp"),
            Some(9)
        );
        assert_eq!(
            driver_line_number(Some("/src/lib/widget.cpp:42"), "tmp_driver.cpp"),
            None
        );
        assert_eq!(driver_line_number(None, "tmp_driver.cpp"), None);
    }

    #[test]
    fn test_null_invoking_object_suppressed() {
        let output = "\
#0  widget::poke (this=0x0) at /src/lib/widget.cpp:42
#1  0x0000555555553333 in main () at /tmp/out/tmp_driver.cpp:4

";
        let summary = parse_backtrace(output, "/src/lib", "tmp_driver.cpp");
        assert!(summary.null_invoking_object);
    }

    #[test]
    fn test_backtrace_stops_at_blank_line() {
        let output = "\
#0  a () at /src/lib/a.cpp:1
#1  b () at /src/lib/b.cpp:2

#0  ghost () at /src/lib/ghost.cpp:9
";
        let summary = parse_backtrace(output, "/src/lib", "tmp_driver.cpp");
        assert_eq!(summary.in_source.len(), 2);
    }

    #[test]
    fn test_frames_outside_source_dir_excluded() {
        let output = "\
#0  raise () at /usr/lib/libc.c:55
#1  widget::run () at /src/lib/widget.cpp:77
#2  main () at /tmp/out/tmp_driver.cpp:3

";
        let summary = parse_backtrace(output, "/src/lib", "tmp_driver.cpp");
        assert_eq!(summary.in_source, vec!["/src/lib/widget.cpp:77".to_string()]);
    }
}
