//! External collaborator interfaces
//!
//! The feedback loop talks to three collaborators, all modelled as
//! traits so the loop is testable with scripted fakes:
//!
//! - [`Compiler`]: compile + link one driver source file;
//! - [`CoverageRunner`]: execute a driver binary under a wall-clock
//!   limit and measure the resulting coverage counters;
//! - [`CrashTriager`]: re-run a crashing binary under a debugger and
//!   distil a crash fingerprint.
//!
//! Process-backed implementations live in the submodules.

pub mod compiler;
pub mod coverage;
pub mod triage;

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Sentinel exit code marking a caught exception (driver `catch (...)`
/// block).
pub const CAUGHT_EXCEPTION_RETURN: i32 = 180;

/// Outcome of compiling and linking one driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompileOutcome {
    /// Object and executable produced
    Success,
    /// Compilation failed; carries the compiler's diagnostics
    CompileFailed(String),
    /// Linking failed; carries the linker's diagnostics
    LinkFailed(String),
}

/// Coverage counters for one measurement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverageReport {
    /// Lines hit
    pub line: u64,
    /// Total instrumented lines
    pub line_total: u64,
    /// Branches hit
    pub branch: u64,
    /// Total instrumented branches
    pub branch_total: u64,
    /// Functions hit
    pub func: u64,
    /// Total instrumented functions
    pub func_total: u64,
}

impl CoverageReport {
    fn percent(hit: u64, total: u64) -> f64 {
        if total == 0 {
            0.0
        } else {
            hit as f64 / total as f64 * 100.0
        }
    }

    /// (line %, branch %, function %) triple.
    #[must_use]
    pub fn percentages(&self) -> (f64, f64, f64) {
        (
            Self::percent(self.line, self.line_total),
            Self::percent(self.branch, self.branch_total),
            Self::percent(self.func, self.func_total),
        )
    }

    /// Whether any dimension strictly exceeds `other`'s — the corpus
    /// admission rule (any axis, not Pareto).
    #[must_use]
    pub fn improves_any_axis_over(&self, other: &CoverageReport) -> bool {
        self.line > other.line || self.branch > other.branch || self.func > other.func
    }

    /// Human-readable percentage summary.
    #[must_use]
    pub fn pretty(&self) -> String {
        let (l, b, f) = self.percentages();
        format!(
            "line {}/{} ({l:.2}%), branch {}/{} ({b:.2}%), func {}/{} ({f:.2}%)",
            self.line, self.line_total, self.branch, self.branch_total, self.func, self.func_total
        )
    }
}

/// Outcome of executing one driver under coverage.
#[derive(Debug, Clone)]
pub struct ExecutionOutcome {
    /// Process return code
    pub return_code: i32,
    /// Coverage counters measured after the run
    pub report: Option<CoverageReport>,
}

impl ExecutionOutcome {
    /// Normal exit.
    #[must_use]
    pub fn is_successful(&self) -> bool {
        self.return_code == 0
    }

    /// Exit through the driver's catch-all handler.
    #[must_use]
    pub fn has_caught_exception(&self) -> bool {
        self.return_code == CAUGHT_EXCEPTION_RETURN
    }
}

/// What the crash triager learned about one crashing driver.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CrashMemo {
    /// False for crashes suppressed as trivially generated (e.g. a null
    /// invoking object dereferenced straight from `main`)
    pub valid_crash: bool,
    /// Space-joined in-source stack locations identifying the crash
    pub fingerprint: Option<String>,
    /// Innermost in-source frame location
    pub location: Option<String>,
    /// Driver line number of the crash, when the trace reaches `main`
    pub crash_line: Option<u32>,
    /// Raw debugger output
    pub debugger_output: Option<String>,
    /// Compiler diagnostics, for uncompilable drivers
    pub compile_error: Option<String>,
}

impl CrashMemo {
    /// Memo for an uncompilable driver.
    #[must_use]
    pub fn for_compile_error(diagnostics: impl Into<String>) -> Self {
        Self {
            valid_crash: false,
            compile_error: Some(diagnostics.into()),
            ..Self::default()
        }
    }

    /// Whether the crash resolved to a source location worth keeping.
    #[must_use]
    pub fn is_reportable(&self) -> bool {
        self.valid_crash && self.location.is_some() && self.fingerprint.is_some()
    }
}

/// Compile + link collaborator.
pub trait Compiler {
    /// Compile `source` into `object` and link `executable`.
    fn compile_and_link(
        &self,
        source: &Path,
        object: &Path,
        executable: &Path,
    ) -> Result<CompileOutcome>;
}

/// Execute-and-measure collaborator.
pub trait CoverageRunner {
    /// Whether the instrumentation artefacts needed for measurement
    /// exist; checked once before the loop starts.
    fn has_artifacts(&self) -> bool;

    /// Reset accumulated counters between iterations.
    fn reset(&mut self) -> Result<()>;

    /// Run `executable` under the wall-clock limit and measure.
    fn execute_and_measure(&mut self, executable: &Path) -> Result<ExecutionOutcome>;
}

/// Crash-triage collaborator.
pub trait CrashTriager {
    /// Re-run `executable` under a debugger and summarise the crash,
    /// keeping only frames inside `source_dir`.
    fn triage(&mut self, executable: &Path, source_dir: &Path) -> Result<CrashMemo>;
}
