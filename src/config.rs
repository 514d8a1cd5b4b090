//! Run configuration
//!
//! Everything the feedback loop needs to know about one campaign,
//! independent of how the options were collected. The binary builds
//! this from clap arguments; tests build it directly.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Temporary driver source filename, overwritten each iteration.
pub const TMP_DRIVER_SOURCE: &str = "tmp_driver.cpp";
/// Temporary driver object filename.
pub const TMP_DRIVER_OBJECT: &str = "tmp_driver.o";
/// Temporary driver executable filename.
pub const TMP_DRIVER_EXE: &str = "tmp_driver.exe";

/// Configuration of one fuzzing campaign.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FuzzConfig {
    /// Directory receiving all artefacts (scratch files, corpus, CSV)
    pub output_dir: PathBuf,
    /// Directory holding the target library's object files
    pub object_files_dir: PathBuf,
    /// Directory holding the target library's sources (crash scoping,
    /// coverage filtering)
    pub source_files_dir: PathBuf,
    /// Restrict driven executables to this class's methods
    pub target_class: Option<String>,
    /// Extra compile flags passed through to the compiler
    pub extra_compile_flags: Vec<String>,
    /// Extra link flags passed through to the linker
    pub extra_link_flags: Vec<String>,
    /// Function-complexity summary file
    pub complexity_file: Option<PathBuf>,
    /// Maximum directory depth for object-file discovery
    pub max_depth: usize,
    /// Campaign wall-clock budget in seconds
    pub timeout_secs: u64,
    /// Per-driver execution wall-clock limit in milliseconds
    pub exec_timeout_ms: u64,
    /// Exclusive bound on havoc edits per mutation round
    pub havoc_limit: usize,
    /// Header files included by every emitted driver
    pub includes: Vec<String>,
    /// PRNG seed; entropy-seeded when absent
    pub seed: Option<u64>,
    /// Drain every executable once before the random regime
    pub deterministic: bool,
    /// Iteration cap (mainly for tests); unbounded when absent
    pub max_iterations: Option<u64>,
}

impl FuzzConfig {
    /// Configuration with the spec'd defaults.
    #[must_use]
    pub fn new(
        output_dir: impl Into<PathBuf>,
        object_files_dir: impl Into<PathBuf>,
        source_files_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            output_dir: output_dir.into(),
            object_files_dir: object_files_dir.into(),
            source_files_dir: source_files_dir.into(),
            target_class: None,
            extra_compile_flags: Vec::new(),
            extra_link_flags: Vec::new(),
            complexity_file: None,
            max_depth: 1,
            timeout_secs: 30,
            exec_timeout_ms: crate::exec::coverage::DEFAULT_EXEC_TIMEOUT_MS,
            havoc_limit: 20,
            includes: Vec::new(),
            seed: None,
            deterministic: false,
            max_iterations: None,
        }
    }

    /// Scratch path of the per-iteration driver source.
    #[must_use]
    pub fn tmp_source_path(&self) -> PathBuf {
        self.output_dir.join(TMP_DRIVER_SOURCE)
    }

    /// Scratch path of the per-iteration driver object.
    #[must_use]
    pub fn tmp_object_path(&self) -> PathBuf {
        self.output_dir.join(TMP_DRIVER_OBJECT)
    }

    /// Scratch path of the per-iteration driver executable.
    #[must_use]
    pub fn tmp_executable_path(&self) -> PathBuf {
        self.output_dir.join(TMP_DRIVER_EXE)
    }

    /// Capture the effective configuration next to the run's outputs.
    pub fn write_snapshot(&self, dir: &Path) -> crate::error::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(dir.join("run_config.json"), json)?;
        Ok(())
    }
}
