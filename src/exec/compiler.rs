//! Process-backed compile/link collaborator
//!
//! Drives the system C++ compiler the way the feedback loop needs it:
//! one compile invocation producing an object file, one link invocation
//! joining the driver object with the target library's object files.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::error::{Error, Result};
use crate::exec::{CompileOutcome, Compiler};

/// Compile/link via an external C++ compiler binary.
#[derive(Debug, Clone)]
pub struct ProcessCompiler {
    compiler: String,
    object_files: Vec<PathBuf>,
    compile_flags: Vec<String>,
    link_flags: Vec<String>,
}

impl ProcessCompiler {
    /// New compiler wrapper; `object_files` are linked into every
    /// driver executable.
    #[must_use]
    pub fn new(
        compiler: impl Into<String>,
        object_files: Vec<PathBuf>,
        compile_flags: Vec<String>,
        link_flags: Vec<String>,
    ) -> Self {
        Self {
            compiler: compiler.into(),
            object_files,
            compile_flags,
            link_flags,
        }
    }

    /// Whether the configured compiler binary responds.
    #[must_use]
    pub fn is_available(&self) -> bool {
        Command::new(&self.compiler)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .is_ok()
    }

    fn run(&self, cmd: &mut Command) -> Result<(bool, String)> {
        let output = cmd
            .output()
            .map_err(|e| Error::Compilation(format!("failed to spawn {}: {e}", self.compiler)))?;
        let diagnostics = String::from_utf8_lossy(&output.stderr).to_string();
        Ok((output.status.success(), diagnostics))
    }

    fn compile(&self, source: &Path, object: &Path) -> Result<(bool, String)> {
        let mut cmd = Command::new(&self.compiler);
        cmd.arg("-c")
            .arg(source)
            .arg("-o")
            .arg(object)
            .args(&self.compile_flags);
        self.run(&mut cmd)
    }

    fn link(&self, object: &Path, executable: &Path) -> Result<(bool, String)> {
        let mut cmd = Command::new(&self.compiler);
        cmd.arg(object)
            .args(&self.object_files)
            .arg("-o")
            .arg(executable)
            .args(&self.link_flags);
        self.run(&mut cmd)
    }
}

impl Compiler for ProcessCompiler {
    fn compile_and_link(
        &self,
        source: &Path,
        object: &Path,
        executable: &Path,
    ) -> Result<CompileOutcome> {
        let (compiled, diagnostics) = self.compile(source, object)?;
        if !compiled {
            return Ok(CompileOutcome::CompileFailed(diagnostics));
        }
        let (linked, diagnostics) = self.link(object, executable)?;
        if !linked {
            return Ok(CompileOutcome::LinkFailed(diagnostics));
        }
        Ok(CompileOutcome::Success)
    }
}

/// Collect object files under `dir`, descending at most `max_depth`
/// directory levels.
pub fn locate_object_files(dir: &Path, max_depth: usize) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    collect_objects(dir, max_depth, &mut found)?;
    found.sort();
    Ok(found)
}

fn collect_objects(dir: &Path, depth_left: usize, found: &mut Vec<PathBuf>) -> Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            if depth_left > 1 {
                collect_objects(&path, depth_left - 1, found)?;
            }
        } else if path.extension().is_some_and(|e| e == "o") {
            found.push(path);
        }
    }
    Ok(())
}
