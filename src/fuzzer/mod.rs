//! The feedback loop
//!
//! Per iteration: load a seed (fresh generation or a corpus entry),
//! havoc-mutate it, emit it to the scratch driver file, compile,
//! execute under coverage, classify the outcome, and admit interesting
//! drivers to the corpus. The loop never raises on per-iteration
//! failures — compile errors, crashes and unresolvable generations are
//! classified or discarded — and shuts down cooperatively on the
//! interrupt flag or the wall-clock deadline, flushing the corpus and
//! the coverage CSV on the way out.

pub mod covlog;
pub mod queue;

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::config::FuzzConfig;
use crate::emitter::{Emitter, Scaffold};
use crate::error::{Error, Result};
use crate::exec::{CompileOutcome, Compiler, CoverageReport, CoverageRunner, CrashTriager};
use crate::generator::{assemble, AssemblySpec};
use crate::ir::Driver;
use crate::model::{ApiModel, ExecId};
use crate::mutator::DriverMutator;
use crate::random::Rng;
use crate::selector::{ComplexitySummary, FunctionSelector, SelectionMode};
use crate::types::TypeTable;
use covlog::CoverageLog;
use queue::DriverQueue;

/// Uncompilable drivers are only admitted within the first hour; after
/// that they are uninformative noise.
const UNCOMPILABLE_ADMISSION_WINDOW_SECS: u64 = 3600;

/// The external collaborators one iteration talks to.
pub struct Collaborators<'a> {
    /// Compile + link
    pub compiler: &'a dyn Compiler,
    /// Execute + measure
    pub coverage: &'a mut dyn CoverageRunner,
    /// Crash triage
    pub triage: &'a mut dyn CrashTriager,
}

/// End-of-run statistics.
#[derive(Debug, Clone, Copy, Default)]
pub struct FuzzStats {
    /// Iterations attempted
    pub attempts: u64,
    /// Drivers admitted to the valid partition
    pub valid: usize,
    /// Unique crashes admitted
    pub crashes: usize,
    /// Uncompilable drivers admitted
    pub uncompilable: usize,
    /// Best coverage observed
    pub best: CoverageReport,
}

/// The feedback-driven fuzzing session.
pub struct Fuzzer {
    model: ApiModel,
    types: TypeTable,
    rng: Rng,
    summary: Option<ComplexitySummary>,
    queue: DriverQueue,
    covlog: CoverageLog,
    fingerprints: HashSet<String>,
    best: CoverageReport,
    cursor: usize,
    interrupt: Arc<AtomicBool>,
}

impl Fuzzer {
    /// New session over a prepared model.
    #[must_use]
    pub fn new(
        model: ApiModel,
        types: TypeTable,
        rng: Rng,
        summary: Option<ComplexitySummary>,
    ) -> Self {
        Self {
            model,
            types,
            rng,
            summary,
            queue: DriverQueue::new(),
            covlog: CoverageLog::new(),
            fingerprints: HashSet::new(),
            best: CoverageReport::default(),
            cursor: 0,
            interrupt: Arc::new(AtomicBool::new(false)),
        }
    }

    /// The cooperative interrupt flag; signal handlers set it, the loop
    /// observes it at the top of each iteration.
    #[must_use]
    pub fn interrupt_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.interrupt)
    }

    /// The corpus accumulated so far.
    #[must_use]
    pub fn queue(&self) -> &DriverQueue {
        &self.queue
    }

    /// Coverage-improvement log accumulated so far.
    #[must_use]
    pub fn coverage_log(&self) -> &CoverageLog {
        &self.covlog
    }

    /// Executables eligible as drive targets: non-excluded,
    /// non-creator, and owned by the target class when one is named.
    fn fuzzable_pool(&self, target_class: Option<&str>) -> Vec<ExecId> {
        let target = target_class.and_then(|name| self.model.class_by_qualified_name(name));
        self.model
            .executables()
            .filter(|(_, e)| !e.excluded && !e.is_creator())
            .filter(|(_, e)| match target {
                Some(class) => e.owner == Some(class),
                None => true,
            })
            .map(|(id, _)| id)
            .collect()
    }

    fn generate_fresh(&mut self, pool: &[ExecId]) -> Result<Driver> {
        let selector = FunctionSelector::new(
            pool.to_vec(),
            SelectionMode::ComplexityWeighted,
            self.summary.as_ref(),
        );
        let target = selector
            .next(&self.model, &mut self.rng)
            .ok_or_else(|| Error::Generation("empty executable pool".to_string()))?;
        let force_reuse = self.rng.next_bool();
        assemble(
            &self.model,
            &mut self.types,
            &mut self.rng,
            AssemblySpec::fresh_with_reuse(target, force_reuse),
        )
    }

    /// Load the next seed: drain the deterministic warm-up queue first,
    /// then with probability ½ (or always while the valid corpus is
    /// empty) generate fresh, otherwise replay the corpus cursor.
    fn load_seed(&mut self, pool: &[ExecId], warmup: &mut VecDeque<ExecId>) -> Result<Driver> {
        if let Some(target) = warmup.pop_front() {
            tracing::debug!(remaining = warmup.len(), "deterministic warm-up");
            return assemble(
                &self.model,
                &mut self.types,
                &mut self.rng,
                AssemblySpec::fresh(target),
            );
        }

        let valid_count = self.queue.valid().len();
        if valid_count == 0 || self.rng.next_bool() {
            return self.generate_fresh(pool);
        }
        self.cursor %= valid_count;
        let seed = self.queue.valid()[self.cursor].driver.clone();
        self.cursor += 1;
        Ok(seed)
    }

    fn classify_execution(
        &mut self,
        driver: Driver,
        outcome: crate::exec::ExecutionOutcome,
        timestamp_secs: u64,
        collab: &mut Collaborators<'_>,
        config: &FuzzConfig,
    ) -> Result<()> {
        if outcome.is_successful() || outcome.has_caught_exception() {
            let Some(report) = outcome.report else {
                return Ok(());
            };
            if report.improves_any_axis_over(&self.best) {
                self.best = report;
                let id = self
                    .queue
                    .add_valid(driver, outcome.return_code, timestamp_secs);
                self.covlog.append(timestamp_secs, report);
                tracing::info!(id, coverage = %report.pretty(), "interesting driver admitted");
            }
            return Ok(());
        }

        // crash path
        let memo = collab
            .triage
            .triage(&config.tmp_executable_path(), &config.source_files_dir)?;
        if !memo.is_reportable() {
            tracing::debug!("crash suppressed (no in-source frames or null invoking object)");
            return Ok(());
        }
        let fingerprint = memo.fingerprint.clone().expect("reportable crash");
        if self.fingerprints.insert(fingerprint) {
            let id = self
                .queue
                .add_crash(driver, memo, outcome.return_code, timestamp_secs);
            tracing::info!(id, "new crashing driver admitted");
        }
        Ok(())
    }

    /// Run the campaign.
    ///
    /// # Errors
    ///
    /// Configuration-fatal errors (missing coverage artefacts, an
    /// unwritable output directory, broken collaborator plumbing)
    /// surface here; per-iteration compile/run/crash outcomes are
    /// classified into the corpus instead.
    pub fn run(&mut self, config: &FuzzConfig, collab: &mut Collaborators<'_>) -> Result<FuzzStats> {
        std::fs::create_dir_all(&config.output_dir)?;
        if !collab.coverage.has_artifacts() {
            return Err(Error::Configuration(format!(
                "no coverage instrumentation artefacts under {}",
                config.object_files_dir.display()
            )));
        }
        collab.coverage.reset()?;

        let pool = self.fuzzable_pool(config.target_class.as_deref());
        if pool.is_empty() {
            tracing::warn!("no drivable executables in the model; nothing to fuzz");
        }
        let mut warmup: VecDeque<ExecId> = if config.deterministic {
            pool.iter().copied().collect()
        } else {
            VecDeque::new()
        };

        let started = Instant::now();
        let mut attempts: u64 = 0;
        tracing::info!(
            executables = pool.len(),
            timeout_secs = config.timeout_secs,
            "fuzzing loop started"
        );

        while !pool.is_empty()
            && !self.interrupt.load(Ordering::SeqCst)
            && started.elapsed().as_secs() < config.timeout_secs
            && config.max_iterations.map_or(true, |cap| attempts < cap)
        {
            attempts += 1;
            let seed = match self.load_seed(&pool, &mut warmup) {
                Ok(seed) => seed,
                Err(err) => {
                    tracing::debug!(%err, "seed generation discarded");
                    continue;
                }
            };

            let mut mutated = {
                let mut mutator = DriverMutator::new(
                    &self.model,
                    &mut self.types,
                    &mut self.rng,
                    self.summary.as_ref(),
                );
                mutator.mutate(&seed, config.havoc_limit)
            };

            let source = {
                let emitter = Emitter::new(&self.model, &self.types);
                let scaffold = Scaffold::for_execution(config.includes.clone());
                emitter.driver_source(&mut mutated, &mut self.rng, &scaffold)
            };
            std::fs::write(config.tmp_source_path(), source)?;

            let elapsed_secs = started.elapsed().as_secs();
            let build = collab.compiler.compile_and_link(
                &config.tmp_source_path(),
                &config.tmp_object_path(),
                &config.tmp_executable_path(),
            )?;
            match build {
                CompileOutcome::Success => {
                    let outcome = collab
                        .coverage
                        .execute_and_measure(&config.tmp_executable_path())?;
                    self.classify_execution(mutated, outcome, elapsed_secs, collab, config)?;
                }
                CompileOutcome::CompileFailed(diagnostics) => {
                    if elapsed_secs < UNCOMPILABLE_ADMISSION_WINDOW_SECS {
                        self.queue.add_uncompilable(
                            mutated,
                            crate::exec::CrashMemo::for_compile_error(diagnostics),
                            elapsed_secs,
                        );
                    }
                }
                CompileOutcome::LinkFailed(diagnostics) => {
                    tracing::warn!(%diagnostics, "driver link failed; discarded");
                }
            }
        }

        let counts = self.queue.counts();
        tracing::info!(
            attempts,
            valid = counts.0,
            crashes = counts.1,
            uncompilable = counts.2,
            "fuzzing loop ended"
        );

        self.covlog
            .write_csv(&config.output_dir, config.timeout_secs, counts)?;
        {
            let emitter = Emitter::new(&self.model, &self.types);
            self.queue.flush(
                &emitter,
                &mut self.rng,
                &config.output_dir,
                &config.includes,
            )?;
        }

        Ok(FuzzStats {
            attempts,
            valid: counts.0,
            crashes: counts.1,
            uncompilable: counts.2,
            best: self.best,
        })
    }
}
