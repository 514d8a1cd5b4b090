//! Fabricar CLI - coverage-guided driver factory for C++ libraries
//!
//! Wires the model loader, the analysis pass and the process-backed
//! collaborators into the feedback loop.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use fabricar::config::{FuzzConfig, TMP_DRIVER_SOURCE};
use fabricar::exec::compiler::{locate_object_files, ProcessCompiler};
use fabricar::exec::coverage::LcovRunner;
use fabricar::exec::triage::GdbTriager;
use fabricar::fuzzer::{Collaborators, Fuzzer};
use fabricar::model::analysis::filter_model;
use fabricar::model::load::load_model;
use fabricar::random::Rng;
use fabricar::selector::ComplexitySummary;

/// Fabricar - coverage-guided unit-test driver factory
#[derive(Parser)]
#[command(name = "fabricar")]
#[command(version, about, long_about = None)]
struct Cli {
    /// API model JSON file produced by the header analyzer
    #[arg(short, long)]
    model: PathBuf,

    /// Directory receiving all artefacts (scratch, corpus, CSV)
    #[arg(short, long)]
    output_prefix: PathBuf,

    /// Directory holding the target library's instrumented object files
    #[arg(long)]
    object_files: PathBuf,

    /// Directory holding the target library's sources
    #[arg(long)]
    source_files: PathBuf,

    /// Restrict driven executables to this class (qualified name)
    #[arg(long)]
    target_class: Option<String>,

    /// Extra compile flags (repeatable)
    #[arg(long = "extra-cxx-flag")]
    extra_cxx_flags: Vec<String>,

    /// Extra link flags (repeatable)
    #[arg(long = "extra-ld-flag")]
    extra_ld_flags: Vec<String>,

    /// Function-complexity summary file
    #[arg(long)]
    func_complexity_file: Option<PathBuf>,

    /// Maximum directory depth for object-file discovery
    #[arg(long, default_value = "1")]
    max_depth: usize,

    /// Campaign budget in seconds
    #[arg(short, long, default_value = "30")]
    timeout: u64,

    /// Per-driver execution limit in milliseconds
    #[arg(long, default_value = "5000")]
    exec_timeout_ms: u64,

    /// Header files included by every emitted driver (repeatable)
    #[arg(short = 'I', long = "include")]
    includes: Vec<String>,

    /// PRNG seed for reproducible runs
    #[arg(long)]
    seed: Option<u64>,

    /// C++ compiler binary
    #[arg(long, default_value = "clang++")]
    compiler: String,

    /// Drain every executable once before the random regime
    #[arg(long)]
    deterministic: bool,
}

fn run(cli: Cli) -> fabricar::Result<()> {
    let mut config = FuzzConfig::new(&cli.output_prefix, &cli.object_files, &cli.source_files);
    config.target_class = cli.target_class;
    config.extra_compile_flags = cli.extra_cxx_flags;
    config.extra_link_flags = cli.extra_ld_flags;
    config.complexity_file = cli.func_complexity_file;
    config.max_depth = cli.max_depth;
    config.timeout_secs = cli.timeout;
    config.exec_timeout_ms = cli.exec_timeout_ms;
    config.includes = cli.includes;
    config.seed = cli.seed;
    config.deterministic = cli.deterministic;

    std::fs::create_dir_all(&config.output_dir)?;
    config.write_snapshot(&config.output_dir)?;

    let (mut model, types) = load_model(&cli.model)?;
    let report = filter_model(&mut model, &types);
    tracing::info!(
        excluded = report.excluded.len(),
        rounds = report.rounds,
        "model analysis complete"
    );

    let summary = match &config.complexity_file {
        Some(path) => {
            let summary = ComplexitySummary::import(path)?;
            tracing::info!(functions = summary.len(), "complexity summary loaded");
            Some(summary)
        }
        None => {
            tracing::info!("running without a function-complexity summary");
            None
        }
    };

    let rng = match config.seed {
        Some(seed) => Rng::from_seed(seed),
        None => Rng::from_entropy(),
    };

    let objects = locate_object_files(&config.object_files_dir, config.max_depth)?;
    tracing::info!(count = objects.len(), "object files discovered");
    let mut compile_flags = vec!["-g".to_string(), "--coverage".to_string()];
    compile_flags.extend(config.extra_compile_flags.clone());
    let mut link_flags = vec!["--coverage".to_string()];
    link_flags.extend(config.extra_link_flags.clone());
    let compiler = ProcessCompiler::new(&cli.compiler, objects, compile_flags, link_flags);
    if !compiler.is_available() {
        return Err(fabricar::Error::Configuration(format!(
            "compiler {} not available",
            cli.compiler
        )));
    }

    let mut coverage = LcovRunner::new(
        config.output_dir.clone(),
        config.object_files_dir.clone(),
        config.source_files_dir.clone(),
        config.exec_timeout_ms,
    );
    let mut triage = GdbTriager::new(&config.output_dir, TMP_DRIVER_SOURCE);

    let mut fuzzer = Fuzzer::new(model, types, rng, summary);
    let interrupt = fuzzer.interrupt_flag();
    for signal in [signal_hook::consts::SIGINT, signal_hook::consts::SIGTERM] {
        signal_hook::flag::register(signal, interrupt.clone()).map_err(|e| {
            fabricar::Error::Configuration(format!("cannot register signal handler: {e}"))
        })?;
    }

    let mut collaborators = Collaborators {
        compiler: &compiler,
        coverage: &mut coverage,
        triage: &mut triage,
    };
    let stats = fuzzer.run(&config, &mut collaborators)?;
    tracing::info!(
        attempts = stats.attempts,
        valid = stats.valid,
        crashes = stats.crashes,
        uncompilable = stats.uncompilable,
        best = %stats.best.pretty(),
        "campaign finished"
    );
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(%err, "fatal configuration error");
            ExitCode::FAILURE
        }
    }
}
