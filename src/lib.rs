//! Fabricar - Coverage-Guided Unit-Test Driver Factory for C++ Libraries
//!
//! Fabricar synthesises well-typed C++ driver programs against a compiled
//! library's public API, compiles and executes each driver, measures
//! line/branch/function coverage, triages crashes, and evolves a corpus
//! of interesting drivers through havoc mutation.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        FABRICAR CORE                         │
//! ├──────────────────────────────────────────────────────────────┤
//! │  API Model  →  Generator  →  Mutator  →  Feedback Loop       │
//! │  + Types       (drivers)     (havoc)     compile/run/triage  │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use fabricar::config::FuzzConfig;
//! use fabricar::fuzzer::{Collaborators, Fuzzer};
//! use fabricar::model::load::load_model;
//! use fabricar::random::Rng;
//!
//! let (mut model, types) = load_model("model.json".as_ref())?;
//! fabricar::model::analysis::filter_model(&mut model, &types);
//! let mut fuzzer = Fuzzer::new(model, types, Rng::from_seed(42), None);
//! // wire up compiler/coverage/triage collaborators, then:
//! // fuzzer.run(&config, &mut collaborators)?;
//! # Ok::<(), fabricar::Error>(())
//! ```
//!
//! # Modules
//!
//! - [`model`] - static API model (classes, enums, executables, inheritance)
//! - [`types`] - interned type table, modifiers, assignability
//! - [`ir`] - statement IR and drivers
//! - [`generator`] - operand resolution and driver assembly
//! - [`mutator`] - havoc mutation preserving driver invariants
//! - [`selector`] - complexity-weighted function selection
//! - [`emitter`] - C++ source emission
//! - [`exec`] - compile/execute/triage collaborator interfaces
//! - [`fuzzer`] - the feedback loop, corpus, and coverage log

#![forbid(unsafe_code)]

pub mod config;
pub mod emitter;
pub mod error;
pub mod exec;
pub mod fuzzer;
pub mod generator;
pub mod ir;
pub mod model;
pub mod mutator;
pub mod random;
pub mod selector;
pub mod types;

pub use error::{Error, Result};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::FuzzConfig;
    pub use crate::emitter::{Emitter, Scaffold, TryCatch};
    pub use crate::exec::{
        CompileOutcome, Compiler, CoverageReport, CoverageRunner, CrashMemo, CrashTriager,
        ExecutionOutcome,
    };
    pub use crate::fuzzer::{Collaborators, FuzzStats, Fuzzer};
    pub use crate::generator::{assemble, AssemblySpec};
    pub use crate::ir::{Driver, Operand, Statement, StatementKind};
    pub use crate::model::{ApiModel, Executable, ModelBuilder};
    pub use crate::mutator::DriverMutator;
    pub use crate::random::Rng;
    pub use crate::selector::{ComplexitySummary, FunctionSelector, SelectionMode};
    pub use crate::types::{TypeTable, TypeWithMods};
    pub use crate::{Error, Result};
}
