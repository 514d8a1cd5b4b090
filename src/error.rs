//! Error types for fabricar
//!
//! This module defines the error types used throughout the library.
//!
//! Per-iteration compile/run/triage failures are never surfaced through
//! this type; the feedback loop classifies them into the corpus instead.
//! `Error` covers configuration problems, model loading, and operations
//! that legitimately abort an attempt (e.g. an unresolvable operand type
//! during generation, which discards the current driver).

use thiserror::Error;

/// Result type alias for fabricar operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during fabricar operations
#[derive(Error, Debug)]
pub enum Error {
    /// API model construction or loading error
    #[error("model error: {0}")]
    Model(String),

    /// Driver generation error (e.g. unresolvable operand type)
    #[error("generation error: {0}")]
    Generation(String),

    /// Driver mutation error
    #[error("mutation error: {0}")]
    Mutation(String),

    /// Compiler collaborator invocation error
    #[error("compilation error: {0}")]
    Compilation(String),

    /// Execution / coverage collaborator error
    #[error("execution error: {0}")]
    Execution(String),

    /// Crash triage collaborator error
    #[error("triage error: {0}")]
    Triage(String),

    /// Function-complexity file parse error
    #[error("complexity file error: {0}")]
    Complexity(String),

    /// Execution timeout
    #[error("execution timeout after {0}ms")]
    Timeout(u64),

    /// Configuration error (fatal before the loop starts)
    #[error("configuration error: {0}")]
    Configuration(String),

    /// I/O error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
