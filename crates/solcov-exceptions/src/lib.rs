// SPDX-License-Identifier: AGPL-3.0

//! Coverage engine errors
//!
//! Every error here is a precondition violation over fixed inputs, so there is
//! no retryable class: callers surface them and stop the run.

use thiserror::Error;

/// Errors raised while loading artifacts, tracking execution or reporting.
#[derive(Error, Debug)]
pub enum CoverageError {
    /// A source-map entry holds a field that is not an integer
    #[error("Invalid source map entry {entry} (field {field}): {value:?}")]
    Format {
        entry: usize,
        field: usize,
        value: String,
    },

    /// The compiler combined-output could not be decoded
    #[error("Invalid combined output: {0}")]
    Json(#[from] serde_json::Error),

    /// Bytecode is not valid hex
    #[error("Invalid bytecode of {contract}: {source}")]
    Hex {
        contract: String,
        #[source]
        source: hex::FromHexError,
    },

    /// A source-map range lies outside the source text on disk
    #[error(
        "combined output of {contract} seems to be out of date: range {start}..{end} exceeds source length {len}"
    )]
    StaleArtifact {
        contract: String,
        start: usize,
        end: usize,
        len: usize,
    },

    /// Report queried with a name that was never registered
    #[error("Could not find contract {name:?}, available: {available:?}")]
    UnknownContract {
        name: String,
        available: Vec<String>,
    },

    /// Executed program counter has no instruction index
    #[error("Could not find instruction index for pc {pc} of contract {contract} with hash {code_hash}")]
    IndexMismatch {
        contract: String,
        pc: usize,
        code_hash: String,
    },

    /// A source file has no entry in the combined output
    #[error("Could not find {0:?} in the combined output")]
    MissingSource(String),

    /// Coverage fell short of the requested minimum
    #[error("Contract {name:?} has {actual:.2}% coverage (expected: {expected:.2}%)")]
    InsufficientCoverage {
        name: String,
        actual: f64,
        expected: f64,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CoverageError {
    pub fn unknown_contract<'a>(
        name: &str,
        available: impl IntoIterator<Item = &'a String>,
    ) -> Self {
        let mut available: Vec<String> = available.into_iter().cloned().collect();
        available.sort();
        Self::UnknownContract {
            name: name.to_string(),
            available,
        }
    }

    /// Short machine-readable tag for diagnostics
    pub fn code(&self) -> &'static str {
        match self {
            CoverageError::Format { .. } | CoverageError::Json(_) | CoverageError::Hex { .. } => {
                "parsing-error"
            }
            CoverageError::StaleArtifact { .. } => "stale-artifact",
            CoverageError::UnknownContract { .. } => "unknown-contract",
            CoverageError::IndexMismatch { .. } => "index-mismatch",
            CoverageError::MissingSource(_) => "missing-source",
            CoverageError::InsufficientCoverage { .. } => "insufficient-coverage",
            CoverageError::Io(_) => "io-error",
        }
    }
}

/// Result type for coverage operations
pub type CoverageResult<T> = Result<T, CoverageError>;
