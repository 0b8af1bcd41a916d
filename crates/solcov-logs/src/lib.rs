// SPDX-License-Identifier: AGPL-3.0

//! Logging and console diagnostics

use colored::*;
use once_cell::sync::{Lazy, OnceCell};
use std::collections::HashSet;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

/// Warnings base URL
pub const WARNINGS_BASE_URL: &str = "https://github.com/solcov/solcov/wiki/warnings";

/// Diagnostic codes, each with a page under [`WARNINGS_BASE_URL`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ParsingError,
    StaleArtifact,
    LibraryPlaceholder,
    UnknownContract,
    IndexMismatch,
    MissingSource,
    InsufficientCoverage,
}

const ALL_CODES: [ErrorCode; 7] = [
    ErrorCode::ParsingError,
    ErrorCode::StaleArtifact,
    ErrorCode::LibraryPlaceholder,
    ErrorCode::UnknownContract,
    ErrorCode::IndexMismatch,
    ErrorCode::MissingSource,
    ErrorCode::InsufficientCoverage,
];

impl ErrorCode {
    pub fn code(&self) -> &'static str {
        match self {
            ErrorCode::ParsingError => "parsing-error",
            ErrorCode::StaleArtifact => "stale-artifact",
            ErrorCode::LibraryPlaceholder => "library-placeholder",
            ErrorCode::UnknownContract => "unknown-contract",
            ErrorCode::IndexMismatch => "index-mismatch",
            ErrorCode::MissingSource => "missing-source",
            ErrorCode::InsufficientCoverage => "insufficient-coverage",
        }
    }

    /// Inverse of [`ErrorCode::code`]
    pub fn from_code(code: &str) -> Option<Self> {
        ALL_CODES.into_iter().find(|c| c.code() == code)
    }

    pub fn url(&self) -> String {
        format!("{}#{}", WARNINGS_BASE_URL, self.code())
    }
}

static UNIQUE_MESSAGES: Lazy<Mutex<HashSet<String>>> = Lazy::new(|| Mutex::new(HashSet::new()));

static SUBSCRIBER: OnceCell<()> = OnceCell::new();

/// Default filter directive for a `-v` count
pub fn default_directive(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

/// Install the global `tracing` subscriber.
///
/// `RUST_LOG` takes precedence over `verbosity`. Calling this more than once
/// keeps the first subscriber.
pub fn init_tracing(verbosity: u8) {
    SUBSCRIBER.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(default_directive(verbosity)));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .try_init();
    });
}

fn is_logged(message: &str) -> bool {
    UNIQUE_MESSAGES
        .lock()
        .map(|messages| messages.contains(message))
        .unwrap_or(false)
}

fn mark_logged(message: &str) {
    if let Ok(mut messages) = UNIQUE_MESSAGES.lock() {
        messages.insert(message.to_string());
    }
}

/// Returns true when `text` should be printed, recording it if duplicates are not allowed
fn should_print(text: &str, allow_duplicate: bool) -> bool {
    if allow_duplicate {
        return true;
    }
    if is_logged(text) {
        return false;
    }
    mark_logged(text);
    true
}

/// Log a warning message
pub fn warn(text: &str, allow_duplicate: bool) {
    if should_print(text, allow_duplicate) {
        eprintln!("{}", text.yellow());
    }
}

/// Log an error message
pub fn error(text: &str, allow_duplicate: bool) {
    if should_print(text, allow_duplicate) {
        eprintln!("{}", text.red());
    }
}

fn with_code(error_code: ErrorCode, msg: &str) -> String {
    format!("{}\n(see {})", msg, error_code.url())
}

/// Log a warning with an error code
pub fn warn_code(error_code: ErrorCode, msg: &str, allow_duplicate: bool) {
    warn(&with_code(error_code, msg), allow_duplicate);
}

/// Log an error with an error code
pub fn error_code(error_code: ErrorCode, msg: &str, allow_duplicate: bool) {
    error(&with_code(error_code, msg), allow_duplicate);
}
