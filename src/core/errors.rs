//! SG-prefixed error types with structured error codes.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Shared `Result` alias for the project.
pub type Result<T> = std::result::Result<T, GuardError>;

/// Top-level error type for suite_guard.
///
/// A failing assertion is not an error: it is recorded in the result log and
/// reported as `Ok(false)`. Only failure-reaction policies and harness misuse
/// surface here.
#[derive(Debug, Error)]
pub enum GuardError {
    #[error(
        "[SG-1001] test {failed_test} ({description}) failed; {}",
        abort_point(.next_test)
    )]
    SuiteAbort {
        failed_test: usize,
        description: String,
        next_test: Option<usize>,
    },

    #[error("[SG-1002] failure action error: {details}")]
    ActionFailed { details: String },

    #[error("[SG-2001] plan already declared ({existing})")]
    PlanAlreadySet { existing: String },

    #[error("[SG-2002] suite already finished; no further assertions may run")]
    SuiteFinished,

    #[error("[SG-3001] invalid configuration: {details}")]
    InvalidConfig { details: String },

    #[error("[SG-3002] missing configuration file: {path}")]
    MissingConfig { path: PathBuf },

    #[error("[SG-3003] configuration parse failure in {context}: {details}")]
    ConfigParse {
        context: &'static str,
        details: String,
    },

    #[error("[SG-3101] script parse failure at line {line}: {details}")]
    ScriptParse { line: usize, details: String },

    #[error("[SG-4001] serialization failure in {context}: {details}")]
    Serialization {
        context: &'static str,
        details: String,
    },

    #[error("[SG-4002] IO failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[allow(clippy::ref_option)]
fn abort_point(next_test: &Option<usize>) -> String {
    next_test.map_or_else(
        || "die-on-fail stopped the suite at end of run".to_string(),
        |next| format!("die-on-fail stopped the suite before test {next} could run"),
    )
}

impl GuardError {
    /// Stable machine-parseable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::SuiteAbort { .. } => "SG-1001",
            Self::ActionFailed { .. } => "SG-1002",
            Self::PlanAlreadySet { .. } => "SG-2001",
            Self::SuiteFinished => "SG-2002",
            Self::InvalidConfig { .. } => "SG-3001",
            Self::MissingConfig { .. } => "SG-3002",
            Self::ConfigParse { .. } => "SG-3003",
            Self::ScriptParse { .. } => "SG-3101",
            Self::Serialization { .. } => "SG-4001",
            Self::Io { .. } => "SG-4002",
        }
    }

    /// Whether this error is a deliberate suite stop raised by a failure
    /// action, as opposed to harness misuse or an environment problem.
    #[must_use]
    pub const fn is_abort(&self) -> bool {
        matches!(self, Self::SuiteAbort { .. } | Self::ActionFailed { .. })
    }

    /// Convenience constructor for IO errors with a known path.
    #[must_use]
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}

impl From<serde_json::Error> for GuardError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization {
            context: "serde_json",
            details: value.to_string(),
        }
    }
}

impl From<toml::de::Error> for GuardError {
    fn from(value: toml::de::Error) -> Self {
        Self::ConfigParse {
            context: "toml",
            details: value.to_string(),
        }
    }
}

impl From<toml::ser::Error> for GuardError {
    fn from(value: toml::ser::Error) -> Self {
        Self::Serialization {
            context: "toml",
            details: value.to_string(),
        }
    }
}
