// src/error.rs

//! Error types for formula loading, option validation and plan resolution
//!
//! The first four variants are the resolution failures a scripting caller
//! needs to tell apart; each maps to its own process exit code.

use thiserror::Error;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A requested option is neither declared nor a deprecated alias
    #[error("Unknown option '{0}'")]
    UnknownOption(String),

    /// Two requested options (or an option and the platform) cannot coexist
    #[error("Conflicting options '{first}' and '{second}': {reason}")]
    ConflictingOptions {
        first: String,
        second: String,
        reason: String,
    },

    /// A rule predicate or effect could not be computed
    #[error("Rule '{rule}' failed to evaluate: {reason}")]
    RuleEvaluation { rule: String, reason: String },

    /// No build path exists for the requested platform
    #[error("Unsupported platform: {0}")]
    UnsupportedPlatform(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("I/O error: {0}")]
    IoError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// A resolver left its idle state and cannot be driven again
    #[error("Resolver already {0}; create a new resolver for another resolution")]
    ResolverReused(String),

    #[error("Step '{step}' failed: {reason}")]
    StepFailed { step: String, reason: String },
}

impl Error {
    /// Short category name, stable across releases
    pub fn category(&self) -> &'static str {
        match self {
            Self::UnknownOption(_) => "unknown-option",
            Self::ConflictingOptions { .. } => "conflicting-options",
            Self::RuleEvaluation { .. } => "rule-evaluation",
            Self::UnsupportedPlatform(_) => "unsupported-platform",
            Self::ParseError(_) => "parse",
            Self::IoError(_) => "io",
            Self::NotFound(_) => "not-found",
            Self::ResolverReused(_) => "resolver-reused",
            Self::StepFailed { .. } => "step-failed",
        }
    }

    /// Process exit code for this error
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::UnknownOption(_) => 2,
            Self::ConflictingOptions { .. } => 3,
            Self::RuleEvaluation { .. } => 4,
            Self::UnsupportedPlatform(_) => 5,
            _ => 1,
        }
    }

    pub(crate) fn rule(rule: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::RuleEvaluation {
            rule: rule.into(),
            reason: reason.into(),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::IoError(err.to_string())
    }
}
