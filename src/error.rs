//! Error types for the detection engine.

use thiserror::Error;

use crate::rules::validator::ValidationIssue;
use crate::rules::RuleKind;

#[derive(Debug, Error)]
pub enum DetectError {
    /// A candidate rule batch failed structural validation. The previously
    /// active set stays in force; `issues` lists every violated constraint.
    #[error("{kind} rules rejected: {} validation issue(s)", issues.len())]
    RulesRejected {
        kind: RuleKind,
        issues: Vec<ValidationIssue>,
    },

    /// The rule source was missing or unreadable at reload time.
    #[error("rule source '{source_name}' unavailable: {reason}")]
    SourceUnavailable {
        source_name: String,
        reason: String,
    },

    /// The caller-supplied alert collector refused an alert.
    #[error("alert sink error: {0}")]
    AlertSink(String),

    /// Configuration file could not be read or parsed.
    #[error("config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, DetectError>;
