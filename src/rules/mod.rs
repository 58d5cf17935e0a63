//! Rule documents: typed representation, structural validation, and sources.

pub mod source;
pub mod types;
pub mod validator;

pub use source::{FileRuleSource, RuleSource, StaticRuleSource};
pub use types::{
    ChainRule, Condition, CorrelationRule, Exception, LogicOp, Operator, RuleSet, StatelessRule,
};
pub use validator::{validate, ValidationIssue};

use std::fmt;

use serde::{Deserialize, Serialize};

/// The three rule-set types the engine maintains, each independently
/// validated, activated, and hot-reloaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleKind {
    /// Per-event rules evaluated against a single telemetry record.
    Stateless,
    /// Time-windowed AND/OR rules over one endpoint's recent events.
    Correlation,
    /// Ordered-sequence rules over the global time-ordered stream.
    Chain,
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RuleKind::Stateless => "stateless",
            RuleKind::Correlation => "correlation",
            RuleKind::Chain => "chain",
        };
        f.write_str(s)
    }
}
