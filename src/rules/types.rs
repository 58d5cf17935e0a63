//! Typed rule definitions deserialized from JSON rule documents.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::event::Severity;

/// The closed set of condition operators. Free-form expressions are
/// deliberately not supported: every rule is statically analyzable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operator {
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = "==")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
    #[serde(rename = "contains")]
    Contains,
    #[serde(rename = "startswith")]
    StartsWith,
    #[serde(rename = "endswith")]
    EndsWith,
    #[serde(rename = "regex")]
    Regex,
}

impl Operator {
    /// Parse the wire form used in rule documents.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            ">" => Some(Operator::Gt),
            "<" => Some(Operator::Lt),
            ">=" => Some(Operator::Ge),
            "<=" => Some(Operator::Le),
            "==" => Some(Operator::Eq),
            "!=" => Some(Operator::Ne),
            "contains" => Some(Operator::Contains),
            "startswith" => Some(Operator::StartsWith),
            "endswith" => Some(Operator::EndsWith),
            "regex" => Some(Operator::Regex),
            _ => None,
        }
    }
}

/// How per-condition booleans combine. Anything outside the set a rule type
/// supports is fail-closed at evaluation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogicOp {
    And,
    Or,
    Sequence,
}

impl LogicOp {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "AND" => Some(LogicOp::And),
            "OR" => Some(LogicOp::Or),
            "SEQUENCE" => Some(LogicOp::Sequence),
            _ => None,
        }
    }
}

/// A pure predicate over one event field.
///
/// Correlation patterns in the wild carry bare `{field, value}` pairs, so
/// the operator defaults to equality when absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub field: String,
    #[serde(default = "default_operator")]
    pub operator: Operator,
    pub value: Value,
}

fn default_operator() -> Operator {
    Operator::Eq
}

/// Unconditional bypass: if the event field equals `value`, the owning rule
/// is suppressed before any condition runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exception {
    pub field: String,
    pub value: Value,
}

/// A rule evaluated against one event in isolation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatelessRule {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub description: String,
    pub conditions: Vec<Condition>,
    #[serde(default = "default_and")]
    pub logic: LogicOp,
    #[serde(default)]
    pub exceptions: Vec<Exception>,
    pub target_os: Vec<String>,
    #[serde(default = "default_low")]
    pub severity: Severity,
    #[serde(default = "default_actions")]
    pub actions: Vec<String>,
}

/// A time-windowed rule over one endpoint's recent events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationRule {
    pub id: String,
    pub description: String,
    pub pattern: Vec<Condition>,
    #[serde(default = "default_and")]
    pub logic: LogicOp,
    pub window_seconds: u64,
    #[serde(default = "default_high")]
    pub severity: Severity,
}

/// An ordered multi-endpoint attack chain: every pattern slot must be
/// satisfied by a distinct event, in non-decreasing time order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainRule {
    pub id: String,
    pub description: String,
    pub pattern: Vec<Condition>,
    #[serde(default = "default_sequence")]
    pub logic: LogicOp,
    pub window_seconds: u64,
    #[serde(default = "default_critical")]
    pub severity: Severity,
}

fn default_and() -> LogicOp {
    LogicOp::And
}

fn default_sequence() -> LogicOp {
    LogicOp::Sequence
}

fn default_low() -> Severity {
    Severity::Low
}

fn default_high() -> Severity {
    Severity::High
}

fn default_critical() -> Severity {
    Severity::Critical
}

fn default_actions() -> Vec<String> {
    vec!["generate_alert".to_string()]
}

/// A versioned, immutable-once-active batch of rules of one kind.
///
/// Replaced wholesale behind an `Arc` on reload, never patched in place.
#[derive(Debug, Clone)]
pub struct RuleSet<R> {
    /// Monotonic activation counter; bumped on every successful reload.
    pub generation: u64,
    pub rules: Vec<R>,
}

impl<R> Default for RuleSet<R> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<R> RuleSet<R> {
    pub fn empty() -> Self {
        Self {
            generation: 0,
            rules: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
