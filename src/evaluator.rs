//! Stateless per-event rule evaluation.
//!
//! Exceptions are checked before conditions; a matching exception suppresses
//! the rule unconditionally. Every condition is evaluated independently and
//! contained: a missing field, a type mismatch, or a bad regex yields `false`
//! for that condition, never an error, so one bad condition cannot suppress a
//! whole rule pass.

use std::cmp::Ordering;

use serde_json::Value;
use tracing::debug;

use crate::event::{Alert, TelemetryEvent};
use crate::rules::types::{Condition, Exception, LogicOp, Operator, RuleSet, StatelessRule};

/// Evaluate one condition against one event. Total: never panics, never
/// returns an error.
pub(crate) fn evaluate_condition(cond: &Condition, event: &TelemetryEvent) -> bool {
    let actual = match event.field(&cond.field) {
        Some(v) => v,
        None => return false,
    };
    let expected = &cond.value;

    match cond.operator {
        Operator::Gt => compare(&actual, expected) == Some(Ordering::Greater),
        Operator::Lt => compare(&actual, expected) == Some(Ordering::Less),
        Operator::Ge => matches!(
            compare(&actual, expected),
            Some(Ordering::Greater) | Some(Ordering::Equal)
        ),
        Operator::Le => matches!(
            compare(&actual, expected),
            Some(Ordering::Less) | Some(Ordering::Equal)
        ),
        Operator::Eq => values_equal(&actual, expected),
        Operator::Ne => !values_equal(&actual, expected),
        Operator::Contains => contains(&actual, expected),
        Operator::StartsWith => as_text(&actual).starts_with(&as_text(expected)),
        Operator::EndsWith => as_text(&actual).ends_with(&as_text(expected)),
        Operator::Regex => regex_search(&actual, expected),
    }
}

/// Native ordering between two JSON values: numbers numerically, strings
/// lexicographically. Anything else is a type mismatch (`None` → condition
/// false).
fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.as_str().cmp(y.as_str())),
        _ => None,
    }
}

/// Equality that treats 90 and 90.0 as equal; everything else is plain
/// JSON value equality.
fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => a == b,
        },
        _ => a == b,
    }
}

/// Membership of the expected value inside the field value: substring for
/// strings, element membership for arrays.
fn contains(actual: &Value, expected: &Value) -> bool {
    match (actual, expected) {
        (Value::String(haystack), Value::String(needle)) => haystack.contains(needle.as_str()),
        (Value::Array(items), needle) => items.iter().any(|item| values_equal(item, needle)),
        _ => false,
    }
}

/// Coerce a JSON value to text for the string-prefix/suffix/regex operators.
fn as_text(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Unanchored regex search, expected value as pattern. A pattern that fails
/// to compile is a contained evaluation error: the condition is false.
fn regex_search(actual: &Value, expected: &Value) -> bool {
    let pattern = match expected {
        Value::String(p) => p,
        _ => return false,
    };
    match regex::Regex::new(pattern) {
        Ok(re) => re.is_match(&as_text(actual)),
        Err(e) => {
            debug!(pattern = %pattern, "regex condition failed to compile: {e}");
            false
        }
    }
}

fn matches_exception(ex: &Exception, event: &TelemetryEvent) -> bool {
    match event.field(&ex.field) {
        Some(actual) => values_equal(&actual, &ex.value),
        None => false,
    }
}

/// Evaluate a stateless rule against one event.
///
/// Any matching exception suppresses the rule before conditions run. AND
/// requires every condition true, OR requires at least one; any other logic
/// is fail-closed.
pub fn evaluate(event: &TelemetryEvent, rule: &StatelessRule) -> bool {
    if rule.exceptions.iter().any(|ex| matches_exception(ex, event)) {
        return false;
    }

    let mut results = rule
        .conditions
        .iter()
        .map(|cond| evaluate_condition(cond, event));

    match rule.logic {
        LogicOp::And => results.all(|r| r),
        LogicOp::Or => results.any(|r| r),
        _ => false,
    }
}

/// Run every rule in the active set against one event.
///
/// Rules whose `target_os` does not include the event's OS are skipped
/// before evaluation. Each firing rule produces one [`Alert`] carrying the
/// full triggering event as evidence. No side effects beyond the returned
/// alerts; forwarding and persistence are the caller's responsibility.
pub fn apply_rules(
    event: &TelemetryEvent,
    set: &RuleSet<StatelessRule>,
    os_type: &str,
) -> Vec<Alert> {
    let mut alerts = Vec::new();
    for rule in &set.rules {
        if !rule.target_os.iter().any(|os| os == os_type) {
            continue;
        }
        if evaluate(event, rule) {
            debug!(rule_id = %rule.id, endpoint = %event.endpoint_id, "stateless rule fired");
            alerts.push(Alert {
                rule_id: rule.id.clone(),
                rule_name: Some(rule.name.clone()),
                severity: rule.severity,
                description: rule.description.clone(),
                evidence: vec![event.clone()],
                timestamp: event.timestamp,
            });
        }
    }
    alerts
}
