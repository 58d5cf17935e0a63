//! Structural validation of rule documents before activation.
//!
//! Validation is total: it walks every document and every constraint,
//! never short-circuits, and never panics on malformed input. Each violated
//! constraint contributes one ordinal-addressed issue, so a single bad rule
//! does not mask diagnostics for the rest of the batch.

use std::collections::HashSet;
use std::fmt;

use serde_json::Value;

use crate::event::Severity;
use crate::rules::types::{LogicOp, Operator};
use crate::rules::RuleKind;

/// One violated constraint, addressed by the document's position in the batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    pub index: usize,
    pub message: String,
}

impl ValidationIssue {
    fn new(index: usize, message: impl Into<String>) -> Self {
        Self {
            index,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rule at index {}: {}", self.index, self.message)
    }
}

/// Validate a batch of raw rule documents of the given kind.
///
/// Returns an empty list iff every document could be activated.
pub fn validate(kind: RuleKind, docs: &[Value]) -> Vec<ValidationIssue> {
    match kind {
        RuleKind::Stateless => validate_stateless(docs),
        RuleKind::Correlation | RuleKind::Chain => validate_correlation(docs),
    }
}

/// Validate stateless rule documents: id, description, a well-formed
/// condition list, AND/OR logic, and at least one target OS.
pub fn validate_stateless(docs: &[Value]) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    let mut seen_ids: HashSet<String> = HashSet::new();

    for (idx, doc) in docs.iter().enumerate() {
        let obj = match doc.as_object() {
            Some(obj) => obj,
            None => {
                issues.push(ValidationIssue::new(idx, "document is not an object"));
                continue;
            }
        };

        check_identity(idx, obj, &mut seen_ids, &mut issues);

        match obj.get("conditions").and_then(Value::as_array) {
            Some(conditions) if !conditions.is_empty() => {
                for (cidx, cond) in conditions.iter().enumerate() {
                    check_condition(idx, cidx, "conditions", cond, &mut issues);
                }
            }
            Some(_) => issues.push(ValidationIssue::new(idx, "'conditions' must be non-empty")),
            None => issues.push(ValidationIssue::new(
                idx,
                "missing 'conditions' list of condition objects",
            )),
        }

        check_logic(idx, obj, &[LogicOp::And, LogicOp::Or], &mut issues);
        check_severity(idx, obj, &mut issues);

        match obj.get("target_os").and_then(Value::as_array) {
            Some(oses) if !oses.is_empty() => {
                if oses.iter().any(|v| !v.is_string()) {
                    issues.push(ValidationIssue::new(
                        idx,
                        "'target_os' entries must be strings",
                    ));
                }
            }
            Some(_) => issues.push(ValidationIssue::new(
                idx,
                "'target_os' must declare at least one OS",
            )),
            None => issues.push(ValidationIssue::new(idx, "missing 'target_os' list")),
        }
    }

    issues
}

/// Validate correlation or chain rule documents: id, description, a
/// list-typed pattern, recognized logic, and a positive integer window.
pub fn validate_correlation(docs: &[Value]) -> Vec<ValidationIssue> {
    const ALLOWED_LOGIC: &[LogicOp] = &[LogicOp::And, LogicOp::Or, LogicOp::Sequence];

    let mut issues = Vec::new();
    let mut seen_ids: HashSet<String> = HashSet::new();

    for (idx, doc) in docs.iter().enumerate() {
        let obj = match doc.as_object() {
            Some(obj) => obj,
            None => {
                issues.push(ValidationIssue::new(idx, "document is not an object"));
                continue;
            }
        };

        check_identity(idx, obj, &mut seen_ids, &mut issues);

        match obj.get("pattern") {
            Some(Value::Array(pattern)) => {
                for (cidx, cond) in pattern.iter().enumerate() {
                    check_condition(idx, cidx, "pattern", cond, &mut issues);
                }
            }
            Some(_) => issues.push(ValidationIssue::new(idx, "'pattern' must be a list")),
            None => issues.push(ValidationIssue::new(idx, "missing 'pattern' list")),
        }

        check_logic(idx, obj, ALLOWED_LOGIC, &mut issues);
        check_severity(idx, obj, &mut issues);

        match obj.get("window_seconds") {
            Some(v) => match v.as_u64() {
                Some(w) if w > 0 => {}
                _ => issues.push(ValidationIssue::new(
                    idx,
                    "'window_seconds' must be a positive integer",
                )),
            },
            None => issues.push(ValidationIssue::new(
                idx,
                "missing 'window_seconds' integer",
            )),
        }
    }

    issues
}

fn check_identity(
    idx: usize,
    obj: &serde_json::Map<String, Value>,
    seen_ids: &mut HashSet<String>,
    issues: &mut Vec<ValidationIssue>,
) {
    match non_empty_str(obj, "id") {
        Some(id) => {
            if !seen_ids.insert(id.to_string()) {
                issues.push(ValidationIssue::new(idx, format!("duplicate id '{id}'")));
            }
        }
        None => issues.push(ValidationIssue::new(idx, "missing 'id'")),
    }
    if non_empty_str(obj, "description").is_none() {
        issues.push(ValidationIssue::new(idx, "missing 'description'"));
    }
}

fn check_condition(
    idx: usize,
    cidx: usize,
    list_name: &str,
    cond: &Value,
    issues: &mut Vec<ValidationIssue>,
) {
    let obj = match cond.as_object() {
        Some(obj) => obj,
        None => {
            issues.push(ValidationIssue::new(
                idx,
                format!("{list_name}[{cidx}] is not an object"),
            ));
            return;
        }
    };
    if non_empty_str(obj, "field").is_none() {
        issues.push(ValidationIssue::new(
            idx,
            format!("{list_name}[{cidx}] missing 'field'"),
        ));
    }
    // Operator is optional (defaults to equality), but must be recognized.
    if let Some(op) = obj.get("operator") {
        let valid = op.as_str().map(Operator::parse);
        if !matches!(valid, Some(Some(_))) {
            issues.push(ValidationIssue::new(
                idx,
                format!("{list_name}[{cidx}] has unrecognized 'operator' {op}"),
            ));
        }
    }
    if !obj.contains_key("value") {
        issues.push(ValidationIssue::new(
            idx,
            format!("{list_name}[{cidx}] missing 'value'"),
        ));
    }
}

fn check_logic(
    idx: usize,
    obj: &serde_json::Map<String, Value>,
    allowed: &[LogicOp],
    issues: &mut Vec<ValidationIssue>,
) {
    if let Some(logic) = obj.get("logic") {
        let parsed = logic.as_str().and_then(LogicOp::parse);
        match parsed {
            Some(op) if allowed.contains(&op) => {}
            _ => {
                let names: Vec<&str> = allowed
                    .iter()
                    .map(|op| match op {
                        LogicOp::And => "AND",
                        LogicOp::Or => "OR",
                        LogicOp::Sequence => "SEQUENCE",
                    })
                    .collect();
                issues.push(ValidationIssue::new(
                    idx,
                    format!("invalid 'logic' (must be {})", names.join(", ")),
                ));
            }
        }
    }
}

fn check_severity(
    idx: usize,
    obj: &serde_json::Map<String, Value>,
    issues: &mut Vec<ValidationIssue>,
) {
    if let Some(sev) = obj.get("severity") {
        let valid = sev.as_str().and_then(Severity::parse);
        if valid.is_none() {
            issues.push(ValidationIssue::new(
                idx,
                format!("unrecognized 'severity' {sev}"),
            ));
        }
    }
}

fn non_empty_str<'a>(obj: &'a serde_json::Map<String, Value>, key: &str) -> Option<&'a str> {
    obj.get(key).and_then(Value::as_str).filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn good_stateless() -> Value {
        json!({
            "id": "high-cpu",
            "name": "High CPU",
            "description": "CPU above threshold",
            "conditions": [{"field": "cpu_percent", "operator": ">", "value": 90}],
            "logic": "AND",
            "target_os": ["linux"],
            "severity": "medium"
        })
    }

    fn good_correlation() -> Value {
        json!({
            "id": "brute-force",
            "description": "Login failures in a window",
            "pattern": [{"field": "event_type", "value": "login_fail"}],
            "logic": "OR",
            "window_seconds": 60
        })
    }

    #[test]
    fn valid_batch_has_no_issues() {
        assert!(validate(RuleKind::Stateless, &[good_stateless()]).is_empty());
        assert!(validate(RuleKind::Correlation, &[good_correlation()]).is_empty());
        assert!(validate(RuleKind::Chain, &[good_correlation()]).is_empty());
    }

    #[test]
    fn non_object_document_is_one_issue() {
        let issues = validate_stateless(&[json!("not a rule")]);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].index, 0);
        assert!(issues[0].message.contains("not an object"));
    }

    #[test]
    fn missing_identity_fields_reported() {
        let issues = validate_stateless(&[json!({
            "conditions": [{"field": "cmd", "operator": "contains", "value": "curl"}],
            "target_os": ["linux"]
        })]);
        let messages: Vec<&str> = issues.iter().map(|i| i.message.as_str()).collect();
        assert!(messages.contains(&"missing 'id'"));
        assert!(messages.contains(&"missing 'description'"));
    }

    #[test]
    fn empty_id_counts_as_missing() {
        let mut doc = good_stateless();
        doc["id"] = json!("");
        let issues = validate_stateless(&[doc]);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].message, "missing 'id'");
    }

    #[test]
    fn duplicate_ids_reported_at_second_occurrence() {
        let issues = validate_stateless(&[good_stateless(), good_stateless()]);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].index, 1);
        assert!(issues[0].message.contains("duplicate id"));
    }

    #[test]
    fn unrecognized_operator_rejected() {
        let mut doc = good_stateless();
        doc["conditions"] = json!([{"field": "cmd", "operator": "matches", "value": "x"}]);
        let issues = validate_stateless(&[doc]);
        assert_eq!(issues.len(), 1);
        assert!(issues[0].message.contains("unrecognized 'operator'"));
    }

    #[test]
    fn stateless_logic_must_be_and_or() {
        let mut doc = good_stateless();
        doc["logic"] = json!("SEQUENCE");
        let issues = validate_stateless(&[doc]);
        assert_eq!(issues.len(), 1);
        assert!(issues[0].message.contains("invalid 'logic'"));
    }

    #[test]
    fn empty_conditions_rejected() {
        let mut doc = good_stateless();
        doc["conditions"] = json!([]);
        let issues = validate_stateless(&[doc]);
        assert_eq!(issues.len(), 1);
        assert!(issues[0].message.contains("non-empty"));
    }

    #[test]
    fn target_os_must_be_present_and_non_empty() {
        let mut missing = good_stateless();
        missing.as_object_mut().unwrap().remove("target_os");
        let mut empty = good_stateless();
        empty["id"] = json!("other-id");
        empty["target_os"] = json!([]);
        let issues = validate_stateless(&[missing, empty]);
        assert_eq!(issues.len(), 2);
        assert_eq!(issues[0].index, 0);
        assert_eq!(issues[1].index, 1);
    }

    #[test]
    fn window_seconds_must_be_positive_integer() {
        let mut zero = good_correlation();
        zero["window_seconds"] = json!(0);
        let mut fractional = good_correlation();
        fractional["id"] = json!("r2");
        fractional["window_seconds"] = json!(1.5);
        let mut missing = good_correlation();
        missing["id"] = json!("r3");
        missing.as_object_mut().unwrap().remove("window_seconds");

        let issues = validate_correlation(&[zero, fractional, missing]);
        assert_eq!(issues.len(), 3);
        assert!(issues[0].message.contains("positive integer"));
        assert!(issues[2].message.contains("missing 'window_seconds'"));
    }

    #[test]
    fn pattern_must_be_a_list() {
        let mut doc = good_correlation();
        doc["pattern"] = json!("login_fail");
        let issues = validate_correlation(&[doc]);
        assert_eq!(issues.len(), 1);
        assert!(issues[0].message.contains("must be a list"));
    }

    #[test]
    fn chain_logic_accepts_sequence() {
        let mut doc = good_correlation();
        doc["logic"] = json!("SEQUENCE");
        assert!(validate(RuleKind::Chain, &[doc]).is_empty());
    }

    #[test]
    fn one_bad_document_does_not_mask_others() {
        let bad = json!({"conditions": "nope"});
        let issues = validate_stateless(&[good_stateless(), bad, good_stateless()]);
        // All issues point at index 1; index 2 only reports its duplicate id.
        assert!(issues.iter().any(|i| i.index == 1));
        assert!(issues
            .iter()
            .filter(|i| i.index == 2)
            .all(|i| i.message.contains("duplicate id")));
    }

    #[test]
    fn validation_never_short_circuits() {
        let docs = vec![json!(1), json!(2), json!(3)];
        let issues = validate_stateless(&docs);
        assert_eq!(issues.len(), 3);
        let indices: Vec<usize> = issues.iter().map(|i| i.index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
    }
}
