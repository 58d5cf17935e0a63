//! Time-windowed correlation across one endpoint's recent events.
//!
//! Each pattern condition is an existential test over the window: does at
//! least one event in the window satisfy it? The per-condition booleans are
//! then combined by the rule's logic, exactly as in stateless evaluation.
//! Evidence on a match is the entire window slice, preserving the
//! surrounding context, not only the events that satisfied conditions.

pub mod sequence;

pub use sequence::find_chains;

use tracing::debug;

use crate::evaluator::evaluate_condition;
use crate::event::Alert;
use crate::retention::RetentionStore;
use crate::rules::types::{CorrelationRule, LogicOp, RuleSet};

/// Run every active correlation rule against one endpoint's windows.
pub fn find_correlations(
    store: &RetentionStore,
    endpoint_id: &str,
    set: &RuleSet<CorrelationRule>,
) -> Vec<Alert> {
    let mut alerts = Vec::new();

    for rule in &set.rules {
        let window = store.recent(endpoint_id, rule.window_seconds);
        if window.is_empty() {
            continue;
        }

        let mut matched = rule
            .pattern
            .iter()
            .map(|cond| window.iter().any(|event| evaluate_condition(cond, event)));

        let fired = match rule.logic {
            LogicOp::And => matched.all(|m| m),
            LogicOp::Or => matched.any(|m| m),
            // Sequence logic belongs to chain rules; never fires here.
            _ => false,
        };

        if fired {
            debug!(rule_id = %rule.id, endpoint = %endpoint_id, "correlation rule fired");
            let newest = window
                .iter()
                .map(|e| e.timestamp)
                .max()
                .unwrap_or_else(chrono::Utc::now);
            alerts.push(Alert {
                rule_id: rule.id.clone(),
                rule_name: None,
                severity: rule.severity,
                description: rule.description.clone(),
                evidence: window,
                timestamp: newest,
            });
        }
    }

    alerts
}
