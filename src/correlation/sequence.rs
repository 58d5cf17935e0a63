//! Ordered-sequence matching across the global event stream.
//!
//! A chain rule's pattern must be satisfied by distinct events in
//! non-decreasing time order, modeling a multi-step attack that may span
//! endpoints. The matcher is a greedy single forward pass: each pattern slot
//! consumes the first unconsumed event that satisfies it, and a consumed
//! event is unavailable to later slots. There is no backtracking — an
//! assignment that only succeeds under a different slot-to-event mapping is
//! not discovered. This under-matching is a known, deliberately preserved
//! limitation.
//!
//! A rule with an empty pattern never fires. Zero slots would otherwise be
//! satisfied vacuously, raising a zero-evidence alert on every pass.

use tracing::debug;

use crate::evaluator::evaluate_condition;
use crate::event::Alert;
use crate::retention::RetentionStore;
use crate::rules::types::{ChainRule, RuleSet};

/// Run every active chain rule against the globally time-ordered stream.
///
/// On a match, the alert's evidence holds exactly the consumed events, in
/// pattern order.
pub fn find_chains(store: &RetentionStore, set: &RuleSet<ChainRule>) -> Vec<Alert> {
    let mut alerts = Vec::new();

    for rule in &set.rules {
        if rule.pattern.is_empty() {
            continue;
        }
        let events = store.recent_all(rule.window_seconds);
        if events.is_empty() {
            continue;
        }

        let mut matched = Vec::with_capacity(rule.pattern.len());
        let mut cursor = 0usize;

        'pattern: for cond in &rule.pattern {
            while cursor < events.len() {
                let event = &events[cursor];
                cursor += 1;
                if evaluate_condition(cond, event) {
                    matched.push(event.clone());
                    continue 'pattern;
                }
            }
            // Cursor exhausted before this slot was filled: chain broken.
            break;
        }

        if matched.len() == rule.pattern.len() {
            debug!(rule_id = %rule.id, steps = matched.len(), "chain rule fired");
            let newest = matched
                .last()
                .map(|e| e.timestamp)
                .unwrap_or_else(chrono::Utc::now);
            alerts.push(Alert {
                rule_id: rule.id.clone(),
                rule_name: None,
                severity: rule.severity,
                description: rule.description.clone(),
                evidence: matched,
                timestamp: newest,
            });
        }
    }

    alerts
}
