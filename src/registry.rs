//! Active rule sets and validated hot reload.
//!
//! Each rule kind has two states: the ACTIVE set evaluators read, and a
//! CANDIDATE built during reload. A candidate that fails validation is
//! dropped with the full diagnostic list and the active set stays in force —
//! a broken rule file must never silently disable detection. On success the
//! candidate replaces the active set via a single `Arc` swap, so concurrent
//! readers never observe a mixed-generation set.

use std::sync::{Arc, PoisonError, RwLock};

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{error, info};

use crate::error::{DetectError, Result};
use crate::rules::source::RuleSource;
use crate::rules::types::{ChainRule, CorrelationRule, RuleSet, StatelessRule};
use crate::rules::validator::{self, ValidationIssue};
use crate::rules::RuleKind;

/// Outcome of one successful reload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReloadReport {
    pub kind: RuleKind,
    pub generation: u64,
    pub rules_loaded: usize,
}

/// Holds the active rule set per kind and performs atomic, validated swaps.
#[derive(Debug, Default)]
pub struct RuleRegistry {
    stateless: RwLock<Arc<RuleSet<StatelessRule>>>,
    correlation: RwLock<Arc<RuleSet<CorrelationRule>>>,
    chain: RwLock<Arc<RuleSet<ChainRule>>>,
}

impl RuleRegistry {
    /// A registry with empty generation-zero sets for every kind.
    pub fn new() -> Self {
        Self {
            stateless: RwLock::new(Arc::new(RuleSet::empty())),
            correlation: RwLock::new(Arc::new(RuleSet::empty())),
            chain: RwLock::new(Arc::new(RuleSet::empty())),
        }
    }

    /// The active stateless set. Cheap: clones an `Arc` under a read lock.
    pub fn active_stateless(&self) -> Arc<RuleSet<StatelessRule>> {
        Arc::clone(&self.stateless.read().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn active_correlation(&self) -> Arc<RuleSet<CorrelationRule>> {
        Arc::clone(
            &self
                .correlation
                .read()
                .unwrap_or_else(PoisonError::into_inner),
        )
    }

    pub fn active_chain(&self) -> Arc<RuleSet<ChainRule>> {
        Arc::clone(&self.chain.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Load, validate, and atomically activate one rule kind from `source`.
    ///
    /// Any failure — unreadable source, malformed JSON, or validation
    /// issues — leaves the active set untouched, which also makes a failed
    /// reload safely retryable.
    pub fn reload(&self, kind: RuleKind, source: &dyn RuleSource) -> Result<ReloadReport> {
        let docs = source.read(kind)?;

        let issues = validator::validate(kind, &docs);
        if !issues.is_empty() {
            error!(kind = %kind, source = source.name(), "rule reload rejected");
            for issue in &issues {
                error!("  - {issue}");
            }
            return Err(DetectError::RulesRejected { kind, issues });
        }

        let report = match kind {
            RuleKind::Stateless => activate(&self.stateless, kind, docs)?,
            RuleKind::Correlation => activate(&self.correlation, kind, docs)?,
            RuleKind::Chain => activate(&self.chain, kind, docs)?,
        };

        info!(
            kind = %report.kind,
            generation = report.generation,
            rules = report.rules_loaded,
            "rule set activated"
        );
        Ok(report)
    }

    /// Reload every kind from `source`. Kinds are independent: one kind's
    /// failure does not stop the others.
    pub fn reload_all(&self, source: &dyn RuleSource) -> Vec<Result<ReloadReport>> {
        [RuleKind::Stateless, RuleKind::Correlation, RuleKind::Chain]
            .into_iter()
            .map(|kind| self.reload(kind, source))
            .collect()
    }
}

/// Deserialize validated documents and swap the slot's `Arc` in one motion.
fn activate<R: DeserializeOwned>(
    slot: &RwLock<Arc<RuleSet<R>>>,
    kind: RuleKind,
    docs: Vec<Value>,
) -> Result<ReloadReport> {
    // Second line of defense: structural validation should guarantee this
    // succeeds, but a failure here must still leave the active set alone.
    let mut rules = Vec::with_capacity(docs.len());
    let mut issues: Vec<ValidationIssue> = Vec::new();
    for (index, doc) in docs.into_iter().enumerate() {
        match serde_json::from_value::<R>(doc) {
            Ok(rule) => rules.push(rule),
            Err(e) => issues.push(ValidationIssue {
                index,
                message: format!("not deserializable: {e}"),
            }),
        }
    }
    if !issues.is_empty() {
        return Err(DetectError::RulesRejected { kind, issues });
    }

    let mut guard = slot.write().unwrap_or_else(PoisonError::into_inner);
    let generation = guard.generation + 1;
    let rules_loaded = rules.len();
    *guard = Arc::new(RuleSet { generation, rules });

    Ok(ReloadReport {
        kind,
        generation,
        rules_loaded,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::source::StaticRuleSource;
    use serde_json::json;

    fn good_stateless_doc(id: &str) -> Value {
        json!({
            "id": id,
            "name": "High CPU",
            "description": "CPU above threshold",
            "conditions": [{"field": "cpu_percent", "operator": ">", "value": 90}],
            "target_os": ["linux"]
        })
    }

    fn good_chain_doc() -> Value {
        json!({
            "id": "chain-1",
            "description": "two-step chain",
            "pattern": [
                {"field": "event_type", "value": "A"},
                {"field": "event_type", "value": "B"}
            ],
            "logic": "SEQUENCE",
            "window_seconds": 1800
        })
    }

    #[test]
    fn registry_starts_empty_at_generation_zero() {
        let registry = RuleRegistry::new();
        let active = registry.active_stateless();
        assert_eq!(active.generation, 0);
        assert!(active.is_empty());
    }

    #[test]
    fn successful_reload_bumps_generation() {
        let registry = RuleRegistry::new();
        let source = StaticRuleSource::new()
            .with(RuleKind::Stateless, vec![good_stateless_doc("r1")]);

        let report = registry.reload(RuleKind::Stateless, &source).unwrap();
        assert_eq!(report.generation, 1);
        assert_eq!(report.rules_loaded, 1);
        assert_eq!(registry.active_stateless().generation, 1);

        let report = registry.reload(RuleKind::Stateless, &source).unwrap();
        assert_eq!(report.generation, 2);
    }

    #[test]
    fn invalid_candidate_leaves_active_untouched() {
        let registry = RuleRegistry::new();
        let good = StaticRuleSource::new()
            .with(RuleKind::Stateless, vec![good_stateless_doc("r1")]);
        registry.reload(RuleKind::Stateless, &good).unwrap();

        // One invalid document among valid ones fails the whole batch.
        let bad = StaticRuleSource::new().with(
            RuleKind::Stateless,
            vec![
                good_stateless_doc("r1"),
                json!({"description": "no id, no conditions, no target_os"}),
                good_stateless_doc("r2"),
            ],
        );
        let err = registry.reload(RuleKind::Stateless, &bad).unwrap_err();
        match err {
            DetectError::RulesRejected { kind, issues } => {
                assert_eq!(kind, RuleKind::Stateless);
                // Every issue points at the one bad document.
                assert!(!issues.is_empty());
                assert!(issues.iter().all(|i| i.index == 1));
            }
            other => panic!("expected RulesRejected, got {other:?}"),
        }

        let active = registry.active_stateless();
        assert_eq!(active.generation, 1);
        assert_eq!(active.len(), 1);
        assert_eq!(active.rules[0].id, "r1");
    }

    #[test]
    fn source_failure_is_a_no_op() {
        struct BrokenSource;
        impl RuleSource for BrokenSource {
            fn name(&self) -> &str {
                "broken"
            }
            fn read(&self, _kind: RuleKind) -> crate::Result<Vec<Value>> {
                Err(DetectError::SourceUnavailable {
                    source_name: "broken".into(),
                    reason: "gone".into(),
                })
            }
        }

        let registry = RuleRegistry::new();
        let good = StaticRuleSource::new()
            .with(RuleKind::Stateless, vec![good_stateless_doc("r1")]);
        registry.reload(RuleKind::Stateless, &good).unwrap();

        let err = registry.reload(RuleKind::Stateless, &BrokenSource).unwrap_err();
        assert!(matches!(err, DetectError::SourceUnavailable { .. }));
        assert_eq!(registry.active_stateless().generation, 1);
    }

    #[test]
    fn kinds_reload_independently() {
        let registry = RuleRegistry::new();
        let source = StaticRuleSource::new()
            .with(RuleKind::Stateless, vec![json!({"bad": true})])
            .with(RuleKind::Chain, vec![good_chain_doc()]);

        let results = registry.reload_all(&source);
        assert_eq!(results.len(), 3);
        assert!(results[0].is_err()); // stateless rejected
        assert!(results[1].is_ok()); // correlation: empty batch is valid
        assert!(results[2].is_ok()); // chain activated

        assert_eq!(registry.active_stateless().generation, 0);
        assert_eq!(registry.active_chain().generation, 1);
        assert_eq!(registry.active_chain().len(), 1);
    }

    #[test]
    fn readers_see_whole_generations_under_concurrent_reload() {
        use std::sync::Arc as StdArc;

        let registry = StdArc::new(RuleRegistry::new());
        let mut handles = Vec::new();

        for round in 0..4u32 {
            let registry = StdArc::clone(&registry);
            handles.push(std::thread::spawn(move || {
                let docs = (0..3)
                    .map(|i| good_stateless_doc(&format!("g{round}-r{i}")))
                    .collect();
                let source = StaticRuleSource::new().with(RuleKind::Stateless, docs);
                registry.reload(RuleKind::Stateless, &source).unwrap();
            }));
        }

        for _ in 0..4 {
            let registry = StdArc::clone(&registry);
            handles.push(std::thread::spawn(move || {
                for _ in 0..100 {
                    let active = registry.active_stateless();
                    if active.is_empty() {
                        continue;
                    }
                    // Every rule in an observed set comes from the same
                    // candidate batch; a mixed-generation set would not.
                    assert_eq!(active.len(), 3);
                    let prefix = active.rules[0].id.split('-').next().unwrap().to_string();
                    assert!(active
                        .rules
                        .iter()
                        .all(|r| r.id.starts_with(&format!("{prefix}-"))));
                }
            }));
        }

        for h in handles {
            h.join().unwrap();
        }
    }
}
