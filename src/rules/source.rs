//! Re-readable rule document sources.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::error::{DetectError, Result};
use crate::rules::RuleKind;

/// A named, re-readable source of raw rule documents per type.
///
/// `read` is called on every reload attempt; a failure here leaves the
/// previously active set untouched ([`DetectError::SourceUnavailable`]).
pub trait RuleSource: Send + Sync {
    fn name(&self) -> &str;

    /// Read the current documents for one rule kind. The top level must be
    /// a JSON array; each element is validated individually afterwards.
    fn read(&self, kind: RuleKind) -> Result<Vec<Value>>;
}

/// Rule source backed by one JSON file per rule kind.
pub struct FileRuleSource {
    name: String,
    paths: HashMap<RuleKind, PathBuf>,
}

impl FileRuleSource {
    pub fn new(
        stateless: impl Into<PathBuf>,
        correlation: impl Into<PathBuf>,
        chain: impl Into<PathBuf>,
    ) -> Self {
        let mut paths = HashMap::new();
        paths.insert(RuleKind::Stateless, stateless.into());
        paths.insert(RuleKind::Correlation, correlation.into());
        paths.insert(RuleKind::Chain, chain.into());
        Self {
            name: "file".to_string(),
            paths,
        }
    }

    pub fn path(&self, kind: RuleKind) -> Option<&Path> {
        self.paths.get(&kind).map(PathBuf::as_path)
    }

    fn unavailable(&self, reason: impl Into<String>) -> DetectError {
        DetectError::SourceUnavailable {
            source_name: self.name.clone(),
            reason: reason.into(),
        }
    }
}

impl RuleSource for FileRuleSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn read(&self, kind: RuleKind) -> Result<Vec<Value>> {
        let path = self
            .paths
            .get(&kind)
            .ok_or_else(|| self.unavailable(format!("no path configured for {kind} rules")))?;

        let content = fs::read_to_string(path)
            .map_err(|e| self.unavailable(format!("cannot read {}: {e}", path.display())))?;

        // Malformed JSON never reaches validation; the reload is a no-op.
        let parsed: Value = serde_json::from_str(&content)
            .map_err(|e| self.unavailable(format!("malformed JSON in {}: {e}", path.display())))?;

        match parsed {
            Value::Array(docs) => Ok(docs),
            _ => Err(self.unavailable(format!(
                "{} must contain a JSON array of rule documents",
                path.display()
            ))),
        }
    }
}

/// In-memory rule source, for tests and embedders that manage documents
/// themselves. Kinds without documents read as empty batches.
#[derive(Default)]
pub struct StaticRuleSource {
    docs: HashMap<RuleKind, Vec<Value>>,
}

impl StaticRuleSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, kind: RuleKind, docs: Vec<Value>) -> Self {
        self.docs.insert(kind, docs);
        self
    }

    pub fn set(&mut self, kind: RuleKind, docs: Vec<Value>) {
        self.docs.insert(kind, docs);
    }
}

impl RuleSource for StaticRuleSource {
    fn name(&self) -> &str {
        "static"
    }

    fn read(&self, kind: RuleKind) -> Result<Vec<Value>> {
        Ok(self.docs.get(&kind).cloned().unwrap_or_default())
    }
}
