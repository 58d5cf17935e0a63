//! Telemetry event and alert types shared across the detection engine.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

/// Severity level attached to rules and the alerts they raise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Parse a document-level severity string. Case-sensitive, lowercase,
    /// matching the wire form.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "low" => Some(Severity::Low),
            "medium" => Some(Severity::Medium),
            "high" => Some(Severity::High),
            "critical" => Some(Severity::Critical),
            _ => None,
        }
    }
}

/// One process/activity observation emitted by a monitored host.
///
/// Events are immutable once ingested. `risk_score` and `risk_level` are
/// pre-computed annotations from the scoring layer and pass through untouched.
/// Collector-specific fields the core does not enumerate (e.g. `event_type`)
/// land in `extra` via serde flattening and stay addressable by rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryEvent {
    pub endpoint_id: String,
    pub hostname: String,
    pub os_type: String,
    pub pid: u32,
    pub process_name: String,
    pub cmd: String,
    pub cpu_percent: f64,
    pub memory: u64,
    #[serde(default)]
    pub risk_score: f64,
    #[serde(default = "default_risk_level")]
    pub risk_level: String,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

fn default_risk_level() -> String {
    "low".to_string()
}

impl TelemetryEvent {
    /// Look up a field by the name rule documents use. Known fields first,
    /// then the collector-supplied `extra` bag. `None` for unknown fields —
    /// a missing field is defined behavior for conditions, never an error.
    pub fn field(&self, name: &str) -> Option<Value> {
        match name {
            "endpoint_id" => Some(Value::from(self.endpoint_id.as_str())),
            "hostname" => Some(Value::from(self.hostname.as_str())),
            "os_type" => Some(Value::from(self.os_type.as_str())),
            "pid" => Some(Value::from(self.pid)),
            "process_name" => Some(Value::from(self.process_name.as_str())),
            "cmd" => Some(Value::from(self.cmd.as_str())),
            "cpu_percent" => Some(Value::from(self.cpu_percent)),
            "memory" => Some(Value::from(self.memory)),
            "risk_score" => Some(Value::from(self.risk_score)),
            "risk_level" => Some(Value::from(self.risk_level.as_str())),
            "timestamp" => Some(Value::from(self.timestamp.timestamp())),
            _ => self.extra.get(name).cloned(),
        }
    }
}

/// A fired detection: one per rule per evaluation pass.
///
/// Immutable after creation. `evidence` carries the events justifying the
/// firing: the triggering event for stateless rules, the whole window slice
/// for correlation rules, the consumed events in pattern order for chains.
/// The timestamp derives from the newest evidence event, so evaluating an
/// identical event against an unchanged rule set yields identical alerts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub rule_id: String,
    /// Display name, present for stateless rules only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_name: Option<String>,
    pub severity: Severity,
    pub description: String,
    pub evidence: Vec<TelemetryEvent>,
    pub timestamp: DateTime<Utc>,
}

/// Destination for fired alerts, supplied by the embedding platform.
///
/// `submit` is called for every fired rule before the evaluation call
/// returns. A failure must surface to the ingest caller, so it is fallible.
pub trait AlertSink: Send + Sync {
    fn submit(&self, alert: &Alert) -> Result<()>;
}

/// In-memory sink collecting alerts behind a mutex. The default collector
/// for embedders that drain alerts themselves; also what the tests use.
#[derive(Debug, Default)]
pub struct BufferedSink {
    alerts: Mutex<Vec<Alert>>,
}

impl BufferedSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take every alert collected so far, leaving the buffer empty.
    pub fn drain(&self) -> Vec<Alert> {
        let mut guard = self.alerts.lock().unwrap_or_else(|e| e.into_inner());
        std::mem::take(&mut *guard)
    }

    pub fn len(&self) -> usize {
        self.alerts.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AlertSink for BufferedSink {
    fn submit(&self, alert: &Alert) -> Result<()> {
        self.alerts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(alert.clone());
        Ok(())
    }
}
