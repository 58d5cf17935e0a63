//! # vigil-detect
//!
//! Endpoint-telemetry correlation and detection-rule engine.
//!
//! Monitored hosts periodically emit structured process/activity observations
//! ([`TelemetryEvent`]). This crate decides, per event, whether any configured
//! behavioral pattern has been satisfied:
//!
//! - stateless rules match a single event in isolation ([`evaluator`]);
//! - correlation rules match across one endpoint's recent events within a
//!   trailing time window ([`correlation`]);
//! - chain rules match an ordered sequence of distinct events across all
//!   endpoints ([`correlation::sequence`]).
//!
//! Rules live in a [`RuleRegistry`] that supports validated hot reload: a
//! candidate set that fails structural validation never replaces the active
//! one. Recent events are kept in a [`RetentionStore`] that the correlators
//! query by window. [`pipeline::DetectionPipeline`] ties the pieces together
//! and forwards fired [`Alert`]s to a caller-supplied [`AlertSink`].
//!
//! Transport, persistent storage, and risk scoring are external collaborators;
//! `risk_score`/`risk_level` arrive pre-computed on each event and pass
//! through untouched.

pub mod config;
pub mod correlation;
pub mod error;
pub mod evaluator;
pub mod event;
pub mod pipeline;
pub mod registry;
pub mod retention;
pub mod rules;

pub use config::DetectionConfig;
pub use error::{DetectError, Result};
pub use event::{Alert, AlertSink, BufferedSink, Severity, TelemetryEvent};
pub use registry::{ReloadReport, RuleRegistry};
pub use retention::RetentionStore;
pub use rules::RuleKind;
