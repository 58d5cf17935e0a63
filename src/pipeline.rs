//! Ingest orchestration: stateless evaluation, retention, correlation, and
//! alert forwarding, plus the async service loop driving it all.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, error, warn};

use crate::correlation;
use crate::error::Result;
use crate::evaluator;
use crate::event::{Alert, AlertSink, TelemetryEvent};
use crate::registry::{ReloadReport, RuleRegistry};
use crate::retention::RetentionStore;
use crate::rules::RuleSource;

/// Input messages for the pipeline service loop.
pub enum PipelineInput {
    /// A new telemetry observation to evaluate and retain.
    Ingest(TelemetryEvent),
    /// Re-read and re-validate every rule kind from the source.
    Reload,
    /// Stop the loop.
    Shutdown,
}

/// Ties the engine together: per event, stateless rules run first, the event
/// is retained, then the windowed and sequence correlators run against the
/// store. Every fired alert is forwarded to the sink before the call returns.
pub struct DetectionPipeline {
    registry: Arc<RuleRegistry>,
    store: Arc<RetentionStore>,
    source: Arc<dyn RuleSource>,
    sink: Arc<dyn AlertSink>,
}

impl DetectionPipeline {
    pub fn new(
        registry: Arc<RuleRegistry>,
        store: Arc<RetentionStore>,
        source: Arc<dyn RuleSource>,
        sink: Arc<dyn AlertSink>,
    ) -> Self {
        Self {
            registry,
            store,
            source,
            sink,
        }
    }

    pub fn registry(&self) -> &Arc<RuleRegistry> {
        &self.registry
    }

    pub fn store(&self) -> &Arc<RetentionStore> {
        &self.store
    }

    /// Evaluate one event end to end and forward every fired alert.
    ///
    /// A sink failure is surfaced to the caller, never swallowed. Evaluation
    /// itself cannot fail: bad conditions are contained as false.
    pub fn ingest(&self, event: TelemetryEvent) -> Result<Vec<Alert>> {
        let endpoint_id = event.endpoint_id.clone();
        let os_type = event.os_type.clone();

        let stateless = self.registry.active_stateless();
        let mut alerts = evaluator::apply_rules(&event, &stateless, &os_type);

        self.store.record(event);

        let correlation_set = self.registry.active_correlation();
        alerts.extend(correlation::find_correlations(
            &self.store,
            &endpoint_id,
            &correlation_set,
        ));

        let chain_set = self.registry.active_chain();
        alerts.extend(correlation::find_chains(&self.store, &chain_set));

        for alert in &alerts {
            if let Err(e) = self.sink.submit(alert) {
                warn!(rule_id = %alert.rule_id, "alert forwarding failed: {e}");
                return Err(e);
            }
        }

        Ok(alerts)
    }

    /// Reload every rule kind. Failures are per kind; detection continues
    /// on the last good set for any kind that is rejected.
    pub fn reload_rules(&self) -> Vec<Result<ReloadReport>> {
        self.registry.reload_all(&*self.source)
    }

    /// Spawn the async service loop.
    pub fn run(self: Arc<Self>, mut input_rx: mpsc::Receiver<PipelineInput>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(input) = input_rx.recv().await {
                match input {
                    PipelineInput::Ingest(event) => {
                        if let Err(e) = self.ingest(event) {
                            warn!("ingest pass failed: {e}");
                        }
                    }
                    PipelineInput::Reload => {
                        for result in self.reload_rules() {
                            if let Err(e) = result {
                                error!("reload failed: {e}");
                            }
                        }
                    }
                    PipelineInput::Shutdown => break,
                }
            }
            debug!("detection pipeline shut down");
        })
    }
}
