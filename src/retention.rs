//! Short-lived, queryable buffer of recent telemetry events.
//!
//! Append-only from the engine's point of view: correlators only ever read
//! window-bounded slices. Eviction beyond the largest referenced window is
//! the embedder's concern; [`RetentionStore::prune`] is provided for it.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use chrono::{Duration, Utc};

use crate::event::TelemetryEvent;

/// Per-endpoint event buffer with windowed range queries.
///
/// Concurrent appends and concurrent window reads are safe; a reader sees a
/// full event or none.
#[derive(Debug, Default)]
pub struct RetentionStore {
    inner: RwLock<HashMap<String, Vec<TelemetryEvent>>>,
}

/// Cutoff instant for a trailing window. A window too large to represent
/// covers everything retained, it must never panic: validation only bounds
/// `window_seconds` below.
fn window_cutoff(window_seconds: u64) -> chrono::DateTime<Utc> {
    let secs = i64::try_from(window_seconds).unwrap_or(i64::MAX);
    match Duration::try_seconds(secs) {
        Some(window) => Utc::now()
            .checked_sub_signed(window)
            .unwrap_or(chrono::DateTime::<Utc>::MIN_UTC),
        None => chrono::DateTime::<Utc>::MIN_UTC,
    }
}

impl RetentionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event under its endpoint.
    pub fn record(&self, event: TelemetryEvent) {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        inner
            .entry(event.endpoint_id.clone())
            .or_default()
            .push(event);
    }

    /// Events for one endpoint with `timestamp >= now - window_seconds`,
    /// in storage order.
    pub fn recent(&self, endpoint_id: &str, window_seconds: u64) -> Vec<TelemetryEvent> {
        let cutoff = window_cutoff(window_seconds);
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner
            .get(endpoint_id)
            .map(|events| {
                events
                    .iter()
                    .filter(|e| e.timestamp >= cutoff)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// The same window merged across all endpoints, sorted ascending by
    /// timestamp. Ascending order is an explicit contract here — the
    /// sequence matcher depends on it, not on incidental storage order.
    pub fn recent_all(&self, window_seconds: u64) -> Vec<TelemetryEvent> {
        let cutoff = window_cutoff(window_seconds);
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        let mut events: Vec<TelemetryEvent> = inner
            .values()
            .flatten()
            .filter(|e| e.timestamp >= cutoff)
            .cloned()
            .collect();
        // Stable: equal timestamps keep per-endpoint insertion order.
        events.sort_by_key(|e| e.timestamp);
        events
    }

    /// Drop events older than `max_window_seconds`. Returns how many were
    /// removed. Call with the largest window any active rule references.
    pub fn prune(&self, max_window_seconds: u64) -> usize {
        let cutoff = window_cutoff(max_window_seconds);
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let mut removed = 0;
        for events in inner.values_mut() {
            let before = events.len();
            events.retain(|e| e.timestamp >= cutoff);
            removed += before - events.len();
        }
        inner.retain(|_, events| !events.is_empty());
        removed
    }

    /// Total stored events across all endpoints.
    pub fn event_count(&self) -> usize {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner.values().map(Vec::len).sum()
    }

    /// Endpoints currently holding at least one event.
    pub fn endpoints(&self) -> Vec<String> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner.keys().cloned().collect()
    }
}
