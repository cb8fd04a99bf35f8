//! Fixture lifecycle telemetry.
//!
//! Every pool owns a recorder that stamps lifecycle events with a sequence
//! number, retains a bounded history for snapshots and fans events out to
//! async subscribers over a broadcast channel.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;

use crate::config::TelemetryConfig;

pub mod events;

pub use events::{LifecycleEvent, RecordedEvent};

/// Snapshot of recorder state for reports and assertions.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct LifecycleSnapshot {
    pub recent: Vec<RecordedEvent>,
    pub total_events: u64,
    pub dropped_events: u64,
}

impl LifecycleSnapshot {
    /// Position of the first event matching `predicate`, by sequence number.
    pub fn position(&self, predicate: impl Fn(&LifecycleEvent) -> bool) -> Option<u64> {
        self.recent
            .iter()
            .find(|recorded| predicate(&recorded.event))
            .map(|recorded| recorded.sequence)
    }

    /// Events without their sequence stamps, oldest first.
    pub fn events(&self) -> Vec<LifecycleEvent> {
        self.recent.iter().map(|r| r.event.clone()).collect()
    }
}

/// Broadcast-based recorder retaining a bounded history of lifecycle events.
pub struct LifecycleRecorder {
    tx: broadcast::Sender<RecordedEvent>,
    history: Mutex<VecDeque<RecordedEvent>>,
    history_capacity: usize,
    sequence: AtomicU64,
    dropped_history: AtomicU64,
}

impl LifecycleRecorder {
    pub fn new(channel_capacity: usize, history_capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(channel_capacity.max(1));
        Self {
            tx,
            history: Mutex::new(VecDeque::with_capacity(history_capacity.min(4096))),
            history_capacity,
            sequence: AtomicU64::new(0),
            dropped_history: AtomicU64::new(0),
        }
    }

    pub fn from_config(config: &TelemetryConfig) -> Self {
        Self::new(config.channel_capacity, config.history_capacity)
    }

    pub fn record(&self, event: LifecycleEvent) {
        let recorded = {
            // Sequence assignment and history append happen under one lock so
            // history order always matches sequence order.
            let mut history = self
                .history
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            let recorded = RecordedEvent {
                sequence: self.sequence.fetch_add(1, Ordering::Relaxed),
                timestamp_ms: now_timestamp_ms(),
                event,
            };

            if self.history_capacity == 0 {
                self.dropped_history.fetch_add(1, Ordering::Relaxed);
            } else {
                if history.len() == self.history_capacity {
                    history.pop_front();
                    self.dropped_history.fetch_add(1, Ordering::Relaxed);
                }
                history.push_back(recorded.clone());
            }
            recorded
        };

        let _ = self.tx.send(recorded);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RecordedEvent> {
        self.tx.subscribe()
    }

    /// Subscribe as a `Stream`; lagged receivers yield an error item instead of ending.
    pub fn stream(&self) -> BroadcastStream<RecordedEvent> {
        BroadcastStream::new(self.tx.subscribe())
    }

    pub fn snapshot(&self) -> LifecycleSnapshot {
        let history = self
            .history
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        LifecycleSnapshot {
            recent: history.iter().cloned().collect(),
            total_events: self.sequence.load(Ordering::Relaxed),
            dropped_events: self.dropped_history.load(Ordering::Relaxed),
        }
    }
}

impl Default for LifecycleRecorder {
    fn default() -> Self {
        Self::from_config(&TelemetryConfig::default())
    }
}

fn now_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::Scope;
    use futures::StreamExt;

    fn started(name: &str) -> LifecycleEvent {
        LifecycleEvent::SetupStarted {
            fixture: name.to_string(),
            scope: Scope::Test,
        }
    }

    #[test]
    fn recorder_preserves_order_within_history() {
        let recorder = LifecycleRecorder::new(8, 3);
        recorder.record(started("a"));
        recorder.record(started("b"));
        recorder.record(LifecycleEvent::ScopeTeardownStarted {
            scope: Scope::Test,
            live: 2,
        });

        let snapshot = recorder.snapshot();
        assert_eq!(snapshot.recent.len(), 3);
        assert_eq!(snapshot.recent[0].sequence, 0);
        assert_eq!(snapshot.recent[0].event.fixture(), Some("a"));
        assert!(matches!(
            snapshot.recent[2].event,
            LifecycleEvent::ScopeTeardownStarted { live: 2, .. }
        ));
    }

    #[test]
    fn recorder_drops_history_when_full() {
        let recorder = LifecycleRecorder::new(8, 2);
        recorder.record(started("a"));
        recorder.record(started("b"));
        recorder.record(started("c"));

        let snapshot = recorder.snapshot();
        assert_eq!(snapshot.recent.len(), 2);
        assert_eq!(snapshot.total_events, 3);
        assert_eq!(snapshot.dropped_events, 1);
        assert_eq!(snapshot.recent[0].event.fixture(), Some("b"));
    }

    #[test]
    fn zero_history_keeps_nothing() {
        let recorder = LifecycleRecorder::new(8, 0);
        recorder.record(started("a"));

        let snapshot = recorder.snapshot();
        assert!(snapshot.recent.is_empty());
        assert_eq!(snapshot.dropped_events, 1);
    }

    #[test]
    fn snapshot_position_finds_first_match() {
        let recorder = LifecycleRecorder::new(8, 8);
        recorder.record(started("a"));
        recorder.record(started("b"));

        let snapshot = recorder.snapshot();
        assert_eq!(snapshot.position(|e| e.fixture() == Some("b")), Some(1));
        assert_eq!(snapshot.position(|e| e.fixture() == Some("z")), None);
    }

    #[tokio::test]
    async fn stream_delivers_recorded_events() {
        let recorder = LifecycleRecorder::new(8, 8);
        let mut stream = recorder.stream();
        recorder.record(started("a"));

        let first = stream.next().await.expect("stream item").expect("not lagged");
        assert_eq!(first.event, started("a"));
    }

    #[test]
    fn recorded_event_serializes_flat() {
        let recorder = LifecycleRecorder::new(8, 8);
        recorder.record(started("a"));
        let json = serde_json::to_value(&recorder.snapshot().recent[0]).unwrap();
        assert_eq!(json["type"], "setup_started");
        assert_eq!(json["fixture"], "a");
        assert_eq!(json["scope"], "test");
        assert_eq!(json["sequence"], 0);
    }
}
