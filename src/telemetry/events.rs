//! Lifecycle event types describing fixture setup and teardown as observed
//! by the pool, exposed to snapshots, broadcast subscribers and plan reports.

use serde::{Deserialize, Serialize};

use crate::fixture::Scope;

/// Stage of a fixture's lifecycle reported by the pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LifecycleEvent {
    SetupStarted {
        fixture: String,
        scope: Scope,
    },
    SetupCompleted {
        fixture: String,
        scope: Scope,
    },
    SetupFailed {
        fixture: String,
        scope: Scope,
        code: i32,
        reason: String,
    },
    TeardownStarted {
        fixture: String,
        scope: Scope,
    },
    TeardownCompleted {
        fixture: String,
        scope: Scope,
    },
    TeardownFailed {
        fixture: String,
        scope: Scope,
        code: i32,
        reason: String,
    },
    ScopeTeardownStarted {
        scope: Scope,
        live: usize,
    },
    ScopeTeardownCompleted {
        scope: Scope,
        failures: usize,
    },
}

impl LifecycleEvent {
    /// Fixture the event refers to, if it is a per-fixture event.
    pub fn fixture(&self) -> Option<&str> {
        match self {
            LifecycleEvent::SetupStarted { fixture, .. }
            | LifecycleEvent::SetupCompleted { fixture, .. }
            | LifecycleEvent::SetupFailed { fixture, .. }
            | LifecycleEvent::TeardownStarted { fixture, .. }
            | LifecycleEvent::TeardownCompleted { fixture, .. }
            | LifecycleEvent::TeardownFailed { fixture, .. } => Some(fixture),
            LifecycleEvent::ScopeTeardownStarted { .. }
            | LifecycleEvent::ScopeTeardownCompleted { .. } => None,
        }
    }
}

/// Lifecycle event stamped with its position in the pool's event order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordedEvent {
    pub sequence: u64,
    pub timestamp_ms: u64,
    #[serde(flatten)]
    pub event: LifecycleEvent,
}
