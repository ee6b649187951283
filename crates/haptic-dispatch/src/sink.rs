//! Downstream receivers of accepted triggers.

use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;

use haptic_core::EventKind;

/// Fire-and-forget notification target for accepted triggers.
///
/// `emit` is called synchronously on the thread that accepted the trigger, so
/// implementations must not block.
pub trait EventSink: Send + Sync {
    fn emit(&self, kind: EventKind);
}

/// Logs each pulse. Used when no actuator is attached.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, kind: EventKind) {
        tracing::info!(event = %kind, "Haptic pulse");
    }
}

/// A pulse as seen by broadcast subscribers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HapticPulse {
    pub kind: EventKind,
    pub at: DateTime<Utc>,
}

/// Fans pulses out to any number of subscribers over a tokio broadcast channel.
///
/// Slow subscribers lag and drop old pulses instead of blocking the listener.
#[derive(Debug, Clone)]
pub struct BroadcastSink {
    tx: broadcast::Sender<HapticPulse>,
}

impl BroadcastSink {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<HapticPulse> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl EventSink for BroadcastSink {
    fn emit(&self, kind: EventKind) {
        let pulse = HapticPulse {
            kind,
            at: Utc::now(),
        };
        if self.tx.send(pulse).is_err() {
            tracing::debug!(event = %kind, "Haptic pulse dropped: no subscribers");
        }
    }
}

/// Keeps every emitted kind in order.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<EventKind>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<EventKind> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn count(&self, kind: EventKind) -> usize {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|k| **k == kind)
            .count()
    }

    pub fn clear(&self) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, kind: EventKind) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(kind);
    }
}
