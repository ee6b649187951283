//! Event dispatcher: debounce check followed by downstream emission.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use haptic_core::EventKind;

use crate::debounce::{DebounceStore, Decision};
use crate::sink::EventSink;

/// Decides per trigger whether to forward it to the sink.
///
/// Cloning is cheap; clones share the same store and sink. The administrative
/// methods (`set_interval`, `reset_debounce`, `reset_all`) may be called from
/// any thread while the listener is dispatching.
#[derive(Clone)]
pub struct EventDispatcher {
    store: Arc<DebounceStore>,
    sink: Arc<dyn EventSink>,
}

impl fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}

impl EventDispatcher {
    pub fn new(store: Arc<DebounceStore>, sink: Arc<dyn EventSink>) -> Self {
        Self { store, sink }
    }

    /// Trigger `kind` now. Returns `true` if the pulse was forwarded.
    pub fn trigger(&self, kind: EventKind) -> bool {
        self.trigger_at(kind, Instant::now())
    }

    /// Trigger `kind` as of `now`.
    ///
    /// A suppressed trigger changes no state and emits nothing. An accepted
    /// one is emitted before this returns.
    pub fn trigger_at(&self, kind: EventKind, now: Instant) -> bool {
        match self.store.try_acquire_at(kind, now) {
            Decision::Accepted => {
                self.sink.emit(kind);
                tracing::info!(event = %kind, "Haptic event triggered");
                true
            }
            Decision::Suppressed { elapsed, interval } => {
                tracing::debug!(
                    event = %kind,
                    elapsed_ms = elapsed.as_millis() as u64,
                    threshold_ms = interval.as_millis() as u64,
                    "Debounced event"
                );
                false
            }
        }
    }

    /// Trigger by identifier. An unrecognised identifier is logged and
    /// rejected without touching any state; it is not dispatched with the
    /// default interval, so no history entry is ever keyed by an unknown name.
    pub fn trigger_named(&self, name: &str) -> bool {
        match name.parse::<EventKind>() {
            Ok(kind) => self.trigger(kind),
            Err(e) => {
                tracing::warn!("Trigger rejected: {}", e);
                false
            }
        }
    }

    /// Set the minimum interval for `kind`; negative values clamp to zero.
    pub fn set_interval(&self, kind: EventKind, ms: i64) {
        let stored = self.store.set_interval(kind, ms);
        tracing::debug!(event = %kind, requested_ms = ms, interval_ms = stored, "Debounce interval set");
    }

    pub fn interval_ms(&self, kind: EventKind) -> u64 {
        self.store.interval_ms(kind)
    }

    /// Make the next trigger of `kind` pass regardless of elapsed time.
    pub fn reset_debounce(&self, kind: EventKind) {
        self.store.reset(kind);
    }

    /// Clear the trigger history of every kind.
    pub fn reset_all(&self) {
        self.store.reset_all();
        tracing::debug!("All debounce timers reset");
    }

    pub fn store(&self) -> &Arc<DebounceStore> {
        &self.store
    }
}
