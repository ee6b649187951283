//! Per-kind fixed-window debounce state.
//!
//! `DebounceStore` owns two maps: the configured minimum interval per kind and
//! the instant of the last accepted trigger per kind. It performs no I/O.
//!
//! The history map sits behind a single mutex so that the elapsed check and
//! the timestamp update in [`DebounceStore::try_acquire_at`] happen as one
//! step. Interval updates go through an `RwLock`; a trigger racing with an
//! update may still see the previous value.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError, RwLock};
use std::time::{Duration, Instant};

use haptic_core::config::{default_interval_ms, DebounceSettings, DEFAULT_INTERVAL_MS};
use haptic_core::EventKind;

/// Minimum interval per event kind, in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebounceConfig {
    intervals: HashMap<EventKind, u64>,
    default_ms: u64,
}

impl Default for DebounceConfig {
    fn default() -> Self {
        Self {
            intervals: EventKind::ALL
                .iter()
                .map(|kind| (*kind, default_interval_ms(*kind)))
                .collect(),
            default_ms: DEFAULT_INTERVAL_MS,
        }
    }
}

impl DebounceConfig {
    /// A config with no per-kind entries; every kind uses `default_ms`.
    pub fn empty(default_ms: u64) -> Self {
        Self {
            intervals: HashMap::new(),
            default_ms,
        }
    }

    /// Build from the `[debounce]` section of the config file.
    ///
    /// Starts from the built-in table so that kinds missing from the file keep
    /// their usual spacing, then applies the file's entries.
    pub fn from_settings(settings: &DebounceSettings) -> Self {
        let mut config = Self {
            default_ms: settings.default_interval_ms,
            ..Self::default()
        };
        for (kind, ms) in settings.resolved() {
            config.intervals.insert(kind, ms);
        }
        config
    }

    /// Effective interval for `kind`, falling back to the default.
    pub fn interval_ms(&self, kind: EventKind) -> u64 {
        self.intervals.get(&kind).copied().unwrap_or(self.default_ms)
    }

    /// Overwrite the interval for `kind`. Negative values clamp to zero.
    /// Returns the stored value.
    pub fn set(&mut self, kind: EventKind, ms: i64) -> u64 {
        let clamped = ms.max(0) as u64;
        self.intervals.insert(kind, clamped);
        clamped
    }

    pub fn default_ms(&self) -> u64 {
        self.default_ms
    }
}

/// Outcome of a debounce check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// The trigger passed and its instant was recorded.
    Accepted,
    /// The trigger arrived inside the window of the previous accepted one.
    Suppressed { elapsed: Duration, interval: Duration },
}

impl Decision {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Decision::Accepted)
    }
}

/// Shared debounce state: configuration plus trigger history.
#[derive(Debug, Default)]
pub struct DebounceStore {
    config: RwLock<DebounceConfig>,
    history: Mutex<HashMap<EventKind, Instant>>,
}

impl DebounceStore {
    pub fn new(config: DebounceConfig) -> Self {
        Self {
            config: RwLock::new(config),
            history: Mutex::new(HashMap::new()),
        }
    }

    /// Check `kind` against its window at `now` and record `now` if it passes.
    ///
    /// A kind that was never triggered (or was reset) always passes. A stored
    /// instant is never moved backwards: if `now` precedes it, the elapsed time
    /// counts as zero and an accepted trigger keeps the later instant.
    pub fn try_acquire_at(&self, kind: EventKind, now: Instant) -> Decision {
        let interval = Duration::from_millis(self.interval_ms(kind));

        let mut history = self.history.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(last) = history.get(&kind).copied() {
            let elapsed = now.saturating_duration_since(last);
            if elapsed < interval {
                return Decision::Suppressed { elapsed, interval };
            }
            history.insert(kind, now.max(last));
        } else {
            history.insert(kind, now);
        }
        Decision::Accepted
    }

    pub fn interval_ms(&self, kind: EventKind) -> u64 {
        self.config
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .interval_ms(kind)
    }

    /// Overwrite the interval for `kind`, clamped to zero. Returns the stored value.
    pub fn set_interval(&self, kind: EventKind, ms: i64) -> u64 {
        self.config
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .set(kind, ms)
    }

    /// Forget the last trigger of `kind`.
    pub fn reset(&self, kind: EventKind) {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&kind);
    }

    /// Forget every recorded trigger. Intervals are left untouched.
    pub fn reset_all(&self) {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub fn last_trigger(&self, kind: EventKind) -> Option<Instant> {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&kind)
            .copied()
    }

    /// Number of kinds with a recorded trigger.
    pub fn tracked(&self) -> usize {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
