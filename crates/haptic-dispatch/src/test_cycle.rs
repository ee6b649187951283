//! Manual test pulses.
//!
//! Each call to [`TestCycle::fire_next`] emits the next kind in
//! [`TEST_SEQUENCE`] straight to the sink, bypassing the debounce store, so a
//! user can feel every pulse pattern in turn.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use haptic_core::EventKind;

use crate::sink::EventSink;

/// Kinds exercised by the test cycle, in order.
pub const TEST_SEQUENCE: [EventKind; 7] = [
    EventKind::Snap,
    EventKind::Clip,
    EventKind::RecordStart,
    EventKind::RecordStop,
    EventKind::RenderComplete,
    EventKind::MarkerCrossed,
    EventKind::ItemAligned,
];

pub struct TestCycle {
    sink: Arc<dyn EventSink>,
    index: AtomicUsize,
}

impl TestCycle {
    pub fn new(sink: Arc<dyn EventSink>) -> Self {
        Self {
            sink,
            index: AtomicUsize::new(0),
        }
    }

    /// The kind the next call to `fire_next` will emit.
    pub fn peek(&self) -> EventKind {
        TEST_SEQUENCE[self.index.load(Ordering::Relaxed) % TEST_SEQUENCE.len()]
    }

    /// Emit the current kind and advance, wrapping at the end of the sequence.
    pub fn fire_next(&self) -> EventKind {
        let i = self.index.fetch_add(1, Ordering::Relaxed) % TEST_SEQUENCE.len();
        let kind = TEST_SEQUENCE[i];
        self.sink.emit(kind);
        tracing::info!(event = %kind, "Test haptic triggered");
        kind
    }
}
