//! Haptic dispatch crate - debounce store, event dispatcher and routing policy.
//!
//! Decoded events flow through the `EventRouter`, which applies the per-kind
//! dispatch policy, into the `EventDispatcher`. The dispatcher consults the
//! shared `DebounceStore` and forwards accepted triggers to an `EventSink`.

pub mod debounce;
pub mod dispatcher;
pub mod router;
pub mod sink;
pub mod test_cycle;

pub use debounce::{DebounceConfig, DebounceStore, Decision};
pub use dispatcher::EventDispatcher;
pub use router::{DispatchPolicy, EventRouter};
pub use sink::{BroadcastSink, EventSink, HapticPulse, RecordingSink, TracingSink};
pub use test_cycle::TestCycle;
