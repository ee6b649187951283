//! Routing table from decoded events to dispatcher calls.
//!
//! Transition events (record start/stop, play start/stop, render complete)
//! reset their own debounce window before triggering. A transition therefore
//! always produces its first pulse even if the same kind fired a moment ago;
//! the window only guards against repeats arriving through other paths.

use std::collections::HashMap;

use haptic_core::{DomainEvent, EventHandler, EventKind, EventPayload, Result};

use crate::dispatcher::EventDispatcher;

/// How an event kind reaches the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchPolicy {
    /// Plain debounced trigger.
    Debounced,
    /// `reset_debounce` immediately followed by `trigger`.
    ResetThenTrigger,
}

impl DispatchPolicy {
    /// Built-in policy for `kind`.
    pub fn for_kind(kind: EventKind) -> Self {
        match kind {
            EventKind::RecordStart
            | EventKind::RecordStop
            | EventKind::RenderComplete
            | EventKind::PlayStart
            | EventKind::PlayStop => DispatchPolicy::ResetThenTrigger,
            EventKind::Snap
            | EventKind::Clip
            | EventKind::MarkerCrossed
            | EventKind::ItemAligned => DispatchPolicy::Debounced,
        }
    }
}

/// Applies the per-kind policy and forwards to the dispatcher.
#[derive(Debug)]
pub struct EventRouter {
    dispatcher: EventDispatcher,
    routes: HashMap<EventKind, DispatchPolicy>,
}

impl EventRouter {
    pub fn new(dispatcher: EventDispatcher) -> Self {
        let routes = EventKind::ALL
            .iter()
            .map(|kind| (*kind, DispatchPolicy::for_kind(*kind)))
            .collect();
        Self { dispatcher, routes }
    }

    /// Override the policy for one kind.
    pub fn with_policy(mut self, kind: EventKind, policy: DispatchPolicy) -> Self {
        self.routes.insert(kind, policy);
        self
    }

    pub fn policy(&self, kind: EventKind) -> DispatchPolicy {
        self.routes
            .get(&kind)
            .copied()
            .unwrap_or(DispatchPolicy::Debounced)
    }

    /// Route one event. Returns whether a pulse was emitted.
    pub fn route(&self, event: &DomainEvent) -> bool {
        match event.payload {
            EventPayload::PeakDb(db) => tracing::debug!("Clip detected at {:.1}dB", db),
            EventPayload::MarkerIndex(index) => tracing::debug!("Marker {} crossed", index),
            EventPayload::None => {}
        }

        match self.policy(event.kind) {
            DispatchPolicy::Debounced => self.dispatcher.trigger(event.kind),
            DispatchPolicy::ResetThenTrigger => {
                self.dispatcher.reset_debounce(event.kind);
                self.dispatcher.trigger(event.kind)
            }
        }
    }

    pub fn dispatcher(&self) -> &EventDispatcher {
        &self.dispatcher
    }
}

impl EventHandler for EventRouter {
    fn handle(&self, event: DomainEvent) -> Result<()> {
        self.route(&event);
        Ok(())
    }
}
