use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Address prefix shared by every message REAPER sends to the bridge.
pub const REAPER_PREFIX: &str = "/reaper/";

/// A DAW event that can produce a haptic pulse.
///
/// The camelCase identifier returned by [`EventKind::as_str`] is the dispatch
/// key, the TOML key under `[debounce.intervals]` and the name handed to the
/// downstream sink.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EventKind {
    /// An item snapped to grid, marker or another item.
    Snap,
    /// Audio exceeded 0 dB.
    Clip,
    RecordStart,
    RecordStop,
    RenderComplete,
    /// The playhead crossed a project marker.
    MarkerCrossed,
    /// Items became aligned.
    ItemAligned,
    PlayStart,
    PlayStop,
}

impl EventKind {
    /// Every known kind, in wire-table order.
    pub const ALL: [EventKind; 9] = [
        EventKind::Snap,
        EventKind::Clip,
        EventKind::RecordStart,
        EventKind::RecordStop,
        EventKind::RenderComplete,
        EventKind::MarkerCrossed,
        EventKind::ItemAligned,
        EventKind::PlayStart,
        EventKind::PlayStop,
    ];

    /// Stable string identifier.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Snap => "snap",
            EventKind::Clip => "clip",
            EventKind::RecordStart => "recordStart",
            EventKind::RecordStop => "recordStop",
            EventKind::RenderComplete => "renderComplete",
            EventKind::MarkerCrossed => "markerCrossed",
            EventKind::ItemAligned => "itemAligned",
            EventKind::PlayStart => "playStart",
            EventKind::PlayStop => "playStop",
        }
    }

    /// OSC address REAPER uses for this kind.
    pub fn address(&self) -> &'static str {
        match self {
            EventKind::Snap => "/reaper/snap",
            EventKind::Clip => "/reaper/clip",
            EventKind::RecordStart => "/reaper/record/start",
            EventKind::RecordStop => "/reaper/record/stop",
            EventKind::RenderComplete => "/reaper/render/complete",
            EventKind::MarkerCrossed => "/reaper/marker",
            EventKind::ItemAligned => "/reaper/align",
            EventKind::PlayStart => "/reaper/play/start",
            EventKind::PlayStop => "/reaper/play/stop",
        }
    }

    /// Exact-match lookup of an OSC address.
    pub fn from_address(address: &str) -> Option<EventKind> {
        EventKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.address() == address)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string is not the identifier of any [`EventKind`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownEventKind(pub String);

impl fmt::Display for UnknownEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown event kind: {}", self.0)
    }
}

impl std::error::Error for UnknownEventKind {}

impl FromStr for EventKind {
    type Err = UnknownEventKind;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        EventKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| UnknownEventKind(s.to_string()))
    }
}

/// Optional data carried alongside an event.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventPayload {
    #[default]
    None,
    /// Peak level in dB reported with a clip.
    PeakDb(f32),
    /// Index of the marker that was crossed.
    MarkerIndex(i32),
}

/// A decoded inbound event.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct DomainEvent {
    pub kind: EventKind,
    pub payload: EventPayload,
}

impl DomainEvent {
    pub fn new(kind: EventKind) -> Self {
        Self {
            kind,
            payload: EventPayload::None,
        }
    }

    pub fn clip(peak_db: f32) -> Self {
        Self {
            kind: EventKind::Clip,
            payload: EventPayload::PeakDb(peak_db),
        }
    }

    pub fn marker(index: i32) -> Self {
        Self {
            kind: EventKind::MarkerCrossed,
            payload: EventPayload::MarkerIndex(index),
        }
    }
}

/// Consumer of decoded events.
///
/// The listener calls `handle` synchronously, once per message, in receive
/// order. An `Err` is logged by the caller and never stops the listener.
pub trait EventHandler: Send + Sync {
    fn handle(&self, event: DomainEvent) -> Result<()>;
}
