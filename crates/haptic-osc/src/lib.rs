//! Haptic OSC crate - inbound OSC decoding and the UDP listener loop.
//!
//! The listener owns a UDP socket on a dedicated tokio task and moves through
//! a strict lifecycle: Stopped -> Starting -> Running -> Stopping -> Stopped.
//! Each datagram is decoded into domain events that are handed, in order, to an
//! `EventHandler`.

pub mod decoder;
pub mod listener;
pub mod state;

pub use decoder::{decode_datagram, decode_message, Decoded};
pub use listener::{ListenerSettings, OscListener, ReceiveOutcome};
pub use state::{ListenerState, StateMachine};
