pub mod config;
pub mod error;
pub mod events;

pub use config::HapticConfig;
pub use error::{HapticError, Result};
pub use events::{DomainEvent, EventHandler, EventKind, EventPayload};
