use std::collections::BTreeMap;
use std::net::{IpAddr, SocketAddr};
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{HapticError, Result};
use crate::events::EventKind;

/// Interval applied to a kind that has no configured entry.
pub const DEFAULT_INTERVAL_MS: u64 = 100;

/// UDP port REAPER is configured to send OSC to.
pub const DEFAULT_OSC_PORT: u16 = 9000;

/// Built-in minimum spacing between two pulses of the same kind.
pub fn default_interval_ms(kind: EventKind) -> u64 {
    match kind {
        EventKind::Snap => 80,
        EventKind::Clip => 200,
        EventKind::RecordStart | EventKind::RecordStop => 500,
        EventKind::RenderComplete => 1000,
        EventKind::MarkerCrossed => 150,
        EventKind::ItemAligned => 100,
        EventKind::PlayStart | EventKind::PlayStop => 500,
    }
}

/// Top-level configuration for the haptic bridge.
///
/// Loaded from `~/.reaper-haptic/config.toml` by default. Every section is
/// optional; missing sections and fields fall back to their defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HapticConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub osc: OscConfig,
    #[serde(default)]
    pub debounce: DebounceSettings,
}

impl HapticConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: HapticConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration, falling back to defaults if the file is missing or
    /// cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the configuration to a TOML file, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// OSC listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OscConfig {
    /// Interface to bind. `0.0.0.0` accepts REAPER running on another host.
    pub bind_address: String,
    pub port: u16,
    /// Upper bound on how long `stop` waits for the receive loop to exit.
    pub shutdown_timeout_ms: u64,
    /// Back-off before retrying a receive that reported "not ready".
    pub poll_backoff_ms: u64,
    /// Receive buffer size; longer datagrams are truncated by the OS.
    pub max_datagram_size: usize,
}

impl Default for OscConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: DEFAULT_OSC_PORT,
            shutdown_timeout_ms: 2000,
            poll_backoff_ms: 100,
            max_datagram_size: 8192,
        }
    }
}

impl OscConfig {
    /// The socket address the listener binds to.
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        let ip: IpAddr = self.bind_address.parse().map_err(|e| {
            HapticError::Config(format!(
                "invalid bind_address '{}': {}",
                self.bind_address, e
            ))
        })?;
        Ok(SocketAddr::new(ip, self.port))
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }

    pub fn poll_backoff(&self) -> Duration {
        Duration::from_millis(self.poll_backoff_ms)
    }
}

/// Debounce interval settings.
///
/// `intervals` is keyed by event identifier (`snap`, `recordStart`, ...).
/// Values are signed so that a negative entry can be written; it is clamped to
/// zero when applied.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DebounceSettings {
    /// Interval for kinds without an entry in `intervals`.
    pub default_interval_ms: u64,
    pub intervals: BTreeMap<String, i64>,
}

impl Default for DebounceSettings {
    fn default() -> Self {
        Self {
            default_interval_ms: DEFAULT_INTERVAL_MS,
            intervals: EventKind::ALL
                .iter()
                .map(|kind| (kind.as_str().to_string(), default_interval_ms(*kind) as i64))
                .collect(),
        }
    }
}

impl DebounceSettings {
    /// Resolve the `intervals` table into typed, clamped entries.
    ///
    /// Unknown identifiers are logged and skipped.
    pub fn resolved(&self) -> Vec<(EventKind, u64)> {
        self.intervals
            .iter()
            .filter_map(|(name, ms)| match name.parse::<EventKind>() {
                Ok(kind) => Some((kind, (*ms).max(0) as u64)),
                Err(e) => {
                    warn!(key = %name, "Ignoring debounce interval: {}", e);
                    None
                }
            })
            .collect()
    }
}
