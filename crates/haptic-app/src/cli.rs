//! CLI argument definitions for the reaper-haptic binary.
//!
//! Priority resolution: CLI args > env vars > config file > defaults.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use haptic_core::HapticConfig;

/// Level used before the config file has been read.
const BOOTSTRAP_LOG_LEVEL: &str = "info";

/// reaper-haptic: turns REAPER OSC events into haptic pulses.
#[derive(Parser, Debug)]
#[command(name = "reaper-haptic", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// UDP port to receive OSC on.
    #[arg(short = 'p', long = "port")]
    pub port: Option<u16>,

    /// Interface address to bind (e.g. 127.0.0.1).
    #[arg(short = 'b', long = "bind")]
    pub bind: Option<String>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level")]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Cycle through the test pulse sequence without listening for OSC.
    TestPulse {
        /// Number of pulses to emit.
        #[arg(short = 'n', long = "count", default_value_t = 7)]
        count: usize,
    },
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > REAPER_HAPTIC_CONFIG env var > ~/.reaper-haptic/config.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var("REAPER_HAPTIC_CONFIG") {
            return PathBuf::from(p);
        }
        default_config_path()
    }

    /// Resolve the OSC port.
    ///
    /// Priority: --port flag > REAPER_HAPTIC_PORT env var > config file value.
    pub fn resolve_port(&self, config_port: u16) -> u16 {
        if let Some(p) = self.port {
            return p;
        }
        if let Ok(val) = std::env::var("REAPER_HAPTIC_PORT") {
            match val.parse::<u16>() {
                Ok(p) => return p,
                Err(_) => tracing::warn!(value = %val, "Ignoring invalid REAPER_HAPTIC_PORT"),
            }
        }
        config_port
    }

    /// Log level to install before the config file is loaded, so that load
    /// warnings are visible. Priority: --log-level flag > "info".
    pub fn bootstrap_log_level(&self) -> &str {
        self.log_level.as_deref().unwrap_or(BOOTSTRAP_LOG_LEVEL)
    }

    /// Apply command-line overrides on top of the loaded file.
    pub fn apply_overrides(&self, config: &mut HapticConfig) {
        config.osc.port = self.resolve_port(config.osc.port);
        if let Some(ref bind) = self.bind {
            config.osc.bind_address = bind.clone();
        }
        if let Some(ref level) = self.log_level {
            config.general.log_level = level.clone();
        }
    }
}

/// Default config file path for the current platform.
fn default_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    if let Ok(home) = std::env::var("USERPROFILE") {
        return PathBuf::from(home).join(".reaper-haptic").join("config.toml");
    }
    #[cfg(not(target_os = "windows"))]
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".reaper-haptic").join("config.toml");
    }
    PathBuf::from("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flags() {
        let args = CliArgs::parse_from([
            "reaper-haptic",
            "--config",
            "/tmp/haptic.toml",
            "--port",
            "9100",
            "--bind",
            "127.0.0.1",
            "--log-level",
            "debug",
        ]);
        assert_eq!(args.config, Some(PathBuf::from("/tmp/haptic.toml")));
        assert_eq!(args.port, Some(9100));
        assert_eq!(args.bind.as_deref(), Some("127.0.0.1"));
        assert_eq!(args.log_level.as_deref(), Some("debug"));
        assert!(args.command.is_none());
    }

    #[test]
    fn test_parse_test_pulse_subcommand() {
        let args = CliArgs::parse_from(["reaper-haptic", "test-pulse", "--count", "3"]);
        assert_eq!(args.command, Some(Command::TestPulse { count: 3 }));

        let args = CliArgs::parse_from(["reaper-haptic", "test-pulse"]);
        assert_eq!(args.command, Some(Command::TestPulse { count: 7 }));
    }

    #[test]
    fn test_config_flag_wins() {
        let args = CliArgs::parse_from(["reaper-haptic", "-c", "custom.toml"]);
        assert_eq!(args.resolve_config_path(), PathBuf::from("custom.toml"));
    }

    #[test]
    fn test_overrides_applied_to_config() {
        let args = CliArgs::parse_from([
            "reaper-haptic",
            "-p",
            "9500",
            "-b",
            "127.0.0.1",
            "-l",
            "trace",
        ]);
        let mut config = HapticConfig::default();
        args.apply_overrides(&mut config);
        assert_eq!(config.osc.port, 9500);
        assert_eq!(config.osc.bind_address, "127.0.0.1");
        assert_eq!(config.general.log_level, "trace");
    }

    #[test]
    fn test_bootstrap_log_level() {
        let args = CliArgs::parse_from(["reaper-haptic"]);
        assert_eq!(args.bootstrap_log_level(), "info");

        let args = CliArgs::parse_from(["reaper-haptic", "--log-level", "debug"]);
        assert_eq!(args.bootstrap_log_level(), "debug");
    }

    #[test]
    fn test_no_flags_keep_file_values() {
        let args = CliArgs::parse_from(["reaper-haptic"]);
        let mut config = HapticConfig::default();
        config.osc.bind_address = "10.0.0.2".to_string();
        config.general.log_level = "warn".to_string();
        args.apply_overrides(&mut config);
        assert_eq!(config.osc.bind_address, "10.0.0.2");
        assert_eq!(config.general.log_level, "warn");
    }
}
