//! reaper-haptic binary - composition root.
//!
//! 1. Parse CLI and load configuration from TOML
//! 2. Build the debounce store, dispatcher and router
//! 3. Start the OSC listener
//! 4. Forward accepted pulses to the output task
//! 5. On Ctrl-C, stop the listener and clear debounce history

mod cli;

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::sync::broadcast;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{reload, EnvFilter};

use haptic_core::HapticConfig;
use haptic_dispatch::{
    BroadcastSink, DebounceConfig, DebounceStore, EventDispatcher, EventRouter, HapticPulse,
    TestCycle, TracingSink,
};
use haptic_osc::{ListenerSettings, OscListener};

use cli::{CliArgs, Command};

const PULSE_CHANNEL_CAPACITY: usize = 64;
const TEST_PULSE_SPACING: Duration = Duration::from_millis(400);

/// Drain the pulse channel and hand each pulse to the output.
async fn pulse_output_loop(mut rx: broadcast::Receiver<HapticPulse>) {
    loop {
        match rx.recv().await {
            Ok(pulse) => {
                tracing::info!(
                    event = %pulse.kind,
                    at = %pulse.at.format("%H:%M:%S%.3f"),
                    "Haptic pulse"
                );
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Pulse output fell behind, dropped pulses");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

async fn run_test_pulses(count: usize) {
    let cycle = TestCycle::new(Arc::new(TracingSink));
    for i in 0..count {
        if i > 0 {
            tokio::time::sleep(TEST_PULSE_SPACING).await;
        }
        cycle.fire_next();
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Tracing first so config loading is logged. RUST_LOG wins; otherwise the
    // bootstrap level is swapped for the configured one once the file is read.
    let env_filter = EnvFilter::try_from_default_env().ok();
    let level_pinned = env_filter.is_some() || args.log_level.is_some();
    let (filter, filter_handle) = reload::Layer::new(
        env_filter.unwrap_or_else(|| EnvFilter::new(args.bootstrap_log_level())),
    );
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting reaper-haptic v{}", env!("CARGO_PKG_VERSION"));

    // Config.
    let config_file = args.resolve_config_path();
    let mut config = HapticConfig::load_or_default(&config_file);
    args.apply_overrides(&mut config);
    if !level_pinned {
        filter_handle.reload(EnvFilter::new(&config.general.log_level))?;
    }
    tracing::info!(path = %config_file.display(), "Configuration resolved");

    if let Some(Command::TestPulse { count }) = args.command {
        run_test_pulses(count).await;
        return Ok(());
    }

    // Dispatch chain.
    let store = Arc::new(DebounceStore::new(DebounceConfig::from_settings(
        &config.debounce,
    )));
    let sink = Arc::new(BroadcastSink::new(PULSE_CHANNEL_CAPACITY));
    let output = tokio::spawn(pulse_output_loop(sink.subscribe()));
    let dispatcher = EventDispatcher::new(Arc::clone(&store), sink);
    let router = Arc::new(EventRouter::new(dispatcher));

    // OSC listener.
    let settings = ListenerSettings::from_config(&config.osc)?;
    let mut listener = OscListener::new(settings, router.clone());
    if let Err(e) = listener.start().await {
        tracing::error!(error = %e, "Could not start OSC listener - is another instance running?");
        return Err(e.into());
    }

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown requested");

    listener.stop().await;
    router.dispatcher().reset_all();

    // Dropping the last router handle closes the pulse channel.
    drop(listener);
    drop(router);
    if let Err(e) = output.await {
        tracing::warn!(error = %e, "Pulse output task ended abnormally");
    }

    tracing::info!("reaper-haptic stopped");
    Ok(())
}
