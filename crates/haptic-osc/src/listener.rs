//! UDP listener loop for REAPER OSC traffic.
//!
//! `OscListener::start` binds the socket and spawns the receive loop on its
//! own tokio task. The loop's only suspension point is the receive; `stop`
//! wakes it through a shutdown signal, waits a bounded time for the task to
//! finish, and aborts it otherwise.
//!
//! The listener holds the only long-lived handle to the socket. The loop keeps
//! a weak reference and upgrades it just for the duration of each receive, so
//! a handler stuck in synchronous code cannot keep the port bound once `stop`
//! drops the listener's handle.

use std::io;
use std::net::SocketAddr;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use haptic_core::config::OscConfig;
use haptic_core::{DomainEvent, EventHandler, HapticError, Result};

use crate::decoder::{self, Decoded};
use crate::state::{ListenerState, StateMachine};

/// Runtime parameters for the listener.
#[derive(Debug, Clone)]
pub struct ListenerSettings {
    pub addr: SocketAddr,
    pub shutdown_timeout: Duration,
    pub poll_backoff: Duration,
    pub max_datagram_size: usize,
}

impl ListenerSettings {
    /// Defaults for everything except the bind address.
    pub fn new(addr: SocketAddr) -> Self {
        let defaults = OscConfig::default();
        Self {
            addr,
            shutdown_timeout: defaults.shutdown_timeout(),
            poll_backoff: defaults.poll_backoff(),
            max_datagram_size: defaults.max_datagram_size,
        }
    }

    pub fn from_config(config: &OscConfig) -> Result<Self> {
        Ok(Self {
            addr: config.socket_addr()?,
            shutdown_timeout: config.shutdown_timeout(),
            poll_backoff: config.poll_backoff(),
            max_datagram_size: config.max_datagram_size,
        })
    }
}

/// What a single receive produced.
#[derive(Debug)]
pub enum ReceiveOutcome {
    Datagram { len: usize, peer: SocketAddr },
    /// Nothing to read yet; retry after the poll back-off.
    NotReady,
    /// The transport is gone. The loop ends without reporting an error.
    Closed,
    /// Any other I/O error. Logged; the loop keeps going.
    Failed(io::Error),
}

impl ReceiveOutcome {
    pub fn from_result(result: io::Result<(usize, SocketAddr)>) -> Self {
        match result {
            Ok((len, peer)) => ReceiveOutcome::Datagram { len, peer },
            Err(e) => match e.kind() {
                io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted | io::ErrorKind::TimedOut => {
                    ReceiveOutcome::NotReady
                }
                io::ErrorKind::NotConnected
                | io::ErrorKind::ConnectionAborted
                | io::ErrorKind::BrokenPipe => ReceiveOutcome::Closed,
                _ => ReceiveOutcome::Failed(e),
            },
        }
    }
}

/// Receives OSC datagrams and hands decoded events to an [`EventHandler`].
pub struct OscListener {
    settings: ListenerSettings,
    handler: Arc<dyn EventHandler>,
    state: StateMachine,
    shutdown: Arc<Notify>,
    task: Option<JoinHandle<()>>,
    socket: Option<Arc<UdpSocket>>,
    local_addr: Option<SocketAddr>,
}

/// How long `stop` waits for an aborted task to be torn down.
const ABORT_GRACE: Duration = Duration::from_millis(100);

impl std::fmt::Debug for OscListener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OscListener")
            .field("settings", &self.settings)
            .field("state", &self.state.current())
            .field("local_addr", &self.local_addr)
            .finish()
    }
}

impl OscListener {
    pub fn new(settings: ListenerSettings, handler: Arc<dyn EventHandler>) -> Self {
        Self {
            settings,
            handler,
            state: StateMachine::new(),
            shutdown: Arc::new(Notify::new()),
            task: None,
            socket: None,
            local_addr: None,
        }
    }

    pub fn state(&self) -> ListenerState {
        self.state.current()
    }

    pub fn is_running(&self) -> bool {
        self.state.current() == ListenerState::Running
    }

    /// Address actually bound, once started. Useful when binding port 0.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Bind the socket and spawn the receive loop.
    ///
    /// A bind failure is returned to the caller and leaves the listener
    /// `Stopped`; no task is spawned.
    pub async fn start(&mut self) -> Result<SocketAddr> {
        if self.task.as_ref().is_some_and(|task| !task.is_finished()) {
            return Err(HapticError::AlreadyRunning);
        }
        self.task = None;
        if self.state.transition(ListenerState::Starting).is_err() {
            return Err(HapticError::AlreadyRunning);
        }

        let addr = self.settings.addr;
        let socket = match UdpSocket::bind(addr).await {
            Ok(socket) => socket,
            Err(source) => {
                tracing::error!(addr = %addr, error = %source, "Failed to start OSC listener");
                self.state.transition(ListenerState::Stopped)?;
                return Err(HapticError::Bind { addr, source });
            }
        };
        let local_addr = match socket.local_addr() {
            Ok(local) => local,
            Err(e) => {
                self.state.transition(ListenerState::Stopped)?;
                return Err(e.into());
            }
        };

        // A fresh signal per run so a stale permit cannot end the next one.
        self.shutdown = Arc::new(Notify::new());
        self.state.transition(ListenerState::Running)?;

        let socket = Arc::new(socket);
        let ctx = LoopContext {
            socket: Arc::downgrade(&socket),
            handler: Arc::clone(&self.handler),
            shutdown: Arc::clone(&self.shutdown),
            state: self.state.clone(),
            poll_backoff: self.settings.poll_backoff,
            buf: vec![0u8; self.settings.max_datagram_size],
        };
        self.task = Some(tokio::spawn(ctx.run()));
        self.socket = Some(socket);
        self.local_addr = Some(local_addr);

        tracing::info!(addr = %local_addr, "OSC listener started on port {}", local_addr.port());
        Ok(local_addr)
    }

    /// Stop the loop and release the socket. A no-op when nothing is running.
    ///
    /// Waits at most `shutdown_timeout` for the task; past that the task is
    /// aborted and shutdown proceeds. The socket is closed before this
    /// returns on every path, even if a handler is still running.
    pub async fn stop(&mut self) {
        let Some(mut task) = self.task.take() else {
            self.socket = None;
            return;
        };

        // The loop may already have ended on its own after a transport close.
        self.state
            .transition_if(ListenerState::Running, ListenerState::Stopping);
        self.shutdown.notify_one();

        match tokio::time::timeout(self.settings.shutdown_timeout, &mut task).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::warn!(error = %e, "OSC listener task ended abnormally"),
            Err(_) => {
                tracing::warn!(
                    timeout_ms = self.settings.shutdown_timeout.as_millis() as u64,
                    "OSC listener did not stop in time, aborting"
                );
                task.abort();
                // Only waits out the cancellation; a handler blocking its
                // worker thread keeps running past this.
                let _ = tokio::time::timeout(ABORT_GRACE, &mut task).await;
            }
        }

        // The loop holds no strong handle outside a receive, so this closes it.
        self.socket = None;
        self.state.force_stopped();
        self.local_addr = None;
        tracing::info!("OSC listener stopped");
    }
}

impl Drop for OscListener {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

struct LoopContext {
    socket: Weak<UdpSocket>,
    handler: Arc<dyn EventHandler>,
    shutdown: Arc<Notify>,
    state: StateMachine,
    poll_backoff: Duration,
    buf: Vec<u8>,
}

impl LoopContext {
    async fn run(mut self) {
        let mut transport_closed = false;
        loop {
            let outcome = {
                // Gone once `stop` released the listener's handle.
                let Some(socket) = self.socket.upgrade() else {
                    break;
                };
                tokio::select! {
                    biased;
                    _ = self.shutdown.notified() => break,
                    result = socket.recv_from(&mut self.buf) => ReceiveOutcome::from_result(result),
                }
            };

            match outcome {
                ReceiveOutcome::Datagram { len, peer } => {
                    process_datagram(&self.buf[..len], peer, self.handler.as_ref());
                }
                ReceiveOutcome::NotReady => {
                    tokio::select! {
                        biased;
                        _ = self.shutdown.notified() => break,
                        _ = tokio::time::sleep(self.poll_backoff) => {}
                    }
                }
                ReceiveOutcome::Closed => {
                    tracing::debug!("OSC socket closed, leaving receive loop");
                    transport_closed = true;
                    break;
                }
                ReceiveOutcome::Failed(e) => {
                    tracing::error!(error = %e, "Error receiving OSC message");
                }
            }
        }

        // A stop request owns the lifecycle; a closed transport finishes it here.
        if transport_closed
            && self
                .state
                .transition_if(ListenerState::Running, ListenerState::Stopping)
        {
            self.state.force_stopped();
        }
    }
}

/// Decode one datagram and hand each contained event to `handler`, in order.
pub(crate) fn process_datagram(bytes: &[u8], peer: SocketAddr, handler: &dyn EventHandler) {
    let messages = match decoder::decode_datagram(bytes) {
        Ok(messages) => messages,
        Err(e) => {
            tracing::warn!(peer = %peer, error = %e, "Dropping malformed OSC datagram");
            return;
        }
    };

    for message in &messages {
        match decoder::decode_message(message) {
            Decoded::Event(event) => deliver(handler, event, &message.addr),
            Decoded::Unhandled(address) => {
                tracing::debug!("Unhandled REAPER OSC message: {}", address);
            }
            Decoded::Ignored => {}
        }
    }
}

fn deliver(handler: &dyn EventHandler, event: DomainEvent, address: &str) {
    match std::panic::catch_unwind(AssertUnwindSafe(|| handler.handle(event))) {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::error!(address, error = %e, "Error processing OSC message"),
        Err(_) => tracing::error!(address, "Event handler panicked while processing OSC message"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use haptic_core::EventKind;
    use rosc::{OscMessage, OscPacket};

    #[derive(Default)]
    struct Collect {
        events: Mutex<Vec<DomainEvent>>,
    }

    impl EventHandler for Collect {
        fn handle(&self, event: DomainEvent) -> Result<()> {
            self.events.lock().unwrap().push(event);
            Ok(())
        }
    }

    fn loopback() -> ListenerSettings {
        let mut settings = ListenerSettings::new("127.0.0.1:0".parse().unwrap());
        settings.shutdown_timeout = Duration::from_millis(500);
        settings
    }

    fn encode(addr: &str) -> Vec<u8> {
        rosc::encoder::encode(&OscPacket::Message(OscMessage {
            addr: addr.to_string(),
            args: vec![],
        }))
        .unwrap()
    }

    fn peer() -> SocketAddr {
        "127.0.0.1:5000".parse().unwrap()
    }

    #[test]
    fn test_receive_outcome_classification() {
        let ok = ReceiveOutcome::from_result(Ok((12, peer())));
        assert!(matches!(ok, ReceiveOutcome::Datagram { len: 12, .. }));

        for kind in [
            io::ErrorKind::WouldBlock,
            io::ErrorKind::Interrupted,
            io::ErrorKind::TimedOut,
        ] {
            let outcome = ReceiveOutcome::from_result(Err(io::Error::from(kind)));
            assert!(matches!(outcome, ReceiveOutcome::NotReady), "{:?}", kind);
        }

        for kind in [
            io::ErrorKind::NotConnected,
            io::ErrorKind::ConnectionAborted,
            io::ErrorKind::BrokenPipe,
        ] {
            let outcome = ReceiveOutcome::from_result(Err(io::Error::from(kind)));
            assert!(matches!(outcome, ReceiveOutcome::Closed), "{:?}", kind);
        }

        let reset = ReceiveOutcome::from_result(Err(io::Error::from(
            io::ErrorKind::ConnectionReset,
        )));
        assert!(matches!(reset, ReceiveOutcome::Failed(_)));
    }

    #[test]
    fn test_settings_from_config() {
        let config = OscConfig {
            bind_address: "127.0.0.1".to_string(),
            port: 9123,
            shutdown_timeout_ms: 750,
            poll_backoff_ms: 20,
            max_datagram_size: 1024,
        };
        let settings = ListenerSettings::from_config(&config).unwrap();
        assert_eq!(settings.addr, "127.0.0.1:9123".parse().unwrap());
        assert_eq!(settings.shutdown_timeout, Duration::from_millis(750));
        assert_eq!(settings.poll_backoff, Duration::from_millis(20));
        assert_eq!(settings.max_datagram_size, 1024);
    }

    #[test]
    fn test_process_datagram_skips_unknown_and_malformed() {
        let collect = Collect::default();
        process_datagram(b"garbage", peer(), &collect);
        process_datagram(&encode("/reaper/unknown"), peer(), &collect);
        process_datagram(&encode("/elsewhere"), peer(), &collect);
        process_datagram(&encode("/reaper/record/start"), peer(), &collect);

        let events = collect.events.lock().unwrap().clone();
        assert_eq!(events, vec![DomainEvent::new(EventKind::RecordStart)]);
    }

    #[test]
    fn test_deliver_survives_handler_panic() {
        struct Panics;
        impl EventHandler for Panics {
            fn handle(&self, _event: DomainEvent) -> Result<()> {
                panic!("handler bug");
            }
        }
        deliver(&Panics, DomainEvent::new(EventKind::Snap), "/reaper/snap");
    }

    #[tokio::test]
    async fn test_start_and_stop_lifecycle() {
        let mut listener = OscListener::new(loopback(), Arc::new(Collect::default()));
        assert_eq!(listener.state(), ListenerState::Stopped);
        assert!(listener.local_addr().is_none());

        let addr = listener.start().await.unwrap();
        assert!(listener.is_running());
        assert_eq!(listener.local_addr(), Some(addr));
        assert_ne!(addr.port(), 0);

        listener.stop().await;
        assert_eq!(listener.state(), ListenerState::Stopped);
        assert!(listener.local_addr().is_none());
    }

    #[tokio::test]
    async fn test_start_twice_is_rejected() {
        let mut listener = OscListener::new(loopback(), Arc::new(Collect::default()));
        listener.start().await.unwrap();
        assert!(matches!(
            listener.start().await,
            Err(HapticError::AlreadyRunning)
        ));
        assert!(listener.is_running());
        listener.stop().await;
    }

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        let mut listener = OscListener::new(loopback(), Arc::new(Collect::default()));
        listener.stop().await;
        assert_eq!(listener.state(), ListenerState::Stopped);

        listener.start().await.unwrap();
        listener.stop().await;
        listener.stop().await;
        assert_eq!(listener.state(), ListenerState::Stopped);
    }

    #[tokio::test]
    async fn test_restart_after_stop() {
        let mut listener = OscListener::new(loopback(), Arc::new(Collect::default()));
        listener.start().await.unwrap();
        listener.stop().await;
        listener.start().await.unwrap();
        assert!(listener.is_running());
        listener.stop().await;
    }
}
