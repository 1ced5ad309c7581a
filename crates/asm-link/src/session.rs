//! The link session: one persistent connection to the sensor module.
//!
//! ## Architecture
//!
//! A [`LinkSession`] owns the socket, the connection state and the reconnect
//! policy. Two paths touch the socket:
//!
//! - **Command path** (caller's thread): [`LinkSession::connect`],
//!   [`LinkSession::send`], [`LinkSession::close`]
//! - **Read loop** (one background thread per connection): blocks on reads,
//!   decodes frames and pushes [`LinkEvent`]s onto a channel
//!
//! Commands are serialized by a dedicated write lock. The session lock guards
//! state and the socket handle; a writer clones the handle and releases it
//! before touching the wire, so `close` can always shut a socket down, even
//! under a write blocked on a peer that stopped reading. Decoded records leave
//! the read loop only through the channel; the consumer drains
//! [`LinkSession::events`] on its own thread.
//!
//! ## Reconnection
//!
//! When an established connection hits EOF or a read error, the session moves
//! to [`LinkState::Reconnecting`] and schedules a repeating timer. Each tick makes
//! one connect attempt. A failed tick increments the retry counter; once a tick
//! fails with the counter already at `max_reconnect_attempts`, the timer is
//! cancelled and the session settles in [`LinkState::Disconnected`] until the
//! operator connects again.

use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};

use asm_metrics::metric_defs;
use asm_protocol::{decode_frame, encode_command, Command};
use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;
use tracing::{debug, info, trace, warn};

use crate::config::LinkConfig;
use crate::error::{LinkError, LinkResult};
use crate::scheduler::{Scheduler, ThreadScheduler, TimerHandle};
use crate::state::{ConnectTrigger, LinkEvent, LinkState};
use crate::transport::{Connector, LinkStream, TcpConnector};

// ============================================================================
// Shared State
// ============================================================================

/// Mutable link state, guarded by the session lock.
struct LinkShared {
    state: LinkState,
    host: String,
    port: u16,
    reconnect_attempts: u32,
    reconnect_timer: Option<TimerHandle>,
    stream: Option<Arc<dyn LinkStream>>,
    /// Bumped on every new connection and on close; a read loop whose
    /// generation no longer matches belongs to a dead connection.
    generation: u64,
    /// A connect call is between "decided to dial" and "recorded the outcome".
    connecting: bool,
    reader: Option<JoinHandle<()>>,
    closed: bool,
}

struct LinkInner {
    config: LinkConfig,
    connector: Arc<dyn Connector>,
    scheduler: Arc<dyn Scheduler>,
    events_tx: Sender<LinkEvent>,
    shared: Mutex<LinkShared>,
    /// Serializes writes only; `close` never takes it.
    write_lock: Mutex<()>,
}

// ============================================================================
// Link Session
// ============================================================================

/// A persistent client connection to the sensor module.
///
/// Created idle with [`LinkSession::open`]; nothing is dialled until
/// [`connect`](Self::connect). Dropping the session closes it.
pub struct LinkSession {
    inner: Arc<LinkInner>,
    events_rx: Receiver<LinkEvent>,
}

impl LinkSession {
    /// Create a session that dials over TCP and retries on real timers.
    pub fn open(config: LinkConfig) -> LinkResult<Self> {
        Self::with_parts(config, Arc::new(TcpConnector), Arc::new(ThreadScheduler::new()))
    }

    /// Create a session with an explicit connector and scheduler.
    pub fn with_parts(
        config: LinkConfig,
        connector: Arc<dyn Connector>,
        scheduler: Arc<dyn Scheduler>,
    ) -> LinkResult<Self> {
        config.validate()?;
        let (events_tx, events_rx) = crossbeam_channel::unbounded();

        let shared = LinkShared {
            state: LinkState::Disconnected,
            host: config.host.clone(),
            port: config.port,
            reconnect_attempts: 0,
            reconnect_timer: None,
            stream: None,
            generation: 0,
            connecting: false,
            reader: None,
            closed: false,
        };

        Ok(LinkSession {
            inner: Arc::new(LinkInner {
                config,
                connector,
                scheduler,
                events_tx,
                shared: Mutex::new(shared),
                write_lock: Mutex::new(()),
            }),
            events_rx,
        })
    }

    /// Connect at the operator's request.
    ///
    /// Resets the retry counter and cancels any pending reconnect timer. A
    /// no-op when already connected. On failure the session is left
    /// `Disconnected` and the error is returned; no automatic retry follows.
    pub fn connect(&self) -> LinkResult<()> {
        self.inner.connect(ConnectTrigger::Manual)
    }

    /// Change the address used by the next connect attempt.
    pub fn set_remote(&self, host: impl Into<String>, port: u16) {
        let mut shared = self.inner.shared.lock();
        shared.host = host.into();
        shared.port = port;
    }

    /// Encode and write `<event>:<data>`.
    ///
    /// A failed write is returned to the caller; the connection is not torn
    /// down, the read loop notices a dead peer on its own. A write blocked on a
    /// peer that stopped reading is released by [`close`](Self::close).
    pub fn send(&self, event: &str, data: i64) -> LinkResult<()> {
        let stream = self
            .inner
            .shared
            .lock()
            .stream
            .clone()
            .ok_or(LinkError::NotConnected)?;
        self.inner.write_to(stream.as_ref(), event, data)
    }

    /// Write a typed command.
    pub fn send_command(&self, command: Command) -> LinkResult<()> {
        self.send(command.event(), command.data())
    }

    /// Shut the session down.
    ///
    /// Cancels any reconnect timer, closes the socket to unblock the read loop
    /// and waits for it to exit. Idempotent; later connects fail with
    /// [`LinkError::Closed`].
    pub fn close(&self) {
        let reader = {
            let mut shared = self.inner.shared.lock();
            if shared.closed {
                return;
            }
            shared.closed = true;
            shared.generation += 1;
            cancel_timer(&mut shared);
            if let Some(stream) = shared.stream.take() {
                let _ = stream.shutdown();
            }
            self.inner.set_state(&mut shared, LinkState::Disconnected);
            shared.reader.take()
        };

        if let Some(reader) = reader {
            if reader.thread().id() != thread::current().id() {
                let _ = reader.join();
            }
        }
        info!("Link session closed");
    }

    /// Current connection state.
    pub fn state(&self) -> LinkState {
        self.inner.shared.lock().state
    }

    /// Failed automatic retries since the connection was lost.
    pub fn reconnect_attempts(&self) -> u32 {
        self.inner.shared.lock().reconnect_attempts
    }

    /// Whether a reconnect timer is pending.
    pub fn reconnect_pending(&self) -> bool {
        self.inner.shared.lock().reconnect_timer.is_some()
    }

    /// Address used by the next connect attempt.
    pub fn remote(&self) -> (String, u16) {
        let shared = self.inner.shared.lock();
        (shared.host.clone(), shared.port)
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.inner.shared.lock().closed
    }

    /// Configuration the session was opened with.
    pub fn config(&self) -> &LinkConfig {
        &self.inner.config
    }

    /// Events from the link, in arrival order.
    pub fn events(&self) -> &Receiver<LinkEvent> {
        &self.events_rx
    }
}

impl Drop for LinkSession {
    fn drop(&mut self) {
        self.close();
    }
}

// ============================================================================
// Connection Lifecycle
// ============================================================================

impl LinkInner {
    fn connect(self: &Arc<Self>, trigger: ConnectTrigger) -> LinkResult<()> {
        let (host, port) = {
            let mut shared = self.shared.lock();
            if shared.closed {
                return Err(LinkError::Closed);
            }
            if shared.connecting {
                return Err(LinkError::ConnectInProgress);
            }

            match trigger {
                ConnectTrigger::Manual => {
                    if shared.state.is_connected() {
                        debug!("Connect requested while already connected; ignoring");
                        return Ok(());
                    }
                    cancel_timer(&mut shared);
                    shared.reconnect_attempts = 0;
                    metrics::gauge!(metric_defs::LINK_RECONNECT_ATTEMPTS.name).set(0.0);
                    self.set_state(&mut shared, LinkState::Connecting);
                }
                ConnectTrigger::Automatic => {
                    if shared.state != LinkState::Reconnecting {
                        trace!(state = %shared.state, "Stale reconnect tick ignored");
                        return Ok(());
                    }
                }
            }

            shared.connecting = true;
            (shared.host.clone(), shared.port)
        };

        metrics::counter!(metric_defs::LINK_CONNECT_ATTEMPTS.name, "trigger" => trigger.as_str())
            .increment(1);
        debug!(%host, port, trigger = trigger.as_str(), "Connecting to sensor module");

        // Dial without the lock so writes and state queries stay responsive.
        let result = self
            .connector
            .connect(&host, port, self.config.connect_timeout());

        let mut shared = self.shared.lock();
        shared.connecting = false;

        if shared.closed {
            if let Ok(stream) = result {
                let _ = stream.shutdown();
            }
            return Err(LinkError::Closed);
        }

        match result {
            Ok(stream) => self.on_connected(&mut shared, Arc::from(stream), &host, port),
            Err(source) => {
                metrics::counter!(
                    metric_defs::LINK_CONNECT_FAILURES.name,
                    "trigger" => trigger.as_str()
                )
                .increment(1);
                self.on_connect_failed(&mut shared, trigger);
                Err(LinkError::ConnectFailed {
                    addr: format!("{}:{}", host, port),
                    source,
                })
            }
        }
    }

    fn on_connected(
        self: &Arc<Self>,
        shared: &mut LinkShared,
        stream: Arc<dyn LinkStream>,
        host: &str,
        port: u16,
    ) -> LinkResult<()> {
        cancel_timer(shared);
        shared.reconnect_attempts = 0;
        metrics::gauge!(metric_defs::LINK_RECONNECT_ATTEMPTS.name).set(0.0);

        shared.generation += 1;
        let generation = shared.generation;
        shared.stream = Some(Arc::clone(&stream));
        self.set_state(shared, LinkState::Connected);
        info!("Connected to sensor module at {}:{}", host, port);

        // Nothing else can have written to a socket published a moment ago.
        let status = Command::GetStatus;
        if let Err(e) = self.write_to(stream.as_ref(), status.event(), status.data()) {
            warn!(error = %e, "Initial status request failed");
        }

        let inner = Arc::clone(self);
        let spawned = thread::Builder::new()
            .name("asm-link-reader".to_string())
            .spawn(move || inner.read_loop(stream, generation));

        match spawned {
            Ok(reader) => {
                // A previous reader has already seen its socket close.
                shared.reader = Some(reader);
                Ok(())
            }
            Err(source) => {
                if let Some(stream) = shared.stream.take() {
                    let _ = stream.shutdown();
                }
                self.set_state(shared, LinkState::Disconnected);
                Err(LinkError::Spawn {
                    what: "reader",
                    source,
                })
            }
        }
    }

    fn on_connect_failed(&self, shared: &mut LinkShared, trigger: ConnectTrigger) {
        match trigger {
            ConnectTrigger::Manual => {
                warn!("Unable to connect to {}:{}", shared.host, shared.port);
                self.set_state(shared, LinkState::Disconnected);
            }
            ConnectTrigger::Automatic => {
                let max = self.config.max_reconnect_attempts;
                if shared.reconnect_attempts >= max {
                    cancel_timer(shared);
                    warn!(
                        attempts = shared.reconnect_attempts,
                        "Reconnect attempts exhausted; manual reconnect required"
                    );
                    self.set_state(shared, LinkState::Disconnected);
                } else {
                    shared.reconnect_attempts += 1;
                    metrics::gauge!(metric_defs::LINK_RECONNECT_ATTEMPTS.name)
                        .set(shared.reconnect_attempts as f64);
                    info!(
                        "Reconnect attempt failed ({}/{})",
                        shared.reconnect_attempts, max
                    );
                    self.emit(LinkEvent::StateChanged {
                        state: shared.state,
                        reconnect_attempts: shared.reconnect_attempts,
                    });
                }
            }
        }
    }

    /// Enter `Reconnecting` and make sure exactly one retry timer is pending.
    fn begin_reconnect(self: &Arc<Self>, shared: &mut LinkShared) {
        self.set_state(shared, LinkState::Reconnecting);
        if shared.reconnect_timer.is_some() {
            return;
        }

        let weak: Weak<LinkInner> = Arc::downgrade(self);
        let task = Box::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.reconnect_tick();
            }
        });

        info!(
            "Scheduling reconnect every {:?}",
            self.config.reconnect_interval()
        );
        match self
            .scheduler
            .schedule_repeating(self.config.reconnect_interval(), task)
        {
            Ok(handle) => shared.reconnect_timer = Some(handle),
            Err(e) => {
                warn!(error = %e, "Could not schedule reconnect");
                self.set_state(shared, LinkState::Disconnected);
            }
        }
    }

    fn reconnect_tick(self: &Arc<Self>) {
        debug!("Attempting reconnect");
        match self.connect(ConnectTrigger::Automatic) {
            Ok(()) => {}
            Err(LinkError::ConnectInProgress) => trace!("Reconnect tick skipped; connect in progress"),
            Err(e) => debug!(error = %e, "Reconnect attempt failed"),
        }
    }

    // ========================================================================
    // Read Loop
    // ========================================================================

    fn read_loop(self: Arc<Self>, stream: Arc<dyn LinkStream>, generation: u64) {
        let mut buffer = vec![0u8; self.config.read_buffer_size];

        let reason = loop {
            match stream.read(&mut buffer) {
                Ok(0) => break "sensor module closed the connection".to_string(),
                Ok(n) => self.deliver_frame(&buffer[..n]),
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => break LinkError::ReadFailed(e).to_string(),
            }
        };

        self.on_read_ended(generation, reason);
    }

    fn deliver_frame(&self, raw: &[u8]) {
        metrics::counter!(metric_defs::LINK_FRAMES_RECEIVED.name).increment(1);
        metrics::counter!(metric_defs::LINK_BYTES_RECEIVED.name).increment(raw.len() as u64);
        trace!(len = raw.len(), "Frame received");

        for record in decode_frame(raw) {
            match record {
                Ok(event) => self.emit(LinkEvent::Record(event)),
                Err(e) => {
                    metrics::counter!(metric_defs::PROTOCOL_DECODE_ERRORS.name).increment(1);
                    warn!(error = %e, "Skipping undecodable record");
                    self.emit(LinkEvent::DecodeError(e));
                }
            }
        }
    }

    fn on_read_ended(self: &Arc<Self>, generation: u64, reason: String) {
        let mut shared = self.shared.lock();
        if shared.generation != generation || shared.state != LinkState::Connected {
            debug!("Read loop for a retired connection exited");
            return;
        }

        info!("Disconnected: {}", reason);
        metrics::counter!(metric_defs::LINK_DISCONNECTS.name).increment(1);
        if let Some(stream) = shared.stream.take() {
            let _ = stream.shutdown();
        }
        self.emit(LinkEvent::ConnectionLost { reason });
        self.begin_reconnect(&mut shared);
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    fn write_to(&self, stream: &dyn LinkStream, event: &str, data: i64) -> LinkResult<()> {
        let bytes = encode_command(event, data);
        let _writer = self.write_lock.lock();

        stream
            .write_all(&bytes)
            .map_err(|source| LinkError::WriteFailed {
                event: event.to_string(),
                source,
            })?;

        metrics::counter!(metric_defs::LINK_BYTES_SENT.name).increment(bytes.len() as u64);
        metrics::counter!(metric_defs::LINK_COMMANDS_SENT.name, "event" => event.to_string())
            .increment(1);
        debug!("Sent {}:{}", event, data);
        Ok(())
    }

    fn set_state(&self, shared: &mut LinkShared, state: LinkState) {
        if shared.state == state {
            return;
        }
        debug!(from = %shared.state, to = %state, "Link state changed");
        shared.state = state;
        self.emit(LinkEvent::StateChanged {
            state,
            reconnect_attempts: shared.reconnect_attempts,
        });
    }

    fn emit(&self, event: LinkEvent) {
        // The receiver lives as long as the session; a send error only happens
        // during teardown.
        let _ = self.events_tx.send(event);
    }
}

fn cancel_timer(shared: &mut LinkShared) {
    if let Some(timer) = shared.reconnect_timer.take() {
        timer.cancel();
    }
}
