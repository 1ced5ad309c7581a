//! Operator-facing façade over a [`LinkSession`] and a [`Dispatcher`].
//!
//! The console is the only owner of the status snapshot. Link events are drained
//! on the caller's thread by [`Console::pump`] or [`Console::pump_timeout`], so a
//! [`Presenter`] is never invoked from the read loop.

use std::time::{Duration, Instant};

use asm_protocol::Command;
use crossbeam_channel::RecvTimeoutError;
use tracing::{debug, info, warn};

use crate::dispatcher::{CriticalAlert, DispatchOutcome, Dispatcher, DomainEvent};
use crate::error::LinkResult;
use crate::session::LinkSession;
use crate::snapshot::StatusSnapshot;
use crate::state::{LinkEvent, LinkState};

/// Receives state changes for display.
pub trait Presenter {
    /// Connection state changed, or the retry counter moved.
    fn on_connection_state_changed(&mut self, state: LinkState, reconnect_attempts: u32);

    /// A subsystem's label changed.
    fn on_domain_event(&mut self, event: &DomainEvent);

    /// Something the operator must acknowledge.
    fn on_critical_alert(&mut self, alert: &CriticalAlert);
}

/// Ties a link session, a dispatcher and a presenter together.
pub struct Console<P: Presenter> {
    session: LinkSession,
    dispatcher: Dispatcher,
    presenter: P,
}

impl<P: Presenter> Console<P> {
    /// Wrap a session. The snapshot starts from the session's current state.
    pub fn new(session: LinkSession, presenter: P) -> Self {
        let mut dispatcher = Dispatcher::new();
        dispatcher.apply_link_state(session.state(), session.reconnect_attempts());
        Console {
            session,
            dispatcher,
            presenter,
        }
    }

    /// Connect, optionally to a new host on the configured port.
    ///
    /// Does nothing while connected.
    pub fn request_connect(&mut self, address: Option<&str>) -> LinkResult<()> {
        if self.session.state().is_connected() {
            info!("Already connected; connect request ignored");
            return Ok(());
        }
        if let Some(host) = address {
            let (_, port) = self.session.remote();
            self.session.set_remote(host, port);
        }
        let result = self.session.connect();
        self.pump();
        result
    }

    /// Ask the module for a full status report.
    pub fn request_status(&mut self) -> LinkResult<()> {
        self.session.send_command(Command::GetStatus)
    }

    /// Start a calibration run.
    pub fn request_calibrate(&mut self) -> LinkResult<()> {
        self.session.send_command(Command::Calibrate)?;
        self.dispatcher.begin_calibration();
        Ok(())
    }

    /// Flip periodic reporting and tell the module.
    pub fn request_toggle_reporting(&mut self) -> LinkResult<()> {
        let enabled = self.dispatcher.toggle_reporting();
        debug!(enabled, "Toggling reporting");
        self.session
            .send_command(Command::ReportingToggle { enabled })
    }

    /// Flip on-board data logging and tell the module.
    pub fn request_toggle_logging(&mut self) -> LinkResult<()> {
        let enabled = self.dispatcher.toggle_logging();
        debug!(enabled, "Toggling logging");
        self.session.send_command(Command::LoggingToggle { enabled })
    }

    /// Close the link and deliver the final state change.
    pub fn shutdown(&mut self) {
        self.session.close();
        self.pump();
    }

    /// Apply every queued link event. Returns how many were handled.
    pub fn pump(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(event) = self.session.events().try_recv() {
            self.handle(event);
            handled += 1;
        }
        handled
    }

    /// Wait up to `timeout` for link events, then apply everything queued.
    pub fn pump_timeout(&mut self, timeout: Duration) -> usize {
        let deadline = Instant::now() + timeout;
        let first = self
            .session
            .events()
            .recv_timeout(deadline.saturating_duration_since(Instant::now()));

        match first {
            Ok(event) => {
                self.handle(event);
                1 + self.pump()
            }
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => 0,
        }
    }

    /// Latest status as seen by the dispatcher.
    pub fn snapshot(&self) -> &StatusSnapshot {
        self.dispatcher.snapshot()
    }

    /// The underlying link.
    pub fn session(&self) -> &LinkSession {
        &self.session
    }

    /// The presentation sink.
    pub fn presenter(&self) -> &P {
        &self.presenter
    }

    /// Mutable access to the presentation sink.
    pub fn presenter_mut(&mut self) -> &mut P {
        &mut self.presenter
    }

    fn handle(&mut self, event: LinkEvent) {
        match event {
            LinkEvent::StateChanged {
                state,
                reconnect_attempts,
            } => {
                self.dispatcher.apply_link_state(state, reconnect_attempts);
                self.presenter
                    .on_connection_state_changed(state, reconnect_attempts);
            }
            LinkEvent::ConnectionLost { reason } => {
                warn!("Connection to sensor module lost: {}", reason);
            }
            LinkEvent::Record(record) => {
                if let DispatchOutcome::Updated { event, alert } = self.dispatcher.dispatch(&record) {
                    self.presenter.on_domain_event(&event);
                    if let Some(alert) = alert {
                        self.presenter.on_critical_alert(&alert);
                    }
                }
            }
            // Already logged and counted by the read loop.
            LinkEvent::DecodeError(_) => {}
        }
    }
}
