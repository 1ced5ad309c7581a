//! Telemetry link for the Autonomous Sensor Module console
//!
//! This crate keeps a persistent TCP connection to the sensor module, recovers
//! from drops with bounded, time-spaced retries and turns inbound records into
//! typed status updates.
//!
//! # Components
//!
//! - [`LinkSession`]: socket ownership, connection state, reconnect policy
//! - [`Scheduler`]: cancellable repeating timers ([`ThreadScheduler`] for real
//!   use, [`ManualScheduler`] for stepping retries by hand)
//! - [`Dispatcher`]: record → [`DomainEvent`] mapping and the [`StatusSnapshot`]
//! - [`Console`]: the command surface (`request_*`, `shutdown`) driving a
//!   [`Presenter`]
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use asm_link::{Console, CriticalAlert, DomainEvent, LinkConfig, LinkSession, LinkState, Presenter};
//!
//! struct Print;
//!
//! impl Presenter for Print {
//!     fn on_connection_state_changed(&mut self, state: LinkState, _attempts: u32) {
//!         println!("{}", state);
//!     }
//!     fn on_domain_event(&mut self, event: &DomainEvent) {
//!         println!("{}", event.label);
//!     }
//!     fn on_critical_alert(&mut self, alert: &CriticalAlert) {
//!         eprintln!("{}: {}", alert.title, alert.text);
//!     }
//! }
//!
//! let session = LinkSession::open(LinkConfig::default().with_host("192.168.4.1"))?;
//! let mut console = Console::new(session, Print);
//! console.request_connect(None)?;
//! loop {
//!     console.pump_timeout(Duration::from_millis(100));
//! }
//! # Ok::<(), asm_link::LinkError>(())
//! ```

mod config;
mod console;
mod dispatcher;
mod error;
mod scheduler;
mod session;
mod snapshot;
mod state;
mod transport;

pub use config::{LinkConfig, DEFAULT_HOST};
pub use console::{Console, Presenter};
pub use dispatcher::{
    CriticalAlert, DispatchOutcome, Dispatcher, DomainEvent, EventKind, CALIBRATION_FAILURE_TITLE,
};
pub use error::{LinkError, LinkResult};
pub use scheduler::{ManualScheduler, Scheduler, ThreadScheduler, TimerHandle, TimerTask};
pub use session::LinkSession;
pub use snapshot::{BatteryReading, Severity, StatusEntry, StatusSnapshot};
pub use state::{ConnectTrigger, LinkEvent, LinkState};
pub use transport::{Connector, LinkStream, TcpConnector};
