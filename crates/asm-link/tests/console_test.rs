//! Console façade tests: commands out, presenter callbacks in.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::time::{Duration, Instant};

use asm_link::{
    Console, CriticalAlert, DomainEvent, EventKind, LinkConfig, LinkSession, LinkState,
    ManualScheduler, Presenter, Severity, TcpConnector,
};

const TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Default)]
struct RecordingPresenter {
    states: Vec<(LinkState, u32)>,
    events: Vec<DomainEvent>,
    alerts: Vec<CriticalAlert>,
}

impl Presenter for RecordingPresenter {
    fn on_connection_state_changed(&mut self, state: LinkState, reconnect_attempts: u32) {
        self.states.push((state, reconnect_attempts));
    }

    fn on_domain_event(&mut self, event: &DomainEvent) {
        self.events.push(event.clone());
    }

    fn on_critical_alert(&mut self, alert: &CriticalAlert) {
        self.alerts.push(alert.clone());
    }
}

fn connected_console() -> (Console<RecordingPresenter>, TcpStream) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let config = LinkConfig::default().with_host("127.0.0.1").with_port(port);
    let session = LinkSession::with_parts(
        config,
        Arc::new(TcpConnector),
        Arc::new(ManualScheduler::new()),
    )
    .unwrap();

    let mut console = Console::new(session, RecordingPresenter::default());
    console.request_connect(None).unwrap();

    let (mut peer, _) = listener.accept().unwrap();
    peer.set_read_timeout(Some(TIMEOUT)).unwrap();
    assert_eq!(read_exactly(&mut peer, 11), "getStatus:0");
    (console, peer)
}

fn read_exactly(peer: &mut TcpStream, len: usize) -> String {
    let mut buf = vec![0u8; len];
    peer.read_exact(&mut buf).unwrap();
    String::from_utf8(buf).unwrap()
}

/// Pump until `done` holds or the timeout passes.
fn pump_until(console: &mut Console<RecordingPresenter>, done: impl Fn(&RecordingPresenter) -> bool) {
    let deadline = Instant::now() + TIMEOUT;
    while !done(console.presenter()) && Instant::now() < deadline {
        console.pump_timeout(Duration::from_millis(20));
    }
    assert!(done(console.presenter()), "condition not reached in time");
}

#[test]
fn test_connect_reports_state_to_presenter() {
    let (console, _peer) = connected_console();
    assert_eq!(
        console.presenter().states,
        vec![(LinkState::Connecting, 0), (LinkState::Connected, 0)]
    );
    assert_eq!(console.snapshot().connection, LinkState::Connected);
}

#[test]
fn test_request_status_twice_writes_twice() {
    let (mut console, mut peer) = connected_console();
    console.request_status().unwrap();
    console.request_status().unwrap();
    assert_eq!(read_exactly(&mut peer, 22), "getStatus:0getStatus:0");
}

#[test]
fn test_toggles_follow_local_state() {
    let (mut console, mut peer) = connected_console();

    console.request_toggle_reporting().unwrap();
    assert_eq!(read_exactly(&mut peer, 17), "reportingToggle:1");
    assert!(console.snapshot().reporting_enabled);

    console.request_toggle_reporting().unwrap();
    assert_eq!(read_exactly(&mut peer, 17), "reportingToggle:0");

    // The module's report wins over the local flag.
    peer.write_all(b"loggingStatus:1").unwrap();
    pump_until(&mut console, |p| !p.events.is_empty());
    console.request_toggle_logging().unwrap();
    assert_eq!(read_exactly(&mut peer, 15), "loggingToggle:0");
}

#[test]
fn test_calibration_failure_raises_alert() {
    let (mut console, mut peer) = connected_console();

    console.request_calibrate().unwrap();
    assert_eq!(read_exactly(&mut peer, 11), "calibrate:1");
    assert!(console.snapshot().calibration_pending);

    peer.write_all(b"calibrationStatus:-2").unwrap();
    pump_until(&mut console, |p| !p.alerts.is_empty());

    let presenter = console.presenter();
    assert_eq!(presenter.alerts[0].title, "Calibration Failure");
    assert_eq!(presenter.events[0].kind, EventKind::CalibrationStatus);
    assert_eq!(presenter.events[0].severity, Severity::Critical);
    assert!(!console.snapshot().calibration_pending);
}

#[test]
fn test_unrecognized_records_do_not_stop_dispatch() {
    let (mut console, mut peer) = connected_console();

    peer.write_all(b"gyroData:7|batteryStatus:47|sonarStatus:9").unwrap();
    pump_until(&mut console, |p| !p.events.is_empty());

    let battery = console.snapshot().battery.clone().unwrap();
    assert_eq!(battery.label, "Battery: 47%");
    assert_eq!(battery.level, Some(4));
    assert_eq!(console.presenter().events.len(), 1);
    assert!(console.snapshot().sonar.is_none());
}

#[test]
fn test_request_connect_while_connected_is_ignored() {
    let (mut console, _peer) = connected_console();
    console.request_connect(Some("10.255.255.1")).unwrap();
    assert_eq!(console.session().state(), LinkState::Connected);
    assert_eq!(console.session().remote().0, "127.0.0.1");
}

#[test]
fn test_shutdown_reports_disconnect() {
    let (mut console, _peer) = connected_console();
    console.shutdown();
    assert_eq!(
        console.presenter().states.last(),
        Some(&(LinkState::Disconnected, 0))
    );
    assert!(console.request_status().is_err());
}
