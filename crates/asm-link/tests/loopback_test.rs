//! Link session tests against a real TCP peer on the loopback interface.
//!
//! Retries go through a `ManualScheduler`, so nothing here waits on the
//! reconnect interval.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use asm_link::{LinkConfig, LinkError, LinkEvent, LinkSession, LinkState, ManualScheduler, TcpConnector};
use asm_protocol::{Command, DecodedEvent};

const EVENT_TIMEOUT: Duration = Duration::from_secs(5);

fn listen() -> (TcpListener, LinkConfig) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind loopback");
    let port = listener.local_addr().unwrap().port();
    let config = LinkConfig::default().with_host("127.0.0.1").with_port(port);
    (listener, config)
}

fn open(config: LinkConfig) -> (LinkSession, Arc<ManualScheduler>) {
    let scheduler = Arc::new(ManualScheduler::new());
    let session = LinkSession::with_parts(config, Arc::new(TcpConnector), scheduler.clone())
        .expect("valid config");
    (session, scheduler)
}

fn accept(listener: &TcpListener) -> TcpStream {
    let (peer, _) = listener.accept().expect("accept");
    peer.set_read_timeout(Some(EVENT_TIMEOUT)).unwrap();
    peer
}

fn read_exactly(peer: &mut TcpStream, len: usize) -> String {
    let mut buf = vec![0u8; len];
    peer.read_exact(&mut buf).expect("peer read");
    String::from_utf8(buf).unwrap()
}

fn next_event(session: &LinkSession) -> LinkEvent {
    session
        .events()
        .recv_timeout(EVENT_TIMEOUT)
        .expect("link event")
}

/// Skip state changes until a record arrives.
fn next_record(session: &LinkSession) -> DecodedEvent {
    loop {
        if let LinkEvent::Record(record) = next_event(session) {
            return record;
        }
    }
}

/// Wait for the given state to be announced.
fn wait_for_state(session: &LinkSession, wanted: LinkState) {
    loop {
        if let LinkEvent::StateChanged { state, .. } = next_event(session) {
            if state == wanted {
                return;
            }
        }
    }
}

// ============================================================================
// Connect
// ============================================================================

#[test]
fn test_connect_requests_status_immediately() {
    let (listener, config) = listen();
    let (session, _scheduler) = open(config);

    session.connect().expect("connect");
    let mut peer = accept(&listener);

    assert_eq!(read_exactly(&mut peer, 11), "getStatus:0");
    assert_eq!(session.state(), LinkState::Connected);
    assert_eq!(session.reconnect_attempts(), 0);

    assert_eq!(
        next_event(&session),
        LinkEvent::StateChanged {
            state: LinkState::Connecting,
            reconnect_attempts: 0
        }
    );
    assert_eq!(
        next_event(&session),
        LinkEvent::StateChanged {
            state: LinkState::Connected,
            reconnect_attempts: 0
        }
    );
}

#[test]
fn test_connect_while_connected_is_noop() {
    let (listener, config) = listen();
    let (session, _scheduler) = open(config);

    session.connect().unwrap();
    let mut peer = accept(&listener);
    read_exactly(&mut peer, 11);

    session.connect().expect("second connect is a no-op");
    assert_eq!(session.state(), LinkState::Connected);

    // No second status request was written.
    session.send_command(Command::Calibrate).unwrap();
    assert_eq!(read_exactly(&mut peer, 11), "calibrate:1");
}

#[test]
fn test_manual_connect_failure_leaves_disconnected() {
    let (listener, config) = listen();
    drop(listener);
    let (session, scheduler) = open(config);

    let err = session.connect().unwrap_err();
    assert!(matches!(err, LinkError::ConnectFailed { .. }), "{:?}", err);
    assert_eq!(session.state(), LinkState::Disconnected);
    assert_eq!(scheduler.pending(), 0);
}

// ============================================================================
// Read Loop
// ============================================================================

#[test]
fn test_records_arrive_in_order() {
    let (listener, config) = listen();
    let (session, _scheduler) = open(config);

    session.connect().unwrap();
    let mut peer = accept(&listener);
    read_exactly(&mut peer, 11);

    peer.write_all(b"altitude:150|sonarData:42\0\0\0\x04").unwrap();
    assert_eq!(next_record(&session), DecodedEvent::new("altitude", "150"));
    assert_eq!(next_record(&session), DecodedEvent::new("sonarData", "42"));

    peer.write_all(b"batteryStatus:-1").unwrap();
    assert_eq!(next_record(&session), DecodedEvent::new("batteryStatus", "-1"));
}

#[test]
fn test_malformed_record_does_not_drop_siblings() {
    let (listener, config) = listen();
    let (session, _scheduler) = open(config);

    session.connect().unwrap();
    let mut peer = accept(&listener);
    read_exactly(&mut peer, 11);

    peer.write_all(b"garbage|lidarStatus:0").unwrap();

    let mut saw_error = false;
    loop {
        match next_event(&session) {
            LinkEvent::DecodeError(_) => saw_error = true,
            LinkEvent::Record(record) => {
                assert_eq!(record, DecodedEvent::new("lidarStatus", "0"));
                break;
            }
            _ => {}
        }
    }
    assert!(saw_error);
}

// ============================================================================
// Writes
// ============================================================================

#[test]
fn test_repeated_status_requests_are_not_coalesced() {
    let (listener, config) = listen();
    let (session, _scheduler) = open(config);

    session.connect().unwrap();
    let mut peer = accept(&listener);
    read_exactly(&mut peer, 11);

    session.send_command(Command::GetStatus).unwrap();
    session.send_command(Command::GetStatus).unwrap();
    assert_eq!(read_exactly(&mut peer, 22), "getStatus:0getStatus:0");
}

#[test]
fn test_send_without_connection() {
    let (_listener, config) = listen();
    let (session, _scheduler) = open(config);

    assert!(matches!(
        session.send("getStatus", 0),
        Err(LinkError::NotConnected)
    ));
}

#[test]
fn test_close_releases_blocked_writer() {
    let (listener, config) = listen();
    let (session, _scheduler) = open(config);
    let session = Arc::new(session);

    session.connect().unwrap();
    // Never read from the peer, so the socket buffers fill up.
    let _peer = accept(&listener);

    let writer = {
        let session = session.clone();
        let event = "x".repeat(64 * 1024);
        thread::spawn(move || {
            let mut written = 0usize;
            while session.send(&event, 0).is_ok() {
                written += 1;
            }
            written
        })
    };
    thread::sleep(Duration::from_secs(1));

    let (done_tx, done_rx) = crossbeam_channel::bounded(1);
    {
        let session = session.clone();
        thread::spawn(move || {
            session.close();
            let _ = done_tx.send(());
        });
    }

    assert!(
        done_rx.recv_timeout(Duration::from_secs(3)).is_ok(),
        "close stalled behind a blocked write"
    );
    assert!(writer.join().unwrap() > 0);
    assert_eq!(session.state(), LinkState::Disconnected);
}

// ============================================================================
// Disconnect and Recovery
// ============================================================================

#[test]
fn test_peer_close_schedules_reconnect() {
    let (listener, config) = listen();
    let (session, scheduler) = open(config.with_reconnect_interval(Duration::from_secs(5)));

    session.connect().unwrap();
    let mut peer = accept(&listener);
    read_exactly(&mut peer, 11);
    drop(peer);

    wait_for_state(&session, LinkState::Reconnecting);
    assert!(session.reconnect_pending());
    assert_eq!(scheduler.pending(), 1);
    assert_eq!(scheduler.intervals(), vec![Duration::from_secs(5)]);
    assert!(matches!(
        session.send("getStatus", 0),
        Err(LinkError::NotConnected)
    ));

    // The peer is still listening, so the first tick reconnects.
    assert_eq!(scheduler.fire(), 1);
    let mut peer = accept(&listener);
    assert_eq!(read_exactly(&mut peer, 11), "getStatus:0");

    assert_eq!(session.state(), LinkState::Connected);
    assert_eq!(session.reconnect_attempts(), 0);
    assert!(!session.reconnect_pending());
    assert_eq!(scheduler.pending(), 0);
}

#[test]
fn test_close_cancels_reconnect_and_rejects_connect() {
    let (listener, config) = listen();
    let (session, scheduler) = open(config);

    session.connect().unwrap();
    let peer = accept(&listener);
    drop(peer);
    wait_for_state(&session, LinkState::Reconnecting);

    session.close();
    session.close();
    assert_eq!(session.state(), LinkState::Disconnected);
    assert_eq!(scheduler.pending(), 0);
    assert!(session.is_closed());
    assert!(matches!(session.connect(), Err(LinkError::Closed)));
}

#[test]
fn test_close_unblocks_reader() {
    let (listener, config) = listen();
    let (session, _scheduler) = open(config);

    session.connect().unwrap();
    let _peer = accept(&listener);

    // Returns only once the read loop has exited.
    session.close();
    assert_eq!(session.state(), LinkState::Disconnected);
    assert!(!session.reconnect_pending());
}
