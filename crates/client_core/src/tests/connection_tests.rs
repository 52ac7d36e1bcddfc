use std::sync::{Arc, Mutex};

use shared::domain::{ActionToken, ControlVector};
use tokio::sync::mpsc;

use super::*;
use crate::transport::TransportEventReceiver;

#[derive(Default)]
struct Calls {
    opened: Vec<String>,
    sent: Vec<String>,
    closed: Vec<(u16, String)>,
}

#[derive(Clone, Default)]
struct RecordingTransport {
    calls: Arc<Mutex<Calls>>,
}

struct RecordingLink {
    calls: Arc<Mutex<Calls>>,
}

impl Transport for RecordingTransport {
    fn open(&self, url: &str, _events: TransportEvents) -> Box<dyn TransportLink> {
        self.calls.lock().expect("calls").opened.push(url.to_string());
        Box::new(RecordingLink {
            calls: Arc::clone(&self.calls),
        })
    }
}

impl TransportLink for RecordingLink {
    fn send(&self, text: String) -> anyhow::Result<()> {
        self.calls.lock().expect("calls").sent.push(text);
        Ok(())
    }

    fn close(&self, code: u16, reason: &str) {
        self.calls
            .lock()
            .expect("calls")
            .closed
            .push((code, reason.to_string()));
    }
}

struct Harness {
    manager: ConnectionManager<RecordingTransport>,
    calls: Arc<Mutex<Calls>>,
    events: broadcast::Receiver<ControlEvent>,
    _transport_rx: TransportEventReceiver,
}

fn harness_with(protocol: ProtocolGeneration) -> Harness {
    let transport = RecordingTransport::default();
    let calls = Arc::clone(&transport.calls);
    let (transport_tx, transport_rx) = mpsc::unbounded_channel();
    let (events_tx, events) = broadcast::channel(64);
    let manager = ConnectionManager::new(
        transport,
        Endpoint::default(),
        protocol,
        EventLog::new(7),
        transport_tx,
        events_tx,
    );
    Harness {
        manager,
        calls,
        events,
        _transport_rx: transport_rx,
    }
}

fn harness() -> Harness {
    harness_with(ProtocolGeneration::Typed)
}

fn connected() -> Harness {
    let mut h = harness();
    h.manager.toggle();
    h.manager.handle_transport_event(LinkId(1), TransportEvent::Opened);
    h
}

fn drain(events: &mut broadcast::Receiver<ControlEvent>) -> Vec<ControlEvent> {
    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push(event);
    }
    seen
}

#[test]
fn toggle_from_disconnected_opens_link_and_reports_previous_state() {
    let mut h = harness();

    let previous = h.manager.toggle();

    assert_eq!(previous, ConnectionState::Disconnected);
    assert_eq!(h.manager.state(), ConnectionState::Connecting);
    assert_eq!(
        h.calls.lock().expect("calls").opened,
        vec!["ws://10.38.3.118:4000/".to_string()]
    );
}

#[test]
fn open_event_connects_and_logs_endpoint() {
    let mut h = harness();
    h.manager.toggle();
    h.manager.handle_transport_event(LinkId(1), TransportEvent::Opened);

    assert_eq!(h.manager.state(), ConnectionState::Connected);
    assert_eq!(
        h.manager.log_snapshot(),
        vec!["Connected (10.38.3.118:4000)".to_string()]
    );
    assert_eq!(
        drain(&mut h.events),
        vec![
            ControlEvent::StateChanged(ConnectionState::Connecting),
            ControlEvent::StateChanged(ConnectionState::Connected),
            ControlEvent::LogAppended("Connected (10.38.3.118:4000)".to_string()),
        ]
    );
}

#[test]
fn send_while_disconnected_never_reaches_transport() {
    let mut h = harness();

    assert!(!h.manager.send(&Command::action("w")));
    h.manager.toggle();
    assert!(!h.manager.send(&Command::Move(ControlVector::new(0.5, 0.5))));

    let calls = h.calls.lock().expect("calls");
    assert!(calls.sent.is_empty());
}

#[test]
fn send_while_connected_hands_encoded_frame_to_transport() {
    let mut h = connected();

    assert!(h.manager.send(&Command::Move(ControlVector::new(0.5, -0.3))));
    assert!(h.manager.send(&Command::Action(ActionToken::pick())));

    assert_eq!(
        h.calls.lock().expect("calls").sent,
        vec![
            r#"{"type":"PSJ","x":50,"y":-30}"#.to_string(),
            r#"{"type":"BSTS","action":"PICK"}"#.to_string(),
        ]
    );
}

#[test]
fn legacy_protocol_sends_bare_action_text() {
    let mut h = harness_with(ProtocolGeneration::Legacy);
    h.manager.toggle();
    h.manager.handle_transport_event(LinkId(1), TransportEvent::Opened);

    h.manager.send(&Command::action("w"));

    assert_eq!(h.calls.lock().expect("calls").sent, vec!["w".to_string()]);
}

#[test]
fn toggle_while_connecting_is_a_no_op() {
    let mut h = harness();
    h.manager.toggle();

    let previous = h.manager.toggle();

    assert_eq!(previous, ConnectionState::Connecting);
    assert_eq!(h.manager.state(), ConnectionState::Connecting);
    assert_eq!(h.calls.lock().expect("calls").opened.len(), 1);
}

#[test]
fn toggle_while_connected_closes_and_disconnects_immediately() {
    let mut h = connected();

    let previous = h.manager.toggle();

    assert_eq!(previous, ConnectionState::Connected);
    assert_eq!(h.manager.state(), ConnectionState::Disconnected);
    assert_eq!(
        h.calls.lock().expect("calls").closed,
        vec![(1000, "User initiated".to_string())]
    );
    assert_eq!(
        h.manager.log_snapshot().last().map(String::as_str),
        Some("Disconnected by user")
    );

    // The transport's late confirmation belongs to a link we already dropped.
    h.manager.handle_transport_event(
        LinkId(1),
        TransportEvent::Closed {
            code: 1000,
            reason: "User initiated".to_string(),
        },
    );
    assert_eq!(h.manager.log_snapshot().len(), 2);
    assert!(!h.manager.send(&Command::stop()));
}

#[test]
fn failure_resets_state_and_allows_retry() {
    let mut h = harness();
    h.manager.toggle();

    h.manager.handle_transport_event(
        LinkId(1),
        TransportEvent::Failure("Connection refused (os error 111)".to_string()),
    );

    assert_eq!(h.manager.state(), ConnectionState::Disconnected);
    assert_eq!(
        h.manager.log_snapshot(),
        vec!["Connection Failed: Connection refused (os error 111)".to_string()]
    );

    assert_eq!(h.manager.toggle(), ConnectionState::Disconnected);
    assert_eq!(h.manager.state(), ConnectionState::Connecting);
    assert_eq!(h.calls.lock().expect("calls").opened.len(), 2);
}

#[test]
fn unexpected_close_is_logged_with_reason() {
    let mut h = connected();

    h.manager.handle_transport_event(
        LinkId(1),
        TransportEvent::Closed {
            code: 1001,
            reason: "vehicle rebooting".to_string(),
        },
    );

    assert_eq!(h.manager.state(), ConnectionState::Disconnected);
    assert_eq!(
        h.manager.log_snapshot().last().map(String::as_str),
        Some("Disconnected: vehicle rebooting")
    );
}

#[test]
fn stale_link_events_do_not_disturb_a_newer_attempt() {
    let mut h = connected();
    h.manager.toggle();
    h.manager.toggle();
    assert_eq!(h.manager.state(), ConnectionState::Connecting);

    h.manager.handle_transport_event(
        LinkId(1),
        TransportEvent::Failure("broken pipe".to_string()),
    );
    h.manager.handle_transport_event(LinkId(1), TransportEvent::Opened);
    assert_eq!(h.manager.state(), ConnectionState::Connecting);

    h.manager.handle_transport_event(LinkId(2), TransportEvent::Opened);
    assert_eq!(h.manager.state(), ConnectionState::Connected);
}

#[test]
fn inbound_messages_are_accepted_and_ignored() {
    let mut h = connected();
    let before = h.manager.log_snapshot();

    h.manager.handle_transport_event(
        LinkId(1),
        TransportEvent::Message(Inbound::Text("{\"battery\":87}".to_string())),
    );
    h.manager.handle_transport_event(
        LinkId(1),
        TransportEvent::Message(Inbound::Binary(vec![1, 2, 3])),
    );

    assert_eq!(h.manager.state(), ConnectionState::Connected);
    assert_eq!(h.manager.log_snapshot(), before);
}

#[test]
fn endpoint_change_applies_to_next_connect() {
    let mut h = harness();
    h.manager.set_endpoint(Endpoint::new("192.168.61.78", "80"));
    h.manager.toggle();
    h.manager.handle_transport_event(LinkId(1), TransportEvent::Opened);

    assert_eq!(
        h.calls.lock().expect("calls").opened,
        vec!["ws://192.168.61.78:80/".to_string()]
    );
    assert_eq!(
        h.manager.log_snapshot(),
        vec!["Connected (192.168.61.78:80)".to_string()]
    );
}

#[test]
fn shutdown_closes_pending_link_without_logging() {
    let mut h = harness();
    h.manager.toggle();

    h.manager.shutdown();

    assert_eq!(h.manager.state(), ConnectionState::Disconnected);
    assert_eq!(
        h.calls.lock().expect("calls").closed,
        vec![(1000, "User initiated".to_string())]
    );
    assert!(h.manager.log_snapshot().is_empty());
}
