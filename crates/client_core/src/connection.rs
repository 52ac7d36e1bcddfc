use shared::{
    domain::{ConnectionState, Endpoint},
    protocol::{encode, Command, ProtocolGeneration},
};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::{
    event_log::EventLog,
    transport::{
        Inbound, LinkId, Transport, TransportEvent, TransportEventSender, TransportEvents,
        TransportLink,
    },
};

pub const NORMAL_CLOSURE: u16 = 1000;
pub const USER_CLOSE_REASON: &str = "User initiated";

/// Notifications for observers of the control channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlEvent {
    StateChanged(ConnectionState),
    LogAppended(String),
}

struct ActiveLink {
    id: LinkId,
    endpoint: Endpoint,
    link: Box<dyn TransportLink>,
}

/// Owns the single vehicle connection. Every state change and every outbound
/// frame goes through here, so callers must serialize access (the control
/// loop in [`crate::runtime`] does).
pub struct ConnectionManager<T: Transport> {
    transport: T,
    endpoint: Endpoint,
    protocol: ProtocolGeneration,
    state: ConnectionState,
    active: Option<ActiveLink>,
    next_link: u64,
    transport_tx: TransportEventSender,
    log: EventLog,
    events: broadcast::Sender<ControlEvent>,
}

impl<T: Transport> ConnectionManager<T> {
    pub fn new(
        transport: T,
        endpoint: Endpoint,
        protocol: ProtocolGeneration,
        log: EventLog,
        transport_tx: TransportEventSender,
        events: broadcast::Sender<ControlEvent>,
    ) -> Self {
        Self {
            transport,
            endpoint,
            protocol,
            state: ConnectionState::Disconnected,
            active: None,
            next_link: 0,
            transport_tx,
            log,
            events,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Takes effect at the next connect attempt.
    pub fn set_endpoint(&mut self, endpoint: Endpoint) {
        self.endpoint = endpoint;
    }

    pub fn log_snapshot(&self) -> Vec<String> {
        self.log.snapshot()
    }

    /// Connects when disconnected, disconnects when connected, and does
    /// nothing while a connect attempt is pending. Returns the state as it
    /// was before the call.
    pub fn toggle(&mut self) -> ConnectionState {
        let previous = self.state;
        match previous {
            ConnectionState::Disconnected => self.open_link(),
            ConnectionState::Connecting => {
                debug!("connection: toggle ignored while connecting");
            }
            ConnectionState::Connected => {
                if let Some(active) = self.active.take() {
                    let endpoint = &active.endpoint;
                    info!(link = active.id.0, %endpoint, "connection: user close");
                    active.link.close(NORMAL_CLOSURE, USER_CLOSE_REASON);
                }
                self.set_state(ConnectionState::Disconnected);
                self.record("Disconnected by user");
            }
        }
        previous
    }

    fn open_link(&mut self) {
        self.next_link += 1;
        let id = LinkId(self.next_link);
        let url = self.endpoint.url();
        info!(link = id.0, %url, "connection: opening");
        let link = self
            .transport
            .open(&url, TransportEvents::new(id, self.transport_tx.clone()));
        self.active = Some(ActiveLink {
            id,
            endpoint: self.endpoint.clone(),
            link,
        });
        self.set_state(ConnectionState::Connecting);
    }

    /// Encodes and transmits `command` if connected. Anything sent while not
    /// connected is dropped. Returns whether the frame reached the transport.
    pub fn send(&mut self, command: &Command) -> bool {
        if !self.state.is_connected() {
            debug!(state = %self.state, ?command, "connection: dropping command");
            return false;
        }
        let Some(active) = self.active.as_ref() else {
            return false;
        };
        let text = match encode(command, self.protocol) {
            Ok(text) => text,
            Err(err) => {
                warn!(%err, ?command, "connection: failed to encode command");
                return false;
            }
        };
        match active.link.send(text) {
            Ok(()) => true,
            Err(err) => {
                warn!(link = active.id.0, %err, "connection: send failed");
                false
            }
        }
    }

    pub fn handle_transport_event(&mut self, link: LinkId, event: TransportEvent) {
        let current = match self.active.as_ref() {
            Some(active) if active.id == link => active,
            _ => {
                if !matches!(event, TransportEvent::Message(_)) {
                    debug!(link = link.0, ?event, "connection: ignoring event from stale link");
                }
                return;
            }
        };

        match event {
            TransportEvent::Opened => {
                let endpoint = current.endpoint.clone();
                info!(link = link.0, %endpoint, "connection: open");
                self.set_state(ConnectionState::Connected);
                self.record(format!("Connected ({endpoint})"));
            }
            TransportEvent::Message(inbound) => {
                // No inbound protocol is defined yet.
                match inbound {
                    Inbound::Text(text) => debug!(link = link.0, %text, "connection: inbound text"),
                    Inbound::Binary(bytes) => {
                        debug!(link = link.0, len = bytes.len(), "connection: inbound binary")
                    }
                }
            }
            TransportEvent::Closed { code, reason } => {
                info!(link = link.0, code, %reason, "connection: closed");
                self.active = None;
                self.set_state(ConnectionState::Disconnected);
                self.record(format!("Disconnected: {reason}"));
            }
            TransportEvent::Failure(error) => {
                warn!(link = link.0, %error, "connection: failed");
                self.active = None;
                self.set_state(ConnectionState::Disconnected);
                self.record(format!("Connection Failed: {error}"));
            }
        }
    }

    /// Appends an operator-facing line and notifies observers.
    pub fn record(&mut self, message: impl Into<String>) {
        let message = message.into();
        self.log.append(message.clone());
        let _ = self.events.send(ControlEvent::LogAppended(message));
    }

    /// Closes any open or pending link without logging; used when the
    /// control loop stops.
    pub fn shutdown(&mut self) {
        if let Some(active) = self.active.take() {
            active.link.close(NORMAL_CLOSURE, USER_CLOSE_REASON);
        }
        self.set_state(ConnectionState::Disconnected);
    }

    fn set_state(&mut self, state: ConnectionState) {
        if self.state != state {
            self.state = state;
            let _ = self.events.send(ControlEvent::StateChanged(state));
        }
    }
}

#[cfg(test)]
#[path = "tests/connection_tests.rs"]
mod tests;
