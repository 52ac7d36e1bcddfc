//! Transport capability consumed by the connection manager, plus the
//! WebSocket implementation used against real vehicles.

use std::time::Duration;

use anyhow::{anyhow, Result};
use futures::{SinkExt, StreamExt};
use tokio::{
    sync::mpsc,
    time::{sleep_until, Instant},
};
use tokio_tungstenite::{
    connect_async,
    tungstenite::{
        protocol::{frame::coding::CloseCode, CloseFrame},
        Message,
    },
};
use tracing::{debug, info};

pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
/// How long a closing link waits for the peer's close frame before dropping
/// the socket.
pub const DEFAULT_CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Identifies one connection attempt. Events from links that are no longer
/// current are ignored by the manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LinkId(pub u64);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    Text(String),
    Binary(Vec<u8>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Opened,
    Message(Inbound),
    Closed { code: u16, reason: String },
    Failure(String),
}

pub type TransportEventSender = mpsc::UnboundedSender<(LinkId, TransportEvent)>;
pub type TransportEventReceiver = mpsc::UnboundedReceiver<(LinkId, TransportEvent)>;

/// Event sink handed to a transport when a link is opened; tags every event
/// with the link it belongs to.
#[derive(Debug, Clone)]
pub struct TransportEvents {
    link: LinkId,
    tx: TransportEventSender,
}

impl TransportEvents {
    pub fn new(link: LinkId, tx: TransportEventSender) -> Self {
        Self { link, tx }
    }

    pub fn link(&self) -> LinkId {
        self.link
    }

    /// Returns false once the control loop has gone away.
    pub fn emit(&self, event: TransportEvent) -> bool {
        self.tx.send((self.link, event)).is_ok()
    }
}

pub trait Transport: Send + 'static {
    /// Starts connecting without blocking; the outcome arrives as an
    /// `Opened` or `Failure` event.
    fn open(&self, url: &str, events: TransportEvents) -> Box<dyn TransportLink>;
}

pub trait TransportLink: Send {
    /// Hands one complete text frame to the transport.
    fn send(&self, text: String) -> Result<()>;
    fn close(&self, code: u16, reason: &str);
}

#[derive(Debug, Clone)]
pub struct WsTransport {
    connect_timeout: Duration,
    close_timeout: Duration,
}

impl WsTransport {
    pub fn new(connect_timeout: Duration) -> Self {
        Self {
            connect_timeout,
            close_timeout: DEFAULT_CLOSE_TIMEOUT,
        }
    }

    pub fn with_close_timeout(mut self, close_timeout: Duration) -> Self {
        self.close_timeout = close_timeout;
        self
    }
}

impl Default for WsTransport {
    fn default() -> Self {
        Self::new(DEFAULT_CONNECT_TIMEOUT)
    }
}

impl Transport for WsTransport {
    fn open(&self, url: &str, events: TransportEvents) -> Box<dyn TransportLink> {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_ws_link(
            url.to_string(),
            self.connect_timeout,
            self.close_timeout,
            rx,
            events,
        ));
        Box::new(WsLink { tx })
    }
}

enum Outbound {
    Text(String),
    Close { code: u16, reason: String },
}

struct WsLink {
    tx: mpsc::UnboundedSender<Outbound>,
}

impl TransportLink for WsLink {
    fn send(&self, text: String) -> Result<()> {
        self.tx
            .send(Outbound::Text(text))
            .map_err(|_| anyhow!("websocket link is no longer running"))
    }

    fn close(&self, code: u16, reason: &str) {
        let _ = self.tx.send(Outbound::Close {
            code,
            reason: reason.to_string(),
        });
    }
}

async fn run_ws_link(
    url: String,
    connect_timeout: Duration,
    close_timeout: Duration,
    mut outbound: mpsc::UnboundedReceiver<Outbound>,
    events: TransportEvents,
) {
    let ws_stream = match tokio::time::timeout(connect_timeout, connect_async(url.as_str())).await {
        Ok(Ok((ws_stream, _))) => ws_stream,
        Ok(Err(err)) => {
            events.emit(TransportEvent::Failure(err.to_string()));
            return;
        }
        Err(_) => {
            events.emit(TransportEvent::Failure(format!(
                "timed out after {}s connecting to {url}",
                connect_timeout.as_secs_f32()
            )));
            return;
        }
    };
    info!(link = events.link().0, %url, "websocket: connected");
    events.emit(TransportEvent::Opened);

    let (mut writer, mut reader) = ws_stream.split();
    let mut closing = false;
    let mut close_deadline: Option<Instant> = None;
    let mut close_info: Option<(u16, String)> = None;

    loop {
        if closing && close_deadline.is_none() {
            close_deadline = Some(Instant::now() + close_timeout);
        }
        let close_wait = close_deadline.unwrap_or_else(Instant::now);
        tokio::select! {
            _ = sleep_until(close_wait), if close_deadline.is_some() => {
                debug!(link = events.link().0, "websocket: close handshake timed out");
                break;
            }
            request = outbound.recv(), if !closing => match request {
                Some(Outbound::Text(text)) => {
                    if let Err(err) = writer.send(Message::Text(text)).await {
                        let error = format!("websocket send failed: {err}");
                        events.emit(TransportEvent::Failure(error));
                        return;
                    }
                }
                Some(Outbound::Close { code, reason }) => {
                    closing = true;
                    close_info.get_or_insert_with(|| (code, reason.clone()));
                    let frame = CloseFrame {
                        code: CloseCode::from(code),
                        reason: reason.into(),
                    };
                    if writer.send(Message::Close(Some(frame))).await.is_err() {
                        break;
                    }
                }
                None => {
                    // Every handle is gone; shut the socket down quietly.
                    closing = true;
                    let _ = writer.send(Message::Close(None)).await;
                }
            },
            incoming = reader.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    events.emit(TransportEvent::Message(Inbound::Text(text)));
                }
                Some(Ok(Message::Binary(bytes))) => {
                    events.emit(TransportEvent::Message(Inbound::Binary(bytes)));
                }
                Some(Ok(Message::Close(frame))) => {
                    debug!(link = events.link().0, ?frame, "websocket: close frame received");
                    match frame {
                        Some(frame) => {
                            close_info = Some((u16::from(frame.code), frame.reason.into_owned()));
                        }
                        None => {
                            close_info.get_or_insert((1005, String::new()));
                        }
                    }
                    closing = true;
                }
                Some(Ok(_)) => {}
                Some(Err(err)) => {
                    if closing {
                        break;
                    }
                    events.emit(TransportEvent::Failure(err.to_string()));
                    return;
                }
                None => break,
            },
        }
    }

    let (code, reason) = close_info.unwrap_or_else(|| (1006, "connection lost".to_string()));
    events.emit(TransportEvent::Closed { code, reason });
}

#[cfg(test)]
#[path = "tests/transport_tests.rs"]
mod tests;
