//! The control loop: one task owns the connection, the calibration store and
//! the event log; everything else talks to it through [`ControlHandle`].

use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use shared::{
    domain::{
        ActionToken, ConnectionState, ControlScalar, ControlVector, DriveButton, Endpoint,
        MotorCoefficients,
    },
    protocol::{Command, ProtocolGeneration},
};
use tokio::{
    sync::{broadcast, mpsc, oneshot},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

use crate::{
    calibration::{CalibrationStore, OperatorSettings},
    connection::{ConnectionManager, ControlEvent},
    event_log::{EventLog, DEFAULT_LOG_CAPACITY},
    repeat::{CommandSink, RepeatDispatcher, DEFAULT_REPEAT_INTERVAL},
    transport::{Transport, TransportEventReceiver},
};

const EVENT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq)]
pub struct ControlConfig {
    pub endpoint: Endpoint,
    pub coefficients: MotorCoefficients,
    pub log_capacity: usize,
    pub repeat_interval: Duration,
    pub protocol: ProtocolGeneration,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            endpoint: Endpoint::default(),
            coefficients: MotorCoefficients::default(),
            log_capacity: DEFAULT_LOG_CAPACITY,
            repeat_interval: DEFAULT_REPEAT_INTERVAL,
            protocol: ProtocolGeneration::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ControlSnapshot {
    pub state: ConnectionState,
    pub endpoint: Endpoint,
    pub coefficients: MotorCoefficients,
    /// Oldest first.
    pub log: Vec<String>,
}

enum ControlCommand {
    Toggle {
        reply: oneshot::Sender<ConnectionState>,
    },
    Issue(Command),
    SaveSettings(OperatorSettings),
    Snapshot {
        reply: oneshot::Sender<ControlSnapshot>,
    },
    Shutdown,
}

struct ControlSession<T: Transport> {
    connection: ConnectionManager<T>,
    calibration: CalibrationStore,
}

impl<T: Transport> ControlSession<T> {
    fn handle(&mut self, command: ControlCommand) {
        match command {
            ControlCommand::Toggle { reply } => {
                let previous = self.connection.toggle();
                let _ = reply.send(previous);
            }
            ControlCommand::Issue(command) => self.issue(command),
            ControlCommand::SaveSettings(settings) => self.save_settings(settings),
            ControlCommand::Snapshot { reply } => {
                let _ = reply.send(self.snapshot());
            }
            // Handled by the loop itself.
            ControlCommand::Shutdown => {}
        }
    }

    fn issue(&mut self, command: Command) {
        match &command {
            Command::Action(token) => self.connection.record(format!("Action: {token}")),
            Command::Move(vector) => debug!(x = vector.x, y = vector.y, "control: move"),
            Command::Rotate(scalar) => debug!(x = scalar.x, "control: rotate"),
            Command::Calibrate(coefficients) => {
                warn!(%coefficients, "control: calibration only goes out through saved settings");
                return;
            }
        }
        self.connection.send(&command);
    }

    fn save_settings(&mut self, settings: OperatorSettings) {
        self.connection.set_endpoint(settings.endpoint.clone());
        let coefficients = self.calibration.apply(&settings);
        info!(endpoint = %settings.endpoint, %coefficients, "control: settings saved");
        self.connection.send(&Command::Calibrate(coefficients));
        self.connection.record(format!("IP changed to {}", settings.endpoint.host));
        self.connection.record(format!("Port changed to {}", settings.endpoint.port));
        self.connection.record(format!("Motor coefficients: {coefficients}"));
    }

    fn snapshot(&self) -> ControlSnapshot {
        ControlSnapshot {
            state: self.connection.state(),
            endpoint: self.connection.endpoint().clone(),
            coefficients: self.calibration.coefficients(),
            log: self.connection.log_snapshot(),
        }
    }
}

/// Cheap to clone; every clone talks to the same control loop. The loop
/// stops once every handle is dropped or [`ControlHandle::shutdown`] is called.
#[derive(Clone)]
pub struct ControlHandle {
    commands: mpsc::UnboundedSender<ControlCommand>,
    events: broadcast::Sender<ControlEvent>,
    repeat_interval: Duration,
}

impl ControlHandle {
    /// Returns the connection state from before the toggle. Subscribe to
    /// events to follow the state the toggle leads to.
    pub async fn toggle(&self) -> Result<ConnectionState> {
        let (reply, rx) = oneshot::channel();
        self.dispatch(ControlCommand::Toggle { reply })?;
        rx.await.context("control loop dropped toggle request")
    }

    /// Queues a move, rotate or action command. Calibration is rejected;
    /// it goes out through [`ControlHandle::save_settings`].
    pub fn issue(&self, command: Command) -> Result<()> {
        if let Command::Calibrate(_) = command {
            bail!("calibration must be sent through save_settings");
        }
        self.dispatch(ControlCommand::Issue(command))
    }

    pub fn move_to(&self, vector: ControlVector) -> Result<()> {
        self.issue(Command::Move(vector))
    }

    pub fn rotate(&self, scalar: ControlScalar) -> Result<()> {
        self.issue(Command::Rotate(scalar))
    }

    pub fn action(&self, token: ActionToken) -> Result<()> {
        self.issue(Command::Action(token))
    }

    /// Replaces the endpoint, stores and transmits the coefficients.
    pub fn save_settings(&self, settings: OperatorSettings) -> Result<()> {
        self.dispatch(ControlCommand::SaveSettings(settings))
    }

    pub async fn snapshot(&self) -> Result<ControlSnapshot> {
        let (reply, rx) = oneshot::channel();
        self.dispatch(ControlCommand::Snapshot { reply })?;
        rx.await.context("control loop dropped snapshot request")
    }

    pub async fn state(&self) -> Result<ConnectionState> {
        Ok(self.snapshot().await?.state)
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ControlEvent> {
        self.events.subscribe()
    }

    pub fn dispatcher(&self, button: DriveButton) -> RepeatDispatcher<ControlHandle> {
        RepeatDispatcher::for_button(self.clone(), button, self.repeat_interval)
    }

    pub fn shutdown(&self) {
        let _ = self.commands.send(ControlCommand::Shutdown);
    }

    fn dispatch(&self, command: ControlCommand) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_| anyhow!("control loop is not running"))
    }
}

impl CommandSink for ControlHandle {
    fn submit(&self, command: Command) {
        if let Err(err) = self.issue(command) {
            warn!(%err, "control: dropping repeated command");
        }
    }
}

/// Starts the control loop on the current tokio runtime.
pub fn spawn_control_loop<T: Transport>(
    transport: T,
    config: ControlConfig,
) -> (ControlHandle, JoinHandle<()>) {
    let (commands_tx, commands_rx) = mpsc::unbounded_channel();
    let (transport_tx, transport_rx) = mpsc::unbounded_channel();
    let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

    let connection = ConnectionManager::new(
        transport,
        config.endpoint,
        config.protocol,
        EventLog::new(config.log_capacity),
        transport_tx,
        events.clone(),
    );
    let session = ControlSession {
        connection,
        calibration: CalibrationStore::new(config.coefficients),
    };

    let task = tokio::spawn(run_control_loop(session, commands_rx, transport_rx));
    let handle = ControlHandle {
        commands: commands_tx,
        events,
        repeat_interval: config.repeat_interval,
    };
    (handle, task)
}

async fn run_control_loop<T: Transport>(
    mut session: ControlSession<T>,
    mut commands: mpsc::UnboundedReceiver<ControlCommand>,
    mut transport_events: TransportEventReceiver,
) {
    info!("control loop started");
    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(ControlCommand::Shutdown) | None => break,
                Some(command) => session.handle(command),
            },
            Some((link, event)) = transport_events.recv() => {
                session.connection.handle_transport_event(link, event);
            }
        }
    }
    session.connection.shutdown();
    info!("control loop stopped");
}

#[cfg(test)]
#[path = "tests/runtime_tests.rs"]
mod tests;
