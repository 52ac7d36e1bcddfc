//! Control channel for driving a vehicle over a single WebSocket
//! connection: gesture normalization, the connection state machine,
//! repeat-while-held dispatch and the operator event log.

pub mod calibration;
pub mod connection;
pub mod event_log;
pub mod input;
pub mod repeat;
pub mod runtime;
pub mod transport;

pub use calibration::{CalibrationStore, OperatorSettings};
pub use connection::{ConnectionManager, ControlEvent, NORMAL_CLOSURE, USER_CLOSE_REASON};
pub use event_log::{EventLog, DEFAULT_LOG_CAPACITY};
pub use input::{AxisTracker, JoystickGeometry, JoystickTracker, Point};
pub use repeat::{CommandSink, HeldInputSession, RepeatDispatcher, DEFAULT_REPEAT_INTERVAL};
pub use runtime::{spawn_control_loop, ControlConfig, ControlHandle, ControlSnapshot};
pub use transport::{
    Inbound, LinkId, Transport, TransportEvent, TransportEvents, TransportLink, WsTransport,
    DEFAULT_CLOSE_TIMEOUT, DEFAULT_CONNECT_TIMEOUT,
};
