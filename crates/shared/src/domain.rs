use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CalibrationError;

pub const DEFAULT_HOST: &str = "10.38.3.118";
pub const DEFAULT_PORT: &str = "4000";

/// Slider range accepted for a single motor-speed coefficient.
pub const COEFFICIENT_MIN: f32 = 0.0;
pub const COEFFICIENT_MAX: f32 = 4.0;

/// Token the vehicle interprets as "stop whatever the held button was doing".
pub const STOP_TOKEN: &str = "x";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

impl ConnectionState {
    pub fn is_connected(self) -> bool {
        self == ConnectionState::Connected
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
        };
        f.write_str(label)
    }
}

/// Vehicle address. Both parts are free-form text; nothing here checks that
/// they form a reachable address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Endpoint {
    pub host: String,
    pub port: String,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: port.into(),
        }
    }

    pub fn url(&self) -> String {
        format!("ws://{}:{}/", self.host, self.port)
    }
}

impl Default for Endpoint {
    fn default() -> Self {
        Self::new(DEFAULT_HOST, DEFAULT_PORT)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Normalized joystick deflection, each component in `[-1, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ControlVector {
    pub x: f32,
    pub y: f32,
}

impl ControlVector {
    pub const ZERO: ControlVector = ControlVector { x: 0.0, y: 0.0 };

    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn magnitude(self) -> f32 {
        self.x.hypot(self.y)
    }
}

/// Normalized deflection of the single-axis rotation stick, in `[-1, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ControlScalar {
    pub x: f32,
}

impl ControlScalar {
    pub const ZERO: ControlScalar = ControlScalar { x: 0.0 };

    pub fn new(x: f32) -> Self {
        Self { x }
    }
}

/// User-facing motor position on the chassis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MotorLabel {
    FrontLeft,
    FrontRight,
    BackRight,
    BackLeft,
}

impl MotorLabel {
    pub const ALL: [MotorLabel; 4] = [
        MotorLabel::FrontLeft,
        MotorLabel::FrontRight,
        MotorLabel::BackRight,
        MotorLabel::BackLeft,
    ];

    /// Slot this motor occupies in wire/storage order. The mapping is fixed
    /// by the vehicle firmware.
    pub fn wire_index(self) -> usize {
        match self {
            MotorLabel::FrontLeft => 2,
            MotorLabel::FrontRight => 3,
            MotorLabel::BackRight => 0,
            MotorLabel::BackLeft => 1,
        }
    }

    pub fn short_name(self) -> &'static str {
        match self {
            MotorLabel::FrontLeft => "FL",
            MotorLabel::FrontRight => "FR",
            MotorLabel::BackRight => "BR",
            MotorLabel::BackLeft => "BL",
        }
    }
}

/// The four motor-speed coefficients in wire order (`c1..c4` on the wire).
/// Every value is finite and inside `COEFFICIENT_MIN..=COEFFICIENT_MAX`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "[f32; 4]", into = "[f32; 4]")]
pub struct MotorCoefficients([f32; 4]);

impl MotorCoefficients {
    pub fn get(&self, label: MotorLabel) -> f32 {
        self.0[label.wire_index()]
    }

    pub fn set(&mut self, label: MotorLabel, value: f32) -> Result<(), CalibrationError> {
        self.0[label.wire_index()] = check_coefficient(value)?;
        Ok(())
    }

    pub fn as_array(&self) -> [f32; 4] {
        self.0
    }

    /// Accepts a wire-ordered array only if every value lies in the slider range.
    pub fn try_from_wire_order(values: [f32; 4]) -> Result<Self, CalibrationError> {
        for value in values {
            check_coefficient(value)?;
        }
        Ok(Self(values))
    }
}

impl TryFrom<[f32; 4]> for MotorCoefficients {
    type Error = CalibrationError;

    fn try_from(values: [f32; 4]) -> Result<Self, Self::Error> {
        Self::try_from_wire_order(values)
    }
}

impl From<MotorCoefficients> for [f32; 4] {
    fn from(coefficients: MotorCoefficients) -> Self {
        coefficients.0
    }
}

impl Default for MotorCoefficients {
    fn default() -> Self {
        Self([1.0; 4])
    }
}

impl fmt::Display for MotorCoefficients {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [c0, c1, c2, c3] = self.0;
        write!(f, "{c0:.2}, {c1:.2}, {c2:.2}, {c3:.2}")
    }
}

pub(crate) fn check_coefficient(value: f32) -> Result<f32, CalibrationError> {
    if !value.is_finite() {
        return Err(CalibrationError::NotFinite);
    }
    if !(COEFFICIENT_MIN..=COEFFICIENT_MAX).contains(&value) {
        return Err(CalibrationError::OutOfRange {
            value,
            min: COEFFICIENT_MIN,
            max: COEFFICIENT_MAX,
        });
    }
    Ok(value)
}

/// Parses operator-entered coefficient text, rejecting anything that is not
/// a finite number inside the slider range.
pub fn parse_coefficient(raw: &str) -> Result<f32, CalibrationError> {
    let trimmed = raw.trim();
    let value = trimmed
        .parse::<f32>()
        .map_err(|_| CalibrationError::NotNumeric(trimmed.to_string()))?;
    check_coefficient(value)
}

/// Discrete action token as it appears in the `action` field on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActionToken(String);

impl ActionToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn stop() -> Self {
        Self::new(STOP_TOKEN)
    }

    pub fn pick() -> Self {
        Self::new("PICK")
    }

    pub fn drop_item() -> Self {
        Self::new("DROP")
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ActionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ActionToken {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Fine-drive and rotation buttons. These repeat their action while held and
/// send [`STOP_TOKEN`] on release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriveButton {
    Forward,
    Back,
    Left,
    Right,
    Halt,
    RotateLeft,
    RotateRight,
}

impl DriveButton {
    pub const ALL: [DriveButton; 7] = [
        DriveButton::Forward,
        DriveButton::Back,
        DriveButton::Left,
        DriveButton::Right,
        DriveButton::Halt,
        DriveButton::RotateLeft,
        DriveButton::RotateRight,
    ];

    pub fn token(self) -> ActionToken {
        let token = match self {
            DriveButton::Forward => "w",
            DriveButton::Back => "q",
            DriveButton::Left => "a",
            DriveButton::Right => "z",
            DriveButton::Halt => STOP_TOKEN,
            DriveButton::RotateLeft => "<",
            DriveButton::RotateRight => ">",
        };
        ActionToken::new(token)
    }

    pub fn from_name(name: &str) -> Option<Self> {
        let button = match name.to_ascii_lowercase().as_str() {
            "forward" | "up" | "w" => DriveButton::Forward,
            "back" | "down" | "q" => DriveButton::Back,
            "left" | "a" => DriveButton::Left,
            "right" | "z" => DriveButton::Right,
            "halt" | "stop" | "x" => DriveButton::Halt,
            "rotate_left" | "<" => DriveButton::RotateLeft,
            "rotate_right" | ">" => DriveButton::RotateRight,
            _ => return None,
        };
        Some(button)
    }
}

/// One-shot buttons on the vehicle pad, named by their printed label. The
/// label and the token sent differ for most of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionButton {
    U,
    P,
    S,
    X,
    D,
    G,
    L,
    M,
    N,
}

impl ActionButton {
    pub const ALL: [ActionButton; 9] = [
        ActionButton::U,
        ActionButton::P,
        ActionButton::S,
        ActionButton::X,
        ActionButton::D,
        ActionButton::G,
        ActionButton::L,
        ActionButton::M,
        ActionButton::N,
    ];

    pub fn label(self) -> &'static str {
        match self {
            ActionButton::U => "U",
            ActionButton::P => "P",
            ActionButton::S => "S",
            ActionButton::X => "X",
            ActionButton::D => "D",
            ActionButton::G => "G",
            ActionButton::L => "L",
            ActionButton::M => "M",
            ActionButton::N => "N",
        }
    }

    pub fn token(self) -> ActionToken {
        let token = match self {
            ActionButton::U => "u",
            ActionButton::P => "g",
            ActionButton::S => "r",
            ActionButton::X => "l",
            ActionButton::D => "d",
            ActionButton::G => "p",
            ActionButton::L => "o",
            ActionButton::M => "h",
            ActionButton::N => "k",
        };
        ActionToken::new(token)
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|button| button.label().eq_ignore_ascii_case(label))
    }
}
