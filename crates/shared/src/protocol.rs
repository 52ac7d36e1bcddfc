use serde::{Deserialize, Serialize};

use crate::{
    domain::{ActionToken, ControlScalar, ControlVector, MotorCoefficients},
    error::ProtocolError,
};

/// Action name the vehicle uses for a calibration update.
pub const CALIBRATION_ACTION: &str = "asc";

/// A logical command produced by the operator's controls, before encoding.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Move(ControlVector),
    Rotate(ControlScalar),
    Action(ActionToken),
    Calibrate(MotorCoefficients),
}

impl Command {
    pub fn action(token: impl Into<String>) -> Self {
        Command::Action(ActionToken::new(token))
    }

    pub fn stop() -> Self {
        Command::Action(ActionToken::stop())
    }
}

/// Which message format the vehicle firmware expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProtocolGeneration {
    /// `{"type": ...}` JSON envelopes.
    #[default]
    Typed,
    /// Bare action text and untyped `{"x": .., "y": ..}` positions, as spoken
    /// by early firmware builds.
    Legacy,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum WireMessage {
    #[serde(rename = "PSJ")]
    Position { x: i32, y: i32 },
    #[serde(rename = "RTJ")]
    Rotation { x: i32 },
    #[serde(rename = "BSTS")]
    ButtonStatus(ButtonStatus),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ButtonStatus {
    pub action: String,
    #[serde(flatten)]
    pub calibration: Option<CalibrationValues>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CalibrationValues {
    pub c1: f64,
    pub c2: f64,
    pub c3: f64,
    pub c4: f64,
}

impl WireMessage {
    pub fn from_command(command: &Command) -> Result<Self, ProtocolError> {
        let message = match command {
            Command::Move(vector) => WireMessage::Position {
                x: to_percent(vector.x),
                y: to_percent(vector.y),
            },
            Command::Rotate(scalar) => WireMessage::Rotation {
                x: to_percent(scalar.x),
            },
            Command::Action(token) => {
                if token.as_str().is_empty() {
                    return Err(ProtocolError::EmptyAction);
                }
                WireMessage::ButtonStatus(ButtonStatus {
                    action: token.as_str().to_string(),
                    calibration: None,
                })
            }
            Command::Calibrate(coefficients) => {
                let [c1, c2, c3, c4] = coefficients.as_array().map(two_decimals);
                WireMessage::ButtonStatus(ButtonStatus {
                    action: CALIBRATION_ACTION.to_string(),
                    calibration: Some(CalibrationValues { c1, c2, c3, c4 }),
                })
            }
        };
        Ok(message)
    }

    pub fn to_text(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Encodes a command into the text frame sent to the vehicle.
pub fn encode(command: &Command, generation: ProtocolGeneration) -> Result<String, ProtocolError> {
    match (generation, command) {
        (ProtocolGeneration::Legacy, Command::Action(token)) => {
            if token.as_str().is_empty() {
                return Err(ProtocolError::EmptyAction);
            }
            Ok(token.as_str().to_string())
        }
        (ProtocolGeneration::Legacy, Command::Move(vector)) => Ok(format!(
            "{{\"x\": {:.3}, \"y\": {:.3}}}",
            bounded(vector.x),
            bounded(vector.y)
        )),
        (ProtocolGeneration::Legacy, Command::Rotate(scalar)) => {
            Ok(format!("{{\"x\": {:.3}}}", bounded(scalar.x)))
        }
        // Calibration never had an untyped form.
        _ => WireMessage::from_command(command)?.to_text(),
    }
}

fn bounded(value: f32) -> f32 {
    if value.is_finite() {
        value.clamp(-1.0, 1.0)
    } else {
        0.0
    }
}

/// Integer percentage, truncated toward zero.
fn to_percent(value: f32) -> i32 {
    (bounded(value) * 100.0) as i32
}

fn two_decimals(value: f32) -> f64 {
    (f64::from(value) * 100.0).round() / 100.0
}
