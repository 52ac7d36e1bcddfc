use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("failed to serialize wire message: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("action token must not be empty")]
    EmptyAction,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CalibrationError {
    #[error("coefficient '{0}' is not a number")]
    NotNumeric(String),
    #[error("coefficient must be a finite number")]
    NotFinite,
    #[error("coefficient {value} outside allowed range [{min}, {max}]")]
    OutOfRange { value: f32, min: f32, max: f32 },
}
