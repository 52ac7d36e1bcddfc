use shared::{
    domain::{parse_coefficient, Endpoint, MotorCoefficients, MotorLabel},
    error::CalibrationError,
};

/// Values produced by the settings form: where to connect and the four
/// per-motor coefficients keyed by their user-facing position. Only built
/// through [`OperatorSettings::new`] or [`OperatorSettings::parse`].
#[derive(Debug, Clone, PartialEq)]
pub struct OperatorSettings {
    pub endpoint: Endpoint,
    coefficients: MotorCoefficients,
}

impl OperatorSettings {
    pub fn new(
        endpoint: Endpoint,
        front_left: f32,
        front_right: f32,
        back_right: f32,
        back_left: f32,
    ) -> Result<Self, CalibrationError> {
        let mut coefficients = MotorCoefficients::default();
        coefficients.set(MotorLabel::FrontLeft, front_left)?;
        coefficients.set(MotorLabel::FrontRight, front_right)?;
        coefficients.set(MotorLabel::BackRight, back_right)?;
        coefficients.set(MotorLabel::BackLeft, back_left)?;
        Ok(Self {
            endpoint,
            coefficients,
        })
    }

    /// Builds settings from raw form text, in FL, FR, BR, BL order.
    pub fn parse(endpoint: Endpoint, coefficients: [&str; 4]) -> Result<Self, CalibrationError> {
        let [fl, fr, br, bl] = coefficients;
        Self::new(
            endpoint,
            parse_coefficient(fl)?,
            parse_coefficient(fr)?,
            parse_coefficient(br)?,
            parse_coefficient(bl)?,
        )
    }

    pub fn value(&self, label: MotorLabel) -> f32 {
        self.coefficients.get(label)
    }

    pub fn coefficients(&self) -> MotorCoefficients {
        self.coefficients
    }
}

/// Holds the coefficients in wire order.
#[derive(Debug, Clone, Default)]
pub struct CalibrationStore {
    coefficients: MotorCoefficients,
}

impl CalibrationStore {
    pub fn new(coefficients: MotorCoefficients) -> Self {
        Self { coefficients }
    }

    pub fn apply(&mut self, settings: &OperatorSettings) -> MotorCoefficients {
        self.coefficients = settings.coefficients();
        self.coefficients
    }

    pub fn coefficients(&self) -> MotorCoefficients {
        self.coefficients
    }
}
