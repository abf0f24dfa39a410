use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SimulationError {
    #[error("Configuration error: unknown/unsupported atomic number '{0}'")]
    UnsupportedElement(u8),

    #[error("Invalid parameter '{name}': {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error(
        "Degenerate aperture ({aperture_mrad} mrad): the probe has no intensity to normalize"
    )]
    DegenerateAperture { aperture_mrad: f64 },

    #[error("Shape mismatch: {left} is {left_shape:?} but {right} is {right_shape:?}")]
    ShapeMismatch {
        left: &'static str,
        left_shape: [usize; 2],
        right: &'static str,
        right_shape: [usize; 2],
    },
}

impl SimulationError {
    pub(crate) fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }
}

/// Rejects anything that is not a finite, strictly positive number.
pub(crate) fn require_positive(name: &'static str, value: f64) -> Result<f64, SimulationError> {
    if !value.is_finite() {
        return Err(SimulationError::invalid(name, format!("{value} is not finite")));
    }
    if value <= 0.0 {
        return Err(SimulationError::invalid(
            name,
            format!("{value} must be greater than zero"),
        ));
    }
    Ok(value)
}
