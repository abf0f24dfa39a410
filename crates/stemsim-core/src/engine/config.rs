use crate::core::optics::aberration::{Aberration, default_aberrations};
use thiserror::Error;

/// Largest grid edge accepted, in pixels.
pub const MAX_GRID_SIZE: usize = 4096;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),

    #[error("Invalid value for '{name}': {reason}")]
    InvalidValue { name: &'static str, reason: String },
}

/// One complete, consistent set of microscope and scan settings.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationParameters {
    /// Accelerating voltage (kV).
    pub voltage_kv: f64,
    /// Largest collection angle represented on the grid (mrad).
    pub max_angle_mrad: f64,
    /// Grid shape `(ny, nx)` in pixels.
    pub grid_shape: [usize; 2],
    /// Probe-forming aperture half-angle (mrad).
    pub aperture_mrad: f64,
    pub aberrations: Vec<Aberration>,
    /// Probe position `(x, y)` in Å.
    pub scan_position: [f64; 2],
}

impl Default for SimulationParameters {
    fn default() -> Self {
        Self {
            voltage_kv: 200.0,
            max_angle_mrad: 50.0,
            grid_shape: [256, 256],
            aperture_mrad: 15.0,
            aberrations: default_aberrations(),
            scan_position: [0.0, 0.0],
        }
    }
}

impl SimulationParameters {
    pub fn builder() -> SimulationParametersBuilder {
        SimulationParametersBuilder::new()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        check_voltage(self.voltage_kv)?;
        check_max_angle(self.max_angle_mrad)?;
        check_grid_shape(self.grid_shape)?;
        check_aperture(self.aperture_mrad)?;
        check_aberrations(&self.aberrations)?;
        check_scan_position(self.scan_position)?;
        Ok(())
    }
}

fn invalid(name: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        name,
        reason: reason.into(),
    }
}

fn positive(name: &'static str, value: f64) -> Result<f64, ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(invalid(name, format!("expected a positive number, got {value}")))
    }
}

pub fn check_voltage(kv: f64) -> Result<f64, ConfigError> {
    positive("voltage_kv", kv)
}

pub fn check_max_angle(mrad: f64) -> Result<f64, ConfigError> {
    positive("max_angle_mrad", mrad)
}

/// Accepts any finite aperture; a non-positive one is reported later by the
/// probe stage.
pub fn check_aperture(mrad: f64) -> Result<f64, ConfigError> {
    if mrad.is_finite() {
        Ok(mrad)
    } else {
        Err(invalid("aperture_mrad", format!("{mrad} is not finite")))
    }
}

pub fn check_grid_shape(shape: [usize; 2]) -> Result<[usize; 2], ConfigError> {
    if shape.iter().all(|&n| (2..=MAX_GRID_SIZE).contains(&n)) {
        Ok(shape)
    } else {
        Err(invalid(
            "grid_shape",
            format!("each edge must lie in 2..={MAX_GRID_SIZE}, got {shape:?}"),
        ))
    }
}

pub fn check_scan_position(position: [f64; 2]) -> Result<[f64; 2], ConfigError> {
    if position.iter().all(|v| v.is_finite()) {
        Ok(position)
    } else {
        Err(invalid(
            "scan_position",
            format!("{position:?} is not finite"),
        ))
    }
}

pub fn check_aberrations(aberrations: &[Aberration]) -> Result<(), ConfigError> {
    match aberrations
        .iter()
        .find(|ab| !(ab.coefficient.re.is_finite() && ab.coefficient.im.is_finite()))
    {
        Some(ab) => Err(invalid(
            "aberrations",
            format!("{} has a non-finite coefficient", ab.label()),
        )),
        None => Ok(()),
    }
}

#[derive(Default)]
pub struct SimulationParametersBuilder {
    voltage_kv: Option<f64>,
    max_angle_mrad: Option<f64>,
    grid_shape: Option<[usize; 2]>,
    aperture_mrad: Option<f64>,
    aberrations: Option<Vec<Aberration>>,
    scan_position: Option<[f64; 2]>,
}

impl SimulationParametersBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn voltage_kv(mut self, kv: f64) -> Self {
        self.voltage_kv = Some(kv);
        self
    }
    pub fn max_angle_mrad(mut self, mrad: f64) -> Self {
        self.max_angle_mrad = Some(mrad);
        self
    }
    pub fn grid_shape(mut self, shape: [usize; 2]) -> Self {
        self.grid_shape = Some(shape);
        self
    }
    pub fn grid_size(self, n: usize) -> Self {
        self.grid_shape([n, n])
    }
    pub fn aperture_mrad(mut self, mrad: f64) -> Self {
        self.aperture_mrad = Some(mrad);
        self
    }
    pub fn aberrations(mut self, aberrations: Vec<Aberration>) -> Self {
        self.aberrations = Some(aberrations);
        self
    }
    pub fn scan_position(mut self, position: [f64; 2]) -> Self {
        self.scan_position = Some(position);
        self
    }

    pub fn build(self) -> Result<SimulationParameters, ConfigError> {
        let params = SimulationParameters {
            voltage_kv: self
                .voltage_kv
                .ok_or(ConfigError::MissingParameter("voltage_kv"))?,
            max_angle_mrad: self
                .max_angle_mrad
                .ok_or(ConfigError::MissingParameter("max_angle_mrad"))?,
            grid_shape: self
                .grid_shape
                .ok_or(ConfigError::MissingParameter("grid_shape"))?,
            aperture_mrad: self
                .aperture_mrad
                .ok_or(ConfigError::MissingParameter("aperture_mrad"))?,
            aberrations: self
                .aberrations
                .ok_or(ConfigError::MissingParameter("aberrations"))?,
            scan_position: self
                .scan_position
                .ok_or(ConfigError::MissingParameter("scan_position"))?,
        };
        params.validate()?;
        Ok(params)
    }
}
