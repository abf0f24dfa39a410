use super::error::{SimulationError, require_positive};
use std::f64::consts::PI;

/// h·c in eV·Å.
pub const HC_EV_ANGSTROM: f64 = 1.23984244e4;
/// Electron rest energy m₀c² in eV.
pub const REST_ENERGY_EV: f64 = 5.1099906e5;

/// Relativistic electron quantities for a fixed accelerating voltage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Electron {
    /// Kinetic energy (eV).
    pub energy: f64,
    /// de Broglie wavelength (Å).
    pub wavelength: f64,
    /// Lorentz factor (unitless).
    pub gamma: f64,
    /// Interaction constant (rad/(V·Å)).
    pub sigma: f64,
}

impl Electron {
    pub fn from_voltage(volts: f64) -> Result<Self, SimulationError> {
        let energy = require_positive("accelerating_voltage", volts)?;

        let momentum = (energy * (2.0 * REST_ENERGY_EV + energy)).sqrt();
        let wavelength = HC_EV_ANGSTROM / momentum;
        let gamma = energy / REST_ENERGY_EV + 1.0;
        let sigma = 2.0 * PI * wavelength * gamma * REST_ENERGY_EV / HC_EV_ANGSTROM.powi(2);

        Ok(Self {
            energy,
            wavelength,
            gamma,
            sigma,
        })
    }

    pub fn from_kilovolts(kv: f64) -> Result<Self, SimulationError> {
        Self::from_voltage(kv * 1e3)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wavelength_at_200_kv_matches_relativistic_de_broglie_value() {
        let electron = Electron::from_kilovolts(200.0).unwrap();
        assert!((electron.wavelength - 0.025079).abs() < 1e-5);
    }

    #[test]
    fn lorentz_factor_is_one_plus_energy_over_rest_energy() {
        let electron = Electron::from_kilovolts(300.0).unwrap();
        assert!((electron.gamma - (1.0 + 3.0e5 / REST_ENERGY_EV)).abs() < 1e-12);
    }

    #[test]
    fn interaction_constant_at_200_kv_is_close_to_tabulated_value() {
        let electron = Electron::from_kilovolts(200.0).unwrap();
        assert!((electron.sigma - 7.29e-4).abs() < 5e-6);
    }

    #[test]
    fn non_positive_voltage_is_rejected() {
        assert!(matches!(
            Electron::from_voltage(0.0),
            Err(SimulationError::InvalidParameter { name: "accelerating_voltage", .. })
        ));
        assert!(Electron::from_voltage(-5.0).is_err());
        assert!(Electron::from_voltage(f64::NAN).is_err());
    }
}
