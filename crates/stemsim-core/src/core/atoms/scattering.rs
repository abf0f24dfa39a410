use super::params::element_params;
use crate::core::error::SimulationError;
use ndarray::Array2;
use num_complex::Complex64;

/// Electron scattering amplitude `f(k²)` (Å) of element `atomic_number`,
/// evaluated over a field of squared spatial frequencies (1/Å²).
pub fn scattering_amplitude(
    k2: &Array2<f64>,
    atomic_number: u8,
) -> Result<Array2<Complex64>, SimulationError> {
    let params =
        element_params(atomic_number).ok_or(SimulationError::UnsupportedElement(atomic_number))?;

    Ok(k2.mapv(|k2| {
        let amplitude: f64 = params
            .lorentzian
            .iter()
            .zip(&params.gaussian)
            .map(|(l, g)| l.amplitude / (k2 + l.width) + g.amplitude * (-g.rate * k2).exp())
            .sum();
        Complex64::new(amplitude, 0.0)
    }))
}
