use super::probe::FormedProbe;
use crate::core::error::SimulationError;
use crate::core::grid::ReciprocalGrid;
use crate::core::spectral::{Normalization, abs2, fft2, fftshift, ifft2, multiply_in_place};
use ndarray::{Array2, Zip};
use num_complex::Complex64;
use std::f64::consts::PI;
use tracing::instrument;

/// Frequency-domain translation by `(x, y)` Å: `exp(-2πi (kx·x + ky·y))`.
pub fn fourier_shift_filter(grid: &ReciprocalGrid, position: [f64; 2]) -> Array2<Complex64> {
    let [x, y] = position;
    let (ky_axis, kx_axis) = (grid.ky_axis(), grid.kx_axis());
    Array2::from_shape_fn(grid.dim(), |(i, j)| {
        Complex64::new(0.0, -2.0 * PI * (kx_axis[j] * x + ky_axis[i] * y)).exp()
    })
}

fn check_shape(
    left: &'static str,
    left_shape: (usize, usize),
    right: &'static str,
    right_shape: (usize, usize),
) -> Result<(), SimulationError> {
    if left_shape == right_shape {
        return Ok(());
    }
    Err(SimulationError::ShapeMismatch {
        left,
        left_shape: [left_shape.0, left_shape.1],
        right,
        right_shape: [right_shape.0, right_shape.1],
    })
}

/// Real-space wave leaving the specimen when the probe sits at `position`
/// (`(x, y)` Å), in FFT order.
pub fn exit_wave(
    grid: &ReciprocalGrid,
    probe: &FormedProbe,
    phase: &Array2<f64>,
    position: [f64; 2],
) -> Result<Array2<Complex64>, SimulationError> {
    check_shape("probe", probe.dim(), "grid", grid.dim())?;
    check_shape("probe", probe.dim(), "specimen phase", phase.dim())?;

    let mut wave = probe.reciprocal.clone();
    multiply_in_place(&mut wave, &fourier_shift_filter(grid, position));
    ifft2(&mut wave, Normalization::Ortho);

    Zip::from(&mut wave).and(phase).for_each(|psi, &phi| {
        *psi *= Complex64::new(0.0, phi).exp();
    });
    Ok(wave)
}

/// Far-field intensity of the probe at `position` after the specimen,
/// centre-shifted.
#[instrument(skip_all, name = "diffraction_pattern")]
pub fn diffraction_pattern(
    grid: &ReciprocalGrid,
    probe: &FormedProbe,
    phase: &Array2<f64>,
    position: [f64; 2],
) -> Result<Array2<f64>, SimulationError> {
    let mut wave = exit_wave(grid, probe, phase, position)?;
    fft2(&mut wave, Normalization::Ortho);
    Ok(abs2(&fftshift(&wave)))
}
