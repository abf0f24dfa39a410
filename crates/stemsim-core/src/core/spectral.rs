//! Discrete Fourier tools over 2-D fields.
//!
//! Transforms follow numpy's conventions: `fft2` is unscaled and `ifft2`
//! divides by the number of samples under [`Normalization::Backward`], while
//! [`Normalization::Ortho`] scales both directions by `1/sqrt(N)` so that
//! `Σ|x|²` is preserved. Shifts place the zero frequency at the geometric
//! centre (`fftshift`) or back at index 0 (`ifftshift`).

use ndarray::{Array1, Array2, Zip};
use num_complex::Complex64;
use rustfft::{Fft, FftPlanner};
use std::cell::RefCell;
use std::sync::Arc;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

thread_local! {
    static PLANNER: RefCell<FftPlanner<f64>> = RefCell::new(FftPlanner::new());
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Normalization {
    #[default]
    Backward,
    Ortho,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Forward,
    Inverse,
}

pub fn fft2(field: &mut Array2<Complex64>, norm: Normalization) {
    transform_2d(field, Direction::Forward, norm);
}

pub fn ifft2(field: &mut Array2<Complex64>, norm: Normalization) {
    transform_2d(field, Direction::Inverse, norm);
}

fn plan(len: usize, direction: Direction) -> Arc<dyn Fft<f64>> {
    PLANNER.with(|planner| {
        let mut planner = planner.borrow_mut();
        match direction {
            Direction::Forward => planner.plan_fft_forward(len),
            Direction::Inverse => planner.plan_fft_inverse(len),
        }
    })
}

fn transform_rows(field: &mut Array2<Complex64>, direction: Direction) {
    let (_, nx) = field.dim();
    if nx == 0 {
        return;
    }
    let fft = plan(nx, direction);

    if field.as_slice_mut().is_none() {
        *field = field.as_standard_layout().into_owned();
    }
    // Standard layout was just enforced above.
    let Some(data) = field.as_slice_mut() else {
        return;
    };

    #[cfg(not(feature = "parallel"))]
    data.chunks_mut(nx).for_each(|row| fft.process(row));

    #[cfg(feature = "parallel")]
    data.par_chunks_mut(nx).for_each(|row| fft.process(row));
}

fn transform_2d(field: &mut Array2<Complex64>, direction: Direction, norm: Normalization) {
    let (ny, nx) = field.dim();
    if ny == 0 || nx == 0 {
        return;
    }

    transform_rows(field, direction);
    let mut transposed = field.t().as_standard_layout().into_owned();
    transform_rows(&mut transposed, direction);
    *field = transposed.t().as_standard_layout().into_owned();

    let n = (ny * nx) as f64;
    let scale = match (norm, direction) {
        (Normalization::Backward, Direction::Forward) => None,
        (Normalization::Backward, Direction::Inverse) => Some(1.0 / n),
        (Normalization::Ortho, _) => Some(1.0 / n.sqrt()),
    };
    if let Some(scale) = scale {
        field.mapv_inplace(|v| v * scale);
    }
}

fn roll_1d<T: Clone>(axis: &Array1<T>, shift: usize) -> Array1<T> {
    let n = axis.len();
    Array1::from_shape_fn(n, |i| axis[(i + n - shift % n.max(1)) % n].clone())
}

fn roll_2d<T: Clone>(field: &Array2<T>, shift_y: usize, shift_x: usize) -> Array2<T> {
    let (ny, nx) = field.dim();
    Array2::from_shape_fn((ny, nx), |(i, j)| {
        field[((i + ny - shift_y) % ny, (j + nx - shift_x) % nx)].clone()
    })
}

pub fn fftshift_1d<T: Clone>(axis: &Array1<T>) -> Array1<T> {
    roll_1d(axis, axis.len() / 2)
}

pub fn ifftshift_1d<T: Clone>(axis: &Array1<T>) -> Array1<T> {
    let n = axis.len();
    roll_1d(axis, n - n / 2)
}

pub fn fftshift<T: Clone>(field: &Array2<T>) -> Array2<T> {
    let (ny, nx) = field.dim();
    roll_2d(field, ny / 2, nx / 2)
}

pub fn ifftshift<T: Clone>(field: &Array2<T>) -> Array2<T> {
    let (ny, nx) = field.dim();
    roll_2d(field, ny - ny / 2, nx - nx / 2)
}

pub fn abs2(field: &Array2<Complex64>) -> Array2<f64> {
    field.mapv(|v| v.norm_sqr())
}

pub fn total_intensity(field: &Array2<Complex64>) -> f64 {
    field.iter().map(|v| v.norm_sqr()).sum()
}

/// Minimum and maximum over the finite entries, or `None` if there are none.
pub fn intensity_range(field: &Array2<f64>) -> Option<(f64, f64)> {
    field
        .iter()
        .copied()
        .filter(|v| v.is_finite())
        .fold(None, |range, v| match range {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
}

/// `log10` of the intensity, clamped from below at `floor` times the peak.
pub fn log_scaled(intensity: &Array2<f64>, floor: f64) -> Array2<f64> {
    let peak = intensity_range(intensity).map_or(0.0, |(_, hi)| hi);
    let min_value = (peak * floor).max(f64::MIN_POSITIVE);
    intensity.mapv(|v| v.max(min_value).log10())
}

/// Element-wise `a * b` for complex fields of identical shape.
pub(crate) fn multiply_in_place(field: &mut Array2<Complex64>, factor: &Array2<Complex64>) {
    Zip::from(field).and(factor).for_each(|f, &g| *f *= g);
}
