use super::cell::{UnitCell, structure_factor};
use crate::core::electron::Electron;
use crate::core::error::SimulationError;
use crate::core::grid::ReciprocalGrid;
use crate::core::spectral::{Normalization, ifft2};
use ndarray::{Array1, Array2};
use num_complex::Complex64;
use std::f64::consts::PI;
use tracing::{debug, instrument, warn};

/// Largest physical size (Å, per axis) that is filled with unit cells.
pub const MAX_TILED_EXTENT: f64 = 50.0;

/// A finite `n_a × n_b` block of unit cells, centred on the field origin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatticeTiling {
    pub n_a: usize,
    pub n_b: usize,
    /// Translation `(x, y)` applied to every cell origin.
    pub shift: [f64; 2],
    a: f64,
    b: f64,
}

impl LatticeTiling {
    pub fn for_field(extent: [f64; 2], cell: &UnitCell, cap: f64) -> Self {
        let [extent_y, extent_x] = extent;
        let n_a = (extent_x.min(cap) / cell.a).floor().max(0.0) as usize;
        let n_b = (extent_y.min(cap) / cell.b).floor().max(0.0) as usize;
        let shift = [
            -(n_a as f64 - 0.5) * cell.a / 2.0,
            -(n_b as f64) * cell.b / 2.0,
        ];
        Self {
            n_a,
            n_b,
            shift,
            a: cell.a,
            b: cell.b,
        }
    }

    pub fn cell_count(&self) -> usize {
        self.n_a * self.n_b
    }

    /// Origin `(x, y)` of cell `(i, j)`.
    pub fn origin(&self, i: usize, j: usize) -> [f64; 2] {
        [
            i as f64 * self.a + self.shift[0],
            j as f64 * self.b + self.shift[1],
        ]
    }

    fn axis_sum(k_axis: &Array1<f64>, count: usize, pitch: f64, offset: f64) -> Array1<Complex64> {
        k_axis.mapv(|k| {
            (0..count)
                .map(|n| {
                    let r = n as f64 * pitch + offset;
                    Complex64::new(0.0, -2.0 * PI * k * r).exp()
                })
                .sum()
        })
    }
}

/// Superposes a unit-cell structure factor over every cell of `tiling`:
/// `Σ_ij A(k) exp(-2πi (ky·y_ij + kx·x_ij))`.
///
/// The translations form a separable rectangular lattice, so the double sum is
/// evaluated as the product of one sum along each frequency axis.
pub fn lattice_amplitude(
    grid: &ReciprocalGrid,
    unit_amplitude: &Array2<Complex64>,
    tiling: &LatticeTiling,
) -> Array2<Complex64> {
    let along_y = LatticeTiling::axis_sum(grid.ky_axis(), tiling.n_b, tiling.b, tiling.shift[1]);
    let along_x = LatticeTiling::axis_sum(grid.kx_axis(), tiling.n_a, tiling.a, tiling.shift[0]);

    Array2::from_shape_fn(grid.dim(), |(i, j)| {
        unit_amplitude[(i, j)] * along_y[i] * along_x[j]
    })
}

/// Projected phase (rad) of the tiled specimen, in FFT order.
#[instrument(skip_all, name = "specimen_phase")]
pub fn object_phase(
    grid: &ReciprocalGrid,
    electron: &Electron,
    cell: &UnitCell,
) -> Result<Array2<f64>, SimulationError> {
    let tiling = LatticeTiling::for_field(grid.extent(), cell, MAX_TILED_EXTENT);
    if tiling.cell_count() == 0 {
        warn!(
            extent = ?grid.extent(),
            "Field of view is smaller than one unit cell; the specimen is empty."
        );
    }
    debug!(n_a = tiling.n_a, n_b = tiling.n_b, "Tiling unit cells.");

    let mut amplitude = {
        let unit_amplitude = structure_factor(grid, cell)?;
        lattice_amplitude(grid, &unit_amplitude, &tiling)
    };
    ifft2(&mut amplitude, Normalization::Backward);

    let [ny, nx] = grid.shape();
    let [extent_y, extent_x] = grid.extent();
    let scale = (ny * nx) as f64 / (extent_y * extent_x) * electron.gamma * electron.wavelength;

    Ok(amplitude.mapv(|v| v.norm() * scale))
}
