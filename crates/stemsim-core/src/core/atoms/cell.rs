use super::scattering::scattering_amplitude;
use crate::core::error::SimulationError;
use crate::core::grid::ReciprocalGrid;
use ndarray::{Array2, Zip};
use num_complex::Complex64;
use std::f64::consts::PI;
use tracing::{instrument, trace};

/// One species in the cell: every listed fractional position `(x, y)` holds
/// `occupancy` atoms of `atomic_number`.
#[derive(Debug, Clone, PartialEq)]
pub struct SiteGroup {
    pub atomic_number: u8,
    pub occupancy: f64,
    pub positions: Vec<[f64; 2]>,
}

/// A rectangular projected unit cell with lattice constants `a` (along x) and
/// `b` (along y), in Å.
#[derive(Debug, Clone, PartialEq)]
pub struct UnitCell {
    pub a: f64,
    pub b: f64,
    pub sites: Vec<SiteGroup>,
}

impl UnitCell {
    /// MoS₂ viewed down c, in its rectangular setting.
    pub fn mos2() -> Self {
        Self {
            a: 3.16,
            b: 5.48,
            sites: vec![
                SiteGroup {
                    atomic_number: 42,
                    occupancy: 1.0,
                    positions: vec![[0.0, 0.0], [0.5, 0.5]],
                },
                SiteGroup {
                    atomic_number: 16,
                    occupancy: 2.0,
                    positions: vec![[0.0, 1.0 / 3.0], [0.5, 0.5 + 1.0 / 3.0]],
                },
            ],
        }
    }

    pub fn site_count(&self) -> usize {
        self.sites.iter().map(|group| group.positions.len()).sum()
    }
}

impl Default for UnitCell {
    fn default() -> Self {
        Self::mos2()
    }
}

/// Structure factor of a single unit cell,
/// `A(k) = Σ occupancy · f(k²) · exp(-2πi (ky·y + kx·x))`.
#[instrument(skip_all, name = "unit_cell_structure_factor")]
pub fn structure_factor(
    grid: &ReciprocalGrid,
    cell: &UnitCell,
) -> Result<Array2<Complex64>, SimulationError> {
    let (ky, kx) = grid.mesh();
    let k2 = grid.k2();
    let mut amplitude = Array2::<Complex64>::zeros(grid.dim());

    for group in &cell.sites {
        let atom_amplitude = scattering_amplitude(&k2, group.atomic_number)?;
        trace!(
            atomic_number = group.atomic_number,
            sites = group.positions.len(),
            "Accumulating species."
        );

        for &[frac_x, frac_y] in &group.positions {
            let (x, y) = (frac_x * cell.a, frac_y * cell.b);
            Zip::from(&mut amplitude)
                .and(&atom_amplitude)
                .and(&ky)
                .and(&kx)
                .for_each(|acc, &f, &qy, &qx| {
                    let phase = Complex64::new(0.0, -2.0 * PI * (qy * y + qx * x)).exp();
                    *acc += f * phase * group.occupancy;
                });
        }
    }

    Ok(amplitude)
}
