use super::aberration::Aberration;
use crate::core::error::SimulationError;
use crate::core::grid::ReciprocalGrid;
use crate::core::spectral::{Normalization, abs2, fftshift, ifft2, total_intensity};
use ndarray::{Array2, Zip};
use num_complex::Complex64;
use std::f64::consts::PI;
use tracing::{debug, instrument};

/// A focused probe, normalized to unit total intensity.
#[derive(Debug, Clone, PartialEq)]
pub struct FormedProbe {
    /// Aperture-plane wavefunction, zero frequency at index 0.
    pub reciprocal: Array2<Complex64>,
    /// Specimen-plane wavefunction, centre-shifted.
    pub real: Array2<Complex64>,
}

/// Probe intensity in both planes, centred for display.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeIntensity {
    pub reciprocal: Array2<f64>,
    pub real: Array2<f64>,
}

impl FormedProbe {
    pub fn intensity(&self) -> ProbeIntensity {
        ProbeIntensity {
            reciprocal: abs2(&fftshift(&self.reciprocal)),
            real: abs2(&self.real),
        }
    }

    pub fn dim(&self) -> (usize, usize) {
        self.reciprocal.dim()
    }
}

/// Aberration function `χ(θ, φ)` (Å) over the grid.
pub fn aberration_function(
    grid: &ReciprocalGrid,
    wavelength: f64,
    aberrations: &[Aberration],
) -> Array2<f64> {
    let (ky, kx) = grid.mesh();
    let mut chi = Array2::<f64>::zeros(grid.dim());

    for ab in aberrations {
        let order = f64::from(ab.n) + 1.0;
        let m = f64::from(ab.m);
        Zip::from(&mut chi)
            .and(&ky)
            .and(&kx)
            .for_each(|chi, &qy, &qx| {
                let theta2 = (qy * qy + qx * qx) * wavelength * wavelength;
                let phi = qy.atan2(qx);
                let azimuthal =
                    ab.coefficient.re * (m * phi).cos() + ab.coefficient.im * (m * phi).sin();
                *chi += theta2.powf(order / 2.0) / order * azimuthal;
            });
    }
    chi
}

/// Frequencies whose scattering angle lies within `aperture_mrad`.
pub fn aperture_mask(grid: &ReciprocalGrid, wavelength: f64, aperture_mrad: f64) -> Array2<bool> {
    let cutoff = (aperture_mrad * 1e-3).powi(2);
    grid.k2().mapv(|k2| k2 * wavelength * wavelength <= cutoff)
}

/// Forms the aberrated probe admitted by a circular aperture of half-angle
/// `aperture_mrad`.
#[instrument(skip_all, name = "form_probe", fields(aperture_mrad = aperture_mrad))]
pub fn form_probe(
    grid: &ReciprocalGrid,
    wavelength: f64,
    aperture_mrad: f64,
    aberrations: &[Aberration],
) -> Result<FormedProbe, SimulationError> {
    if !aperture_mrad.is_finite() || aperture_mrad <= 0.0 {
        return Err(SimulationError::DegenerateAperture { aperture_mrad });
    }

    let mut reciprocal = {
        let chi = aberration_function(grid, wavelength, aberrations);
        let mask = aperture_mask(grid, wavelength, aperture_mrad);
        let mut wave = Array2::<Complex64>::zeros(grid.dim());
        Zip::from(&mut wave)
            .and(&chi)
            .and(&mask)
            .for_each(|psi, &chi, &inside| {
                if inside {
                    *psi = Complex64::new(0.0, -2.0 * PI * chi / wavelength).exp();
                }
            });
        wave
    };

    let intensity = total_intensity(&reciprocal);
    if !(intensity.is_finite() && intensity > 0.0) {
        return Err(SimulationError::DegenerateAperture { aperture_mrad });
    }
    let norm = intensity.sqrt();
    reciprocal.mapv_inplace(|v| v / norm);
    debug!(
        admitted = reciprocal.iter().filter(|v| v.norm_sqr() > 0.0).count(),
        "Probe normalized."
    );

    let mut real = reciprocal.clone();
    ifft2(&mut real, Normalization::Ortho);

    Ok(FormedProbe {
        reciprocal,
        real: fftshift(&real),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::electron::Electron;
    use crate::core::grid::sampling_for_max_angle;

    fn setup(n: usize) -> (ReciprocalGrid, f64) {
        let electron = Electron::from_kilovolts(200.0).unwrap();
        let sampling = sampling_for_max_angle(electron.wavelength, 50.0).unwrap();
        let extent = sampling * n as f64;
        let grid = ReciprocalGrid::new([extent, extent], [n, n]).unwrap();
        (grid, electron.wavelength)
    }

    #[test]
    fn probe_has_unit_intensity_for_many_apertures_and_aberrations() {
        let (grid, wavelength) = setup(64);
        let sets = [
            vec![],
            vec![Aberration::defocus(250.0)],
            vec![
                Aberration::defocus(-100.0),
                Aberration::from_polar(1, 2, 40.0, 20.0),
                Aberration::from_polar(2, 1, 1.0e3, 135.0),
                Aberration::new(3, 0, Complex64::new(1.0e5, 0.0)),
            ],
        ];
        for aperture in [5.0, 15.0, 30.0, 49.0] {
            for aberrations in &sets {
                let probe = form_probe(&grid, wavelength, aperture, aberrations).unwrap();
                assert!((total_intensity(&probe.reciprocal) - 1.0).abs() < 1e-9);
                assert!((total_intensity(&probe.real) - 1.0).abs() < 1e-9);
            }
        }
    }

    /// Index of the signed frequency offset `(dy, dx)` in FFT order.
    fn at(n: usize, (dy, dx): (i64, i64)) -> (usize, usize) {
        let wrap = |d: i64| d.rem_euclid(n as i64) as usize;
        (wrap(dy), wrap(dx))
    }

    /// Frequency offsets of equal radius, several not related by right angles.
    const RADIUS_FIVE: [(i64, i64); 8] = [
        (0, 5),
        (5, 0),
        (3, 4),
        (4, 3),
        (-3, 4),
        (4, -3),
        (-4, -3),
        (0, -5),
    ];

    #[test]
    fn defocus_only_probe_is_circularly_symmetric() {
        let n = 64;
        let (grid, wavelength) = setup(n);
        for aberrations in [
            vec![Aberration::defocus(500.0)],
            vec![
                Aberration::defocus(-80.0),
                Aberration::new(3, 0, Complex64::new(2.0e4, 0.0)),
            ],
        ] {
            let probe = form_probe(&grid, wavelength, 30.0, &aberrations).unwrap();
            let reference = probe.reciprocal[at(n, RADIUS_FIVE[0])];
            assert!(reference.norm() > 0.0);
            for offset in RADIUS_FIVE {
                let psi = probe.reciprocal[at(n, offset)];
                assert!((psi - reference).norm() < 1e-12, "{offset:?}: {psi} vs {reference}");
            }

            let real = abs2(&probe.real);
            for i in 0..n {
                for j in 0..n {
                    assert!((real[(i, j)] - real[(j, i)]).abs() < 1e-12);
                }
            }
        }
    }

    #[test]
    fn astigmatism_makes_the_phase_depend_on_azimuth() {
        let n = 64;
        let (grid, wavelength) = setup(n);
        let aberrations = [Aberration::from_polar(1, 2, 200.0, 0.0)];
        let probe = form_probe(&grid, wavelength, 30.0, &aberrations).unwrap();
        let along_axis = probe.reciprocal[at(n, (0, 5))];
        let off_axis = probe.reciprocal[at(n, (3, 4))];
        assert!((along_axis - off_axis).norm() > 1e-3 * along_axis.norm());
    }

    #[test]
    fn oblique_astigmatism_breaks_the_mirror_symmetry_of_the_spot() {
        let n = 32;
        let (grid, wavelength) = setup(n);
        let aberrations = [Aberration::from_polar(1, 2, 200.0, 45.0)];
        let probe = form_probe(&grid, wavelength, 30.0, &aberrations).unwrap();
        let real = abs2(&probe.real);
        let asymmetry = (0..n)
            .flat_map(|i| (0..n).map(move |j| (i, j)))
            .map(|(i, j)| (real[(i, j)] - real[(j, i)]).abs())
            .fold(0.0, f64::max);
        assert!(asymmetry > 1e-6, "asymmetry = {asymmetry}");
    }

    #[test]
    fn very_high_aberration_order_does_not_overflow() {
        let (grid, wavelength) = setup(16);
        let aberrations = [Aberration::new(u32::MAX, 0, Complex64::new(1.0, 0.0))];
        let chi = aberration_function(&grid, wavelength, &aberrations);
        assert!(chi.iter().all(|v| v.is_finite()));
        let probe = form_probe(&grid, wavelength, 20.0, &aberrations).unwrap();
        assert!((total_intensity(&probe.reciprocal) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn aberration_function_scales_with_defocus_as_theta_squared_over_two() {
        let (grid, wavelength) = setup(16);
        let chi = aberration_function(&grid, wavelength, &[Aberration::defocus(100.0)]);
        let k2 = grid.k2();
        for (c, k2) in chi.iter().zip(k2.iter()) {
            let expected = 100.0 * k2 * wavelength * wavelength / 2.0;
            assert!((c - expected).abs() < 1e-12 * expected.max(1.0));
        }
    }

    #[test]
    fn aperture_mask_admits_the_zero_frequency_and_cuts_at_the_half_angle() {
        let (grid, wavelength) = setup(32);
        let mask = aperture_mask(&grid, wavelength, 20.0);
        assert!(mask[(0, 0)]);
        let nyquist = grid.dim().0 / 2;
        assert!(!mask[(nyquist, 0)]);
    }

    #[test]
    fn zero_or_negative_aperture_is_a_degenerate_configuration() {
        let (grid, wavelength) = setup(16);
        for aperture in [0.0, -3.0, f64::NAN] {
            let err = form_probe(&grid, wavelength, aperture, &[]).unwrap_err();
            assert!(matches!(err, SimulationError::DegenerateAperture { .. }));
        }
    }
}
