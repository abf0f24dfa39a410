use super::error::{SimulationError, require_positive};
use super::spectral::ifftshift_1d;
use ndarray::{Array1, Array2};

/// Frequency axis of `n` samples spaced `1/size`, in FFT order (zero first).
///
/// Even lengths span `[-n/2, n/2 - 1] / size`, odd lengths
/// `[-(n-1)/2, (n-1)/2] / size`, before the inverse centre-shift.
pub fn fftfreq(size: f64, n: usize) -> Array1<f64> {
    let lowest = if n % 2 == 0 {
        -((n / 2) as f64)
    } else {
        -(((n - 1) / 2) as f64)
    };
    let centered = Array1::from_shape_fn(n, |i| (lowest + i as f64) / size);
    ifftshift_1d(&centered)
}

/// Real-space sampling (Å/px) that puts `max_angle_mrad` at the Nyquist edge.
pub fn sampling_for_max_angle(wavelength: f64, max_angle_mrad: f64) -> Result<f64, SimulationError> {
    let max_angle = require_positive("max_angle", max_angle_mrad)?;
    Ok(wavelength / (2.0 * max_angle * 1e-3))
}

/// The 2-D spatial-frequency sampling of a `(ny, nx)` field covering
/// `(extent_y, extent_x)` Å.
#[derive(Debug, Clone, PartialEq)]
pub struct ReciprocalGrid {
    extent: [f64; 2],
    shape: [usize; 2],
    ky_axis: Array1<f64>,
    kx_axis: Array1<f64>,
}

impl ReciprocalGrid {
    pub fn new(extent: [f64; 2], shape: [usize; 2]) -> Result<Self, SimulationError> {
        require_positive("extent_y", extent[0])?;
        require_positive("extent_x", extent[1])?;
        if shape.contains(&0) {
            return Err(SimulationError::invalid(
                "grid_shape",
                format!("{shape:?} must have at least one sample per axis"),
            ));
        }

        Ok(Self {
            extent,
            shape,
            ky_axis: fftfreq(extent[0], shape[0]),
            kx_axis: fftfreq(extent[1], shape[1]),
        })
    }

    pub fn extent(&self) -> [f64; 2] {
        self.extent
    }

    pub fn shape(&self) -> [usize; 2] {
        self.shape
    }

    pub fn dim(&self) -> (usize, usize) {
        (self.shape[0], self.shape[1])
    }

    pub fn len(&self) -> usize {
        self.shape[0] * self.shape[1]
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn ky_axis(&self) -> &Array1<f64> {
        &self.ky_axis
    }

    pub fn kx_axis(&self) -> &Array1<f64> {
        &self.kx_axis
    }

    /// `ky[i, j] = ky_axis[i]`.
    pub fn ky(&self) -> Array2<f64> {
        Array2::from_shape_fn(self.dim(), |(i, _)| self.ky_axis[i])
    }

    /// `kx[i, j] = kx_axis[j]`.
    pub fn kx(&self) -> Array2<f64> {
        Array2::from_shape_fn(self.dim(), |(_, j)| self.kx_axis[j])
    }

    pub fn mesh(&self) -> (Array2<f64>, Array2<f64>) {
        (self.ky(), self.kx())
    }

    /// Squared spatial frequency `ky² + kx²`.
    pub fn k2(&self) -> Array2<f64> {
        Array2::from_shape_fn(self.dim(), |(i, j)| {
            self.ky_axis[i].powi(2) + self.kx_axis[j].powi(2)
        })
    }
}
