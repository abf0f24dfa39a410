//! Probe-forming optics and the scan-position diffraction experiment.

pub mod aberration;
pub mod diffraction;
pub mod probe;
