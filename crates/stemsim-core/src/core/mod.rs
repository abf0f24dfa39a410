//! # Core Module
//!
//! Stateless physics of the simulation: every function here is a pure
//! transformation of its inputs, and nothing holds state between calls.
//!
//! ## Overview
//!
//! The pipeline runs from the beam to the detector:
//!
//! - **Beam** ([`electron`]) - relativistic wavelength, Lorentz factor and interaction constant
//! - **Sampling** ([`grid`]) - zero-first frequency axes and the 2-D reciprocal mesh
//! - **Transforms** ([`spectral`]) - 2-D FFTs, centre-shifts and intensity reductions
//! - **Specimen** ([`atoms`]) - scattering factors, unit-cell structure factor and lattice phase
//! - **Optics** ([`optics`]) - aberrated probe formation and diffraction
//!
//! All fields are `ndarray` arrays; complex fields use `num_complex::Complex64`
//! and, unless stated otherwise, keep the zero frequency (or real-space origin)
//! at index `[0, 0]`.

pub mod atoms;
pub mod electron;
pub mod error;
pub mod grid;
pub mod optics;
pub mod spectral;
