//! Specimen synthesis: per-element scattering amplitudes, the structure factor
//! of one unit cell, and its superposition over a finite lattice.

pub mod cell;
pub mod lattice;
pub mod params;
pub mod scattering;
