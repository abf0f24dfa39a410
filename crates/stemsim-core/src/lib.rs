//! # stemsim
//!
//! Scanning transmission electron microscopy (STEM) simulation: a focused,
//! aberrated electron probe is formed, passed through a thin crystalline
//! specimen, and its far-field diffraction pattern recorded.
//!
//! ## Architectural Philosophy
//!
//! The library follows a three-layer architecture:
//!
//! - **[`core`]: The Foundation.** Stateless physics. Relativistic electron
//!   quantities, reciprocal-space grids, 2-D spectral transforms, atomic
//!   scattering factors, crystal synthesis, probe formation and diffraction.
//!
//! - **[`engine`]: The Logic Core.** The stateful layer. A dependency graph that
//!   recomputes derived quantities when parameters change, with trailing-edge
//!   debounce and stale-while-revalidate reads for the expensive stages.
//!
//! - **[`workflows`]: The Public API.** One-shot execution of the whole
//!   pipeline for a fixed parameter set.

pub mod core;
pub mod engine;
pub mod workflows;
