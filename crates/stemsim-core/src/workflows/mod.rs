//! # Workflows Module
//!
//! High-level entry points that run the complete pipeline without an
//! interactive session.
//!
//! - **Simulation Workflow** ([`simulate`]) - Evaluates every stage once for a
//!   parameter set, reporting one progress phase per stage.

pub mod simulate;
