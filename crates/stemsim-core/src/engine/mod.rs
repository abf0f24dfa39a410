//! # Engine Module
//!
//! The stateful layer of the simulator: it keeps the outputs of the physics
//! pipeline consistent with a set of parameters that changes while the user
//! is looking at it.
//!
//! ## Architecture
//!
//! - **Recomputation Graph** ([`graph`]) - Sources, lazily recomputed sync nodes and
//!   debounced, version-stamped async nodes with per-node error states
//! - **Simulation Session** ([`simulation`]) - The STEM pipeline expressed as graph nodes
//! - **Configuration** ([`config`]) - Validated parameter sets and their builder
//! - **Progress Monitoring** ([`progress`]) - Phase reporting for one-shot runs
//! - **Error Handling** ([`error`]) - Graph and engine error types
//!
//! ## Threading
//!
//! Everything here runs on one thread. Background recomputations are tasks on
//! a [`tokio::task::LocalSet`]; they never run concurrently with a parameter
//! write, so a write followed by reads in the same turn always sees one
//! consistent parameter snapshot.

pub mod config;
pub mod error;
pub mod graph;
pub mod progress;
pub mod simulation;
