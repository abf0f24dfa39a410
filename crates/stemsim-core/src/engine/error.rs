use super::config::ConfigError;
use crate::core::error::SimulationError;
use thiserror::Error;

/// Error type returned by node compute closures.
pub type ComputeError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("Node is not part of this graph")]
    UnknownNode,

    #[error("Node '{node}' holds a value of a different type")]
    TypeMismatch { node: &'static str },

    #[error("Node '{dependent}' read a value it does not depend on")]
    UndeclaredDependency { dependent: &'static str },

    #[error("Upstream node '{node}' failed: {message}")]
    UpstreamFailed { node: &'static str, message: String },

    #[error("Async nodes must be driven from a Tokio runtime")]
    NoRuntime,
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum EngineError {
    #[error("Rejected parameter update: {0}")]
    Rejected(#[from] ConfigError),

    #[error("Simulation graph error: {0}")]
    Graph(#[from] GraphError),

    #[error("Simulation failed: {0}")]
    Simulation(#[from] SimulationError),
}
