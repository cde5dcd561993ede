//! Error types.

use std::fmt;

use crate::model::{Algorithm, OptimizationObjective};

/// Failure of a routing provider call.
#[derive(Debug)]
pub enum RoutingError {
    Http(reqwest::Error),
    /// The provider answered but the payload lacked usable values.
    MissingData(String),
    /// The provider has no such endpoint.
    Unsupported,
}

impl From<reqwest::Error> for RoutingError {
    fn from(err: reqwest::Error) -> Self {
        RoutingError::Http(err)
    }
}

impl fmt::Display for RoutingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoutingError::Http(err) => write!(f, "routing request failed: {}", err),
            RoutingError::MissingData(what) => write!(f, "routing response missing data: {}", what),
            RoutingError::Unsupported => f.write_str("operation not supported by provider"),
        }
    }
}

impl std::error::Error for RoutingError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RoutingError::Http(err) => Some(err),
            _ => None,
        }
    }
}

/// Misuse of the optimizer family by a caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptimizerError {
    /// The optimizer was asked for an objective it does not implement.
    UnsupportedObjective {
        algorithm: Algorithm,
        objective: OptimizationObjective,
    },
    /// None of the requested algorithms could run.
    NoAlgorithms,
}

impl fmt::Display for OptimizerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptimizerError::UnsupportedObjective {
                algorithm,
                objective,
            } => write!(f, "{} does not support objective {}", algorithm, objective),
            OptimizerError::NoAlgorithms => f.write_str("no algorithm available for comparison"),
        }
    }
}

impl std::error::Error for OptimizerError {}
