//! Planner error type.
//!
//! Construction problems (mismatched dimensions or agent sets, bad
//! configuration) are reported as errors. Numerical trouble inside a solve is
//! reported through [`crate::solver::SolveStatus`] instead, so that the caller
//! can decide between retrying and aborting.

use ndarray_linalg::error::LinalgError;
use thiserror::Error;

use crate::mas::AgentId;

#[derive(Debug, Error)]
pub enum PlanError {
    #[error("{what} has dimension {got}, expected {expected}")]
    InvalidDimension {
        what: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("{what} must be {requirement}")]
    InvalidWeight {
        what: &'static str,
        requirement: &'static str,
    },

    #[error("control Hessian is not positive definite (regularization {mu:e})")]
    NonPositiveDefiniteHessian { mu: f64 },

    #[error("line search found no improvement after {halvings} halvings")]
    LineSearchExhausted { halvings: usize },

    #[error("non-finite value in {0}")]
    NonFiniteValue(&'static str),

    #[error("dynamics cover agents {dynamics:?} but the cost covers {cost:?}")]
    AgentSetMismatch {
        dynamics: Vec<AgentId>,
        cost: Vec<AgentId>,
    },

    #[error("{0} appears more than once")]
    DuplicateAgent(AgentId),

    #[error("{0} is not part of this problem")]
    UnknownAgent(AgentId),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("linear algebra error: {0}")]
    Linalg(#[from] LinalgError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Shorthand result type for the planner.
pub type PlanResult<T> = Result<T, PlanError>;

/// Fail with [`PlanError::InvalidDimension`] unless `got == expected`.
pub(crate) fn check_dim(what: &'static str, expected: usize, got: usize) -> PlanResult<()> {
    if expected == got {
        Ok(())
    } else {
        Err(PlanError::InvalidDimension {
            what,
            expected,
            got,
        })
    }
}
