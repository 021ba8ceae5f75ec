use std::io;
use thiserror::Error;

/// Error type for malformed flash inputs and model failures.
///
/// Non-convergence of the iterative solvers is not an error; it is
/// reported through [Convergence](crate::Convergence) on the returned value.
#[derive(Error, Debug)]
pub enum FlashError {
    // generic error with custom message
    #[error("{0}")]
    Error(String),

    // errors related to the input
    #[error("Expected {0} components, but the input specifies {1} components.")]
    IncompatibleComponents(usize, usize),
    #[error("Invalid state in {0}: {1} = {2}.")]
    InvalidState(String, String, f64),
    #[error("K-factors do not bracket unity (min = {min}, max = {max}): the Rachford-Rice domain is undefined.")]
    DegenerateKFactors { min: f64, max: f64 },

    // errors related to algorithms
    #[error("`{0}` encountered illegal values during the iteration.")]
    IterationFailed(String),

    // errors related to file handling
    #[error(transparent)]
    FileIO(#[from] io::Error),

    // json errors
    #[error(transparent)]
    Serde(#[from] serde_json::Error),

    // errors related to parameter handling
    #[error("The following component(s) were not found: {0}")]
    ComponentsNotFound(String),
    #[error("Incompatible parameters: {0}")]
    IncompatibleParameters(String),
}

/// Convenience type for `Result<T, FlashError>`.
pub type FlashResult<T> = Result<T, FlashError>;
