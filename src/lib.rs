//! Isothermal two-phase flash calculations.
//!
//! The crate solves the Rachford-Rice equation for the vapor fraction of a
//! feed with known K-factors and drives the K-factors to self-consistency with
//! an external fugacity model by successive substitution.
//!
//! ```no_run
//! # use feos_flash::{FlashResult, ModifiedRaoult, PureRecord, tp_flash, wilson_k_factors};
//! # use feos_flash::fugacity::AntoineRecord;
//! # use feos_flash::WilsonRecord;
//! # use nalgebra::dvector;
//! # use quantity::{KELVIN, BAR};
//! # fn main() -> FlashResult<()> {
//! let components = ["propane", "butane"];
//! let antoine = PureRecord::<AntoineRecord>::from_json(&components, "parameters.json")?;
//! let critical = PureRecord::<WilsonRecord>::from_json(&components, "parameters.json")?;
//! let model = ModifiedRaoult::ideal(antoine);
//!
//! let (t, p) = (280.0 * KELVIN, 3.0 * BAR);
//! let feed = dvector![0.5, 0.5];
//! let k0 = wilson_k_factors(&critical, t, p)?;
//! let split = tp_flash(&model, t, p, &feed, &k0, Default::default())?;
//! println!("{split}");
//! # Ok(())
//! # }
//! ```
#![warn(clippy::all)]
#![warn(clippy::allow_attributes)]

/// Print messages with level `Verbosity::Iter` or higher.
#[macro_export]
macro_rules! log_iter {
    ($verbosity:expr, $($arg:tt)*) => {
        if $verbosity >= $crate::Verbosity::Iter {
            println!($($arg)*);
        }
    }
}

/// Print messages with level `Verbosity::Result` or higher.
#[macro_export]
macro_rules! log_result {
    ($verbosity:expr, $($arg:tt)*) => {
        if $verbosity >= $crate::Verbosity::Result {
            println!($($arg)*);
        }
    }
}

mod errors;
pub mod fugacity;
mod parameter;
mod phase_equilibria;

pub use errors::{FlashError, FlashResult};
pub use fugacity::{FugacityModel, ModifiedRaoult, Phase};
pub use parameter::PureRecord;
pub use phase_equilibria::{
    rachford_rice, rachford_rice_bracket, rachford_rice_objective, solve_beta, tp_flash,
    tp_flash_grid, wilson_k_factors, Convergence, PhaseSplit, RachfordRice, WilsonRecord,
};

/// Level of detail in the iteration output.
#[derive(Copy, Clone, Debug, Default, PartialOrd, PartialEq, Eq)]
pub enum Verbosity {
    /// Do not print output.
    #[default]
    None,
    /// Print information about the success or failure of the iteration.
    Result,
    /// Print a detailed output for every iteration.
    Iter,
}

/// Options of the Rachford-Rice solver and of the successive substitution.
///
/// [tp_flash] takes one set of options for each of the two iterations. Fields
/// that are [None] fall back to the defaults of the respective solver: 100
/// iterations and a tolerance of 1e-7 for both.
#[derive(Copy, Clone, Debug, Default)]
pub struct SolverOptions {
    /// Maximum number of iterations.
    pub max_iter: Option<usize>,
    /// Tolerance.
    pub tol: Option<f64>,
    /// Iteration output indicated by the [Verbosity] enum.
    pub verbosity: Verbosity,
}

impl From<(Option<usize>, Option<f64>, Option<Verbosity>)> for SolverOptions {
    fn from(options: (Option<usize>, Option<f64>, Option<Verbosity>)) -> Self {
        Self {
            max_iter: options.0,
            tol: options.1,
            verbosity: options.2.unwrap_or(Verbosity::None),
        }
    }
}

impl SolverOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = Some(max_iter);
        self
    }

    pub fn tol(mut self, tol: f64) -> Self {
        self.tol = Some(tol);
        self
    }

    pub fn verbosity(mut self, verbosity: Verbosity) -> Self {
        self.verbosity = verbosity;
        self
    }

    pub fn unwrap_or(self, max_iter: usize, tol: f64) -> (usize, f64, Verbosity) {
        (
            self.max_iter.unwrap_or(max_iter),
            self.tol.unwrap_or(tol),
            self.verbosity,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn solver_options_defaults() {
        let (max_iter, tol, verbosity) = SolverOptions::new().unwrap_or(100, 1e-7);
        assert_eq!(max_iter, 100);
        assert_eq!(tol, 1e-7);
        assert!(verbosity == Verbosity::None);

        let options: SolverOptions = (Some(5), None, Some(Verbosity::Iter)).into();
        let (max_iter, tol, verbosity) = options.unwrap_or(100, 1e-7);
        assert_eq!(max_iter, 5);
        assert_eq!(tol, 1e-7);
        assert!(verbosity >= Verbosity::Result);
    }
}
