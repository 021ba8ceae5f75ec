use crate::errors::{FlashError, FlashResult};
use crate::SolverOptions;
use nalgebra::DVector;
use std::fmt;

mod rachford_rice;
mod tp_flash;
mod wilson;
pub use rachford_rice::{
    rachford_rice, rachford_rice_bracket, rachford_rice_objective, solve_beta, RachfordRice,
};
pub use tp_flash::{tp_flash, tp_flash_grid};
pub use wilson::{wilson_k_factors, WilsonRecord};

const TOL_MOLEFRACS: f64 = 1e-8;
const TRIVIAL_REL_DEVIATION: f64 = 1e-5;

/// Outcome of an iterative solver.
///
/// Only [Convergence::Converged] means that the tolerance was met. In all other
/// cases the last iterate is still returned as best estimate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Convergence {
    /// The tolerance was met.
    Converged,
    /// The maximum number of iterations was reached.
    MaxIterations,
    /// The Newton step was undefined because of a vanishing or non-finite derivative.
    DegenerateDerivative,
    /// The fugacity model returned K-factors that do not bracket unity.
    NoPhaseSplit,
}

impl Convergence {
    pub fn is_converged(&self) -> bool {
        matches!(self, Self::Converged)
    }
}

impl fmt::Display for Convergence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Converged => write!(f, "converged"),
            Self::MaxIterations => write!(f, "maximum number of iterations reached"),
            Self::DegenerateDerivative => write!(f, "degenerate derivative"),
            Self::NoPhaseSplit => write!(f, "K-factors no longer bracket unity"),
        }
    }
}

/// Result of an isothermal two-phase flash.
///
/// `liquid` and `vapor` always follow from `feed`, `k` and `vapor_fraction` by
/// material balance. The vapor fraction is not restricted to $[0,1]$; use
/// [PhaseSplit::is_physical] to detect a negative flash.
#[derive(Clone, Debug)]
pub struct PhaseSplit {
    /// Vapor fraction $\beta$
    pub vapor_fraction: f64,
    /// Liquid mole fractions $x_i$
    pub liquid: DVector<f64>,
    /// Vapor mole fractions $y_i$
    pub vapor: DVector<f64>,
    /// K-factors $K_i$ the split was calculated with
    pub k: DVector<f64>,
    /// Number of successive substitution steps
    pub iterations: usize,
    /// Euclidean norm of the last change of the K-factors
    pub residual: f64,
    /// Status of the successive substitution
    pub convergence: Convergence,
    /// Diagnostics of the final Rachford-Rice solution
    pub rachford_rice: RachfordRice,
}

impl PhaseSplit {
    /// Calculate the phase split for fixed K-factors.
    ///
    /// This is the final step of a flash and can be used on its own, e.g.
    /// for K-factors from a correlation. The result is marked as converged
    /// after zero successive substitution steps.
    pub fn from_k_factors(
        feed: &DVector<f64>,
        k: &DVector<f64>,
        options: SolverOptions,
    ) -> FlashResult<Self> {
        validate(feed, k)?;
        Self::split(feed, k, options, 0, 0.0, Convergence::Converged)
    }

    pub(super) fn split(
        feed: &DVector<f64>,
        k: &DVector<f64>,
        options: SolverOptions,
        iterations: usize,
        residual: f64,
        convergence: Convergence,
    ) -> FlashResult<Self> {
        let rachford_rice = RachfordRice::solve(feed, k, options)?;
        let (liquid, vapor) = phase_compositions(feed, k, rachford_rice.beta);
        Ok(Self {
            vapor_fraction: rachford_rice.beta,
            liquid,
            vapor,
            k: k.clone(),
            iterations,
            residual,
            convergence,
            rachford_rice,
        })
    }

    /// Whether both the successive substitution and the final Rachford-Rice
    /// solution converged.
    pub fn is_converged(&self) -> bool {
        self.convergence.is_converged() && self.rachford_rice.convergence.is_converged()
    }

    /// Whether the vapor fraction lies in $[0,1]$.
    ///
    /// A vapor fraction outside this interval (negative flash) indicates
    /// that the feed is a single phase at the given conditions.
    pub fn is_physical(&self) -> bool {
        (0.0..=1.0).contains(&self.vapor_fraction)
    }

    /// Whether liquid and vapor compositions are identical within a relative
    /// deviation of 1e-5.
    ///
    /// The flash itself does not reject trivial solutions.
    pub fn is_trivial_solution(&self) -> bool {
        self.liquid
            .iter()
            .zip(self.vapor.iter())
            .all(|(&x, &y)| (x - y).abs() <= TRIVIAL_REL_DEVIATION * x.abs().max(y.abs()))
    }
}

impl fmt::Display for PhaseSplit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "vapor fraction: {:.8}", self.vapor_fraction)?;
        writeln!(f, "liquid: {:.8?}", self.liquid.as_slice())?;
        writeln!(f, "vapor:  {:.8?}", self.vapor.as_slice())?;
        writeln!(f, "K:      {:.8?}", self.k.as_slice())?;
        write!(
            f,
            "{} after {} step(s), residual {:.3e}",
            self.convergence, self.iterations, self.residual
        )
    }
}

/// Liquid and vapor compositions from the material balance
/// $x_i=\frac{z_i}{1+\beta(K_i-1)}$, $y_i=K_ix_i$.
fn phase_compositions(
    feed: &DVector<f64>,
    k: &DVector<f64>,
    beta: f64,
) -> (DVector<f64>, DVector<f64>) {
    let liquid = feed.zip_map(k, |z, k| z / (1.0 + beta * (k - 1.0)));
    let vapor = liquid.component_mul(k);
    (liquid, vapor)
}

/// Reject malformed feeds and K-factors before any iteration.
fn validate(feed: &DVector<f64>, k: &DVector<f64>) -> FlashResult<()> {
    if feed.len() != k.len() {
        return Err(FlashError::IncompatibleComponents(feed.len(), k.len()));
    }
    if feed.is_empty() {
        return Err(FlashError::Error(String::from(
            "The feed needs at least one component.",
        )));
    }
    if let Some(&z) = feed.iter().find(|z| !z.is_finite() || **z < 0.0) {
        return Err(FlashError::InvalidState(
            String::from("feed"),
            String::from("mole fraction"),
            z,
        ));
    }
    let sum = feed.sum();
    if (sum - 1.0).abs() > TOL_MOLEFRACS {
        return Err(FlashError::InvalidState(
            String::from("feed"),
            String::from("sum of mole fractions"),
            sum,
        ));
    }
    if let Some(&k) = k.iter().find(|k| !k.is_finite() || **k <= 0.0) {
        return Err(FlashError::InvalidState(
            String::from("K-factors"),
            String::from("K"),
            k,
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::dvector;

    #[test]
    fn validation() {
        let k = dvector![3.0, 0.25, 0.1];
        assert!(validate(&dvector![0.4, 0.4, 0.2], &k).is_ok());
        assert!(matches!(
            validate(&dvector![0.5, 0.5], &k),
            Err(FlashError::IncompatibleComponents(2, 3))
        ));
        assert!(matches!(
            validate(&dvector![0.4, 0.4, 0.3], &k),
            Err(FlashError::InvalidState(..))
        ));
        assert!(matches!(
            validate(&dvector![0.6, 0.6, -0.2], &k),
            Err(FlashError::InvalidState(..))
        ));
        assert!(matches!(
            validate(&dvector![0.4, 0.4, 0.2], &dvector![3.0, 0.0, 0.1]),
            Err(FlashError::InvalidState(..))
        ));
        assert!(matches!(
            validate(&dvector![0.4, 0.4, 0.2], &dvector![3.0, f64::NAN, 0.1]),
            Err(FlashError::InvalidState(..))
        ));
    }

    #[test]
    fn final_split_is_idempotent() -> FlashResult<()> {
        let z = dvector![0.4, 0.4, 0.2];
        let k = dvector![3.0, 0.25, 0.1];
        let split1 = PhaseSplit::from_k_factors(&z, &k, Default::default())?;
        let split2 = PhaseSplit::from_k_factors(&z, &k, Default::default())?;
        assert_eq!(split1.vapor_fraction, split2.vapor_fraction);
        assert_eq!(split1.liquid, split2.liquid);
        assert_eq!(split1.vapor, split2.vapor);
        Ok(())
    }

    #[test]
    fn material_balance() -> FlashResult<()> {
        let z = dvector![0.4, 0.4, 0.2];
        let k = dvector![3.0, 0.25, 0.1];
        let split = PhaseSplit::from_k_factors(&z, &k, Default::default())?;
        let beta = split.vapor_fraction;
        assert!(split.is_converged());
        assert!(split.is_physical());
        assert!(!split.is_trivial_solution());
        assert_relative_eq!(
            &split.liquid * (1.0 - beta) + &split.vapor * beta,
            z,
            max_relative = 1e-12
        );
        assert_relative_eq!(split.liquid.sum(), 1.0, max_relative = 1e-10);
        assert_relative_eq!(split.vapor.sum(), 1.0, max_relative = 1e-10);
        assert_relative_eq!(split.vapor, split.liquid.component_mul(&k));
        Ok(())
    }

    #[test]
    fn negative_flash() -> FlashResult<()> {
        let z = dvector![0.05, 0.95];
        let k = dvector![1.5, 0.95];
        let split = PhaseSplit::from_k_factors(&z, &k, Default::default())?;
        assert!(split.is_converged());
        assert!(!split.is_physical());
        assert_relative_eq!(split.vapor_fraction, -0.9, max_relative = 1e-8);
        Ok(())
    }
}
