use super::{validate, Convergence};
use crate::errors::{FlashError, FlashResult};
use crate::SolverOptions;
use nalgebra::DVector;
use num_dual::{first_derivative, Dual64, DualNum};
use tracing::warn;

const MAX_ITER_RR: usize = 100;
const TOL_RR: f64 = 1e-7;

/// Solution of the Rachford-Rice equation including diagnostics.
#[derive(Clone, Copy, Debug)]
pub struct RachfordRice {
    /// Vapor fraction $\beta$
    pub beta: f64,
    /// Lower (open) bound of the domain $\frac{1}{1-K_\mathrm{max}}$
    pub beta_min: f64,
    /// Upper (open) bound of the domain $\frac{1}{1-K_\mathrm{min}}$
    pub beta_max: f64,
    /// Number of Newton steps
    pub iterations: usize,
    /// Last accepted change of the vapor fraction
    pub delta_beta: f64,
    pub convergence: Convergence,
}

/// The Rachford-Rice objective
/// $f(\beta)=\sum_i\frac{(K_i-1)z_i}{1+\beta(K_i-1)}$.
pub fn rachford_rice_objective(feed: &DVector<f64>, k: &DVector<f64>, beta: f64) -> f64 {
    feed.zip_fold(k, 0.0, |acc, z, k| {
        acc + (k - 1.0) * z / (1.0 + beta * (k - 1.0))
    })
}

/// The open interval $\left(\frac{1}{1-K_\mathrm{max}},\frac{1}{1-K_\mathrm{min}}\right)$
/// on which the Rachford-Rice objective is finite and monotonically decreasing.
///
/// The interval only exists if the K-factors bracket unity, otherwise
/// [FlashError::DegenerateKFactors] is returned.
pub fn rachford_rice_bracket(k: &DVector<f64>) -> FlashResult<(f64, f64)> {
    let k_min = k.min();
    let k_max = k.max();
    if !(k_max > 1.0 && k_min < 1.0) {
        return Err(FlashError::DegenerateKFactors {
            min: k_min,
            max: k_max,
        });
    }
    Ok((1.0 / (1.0 - k_max), 1.0 / (1.0 - k_min)))
}

/// Solve the Rachford-Rice equation for the vapor fraction.
///
/// Newton's method is started in the center of the domain given by
/// [rachford_rice_bracket]. Steps that would leave the domain are halved
/// until the new iterate lies inside. The solution is not restricted
/// to $[0,1]$.
///
/// Non-convergence is reported through [RachfordRice::convergence] and
/// the last iterate is returned.
pub fn rachford_rice(
    feed: &DVector<f64>,
    k: &DVector<f64>,
    options: SolverOptions,
) -> FlashResult<RachfordRice> {
    validate(feed, k)?;
    RachfordRice::solve(feed, k, options)
}

/// Vapor fraction of a feed with given K-factors using default options.
pub fn solve_beta(feed: &DVector<f64>, k: &DVector<f64>) -> FlashResult<f64> {
    Ok(rachford_rice(feed, k, SolverOptions::default())?.beta)
}

impl RachfordRice {
    pub(super) fn solve(
        feed: &DVector<f64>,
        k: &DVector<f64>,
        options: SolverOptions,
    ) -> FlashResult<Self> {
        let (max_iter, tol, verbosity) = options.unwrap_or(MAX_ITER_RR, TOL_RR);
        let (beta_min, beta_max) = rachford_rice_bracket(k)?;

        let mut result = Self {
            beta: 0.5 * (beta_min + beta_max),
            beta_min,
            beta_max,
            iterations: 0,
            delta_beta: f64::INFINITY,
            convergence: Convergence::MaxIterations,
        };

        log_iter!(
            verbosity,
            " iter |    residual    |  vapor fraction  | halvings"
        );
        log_iter!(verbosity, "{:-<50}", "");
        log_iter!(verbosity, " {:4} |                | {:16.12} |", 0, result.beta);

        for i in 1..=max_iter {
            let (g, dg) = first_derivative(
                |beta| {
                    let frac = k.map(|k| (beta * (k - 1.0) + 1.0).recip() * (k - 1.0));
                    feed.map(Dual64::from).dot(&frac)
                },
                result.beta,
            );

            let mut step = g / dg;
            if !step.is_finite() {
                result.convergence = Convergence::DegenerateDerivative;
                break;
            }

            // halve the step until the iterate stays inside the domain
            let mut beta = result.beta - step;
            let mut halvings = 0;
            while !(beta > beta_min && beta < beta_max) {
                step *= 0.5;
                beta = result.beta - step;
                halvings += 1;
            }

            result.delta_beta = beta - result.beta;
            result.beta = beta;
            result.iterations = i;
            log_iter!(
                verbosity,
                " {:4} | {:14.8e} | {:16.12} | {}",
                i,
                g.abs(),
                beta,
                halvings
            );

            if result.delta_beta.abs() <= tol {
                result.convergence = Convergence::Converged;
                break;
            }
        }

        if result.convergence.is_converged() {
            log_result!(
                verbosity,
                "Rachford-Rice: calculation converged in {} step(s)\n",
                result.iterations
            );
        } else {
            log_result!(
                verbosity,
                "Rachford-Rice: {} after {} step(s)\n",
                result.convergence,
                result.iterations
            );
            warn!(
                status = %result.convergence,
                iterations = result.iterations,
                beta = result.beta,
                delta_beta = result.delta_beta,
                beta_min,
                beta_max,
                "Rachford-Rice iteration did not converge"
            );
        }
        Ok(result)
    }
}
