use super::{
    phase_compositions, rachford_rice_bracket, validate, Convergence, PhaseSplit, RachfordRice,
};
use crate::errors::{FlashError, FlashResult};
use crate::fugacity::FugacityModel;
use crate::SolverOptions;
use nalgebra::DVector;
use quantity::{Pressure, Temperature};
#[cfg(feature = "rayon")]
use rayon::prelude::*;
use tracing::warn;

const MAX_ITER_FLASH: usize = 100;
const TOL_FLASH: f64 = 1e-7;

/// Perform a Tp-flash calculation by successive substitution.
///
/// Starting from the K-factors `k0`, every step solves the Rachford-Rice
/// equation, calculates the phase compositions by material balance and
/// updates the K-factors as $K_i=\varphi_i^L(x)/\varphi_i^V(y)$. The
/// iteration stops once the Euclidean norm of the change of the K-factors
/// drops below the tolerance. The returned phase split is always recalculated
/// from the final K-factors.
///
/// `options` are the solver options of the (inner) Rachford-Rice iteration
/// and the (outer) successive substitution.
///
/// Successive substitution converges linearly and can be slow close to
/// critical points. Poor initial K-factors may lead to the trivial solution
/// $x=y$, which is not rejected; see [PhaseSplit::is_trivial_solution].
/// Reaching the maximum number of iterations is not an error: the result is
/// returned with [Convergence::MaxIterations]. If the model yields K-factors
/// that no longer bracket unity, the iteration stops with
/// [Convergence::NoPhaseSplit] and the split of the last valid K-factors is
/// returned.
pub fn tp_flash<M: FugacityModel>(
    model: &M,
    temperature: Temperature,
    pressure: Pressure,
    feed: &DVector<f64>,
    k0: &DVector<f64>,
    options: (SolverOptions, SolverOptions),
) -> FlashResult<PhaseSplit> {
    let (options_inner, options_outer) = options;
    let (max_iter, tol, verbosity) = options_outer.unwrap_or(MAX_ITER_FLASH, TOL_FLASH);

    validate(feed, k0)?;
    if model.components() != feed.len() {
        return Err(FlashError::IncompatibleComponents(
            model.components(),
            feed.len(),
        ));
    }

    log_iter!(
        verbosity,
        " iter |    residual    |  vapor fraction  |  liquid mole fractions  |  vapor mole fractions  "
    );
    log_iter!(verbosity, "{:-<100}", "");

    let mut k = k0.clone();
    let mut residual = f64::INFINITY;
    let mut iter = 0;
    let mut phase_split = true;
    while residual > tol && iter < max_iter {
        let beta = RachfordRice::solve(feed, &k, options_inner)?.beta;
        let (liquid, vapor) = phase_compositions(feed, &k, beta);
        let k_new = model.k_factors(temperature, pressure, &liquid, &vapor)?;

        residual = (&k_new - &k).norm();
        iter += 1;
        log_iter!(
            verbosity,
            " {:4} | {:14.8e} | {:16.12} | {:.8?} | {:.8?}",
            iter,
            residual,
            beta,
            liquid.as_slice(),
            vapor.as_slice(),
        );

        // the last K-factors that bracket unity are kept for the final split
        if rachford_rice_bracket(&k_new).is_err() {
            warn!(
                iterations = iter,
                k = ?k_new.as_slice(),
                k_min = k_new.min(),
                k_max = k_new.max(),
                "Tp flash: K-factors no longer bracket unity"
            );
            phase_split = false;
            break;
        }
        k = k_new;
    }

    let convergence = if !phase_split {
        Convergence::NoPhaseSplit
    } else if residual <= tol {
        Convergence::Converged
    } else {
        Convergence::MaxIterations
    };

    let split = PhaseSplit::split(feed, &k, options_inner, iter, residual, convergence)?;
    if convergence.is_converged() {
        log_result!(
            verbosity,
            "Tp flash: calculation converged in {} step(s)\n",
            iter
        );
    } else {
        log_result!(
            verbosity,
            "Tp flash: {} after {} step(s), residual {:.3e}\n",
            convergence,
            iter,
            residual
        );
        warn!(
            status = %convergence,
            iterations = iter,
            residual,
            beta = split.vapor_fraction,
            beta_min = split.rachford_rice.beta_min,
            beta_max = split.rachford_rice.beta_max,
            k = ?k.as_slice(),
            "Tp flash did not converge"
        );
    }
    Ok(split)
}

/// Perform independent Tp-flash calculations for a list of conditions.
///
/// `initial_k` provides the initial K-factors for every temperature and
/// pressure, e.g. [wilson_k_factors](super::wilson_k_factors). With the
/// `rayon` feature the flashes are calculated in parallel. The results are
/// returned in the order of `conditions`.
pub fn tp_flash_grid<M, F>(
    model: &M,
    conditions: &[(Temperature, Pressure)],
    feed: &DVector<f64>,
    initial_k: F,
    options: (SolverOptions, SolverOptions),
) -> Vec<FlashResult<PhaseSplit>>
where
    M: FugacityModel + Sync,
    F: Fn(Temperature, Pressure) -> FlashResult<DVector<f64>> + Sync,
{
    let flash = |&(t, p): &(Temperature, Pressure)| {
        let k0 = initial_k(t, p)?;
        tp_flash(model, t, p, feed, &k0, options)
    };

    #[cfg(feature = "rayon")]
    {
        conditions.par_iter().map(flash).collect()
    }
    #[cfg(not(feature = "rayon"))]
    {
        conditions.iter().map(flash).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fugacity::{AntoineRecord, ModifiedRaoult, Phase};
    use crate::parameter::PureRecord;
    use approx::assert_relative_eq;
    use nalgebra::{dmatrix, dvector};
    use quantity::{BAR, KELVIN};

    fn records() -> Vec<PureRecord<AntoineRecord>> {
        vec![
            PureRecord::new("propane", AntoineRecord::new(21.42, 2282.0, 0.0)),
            PureRecord::new("butane", AntoineRecord::new(21.794, 2800.0, 0.0)),
        ]
    }

    /// Fugacity model with $K_i=\exp(x_i-y_i)$, whose only fixed point is the
    /// trivial solution.
    struct Unity;

    impl FugacityModel for Unity {
        fn components(&self) -> usize {
            2
        }

        fn fugacity_coefficient(
            &self,
            _: Temperature,
            _: Pressure,
            molefracs: &DVector<f64>,
            _: Phase,
        ) -> FlashResult<DVector<f64>> {
            Ok(molefracs.map(f64::exp))
        }
    }

    #[test]
    fn raoult() -> FlashResult<()> {
        let model = ModifiedRaoult::ideal(records());
        let (t, p) = (280.0 * KELVIN, 3.0 * BAR);
        let z = dvector![0.5, 0.5];
        let split = tp_flash(&model, t, p, &z, &dvector![2.0, 0.5], Default::default())?;
        assert!(split.is_converged());
        // composition independent K-factors are found after one step
        assert_eq!(split.iterations, 2);
        assert_relative_eq!(split.k, model.vapor_pressures(t) / 3e5, max_relative = 1e-12);
        assert!(split.is_physical());
        Ok(())
    }

    #[test]
    fn margules() -> FlashResult<()> {
        let model = ModifiedRaoult::new(records(), dmatrix![0.0, 1.2; 1.2, 0.0])?;
        let (t, p) = (280.0 * KELVIN, 3.0 * BAR);
        let z = dvector![0.5, 0.5];
        let k0 = model.vapor_pressures(t) / 3e5;
        let split = tp_flash(&model, t, p, &z, &k0, Default::default())?;
        assert!(split.is_converged());
        assert!(split.iterations > 2);

        let phi_l = model.fugacity_coefficient(t, p, &split.liquid, Phase::Liquid)?;
        let phi_v = model.fugacity_coefficient(t, p, &split.vapor, Phase::Vapor)?;
        assert_relative_eq!(
            split.liquid.component_mul(&phi_l),
            split.vapor.component_mul(&phi_v),
            max_relative = 1e-6
        );
        Ok(())
    }

    #[test]
    fn iteration_budget_exhausted() -> FlashResult<()> {
        let model = ModifiedRaoult::new(records(), dmatrix![0.0, 1.2; 1.2, 0.0])?;
        let (t, p) = (280.0 * KELVIN, 3.0 * BAR);
        let z = dvector![0.5, 0.5];
        let options = SolverOptions::new().max_iter(3).tol(1e-12);
        let k0 = dvector![2.0, 0.5];
        let split = tp_flash(&model, t, p, &z, &k0, (Default::default(), options))?;
        assert_eq!(split.convergence, Convergence::MaxIterations);
        assert!(!split.is_converged());
        assert_eq!(split.iterations, 3);
        assert!(split.residual > 1e-12);
        assert!(split.vapor_fraction.is_finite());
        let rr = split.rachford_rice;
        assert!(rr.beta_min < split.vapor_fraction && split.vapor_fraction < rr.beta_max);
        assert_relative_eq!(split.liquid.sum(), 1.0, max_relative = 1e-8);
        Ok(())
    }

    #[test]
    fn trivial_solution() -> FlashResult<()> {
        let (t, p) = (300.0 * KELVIN, 1.0 * BAR);
        let z = dvector![0.5, 0.5];
        let k0 = dvector![1.05, 0.95];
        let split = tp_flash(&Unity, t, p, &z, &k0, Default::default())?;
        assert!(split.convergence.is_converged());
        assert_relative_eq!(split.k, dvector![1.0, 1.0], epsilon = 1e-6);
        assert!(split.is_trivial_solution());
        Ok(())
    }

    #[test]
    fn single_phase_region() -> FlashResult<()> {
        // at 1 bar both components have K > 1
        let model = ModifiedRaoult::ideal(records());
        let (t, p) = (280.0 * KELVIN, 1.0 * BAR);
        let z = dvector![0.5, 0.5];
        let k0 = dvector![2.0, 0.5];
        let split = tp_flash(&model, t, p, &z, &k0, Default::default())?;
        assert_eq!(split.convergence, Convergence::NoPhaseSplit);
        assert!(!split.is_converged());
        assert_eq!(split.iterations, 1);
        assert_eq!(split.k, k0);
        assert_relative_eq!(split.vapor_fraction, 0.5, max_relative = 1e-8);
        assert!(split.residual > 1.0);

        let conditions = [(t, p), (t, 3.0 * BAR)];
        let results = tp_flash_grid(
            &model,
            &conditions,
            &z,
            |_, _| Ok(k0.clone()),
            Default::default(),
        );
        assert!(results.iter().all(|r| r.is_ok()));
        Ok(())
    }

    #[test]
    fn invalid_input() {
        let model = ModifiedRaoult::ideal(records());
        let (t, p) = (280.0 * KELVIN, 3.0 * BAR);
        let z = dvector![0.5, 0.5];
        assert!(matches!(
            tp_flash(&model, t, p, &z, &dvector![1.0, 1.0], Default::default()),
            Err(FlashError::DegenerateKFactors { .. })
        ));
        let z3 = dvector![0.2, 0.3, 0.5];
        let k3 = dvector![2.0, 1.0, 0.5];
        assert!(matches!(
            tp_flash(&model, t, p, &z3, &k3, Default::default()),
            Err(FlashError::IncompatibleComponents(2, 3))
        ));
    }

    #[test]
    fn grid() {
        let model = ModifiedRaoult::ideal(records());
        let z = dvector![0.5, 0.5];
        let conditions: Vec<_> = [2.0, 3.0, 4.0]
            .iter()
            .map(|&p| (280.0 * KELVIN, p * BAR))
            .collect();
        let results = tp_flash_grid(
            &model,
            &conditions,
            &z,
            |t, p| Ok(model.vapor_pressures(t) / p.convert_into(quantity::PASCAL)),
            Default::default(),
        );
        assert_eq!(results.len(), 3);
        let beta: Vec<_> = results
            .into_iter()
            .map(|r| r.map(|s| s.vapor_fraction).unwrap())
            .collect();
        // the vapor fraction decreases with pressure
        assert!(beta[0] > beta[1] && beta[1] > beta[2]);
    }
}
