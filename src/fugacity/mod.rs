//! The fugacity model consumed by the flash solver.
//!
//! The flash never inspects a model beyond the [FugacityModel] trait. Any
//! equation of state or activity coefficient model that can provide
//! fugacity coefficients of a phase at given temperature, pressure and
//! composition can be used.
use crate::errors::{FlashError, FlashResult};
use nalgebra::DVector;
use quantity::{Pressure, Temperature};
use std::fmt;
use std::sync::Arc;

mod raoult;
pub use raoult::{AntoineRecord, ModifiedRaoult};

/// Phase for which fugacity coefficients are requested.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Phase {
    Liquid,
    Vapor,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Liquid => write!(f, "liquid"),
            Self::Vapor => write!(f, "vapor"),
        }
    }
}

/// Fugacity coefficients of a mixture in a given phase.
pub trait FugacityModel {
    /// Number of components of the model.
    fn components(&self) -> usize;

    /// Fugacity coefficients $\varphi_i$ of all components in the given phase.
    fn fugacity_coefficient(
        &self,
        temperature: Temperature,
        pressure: Pressure,
        molefracs: &DVector<f64>,
        phase: Phase,
    ) -> FlashResult<DVector<f64>>;

    /// Logarithmic fugacity coefficients $\ln\varphi_i$.
    fn ln_phi(
        &self,
        temperature: Temperature,
        pressure: Pressure,
        molefracs: &DVector<f64>,
        phase: Phase,
    ) -> FlashResult<DVector<f64>> {
        Ok(self
            .fugacity_coefficient(temperature, pressure, molefracs, phase)?
            .map(f64::ln))
    }

    /// K-factors $K_i=\varphi_i^L/\varphi_i^V$ for the given liquid and vapor compositions.
    fn k_factors(
        &self,
        temperature: Temperature,
        pressure: Pressure,
        liquid_molefracs: &DVector<f64>,
        vapor_molefracs: &DVector<f64>,
    ) -> FlashResult<DVector<f64>> {
        let phi_l =
            self.fugacity_coefficient(temperature, pressure, liquid_molefracs, Phase::Liquid)?;
        let phi_v =
            self.fugacity_coefficient(temperature, pressure, vapor_molefracs, Phase::Vapor)?;
        for (phi, phase) in [(&phi_l, Phase::Liquid), (&phi_v, Phase::Vapor)] {
            if phi.len() != liquid_molefracs.len() {
                return Err(FlashError::IncompatibleComponents(
                    liquid_molefracs.len(),
                    phi.len(),
                ));
            }
            if !phi.iter().all(|&p| p.is_finite() && p > 0.0) {
                return Err(FlashError::IterationFailed(format!(
                    "{phase} fugacity coefficients"
                )));
            }
        }
        Ok(phi_l.component_div(&phi_v))
    }
}

impl<M: FugacityModel + ?Sized> FugacityModel for &M {
    fn components(&self) -> usize {
        (**self).components()
    }

    fn fugacity_coefficient(
        &self,
        temperature: Temperature,
        pressure: Pressure,
        molefracs: &DVector<f64>,
        phase: Phase,
    ) -> FlashResult<DVector<f64>> {
        (**self).fugacity_coefficient(temperature, pressure, molefracs, phase)
    }
}

impl<M: FugacityModel + ?Sized> FugacityModel for Arc<M> {
    fn components(&self) -> usize {
        (**self).components()
    }

    fn fugacity_coefficient(
        &self,
        temperature: Temperature,
        pressure: Pressure,
        molefracs: &DVector<f64>,
        phase: Phase,
    ) -> FlashResult<DVector<f64>> {
        (**self).fugacity_coefficient(temperature, pressure, molefracs, phase)
    }
}
