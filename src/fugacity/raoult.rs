//! Modified Raoult's law with a two-suffix Margules activity model.
//!
//! This module acts as a reference on how a simple fugacity model can be
//! implemented. The vapor phase is ideal, the liquid phase fugacity
//! coefficient is $\varphi_i^L=\gamma_i p_i^\mathrm{sat}/p$.
use super::{FugacityModel, Phase};
use crate::errors::{FlashError, FlashResult};
use crate::parameter::PureRecord;
use nalgebra::{DMatrix, DVector};
use quantity::{Pressure, Temperature, KELVIN, PASCAL};
use serde::{Deserialize, Serialize};

/// Antoine coefficients of a pure substance.
///
/// $\ln\left(p^\mathrm{sat}/\mathrm{Pa}\right)=a-\frac{b}{T/\mathrm{K}+c}$
#[derive(Serialize, Deserialize, Debug, Clone, Copy)]
pub struct AntoineRecord {
    a: f64,
    b: f64,
    #[serde(default)]
    c: f64,
}

impl AntoineRecord {
    /// Create a new pure substance record for the Antoine equation.
    pub fn new(a: f64, b: f64, c: f64) -> Self {
        Self { a, b, c }
    }

    /// Vapor pressure in Pascal at the given temperature in Kelvin.
    pub fn vapor_pressure(&self, temperature: f64) -> f64 {
        (self.a - self.b / (temperature + self.c)).exp()
    }
}

/// Modified Raoult's law.
///
/// The activity coefficients follow the symmetric two-suffix Margules model
/// $\ln\gamma_i=\sum_jA_{ij}x_j-\frac{1}{2}\sum_{jk}A_{jk}x_jx_k$.
/// With $A=0$ the model reduces to Raoult's law and the K-factors
/// do not depend on composition.
pub struct ModifiedRaoult {
    /// Parameters
    pub records: Vec<PureRecord<AntoineRecord>>,
    /// Dimensionless Margules parameters
    margules: DMatrix<f64>,
}

impl ModifiedRaoult {
    /// Create a new model from vapor pressure records and Margules parameters.
    pub fn new(
        records: Vec<PureRecord<AntoineRecord>>,
        margules: DMatrix<f64>,
    ) -> FlashResult<Self> {
        let n = records.len();
        if margules.shape() != (n, n) {
            return Err(FlashError::IncompatibleParameters(format!(
                "expected {n}x{n} Margules parameters, got {}x{}.",
                margules.nrows(),
                margules.ncols()
            )));
        }
        if margules != margules.transpose() {
            return Err(FlashError::IncompatibleParameters(String::from(
                "Margules parameters have to be symmetric.",
            )));
        }
        if margules.diagonal().iter().any(|&a| a != 0.0) {
            return Err(FlashError::IncompatibleParameters(String::from(
                "the diagonal of the Margules parameters has to be zero.",
            )));
        }
        Ok(Self { records, margules })
    }

    /// Raoult's law for an ideal liquid mixture.
    pub fn ideal(records: Vec<PureRecord<AntoineRecord>>) -> Self {
        let n = records.len();
        Self {
            records,
            margules: DMatrix::zeros(n, n),
        }
    }

    /// Vapor pressures of all components in Pascal.
    pub fn vapor_pressures(&self, temperature: Temperature) -> DVector<f64> {
        let t = temperature.convert_into(KELVIN);
        DVector::from_iterator(
            self.records.len(),
            self.records
                .iter()
                .map(|r| r.model_record.vapor_pressure(t)),
        )
    }

    /// Logarithmic activity coefficients in the liquid phase.
    pub fn ln_gamma(&self, molefracs: &DVector<f64>) -> DVector<f64> {
        let ax = &self.margules * molefracs;
        let g = 0.5 * molefracs.dot(&ax);
        ax.add_scalar(-g)
    }
}

impl FugacityModel for ModifiedRaoult {
    fn components(&self) -> usize {
        self.records.len()
    }

    fn fugacity_coefficient(
        &self,
        temperature: Temperature,
        pressure: Pressure,
        molefracs: &DVector<f64>,
        phase: Phase,
    ) -> FlashResult<DVector<f64>> {
        if molefracs.len() != self.components() {
            return Err(FlashError::IncompatibleComponents(
                self.components(),
                molefracs.len(),
            ));
        }
        Ok(match phase {
            Phase::Liquid => {
                let p = pressure.convert_into(PASCAL);
                self.ln_gamma(molefracs)
                    .map(f64::exp)
                    .component_mul(&self.vapor_pressures(temperature))
                    / p
            }
            Phase::Vapor => DVector::from_element(self.components(), 1.0),
        })
    }
}
