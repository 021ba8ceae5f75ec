use crate::errors::{FlashError, FlashResult};
use crate::parameter::PureRecord;
use nalgebra::DVector;
use quantity::{Pressure, Temperature, KELVIN, PASCAL};
use serde::{Deserialize, Serialize};

/// Critical data of a pure substance used in the Wilson correlation.
#[derive(Serialize, Deserialize, Debug, Clone, Copy)]
pub struct WilsonRecord {
    /// critical temperature in Kelvin
    tc: f64,
    /// critical pressure in Pascal
    pc: f64,
    /// acentric factor
    acentric_factor: f64,
}

impl WilsonRecord {
    /// Create a new pure substance record for the Wilson correlation.
    pub fn new(tc: f64, pc: f64, acentric_factor: f64) -> Self {
        Self {
            tc,
            pc,
            acentric_factor,
        }
    }

    fn k_factor(&self, temperature: f64, pressure: f64) -> f64 {
        self.pc / pressure
            * (5.373 * (1.0 + self.acentric_factor) * (1.0 - self.tc / temperature)).exp()
    }
}

/// Initial K-factors from the Wilson correlation
/// $K_i=\frac{p_{c,i}}{p}\exp\left(5.373(1+\omega_i)\left(1-\frac{T_{c,i}}{T}\right)\right)$.
pub fn wilson_k_factors(
    records: &[PureRecord<WilsonRecord>],
    temperature: Temperature,
    pressure: Pressure,
) -> FlashResult<DVector<f64>> {
    let t = temperature.convert_into(KELVIN);
    let p = pressure.convert_into(PASCAL);
    if !(t.is_finite() && t > 0.0) {
        return Err(FlashError::InvalidState(
            String::from("Wilson correlation"),
            String::from("temperature"),
            t,
        ));
    }
    if !(p.is_finite() && p > 0.0) {
        return Err(FlashError::InvalidState(
            String::from("Wilson correlation"),
            String::from("pressure"),
            p,
        ));
    }
    Ok(DVector::from_iterator(
        records.len(),
        records.iter().map(|r| r.model_record.k_factor(t, p)),
    ))
}
