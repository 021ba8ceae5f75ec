//! Per-component parameter records and their JSON representation.
use crate::errors::{FlashError, FlashResult};
use indexmap::IndexMap;
use itertools::Itertools;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Parameters of a pure substance, identified by its name.
///
/// The model record is flattened into the JSON object, so that a single
/// file can hold e.g. critical data and vapor pressure coefficients side by
/// side and be read once per record type:
///
/// ```json
/// [{"name": "propane", "tc": 369.96, "pc": 4250000.0, "acentric_factor": 0.153}]
/// ```
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct PureRecord<M> {
    pub name: String,
    #[serde(flatten)]
    pub model_record: M,
}

impl<M> PureRecord<M> {
    /// Create a new `PureRecord`.
    pub fn new(name: impl Into<String>, model_record: M) -> Self {
        Self {
            name: name.into(),
            model_record,
        }
    }
}

impl<M: DeserializeOwned> PureRecord<M> {
    /// Read the records of the given substances from a json file.
    ///
    /// The records are returned in the order of `substances`.
    pub fn from_json<P: AsRef<Path>>(substances: &[&str], file: P) -> FlashResult<Vec<Self>> {
        let reader = BufReader::new(File::open(file)?);
        let records: Vec<Self> = serde_json::from_reader(reader)?;
        Self::select(substances, records)
    }

    fn select(substances: &[&str], records: Vec<Self>) -> FlashResult<Vec<Self>> {
        let mut record_map: IndexMap<_, _> =
            records.into_iter().map(|r| (r.name.clone(), r)).collect();

        let missing = substances
            .iter()
            .filter(|s| !record_map.contains_key(**s))
            .join(", ");
        if !missing.is_empty() {
            return Err(FlashError::ComponentsNotFound(missing));
        }

        Ok(substances
            .iter()
            .filter_map(|s| record_map.shift_remove(*s))
            .collect())
    }
}
