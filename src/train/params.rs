use std::collections::BTreeMap;
use std::fmt;
use std::io::BufRead;
use std::str::FromStr;

use crate::error::{Error, Result};

pub const ALGORITHM: &str = "Algorithm";
pub const ITERATIONS: &str = "Iterations";
pub const CUTOFF: &str = "Cutoff";
pub const SORT: &str = "Sort";
pub const DATA_INDEXER: &str = "DataIndexer";
pub const TOLERANCE: &str = "Tolerance";
pub const STEP_SIZE_DECREASE: &str = "StepSizeDecrease";
pub const USE_AVERAGE: &str = "UseAverage";
pub const USE_SKIPPED_AVERAGING: &str = "UseSkippedAveraging";
pub const SHUFFLE_SEED: &str = "ShuffleSeed";
pub const CORRECTION_CONSTANT: &str = "CorrectionConstant";
pub const USE_SLACK_PARAMETER: &str = "UseSlackParameter";
pub const SMOOTHING: &str = "Smoothing";
pub const SMOOTHING_OBSERVATION: &str = "SmoothingObservation";
pub const L1_COST: &str = "L1Cost";
pub const L2_COST: &str = "L2Cost";
pub const NUM_OF_UPDATES: &str = "NumOfUpdates";
pub const EPSILON: &str = "Epsilon";

/// Flat, string-keyed training configuration
///
/// Values are kept as strings and parsed by the trainer that consumes them,
/// so a parameter bag can carry options for custom trainers too.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrainingParameters {
    params: BTreeMap<String, String>,
}

impl TrainingParameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `key=value` lines, ignoring blank lines and `#` comments
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self> {
        let mut params = Self::new();
        for (line_no, line) in reader.lines().enumerate() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (key, value) = line.split_once('=').ok_or_else(|| {
                Error::config(format!(
                    "line {}: expected key=value, found {:?}",
                    line_no + 1,
                    line
                ))
            })?;
            params.set(key.trim(), value.trim());
        }
        Ok(params)
    }

    /// Set a parameter, replacing any previous value
    pub fn set(&mut self, key: impl Into<String>, value: impl ToString) -> &mut Self {
        self.params.insert(key.into(), value.to_string());
        self
    }

    /// Builder form of [`TrainingParameters::set`]
    pub fn with(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.set(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.params.remove(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.params.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Configured algorithm name, `GIS` when unset
    pub fn algorithm(&self) -> &str {
        self.get(ALGORITHM).unwrap_or(super::factory::GIS)
    }

    /// Parse a parameter, `None` when unset
    pub fn parse<T>(&self, key: &str) -> Result<Option<T>>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        match self.get(key) {
            Some(value) => value.trim().parse().map(Some).map_err(|e| {
                Error::config(format!("invalid value {:?} for {}: {}", value, key, e))
            }),
            None => Ok(None),
        }
    }

    /// Parse a boolean parameter, accepting `true`/`false` in any case
    pub fn parse_bool(&self, key: &str) -> Result<Option<bool>> {
        match self.get(key) {
            Some(value) => match value.trim().to_ascii_lowercase().as_str() {
                "true" => Ok(Some(true)),
                "false" => Ok(Some(false)),
                _ => Err(Error::config(format!(
                    "invalid value {:?} for {}: expected true or false",
                    value, key
                ))),
            },
            None => Ok(None),
        }
    }
}

impl<K: Into<String>, V: ToString> FromIterator<(K, V)> for TrainingParameters {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Self::new();
        for (k, v) in iter {
            params.set(k, v);
        }
        params
    }
}

/// Report of the settings a trainer resolved during `init`
pub type ReportMap = BTreeMap<String, String>;
