use std::fmt;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use crate::codec::{self, Format};
use crate::error::{Error, Result};
use crate::index_hash_table::IndexHashTable;

/// Load factor of the predicate lookup table
pub const PREDICATE_LOAD_FACTOR: f64 = 0.7;

/// Flavour of a trained model, selects the normalization used for scoring
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelType {
    /// Generalized Iterative Scaling maxent model
    Gis,
    /// Perceptron model
    Perceptron,
    /// Quasi-Newton (L-BFGS) maxent model
    QuasiNewton,
}

impl ModelType {
    /// Type tag written at the start of a persisted model
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Gis => "GIS",
            Self::Perceptron => "Perceptron",
            Self::QuasiNewton => "QN",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "GIS" => Some(Self::Gis),
            "Perceptron" => Some(Self::Perceptron),
            "QN" => Some(Self::QuasiNewton),
            _ => None,
        }
    }
}

impl fmt::Display for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parameters of one predicate
///
/// Only the outcomes the predicate is active for are stored, `outcomes[i]`
/// is the outcome id weighted by `parameters[i]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Context {
    outcomes: Vec<u32>,
    parameters: Vec<f64>,
}

impl Context {
    pub fn new(outcomes: Vec<u32>, parameters: Vec<f64>) -> Self {
        debug_assert_eq!(outcomes.len(), parameters.len());
        Self {
            outcomes,
            parameters,
        }
    }

    /// Active outcome ids
    pub fn outcomes(&self) -> &[u32] {
        &self.outcomes
    }

    /// Weights parallel to [`Context::outcomes`]
    pub fn parameters(&self) -> &[f64] {
        &self.parameters
    }

    /// Weight of `outcome`, `None` if the predicate is not active for it
    pub fn parameter(&self, outcome: u32) -> Option<f64> {
        self.outcomes
            .iter()
            .position(|&o| o == outcome)
            .map(|i| self.parameters[i])
    }

    pub(crate) fn update(&mut self, index: usize, delta: f64) {
        self.parameters[index] += delta;
    }
}

/// A trained maximum entropy / perceptron model
///
/// Models are immutable once built and can be shared between threads for
/// concurrent scoring.
#[derive(Clone)]
pub struct Model {
    model_type: ModelType,
    contexts: Vec<Context>,
    pmap: IndexHashTable<String>,
    outcome_names: Vec<String>,
    correction_constant: f64,
    correction_param: f64,
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Model")
            .field("model_type", &self.model_type)
            .field("num_predicates", &self.contexts.len())
            .field("outcomes", &self.outcome_names)
            .field("correction_constant", &self.correction_constant)
            .field("correction_param", &self.correction_param)
            .finish()
    }
}

impl Model {
    /// Assemble a model from its parts
    ///
    /// `contexts[i]` holds the parameters of `predicates[i]`.
    pub fn new(
        model_type: ModelType,
        contexts: Vec<Context>,
        predicates: Vec<String>,
        outcome_names: Vec<String>,
        correction_constant: f64,
        correction_param: f64,
    ) -> Result<Self> {
        if contexts.len() != predicates.len() {
            return Err(Error::invalid_input(format!(
                "{} predicates but {} parameter contexts",
                predicates.len(),
                contexts.len()
            )));
        }
        if outcome_names.is_empty() {
            return Err(Error::invalid_input("a model needs at least one outcome"));
        }
        let num_outcomes = outcome_names.len();
        for context in &contexts {
            if context.outcomes.len() != context.parameters.len() {
                return Err(Error::invalid_input("context outcome/parameter mismatch"));
            }
            if context.outcomes.iter().any(|&o| o as usize >= num_outcomes) {
                return Err(Error::invalid_input("context refers to an unknown outcome"));
            }
        }
        if model_type == ModelType::Gis && correction_constant <= 0.0 {
            return Err(Error::invalid_input("correction constant must be positive"));
        }
        let pmap = IndexHashTable::new(predicates, PREDICATE_LOAD_FACTOR)?;
        Ok(Self {
            model_type,
            contexts,
            pmap,
            outcome_names,
            correction_constant,
            correction_param,
        })
    }

    pub fn model_type(&self) -> ModelType {
        self.model_type
    }

    pub fn num_outcomes(&self) -> usize {
        self.outcome_names.len()
    }

    pub fn num_predicates(&self) -> usize {
        self.contexts.len()
    }

    /// Predicate names ordered by predicate id
    pub fn predicates(&self) -> &[String] {
        self.pmap.keys()
    }

    /// Outcome names ordered by outcome id
    pub fn outcomes(&self) -> &[String] {
        &self.outcome_names
    }

    /// Parameter contexts ordered by predicate id
    pub fn contexts(&self) -> &[Context] {
        &self.contexts
    }

    pub fn correction_constant(&self) -> f64 {
        self.correction_constant
    }

    pub fn correction_param(&self) -> f64 {
        self.correction_param
    }

    /// Name of the outcome with id `index`
    pub fn outcome(&self, index: usize) -> Option<&str> {
        self.outcome_names.get(index).map(String::as_str)
    }

    /// Id of the outcome called `name`
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.outcome_names.iter().position(|o| o == name)
    }

    /// Id of the predicate called `name`
    pub fn predicate_index(&self, name: &str) -> Option<usize> {
        self.pmap.get(name)
    }

    /// Evaluate a context of binary predicates
    ///
    /// Returns the probability of every outcome, indexed by outcome id.
    /// Predicates unknown to the model are ignored.
    pub fn eval<S: AsRef<str>>(&self, context: &[S]) -> Vec<f64> {
        let mut probs = vec![0.0; self.num_outcomes()];
        self.score(context, None, &mut probs);
        probs
    }

    /// Evaluate a context of real-valued predicates
    pub fn eval_with_values<S: AsRef<str>>(&self, context: &[S], values: &[f64]) -> Result<Vec<f64>> {
        let mut probs = vec![0.0; self.num_outcomes()];
        self.eval_into(context, Some(values), &mut probs)?;
        Ok(probs)
    }

    /// Evaluate a context into a caller supplied buffer
    ///
    /// `out` must hold exactly one slot per outcome, `values` (when given)
    /// one value per predicate.
    pub fn eval_into<S: AsRef<str>>(
        &self,
        context: &[S],
        values: Option<&[f64]>,
        out: &mut [f64],
    ) -> Result<()> {
        if out.len() != self.num_outcomes() {
            return Err(Error::invalid_input(format!(
                "output buffer holds {} entries, model has {} outcomes",
                out.len(),
                self.num_outcomes()
            )));
        }
        if let Some(values) = values {
            if values.len() != context.len() {
                return Err(Error::invalid_input(format!(
                    "{} predicates but {} values",
                    context.len(),
                    values.len()
                )));
            }
        }
        out.fill(0.0);
        self.score(context, values, out);
        Ok(())
    }

    fn score<S: AsRef<str>>(&self, context: &[S], values: Option<&[f64]>, probs: &mut [f64]) {
        let mut num_feats = vec![0u32; probs.len()];
        for (i, pred) in context.iter().enumerate() {
            let pid = match self.pmap.get(pred.as_ref()) {
                Some(pid) => pid,
                None => continue,
            };
            let value = values.map_or(1.0, |v| v[i]);
            let ctx = &self.contexts[pid];
            for (&oid, &param) in ctx.outcomes.iter().zip(&ctx.parameters) {
                num_feats[oid as usize] += 1;
                probs[oid as usize] += param * value;
            }
        }
        match self.model_type {
            ModelType::Gis => {
                normalize_gis(probs, &num_feats, self.correction_constant, self.correction_param)
            }
            ModelType::Perceptron => normalize_perceptron(probs),
            ModelType::QuasiNewton => normalize_softmax(probs),
        }
    }

    /// Name of the most probable outcome in `probs`
    ///
    /// Ties are resolved in favour of the lowest outcome id. Entries past
    /// `num_outcomes()` are ignored, so oversized scratch buffers are fine.
    pub fn best_outcome(&self, probs: &[f64]) -> &str {
        let n = probs.len().min(self.outcome_names.len());
        &self.outcome_names[argmax(&probs[..n])]
    }

    /// Human readable listing of every outcome with its probability
    pub fn all_outcomes(&self, probs: &[f64]) -> String {
        self.outcome_names
            .iter()
            .zip(probs)
            .map(|(name, p)| format!("{}[{:.4}]", name, p))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Read a model from memory, detecting the encoding
    pub fn from_bytes(buf: &[u8]) -> Result<Self> {
        codec::deserialize(buf, Format::detect(buf))
    }

    /// Serialize the model in the compact binary encoding
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        codec::serialize(self, Format::Binary)
    }

    /// Load a model file, detecting the encoding
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        codec::read_model(BufReader::new(file))
    }

    /// Save the model to a file in the given encoding
    pub fn save<P: AsRef<Path>>(&self, path: P, format: Format) -> Result<()> {
        let mut w = BufWriter::new(File::create(path)?);
        codec::write_model(self, &mut w, format)?;
        w.flush()?;
        Ok(())
    }
}

pub(crate) fn argmax(values: &[f64]) -> usize {
    let mut best = 0;
    for (i, &v) in values.iter().enumerate().skip(1) {
        if v > values[best] {
            best = i;
        }
    }
    best
}

pub(crate) fn normalize_gis(probs: &mut [f64], num_feats: &[u32], constant: f64, param: f64) {
    let inverse = 1.0 / constant;
    let mut normal = 0.0;
    for (p, &nf) in probs.iter_mut().zip(num_feats) {
        *p = if param != 0.0 {
            (*p * inverse + (1.0 - nf as f64 / constant) * param).exp()
        } else {
            (*p * inverse).exp()
        };
        normal += *p;
    }
    for p in probs.iter_mut() {
        *p /= normal;
    }
}

pub(crate) fn normalize_perceptron(probs: &mut [f64]) {
    let max = probs.iter().fold(1.0_f64, |m, p| m.max(p.abs()));
    let mut normal = 0.0;
    for p in probs.iter_mut() {
        *p = (*p / max).exp();
        normal += *p;
    }
    for p in probs.iter_mut() {
        *p /= normal;
    }
}

pub(crate) fn normalize_softmax(probs: &mut [f64]) {
    let max = probs.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let mut normal = 0.0;
    for p in probs.iter_mut() {
        *p = (*p - max).exp();
        normal += *p;
    }
    for p in probs.iter_mut() {
        *p /= normal;
    }
}
