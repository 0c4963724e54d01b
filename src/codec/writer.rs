use log::debug;

use super::data_io::DataWriter;
use crate::error::{Error, Result};
use crate::model::{Context, Model, ModelType};

/// A predicate with the parameters that survive into the persisted model
struct SortedPredicate<'a> {
    name: &'a str,
    outcomes: Vec<u32>,
    parameters: Vec<f64>,
}

/// Writes a model section by section
///
/// Predicates are ordered by their active outcome sets so that runs of
/// predicates sharing the same outcomes can be stored as a single outcome
/// pattern.
pub struct ModelWriter<'m> {
    model: &'m Model,
}

impl<'m> ModelWriter<'m> {
    pub fn new(model: &'m Model) -> Self {
        Self { model }
    }

    pub fn write(&self, w: &mut dyn DataWriter) -> Result<()> {
        let model = self.model;
        let sorted = self.sorted_predicates();
        let patterns = compress_outcomes(&sorted);
        debug!(
            "writing {} model: {} outcomes, {} predicates, {} outcome patterns",
            model.model_type(),
            model.num_outcomes(),
            sorted.len(),
            patterns.len()
        );

        w.write_utf(model.model_type().as_str())?;
        if model.model_type() == ModelType::Gis {
            let constant = model.correction_constant();
            if constant.fract() != 0.0 || constant > i32::MAX as f64 {
                return Err(Error::invalid_input(format!(
                    "correction constant {} cannot be persisted",
                    constant
                )));
            }
            w.write_int(constant as i32)?;
            w.write_double(model.correction_param())?;
        }

        w.write_int(to_i32(model.num_outcomes())?)?;
        for name in model.outcomes() {
            w.write_utf(name)?;
        }

        w.write_int(to_i32(patterns.len())?)?;
        for pattern in &patterns {
            let mut line = pattern.len().to_string();
            for oid in &sorted[pattern.start].outcomes {
                line.push(' ');
                line.push_str(&oid.to_string());
            }
            w.write_utf(&line)?;
        }

        w.write_int(to_i32(sorted.len())?)?;
        for pred in &sorted {
            w.write_utf(pred.name)?;
        }

        for pred in &sorted {
            for &param in &pred.parameters {
                w.write_double(param)?;
            }
        }
        Ok(())
    }

    fn sorted_predicates(&self) -> Vec<SortedPredicate<'m>> {
        let model = self.model;
        let prune = model.model_type() == ModelType::Perceptron;
        let mut sorted: Vec<_> = model
            .predicates()
            .iter()
            .zip(model.contexts())
            .filter_map(|(name, ctx)| {
                let (outcomes, parameters) = if prune {
                    prune_zeros(ctx)
                } else {
                    (ctx.outcomes().to_vec(), ctx.parameters().to_vec())
                };
                if prune && outcomes.is_empty() {
                    return None;
                }
                Some(SortedPredicate {
                    name: name.as_str(),
                    outcomes,
                    parameters,
                })
            })
            .collect();
        // stable, so predicates sharing a pattern keep their id order
        sorted.sort_by(|a, b| a.outcomes.cmp(&b.outcomes));
        sorted
    }
}

fn prune_zeros(ctx: &Context) -> (Vec<u32>, Vec<f64>) {
    ctx.outcomes()
        .iter()
        .zip(ctx.parameters())
        .filter(|&(_, &p)| p != 0.0)
        .map(|(&o, &p)| (o, p))
        .unzip()
}

/// Ranges of consecutive predicates sharing the same outcomes
fn compress_outcomes(sorted: &[SortedPredicate<'_>]) -> Vec<std::ops::Range<usize>> {
    let mut patterns = Vec::new();
    let mut start = 0;
    for i in 1..=sorted.len() {
        if i == sorted.len() || sorted[i].outcomes != sorted[start].outcomes {
            if i > start {
                patterns.push(start..i);
            }
            start = i;
        }
    }
    patterns
}

fn to_i32(n: usize) -> Result<i32> {
    i32::try_from(n).map_err(|_| Error::invalid_input("table too large for the model format"))
}
