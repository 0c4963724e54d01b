use log::{debug, info, warn};
use ndarray::Array2;

use super::super::monitor::IterationReport;
use super::super::params::{self, ReportMap, TrainingParameters};
use super::{Gis, Trainer, TrainingAlgorithm};
use crate::dataset::IndexedCorpus;
use crate::error::{Error, Result};
use crate::model::{self, Context, Model, ModelType};

/// Observed count used for the slack feature when it never fires.
const NEAR_ZERO: f64 = 0.01;

/// GIS training parameters.
#[derive(Debug, Clone)]
pub struct GisParams {
    iterations: usize,
    correction_constant: Option<u32>,
    use_slack_parameter: bool,
    smoothing: bool,
    smoothing_observation: f64,
}

impl Default for GisParams {
    fn default() -> Self {
        Self {
            iterations: 100,
            correction_constant: None,
            use_slack_parameter: false,
            smoothing: false,
            smoothing_observation: 0.1,
        }
    }
}

impl GisParams {
    pub fn iterations(&self) -> usize {
        self.iterations
    }

    pub fn set_iterations(&mut self, iterations: usize) -> Result<()> {
        if iterations < 1 {
            return Err(Error::config("iterations must be at least 1"));
        }
        self.iterations = iterations;
        Ok(())
    }

    /// Fixed correction constant, derived from the data when `None`
    pub fn correction_constant(&self) -> Option<u32> {
        self.correction_constant
    }

    pub fn set_correction_constant(&mut self, constant: Option<u32>) -> Result<()> {
        if constant == Some(0) {
            return Err(Error::config("correction constant must be positive"));
        }
        self.correction_constant = constant;
        Ok(())
    }

    pub fn use_slack_parameter(&self) -> bool {
        self.use_slack_parameter
    }

    pub fn set_use_slack_parameter(&mut self, enabled: bool) {
        self.use_slack_parameter = enabled;
    }

    pub fn smoothing(&self) -> bool {
        self.smoothing
    }

    /// Give every (predicate, outcome) pair a small observed count so that
    /// unseen pairs get a parameter too.
    pub fn set_smoothing(&mut self, enabled: bool) {
        self.smoothing = enabled;
    }

    pub fn smoothing_observation(&self) -> f64 {
        self.smoothing_observation
    }

    pub fn set_smoothing_observation(&mut self, observation: f64) -> Result<()> {
        if !(observation > 0.0 && observation.is_finite()) {
            return Err(Error::config("smoothing observation must be positive"));
        }
        self.smoothing_observation = observation;
        Ok(())
    }
}

impl TrainingAlgorithm for Gis {
    const NAME: &'static str = "GIS";

    type Params = GisParams;

    fn configure(
        p: &mut GisParams,
        bag: &TrainingParameters,
        report: &mut ReportMap,
    ) -> Result<()> {
        if let Some(iterations) = bag.parse(params::ITERATIONS)? {
            p.set_iterations(iterations)?;
        }
        if let Some(constant) = bag.parse(params::CORRECTION_CONSTANT)? {
            p.set_correction_constant(Some(constant))?;
        }
        if let Some(enabled) = bag.parse_bool(params::USE_SLACK_PARAMETER)? {
            p.set_use_slack_parameter(enabled);
        }
        if let Some(enabled) = bag.parse_bool(params::SMOOTHING)? {
            p.set_smoothing(enabled);
        }
        if let Some(observation) = bag.parse(params::SMOOTHING_OBSERVATION)? {
            p.set_smoothing_observation(observation)?;
        }

        report.insert(params::ITERATIONS.to_string(), p.iterations.to_string());
        if let Some(constant) = p.correction_constant {
            report.insert(params::CORRECTION_CONSTANT.to_string(), constant.to_string());
        }
        report.insert(
            params::USE_SLACK_PARAMETER.to_string(),
            p.use_slack_parameter.to_string(),
        );
        report.insert(params::SMOOTHING.to_string(), p.smoothing.to_string());
        if p.smoothing {
            report.insert(
                params::SMOOTHING_OBSERVATION.to_string(),
                p.smoothing_observation.to_string(),
            );
        }
        Ok(())
    }

    fn train(trainer: &Trainer<Self>, corpus: &IndexedCorpus) -> Result<Model> {
        trainer.train_gis(corpus)
    }
}

impl Trainer<Gis> {
    /// Train using Generalized Iterative Scaling
    pub(super) fn train_gis(&self, corpus: &IndexedCorpus) -> Result<Model> {
        let num_preds = corpus.num_predicates();
        let num_outcomes = corpus.num_outcomes();
        let num_events = corpus.num_events() as f64;
        let contexts = corpus.contexts();
        let outcomes = corpus.outcomes();
        let num_times_seen = corpus.num_times_seen();

        if let Some(values) = corpus.values() {
            if values.iter().flatten().any(|&v| v < 0.0) {
                return Err(Error::invalid_input(
                    "negative feature values are not supported by GIS",
                ));
            }
        }

        let max_context = (0..corpus.len())
            .map(|i| corpus.context_size(i))
            .fold(0.0_f64, f64::max)
            .ceil()
            .max(1.0);
        let constant = match self.params.correction_constant() {
            Some(c) if (c as f64) < max_context => {
                return Err(Error::invalid_input(format!(
                    "correction constant {} is smaller than the largest context ({})",
                    c, max_context
                )));
            }
            Some(c) => c as f64,
            None => max_context,
        };
        debug!("GIS correction constant: {}", constant);

        // Empirical feature counts
        let mut observed = Array2::<f64>::zeros((num_preds, num_outcomes));
        for (i, context) in contexts.iter().enumerate() {
            let oid = outcomes[i] as usize;
            let seen = num_times_seen[i] as f64;
            for (j, &pid) in context.iter().enumerate() {
                observed[[pid as usize, oid]] += corpus.value(i, j) * seen;
            }
        }

        // Active (predicate, outcome) pairs carry a parameter
        let smoothing = self.params.smoothing();
        let smoothing_observation = self.params.smoothing_observation();
        let mut params = Vec::with_capacity(num_preds);
        let mut log_observed = Vec::with_capacity(num_preds);
        let mut num_active = 0;
        for pid in 0..num_preds {
            let mut active = Vec::new();
            let mut counts = Vec::new();
            for oid in 0..num_outcomes {
                let count = observed[[pid, oid]];
                if count > 0.0 {
                    active.push(oid as u32);
                    counts.push(count.ln());
                } else if smoothing {
                    active.push(oid as u32);
                    counts.push(smoothing_observation.ln());
                }
            }
            num_active += active.len();
            params.push(Context::new(active.clone(), vec![0.0; active.len()]));
            log_observed.push(counts);
        }
        drop(observed);
        info!("GIS: {} active parameters", num_active);

        let use_slack = self.params.use_slack_parameter();
        let mut correction_param = 0.0;
        let mut log_slack_observed = 0.0;
        if use_slack {
            let mut slack = 0.0;
            let mut num_feats = vec![0u32; num_outcomes];
            for (i, context) in contexts.iter().enumerate() {
                count_active(&params, context, &mut num_feats);
                let nf = num_feats[outcomes[i] as usize] as f64;
                slack += (constant - nf) * num_times_seen[i] as f64;
            }
            if slack <= 0.0 {
                slack = NEAR_ZERO;
            }
            log_slack_observed = slack.ln();
        }

        let mut expected: Vec<Vec<f64>> = params
            .iter()
            .map(|c| vec![0.0; c.outcomes().len()])
            .collect();
        let mut probs = vec![0.0; num_outcomes];
        let mut num_feats = vec![0u32; num_outcomes];
        for iteration in 1..=self.params.iterations() {
            if self.cancelled(iteration) {
                break;
            }
            for row in expected.iter_mut() {
                row.iter_mut().for_each(|e| *e = 0.0);
            }
            let mut slack_expected = 0.0;
            let mut log_likelihood = 0.0;
            let mut correct = 0.0;

            for (i, context) in contexts.iter().enumerate() {
                probs.iter_mut().for_each(|p| *p = 0.0);
                num_feats.iter_mut().for_each(|n| *n = 0);
                for (j, &pid) in context.iter().enumerate() {
                    let value = corpus.value(i, j);
                    let pctx = &params[pid as usize];
                    for (&oid, &param) in pctx.outcomes().iter().zip(pctx.parameters()) {
                        probs[oid as usize] += param * value;
                        num_feats[oid as usize] += 1;
                    }
                }
                model::normalize_gis(&mut probs, &num_feats, constant, correction_param);

                let seen = num_times_seen[i] as f64;
                for (j, &pid) in context.iter().enumerate() {
                    let value = corpus.value(i, j) * seen;
                    let pctx = &params[pid as usize];
                    for (k, &oid) in pctx.outcomes().iter().enumerate() {
                        expected[pid as usize][k] += probs[oid as usize] * value;
                    }
                }
                if use_slack {
                    for (p, &nf) in probs.iter().zip(&num_feats) {
                        slack_expected += p * (constant - nf as f64) * seen;
                    }
                }

                let oid = outcomes[i] as usize;
                log_likelihood += probs[oid].ln() * seen;
                if model::argmax(&probs) == oid {
                    correct += seen;
                }
            }

            // Update after the whole pass so the expectations stay consistent
            for (pid, pctx) in params.iter_mut().enumerate() {
                for k in 0..pctx.outcomes().len() {
                    let e = expected[pid][k];
                    if e > 0.0 {
                        pctx.update(k, log_observed[pid][k] - e.ln());
                    }
                }
            }
            if use_slack && slack_expected > 0.0 {
                correction_param += log_slack_observed - slack_expected.ln();
            }

            let accuracy = correct / num_events;
            info!(
                "{:>3}: loglikelihood={:.6} accuracy={:.5}",
                iteration, log_likelihood, accuracy
            );
            if !log_likelihood.is_finite() {
                warn!("GIS: log-likelihood is no longer finite");
            }
            self.report(IterationReport {
                iteration,
                objective: Some(log_likelihood),
                accuracy: Some(accuracy),
            });
        }

        Model::new(
            ModelType::Gis,
            params,
            corpus.pred_labels().to_vec(),
            corpus.outcome_labels().to_vec(),
            constant,
            correction_param,
        )
    }
}

/// Count, per outcome, how many predicates of `context` have a parameter for it
fn count_active(params: &[Context], context: &[u32], num_feats: &mut [u32]) {
    num_feats.iter_mut().for_each(|n| *n = 0);
    for &pid in context {
        for &oid in params[pid as usize].outcomes() {
            num_feats[oid as usize] += 1;
        }
    }
}
