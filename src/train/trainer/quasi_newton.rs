use std::cell::Cell;
use std::fmt;

use log::{info, warn};
use ndarray::{ArrayView2, ArrayViewMut2};

use super::super::monitor::IterationReport;
use super::super::params::{self, ReportMap, TrainingParameters};
use super::{QuasiNewton, Trainer, TrainingAlgorithm};
use crate::dataset::IndexedCorpus;
use crate::error::{Error, Result};
use crate::model::{self, Context, Model, ModelType};

/// Quasi-Newton training parameters.
///
/// With a positive L1 cost the optimizer switches to OWL-QN.
#[derive(Debug, Clone)]
pub struct QuasiNewtonParams {
    iterations: usize,
    l1_cost: f64,
    l2_cost: f64,
    num_of_updates: usize,
    epsilon: f64,
}

impl Default for QuasiNewtonParams {
    fn default() -> Self {
        Self {
            iterations: 100,
            l1_cost: 0.1,
            l2_cost: 0.1,
            num_of_updates: 15,
            epsilon: 1e-5,
        }
    }
}

impl QuasiNewtonParams {
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

    pub fn l1_cost(&self) -> f64 {
        self.l1_cost
    }

    pub fn set_l1_cost(&mut self, cost: f64) -> Result<()> {
        if !(cost >= 0.0 && cost.is_finite()) {
            return Err(Error::config("L1 cost must be non-negative"));
        }
        self.l1_cost = cost;
        Ok(())
    }

    pub fn l2_cost(&self) -> f64 {
        self.l2_cost
    }

    pub fn set_l2_cost(&mut self, cost: f64) -> Result<()> {
        if !(cost >= 0.0 && cost.is_finite()) {
            return Err(Error::config("L2 cost must be non-negative"));
        }
        self.l2_cost = cost;
        Ok(())
    }

    /// Number of correction pairs kept by the optimizer
    ///
    /// Recorded in the training report only, liblbfgs does not expose the
    /// memory size and always uses its default.
    pub fn num_of_updates(&self) -> usize {
        self.num_of_updates
    }

    pub fn set_num_of_updates(&mut self, updates: usize) -> Result<()> {
        if updates < 1 {
            return Err(Error::config("number of updates must be at least 1"));
        }
        self.num_of_updates = updates;
        Ok(())
    }

    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    pub fn set_epsilon(&mut self, epsilon: f64) -> Result<()> {
        if !(epsilon > 0.0 && epsilon.is_finite()) {
            return Err(Error::config("epsilon must be positive"));
        }
        self.epsilon = epsilon;
        Ok(())
    }
}

impl TrainingAlgorithm for QuasiNewton {
    const NAME: &'static str = "QN";

    type Params = QuasiNewtonParams;

    fn configure(
        p: &mut QuasiNewtonParams,
        bag: &TrainingParameters,
        report: &mut ReportMap,
    ) -> Result<()> {
        if let Some(iterations) = bag.parse(params::ITERATIONS)? {
            p.set_iterations(iterations)?;
        }
        if let Some(cost) = bag.parse(params::L1_COST)? {
            p.set_l1_cost(cost)?;
        }
        if let Some(cost) = bag.parse(params::L2_COST)? {
            p.set_l2_cost(cost)?;
        }
        if let Some(updates) = bag.parse(params::NUM_OF_UPDATES)? {
            p.set_num_of_updates(updates)?;
        }
        if let Some(epsilon) = bag.parse(params::EPSILON)? {
            p.set_epsilon(epsilon)?;
        }

        report.insert(params::ITERATIONS.to_string(), p.iterations.to_string());
        report.insert(params::L1_COST.to_string(), p.l1_cost.to_string());
        report.insert(params::L2_COST.to_string(), p.l2_cost.to_string());
        report.insert(params::NUM_OF_UPDATES.to_string(), p.num_of_updates.to_string());
        report.insert(params::EPSILON.to_string(), p.epsilon.to_string());
        Ok(())
    }

    fn train(trainer: &Trainer<Self>, corpus: &IndexedCorpus) -> Result<Model> {
        trainer.train_quasi_newton(corpus)
    }
}

impl Trainer<QuasiNewton> {
    /// Train by minimizing the regularized negative log-likelihood with L-BFGS
    pub(super) fn train_quasi_newton(&self, corpus: &IndexedCorpus) -> Result<Model> {
        let num_preds = corpus.num_predicates();
        let num_outcomes = corpus.num_outcomes();
        let num_events = corpus.num_events() as f64;
        let shape = (num_preds, num_outcomes);
        let l1_cost = self.params.l1_cost();
        let l2_cost = self.params.l2_cost();

        let mut weights = vec![0.0; num_preds * num_outcomes];
        let mut scores = vec![0.0; num_outcomes];
        let cancelled = Cell::new(false);

        // Objective and gradient
        let evaluate = |x: &[f64], gx: &mut [f64]| -> Result<f64, anyhow::Error> {
            let w = ArrayView2::from_shape(shape, x)?;
            let mut g = ArrayViewMut2::from_shape(shape, gx)?;
            g.fill(0.0);
            let mut loss = 0.0;

            for (i, context) in corpus.contexts().iter().enumerate() {
                scores.iter_mut().for_each(|s| *s = 0.0);
                for (j, &pid) in context.iter().enumerate() {
                    let value = corpus.value(i, j);
                    for (s, w) in scores.iter_mut().zip(w.row(pid as usize)) {
                        *s += w * value;
                    }
                }
                let target = corpus.outcomes()[i] as usize;
                let seen = corpus.num_times_seen()[i] as f64;
                let log_norm = log_sum_exp(&scores);
                loss -= (scores[target] - log_norm) * seen;

                for (j, &pid) in context.iter().enumerate() {
                    let value = corpus.value(i, j) * seen;
                    let mut row = g.row_mut(pid as usize);
                    for (oid, grad) in row.iter_mut().enumerate() {
                        let mut p = (scores[oid] - log_norm).exp();
                        if oid == target {
                            p -= 1.0;
                        }
                        *grad += p * value;
                    }
                }
            }

            if l2_cost > 0.0 {
                for (grad, &xi) in gx.iter_mut().zip(x) {
                    loss += l2_cost * xi * xi;
                    *grad += 2.0 * l2_cost * xi;
                }
            }
            Ok(loss)
        };

        // Progress report, returning true stops the optimizer
        let progress = |prgr: &liblbfgs::Progress| -> bool {
            let iteration = prgr.niter as usize;
            info!(
                "{:>3}: loss={:.6} |x|={:.4} |g|={:.4}",
                iteration, prgr.fx, prgr.xnorm, prgr.gnorm
            );
            self.report(IterationReport {
                iteration,
                objective: Some(prgr.fx),
                accuracy: None,
            });
            if self.cancelled(iteration + 1) {
                cancelled.set(true);
                return true;
            }
            false
        };

        if self.cancelled(1) {
            cancelled.set(true);
        } else {
            let mut lbfgs = liblbfgs::lbfgs()
                .with_max_iterations(self.params.iterations())
                .with_epsilon(self.params.epsilon());
            if l1_cost > 0.0 {
                // OWL-QN requires a backtracking line search
                lbfgs = lbfgs
                    .with_linesearch_algorithm("BacktrackingStrongWolfe")
                    .with_orthantwise(l1_cost, 0, weights.len());
            }
            match lbfgs.minimize(&mut weights, evaluate, progress) {
                Ok(_) => {}
                Err(e) if cancelled.get() => {
                    info!("optimizer stopped on cancellation: {}", e);
                }
                Err(e) => {
                    warn!("L-BFGS failed: {}", e);
                    return Err(lbfgs_error(e));
                }
            }
        }

        let weights = ArrayView2::from_shape(shape, &weights[..])
            .map_err(lbfgs_error)?;
        let all_outcomes: Vec<u32> = (0..num_outcomes as u32).collect();
        let params = weights
            .outer_iter()
            .map(|row| Context::new(all_outcomes.clone(), row.to_vec()))
            .collect();
        let model = Model::new(
            ModelType::QuasiNewton,
            params,
            corpus.pred_labels().to_vec(),
            corpus.outcome_labels().to_vec(),
            1.0,
            0.0,
        )?;

        let mut correct = 0.0;
        let mut probs = vec![0.0; num_outcomes];
        for (i, context) in corpus.contexts().iter().enumerate() {
            probs.iter_mut().for_each(|p| *p = 0.0);
            for (j, &pid) in context.iter().enumerate() {
                let pctx = &model.contexts()[pid as usize];
                for (p, param) in probs.iter_mut().zip(pctx.parameters()) {
                    *p += param * corpus.value(i, j);
                }
            }
            if model::argmax(&probs) == corpus.outcomes()[i] as usize {
                correct += corpus.num_times_seen()[i] as f64;
            }
        }
        info!("training accuracy: {:.5}", correct / num_events);
        Ok(model)
    }
}

fn lbfgs_error(err: impl fmt::Display) -> Error {
    Error::Optimization(format!("LBFGS error: {}", err))
}

fn log_sum_exp(scores: &[f64]) -> f64 {
    let max = scores.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    max + scores.iter().map(|s| (s - max).exp()).sum::<f64>().ln()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Event;
    use crate::event_stream::ListEventStream;

    fn events() -> Vec<Event> {
        vec![
            Event::new("pos", ["good", "great"]),
            Event::new("pos", ["good", "fine"]),
            Event::new("pos", ["great"]),
            Event::new("neg", ["bad", "awful"]),
            Event::new("neg", ["bad", "poor"]),
            Event::new("neg", ["awful"]),
        ]
    }

    #[test]
    fn test_log_sum_exp() {
        let lse = log_sum_exp(&[0.0, 0.0]);
        assert!((lse - 2.0_f64.ln()).abs() < 1e-12);
        let lse = log_sum_exp(&[1000.0, 1000.0]);
        assert!((lse - (1000.0 + 2.0_f64.ln())).abs() < 1e-9);
    }

    #[test]
    fn test_lbfgs_error_is_not_io() {
        let err = lbfgs_error("line search failed");
        assert!(matches!(err, Error::Optimization(_)));
        assert_eq!(err.to_string(), "LBFGS error: line search failed");
    }

    #[test]
    fn test_quasi_newton_l2() {
        let trainer = Trainer::quasi_newton()
            .with_cutoff(0)
            .with_l1_cost(0.0)
            .unwrap()
            .with_l2_cost(0.1)
            .unwrap();
        let model = trainer.train(&mut ListEventStream::new(events())).unwrap();
        assert_eq!(model.model_type(), ModelType::QuasiNewton);
        let probs = model.eval(&["good"]);
        assert_eq!(model.best_outcome(&probs), "pos");
        let probs = model.eval(&["bad", "poor"]);
        assert_eq!(model.best_outcome(&probs), "neg");
        assert!((probs.iter().sum::<f64>() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_quasi_newton_owlqn() {
        let trainer = Trainer::quasi_newton()
            .with_cutoff(0)
            .with_iterations(50)
            .unwrap();
        let model = trainer.train(&mut ListEventStream::new(events())).unwrap();
        let probs = model.eval(&["great"]);
        assert_eq!(model.best_outcome(&probs), "pos");
        let probs = model.eval(&["awful"]);
        assert_eq!(model.best_outcome(&probs), "neg");
    }

    #[test]
    fn test_quasi_newton_params_validation() {
        let mut params = QuasiNewtonParams::default();
        assert!(params.set_l1_cost(-1.0).is_err());
        assert!(params.set_l2_cost(f64::NAN).is_err());
        assert!(params.set_num_of_updates(0).is_err());
        assert!(params.set_epsilon(0.0).is_err());
        params.set_l1_cost(0.0).unwrap();
        assert_eq!(params.l1_cost(), 0.0);
    }
}
