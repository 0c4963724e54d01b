use log::{debug, info};
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use super::super::monitor::IterationReport;
use super::super::params::{self, ReportMap, TrainingParameters};
use super::{Perceptron, Trainer, TrainingAlgorithm};
use crate::dataset::IndexedCorpus;
use crate::error::{Error, Result};
use crate::model::{self, Context, Model, ModelType};

/// Perceptron training parameters.
#[derive(Debug, Clone)]
pub struct PerceptronParams {
    iterations: usize,
    use_average: bool,
    use_skipped_averaging: bool,
    tolerance: Option<f64>,
    step_size_decrease: Option<f64>,
    shuffle_seed: Option<u64>,
}

impl Default for PerceptronParams {
    fn default() -> Self {
        Self {
            iterations: 100,
            use_average: true,
            use_skipped_averaging: false,
            tolerance: None,
            step_size_decrease: None,
            shuffle_seed: None,
        }
    }
}

impl PerceptronParams {
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

    pub fn use_average(&self) -> bool {
        self.use_average
    }

    pub fn set_use_average(&mut self, enabled: bool) {
        self.use_average = enabled;
    }

    pub fn use_skipped_averaging(&self) -> bool {
        self.use_skipped_averaging
    }

    /// Only accumulate the average on the first 20 iterations and on
    /// perfect-square iterations after that. Implies averaging.
    pub fn set_use_skipped_averaging(&mut self, enabled: bool) {
        self.use_skipped_averaging = enabled;
        if enabled {
            self.use_average = true;
        }
    }

    pub fn tolerance(&self) -> Option<f64> {
        self.tolerance
    }

    /// Stop once training accuracy moved less than `tolerance` against each
    /// of the three previous iterations. `None` disables the check.
    pub fn set_tolerance(&mut self, tolerance: Option<f64>) -> Result<()> {
        if let Some(t) = tolerance {
            if !(0.0..1.0).contains(&t) {
                return Err(Error::config("tolerance must be in [0, 1)"));
            }
        }
        self.tolerance = tolerance;
        Ok(())
    }

    pub fn step_size_decrease(&self) -> Option<f64> {
        self.step_size_decrease
    }

    /// Multiply the step size by `1 - decrease` at the start of every iteration
    pub fn set_step_size_decrease(&mut self, decrease: Option<f64>) -> Result<()> {
        if let Some(d) = decrease {
            if !(d > 0.0 && d <= 1.0) {
                return Err(Error::config("step size decrease must be in (0, 1]"));
            }
        }
        self.step_size_decrease = decrease;
        Ok(())
    }

    pub fn shuffle_seed(&self) -> Option<u64> {
        self.shuffle_seed
    }

    /// Visit events in a seeded random order every iteration
    pub fn set_shuffle_seed(&mut self, seed: Option<u64>) {
        self.shuffle_seed = seed;
    }
}

impl TrainingAlgorithm for Perceptron {
    const NAME: &'static str = "Perceptron";

    type Params = PerceptronParams;

    fn configure(
        p: &mut PerceptronParams,
        bag: &TrainingParameters,
        report: &mut ReportMap,
    ) -> Result<()> {
        if let Some(iterations) = bag.parse(params::ITERATIONS)? {
            p.set_iterations(iterations)?;
        }
        if let Some(enabled) = bag.parse_bool(params::USE_AVERAGE)? {
            p.set_use_average(enabled);
        }
        if let Some(enabled) = bag.parse_bool(params::USE_SKIPPED_AVERAGING)? {
            p.set_use_skipped_averaging(enabled);
        }
        if let Some(tolerance) = bag.parse(params::TOLERANCE)? {
            p.set_tolerance(Some(tolerance))?;
        }
        if let Some(decrease) = bag.parse(params::STEP_SIZE_DECREASE)? {
            p.set_step_size_decrease(Some(decrease))?;
        }
        if let Some(seed) = bag.parse(params::SHUFFLE_SEED)? {
            p.set_shuffle_seed(Some(seed));
        }

        report.insert(params::ITERATIONS.to_string(), p.iterations.to_string());
        report.insert(params::USE_AVERAGE.to_string(), p.use_average.to_string());
        report.insert(
            params::USE_SKIPPED_AVERAGING.to_string(),
            p.use_skipped_averaging.to_string(),
        );
        if let Some(tolerance) = p.tolerance {
            report.insert(params::TOLERANCE.to_string(), tolerance.to_string());
        }
        if let Some(decrease) = p.step_size_decrease {
            report.insert(params::STEP_SIZE_DECREASE.to_string(), decrease.to_string());
        }
        if let Some(seed) = p.shuffle_seed {
            report.insert(params::SHUFFLE_SEED.to_string(), seed.to_string());
        }
        Ok(())
    }

    fn train(trainer: &Trainer<Self>, corpus: &IndexedCorpus) -> Result<Model> {
        trainer.train_perceptron(corpus)
    }
}

impl Trainer<Perceptron> {
    /// Train using the (averaged) Perceptron algorithm
    pub(super) fn train_perceptron(&self, corpus: &IndexedCorpus) -> Result<Model> {
        let num_preds = corpus.num_predicates();
        let num_outcomes = corpus.num_outcomes();
        let num_events = corpus.num_events() as f64;
        let contexts = corpus.contexts();
        let outcomes = corpus.outcomes();
        let num_times_seen = corpus.num_times_seen();

        let use_average = self.params.use_average();
        let use_skipped = self.params.use_skipped_averaging();
        let tolerance = self.params.tolerance();

        let mut weights = Array2::<f64>::zeros((num_preds, num_outcomes));
        let mut summed = if use_average {
            Some(Array2::<f64>::zeros((num_preds, num_outcomes)))
        } else {
            None
        };
        let mut num_summed = 0usize;

        let mut order: Vec<usize> = (0..contexts.len()).collect();
        let mut rng = self.params.shuffle_seed().map(StdRng::seed_from_u64);
        let mut step_size = 1.0;
        let mut prev_accuracies = [0.0_f64; 3];
        let mut scores = vec![0.0; num_outcomes];

        for iteration in 1..=self.params.iterations() {
            if self.cancelled(iteration) {
                break;
            }
            if let Some(decrease) = self.params.step_size_decrease() {
                step_size *= 1.0 - decrease;
            }
            if let Some(rng) = rng.as_mut() {
                order.shuffle(rng);
            }

            let mut correct = 0u64;
            for &i in &order {
                let context = &contexts[i];
                let target = outcomes[i] as usize;
                for _ in 0..num_times_seen[i] {
                    scores.iter_mut().for_each(|s| *s = 0.0);
                    for (j, &pid) in context.iter().enumerate() {
                        let value = corpus.value(i, j);
                        let row = weights.row(pid as usize);
                        for (s, w) in scores.iter_mut().zip(row.iter()) {
                            *s += w * value;
                        }
                    }
                    let predicted = model::argmax(&scores);
                    if predicted == target {
                        correct += 1;
                        continue;
                    }
                    for (j, &pid) in context.iter().enumerate() {
                        let delta = step_size * corpus.value(i, j);
                        weights[[pid as usize, target]] += delta;
                        weights[[pid as usize, predicted]] -= delta;
                    }
                }
            }

            let accuracy = correct as f64 / num_events;
            info!("{:>3}: accuracy={:.5}", iteration, accuracy);

            if let Some(summed) = summed.as_mut() {
                if !use_skipped || iteration < 20 || is_perfect_square(iteration) {
                    *summed += &weights;
                    num_summed += 1;
                }
            }
            self.report(IterationReport {
                iteration,
                objective: None,
                accuracy: Some(accuracy),
            });

            if let Some(tolerance) = tolerance {
                if prev_accuracies
                    .iter()
                    .all(|prev| (prev - accuracy).abs() < tolerance)
                {
                    info!(
                        "stopping: change in training accuracy less than {}",
                        tolerance
                    );
                    break;
                }
            }
            prev_accuracies.rotate_left(1);
            prev_accuracies[2] = accuracy;
        }

        let weights = match summed {
            Some(summed) if num_summed > 0 => {
                debug!("averaging {} weight snapshots", num_summed);
                summed / num_summed as f64
            }
            _ => weights,
        };

        let all_outcomes: Vec<u32> = (0..num_outcomes as u32).collect();
        let params = weights
            .outer_iter()
            .map(|row| Context::new(all_outcomes.clone(), row.to_vec()))
            .collect();
        Model::new(
            ModelType::Perceptron,
            params,
            corpus.pred_labels().to_vec(),
            corpus.outcome_labels().to_vec(),
            1.0,
            0.0,
        )
    }
}

fn is_perfect_square(n: usize) -> bool {
    let root = (n as f64).sqrt().round() as usize;
    root * root == n
}
