use std::fmt;
use std::sync::Arc;

use bitflags::bitflags;
use log::info;

use super::data_indexer::{DataIndexer, IndexerKind, IndexingParams};
use super::monitor::{IterationReport, TrainingMonitor};
use super::params::{self, ReportMap, TrainingParameters};
use crate::dataset::IndexedCorpus;
use crate::error::{Error, Result};
use crate::event_stream::EventStream;
use crate::model::Model;

mod gis;
mod perceptron;
mod quasi_newton;

pub use self::gis::GisParams;
pub use self::perceptron::PerceptronParams;
pub use self::quasi_newton::QuasiNewtonParams;

bitflags! {
    /// Operations a trainer supports
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Capabilities: u32 {
        /// Accepts a parameter bag through `init`
        const INIT = 0x01;
        /// Trains from an event stream
        const TRAIN_EVENTS = 0x02;
        /// Trains from an already indexed corpus
        const TRAIN_CORPUS = 0x04;
        /// What every registered trainer must support
        const REQUIRED = Self::INIT.bits() | Self::TRAIN_EVENTS.bits();
    }
}

/// Object safe interface shared by every trainer
pub trait EventTrainer {
    /// Operations this trainer supports
    fn capabilities(&self) -> Capabilities;

    /// Validate and apply `params`, recording the resolved settings
    ///
    /// Fails with a configuration error without changing the trainer.
    fn init(&mut self, params: &TrainingParameters, report: &mut ReportMap) -> Result<()>;

    /// Index `events` and train a model on them
    fn train(&mut self, events: &mut dyn EventStream) -> Result<Model>;

    /// Train a model on an indexed corpus
    fn train_corpus(&mut self, _corpus: &IndexedCorpus) -> Result<Model> {
        Err(Error::Unimplemented(
            "this trainer cannot train from an indexed corpus".to_string(),
        ))
    }

    /// Attach a monitor polled between iterations
    fn set_monitor(&mut self, _monitor: Arc<dyn TrainingMonitor>) {}
}

/// Training algorithm marker for Generalized Iterative Scaling.
#[derive(Debug, Clone, Copy)]
pub struct Gis;

/// Training algorithm marker for the Perceptron.
#[derive(Debug, Clone, Copy)]
pub struct Perceptron;

/// Training algorithm marker for the quasi-Newton (L-BFGS) maxent trainer.
#[derive(Debug, Clone, Copy)]
pub struct QuasiNewton;

/// Training algorithm interface.
pub trait TrainingAlgorithm {
    /// Name the algorithm is registered under
    const NAME: &'static str;

    type Params: Default + Clone + fmt::Debug;

    /// Apply the recognized keys of `bag` to `params`
    fn configure(
        params: &mut Self::Params,
        bag: &TrainingParameters,
        report: &mut ReportMap,
    ) -> Result<()>;

    fn train(trainer: &Trainer<Self>, corpus: &IndexedCorpus) -> Result<Model>
    where
        Self: Sized;
}

/// Maxent / perceptron trainer
pub struct Trainer<A: TrainingAlgorithm> {
    /// Data indexer parameters
    indexing: IndexingParams,
    /// Training parameters
    params: A::Params,
    /// Cancellation and progress observer
    monitor: Option<Arc<dyn TrainingMonitor>>,
}

impl<A: TrainingAlgorithm> fmt::Debug for Trainer<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Trainer")
            .field("algorithm", &A::NAME)
            .field("indexing", &self.indexing)
            .field("params", &self.params)
            .field("monitor", &self.monitor.is_some())
            .finish()
    }
}

impl<A: TrainingAlgorithm> Trainer<A> {
    /// Create a new trainer
    pub fn new() -> Self {
        Self {
            indexing: IndexingParams::default(),
            params: A::Params::default(),
            monitor: None,
        }
    }

    /// Get training parameters
    pub fn params(&self) -> &A::Params {
        &self.params
    }

    /// Get training parameters for mutation
    pub fn params_mut(&mut self) -> &mut A::Params {
        &mut self.params
    }

    /// Get data indexer parameters
    pub fn indexing(&self) -> &IndexingParams {
        &self.indexing
    }

    /// Get data indexer parameters for mutation
    pub fn indexing_mut(&mut self) -> &mut IndexingParams {
        &mut self.indexing
    }

    /// Set the predicate cutoff (builder pattern)
    pub fn with_cutoff(mut self, cutoff: u32) -> Self {
        self.indexing.set_cutoff(cutoff);
        self
    }

    /// Attach a monitor (builder pattern)
    pub fn with_monitor(mut self, monitor: Arc<dyn TrainingMonitor>) -> Self {
        self.monitor = Some(monitor);
        self
    }

    /// Index `events` and train a model on them
    pub fn train(&self, events: &mut dyn EventStream) -> Result<Model> {
        let corpus = DataIndexer::new(self.indexing.clone()).index(events)?;
        self.train_corpus(&corpus)
    }

    /// Train a model on an indexed corpus
    pub fn train_corpus(&self, corpus: &IndexedCorpus) -> Result<Model> {
        if corpus.is_empty() {
            return Err(Error::invalid_input("no training events"));
        }
        info!(
            "training {} model: {} events, {} outcomes, {} predicates",
            A::NAME,
            corpus.num_events(),
            corpus.num_outcomes(),
            corpus.num_predicates()
        );
        A::train(self, corpus)
    }

    /// Apply a parameter bag
    ///
    /// Everything is validated before the trainer is touched, a failing
    /// bag leaves the previous configuration in place.
    pub fn configure(&mut self, bag: &TrainingParameters, report: &mut ReportMap) -> Result<()> {
        let mut indexing = self.indexing.clone();
        let mut params = self.params.clone();
        let mut resolved = ReportMap::new();

        if let Some(cutoff) = bag.parse::<u32>(params::CUTOFF)? {
            indexing.set_cutoff(cutoff);
        }
        if let Some(sort) = bag.parse_bool(params::SORT)? {
            indexing.set_sort(sort);
        }
        if let Some(name) = bag.get(params::DATA_INDEXER) {
            let kind = IndexerKind::from_name(name.trim()).ok_or_else(|| {
                Error::config(format!("unknown data indexer {:?}", name))
            })?;
            indexing.set_kind(kind);
        }
        A::configure(&mut params, bag, &mut resolved)?;

        resolved.insert(params::ALGORITHM.to_string(), A::NAME.to_string());
        resolved.insert(params::CUTOFF.to_string(), indexing.cutoff().to_string());
        resolved.insert(params::SORT.to_string(), indexing.sort().to_string());
        resolved.insert(
            params::DATA_INDEXER.to_string(),
            indexing.kind().as_str().to_string(),
        );
        self.indexing = indexing;
        self.params = params;
        report.extend(resolved);
        Ok(())
    }

    /// Poll the monitor before starting `iteration`
    pub(crate) fn cancelled(&self, iteration: usize) -> bool {
        let cancelled = self
            .monitor
            .as_ref()
            .map_or(false, |monitor| monitor.is_cancelled());
        if cancelled {
            info!(
                "training cancelled before iteration {}, keeping {} completed iterations",
                iteration,
                iteration - 1
            );
        }
        cancelled
    }

    pub(crate) fn report(&self, report: IterationReport) {
        if let Some(monitor) = &self.monitor {
            monitor.iteration_completed(&report);
        }
    }
}

impl<A: TrainingAlgorithm> Default for Trainer<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: TrainingAlgorithm> EventTrainer for Trainer<A> {
    fn capabilities(&self) -> Capabilities {
        Capabilities::INIT | Capabilities::TRAIN_EVENTS | Capabilities::TRAIN_CORPUS
    }

    fn init(&mut self, params: &TrainingParameters, report: &mut ReportMap) -> Result<()> {
        self.configure(params, report)
    }

    fn train(&mut self, events: &mut dyn EventStream) -> Result<Model> {
        Trainer::train(self, events)
    }

    fn train_corpus(&mut self, corpus: &IndexedCorpus) -> Result<Model> {
        Trainer::train_corpus(self, corpus)
    }

    fn set_monitor(&mut self, monitor: Arc<dyn TrainingMonitor>) {
        self.monitor = Some(monitor);
    }
}

impl Trainer<Gis> {
    /// Create a new GIS trainer
    pub fn gis() -> Self {
        Self::new()
    }

    /// Set the number of iterations (builder pattern)
    pub fn with_iterations(mut self, iterations: usize) -> Result<Self> {
        self.params.set_iterations(iterations)?;
        Ok(self)
    }

    /// Enable the slack correction parameter (builder pattern)
    pub fn with_slack_parameter(mut self, enabled: bool) -> Self {
        self.params.set_use_slack_parameter(enabled);
        self
    }

    /// Enable simple smoothing (builder pattern)
    pub fn with_smoothing(mut self, enabled: bool) -> Self {
        self.params.set_smoothing(enabled);
        self
    }
}

impl Trainer<Perceptron> {
    /// Create a new Perceptron trainer
    pub fn perceptron() -> Self {
        Self::new()
    }

    /// Set the number of iterations (builder pattern)
    pub fn with_iterations(mut self, iterations: usize) -> Result<Self> {
        self.params.set_iterations(iterations)?;
        Ok(self)
    }

    /// Set the early stopping tolerance (builder pattern)
    pub fn with_tolerance(mut self, tolerance: f64) -> Result<Self> {
        self.params.set_tolerance(Some(tolerance))?;
        Ok(self)
    }

    /// Set the per-iteration step size decrease (builder pattern)
    pub fn with_step_size_decrease(mut self, decrease: f64) -> Result<Self> {
        self.params.set_step_size_decrease(Some(decrease))?;
        Ok(self)
    }

    /// Enable skipped averaging (builder pattern)
    pub fn with_skipped_averaging(mut self, enabled: bool) -> Self {
        self.params.set_use_skipped_averaging(enabled);
        self
    }
}

impl Trainer<QuasiNewton> {
    /// Create a new quasi-Newton trainer
    pub fn quasi_newton() -> Self {
        Self::new()
    }

    /// Set maximum iterations (builder pattern)
    pub fn with_iterations(mut self, iterations: usize) -> Result<Self> {
        self.params.set_iterations(iterations)?;
        Ok(self)
    }

    /// Set L1 regularization cost (builder pattern)
    pub fn with_l1_cost(mut self, cost: f64) -> Result<Self> {
        self.params.set_l1_cost(cost)?;
        Ok(self)
    }

    /// Set L2 regularization cost (builder pattern)
    pub fn with_l2_cost(mut self, cost: f64) -> Result<Self> {
        self.params.set_l2_cost(cost)?;
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Event;
    use crate::event_stream::ListEventStream;

    #[test]
    fn test_configure() {
        let mut trainer = Trainer::<Perceptron>::new();
        let bag = TrainingParameters::new()
            .with(params::CUTOFF, 0)
            .with(params::SORT, false)
            .with(params::DATA_INDEXER, "OnePass")
            .with(params::ITERATIONS, 30);
        let mut report = ReportMap::new();
        trainer.configure(&bag, &mut report).unwrap();
        assert_eq!(trainer.indexing().cutoff(), 0);
        assert!(!trainer.indexing().sort());
        assert_eq!(trainer.indexing().kind(), IndexerKind::OnePass);
        assert_eq!(trainer.params().iterations(), 30);
        assert_eq!(report["Algorithm"], "Perceptron");
        assert_eq!(report["Cutoff"], "0");
        assert_eq!(report["Iterations"], "30");
    }

    #[test]
    fn test_failed_configure_keeps_settings() {
        let mut trainer = Trainer::<Gis>::new();
        let bag = TrainingParameters::new()
            .with(params::CUTOFF, 1)
            .with(params::ITERATIONS, 0);
        let mut report = ReportMap::new();
        let err = trainer.configure(&bag, &mut report).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
        assert_eq!(trainer.indexing().cutoff(), 5);
        assert!(report.is_empty());

        let bag = TrainingParameters::new().with(params::DATA_INDEXER, "ThreePass");
        assert!(trainer.configure(&bag, &mut report).is_err());
        let bag = TrainingParameters::new().with(params::CUTOFF, -1);
        assert!(trainer.configure(&bag, &mut report).is_err());
    }

    #[test]
    fn test_trainer_rejects_empty_corpus() {
        let trainer = Trainer::gis().with_cutoff(0);
        let err = trainer.train(&mut ListEventStream::new(vec![])).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));

        // every event loses its context to the cutoff
        let trainer = Trainer::perceptron().with_cutoff(2);
        let events = vec![Event::new("a", ["x"]), Event::new("b", ["y"])];
        let err = trainer.train(&mut ListEventStream::new(events)).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_capabilities() {
        let trainer = Trainer::quasi_newton();
        let caps = EventTrainer::capabilities(&trainer);
        assert!(caps.contains(Capabilities::REQUIRED));
        assert!(caps.contains(Capabilities::TRAIN_CORPUS));
    }
}
