use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use log::debug;

use super::params::{ReportMap, TrainingParameters};
use super::trainer::{Capabilities, EventTrainer, Gis, Perceptron, QuasiNewton, Trainer};
use crate::error::{Error, Result};
use crate::event_stream::EventStream;
use crate::model::Model;

pub const GIS: &str = "GIS";
pub const PERCEPTRON: &str = "Perceptron";
pub const QN: &str = "QN";

/// Builds a fresh, unconfigured trainer
pub type TrainerConstructor = Arc<dyn Fn() -> Box<dyn EventTrainer> + Send + Sync>;

/// Registry resolving algorithm names to trainers
///
/// A new factory knows the built-in `GIS`, `Perceptron` and `QN` trainers.
/// Registries are plain values, callers that need a process-wide one wrap
/// it themselves.
#[derive(Clone)]
pub struct TrainerFactory {
    trainers: BTreeMap<String, TrainerConstructor>,
}

impl fmt::Debug for TrainerFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.trainers.keys()).finish()
    }
}

impl Default for TrainerFactory {
    fn default() -> Self {
        let mut trainers: BTreeMap<String, TrainerConstructor> = BTreeMap::new();
        trainers.insert(
            GIS.to_string(),
            Arc::new(|| -> Box<dyn EventTrainer> { Box::new(Trainer::<Gis>::new()) }),
        );
        trainers.insert(
            PERCEPTRON.to_string(),
            Arc::new(|| -> Box<dyn EventTrainer> { Box::new(Trainer::<Perceptron>::new()) }),
        );
        trainers.insert(
            QN.to_string(),
            Arc::new(|| -> Box<dyn EventTrainer> { Box::new(Trainer::<QuasiNewton>::new()) }),
        );
        Self { trainers }
    }
}

impl TrainerFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a custom trainer under `name`
    ///
    /// The trainer must support `init` and event training.
    pub fn register_trainer<F>(&mut self, name: &str, constructor: F) -> Result<()>
    where
        F: Fn() -> Box<dyn EventTrainer> + Send + Sync + 'static,
    {
        if self.trainers.contains_key(name) {
            return Err(Error::AlreadyRegistered(name.to_string()));
        }
        let capabilities = constructor().capabilities();
        if !capabilities.contains(Capabilities::REQUIRED) {
            let missing = Capabilities::REQUIRED.difference(capabilities);
            return Err(Error::InvalidTrainer {
                name: name.to_string(),
                reason: format!("missing required capabilities {:?}", missing),
            });
        }
        debug!("registered trainer {}", name);
        self.trainers.insert(name.to_string(), Arc::new(constructor));
        Ok(())
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.trainers.contains_key(name)
    }

    /// Registered algorithm names in lexicographic order
    pub fn algorithms(&self) -> impl Iterator<Item = &str> + '_ {
        self.trainers.keys().map(String::as_str)
    }

    /// Capabilities of the trainer `params` selects
    pub fn capabilities(&self, params: &TrainingParameters) -> Option<Capabilities> {
        self.trainers
            .get(params.algorithm())
            .map(|constructor| constructor().capabilities())
    }

    /// Whether `params` names a registered trainer that accepts it
    pub fn is_valid(&self, params: &TrainingParameters) -> bool {
        match self.trainers.get(params.algorithm()) {
            Some(constructor) => constructor().init(params, &mut ReportMap::new()).is_ok(),
            None => false,
        }
    }

    /// Build and initialize the trainer `params` selects
    pub fn event_trainer(
        &self,
        params: &TrainingParameters,
        report: &mut ReportMap,
    ) -> Result<Box<dyn EventTrainer>> {
        let name = params.algorithm();
        let constructor = self
            .trainers
            .get(name)
            .ok_or_else(|| Error::UnknownAlgorithm(name.to_string()))?;
        let mut trainer = constructor();
        trainer.init(params, report)?;
        Ok(trainer)
    }

    /// Build a trainer from `params` and train it on `events`
    pub fn train(
        &self,
        params: &TrainingParameters,
        events: &mut dyn EventStream,
    ) -> Result<Model> {
        let mut report = ReportMap::new();
        let mut trainer = self.event_trainer(params, &mut report)?;
        debug!("training with {:?}", report);
        trainer.train(events)
    }
}
