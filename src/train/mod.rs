//! Training of maxent and perceptron models
//!
//! Events are first indexed into an [`IndexedCorpus`](crate::IndexedCorpus)
//! by the [`DataIndexer`], then handed to one of the training algorithms.
//! Trainers are either built directly (`Trainer::gis()`, `Trainer::perceptron()`,
//! `Trainer::quasi_newton()`) or resolved by name from a
//! [`TrainingParameters`] bag through the [`TrainerFactory`].

mod data_indexer;
mod dictionary;
mod factory;
mod monitor;
pub mod params;
mod trainer;

// Re-export public types
pub use self::data_indexer::{DataIndexer, IndexerKind, IndexingParams};
pub use self::factory::{TrainerConstructor, TrainerFactory, GIS, PERCEPTRON, QN};
pub use self::monitor::{IterationReport, TrainingMonitor};
pub use self::params::{ReportMap, TrainingParameters};
pub use self::trainer::{
    Capabilities, EventTrainer, Gis, GisParams, Perceptron, PerceptronParams, QuasiNewton,
    QuasiNewtonParams, Trainer, TrainingAlgorithm,
};
