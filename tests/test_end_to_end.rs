use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use maxent::train::{
    EventTrainer, IterationReport, Trainer, TrainerFactory, TrainingMonitor, TrainingParameters,
    params,
};
use maxent::{Event, FileEventStream, Format, ListEventStream, Model, write_event};

fn events() -> Vec<Event> {
    vec![
        Event::new("sunny", ["walk", "shop"]),
        Event::new("sunny", ["walk"]),
        Event::new("sunny", ["walk", "clean"]),
        Event::new("rainy", ["shop", "clean"]),
        Event::new("rainy", ["clean"]),
        Event::new("rainy", ["clean", "shop"]),
        Event::new("sunny", ["walk", "shop"]),
    ]
}

/// Cancels once `limit` iterations completed
struct CancelAfter {
    limit: usize,
    completed: AtomicUsize,
}

impl CancelAfter {
    fn new(limit: usize) -> Arc<Self> {
        Arc::new(Self {
            limit,
            completed: AtomicUsize::new(0),
        })
    }
}

impl TrainingMonitor for CancelAfter {
    fn is_cancelled(&self) -> bool {
        self.completed.load(Ordering::SeqCst) >= self.limit
    }

    fn iteration_completed(&self, report: &IterationReport) {
        self.completed.store(report.iteration, Ordering::SeqCst);
    }
}

#[test]
fn test_train_save_load_predict() {
    // Write events to a text file
    let mut event_file = tempfile::NamedTempFile::new().unwrap();
    for event in events() {
        write_event(&mut event_file, &event).unwrap();
    }
    event_file.flush().unwrap();

    let bag = TrainingParameters::new()
        .with(params::ALGORITHM, "GIS")
        .with(params::ITERATIONS, 100)
        .with(params::CUTOFF, 0);
    let mut stream = FileEventStream::open(event_file.path()).unwrap();
    let model = TrainerFactory::new().train(&bag, &mut stream).unwrap();

    // Use NamedTempFile for automatic cleanup on panic
    let model_file = tempfile::NamedTempFile::new().unwrap();
    model.save(model_file.path(), Format::Binary).unwrap();
    let model = Model::load(model_file.path()).unwrap();

    assert_eq!(model.num_outcomes(), 2);
    assert_eq!(model.num_predicates(), 3);
    assert_eq!(model.index_of("rainy"), Some(0));
    assert_eq!(model.index_of("sunny"), Some(1));
    assert_eq!(model.outcome(1), Some("sunny"));
    assert!(model.predicate_index("walk").is_some());

    let probs = model.eval(&["walk"]);
    assert_eq!(model.best_outcome(&probs), "sunny");
    let probs = model.eval(&["clean"]);
    assert_eq!(model.best_outcome(&probs), "rainy");
    assert!((probs.iter().sum::<f64>() - 1.0).abs() < 1e-6);
    let all = model.all_outcomes(&probs);
    assert!(all.starts_with("rainy["));
    assert!(all.contains(" sunny["));
}

#[test]
fn test_training_is_deterministic() {
    let bags = [
        TrainingParameters::new().with(params::ALGORITHM, "GIS"),
        TrainingParameters::new().with(params::ALGORITHM, "Perceptron"),
        TrainingParameters::new()
            .with(params::ALGORITHM, "Perceptron")
            .with(params::SHUFFLE_SEED, 7),
        TrainingParameters::new().with(params::ALGORITHM, "QN"),
    ];
    let factory = TrainerFactory::new();
    for bag in bags {
        let bag = bag.with(params::CUTOFF, 0).with(params::ITERATIONS, 20);
        let first = factory
            .train(&bag, &mut ListEventStream::new(events()))
            .unwrap();
        let second = factory
            .train(&bag, &mut ListEventStream::new(events()))
            .unwrap();
        assert_eq!(first.to_bytes().unwrap(), second.to_bytes().unwrap());
    }
}

#[test]
fn test_cancellation_keeps_completed_iterations() {
    let monitor = CancelAfter::new(3);
    let cancelled = Trainer::gis()
        .with_cutoff(0)
        .with_monitor(monitor.clone())
        .train(&mut ListEventStream::new(events()))
        .unwrap();
    assert_eq!(monitor.completed.load(Ordering::SeqCst), 3);

    let three = Trainer::gis()
        .with_cutoff(0)
        .with_iterations(3)
        .unwrap()
        .train(&mut ListEventStream::new(events()))
        .unwrap();
    assert_eq!(cancelled.to_bytes().unwrap(), three.to_bytes().unwrap());

    let monitor = CancelAfter::new(4);
    let cancelled = Trainer::perceptron()
        .with_cutoff(0)
        .with_monitor(monitor)
        .train(&mut ListEventStream::new(events()))
        .unwrap();
    let four = Trainer::perceptron()
        .with_cutoff(0)
        .with_iterations(4)
        .unwrap()
        .train(&mut ListEventStream::new(events()))
        .unwrap();
    assert_eq!(cancelled.to_bytes().unwrap(), four.to_bytes().unwrap());
}

#[test]
fn test_cancelled_before_training() {
    let flag = Arc::new(AtomicBool::new(true));
    for mut trainer in [
        Box::new(Trainer::gis().with_cutoff(0)) as Box<dyn EventTrainer>,
        Box::new(Trainer::perceptron().with_cutoff(0)),
        Box::new(Trainer::quasi_newton().with_cutoff(0)),
    ] {
        trainer.set_monitor(flag.clone());
        let model = trainer
            .train(&mut ListEventStream::new(events()))
            .unwrap();
        // no iteration ran, every outcome is equally likely
        let probs = model.eval(&["walk", "shop"]);
        for p in &probs {
            assert!((p - 0.5).abs() < 1e-12);
        }
    }
}
