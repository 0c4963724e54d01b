use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use maxent::train::{
    IterationReport, Perceptron, Trainer, TrainerFactory, TrainingMonitor, TrainingParameters,
    params,
};
use maxent::{Event, ListEventStream, Model, ModelType};

/// Counts completed iterations
#[derive(Default)]
struct IterationCounter(AtomicUsize);

impl TrainingMonitor for IterationCounter {
    fn iteration_completed(&self, _report: &IterationReport) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

fn trainer(iterations: usize) -> Trainer<Perceptron> {
    Trainer::perceptron()
        .with_cutoff(0)
        .with_iterations(iterations)
        .unwrap()
}

fn train(trainer: Trainer<Perceptron>) -> Model {
    trainer.train(&mut ListEventStream::new(events())).unwrap()
}

fn events() -> Vec<Event> {
    vec![
        Event::new("V", ["verb=eat", "prep=with", "pobj=fork"]),
        Event::new("V", ["verb=cut", "prep=with", "pobj=knife"]),
        Event::new("N", ["verb=eat", "prep=of", "pobj=cheese"]),
        Event::new("N", ["verb=see", "prep=of", "pobj=bread"]),
        Event::new("N", ["verb=cut", "prep=of", "pobj=cake"]),
        Event::new("V", ["verb=see", "prep=with", "pobj=telescope"]),
    ]
}

#[test]
fn test_perceptron_fits_training_data() {
    let trainer = Trainer::perceptron()
        .with_cutoff(0)
        .with_iterations(50)
        .unwrap();
    let model = trainer.train(&mut ListEventStream::new(events())).unwrap();
    assert_eq!(model.model_type(), ModelType::Perceptron);

    for event in events() {
        let probs = model.eval(event.context());
        assert_eq!(model.best_outcome(&probs), event.outcome());
        assert!((probs.iter().sum::<f64>() - 1.0).abs() < 1e-9);
    }
}

#[test]
fn test_perceptron_tolerance_and_step_size() {
    let bag = TrainingParameters::new()
        .with(params::ALGORITHM, "Perceptron")
        .with(params::CUTOFF, 0)
        .with(params::ITERATIONS, 500)
        .with(params::TOLERANCE, 0.0001)
        .with(params::STEP_SIZE_DECREASE, 0.05)
        .with(params::USE_SKIPPED_AVERAGING, true);
    let model = TrainerFactory::new()
        .train(&bag, &mut ListEventStream::new(events()))
        .unwrap();
    let probs = model.eval(&["prep=of"]);
    assert_eq!(model.best_outcome(&probs), "N");
}

#[test]
fn test_perceptron_tolerance_stops_early() {
    let counter = Arc::new(IterationCounter::default());
    let model = trainer(500)
        .with_tolerance(0.0001)
        .unwrap()
        .with_monitor(counter.clone())
        .train(&mut ListEventStream::new(events()))
        .unwrap();
    // Accuracy is perfect from the third iteration on, the sixth is the
    // first to match all three previous ones.
    assert_eq!(counter.0.load(Ordering::SeqCst), 6);
    let probs = model.eval(&["prep=with"]);
    assert_eq!(model.best_outcome(&probs), "V");

    let counter = Arc::new(IterationCounter::default());
    trainer(50)
        .with_monitor(counter.clone())
        .train(&mut ListEventStream::new(events()))
        .unwrap();
    assert_eq!(counter.0.load(Ordering::SeqCst), 50);
}

#[test]
fn test_perceptron_step_size_decrease_changes_weights() {
    let decayed = train(trainer(20).with_step_size_decrease(0.05).unwrap());
    let plain = train(trainer(20));
    assert_ne!(decayed.to_bytes().unwrap(), plain.to_bytes().unwrap());

    let with = decayed.predicate_index("prep=with").unwrap();
    let v = decayed.index_of("V").unwrap();
    let decayed_weight = decayed.contexts()[with].parameters()[v];
    let plain_weight = plain.contexts()[with].parameters()[v];
    assert!(decayed_weight > 0.0);
    assert!(decayed_weight < plain_weight);
}

#[test]
fn test_perceptron_skipped_averaging_differs() {
    let skipped = train(trainer(30).with_skipped_averaging(true));
    let averaged = train(trainer(30));
    assert_ne!(skipped.to_bytes().unwrap(), averaged.to_bytes().unwrap());
    for event in events() {
        let probs = skipped.eval(event.context());
        assert_eq!(skipped.best_outcome(&probs), event.outcome());
    }
}

#[test]
fn test_perceptron_duplicates_ignore_copy_order() {
    // Copies collapse into one weighted row, so appending them or
    // interleaving them trains the same model.
    let mut appended = events();
    appended.extend(events());
    let interleaved: Vec<Event> = events()
        .into_iter()
        .flat_map(|event| [event.clone(), event])
        .collect();
    let trainer = trainer(20);
    let first = trainer.train(&mut ListEventStream::new(appended)).unwrap();
    let second = trainer
        .train(&mut ListEventStream::new(interleaved))
        .unwrap();
    assert_eq!(first.to_bytes().unwrap(), second.to_bytes().unwrap());

    let probs = first.eval(&["prep=with"]);
    assert_eq!(first.best_outcome(&probs), "V");
    let probs = first.eval(&["prep=of"]);
    assert_eq!(first.best_outcome(&probs), "N");
}
