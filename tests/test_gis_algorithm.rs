use maxent::train::{Trainer, TrainerFactory, TrainingParameters, params};
use maxent::{Event, ListEventStream, ModelType};

fn toy_events() -> Vec<Event> {
    vec![
        Event::new("1", ["a", "b", "c"]),
        Event::new("1", ["a", "b"]),
        Event::new("1", ["b", "c"]),
        Event::new("0", ["d", "e", "f"]),
        Event::new("0", ["d", "e"]),
        Event::new("0", ["e", "f"]),
    ]
}

#[test]
fn test_gis_toy_corpus() {
    let trainer = Trainer::gis().with_cutoff(0).with_iterations(100).unwrap();
    let model = trainer.train(&mut ListEventStream::new(toy_events())).unwrap();

    assert_eq!(model.model_type(), ModelType::Gis);
    assert_eq!(model.num_outcomes(), 2);
    assert_eq!(model.num_predicates(), 6);
    assert_eq!(model.correction_constant(), 3.0);

    let probs = model.eval(&["a", "c"]);
    assert_eq!(model.best_outcome(&probs), "1");
    assert!((probs.iter().sum::<f64>() - 1.0).abs() < 1e-6);
    assert!(probs[model.index_of("1").unwrap()] > 0.9);

    let probs = model.eval(&["f"]);
    assert_eq!(model.best_outcome(&probs), "0");
}

#[test]
fn test_gis_unknown_context_is_uniform() {
    let trainer = Trainer::gis().with_cutoff(0).with_iterations(10).unwrap();
    let model = trainer.train(&mut ListEventStream::new(toy_events())).unwrap();
    let probs = model.eval(&["never", "seen"]);
    for p in &probs {
        assert!((p - 0.5).abs() < 1e-12);
    }
}

#[test]
fn test_gis_from_parameters() {
    let bag = TrainingParameters::new()
        .with(params::ALGORITHM, "GIS")
        .with(params::ITERATIONS, 50)
        .with(params::CUTOFF, 0)
        .with(params::USE_SLACK_PARAMETER, true);
    let factory = TrainerFactory::new();
    let model = factory
        .train(&bag, &mut ListEventStream::new(toy_events()))
        .unwrap();
    let probs = model.eval(&["b"]);
    assert_eq!(model.best_outcome(&probs), "1");
    assert!((probs.iter().sum::<f64>() - 1.0).abs() < 1e-6);
}

#[test]
fn test_gis_real_valued_events() {
    let events = vec![
        Event::with_values("hot", ["temp", "sun"], vec![3.0, 1.0]).unwrap(),
        Event::with_values("hot", ["temp"], vec![2.5]).unwrap(),
        Event::with_values("cold", ["temp", "snow"], vec![0.5, 1.0]).unwrap(),
        Event::with_values("cold", ["snow"], vec![2.0]).unwrap(),
    ];
    let trainer = Trainer::gis().with_cutoff(0).with_iterations(100).unwrap();
    let model = trainer.train(&mut ListEventStream::new(events)).unwrap();
    assert_eq!(model.correction_constant(), 4.0);

    let probs = model.eval_with_values(&["sun"], &[1.0]).unwrap();
    assert_eq!(model.best_outcome(&probs), "hot");
    let probs = model.eval_with_values(&["snow"], &[1.0]).unwrap();
    assert_eq!(model.best_outcome(&probs), "cold");
}
