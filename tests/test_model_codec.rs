use std::io::Cursor;

use maxent::codec::{self, PlainTextDataWriter};
use maxent::train::Trainer;
use maxent::{Error, Event, Format, ListEventStream, Model, ModelType};

fn events() -> Vec<Event> {
    vec![
        Event::new("sunny", ["walk", "shop"]),
        Event::new("sunny", ["walk"]),
        Event::new("sunny", ["walk", "clean"]),
        Event::new("rainy", ["shop", "clean"]),
        Event::new("rainy", ["clean"]),
        Event::new("rainy", ["clean", "read"]),
    ]
}

fn assert_same_predictions(a: &Model, b: &Model) {
    let contexts: [&[&str]; 5] = [
        &["walk"],
        &["clean"],
        &["walk", "clean"],
        &["shop", "read"],
        &["unknown"],
    ];
    for context in contexts {
        let pa = a.eval(context);
        let pb = b.eval(context);
        for (x, y) in pa.iter().zip(&pb) {
            assert!((x - y).abs() < 1e-12, "{:?}: {:?} != {:?}", context, pa, pb);
        }
    }
}

#[test]
fn test_save_load_all_model_types() {
    let gis = Trainer::gis()
        .with_cutoff(0)
        .with_iterations(30)
        .unwrap()
        .train(&mut ListEventStream::new(events()))
        .unwrap();
    let perceptron = Trainer::perceptron()
        .with_cutoff(0)
        .with_iterations(30)
        .unwrap()
        .train(&mut ListEventStream::new(events()))
        .unwrap();
    let qn = Trainer::quasi_newton()
        .with_cutoff(0)
        .with_l1_cost(0.0)
        .unwrap()
        .train(&mut ListEventStream::new(events()))
        .unwrap();

    for model in [&gis, &perceptron, &qn] {
        for format in [Format::Binary, Format::PlainText] {
            // Use NamedTempFile for automatic cleanup on panic
            let temp_file = tempfile::NamedTempFile::new().unwrap();
            model.save(temp_file.path(), format).unwrap();
            let loaded = Model::load(temp_file.path()).unwrap();
            assert_eq!(loaded.model_type(), model.model_type());
            assert_eq!(loaded.outcomes(), model.outcomes());
            assert_same_predictions(model, &loaded);
        }
    }
}

#[test]
fn test_reencoding_is_stable() {
    let model = Trainer::gis()
        .with_cutoff(0)
        .with_iterations(10)
        .unwrap()
        .train(&mut ListEventStream::new(events()))
        .unwrap();
    let bytes = model.to_bytes().unwrap();
    let reloaded = Model::from_bytes(&bytes).unwrap();
    assert_eq!(reloaded.to_bytes().unwrap(), bytes);
    assert_eq!(reloaded.correction_constant(), model.correction_constant());

    let text = codec::serialize(&model, Format::PlainText).unwrap();
    let from_text = codec::read_model(Cursor::new(&text)).unwrap();
    assert_eq!(from_text.to_bytes().unwrap(), bytes);
}

#[test]
fn test_plain_text_layout() {
    let model = Trainer::gis()
        .with_cutoff(0)
        .with_iterations(1)
        .unwrap()
        .train(&mut ListEventStream::new(events()))
        .unwrap();
    let text = String::from_utf8(codec::serialize(&model, Format::PlainText).unwrap()).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], "GIS");
    assert_eq!(lines[1], "2");
    assert_eq!(lines[2], "0.0");
    assert_eq!(lines[3], "2");
    assert_eq!(&lines[4..6], ["rainy", "sunny"]);

    let mut writer = PlainTextDataWriter::new(Vec::new());
    codec::ModelWriter::new(&model).write(&mut writer).unwrap();
    assert_eq!(writer.into_inner(), text.as_bytes());
}

#[test]
fn test_perceptron_writer_prunes_zero_weights() {
    let events = vec![
        Event::new("a", ["x", "shared"]),
        Event::new("b", ["y", "shared"]),
    ];
    let mut trainer = Trainer::perceptron().with_cutoff(0);
    trainer.params_mut().set_use_average(false);
    trainer.params_mut().set_iterations(1).unwrap();
    let model = trainer.train(&mut ListEventStream::new(events)).unwrap();
    assert_eq!(model.model_type(), ModelType::Perceptron);

    let loaded = Model::from_bytes(&model.to_bytes().unwrap()).unwrap();
    let stored: usize = loaded.contexts().iter().map(|c| c.parameters().len()).sum();
    let nonzero = model
        .contexts()
        .iter()
        .flat_map(|c| c.parameters())
        .filter(|&&w| w != 0.0)
        .count();
    assert_eq!(stored, nonzero);
    assert!(loaded.contexts().iter().all(|c| c.parameters().iter().all(|&w| w != 0.0)));
    assert_same_predictions(&model, &loaded);
}

#[test]
fn test_load_rejects_garbage() {
    let temp_file = tempfile::NamedTempFile::new().unwrap();
    std::fs::write(temp_file.path(), "MaxEnt\n1\n").unwrap();
    let err = Model::load(temp_file.path()).unwrap_err();
    assert!(matches!(err, Error::CorruptModel(_)));

    let model = Trainer::gis()
        .with_cutoff(0)
        .with_iterations(3)
        .unwrap()
        .train(&mut ListEventStream::new(events()))
        .unwrap();
    let bytes = model.to_bytes().unwrap();
    let err = Model::from_bytes(&bytes[..bytes.len() - 3]).unwrap_err();
    assert!(matches!(err, Error::CorruptModel(_)));
}
