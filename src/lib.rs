//! Maximum entropy and perceptron classifiers
//!
//! This library trains and applies conditional classifiers over sparse
//! string features. Models are persisted in a binary or plain text layout
//! that other maxent toolkits can read.
//!
//! # Examples
//!
//! ## Training
//!
//! ```no_run
//! use maxent::train::Trainer;
//! use maxent::{FileEventStream, Format};
//!
//! let mut events = FileEventStream::open("train.events")?;
//! let trainer = Trainer::gis().with_cutoff(1).with_iterations(100)?;
//! let model = trainer.train(&mut events)?;
//! model.save("model.bin", Format::Binary)?;
//! # Ok::<(), maxent::Error>(())
//! ```
//!
//! ## Prediction
//!
//! ```no_run
//! use maxent::Model;
//!
//! let model = Model::load("model.bin")?;
//! let probs = model.eval(&["verb=join", "noun=board", "prep=as"]);
//! println!("{}", model.best_outcome(&probs));
//! # Ok::<(), maxent::Error>(())
//! ```

pub mod codec;
mod dataset;
mod error;
mod event;
mod event_stream;
mod index_hash_table;
mod model;

/// Indexing and training of models
pub mod train;

// Re-export main types
pub use self::codec::Format;
pub use self::dataset::IndexedCorpus;
pub use self::error::{Error, Result};
pub use self::event::Event;
pub use self::event_stream::{
    write_event, EventStream, FileEventStream, IterEventStream, ListEventStream,
};
pub use self::index_hash_table::IndexHashTable;
pub use self::model::{Context, Model, ModelType, PREDICATE_LOAD_FACTOR};
