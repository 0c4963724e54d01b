//! Model persistence
//!
//! A persisted model consists of the following sections, in order:
//!
//! 1. the model type (`GIS`, `Perceptron` or `QN`)
//! 2. GIS only: the correction constant and the correction parameter
//! 3. the outcome names
//! 4. the outcome patterns, each `"<num predicates> <outcome id>..."`
//! 5. the predicate names, grouped by outcome pattern
//! 6. the parameters of every predicate for every outcome of its pattern
//!
//! Both encodings carry exactly the same values, the binary encoding is
//! compatible with models written by Java's `DataOutputStream` based writers.

use std::io::BufRead;
use std::io::Write;

mod data_io;
mod reader;
mod writer;

pub use self::data_io::{
    BinaryDataReader, BinaryDataWriter, DataReader, DataWriter, PlainTextDataReader,
    PlainTextDataWriter,
};
pub use self::reader::ModelReader;
pub use self::writer::ModelWriter;

use crate::error::Result;
use crate::model::Model;

/// Encoding of a persisted model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Format {
    /// Compact big-endian binary encoding
    #[default]
    Binary,
    /// Human readable encoding, one value per line
    PlainText,
}

impl Format {
    /// Guess the encoding from the first bytes of a model
    ///
    /// Binary models start with the big-endian length of the type tag, whose
    /// high byte is always zero, text models start with the tag itself.
    pub fn detect(buf: &[u8]) -> Self {
        match buf.first() {
            Some(0) | None => Format::Binary,
            Some(_) => Format::PlainText,
        }
    }
}

/// Serialize `model` into a new buffer
pub fn serialize(model: &Model, format: Format) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    write_model(model, &mut buf, format)?;
    Ok(buf)
}

/// Deserialize a model from `buf`
pub fn deserialize(buf: &[u8], format: Format) -> Result<Model> {
    match format {
        Format::Binary => ModelReader::new(&mut BinaryDataReader::new(buf)).read(),
        Format::PlainText => ModelReader::new(&mut PlainTextDataReader::new(buf)).read(),
    }
}

/// Write `model` to `w`
pub fn write_model<W: Write>(model: &Model, w: W, format: Format) -> Result<()> {
    match format {
        Format::Binary => ModelWriter::new(model).write(&mut BinaryDataWriter::new(w)),
        Format::PlainText => ModelWriter::new(model).write(&mut PlainTextDataWriter::new(w)),
    }
}

/// Read a model from `r`, detecting the encoding
pub fn read_model<R: BufRead>(mut r: R) -> Result<Model> {
    let format = Format::detect(r.fill_buf()?);
    match format {
        Format::Binary => ModelReader::new(&mut BinaryDataReader::new(r)).read(),
        Format::PlainText => ModelReader::new(&mut PlainTextDataReader::new(r)).read(),
    }
}
