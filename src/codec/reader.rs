use log::debug;

use super::data_io::DataReader;
use crate::error::{Error, Result};
use crate::model::{Context, Model, ModelType};

/// Reads the sections written by [`super::ModelWriter`]
pub struct ModelReader<'r> {
    reader: &'r mut dyn DataReader,
}

impl<'r> ModelReader<'r> {
    pub fn new(reader: &'r mut dyn DataReader) -> Self {
        Self { reader }
    }

    pub fn read(mut self) -> Result<Model> {
        let tag = self.reader.read_utf()?;
        let model_type = ModelType::from_tag(&tag)
            .ok_or_else(|| Error::corrupt(format!("unknown model type {:?}", tag)))?;

        let (correction_constant, correction_param) = if model_type == ModelType::Gis {
            let constant = self.reader.read_int()?;
            if constant <= 0 {
                return Err(Error::corrupt(format!(
                    "correction constant must be positive, found {}",
                    constant
                )));
            }
            (constant as f64, self.reader.read_double()?)
        } else {
            (1.0, 0.0)
        };

        let outcomes = self.read_labels("outcome")?;
        let patterns = self.read_patterns(outcomes.len())?;
        let predicates = self.read_labels("predicate")?;

        let total: usize = patterns.iter().map(|(count, _)| count).sum();
        if total != predicates.len() {
            return Err(Error::corrupt(format!(
                "outcome patterns cover {} predicates, found {}",
                total,
                predicates.len()
            )));
        }

        let mut contexts = Vec::with_capacity(predicates.len());
        for (count, pattern) in &patterns {
            for _ in 0..*count {
                let mut parameters = Vec::with_capacity(pattern.len());
                for _ in 0..pattern.len() {
                    parameters.push(self.reader.read_double()?);
                }
                contexts.push(Context::new(pattern.clone(), parameters));
            }
        }
        debug!(
            "read {} model: {} outcomes, {} predicates",
            model_type,
            outcomes.len(),
            predicates.len()
        );

        Model::new(
            model_type,
            contexts,
            predicates,
            outcomes,
            correction_constant,
            correction_param,
        )
        .map_err(|e| match e {
            Error::InvalidInput(msg) | Error::Configuration(msg) => Error::CorruptModel(msg),
            other => other,
        })
    }

    fn read_count(&mut self, what: &str) -> Result<usize> {
        let n = self.reader.read_int()?;
        usize::try_from(n).map_err(|_| Error::corrupt(format!("negative {} count {}", what, n)))
    }

    fn read_labels(&mut self, what: &str) -> Result<Vec<String>> {
        let n = self.read_count(what)?;
        let mut labels = Vec::with_capacity(n.min(1 << 16));
        for _ in 0..n {
            labels.push(self.reader.read_utf()?);
        }
        Ok(labels)
    }

    /// Outcome patterns as `(number of predicates, outcome ids)`
    fn read_patterns(&mut self, num_outcomes: usize) -> Result<Vec<(usize, Vec<u32>)>> {
        let n = self.read_count("outcome pattern")?;
        let mut patterns = Vec::with_capacity(n.min(1 << 16));
        for _ in 0..n {
            let line = self.reader.read_utf()?;
            let mut fields = line.split_whitespace().map(|f| {
                f.parse::<u32>()
                    .map_err(|_| Error::corrupt(format!("malformed outcome pattern {:?}", line)))
            });
            let count = match fields.next() {
                Some(count) => count? as usize,
                None => return Err(Error::corrupt("empty outcome pattern")),
            };
            let outcomes = fields.collect::<Result<Vec<_>>>()?;
            if outcomes.iter().any(|&o| o as usize >= num_outcomes) {
                return Err(Error::corrupt(format!(
                    "outcome pattern {:?} refers to an unknown outcome",
                    line
                )));
            }
            patterns.push((count, outcomes));
        }
        Ok(patterns)
    }
}
