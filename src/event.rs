use crate::error::{Error, Result};

/// One labeled training example
///
/// An event pairs an outcome with the ordered context predicates that were
/// active when it was observed. Predicates may carry real values; when they
/// don't, every predicate counts with value `1.0`.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    outcome: String,
    context: Vec<String>,
    values: Option<Vec<f64>>,
}

impl Event {
    /// Create a new event with binary (value `1.0`) predicates
    pub fn new<O, I, S>(outcome: O, context: I) -> Self
    where
        O: Into<String>,
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            outcome: outcome.into(),
            context: context.into_iter().map(Into::into).collect(),
            values: None,
        }
    }

    /// Create a new event with real-valued predicates
    pub fn with_values<O, I, S>(outcome: O, context: I, values: Vec<f64>) -> Result<Self>
    where
        O: Into<String>,
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let event = Self::new(outcome, context);
        if event.context.len() != values.len() {
            return Err(Error::invalid_input(format!(
                "event has {} predicates but {} values",
                event.context.len(),
                values.len()
            )));
        }
        if values.iter().any(|v| !v.is_finite()) {
            return Err(Error::invalid_input("event values must be finite"));
        }
        Ok(Self {
            values: Some(values),
            ..event
        })
    }

    pub fn outcome(&self) -> &str {
        &self.outcome
    }

    pub fn context(&self) -> &[String] {
        &self.context
    }

    /// Explicit predicate values, `None` for binary events
    pub fn values(&self) -> Option<&[f64]> {
        self.values.as_deref()
    }

    /// Value of the predicate at `index`
    pub fn value(&self, index: usize) -> f64 {
        self.values.as_ref().map_or(1.0, |v| v[index])
    }
}

impl<O: Into<String>, S: Into<String>> From<(O, Vec<S>)> for Event {
    fn from((outcome, context): (O, Vec<S>)) -> Self {
        Self::new(outcome, context)
    }
}
