/// Numeric training corpus produced by the data indexer
///
/// Row `i` describes a distinct event: the predicate ids of its context, the
/// id of its outcome, the values of its predicates (only stored when the
/// corpus has real-valued events) and the number of times it occurred.
#[derive(Debug, Clone, Default)]
pub struct IndexedCorpus {
    pub(crate) contexts: Vec<Vec<u32>>,
    pub(crate) outcomes: Vec<u32>,
    pub(crate) values: Option<Vec<Vec<f64>>>,
    pub(crate) num_times_seen: Vec<u32>,
    pub(crate) pred_labels: Vec<String>,
    pub(crate) outcome_labels: Vec<String>,
    pub(crate) pred_counts: Vec<u32>,
}

impl IndexedCorpus {
    /// Number of distinct rows
    pub fn len(&self) -> usize {
        self.contexts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }

    /// Number of retained events, counting duplicates
    pub fn num_events(&self) -> u64 {
        self.num_times_seen.iter().map(|&n| n as u64).sum()
    }

    pub fn num_predicates(&self) -> usize {
        self.pred_labels.len()
    }

    pub fn num_outcomes(&self) -> usize {
        self.outcome_labels.len()
    }

    pub fn contexts(&self) -> &[Vec<u32>] {
        &self.contexts
    }

    pub fn outcomes(&self) -> &[u32] {
        &self.outcomes
    }

    pub fn values(&self) -> Option<&[Vec<f64>]> {
        self.values.as_deref()
    }

    pub fn num_times_seen(&self) -> &[u32] {
        &self.num_times_seen
    }

    /// Predicate names ordered by predicate id
    pub fn pred_labels(&self) -> &[String] {
        &self.pred_labels
    }

    /// Outcome names ordered by outcome id
    pub fn outcome_labels(&self) -> &[String] {
        &self.outcome_labels
    }

    /// Corpus-wide occurrence count of every retained predicate
    pub fn pred_counts(&self) -> &[u32] {
        &self.pred_counts
    }

    /// Value of predicate `j` in row `i`
    #[inline]
    pub fn value(&self, i: usize, j: usize) -> f64 {
        self.values.as_ref().map_or(1.0, |v| v[i][j])
    }

    /// Sum of the predicate values of row `i`
    pub fn context_size(&self, i: usize) -> f64 {
        match &self.values {
            Some(values) => values[i].iter().sum(),
            None => self.contexts[i].len() as f64,
        }
    }
}
