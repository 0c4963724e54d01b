use std::io::{self, BufReader, BufWriter, Read, Seek, SeekFrom, Write};

use log::{debug, info};
use rustc_hash::FxHashMap;

use super::dictionary::Dictionary;
use crate::dataset::IndexedCorpus;
use crate::error::{Error, Result};
use crate::event::Event;
use crate::event_stream::EventStream;

/// How the indexer walks the event stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IndexerKind {
    /// Buffer all events in memory
    OnePass,
    /// Spool events to a temporary file, keeping only counts in memory
    #[default]
    TwoPass,
}

impl IndexerKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::OnePass => "OnePass",
            Self::TwoPass => "TwoPass",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "OnePass" => Some(Self::OnePass),
            "TwoPass" => Some(Self::TwoPass),
            _ => None,
        }
    }
}

/// Data indexer parameters.
#[derive(Debug, Clone)]
pub struct IndexingParams {
    cutoff: u32,
    sort: bool,
    kind: IndexerKind,
}

impl Default for IndexingParams {
    fn default() -> Self {
        Self {
            cutoff: 5,
            sort: true,
            kind: IndexerKind::default(),
        }
    }
}

impl IndexingParams {
    /// Minimum number of occurrences for a predicate to be kept
    pub fn cutoff(&self) -> u32 {
        self.cutoff
    }

    pub fn set_cutoff(&mut self, cutoff: u32) {
        self.cutoff = cutoff;
    }

    /// Order vocabularies and rows by name instead of first appearance
    pub fn sort(&self) -> bool {
        self.sort
    }

    pub fn set_sort(&mut self, sort: bool) {
        self.sort = sort;
    }

    pub fn kind(&self) -> IndexerKind {
        self.kind
    }

    pub fn set_kind(&mut self, kind: IndexerKind) {
        self.kind = kind;
    }
}

/// Turns a stream of events into an [`IndexedCorpus`]
///
/// Predicates occurring fewer than `cutoff` times in the whole stream are
/// removed from every event, events left without any predicate are dropped
/// and identical events are merged into a single row.
#[derive(Debug, Clone, Default)]
pub struct DataIndexer {
    params: IndexingParams,
}

impl DataIndexer {
    pub fn new(params: IndexingParams) -> Self {
        Self { params }
    }

    /// Create an indexer with the given cutoff and sorting
    pub fn with_cutoff(cutoff: u32, sort: bool) -> Self {
        let mut params = IndexingParams::default();
        params.set_cutoff(cutoff);
        params.set_sort(sort);
        Self { params }
    }

    pub fn params(&self) -> &IndexingParams {
        &self.params
    }

    /// Index the events of `stream`
    pub fn index(&self, stream: &mut dyn EventStream) -> Result<IndexedCorpus> {
        info!(
            "indexing events using cutoff of {} ({})",
            self.params.cutoff,
            self.params.kind.as_str()
        );
        match self.params.kind {
            IndexerKind::OnePass => self.index_one_pass(stream),
            IndexerKind::TwoPass => self.index_two_pass(stream),
        }
    }

    fn index_one_pass(&self, stream: &mut dyn EventStream) -> Result<IndexedCorpus> {
        let mut counter = PredicateCounter::default();
        let mut events = Vec::new();
        while let Some(event) = stream.read()? {
            counter.count(&event);
            events.push(event);
        }
        let mut builder = CorpusBuilder::new(counter, &self.params);
        for event in &events {
            builder.add(event);
        }
        Ok(builder.finish(self.params.sort))
    }

    fn index_two_pass(&self, stream: &mut dyn EventStream) -> Result<IndexedCorpus> {
        let mut counter = PredicateCounter::default();
        // removed by the OS once the handle is dropped, whichever way we exit
        let spool = tempfile::tempfile()?;
        let mut w = BufWriter::new(spool);
        let mut num_events = 0u64;
        while let Some(event) = stream.read()? {
            counter.count(&event);
            spool_event(&mut w, &event)?;
            num_events += 1;
        }
        let mut spool = w.into_inner().map_err(|e| e.into_error())?;
        spool.seek(SeekFrom::Start(0))?;
        debug!("spooled {} events", num_events);

        let mut builder = CorpusBuilder::new(counter, &self.params);
        let mut r = BufReader::new(spool);
        for _ in 0..num_events {
            let event = read_spooled_event(&mut r)?;
            builder.add(&event);
        }
        Ok(builder.finish(self.params.sort))
    }
}

/// First pass: predicate vocabulary with corpus-wide counts
#[derive(Default)]
struct PredicateCounter {
    dict: Dictionary,
    counts: Vec<u32>,
}

impl PredicateCounter {
    fn count(&mut self, event: &Event) {
        for pred in event.context() {
            let id = self.dict.get_or_insert(pred) as usize;
            if id == self.counts.len() {
                self.counts.push(0);
            }
            self.counts[id] = self.counts[id].saturating_add(1);
        }
    }
}

/// Second pass: re-encodes events with the final predicate ids
struct CorpusBuilder {
    pred_ids: FxHashMap<String, u32>,
    pred_labels: Vec<String>,
    pred_counts: Vec<u32>,
    outcomes: Dictionary,
    rows: Vec<Row>,
    row_index: FxHashMap<RowKey, usize>,
    has_values: bool,
    dropped: u64,
}

struct Row {
    outcome: u32,
    context: Vec<u32>,
    values: Vec<f64>,
    num_times_seen: u32,
}

#[derive(PartialEq, Eq, Hash)]
struct RowKey {
    outcome: u32,
    context: Vec<u32>,
    values: Vec<u64>,
}

impl CorpusBuilder {
    fn new(counter: PredicateCounter, params: &IndexingParams) -> Self {
        let cutoff = params.cutoff;
        let mut retained: Vec<(&str, u32)> = counter
            .dict
            .iter()
            .filter(|&(_, id)| counter.counts[id as usize] >= cutoff)
            .collect();
        if params.sort {
            retained.sort_unstable_by(|a, b| a.0.cmp(b.0));
        }
        let pred_labels: Vec<String> = retained.iter().map(|(s, _)| s.to_string()).collect();
        let pred_counts = retained
            .iter()
            .map(|&(_, id)| counter.counts[id as usize])
            .collect();
        let pred_ids = pred_labels
            .iter()
            .enumerate()
            .map(|(i, s)| (s.clone(), i as u32))
            .collect();
        info!(
            "{} of {} predicates pass the cutoff of {}",
            pred_labels.len(),
            counter.dict.len(),
            cutoff
        );
        Self {
            pred_ids,
            pred_labels,
            pred_counts,
            outcomes: Dictionary::new(),
            rows: Vec::new(),
            row_index: FxHashMap::default(),
            has_values: false,
            dropped: 0,
        }
    }

    fn add(&mut self, event: &Event) {
        let mut context = Vec::with_capacity(event.context().len());
        let mut values = Vec::with_capacity(event.context().len());
        for (i, pred) in event.context().iter().enumerate() {
            if let Some(&id) = self.pred_ids.get(pred.as_str()) {
                context.push(id);
                values.push(event.value(i));
            }
        }
        if context.is_empty() {
            self.dropped += 1;
            debug!(
                "dropped event {}:{:?}",
                event.outcome(),
                event.context()
            );
            return;
        }
        self.has_values |= event.values().is_some();

        let outcome = self.outcomes.get_or_insert(event.outcome());
        let key = RowKey {
            outcome,
            context: context.clone(),
            values: values.iter().map(|v| v.to_bits()).collect(),
        };
        match self.row_index.get(&key) {
            Some(&row) => self.rows[row].num_times_seen += 1,
            None => {
                self.row_index.insert(key, self.rows.len());
                self.rows.push(Row {
                    outcome,
                    context,
                    values,
                    num_times_seen: 1,
                });
            }
        }
    }

    fn finish(self, sort: bool) -> IndexedCorpus {
        let Self {
            pred_labels,
            pred_counts,
            outcomes,
            mut rows,
            has_values,
            dropped,
            ..
        } = self;

        let mut outcome_labels = outcomes.into_names();
        if sort {
            let mut order: Vec<usize> = (0..outcome_labels.len()).collect();
            order.sort_unstable_by(|&a, &b| outcome_labels[a].cmp(&outcome_labels[b]));
            let mut remap = vec![0u32; order.len()];
            for (new_id, &old_id) in order.iter().enumerate() {
                remap[old_id] = new_id as u32;
            }
            for row in &mut rows {
                row.outcome = remap[row.outcome as usize];
            }
            outcome_labels = order.iter().map(|&i| outcome_labels[i].clone()).collect();
            rows.sort_by(|a, b| {
                a.outcome
                    .cmp(&b.outcome)
                    .then_with(|| a.context.cmp(&b.context))
                    .then_with(|| {
                        a.values
                            .iter()
                            .zip(&b.values)
                            .map(|(x, y)| x.total_cmp(y))
                            .find(|o| o.is_ne())
                            .unwrap_or(std::cmp::Ordering::Equal)
                    })
            });
        }

        let num_rows = rows.len();
        let mut corpus = IndexedCorpus {
            contexts: Vec::with_capacity(num_rows),
            outcomes: Vec::with_capacity(num_rows),
            values: None,
            num_times_seen: Vec::with_capacity(num_rows),
            pred_labels,
            outcome_labels,
            pred_counts,
        };
        let mut values = Vec::with_capacity(if has_values { num_rows } else { 0 });
        for row in rows {
            corpus.contexts.push(row.context);
            corpus.outcomes.push(row.outcome);
            corpus.num_times_seen.push(row.num_times_seen);
            if has_values {
                values.push(row.values);
            }
        }
        if has_values {
            corpus.values = Some(values);
        }

        info!(
            "indexed {} events into {} unique rows ({} dropped), {} outcomes, {} predicates",
            corpus.num_events(),
            corpus.len(),
            dropped,
            corpus.num_outcomes(),
            corpus.num_predicates()
        );
        corpus
    }
}

fn write_str<W: Write>(w: &mut W, s: &str) -> io::Result<()> {
    w.write_all(&(s.len() as u32).to_le_bytes())?;
    w.write_all(s.as_bytes())
}

fn read_u32<R: Read>(r: &mut R) -> io::Result<u32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

fn read_str<R: Read>(r: &mut R) -> Result<String> {
    let len = read_u32(r)? as usize;
    let mut buf = vec![0u8; len];
    r.read_exact(&mut buf)?;
    String::from_utf8(buf).map_err(|e| Error::Io(io::Error::new(io::ErrorKind::InvalidData, e)))
}

fn spool_event<W: Write>(w: &mut W, event: &Event) -> Result<()> {
    let context = event.context();
    if u32::try_from(context.len()).is_err() {
        return Err(Error::invalid_input("event context too large"));
    }
    write_str(w, event.outcome())?;
    w.write_all(&(context.len() as u32).to_le_bytes())?;
    for pred in context {
        write_str(w, pred)?;
    }
    match event.values() {
        Some(values) => {
            w.write_all(&[1])?;
            for v in values {
                w.write_all(&v.to_le_bytes())?;
            }
        }
        None => w.write_all(&[0])?,
    }
    Ok(())
}

fn read_spooled_event<R: Read>(r: &mut R) -> Result<Event> {
    let outcome = read_str(r)?;
    let n = read_u32(r)? as usize;
    let mut context = Vec::with_capacity(n);
    for _ in 0..n {
        context.push(read_str(r)?);
    }
    let mut flag = [0u8; 1];
    r.read_exact(&mut flag)?;
    if flag[0] == 0 {
        return Ok(Event::new(outcome, context));
    }
    let mut values = Vec::with_capacity(n);
    let mut buf = [0u8; 8];
    for _ in 0..n {
        r.read_exact(&mut buf)?;
        values.push(f64::from_le_bytes(buf));
    }
    Event::with_values(outcome, context, values)
}
