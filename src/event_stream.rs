use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::Path;

use bstr::io::{BufReadExt, ByteLines};
use bstr::ByteSlice;

use crate::error::{Error, Result};
use crate::event::Event;

/// A forward-only source of training events
///
/// Streams are consumed exactly once. Indexers that need two passes over the
/// data spool the events themselves instead of rewinding the source.
pub trait EventStream {
    /// Read the next event, `None` once the stream is exhausted
    fn read(&mut self) -> Result<Option<Event>>;
}

impl<S: EventStream + ?Sized> EventStream for &mut S {
    fn read(&mut self) -> Result<Option<Event>> {
        (**self).read()
    }
}

impl<S: EventStream + ?Sized> EventStream for Box<S> {
    fn read(&mut self) -> Result<Option<Event>> {
        (**self).read()
    }
}

/// Event stream over an in-memory list of events
#[derive(Debug, Clone)]
pub struct ListEventStream {
    events: std::vec::IntoIter<Event>,
}

impl ListEventStream {
    pub fn new(events: Vec<Event>) -> Self {
        Self {
            events: events.into_iter(),
        }
    }
}

impl From<Vec<Event>> for ListEventStream {
    fn from(events: Vec<Event>) -> Self {
        Self::new(events)
    }
}

impl EventStream for ListEventStream {
    fn read(&mut self) -> Result<Option<Event>> {
        Ok(self.events.next())
    }
}

/// Event stream adapter for any iterator of events
#[derive(Debug, Clone)]
pub struct IterEventStream<I> {
    iter: I,
}

impl<I: Iterator<Item = Event>> IterEventStream<I> {
    pub fn new<T: IntoIterator<IntoIter = I>>(iter: T) -> Self {
        Self {
            iter: iter.into_iter(),
        }
    }
}

impl<I: Iterator<Item = Event>> EventStream for IterEventStream<I> {
    fn read(&mut self) -> Result<Option<Event>> {
        Ok(self.iter.next())
    }
}

/// Line-oriented text event stream
///
/// Each non-blank line holds one event: the outcome followed by the
/// whitespace separated context predicates. When real values are enabled a
/// predicate written as `name=value` carries `value`, predicates without a
/// parseable value count as `1.0`.
pub struct FileEventStream<R> {
    lines: ByteLines<R>,
    real_valued: bool,
    line_no: usize,
}

impl FileEventStream<BufReader<File>> {
    /// Open a text event file
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: BufRead> FileEventStream<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.byte_lines(),
            real_valued: false,
            line_no: 0,
        }
    }

    /// Parse `name=value` predicates as real-valued features
    pub fn real_valued(mut self, enabled: bool) -> Self {
        self.real_valued = enabled;
        self
    }

    fn parse_line(&self, line: &[u8]) -> Result<Option<Event>> {
        let line = line.to_str().map_err(|_| {
            Error::invalid_input(format!("line {} is not valid UTF-8", self.line_no))
        })?;
        let mut fields = line.split_whitespace();
        let outcome = match fields.next() {
            Some(outcome) => outcome,
            None => return Ok(None),
        };
        if !self.real_valued {
            return Ok(Some(Event::new(outcome, fields)));
        }

        let mut context = Vec::new();
        let mut values = Vec::new();
        for field in fields {
            match field.rsplit_once('=') {
                Some((name, value)) if !name.is_empty() => match value.parse::<f64>() {
                    Ok(value) => {
                        context.push(name);
                        values.push(value);
                    }
                    Err(_) => {
                        context.push(field);
                        values.push(1.0);
                    }
                },
                _ => {
                    context.push(field);
                    values.push(1.0);
                }
            }
        }
        Event::with_values(outcome, context, values).map(Some)
    }
}

impl<R: BufRead> EventStream for FileEventStream<R> {
    fn read(&mut self) -> Result<Option<Event>> {
        while let Some(line) = self.lines.next() {
            let line = line?;
            self.line_no += 1;
            if let Some(event) = self.parse_line(&line)? {
                return Ok(Some(event));
            }
        }
        Ok(None)
    }
}

/// Write an event in the format read by [`FileEventStream`]
pub fn write_event<W: Write>(w: &mut W, event: &Event) -> io::Result<()> {
    w.write_all(event.outcome().as_bytes())?;
    for (i, pred) in event.context().iter().enumerate() {
        w.write_all(b" ")?;
        w.write_all(pred.as_bytes())?;
        if let Some(values) = event.values() {
            write!(w, "={}", values[i])?;
        }
    }
    w.write_all(b"\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_stream() {
        let mut stream = ListEventStream::new(vec![
            Event::new("a", ["x"]),
            Event::new("b", ["y"]),
        ]);
        assert_eq!(stream.read().unwrap().unwrap().outcome(), "a");
        assert_eq!(stream.read().unwrap().unwrap().outcome(), "b");
        assert!(stream.read().unwrap().is_none());
        assert!(stream.read().unwrap().is_none());
    }

    #[test]
    fn test_file_stream() {
        let data = b"V verb=join noun=board\n\n  N verb=is prep=of\n";
        let mut stream = FileEventStream::new(&data[..]);
        let event = stream.read().unwrap().unwrap();
        assert_eq!(event.outcome(), "V");
        assert_eq!(event.context(), ["verb=join", "noun=board"]);
        let event = stream.read().unwrap().unwrap();
        assert_eq!(event.outcome(), "N");
        assert!(stream.read().unwrap().is_none());
    }

    #[test]
    fn test_real_valued_file_stream() {
        let data = b"yes a=0.5 b c=x\n";
        let mut stream = FileEventStream::new(&data[..]).real_valued(true);
        let event = stream.read().unwrap().unwrap();
        assert_eq!(event.context(), ["a", "b", "c=x"]);
        assert_eq!(event.values(), Some(&[0.5, 1.0, 1.0][..]));
    }

    #[test]
    fn test_write_event() {
        let mut out = Vec::new();
        write_event(&mut out, &Event::new("yes", ["a", "b"])).unwrap();
        let event = Event::with_values("no", ["c"], vec![2.5]).unwrap();
        write_event(&mut out, &event).unwrap();
        assert_eq!(out, b"yes a b\nno c=2.5\n");

        let mut stream = FileEventStream::new(&out[..]).real_valued(true);
        stream.read().unwrap();
        assert_eq!(stream.read().unwrap().unwrap(), event);
    }
}
