//! Primitive readers and writers for the two model encodings
//!
//! The binary encoding follows the conventions of Java's `DataOutputStream`:
//! big-endian integers and doubles, strings as modified UTF-8 prefixed with
//! a big-endian `u16` byte length. The text encoding writes one value per
//! line.

use std::io::{self, BufRead, Read, Write};

use bstr::ByteSlice;

use crate::error::{Error, Result};

/// Sink for the primitive values of a persisted model
pub trait DataWriter {
    fn write_utf(&mut self, s: &str) -> Result<()>;
    fn write_int(&mut self, v: i32) -> Result<()>;
    fn write_double(&mut self, v: f64) -> Result<()>;
}

/// Source of the primitive values of a persisted model
pub trait DataReader {
    fn read_utf(&mut self) -> Result<String>;
    fn read_int(&mut self) -> Result<i32>;
    fn read_double(&mut self) -> Result<f64>;
}

fn truncated(err: io::Error) -> Error {
    if err.kind() == io::ErrorKind::UnexpectedEof {
        Error::corrupt("unexpected end of model data")
    } else {
        Error::Io(err)
    }
}

/// Encode `s` as length-prefixed modified UTF-8
pub(crate) fn encode_modified_utf8(s: &str) -> Result<Vec<u8>> {
    let mut bytes = Vec::with_capacity(s.len() + 2);
    bytes.extend_from_slice(&[0, 0]);
    for unit in s.encode_utf16() {
        match unit {
            0x0001..=0x007F => bytes.push(unit as u8),
            0x0000 | 0x0080..=0x07FF => {
                bytes.push(0xC0 | ((unit >> 6) & 0x1F) as u8);
                bytes.push(0x80 | (unit & 0x3F) as u8);
            }
            _ => {
                bytes.push(0xE0 | ((unit >> 12) & 0x0F) as u8);
                bytes.push(0x80 | ((unit >> 6) & 0x3F) as u8);
                bytes.push(0x80 | (unit & 0x3F) as u8);
            }
        }
    }
    let len = u16::try_from(bytes.len() - 2)
        .map_err(|_| Error::invalid_input("string too long for the binary model format"))?;
    bytes[..2].copy_from_slice(&len.to_be_bytes());
    Ok(bytes)
}

/// Decode modified UTF-8 bytes (without the length prefix)
pub(crate) fn decode_modified_utf8(buf: &[u8]) -> Result<String> {
    let malformed = || Error::corrupt("malformed modified UTF-8 string");
    let mut units = Vec::with_capacity(buf.len());
    let mut i = 0;
    while i < buf.len() {
        let b0 = buf[i] as u16;
        if b0 & 0x80 == 0 {
            units.push(b0);
            i += 1;
        } else if b0 & 0xE0 == 0xC0 {
            let b1 = *buf.get(i + 1).ok_or_else(malformed)? as u16;
            if b1 & 0xC0 != 0x80 {
                return Err(malformed());
            }
            units.push(((b0 & 0x1F) << 6) | (b1 & 0x3F));
            i += 2;
        } else if b0 & 0xF0 == 0xE0 {
            let b1 = *buf.get(i + 1).ok_or_else(malformed)? as u16;
            let b2 = *buf.get(i + 2).ok_or_else(malformed)? as u16;
            if b1 & 0xC0 != 0x80 || b2 & 0xC0 != 0x80 {
                return Err(malformed());
            }
            units.push(((b0 & 0x0F) << 12) | ((b1 & 0x3F) << 6) | (b2 & 0x3F));
            i += 3;
        } else {
            return Err(malformed());
        }
    }
    String::from_utf16(&units).map_err(|_| malformed())
}

/// Binary model encoding writer
#[derive(Debug)]
pub struct BinaryDataWriter<W> {
    inner: W,
}

impl<W: Write> BinaryDataWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> DataWriter for BinaryDataWriter<W> {
    fn write_utf(&mut self, s: &str) -> Result<()> {
        self.inner.write_all(&encode_modified_utf8(s)?)?;
        Ok(())
    }

    fn write_int(&mut self, v: i32) -> Result<()> {
        self.inner.write_all(&v.to_be_bytes())?;
        Ok(())
    }

    fn write_double(&mut self, v: f64) -> Result<()> {
        self.inner.write_all(&v.to_be_bytes())?;
        Ok(())
    }
}

/// Binary model encoding reader
#[derive(Debug)]
pub struct BinaryDataReader<R> {
    inner: R,
}

impl<R: Read> BinaryDataReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }
}

impl<R: Read> DataReader for BinaryDataReader<R> {
    fn read_utf(&mut self) -> Result<String> {
        let mut len = [0u8; 2];
        self.inner.read_exact(&mut len).map_err(truncated)?;
        let mut buf = vec![0u8; u16::from_be_bytes(len) as usize];
        self.inner.read_exact(&mut buf).map_err(truncated)?;
        decode_modified_utf8(&buf)
    }

    fn read_int(&mut self) -> Result<i32> {
        let mut buf = [0u8; 4];
        self.inner.read_exact(&mut buf).map_err(truncated)?;
        Ok(i32::from_be_bytes(buf))
    }

    fn read_double(&mut self) -> Result<f64> {
        let mut buf = [0u8; 8];
        self.inner.read_exact(&mut buf).map_err(truncated)?;
        Ok(f64::from_be_bytes(buf))
    }
}

/// Plain text model encoding writer, one value per line
#[derive(Debug)]
pub struct PlainTextDataWriter<W> {
    inner: W,
}

impl<W: Write> PlainTextDataWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> DataWriter for PlainTextDataWriter<W> {
    fn write_utf(&mut self, s: &str) -> Result<()> {
        if s.contains(['\n', '\r']) {
            return Err(Error::invalid_input(format!(
                "line break in {:?} cannot be stored in the text model format",
                s
            )));
        }
        writeln!(self.inner, "{}", s)?;
        Ok(())
    }

    fn write_int(&mut self, v: i32) -> Result<()> {
        writeln!(self.inner, "{}", v)?;
        Ok(())
    }

    fn write_double(&mut self, v: f64) -> Result<()> {
        // Debug formatting keeps a decimal point and round-trips exactly
        writeln!(self.inner, "{:?}", v)?;
        Ok(())
    }
}

/// Plain text model encoding reader
#[derive(Debug)]
pub struct PlainTextDataReader<R> {
    inner: R,
    line: Vec<u8>,
}

impl<R: BufRead> PlainTextDataReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            line: Vec::new(),
        }
    }

    fn next_line(&mut self) -> Result<&str> {
        self.line.clear();
        if self.inner.read_until(b'\n', &mut self.line)? == 0 {
            return Err(Error::corrupt("unexpected end of model data"));
        }
        self.line
            .trim_end_with(|c| c == '\n' || c == '\r')
            .to_str()
            .map_err(|_| Error::corrupt("model text is not valid UTF-8"))
    }
}

impl<R: BufRead> DataReader for PlainTextDataReader<R> {
    fn read_utf(&mut self) -> Result<String> {
        self.next_line().map(str::to_string)
    }

    fn read_int(&mut self) -> Result<i32> {
        let line = self.next_line()?;
        line.trim()
            .parse()
            .map_err(|_| Error::corrupt(format!("expected an integer, found {:?}", line)))
    }

    fn read_double(&mut self) -> Result<f64> {
        let line = self.next_line()?;
        line.trim()
            .parse()
            .map_err(|_| Error::corrupt(format!("expected a number, found {:?}", line)))
    }
}
