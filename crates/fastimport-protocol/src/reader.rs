//! Line-oriented byte stream reader
//!
//! Wraps a buffered byte source with the four primitives the parser needs:
//! line reads, single-line pushback, exact-count raw reads and
//! terminator-delimited reads. The current line number counts newlines
//! consumed inside raw reads as well.

use std::io::BufRead;

use bytes::Bytes;

use crate::error::{ParseError, ParseResult};

/// Reader over a sequential byte source with one line of pushback.
pub struct StreamReader<R> {
    input: R,
    lineno: u64,
    pushed: Option<Bytes>,
}

impl<R: BufRead> StreamReader<R> {
    pub fn new(input: R) -> Self {
        Self {
            input,
            lineno: 0,
            pushed: None,
        }
    }

    /// Number of the line most recently returned.
    pub fn lineno(&self) -> u64 {
        self.lineno
    }

    /// Next line with its terminator stripped, or `None` at end of input.
    pub fn next_line(&mut self) -> ParseResult<Option<Bytes>> {
        if let Some(line) = self.pushed.take() {
            self.lineno += 1;
            return Ok(Some(line));
        }
        let mut raw = Vec::new();
        let count = self.input.read_until(b'\n', &mut raw)?;
        if count == 0 {
            return Ok(None);
        }
        self.lineno += 1;
        if raw.last() == Some(&b'\n') {
            raw.pop();
        }
        Ok(Some(Bytes::from(raw)))
    }

    /// Hand one line back; the next `next_line` call returns it again.
    pub fn push_line(&mut self, line: Bytes) {
        self.lineno = self.lineno.saturating_sub(1);
        self.pushed = Some(line);
    }

    /// Read exactly `count` raw bytes. Bypasses any pushed-back line, and
    /// leaves a line terminator directly after the span for the next read.
    pub fn read_bytes(&mut self, count: usize) -> ParseResult<Bytes> {
        let mut buf = vec![0u8; count];
        let mut filled = 0;
        while filled < count {
            match self.input.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        buf.truncate(filled);
        self.lineno += buf.iter().filter(|&&b| b == b'\n').count() as u64;
        if filled != count {
            return Err(ParseError::MissingBytes {
                lineno: self.lineno,
                expected: count,
                found: filled,
            });
        }
        Ok(Bytes::from(buf))
    }

    /// Consume lines up to one equal to `terminator`. The terminator line
    /// is consumed but excluded from the result, which joins the collected
    /// lines with newlines. Bypasses any pushed-back line.
    pub fn read_until(&mut self, terminator: &[u8]) -> ParseResult<Bytes> {
        let mut out: Vec<u8> = Vec::new();
        let mut first = true;
        loop {
            let mut raw = Vec::new();
            let count = self.input.read_until(b'\n', &mut raw)?;
            if count == 0 {
                return Err(ParseError::MissingTerminator {
                    lineno: self.lineno,
                    terminator: String::from_utf8_lossy(terminator).into_owned(),
                });
            }
            self.lineno += 1;
            if raw.last() == Some(&b'\n') {
                raw.pop();
            }
            if raw == terminator {
                break;
            }
            if !first {
                out.push(b'\n');
            }
            out.extend_from_slice(&raw);
            first = false;
        }
        Ok(Bytes::from(out))
    }
}
