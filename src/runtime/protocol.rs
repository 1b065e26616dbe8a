//! Wire messages of the line protocol and the input frame decoder.
//!
//! The host writes a stream of JSON values, one [`Input`] per invocation.
//! Inputs are framed by JSON structure alone, so a value may span several
//! reads or share a read with the next one. Every [`Output`] goes back as a
//! single newline-terminated line.

use crate::error::{Error, Result};
use bytes::{Buf, BytesMut};
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Incoming message from the host.
#[derive(Debug, Deserialize)]
pub struct Input {
    /// Passed through to handlers as an opaque value.
    #[serde(default)]
    pub context: Value,
    #[serde(default)]
    pub event: Option<Box<RawValue>>,
}

/// Outgoing message to the host.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Output {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

impl Output {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            value: None,
        }
    }

    pub fn value(value: Value) -> Self {
        Self {
            error: None,
            value: Some(value),
        }
    }

    /// Encode as one protocol line.
    pub fn to_line(&self) -> Result<Vec<u8>> {
        let mut line = serde_json::to_vec(self).map_err(Error::Encode)?;
        line.push(b'\n');
        Ok(line)
    }
}

/// Incremental decoder for the input stream.
///
/// Each read is scanned once for the end of the pending top-level value;
/// the buffer is only handed to the JSON parser when a value may be
/// complete, so large events arriving in small chunks stay linear.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buf: BytesMut,
    scan: Scan,
}

enum Frame {
    Input(Input, usize),
    Incomplete,
    Empty,
}

/// Structural scan state over the buffered bytes.
#[derive(Debug, Default)]
struct Scan {
    pos: usize,
    depth: usize,
    in_string: bool,
    escaped: bool,
}

impl Scan {
    /// Advance over new bytes. Returns true once the buffer may hold a
    /// complete value. Anything that does not open an object or array is
    /// left for the parser to judge.
    fn ready(&mut self, buf: &[u8]) -> bool {
        while self.pos < buf.len() {
            let b = buf[self.pos];
            if self.depth == 0 {
                match b {
                    b'{' | b'[' => self.depth = 1,
                    b' ' | b'\t' | b'\n' | b'\r' => {}
                    _ => return true,
                }
            } else if self.in_string {
                match (self.escaped, b) {
                    (true, _) => self.escaped = false,
                    (false, b'\\') => self.escaped = true,
                    (false, b'"') => self.in_string = false,
                    _ => {}
                }
            } else {
                match b {
                    b'"' => self.in_string = true,
                    b'{' | b'[' => self.depth += 1,
                    b'}' | b']' => {
                        self.depth -= 1;
                        if self.depth == 0 {
                            self.pos += 1;
                            return true;
                        }
                    }
                    _ => {}
                }
            }
            self.pos += 1;
        }
        false
    }
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the next input.
    ///
    /// Returns `Ok(None)` once the reader is exhausted with nothing but
    /// whitespace left. Malformed JSON, and a stream ending in the middle
    /// of a value, are [`Error::Decode`].
    pub async fn next<R>(&mut self, reader: &mut R) -> Result<Option<Input>>
    where
        R: AsyncRead + Unpin,
    {
        loop {
            if self.scan.ready(&self.buf) {
                match self.decode()? {
                    Frame::Input(input, consumed) => {
                        self.buf.advance(consumed);
                        self.scan = Scan::default();
                        return Ok(Some(input));
                    }
                    Frame::Empty => {
                        self.buf.clear();
                        self.scan = Scan::default();
                    }
                    Frame::Incomplete => {}
                }
            }

            if reader.read_buf(&mut self.buf).await? == 0 {
                return self.finish();
            }
        }
    }

    fn decode(&self) -> Result<Frame> {
        let mut stream = serde_json::Deserializer::from_slice(&self.buf).into_iter::<Input>();
        match stream.next() {
            Some(Ok(input)) => Ok(Frame::Input(input, stream.byte_offset())),
            Some(Err(e)) if e.is_eof() => Ok(Frame::Incomplete),
            Some(Err(e)) => Err(Error::Decode(e)),
            None => Ok(Frame::Empty),
        }
    }

    fn finish(&mut self) -> Result<Option<Input>> {
        let mut stream = serde_json::Deserializer::from_slice(&self.buf).into_iter::<Input>();
        match stream.next() {
            Some(Err(e)) => Err(Error::Decode(e)),
            Some(Ok(input)) => {
                let consumed = stream.byte_offset();
                self.buf.advance(consumed);
                self.scan = Scan::default();
                Ok(Some(input))
            }
            None => Ok(None),
        }
    }
}
