//! Output sink
//!
//! Converts validated payloads into the process's output byte stream.
//! Every completed FTDI read starts with two modem-status bytes; only what
//! follows them is data.

use std::io::Write;

/// Length of the fixed status header preceding each payload
pub const STATUS_HEADER_LEN: usize = 2;

/// Append-only writer that strips the status header from each payload
#[derive(Debug)]
pub struct OutputSink<W: Write> {
    writer: W,
    bytes_emitted: u64,
}

impl<W: Write> OutputSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            bytes_emitted: 0,
        }
    }

    /// Emit the data portion of one completed payload.
    ///
    /// Payloads of `STATUS_HEADER_LEN` bytes or fewer carry pure status and
    /// produce no output. Returns the number of bytes written.
    pub fn emit(&mut self, payload: &[u8]) -> std::io::Result<usize> {
        if payload.len() <= STATUS_HEADER_LEN {
            return Ok(0);
        }

        let data = &payload[STATUS_HEADER_LEN..];
        self.writer.write_all(data)?;
        self.bytes_emitted += data.len() as u64;
        Ok(data.len())
    }

    /// Total data bytes emitted so far (headers excluded)
    pub fn bytes_emitted(&self) -> u64 {
        self.bytes_emitted
    }

    pub fn flush(&mut self) -> std::io::Result<()> {
        self.writer.flush()
    }
}
