//! Completion ordering validator
//!
//! Slots are submitted round-robin (0, 1, ..., N-1, 0, 1, ...) and the
//! transport preserves per-endpoint FIFO order, so completions must carry
//! sequence numbers 0, 1, 2, ... with no gaps. A mismatch means the
//! transport or the driver reordered data, which this tool refuses to
//! paper over.

use crate::error::{EngineError, Result};

/// Tracks the sequence number of the next completion that must be accepted.
///
/// A single counter shared across the whole pool: it advances by exactly 1
/// per validated completion, not per slot.
#[derive(Debug, Default)]
pub struct Sequencer {
    expected: u64,
}

impl Sequencer {
    /// Create a sequencer expecting sequence 0 first
    pub fn new() -> Self {
        Self { expected: 0 }
    }

    /// Sequence number the next completion must carry
    pub fn expected(&self) -> u64 {
        self.expected
    }

    /// Validate a completion's sequence number against the expected value.
    ///
    /// On a match the expectation advances by 1. On a mismatch the stream
    /// is unrecoverable and [`EngineError::OrderingViolation`] reports the
    /// offending pair.
    pub fn validate(&mut self, sequence: u64) -> Result<()> {
        if sequence == self.expected {
            self.expected += 1;
            Ok(())
        } else {
            Err(EngineError::OrderingViolation {
                expected: self.expected,
                got: sequence,
            })
        }
    }
}
