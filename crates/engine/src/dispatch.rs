//! Completion dispatcher and lifecycle controller
//!
//! Single-threaded, cooperative event loop: submit N requests, block on the
//! backend for one completion at a time, validate its ordering, emit its
//! payload, and resubmit the slot. Concurrency comes entirely from the
//! outstanding requests the backend holds, never from threads, so no state
//! here needs locking.

use crate::backend::StreamBackend;
use crate::error::{EngineError, Result};
use crate::event::{Completion, SlotId, TransferStatus};
use crate::pool::SlotPool;
use crate::sequencer::Sequencer;
use crate::sink::OutputSink;
use crate::stop::{RunState, StopCondition};
use std::io::Write;
use tracing::{debug, info};

/// The parallel-transfer scheduling engine
pub struct StreamEngine<B: StreamBackend, W: Write> {
    backend: B,
    pool: SlotPool,
    sequencer: Sequencer,
    sink: OutputSink<W>,
    state: RunState,
    completions: u64,
}

impl<B: StreamBackend, W: Write> StreamEngine<B, W> {
    /// Create an engine over `backend` with `slots` parallel requests of
    /// `buffer_size` bytes each.
    pub fn new(
        backend: B,
        sink: OutputSink<W>,
        stop: StopCondition,
        slots: usize,
        buffer_size: usize,
    ) -> Self {
        Self {
            backend,
            pool: SlotPool::new(slots, buffer_size),
            sequencer: Sequencer::new(),
            sink,
            state: RunState::new(stop),
            completions: 0,
        }
    }

    /// Run to completion: submit all slots, dispatch until stopped, then
    /// drain every outstanding request before returning.
    pub fn run(&mut self) -> Result<()> {
        self.submit_all()?;

        while self.state.running() {
            let completion = self.backend.wait()?;
            self.handle_completion(completion)?;
        }

        self.drain()?;
        self.sink.flush()?;

        info!(
            completions = self.completions,
            bytes = self.sink.bytes_emitted(),
            "stream finished"
        );
        Ok(())
    }

    /// Total data bytes emitted (headers excluded)
    pub fn bytes_emitted(&self) -> u64 {
        self.sink.bytes_emitted()
    }

    /// The backend driving this engine
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Submit the initial round of requests, one per slot.
    fn submit_all(&mut self) -> Result<()> {
        for i in 0..self.pool.len() {
            let slot = SlotId(i);
            self.backend.submit(slot, self.pool.make_buffer())?;
            self.pool.mark_submitted(slot);
        }
        info!(slots = self.pool.len(), "all transfers submitted");
        Ok(())
    }

    /// Handle one completion event, on the dispatcher's thread.
    fn handle_completion(&mut self, completion: Completion) -> Result<()> {
        // Stop conditions are re-checked inside every handler so a duration
        // budget is noticed without waiting for the outer loop.
        let running = self.state.running();

        match completion.status {
            TransferStatus::Completed => {}
            TransferStatus::Cancelled if !running => {
                // Expected while draining; nothing to emit, but the slot
                // still occupies its place in the stream, so its sequence
                // number is consumed to keep later completions aligned.
                self.sequencer.validate(self.pool.sequence(completion.slot))?;
                debug!(slot = completion.slot.index(), "cancelled during drain");
                self.pool.release(completion.slot);
                return Ok(());
            }
            status => {
                return Err(EngineError::TransferStatus {
                    slot: completion.slot.index(),
                    status,
                });
            }
        }

        self.sequencer.validate(self.pool.sequence(completion.slot))?;
        self.completions += 1;
        self.sink.emit(&completion.buffer[..completion.len])?;

        if running {
            self.pool.advance(completion.slot);
            self.backend.submit(completion.slot, completion.buffer)?;
            self.pool.mark_submitted(completion.slot);
        } else {
            self.pool.release(completion.slot);
        }
        Ok(())
    }

    /// Wait for every outstanding request to finish once resubmission has
    /// stopped. Data still arriving in order is emitted, not discarded.
    fn drain(&mut self) -> Result<()> {
        if self.pool.outstanding() > 0 {
            debug!(outstanding = self.pool.outstanding(), "draining slot pool");
        }

        while self.pool.outstanding() > 0 {
            let completion = self.backend.wait()?;
            self.handle_completion(completion)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::MockBackend;
    use std::sync::atomic::AtomicBool;
    use std::time::Duration;

    fn packet(data: &[u8]) -> Vec<u8> {
        let mut p = vec![0x01, 0x60];
        p.extend_from_slice(data);
        p
    }

    #[test]
    fn test_duration_zero_emits_nothing() {
        let backend = MockBackend::new(2);
        let mut out = Vec::new();
        let mut engine = StreamEngine::new(
            backend,
            OutputSink::new(&mut out),
            StopCondition::Duration(Duration::ZERO),
            2,
            64,
        );

        engine.run().unwrap();
        assert_eq!(engine.bytes_emitted(), 0);
        drop(engine);
        assert!(out.is_empty());
    }

    #[test]
    fn test_single_slot_round_trip() {
        let flag: &'static AtomicBool = Box::leak(Box::new(AtomicBool::new(false)));
        let mut backend = MockBackend::new(1).with_stop_flag(flag);
        backend.push_fifo(packet(&[0xDE, 0xAD]));
        backend.push_fifo(packet(&[0xBE, 0xEF]));

        let mut out = Vec::new();
        let mut engine = StreamEngine::new(
            backend,
            OutputSink::new(&mut out),
            StopCondition::Signal(flag),
            1,
            64,
        );

        engine.run().unwrap();
        drop(engine);
        assert_eq!(out, vec![0xDE, 0xAD, 0xBE, 0xEF]);
    }
}
