//! Test utilities for the streaming engine
//!
//! Provides a scripted [`MockBackend`] so the dispatcher, pool, and
//! sequencer can be exercised without hardware.
//!
//! The mock honours the backend contract: submitted buffers are held until
//! their completion returns them, and completions are delivered one per
//! `wait` call. By default completions follow submission (FIFO) order;
//! tests can force a specific slot to complete early to provoke ordering
//! violations. Once the script is exhausted the mock raises the stop flag
//! (if one was attached) and completes the remaining in-flight slots FIFO
//! with header-only packets, the way a latency timer flushes an idle
//! FT232H, so shutdown drains terminate.

use crate::backend::StreamBackend;
use crate::error::{EngineError, Result};
use crate::event::{Completion, SlotId, TransferStatus};
use crate::sink::STATUS_HEADER_LEN;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};

/// How the next scripted completion chooses its slot
#[derive(Debug, Clone, Copy)]
enum Pick {
    /// Oldest outstanding submission (in-order delivery)
    Fifo,
    /// A specific slot, regardless of submission order
    Slot(usize),
}

#[derive(Debug)]
struct Scripted {
    pick: Pick,
    status: TransferStatus,
    packet: Vec<u8>,
}

/// Scripted stand-in for the libusb backend
pub struct MockBackend {
    /// Outstanding submissions in the order they were made
    fifo: VecDeque<SlotId>,
    /// Buffers lent by the engine, indexed by slot
    buffers: Vec<Option<Vec<u8>>>,
    script: VecDeque<Scripted>,
    stop_flag: Option<&'static AtomicBool>,
    submissions: usize,
    fail_submission_at: Option<usize>,
}

impl MockBackend {
    pub fn new(slots: usize) -> Self {
        Self {
            fifo: VecDeque::new(),
            buffers: (0..slots).map(|_| None).collect(),
            script: VecDeque::new(),
            stop_flag: None,
            submissions: 0,
            fail_submission_at: None,
        }
    }

    /// Raise `flag` once the script runs out, then auto-drain.
    pub fn with_stop_flag(mut self, flag: &'static AtomicBool) -> Self {
        self.stop_flag = Some(flag);
        self
    }

    /// Fail the `n`-th submission (0-based, counting the initial round).
    pub fn fail_submission_at(mut self, n: usize) -> Self {
        self.fail_submission_at = Some(n);
        self
    }

    /// Script a successful completion for the oldest outstanding slot.
    /// `packet` is the full wire payload, status header included.
    pub fn push_fifo(&mut self, packet: Vec<u8>) {
        self.script.push_back(Scripted {
            pick: Pick::Fifo,
            status: TransferStatus::Completed,
            packet,
        });
    }

    /// Script a successful completion for a specific slot, allowing tests
    /// to deliver completions out of submission order.
    pub fn push_from_slot(&mut self, slot: usize, packet: Vec<u8>) {
        self.script.push_back(Scripted {
            pick: Pick::Slot(slot),
            status: TransferStatus::Completed,
            packet,
        });
    }

    /// Script a completion carrying an error status.
    pub fn push_status(&mut self, status: TransferStatus) {
        self.script.push_back(Scripted {
            pick: Pick::Fifo,
            status,
            packet: Vec::new(),
        });
    }

    /// Total submissions observed, initial round included.
    pub fn submissions(&self) -> usize {
        self.submissions
    }

    fn take_slot(&mut self, pick: Pick) -> SlotId {
        match pick {
            Pick::Fifo => self
                .fifo
                .pop_front()
                .expect("scripted completion with nothing outstanding"),
            Pick::Slot(index) => {
                let pos = self
                    .fifo
                    .iter()
                    .position(|s| s.index() == index)
                    .expect("scripted slot is not outstanding");
                self.fifo.remove(pos).unwrap()
            }
        }
    }

    fn complete(&mut self, slot: SlotId, status: TransferStatus, packet: &[u8]) -> Completion {
        let mut buffer = self.buffers[slot.index()]
            .take()
            .expect("completion for a slot without a lent buffer");
        assert!(
            packet.len() <= buffer.len(),
            "scripted packet larger than the slot buffer"
        );
        buffer[..packet.len()].copy_from_slice(packet);

        Completion {
            slot,
            buffer,
            status,
            len: packet.len(),
        }
    }
}

impl StreamBackend for MockBackend {
    fn submit(&mut self, slot: SlotId, buffer: Vec<u8>) -> Result<()> {
        if self.fail_submission_at == Some(self.submissions) {
            return Err(EngineError::Submission {
                slot: slot.index(),
                reason: "mock backend rejected submission".to_string(),
            });
        }
        self.submissions += 1;
        assert!(
            self.buffers[slot.index()].is_none(),
            "slot submitted while already in flight"
        );
        self.buffers[slot.index()] = Some(buffer);
        self.fifo.push_back(slot);
        Ok(())
    }

    fn wait(&mut self) -> Result<Completion> {
        if let Some(scripted) = self.script.pop_front() {
            let slot = self.take_slot(scripted.pick);
            let packet = scripted.packet.clone();
            return Ok(self.complete(slot, scripted.status, &packet));
        }

        // Script exhausted: simulate the operator stopping the stream, then
        // flush remaining slots with status-only packets.
        if let Some(flag) = self.stop_flag {
            flag.store(true, Ordering::Relaxed);
        }
        let slot = self
            .fifo
            .pop_front()
            .expect("wait() called with no outstanding requests and an empty script");
        let header = [0x01u8, 0x60];
        debug_assert_eq!(header.len(), STATUS_HEADER_LEN);
        Ok(self.complete(slot, TransferStatus::Completed, &header))
    }
}
