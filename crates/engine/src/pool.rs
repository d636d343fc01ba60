//! Slot pool bookkeeping
//!
//! Tracks per-slot sequence numbers and which slots are currently lent to
//! the backend. The pool is sized once at startup from configuration; slot
//! *i* starts at sequence *i* and advances by +N each time it is
//! resubmitted, so the set of all slot sequences enumerates 0, 1, 2, ...
//! in round-robin order.

use crate::event::SlotId;

/// One outstanding asynchronous read request
#[derive(Debug)]
struct Slot {
    /// Logical position of this slot's next completion in the output order
    sequence: u64,
    /// Whether the backend currently holds this slot's buffer
    in_flight: bool,
}

/// Fixed pool of N slots, maintained fully in flight while running
#[derive(Debug)]
pub struct SlotPool {
    slots: Vec<Slot>,
    outstanding: usize,
    buffer_size: usize,
}

impl SlotPool {
    /// Create a pool of `count` slots with `buffer_size`-byte buffers.
    pub fn new(count: usize, buffer_size: usize) -> Self {
        debug_assert!(count >= 1);
        let slots = (0..count)
            .map(|i| Slot {
                sequence: i as u64,
                in_flight: false,
            })
            .collect();

        Self {
            slots,
            outstanding: 0,
            buffer_size,
        }
    }

    /// Number of slots in the pool
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// True if the pool has no slots (never the case after construction)
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Number of requests currently lent to the backend
    pub fn outstanding(&self) -> usize {
        self.outstanding
    }

    /// Allocate a fresh buffer for a submission
    pub fn make_buffer(&self) -> Vec<u8> {
        vec![0u8; self.buffer_size]
    }

    /// Sequence number of `slot`'s outstanding (or next) completion
    pub fn sequence(&self, slot: SlotId) -> u64 {
        self.slots[slot.index()].sequence
    }

    /// Record that `slot`'s request was handed to the backend
    pub fn mark_submitted(&mut self, slot: SlotId) {
        let s = &mut self.slots[slot.index()];
        debug_assert!(!s.in_flight, "slot {} submitted twice", slot);
        s.in_flight = true;
        self.outstanding += 1;
    }

    /// Advance `slot`'s sequence past the other N-1 slots for resubmission
    pub fn advance(&mut self, slot: SlotId) {
        let n = self.slots.len() as u64;
        let s = &mut self.slots[slot.index()];
        s.sequence += n;
        s.in_flight = false;
        self.outstanding -= 1;
    }

    /// Release `slot` without resubmission (shutdown drain)
    pub fn release(&mut self, slot: SlotId) {
        let s = &mut self.slots[slot.index()];
        debug_assert!(s.in_flight, "slot {} released while idle", slot);
        s.in_flight = false;
        self.outstanding -= 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_sequences_match_indices() {
        let pool = SlotPool::new(8, 512);
        for i in 0..8 {
            assert_eq!(pool.sequence(SlotId(i)), i as u64);
        }
    }

    #[test]
    fn test_round_robin_invariant() {
        // After its k-th completion, slot i must sit at sequence i + k*N.
        let n = 5;
        let mut pool = SlotPool::new(n, 64);

        for k in 1..=10u64 {
            for i in 0..n {
                pool.mark_submitted(SlotId(i));
                pool.advance(SlotId(i));
                assert_eq!(pool.sequence(SlotId(i)), i as u64 + k * n as u64);
            }
        }
    }

    #[test]
    fn test_outstanding_tracking() {
        let mut pool = SlotPool::new(3, 16);
        assert_eq!(pool.outstanding(), 0);

        pool.mark_submitted(SlotId(0));
        pool.mark_submitted(SlotId(1));
        pool.mark_submitted(SlotId(2));
        assert_eq!(pool.outstanding(), 3);

        pool.release(SlotId(1));
        assert_eq!(pool.outstanding(), 2);

        pool.advance(SlotId(0));
        assert_eq!(pool.outstanding(), 1);
    }

    #[test]
    fn test_buffer_size() {
        let pool = SlotPool::new(1, 512);
        assert_eq!(pool.make_buffer().len(), 512);
    }

    #[test]
    fn test_single_slot_pool() {
        let mut pool = SlotPool::new(1, 8);
        pool.mark_submitted(SlotId(0));
        pool.advance(SlotId(0));
        assert_eq!(pool.sequence(SlotId(0)), 1);
    }
}
