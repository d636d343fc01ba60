//! Completion events and slot identifiers

/// Index of a slot in the pool (0..N-1)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotId(pub usize);

impl SlotId {
    /// Get the raw slot index
    pub fn index(self) -> usize {
        self.0
    }
}

impl std::fmt::Display for SlotId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Completion status of an asynchronous transfer
///
/// Mirrors the transfer statuses a libusb-style backend can report. Only
/// `Completed` carries data; everything else is fatal to the stream, with
/// the single exception of `Cancelled` observed while draining.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferStatus {
    /// Transfer completed without error
    Completed,
    /// Transfer failed
    Error,
    /// Transfer timed out
    TimedOut,
    /// Transfer was cancelled
    Cancelled,
    /// Endpoint stalled
    Stall,
    /// Device was disconnected
    NoDevice,
    /// Device sent more data than requested
    Overflow,
}

/// Result of one outstanding request, consumed immediately by the dispatcher
///
/// Ownership of the buffer reverts from the backend to the engine through
/// this event; `buffer[..len]` holds the bytes the device delivered
/// (status header included) when `status` is [`TransferStatus::Completed`].
#[derive(Debug)]
pub struct Completion {
    /// Slot whose request finished
    pub slot: SlotId,
    /// Buffer lent to the backend at submission time
    pub buffer: Vec<u8>,
    /// Backend-reported status
    pub status: TransferStatus,
    /// Number of valid bytes in `buffer`
    pub len: usize,
}
