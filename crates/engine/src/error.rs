//! Engine error types
//!
//! Every variant here is fatal: the streamer terminates with a diagnostic
//! rather than retrying. Anything going wrong at this layer means either a
//! transport fault or a programming error, and continuing would risk
//! emitting silently reordered data.

use crate::event::TransferStatus;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    /// No attached device matches the configured identifier
    #[error("device {vendor_id:04x}:{product_id:04x} not found")]
    DeviceNotFound { vendor_id: u16, product_id: u16 },

    /// Open/reset/configure step failed
    #[error("initialization failed: {0}")]
    Initialization(String),

    /// Buffer or request-object allocation failed
    #[error("allocation failed: {0}")]
    Allocation(String),

    /// Backend rejected a request submission (initial or resubmission)
    #[error("submission failed for slot {slot}: {reason}")]
    Submission { slot: usize, reason: String },

    /// Backend reported a non-success completion status
    #[error("transfer for slot {slot} completed with status {status:?}")]
    TransferStatus { slot: usize, status: TransferStatus },

    /// A completion's sequence number did not equal the expected next value
    #[error("data arrival out of order: expected {expected} but got {got}")]
    OrderingViolation { expected: u64, got: u64 },

    /// Writing to the output stream failed
    #[error("output stream error: {0}")]
    Output(#[from] std::io::Error),
}

/// Type alias for engine results
pub type Result<T> = std::result::Result<T, EngineError>;
