//! Streaming engine for usb-fifo-stream
//!
//! This crate implements the backend-agnostic core of the streamer: a fixed
//! pool of outstanding read requests, a completion-driven resubmission loop,
//! and a strict ordering validator. The actual I/O facility (libusb in
//! production, a scripted mock in tests) is abstracted behind the
//! [`StreamBackend`] trait, which delivers typed completion events instead
//! of opaque callback pointers.

pub mod backend;
pub mod dispatch;
pub mod error;
pub mod event;
pub mod pool;
pub mod sequencer;
pub mod sink;
pub mod stop;
pub mod test_utils;

pub use backend::StreamBackend;
pub use dispatch::StreamEngine;
pub use error::{EngineError, Result};
pub use event::{Completion, SlotId, TransferStatus};
pub use pool::SlotPool;
pub use sequencer::Sequencer;
pub use sink::{OutputSink, STATUS_HEADER_LEN};
pub use stop::{RunState, StopCondition};
