//! Backend abstraction for asynchronous read requests
//!
//! The engine never talks to libusb directly; it drives whatever implements
//! [`StreamBackend`]. The production implementation lives in the streamer
//! binary (built on `rusb::ffi`), and a scripted mock for tests lives in
//! [`crate::test_utils`].

use crate::error::Result;
use crate::event::{Completion, SlotId};

/// An asynchronous I/O facility that can keep several read requests in
/// flight at once.
///
/// The contract the engine relies on:
/// - `submit` hands the buffer to the backend for the lifetime of the
///   request; the backend alone writes into it until the matching
///   completion returns it.
/// - `wait` blocks indefinitely until one completion is available and
///   delivers completions strictly in the order the transport finished
///   them. One call, one completion; completion handling happens on the
///   caller's thread between `wait` calls, so no completion logic ever
///   runs concurrently.
pub trait StreamBackend {
    /// Submit a read request for `slot`, lending `buffer` to the backend.
    fn submit(&mut self, slot: SlotId, buffer: Vec<u8>) -> Result<()>;

    /// Block until the next outstanding request finishes.
    fn wait(&mut self) -> Result<Completion>;
}
