//! Asynchronous libusb transfer backend
//!
//! Implements [`StreamBackend`] over the raw libusb bindings re-exported by
//! rusb. One `libusb_transfer` is allocated per slot; its completion
//! callback pushes a typed raw completion (slot index, status, length) onto
//! a single-threaded queue that [`StreamBackend::wait`] drains around
//! `libusb_handle_events`. The callback runs on the thread calling
//! `libusb_handle_events`, which is always the dispatcher's thread, so the
//! queue needs no locking.

use crate::usb::device::FtdiDevice;
use engine::{Completion, EngineError, Result, SlotId, StreamBackend, TransferStatus};
use rusb::ffi::{self, constants};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::os::raw::{c_int, c_void};
use std::time::Duration;
use tracing::warn;

/// What the libusb callback records for one finished transfer
struct RawCompletion {
    slot: usize,
    status: c_int,
    actual_length: c_int,
}

/// Per-slot callback context; lives behind a stable heap address for as
/// long as the backend exists.
struct CallbackContext {
    slot: usize,
    queue: *const RefCell<VecDeque<RawCompletion>>,
}

extern "system" fn transfer_callback(transfer: *mut ffi::libusb_transfer) {
    // SAFETY: libusb invokes this from libusb_handle_events on the
    // dispatcher's thread. user_data points at a CallbackContext whose
    // queue pointer targets a Box owned by the backend, both of which
    // outlive every submitted transfer.
    unsafe {
        let transfer = &*transfer;
        let ctx = &*(transfer.user_data as *const CallbackContext);
        (*ctx.queue).borrow_mut().push_back(RawCompletion {
            slot: ctx.slot,
            status: transfer.status,
            actual_length: transfer.actual_length,
        });
    }
}

/// Production backend: N overlapping bulk IN transfers on one endpoint
pub struct UsbStreamBackend {
    device: FtdiDevice,
    endpoint: u8,
    transfers: Vec<*mut ffi::libusb_transfer>,
    contexts: Vec<Box<CallbackContext>>,
    /// Buffers lent by the engine, held while their transfer is in flight
    in_flight: Vec<Option<Vec<u8>>>,
    /// Completions recorded by the callback, drained by `wait`
    completions: Box<RefCell<VecDeque<RawCompletion>>>,
    outstanding: usize,
}

impl UsbStreamBackend {
    /// Allocate one transfer object per slot.
    pub fn new(device: FtdiDevice, endpoint: u8, slots: usize) -> Result<Self> {
        let completions: Box<RefCell<VecDeque<RawCompletion>>> =
            Box::new(RefCell::new(VecDeque::with_capacity(slots)));
        let queue = &*completions as *const RefCell<VecDeque<RawCompletion>>;

        let mut transfers = Vec::with_capacity(slots);
        let mut contexts = Vec::with_capacity(slots);
        for slot in 0..slots {
            // SAFETY: 0 iso packets; freed in Drop.
            let transfer = unsafe { ffi::libusb_alloc_transfer(0) };
            if transfer.is_null() {
                for &t in &transfers {
                    // SAFETY: allocated just above, never submitted.
                    unsafe { ffi::libusb_free_transfer(t) };
                }
                return Err(EngineError::Allocation(format!(
                    "libusb_alloc_transfer failed for slot {}",
                    slot
                )));
            }
            transfers.push(transfer);
            contexts.push(Box::new(CallbackContext { slot, queue }));
        }

        Ok(Self {
            device,
            endpoint,
            transfers,
            contexts,
            in_flight: (0..slots).map(|_| None).collect(),
            completions,
            outstanding: 0,
        })
    }
}

impl StreamBackend for UsbStreamBackend {
    fn submit(&mut self, slot: SlotId, mut buffer: Vec<u8>) -> Result<()> {
        let index = slot.index();
        let length = buffer.len() as c_int;
        let data = buffer.as_mut_ptr();
        self.in_flight[index] = Some(buffer);

        let transfer = self.transfers[index];
        // SAFETY: transfer was allocated in new() and is not in flight
        // (the engine never double-submits a slot). The buffer pointer
        // stays valid until the completion hands the Vec back, because the
        // Vec is parked in in_flight until then.
        unsafe {
            let t = &mut *transfer;
            t.dev_handle = self.device.handle_ptr();
            t.flags = 0;
            t.endpoint = self.endpoint;
            t.transfer_type = constants::LIBUSB_TRANSFER_TYPE_BULK;
            t.timeout = 0; // no per-request timeout; wait indefinitely
            t.buffer = data;
            t.length = length;
            t.num_iso_packets = 0;
            t.callback = transfer_callback;
            t.user_data = self.contexts[index].as_ref() as *const CallbackContext as *mut c_void;

            let rc = ffi::libusb_submit_transfer(transfer);
            if rc != constants::LIBUSB_SUCCESS {
                self.in_flight[index] = None;
                return Err(EngineError::Submission {
                    slot: index,
                    reason: format!("libusb_submit_transfer returned {}", rc),
                });
            }
        }

        self.outstanding += 1;
        Ok(())
    }

    fn wait(&mut self) -> Result<Completion> {
        loop {
            if let Some(raw) = self.completions.borrow_mut().pop_front() {
                self.outstanding -= 1;
                let buffer = self.in_flight[raw.slot]
                    .take()
                    .expect("completion for a slot whose buffer was not lent");
                return Ok(Completion {
                    slot: SlotId(raw.slot),
                    buffer,
                    status: map_transfer_status(raw.status),
                    len: raw.actual_length.max(0) as usize,
                });
            }

            // SAFETY: the context stays alive for the lifetime of the device.
            let rc = unsafe { ffi::libusb_handle_events(self.device.context_ptr()) };
            if rc != constants::LIBUSB_SUCCESS {
                // Transient event-loop hiccups (e.g. EINTR) are retried;
                // a dead device surfaces through the transfer status.
                warn!("libusb_handle_events returned {}", rc);
                std::thread::sleep(Duration::from_millis(100));
            }
        }
    }
}

impl Drop for UsbStreamBackend {
    fn drop(&mut self) {
        // Cancel anything still in flight and wait for the cancellations to
        // land, so libusb never touches a freed transfer or buffer. On the
        // fatal-error paths this is what bounds the teardown.
        unsafe {
            for (slot, lent) in self.in_flight.iter().enumerate() {
                if lent.is_some() {
                    ffi::libusb_cancel_transfer(self.transfers[slot]);
                }
            }

            while self.outstanding > 0 {
                if ffi::libusb_handle_events(self.device.context_ptr())
                    != constants::LIBUSB_SUCCESS
                {
                    break;
                }
                let mut queue = self.completions.borrow_mut();
                while let Some(raw) = queue.pop_front() {
                    self.in_flight[raw.slot] = None;
                    self.outstanding -= 1;
                }
            }

            for &transfer in &self.transfers {
                ffi::libusb_free_transfer(transfer);
            }
        }
    }
}

/// Map a raw libusb transfer status to the engine's typed status
fn map_transfer_status(status: c_int) -> TransferStatus {
    match status {
        constants::LIBUSB_TRANSFER_COMPLETED => TransferStatus::Completed,
        constants::LIBUSB_TRANSFER_TIMED_OUT => TransferStatus::TimedOut,
        constants::LIBUSB_TRANSFER_CANCELLED => TransferStatus::Cancelled,
        constants::LIBUSB_TRANSFER_STALL => TransferStatus::Stall,
        constants::LIBUSB_TRANSFER_NO_DEVICE => TransferStatus::NoDevice,
        constants::LIBUSB_TRANSFER_OVERFLOW => TransferStatus::Overflow,
        _ => TransferStatus::Error,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_transfer_status() {
        assert_eq!(
            map_transfer_status(constants::LIBUSB_TRANSFER_COMPLETED),
            TransferStatus::Completed
        );
        assert_eq!(
            map_transfer_status(constants::LIBUSB_TRANSFER_CANCELLED),
            TransferStatus::Cancelled
        );
        assert_eq!(
            map_transfer_status(constants::LIBUSB_TRANSFER_NO_DEVICE),
            TransferStatus::NoDevice
        );
        assert_eq!(
            map_transfer_status(constants::LIBUSB_TRANSFER_ERROR),
            TransferStatus::Error
        );
        // Anything unrecognised is still an error.
        assert_eq!(map_transfer_status(42), TransferStatus::Error);
    }
}
