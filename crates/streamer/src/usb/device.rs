//! FTDI device discovery and configuration
//!
//! Finds the configured VID:PID on the bus, opens it, takes the streaming
//! interface away from the kernel driver, and issues the vendor control
//! transfers (reset, latency timer) that precede streaming.

use engine::{EngineError, Result};
use rusb::{Context, DeviceHandle, UsbContext};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Timeout for the one-time control transfers
const CONTROL_TIMEOUT: Duration = Duration::from_millis(100);

/// Vendor OUT request type (host to device)
const REQUEST_TYPE_VENDOR_OUT: u8 = 0x40;
/// FTDI SIO reset request
const SIO_RESET_REQUEST: u8 = 0x00;
/// FTDI SIO latency timer request
const SIO_SET_LATENCY_TIMER_REQUEST: u8 = 0x09;

/// Interface carrying the FIFO endpoint
const STREAM_INTERFACE: u8 = 0;

/// An opened FT232H-style device with the streaming interface claimed
pub struct FtdiDevice {
    context: Context,
    handle: DeviceHandle<Context>,
    kernel_driver_detached: bool,
}

impl FtdiDevice {
    /// Find and open the first device matching `vendor_id:product_id`.
    ///
    /// Detaches the kernel driver (ftdi_sio typically owns the port) and
    /// claims the streaming interface.
    pub fn open(vendor_id: u16, product_id: u16) -> Result<Self> {
        let context = Context::new()
            .map_err(|e| EngineError::Initialization(format!("libusb init failed: {}", e)))?;

        let devices = context
            .devices()
            .map_err(|e| EngineError::Initialization(format!("device enumeration failed: {}", e)))?;
        debug!(count = devices.len(), "enumerated USB devices");

        let mut found = None;
        for device in devices.iter() {
            let descriptor = device.device_descriptor().map_err(|e| {
                EngineError::Initialization(format!("reading device descriptor failed: {}", e))
            })?;

            if descriptor.vendor_id() == vendor_id && descriptor.product_id() == product_id {
                found = Some(device);
                break;
            }
        }

        let device = found.ok_or(EngineError::DeviceNotFound {
            vendor_id,
            product_id,
        })?;

        let mut handle = device
            .open()
            .map_err(|e| EngineError::Initialization(format!("opening device failed: {}", e)))?;
        info!(
            "opened device {:04x}:{:04x} (bus {:03} addr {:03})",
            vendor_id,
            product_id,
            device.bus_number(),
            device.address()
        );

        let mut kernel_driver_detached = false;
        match handle.kernel_driver_active(STREAM_INTERFACE) {
            Ok(true) => {
                handle.detach_kernel_driver(STREAM_INTERFACE).map_err(|e| {
                    EngineError::Initialization(format!("detaching kernel driver failed: {}", e))
                })?;
                debug!("detached kernel driver from interface {}", STREAM_INTERFACE);
                kernel_driver_detached = true;
            }
            Ok(false) => {}
            Err(e) => {
                debug!("could not check kernel driver status: {}", e);
            }
        }

        handle.claim_interface(STREAM_INTERFACE).map_err(|e| {
            EngineError::Initialization(format!(
                "claiming interface {} failed: {}",
                STREAM_INTERFACE, e
            ))
        })?;

        Ok(Self {
            context,
            handle,
            kernel_driver_detached,
        })
    }

    /// Issue the SIO reset request, returning the chip to a known state.
    pub fn reset(&mut self) -> Result<()> {
        self.handle
            .write_control(
                REQUEST_TYPE_VENDOR_OUT,
                SIO_RESET_REQUEST,
                0x0000,
                0x0000,
                &[],
                CONTROL_TIMEOUT,
            )
            .map_err(|e| EngineError::Initialization(format!("device reset failed: {}", e)))?;
        info!("device reset");
        Ok(())
    }

    /// Set the latency timer, which bounds how long the chip sits on a
    /// partially filled buffer before flushing it to the host.
    ///
    /// `ms` must be 1-255; callers pass 0 by skipping the call entirely.
    pub fn set_latency_timer(&mut self, ms: u8) -> Result<()> {
        self.handle
            .write_control(
                REQUEST_TYPE_VENDOR_OUT,
                SIO_SET_LATENCY_TIMER_REQUEST,
                u16::from(ms),
                0x0000,
                &[],
                CONTROL_TIMEOUT,
            )
            .map_err(|e| {
                EngineError::Initialization(format!("setting latency timer failed: {}", e))
            })?;
        info!("latency timer set to {}ms", ms);
        Ok(())
    }

    /// Raw handle pointer for asynchronous transfer submission
    pub(crate) fn handle_ptr(&self) -> *mut rusb::ffi::libusb_device_handle {
        self.handle.as_raw()
    }

    /// Raw context pointer for the event loop
    pub(crate) fn context_ptr(&self) -> *mut rusb::ffi::libusb_context {
        self.context.as_raw()
    }
}

impl Drop for FtdiDevice {
    fn drop(&mut self) {
        if let Err(e) = self.handle.release_interface(STREAM_INTERFACE) {
            warn!("failed to release interface {}: {}", STREAM_INTERFACE, e);
        }

        if self.kernel_driver_detached {
            // Hand the port back to the kernel driver.
            if let Err(e) = self.handle.attach_kernel_driver(STREAM_INTERFACE) {
                debug!("could not reattach kernel driver: {}", e);
            }
        }
    }
}
