//! USB subsystem
//!
//! Device discovery and pre-stream configuration over rusb, plus the
//! asynchronous-transfer backend built on the raw libusb bindings that
//! rusb re-exports. Everything here runs on the dispatcher's thread.

pub mod backend;
pub mod device;

pub use backend::UsbStreamBackend;
pub use device::FtdiDevice;
