//! usb-fifo-stream
//!
//! Streams data from an FT232H asynchronous FIFO to stdout as one ordered
//! byte stream, keeping the USB pipe saturated with a pool of overlapping
//! bulk IN transfers. Diagnostics go to stderr; any reordering or transport
//! fault is fatal. Exit code 0 means a clean, fully drained shutdown.

mod config;
mod logging;
mod usb;

use anyhow::{Context, Result};
use clap::Parser;
use config::StreamerConfig;
use engine::{OutputSink, StopCondition, StreamEngine};
use logging::setup_logging;
use nix::sys::signal::{self, SigHandler, Signal};
use std::os::raw::c_int;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::info;
use usb::{FtdiDevice, UsbStreamBackend};

#[derive(Parser, Debug)]
#[command(name = "usb-fifo-stream")]
#[command(
    author,
    version,
    about = "Stream an FT232H async FIFO to stdout with overlapping USB transfers"
)]
#[command(long_about = "
Streams data continuously from an FT232H in asynchronous FIFO mode to
stdout, using several outstanding bulk transfers to avoid throughput gaps.
Completions must arrive in submission order; any reordering aborts the
stream rather than emitting corrupted data.

EXAMPLES:
    # Stream until Ctrl+C, raw bytes on stdout
    usb-fifo-stream > capture.bin

    # Stream for ten seconds with 16 transfers of 4 KiB each
    usb-fifo-stream --run-seconds 10 --slots 16 --buffer-size 4096 > capture.bin

CONFIGURATION:
    The streamer looks for configuration files in the following order:
    1. Path specified with --config
    2. ~/.config/usb-fifo-stream/config.toml
    3. /etc/usb-fifo-stream/config.toml
    4. Built-in defaults
")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, value_name = "PATH")]
    config: Option<std::path::PathBuf>,

    /// Save default configuration to default location and exit
    #[arg(long)]
    save_config: bool,

    /// Number of parallel transfers kept in flight
    #[arg(long, value_name = "N")]
    slots: Option<usize>,

    /// Buffer size per transfer, in bytes
    #[arg(long, value_name = "BYTES")]
    buffer_size: Option<usize>,

    /// FTDI latency timer in milliseconds (1-255, 0 = leave unchanged)
    #[arg(long, value_name = "MS")]
    latency: Option<u8>,

    /// Stop after this many seconds instead of waiting for Ctrl+C
    #[arg(long, value_name = "SECONDS")]
    run_seconds: Option<u64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, value_name = "LEVEL")]
    log_level: Option<String>,
}

/// Raised by the SIGINT handler, observed by the engine's stop condition
static INTERRUPTED: AtomicBool = AtomicBool::new(false);

extern "C" fn handle_sigint(_signal: c_int) {
    INTERRUPTED.store(true, Ordering::Relaxed);
}

fn main() -> Result<()> {
    let args = Args::parse();

    if args.save_config {
        let config = StreamerConfig::default();
        let path = StreamerConfig::default_path();
        config.save(&path).context("Failed to save configuration")?;
        println!("Configuration saved to: {}", path.display());
        return Ok(());
    }

    let mut config = if let Some(ref path) = args.config {
        StreamerConfig::load(Some(path.clone())).context("Failed to load configuration")?
    } else {
        StreamerConfig::load_or_default()
    };

    // CLI flags override the config file
    if let Some(slots) = args.slots {
        config.stream.slots = slots;
    }
    if let Some(buffer_size) = args.buffer_size {
        config.stream.buffer_size = buffer_size;
    }
    if let Some(latency) = args.latency {
        config.stream.latency_timer_ms = latency;
    }
    if let Some(run_seconds) = args.run_seconds {
        config.stream.run_seconds = run_seconds;
    }
    if let Some(ref level) = args.log_level {
        config.stream.log_level = level.clone();
    }
    config.validate()?;

    setup_logging(&config.stream.log_level).context("Failed to setup logging")?;

    info!("usb-fifo-stream v{}", env!("CARGO_PKG_VERSION"));
    info!(
        "device {:04x}:{:04x}, endpoint {:#04x}, {} transfers of {} bytes",
        config.device.vendor_id,
        config.device.product_id,
        config.device.endpoint,
        config.stream.slots,
        config.stream.buffer_size
    );

    let stop = if config.stream.run_seconds > 0 {
        info!("running for {} seconds", config.stream.run_seconds);
        StopCondition::Duration(Duration::from_secs(config.stream.run_seconds))
    } else {
        // SAFETY: the handler only performs a single atomic store, which is
        // async-signal-safe.
        unsafe { signal::signal(Signal::SIGINT, SigHandler::Handler(handle_sigint)) }
            .context("Failed to register SIGINT handler")?;
        info!("running until Ctrl+C");
        StopCondition::Signal(&INTERRUPTED)
    };

    let mut device = FtdiDevice::open(config.device.vendor_id, config.device.product_id)?;
    device.reset()?;
    if config.stream.latency_timer_ms > 0 {
        device.set_latency_timer(config.stream.latency_timer_ms)?;
    }

    let backend = UsbStreamBackend::new(device, config.device.endpoint, config.stream.slots)?;
    let sink = OutputSink::new(std::io::stdout().lock());
    let mut engine = StreamEngine::new(
        backend,
        sink,
        stop,
        config.stream.slots,
        config.stream.buffer_size,
    );

    engine.run()?;

    info!("clean shutdown");
    Ok(())
}
