//! Streamer configuration management

use anyhow::{Context, Result, anyhow};
use engine::STATUS_HEADER_LEN;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamerConfig {
    #[serde(default)]
    pub device: DeviceSettings,
    #[serde(default)]
    pub stream: StreamSettings,
}

/// Which device to stream from
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceSettings {
    /// USB vendor ID to match
    #[serde(default = "DeviceSettings::default_vendor_id")]
    pub vendor_id: u16,
    /// USB product ID to match
    #[serde(default = "DeviceSettings::default_product_id")]
    pub product_id: u16,
    /// Bulk IN endpoint address carrying the stream
    #[serde(default = "DeviceSettings::default_endpoint")]
    pub endpoint: u8,
}

impl Default for DeviceSettings {
    fn default() -> Self {
        Self {
            vendor_id: Self::default_vendor_id(),
            product_id: Self::default_product_id(),
            endpoint: Self::default_endpoint(),
        }
    }
}

impl DeviceSettings {
    fn default_vendor_id() -> u16 {
        0x0403 // FTDI
    }

    fn default_product_id() -> u16 {
        0x6014 // FT232H
    }

    fn default_endpoint() -> u8 {
        0x81 // EP1 IN
    }
}

/// Streaming engine parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamSettings {
    /// Buffer size per slot, in bytes
    #[serde(default = "StreamSettings::default_buffer_size")]
    pub buffer_size: usize,
    /// Number of parallel transfers kept in flight
    #[serde(default = "StreamSettings::default_slots")]
    pub slots: usize,
    /// FTDI latency timer in milliseconds (1-255, 0 = leave unchanged)
    #[serde(default = "StreamSettings::default_latency_timer_ms")]
    pub latency_timer_ms: u8,
    /// Fixed run duration in seconds (0 = run until Ctrl+C)
    #[serde(default)]
    pub run_seconds: u64,
    #[serde(default = "StreamSettings::default_log_level")]
    pub log_level: String,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            buffer_size: Self::default_buffer_size(),
            slots: Self::default_slots(),
            latency_timer_ms: Self::default_latency_timer_ms(),
            run_seconds: 0,
            log_level: Self::default_log_level(),
        }
    }
}

impl StreamSettings {
    fn default_buffer_size() -> usize {
        512
    }

    fn default_slots() -> usize {
        8
    }

    fn default_latency_timer_ms() -> u8 {
        255
    }

    fn default_log_level() -> String {
        "info".to_string()
    }
}

impl Default for StreamerConfig {
    fn default() -> Self {
        Self {
            device: DeviceSettings::default(),
            stream: StreamSettings::default(),
        }
    }
}

impl StreamerConfig {
    /// Load configuration from the specified path
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let config_path = if let Some(p) = path {
            p
        } else {
            let candidates = vec![
                Self::default_path(),
                PathBuf::from("/etc/usb-fifo-stream/config.toml"),
            ];

            candidates
                .into_iter()
                .find(|p| p.exists())
                .ok_or_else(|| anyhow!("No configuration file found, using defaults"))?
        };

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let config: StreamerConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;

        config.validate()?;

        tracing::info!("Loaded configuration from: {}", config_path.display());
        Ok(config)
    }

    /// Load configuration or return defaults if not found
    pub fn load_or_default() -> Self {
        match Self::load(None) {
            Ok(config) => config,
            Err(e) => {
                tracing::debug!("Falling back to default config: {}", e);
                Self::default()
            }
        }
    }

    /// Save configuration to the specified path
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize configuration")?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        tracing::info!("Saved configuration to: {}", path.display());
        Ok(())
    }

    /// Get the default configuration file path
    pub fn default_path() -> PathBuf {
        if let Some(config_dir) = dirs::config_dir() {
            config_dir.join("usb-fifo-stream").join("config.toml")
        } else {
            PathBuf::from(".config/usb-fifo-stream/config.toml")
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.stream.log_level.as_str()) {
            return Err(anyhow!(
                "Invalid log level '{}', must be one of: {}",
                self.stream.log_level,
                valid_levels.join(", ")
            ));
        }

        if self.stream.slots < 1 {
            return Err(anyhow!("slots must be at least 1"));
        }

        if self.stream.buffer_size <= STATUS_HEADER_LEN {
            return Err(anyhow!(
                "buffer_size must exceed the {}-byte status header",
                STATUS_HEADER_LEN
            ));
        }

        // Bit 7 set means IN endpoint (device to host)
        if self.device.endpoint & 0x80 == 0 {
            return Err(anyhow!(
                "endpoint {:#04x} is not an IN endpoint",
                self.device.endpoint
            ));
        }

        Ok(())
    }
}
