//! # Device Configuration
//!
//! Configuration for the point-to-point device: request arena capacity,
//! progress polling and finalize timing, plus logging settings for binaries.
//!
//! ## Usage
//!
//! ```rust
//! use device_config::DeviceConfig;
//!
//! let config = DeviceConfig::from_toml_str("[device]\nmax_requests = 32\n").unwrap();
//! assert_eq!(config.device.max_requests, 32);
//! ```

pub mod defaults;
pub mod device_config;

pub use device_config::{DeviceConfig, DeviceSettings, LoggingSettings};
