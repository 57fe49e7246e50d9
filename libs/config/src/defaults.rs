//! Default values shared by the configuration loader and the device

/// Request arena capacity
pub const MAX_REQUESTS: usize = 4096;

/// Progress loop poll interval (microseconds)
pub const PROGRESS_POLL_US: u64 = 200;

/// Time finalize spends draining outstanding requests (milliseconds)
pub const FINALIZE_TIMEOUT_MS: u64 = 2_000;

pub const LOG_LEVEL: &str = "info";

/// Prefix of environment overrides, e.g. `PSP_DEVICE__MAX_REQUESTS`
pub const ENV_PREFIX: &str = "PSP";
