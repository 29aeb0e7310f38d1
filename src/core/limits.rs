//! Purpose: Hold the configurable byte ceilings and the outbound timeout.
//! Exports: `Limits` plus the default constants.
//! Invariants: Ceilings are inclusive; "at the limit" passes, one byte over fails.

use std::time::Duration;

/// Ceiling for directly uploaded payloads. Remote downloads are not capped.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 6 * 1024 * 1024;

/// Ceiling for the serialized response body, checked once after assembly.
pub const DEFAULT_MAX_RESPONSE_BYTES: usize = 6 * 1024 * 1024;

pub const DEFAULT_DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone, Copy, Debug)]
pub struct Limits {
    pub max_upload_bytes: usize,
    pub max_response_bytes: usize,
    pub download_timeout: Duration,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            max_response_bytes: DEFAULT_MAX_RESPONSE_BYTES,
            download_timeout: DEFAULT_DOWNLOAD_TIMEOUT,
        }
    }
}
