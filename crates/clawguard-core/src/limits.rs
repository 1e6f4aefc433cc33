//! Ingest and transport resource limits.
//!
//! Every knob is clamped into a fixed range so that a hostile or
//! misconfigured caller cannot disable the caps entirely. The clamp
//! ranges are part of the external contract and must not change
//! without a version bump.

use serde::{Deserialize, Serialize};

/// Resource limits applied during ingest and transport.
///
/// Construct via [`Limits::default`] and override with the `with_*`
/// builders, which clamp into the documented ranges.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Limits {
    /// Transport timeout in milliseconds. Clamped to 1_000..=60_000.
    pub timeout_ms: u64,

    /// Transport retry attempts after the first failure. Clamped to 0..=5.
    pub retries: u32,

    /// Maximum files loaded and maximum manifest entries. Clamped to 1..=2_000.
    pub max_files: usize,

    /// Aggregate cap on loaded text bytes. Clamped to 10_000..=200_000_000.
    pub max_total_bytes: u64,

    /// Per-file cap on loaded text bytes.
    pub max_file_bytes: u64,

    /// Cap on the raw archive (or remote body) size. Clamped to 50_000..=200_000_000.
    pub max_zip_bytes: u64,

    /// Per-entry cap on uncompressed archive bytes. Clamped to 1_000..=50_000_000.
    pub max_zip_entry_bytes: u64,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            timeout_ms: 12_000,
            retries: 2,
            max_files: 200,
            max_total_bytes: 5_000_000,
            max_file_bytes: 1_000_000,
            max_zip_bytes: 25_000_000,
            max_zip_entry_bytes: 1_000_000,
        }
    }
}

impl Limits {
    pub fn with_timeout_ms(mut self, v: u64) -> Self {
        self.timeout_ms = v.clamp(1_000, 60_000);
        self
    }

    pub fn with_retries(mut self, v: u32) -> Self {
        self.retries = v.clamp(0, 5);
        self
    }

    pub fn with_max_files(mut self, v: usize) -> Self {
        self.max_files = v.clamp(1, 2_000);
        self
    }

    pub fn with_max_total_bytes(mut self, v: u64) -> Self {
        self.max_total_bytes = v.clamp(10_000, 200_000_000);
        self
    }

    pub fn with_max_file_bytes(mut self, v: u64) -> Self {
        self.max_file_bytes = v;
        self
    }

    pub fn with_max_zip_bytes(mut self, v: u64) -> Self {
        self.max_zip_bytes = v.clamp(50_000, 200_000_000);
        self
    }

    pub fn with_max_zip_entry_bytes(mut self, v: u64) -> Self {
        self.max_zip_entry_bytes = v.clamp(1_000, 50_000_000);
        self
    }
}
