//! Engine configuration.

use serde::{Deserialize, Serialize};

/// Tunables for tick pacing. Keep this minimal; expand as needed
/// without breaking API.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Lower bound applied to every computed tick delay, in
    /// milliseconds. Guards against decoders reporting implausibly
    /// short frames.
    pub min_frame_delay_ms: u32,
    /// Substituted for frames whose decoder-reported duration is 0
    /// (zero-delay frames are common in GIF payloads).
    pub fallback_frame_duration_ms: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            min_frame_delay_ms: 1,
            fallback_frame_duration_ms: 100,
        }
    }
}
