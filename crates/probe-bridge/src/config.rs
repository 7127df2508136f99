//! Bridge limits.

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Payloads larger than this are dropped without parsing.
    pub max_payload_bytes: usize,
    pub event_buffer: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            max_payload_bytes: 64 * 1024,
            event_buffer: 64,
        }
    }
}
