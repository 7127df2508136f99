//! Application configuration.
//!
//! Every section has defaults, so a partial YAML file (or none at all) yields
//! a working setup.

use capture_engine::EngineConfig;
use probe_bridge::BridgeConfig;
use probe_runtime::ProbeConfig;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub engine: EngineConfig,
    pub bridge: BridgeConfig,
    pub probe: ProbeConfig,
    pub host: HostConfig,
}

/// Host-owned settings; the capture core reads them but never changes them.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Where the embedded browsing context starts.
    pub login_url: String,
    /// Client identification string presented by the browsing context.
    pub user_agent: String,
    /// Keep provider cookies between sessions.
    pub persist_cookies: bool,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            login_url: "https://x.com/i/flow/login".to_string(),
            user_agent: format!("sessioncap/{}", env!("CARGO_PKG_VERSION")),
            persist_cookies: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_yaml_keeps_other_defaults() {
        let raw = "engine:\n  username_wait_ms: 250\nhost:\n  persist_cookies: false\n";
        let config: AppConfig = serde_yaml::from_str(raw).unwrap();
        assert_eq!(config.engine.username_wait_ms, 250);
        assert_eq!(config.engine.landing_path, "/home");
        assert!(!config.host.persist_cookies);
        assert_eq!(config.host.login_url, "https://x.com/i/flow/login");
        assert_eq!(config.probe.retry.max_attempts, 10);
    }

    #[test]
    fn empty_document_is_default() {
        let config: AppConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config.bridge.max_payload_bytes, BridgeConfig::default().max_payload_bytes);
    }
}
