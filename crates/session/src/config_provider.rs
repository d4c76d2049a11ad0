//! Service-specific session configuration.
//!
//! After payments clear, admission asks the service to build the config
//! the consumer needs to reach the data plane (ports, keys, NAT traversal
//! hints). The shape is service-specific and opaque to the session core.

use serde::{Deserialize, Serialize};

/// NAT traversal hints included when the provider sits behind a NAT whose
/// port mapping failed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraversalParams {
    pub provider_port: u16,
    pub consumer_port: u16,
    pub consumer_public_ip: String,
    pub port_mapping_key: String,
}

/// What a service hands back for a new session.
pub struct ConfigParams {
    /// Opaque config forwarded to the consumer in the session response.
    pub session_config: serde_json::Value,
    /// Hook run when the session is destroyed.
    pub destroy_callback: Option<Box<dyn FnOnce() + Send>>,
    /// Present only when hole punching is required.
    pub traversal: Option<TraversalParams>,
}

impl ConfigParams {
    pub fn new(session_config: serde_json::Value) -> Self {
        Self {
            session_config,
            destroy_callback: None,
            traversal: None,
        }
    }
}

/// Builds the per-session service config from the consumer's opaque
/// request bytes.
pub trait ConfigProvider: Send + Sync {
    fn provide(&self, request: &[u8]) -> Result<ConfigParams, String>;
}

/// Provider returning a fixed config; enough for services whose data plane
/// needs no per-session negotiation.
pub struct StaticConfigProvider {
    config: serde_json::Value,
}

impl StaticConfigProvider {
    pub fn new(config: serde_json::Value) -> Self {
        Self { config }
    }
}

impl ConfigProvider for StaticConfigProvider {
    fn provide(&self, _request: &[u8]) -> Result<ConfigParams, String> {
        Ok(ConfigParams::new(self.config.clone()))
    }
}
