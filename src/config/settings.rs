use std::time::Duration;

use serde::Deserialize;

use crate::emitter::EmitterConfig;
use crate::emitter::http::DEFAULT_EMITTER_ADDRESS;
use crate::listener::DEFAULT_DISCOVERY_ADDRESS;

/// Top-level process settings.
///
/// Library code never reads these on its own; the binary loads them and
/// builds `ListenerConfig` / `EmitterConfig` values from them.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct Settings {
    pub discovery: DiscoverySettings,
    pub emitter: EmitterSettings,
    pub logging: LoggingSettings,
}

/// Where the discovery service lives and how long to wait on it.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct DiscoverySettings {
    pub addresses: Vec<String>,
    pub request_timeout_secs: u64,
}

impl DiscoverySettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// First configured address, which provisioning is performed against.
    pub fn primary_address(&self) -> &str {
        self.addresses
            .first()
            .map(String::as_str)
            .unwrap_or(DEFAULT_DISCOVERY_ADDRESS)
    }
}

/// Broker used to publish replies.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct EmitterSettings {
    pub address: String,
    pub request_timeout_secs: u64,
}

impl From<&EmitterSettings> for EmitterConfig {
    fn from(settings: &EmitterSettings) -> Self {
        EmitterConfig {
            address: settings.address.clone(),
            request_timeout: Duration::from_secs(settings.request_timeout_secs),
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct LoggingSettings {
    pub level: String,
}

/// Partial configuration settings loaded from files or environment.
///
/// Missing values are filled from `Settings::default()`.
#[derive(Debug, Deserialize)]
pub struct PartialSettings {
    pub discovery: Option<PartialDiscoverySettings>,
    pub emitter: Option<PartialEmitterSettings>,
    pub logging: Option<PartialLoggingSettings>,
}

#[derive(Debug, Deserialize)]
pub struct PartialDiscoverySettings {
    pub addresses: Option<Vec<String>>,
    pub request_timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct PartialEmitterSettings {
    pub address: Option<String>,
    pub request_timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct PartialLoggingSettings {
    pub level: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            discovery: DiscoverySettings {
                addresses: vec![DEFAULT_DISCOVERY_ADDRESS.to_string()],
                request_timeout_secs: 10,
            },
            emitter: EmitterSettings {
                address: DEFAULT_EMITTER_ADDRESS.to_string(),
                request_timeout_secs: 10,
            },
            logging: LoggingSettings {
                level: "info".to_string(),
            },
        }
    }
}
