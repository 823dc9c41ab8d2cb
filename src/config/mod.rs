//! The `config` module loads process settings for the `nsq-bus` binary.
//!
//! Sources, later ones winning:
//! 1. built-in defaults
//! 2. `config/default.{toml,yaml,json,...}` (optional)
//! 3. `NSQ_BUS__<SECTION>__<KEY>` environment variables, e.g.
//!    `NSQ_BUS__DISCOVERY__ADDRESSES=disc-a:4161,disc-b:4161`

mod settings;

use config::{Config, ConfigError, Environment, File};

use settings::PartialSettings;

pub use settings::{DiscoverySettings, EmitterSettings, LoggingSettings, Settings};

/// Loads the configuration from the default file and environment variables,
/// merged over `Settings::default()`.
pub fn load_config() -> Result<Settings, ConfigError> {
    let builder = Config::builder()
        .add_source(File::with_name("config/default").required(false))
        .add_source(
            Environment::with_prefix("NSQ_BUS")
                .prefix_separator("__")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("discovery.addresses")
                .try_parsing(true),
        );

    let config = builder.build()?;
    let partial: PartialSettings = config.try_deserialize()?;
    let default = Settings::default();

    Ok(Settings {
        discovery: DiscoverySettings {
            addresses: partial
                .discovery
                .as_ref()
                .and_then(|d| d.addresses.clone())
                .filter(|a| !a.is_empty())
                .unwrap_or(default.discovery.addresses),
            request_timeout_secs: partial
                .discovery
                .as_ref()
                .and_then(|d| d.request_timeout_secs)
                .unwrap_or(default.discovery.request_timeout_secs),
        },
        emitter: EmitterSettings {
            address: partial
                .emitter
                .as_ref()
                .and_then(|e| e.address.clone())
                .unwrap_or(default.emitter.address),
            request_timeout_secs: partial
                .emitter
                .as_ref()
                .and_then(|e| e.request_timeout_secs)
                .unwrap_or(default.emitter.request_timeout_secs),
        },
        logging: LoggingSettings {
            level: partial
                .logging
                .as_ref()
                .and_then(|l| l.level.clone())
                .unwrap_or(default.logging.level),
        },
    })
}
