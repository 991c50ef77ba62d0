mod settings;

use crate::config::settings::PartialSettings;
use config::{Config, ConfigError, Environment, File};

pub use settings::{
    BrokerSettings, LoggingSettings, PersistenceSettings, ServerSettings, Settings,
};

/// Default configuration file, without extension.
pub const DEFAULT_CONFIG_FILE: &str = "config/default";

/// Loads the configuration from the default file and environment variables.
pub fn load_config() -> Result<Settings, ConfigError> {
    load_config_from(DEFAULT_CONFIG_FILE)
}

/// Loads `file` (optional, any format the `config` crate knows) and then
/// `EVENTCAST_*` environment variables (`EVENTCAST_SERVER__PORT=4000`),
/// merging whatever is present over the defaults.
pub fn load_config_from(file: &str) -> Result<Settings, ConfigError> {
    let builder = Config::builder()
        .add_source(File::with_name(file).required(false))
        .add_source(
            Environment::with_prefix("EVENTCAST")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

    let config = builder.build()?;

    // Try to deserialize what is available
    let partial: PartialSettings = config.try_deserialize()?;

    // Merge with defaults
    let default = Settings::default();

    let server = partial.server;
    let broker = partial.broker;
    let persistence = partial.persistence;
    let logging = partial.logging;

    Ok(Settings {
        server: ServerSettings {
            host: server
                .as_ref()
                .and_then(|s| s.host.clone())
                .unwrap_or(default.server.host),
            port: server
                .as_ref()
                .and_then(|s| s.port)
                .unwrap_or(default.server.port),
        },
        broker: BrokerSettings {
            max_connections: broker
                .as_ref()
                .and_then(|b| b.max_connections)
                .unwrap_or(default.broker.max_connections),
        },
        persistence: PersistenceSettings {
            snapshot_dir: persistence
                .as_ref()
                .and_then(|p| p.snapshot_dir.clone())
                .unwrap_or(default.persistence.snapshot_dir),
            load_on_start: persistence
                .as_ref()
                .and_then(|p| p.load_on_start.clone())
                .or(default.persistence.load_on_start),
        },
        logging: LoggingSettings {
            level: logging
                .as_ref()
                .and_then(|l| l.level.clone())
                .unwrap_or(default.logging.level),
        },
    })
}
