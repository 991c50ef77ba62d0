use serde::Deserialize;

/// Top-level configuration settings for the application.
#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub broker: BrokerSettings,
    pub persistence: PersistenceSettings,
    pub logging: LoggingSettings,
}

/// Address the TCP listener binds to.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl ServerSettings {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Configuration settings for the broker.
#[derive(Debug, Deserialize, Clone)]
pub struct BrokerSettings {
    pub max_connections: usize,
}

/// Where snapshot files live.
///
/// `snapshot_dir` is the base for relative `save`/`load` filenames;
/// `load_on_start` names a snapshot to load before serving.
#[derive(Debug, Deserialize, Clone)]
pub struct PersistenceSettings {
    pub snapshot_dir: String,
    pub load_on_start: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingSettings {
    pub level: String,
}

/// Partial configuration settings loaded from files or environment.
///
/// Missing values are filled from `Settings::default()`.
#[derive(Debug, Deserialize)]
pub struct PartialSettings {
    pub server: Option<PartialServerSettings>,
    pub broker: Option<PartialBrokerSettings>,
    pub persistence: Option<PartialPersistenceSettings>,
    pub logging: Option<PartialLoggingSettings>,
}

#[derive(Debug, Deserialize)]
pub struct PartialServerSettings {
    pub host: Option<String>,
    pub port: Option<u16>,
}

#[derive(Debug, Deserialize)]
pub struct PartialBrokerSettings {
    pub max_connections: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct PartialPersistenceSettings {
    pub snapshot_dir: Option<String>,
    pub load_on_start: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PartialLoggingSettings {
    pub level: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerSettings {
                host: "127.0.0.1".to_string(),
                port: 3000,
            },
            broker: BrokerSettings {
                max_connections: 1000,
            },
            persistence: PersistenceSettings {
                snapshot_dir: ".".to_string(),
                load_on_start: None,
            },
            logging: LoggingSettings {
                level: "info".to_string(),
            },
        }
    }
}
