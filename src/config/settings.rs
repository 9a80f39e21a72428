use serde::Deserialize;

/// Top-level configuration settings for the application.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct Settings {
    pub server: ServerSettings,
    pub broker: BrokerSettings,
    pub store: StoreSettings,
    pub logging: LoggingSettings,
}

/// Address the WebSocket server binds to.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

/// Configuration settings for the notification broker.
///
/// `max_listeners` caps how many listeners may wait at the same time
/// (unlimited when absent). `watch_timeout_secs` bounds how long a
/// subscriber's watcher waits for its book before giving up.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct BrokerSettings {
    pub max_listeners: Option<usize>,
    pub watch_timeout_secs: Option<u64>,
}

/// Location of the sled database holding books and subscribers.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct StoreSettings {
    pub path: String,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct LoggingSettings {
    pub level: String,
}

/// Partial configuration settings loaded from files or environment.
///
/// Allows partial specification of settings. Missing values are filled
/// from `Settings::default()`.
#[derive(Debug, Default, Deserialize)]
pub struct PartialSettings {
    pub server: Option<PartialServerSettings>,
    pub broker: Option<PartialBrokerSettings>,
    pub store: Option<PartialStoreSettings>,
    pub logging: Option<PartialLoggingSettings>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PartialServerSettings {
    pub host: Option<String>,
    pub port: Option<u16>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PartialBrokerSettings {
    pub max_listeners: Option<usize>,
    pub watch_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PartialStoreSettings {
    pub path: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PartialLoggingSettings {
    pub level: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerSettings {
                host: "127.0.0.1".to_string(),
                port: 8000,
            },
            broker: BrokerSettings {
                max_listeners: None,
                watch_timeout_secs: None,
            },
            store: StoreSettings {
                path: "bookwatch_db".to_string(),
            },
            logging: LoggingSettings {
                level: "info".to_string(),
            },
        }
    }
}

impl Settings {
    /// Fills every value missing from `partial` with the default.
    pub fn merge(partial: PartialSettings) -> Self {
        let default = Settings::default();
        let server = partial.server.unwrap_or_default();
        let broker = partial.broker.unwrap_or_default();
        let store = partial.store.unwrap_or_default();
        let logging = partial.logging.unwrap_or_default();

        Settings {
            server: ServerSettings {
                host: server.host.unwrap_or(default.server.host),
                port: server.port.unwrap_or(default.server.port),
            },
            broker: BrokerSettings {
                max_listeners: broker.max_listeners.or(default.broker.max_listeners),
                watch_timeout_secs: broker
                    .watch_timeout_secs
                    .or(default.broker.watch_timeout_secs),
            },
            store: StoreSettings {
                path: store.path.unwrap_or(default.store.path),
            },
            logging: LoggingSettings {
                level: logging.level.unwrap_or(default.logging.level),
            },
        }
    }

    /// `host:port` to bind the server to.
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
