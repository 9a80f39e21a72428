mod settings;

use config::{Config, ConfigError, Environment, File};

use settings::PartialSettings;

pub use settings::{BrokerSettings, LoggingSettings, ServerSettings, Settings, StoreSettings};

/// Prefix of environment variables read by [`load_config`],
/// e.g. `BOOKWATCH__SERVER__PORT=9000`.
pub const ENV_PREFIX: &str = "BOOKWATCH";

/// Loads the configuration from `config/default` (optional) and
/// environment variables, merged onto default values.
pub fn load_config() -> Result<Settings, ConfigError> {
    let builder = Config::builder()
        .add_source(File::with_name("config/default").required(false))
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

    let config = builder.build()?;
    let partial: PartialSettings = config.try_deserialize()?;

    Ok(Settings::merge(partial))
}
