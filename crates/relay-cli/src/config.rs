//! Demo configuration.
//!
//! Loaded from the environment (and `.env` when present) with the `RELAY`
//! prefix; nested values are separated by `__`.
//!
//! - `RELAY__BUS__MAX_CONCURRENT_HANDLERS=4` -> `bus.max_concurrent_handlers = 4`
//! - `RELAY__BUS__PUBLISH_TIMEOUT_MS=500` -> `bus.publish_timeout_ms = 500`
//! - `RELAY__BUS__WAIT_POLICY=return_on_cancel` -> `bus.wait_policy`

use relay_core::BusConfig;
use serde::Deserialize;

#[derive(Debug, thiserror::Error)]
pub enum AppConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error(transparent)]
    Invalid(#[from] relay_core::ConfigError),
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub bus: BusConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, AppConfigError> {
        dotenvy::dotenv().ok();

        let config: AppConfig = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix("RELAY")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.bus.validate()?;
        Ok(config)
    }
}
