use thiserror::Error;

use crate::app::builder::BuildError;
use crate::app::config::ConfigError;

/// Crate-level error.
///
/// Only wiring problems surface here. Handler failures never do; they end up in
/// `PublishReport::failures` and the configured `FailureSink`.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Build(#[from] BuildError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::{BusBuilder, BusConfig, EventBus};
    use crate::typed::message::fixtures::Deleted;

    fn wire(config: BusConfig) -> Result<EventBus, RelayError> {
        config.validate()?;
        Ok(BusBuilder::new().config(config).expect::<Deleted>().build()?)
    }

    #[test]
    fn wiring_errors_convert_into_relay_error() {
        let err = wire(BusConfig::default().with_max_concurrent_handlers(0)).unwrap_err();
        assert!(matches!(err, RelayError::Config(ConfigError::ZeroConcurrency)));

        let err = wire(BusConfig::default()).unwrap_err();
        assert!(matches!(err, RelayError::Build(BuildError::MissingSubscribers(_))));
        assert!(err.to_string().contains("Deleted"));
    }
}
