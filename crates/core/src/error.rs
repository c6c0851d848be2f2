use thiserror::Error;

pub type CampaignResult<T> = Result<T, CampaignError>;

/// Startup and wiring failures surfaced by the console binary.
#[derive(Error, Debug)]
pub enum CampaignError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Email channel error: {0}")]
    Email(String),
}

impl From<config::ConfigError> for CampaignError {
    fn from(error: config::ConfigError) -> Self {
        Self::Config(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_errors_map_to_config_variant() {
        let err = CampaignError::from(config::ConfigError::Message("bad port".into()));
        assert!(matches!(err, CampaignError::Config(ref msg) if msg.contains("bad port")));
        assert_eq!(err.to_string(), "Configuration error: bad port");
    }
}
