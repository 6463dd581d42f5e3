use thiserror::Error;

/// Errors raised while assembling [`Config`](crate::Config) from the environment.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Environment variable '{0}' is not set")]
    Missing(&'static str),

    #[error("Environment variable '{key}' has invalid value '{value}': {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}
