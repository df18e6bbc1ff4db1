use thiserror::Error;

/// Failures while assembling the runtime: invalid [`CoreConfig`] values,
/// bridges the host did not provide, or desktop defaults that failed to open.
///
/// [`CoreConfig`]: crate::config::CoreConfig
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Missing bridge {capability}: {message}")]
    CapabilityMissing { capability: String, message: String },

    #[error("Runtime setup failed: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;
