//! Error types shared across the OMDb crates

use thiserror::Error;

/// Result type alias for shared OMDb operations
pub type Result<T> = std::result::Result<T, OmdbError>;

#[derive(Error, Debug)]
pub enum OmdbError {
    /// A required setting is missing or malformed.
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid value for {name}: {value:?}")]
    InvalidSetting { name: &'static str, value: String },
}

impl OmdbError {
    pub fn config(message: impl Into<String>) -> Self {
        OmdbError::Config(message.into())
    }
}

/// Read an environment variable and parse it, falling back to `default`
/// when the variable is absent.
///
/// A present-but-unparseable value is an error rather than a silent
/// fallback, so typos in deployment settings surface at startup.
pub fn env_or<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T> {
    match std::env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| OmdbError::InvalidSetting { name, value }),
        Err(_) => Ok(default),
    }
}
