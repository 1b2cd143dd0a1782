//! Import configuration

use omdb_common::error::{env_or, OmdbError, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

// ============================================================================
// Import Configuration Constants
// ============================================================================

/// Full movie dump, one row per movie, episode or series.
pub const DEFAULT_ALL_MOVIES_URL: &str = "http://www.omdb.org/data/all_movies.csv.bz2";

/// External keys (IMDb, Wikipedia, ...) per movie and language.
pub const DEFAULT_MOVIE_LINKS_URL: &str = "http://www.omdb.org/data/movie_links.csv.bz2";

/// Whole-download timeout in seconds; the dumps are large.
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 3600;

pub const DEFAULT_USER_AGENT: &str = concat!("omdb-ingest/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportConfig {
    pub all_movies_url: String,
    pub movie_links_url: String,
    pub http_timeout_secs: u64,
    pub user_agent: String,
}

impl ImportConfig {
    /// Read `OMDB_ALL_MOVIES_URL`, `OMDB_MOVIE_LINKS_URL`,
    /// `OMDB_HTTP_TIMEOUT` and `OMDB_USER_AGENT`.
    pub fn from_env() -> Result<Self> {
        let config = Self {
            all_movies_url: env_or("OMDB_ALL_MOVIES_URL", DEFAULT_ALL_MOVIES_URL.to_string())?,
            movie_links_url: env_or("OMDB_MOVIE_LINKS_URL", DEFAULT_MOVIE_LINKS_URL.to_string())?,
            http_timeout_secs: env_or("OMDB_HTTP_TIMEOUT", DEFAULT_HTTP_TIMEOUT_SECS)?,
            user_agent: env_or("OMDB_USER_AGENT", DEFAULT_USER_AGENT.to_string())?,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        for (name, url) in [
            ("OMDB_ALL_MOVIES_URL", &self.all_movies_url),
            ("OMDB_MOVIE_LINKS_URL", &self.movie_links_url),
        ] {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(OmdbError::config(format!("{name} must be an http(s) URL, got {url:?}")));
            }
        }

        if self.http_timeout_secs == 0 {
            return Err(OmdbError::config("OMDB_HTTP_TIMEOUT must be greater than 0"));
        }

        Ok(())
    }

    /// Client used for every dump download.
    pub fn http_client(&self) -> reqwest::Result<Client> {
        Client::builder()
            .timeout(Duration::from_secs(self.http_timeout_secs))
            .user_agent(&self.user_agent)
            .build()
    }
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            all_movies_url: DEFAULT_ALL_MOVIES_URL.to_string(),
            movie_links_url: DEFAULT_MOVIE_LINKS_URL.to_string(),
            http_timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}
