//! OMDb Server Library
//!
//! Read API over the imported OMDb tables, plus the secret-gated endpoints
//! that trigger an import.
//!
//! # Example
//!
//! ```no_run
//! use omdb_ingest::Importer;
//! use omdb_server::{config::Config, routes, AppState};
//!
//! # async fn run(pool: sqlx::PgPool) -> anyhow::Result<()> {
//! let config = Config::load()?;
//! let importer = Importer::new(config.import.clone(), pool.clone())?;
//! let state = AppState::new(pool, importer, config.auth.secret.clone());
//! let app = routes::router(state, &config.cors);
//! # let _ = app;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod state;

// Re-export commonly used types
pub use error::AppError;
pub use state::AppState;
