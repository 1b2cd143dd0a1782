//! OMDb Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Pieces shared by the importer and the HTTP server.
//!
//! - **Error Handling**: [`OmdbError`] and the crate-wide [`Result`] alias
//! - **Logging**: [`logging::LogConfig`] and [`logging::init_logging`]
//!
//! # Example
//!
//! ```no_run
//! use omdb_common::logging::{init_logging, LogConfig};
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = LogConfig::from_env()?;
//!     init_logging(&config)?;
//!     tracing::info!("ready");
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod logging;

pub use error::{OmdbError, Result};
