//! OMDb dump import pipeline
//!
//! Loads the bzip2-compressed CSV dumps published by omdb.org into
//! Postgres. The dumps use their own dialect: backslash escapes, quotes
//! that only toggle, and records continued across physical lines with a
//! trailing backslash.
//!
//! Data flows through:
//!
//! - [`source`]: physical lines from an HTTP body or a local file
//! - [`csv`]: logical-line reconstruction and field splitting
//! - [`batch`]: multi-row statements under a parameter ceiling, one
//!   transaction per run
//! - [`import`]: the movies and links orchestrators
//!
//! # Example
//!
//! ```no_run
//! use omdb_ingest::{config::ImportConfig, Importer};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run(pool: sqlx::PgPool) -> anyhow::Result<()> {
//! let importer = Importer::new(ImportConfig::from_env()?, pool)?;
//! let summary = importer.import_all_movies(&CancellationToken::new()).await?;
//! println!("{} movies", summary.rows);
//! # Ok(())
//! # }
//! ```

pub mod batch;
pub mod config;
pub mod csv;
pub mod error;
pub mod import;
pub mod source;
pub mod target;

pub use batch::{BatchUpsert, ImportSummary, MAX_STATEMENT_PARAMS};
pub use error::{ImportError, ParseError, Result, ValidationError};
pub use import::{ImportKind, Importer};
pub use source::LineSource;
pub use target::{ImportTarget, ImportTransaction, SqlArg};
