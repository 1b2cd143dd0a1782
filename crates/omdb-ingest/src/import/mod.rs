//! Import orchestrators
//!
//! Each import kind pairs a dump URL with its statement skeleton and
//! extractor, then hands a line source to the batch executor. Remote
//! sources are fetched before the transaction opens, so a non-200 response
//! never touches the database.

pub mod links;
pub mod movies;

use crate::batch::{BatchUpsert, ImportSummary};
use crate::config::ImportConfig;
use crate::error::{ImportError, Result};
use crate::source::{fetch_lines, Bzip2Lines, LineSource, ReaderLines};
use crate::target::ImportTarget;
use reqwest::Client;
use sqlx::PgPool;
use std::fmt;
use std::path::Path;
use tokio::io::BufReader;
use tokio_util::io::ReaderStream;
use tokio_util::sync::CancellationToken;
use tracing::{info, info_span, Span};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportKind {
    AllMovies,
    MovieLinks,
}

impl ImportKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ImportKind::AllMovies => "all-movies",
            ImportKind::MovieLinks => "movie-links",
        }
    }

    pub fn url(self, config: &ImportConfig) -> &str {
        match self {
            ImportKind::AllMovies => &config.all_movies_url,
            ImportKind::MovieLinks => &config.movie_links_url,
        }
    }

    pub fn upsert(self) -> BatchUpsert {
        match self {
            ImportKind::AllMovies => movies::upsert(),
            ImportKind::MovieLinks => links::upsert(),
        }
    }
}

impl fmt::Display for ImportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Runs imports against one target with one HTTP client.
pub struct Importer<T = PgPool> {
    config: ImportConfig,
    client: Client,
    target: T,
}

impl<T: ImportTarget> Importer<T> {
    pub fn new(config: ImportConfig, target: T) -> Result<Self> {
        let client = config.http_client().map_err(ImportError::Client)?;
        Ok(Self {
            config,
            client,
            target,
        })
    }

    pub fn config(&self) -> &ImportConfig {
        &self.config
    }

    /// Upsert the full movie dump.
    pub async fn import_all_movies(&self, cancel: &CancellationToken) -> Result<ImportSummary> {
        self.import_remote(ImportKind::AllMovies, cancel).await
    }

    /// Replace every movie link with the current dump.
    pub async fn import_movie_links(&self, cancel: &CancellationToken) -> Result<ImportSummary> {
        self.import_remote(ImportKind::MovieLinks, cancel).await
    }

    pub async fn import_remote(
        &self,
        kind: ImportKind,
        cancel: &CancellationToken,
    ) -> Result<ImportSummary> {
        let url = kind.url(&self.config);
        let span = import_span(kind, url);

        let source = fetch_lines(&self.client, url, cancel).await?;
        self.run(kind, source, &span, cancel).await
    }

    /// Load a local dump: `.bz2` files are decompressed, anything else is
    /// read as plain CSV.
    pub async fn import_file(
        &self,
        kind: ImportKind,
        path: &Path,
        cancel: &CancellationToken,
    ) -> Result<ImportSummary> {
        let origin = path.display().to_string();
        let span = import_span(kind, &origin);

        let file = tokio::fs::File::open(path).await?;
        if path.extension().is_some_and(|ext| ext == "bz2") {
            let source = Bzip2Lines::new(ReaderStream::new(file), cancel.clone());
            self.run(kind, source, &span, cancel).await
        } else {
            let source = ReaderLines::new(BufReader::new(file));
            self.run(kind, source, &span, cancel).await
        }
    }

    async fn run<S: LineSource>(
        &self,
        kind: ImportKind,
        source: S,
        span: &Span,
        cancel: &CancellationToken,
    ) -> Result<ImportSummary> {
        let summary = kind.upsert().run(&self.target, source, span, cancel).await?;
        if kind == ImportKind::MovieLinks {
            info!(parent: span, records = summary.rows, "movie links imported");
        }
        Ok(summary)
    }
}

fn import_span(kind: ImportKind, origin: &str) -> Span {
    info_span!("import", kind = kind.as_str(), source = origin)
}
