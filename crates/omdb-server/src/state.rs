use omdb_ingest::Importer;
use sqlx::PgPool;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub importer: Arc<Importer>,
    /// `None` disables the import endpoints.
    pub secret: Option<String>,
    /// Cancelled on shutdown; every import run holds a child token.
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(db: PgPool, importer: Importer, secret: Option<String>) -> Self {
        Self {
            db,
            importer: Arc::new(importer),
            secret,
            shutdown: CancellationToken::new(),
        }
    }
}
