//! Secret-gated import triggers
//!
//! The run is tied to the request: if the client goes away the handler
//! future is dropped, its token is cancelled and the transaction rolls back.

use axum::extract::{Query, State};
use omdb_ingest::ImportKind;
use serde::Deserialize;

use crate::{error::AppError, state::AppState};

#[derive(Debug, Deserialize)]
pub struct AuthQuery {
    pub auth: Option<String>,
}

pub async fn import_all_movies(
    State(state): State<AppState>,
    Query(query): Query<AuthQuery>,
) -> Result<&'static str, AppError> {
    run(&state, query, ImportKind::AllMovies).await
}

pub async fn import_movie_links(
    State(state): State<AppState>,
    Query(query): Query<AuthQuery>,
) -> Result<&'static str, AppError> {
    run(&state, query, ImportKind::MovieLinks).await
}

async fn run(state: &AppState, query: AuthQuery, kind: ImportKind) -> Result<&'static str, AppError> {
    authorize(state.secret.as_deref(), query.auth.as_deref())?;

    let cancel = state.shutdown.child_token();
    let _guard = cancel.clone().drop_guard();

    let summary = state.importer.import_remote(kind, &cancel).await?;
    tracing::info!(kind = kind.as_str(), rows = summary.rows, "import finished");

    Ok("OK")
}

fn authorize(secret: Option<&str>, auth: Option<&str>) -> Result<(), AppError> {
    let Some(secret) = secret else {
        return Err(AppError::Config("OMDB_SECRET not set".to_string()));
    };

    if auth != Some(secret) {
        return Err(AppError::Unauthorized("unauthorized".to_string()));
    }

    Ok(())
}
