use axum::{
    extract::{Path, Query, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    db::{self, Movie},
    error::AppError,
    state::AppState,
};

/// How long clients may cache the movie list.
const LIST_CACHE_HOURS: i64 = 1;

/// Every movie, cacheable for an hour.
pub async fn list_movies(State(state): State<AppState>) -> Result<Response, AppError> {
    let movies = db::movies::list_movies(&state.db).await?;
    let expires = http_date(Utc::now() + Duration::hours(LIST_CACHE_HOURS));

    Ok(([(header::EXPIRES, expires)], Json(movies)).into_response())
}

pub async fn get_movie(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Movie>, AppError> {
    db::movies::get_movie(&state.db, id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("movie {id} not found")))
}

#[derive(Debug, Deserialize)]
pub struct ImdbQuery {
    pub q: Option<String>,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct ImdbResponse {
    pub imdb_id: String,
    pub id: i64,
    pub name: String,
    pub parent_id: Option<i64>,
    pub date: Option<String>,
}

pub async fn imdb_lookup(
    State(state): State<AppState>,
    Query(query): Query<ImdbQuery>,
) -> Result<Json<ImdbResponse>, AppError> {
    let imdb_id = query
        .q
        .filter(|q| q.starts_with("tt"))
        .ok_or_else(|| AppError::BadRequest("q must be an IMDb id (tt...)".to_string()))?;

    let movie = db::movies::movie_for_imdb_id(&state.db, &imdb_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("no movie for {imdb_id}")))?;

    Ok(Json(ImdbResponse {
        imdb_id,
        id: movie.id,
        name: movie.name,
        parent_id: movie.parent_id,
        date: movie.date,
    }))
}

/// RFC 1123 date as used in HTTP headers, always GMT.
fn http_date(at: DateTime<Utc>) -> String {
    at.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_http_date() {
        let at = Utc.with_ymd_and_hms(2024, 1, 18, 9, 5, 3).unwrap();
        assert_eq!(http_date(at), "Thu, 18 Jan 2024 09:05:03 GMT");
    }
}
