//! HTTP routes
//!
//! - `GET /`, `GET /api/movies` - every movie
//! - `GET /api/movies/:id` - one movie
//! - `GET /api/imdb?q=tt...` - movie for an IMDb id
//! - `GET|POST /api/import-all-movies?auth=...` - upsert the movie dump
//! - `GET|POST /api/import-movie-links?auth=...` - replace the link table
//! - `GET /health` - database connectivity

pub mod health;
pub mod import;
pub mod movies;

use axum::{routing::get, Router};
use tower_http::compression::CompressionLayer;

use crate::{config::CorsConfig, middleware, state::AppState};

/// Create the application router with all routes and middleware
pub fn router(state: AppState, cors: &CorsConfig) -> Router {
    Router::new()
        .route("/", get(movies::list_movies))
        .route("/api/movies", get(movies::list_movies))
        .route("/api/movies/:id", get(movies::get_movie))
        .route("/api/imdb", get(movies::imdb_lookup))
        .route(
            "/api/import-all-movies",
            get(import::import_all_movies).post(import::import_all_movies),
        )
        .route(
            "/api/import-movie-links",
            get(import::import_movie_links).post(import::import_movie_links),
        )
        .route("/health", get(health::health_check))
        .with_state(state)
        // Apply layers from innermost to outermost
        .layer(middleware::catch_panic_layer())
        .layer(CompressionLayer::new())
        .layer(middleware::tracing_layer())
        .layer(middleware::cors_layer(cors))
}
