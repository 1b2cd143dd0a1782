use serde::{Deserialize, Serialize};
use sqlx::PgPool;

/// Link source whose keys are IMDb title ids (`tt...`).
pub const IMDB_LINK_SOURCE: &str = "imdbmovie";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Movie {
    pub id: i64,
    pub name: String,
    pub parent_id: Option<i64>,
    pub date: Option<String>,
}

pub async fn list_movies(pool: &PgPool) -> Result<Vec<Movie>, sqlx::Error> {
    sqlx::query_as::<_, Movie>("SELECT id, name, parent_id, date FROM movies ORDER BY id")
        .fetch_all(pool)
        .await
}

pub async fn get_movie(pool: &PgPool, id: i64) -> Result<Option<Movie>, sqlx::Error> {
    sqlx::query_as::<_, Movie>("SELECT id, name, parent_id, date FROM movies WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// Resolve an IMDb id through `movie_links`.
///
/// A key may be listed once per language; they all point at the same movie.
pub async fn movie_for_imdb_id(pool: &PgPool, imdb_id: &str) -> Result<Option<Movie>, sqlx::Error> {
    sqlx::query_as::<_, Movie>(
        r#"
        SELECT m.id, m.name, m.parent_id, m.date
        FROM movie_links l
        JOIN movies m ON m.id = l.movie_id
        WHERE l.source = $1 AND l.key = $2
        ORDER BY l.language_iso_639_1
        LIMIT 1
        "#,
    )
    .bind(IMDB_LINK_SOURCE)
    .bind(imdb_id)
    .fetch_optional(pool)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn seed(pool: &PgPool) -> sqlx::Result<()> {
        sqlx::query(
            "INSERT INTO movies (id, name, parent_id, date) VALUES \
             (1, 'Alien', NULL, '1979-05-25'), (2, 'Aliens', 1, '1986-07-18')",
        )
        .execute(pool)
        .await?;
        sqlx::query(
            "INSERT INTO movie_links (source, key, movie_id, language_iso_639_1) VALUES \
             ('imdbmovie', 'tt0090605', 2, 'en'), ('imdbmovie', 'tt0090605', 2, 'de'), \
             ('wikipedia', 'tt0078748', 1, 'en'), ('imdbmovie', 'tt0000000', 0, 'en')",
        )
        .execute(pool)
        .await?;
        Ok(())
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn test_list_and_get(pool: PgPool) -> sqlx::Result<()> {
        assert!(list_movies(&pool).await?.is_empty());
        seed(&pool).await?;

        let movies = list_movies(&pool).await?;
        assert_eq!(movies.len(), 2);
        assert_eq!(movies[1].parent_id, Some(1));

        assert_eq!(get_movie(&pool, 1).await?.map(|m| m.name), Some("Alien".to_string()));
        assert!(get_movie(&pool, 3).await?.is_none());
        Ok(())
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn test_imdb_lookup(pool: PgPool) -> sqlx::Result<()> {
        seed(&pool).await?;

        let movie = movie_for_imdb_id(&pool, "tt0090605").await?;
        assert_eq!(movie.map(|m| m.id), Some(2));

        // only imdbmovie links count
        assert!(movie_for_imdb_id(&pool, "tt0078748").await?.is_none());
        // zero-default movie ids resolve to nothing
        assert!(movie_for_imdb_id(&pool, "tt0000000").await?.is_none());
        Ok(())
    }
}
