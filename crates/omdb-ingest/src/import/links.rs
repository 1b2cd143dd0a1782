//! `movie_links.csv`: source, key, movie_id, language_iso_639_1

use crate::batch::BatchUpsert;
use crate::error::ValidationError;
use crate::target::SqlArg;

pub const INSERT_PREFIX: &str =
    "INSERT INTO movie_links (source, key, movie_id, language_iso_639_1) VALUES";

pub const INSERT_SUFFIX: &str = " ON CONFLICT DO NOTHING";

/// Run before the first row: the table is replaced wholesale every time.
pub const PREPARE: [&str; 2] = ["DELETE FROM movie_links;", "SET CONSTRAINTS ALL DEFERRED;"];

const FIELDS: usize = 4;

pub fn upsert() -> BatchUpsert {
    PREPARE
        .iter()
        .fold(BatchUpsert::new(INSERT_PREFIX, link_fields_to_args), |upsert, sql| upsert.prepare(*sql))
        .suffix(INSERT_SUFFIX)
}

/// An empty or `\N` movie id becomes `0`, not NULL, unlike a movie's
/// parent id.
pub fn link_fields_to_args(fields: &[String]) -> Result<Vec<SqlArg>, ValidationError> {
    let [source, key, movie_id, language] = fields else {
        return Err(ValidationError::FieldCount {
            expected: FIELDS,
            found: fields.len(),
        });
    };

    let movie_id = match movie_id.as_str() {
        "" | "\\N" => 0,
        value => value
            .parse::<i64>()
            .map_err(|e| ValidationError::invalid_value("movie_id", value, e))?,
    };

    Ok(vec![
        SqlArg::Text(source.clone()),
        SqlArg::Text(key.clone()),
        SqlArg::Int(movie_id),
        SqlArg::Text(language.clone()),
    ])
}
