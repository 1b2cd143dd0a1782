//! `all_movies.csv`: id, name, parent_id, date

use crate::batch::BatchUpsert;
use crate::error::ValidationError;
use crate::target::SqlArg;

pub const INSERT_PREFIX: &str = "INSERT INTO movies (id, name, parent_id, date) VALUES";

pub const INSERT_SUFFIX: &str = " ON CONFLICT (id) DO UPDATE SET name = EXCLUDED.name, \
                                 parent_id = EXCLUDED.parent_id, date = EXCLUDED.date";

const FIELDS: usize = 4;

/// Upsert keyed on the movie id; re-running with the same dump is a no-op.
pub fn upsert() -> BatchUpsert {
    BatchUpsert::new(INSERT_PREFIX, movie_fields_to_args).suffix(INSERT_SUFFIX)
}

/// `id` must be an integer. An empty or `\N` parent is NULL. `name` and
/// `date` are stored as given.
pub fn movie_fields_to_args(fields: &[String]) -> Result<Vec<SqlArg>, ValidationError> {
    let [id, name, parent_id, date] = fields else {
        return Err(ValidationError::FieldCount {
            expected: FIELDS,
            found: fields.len(),
        });
    };

    let id = id
        .parse::<i64>()
        .map_err(|e| ValidationError::invalid_value("id", id, e))?;

    let parent_id = match parent_id.as_str() {
        "" | "\\N" => None,
        value => Some(
            value
                .parse::<i64>()
                .map_err(|e| ValidationError::invalid_value("parent_id", value, e))?,
        ),
    };

    Ok(vec![
        SqlArg::Int(id),
        SqlArg::Text(name.clone()),
        SqlArg::NullableInt(parent_id),
        SqlArg::Text(date.clone()),
    ])
}
