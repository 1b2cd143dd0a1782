//! Transactional execute seam
//!
//! The batch executor only needs `begin`, `execute`, `commit` and
//! `rollback`. Postgres implements them through sqlx; unit tests swap in a
//! recording fake.

use async_trait::async_trait;
use sqlx::{PgPool, Postgres};

/// A positional statement argument, bound as `$n`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlArg {
    Int(i64),
    NullableInt(Option<i64>),
    Text(String),
    NullableText(Option<String>),
}

impl From<i64> for SqlArg {
    fn from(value: i64) -> Self {
        SqlArg::Int(value)
    }
}

impl From<Option<i64>> for SqlArg {
    fn from(value: Option<i64>) -> Self {
        SqlArg::NullableInt(value)
    }
}

impl From<String> for SqlArg {
    fn from(value: String) -> Self {
        SqlArg::Text(value)
    }
}

impl From<&str> for SqlArg {
    fn from(value: &str) -> Self {
        SqlArg::Text(value.to_string())
    }
}

impl From<Option<String>> for SqlArg {
    fn from(value: Option<String>) -> Self {
        SqlArg::NullableText(value)
    }
}

/// Something an import run can open a transaction on.
#[async_trait]
pub trait ImportTarget: Send + Sync {
    type Transaction: ImportTransaction;

    async fn begin(&self) -> Result<Self::Transaction, sqlx::Error>;
}

/// An open transaction. Dropping it without `commit` must discard its work.
#[async_trait]
pub trait ImportTransaction: Send {
    /// Run one statement, returning the number of rows affected.
    async fn execute(&mut self, sql: &str, args: Vec<SqlArg>) -> Result<u64, sqlx::Error>;

    async fn commit(self) -> Result<(), sqlx::Error>;

    async fn rollback(self) -> Result<(), sqlx::Error>;
}

#[async_trait]
impl ImportTarget for PgPool {
    type Transaction = sqlx::Transaction<'static, Postgres>;

    async fn begin(&self) -> Result<Self::Transaction, sqlx::Error> {
        sqlx::Pool::<Postgres>::begin(self).await
    }
}

#[async_trait]
impl ImportTransaction for sqlx::Transaction<'static, Postgres> {
    async fn execute(&mut self, sql: &str, args: Vec<SqlArg>) -> Result<u64, sqlx::Error> {
        let mut query = sqlx::query(sql);
        for arg in args {
            query = match arg {
                SqlArg::Int(v) => query.bind(v),
                SqlArg::NullableInt(v) => query.bind(v),
                SqlArg::Text(v) => query.bind(v),
                SqlArg::NullableText(v) => query.bind(v),
            };
        }

        let result = query.execute(&mut **self).await?;
        Ok(result.rows_affected())
    }

    async fn commit(self) -> Result<(), sqlx::Error> {
        sqlx::Transaction::commit(self).await
    }

    async fn rollback(self) -> Result<(), sqlx::Error> {
        sqlx::Transaction::rollback(self).await
    }
}
