//! Batched, transactional bulk upsert
//!
//! One run reads a whole CSV dump inside a single transaction. Rows are
//! accumulated into multi-row `INSERT ... VALUES (...), (...)` statements
//! and flushed once the bound-parameter count reaches the ceiling. Any
//! failure rolls the whole run back; nothing is committed per batch.

use crate::csv::{split_line, LogicalLines};
use crate::error::{ImportError, Result, ValidationError};
use crate::source::LineSource;
use crate::target::{ImportTarget, ImportTransaction, SqlArg};
use std::fmt::Write as _;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn, Span};

/// Postgres accepts far more, but statements this size keep memory and
/// round trips balanced.
pub const MAX_STATEMENT_PARAMS: usize = 4000;

/// Turns one record's fields into its typed statement arguments.
pub type Extractor = dyn Fn(&[String]) -> std::result::Result<Vec<SqlArg>, ValidationError> + Send + Sync;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    /// Records extracted and written.
    pub rows: u64,
    /// Batch statements executed, not counting prepare statements.
    pub statements: u64,
}

pub struct BatchUpsert {
    insert_prefix: String,
    insert_suffix: String,
    prepare: Vec<String>,
    extract: Box<Extractor>,
    max_params: usize,
}

impl BatchUpsert {
    /// `insert_prefix` ends just before the row tuples, e.g.
    /// `INSERT INTO movies (id, name) VALUES`.
    pub fn new<F>(insert_prefix: impl Into<String>, extract: F) -> Self
    where
        F: Fn(&[String]) -> std::result::Result<Vec<SqlArg>, ValidationError> + Send + Sync + 'static,
    {
        Self {
            insert_prefix: insert_prefix.into(),
            insert_suffix: String::new(),
            prepare: Vec::new(),
            extract: Box::new(extract),
            max_params: MAX_STATEMENT_PARAMS,
        }
    }

    /// Appended after the row tuples, e.g. an `ON CONFLICT` clause.
    pub fn suffix(mut self, suffix: impl Into<String>) -> Self {
        self.insert_suffix = suffix.into();
        self
    }

    /// Statement run inside the transaction before any row is read.
    pub fn prepare(mut self, statement: impl Into<String>) -> Self {
        self.prepare.push(statement.into());
        self
    }

    pub fn max_params(mut self, max_params: usize) -> Self {
        self.max_params = max_params.max(1);
        self
    }

    /// Load every record of `source` into `target` in one transaction.
    ///
    /// The first physical line is a header and is discarded. Events are
    /// emitted under `span`.
    pub async fn run<T, S>(
        &self,
        target: &T,
        source: S,
        span: &Span,
        cancel: &CancellationToken,
    ) -> Result<ImportSummary>
    where
        T: ImportTarget,
        S: LineSource,
    {
        info!(parent: span, max_params = self.max_params, "import started");

        let mut tx = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ImportError::Cancelled),
            tx = target.begin() => tx.map_err(|e| ImportError::execution("begin", e))?,
        };

        let loaded = self.load(&mut tx, LogicalLines::new(source), span, cancel).await;

        let summary = match loaded {
            Ok(summary) if !cancel.is_cancelled() => summary,
            Ok(_) => return Err(abort(tx, ImportError::Cancelled, span).await),
            Err(err) => return Err(abort(tx, err, span).await),
        };

        tx.commit()
            .await
            .map_err(|e| ImportError::execution("commit", e))?;

        info!(
            parent: span,
            rows = summary.rows,
            statements = summary.statements,
            "import committed"
        );
        Ok(summary)
    }

    async fn load<X, S>(
        &self,
        tx: &mut X,
        mut lines: LogicalLines<S>,
        span: &Span,
        cancel: &CancellationToken,
    ) -> Result<ImportSummary>
    where
        X: ImportTransaction,
        S: LineSource,
    {
        for statement in &self.prepare {
            execute(tx, statement, Vec::new(), cancel, "prepare").await?;
            debug!(parent: span, statement = %statement, "prepare statement executed");
        }

        if lines.next_physical().await?.is_none() {
            return Err(ImportError::MissingHeader);
        }

        let mut summary = ImportSummary::default();
        let mut batch = Batch::default();

        while let Some(logical) = lines.next_logical().await? {
            if logical.text.is_empty() {
                continue;
            }

            let fields = split_line(&logical.text).map_err(|source| ImportError::Parse {
                line: logical.line,
                source,
            })?;
            let args = (self.extract)(&fields).map_err(|source| ImportError::Validation {
                line: logical.line,
                source,
            })?;

            batch.push(args);
            summary.rows += 1;

            if batch.params() >= self.max_params {
                self.flush(tx, &mut batch, &mut summary, span, cancel).await?;
            }
        }

        if !batch.is_empty() {
            self.flush(tx, &mut batch, &mut summary, span, cancel).await?;
        }

        debug!(parent: span, physical_lines = lines.physical_lines(), "input exhausted");
        Ok(summary)
    }

    async fn flush<X: ImportTransaction>(
        &self,
        tx: &mut X,
        batch: &mut Batch,
        summary: &mut ImportSummary,
        span: &Span,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let Batch { tuples, args, rows } = std::mem::take(batch);
        let params = args.len();
        let sql = format!("{}{}{}", self.insert_prefix, tuples, self.insert_suffix);

        execute(tx, &sql, args, cancel, "execute batch").await?;
        summary.statements += 1;

        info!(
            parent: span,
            rows,
            params,
            total_rows = summary.rows,
            "batch flushed"
        );
        Ok(())
    }
}

/// Rows pending for the next statement, rendered as ` ($1, $2), ($3, $4)`.
#[derive(Debug, Default)]
struct Batch {
    tuples: String,
    args: Vec<SqlArg>,
    rows: usize,
}

impl Batch {
    fn push(&mut self, row: Vec<SqlArg>) {
        if self.rows > 0 {
            self.tuples.push(',');
        }
        self.tuples.push_str(" (");
        for i in 0..row.len() {
            if i > 0 {
                self.tuples.push_str(", ");
            }
            // writing to a String cannot fail
            let _ = write!(self.tuples, "${}", self.args.len() + i + 1);
        }
        self.tuples.push(')');

        self.args.extend(row);
        self.rows += 1;
    }

    fn params(&self) -> usize {
        self.args.len()
    }

    fn is_empty(&self) -> bool {
        self.rows == 0
    }
}

async fn execute<X: ImportTransaction>(
    tx: &mut X,
    sql: &str,
    args: Vec<SqlArg>,
    cancel: &CancellationToken,
    operation: &'static str,
) -> Result<u64> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ImportError::Cancelled),
        result = tx.execute(sql, args) => result.map_err(|e| ImportError::execution(operation, e)),
    }
}

async fn abort<X: ImportTransaction>(tx: X, err: ImportError, span: &Span) -> ImportError {
    warn!(parent: span, error = %err, "import failed, rolling back");
    if let Err(rollback_err) = tx.rollback().await {
        error!(parent: span, error = %rollback_err, "rollback failed");
    }
    err
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::ReaderLines;
    use crate::target::recording::{Outcome, RecordingTarget};
    use std::io::Cursor;

    fn pairs(fields: &[String]) -> std::result::Result<Vec<SqlArg>, ValidationError> {
        if fields.len() != 2 {
            return Err(ValidationError::FieldCount {
                expected: 2,
                found: fields.len(),
            });
        }
        let id = fields[0]
            .parse::<i64>()
            .map_err(|e| ValidationError::invalid_value("id", &fields[0], e))?;
        Ok(vec![SqlArg::Int(id), SqlArg::Text(fields[1].clone())])
    }

    fn input(rows: usize) -> ReaderLines<Cursor<String>> {
        let mut text = String::from("id,name\n");
        for i in 1..=rows {
            text.push_str(&format!("{i},row {i}\n"));
        }
        ReaderLines::new(Cursor::new(text))
    }

    fn text(s: &str) -> ReaderLines<Cursor<String>> {
        ReaderLines::new(Cursor::new(s.to_string()))
    }

    async fn run(
        upsert: &BatchUpsert,
        target: &RecordingTarget,
        source: ReaderLines<Cursor<String>>,
    ) -> Result<ImportSummary> {
        upsert
            .run(target, source, &Span::none(), &CancellationToken::new())
            .await
    }

    #[tokio::test]
    async fn test_statement_shape() {
        let upsert = BatchUpsert::new("INSERT INTO t (id, name) VALUES", pairs)
            .suffix(" ON CONFLICT DO NOTHING");
        let target = RecordingTarget::new();

        let summary = run(&upsert, &target, input(2)).await.unwrap();
        assert_eq!(summary, ImportSummary { rows: 2, statements: 1 });

        let statements = target.statements();
        assert_eq!(
            statements[0].0,
            "INSERT INTO t (id, name) VALUES ($1, $2), ($3, $4) ON CONFLICT DO NOTHING"
        );
        assert_eq!(
            statements[0].1,
            vec![
                SqlArg::Int(1),
                SqlArg::Text("row 1".into()),
                SqlArg::Int(2),
                SqlArg::Text("row 2".into()),
            ]
        );
        assert_eq!(target.outcome(), Outcome::Committed);
    }

    #[tokio::test]
    async fn test_flush_count_follows_ceiling() {
        // (rows, ceiling) -> ceil(rows * 2 / ceiling) statements
        for (rows, ceiling, expected) in [(10, 4, 5), (10, 6, 4), (3, 4000, 1), (2000, 4000, 1), (2001, 4000, 2)] {
            let upsert = BatchUpsert::new("INSERT INTO t (id, name) VALUES", pairs).max_params(ceiling);
            let target = RecordingTarget::new();

            let summary = run(&upsert, &target, input(rows)).await.unwrap();
            assert_eq!(summary.statements, expected, "rows={rows} ceiling={ceiling}");
            assert_eq!(summary.rows, rows as u64);

            for (_, args) in target.statements() {
                assert!(args.len() <= ceiling.max(2), "statement over ceiling");
            }
        }
    }

    #[tokio::test]
    async fn test_final_flush_holds_the_remainder() {
        let upsert = BatchUpsert::new("INSERT INTO t (id, name) VALUES", pairs).max_params(6);
        let target = RecordingTarget::new();

        run(&upsert, &target, input(7)).await.unwrap();

        let statements = target.statements();
        let sizes: Vec<usize> = statements.iter().map(|(_, args)| args.len()).collect();
        assert_eq!(sizes, vec![6, 6, 2]);
        // placeholders restart at $1 in every statement
        assert_eq!(statements[2].0, "INSERT INTO t (id, name) VALUES ($1, $2)");
        assert_eq!(statements[2].1[0], SqlArg::Int(7));
    }

    #[tokio::test]
    async fn test_prepare_runs_first() {
        let upsert = BatchUpsert::new("INSERT INTO t (id, name) VALUES", pairs)
            .prepare("DELETE FROM t;")
            .prepare("SET CONSTRAINTS ALL DEFERRED;");
        let target = RecordingTarget::new();

        let summary = run(&upsert, &target, input(1)).await.unwrap();
        assert_eq!(summary.statements, 1);

        let sql: Vec<String> = target.statements().into_iter().map(|(sql, _)| sql).collect();
        assert_eq!(sql[0], "DELETE FROM t;");
        assert_eq!(sql[1], "SET CONSTRAINTS ALL DEFERRED;");
        assert!(sql[2].starts_with("INSERT INTO t"));
    }

    #[tokio::test]
    async fn test_header_only_and_blank_lines() {
        let upsert = BatchUpsert::new("INSERT INTO t (id, name) VALUES", pairs);

        let target = RecordingTarget::new();
        let summary = run(&upsert, &target, text("id,name\n")).await.unwrap();
        assert_eq!(summary, ImportSummary::default());
        assert!(target.statements().is_empty());
        assert_eq!(target.outcome(), Outcome::Committed);

        let target = RecordingTarget::new();
        let summary = run(&upsert, &target, text("id,name\n\n1,a\n\n2,b\n")).await.unwrap();
        assert_eq!(summary.rows, 2);
    }

    #[tokio::test]
    async fn test_header_is_discarded_even_when_malformed() {
        let upsert = BatchUpsert::new("INSERT INTO t (id, name) VALUES", pairs);
        let target = RecordingTarget::new();
        let summary = run(&upsert, &target, text("\"broken,header\\\n1,a\n")).await.unwrap();
        assert_eq!(summary.rows, 1);
    }

    #[tokio::test]
    async fn test_empty_input_has_no_header() {
        let upsert = BatchUpsert::new("INSERT INTO t (id, name) VALUES", pairs);
        let target = RecordingTarget::new();
        let err = run(&upsert, &target, text("")).await.unwrap_err();
        assert!(matches!(err, ImportError::MissingHeader));
        assert_eq!(target.outcome(), Outcome::RolledBack);
    }

    #[tokio::test]
    async fn test_continuation_lines_form_one_record() {
        let upsert = BatchUpsert::new("INSERT INTO t (id, name) VALUES", pairs);
        let target = RecordingTarget::new();

        run(&upsert, &target, text("id,name\n1,\"two\\\nlines\"\n")).await.unwrap();
        assert_eq!(target.statements()[0].1[1], SqlArg::Text("two\nlines".into()));
    }

    #[tokio::test]
    async fn test_validation_error_rolls_back_whole_run() {
        let upsert = BatchUpsert::new("INSERT INTO t (id, name) VALUES", pairs).max_params(4);
        let target = RecordingTarget::new();

        // two full batches are executed before row 5 fails
        let err = run(&upsert, &target, text("id,name\n1,a\n2,b\n3,c\n4,d\nfive,e\n"))
            .await
            .unwrap_err();

        assert!(
            matches!(err, ImportError::Validation { line: 6, .. }),
            "got {err:?}"
        );
        assert_eq!(target.statements().len(), 2);
        assert_eq!(target.outcome(), Outcome::RolledBack);
    }

    #[tokio::test]
    async fn test_field_count_mismatch() {
        let upsert = BatchUpsert::new("INSERT INTO t (id, name) VALUES", pairs);
        let target = RecordingTarget::new();
        let err = run(&upsert, &target, text("id,name\n1,a,extra\n")).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "line 2: invalid number of fields: 3 (expected 2)"
        );
        assert_eq!(target.outcome(), Outcome::RolledBack);
    }

    #[tokio::test]
    async fn test_parse_error_names_line() {
        let upsert = BatchUpsert::new("INSERT INTO t (id, name) VALUES", pairs);
        let target = RecordingTarget::new();
        let err = run(&upsert, &target, text("id,name\n1,a\n2,\"open\n")).await.unwrap_err();
        assert_eq!(err.to_string(), "line 3: unterminated quoted field");
        assert_eq!(target.outcome(), Outcome::RolledBack);
    }

    #[tokio::test]
    async fn test_invalid_utf8_rolls_back_flushed_batches() {
        let upsert = BatchUpsert::new("INSERT INTO t (id, name) VALUES", pairs).max_params(4);
        let target = RecordingTarget::new();
        let source = ReaderLines::new(Cursor::new(b"id,name\n1,a\n2,b\n3,Caf\xe9\n".to_vec()));

        let err = upsert
            .run(&target, source, &Span::none(), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(
            matches!(err, ImportError::Parse { line: 4, source: crate::error::ParseError::InvalidUtf8 }),
            "got {err:?}"
        );
        // the first two rows were already sent; none of it may be committed
        assert_eq!(target.statements().len(), 1);
        assert_eq!(target.outcome(), Outcome::RolledBack);
    }

    #[tokio::test]
    async fn test_execute_failure_names_operation() {
        let upsert = BatchUpsert::new("INSERT INTO t (id, name) VALUES", pairs).prepare("DELETE FROM t;");

        let target = RecordingTarget::failing_at(0);
        let err = run(&upsert, &target, input(1)).await.unwrap_err();
        assert!(err.to_string().starts_with("prepare: "), "got {err}");
        assert_eq!(target.outcome(), Outcome::RolledBack);

        let target = RecordingTarget::failing_at(1);
        let err = run(&upsert, &target, input(1)).await.unwrap_err();
        assert!(err.to_string().starts_with("execute batch: "), "got {err}");
        assert_eq!(target.outcome(), Outcome::RolledBack);
    }

    #[tokio::test]
    async fn test_cancelled_run_never_commits() {
        let upsert = BatchUpsert::new("INSERT INTO t (id, name) VALUES", pairs);

        let cancel = CancellationToken::new();
        cancel.cancel();
        let target = RecordingTarget::new();
        let err = upsert
            .run(&target, input(3), &Span::none(), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, ImportError::Cancelled));
        assert_eq!(target.begun(), 0);
        assert_eq!(target.outcome(), Outcome::Open);
    }

    #[tokio::test]
    async fn test_cancel_mid_run_rolls_back() {
        struct CancelAfter {
            inner: ReaderLines<Cursor<String>>,
            remaining: usize,
            cancel: CancellationToken,
        }

        #[async_trait::async_trait]
        impl LineSource for CancelAfter {
            async fn next_line(&mut self) -> Result<Option<Vec<u8>>> {
                if self.remaining == 0 {
                    self.cancel.cancel();
                } else {
                    self.remaining -= 1;
                }
                self.inner.next_line().await
            }
        }

        let cancel = CancellationToken::new();
        let source = CancelAfter {
            inner: input(10),
            remaining: 4,
            cancel: cancel.clone(),
        };
        let upsert = BatchUpsert::new("INSERT INTO t (id, name) VALUES", pairs).max_params(4);
        let target = RecordingTarget::new();

        let err = upsert.run(&target, source, &Span::none(), &cancel).await.unwrap_err();
        assert!(matches!(err, ImportError::Cancelled));
        assert_eq!(target.outcome(), Outcome::RolledBack);
    }
}
