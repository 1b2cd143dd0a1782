//! Error types for the import pipeline

use thiserror::Error;

/// Result type alias for import operations
pub type Result<T> = std::result::Result<T, ImportError>;

/// Malformed text in the CSV dialect.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseError {
    /// Input ended right after a backslash, or inside a line continuation.
    #[error("unexpected end of input")]
    UnexpectedEof,

    #[error("unterminated quoted field")]
    UnterminatedQuote,

    #[error("invalid UTF-8")]
    InvalidUtf8,
}

/// A record whose fields do not fit the target row shape.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("invalid number of fields: {found} (expected {expected})")]
    FieldCount { expected: usize, found: usize },

    #[error("invalid {field} {value:?}: {reason}")]
    InvalidValue {
        field: &'static str,
        value: String,
        reason: String,
    },
}

impl ValidationError {
    pub fn invalid_value(
        field: &'static str,
        value: &str,
        reason: impl std::fmt::Display,
    ) -> Self {
        ValidationError::InvalidValue {
            field,
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Everything that can abort an import run.
///
/// None of these are retried; the run's transaction is rolled back and the
/// error is handed to the trigger surface.
#[derive(Error, Debug)]
pub enum ImportError {
    #[error("building http client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("fetching {url}: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("fetching {url}: http status: {status}")]
    Status { url: String, status: u16 },

    #[error("reading response body: {0}")]
    Body(#[from] reqwest::Error),

    #[error("reading input: {0}")]
    Read(#[from] std::io::Error),

    #[error("bzip2 decode: {0}")]
    Decompress(#[source] std::io::Error),

    #[error("input has no header line")]
    MissingHeader,

    #[error("line {line}: {source}")]
    Parse {
        line: u64,
        #[source]
        source: ParseError,
    },

    #[error("line {line}: {source}")]
    Validation {
        line: u64,
        #[source]
        source: ValidationError,
    },

    #[error("{operation}: {source}")]
    Execution {
        operation: &'static str,
        #[source]
        source: sqlx::Error,
    },

    #[error("import cancelled")]
    Cancelled,
}

impl ImportError {
    pub fn execution(operation: &'static str, source: sqlx::Error) -> Self {
        ImportError::Execution { operation, source }
    }

    /// True for failures raised before any data was read, such as a non-200
    /// response from the source.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            ImportError::Client(_) | ImportError::Request { .. } | ImportError::Status { .. }
        )
    }
}
