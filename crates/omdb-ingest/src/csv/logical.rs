// Logical-line reconstruction
//
// A physical line ending in `\` continues on the next one. The marker is
// dropped and the pieces are joined with `\n`, so the splitter only ever
// sees complete records. Every record line must be valid UTF-8.

use crate::error::{ImportError, ParseError, Result};
use crate::source::LineSource;

/// One record's text and the physical line it started on (1-based).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogicalLine {
    pub line: u64,
    pub text: String,
}

pub struct LogicalLines<S> {
    source: S,
    physical: u64,
}

impl<S: LineSource> LogicalLines<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            physical: 0,
        }
    }

    /// Number of physical lines consumed so far.
    pub fn physical_lines(&self) -> u64 {
        self.physical
    }

    /// Read one physical line without continuation handling.
    ///
    /// Used for the header, which is discarded whatever it contains.
    pub async fn next_physical(&mut self) -> Result<Option<Vec<u8>>> {
        let line = self.source.next_line().await?;
        if line.is_some() {
            self.physical += 1;
        }
        Ok(line)
    }

    pub async fn next_logical(&mut self) -> Result<Option<LogicalLine>> {
        let Some(raw) = self.next_physical().await? else {
            return Ok(None);
        };
        let line = self.physical;
        let mut text = self.decode(raw)?;

        while text.ends_with('\\') {
            text.pop();
            let Some(next) = self.next_physical().await? else {
                return Err(ImportError::Parse {
                    line,
                    source: ParseError::UnexpectedEof,
                });
            };
            text.push('\n');
            text.push_str(&self.decode(next)?);
        }

        Ok(Some(LogicalLine { line, text }))
    }

    /// Decode the physical line just read.
    fn decode(&self, raw: Vec<u8>) -> Result<String> {
        String::from_utf8(raw).map_err(|_| ImportError::Parse {
            line: self.physical,
            source: ParseError::InvalidUtf8,
        })
    }
}
