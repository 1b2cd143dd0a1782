//! Physical-line sources
//!
//! The pipeline pulls one physical line at a time from a [`LineSource`].
//! Remote dumps arrive as a bzip2-compressed HTTP body, decoded
//! incrementally as chunks arrive so the full file never sits in memory.

use crate::error::{ImportError, Result};
use async_trait::async_trait;
use futures::{Stream, StreamExt};
use reqwest::{Client, StatusCode};
use bzip2::{Decompress, Status};
use std::collections::VecDeque;
use std::io;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio_util::sync::CancellationToken;
use tracing::debug;

const DECODE_BUFFER: usize = 64 * 1024;

/// Yields physical lines as raw bytes with their terminator (`\n` or
/// `\r\n`) removed. Text decoding happens in [`crate::csv::LogicalLines`],
/// which knows the line number to report.
#[async_trait]
pub trait LineSource: Send {
    /// `Ok(None)` once the input is exhausted.
    async fn next_line(&mut self) -> Result<Option<Vec<u8>>>;
}

/// Lines from any async buffered reader: local files, test data.
pub struct ReaderLines<R> {
    reader: R,
    buf: Vec<u8>,
}

impl<R: AsyncBufRead + Unpin> ReaderLines<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buf: Vec::with_capacity(256),
        }
    }
}

#[async_trait]
impl<R: AsyncBufRead + Unpin + Send> LineSource for ReaderLines<R> {
    async fn next_line(&mut self) -> Result<Option<Vec<u8>>> {
        self.buf.clear();
        if self.reader.read_until(b'\n', &mut self.buf).await? == 0 {
            return Ok(None);
        }
        Ok(Some(strip_terminator(&self.buf).to_vec()))
    }
}

/// Lines decoded from a stream of bzip2-compressed chunks.
///
/// Concatenated bzip2 streams (as written by parallel compressors) are
/// decoded back to back.
pub struct Bzip2Lines<St> {
    chunks: St,
    decompress: Decompress,
    decoded: Vec<u8>,
    ready: VecDeque<Vec<u8>>,
    cancel: CancellationToken,
    mid_stream: bool,
    finished: bool,
    compressed_bytes: u64,
}

impl<St, B, E> Bzip2Lines<St>
where
    St: Stream<Item = std::result::Result<B, E>> + Unpin + Send,
    B: AsRef<[u8]>,
    E: Into<ImportError>,
{
    pub fn new(chunks: St, cancel: CancellationToken) -> Self {
        Self {
            chunks,
            decompress: Decompress::new(false),
            decoded: Vec::new(),
            ready: VecDeque::new(),
            cancel,
            mid_stream: false,
            finished: false,
            compressed_bytes: 0,
        }
    }

    /// Decode one compressed chunk and queue every line it completes.
    fn feed(&mut self, mut input: &[u8]) -> Result<()> {
        self.compressed_bytes += input.len() as u64;

        loop {
            self.decoded.reserve(DECODE_BUFFER);
            let spare = self.decoded.capacity() - self.decoded.len();
            let (in_before, out_before) = (self.decompress.total_in(), self.decompress.total_out());

            let status = self
                .decompress
                .decompress_vec(input, &mut self.decoded)
                .map_err(|e| ImportError::Decompress(io::Error::new(io::ErrorKind::InvalidData, e)))?;

            let consumed = (self.decompress.total_in() - in_before) as usize;
            let produced = (self.decompress.total_out() - out_before) as usize;
            input = &input[consumed..];
            if consumed > 0 {
                self.mid_stream = true;
            }

            if status == Status::StreamEnd {
                self.decompress = Decompress::new(false);
                self.mid_stream = false;
                if input.is_empty() {
                    break;
                }
                continue;
            }

            // a saturated output buffer may leave decoded bytes inside the
            // decompressor even after all input is consumed
            if input.is_empty() && produced < spare {
                break;
            }
            if consumed == 0 && produced == 0 {
                break;
            }
        }

        self.drain_complete_lines();
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.finished = true;
        if self.mid_stream {
            return Err(ImportError::Decompress(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "truncated bzip2 stream",
            )));
        }

        self.drain_complete_lines();
        if !self.decoded.is_empty() {
            let rest = std::mem::take(&mut self.decoded);
            self.ready.push_back(strip_terminator(&rest).to_vec());
        }
        debug!(compressed_bytes = self.compressed_bytes, "bzip2 input finished");
        Ok(())
    }

    fn drain_complete_lines(&mut self) {
        let Some(last_newline) = self.decoded.iter().rposition(|&b| b == b'\n') else {
            return;
        };

        let tail = self.decoded.split_off(last_newline + 1);
        let complete = std::mem::replace(&mut self.decoded, tail);
        self.ready
            .extend(complete.split_inclusive(|&b| b == b'\n').map(|l| strip_terminator(l).to_vec()));
    }
}

#[async_trait]
impl<St, B, E> LineSource for Bzip2Lines<St>
where
    St: Stream<Item = std::result::Result<B, E>> + Unpin + Send,
    B: AsRef<[u8]> + Send,
    E: Into<ImportError> + Send,
{
    async fn next_line(&mut self) -> Result<Option<Vec<u8>>> {
        loop {
            if let Some(line) = self.ready.pop_front() {
                return Ok(Some(line));
            }
            if self.finished {
                return Ok(None);
            }

            let next = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(ImportError::Cancelled),
                next = self.chunks.next() => next,
            };

            match next {
                Some(chunk) => {
                    let chunk = chunk.map_err(Into::into)?;
                    self.feed(chunk.as_ref())?;
                },
                None => self.finish()?,
            }
        }
    }
}

/// GET `url` and stream its bzip2 body as lines.
///
/// Anything but `200 OK` fails here, before the caller opens a transaction.
pub async fn fetch_lines(
    client: &Client,
    url: &str,
    cancel: &CancellationToken,
) -> Result<impl LineSource> {
    let response = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(ImportError::Cancelled),
        response = client.get(url).send() => response.map_err(|source| ImportError::Request {
            url: url.to_string(),
            source,
        })?,
    };

    if response.status() != StatusCode::OK {
        return Err(ImportError::Status {
            url: url.to_string(),
            status: response.status().as_u16(),
        });
    }

    debug!(url, content_length = ?response.content_length(), "source responded");

    Ok(Bzip2Lines::new(
        Box::pin(response.bytes_stream()),
        cancel.clone(),
    ))
}

fn strip_terminator(raw: &[u8]) -> &[u8] {
    let raw = raw.strip_suffix(b"\n").unwrap_or(raw);
    raw.strip_suffix(b"\r").unwrap_or(raw)
}
