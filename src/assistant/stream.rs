//! Incremental assembly of streamed chat-completion replies.
//!
//! Providers stream newline-delimited records of the form:
//! ```text
//! data: {"choices":[{"delta":{"content":"子"}}]}
//! data: {"choices":[{"delta":{"content":"曰"}}]}
//! data: [DONE]
//! ```
//! Network reads do not respect record boundaries, so bytes are buffered
//! until a newline arrives and only complete lines are parsed.

use std::error::Error as StdError;
use std::pin::Pin;

use futures::{Stream, StreamExt};
use serde_json::Value;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Prefix of every payload-carrying line.
pub const DATA_PREFIX: &str = "data: ";
/// Payload that ends the stream.
pub const DONE_SENTINEL: &str = "[DONE]";

/// One complete line, classified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedEvent {
    /// Non-empty text fragment of the assistant reply.
    Delta(String),
    /// End marker; anything after it is ignored.
    Done,
    /// Payload that is not valid JSON.
    Malformed(String),
}

/// How an assembly run reached its end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// The `[DONE]` sentinel was received.
    Sentinel,
    /// The source ran out of chunks first.
    Exhausted,
}

impl Termination {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sentinel => "done",
            Self::Exhausted => "eof",
        }
    }
}

/// Result of a completed assembly run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assembled {
    pub content: String,
    pub termination: Termination,
    /// Number of delta fragments applied.
    pub deltas: usize,
    /// Number of malformed lines that were skipped.
    pub skipped: usize,
}

#[derive(Debug, Error)]
pub enum StreamError {
    #[error("stream read failed: {0}")]
    Transport(#[source] Box<dyn StdError + Send + Sync>),
    #[error("stream cancelled")]
    Cancelled,
}

/// Classifies one line of the event stream.
///
/// Returns `None` for lines without the `data: ` prefix and for valid
/// records that carry no text (role announcements, finish reasons, usage).
pub fn parse_line(line: &str) -> Option<ParsedEvent> {
    let payload = line.trim().strip_prefix(DATA_PREFIX)?;
    if payload == DONE_SENTINEL {
        return Some(ParsedEvent::Done);
    }

    match serde_json::from_str::<Value>(payload) {
        Ok(record) => record
            .pointer("/choices/0/delta/content")
            .and_then(Value::as_str)
            .filter(|text| !text.is_empty())
            .map(|text| ParsedEvent::Delta(text.to_string())),
        Err(_) => Some(ParsedEvent::Malformed(payload.to_string())),
    }
}

/// Carry-over buffer that turns arbitrary chunks into complete lines.
///
/// Splitting is done on raw bytes: `\n` never occurs inside a multi-byte
/// UTF-8 sequence, so a character cut by a chunk boundary is whole again by
/// the time its line is decoded.
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `chunk` and drains every newline-terminated line.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);

        let Some(last_newline) = self.pending.iter().rposition(|byte| *byte == b'\n') else {
            return Vec::new();
        };

        let rest = self.pending.split_off(last_newline + 1);
        let complete = std::mem::replace(&mut self.pending, rest);
        complete[..complete.len() - 1]
            .split(|byte| *byte == b'\n')
            .map(|line| String::from_utf8_lossy(line).into_owned())
            .collect()
    }

    /// Bytes received after the last newline.
    pub fn pending(&self) -> &[u8] {
        &self.pending
    }
}

/// Whether more chunks should be fed to the assembler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Done,
}

/// Synchronous half of the assembler: feeds chunks, accumulates content.
#[derive(Debug, Default)]
pub struct StreamAssembler {
    lines: LineBuffer,
    content: String,
    deltas: usize,
    skipped: usize,
    done: bool,
}

impl StreamAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Processes every complete line now available, in order.
    ///
    /// Stops at the `[DONE]` sentinel; lines after it in the same chunk and
    /// any carry-over are discarded.
    pub fn push_chunk<F>(&mut self, chunk: &[u8], on_delta: &mut F) -> Flow
    where
        F: FnMut(&str),
    {
        if self.done {
            return Flow::Done;
        }

        for line in self.lines.push(chunk) {
            match parse_line(&line) {
                Some(ParsedEvent::Delta(text)) => {
                    self.content.push_str(&text);
                    self.deltas += 1;
                    on_delta(&text);
                }
                Some(ParsedEvent::Done) => {
                    self.done = true;
                    return Flow::Done;
                }
                Some(ParsedEvent::Malformed(raw)) => {
                    self.skipped += 1;
                    log::warn!("skipping malformed stream record: {raw}");
                }
                None => {}
            }
        }

        Flow::Continue
    }

    /// Content accumulated so far.
    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn finish(self, termination: Termination) -> Assembled {
        if termination == Termination::Exhausted && !self.lines.pending().is_empty() {
            log::debug!(
                "stream ended with {} unterminated bytes; discarding",
                self.lines.pending().len()
            );
        }
        Assembled {
            content: self.content,
            termination,
            deltas: self.deltas,
            skipped: self.skipped,
        }
    }
}

/// Owns the chunk source for the duration of one assembly run.
///
/// Dropping the guard drops the source, which releases the underlying
/// response body. Every exit path of [`assemble_until_cancelled`] goes
/// through this drop exactly once.
struct ChunkReader<S> {
    source: Pin<Box<S>>,
    chunks: usize,
}

impl<S: Stream> ChunkReader<S> {
    fn acquire(source: S) -> Self {
        Self {
            source: Box::pin(source),
            chunks: 0,
        }
    }

    async fn next_chunk(&mut self) -> Option<S::Item> {
        let item = self.source.next().await;
        if item.is_some() {
            self.chunks += 1;
        }
        item
    }
}

impl<S> Drop for ChunkReader<S> {
    fn drop(&mut self) {
        log::debug!("released stream reader after {} chunks", self.chunks);
    }
}

/// Assembles a streamed reply, calling `on_delta` for each fragment.
pub async fn assemble<S, B, E, F>(source: S, on_delta: F) -> Result<Assembled, StreamError>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: Into<Box<dyn StdError + Send + Sync>>,
    F: FnMut(&str),
{
    assemble_until_cancelled(source, &CancellationToken::new(), on_delta).await
}

/// Assembles a streamed reply without a fragment callback.
pub async fn assemble_text<S, B, E>(source: S) -> Result<Assembled, StreamError>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: Into<Box<dyn StdError + Send + Sync>>,
{
    assemble(source, |_: &str| {}).await
}

/// Assembles a streamed reply until `[DONE]`, exhaustion, a read error, or
/// cancellation, whichever comes first.
///
/// Cancellation is checked before every read, so a token cancelled from
/// inside `on_delta` stops the run before the next chunk is pulled.
pub async fn assemble_until_cancelled<S, B, E, F>(
    source: S,
    cancel: &CancellationToken,
    mut on_delta: F,
) -> Result<Assembled, StreamError>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: Into<Box<dyn StdError + Send + Sync>>,
    F: FnMut(&str),
{
    let mut reader = ChunkReader::acquire(source);
    let mut assembler = StreamAssembler::new();

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(StreamError::Cancelled),
            next = reader.next_chunk() => next,
        };

        match next {
            None => return Ok(assembler.finish(Termination::Exhausted)),
            Some(Err(source)) => return Err(StreamError::Transport(source.into())),
            Some(Ok(chunk)) => {
                if assembler.push_chunk(chunk.as_ref(), &mut on_delta) == Flow::Done {
                    return Ok(assembler.finish(Termination::Sentinel));
                }
            }
        }
    }
}
