use futures::{Stream, StreamExt};

use super::event::StreamEvent;

/// Marker that starts every frame line
pub const DATA_PREFIX: &str = "data:";
/// Payload that ends the stream before the connection closes
pub const DONE_SENTINEL: &str = "[DONE]";

/// One decoded `data:` line
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Zero-based arrival order within the exchange
    pub sequence: u64,
    pub event: StreamEvent,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecoderStats {
    pub frames: u64,
    /// Non-blank lines without the frame prefix
    pub ignored_lines: u64,
    /// Prefixed lines whose payload did not parse
    pub malformed_lines: u64,
}

/// Incremental line decoder for one response body.
///
/// Chunks may split anywhere, including inside a line or a multi-byte character. Bytes
/// after the last newline stay buffered until the next `push` or `finish`. Once the
/// sentinel is seen the decoder is done and ignores all further input.
#[derive(Debug, Default)]
pub struct EventDecoder {
    buffer: Vec<u8>,
    /// Leading bytes of `buffer` already searched for a newline
    scanned: usize,
    stats: DecoderStats,
    done: bool,
}

impl EventDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the next chunk, returning every frame it completes
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Frame> {
        let mut frames = Vec::new();
        if self.done {
            return frames;
        }

        self.buffer.extend_from_slice(chunk);
        while let Some(offset) = self.buffer[self.scanned..]
            .iter()
            .position(|byte| *byte == b'\n')
        {
            let pos = self.scanned + offset;
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            self.scanned = 0;
            if let Some(frame) = self.decode_line(&line[..pos]) {
                frames.push(frame);
            }
            if self.done {
                self.buffer.clear();
                return frames;
            }
        }
        self.scanned = self.buffer.len();
        frames
    }

    /// Signal end-of-stream. An unterminated trailing line is decoded as a last line.
    pub fn finish(&mut self) -> Option<Frame> {
        if self.done {
            return None;
        }
        let rest = std::mem::take(&mut self.buffer);
        self.scanned = 0;
        let frame = self.decode_line(&rest);
        self.done = true;
        frame
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    pub fn stats(&self) -> DecoderStats {
        self.stats
    }

    fn decode_line(&mut self, raw: &[u8]) -> Option<Frame> {
        let line = String::from_utf8_lossy(raw);
        let line = line.strip_suffix('\r').unwrap_or(&line);

        let Some(payload) = line.strip_prefix(DATA_PREFIX) else {
            if !line.trim().is_empty() {
                self.stats.ignored_lines += 1;
                tracing::trace!(line, "ignoring line without data prefix");
            }
            return None;
        };
        let payload = payload.strip_prefix(' ').unwrap_or(payload);

        if payload.trim() == DONE_SENTINEL {
            tracing::debug!(frames = self.stats.frames, "stream sentinel received");
            self.done = true;
            return None;
        }

        match serde_json::from_str::<StreamEvent>(payload) {
            Ok(event) => {
                let frame = Frame {
                    sequence: self.stats.frames,
                    event,
                };
                self.stats.frames += 1;
                Some(frame)
            }
            Err(error) => {
                self.stats.malformed_lines += 1;
                tracing::warn!(%error, payload, "failed to parse stream data, skipping line");
                None
            }
        }
    }
}

/// Lazily decode a body of byte chunks into frames.
///
/// The sequence ends at the sentinel or at end-of-body, whichever comes first. A chunk
/// error is passed through as the last item. Decoder counts are logged at debug level
/// when the sequence ends.
pub fn decode_stream<S, B, E>(body: S) -> impl Stream<Item = Result<Frame, E>>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
{
    async_stream::stream! {
        let mut decoder = EventDecoder::new();
        futures::pin_mut!(body);

        while let Some(chunk) = body.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(error) => {
                    log_finished(decoder.stats(), "body error");
                    yield Err(error);
                    return;
                }
            };
            for frame in decoder.push(chunk.as_ref()) {
                yield Ok(frame);
            }
            if decoder.is_done() {
                log_finished(decoder.stats(), "sentinel");
                return;
            }
        }

        if let Some(frame) = decoder.finish() {
            yield Ok(frame);
        }
        log_finished(decoder.stats(), "end of body");
    }
}

fn log_finished(stats: DecoderStats, ended_by: &str) {
    tracing::debug!(
        frames = stats.frames,
        ignored_lines = stats.ignored_lines,
        malformed_lines = stats.malformed_lines,
        ended_by,
        "event stream finished"
    );
}
