//! STOMP frame stream parser
//!
//! Parses the STOMP 1.2 wire format:
//! - the first line holds the command
//! - `name:value` lines hold headers until an empty line
//! - the body runs until a NUL byte, or for exactly `content-length` bytes
//! - bare EOLs between frames are heart-beats and are skipped
//!
//! Input may arrive split at arbitrary byte boundaries. A frame larger than
//! the parser's limit drops everything buffered and yields
//! [`FrameError::FrameTooLarge`]; the connection should then be closed.

use crate::frame::{escapes_headers, unescape_header, Command, Frame, FrameError};

/// Default upper bound on a single frame, headers and NUL included
pub const DEFAULT_MAX_FRAME_SIZE: usize = 1024 * 1024;

/// Streaming STOMP parser that accumulates bytes and yields complete frames
pub struct FrameParser {
    /// Bytes not yet consumed by a complete frame
    buffer: Vec<u8>,
    max_frame_size: usize,
}

/// Location of a fully buffered frame
struct FrameBounds {
    /// Offset of the first body byte
    body_start: usize,
    /// Offset of the terminating NUL
    body_end: usize,
}

impl FrameParser {
    /// Create a new parser
    pub fn new() -> Self {
        Self::with_max_frame_size(DEFAULT_MAX_FRAME_SIZE)
    }

    /// Create a parser that rejects frames longer than `max_frame_size` bytes
    pub fn with_max_frame_size(max_frame_size: usize) -> Self {
        Self {
            buffer: Vec::new(),
            max_frame_size,
        }
    }

    /// Feed bytes into the parser and return any complete frames.
    ///
    /// A frame that fails to decode is returned as an error and skipped so
    /// later frames in the stream still parse.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<Result<Frame, FrameError>> {
        self.buffer.extend_from_slice(bytes);

        let mut frames = Vec::new();

        loop {
            self.skip_heartbeats();
            if self.buffer.is_empty() {
                break;
            }

            let bounds = match self.locate_frame() {
                Ok(Some(bounds)) => bounds,
                Ok(None) => break,
                Err((err, consumed)) => {
                    tracing::warn!(error = %err, "Dropping malformed STOMP frame");
                    self.buffer.drain(..consumed);
                    frames.push(Err(err));
                    continue;
                }
            };

            let decoded = decode_frame(&self.buffer[..bounds.body_end], bounds.body_start);
            self.buffer.drain(..=bounds.body_end);
            frames.push(decoded);
        }

        frames
    }

    /// Reset the parser state (e.g., on reconnect)
    pub fn reset(&mut self) {
        self.buffer.clear();
    }

    /// Number of buffered bytes waiting for the rest of a frame
    pub fn pending_len(&self) -> usize {
        self.buffer.len()
    }

    fn skip_heartbeats(&mut self) {
        let skip = self
            .buffer
            .iter()
            .take_while(|b| **b == b'\n' || **b == b'\r')
            .count();
        if skip > 0 {
            self.buffer.drain(..skip);
        }
    }

    /// Find the header terminator and the body end of the frame at the
    /// start of the buffer. `Ok(None)` means more bytes are needed.
    fn locate_frame(&self) -> Result<Option<FrameBounds>, (FrameError, usize)> {
        let Some(body_start) = find_header_end(&self.buffer) else {
            return self.need_more();
        };

        let content_length = content_length(&self.buffer[..body_start]);

        match content_length {
            Some(len) => {
                // body_end indexes the NUL, so the frame spans body_end + 1 bytes
                let body_end = match body_start.checked_add(len) {
                    Some(end) if end < self.max_frame_size => end,
                    _ => return Err(self.too_large()),
                };
                if self.buffer.len() <= body_end {
                    return Ok(None);
                }
                if self.buffer[body_end] != 0 {
                    // Resynchronise on the next NUL, if any has arrived yet
                    return match self.buffer[body_start..].iter().position(|b| *b == 0) {
                        Some(pos) => Err((
                            FrameError::ContentLengthMismatch(len),
                            body_start + pos + 1,
                        )),
                        None => Ok(None),
                    };
                }
                Ok(Some(FrameBounds {
                    body_start,
                    body_end,
                }))
            }
            None => match self.buffer[body_start..].iter().position(|b| *b == 0) {
                Some(pos) if body_start + pos < self.max_frame_size => Ok(Some(FrameBounds {
                    body_start,
                    body_end: body_start + pos,
                })),
                Some(_) => Err(self.too_large()),
                None => self.need_more(),
            },
        }
    }

    /// `Ok(None)` while the partial frame still fits under the limit
    fn need_more(&self) -> Result<Option<FrameBounds>, (FrameError, usize)> {
        if self.buffer.len() >= self.max_frame_size {
            Err(self.too_large())
        } else {
            Ok(None)
        }
    }

    fn too_large(&self) -> (FrameError, usize) {
        (FrameError::FrameTooLarge(self.max_frame_size), self.buffer.len())
    }
}

impl Default for FrameParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Offset just past the empty line that closes the header block
fn find_header_end(buf: &[u8]) -> Option<usize> {
    let mut line_start = 0;
    while let Some(pos) = buf[line_start..].iter().position(|b| *b == b'\n') {
        let line_end = line_start + pos;
        let line = &buf[line_start..line_end];
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        if line.is_empty() && line_start > 0 {
            return Some(line_end + 1);
        }
        line_start = line_end + 1;
    }
    None
}

/// Raw scan for `content-length` so the body size is known before decoding
fn content_length(header_block: &[u8]) -> Option<usize> {
    let text = std::str::from_utf8(header_block).ok()?;
    text.lines()
        .skip(1)
        .filter_map(|line| line.trim_end_matches('\r').split_once(':'))
        .find(|(name, _)| *name == "content-length")
        .and_then(|(_, value)| value.trim().parse().ok())
}

fn decode_frame(bytes: &[u8], body_start: usize) -> Result<Frame, FrameError> {
    let head = std::str::from_utf8(&bytes[..body_start]).map_err(|_| FrameError::InvalidUtf8)?;
    let body = std::str::from_utf8(&bytes[body_start..]).map_err(|_| FrameError::InvalidUtf8)?;

    let mut lines = head.lines().map(|l| l.trim_end_matches('\r'));

    let command: Command = lines.next().unwrap_or_default().parse()?;
    let escaped = escapes_headers(command);

    let mut headers = Vec::new();
    for line in lines {
        if line.is_empty() {
            break;
        }
        let (name, value) = line
            .split_once(':')
            .ok_or_else(|| FrameError::MalformedHeader(line.to_string()))?;
        if escaped {
            headers.push((unescape_header(name)?, unescape_header(value)?));
        } else {
            headers.push((name.to_string(), value.to_string()));
        }
    }

    Ok(Frame {
        command,
        headers,
        body: body.to_string(),
    })
}
