//! Bracket-depth framing for the peer byte stream.
//!
//! Peers write JSON values back to back with no length prefix and no
//! separator:
//!
//! ```text
//! {"func":"a"}{"func":"b"}[{"func":"c"},{"func":"d"}]
//! ```
//!
//! [`BracketDecoder`] counts `{`/`[` against `}`/`]` and hands each balanced
//! token to the JSON parser. Bytes outside any bracket (whitespace between
//! values) are dropped. Depth persists across [`BracketDecoder::feed`] calls,
//! so chunk boundaries may fall anywhere, including inside a multi-byte
//! UTF-8 sequence.
//!
//! # Modes
//!
//! [`FramingMode::Legacy`] counts every bracket byte, including those inside
//! string literals. A field such as `"name":"a}b"` therefore mis-frames;
//! this matches what deployed peers do. [`FramingMode::StringAware`] skips
//! brackets inside strings and is safe to enable once every peer in a room
//! uses it.
//!
//! # Token limit
//!
//! A token that grows past [`MAX_TOKEN_SIZE`] bytes stops being buffered.
//! Its brackets are still counted, and once it closes it is reported as a
//! single [`FramingError::Malformed`].

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::command::Command;
use crate::constants::MAX_TOKEN_SIZE;
use crate::error::FramingError;

/// Bytes of an overlong token kept for the error report.
const OVERFLOW_PREVIEW: usize = 64;

/// How bracket bytes inside JSON strings are treated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FramingMode {
    /// Every bracket byte is structural.
    #[default]
    Legacy,
    /// Brackets inside string literals are ignored.
    StringAware,
}

impl std::str::FromStr for FramingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "legacy" => Ok(Self::Legacy),
            "string_aware" | "string-aware" => Ok(Self::StringAware),
            other => Err(format!("unknown framing mode: {other}")),
        }
    }
}

/// Outcome of decoding one token (or one element of a batch token).
pub type Decoded = Result<Command, FramingError>;

/// Incremental decoder that turns arbitrary chunks into commands.
#[derive(Debug)]
pub struct BracketDecoder {
    buf: Vec<u8>,
    depth: usize,
    mode: FramingMode,
    in_string: bool,
    escaped: bool,
    max_token: usize,
    /// Current token passed `max_token`; bytes are counted, not kept.
    overflowed: bool,
}

impl Default for BracketDecoder {
    fn default() -> Self {
        Self {
            buf: Vec::new(),
            depth: 0,
            mode: FramingMode::default(),
            in_string: false,
            escaped: false,
            max_token: MAX_TOKEN_SIZE,
            overflowed: false,
        }
    }
}

impl BracketDecoder {
    /// Create a decoder in [`FramingMode::Legacy`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a decoder with an explicit mode.
    pub fn with_mode(mode: FramingMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    /// Replace the token size limit.
    #[must_use]
    pub fn with_max_token(mut self, max_token: usize) -> Self {
        self.max_token = max_token;
        self
    }

    /// Feed a chunk and return every token it completed, in stream order.
    ///
    /// Malformed tokens come back as errors in place; decoding continues
    /// with the next byte.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<Decoded> {
        let mut decoded = Vec::new();

        for &byte in bytes {
            if self.in_string {
                self.push(byte);
                if self.escaped {
                    self.escaped = false;
                } else if byte == b'\\' {
                    self.escaped = true;
                } else if byte == b'"' {
                    self.in_string = false;
                }
                continue;
            }

            match byte {
                b'{' | b'[' => {
                    self.push(byte);
                    self.depth += 1;
                }
                b'}' | b']' => {
                    // A closer with nothing open is noise between values.
                    if self.depth == 0 {
                        continue;
                    }
                    self.push(byte);
                    self.depth -= 1;
                }
                b'"' if self.depth > 0 && self.mode == FramingMode::StringAware => {
                    self.push(byte);
                    self.in_string = true;
                }
                _ if self.depth > 0 => self.push(byte),
                _ => {}
            }

            if self.depth == 0 && self.has_partial() {
                self.flush_token(&mut decoded);
            }
        }

        decoded
    }

    /// Returns true if an incomplete token is buffered.
    pub fn has_partial(&self) -> bool {
        !self.buf.is_empty() || self.overflowed
    }

    /// Current bracket nesting depth.
    pub fn depth(&self) -> usize {
        self.depth
    }

    fn push(&mut self, byte: u8) {
        if self.overflowed {
            return;
        }
        if self.buf.len() >= self.max_token {
            log::warn!(
                "[Framer] Token exceeds {} bytes, discarding until it closes",
                self.max_token
            );
            self.overflowed = true;
            self.buf.truncate(OVERFLOW_PREVIEW);
            self.buf.shrink_to_fit();
            return;
        }
        self.buf.push(byte);
    }

    fn flush_token(&mut self, out: &mut Vec<Decoded>) {
        if self.overflowed {
            self.overflowed = false;
            let buffer = String::from_utf8_lossy(&self.buf).into_owned();
            self.buf.clear();
            out.push(Err(FramingError::Malformed {
                buffer,
                reason: format!("token exceeds {} bytes", self.max_token),
            }));
            return;
        }
        match serde_json::from_slice::<Value>(&self.buf) {
            Ok(Value::Array(items)) => {
                out.extend(items.into_iter().map(Command::try_from));
            }
            Ok(value) => out.push(Command::try_from(value)),
            Err(e) => {
                let buffer = String::from_utf8_lossy(&self.buf).into_owned();
                log::warn!("[Framer] Discarding malformed token: buff:{buffer}");
                log::warn!("[Framer] {e}");
                out.push(Err(FramingError::Malformed {
                    buffer,
                    reason: e.to_string(),
                }));
            }
        }
        self.buf.clear();
    }
}
