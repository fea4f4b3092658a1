//! Incremental reassembly of a streamed chat completion.
//!
//! The backend delivers a completion as a chunked HTTP body whose payload is
//! a back-to-back sequence of JSON objects — no delimiter, no length prefix,
//! and chunk boundaries that land anywhere, including inside a multi-byte
//! UTF-8 sequence. [`StreamReassembler`] turns that into an ordered sequence
//! of text fragments, one per complete object, emitted as soon as each
//! object closes.
//!
//! Framing is done by a byte-level tokenizer that tracks brace depth, string
//! state and escape state; a top-level object is complete when depth returns
//! to zero. This makes the framing immune to `"}{"` appearing inside string
//! values and tolerant of whitespace between objects.

use serde::Deserialize;
use tracing::{debug, warn};

/// One object of the stream payload. Objects without a `text` field are
/// legal; they produce no fragment.
#[derive(Debug, Deserialize)]
struct StreamEvent {
    #[serde(default)]
    text: Option<String>,
}

/// Final accounting for one reassembled stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReassemblyStats {
    /// Fragments emitted.
    pub emitted: u64,
    /// Complete objects that failed to parse and were dropped.
    pub skipped: u64,
    /// Bytes of trailing incomplete object discarded at stream end.
    pub residue_bytes: usize,
}

/// Reassembles concatenated JSON objects from arbitrarily chunked bytes.
///
/// One instance serves exactly one response body; create a fresh one per
/// request and call [`finish`](Self::finish) when the stream ends.
#[derive(Debug, Default)]
pub struct StreamReassembler {
    buf: Vec<u8>,
    /// Next unexamined byte in `buf`.
    scan: usize,
    /// Offset of the `{` opening the object currently being read.
    start: Option<usize>,
    depth: u32,
    in_string: bool,
    escaped: bool,
    emitted: u64,
    skipped: u64,
}

impl StreamReassembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one network chunk and return every fragment completed by it,
    /// in arrival order. Fragments already emitted are never re-emitted.
    pub fn push_chunk(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(chunk);
        let mut fragments = Vec::new();

        while self.scan < self.buf.len() {
            let b = self.buf[self.scan];
            if self.in_string {
                if self.escaped {
                    self.escaped = false;
                } else if b == b'\\' {
                    self.escaped = true;
                } else if b == b'"' {
                    self.in_string = false;
                }
            } else {
                match b {
                    b'"' if self.depth > 0 => self.in_string = true,
                    b'{' => {
                        if self.depth == 0 {
                            self.start = Some(self.scan);
                        }
                        self.depth += 1;
                    }
                    b'}' if self.depth > 0 => {
                        self.depth -= 1;
                        if self.depth == 0 {
                            let start = self.start.take().unwrap_or(0);
                            let object = &self.buf[start..=self.scan];
                            match serde_json::from_slice::<StreamEvent>(object) {
                                Ok(event) => {
                                    if let Some(text) = event.text {
                                        self.emitted += 1;
                                        fragments.push(text);
                                    }
                                }
                                Err(e) => {
                                    self.skipped += 1;
                                    warn!(
                                        error = %e,
                                        object_len = object.len(),
                                        skipped = self.skipped,
                                        "dropping unparsable stream object"
                                    );
                                }
                            }
                        }
                    }
                    // Anything between objects (whitespace, stray bytes) is
                    // ignored until the next '{' opens a new object.
                    _ => {}
                }
            }
            self.scan += 1;
        }

        self.compact();
        fragments
    }

    /// Stream end. Any buffered incomplete object is discarded without
    /// emitting a fragment — the trailing-residue contract of the upstream
    /// protocol.
    pub fn finish(self) -> ReassemblyStats {
        let residue_bytes = self.buf.len();
        if residue_bytes > 0 {
            debug!(residue_bytes, "discarding incomplete trailing object");
        }
        ReassemblyStats {
            emitted: self.emitted,
            skipped: self.skipped,
            residue_bytes,
        }
    }

    /// Complete-but-unparsable objects dropped so far. Exposed so callers
    /// and tests can observe the log-and-continue policy.
    pub fn skipped_objects(&self) -> u64 {
        self.skipped
    }

    /// Drop consumed bytes, keeping only the open object (if any).
    fn compact(&mut self) {
        match self.start {
            Some(s) if s > 0 => {
                self.buf.drain(..s);
                self.scan -= s;
                self.start = Some(0);
            }
            Some(_) => {}
            None => {
                self.buf.clear();
                self.scan = 0;
            }
        }
    }
}
