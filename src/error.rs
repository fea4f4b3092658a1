//! Crate-level error types.
//!
//! Variants carry enough context to diagnose a failure without inspecting
//! the originating error directly.

use thiserror::Error;

/// Errors surfaced by the client library.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The identity endpoint rejected the credentials, or a token renewal
    /// could not be completed.
    #[error("authentication failed: {detail}")]
    Auth { detail: String },

    /// A TCP/TLS-level connection or request transport failure.
    #[error("connection failed to {url}: {detail}")]
    Connect { url: String, detail: String },

    /// The remote server replied with a non-2xx HTTP status code.
    #[error("HTTP {status} from {url}")]
    Http { status: u16, url: String },

    /// A response body or local file could not be parsed as the expected
    /// structure.
    #[error("parse error in {context}: {detail}")]
    Parse { context: String, detail: String },

    /// Local file I/O failure (credential store, audio input file).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The playback backend could not be started. Per-fragment decode
    /// failures never surface here; the queue skips them internally.
    #[error("audio playback: {0}")]
    Playback(#[from] PlaybackError),
}

impl ClientError {
    /// True when the server signalled an expired or invalid bearer token,
    /// which is the trigger for the single re-authentication + retry in
    /// [`crate::auth::AuthGate::with_auth`].
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ClientError::Http { status: 401, .. })
    }

    pub(crate) fn connect(url: &str, err: &reqwest::Error) -> Self {
        ClientError::Connect {
            url: url.to_string(),
            detail: err.to_string(),
        }
    }
}

/// Failure of one audio fragment's decode or play cycle.
///
/// These are non-fatal by contract: the playback queue logs the error,
/// drops the fragment, and continues with the next one.
#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("fragment could not be decoded: {0}")]
    Decode(String),

    #[error("no audio output device available: {0}")]
    Device(String),

    #[error("empty audio fragment")]
    Empty,
}
