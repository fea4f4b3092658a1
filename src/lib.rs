pub mod api;
pub mod audio;
pub mod auth;
pub mod cli;
pub mod config;
pub mod error;
pub mod stream;

use std::sync::Arc;

use futures_util::StreamExt;
use tokio::sync::mpsc;
use tracing::{debug, info};

use api::{ArysApi, HistoryResponse};
use audio::AudioPlaybackQueue;
use auth::{AuthGate, Authenticator, BearerToken, CredentialStore, FileCredentialStore, Identity};
use config::ClientConfig;
use error::ClientError;
use stream::{ReassemblyStats, StreamReassembler};

// ---------------------------------------------------------------------------
// ChatClient — the engine tying auth, streaming and playback together
// ---------------------------------------------------------------------------

/// Outcome of one streamed completion.
#[derive(Debug, Clone)]
pub struct StreamSummary {
    /// The full reply, all fragments concatenated.
    pub text: String,
    pub stats: ReassemblyStats,
}

/// High-level client for the Arys backend.
///
/// Every operation runs inside [`AuthGate::with_auth`], so an expired token
/// costs one transparent re-login and one retry, never more. Frontends
/// receive text incrementally over an unbounded channel, the same way each
/// fragment leaves the reassembler.
pub struct ChatClient {
    api: Arc<ArysApi>,
    auth: AuthGate,
    config: ClientConfig,
}

impl ChatClient {
    /// Build a client over an explicit credential store.
    pub fn new(config: ClientConfig, store: Arc<dyn CredentialStore>) -> Result<Self, ClientError> {
        let api = Arc::new(ArysApi::new(config.api_config())?);
        let authenticator: Arc<dyn Authenticator> = Arc::clone(&api) as _;
        let auth = AuthGate::new(authenticator, store);
        Ok(Self { api, auth, config })
    }

    /// Build a client persisting credentials at the configured path.
    pub fn from_config(config: ClientConfig) -> Result<Self, ClientError> {
        let store = Arc::new(FileCredentialStore::new(config.credentials_path()));
        Self::new(config, store)
    }

    pub fn auth(&self) -> &AuthGate {
        &self.auth
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Register a new account, then log it in.
    pub async fn register(&self, identity: Identity, names: &str) -> Result<(), ClientError> {
        self.api.sign_up(&identity, names).await?;
        info!(contact = %identity.contact, "account registered");
        self.auth.log_in(identity).await?;
        Ok(())
    }

    pub async fn log_in(&self, identity: Identity) -> Result<BearerToken, ClientError> {
        self.auth.log_in(identity).await
    }

    /// Send a chat message and reassemble the streamed reply.
    ///
    /// Each fragment is forwarded on `fragments` the moment its object
    /// completes; a dropped receiver does not interrupt the stream. The
    /// returned summary carries the concatenated reply and the per-stream
    /// accounting.
    pub async fn send_message(
        &self,
        user_message: &str,
        fragments: Option<mpsc::UnboundedSender<String>>,
    ) -> Result<StreamSummary, ClientError> {
        self.auth
            .with_auth(|token| {
                let fragments = fragments.clone();
                async move {
                    let resp = self.api.send_text(&token, user_message).await?;
                    let url = resp.url().to_string();
                    let mut body = resp.bytes_stream();
                    let mut reassembler = StreamReassembler::new();
                    let mut text = String::new();

                    while let Some(chunk) = body.next().await {
                        let chunk = chunk.map_err(|e| ClientError::Connect {
                            url: url.clone(),
                            detail: e.to_string(),
                        })?;
                        for fragment in reassembler.push_chunk(&chunk) {
                            text.push_str(&fragment);
                            if let Some(tx) = &fragments {
                                // Receiver may be gone; the reply still
                                // accumulates.
                                let _ = tx.send(fragment);
                            }
                        }
                    }

                    let stats = reassembler.finish();
                    debug!(
                        emitted = stats.emitted,
                        skipped = stats.skipped,
                        residue_bytes = stats.residue_bytes,
                        "completion stream finished"
                    );
                    Ok(StreamSummary { text, stats })
                }
            })
            .await
    }

    /// Fetch one page of conversation history.
    pub async fn fetch_history(
        &self,
        pagination_size: u32,
        pagination_key: u64,
    ) -> Result<HistoryResponse, ClientError> {
        self.auth
            .with_auth(|token| {
                let api = Arc::clone(&self.api);
                async move { api.history(&token, pagination_size, pagination_key).await }
            })
            .await
    }

    /// Generate an image for the prompt; returns the raw payload bytes.
    pub async fn generate_image(&self, prompt: &str) -> Result<Vec<u8>, ClientError> {
        self.auth
            .with_auth(|token| {
                let api = Arc::clone(&self.api);
                async move { api.generate_image(&token, prompt).await }
            })
            .await
    }

    /// Upload an audio file and feed the streamed speech fragments into the
    /// playback queue in arrival order. Returns the number of fragments
    /// enqueued; call [`AudioPlaybackQueue::wait_idle`] to wait for sound to
    /// finish.
    pub async fn speak(
        &self,
        file_name: &str,
        audio: Vec<u8>,
        queue: &AudioPlaybackQueue,
    ) -> Result<u64, ClientError> {
        self.auth
            .with_auth(|token| {
                let audio = audio.clone();
                async move {
                    let resp = self.api.send_audio(&token, file_name, audio).await?;
                    let url = resp.url().to_string();
                    let mut body = resp.bytes_stream();
                    let mut enqueued: u64 = 0;
                    let mut total_bytes: usize = 0;

                    while let Some(chunk) = body.next().await {
                        let chunk = chunk.map_err(|e| ClientError::Connect {
                            url: url.clone(),
                            detail: e.to_string(),
                        })?;
                        total_bytes += chunk.len();
                        queue.enqueue(chunk.to_vec());
                        enqueued += 1;
                    }

                    debug!(enqueued, total_bytes, "speech stream finished");
                    Ok(enqueued)
                }
            })
            .await
    }
}
