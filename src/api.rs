//! Typed HTTP client for the Arys backend.
//!
//! One method per endpoint, each taking the bearer token explicitly so the
//! retry policy stays in [`crate::auth::AuthGate`]. Wire types mirror the
//! backend's field casing exactly (`userMessage`, `roleRequest`, `imgLink`).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart;
use serde::{Deserialize, Serialize};

use crate::auth::{Authenticator, BearerToken, Identity};
use crate::error::ClientError;

// -- Wire types -------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct LoginRequest {
    pub contact: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginResponse {
    #[serde(default)]
    pub jwt: Option<String>,
    #[serde(default)]
    pub contact: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub status: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
pub struct SignUpRequest {
    pub contact: String,
    pub password: String,
    pub nombres: String,
    #[serde(rename = "roleRequest")]
    pub role_request: RoleRequest,
}

#[derive(Debug, Serialize)]
pub struct RoleRequest {
    #[serde(rename = "roleListName")]
    pub role_list_name: Vec<String>,
}

impl SignUpRequest {
    /// Registration payload for a plain user account.
    pub fn user(identity: &Identity, names: &str) -> Self {
        Self {
            contact: identity.contact.clone(),
            password: identity.password.clone(),
            nombres: names.to_string(),
            role_request: RoleRequest {
                role_list_name: vec!["USER".to_string()],
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TextRequest {
    #[serde(rename = "userMessage")]
    pub user_message: String,
}

/// One conversation turn from the history endpoint. Any field may be
/// absent; an entry carries either a text reply or an image link.
#[derive(Debug, Clone, Deserialize)]
pub struct HistoryEntry {
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub arys: Option<String>,
    #[serde(default, rename = "imgLink")]
    pub img_link: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct HistoryResponse {
    #[serde(default)]
    pub data: Vec<HistoryEntry>,
    /// Pagination envelope, passed through untyped; the client only echoes
    /// the key back.
    #[serde(default)]
    pub pagination: Option<serde_json::Value>,
}

// -- Client -----------------------------------------------------------------

/// Connection settings for one backend.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Base URL, e.g. `http://181.50.68.46:3940`.
    pub base_url: String,
    /// TCP connection timeout, applied to every call.
    pub connect_timeout: Duration,
    /// Total deadline for short request/response calls. Streaming and
    /// generation calls are long-lived by design and carry no deadline.
    pub request_timeout: Duration,
}

impl ApiConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            connect_timeout: Duration::from_secs(3),
            request_timeout: Duration::from_secs(10),
        }
    }
}

/// HTTP wrapper for the six backend endpoints.
pub struct ArysApi {
    client: reqwest::Client,
    config: ApiConfig,
}

impl ArysApi {
    pub fn new(config: ApiConfig) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| ClientError::Connect {
                url: config.base_url.clone(),
                detail: e.to_string(),
            })?;
        Ok(Self { client, config })
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn check_status(url: &str, resp: &reqwest::Response) -> Result<(), ClientError> {
        let status = resp.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(ClientError::Http {
                status: status.as_u16(),
                url: url.to_string(),
            })
        }
    }

    /// `POST /auth/log-in`
    pub async fn log_in_raw(&self, identity: &Identity) -> Result<LoginResponse, ClientError> {
        let url = self.url("/auth/log-in");
        let body = LoginRequest {
            contact: identity.contact.clone(),
            password: identity.password.clone(),
        };
        let resp = self
            .client
            .post(&url)
            .timeout(self.config.request_timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| ClientError::connect(&url, &e))?;
        Self::check_status(&url, &resp)?;
        resp.json().await.map_err(|e| ClientError::Parse {
            context: "login response".into(),
            detail: e.to_string(),
        })
    }

    /// `POST /auth/sign-up`. Registration does not log the account in; the
    /// caller authenticates afterwards.
    pub async fn sign_up(&self, identity: &Identity, names: &str) -> Result<(), ClientError> {
        let url = self.url("/auth/sign-up");
        let resp = self
            .client
            .post(&url)
            .timeout(self.config.request_timeout)
            .json(&SignUpRequest::user(identity, names))
            .send()
            .await
            .map_err(|e| ClientError::connect(&url, &e))?;
        Self::check_status(&url, &resp)
    }

    /// `GET /llmText/arys-history?paginationSize=&paginationKey=`
    pub async fn history(
        &self,
        token: &BearerToken,
        pagination_size: u32,
        pagination_key: u64,
    ) -> Result<HistoryResponse, ClientError> {
        let url = self.url("/llmText/arys-history");
        let resp = self
            .client
            .get(&url)
            .timeout(self.config.request_timeout)
            .query(&[
                ("paginationSize", pagination_size.to_string()),
                ("paginationKey", pagination_key.to_string()),
            ])
            .bearer_auth(token.as_str())
            .send()
            .await
            .map_err(|e| ClientError::connect(&url, &e))?;
        Self::check_status(&url, &resp)?;
        resp.json().await.map_err(|e| ClientError::Parse {
            context: "history response".into(),
            detail: e.to_string(),
        })
    }

    /// `POST /llmText/arys-txt` — returns the status-checked response with
    /// the chunked body unread, for the caller to reassemble.
    pub async fn send_text(
        &self,
        token: &BearerToken,
        user_message: &str,
    ) -> Result<reqwest::Response, ClientError> {
        let url = self.url("/llmText/arys-txt");
        let resp = self
            .client
            .post(&url)
            .json(&TextRequest {
                user_message: user_message.to_string(),
            })
            .bearer_auth(token.as_str())
            .send()
            .await
            .map_err(|e| ClientError::connect(&url, &e))?;
        Self::check_status(&url, &resp)?;
        Ok(resp)
    }

    /// `POST /llmImage/arys-img-byte` — whole binary image payload.
    pub async fn generate_image(
        &self,
        token: &BearerToken,
        user_message: &str,
    ) -> Result<Vec<u8>, ClientError> {
        let url = self.url("/llmImage/arys-img-byte");
        let resp = self
            .client
            .post(&url)
            .json(&TextRequest {
                user_message: user_message.to_string(),
            })
            .bearer_auth(token.as_str())
            .send()
            .await
            .map_err(|e| ClientError::connect(&url, &e))?;
        Self::check_status(&url, &resp)?;
        let bytes = resp.bytes().await.map_err(|e| ClientError::Parse {
            context: "image payload".into(),
            detail: e.to_string(),
        })?;
        Ok(bytes.to_vec())
    }

    /// `POST /llmBos/arys-bos-streaming` — uploads an audio file as the
    /// multipart `file` field; returns the status-checked response whose
    /// chunked body is the stream of speech fragments.
    pub async fn send_audio(
        &self,
        token: &BearerToken,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<reqwest::Response, ClientError> {
        let url = self.url("/llmBos/arys-bos-streaming");
        let part = multipart::Part::bytes(bytes).file_name(file_name.to_string());
        let form = multipart::Form::new().part("file", part);
        let resp = self
            .client
            .post(&url)
            .multipart(form)
            .bearer_auth(token.as_str())
            .send()
            .await
            .map_err(|e| ClientError::connect(&url, &e))?;
        Self::check_status(&url, &resp)?;
        Ok(resp)
    }
}

#[async_trait]
impl Authenticator for ArysApi {
    async fn log_in(&self, identity: &Identity) -> Result<BearerToken, ClientError> {
        let resp = self.log_in_raw(identity).await?;
        match resp.jwt {
            Some(jwt) => Ok(BearerToken::new(jwt)),
            None => Err(ClientError::Auth {
                detail: resp
                    .message
                    .unwrap_or_else(|| "login response carried no jwt".into()),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_request_wire_shape() {
        let json = serde_json::to_value(LoginRequest {
            contact: "user@host".into(),
            password: "pw".into(),
        })
        .expect("serialize");
        assert_eq!(json["contact"], "user@host");
        assert_eq!(json["password"], "pw");
    }

    #[test]
    fn test_sign_up_request_wire_casing() {
        let identity = Identity::new("user@host", "pw");
        let json = serde_json::to_value(SignUpRequest::user(&identity, "Ada Lovelace"))
            .expect("serialize");
        assert_eq!(json["nombres"], "Ada Lovelace");
        assert_eq!(json["roleRequest"]["roleListName"][0], "USER");
        // No snake_case leakage on the wire.
        assert!(json.get("role_request").is_none());
    }

    #[test]
    fn test_text_request_uses_user_message_key() {
        let json = serde_json::to_value(TextRequest {
            user_message: "hola".into(),
        })
        .expect("serialize");
        assert_eq!(json["userMessage"], "hola");
        assert!(json.get("user_message").is_none());
    }

    #[test]
    fn test_login_response_full() {
        let json = r#"{"jwt":"abc","contact":"u@h","message":"ok","status":200}"#;
        let resp: LoginResponse = serde_json::from_str(json).expect("deser");
        assert_eq!(resp.jwt.as_deref(), Some("abc"));
        assert_eq!(resp.contact.as_deref(), Some("u@h"));
    }

    #[test]
    fn test_login_response_missing_jwt() {
        let json = r#"{"message":"bad credentials"}"#;
        let resp: LoginResponse = serde_json::from_str(json).expect("deser");
        assert!(resp.jwt.is_none());
        assert_eq!(resp.message.as_deref(), Some("bad credentials"));
    }

    #[test]
    fn test_history_entry_image_turn() {
        let json = r#"{"user":"draw a cat","imgLink":"http://host/cat.png","arys":null}"#;
        let entry: HistoryEntry = serde_json::from_str(json).expect("deser");
        assert_eq!(entry.user.as_deref(), Some("draw a cat"));
        assert_eq!(entry.img_link.as_deref(), Some("http://host/cat.png"));
        assert!(entry.arys.is_none());
    }

    #[test]
    fn test_history_response_defaults() {
        let resp: HistoryResponse = serde_json::from_str("{}").expect("deser");
        assert!(resp.data.is_empty());
        assert!(resp.pagination.is_none());
    }

    #[test]
    fn test_history_response_with_entries() {
        let json = r#"{"data":[{"user":"hi","arys":"hello"}],"pagination":{"key":7}}"#;
        let resp: HistoryResponse = serde_json::from_str(json).expect("deser");
        assert_eq!(resp.data.len(), 1);
        assert_eq!(resp.data[0].arys.as_deref(), Some("hello"));
        assert_eq!(resp.pagination.expect("pagination")["key"], 7);
    }

    #[test]
    fn test_url_joining_trims_trailing_slash() {
        let api = ArysApi::new(ApiConfig::new("http://host:3940/")).expect("client");
        assert_eq!(api.url("/auth/log-in"), "http://host:3940/auth/log-in");
    }
}
