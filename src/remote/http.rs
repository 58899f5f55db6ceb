//! HTTP implementation of the remote engine wire contract.
//!
//! - `GET  /health`
//! - `GET  /check-document/{id}`
//! - `POST /activate-document/{id}`
//! - `POST /upload-pdf` (multipart `file` + `document_id`)
//! - `POST /reactivate-document/{id}`
//!
//! Every request carries the session header and, when a credential is
//! available, a bearer token.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Method, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use crate::error::{ActivationError, Result, SetupError};
use crate::remote::{ActivationStatus, ReactivateResponse, RemoteEngine};

/// Header scoping anonymous sessions on the remote engine
pub const SESSION_HEADER: &str = "X-Session-ID";

/// Longest remote error text kept in a diagnostic
const MAX_REMOTE_MESSAGE: usize = 500;

// == Credentials ==
/// Source of the bearer credential. Token retrieval itself lives outside
/// this crate.
pub trait CredentialProvider: Send + Sync {
    fn bearer_token(&self) -> Option<String>;
}

/// A fixed credential, or none for anonymous sessions.
#[derive(Debug, Clone, Default)]
pub struct StaticCredential(pub Option<String>);

impl CredentialProvider for StaticCredential {
    fn bearer_token(&self) -> Option<String> {
        self.0.clone()
    }
}

#[derive(Deserialize)]
struct CheckResponse {
    exists: bool,
}

#[derive(Deserialize)]
struct ActivateResponse {
    status: String,
}

#[derive(Deserialize)]
struct UploadResponse {
    #[serde(default, alias = "doc_id", alias = "id")]
    document_id: Option<String>,
}

// == HTTP Remote Engine ==
pub struct HttpRemoteEngine {
    client: reqwest::Client,
    base_url: Url,
    probe_timeout: Duration,
    session_id: Option<String>,
    credentials: Arc<dyn CredentialProvider>,
}

impl HttpRemoteEngine {
    pub fn new(base_url: &str, probe_timeout: Duration) -> std::result::Result<Self, SetupError> {
        let parsed = Url::parse(base_url).map_err(|e| SetupError::InvalidUrl {
            url: base_url.to_string(),
            reason: e.to_string(),
        })?;
        if parsed.cannot_be_a_base() {
            return Err(SetupError::InvalidUrl {
                url: base_url.to_string(),
                reason: "not a base URL".to_string(),
            });
        }

        Ok(Self {
            client: reqwest::Client::builder().build()?,
            base_url: parsed,
            probe_timeout,
            session_id: None,
            credentials: Arc::new(StaticCredential::default()),
        })
    }

    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_credentials(mut self, credentials: Arc<dyn CredentialProvider>) -> Self {
        self.credentials = credentials;
        self
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        // cannot_be_a_base was rejected in `new`
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn request(&self, method: Method, segments: &[&str]) -> RequestBuilder {
        let mut builder = self.client.request(method, self.endpoint(segments));
        if let Some(session_id) = &self.session_id {
            builder = builder.header(SESSION_HEADER, session_id);
        }
        if let Some(token) = self.credentials.bearer_token() {
            builder = builder.bearer_auth(token);
        }
        builder
    }

    async fn send(&self, builder: RequestBuilder, context: &str) -> Result<Response> {
        let response = builder
            .send()
            .await
            .map_err(|e| ActivationError::NetworkUnavailable(format!("{}: {}", context, e)))?;

        if response.status().is_success() {
            Ok(response)
        } else {
            Err(classify_failure(response, context).await)
        }
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
        context: &str,
    ) -> Result<T> {
        let response = self.send(builder, context).await?;
        response.json::<T>().await.map_err(|e| {
            if e.is_decode() {
                ActivationError::Unknown(format!("{}: unexpected response body: {}", context, e))
            } else {
                ActivationError::NetworkUnavailable(format!("{}: {}", context, e))
            }
        })
    }
}

#[async_trait]
impl RemoteEngine for HttpRemoteEngine {
    async fn health(&self) -> Result<()> {
        let builder = self
            .request(Method::GET, &["health"])
            .timeout(self.probe_timeout);
        match builder.send().await {
            Ok(resp) if resp.status().is_success() => Ok(()),
            Ok(resp) => Err(ActivationError::NetworkUnavailable(format!(
                "health probe returned {}",
                resp.status()
            ))),
            Err(e) => Err(ActivationError::NetworkUnavailable(format!(
                "health probe failed: {}",
                e
            ))),
        }
    }

    async fn check_document(&self, document_id: &str) -> Result<bool> {
        let builder = self.request(Method::GET, &["check-document", document_id]);
        let body: CheckResponse = self.send_json(builder, "existence check").await?;
        Ok(body.exists)
    }

    async fn activate_document(&self, document_id: &str) -> Result<ActivationStatus> {
        let builder = self.request(Method::POST, &["activate-document", document_id]);
        let body: ActivateResponse = self.send_json(builder, "activation").await?;
        Ok(ActivationStatus::parse(&body.status))
    }

    async fn upload_document(
        &self,
        document_id: &str,
        display_name: &str,
        bytes: Vec<u8>,
    ) -> Result<String> {
        let size = bytes.len();
        let file_part = Part::bytes(bytes)
            .file_name(display_name.to_string())
            .mime_str("application/pdf")
            .map_err(|e| ActivationError::Unknown(format!("failed to build upload: {}", e)))?;
        let form = Form::new()
            .part("file", file_part)
            .text("document_id", document_id.to_string());

        debug!(document_id, size, "Uploading document");
        let builder = self.request(Method::POST, &["upload-pdf"]).multipart(form);
        let body: UploadResponse = self.send_json(builder, "upload").await?;
        Ok(body
            .document_id
            .unwrap_or_else(|| document_id.to_string()))
    }

    async fn reactivate_document(&self, document_id: &str) -> Result<ReactivateResponse> {
        let builder = self.request(Method::POST, &["reactivate-document", document_id]);
        self.send_json(builder, "reactivation").await
    }
}

// == Failure Classification ==
async fn classify_failure(response: Response, context: &str) -> ActivationError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let message = remote_message(&body).unwrap_or_else(|| status.to_string());
    classify_status(status, format!("{}: {}", context, message))
}

fn classify_status(status: StatusCode, detail: String) -> ActivationError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            ActivationError::AuthenticationFailed(detail)
        }
        StatusCode::NOT_FOUND => ActivationError::DocumentNotFound(detail),
        StatusCode::BAD_GATEWAY | StatusCode::SERVICE_UNAVAILABLE | StatusCode::GATEWAY_TIMEOUT => {
            ActivationError::NetworkUnavailable(detail)
        }
        s if s.is_client_error() => ActivationError::RemoteValidation(detail),
        _ => ActivationError::Unknown(detail),
    }
}

/// Pulls the human-readable message out of an error body: a JSON `detail`,
/// `error` or `message` string if present, otherwise the raw text.
fn remote_message(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }

    let from_json = serde_json::from_str::<serde_json::Value>(trimmed)
        .ok()
        .and_then(|value| {
            ["detail", "error", "message"]
                .iter()
                .find_map(|key| value.get(*key).and_then(|v| v.as_str()).map(str::to_string))
        });

    let message = from_json.unwrap_or_else(|| trimmed.to_string());
    Some(message.chars().take(MAX_REMOTE_MESSAGE).collect())
}
