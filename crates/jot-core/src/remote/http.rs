//! `reqwest` implementation of the remote note API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use super::{NoteFilter, NotePayload, RemoteError, RemoteNote, RemoteNoteClient};
use crate::config::RemoteConfig;
use crate::error::{Error, Result};

/// HTTP client for the `/v1/notes` API
#[derive(Clone)]
pub struct HttpNoteClient {
    base_url: String,
    auth_token: Option<String>,
    client: reqwest::Client,
}

impl std::fmt::Debug for HttpNoteClient {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("HttpNoteClient")
            .field("base_url", &self.base_url)
            .field("auth_token", &self.auth_token.as_ref().map(|_| "[REDACTED]"))
            .finish_non_exhaustive()
    }
}

impl HttpNoteClient {
    /// Build a client from remote configuration.
    ///
    /// `timeout` bounds every request; an expired request surfaces as
    /// [`RemoteError::Transient`].
    pub fn new(config: &RemoteConfig, timeout: Duration) -> Result<Self> {
        let base_url = config
            .api_base_url()
            .ok_or_else(|| Error::Config("remote api_base_url is not configured".to_string()))?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| Error::Config(format!("failed to build HTTP client: {error}")))?;

        Ok(Self {
            base_url,
            auth_token: config.auth_token(),
            client,
        })
    }

    fn notes_url(&self) -> String {
        format!("{}/v1/notes", self.base_url)
    }

    fn note_url(&self, remote_id: i64) -> String {
        format!("{}/v1/notes/{remote_id}", self.base_url)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let request = request.header(reqwest::header::ACCEPT, "application/json");
        match &self.auth_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

#[derive(Debug, Serialize)]
struct UpdateRequest<'a> {
    #[serde(flatten)]
    note: &'a NotePayload,
    base_updated_at: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct PreconditionBody {
    current: Option<RemoteNote>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: Option<String>,
    message: Option<String>,
}

#[async_trait]
impl RemoteNoteClient for HttpNoteClient {
    async fn list(&self, filter: &NoteFilter) -> std::result::Result<Vec<RemoteNote>, RemoteError> {
        let url = format!("{}{}", self.notes_url(), filter_query(filter));
        let response = self.authorize(self.client.get(url)).send().await?;
        let response = check_status(response).await?;
        Ok(response.json::<Vec<RemoteNote>>().await?)
    }

    async fn create(&self, note: &NotePayload) -> std::result::Result<RemoteNote, RemoteError> {
        let response = self
            .authorize(self.client.post(self.notes_url()))
            .json(note)
            .send()
            .await?;
        let response = check_status(response).await?;
        Ok(response.json::<RemoteNote>().await?)
    }

    async fn update(
        &self,
        remote_id: i64,
        note: &NotePayload,
        base_updated_at: Option<i64>,
    ) -> std::result::Result<RemoteNote, RemoteError> {
        let body = UpdateRequest {
            note,
            base_updated_at,
        };
        let response = self
            .authorize(self.client.put(self.note_url(remote_id)))
            .json(&body)
            .send()
            .await?;
        let response = check_status(response).await?;
        Ok(response.json::<RemoteNote>().await?)
    }

    async fn delete(&self, remote_id: i64) -> std::result::Result<(), RemoteError> {
        let response = self
            .authorize(self.client.delete(self.note_url(remote_id)))
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }
}

impl From<reqwest::Error> for RemoteError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_builder() {
            Self::Rejected(error.to_string())
        } else {
            Self::Transient(error.to_string())
        }
    }
}

async fn check_status(
    response: reqwest::Response,
) -> std::result::Result<reqwest::Response, RemoteError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(classify_status(status, &body))
}

fn classify_status(status: StatusCode, body: &str) -> RemoteError {
    match status {
        StatusCode::NOT_FOUND => RemoteError::NotFound,
        StatusCode::CONFLICT | StatusCode::PRECONDITION_FAILED => {
            let current = serde_json::from_str::<PreconditionBody>(body)
                .ok()
                .and_then(|payload| payload.current)
                .map(Box::new);
            RemoteError::PreconditionFailed { current }
        }
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            RemoteError::Unauthorized(describe_error(status, body))
        }
        StatusCode::REQUEST_TIMEOUT | StatusCode::TOO_MANY_REQUESTS => {
            RemoteError::Transient(describe_error(status, body))
        }
        status if status.is_server_error() => RemoteError::Transient(describe_error(status, body)),
        status => RemoteError::Rejected(describe_error(status, body)),
    }
}

fn describe_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<ApiErrorBody>(body) {
        if let Some(message) = payload.message.or(payload.error) {
            return format!("{} ({})", message.trim(), status.as_u16());
        }
    }

    let trimmed: String = body.trim().chars().take(180).collect();
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{trimmed} ({})", status.as_u16())
    }
}

fn filter_query(filter: &NoteFilter) -> String {
    let mut params = vec![format!("include_archived={}", filter.include_archived)];
    if let Some(kind) = filter.kind {
        params.push(format!("kind={kind}"));
    }
    if let Some(since) = filter.updated_since {
        params.push(format!("updated_since={since}"));
    }
    format!("?{}", params.join("&"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NoteKind;

    #[test]
    fn classify_status_maps_sync_relevant_codes() {
        assert_eq!(
            classify_status(StatusCode::NOT_FOUND, ""),
            RemoteError::NotFound
        );
        assert!(matches!(
            classify_status(StatusCode::UNAUTHORIZED, ""),
            RemoteError::Unauthorized(_)
        ));
        assert!(classify_status(StatusCode::BAD_GATEWAY, "").is_transient());
        assert!(classify_status(StatusCode::TOO_MANY_REQUESTS, "").is_transient());
        assert!(matches!(
            classify_status(StatusCode::UNPROCESSABLE_ENTITY, "{\"error\":\"too long\"}"),
            RemoteError::Rejected(message) if message == "too long (422)"
        ));
    }

    #[test]
    fn classify_precondition_extracts_current_version() {
        let body = r#"{"current":{"id":42,"content":"theirs","kind":"task","is_archived":false,"updated_at":1700}}"#;
        match classify_status(StatusCode::PRECONDITION_FAILED, body) {
            RemoteError::PreconditionFailed {
                current: Some(current),
            } => {
                assert_eq!(current.id, 42);
                assert_eq!(current.kind, NoteKind::Task);
            }
            other => panic!("expected precondition failure with current version, got {other:?}"),
        }

        assert_eq!(
            classify_status(StatusCode::CONFLICT, "not json"),
            RemoteError::PreconditionFailed { current: None }
        );
    }

    #[test]
    fn filter_query_includes_optional_fields() {
        assert_eq!(
            filter_query(&NoteFilter::default()),
            "?include_archived=true"
        );
        let filter = NoteFilter {
            include_archived: false,
            kind: Some(NoteKind::QuickCapture),
            updated_since: Some(10),
        };
        assert_eq!(
            filter_query(&filter),
            "?include_archived=false&kind=quick_capture&updated_since=10"
        );
    }

    #[test]
    fn new_requires_base_url_and_redacts_token() {
        let missing = RemoteConfig::default();
        assert!(HttpNoteClient::new(&missing, Duration::from_secs(1)).is_err());

        let config = RemoteConfig {
            api_base_url: Some("https://api.example.com/".to_string()),
            auth_token: Some("secret".to_string()),
        };
        let client = HttpNoteClient::new(&config, Duration::from_secs(1)).unwrap();
        assert_eq!(client.note_url(5), "https://api.example.com/v1/notes/5");

        let debug = format!("{client:?}");
        assert!(!debug.contains("secret"));
        assert!(debug.contains("[REDACTED]"));
    }
}
