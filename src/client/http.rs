use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::core::{Config, EndPayload, StartPayload, StudySession, SummaryFailure};

/// A remote-call failure, split into the two classes the dashboard surfaces
/// differently: the backend answered with an error, or the request never
/// completed at all.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("backend returned {status}: {message}")]
    Server { status: StatusCode, message: String },
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

impl From<ApiError> for SummaryFailure {
    fn from(error: ApiError) -> Self {
        match error {
            ApiError::Server { message, .. } => {
                let message = message.trim().to_string();
                SummaryFailure::Server(if message.is_empty() {
                    None
                } else {
                    Some(message)
                })
            }
            ApiError::Transport(_) => SummaryFailure::Transport,
        }
    }
}

/// `POST /study/start` responses have carried the new id under either `id`
/// or `sessionId` depending on backend version; accept both.
#[derive(Debug, Deserialize)]
struct StartSessionResponse {
    #[serde(alias = "sessionId")]
    id: String,
}

#[derive(Debug, Serialize)]
struct AiSummaryRequest<'a> {
    sessions: &'a [StudySession],
}

#[derive(Debug, Deserialize)]
struct AiSummaryResponse {
    #[serde(default)]
    summary: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: Option<String>,
}

/// HTTP client for the Remote Session Service (the `/study/*` endpoints).
#[derive(Debug, Clone)]
pub struct StudySyncClient {
    base_url: String,
    client: Client,
}

impl StudySyncClient {
    pub fn new(base_url: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");

        StudySyncClient { base_url, client }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.backend.base_url.clone())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Quick reachability probe for status output.
    pub async fn is_reachable(&self) -> bool {
        self.client
            .get(format!("{}/study/all", self.base_url))
            .timeout(Duration::from_secs(2))
            .send()
            .await
            .map(|r| r.status().is_success())
            .unwrap_or(false)
    }

    /// Fetch every session the backend knows about. An empty array is a
    /// valid answer meaning "no sessions yet".
    pub async fn fetch_sessions(&self) -> Result<Vec<StudySession>, ApiError> {
        let url = format!("{}/study/all", self.base_url);
        tracing::debug!("GET {}", url);

        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(server_error(response).await);
        }

        let sessions: Vec<StudySession> = response.json().await?;
        tracing::debug!("Fetched {} sessions", sessions.len());
        Ok(sessions)
    }

    /// Create a session server-side; returns the assigned id.
    pub async fn start_session(&self, payload: &StartPayload) -> Result<String, ApiError> {
        let url = format!("{}/study/start", self.base_url);
        tracing::debug!("POST {} subject={}", url, payload.subject);

        let response = self.client.post(&url).json(payload).send().await?;
        if !response.status().is_success() {
            return Err(server_error(response).await);
        }

        let started: StartSessionResponse = response.json().await?;
        tracing::info!("Session started with id {}", started.id);
        Ok(started.id)
    }

    /// Close a session server-side. The acknowledgment body is not
    /// validated beyond HTTP success.
    pub async fn end_session(&self, payload: &EndPayload) -> Result<(), ApiError> {
        let url = format!("{}/study/end", self.base_url);
        tracing::debug!(
            "POST {} session={} minutes={}",
            url,
            payload.session_id,
            payload.duration_minutes
        );

        let response = self.client.post(&url).json(payload).send().await?;
        if !response.status().is_success() {
            return Err(server_error(response).await);
        }

        tracing::info!("Session {} ended", payload.session_id);
        Ok(())
    }

    /// Ask the backend for an AI summary of the given sessions.
    pub async fn ai_summary(
        &self,
        sessions: &[StudySession],
    ) -> Result<Option<String>, ApiError> {
        let url = format!("{}/study/ai-summary", self.base_url);
        tracing::debug!("POST {} ({} sessions)", url, sessions.len());

        let response = self
            .client
            .post(&url)
            .json(&AiSummaryRequest { sessions })
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(server_error(response).await);
        }

        let body: AiSummaryResponse = response.json().await?;
        Ok(body.summary)
    }
}

/// Turn a non-success response into `ApiError::Server`, preferring the
/// `{error}` payload the backend uses over raw body text.
async fn server_error(response: Response) -> ApiError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&body)
        .ok()
        .and_then(|b| b.error)
        .unwrap_or(body);
    tracing::warn!("Backend error {}: {}", status, message);
    ApiError::Server { status, message }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_response_accepts_either_id_field() {
        let by_id: StartSessionResponse = serde_json::from_str(r#"{"id": "abc123"}"#).unwrap();
        assert_eq!(by_id.id, "abc123");

        let by_session_id: StartSessionResponse =
            serde_json::from_str(r#"{"sessionId": "xyz789"}"#).unwrap();
        assert_eq!(by_session_id.id, "xyz789");
    }

    #[test]
    fn server_errors_map_to_summary_fallbacks() {
        let with_payload = ApiError::Server {
            status: StatusCode::BAD_GATEWAY,
            message: "model overloaded".to_string(),
        };
        assert_eq!(
            SummaryFailure::from(with_payload),
            SummaryFailure::Server(Some("model overloaded".to_string()))
        );

        let empty = ApiError::Server {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: "  ".to_string(),
        };
        assert_eq!(SummaryFailure::from(empty), SummaryFailure::Server(None));
    }
}
