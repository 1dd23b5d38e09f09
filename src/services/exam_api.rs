use anyhow::Context;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Url};
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

use crate::core::config::ApiSettings;
use crate::core::state::SessionContext;
use crate::schemas::attempt::SaveAnswerRequest;
use crate::schemas::{ExamAttempt, ExamDetail, Subject};

#[derive(Debug, Error)]
pub enum ApiClientError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("backend returned {status}: {detail}")]
    Status { status: u16, detail: String },
    #[error("unexpected response body: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("cannot build request url from base {0}")]
    InvalidUrl(String),
}

impl ApiClientError {
    /// Message suitable for a toast: the backend detail when there is one.
    pub fn detail(&self) -> String {
        match self {
            Self::Status { detail, .. } => detail.clone(),
            Self::Transport(err) if err.is_timeout() => "The server did not respond in time".into(),
            Self::Transport(_) => "Could not reach the server".into(),
            Self::Decode(_) | Self::InvalidUrl(_) => "Unexpected response from the server".into(),
        }
    }
}

/// Backend operations the exam session depends on.
#[async_trait]
pub trait ExamApi: Send + Sync {
    /// Starts an attempt or returns the in-progress one. Idempotent server-side.
    async fn start_attempt(&self, exam_id: &str) -> Result<ExamAttempt, ApiClientError>;

    async fn fetch_attempt(&self, attempt_id: &str) -> Result<ExamAttempt, ApiClientError>;

    async fn fetch_exam_detail(&self, exam_id: &str) -> Result<ExamDetail, ApiClientError>;

    /// Upsert of one answer keyed by attempt id and question id.
    async fn save_answer(
        &self,
        attempt_id: &str,
        question_id: &str,
        answer: &str,
    ) -> Result<(), ApiClientError>;

    async fn submit_attempt(&self, attempt_id: &str) -> Result<ExamAttempt, ApiClientError>;

    async fn fetch_subject(&self, subject_id: &str) -> Result<Subject, ApiClientError>;
}

#[derive(Debug, Clone)]
pub struct HttpExamApi {
    client: Client,
    base_url: Url,
    access_token: Option<String>,
}

impl HttpExamApi {
    pub fn new(settings: &ApiSettings, context: &SessionContext) -> anyhow::Result<Self> {
        let client = Client::builder()
            .connect_timeout(settings.connect_timeout())
            .timeout(settings.request_timeout())
            .build()
            .context("Failed to build exam API HTTP client")?;
        let base_url = Url::parse(&settings.base_url)
            .with_context(|| format!("Invalid exam API base url {}", settings.base_url))?;

        Ok(Self { client, base_url, access_token: context.access_token().map(str::to_string) })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiClientError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ApiClientError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.access_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send_raw(&self, request: RequestBuilder) -> Result<String, ApiClientError> {
        let response = self.authorize(request).send().await?;
        let status = response.status();
        let raw_body = response.text().await?;

        if !status.is_success() {
            return Err(ApiClientError::Status {
                status: status.as_u16(),
                detail: extract_error_detail(&raw_body, status.canonical_reason()),
            });
        }

        Ok(raw_body)
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<T, ApiClientError> {
        let raw_body = self.send_raw(request).await?;
        Ok(serde_json::from_str(&raw_body)?)
    }
}

#[async_trait]
impl ExamApi for HttpExamApi {
    async fn start_attempt(&self, exam_id: &str) -> Result<ExamAttempt, ApiClientError> {
        let url = self.endpoint(&["exams", exam_id, "attempts"])?;
        self.send_json(self.client.post(url)).await
    }

    async fn fetch_attempt(&self, attempt_id: &str) -> Result<ExamAttempt, ApiClientError> {
        let url = self.endpoint(&["attempts", attempt_id])?;
        self.send_json(self.client.get(url)).await
    }

    async fn fetch_exam_detail(&self, exam_id: &str) -> Result<ExamDetail, ApiClientError> {
        let url = self.endpoint(&["exams", exam_id, "detail"])?;
        self.send_json(self.client.get(url)).await
    }

    async fn save_answer(
        &self,
        attempt_id: &str,
        question_id: &str,
        answer: &str,
    ) -> Result<(), ApiClientError> {
        let url = self.endpoint(&["attempts", attempt_id, "answers", question_id])?;
        self.send_raw(self.client.put(url).json(&SaveAnswerRequest { answer })).await?;
        Ok(())
    }

    async fn submit_attempt(&self, attempt_id: &str) -> Result<ExamAttempt, ApiClientError> {
        let url = self.endpoint(&["attempts", attempt_id, "submit"])?;
        self.send_json(self.client.post(url)).await
    }

    async fn fetch_subject(&self, subject_id: &str) -> Result<Subject, ApiClientError> {
        let url = self.endpoint(&["subjects", subject_id])?;
        self.send_json(self.client.get(url)).await
    }
}

fn extract_error_detail(raw_body: &str, reason: Option<&str>) -> String {
    let fallback = || {
        let trimmed = raw_body.trim();
        if trimmed.is_empty() {
            reason.unwrap_or("unknown_error").to_string()
        } else {
            trimmed.to_string()
        }
    };

    let Ok(payload) = serde_json::from_str::<Value>(raw_body) else {
        return fallback();
    };

    if let Some(detail) = payload.get("detail") {
        if let Some(text) = detail.as_str() {
            return text.to_string();
        }
        if let Some(items) = detail.as_array() {
            let joined = items
                .iter()
                .filter_map(|item| {
                    item.get("msg")
                        .and_then(Value::as_str)
                        .or_else(|| item.get("message").and_then(Value::as_str))
                })
                .collect::<Vec<_>>()
                .join("; ");
            if !joined.is_empty() {
                return joined;
            }
        }
    }

    payload
        .get("message")
        .and_then(Value::as_str)
        .or_else(|| payload.get("error").and_then(Value::as_str))
        .map(str::to_string)
        .unwrap_or_else(fallback)
}
