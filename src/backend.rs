//! Contract with the remote document-processing API.
//!
//! The coordinator only sees [`DocumentBackend`]; [`HttpBackend`] is the
//! production implementation. Tests and embedders may inject their own
//! `Arc<dyn DocumentBackend>`.
//!
//! ```text
//! GET  {api_url}/health            reachability, body ignored
//! POST {api_url}/documents         {url, options} → {task_id} | completed document
//! GET  {api_url}/documents/{id}    {status: pending|completed|failed, …}
//! ```

use crate::config::WidgetConfig;
use crate::error::{AccessMaticError, ProcessingError};
use crate::output::{clamp_score, AccessibleResult, ComplianceLevel, ProcessingMethod};
use crate::pipeline::sanitize::sanitize_html;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Value of the `X-AccessMatic-SDK` header.
pub const SDK_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Task state reported by the status endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    Pending,
    Processing,
    Completed,
    Failed,
    #[serde(other)]
    Unknown,
}

/// Body of a submit or status response. Every field is optional because the
/// two endpoints and the inline-result variant share this shape.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BackendDocument {
    #[serde(default, alias = "id")]
    pub task_id: Option<String>,
    #[serde(default)]
    pub status: Option<TaskState>,
    #[serde(default)]
    pub accessible_html: Option<String>,
    #[serde(default)]
    pub accessibility_score: Option<f64>,
    #[serde(default, alias = "compliance_level")]
    pub wcag_compliance: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl BackendDocument {
    /// Turn a completed backend document into a sanitized result.
    pub fn into_result(self, source_url: &str) -> AccessibleResult {
        AccessibleResult {
            source_url: source_url.to_string(),
            accessible_html: sanitize_html(self.accessible_html.as_deref().unwrap_or_default()),
            accessibility_score: self.accessibility_score.map(clamp_score).unwrap_or(0),
            compliance_level: self
                .wcag_compliance
                .as_deref()
                .map(ComplianceLevel::from_label)
                .unwrap_or(ComplianceLevel::Partial),
            processing_method: ProcessingMethod::Remote,
            message: self.message,
        }
    }
}

/// What the submit endpoint handed back.
#[derive(Debug, Clone, PartialEq)]
pub enum Submission {
    /// Poll this task id.
    Task(String),
    /// The backend finished synchronously.
    Inline(BackendDocument),
}

/// The processing API as seen by the coordinator.
#[async_trait]
pub trait DocumentBackend: Send + Sync {
    /// Reachability check. Any `Err` means "unreachable".
    async fn health(&self) -> Result<(), ProcessingError>;

    /// Submit a PDF URL for processing.
    async fn submit(&self, pdf_url: &str) -> Result<Submission, ProcessingError>;

    /// Fetch the current state of a task.
    async fn status(&self, task_id: &str) -> Result<BackendDocument, ProcessingError>;
}

/// `reqwest`-based [`DocumentBackend`].
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    api_url: String,
}

#[derive(Debug, Serialize)]
struct SubmitRequest<'a> {
    url: &'a str,
    options: SubmitOptions,
}

#[derive(Debug, Serialize)]
struct SubmitOptions {
    wcag_version: &'static str,
    enable_table_recognition: bool,
    source: &'static str,
}

impl HttpBackend {
    /// Build a client that sends the bearer token on every request.
    ///
    /// Returns `Ok(None)` when the configuration has no usable API key.
    pub fn from_config(config: &WidgetConfig) -> Result<Option<Self>, AccessMaticError> {
        let Some(key) = config.api_key.as_deref().filter(|k| !k.trim().is_empty()) else {
            return Ok(None);
        };

        let mut headers = HeaderMap::new();
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", key.trim()))
            .map_err(|e| AccessMaticError::InvalidConfig(format!("api_key: {e}")))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);
        headers.insert("x-accessmatic-sdk", HeaderValue::from_static(SDK_VERSION));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| AccessMaticError::HttpClient(e.to_string()))?;

        Ok(Some(Self {
            client,
            api_url: config.api_url.trim_end_matches('/').to_string(),
        }))
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.api_url, path.trim_start_matches('/'))
    }
}

#[async_trait]
impl DocumentBackend for HttpBackend {
    async fn health(&self) -> Result<(), ProcessingError> {
        let response = self
            .client
            .get(self.endpoint("health"))
            .header("X-AccessMatic-Test", "connectivity")
            .send()
            .await
            .map_err(|e| ProcessingError::Connectivity {
                detail: e.to_string(),
            })?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(ProcessingError::Connectivity {
                detail: format!("HTTP {}", response.status()),
            })
        }
    }

    async fn submit(&self, pdf_url: &str) -> Result<Submission, ProcessingError> {
        let body = SubmitRequest {
            url: pdf_url,
            options: SubmitOptions {
                wcag_version: "2.1",
                enable_table_recognition: true,
                source: "sdk",
            },
        };

        let response = self
            .client
            .post(self.endpoint("documents"))
            .json(&body)
            .send()
            .await
            .map_err(|e| ProcessingError::Submission {
                status: None,
                detail: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProcessingError::Submission {
                status: Some(status.as_u16()),
                detail: format!("API Error: {status}"),
            });
        }

        let doc: BackendDocument =
            response
                .json()
                .await
                .map_err(|e| ProcessingError::Submission {
                    status: Some(status.as_u16()),
                    detail: format!("unreadable response: {e}"),
                })?;

        debug!("Submitted {}: {:?}", pdf_url, doc.task_id);
        submission_from(doc)
    }

    async fn status(&self, task_id: &str) -> Result<BackendDocument, ProcessingError> {
        let response = self
            .client
            .get(self.endpoint(&format!("documents/{task_id}")))
            .send()
            .await
            .map_err(|e| ProcessingError::PollTransport {
                task_id: task_id.to_string(),
                detail: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProcessingError::PollTransport {
                task_id: task_id.to_string(),
                detail: format!("Status check failed: {status}"),
            });
        }

        response
            .json()
            .await
            .map_err(|e| ProcessingError::PollTransport {
                task_id: task_id.to_string(),
                detail: format!("unreadable response: {e}"),
            })
    }
}

/// Decide whether a submit response is a task to poll or a finished document.
pub fn submission_from(doc: BackendDocument) -> Result<Submission, ProcessingError> {
    if doc.status == Some(TaskState::Completed) {
        return Ok(Submission::Inline(doc));
    }
    match doc.task_id {
        Some(id) if !id.trim().is_empty() => Ok(Submission::Task(id)),
        _ => Err(ProcessingError::Submission {
            status: None,
            detail: "response carried neither a task id nor a completed document".into(),
        }),
    }
}
