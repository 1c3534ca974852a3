//! POEditor API v2 client
//!
//! Talks to `https://api.poeditor.com/v2` with form-encoded POST requests.
//! Every JSON answer is wrapped in the same envelope:
//!
//! ```json
//! {
//!   "response": { "status": "success", "code": "200", "message": "OK" },
//!   "result": { ... }
//! }
//! ```
//!
//! `status == "fail"` is a logical failure and `message` is the diagnostic.
//!
//! # Authentication
//!
//! The client holds an API token. [`PoEditorClient::from_env`] reads it from
//! the `POEDITOR_API_KEY` environment variable.

use crate::error::{ServiceError, ServiceResult};
use crate::service::{ExportJob, Project, TranslationService, string_or_number};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::path::Path;

/// Production endpoint of the POEditor API
pub const DEFAULT_BASE_URL: &str = "https://api.poeditor.com/v2";

/// Interchange format requested for every export
pub const EXPORT_FORMAT: &str = "xliff_1_2";

/// Environment variable holding the API token
pub const API_KEY_ENV: &str = "POEDITOR_API_KEY";

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    response: ResponseStatus,
    result: Option<T>,
}

#[derive(Debug, Deserialize)]
struct ResponseStatus {
    status: String,
    #[serde(default, deserialize_with = "string_or_number")]
    code: String,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct ProjectList {
    #[serde(default)]
    projects: Vec<Project>,
}

#[derive(Debug, Deserialize)]
struct ExportResult {
    url: String,
}

/// POEditor API client
///
/// Stateless apart from its credential; each call is a single request.
#[derive(Clone)]
pub struct PoEditorClient {
    api_key: String,
    client: reqwest::Client,
    base_url: String,
}

impl PoEditorClient {
    /// Create a client for the production API
    pub fn new(api_key: String) -> ServiceResult<Self> {
        if api_key.trim().is_empty() {
            return Err(ServiceError::Config("API key cannot be empty".to_string()));
        }

        // Connections are not pooled: a client may outlive the runtime that
        // drove its previous requests.
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .pool_max_idle_per_host(0)
            .build()
            .map_err(|e| ServiceError::Transport(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            api_key,
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
        })
    }

    /// Create a client from the `POEDITOR_API_KEY` environment variable
    pub fn from_env() -> ServiceResult<Self> {
        let api_key = std::env::var(API_KEY_ENV).map_err(|_| {
            ServiceError::Config(format!("{API_KEY_ENV} environment variable not set"))
        })?;

        Self::new(api_key)
    }

    /// Point the client at another endpoint
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// POST a form to `path` and unwrap the response envelope
    async fn post<T: DeserializeOwned>(
        &self,
        path: &str,
        form: &[(&str, &str)],
    ) -> ServiceResult<T> {
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!(%url, "POST");

        let response = self.client.post(&url).form(form).send().await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            let body = response.text().await.unwrap_or_default();
            return Err(ServiceError::Auth(format!("HTTP {status}: {body}")));
        }
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ServiceError::Transport(format!("HTTP {status}: {body}")));
        }

        let envelope: Envelope<T> = response
            .json()
            .await
            .map_err(|e| ServiceError::Decode(format!("Failed to parse API response: {e}")))?;

        if envelope.response.status == "fail" {
            let message = envelope.response.message;
            return Err(if is_auth_code(&envelope.response.code) {
                ServiceError::Auth(message)
            } else {
                ServiceError::Data(message)
            });
        }

        envelope.result.ok_or_else(|| {
            ServiceError::Decode("Invalid API response: missing 'result' object".to_string())
        })
    }
}

/// POEditor reports token problems with 401x codes
fn is_auth_code(code: &str) -> bool {
    code.starts_with("401") || code.starts_with("403")
}

impl std::fmt::Debug for PoEditorClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoEditorClient")
            .field("api_key", &"***")
            .field("base_url", &self.base_url)
            .finish()
    }
}

#[async_trait]
impl TranslationService for PoEditorClient {
    async fn list_projects(&self) -> ServiceResult<Vec<Project>> {
        let list: ProjectList = self
            .post("/projects/list", &[("api_token", self.api_key.as_str())])
            .await?;
        Ok(list.projects)
    }

    async fn export_locale(&self, locale: &str, project_id: &str) -> ServiceResult<ExportJob> {
        let result: ExportResult = self
            .post(
                "/projects/export",
                &[
                    ("api_token", self.api_key.as_str()),
                    ("id", project_id),
                    ("language", locale),
                    ("type", EXPORT_FORMAT),
                ],
            )
            .await?;

        Ok(ExportJob {
            locale: locale.to_string(),
            download_url: result.url,
        })
    }

    async fn download_file(&self, url: &str, destination: &Path) -> ServiceResult<()> {
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ServiceError::Transport(format!(
                "HTTP {status} while downloading {url}"
            )));
        }

        let bytes = response.bytes().await?;
        tokio::fs::write(destination, &bytes).await?;
        tracing::debug!(%url, bytes = bytes.len(), path = %destination.display(), "Downloaded");
        Ok(())
    }

    fn service_name(&self) -> &str {
        "POEditor"
    }
}
