//! Gemini Files API client.
//!
//! Videos are uploaded with the resumable protocol (start, then a single
//! `upload, finalize` request), polled until the file becomes `ACTIVE`,
//! referenced from a `generateContent` call and deleted afterwards.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{OracleError, OracleResult};
use crate::{AnalysisOracle, FileRef, FileState};

const DEFAULT_MODEL: &str = "gemini-2.5-flash";
const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Gemini client configuration.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub request_timeout: Duration,
}

impl GeminiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout: Duration::from_secs(300),
        }
    }

    /// Load from `GEMINI_API_KEY`, `GEMINI_MODEL` and `GEMINI_BASE_URL`.
    pub fn from_env() -> OracleResult<Self> {
        let api_key = std::env::var("GEMINI_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| OracleError::config("GEMINI_API_KEY not set"))?;

        let mut config = Self::new(api_key);
        if let Ok(model) = std::env::var("GEMINI_MODEL") {
            config.model = model;
        }
        if let Ok(base_url) = std::env::var("GEMINI_BASE_URL") {
            config.base_url = base_url;
        }
        Ok(config)
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[derive(Debug, Serialize)]
struct StartUpload<'a> {
    file: DisplayName<'a>,
}

#[derive(Debug, Serialize)]
struct DisplayName<'a> {
    display_name: &'a str,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    file: RemoteFile,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RemoteFile {
    name: String,
    #[serde(default)]
    uri: String,
    #[serde(default)]
    mime_type: Option<String>,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    error: Option<RemoteStatus>,
}

#[derive(Debug, Deserialize)]
struct RemoteStatus {
    #[serde(default)]
    message: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    file_data: Option<FileData>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FileData {
    mime_type: String,
    file_uri: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: String,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

/// Gemini-backed analysis oracle.
#[derive(Debug, Clone)]
pub struct GeminiOracle {
    config: GeminiConfig,
    client: Client,
}

impl GeminiOracle {
    pub fn new(config: GeminiConfig) -> OracleResult<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| OracleError::config(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { config, client })
    }

    pub fn from_env() -> OracleResult<Self> {
        Self::new(GeminiConfig::from_env()?)
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    async fn check(response: Response) -> OracleResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response.text().await.unwrap_or_default();
        Err(OracleError::Api {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl AnalysisOracle for GeminiOracle {
    async fn upload(&self, path: &Path, mime_type: &str) -> OracleResult<FileRef> {
        let bytes = tokio::fs::read(path).await?;
        let display_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("proxy.mp4");

        let start = self
            .client
            .post(self.url("upload/v1beta/files"))
            .header("x-goog-api-key", &self.config.api_key)
            .header("X-Goog-Upload-Protocol", "resumable")
            .header("X-Goog-Upload-Command", "start")
            .header("X-Goog-Upload-Header-Content-Length", bytes.len().to_string())
            .header("X-Goog-Upload-Header-Content-Type", mime_type)
            .json(&StartUpload {
                file: DisplayName { display_name },
            })
            .send()
            .await?;
        let start = Self::check(start).await?;

        let upload_url = start
            .headers()
            .get("x-goog-upload-url")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| OracleError::upload("missing x-goog-upload-url header"))?;

        let size = bytes.len();
        let finalize = self
            .client
            .post(&upload_url)
            .header("X-Goog-Upload-Offset", "0")
            .header("X-Goog-Upload-Command", "upload, finalize")
            .body(bytes)
            .send()
            .await?;
        let uploaded: UploadResponse = Self::check(finalize)
            .await?
            .json()
            .await
            .map_err(|e| OracleError::upload(format!("invalid upload response: {}", e)))?;

        info!("Uploaded {} ({} bytes) as {}", path.display(), size, uploaded.file.name);
        Ok(FileRef {
            name: uploaded.file.name,
            uri: uploaded.file.uri,
            mime_type: uploaded
                .file
                .mime_type
                .unwrap_or_else(|| mime_type.to_string()),
        })
    }

    async fn poll_status(&self, file: &FileRef) -> OracleResult<FileState> {
        let response = self
            .client
            .get(self.url(&format!("v1beta/{}", file.name)))
            .header("x-goog-api-key", &self.config.api_key)
            .send()
            .await?;
        let remote: RemoteFile = Self::check(response)
            .await?
            .json()
            .await
            .map_err(|e| OracleError::parse(format!("invalid file status: {}", e)))?;

        let state = match remote.state.as_deref() {
            Some("ACTIVE") => FileState::Active,
            Some("FAILED") => FileState::Failed(
                remote
                    .error
                    .map(|e| e.message)
                    .filter(|m| !m.is_empty())
                    .unwrap_or_else(|| "file processing failed".to_string()),
            ),
            _ => FileState::Pending,
        };
        debug!("File {} state {:?}", file.name, state);
        Ok(state)
    }

    async fn analyze(&self, file: &FileRef, prompt: &str) -> OracleResult<String> {
        let request = GenerateRequest {
            contents: vec![Content {
                parts: vec![
                    Part {
                        text: None,
                        file_data: Some(FileData {
                            mime_type: file.mime_type.clone(),
                            file_uri: file.uri.clone(),
                        }),
                    },
                    Part {
                        text: Some(prompt.to_string()),
                        file_data: None,
                    },
                ],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json".to_string(),
            },
        };

        let response = self
            .client
            .post(self.url(&format!(
                "v1beta/models/{}:generateContent",
                self.config.model
            )))
            .header("x-goog-api-key", &self.config.api_key)
            .json(&request)
            .send()
            .await?;
        let body: GenerateResponse = Self::check(response)
            .await?
            .json()
            .await
            .map_err(|e| OracleError::parse(format!("invalid generateContent response: {}", e)))?;

        let text: String = body
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(OracleError::parse("no content in oracle response"));
        }
        Ok(text)
    }

    async fn delete(&self, file: &FileRef) -> OracleResult<()> {
        let response = self
            .client
            .delete(self.url(&format!("v1beta/{}", file.name)))
            .header("x-goog-api-key", &self.config.api_key)
            .send()
            .await?;
        Self::check(response).await?;
        debug!("Deleted remote file {}", file.name);
        Ok(())
    }
}
