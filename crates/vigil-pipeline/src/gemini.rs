//! Gemini summarizer.
//!
//! The highlight reel is sent through the Files API resumable upload, polled
//! until the service reports it `ACTIVE`, then referenced from a
//! `generateContent` call together with the prompt.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use tokio_util::io::ReaderStream;
use tracing::{debug, info};

use crate::config::env_parse;
use crate::error::{PipelineError, PipelineResult};
use crate::summary::Summarizer;

const COLLABORATOR: &str = "summarizer";
const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const VIDEO_MIME: &str = "video/mp4";

/// Gemini settings.
#[derive(Clone)]
pub struct GeminiConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    /// Delay between file state checks
    pub poll_interval: Duration,
    /// File state checks before giving up
    pub poll_attempts: u32,
}

impl std::fmt::Debug for GeminiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("poll_interval", &self.poll_interval)
            .field("poll_attempts", &self.poll_attempts)
            .finish()
    }
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: "gemini-2.0-flash".to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            poll_interval: Duration::from_secs(2),
            poll_attempts: 30,
        }
    }
}

impl GeminiConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            api_key: std::env::var("GOOGLE_API_KEY").ok().filter(|k| !k.trim().is_empty()),
            model: std::env::var("GEMINI_MODEL").unwrap_or(defaults.model),
            base_url: std::env::var("GEMINI_BASE_URL").unwrap_or(defaults.base_url),
            poll_interval: env_parse::<u64>("GEMINI_FILE_POLL_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.poll_interval),
            poll_attempts: env_parse::<u32>("GEMINI_FILE_POLL_ATTEMPTS")
                .filter(|n| *n > 0)
                .unwrap_or(defaults.poll_attempts),
        }
    }
}

/// Summarizer backed by the Gemini API.
pub struct GeminiSummarizer {
    config: GeminiConfig,
    api_key: String,
    client: Client,
}

#[derive(Debug, Serialize)]
struct UploadStart<'a> {
    file: UploadMetadata<'a>,
}

#[derive(Debug, Serialize)]
struct UploadMetadata<'a> {
    display_name: &'a str,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    file: RemoteFile,
}

#[derive(Debug, Clone, Deserialize)]
struct RemoteFile {
    name: String,
    #[serde(default)]
    uri: String,
    #[serde(default, rename = "mimeType")]
    mime_type: Option<String>,
    #[serde(default)]
    state: Option<String>,
}

impl RemoteFile {
    fn state(&self) -> &str {
        self.state.as_deref().unwrap_or("STATE_UNSPECIFIED")
    }
}

#[derive(Debug, Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part {
    File { file_data: FileData },
    Text { text: String },
}

#[derive(Debug, Serialize)]
struct FileData {
    mime_type: String,
    file_uri: String,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: ResponseContent,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

fn failed(msg: impl Into<String>) -> PipelineError {
    PipelineError::collaborator(COLLABORATOR, msg)
}

impl GeminiSummarizer {
    /// Create a summarizer; the API key is required.
    pub fn new(config: GeminiConfig) -> PipelineResult<Self> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| PipelineError::config_error("GOOGLE_API_KEY not set"))?;
        Ok(Self {
            config,
            api_key,
            client: Client::new(),
        })
    }

    fn model_name(&self) -> &str {
        self.config
            .model
            .strip_prefix("models/")
            .unwrap_or(&self.config.model)
    }

    fn base(&self) -> &str {
        self.config.base_url.trim_end_matches('/')
    }

    async fn check(response: Response, what: &str) -> PipelineResult<Response> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(failed(format!("{} returned {}: {}", what, status, body)))
    }

    /// Resumable upload of `video`; returns the file resource.
    async fn upload(&self, video: &Path) -> PipelineResult<RemoteFile> {
        let file = tokio::fs::File::open(video).await?;
        let size = file.metadata().await?.len();
        let display_name = video
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("highlights.mp4");

        let start = self
            .client
            .post(format!("{}/upload/v1beta/files", self.base()))
            .query(&[("key", self.api_key.as_str())])
            .header("X-Goog-Upload-Protocol", "resumable")
            .header("X-Goog-Upload-Command", "start")
            .header("X-Goog-Upload-Header-Content-Length", size.to_string())
            .header("X-Goog-Upload-Header-Content-Type", VIDEO_MIME)
            .json(&UploadStart {
                file: UploadMetadata { display_name },
            })
            .send()
            .await
            .map_err(|e| failed(format!("upload start failed: {}", e)))?;
        let start = Self::check(start, "upload start").await?;

        let upload_url = start
            .headers()
            .get("x-goog-upload-url")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| failed("upload start returned no upload URL"))?;
        debug!(size, "Opened resumable upload");

        let body = reqwest::Body::wrap_stream(ReaderStream::new(file));
        let finish = self
            .client
            .post(&upload_url)
            .header("Content-Length", size.to_string())
            .header("X-Goog-Upload-Offset", "0")
            .header("X-Goog-Upload-Command", "upload, finalize")
            .body(body)
            .send()
            .await
            .map_err(|e| failed(format!("upload failed: {}", e)))?;
        let finish = Self::check(finish, "upload").await?;

        let uploaded: UploadResponse = finish
            .json()
            .await
            .map_err(|e| failed(format!("failed to parse upload response: {}", e)))?;
        info!(file = %uploaded.file.name, bytes = size, "Uploaded highlight reel");
        Ok(uploaded.file)
    }

    async fn get_file(&self, name: &str) -> PipelineResult<RemoteFile> {
        let response = self
            .client
            .get(format!("{}/v1beta/{}", self.base(), name))
            .query(&[("key", self.api_key.as_str())])
            .send()
            .await
            .map_err(|e| failed(format!("file lookup failed: {}", e)))?;
        Self::check(response, "file lookup")
            .await?
            .json()
            .await
            .map_err(|e| failed(format!("failed to parse file resource: {}", e)))
    }

    /// Poll until the uploaded file is `ACTIVE`, at most `poll_attempts` times.
    async fn wait_active(&self, mut file: RemoteFile) -> PipelineResult<RemoteFile> {
        for attempt in 0..self.config.poll_attempts {
            match file.state() {
                "ACTIVE" => return Ok(file),
                "FAILED" => return Err(failed(format!("file {} failed processing", file.name))),
                state => debug!(file = %file.name, state, attempt, "Waiting for uploaded file"),
            }
            tokio::time::sleep(self.config.poll_interval).await;
            file = self.get_file(&file.name).await?;
        }
        if file.state() == "ACTIVE" {
            return Ok(file);
        }
        Err(failed(format!(
            "file {} not active after {} checks",
            file.name, self.config.poll_attempts
        )))
    }

    async fn generate(&self, file: &RemoteFile, prompt: &str) -> PipelineResult<String> {
        let request = GenerateRequest {
            contents: vec![Content {
                parts: vec![
                    Part::File {
                        file_data: FileData {
                            mime_type: file.mime_type.clone().unwrap_or_else(|| VIDEO_MIME.to_string()),
                            file_uri: file.uri.clone(),
                        },
                    },
                    Part::Text {
                        text: prompt.to_string(),
                    },
                ],
            }],
        };

        let response = self
            .client
            .post(format!(
                "{}/v1beta/models/{}:generateContent",
                self.base(),
                self.model_name()
            ))
            .query(&[("key", self.api_key.as_str())])
            .json(&request)
            .send()
            .await
            .map_err(|e| failed(format!("generateContent request failed: {}", e)))?;
        let response: GenerateResponse = Self::check(response, "generateContent")
            .await?
            .json()
            .await
            .map_err(|e| failed(format!("failed to parse generateContent response: {}", e)))?;

        let text: String = response
            .candidates
            .first()
            .map(|c| {
                c.content
                    .parts
                    .iter()
                    .filter_map(|p| p.text.as_deref())
                    .collect()
            })
            .unwrap_or_default();
        if text.trim().is_empty() {
            return Err(failed("no content in generateContent response"));
        }
        Ok(text)
    }
}

#[async_trait]
impl Summarizer for GeminiSummarizer {
    async fn summarize(&self, video: &Path, prompt: &str) -> PipelineResult<String> {
        let uploaded = self.upload(video).await?;
        let active = self.wait_active(uploaded).await?;
        let text = self.generate(&active, prompt).await?;
        info!(model = %self.model_name(), chars = text.len(), "Generated summary");
        Ok(text)
    }

    fn name(&self) -> &'static str {
        "gemini"
    }
}
