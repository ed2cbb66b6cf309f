//! Anthropic Files API クライアント
//!
//! <https://docs.anthropic.com/en/docs/build-with-claude/files>

use std::time::Duration;

use reqwest::blocking::{multipart, Client, Response};
use reqwest::header::{HeaderMap, HeaderValue};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::client::WorkspaceClient;
use crate::mime::MimeType;
use crate::record::FileRecord;
use crate::Result;

pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
pub const DEFAULT_MODEL: &str = "claude-3-5-sonnet-20241022";
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

const API_VERSION: &str = "2023-06-01";
const FILES_BETA: &str = "files-api-2025-04-14";

const PROBE_PROMPT: &str = "Hello! Please respond with 'API test successful' if you can read this.";
const PROBE_FILE_PROMPT: &str = "Give a short summary of the attached file.";
const PROBE_MAX_TOKENS: u32 = 100;
const PROBE_FILE_MAX_TOKENS: u32 = 1024;

/// Anthropic API（Files API ベータ）のラッパー
pub struct AnthropicClient {
    http: Client,
    base_url: String,
    model: String,
}

#[derive(Debug, Deserialize)]
struct FileList {
    data: Vec<FileRecord>,
    #[serde(default)]
    has_more: bool,
}

#[derive(Debug, Deserialize)]
struct DeletedFile {
    id: String,
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Debug, Deserialize)]
struct MessageResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(rename = "type")]
    kind: String,
    message: String,
}

impl AnthropicClient {
    pub fn new(api_key: &str, base_url: &str, model: &str, timeout: Duration) -> Result<Self> {
        if api_key.trim().is_empty() {
            return Err(crate::Error::Config("Anthropic API key is empty".into()));
        }

        let mut key = HeaderValue::from_str(api_key.trim())
            .map_err(|_| crate::Error::Config("Anthropic API key contains invalid characters".into()))?;
        key.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert("x-api-key", key);
        headers.insert("anthropic-version", HeaderValue::from_static(API_VERSION));
        headers.insert("anthropic-beta", HeaderValue::from_static(FILES_BETA));

        let http = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| crate::Error::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl WorkspaceClient for AnthropicClient {
    fn create_file(&self, filename: &str, content: &[u8], mime: MimeType) -> Result<FileRecord> {
        debug!(filename, mime = mime.as_str(), bytes = content.len(), "POST /v1/files");

        let part = multipart::Part::bytes(content.to_vec())
            .file_name(filename.to_string())
            .mime_str(mime.as_str())?;
        let form = multipart::Form::new().part("file", part);

        let resp = self.http.post(self.url("/v1/files")).multipart(form).send()?;
        let record: FileRecord = check(resp)?.json()?;

        debug!(id = %record.id, "file created");
        Ok(record)
    }

    fn list_files(&self) -> Result<Vec<FileRecord>> {
        debug!("GET /v1/files");

        let resp = self.http.get(self.url("/v1/files")).send()?;
        let page: FileList = check(resp)?.json()?;

        if page.has_more {
            warn!(
                returned = page.data.len(),
                "workspace has more files than the first page; only the first page is listed"
            );
        }
        Ok(page.data)
    }

    fn delete_file(&self, file_id: &str) -> Result<bool> {
        debug!(file_id, "DELETE /v1/files/{{id}}");

        let resp = self
            .http
            .delete(self.url(&format!("/v1/files/{}", file_id)))
            .send()?;
        let deleted: DeletedFile = check(resp)?.json()?;

        Ok(deleted.kind == "file_deleted" && deleted.id == file_id)
    }

    fn test_connection(&self, file_id: Option<&str>) -> Result<String> {
        debug!(model = %self.model, file_id, "POST /v1/messages");

        let resp = self
            .http
            .post(self.url("/v1/messages"))
            .json(&probe_body(&self.model, file_id))
            .send()?;
        let message: MessageResponse = check(resp)?.json()?;

        first_text(message)
    }
}

/// 2xx 以外をエラーに変換
fn check(resp: Response) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let body = resp.text().unwrap_or_default();
    warn!(status = status.as_u16(), "Anthropic API returned an error");
    Err(crate::Error::Remote(format!(
        "{}: {}",
        status,
        api_error_message(&body)
    )))
}

fn api_error_message(body: &str) -> String {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => format!("{} ({})", envelope.error.message, envelope.error.kind),
        Err(_) if body.trim().is_empty() => "(empty response)".to_string(),
        Err(_) => body.trim().to_string(),
    }
}

fn probe_body(model: &str, file_id: Option<&str>) -> Value {
    match file_id {
        None => json!({
            "model": model,
            "max_tokens": PROBE_MAX_TOKENS,
            "messages": [
                { "role": "user", "content": PROBE_PROMPT }
            ]
        }),
        Some(id) => json!({
            "model": model,
            "max_tokens": PROBE_FILE_MAX_TOKENS,
            "messages": [{
                "role": "user",
                "content": [
                    { "type": "text", "text": PROBE_FILE_PROMPT },
                    { "type": "document", "source": { "type": "file", "file_id": id } }
                ]
            }]
        }),
    }
}

fn first_text(message: MessageResponse) -> Result<String> {
    message
        .content
        .into_iter()
        .find(|block| block.kind == "text")
        .and_then(|block| block.text)
        .ok_or_else(|| crate::Error::Remote("response contained no text content".into()))
}
