//! HTTP client for the OCR web service.
//!
//! Recognition, preprocessing, script conversion, and history storage all
//! live behind these endpoints; this module only moves requests and replies.

pub mod types;

use std::path::{Path, PathBuf};

use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use reqwest::{RequestBuilder, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use thiserror::Error;

pub use types::*;

pub const BACKEND_URL_ENV: &str = "GJ_BACKEND_URL";
pub const DEFAULT_BACKEND_URL: &str = "http://127.0.0.1:5000";

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("backend returned {status} for {url}: {message}")]
    Status {
        url: String,
        status: StatusCode,
        message: String,
    },
    #[error("backend reported an error: {0}")]
    Service(String),
    #[error("invalid response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to read image '{}': {source}", path.display())]
    Image {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Deserialize)]
struct ApiKeyBody {
    #[serde(default)]
    api_key: Option<String>,
}

#[derive(Debug, Clone)]
pub struct BackendClient {
    base_url: String,
    http: reqwest::Client,
}

impl BackendClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            base_url,
            http: reqwest::Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn send(&self, request: RequestBuilder, url: &str) -> Result<reqwest::Response, BackendError> {
        log::debug!("backend request: {url}");
        let response = request.send().await.map_err(|source| BackendError::Request {
            url: url.to_string(),
            source,
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<Value>(&body)
            .ok()
            .and_then(|value| value.get("error").and_then(Value::as_str).map(str::to_string))
            .unwrap_or(body);
        Err(BackendError::Status {
            url: url.to_string(),
            status,
            message,
        })
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        url: &str,
    ) -> Result<T, BackendError> {
        let response = self.send(request, url).await?;
        let body = response.text().await.map_err(|source| BackendError::Request {
            url: url.to_string(),
            source,
        })?;
        let value: Value = serde_json::from_str(&body).map_err(|source| BackendError::Decode {
            url: url.to_string(),
            source,
        })?;

        if let Some(message) = value.get("error").and_then(Value::as_str) {
            return Err(BackendError::Service(message.to_string()));
        }

        serde_json::from_value(value).map_err(|source| BackendError::Decode {
            url: url.to_string(),
            source,
        })
    }

    /// Uploads an image file as the `image` multipart field.
    pub async fn upload_image(&self, path: &Path) -> Result<UploadResponse, BackendError> {
        let bytes = tokio::fs::read(path).await.map_err(|source| BackendError::Image {
            path: path.to_path_buf(),
            source,
        })?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image".to_string());

        let url = self.url("/api/upload");
        let form = Form::new().part("image", Part::bytes(bytes).file_name(file_name));
        self.send_json(self.http.post(&url).multipart(form), &url).await
    }

    /// Runs recognition; Baidu requests go to their own endpoint.
    pub async fn run_ocr(&self, request: &OcrRequest) -> Result<OcrResponse, BackendError> {
        let path = match request.version {
            OcrVersion::Baidu => "/api/baidu_ocr",
            OcrVersion::Default | OcrVersion::Beta => "/api/ocr",
        };
        let url = self.url(path);
        self.send_json(self.http.post(&url).json(request), &url).await
    }

    pub async fn convert_text(
        &self,
        text: &str,
        conversion: ConversionType,
    ) -> Result<ConvertResponse, BackendError> {
        let url = self.url("/api/convert_text");
        let body = json!({"text": text, "type": conversion});
        self.send_json(self.http.post(&url).json(&body), &url).await
    }

    pub async fn history(&self) -> Result<Vec<HistoryEntry>, BackendError> {
        let url = self.url("/api/history");
        self.send_json(self.http.get(&url), &url).await
    }

    pub async fn history_record(&self, id: &str) -> Result<HistoryRecord, BackendError> {
        let url = self.url(&format!("/api/history/{id}"));
        self.send_json(self.http.get(&url), &url).await
    }

    pub async fn delete_history_record(&self, id: &str) -> Result<StatusMessage, BackendError> {
        let url = self.url(&format!("/api/history/delete/{id}"));
        self.send_json(self.http.delete(&url), &url).await
    }

    pub async fn clear_history(&self) -> Result<StatusMessage, BackendError> {
        let url = self.url("/api/history/clear");
        self.send_json(self.http.delete(&url), &url).await
    }

    pub async fn settings(&self) -> Result<Settings, BackendError> {
        let url = self.url("/api/settings");
        self.send_json(self.http.get(&url), &url).await
    }

    pub async fn save_settings(&self, settings: &Settings) -> Result<StatusMessage, BackendError> {
        let url = self.url("/api/settings");
        self.send_json(self.http.post(&url).json(settings), &url).await
    }

    /// Assistant API key kept by the backend, if one is configured.
    pub async fn assistant_api_key(&self) -> Result<Option<String>, BackendError> {
        let url = self.url("/api/deepseek_config");
        let body: ApiKeyBody = self.send_json(self.http.get(&url), &url).await?;
        Ok(body.api_key.filter(|key| !key.trim().is_empty()))
    }

    /// Downloads a static asset such as a history image.
    pub async fn fetch_asset(&self, path: &str) -> Result<Bytes, BackendError> {
        let url = self.url(path);
        let response = self.send(self.http.get(&url), &url).await?;
        response.bytes().await.map_err(|source| BackendError::Request { url, source })
    }
}

#[cfg(test)]
mod tests {
    use super::BackendClient;

    #[test]
    fn urls_join_without_doubled_slashes() {
        let client = BackendClient::new("http://localhost:5000/");
        assert_eq!(client.base_url(), "http://localhost:5000");
        assert_eq!(client.url("/api/history"), "http://localhost:5000/api/history");
        assert_eq!(
            client.url("static/history/1.jpg"),
            "http://localhost:5000/static/history/1.jpg"
        );
        assert_eq!(client.url("https://cdn.example/a.png"), "https://cdn.example/a.png");
    }
}
