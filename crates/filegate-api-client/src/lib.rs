//! Shared HTTP client for the Filegate API.
//!
//! Provides a minimal client authenticated with `X-API-Key`, generic GET/PUT/POST
//! helpers, and domain methods (upload, download, list, signed links).
//! Large uploads go through [`ChunkedUploadOrchestrator`].

pub mod api;
pub mod upload;

use anyhow::{Context, Result};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;

pub use api::FileSummary;
pub use upload::{
    ChunkedUploadOrchestrator, MultipartTarget, PartOutcome, RetryPolicy, UploadError,
};

pub const API_KEY_HEADER: &str = "X-API-Key";

/// HTTP client for the Filegate API.
#[derive(Clone, Debug)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl ApiClient {
    pub fn new(base_url: String, api_key: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    /// Create client from environment: FILEGATE_API_URL (or API_URL), FILEGATE_API_KEY (or API_KEY).
    pub fn from_env() -> Result<Self> {
        let base_url = std::env::var("FILEGATE_API_URL")
            .or_else(|_| std::env::var("API_URL"))
            .unwrap_or_else(|_| "http://localhost:3000".to_string());

        let api_key = std::env::var("FILEGATE_API_KEY")
            .or_else(|_| std::env::var("API_KEY"))
            .context("Missing API key. Set FILEGATE_API_KEY or API_KEY")?;

        Self::new(base_url, api_key)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn build_url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub(crate) fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request.header(API_KEY_HEADER, self.api_key.as_str())
    }

    /// Send an authorized request and fail on any non-success status.
    pub(crate) async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = self
            .authorized(request)
            .send()
            .await
            .context("Failed to send request")?;
        ensure_success(response).await
    }

    /// GET request with optional query parameters. Deserializes JSON response.
    pub async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let mut request = self.client.get(self.build_url(path));
        if !query.is_empty() {
            request = request.query(query);
        }

        self.send(request)
            .await?
            .json()
            .await
            .context("Failed to parse response as JSON")
    }

    /// POST JSON body and deserialize response.
    pub async fn post_json<T: DeserializeOwned, B: serde::Serialize>(
        &self,
        path: &str,
        query: &[(&str, String)],
        body: &B,
    ) -> Result<T> {
        let request = self
            .client
            .post(self.build_url(path))
            .query(query)
            .json(body);

        self.send(request)
            .await?
            .json()
            .await
            .context("Failed to parse response as JSON")
    }

    /// PUT multipart form and deserialize response.
    pub async fn put_multipart<T: DeserializeOwned>(
        &self,
        path: &str,
        form: reqwest::multipart::Form,
    ) -> Result<T> {
        let request = self.client.put(self.build_url(path)).multipart(form);

        self.send(request)
            .await?
            .json()
            .await
            .context("Failed to parse response as JSON")
    }

    /// DELETE request. Returns Ok(()) on success.
    pub async fn delete(&self, path: &str, query: &[(&str, String)]) -> Result<()> {
        let request = self.client.delete(self.build_url(path)).query(query);
        self.send(request).await?;
        Ok(())
    }

    /// Raw client for custom requests. Caller must apply auth via build_url and headers.
    pub fn client(&self) -> &Client {
        &self.client
    }
}

async fn ensure_success(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let error_text = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    Err(anyhow::anyhow!(
        "API request failed with status {}: {}",
        status,
        error_text
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash_is_trimmed() {
        let client = ApiClient::new("http://localhost:3000/".to_string(), "k".to_string()).unwrap();
        assert_eq!(client.build_url("/files"), "http://localhost:3000/files");
    }
}
