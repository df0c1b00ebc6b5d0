//! Domain methods for the Filegate API client.

use crate::upload::{ChunkedUploadOrchestrator, MultipartTarget, PartOutcome};
use crate::ApiClient;
use anyhow::{Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use filegate_core::models::{
    FileCreateStartBody, MultipartUploadResponse, ObjectList, ObjectMetadata, UploadedPart,
    Visibility,
};
use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const DEFAULT_LIST_LIMIT: usize = 100;

/// Response headers of an object fetch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileSummary {
    pub key: String,
    pub size: Option<u64>,
    pub etag: Option<String>,
    pub content_type: Option<String>,
    pub filename: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: String,
}

/// Percent-encode each segment, keeping `/` separators.
fn encode_path(key: &str) -> String {
    key.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// Parse `filename="..."` out of a Content-Disposition value.
fn disposition_filename(value: &str) -> Option<String> {
    value
        .split(';')
        .map(str::trim)
        .find_map(|param| param.strip_prefix("filename="))
        .map(|name| name.trim_matches('"').to_string())
}

/// Map a failed part response to its retry class.
pub(crate) fn classify_part_failure(status: StatusCode, message: String) -> PartOutcome {
    if status.is_server_error() {
        PartOutcome::Transient(message)
    } else if status == StatusCode::BAD_REQUEST || status == StatusCode::UNPROCESSABLE_ENTITY {
        PartOutcome::ValidationFailure(message)
    } else {
        PartOutcome::Permanent(message)
    }
}

impl ApiClient {
    /// Upload `data` under `key`, in parts when it is larger than one part.
    pub async fn upload_file(
        &self,
        data: Bytes,
        key: &str,
        visibility: Visibility,
    ) -> Result<ObjectMetadata> {
        if key.starts_with('/') {
            return Err(anyhow::anyhow!("Key cannot start with a slash"));
        }

        let orchestrator = ChunkedUploadOrchestrator::new(Arc::new(self.clone()));
        Ok(orchestrator.upload(key, data, visibility).await?)
    }

    /// Download the full content of `key`.
    pub async fn download_file(&self, key: &str) -> Result<Bytes> {
        let request = self.client().get(self.build_url("/files")).query(&[("key", key)]);
        self.send(request)
            .await?
            .bytes()
            .await
            .with_context(|| format!("Failed to read content of {}", key))
    }

    /// Summary of `key` taken from the response headers of a fetch.
    pub async fn get_file_metadata(&self, key: &str) -> Result<FileSummary> {
        let request = self.client().get(self.build_url("/files")).query(&[("key", key)]);
        let response = self.send(request).await?;
        let headers = response.headers();
        let header = |name: reqwest::header::HeaderName| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(String::from)
        };

        Ok(FileSummary {
            key: key.to_string(),
            size: response.content_length(),
            etag: header(reqwest::header::ETAG).map(|e| e.trim_matches('"').to_string()),
            content_type: header(reqwest::header::CONTENT_TYPE),
            filename: header(reqwest::header::CONTENT_DISPOSITION)
                .as_deref()
                .and_then(disposition_filename),
        })
    }

    /// First page of visible objects. An empty bucket yields an empty list.
    pub async fn list_files(&self, limit: Option<usize>) -> Result<ObjectList> {
        let limit = limit.unwrap_or(DEFAULT_LIST_LIMIT);
        let request = self
            .client()
            .get(self.build_url("/files"))
            .query(&[("limit", limit.to_string())]);
        let response = self
            .authorized(request)
            .send()
            .await
            .context("Failed to send request")?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(ObjectList {
                objects: Vec::new(),
                truncated: false,
                cursor: None,
            });
        }

        crate::ensure_success(response)
            .await?
            .json()
            .await
            .context("Failed to parse response as JSON")
    }

    /// Issue a one-time download link for `key`.
    pub async fn get_signed_url(&self, key: &str) -> Result<String> {
        let response: TokenResponse = self
            .get(&format!("/download/{}/token", encode_path(key)), &[])
            .await
            .with_context(|| format!("Failed to get signed URL for file: {}", key))?;

        Ok(format!(
            "{}/download/{}?token={}",
            self.base_url(),
            urlencoding::encode(key),
            urlencoding::encode(&response.token)
        ))
    }
}

#[async_trait]
impl MultipartTarget for ApiClient {
    async fn put_object(
        &self,
        key: &str,
        data: Bytes,
        visibility: Visibility,
    ) -> Result<ObjectMetadata> {
        let form = Form::new()
            .text("key", key.to_string())
            .text("visibility", visibility.to_string())
            .part("file", Part::bytes(data.to_vec()).file_name(key.to_string()));
        self.put_multipart("/files", form).await
    }

    async fn start(&self, key: &str, visibility: Visibility) -> Result<MultipartUploadResponse> {
        let body = FileCreateStartBody {
            key: key.to_string(),
            visibility,
        };
        self.post_json("/files", &[], &body).await
    }

    async fn upload_part(
        &self,
        key: &str,
        upload_id: &str,
        part_number: u32,
        data: Bytes,
    ) -> PartOutcome {
        let form = Form::new()
            .text("key", key.to_string())
            .text("upload_id", upload_id.to_string())
            .text("part", part_number.to_string())
            .part("file", Part::bytes(data.to_vec()).file_name(key.to_string()));
        let request = self.client().put(self.build_url("/files")).multipart(form);

        let response = match self.authorized(request).send().await {
            Ok(response) => response,
            Err(e) => return PartOutcome::Transient(e.to_string()),
        };

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return classify_part_failure(status, format!("{}: {}", status, message));
        }

        match response.json::<UploadedPart>().await {
            Ok(part) => PartOutcome::Uploaded(part),
            Err(e) => PartOutcome::Permanent(format!("Unreadable part response: {}", e)),
        }
    }

    async fn complete(
        &self,
        key: &str,
        upload_id: &str,
        visibility: Visibility,
        parts: &[UploadedPart],
    ) -> Result<ObjectMetadata> {
        let query = [
            ("key", key.to_string()),
            ("upload_id", upload_id.to_string()),
            ("visibility", visibility.to_string()),
        ];
        self.post_json("/files", &query, &parts).await
    }

    async fn abort(&self, key: &str, upload_id: &str) -> Result<()> {
        let query = [("key", key.to_string()), ("upload_id", upload_id.to_string())];
        self.delete("/files", &query).await
    }
}
