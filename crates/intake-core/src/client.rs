//! HTTP adapters talking to the site API
//!
//! - `POST /api/upload?filename=<name>&overwrite=false` with the raw file body
//! - `POST /api/submit` with the intake submission JSON

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::IntakeError;
use crate::session::{IntakeSubmission, Submitter};
use crate::state::FileHandle;
use crate::upload::Uploader;

/// Reply of the upload endpoint; either a blob location or an error
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UploadReply {
    url: Option<String>,
    error: Option<String>,
}

/// Reply of the submit endpoint
#[derive(Debug, Deserialize)]
struct SubmitReply {
    message: Option<String>,
    error: Option<String>,
}

/// Client for the site API
#[derive(Debug, Clone)]
pub struct SiteClient {
    http: reqwest::Client,
    base_url: String,
}

impl SiteClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl Uploader for SiteClient {
    async fn upload(&self, file: &FileHandle) -> Result<String, String> {
        let mut request = self
            .http
            .post(self.endpoint("/api/upload"))
            .query(&[("filename", file.name.as_str()), ("overwrite", "false")])
            .body(file.data.clone());
        if let Some(content_type) = &file.content_type {
            request = request.header(reqwest::header::CONTENT_TYPE, content_type);
        }

        let response = request.send().await.map_err(|e| e.to_string())?;
        let status = response.status();
        let reply: UploadReply = response.json().await.map_err(|e| e.to_string())?;

        match (status.is_success(), reply.url, reply.error) {
            (true, Some(url), _) => Ok(url),
            (_, _, Some(error)) => Err(error),
            _ => Err(format!("Upload failed with status {}", status)),
        }
    }
}

#[async_trait]
impl Submitter for SiteClient {
    async fn submit(&self, submission: &IntakeSubmission) -> Result<(), IntakeError> {
        let response = self
            .http
            .post(self.endpoint("/api/submit"))
            .json(submission)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let reason = match response.json::<SubmitReply>().await {
            Ok(SubmitReply {
                error: Some(error), ..
            }) => error,
            Ok(SubmitReply {
                message: Some(message),
                ..
            }) => message,
            _ => format!("status {}", status),
        };
        Err(IntakeError::Submit(reason))
    }
}
