//! File Upload Batcher
//!
//! Uploads every file of every file field in one concurrent batch. All
//! requests start together; the batch resolves once each one has settled or
//! as soon as the first one fails. Files uploaded before a failure stay on
//! the remote store.

use std::collections::BTreeMap;

use async_trait::async_trait;
use futures::stream::{FuturesUnordered, TryStreamExt};
use serde::{Deserialize, Serialize};

use crate::error::UploadError;
use crate::state::{FileHandle, FormState, FormValue};

/// Remote location of one uploaded file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResult {
    pub field_id: String,
    pub remote_location: String,
}

/// Uploaded locations grouped by field id, in completion order per field
pub type UploadedFiles = BTreeMap<String, Vec<UploadResult>>;

/// Something that can store a single file and report where it went
#[async_trait]
pub trait Uploader: Send + Sync {
    /// Upload one file, returning its remote URL or a failure reason
    async fn upload(&self, file: &FileHandle) -> Result<String, String>;
}

/// Drives the concurrent upload of a form's files
pub struct UploadBatcher<'a, U: Uploader + ?Sized> {
    uploader: &'a U,
}

impl<'a, U: Uploader + ?Sized> UploadBatcher<'a, U> {
    pub fn new(uploader: &'a U) -> Self {
        Self { uploader }
    }

    /// Every (field id, file) pair that the batch will upload
    pub fn pending<'s>(state: &'s FormState) -> Vec<(&'s str, &'s FileHandle)> {
        state
            .iter()
            .filter_map(|(id, value)| match value {
                FormValue::Files(set) => Some((id.as_str(), set)),
                _ => None,
            })
            .flat_map(|(id, set)| set.files.iter().map(move |f| (id, f)))
            .collect()
    }

    /// Upload all files in `state`.
    ///
    /// Results are grouped under their field id in the order the uploads
    /// completed. The first failing upload aborts the batch.
    pub async fn upload_all(&self, state: &FormState) -> Result<UploadedFiles, UploadError> {
        let pending = Self::pending(state);
        tracing::info!(files = pending.len(), "Starting upload batch");

        let in_flight: FuturesUnordered<_> = pending
            .into_iter()
            .map(|(field_id, file)| async move {
                match self.uploader.upload(file).await {
                    Ok(remote_location) => {
                        tracing::debug!(field = field_id, file = %file.name, "Uploaded");
                        Ok(UploadResult {
                            field_id: field_id.to_string(),
                            remote_location,
                        })
                    }
                    Err(reason) => {
                        tracing::warn!(
                            field = field_id,
                            file = %file.name,
                            %reason,
                            "Upload failed"
                        );
                        Err(UploadError {
                            field_id: field_id.to_string(),
                            file_name: file.name.clone(),
                            reason,
                        })
                    }
                }
            })
            .collect();

        let completed: Vec<UploadResult> = in_flight.try_collect().await?;

        let mut grouped = UploadedFiles::new();
        for result in completed {
            grouped
                .entry(result.field_id.clone())
                .or_default()
                .push(result);
        }
        Ok(grouped)
    }
}
