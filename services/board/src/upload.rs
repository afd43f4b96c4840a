//! Multipart form parsing for profile and post images

use axum::extract::Multipart;
use std::collections::HashMap;
use tracing::debug;

use crate::error::{ApiError, ApiResult};
use crate::storage::{ImageKind, ImageStorage, image_extension};

/// File part of a multipart form, already read into memory
#[derive(Debug)]
pub struct UploadedFile {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Text fields plus at most one image file
#[derive(Debug, Default)]
pub struct ImageForm {
    fields: HashMap<String, String>,
    pub file: Option<UploadedFile>,
}

impl ImageForm {
    /// Read every part of `multipart`; only `file_field` may carry a file
    pub async fn parse(
        mut multipart: Multipart,
        file_field: &str,
        max_file_bytes: usize,
    ) -> ApiResult<Self> {
        let mut form = ImageForm::default();

        while let Some(mut field) = multipart.next_field().await? {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };

            if name != file_field {
                if field.file_name().is_some() {
                    debug!(field = %name, "Skipping unexpected file part");
                    continue;
                }
                let value = field.text().await?;
                form.fields.insert(name, value);
                continue;
            }

            if form.file.is_some() {
                return Err(ApiError::BadRequest(format!(
                    "Only one file is allowed in {}",
                    file_field
                )));
            }

            let file_name = field.file_name().unwrap_or_default().to_string();
            let content_type = field.content_type().unwrap_or_default().to_string();

            let mut bytes = Vec::new();
            while let Some(chunk) = field.chunk().await? {
                if bytes.len() + chunk.len() > max_file_bytes {
                    return Err(ApiError::PayloadTooLarge(format!(
                        "Image must be at most {} bytes",
                        max_file_bytes
                    )));
                }
                bytes.extend_from_slice(&chunk);
            }

            // browsers send an empty part when no file was picked
            if bytes.is_empty() {
                continue;
            }

            if image_extension(&content_type).is_none() {
                return Err(ApiError::BadRequest(
                    "Only PNG, JPEG, GIF or WebP images are allowed".to_string(),
                ));
            }

            form.file = Some(UploadedFile {
                file_name,
                content_type,
                bytes,
            });
        }

        Ok(form)
    }

    /// Trimmed value of a text field; blank values count as absent
    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
    }

    /// Store the uploaded image, if any, and return its stored name
    pub async fn store_file(
        &mut self,
        storage: &ImageStorage,
        kind: ImageKind,
    ) -> ApiResult<Option<String>> {
        let Some(file) = self.file.take() else {
            return Ok(None);
        };

        let name = storage
            .save(kind, &file.file_name, &file.content_type, file.bytes)
            .await?;
        Ok(Some(name))
    }
}
