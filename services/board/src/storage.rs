//! Image storage for profile pictures and post images
//!
//! Images go either to a local directory served by the service itself or
//! to an S3 bucket. Callers only ever see the stored file name.

use anyhow::{Context, Result};
use aws_sdk_s3::{Client, primitives::ByteStream};
use chrono::Utc;
use std::path::PathBuf;
use tracing::{info, warn};

use crate::config::{UploadBackend, UploadConfig};

/// Which folder an image belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Profile,
    Post,
}

impl ImageKind {
    pub fn folder(self) -> &'static str {
        match self {
            ImageKind::Profile => "profile_images",
            ImageKind::Post => "post_images",
        }
    }
}

/// File extension for an accepted image content type
///
/// Only raster formats are accepted. SVG can carry script, so it is
/// refused along with every other type.
pub fn image_extension(content_type: &str) -> Option<&'static str> {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    match essence.as_str() {
        "image/png" => Some("png"),
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/gif" => Some("gif"),
        "image/webp" => Some("webp"),
        _ => None,
    }
}

/// Build the stored name `<unix-millis>-<sanitized stem>.<extension>`
///
/// The client's own extension is dropped so the served type always
/// follows `extension`.
pub fn stored_file_name(original_name: &str, extension: &str, now_millis: i64) -> String {
    // browsers on Windows may send a full path
    let base = original_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default();

    let base = base.trim_start_matches('.');
    let stem = base.rsplit_once('.').map_or(base, |(stem, _)| stem);

    let sanitized: String = stem
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let sanitized = if sanitized.is_empty() { "image" } else { sanitized.as_str() };

    format!("{}-{}.{}", now_millis, sanitized, extension)
}

/// Image files on the local disk
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Create the image folders if missing
    pub async fn prepare(&self) -> Result<()> {
        for kind in [ImageKind::Profile, ImageKind::Post] {
            let dir = self.folder_path(kind);
            tokio::fs::create_dir_all(&dir)
                .await
                .with_context(|| format!("Failed to create {}", dir.display()))?;
        }
        Ok(())
    }

    pub fn folder_path(&self, kind: ImageKind) -> PathBuf {
        self.root.join(kind.folder())
    }

    async fn put(&self, kind: ImageKind, name: &str, bytes: &[u8]) -> Result<()> {
        let path = self.folder_path(kind).join(name);
        tokio::fs::write(&path, bytes)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }

    async fn remove(&self, kind: ImageKind, name: &str) -> Result<()> {
        let path = self.folder_path(kind).join(name);
        tokio::fs::remove_file(&path)
            .await
            .with_context(|| format!("Failed to remove {}", path.display()))?;
        Ok(())
    }
}

/// Image objects in an S3 bucket under `<folder>/<name>`
#[derive(Clone)]
pub struct S3Storage {
    client: Client,
    bucket: String,
}

impl S3Storage {
    pub fn new(client: Client, bucket: String) -> Self {
        Self { client, bucket }
    }

    fn object_key(kind: ImageKind, name: &str) -> String {
        format!("{}/{}", kind.folder(), name)
    }

    async fn put(&self, kind: ImageKind, name: &str, content_type: &str, bytes: Vec<u8>) -> Result<()> {
        let key = Self::object_key(kind, name);
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(ByteStream::from(bytes))
            .content_type(content_type)
            .send()
            .await
            .with_context(|| format!("Failed to upload s3://{}/{}", self.bucket, key))?;
        Ok(())
    }

    async fn remove(&self, kind: ImageKind, name: &str) -> Result<()> {
        let key = Self::object_key(kind, name);
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
            .with_context(|| format!("Failed to delete s3://{}/{}", self.bucket, key))?;
        Ok(())
    }
}

/// Configured image backend
#[derive(Clone)]
pub enum ImageStorage {
    Local(LocalStorage),
    S3(S3Storage),
}

impl ImageStorage {
    /// Build the backend selected in the upload settings
    pub async fn from_config(config: &UploadConfig) -> Result<Self> {
        match config.backend {
            UploadBackend::Local => {
                let storage = LocalStorage::new(&config.local_root);
                storage.prepare().await?;
                info!("Storing images under {}", config.local_root);
                Ok(ImageStorage::Local(storage))
            }
            UploadBackend::S3 => {
                let bucket = config
                    .bucket
                    .clone()
                    .context("upload.bucket is required for the s3 backend")?;
                let aws_config =
                    aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
                info!("Storing images in S3 bucket {}", bucket);
                Ok(ImageStorage::S3(S3Storage::new(
                    Client::new(&aws_config),
                    bucket,
                )))
            }
        }
    }

    /// Store an image and return its stored name
    pub async fn save(
        &self,
        kind: ImageKind,
        original_name: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<String> {
        let extension = image_extension(content_type)
            .with_context(|| format!("Unsupported image type {}", content_type))?;
        let name = stored_file_name(original_name, extension, Utc::now().timestamp_millis());

        match self {
            ImageStorage::Local(storage) => storage.put(kind, &name, &bytes).await?,
            ImageStorage::S3(storage) => storage.put(kind, &name, content_type, bytes).await?,
        }

        info!(folder = kind.folder(), name = %name, "Stored image");
        Ok(name)
    }

    /// Remove a stored image; failures are logged and swallowed
    pub async fn delete(&self, kind: ImageKind, name: &str) {
        let result = match self {
            ImageStorage::Local(storage) => storage.remove(kind, name).await,
            ImageStorage::S3(storage) => storage.remove(kind, name).await,
        };

        if let Err(e) = result {
            warn!("Failed to delete image {}: {:#}", name, e);
        }
    }

    /// Local directory to serve for `kind`, when images live on disk
    pub fn local_folder(&self, kind: ImageKind) -> Option<PathBuf> {
        match self {
            ImageStorage::Local(storage) => Some(storage.folder_path(kind)),
            ImageStorage::S3(_) => None,
        }
    }
}
