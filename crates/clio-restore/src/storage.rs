//! Attachment stores: a local directory tree or an S3-compatible bucket.

use std::path::PathBuf;

use async_trait::async_trait;
use aws_sdk_s3::{
    config::{Credentials, Region},
    primitives::ByteStream,
    types::ObjectCannedAcl,
    Client as S3Client, Config as S3Config,
};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use clio_core::{AttachmentStore, Error, Result};

use crate::config::StoreConfig;

/// `Content-Disposition` value served with a stored attachment.
///
/// The plain `filename` parameter carries an ASCII fallback, `filename*`
/// the exact UTF-8 name.
pub fn content_disposition(display_name: &str) -> String {
    if display_name.is_empty() {
        return "inline".to_string();
    }
    let ascii: String = display_name
        .chars()
        .map(|c| match c {
            '\x20'..='\x7f' if c != '"' && c != '\\' => c,
            _ => '_',
        })
        .collect();
    format!(
        "inline; filename=\"{}\"; filename*=utf-8''{}",
        ascii,
        urlencoding::encode(display_name)
    )
}

/// Store rooted at a local directory.
pub struct FilesystemStore {
    root: PathBuf,
}

impl FilesystemStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn full_path(&self, path: &str) -> Result<PathBuf> {
        let relative = path.trim_start_matches('/');
        if relative.split('/').any(|part| part == "..") {
            return Err(Error::Storage(format!("path escapes store root: {}", path)));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl AttachmentStore for FilesystemStore {
    async fn put(
        &self,
        path: &str,
        data: &[u8],
        _content_type: &str,
        _display_name: &str,
    ) -> Result<()> {
        let full_path = self.full_path(path)?;
        debug!(
            subsystem = "storage",
            component = "filesystem",
            op = "put",
            storage_path = %path,
            size_bytes = data.len(),
            "Writing attachment"
        );

        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                warn!(parent = %parent.display(), error = %e, "filesystem store: create_dir_all failed");
                e
            })?;
        }

        // Atomic write: temp file + rename
        let temp_path = full_path.with_extension("tmp");
        let written = match write_synced(&temp_path, data).await {
            Ok(()) => fs::rename(&temp_path, &full_path).await,
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            warn!(from = %temp_path.display(), to = %full_path.display(), error = %e, "filesystem store: write failed");
            if let Err(rm) = fs::remove_file(&temp_path).await {
                debug!(path = %temp_path.display(), error = %rm, "filesystem store: temp file not removed");
            }
            return Err(e.into());
        }

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&full_path, std::fs::Permissions::from_mode(0o644)).await?;
        }

        Ok(())
    }
}

async fn write_synced(path: &std::path::Path, data: &[u8]) -> std::io::Result<()> {
    let mut file = fs::File::create(path).await?;
    file.write_all(data).await?;
    file.sync_all().await
}

/// Store backed by an S3 bucket; objects are public-read.
pub struct S3Store {
    client: S3Client,
    bucket: String,
}

impl S3Store {
    pub fn new(client: S3Client, bucket: String) -> Self {
        Self { client, bucket }
    }
}

#[async_trait]
impl AttachmentStore for S3Store {
    async fn put(&self, path: &str, data: &[u8], content_type: &str, display_name: &str) -> Result<()> {
        let key = path.trim_start_matches('/');
        debug!(
            subsystem = "storage",
            component = "s3",
            op = "put",
            bucket = %self.bucket,
            key,
            size_bytes = data.len(),
            "Uploading attachment"
        );
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .acl(ObjectCannedAcl::PublicRead)
            .content_type(content_type)
            .content_disposition(content_disposition(display_name))
            .body(ByteStream::from(data.to_vec()))
            .send()
            .await
            .map_err(|e| Error::Storage(format!("s3 put {}: {}", key, e)))?;
        Ok(())
    }
}

/// Build the configured attachment store.
pub fn build_store(config: &StoreConfig) -> Result<Box<dyn AttachmentStore>> {
    match config {
        StoreConfig::Filesystem { root } => Ok(Box::new(FilesystemStore::new(root.clone()))),
        StoreConfig::S3 {
            bucket,
            region,
            endpoint,
            path_style,
            access_key,
            secret_key,
        } => {
            let (Some(access), Some(secret)) = (access_key, secret_key) else {
                return Err(Error::Config(
                    "S3 store requires AWS_ACCESS_KEY_ID and AWS_SECRET_ACCESS_KEY".to_string(),
                ));
            };
            let credentials =
                Credentials::new(access.clone(), secret.clone(), None, None, "clio-restore");
            let mut builder = S3Config::builder()
                .region(Region::new(region.clone()))
                .credentials_provider(credentials)
                .force_path_style(*path_style);
            if let Some(endpoint) = endpoint {
                builder = builder.endpoint_url(endpoint.clone());
            }
            let client = S3Client::from_conf(builder.build());
            Ok(Box::new(S3Store::new(client, bucket.clone())))
        }
    }
}
