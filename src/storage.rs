use async_trait::async_trait;
use log::{error, info, warn};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MediaStoreError {
    #[error("duplicate")]
    Duplicate,
    #[error("not_found")]
    NotFound,
    #[error("invalid key")]
    InvalidKey,
    #[error("other: {0}")]
    Other(String),
}

/// Blob storage for logos, photos, ad images and promise videos.
/// Keys are relative slash-separated paths such as `posts/ab/ab12...ef.mp4`.
#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Fails with `Duplicate` when the key already exists.
    async fn save(&self, key: &str, mime: &str, bytes: &[u8]) -> Result<(), MediaStoreError>;
    async fn load(&self, key: &str) -> Result<(Vec<u8>, String), MediaStoreError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaFolder {
    Parties,
    Politicians,
    Posts,
    Ads,
    Submissions,
}

impl MediaFolder {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "parties" => Some(MediaFolder::Parties),
            "politicians" => Some(MediaFolder::Politicians),
            "posts" => Some(MediaFolder::Posts),
            "ads" => Some(MediaFolder::Ads),
            "submissions" => Some(MediaFolder::Submissions),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MediaFolder::Parties => "parties",
            MediaFolder::Politicians => "politicians",
            MediaFolder::Posts => "posts",
            MediaFolder::Ads => "ads",
            MediaFolder::Submissions => "submissions",
        }
    }

    /// Posts and submissions carry videos; everything else is an image.
    pub fn accepts(&self, mime: &str) -> bool {
        match self {
            MediaFolder::Posts | MediaFolder::Submissions => VIDEO_MIME.contains(&mime),
            _ => IMAGE_MIME.contains(&mime),
        }
    }
}

pub const IMAGE_MIME: &[&str] = &["image/png", "image/jpeg", "image/gif", "image/webp"];
pub const VIDEO_MIME: &[&str] = &["video/mp4", "video/webm", "video/quicktime"];

/// Content-addressed key: `{folder}/{sha[0..2]}/{sha}.{ext}`.
pub fn media_key(folder: MediaFolder, sha256_hex: &str, ext: &str) -> String {
    let prefix = sha256_hex.get(0..2).unwrap_or("00");
    format!("{}/{}/{}.{}", folder.as_str(), prefix, sha256_hex, ext)
}

/// Rejects absolute paths, `..`, empty segments and anything outside `[A-Za-z0-9._-/]`.
pub fn validate_key(key: &str) -> Result<(), MediaStoreError> {
    if key.is_empty()
        || key.len() > 256
        || key.starts_with('/')
        || key.split('/').any(|seg| seg.is_empty() || seg == "." || seg == "..")
        || !key.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-' | '/'))
    {
        return Err(MediaStoreError::InvalidKey);
    }
    Ok(())
}

fn sniff_mime(bytes: &[u8]) -> String {
    infer::get(bytes)
        .map(|t| t.mime_type().to_string())
        .unwrap_or_else(|| "application/octet-stream".into())
}

// ---------------- Local filesystem ----------------
pub struct FsMediaStore {
    root: PathBuf,
}

impl FsMediaStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn from_env() -> Self {
        let root = std::env::var("NETA_UPLOADS_DIR").unwrap_or_else(|_| "uploads".into());
        Self::new(root)
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, MediaStoreError> {
        validate_key(key)?;
        let rel = Path::new(key);
        if rel.components().any(|c| !matches!(c, Component::Normal(_))) {
            return Err(MediaStoreError::InvalidKey);
        }
        Ok(self.root.join(rel))
    }
}

#[async_trait]
impl MediaStore for FsMediaStore {
    async fn save(&self, key: &str, _mime: &str, bytes: &[u8]) -> Result<(), MediaStoreError> {
        let path = self.path_for(key)?;
        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return Err(MediaStoreError::Duplicate);
        }
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| MediaStoreError::Other(e.to_string()))?;
        }
        let tmp = path.with_extension("part");
        tokio::fs::write(&tmp, bytes)
            .await
            .map_err(|e| MediaStoreError::Other(e.to_string()))?;
        tokio::fs::rename(&tmp, &path).await.map_err(|e| {
            error!("rename {} -> {} failed: {e}", tmp.display(), path.display());
            MediaStoreError::Other(e.to_string())
        })?;
        Ok(())
    }

    async fn load(&self, key: &str) -> Result<(Vec<u8>, String), MediaStoreError> {
        let path = self.path_for(key)?;
        let bytes = match tokio::fs::read(&path).await {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(MediaStoreError::NotFound),
            Err(e) => return Err(MediaStoreError::Other(e.to_string())),
        };
        let mime = sniff_mime(&bytes);
        Ok((bytes, mime))
    }
}

// ---------------- S3 / MinIO ----------------
pub struct S3MediaStore {
    bucket: String,
    client: aws_sdk_s3::Client,
}

impl S3MediaStore {
    pub async fn new() -> anyhow::Result<Self> {
        use aws_credential_types::provider::SharedCredentialsProvider;
        use aws_credential_types::Credentials;

        let bucket = std::env::var("S3_BUCKET").unwrap_or_else(|_| "neta-media".into());
        let endpoint = std::env::var("S3_ENDPOINT")
            .map_err(|_| anyhow::anyhow!("S3_ENDPOINT must be set (MinIO / S3 endpoint)"))?;
        let region = std::env::var("S3_REGION").unwrap_or_else(|_| "us-east-1".into());
        let access = std::env::var("S3_ACCESS_KEY").unwrap_or_default();
        let secret = std::env::var("S3_SECRET_KEY").unwrap_or_default();

        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_sdk_s3::config::Region::new(region))
            .endpoint_url(endpoint);
        if !access.is_empty() && !secret.is_empty() {
            let creds = Credentials::new(access, secret, None, None, "static");
            loader = loader.credentials_provider(SharedCredentialsProvider::new(creds));
        }
        let conf = loader.load().await;
        // MinIO and most local endpoints lack wildcard DNS
        let s3_conf = aws_sdk_s3::config::Builder::from(&conf)
            .force_path_style(true)
            .build();
        let client = aws_sdk_s3::Client::from_conf(s3_conf);
        info!("Initialized S3 media client for bucket '{bucket}'");

        if let Err(e) = client.head_bucket().bucket(&bucket).send().await {
            warn!("head_bucket failed for '{bucket}' (will attempt create): {e:?}");
            let max_attempts = 5u32;
            for attempt in 1..=max_attempts {
                match client.create_bucket().bucket(&bucket).send().await {
                    Ok(_) => {
                        info!("created bucket '{bucket}' (attempt {attempt})");
                        break;
                    }
                    Err(e2) if attempt == max_attempts => {
                        error!("create_bucket failed for '{bucket}' after {attempt} attempts: {e2:?}");
                        return Err(anyhow::anyhow!("failed to ensure bucket '{bucket}': {e2}"));
                    }
                    Err(e2) => {
                        let backoff_ms = 200 * u64::from(attempt.pow(2));
                        warn!("create_bucket attempt {attempt} failed for '{bucket}': {e2:?} (retrying in {backoff_ms}ms)");
                        tokio::time::sleep(std::time::Duration::from_millis(backoff_ms)).await;
                    }
                }
            }
        }

        Ok(Self { bucket, client })
    }
}

#[async_trait]
impl MediaStore for S3MediaStore {
    async fn save(&self, key: &str, mime: &str, bytes: &[u8]) -> Result<(), MediaStoreError> {
        use aws_sdk_s3::primitives::ByteStream;
        validate_key(key)?;
        if self.client.head_object().bucket(&self.bucket).key(key).send().await.is_ok() {
            return Err(MediaStoreError::Duplicate);
        }
        let put = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(bytes.to_vec()))
            .content_type(mime);
        if let Err(e) = put.send().await {
            error!("put_object failed key={key} bucket={} err={:?}", self.bucket, e);
            return Err(MediaStoreError::Other(e.to_string()));
        }
        Ok(())
    }

    async fn load(&self, key: &str) -> Result<(Vec<u8>, String), MediaStoreError> {
        validate_key(key)?;
        let obj = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|_| MediaStoreError::NotFound)?;
        let stored_type = obj.content_type().map(str::to_string);
        let data = obj
            .body
            .collect()
            .await
            .map_err(|e| MediaStoreError::Other(e.to_string()))?;
        let bytes = data.into_bytes().to_vec();
        let mime = stored_type.unwrap_or_else(|| sniff_mime(&bytes));
        Ok((bytes, mime))
    }
}

/// S3 when `S3_ENDPOINT` is set, otherwise the local uploads directory.
pub async fn build_media_store() -> anyhow::Result<Arc<dyn MediaStore>> {
    if std::env::var("S3_ENDPOINT").map(|v| !v.is_empty()).unwrap_or(false) {
        Ok(Arc::new(S3MediaStore::new().await?))
    } else {
        let store = FsMediaStore::from_env();
        info!("Using filesystem media store at {}", store.root.display());
        Ok(Arc::new(store))
    }
}
