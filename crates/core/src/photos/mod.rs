//! Photo store - local object storage for proof photos and avatars
//!
//! Objects live under `<base>/<bucket>/<object_name>` with a hidden JSON
//! sidecar carrying the content type. Public URLs are `file://` URLs of the
//! stored object.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::config::project_dirs;
use crate::error::{Error, Result};

/// Storage buckets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bucket {
    TaskPhotos,
    Avatars,
}

impl Bucket {
    pub fn name(&self) -> &'static str {
        match self {
            Bucket::TaskPhotos => "task-photos",
            Bucket::Avatars => "avatars",
        }
    }
}

pub const DEFAULT_EXTENSION: &str = "jpg";

/// Metadata written next to every object
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectMeta {
    pub content_type: String,
    pub size_bytes: u64,
    pub uploaded_at: DateTime<Utc>,
}

/// A stored object
#[derive(Debug, Clone)]
pub struct StoredObject {
    pub bucket: Bucket,
    pub name: String,
    pub path: PathBuf,
    pub public_url: String,
}

/// Manages the local photo buckets
pub struct PhotoStore {
    base_path: PathBuf,
}

impl PhotoStore {
    /// Create a store under the platform data directory
    pub fn new() -> Result<Self> {
        let base_path = project_dirs()?.data_dir().join("photos");
        Self::with_base_path(base_path)
    }

    /// Create with custom base path (for testing)
    pub fn with_base_path(base_path: PathBuf) -> Result<Self> {
        fs::create_dir_all(&base_path)?;
        Ok(Self { base_path })
    }

    pub fn bucket_path(&self, bucket: Bucket) -> PathBuf {
        self.base_path.join(bucket.name())
    }

    /// Store bytes and return the object's public URL
    #[instrument(skip(self, bytes), fields(bucket = bucket.name(), size = bytes.len()))]
    pub fn upload(&self, bucket: Bucket, object_name: &str, bytes: &[u8]) -> Result<StoredObject> {
        validate_object_name(object_name)?;
        if bytes.is_empty() {
            return Err(Error::Validation("Photo is empty".into()));
        }

        let dir = self.bucket_path(bucket);
        fs::create_dir_all(&dir)?;

        let path = dir.join(object_name);
        fs::write(&path, bytes)?;

        let ext = Path::new(object_name)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or(DEFAULT_EXTENSION);
        let meta = ObjectMeta {
            content_type: content_type(ext),
            size_bytes: bytes.len() as u64,
            uploaded_at: Utc::now(),
        };
        fs::write(
            dir.join(format!(".{object_name}.json")),
            serde_json::to_string_pretty(&meta)?,
        )?;

        let public_url = file_url(&path)?;
        debug!(url = %public_url, "Stored object");

        Ok(StoredObject {
            bucket,
            name: object_name.to_string(),
            path,
            public_url,
        })
    }

    /// Read an object's sidecar metadata
    pub fn metadata(&self, bucket: Bucket, object_name: &str) -> Result<Option<ObjectMeta>> {
        validate_object_name(object_name)?;
        let meta_path = self.bucket_path(bucket).join(format!(".{object_name}.json"));
        if !meta_path.exists() {
            return Ok(None);
        }
        let meta = serde_json::from_str(&fs::read_to_string(meta_path)?)?;
        Ok(Some(meta))
    }

    /// Delete an object and its sidecar; missing files are ignored
    #[instrument(skip(self), fields(bucket = bucket.name()))]
    pub fn remove(&self, bucket: Bucket, object_name: &str) -> Result<()> {
        validate_object_name(object_name)?;
        let dir = self.bucket_path(bucket);
        for path in [dir.join(object_name), dir.join(format!(".{object_name}.json"))] {
            match fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        debug!(object = object_name, "Removed object");
        Ok(())
    }

    /// Names of objects in a bucket, sorted
    pub fn list(&self, bucket: Bucket) -> Result<Vec<String>> {
        let dir = self.bucket_path(bucket);
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut names = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let name = entry?.file_name().to_string_lossy().to_string();
            // Skip sidecars
            if name.starts_with('.') {
                continue;
            }
            names.push(name);
        }
        names.sort();
        Ok(names)
    }
}

/// Object name for an upload: `{id}-{millis}.{ext}`
pub fn object_name(id: Uuid, ext: Option<&str>, now: DateTime<Utc>) -> String {
    let ext = normalize_extension(ext);
    format!("{}-{}.{}", id, now.timestamp_millis(), ext)
}

/// Lowercased extension without a leading dot; `jpg` when missing
pub fn normalize_extension(ext: Option<&str>) -> String {
    match ext.map(|e| e.trim().trim_start_matches('.')) {
        Some(e) if !e.is_empty() && e.chars().all(|c| c.is_ascii_alphanumeric()) => {
            e.to_ascii_lowercase()
        }
        _ => DEFAULT_EXTENSION.to_string(),
    }
}

pub fn content_type(ext: &str) -> String {
    format!("image/{}", normalize_extension(Some(ext)))
}

fn validate_object_name(name: &str) -> Result<()> {
    if name.is_empty() || name.starts_with('.') || name.contains(['/', '\\']) || name.contains("..")
    {
        return Err(Error::Validation(format!("Invalid object name: {name}")));
    }
    Ok(())
}

fn file_url(path: &Path) -> Result<String> {
    let absolute = fs::canonicalize(path)?;
    Ok(format!("file://{}", absolute.display()))
}
