use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;
use tokio::{fs, io::AsyncWriteExt};

use crate::{
    error::StoreError,
    models::{ObjectMetadata, StoredObject},
};

const META_DIR: &str = ".meta";

/// Object keys are relative, slash-separated paths. Empty segments and
/// segments starting with `.` are rejected, which also rules out `..`.
pub fn validate_key(key: &str) -> Result<(), StoreError> {
    if key.is_empty() || key.starts_with('/') || key.contains('\\') {
        return Err(StoreError::InvalidKey(key.to_string()));
    }
    if key.split('/').any(|seg| seg.is_empty() || seg.starts_with('.')) {
        return Err(StoreError::InvalidKey(key.to_string()));
    }
    Ok(())
}

/// Object storage used for source photos and generated images.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn exists(&self, key: &str) -> Result<bool, StoreError>;

    async fn download(&self, key: &str) -> Result<StoredObject, StoreError>;

    /// Create-only: fails with `AlreadyExists` if the key is taken.
    async fn upload(&self, key: &str, bytes: Bytes, metadata: ObjectMetadata) -> Result<(), StoreError>;

    /// Marks the object publicly readable and returns its public URL.
    async fn make_public(&self, key: &str) -> Result<String, StoreError>;
}

fn public_url(base_url: &str, key: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), key.trim_start_matches('/'))
}

/// Objects as plain files under `base_dir`, with metadata sidecars in `.meta/`.
#[derive(Clone, Debug)]
pub struct LocalObjectStore {
    base_dir: PathBuf,
    base_url: String,
}

impl LocalObjectStore {
    pub fn new(base_dir: PathBuf, base_url: String) -> Self {
        Self { base_dir, base_url }
    }

    fn resolve_path(&self, key: &str) -> Result<PathBuf, StoreError> {
        validate_key(key)?;
        Ok(self.base_dir.join(Path::new(key)))
    }

    fn meta_path(&self, key: &str) -> PathBuf {
        self.base_dir.join(META_DIR).join(format!("{key}.json"))
    }

    async fn read_meta(&self, key: &str) -> Result<ObjectMetadata, StoreError> {
        match fs::read(self.meta_path(key)).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(ObjectMetadata::default()),
            Err(err) => Err(err.into()),
        }
    }

    async fn write_meta(&self, key: &str, metadata: &ObjectMetadata) -> Result<(), StoreError> {
        let path = self.meta_path(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(path, serde_json::to_vec_pretty(metadata)?).await?;
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        let path = self.resolve_path(key)?;
        match fs::metadata(path).await {
            Ok(meta) => Ok(meta.is_file()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    async fn download(&self, key: &str) -> Result<StoredObject, StoreError> {
        let path = self.resolve_path(key)?;
        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Err(StoreError::NotFound(key.to_string())),
            Err(err) => return Err(err.into()),
        };
        let meta = self.read_meta(key).await?;
        Ok(StoredObject { bytes: Bytes::from(bytes), content_type: meta.content_type, public: meta.public })
    }

    async fn upload(&self, key: &str, bytes: Bytes, metadata: ObjectMetadata) -> Result<(), StoreError> {
        let path = self.resolve_path(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let mut file = match fs::OpenOptions::new().write(true).create_new(true).open(&path).await {
            Ok(file) => file,
            Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => return Err(StoreError::AlreadyExists(key.to_string())),
            Err(err) => return Err(err.into()),
        };
        let written: Result<(), StoreError> = async {
            file.write_all(&bytes).await?;
            file.flush().await?;
            self.write_meta(key, &metadata).await
        }
        .await;
        if written.is_err() {
            // a half-written object would block the key forever
            drop(file);
            let _ = fs::remove_file(&path).await;
            let _ = fs::remove_file(self.meta_path(key)).await;
        }
        written
    }

    async fn make_public(&self, key: &str) -> Result<String, StoreError> {
        if !self.exists(key).await? {
            return Err(StoreError::NotFound(key.to_string()));
        }
        let mut meta = self.read_meta(key).await?;
        if !meta.public {
            meta.public = true;
            self.write_meta(key, &meta).await?;
        }
        Ok(public_url(&self.base_url, key))
    }
}

/// Process-local store, handy for development runs and tests.
#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    base_url: String,
    objects: RwLock<HashMap<String, (Bytes, ObjectMetadata)>>,
}

impl MemoryObjectStore {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self { base_url: base_url.into(), objects: RwLock::default() }
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.objects.read().keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn metadata(&self, key: &str) -> Option<ObjectMetadata> {
        self.objects.read().get(key).map(|(_, meta)| meta.clone())
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        validate_key(key)?;
        Ok(self.objects.read().contains_key(key))
    }

    async fn download(&self, key: &str) -> Result<StoredObject, StoreError> {
        validate_key(key)?;
        let guard = self.objects.read();
        let (bytes, meta) = guard.get(key).ok_or_else(|| StoreError::NotFound(key.to_string()))?;
        Ok(StoredObject { bytes: bytes.clone(), content_type: meta.content_type.clone(), public: meta.public })
    }

    async fn upload(&self, key: &str, bytes: Bytes, metadata: ObjectMetadata) -> Result<(), StoreError> {
        validate_key(key)?;
        let mut guard = self.objects.write();
        if guard.contains_key(key) {
            return Err(StoreError::AlreadyExists(key.to_string()));
        }
        guard.insert(key.to_string(), (bytes, metadata));
        Ok(())
    }

    async fn make_public(&self, key: &str) -> Result<String, StoreError> {
        validate_key(key)?;
        let mut guard = self.objects.write();
        let (_, meta) = guard.get_mut(key).ok_or_else(|| StoreError::NotFound(key.to_string()))?;
        meta.public = true;
        Ok(public_url(&self.base_url, key))
    }
}
