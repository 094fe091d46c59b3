use std::{collections::HashMap, path::PathBuf};

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::{fs, io::AsyncWriteExt};
use uuid::Uuid;

use crate::{
    error::StoreError,
    models::ResultRecord,
    storage::validate_key,
};

/// Document database holding one `ResultRecord` per generate call.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fresh unique id; two calls never return the same value.
    fn new_id(&self) -> String;

    /// Create-only write of a single document.
    async fn create(&self, collection: &str, id: &str, record: &ResultRecord) -> Result<(), StoreError>;

    async fn get(&self, collection: &str, id: &str) -> Result<Option<ResultRecord>, StoreError>;
}

/// 20 alphanumeric chars, the same shape as auto-generated document ids.
pub fn generate_id() -> String {
    Uuid::new_v4().simple().to_string()[..20].to_string()
}

/// One pretty-printed JSON file per document: `{base_dir}/{collection}/{id}.json`.
#[derive(Clone, Debug)]
pub struct LocalDocumentStore {
    base_dir: PathBuf,
}

impl LocalDocumentStore {
    pub fn new(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    fn document_path(&self, collection: &str, id: &str) -> Result<PathBuf, StoreError> {
        let key = format!("{collection}/{id}.json");
        validate_key(&key)?;
        if collection.contains('/') || id.contains('/') {
            return Err(StoreError::InvalidKey(key));
        }
        Ok(self.base_dir.join(key))
    }
}

#[async_trait]
impl DocumentStore for LocalDocumentStore {
    fn new_id(&self) -> String {
        generate_id()
    }

    async fn create(&self, collection: &str, id: &str, record: &ResultRecord) -> Result<(), StoreError> {
        let path = self.document_path(collection, id)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let payload = serde_json::to_vec_pretty(record)?;
        let mut file = match fs::OpenOptions::new().write(true).create_new(true).open(&path).await {
            Ok(file) => file,
            Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(StoreError::AlreadyExists(format!("{collection}/{id}")))
            }
            Err(err) => return Err(err.into()),
        };
        file.write_all(&payload).await?;
        file.flush().await?;
        Ok(())
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<ResultRecord>, StoreError> {
        let path = self.document_path(collection, id)?;
        match fs::read(&path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }
}

#[derive(Debug, Default)]
pub struct MemoryDocumentStore {
    documents: RwLock<HashMap<(String, String), ResultRecord>>,
}

impl MemoryDocumentStore {
    pub fn len(&self) -> usize {
        self.documents.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.read().is_empty()
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    fn new_id(&self) -> String {
        generate_id()
    }

    async fn create(&self, collection: &str, id: &str, record: &ResultRecord) -> Result<(), StoreError> {
        let mut guard = self.documents.write();
        let key = (collection.to_string(), id.to_string());
        if guard.contains_key(&key) {
            return Err(StoreError::AlreadyExists(format!("{collection}/{id}")));
        }
        guard.insert(key, record.clone());
        Ok(())
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<ResultRecord>, StoreError> {
        Ok(self.documents.read().get(&(collection.to_string(), id.to_string())).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RecordStatus, IMAGES_COLLECTION};
    use chrono::Utc;
    use pretty_assertions::assert_eq;

    fn record() -> ResultRecord {
        ResultRecord {
            user_id: "u1".into(),
            original_image_path: "users/u1/original.jpg".into(),
            category: "city".into(),
            resolved_category: None,
            prompts: vec!["a".into(), "b".into()],
            generated_image_urls: vec!["http://x/1.jpg".into()],
            created_at: Utc::now(),
            status: RecordStatus::Completed,
            generated_count: 1,
        }
    }

    #[test]
    fn ids_are_unique_and_alphanumeric() {
        let a = generate_id();
        let b = generate_id();
        assert_ne!(a, b);
        assert_eq!(a.len(), 20);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[tokio::test]
    async fn local_documents_round_trip() {
        let temp = tempfile::tempdir().unwrap();
        let store = LocalDocumentStore::new(temp.path().to_path_buf());
        let id = store.new_id();
        let rec = record();

        assert_eq!(store.get(IMAGES_COLLECTION, &id).await.unwrap(), None);
        store.create(IMAGES_COLLECTION, &id, &rec).await.unwrap();
        assert_eq!(store.get(IMAGES_COLLECTION, &id).await.unwrap(), Some(rec.clone()));
        assert!(matches!(
            store.create(IMAGES_COLLECTION, &id, &rec).await,
            Err(StoreError::AlreadyExists(_))
        ));
        assert!(temp.path().join("images").join(format!("{id}.json")).is_file());
    }

    #[tokio::test]
    async fn local_documents_reject_bad_ids() {
        let temp = tempfile::tempdir().unwrap();
        let store = LocalDocumentStore::new(temp.path().to_path_buf());
        assert!(matches!(store.get(IMAGES_COLLECTION, "../x").await, Err(StoreError::InvalidKey(_))));
    }

    #[tokio::test]
    async fn memory_documents_are_create_only() {
        let store = MemoryDocumentStore::default();
        store.create("images", "a", &record()).await.unwrap();
        assert!(store.create("images", "a", &record()).await.is_err());
        assert_eq!(store.len(), 1);
    }
}
