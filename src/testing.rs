//! Fakes for the collaborator traits.

use std::{collections::VecDeque, time::Duration};

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;

use crate::{
    error::StoreError,
    gemini::{GeminiError, ImageGenerator},
    models::{ObjectMetadata, ResultRecord, SourceImage},
    records::{generate_id, DocumentStore},
    storage::{MemoryObjectStore, ObjectStore},
};

pub async fn seed_source(store: &MemoryObjectStore, key: &str) {
    let meta = ObjectMetadata { content_type: Some("image/png".into()), ..Default::default() };
    store.upload(key, Bytes::from_static(b"source-bytes"), meta).await.unwrap();
}

#[derive(Debug, Clone)]
pub enum Step {
    Image(String),
    Fail,
    NoImage,
}

impl Step {
    pub fn image(b64: &str) -> Self {
        Step::Image(b64.to_string())
    }
}

/// Replays one step per call; runs out into `NoImageData`.
#[derive(Debug, Default)]
pub struct ScriptedGenerator {
    steps: Mutex<VecDeque<Step>>,
    seen: Mutex<Vec<(String, String)>>,
}

impl ScriptedGenerator {
    pub fn new(steps: Vec<Step>) -> Self {
        Self { steps: Mutex::new(steps.into()), seen: Mutex::default() }
    }

    pub fn calls(&self) -> usize {
        self.seen.lock().len()
    }

    /// `(content_type, prompt)` per call.
    pub fn seen(&self) -> Vec<(String, String)> {
        self.seen.lock().clone()
    }
}

#[async_trait]
impl ImageGenerator for ScriptedGenerator {
    async fn generate(&self, source: &SourceImage, prompt: &str) -> Result<String, GeminiError> {
        self.seen.lock().push((source.content_type.clone(), prompt.to_string()));
        let step = self.steps.lock().pop_front();
        match step {
            Some(Step::Image(data)) => Ok(data),
            Some(Step::Fail) => Err(GeminiError::Status { status: 503, body: "upstream unavailable".into() }),
            Some(Step::NoImage) | None => Err(GeminiError::NoImageData),
        }
    }
}

pub struct SlowGenerator(pub Duration);

#[async_trait]
impl ImageGenerator for SlowGenerator {
    async fn generate(&self, _source: &SourceImage, _prompt: &str) -> Result<String, GeminiError> {
        tokio::time::sleep(self.0).await;
        Ok("QUFB".to_string())
    }
}

pub struct FailingDocumentStore;

#[async_trait]
impl DocumentStore for FailingDocumentStore {
    fn new_id(&self) -> String {
        generate_id()
    }

    async fn create(&self, _collection: &str, _id: &str, _record: &ResultRecord) -> Result<(), StoreError> {
        Err(StoreError::Io(std::io::Error::other("disk full")))
    }

    async fn get(&self, _collection: &str, _id: &str) -> Result<Option<ResultRecord>, StoreError> {
        Ok(None)
    }
}
