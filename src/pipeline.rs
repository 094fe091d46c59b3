//! The per-request generation pipeline: validate the call, resolve prompts,
//! load the source photo, generate one image per prompt, then record the result.

use std::{collections::BTreeMap, sync::Arc, time::Duration};

use base64::Engine;
use bytes::Bytes;
use chrono::Utc;
use serde_json::Value;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::{
    error::{PipelineError, StoreError, UNAUTHENTICATED_MESSAGE},
    gemini::{GeminiError, ImageGenerator},
    identity::CallerId,
    models::{GenerateRequest, GenerateResponse, ObjectMetadata, RecordStatus, ResultRecord, SourceImage, IMAGES_COLLECTION},
    prompts::{self, PromptSelection, PromptSet},
    records::DocumentStore,
    storage::{validate_key, ObjectStore},
};

pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(120);
const DEFAULT_SOURCE_TYPE: &str = "image/jpeg";
const GENERATED_CONTENT_TYPE: &str = "image/jpeg";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedRequest {
    pub caller: CallerId,
    pub image_path: String,
    pub selection: PromptSelection,
}

/// Why a single prompt produced no image. Never surfaced to the caller.
#[derive(Debug, Error)]
pub enum AttemptError {
    #[error("generation failed: {0}")] Generation(#[from] GeminiError),
    #[error("image data is not valid base64: {0}")] Decode(#[from] base64::DecodeError),
    #[error("storage failed: {0}")] Store(#[from] StoreError),
}

#[derive(Debug)]
pub enum AttemptOutcome {
    Stored { index: usize, url: String },
    Failed { index: usize, cause: AttemptError },
}

impl AttemptOutcome {
    pub fn url(&self) -> Option<&str> {
        match self {
            AttemptOutcome::Stored { url, .. } => Some(url),
            AttemptOutcome::Failed { .. } => None,
        }
    }
}

/// Dense list of URLs for the attempts that succeeded, in prompt order.
pub fn generated_urls(outcomes: &[AttemptOutcome]) -> Vec<String> {
    outcomes.iter().filter_map(AttemptOutcome::url).map(str::to_string).collect()
}

pub fn generated_path(caller: &CallerId, generated_id: &str, index: usize) -> String {
    format!("users/{caller}/generated/{generated_id}_{index}.jpg")
}

fn required_string(value: Option<&Value>, field: &str) -> Result<String, PipelineError> {
    match value {
        Some(Value::String(s)) if !s.is_empty() => Ok(s.clone()),
        _ => Err(PipelineError::InvalidArgument(format!("{field} is required and must be a string."))),
    }
}

pub fn validate(caller: Option<CallerId>, request: &GenerateRequest) -> Result<ValidatedRequest, PipelineError> {
    let caller = caller.ok_or_else(|| PipelineError::Unauthenticated(UNAUTHENTICATED_MESSAGE.to_string()))?;

    let image_path = required_string(request.image_path.as_ref(), "imagePath")?;
    if validate_key(&image_path).is_err() {
        return Err(PipelineError::InvalidArgument("imagePath must be a relative storage path.".to_string()));
    }

    let selection = match (&request.category, &request.prompt) {
        (None, Some(prompt)) => PromptSelection::Freeform(required_string(Some(prompt), "prompt")?),
        (category, _) => PromptSelection::Category(required_string(category.as_ref(), "category")?),
    };

    Ok(ValidatedRequest { caller, image_path, selection })
}

pub struct Pipeline {
    objects: Arc<dyn ObjectStore>,
    documents: Arc<dyn DocumentStore>,
    generator: Arc<dyn ImageGenerator>,
    deadline: Duration,
}

impl Pipeline {
    pub fn new(objects: Arc<dyn ObjectStore>, documents: Arc<dyn DocumentStore>, generator: Arc<dyn ImageGenerator>) -> Self {
        Self { objects, documents, generator, deadline: DEFAULT_DEADLINE }
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    pub async fn run(&self, caller: Option<CallerId>, request: &GenerateRequest) -> Result<GenerateResponse, PipelineError> {
        let validated = validate(caller, request)?;
        match tokio::time::timeout(self.deadline, self.execute(validated)).await {
            Ok(result) => result,
            Err(_) => Err(PipelineError::internal(format!("request deadline of {:?} elapsed", self.deadline))),
        }
    }

    async fn execute(&self, request: ValidatedRequest) -> Result<GenerateResponse, PipelineError> {
        let prompt_set = prompts::resolve(&request.selection);
        if prompt_set.is_fallback() {
            warn!("⚠️ Unknown category '{}', using default prompts", request.selection.label());
        }

        let generated_id = self.documents.new_id();
        let source = self.load_source(&request.image_path).await?;

        info!("🚀 Generating {} images for '{}' (id {})", prompt_set.len(), request.selection.label(), generated_id);
        let outcomes = self.generate_all(&request, &prompt_set, &source, &generated_id).await;
        let urls = generated_urls(&outcomes);

        let generated_count = urls.len();
        let record = ResultRecord {
            user_id: request.caller.to_string(),
            original_image_path: request.image_path.clone(),
            category: request.selection.label().to_string(),
            resolved_category: prompt_set.is_fallback().then(|| prompt_set.category().map(|c| c.key().to_string())).flatten(),
            prompts: prompt_set.prompts().to_vec(),
            generated_image_urls: urls,
            created_at: Utc::now(),
            status: RecordStatus::from_count(generated_count),
            generated_count,
        };

        self.documents
            .create(IMAGES_COLLECTION, &generated_id, &record)
            .await
            .map_err(PipelineError::internal)?;

        info!("✅ Recorded {} with {}/{} images", generated_id, generated_count, prompt_set.len());
        Ok(record.response(&generated_id))
    }

    async fn load_source(&self, image_path: &str) -> Result<SourceImage, PipelineError> {
        let exists = self.objects.exists(image_path).await.map_err(PipelineError::internal)?;
        if !exists {
            return Err(PipelineError::NotFound("Original image not found.".to_string()));
        }
        let object = self.objects.download(image_path).await.map_err(PipelineError::internal)?;
        Ok(SourceImage {
            bytes: object.bytes,
            content_type: object.content_type.unwrap_or_else(|| DEFAULT_SOURCE_TYPE.to_string()),
        })
    }

    /// Runs every prompt in order. A failed attempt is logged and skipped.
    pub async fn generate_all(
        &self,
        request: &ValidatedRequest,
        prompt_set: &PromptSet,
        source: &SourceImage,
        generated_id: &str,
    ) -> Vec<AttemptOutcome> {
        let total = prompt_set.len();
        let mut outcomes = Vec::with_capacity(total);
        for (index, prompt) in prompt_set.prompts().iter().enumerate() {
            let path = generated_path(&request.caller, generated_id, index);
            match self.attempt(request, source, prompt, &path).await {
                Ok(url) => {
                    info!("🖼️ Generated image {}/{} for '{}'", index + 1, total, request.selection.label());
                    outcomes.push(AttemptOutcome::Stored { index, url });
                }
                Err(cause) => {
                    error!("❌ Error generating image {}/{}: {}", index + 1, total, cause);
                    outcomes.push(AttemptOutcome::Failed { index, cause });
                }
            }
        }
        outcomes
    }

    async fn attempt(&self, request: &ValidatedRequest, source: &SourceImage, prompt: &str, path: &str) -> Result<String, AttemptError> {
        let encoded = self.generator.generate(source, prompt).await?;
        let bytes = base64::engine::general_purpose::STANDARD.decode(encoded.trim())?;

        let mut custom = BTreeMap::new();
        custom.insert("originalPrompt".to_string(), prompt.to_string());
        custom.insert("category".to_string(), request.selection.label().to_string());
        custom.insert("generatedAt".to_string(), Utc::now().to_rfc3339());
        let metadata = ObjectMetadata { content_type: Some(GENERATED_CONTENT_TYPE.to_string()), custom, public: false };

        self.objects.upload(path, Bytes::from(bytes), metadata).await?;
        Ok(self.objects.make_public(path).await?)
    }
}
