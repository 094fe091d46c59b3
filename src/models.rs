use std::collections::BTreeMap;

use bytes::Bytes;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_with::skip_serializing_none;

pub const IMAGES_COLLECTION: &str = "images";

/// Inbound generate call. Fields stay loosely typed so the validator can tell
/// "missing" apart from "not a string".
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    #[serde(default)]
    pub image_path: Option<Value>,
    #[serde(default)]
    pub category: Option<Value>,
    #[serde(default)]
    pub prompt: Option<Value>, // single-prompt variant
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GenerateResponse {
    pub success: bool,
    pub generated_id: String,
    pub generated_image_urls: Vec<String>,
    pub created_at: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    Completed,
    Partial,
}

impl RecordStatus {
    pub fn from_count(generated_count: usize) -> Self {
        if generated_count > 0 { RecordStatus::Completed } else { RecordStatus::Partial }
    }
}

/// Aggregate document written once per generate call.
#[skip_serializing_none]
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResultRecord {
    pub user_id: String,
    pub original_image_path: String,
    pub category: String,
    pub resolved_category: Option<String>,
    pub prompts: Vec<String>,
    pub generated_image_urls: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub status: RecordStatus,
    pub generated_count: usize,
}

impl ResultRecord {
    pub fn response(&self, generated_id: &str) -> GenerateResponse {
        GenerateResponse {
            success: true,
            generated_id: generated_id.to_string(),
            generated_image_urls: self.generated_image_urls.clone(),
            created_at: self.created_at.to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }
}

/// Bytes and declared media type of the photo being restyled.
#[derive(Debug, Clone)]
pub struct SourceImage {
    pub bytes: Bytes,
    pub content_type: String,
}

#[derive(Debug, Clone)]
pub struct StoredObject {
    pub bytes: Bytes,
    pub content_type: Option<String>,
    pub public: bool,
}

#[skip_serializing_none]
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMetadata {
    pub content_type: Option<String>,
    #[serde(default)]
    pub custom: BTreeMap<String, String>,
    #[serde(default)]
    pub public: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub image_path: String,
}
