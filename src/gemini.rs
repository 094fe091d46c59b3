use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{error, info};

use crate::models::SourceImage;

#[derive(Debug, Error)]
pub enum GeminiError {
    #[error("HTTP error: {0}")] Http(String),
    #[error("API returned status {status}: {body}")] Status { status: u16, body: String },
    #[error("parse error: {0}")] Parse(String),
    #[error("no candidate in response")] NoCandidate,
    #[error("no content in candidate")] NoContent,
    #[error("no parts in content")] NoParts,
    #[error("no image data in response")] NoImageData,
}

/// Anything that can turn a source photo plus an instruction into base64 image data.
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    async fn generate(&self, source: &SourceImage, prompt: &str) -> Result<String, GeminiError>;
}

// Helper function to truncate base64 data in JSON for cleaner logging
fn truncate_base64_in_json(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for (key, val) in map.iter_mut() {
                if key == "data" {
                    if let Value::String(s) = val {
                        if s.len() > 100 && s.bytes().all(|c| c.is_ascii_alphanumeric() || c == b'+' || c == b'/' || c == b'=') {
                            *val = Value::String(format!("{}...[truncated {} chars]", &s[..50], s.len() - 50));
                        }
                    }
                } else {
                    truncate_base64_in_json(val);
                }
            }
        }
        Value::Array(arr) => {
            for val in arr.iter_mut() {
                truncate_base64_in_json(val);
            }
        }
        _ => {}
    }
}

pub struct GeminiClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl GeminiClient {
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
        }
    }

    fn request_body(source: &SourceImage, prompt: &str) -> Value {
        let encoded = base64::engine::general_purpose::STANDARD.encode(&source.bytes);
        json!({
            "contents": [{
                "parts": [
                    {"inlineData": {"mimeType": source.content_type, "data": encoded}},
                    {"text": prompt}
                ]
            }],
            "generationConfig": {
                "responseModalities": ["TEXT", "IMAGE"],
                "candidateCount": 1
            }
        })
    }

    async fn perform_api_call(&self, source: &SourceImage, prompt: &str) -> Result<GeminiResponse, GeminiError> {
        let url = format!("{}/models/{}:generateContent?key={}", self.base_url, self.model, self.api_key);

        info!("🔗 Making request to: {}", url.replace(&self.api_key, "***"));

        let response = self.client
            .post(&url)
            .json(&Self::request_body(source, prompt))
            .send()
            .await
            .map_err(|e| GeminiError::Http(e.to_string().replace(&self.api_key, "***")))?;

        let status = response.status();
        info!("📥 Response status: {}", status);

        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            error!("❌ API Error response: {}", error_body);
            return Err(GeminiError::Status { status: status.as_u16(), body: error_body });
        }

        let response_text = response.text().await
            .map_err(|e| GeminiError::Http(e.to_string()))?;

        let mut logged: Value = serde_json::from_str(&response_text)
            .map_err(|e| GeminiError::Parse(e.to_string()))?;
        truncate_base64_in_json(&mut logged);
        info!("📥 Raw Gemini API response: {}", logged);

        serde_json::from_str(&response_text).map_err(|e| GeminiError::Parse(e.to_string()))
    }
}

#[async_trait]
impl ImageGenerator for GeminiClient {
    async fn generate(&self, source: &SourceImage, prompt: &str) -> Result<String, GeminiError> {
        let parsed = self.perform_api_call(source, prompt).await?;
        let extracted = extract_image_data(&parsed)?;
        info!("🖼️ Extracted image from {:?} field ({} chars)", extracted.field, extracted.data.len());
        Ok(extracted.data)
    }
}

// --- Response Parsing Helpers ---

/// Response shape varies across API versions, so everything below the
/// candidate list is optional and parts stay raw JSON.
#[derive(Debug, Deserialize, Default)]
pub struct GeminiResponse {
    #[serde(default)]
    candidates: Option<Vec<Candidate>>,
}

#[derive(Debug, Deserialize)]
struct Candidate { #[serde(default)] content: Option<Content> }

#[derive(Debug, Deserialize)]
struct Content { #[serde(default)] parts: Option<Vec<Value>> }

/// Fields a part may carry image bytes under, in probing order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageField {
    InlineData,
    Data,
    FileData,
}

pub const EXTRACTION_ORDER: [ImageField; 3] = [ImageField::InlineData, ImageField::Data, ImageField::FileData];

fn non_empty(value: Option<&Value>) -> Option<&str> {
    value.and_then(Value::as_str).filter(|s| !s.is_empty())
}

impl ImageField {
    pub fn extract(self, part: &Value) -> Option<String> {
        match self {
            ImageField::InlineData => {
                let inline = part.get("inlineData").or_else(|| part.get("inline_data"))?;
                non_empty(inline.get("data")).map(str::to_string)
            }
            ImageField::Data => non_empty(part.get("data")).map(str::to_string),
            ImageField::FileData => {
                let file = part.get("fileData").or_else(|| part.get("file_data"))?;
                if let Some(s) = non_empty(Some(file)) {
                    return Some(s.to_string());
                }
                if let Some(s) = non_empty(file.get("data")) {
                    return Some(s.to_string());
                }
                let uri = non_empty(file.get("fileUri").or_else(|| file.get("file_uri")))?;
                let payload = uri.strip_prefix("data:")?.split_once(";base64,")?.1;
                (!payload.is_empty()).then(|| payload.to_string())
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedImage {
    pub field: ImageField,
    pub data: String,
}

/// Probes the first candidate's parts in order; within a part the fields are
/// tried in [`EXTRACTION_ORDER`] and the first hit wins.
pub fn extract_image_data(resp: &GeminiResponse) -> Result<ExtractedImage, GeminiError> {
    let candidate = resp.candidates.as_deref().and_then(<[Candidate]>::first).ok_or(GeminiError::NoCandidate)?;
    let content = candidate.content.as_ref().ok_or(GeminiError::NoContent)?;
    let parts = content.parts.as_ref().ok_or(GeminiError::NoParts)?;

    for part in parts {
        for field in EXTRACTION_ORDER {
            if let Some(data) = field.extract(part) {
                return Ok(ExtractedImage { field, data });
            }
        }
    }
    info!("⚠️ No image data found in response parts");
    Err(GeminiError::NoImageData)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use pretty_assertions::assert_eq;
    use wiremock::matchers::{body_partial_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn parse(value: Value) -> GeminiResponse {
        serde_json::from_value(value).unwrap()
    }

    fn source() -> SourceImage {
        SourceImage { bytes: Bytes::from_static(b"jpeg-bytes"), content_type: "image/png".into() }
    }

    #[test]
    fn inline_data_wins_over_other_fields() {
        let resp = parse(json!({"candidates": [{"content": {"parts": [
            {"text": "here you go"},
            {"data": "BARE", "inlineData": {"mimeType": "image/png", "data": "INLINE"}}
        ]}}]}));
        assert_eq!(extract_image_data(&resp).unwrap(), ExtractedImage { field: ImageField::InlineData, data: "INLINE".into() });
    }

    #[test]
    fn falls_back_through_field_order() {
        let bare = parse(json!({"candidates": [{"content": {"parts": [{"data": "BARE", "fileData": "FILE"}]}}]}));
        assert_eq!(extract_image_data(&bare).unwrap().field, ImageField::Data);

        let file = parse(json!({"candidates": [{"content": {"parts": [{"fileData": {"data": "FILE"}}]}}]}));
        assert_eq!(extract_image_data(&file).unwrap(), ExtractedImage { field: ImageField::FileData, data: "FILE".into() });

        let uri = parse(json!({"candidates": [{"content": {"parts": [{"fileData": {"fileUri": "data:image/png;base64,QUJD"}}]}}]}));
        assert_eq!(extract_image_data(&uri).unwrap().data, "QUJD");
    }

    #[test]
    fn snake_case_inline_data_is_accepted() {
        let resp = parse(json!({"candidates": [{"content": {"parts": [{"inline_data": {"data": "SNAKE"}}]}}]}));
        assert_eq!(extract_image_data(&resp).unwrap().data, "SNAKE");
    }

    #[test]
    fn missing_layers_are_reported() {
        assert!(matches!(extract_image_data(&parse(json!({}))), Err(GeminiError::NoCandidate)));
        assert!(matches!(extract_image_data(&parse(json!({"candidates": []}))), Err(GeminiError::NoCandidate)));
        assert!(matches!(extract_image_data(&parse(json!({"candidates": [{}]}))), Err(GeminiError::NoContent)));
        assert!(matches!(extract_image_data(&parse(json!({"candidates": [{"content": {}}]}))), Err(GeminiError::NoParts)));
        let text_only = parse(json!({"candidates": [{"content": {"parts": [{"text": "sorry"}, {"inlineData": {"data": ""}}]}}]}));
        assert!(matches!(extract_image_data(&text_only), Err(GeminiError::NoImageData)));
    }

    #[test]
    fn only_first_candidate_is_used() {
        let resp = parse(json!({"candidates": [
            {"content": {"parts": [{"text": "no image"}]}},
            {"content": {"parts": [{"inlineData": {"data": "SECOND"}}]}}
        ]}));
        assert!(matches!(extract_image_data(&resp), Err(GeminiError::NoImageData)));
    }

    #[test]
    fn long_base64_is_truncated_for_logs() {
        let mut value = json!({"parts": [{"inlineData": {"data": "A".repeat(200)}}]});
        truncate_base64_in_json(&mut value);
        let data = value["parts"][0]["inlineData"]["data"].as_str().unwrap();
        assert!(data.ends_with("...[truncated 150 chars]"));
    }

    #[test]
    fn non_ascii_data_is_left_alone() {
        let original = "中".repeat(40);
        let mut value = json!({"data": original.clone()});
        truncate_base64_in_json(&mut value);
        assert_eq!(value["data"], json!(original));
    }

    #[tokio::test]
    async fn client_sends_image_and_prompt() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/models/gemini-2.5-flash-image:generateContent"))
            .and(query_param("key", "test-key"))
            .and(body_partial_json(json!({
                "contents": [{"parts": [
                    {"inlineData": {"mimeType": "image/png", "data": "anBlZy1ieXRlcw=="}},
                    {"text": "put me on a beach"}
                ]}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{"content": {"parts": [{"inlineData": {"mimeType": "image/jpeg", "data": "R0VO"}}]}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = GeminiClient::new("test-key", server.uri(), "gemini-2.5-flash-image");
        let data = client.generate(&source(), "put me on a beach").await.unwrap();
        assert_eq!(data, "R0VO");
    }

    #[tokio::test]
    async fn client_survives_non_ascii_payloads() {
        let server = MockServer::start().await;
        let payload = "中".repeat(40);
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{"content": {"parts": [{"text": "x", "data": payload.clone()}]}}]
            })))
            .mount(&server)
            .await;

        let client = GeminiClient::new("test-key", server.uri(), "m");
        let data = client.generate(&source(), "p").await.unwrap();
        assert_eq!(data, payload);
    }

    #[tokio::test]
    async fn client_surfaces_upstream_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("quota"))
            .mount(&server)
            .await;

        let client = GeminiClient::new("test-key", server.uri(), "m");
        let err = client.generate(&source(), "p").await.unwrap_err();
        assert!(matches!(err, GeminiError::Status { status: 429, ref body } if body == "quota"));
    }

    #[tokio::test]
    async fn client_rejects_garbage_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let client = GeminiClient::new("test-key", server.uri(), "m");
        assert!(matches!(client.generate(&source(), "p").await, Err(GeminiError::Parse(_))));
    }
}
