use axum::{
    body::Bytes,
    extract::{rejection::JsonRejection, DefaultBodyLimit, Path, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use uuid::Uuid;

use crate::{
    error::{PipelineError, StoreError, UNAUTHENTICATED_MESSAGE},
    identity::{CallerId, IdentityProvider},
    models::{GenerateRequest, GenerateResponse, ObjectMetadata, ResultRecord, UploadResponse, IMAGES_COLLECTION},
    pipeline::Pipeline,
    records::DocumentStore,
    storage::ObjectStore,
};

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
    pub objects: Arc<dyn ObjectStore>,
    pub documents: Arc<dyn DocumentStore>,
    pub identity: Arc<dyn IdentityProvider>,
}

#[derive(Debug, Clone, Copy)]
pub struct Limits {
    pub max_upload_bytes: usize,
    pub max_concurrent_generations: usize,
}

pub fn router(state: AppState, limits: Limits) -> Router {
    Router::new()
        .route(
            "/api/generate",
            post(generate_images).layer(ConcurrencyLimitLayer::new(limits.max_concurrent_generations)),
        )
        .route("/api/images/:id", get(get_image))
        .route(
            "/api/uploads",
            post(upload_source).layer(DefaultBodyLimit::max(limits.max_upload_bytes)),
        )
        .route("/objects/*path", get(serve_object))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        )
        .with_state(state)
}

fn require_caller(state: &AppState, headers: &HeaderMap) -> Result<CallerId, PipelineError> {
    state
        .identity
        .authenticate(headers)
        .ok_or_else(|| PipelineError::Unauthenticated(UNAUTHENTICATED_MESSAGE.to_string()))
}

pub async fn generate_images(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<GenerateRequest>, JsonRejection>,
) -> Result<Json<GenerateResponse>, PipelineError> {
    let caller = state.identity.authenticate(&headers);
    let body = match body {
        Ok(Json(body)) => body,
        // identity is checked before the payload, same as the pipeline does
        Err(rejection) if caller.is_some() => {
            return Err(PipelineError::InvalidArgument(format!("Malformed request body: {}", rejection.body_text())))
        }
        Err(_) => GenerateRequest::default(),
    };
    let response = state.pipeline.run(caller, &body).await?;
    Ok(Json(response))
}

pub async fn get_image(
    Path(id): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ResultRecord>, PipelineError> {
    let caller = require_caller(&state, &headers)?;
    let not_found = || PipelineError::NotFound("Image record not found.".to_string());
    let record = match state.documents.get(IMAGES_COLLECTION, &id).await {
        Ok(record) => record,
        Err(StoreError::InvalidKey(_)) => None,
        Err(err) => return Err(PipelineError::internal(err)),
    };
    match record {
        Some(record) if record.user_id == caller.as_str() => Ok(Json(record)),
        _ => Err(not_found()),
    }
}

fn extension_for(content_type: &str) -> &'static str {
    match content_type {
        "image/jpeg" | "image/jpg" => "jpg",
        "image/png" => "png",
        "image/webp" => "webp",
        "image/heic" => "heic",
        "image/gif" => "gif",
        _ => "img",
    }
}

/// Stores a raw image body as a new source photo for the caller.
pub async fn upload_source(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<UploadResponse>), PipelineError> {
    let caller = require_caller(&state, &headers)?;
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.split(';').next().unwrap_or_default().trim().to_ascii_lowercase())
        .filter(|v| v.starts_with("image/"))
        .ok_or_else(|| PipelineError::InvalidArgument("Content-Type must be an image type.".to_string()))?;
    if body.is_empty() {
        return Err(PipelineError::InvalidArgument("Image body is empty.".to_string()));
    }

    let image_path = format!("users/{caller}/original/{}.{}", Uuid::new_v4().simple(), extension_for(&content_type));
    let metadata = ObjectMetadata { content_type: Some(content_type), ..Default::default() };
    state.objects.upload(&image_path, body, metadata).await.map_err(PipelineError::internal)?;

    tracing::info!("📤 Stored source image {}", image_path);
    Ok((StatusCode::CREATED, Json(UploadResponse { image_path })))
}

/// Serves objects that were made public; everything else looks missing.
pub async fn serve_object(Path(path): Path<String>, State(state): State<AppState>) -> Response {
    let path = path.trim_start_matches('/');
    match state.objects.download(path).await {
        Ok(object) if object.public => {
            let content_type = object
                .content_type
                .and_then(|ct| HeaderValue::from_str(&ct).ok())
                .unwrap_or_else(|| HeaderValue::from_static("application/octet-stream"));
            ([(header::CONTENT_TYPE, content_type)], object.bytes).into_response()
        }
        Ok(_) | Err(StoreError::NotFound(_)) | Err(StoreError::InvalidKey(_)) => StatusCode::NOT_FOUND.into_response(),
        Err(err) => {
            tracing::error!("❌ Failed to serve {}: {}", path, err);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
