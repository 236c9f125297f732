//! HTTP surface.
//!
//! - `POST /analyze/{turtle,snake,balloon,onetap}`: exercise verdict
//! - `POST /analyze_audio`: generic stutter analysis
//! - `GET /health`
//!
//! Uploads are multipart with one `file` field (WAV) and, for Snake, an optional
//! `target_phoneme` text field. Input problems are rejected before the pipeline
//! runs; everything after that degrades inside the pipeline instead of failing.

use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::multipart::{Multipart, MultipartError};
use axum::extract::{DefaultBodyLimit, Path as UrlPath, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use serde_json::json;
use tempfile::NamedTempFile;
use thiserror::Error;

use crate::exercise::{ExerciseKind, ExerciseReport};
use crate::pipeline::{AnalysisPipeline, StutterReport};

/// Request-level failures. The pipeline never starts when one of these is returned.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    UnsupportedMediaType(String),

    #[error("{0}")]
    PayloadTooLarge(String),

    #[error("{0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        match err.status() {
            StatusCode::PAYLOAD_TOO_LARGE => ApiError::PayloadTooLarge(err.body_text()),
            _ => ApiError::BadRequest(err.body_text()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct UploadConfig {
    pub max_bytes: usize,
    /// Lowercase file extensions accepted in the `file` field
    pub allowed_extensions: Vec<String>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_bytes: 16 * 1024 * 1024,
            allowed_extensions: vec!["wav".to_string()],
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<AnalysisPipeline>,
    pub upload: Arc<UploadConfig>,
    pub startup_time: Instant,
}

impl AppState {
    pub fn new(pipeline: AnalysisPipeline, upload: UploadConfig) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            upload: Arc::new(upload),
            startup_time: Instant::now(),
        }
    }
}

/// A validated upload, stored in a temp file that is removed when dropped.
struct Upload {
    file: NamedTempFile,
    target_phoneme: Option<String>,
}

fn check_extension(file_name: &str, allowed: &[String]) -> Result<(), ApiError> {
    let extension = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase);

    match extension {
        Some(ext) if allowed.iter().any(|a| *a == ext) => Ok(()),
        _ => Err(ApiError::UnsupportedMediaType(format!(
            "Unsupported file type: {} (allowed: {})",
            file_name,
            allowed.join(", ")
        ))),
    }
}

async fn read_upload(mut multipart: Multipart, config: &UploadConfig) -> Result<Upload, ApiError> {
    let mut file = None;
    let mut target_phoneme = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                check_extension(&file_name, &config.allowed_extensions)?;

                let bytes = field.bytes().await?;
                if bytes.is_empty() {
                    return Err(ApiError::BadRequest("Uploaded file is empty".to_string()));
                }

                let temp = tempfile::Builder::new()
                    .prefix("upload-")
                    .suffix(".wav")
                    .tempfile()
                    .map_err(|e| ApiError::Internal(format!("Failed to create temp file: {}", e)))?;
                tokio::fs::write(temp.path(), &bytes)
                    .await
                    .map_err(|e| ApiError::Internal(format!("Failed to store upload: {}", e)))?;

                log::debug!("Stored {} ({} bytes) at {}", file_name, bytes.len(), temp.path().display());
                file = Some(temp);
            }
            Some("target_phoneme") => {
                let text = field.text().await?;
                let text = text.trim();
                if !text.is_empty() {
                    target_phoneme = Some(text.to_string());
                }
            }
            _ => {}
        }
    }

    let file = file.ok_or_else(|| ApiError::BadRequest("No file".to_string()))?;
    Ok(Upload {
        file,
        target_phoneme,
    })
}

async fn analyze_exercise(
    State(state): State<AppState>,
    UrlPath(exercise): UrlPath<String>,
    multipart: Multipart,
) -> Result<Json<ExerciseReport>, ApiError> {
    let kind = ExerciseKind::from_str(&exercise)
        .map_err(|_| ApiError::NotFound(format!("Unknown exercise: {}", exercise)))?;

    let upload = read_upload(multipart, &state.upload).await?;
    let report = state
        .pipeline
        .analyze_exercise_file(
            kind,
            upload.file.path().to_path_buf(),
            upload.target_phoneme.as_deref(),
        )
        .await;

    Ok(Json(report))
}

async fn analyze_audio(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<StutterReport>, ApiError> {
    let upload = read_upload(multipart, &state.upload).await?;
    let report = state
        .pipeline
        .analyze_generic_file(upload.file.path().to_path_buf())
        .await;

    Ok(Json(report))
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub models_loaded: bool,
}

async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.startup_time.elapsed().as_secs(),
        models_loaded: state.pipeline.models().is_loaded(),
    })
}

pub fn build_router(state: AppState) -> Router {
    let limit = state.upload.max_bytes;

    Router::new()
        .route("/analyze_audio", post(analyze_audio))
        .route("/analyze/:exercise", post(analyze_exercise))
        .route("/health", get(health_check))
        .layer(DefaultBodyLimit::max(limit))
        .with_state(state)
}
