//! HTTP front end: `POST /api/compress` takes a multipart upload and answers
//! with a [`CompressionReport`].
//!
//! Form fields: `file` (required), `method`, `level`, `quality`, `rank`,
//! `components`, `grayscale`. Codec work runs on the blocking pool under the
//! request timeout; an expired or abandoned request trips its cancellation
//! token.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::multipart::MultipartError;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::cancel::CancellationToken;
use crate::constants::{DEFAULT_MAX_UPLOAD_BYTES, DEFAULT_REQUEST_TIMEOUT_SECS};
use crate::error::CompressionError;
use crate::image_io;
use crate::parameters::ParameterRequest;
use crate::pipeline::{self, ColorMode, PipelineConfig};
use crate::report::{CompressionReport, ErrorResponse};

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind: SocketAddr,
    pub max_upload_bytes: usize,
    pub request_timeout: Duration,
    /// Convert every upload to grayscale unless the form says otherwise.
    pub grayscale: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 5000)),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            grayscale: false,
        }
    }
}

#[derive(Debug)]
enum ApiError {
    BadRequest(String),
    Upload(MultipartError),
    Timeout,
    Compression(CompressionError),
    Internal(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Upload(err) => err.status(),
            Self::Timeout => StatusCode::GATEWAY_TIMEOUT,
            Self::Compression(err) => compression_status(err),
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> String {
        match self {
            Self::BadRequest(message) | Self::Internal(message) => message.clone(),
            Self::Upload(err) => err.body_text(),
            Self::Timeout => "Compression timed out".to_string(),
            Self::Compression(err) => err.to_string(),
        }
    }
}

fn compression_status(err: &CompressionError) -> StatusCode {
    if err.is_client_error() {
        StatusCode::BAD_REQUEST
    } else if *err == CompressionError::Cancelled {
        StatusCode::GATEWAY_TIMEOUT
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            log::error!("request failed: {}", self.message());
        } else {
            log::warn!("request rejected ({}): {}", status, self.message());
        }
        (status, Json(ErrorResponse { error: self.message() })).into_response()
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        Self::Upload(err)
    }
}

/// Parsed multipart form.
#[derive(Debug, Default)]
struct UploadForm {
    bytes: Option<Vec<u8>>,
    method: Option<String>,
    request: ParameterRequest,
    grayscale: Option<bool>,
}

fn parse_knob(name: &str, text: &str) -> Result<Option<u32>, ApiError> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(None);
    }
    text.parse::<u32>()
        .map(Some)
        .map_err(|_| ApiError::BadRequest(format!("Field `{name}` must be a non-negative integer, got `{text}`")))
}

fn parse_flag(text: &str) -> bool {
    matches!(
        text.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "on" | "yes"
    )
}

async fn read_form(mut multipart: Multipart) -> Result<UploadForm, ApiError> {
    let mut form = UploadForm::default();
    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let filename = field.file_name().unwrap_or_default().to_string();
                if filename.is_empty() {
                    return Err(ApiError::BadRequest("No selected file".into()));
                }
                if !image_io::is_supported_upload(&filename) {
                    return Err(ApiError::BadRequest(format!("Unsupported file type: {filename}")));
                }
                form.bytes = Some(field.bytes().await?.to_vec());
            }
            "method" => form.method = Some(field.text().await?),
            "level" => form.request.level = parse_knob(&name, &field.text().await?)?,
            "quality" => form.request.quality = parse_knob(&name, &field.text().await?)?,
            "rank" => form.request.rank = parse_knob(&name, &field.text().await?)?,
            "components" => form.request.components = parse_knob(&name, &field.text().await?)?,
            "grayscale" => form.grayscale = Some(parse_flag(&field.text().await?)),
            other => log::debug!("ignoring form field `{other}`"),
        }
    }
    Ok(form)
}

async fn handle_upload(
    config: &ServerConfig,
    multipart: Multipart,
) -> Result<CompressionReport, ApiError> {
    let form = read_form(multipart).await?;
    let bytes = form
        .bytes
        .ok_or_else(|| ApiError::BadRequest("No file part".into()))?;
    let method = form.method.unwrap_or_else(|| "auto".to_string());
    let color_mode = if form.grayscale.unwrap_or(config.grayscale) {
        ColorMode::Grayscale
    } else {
        ColorMode::Preserve
    };
    let request = form.request;

    let cancel = CancellationToken::new();
    let pipeline_config = PipelineConfig::new()
        .with_color_mode(color_mode)
        .with_cancellation(cancel.clone());
    log::info!("compressing {} byte upload with `{}`", bytes.len(), method);

    run_cancellable(cancel, config.request_timeout, move || {
        let result = pipeline::compress_request(&bytes, &method, &request, &pipeline_config)?;
        CompressionReport::from_result(&result)
    })
    .await
}

/// Runs `job` on the blocking pool for at most `limit`.
///
/// `cancel` is tripped when the limit expires and also when this future is
/// dropped first, which is what happens when the client disconnects.
async fn run_cancellable<T, F>(
    cancel: CancellationToken,
    limit: Duration,
    job: F,
) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce() -> crate::error::Result<T> + Send + 'static,
{
    let guard = cancel.drop_guard();
    let task = tokio::task::spawn_blocking(job);
    match tokio::time::timeout(limit, task).await {
        Err(_) => {
            drop(guard);
            Err(ApiError::Timeout)
        }
        Ok(joined) => {
            guard.disarm();
            match joined {
                Err(join_err) => Err(ApiError::Internal(format!("compression task failed: {join_err}"))),
                Ok(Err(err)) => Err(ApiError::Compression(err)),
                Ok(Ok(value)) => Ok(value),
            }
        }
    }
}

async fn compress_upload(
    State(config): State<Arc<ServerConfig>>,
    multipart: Multipart,
) -> Response {
    match handle_upload(&config, multipart).await {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(err) => err.into_response(),
    }
}

async fn healthz() -> impl IntoResponse {
    "ok"
}

pub fn router(config: ServerConfig) -> Router {
    let limit = config.max_upload_bytes;
    Router::new()
        .route("/api/compress", post(compress_upload))
        .route("/healthz", get(healthz))
        .layer(DefaultBodyLimit::max(limit))
        .with_state(Arc::new(config))
}

pub async fn serve(config: ServerConfig) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(config.bind).await?;
    log::info!(
        "listening on http://{} (upload limit {} bytes, timeout {:?}, rayon_threads={})",
        config.bind,
        config.max_upload_bytes,
        config.request_timeout,
        rayon::current_num_threads()
    );
    axum::serve(listener, router(config)).await
}

/// Builds a multi-threaded runtime and serves until the listener fails.
pub fn run(config: ServerConfig) -> std::io::Result<()> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(serve(config))
}
