//! Reference image service.
//!
//! Endpoints:
//! - `GET  /healthz`
//! - `GET  /images`        all records; 404 when the catalog is empty
//! - `POST /upload`        `{ url, location: { latitude, longitude } }`
//! - `POST /assets`        raw bytes, content-addressed; returns `{ url }`
//! - `GET  /assets/:id`
//! - `GET  /location`      caller ip, honoring `x-forwarded-for`

use std::env;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::body::Body;
use axum::extract::rejection::JsonRejection;
use axum::extract::{ConnectInfo, DefaultBodyLimit, Path as AxumPath, State};
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use bytes::Bytes;
use catalog::memory::DEFAULT_MAX_ASSET_BYTES;
use catalog::{
    AssetUploaded, CreateImageRequest, CreateImageResponse, ErrorBody, InMemoryAssetHost,
    InMemoryImageService, ServiceError,
};
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub addr: SocketAddr,
    /// Prefix for asset URLs handed back to clients.
    pub public_base_url: String,
    pub max_asset_bytes: usize,
}

impl ServerConfig {
    /// Reads `IMAGES_ADDR`, `PUBLIC_BASE_URL` and `MAX_ASSET_BYTES`.
    pub fn from_env() -> Result<Self, String> {
        let addr: SocketAddr = env::var("IMAGES_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:5000".to_string())
            .parse()
            .map_err(|err| format!("invalid IMAGES_ADDR: {err}"))?;
        let public_base_url =
            env::var("PUBLIC_BASE_URL").unwrap_or_else(|_| format!("http://{addr}"));
        Ok(Self {
            addr,
            public_base_url,
            max_asset_bytes: env_var_usize("MAX_ASSET_BYTES", DEFAULT_MAX_ASSET_BYTES),
        })
    }
}

#[derive(Clone)]
pub struct AppState {
    pub images: Arc<InMemoryImageService>,
    pub assets: Arc<InMemoryAssetHost>,
}

impl AppState {
    pub fn new(config: &ServerConfig) -> Self {
        Self {
            images: Arc::new(InMemoryImageService::new()),
            assets: Arc::new(
                InMemoryAssetHost::new(config.public_base_url.clone())
                    .with_max_bytes(config.max_asset_bytes),
            ),
        }
    }
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_headers(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS]);
    // Leave headroom so oversized assets reach the handler and get a JSON error.
    let body_limit = state.assets.max_bytes().saturating_add(64 * 1024);

    Router::new()
        .route("/healthz", get(healthz))
        .route("/images", get(list_images))
        .route("/upload", post(upload_image))
        .route("/assets", post(upload_asset))
        .route("/assets/:id", get(get_asset))
        .route("/location", get(get_location))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serves until the listener fails. Connection info is kept for `/location`.
pub async fn serve(listener: tokio::net::TcpListener, state: AppState) -> std::io::Result<()> {
    let app = router(state);
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
}

async fn healthz() -> Response {
    (StatusCode::OK, "ok").into_response()
}

async fn list_images(State(state): State<AppState>) -> Response {
    let images = state.images.snapshot();
    info!(count = images.len(), "listing images");
    if images.is_empty() {
        return error_response(StatusCode::NOT_FOUND, "No images found in the database");
    }
    (StatusCode::OK, Json(images)).into_response()
}

async fn upload_image(
    State(state): State<AppState>,
    payload: Result<Json<CreateImageRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(body) => body,
        Err(rejection) => {
            warn!("rejected upload body: {rejection}");
            return error_response(StatusCode::BAD_REQUEST, &rejection.body_text());
        }
    };

    let image = match request.validate() {
        Ok(image) => image,
        Err(err) => return service_error_response(&err),
    };

    let record = state.images.insert(image);
    let body = CreateImageResponse {
        message: "Image uploaded successfully".to_string(),
        image: record,
    };
    (StatusCode::CREATED, Json(body)).into_response()
}

async fn upload_asset(State(state): State<AppState>, body: Bytes) -> Response {
    match state.assets.store(body.to_vec()) {
        Ok(id) => {
            let url = state.assets.url_for(&id);
            (StatusCode::CREATED, Json(AssetUploaded { url })).into_response()
        }
        Err(err) => service_error_response(&err),
    }
}

async fn get_asset(State(state): State<AppState>, AxumPath(id): AxumPath<String>) -> Response {
    let Some(bytes) = state.assets.get(&id) else {
        return error_response(StatusCode::NOT_FOUND, "asset not found");
    };
    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/octet-stream"),
    );
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("public, max-age=31536000, immutable"),
    );
    (StatusCode::OK, headers, Body::from(bytes)).into_response()
}

async fn get_location(
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> Response {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());
    let ip = forwarded
        .map(str::to_string)
        .unwrap_or_else(|| peer.ip().to_string());
    (StatusCode::OK, Json(json!({ "ip": ip }))).into_response()
}

fn error_response(status: StatusCode, message: &str) -> Response {
    let body = ErrorBody {
        error: message.to_string(),
    };
    (status, Json(body)).into_response()
}

fn service_error_response(err: &ServiceError) -> Response {
    let status = match err {
        ServiceError::Validation(_) | ServiceError::Upload(_) => StatusCode::BAD_REQUEST,
        ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
        ServiceError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
    };
    warn!("request failed: {err}");
    error_response(status, &err.to_string())
}

fn env_var_usize(key: &str, default: usize) -> usize {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
