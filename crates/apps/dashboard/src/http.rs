//! HTTP clients for the image service and its asset host.

use std::time::Duration;

use catalog::{
    AssetHost, AssetUploaded, BoxFuture, CreateImageRequest, CreateImageResponse, ErrorBody,
    ImageRecord, ImageService, ServiceError,
};
use tracing::{debug, warn};

/// Talks to an image service exposing `/images`, `/upload` and `/assets`.
#[derive(Debug, Clone)]
pub struct HttpImageService {
    base_url: String,
    client: reqwest::Client,
}

impl HttpImageService {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ServiceError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ServiceError::ServiceUnavailable(format!("http client: {e}")))?;
        Ok(Self::with_client(base_url, client))
    }

    pub fn with_client(base_url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }
}

fn unavailable(context: &str, err: impl std::fmt::Display) -> ServiceError {
    ServiceError::ServiceUnavailable(format!("{context}: {err}"))
}

/// Pulls the `{ "error": ... }` message out of a failed response.
async fn error_message(resp: reqwest::Response) -> String {
    let status = resp.status();
    match resp.json::<ErrorBody>().await {
        Ok(body) => body.error,
        Err(_) => format!("HTTP error: {status}"),
    }
}

impl ImageService for HttpImageService {
    fn list_images(&self) -> BoxFuture<'_, Result<Vec<ImageRecord>, ServiceError>> {
        let url = self.endpoint("images");
        Box::pin(async move {
            let resp = self
                .client
                .get(&url)
                .send()
                .await
                .map_err(|e| unavailable("HTTP request failed", e))?;

            // The service answers 404 for an empty catalog.
            if resp.status() == reqwest::StatusCode::NOT_FOUND {
                debug!("image service reports an empty catalog");
                return Ok(Vec::new());
            }

            if !resp.status().is_success() {
                let status = resp.status();
                let message = error_message(resp).await;
                warn!(%status, "listing images failed: {message}");
                return Err(ServiceError::ServiceUnavailable(message));
            }

            resp.json::<Vec<ImageRecord>>()
                .await
                .map_err(|e| unavailable("malformed image list", e))
        })
    }

    fn create_image(
        &self,
        request: CreateImageRequest,
    ) -> BoxFuture<'_, Result<ImageRecord, ServiceError>> {
        let url = self.endpoint("upload");
        Box::pin(async move {
            // Reject locally what the service would reject anyway.
            request.validate()?;

            let resp = self
                .client
                .post(&url)
                .json(&request)
                .send()
                .await
                .map_err(|e| unavailable("HTTP request failed", e))?;

            let status = resp.status();
            if status == reqwest::StatusCode::BAD_REQUEST {
                return Err(ServiceError::Validation(error_message(resp).await));
            }
            if !status.is_success() {
                return Err(ServiceError::ServiceUnavailable(error_message(resp).await));
            }

            let body = resp
                .json::<CreateImageResponse>()
                .await
                .map_err(|e| unavailable("malformed upload response", e))?;
            Ok(body.image)
        })
    }
}

impl AssetHost for HttpImageService {
    fn upload_asset(&self, bytes: Vec<u8>) -> BoxFuture<'_, Result<String, ServiceError>> {
        let url = self.endpoint("assets");
        Box::pin(async move {
            let len = bytes.len();
            let resp = self
                .client
                .post(&url)
                .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
                .body(bytes)
                .send()
                .await
                .map_err(|e| ServiceError::Upload(format!("HTTP request failed: {e}")))?;

            if !resp.status().is_success() {
                return Err(ServiceError::Upload(error_message(resp).await));
            }

            let AssetUploaded { url } = resp
                .json()
                .await
                .map_err(|e| ServiceError::Upload(format!("malformed asset response: {e}")))?;
            debug!(len, %url, "asset uploaded");
            Ok(url)
        })
    }
}
