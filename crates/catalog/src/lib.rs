//! Contracts for the external services the dashboard consumes: the image
//! catalog (`list` / `create`), the asset host, and the geocoder.

use std::future::Future;
use std::pin::Pin;

use foundation::GeoCoord;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod memory;

pub use memory::{InMemoryAssetHost, InMemoryImageService, StaticGeocoder};

/// Type alias for a boxed future that can be sent between threads.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("asset upload failed: {0}")]
    Upload(String),
    #[error("not found: {0}")]
    NotFound(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Location {
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
}

impl Location {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude: Some(latitude),
            longitude: Some(longitude),
        }
    }
}

impl From<GeoCoord> for Location {
    fn from(coord: GeoCoord) -> Self {
        Self::new(coord.lat(), coord.lon())
    }
}

/// An image as listed by the catalog. Location fields may be absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRecord {
    #[serde(default)]
    pub id: String,
    pub url: String,
    #[serde(default)]
    pub location: Option<Location>,
    #[serde(default)]
    pub uploaded_at_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordIssue {
    MissingLocation,
    InvalidCoordinate,
}

impl ImageRecord {
    pub fn latitude(&self) -> Option<f64> {
        self.location.and_then(|l| l.latitude)
    }

    pub fn longitude(&self) -> Option<f64> {
        self.location.and_then(|l| l.longitude)
    }

    /// Validated position, or why the record cannot be placed on the globe.
    pub fn coord(&self) -> Result<GeoCoord, RecordIssue> {
        let (Some(lat), Some(lon)) = (self.latitude(), self.longitude()) else {
            return Err(RecordIssue::MissingLocation);
        };
        GeoCoord::new(lat, lon).map_err(|_| RecordIssue::InvalidCoordinate)
    }
}

/// Body of a create-image request, exactly as received.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CreateImageRequest {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub location: Option<Location>,
}

impl CreateImageRequest {
    pub fn new(url: impl Into<String>, coord: GeoCoord) -> Self {
        Self {
            url: Some(url.into()),
            location: Some(coord.into()),
        }
    }

    /// Checks the request before anything is stored.
    ///
    /// A latitude or longitude of exactly 0 is valid.
    pub fn validate(&self) -> Result<NewImage, ServiceError> {
        let url = self
            .url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .ok_or_else(|| ServiceError::Validation("image url is required".to_string()))?;

        let location = self.location.unwrap_or_default();
        let (Some(lat), Some(lon)) = (location.latitude, location.longitude) else {
            return Err(ServiceError::Validation(
                "location data is required".to_string(),
            ));
        };
        let coord =
            GeoCoord::new(lat, lon).map_err(|e| ServiceError::Validation(e.to_string()))?;

        Ok(NewImage {
            url: url.to_string(),
            coord,
        })
    }
}

/// A create request that passed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct NewImage {
    pub url: String,
    pub coord: GeoCoord,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateImageResponse {
    pub message: String,
    pub image: ImageRecord,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetUploaded {
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

/// Image catalog.
///
/// `list_images` returns `Ok(vec![])` when the catalog is empty; `Err` is
/// reserved for the service being unreachable.
pub trait ImageService: Send + Sync {
    fn list_images(&self) -> BoxFuture<'_, Result<Vec<ImageRecord>, ServiceError>>;

    fn create_image(
        &self,
        request: CreateImageRequest,
    ) -> BoxFuture<'_, Result<ImageRecord, ServiceError>>;
}

/// Third-party asset host: stores raw bytes and hands back a URL.
pub trait AssetHost: Send + Sync {
    fn upload_asset(&self, bytes: Vec<u8>) -> BoxFuture<'_, Result<String, ServiceError>>;
}

/// Address-to-coordinate lookup.
pub trait Geocoder: Send + Sync {
    fn geocode<'a>(&'a self, address: &'a str) -> BoxFuture<'a, Result<GeoCoord, ServiceError>>;
}
