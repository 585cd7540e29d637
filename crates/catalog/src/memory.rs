//! In-memory service implementations.
//!
//! The reference server persists through these, and tests use them as
//! stand-ins for the remote services.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use foundation::GeoCoord;
use parking_lot::RwLock;
use tracing::{debug, info};

use crate::{
    AssetHost, BoxFuture, CreateImageRequest, Geocoder, ImageRecord, ImageService, Location,
    NewImage, ServiceError,
};

/// Default upper bound for a single uploaded asset.
pub const DEFAULT_MAX_ASSET_BYTES: usize = 10 * 1024 * 1024;

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

fn unavailable() -> ServiceError {
    ServiceError::ServiceUnavailable("service is offline".to_string())
}

#[derive(Debug)]
pub struct InMemoryImageService {
    images: RwLock<Vec<ImageRecord>>,
    online: AtomicBool,
}

impl Default for InMemoryImageService {
    fn default() -> Self {
        Self {
            images: RwLock::new(Vec::new()),
            online: AtomicBool::new(true),
        }
    }
}

impl InMemoryImageService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulates an outage: every call fails with `ServiceUnavailable` while offline.
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    /// Stores a validated image and returns its record.
    pub fn insert(&self, image: NewImage) -> ImageRecord {
        let record = ImageRecord {
            id: uuid::Uuid::new_v4().to_string(),
            url: image.url,
            location: Some(Location::from(image.coord)),
            uploaded_at_ms: now_ms(),
        };
        self.images.write().push(record.clone());
        info!(id = %record.id, "image stored");
        record
    }

    /// Stores a record verbatim, including records without a usable location.
    pub fn insert_raw(&self, record: ImageRecord) {
        self.images.write().push(record);
    }

    /// All records in upload order.
    pub fn snapshot(&self) -> Vec<ImageRecord> {
        self.images.read().clone()
    }

    pub fn len(&self) -> usize {
        self.images.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.read().is_empty()
    }
}

impl ImageService for InMemoryImageService {
    fn list_images(&self) -> BoxFuture<'_, Result<Vec<ImageRecord>, ServiceError>> {
        Box::pin(async move {
            if !self.is_online() {
                return Err(unavailable());
            }
            Ok(self.snapshot())
        })
    }

    fn create_image(
        &self,
        request: CreateImageRequest,
    ) -> BoxFuture<'_, Result<ImageRecord, ServiceError>> {
        Box::pin(async move {
            // Validation runs first so a bad request never touches storage.
            let image = request.validate()?;
            if !self.is_online() {
                return Err(unavailable());
            }
            Ok(self.insert(image))
        })
    }
}

/// Content-addressed blob store handing out `{base_url}/assets/{hash}` URLs.
#[derive(Debug)]
pub struct InMemoryAssetHost {
    base_url: String,
    max_bytes: usize,
    blobs: RwLock<BTreeMap<String, Vec<u8>>>,
    online: AtomicBool,
}

impl InMemoryAssetHost {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            max_bytes: DEFAULT_MAX_ASSET_BYTES,
            blobs: RwLock::new(BTreeMap::new()),
            online: AtomicBool::new(true),
        }
    }

    pub fn with_max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    /// Stores `bytes` and returns the content id.
    pub fn store(&self, bytes: Vec<u8>) -> Result<String, ServiceError> {
        if bytes.is_empty() {
            return Err(ServiceError::Upload("asset is empty".to_string()));
        }
        if bytes.len() > self.max_bytes {
            return Err(ServiceError::Upload(format!(
                "asset is {} bytes, limit is {}",
                bytes.len(),
                self.max_bytes
            )));
        }
        let id = blake3::hash(&bytes).to_hex().to_string();
        debug!(%id, len = bytes.len(), "asset stored");
        self.blobs.write().insert(id.clone(), bytes);
        Ok(id)
    }

    pub fn get(&self, id: &str) -> Option<Vec<u8>> {
        self.blobs.read().get(id).cloned()
    }

    pub fn url_for(&self, id: &str) -> String {
        format!("{}/assets/{}", self.base_url, id)
    }
}

impl AssetHost for InMemoryAssetHost {
    fn upload_asset(&self, bytes: Vec<u8>) -> BoxFuture<'_, Result<String, ServiceError>> {
        Box::pin(async move {
            if !self.online.load(Ordering::SeqCst) {
                return Err(ServiceError::Upload("asset host is offline".to_string()));
            }
            let id = self.store(bytes)?;
            Ok(self.url_for(&id))
        })
    }
}

/// Fixed gazetteer lookup. Matching ignores case and repeated whitespace.
#[derive(Debug, Default, Clone)]
pub struct StaticGeocoder {
    places: BTreeMap<String, GeoCoord>,
}

impl StaticGeocoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_place(mut self, name: &str, coord: GeoCoord) -> Self {
        self.places.insert(normalize_address(name), coord);
        self
    }

    /// A handful of world capitals, enough for demos.
    pub fn capitals() -> Self {
        [
            ("London", 51.5074, -0.1278),
            ("Paris", 48.8566, 2.3522),
            ("Tokyo", 35.6762, 139.6503),
            ("Washington", 38.9072, -77.0369),
            ("Canberra", -35.2809, 149.13),
            ("Nairobi", -1.2921, 36.8219),
            ("Brasilia", -15.7975, -47.8919),
        ]
        .into_iter()
        .filter_map(|(name, lat, lon)| GeoCoord::new(lat, lon).ok().map(|c| (name, c)))
        .fold(Self::new(), |g, (name, c)| g.with_place(name, c))
    }

    pub fn lookup(&self, address: &str) -> Option<GeoCoord> {
        self.places.get(&normalize_address(address)).copied()
    }
}

fn normalize_address(address: &str) -> String {
    address
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

impl Geocoder for StaticGeocoder {
    fn geocode<'a>(&'a self, address: &'a str) -> BoxFuture<'a, Result<GeoCoord, ServiceError>> {
        Box::pin(async move {
            self.lookup(address)
                .ok_or_else(|| ServiceError::NotFound(format!("no match for {address:?}")))
        })
    }
}
