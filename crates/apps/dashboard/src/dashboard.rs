//! The dashboard controller.
//!
//! Owns the point store, the cached clusters, the interaction state and the
//! user-visible notices. All mutation goes through `&mut self`, so the owner
//! (the CLI event loop, or a test) is the single writer. Network calls are
//! split into `begin_*` / `finish_*` halves: the begin half tags the request,
//! the caller awaits the service wherever it likes, and the finish half drops
//! completions that were superseded in the meantime.

use catalog::{AssetHost, CreateImageRequest, Geocoder, ImageRecord, ImageService, ServiceError};
use foundation::math::Vec2;
use foundation::{GeoCoord, GeoPointId};
use runtime::{Event, EventBus, Frame, RequestToken, RequestTracker};
use scene::{
    Cluster, GeoPointStore, GlobeRenderer, Interaction, PickOutcome, PointRecord, SelectedImage,
    VisibilityStats, apply_decisions, cluster, evaluate,
};
use tracing::{debug, info, trace, warn};

use crate::config::DashboardConfig;
use crate::error::ActionError;

/// Camera altitude used when flying to a geocoded address.
pub const ADDRESS_FLY_TO_ALTITUDE_M: f64 = 2_000_000.0;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The store now holds `accepted` points; `rejected` records had no
    /// usable location.
    Loaded { accepted: usize, rejected: usize },
    /// The service has no images. The store is now empty.
    Empty,
    /// The service could not be reached. The store is unchanged.
    Failed(String),
    /// A newer fetch or a clear overtook this one; nothing was applied.
    Stale,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct FrameStats {
    pub frame: u64,
    /// The store changed since the previous frame and clusters were rebuilt.
    pub reclustered: bool,
    pub visibility: VisibilityStats,
}

/// An upload that passed its preconditions and is waiting on the services.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadTicket {
    coord: GeoCoord,
    bytes: Vec<u8>,
    clears: u64,
}

impl UploadTicket {
    pub fn coord(&self) -> GeoCoord {
        self.coord
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// The network half of an upload: push the bytes to the asset host, then
/// register the resulting URL with the image service.
pub async fn run_upload(
    images: &dyn ImageService,
    assets: &dyn AssetHost,
    ticket: &UploadTicket,
) -> Result<ImageRecord, ServiceError> {
    let url = assets.upload_asset(ticket.bytes.clone()).await?;
    images
        .create_image(CreateImageRequest::new(url, ticket.coord))
        .await
}

#[derive(Debug)]
pub struct Dashboard {
    cluster_threshold_km: f64,
    altitude_threshold_m: f64,
    store: GeoPointStore,
    clusters: Vec<Cluster>,
    clustered_generation: Option<u64>,
    interaction: Interaction,
    notices: EventBus,
    fetches: RequestTracker,
    geocodes: RequestTracker,
    /// Number of `clear` calls so far.
    clears: u64,
    frame: Frame,
}

impl Dashboard {
    pub fn new(config: &DashboardConfig) -> Self {
        Self {
            cluster_threshold_km: config.cluster_threshold_km,
            altitude_threshold_m: config.altitude_threshold_m,
            store: GeoPointStore::new(),
            clusters: Vec::new(),
            clustered_generation: None,
            interaction: Interaction::new(),
            notices: EventBus::new(),
            fetches: RequestTracker::new(),
            geocodes: RequestTracker::new(),
            clears: 0,
            frame: Frame::first(),
        }
    }

    pub fn store(&self) -> &GeoPointStore {
        &self.store
    }

    /// Clusters as of the last rendered frame.
    pub fn clusters(&self) -> &[Cluster] {
        &self.clusters
    }

    pub fn selected(&self) -> Option<&SelectedImage> {
        self.interaction.selected()
    }

    pub fn pending_location(&self) -> Option<GeoCoord> {
        self.interaction.pending_location()
    }

    pub fn frame(&self) -> Frame {
        self.frame
    }

    pub fn notices(&self) -> &[Event] {
        self.notices.events()
    }

    pub fn drain_notices(&mut self) -> Vec<Event> {
        self.notices.drain()
    }

    /// Runs one frame: re-cluster if the store changed, evaluate visibility
    /// against the renderer's camera and push the decisions.
    pub fn on_frame<R: GlobeRenderer + ?Sized>(&mut self, renderer: &mut R) -> FrameStats {
        let reclustered = self.refresh_clusters(renderer);
        let camera = renderer.current_camera_state();
        let decisions = evaluate(&self.clusters, &camera, self.altitude_threshold_m);
        apply_decisions(renderer, &self.clusters, &decisions);

        let stats = FrameStats {
            frame: self.frame.index,
            reclustered,
            visibility: VisibilityStats::from_decisions(&decisions),
        };
        trace!(
            frame = stats.frame,
            altitude_m = camera.altitude_m,
            aggregates = stats.visibility.aggregates_shown,
            members = stats.visibility.members_shown,
            occluded = stats.visibility.occluded,
            "frame evaluated"
        );
        self.frame = self.frame.next();
        stats
    }

    fn refresh_clusters<R: GlobeRenderer + ?Sized>(&mut self, renderer: &mut R) -> bool {
        let generation = self.store.generation();
        if self.clustered_generation == Some(generation) {
            return false;
        }

        self.clusters = cluster(self.store.all(), self.cluster_threshold_km);
        self.clustered_generation = Some(generation);

        // Cluster ids are positional, so markers from the previous pass are stale.
        renderer.clear_markers();
        if let Some(pending) = self.interaction.pending_location() {
            self.interaction.set_pending(pending, renderer);
        }

        debug!(
            points = self.store.len(),
            clusters = self.clusters.len(),
            threshold_km = self.cluster_threshold_km,
            "reclustered"
        );
        true
    }

    pub fn primary_pick<R: GlobeRenderer + ?Sized>(
        &mut self,
        screen: Vec2,
        renderer: &mut R,
    ) -> PickOutcome {
        self.interaction.primary_pick(
            screen,
            renderer,
            &self.store,
            &self.clusters,
            self.altitude_threshold_m,
        )
    }

    pub fn secondary_pick<R: GlobeRenderer + ?Sized>(
        &mut self,
        screen: Vec2,
        renderer: &mut R,
    ) -> Option<GeoCoord> {
        self.interaction.secondary_pick(screen, renderer)
    }

    pub fn close_selection(&mut self) -> Option<SelectedImage> {
        self.interaction.close_selection()
    }

    /// Empties the store, drops the cluster list and its markers, and forgets
    /// selection and pending state. In-flight fetches, uploads and geocodes
    /// become stale.
    pub fn clear<R: GlobeRenderer + ?Sized>(&mut self, renderer: &mut R) {
        self.store.clear();
        self.clusters.clear();
        self.clustered_generation = Some(self.store.generation());
        self.clears += 1;
        self.fetches.invalidate();
        self.geocodes.invalidate();
        renderer.clear_markers();
        self.interaction.reset(renderer);
        info!("dashboard cleared");
        self.notices.info(self.frame, "Cleared all images");
    }

    pub fn begin_fetch(&mut self) -> RequestToken {
        self.fetches.issue()
    }

    /// Applies a list-images completion.
    pub fn finish_fetch(
        &mut self,
        token: RequestToken,
        result: Result<Vec<ImageRecord>, ServiceError>,
    ) -> FetchOutcome {
        if !self.fetches.accept(token) {
            return FetchOutcome::Stale;
        }

        let records = match result {
            Ok(records) => records,
            Err(err) => {
                warn!("fetching images failed: {err}");
                self.notices
                    .error(self.frame, format!("Failed to load images: {err}"));
                return FetchOutcome::Failed(err.to_string());
            }
        };

        let total = records.len();
        let mut rejected = 0;
        let points: Vec<PointRecord> = records
            .into_iter()
            .filter_map(|record| match record.coord() {
                Ok(coord) => Some(PointRecord::new(record.url, coord)),
                Err(issue) => {
                    debug!(id = %record.id, ?issue, "skipping image without a usable location");
                    rejected += 1;
                    None
                }
            })
            .collect();
        let accepted = points.len();
        self.store.replace_all(points);

        if total == 0 {
            self.notices.info(self.frame, "No images uploaded yet");
            return FetchOutcome::Empty;
        }
        if rejected > 0 {
            warn!(accepted, rejected, "some images have no usable location");
            self.notices.warn(
                self.frame,
                format!("{rejected} image(s) skipped: missing or invalid location"),
            );
        }
        info!(accepted, rejected, "images loaded");
        FetchOutcome::Loaded { accepted, rejected }
    }

    /// Fetches and applies in one step.
    pub async fn refresh(&mut self, images: &dyn ImageService) -> FetchOutcome {
        let token = self.begin_fetch();
        let result = images.list_images().await;
        self.finish_fetch(token, result)
    }

    /// Checks upload preconditions and captures the pending location.
    pub fn begin_upload(&mut self, bytes: Vec<u8>) -> Result<UploadTicket, ActionError> {
        let Some(coord) = self.interaction.pending_location() else {
            return Err(self.precondition_failed("Pick a location on the globe first"));
        };
        if bytes.is_empty() {
            return Err(self.precondition_failed("Please select a file to upload"));
        }
        Ok(UploadTicket {
            coord,
            bytes,
            clears: self.clears,
        })
    }

    /// Applies an upload completion. Returns `Ok(None)` when the dashboard was
    /// cleared while the upload was in flight. A fetch that landed in the
    /// meantime may already hold the new image, in which case its point is
    /// reused instead of added twice.
    pub fn finish_upload<R: GlobeRenderer + ?Sized>(
        &mut self,
        ticket: UploadTicket,
        result: Result<ImageRecord, ServiceError>,
        renderer: &mut R,
    ) -> Result<Option<GeoPointId>, ActionError> {
        let record = match result {
            Ok(record) => record,
            Err(err) => {
                warn!("upload failed: {err}");
                self.notices
                    .error(self.frame, format!("Failed to upload image: {err}"));
                return Err(err.into());
            }
        };

        if ticket.clears != self.clears {
            debug!(id = %record.id, "dropping upload completion after clear");
            return Ok(None);
        }

        let coord = record.coord().unwrap_or(ticket.coord);
        let existing = self
            .store
            .all()
            .iter()
            .find(|p| p.url == record.url)
            .map(|p| p.id);
        let id = match existing {
            Some(id) => {
                debug!(%id, "uploaded image already arrived with a fetch");
                id
            }
            None => self.store.add(PointRecord::new(record.url, coord)),
        };
        if self.interaction.pending_location() == Some(ticket.coord) {
            self.interaction.clear_pending(renderer);
        }
        info!(%id, lat = coord.lat(), lon = coord.lon(), "image uploaded");
        self.notices.info(self.frame, "Image uploaded successfully");
        Ok(Some(id))
    }

    /// Uploads in one step: preconditions, network, apply.
    pub async fn upload<R: GlobeRenderer + ?Sized>(
        &mut self,
        images: &dyn ImageService,
        assets: &dyn AssetHost,
        bytes: Vec<u8>,
        renderer: &mut R,
    ) -> Result<Option<GeoPointId>, ActionError> {
        let ticket = self.begin_upload(bytes)?;
        let result = run_upload(images, assets, &ticket).await;
        self.finish_upload(ticket, result, renderer)
    }

    pub fn begin_locate(&mut self, address: &str) -> Result<RequestToken, ActionError> {
        if address.trim().is_empty() {
            return Err(self.precondition_failed("Enter an address to search for"));
        }
        Ok(self.geocodes.issue())
    }

    /// Applies a geocode completion: the result becomes the pending upload
    /// location and the camera flies to it. `Ok(None)` means superseded.
    pub fn finish_locate<R: GlobeRenderer + ?Sized>(
        &mut self,
        token: RequestToken,
        result: Result<GeoCoord, ServiceError>,
        renderer: &mut R,
    ) -> Result<Option<GeoCoord>, ActionError> {
        if !self.geocodes.accept(token) {
            return Ok(None);
        }
        match result {
            Ok(coord) => {
                self.interaction.set_pending(coord, renderer);
                renderer.fly_to(coord, ADDRESS_FLY_TO_ALTITUDE_M);
                Ok(Some(coord))
            }
            Err(err) => {
                let message = match &err {
                    ServiceError::NotFound(_) => "Address not found".to_string(),
                    other => format!("Address search failed: {other}"),
                };
                warn!("{message}");
                self.notices.warn(self.frame, message);
                Err(err.into())
            }
        }
    }

    pub async fn locate_address<R: GlobeRenderer + ?Sized>(
        &mut self,
        geocoder: &dyn Geocoder,
        address: &str,
        renderer: &mut R,
    ) -> Result<Option<GeoCoord>, ActionError> {
        let token = self.begin_locate(address)?;
        let result = geocoder.geocode(address).await;
        self.finish_locate(token, result, renderer)
    }

    fn precondition_failed(&mut self, message: &str) -> ActionError {
        self.notices.warn(self.frame, message);
        ActionError::precondition(message)
    }
}
