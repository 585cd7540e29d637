//! Pointer interaction: image selection and pending upload placement.
//!
//! Primary and secondary picks touch disjoint state (`selected` vs
//! `pending`), so neither gesture can disturb the other.

use foundation::math::Vec2;
use foundation::{GeoCoord, GeoPointId};
use tracing::debug;

use crate::cluster::{Cluster, ClusterId};
use crate::entity::MarkerKey;
use crate::store::GeoPointStore;
use crate::surface::{GlobeRenderer, MarkerStyle};

/// Fraction of the aggregation threshold used as the fly-to altitude when an
/// aggregate marker is activated; low enough that the members split out.
const CLUSTER_FLY_TO_FRACTION: f64 = 0.5;

#[derive(Debug, Clone, PartialEq)]
pub struct SelectedImage {
    pub point: GeoPointId,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PickOutcome {
    /// An image marker was hit; it is now the full-screen selection.
    Selected(SelectedImage),
    /// An aggregate marker was hit; the camera is flying in to split it.
    ZoomedToCluster { cluster: ClusterId, center: GeoCoord },
    /// Nothing with an image under the pointer.
    Nothing,
    /// A full-screen selection is open; picks are ignored until it is closed.
    Blocked,
}

#[derive(Debug, Default)]
pub struct Interaction {
    selected: Option<SelectedImage>,
    pending: Option<GeoCoord>,
}

impl Interaction {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn selected(&self) -> Option<&SelectedImage> {
        self.selected.as_ref()
    }

    pub fn pending_location(&self) -> Option<GeoCoord> {
        self.pending
    }

    /// Select-marker gesture.
    pub fn primary_pick<R: GlobeRenderer + ?Sized>(
        &mut self,
        screen: Vec2,
        renderer: &mut R,
        store: &GeoPointStore,
        clusters: &[Cluster],
        altitude_threshold_m: f64,
    ) -> PickOutcome {
        if self.selected.is_some() {
            return PickOutcome::Blocked;
        }

        match renderer.pick_entity_at(screen) {
            Some(MarkerKey::Point(id)) => {
                // The renderer may still report a marker from before a clear.
                let Some(point) = store.get(id) else {
                    debug!(%id, "picked marker has no stored point");
                    return PickOutcome::Nothing;
                };
                let selected = SelectedImage {
                    point: id,
                    url: point.url.clone(),
                };
                self.selected = Some(selected.clone());
                PickOutcome::Selected(selected)
            }
            Some(MarkerKey::Aggregate(cluster_id)) => {
                let Some(center) = clusters.get(cluster_id.index()).and_then(Cluster::center)
                else {
                    return PickOutcome::Nothing;
                };
                renderer.fly_to(center, altitude_threshold_m * CLUSTER_FLY_TO_FRACTION);
                PickOutcome::ZoomedToCluster {
                    cluster: cluster_id,
                    center,
                }
            }
            Some(MarkerKey::Pending) | None => PickOutcome::Nothing,
        }
    }

    /// Place-pending-point gesture. A miss is a silent no-op.
    pub fn secondary_pick<R: GlobeRenderer + ?Sized>(
        &mut self,
        screen: Vec2,
        renderer: &mut R,
    ) -> Option<GeoCoord> {
        if self.selected.is_some() {
            return None;
        }
        let coord = renderer.pick_globe_at(screen)?;
        self.set_pending(coord, renderer);
        Some(coord)
    }

    /// Records `coord` as the pending upload location and draws the provisional marker.
    pub fn set_pending<R: GlobeRenderer + ?Sized>(&mut self, coord: GeoCoord, renderer: &mut R) {
        self.pending = Some(coord);
        renderer.set_marker(MarkerKey::Pending, coord, MarkerStyle::Pending, true);
        debug!(lat = coord.lat(), lon = coord.lon(), "pending upload location set");
    }

    /// Drops the pending location and its provisional marker (upload finished).
    pub fn clear_pending<R: GlobeRenderer + ?Sized>(&mut self, renderer: &mut R) {
        if self.pending.take().is_some() {
            renderer.remove_marker(MarkerKey::Pending);
        }
    }

    pub fn close_selection(&mut self) -> Option<SelectedImage> {
        self.selected.take()
    }

    /// Forgets selection and pending state (the point set was cleared).
    pub fn reset<R: GlobeRenderer + ?Sized>(&mut self, renderer: &mut R) {
        self.selected = None;
        self.clear_pending(renderer);
    }
}
