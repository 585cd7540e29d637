//! The capability surface the core drives the external globe renderer through.
//!
//! The core never owns renderer entities; it only tells the renderer what to
//! draw and asks it what is under the pointer. Tests substitute a fake.

use foundation::GeoCoord;
use foundation::math::Vec2;

use crate::cluster::Cluster;
use crate::entity::MarkerKey;
use crate::visibility::{CameraState, VisibilityDecision};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum MarkerStyle {
    /// Aggregate badge labelled with the member count.
    Aggregate { count: usize },
    /// Individual image pin.
    Image,
    /// Provisional pin at the pending upload location.
    Pending,
}

pub trait GlobeRenderer {
    /// Marker under the given screen position, if any.
    fn pick_entity_at(&self, screen: Vec2) -> Option<MarkerKey>;

    /// Ground coordinate under the given screen position, if the pick ray hits the globe.
    fn pick_globe_at(&self, screen: Vec2) -> Option<GeoCoord>;

    fn current_camera_state(&self) -> CameraState;

    /// Creates or updates the marker identified by `key`.
    fn set_marker(&mut self, key: MarkerKey, position: GeoCoord, style: MarkerStyle, visible: bool);

    fn remove_marker(&mut self, key: MarkerKey);

    /// Removes every marker the core has placed.
    fn clear_markers(&mut self);

    /// Moves the camera above `target` at `altitude_m`.
    fn fly_to(&mut self, target: GeoCoord, altitude_m: f64);
}

/// Pushes one frame's decisions to the renderer.
///
/// `decisions` must be index-aligned with `clusters` (as returned by
/// `visibility::evaluate`). Clusters whose center cannot be resolved are
/// skipped rather than drawn at a bogus position.
pub fn apply_decisions<R: GlobeRenderer + ?Sized>(
    renderer: &mut R,
    clusters: &[Cluster],
    decisions: &[VisibilityDecision],
) {
    for (cluster, decision) in clusters.iter().zip(decisions) {
        if let Some(center) = cluster.center() {
            renderer.set_marker(
                MarkerKey::Aggregate(cluster.id),
                center,
                MarkerStyle::Aggregate {
                    count: cluster.member_count(),
                },
                decision.show_aggregate,
            );
        }

        for (member, visible) in cluster.members().iter().zip(&decision.member_visible) {
            renderer.set_marker(
                MarkerKey::Point(member.id),
                member.coord,
                MarkerStyle::Image,
                *visible,
            );
        }
    }
}

#[cfg(test)]
pub(crate) mod fake {
    use std::collections::BTreeMap;

    use foundation::GeoCoord;
    use foundation::math::Vec2;

    use super::{GlobeRenderer, MarkerStyle};
    use crate::entity::MarkerKey;
    use crate::visibility::CameraState;

    #[derive(Debug, Clone, Copy, PartialEq)]
    pub struct PlacedMarker {
        pub position: GeoCoord,
        pub style: MarkerStyle,
        pub visible: bool,
    }

    /// Scriptable renderer: picks return whatever the test configured.
    #[derive(Debug)]
    pub struct FakeRenderer {
        pub camera: CameraState,
        pub entity_under_cursor: Option<MarkerKey>,
        pub globe_under_cursor: Option<GeoCoord>,
        pub markers: BTreeMap<MarkerKey, PlacedMarker>,
        pub flights: Vec<(GeoCoord, f64)>,
        pub clears: usize,
    }

    impl FakeRenderer {
        pub fn new(camera: CameraState) -> Self {
            Self {
                camera,
                entity_under_cursor: None,
                globe_under_cursor: None,
                markers: BTreeMap::new(),
                flights: Vec::new(),
                clears: 0,
            }
        }

        pub fn visible_keys(&self) -> Vec<MarkerKey> {
            self.markers
                .iter()
                .filter(|(_, m)| m.visible)
                .map(|(k, _)| *k)
                .collect()
        }
    }

    impl GlobeRenderer for FakeRenderer {
        fn pick_entity_at(&self, _screen: Vec2) -> Option<MarkerKey> {
            self.entity_under_cursor
        }

        fn pick_globe_at(&self, _screen: Vec2) -> Option<GeoCoord> {
            self.globe_under_cursor
        }

        fn current_camera_state(&self) -> CameraState {
            self.camera
        }

        fn set_marker(&mut self, key: MarkerKey, position: GeoCoord, style: MarkerStyle, visible: bool) {
            self.markers.insert(
                key,
                PlacedMarker {
                    position,
                    style,
                    visible,
                },
            );
        }

        fn remove_marker(&mut self, key: MarkerKey) {
            self.markers.remove(&key);
        }

        fn clear_markers(&mut self) {
            self.markers.clear();
            self.clears += 1;
        }

        fn fly_to(&mut self, target: GeoCoord, altitude_m: f64) {
            self.flights.push((target, altitude_m));
        }
    }
}
