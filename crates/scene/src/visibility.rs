//! Per-frame marker visibility.
//!
//! Two independent decisions compose per cluster:
//! - Aggregation: above the altitude threshold the cluster is drawn as one
//!   aggregate marker; at or below it the members are drawn individually.
//! - Occlusion: any marker that would be drawn is hidden when it sits on the
//!   far side of the globe from the camera.
//!
//! `evaluate` is a pure function of its inputs. It is meant to be called once
//! per rendered frame and rebuilds every decision from scratch.

use foundation::GeoCoord;
use foundation::math::{Vec3, altitude_above_ellipsoid};

use crate::cluster::{Cluster, ClusterId};

/// Camera altitude (meters) above which clusters collapse to one marker.
pub const DEFAULT_ALTITUDE_THRESHOLD_M: f64 = 7_000_000.0;

/// Snapshot of the renderer's camera for one frame.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct CameraState {
    /// Eye position, Earth-centered Cartesian (meters).
    pub position: Vec3,
    /// Height above the ellipsoid (meters).
    pub altitude_m: f64,
}

impl CameraState {
    /// Negative altitudes clamp to the surface. NaN is kept, so an unknown
    /// altitude never counts as zoomed in or out.
    pub fn new(position: Vec3, altitude_m: f64) -> Self {
        let altitude_m = if altitude_m.is_nan() {
            altitude_m
        } else {
            altitude_m.max(0.0)
        };
        Self {
            position,
            altitude_m,
        }
    }

    /// Derives the altitude from the eye position.
    pub fn from_position(position: Vec3) -> Self {
        let altitude_m = if position.is_finite() {
            altitude_above_ellipsoid(position)
        } else {
            f64::NAN
        };
        Self::new(position, altitude_m)
    }

    pub fn is_zoomed_out(&self, altitude_threshold_m: f64) -> bool {
        self.altitude_m > altitude_threshold_m
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisibilityDecision {
    pub cluster: ClusterId,
    /// Aggregate marker is drawn (zoomed out and front-facing).
    pub show_aggregate: bool,
    /// Members are drawn individually (zoomed in).
    pub show_members: bool,
    /// Per member, in cluster member order. All `false` when zoomed out.
    pub member_visible: Vec<bool>,
}

impl VisibilityDecision {
    pub fn visible_member_count(&self) -> usize {
        self.member_visible.iter().filter(|v| **v).count()
    }
}

/// Surface position of a marker placed at `coord`.
pub fn marker_position(coord: GeoCoord) -> Vec3 {
    coord.to_ecef(0.0)
}

/// Front-face test for a marker on the globe surface.
///
/// The marker faces the camera iff the outward normal (the normalized
/// position) and the direction to the camera have a strictly positive dot
/// product. Markers exactly on the horizon, at the camera, or with
/// non-finite positions are hidden.
pub fn is_front_facing(marker: Vec3, camera: Vec3) -> bool {
    let Some(normal) = marker.normalize() else {
        return false;
    };
    let Some(to_camera) = (camera - marker).normalize() else {
        return false;
    };
    normal.dot(to_camera) > 0.0
}

fn coord_front_facing(coord: Option<GeoCoord>, camera: &CameraState) -> bool {
    coord.is_some_and(|c| is_front_facing(marker_position(c), camera.position))
}

/// Decides what to draw for each cluster this frame.
///
/// Output is index-aligned with `clusters`.
pub fn evaluate(
    clusters: &[Cluster],
    camera: &CameraState,
    altitude_threshold_m: f64,
) -> Vec<VisibilityDecision> {
    let zoomed_out = camera.is_zoomed_out(altitude_threshold_m);
    let resolvable = !camera.altitude_m.is_nan() && camera.position.is_finite();

    clusters
        .iter()
        .map(|cluster| {
            if !resolvable {
                VisibilityDecision {
                    cluster: cluster.id,
                    show_aggregate: false,
                    show_members: false,
                    member_visible: vec![false; cluster.member_count()],
                }
            } else if zoomed_out {
                VisibilityDecision {
                    cluster: cluster.id,
                    show_aggregate: coord_front_facing(cluster.center(), camera),
                    show_members: false,
                    member_visible: vec![false; cluster.member_count()],
                }
            } else {
                VisibilityDecision {
                    cluster: cluster.id,
                    show_aggregate: false,
                    show_members: true,
                    member_visible: cluster
                        .members()
                        .iter()
                        .map(|m| coord_front_facing(Some(m.coord), camera))
                        .collect(),
                }
            }
        })
        .collect()
}

/// Summary of one frame's decisions, for logging.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct VisibilityStats {
    pub clusters: usize,
    pub aggregates_shown: usize,
    pub members_shown: usize,
    /// Markers eligible by zoom level but hidden behind the globe.
    pub occluded: usize,
}

impl VisibilityStats {
    pub fn from_decisions(decisions: &[VisibilityDecision]) -> Self {
        let mut stats = Self {
            clusters: decisions.len(),
            ..Self::default()
        };
        for d in decisions {
            if d.show_members {
                let shown = d.visible_member_count();
                stats.members_shown += shown;
                stats.occluded += d.member_visible.len() - shown;
            } else if d.show_aggregate {
                stats.aggregates_shown += 1;
            } else {
                stats.occluded += 1;
            }
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::{
        CameraState, DEFAULT_ALTITUDE_THRESHOLD_M, VisibilityStats, evaluate, is_front_facing,
        marker_position,
    };
    use crate::cluster::cluster;
    use crate::store::{GeoPointStore, PointRecord};
    use foundation::GeoCoord;
    use foundation::math::{Vec3, WGS84_A};

    fn coord(lat: f64, lon: f64) -> GeoCoord {
        GeoCoord::new(lat, lon).expect("valid")
    }

    fn store_with(coords: &[(f64, f64)]) -> GeoPointStore {
        let mut store = GeoPointStore::new();
        for (i, (lat, lon)) in coords.iter().enumerate() {
            store.add(PointRecord::new(format!("img-{i}"), coord(*lat, *lon)));
        }
        store
    }

    /// Camera hovering `alt_m` above the given ground position.
    fn camera_over(lat: f64, lon: f64, alt_m: f64) -> CameraState {
        CameraState::new(coord(lat, lon).to_ecef(alt_m), alt_m)
    }

    #[test]
    fn near_side_faces_camera_far_side_does_not() {
        let cam = coord(0.0, 0.0).to_ecef(10_000_000.0);
        assert!(is_front_facing(marker_position(coord(0.0, 0.0)), cam));
        assert!(is_front_facing(marker_position(coord(20.0, -30.0)), cam));
        assert!(!is_front_facing(marker_position(coord(0.0, 180.0)), cam));
        assert!(!is_front_facing(marker_position(coord(-10.0, 120.0)), cam));
    }

    #[test]
    fn horizon_boundary_is_hidden() {
        let marker = Vec3::new(WGS84_A, 0.0, 0.0);
        // Camera displaced along the tangent plane: dot product is exactly 0.
        let camera = Vec3::new(WGS84_A, 1_000.0, 0.0);
        assert!(!is_front_facing(marker, camera));
        // Nudged outward it becomes visible.
        assert!(is_front_facing(marker, Vec3::new(WGS84_A + 1.0, 1_000.0, 0.0)));
    }

    #[test]
    fn degenerate_positions_are_hidden() {
        let marker = Vec3::new(WGS84_A, 0.0, 0.0);
        assert!(!is_front_facing(marker, marker));
        assert!(!is_front_facing(Vec3::ZERO, Vec3::new(1.0, 0.0, 0.0)));
        assert!(!is_front_facing(marker, Vec3::new(f64::NAN, 0.0, 0.0)));
    }

    #[test]
    fn zoomed_out_shows_aggregates_only() {
        let store = store_with(&[(10.0, 10.0), (10.1, 10.1), (20.0, -5.0)]);
        let clusters = cluster(store.all(), 50.0);
        let camera = camera_over(10.0, 5.0, 8_000_000.0);

        let decisions = evaluate(&clusters, &camera, 7_000_000.0);
        assert_eq!(decisions.len(), 2);
        for (d, c) in decisions.iter().zip(&clusters) {
            assert_eq!(d.cluster, c.id);
            assert!(d.show_aggregate);
            assert!(!d.show_members);
            assert_eq!(d.member_visible, vec![false; c.member_count()]);
        }
    }

    #[test]
    fn zoomed_in_shows_members_individually() {
        let store = store_with(&[(10.0, 10.0), (10.1, 10.1)]);
        let clusters = cluster(store.all(), 50.0);
        let camera = camera_over(10.0, 10.0, 500_000.0);

        let decisions = evaluate(&clusters, &camera, DEFAULT_ALTITUDE_THRESHOLD_M);
        assert_eq!(decisions.len(), 1);
        assert!(!decisions[0].show_aggregate);
        assert!(decisions[0].show_members);
        assert_eq!(decisions[0].member_visible, vec![true, true]);
    }

    #[test]
    fn aggregation_switches_exactly_at_threshold() {
        let store = store_with(&[(0.0, 0.0), (0.05, 0.05)]);
        let clusters = cluster(store.all(), 50.0);
        let threshold = 7_000_000.0;

        for alt in [0.0, 1.0, 6_999_999.0, 7_000_000.0, 7_000_000.5, 9.0e6, 4.0e7] {
            let decisions = evaluate(&clusters, &camera_over(0.0, 0.0, alt), threshold);
            let d = &decisions[0];
            if alt > threshold {
                assert!(d.show_aggregate, "alt {alt}");
                assert!(!d.show_members, "alt {alt}");
            } else {
                assert!(!d.show_aggregate, "alt {alt}");
                assert!(d.show_members, "alt {alt}");
            }
        }
    }

    #[test]
    fn far_side_markers_are_hidden_in_both_modes() {
        let store = store_with(&[(0.0, 0.0), (0.0, 180.0)]);
        let clusters = cluster(store.all(), 50.0);
        assert_eq!(clusters.len(), 2);

        let high = evaluate(&clusters, &camera_over(0.0, 0.0, 9.0e6), 7.0e6);
        assert!(high[0].show_aggregate);
        assert!(!high[1].show_aggregate);

        let low = evaluate(&clusters, &camera_over(0.0, 0.0, 1.0e6), 7.0e6);
        assert_eq!(low[0].member_visible, vec![true]);
        assert_eq!(low[1].member_visible, vec![false]);
        assert!(low[1].show_members);
    }

    #[test]
    fn members_of_one_cluster_are_culled_individually() {
        // Low camera east of the cluster: the nearer member is above the
        // horizon, its cluster mate 0.4 degrees further west is not.
        let store = store_with(&[(0.0, 0.0), (0.0, 0.4)]);
        let clusters = cluster(store.all(), 50.0);
        assert_eq!(clusters.len(), 1);

        let camera = camera_over(0.0, 3.5, 10_000.0);
        let decisions = evaluate(&clusters, &camera, 7.0e6);
        assert!(decisions[0].show_members);
        assert_eq!(decisions[0].member_visible, vec![false, true]);

        let camera = camera_over(0.0, 0.2, 10_000.0);
        let decisions = evaluate(&clusters, &camera, 7.0e6);
        assert_eq!(decisions[0].member_visible, vec![true, true]);
    }

    #[test]
    fn unresolvable_camera_hides_everything() {
        let store = store_with(&[(0.0, 0.0)]);
        let clusters = cluster(store.all(), 50.0);
        let camera = CameraState::from_position(Vec3::new(f64::NAN, 0.0, 0.0));

        let decisions = evaluate(&clusters, &camera, 7.0e6);
        assert!(!decisions[0].show_aggregate);
        assert_eq!(decisions[0].member_visible, vec![false]);
    }

    #[test]
    fn unknown_altitude_stays_unknown() {
        let position = coord(0.0, 0.0).to_ecef(1.0e6);
        let camera = CameraState::new(position, f64::NAN);
        assert!(camera.altitude_m.is_nan());
        assert_eq!(
            camera.altitude_m.is_nan(),
            CameraState::from_position(Vec3::new(f64::NAN, 0.0, 0.0))
                .altitude_m
                .is_nan()
        );
        assert_eq!(CameraState::new(position, -5.0).altitude_m, 0.0);

        let store = store_with(&[(0.0, 0.0), (0.1, 0.1)]);
        let clusters = cluster(store.all(), 50.0);
        let decisions = evaluate(&clusters, &camera, 7.0e6);
        assert!(!decisions[0].show_aggregate);
        assert!(!decisions[0].show_members);
        assert_eq!(decisions[0].member_visible, vec![false, false]);
    }

    #[test]
    fn empty_cluster_list_yields_no_decisions() {
        assert!(evaluate(&[], &camera_over(0.0, 0.0, 1.0), 7.0e6).is_empty());
    }

    #[test]
    fn camera_altitude_from_position() {
        let cam = CameraState::from_position(coord(45.0, 45.0).to_ecef(2_500_000.0));
        assert!((cam.altitude_m - 2_500_000.0).abs() < 10.0);
        assert!(!cam.is_zoomed_out(DEFAULT_ALTITUDE_THRESHOLD_M));
    }

    #[test]
    fn stats_count_shown_and_occluded() {
        let store = store_with(&[(0.0, 0.0), (0.1, 0.1), (0.0, 180.0)]);
        let clusters = cluster(store.all(), 50.0);

        let low = evaluate(&clusters, &camera_over(0.0, 0.0, 1.0e6), 7.0e6);
        assert_eq!(
            VisibilityStats::from_decisions(&low),
            VisibilityStats {
                clusters: 2,
                aggregates_shown: 0,
                members_shown: 2,
                occluded: 1,
            }
        );

        let high = evaluate(&clusters, &camera_over(0.0, 0.0, 9.0e6), 7.0e6);
        assert_eq!(
            VisibilityStats::from_decisions(&high),
            VisibilityStats {
                clusters: 2,
                aggregates_shown: 1,
                members_shown: 0,
                occluded: 1,
            }
        );
    }
}
