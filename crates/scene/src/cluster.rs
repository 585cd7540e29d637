//! Greedy single-pass distance clustering.
//!
//! Ordering contract:
//! - Points are visited in input order.
//! - Each point joins the *first* cluster (in creation order) whose current
//!   center is strictly closer than the threshold; this is first-fit, not
//!   nearest-fit.
//! - Cluster centers are the arithmetic mean of member latitudes and of member
//!   longitudes, updated as members are appended.
//!
//! The pass is always run from scratch.

use foundation::{GeoCoord, haversine_km};
use tracing::debug;

use crate::store::GeoPoint;

/// Default clustering radius used by the dashboard.
pub const DEFAULT_CLUSTER_THRESHOLD_KM: f64 = 50.0;

/// Position of a cluster in the output of one clustering pass.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClusterId(pub u32);

impl ClusterId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Cluster {
    pub id: ClusterId,
    center_lat: f64,
    center_lon: f64,
    sum_lat: f64,
    sum_lon: f64,
    members: Vec<GeoPoint>,
}

impl Cluster {
    fn seed(id: ClusterId, point: GeoPoint) -> Self {
        Self {
            id,
            center_lat: point.lat(),
            center_lon: point.lon(),
            sum_lat: point.lat(),
            sum_lon: point.lon(),
            members: vec![point],
        }
    }

    fn push(&mut self, point: GeoPoint) {
        self.sum_lat += point.lat();
        self.sum_lon += point.lon();
        self.members.push(point);
        let n = self.members.len() as f64;
        self.center_lat = self.sum_lat / n;
        self.center_lon = self.sum_lon / n;
    }

    pub fn center_lat(&self) -> f64 {
        self.center_lat
    }

    pub fn center_lon(&self) -> f64 {
        self.center_lon
    }

    /// Center as a validated coordinate.
    ///
    /// A mean of in-range values is itself in range, so this only fails for
    /// clusters built from unvalidated data.
    pub fn center(&self) -> Option<GeoCoord> {
        GeoCoord::new(self.center_lat, self.center_lon).ok()
    }

    /// Members in the order they joined.
    pub fn members(&self) -> &[GeoPoint] {
        &self.members
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    pub fn is_singleton(&self) -> bool {
        self.members.len() == 1
    }

    fn distance_km(&self, point: &GeoPoint) -> f64 {
        haversine_km(self.center_lat, self.center_lon, point.lat(), point.lon())
    }
}

/// Groups points into clusters. Empty input yields an empty list.
///
/// A non-positive or NaN threshold never matches, so every point becomes its
/// own cluster.
pub fn cluster(points: &[GeoPoint], threshold_km: f64) -> Vec<Cluster> {
    let mut clusters: Vec<Cluster> = Vec::new();

    for point in points {
        match clusters
            .iter_mut()
            .find(|c| c.distance_km(point) < threshold_km)
        {
            Some(existing) => existing.push(point.clone()),
            None => {
                let id = ClusterId(clusters.len() as u32);
                clusters.push(Cluster::seed(id, point.clone()));
            }
        }
    }

    debug!(
        points = points.len(),
        clusters = clusters.len(),
        threshold_km,
        "clustered points"
    );
    clusters
}

#[cfg(test)]
mod tests {
    use super::{Cluster, cluster};
    use crate::store::{GeoPoint, GeoPointStore, PointRecord};
    use foundation::{GeoCoord, GeoPointId, haversine_km};
    use pretty_assertions::assert_eq;
    use rand::rngs::StdRng;
    use rand::seq::SliceRandom;
    use rand::{Rng, SeedableRng};

    fn points(coords: &[(f64, f64)]) -> Vec<GeoPoint> {
        let mut store = GeoPointStore::new();
        for (i, (lat, lon)) in coords.iter().enumerate() {
            let coord = GeoCoord::new(*lat, *lon).expect("valid");
            store.add(PointRecord::new(format!("img-{i}"), coord));
        }
        store.all().to_vec()
    }

    fn member_ids(c: &Cluster) -> Vec<GeoPointId> {
        c.members().iter().map(|p| p.id).collect()
    }

    fn assert_close(a: f64, b: f64, eps: f64) {
        let diff = (a - b).abs();
        assert!(diff <= eps, "expected {a} ~= {b} (diff {diff})");
    }

    #[test]
    fn empty_input_yields_no_clusters() {
        assert!(cluster(&[], 50.0).is_empty());
    }

    #[test]
    fn two_nearby_points_and_one_far_point() {
        let pts = points(&[(10.0, 10.0), (10.1, 10.1), (60.0, 60.0)]);
        let clusters = cluster(&pts, 50.0);

        assert_eq!(clusters.len(), 2);
        assert_eq!(clusters[0].member_count(), 2);
        assert_close(clusters[0].center_lat(), 10.05, 1e-9);
        assert_close(clusters[0].center_lon(), 10.05, 1e-9);

        assert!(clusters[1].is_singleton());
        assert_eq!(clusters[1].center_lat(), 60.0);
        assert_eq!(clusters[1].center_lon(), 60.0);
    }

    #[test]
    fn every_point_lands_in_exactly_one_cluster() {
        let pts = points(&[
            (0.0, 0.0),
            (0.2, 0.1),
            (45.0, 7.0),
            (45.1, 7.1),
            (-33.0, 151.0),
            (0.1, 0.3),
            (45.05, 6.95),
            (89.9, 179.9),
        ]);
        let clusters = cluster(&pts, 40.0);

        let total: usize = clusters.iter().map(Cluster::member_count).sum();
        assert_eq!(total, pts.len());

        let mut seen: Vec<GeoPointId> = clusters.iter().flat_map(member_ids).collect();
        seen.sort();
        let mut expected: Vec<GeoPointId> = pts.iter().map(|p| p.id).collect();
        expected.sort();
        assert_eq!(seen, expected);
    }

    #[test]
    fn members_were_within_threshold_of_center_at_assignment() {
        let pts = points(&[
            (10.0, 10.0),
            (10.2, 10.2),
            (10.4, 10.4),
            (10.6, 10.6),
            (-5.0, 20.0),
            (-5.3, 20.1),
        ]);
        let threshold = 35.0;
        let clusters = cluster(&pts, threshold);

        // Replay each cluster's growth and check the running center.
        for c in &clusters {
            let mut sum_lat = 0.0;
            let mut sum_lon = 0.0;
            for (i, m) in c.members().iter().enumerate() {
                if i > 0 {
                    let n = i as f64;
                    let d = haversine_km(sum_lat / n, sum_lon / n, m.lat(), m.lon());
                    assert!(d < threshold, "member {} was {d} km from center", m.id);
                }
                sum_lat += m.lat();
                sum_lon += m.lon();
            }
        }
    }

    #[test]
    fn clustering_is_deterministic() {
        let pts = points(&[(1.0, 1.0), (1.1, 1.0), (1.3, 1.2), (50.0, 3.0), (1.2, 1.1)]);
        let a = cluster(&pts, 30.0);
        let b = cluster(&pts, 30.0);
        assert_eq!(a, b);
    }

    /// Points scattered around a few seeds, so thresholds produce a mix of
    /// shared and singleton clusters.
    fn scattered(rng: &mut StdRng, n: usize) -> Vec<(f64, f64)> {
        let seeds = [(10.0, 10.0), (45.0, -120.0), (-33.0, 151.0), (0.0, 179.5)];
        (0..n)
            .map(|_| {
                let (lat, lon) = seeds[rng.gen_range(0..seeds.len())];
                let lat: f64 = lat + rng.gen_range(-1.0..1.0);
                let lon: f64 = lon + rng.gen_range(-1.0..1.0);
                (lat.clamp(-90.0, 90.0), lon.clamp(-180.0, 180.0))
            })
            .collect()
    }

    #[test]
    fn partition_and_determinism_hold_across_orders_and_thresholds() {
        let mut rng = StdRng::seed_from_u64(0x5eed);
        for round in 0..20 {
            let mut coords = scattered(&mut rng, 5 + round * 3);
            coords.shuffle(&mut rng);
            let pts = points(&coords);
            let mut expected: Vec<GeoPointId> = pts.iter().map(|p| p.id).collect();
            expected.sort();

            for threshold in [0.0, 1.0, 25.0, 80.0, 200.0, 5_000.0] {
                let clusters = cluster(&pts, threshold);

                let mut seen: Vec<GeoPointId> = clusters.iter().flat_map(member_ids).collect();
                seen.sort();
                assert_eq!(seen, expected, "round {round}, threshold {threshold}");
                assert!(clusters.iter().all(|c| c.member_count() > 0));

                assert_eq!(cluster(&pts, threshold), clusters);
            }
        }
    }

    #[test]
    fn first_fit_beats_nearest_fit() {
        // A and B are ~44 km apart, so they seed separate clusters at a 30 km
        // threshold. C sits within 30 km of both but closer to B; first-fit
        // still puts it with A because A's cluster was created first.
        let pts = points(&[(0.0, 0.0), (0.0, 0.4), (0.0, 0.22)]);
        let a = pts[0].id;
        let b = pts[1].id;
        let c = pts[2].id;
        assert!(haversine_km(0.0, 0.22, 0.0, 0.4) < haversine_km(0.0, 0.22, 0.0, 0.0));

        let clusters = cluster(&pts, 30.0);
        assert_eq!(clusters.len(), 2);
        assert_eq!(member_ids(&clusters[0]), vec![a, c]);
        assert_eq!(member_ids(&clusters[1]), vec![b]);
    }

    #[test]
    fn threshold_is_strict() {
        let pts = points(&[(0.0, 0.0), (0.0, 1.0)]);
        let d = haversine_km(0.0, 0.0, 0.0, 1.0);
        assert_eq!(cluster(&pts, d).len(), 2);
        assert_eq!(cluster(&pts, d + 1e-6).len(), 1);
    }

    #[test]
    fn degenerate_thresholds_isolate_points() {
        let pts = points(&[(0.0, 0.0), (0.0, 0.0)]);
        assert_eq!(cluster(&pts, 0.0).len(), 2);
        assert_eq!(cluster(&pts, f64::NAN).len(), 2);
    }

    #[test]
    fn cluster_ids_follow_creation_order() {
        let pts = points(&[(0.0, 0.0), (30.0, 30.0), (-30.0, -30.0)]);
        let clusters = cluster(&pts, 10.0);
        let ids: Vec<u32> = clusters.iter().map(|c| c.id.0).collect();
        assert_eq!(ids, vec![0, 1, 2]);
        assert!(clusters.iter().all(|c| c.center().is_some()));
    }
}
