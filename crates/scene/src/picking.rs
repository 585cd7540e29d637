use foundation::GeoCoord;
use foundation::math::{Vec3, WGS84_A, WGS84_B};

use crate::entity::MarkerKey;

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    pub dir: Vec3,
}

impl Ray {
    pub fn new(origin: Vec3, dir: Vec3) -> Self {
        Self { origin, dir }
    }

    pub fn at(&self, t: f64) -> Vec3 {
        self.origin + self.dir.scale(t)
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct MarkerHit {
    pub key: MarkerKey,
    /// Distance along the normalized ray to the marker's bounding sphere.
    pub distance: f64,
}

/// First intersection of a ray with the WGS84 ellipsoid.
///
/// Returns `None` when the ray misses, points away, or is degenerate.
pub fn intersect_ellipsoid(ray: Ray) -> Option<Vec3> {
    let dir = ray.dir.normalize()?;
    if !ray.origin.is_finite() {
        return None;
    }

    // Scale space so the ellipsoid becomes the unit sphere.
    let o = Vec3::new(ray.origin.x / WGS84_A, ray.origin.y / WGS84_A, ray.origin.z / WGS84_B);
    let d = Vec3::new(dir.x / WGS84_A, dir.y / WGS84_A, dir.z / WGS84_B);

    let a = d.dot(d);
    let b = 2.0 * o.dot(d);
    let c = o.dot(o) - 1.0;
    let disc = b * b - 4.0 * a * c;
    if disc < 0.0 {
        return None;
    }

    let sqrt_disc = disc.sqrt();
    let near = (-b - sqrt_disc) / (2.0 * a);
    let far = (-b + sqrt_disc) / (2.0 * a);
    let t = if near >= 0.0 {
        near
    } else if far >= 0.0 {
        far
    } else {
        return None;
    };

    Some(Ray::new(ray.origin, dir).at(t))
}

/// Ground coordinate under a pick ray, if the ray hits the globe.
pub fn pick_globe(ray: Ray) -> Option<GeoCoord> {
    intersect_ellipsoid(ray).and_then(GeoCoord::from_ecef)
}

/// Deterministic ray picking among marker positions.
///
/// Each marker is treated as a sphere of `radius_m` around its position.
///
/// Ordering contract:
/// - The closest hit along the ray wins.
/// - Equal distances resolve to the smaller `MarkerKey`.
pub fn pick_marker<I>(ray: Ray, markers: I, radius_m: f64) -> Option<MarkerHit>
where
    I: IntoIterator<Item = (MarkerKey, Vec3)>,
{
    let dir = ray.dir.normalize()?;
    let mut best: Option<MarkerHit> = None;

    for (key, center) in markers {
        let Some(t) = ray_sphere_hit_t(ray.origin, dir, center, radius_m) else {
            continue;
        };

        let better = match best {
            None => true,
            Some(b) => t.total_cmp(&b.distance).then_with(|| key.cmp(&b.key)).is_lt(),
        };
        if better {
            best = Some(MarkerHit { key, distance: t });
        }
    }

    best
}

fn ray_sphere_hit_t(origin: Vec3, dir: Vec3, center: Vec3, radius: f64) -> Option<f64> {
    let oc = origin - center;
    let b = oc.dot(dir);
    let c = oc.dot(oc) - radius * radius;
    let disc = b * b - c;
    if !disc.is_finite() || disc < 0.0 {
        return None;
    }
    let sqrt_disc = disc.sqrt();
    let near = -b - sqrt_disc;
    let far = -b + sqrt_disc;
    if far < 0.0 {
        return None;
    }
    Some(near.max(0.0))
}

#[cfg(test)]
mod tests {
    use super::{Ray, intersect_ellipsoid, pick_globe, pick_marker};
    use crate::cluster::ClusterId;
    use crate::entity::MarkerKey;
    use foundation::math::{Vec3, WGS84_A, WGS84_B};
    use foundation::{GeoCoord, GeoPointId};

    fn assert_close(a: f64, b: f64, eps: f64) {
        let diff = (a - b).abs();
        assert!(diff <= eps, "expected {a} ~= {b} (diff {diff})");
    }

    #[test]
    fn ray_toward_center_hits_near_surface() {
        let ray = Ray::new(Vec3::new(3.0 * WGS84_A, 0.0, 0.0), Vec3::new(-1.0, 0.0, 0.0));
        let hit = intersect_ellipsoid(ray).expect("hit");
        assert_close(hit.x, WGS84_A, 1e-6);

        let ray = Ray::new(Vec3::new(0.0, 0.0, 2.0 * WGS84_B), Vec3::new(0.0, 0.0, -5.0));
        let hit = intersect_ellipsoid(ray).expect("hit");
        assert_close(hit.z, WGS84_B, 1e-6);
    }

    #[test]
    fn rays_that_miss_or_point_away_return_none() {
        let origin = Vec3::new(3.0 * WGS84_A, 0.0, 0.0);
        assert!(intersect_ellipsoid(Ray::new(origin, Vec3::new(1.0, 0.0, 0.0))).is_none());
        assert!(intersect_ellipsoid(Ray::new(origin, Vec3::new(0.0, 1.0, 0.0))).is_none());
        assert!(intersect_ellipsoid(Ray::new(origin, Vec3::ZERO)).is_none());
    }

    #[test]
    fn pick_globe_converts_to_lat_lon() {
        let target = GeoCoord::new(35.0, 139.0).expect("valid");
        let eye = target.to_ecef(1_000_000.0);
        let ray = Ray::new(eye, target.to_ecef(0.0) - eye);
        let got = pick_globe(ray).expect("hit");
        assert_close(got.lat(), 35.0, 1e-6);
        assert_close(got.lon(), 139.0, 1e-6);
    }

    #[test]
    fn nearest_marker_wins() {
        let ray = Ray::new(Vec3::ZERO, Vec3::new(1.0, 0.0, 0.0));
        let near = MarkerKey::Point(GeoPointId::new(9));
        let far = MarkerKey::Point(GeoPointId::new(1));
        let off_axis = MarkerKey::Aggregate(ClusterId(0));
        let hit = pick_marker(
            ray,
            [
                (far, Vec3::new(10.0, 0.0, 0.0)),
                (off_axis, Vec3::new(2.0, 50.0, 0.0)),
                (near, Vec3::new(5.0, 0.5, 0.0)),
            ],
            1.0,
        )
        .expect("hit");
        assert_eq!(hit.key, near);
        assert!(hit.distance > 4.0 && hit.distance < 5.0);
    }

    #[test]
    fn equal_distances_break_ties_by_key() {
        let ray = Ray::new(Vec3::ZERO, Vec3::new(1.0, 0.0, 0.0));
        let a = MarkerKey::Point(GeoPointId::new(2));
        let b = MarkerKey::Aggregate(ClusterId(7));
        let at = Vec3::new(5.0, 0.0, 0.0);
        let hit = pick_marker(ray, [(a, at), (b, at)], 1.0).expect("hit");
        assert_eq!(hit.key, b);
        assert!(pick_marker(ray, [(a, Vec3::new(-5.0, 0.0, 0.0))], 1.0).is_none());
    }
}
