use super::Vec3;

/// WGS84 semi-major axis (meters).
pub const WGS84_A: f64 = 6_378_137.0;
/// WGS84 flattening.
pub const WGS84_F: f64 = 1.0 / 298.257_223_563;
/// WGS84 semi-minor axis (meters).
pub const WGS84_B: f64 = WGS84_A * (1.0 - WGS84_F);
/// WGS84 first eccentricity squared.
pub const WGS84_E2: f64 = WGS84_F * (2.0 - WGS84_F);
/// WGS84 second eccentricity squared.
pub const WGS84_EP2: f64 = (WGS84_A * WGS84_A - WGS84_B * WGS84_B) / (WGS84_B * WGS84_B);

/// Geodetic coordinates in radians and meters.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Geodetic {
    pub lat_rad: f64,
    pub lon_rad: f64,
    pub alt_m: f64,
}

impl Geodetic {
    pub fn new(lat_rad: f64, lon_rad: f64, alt_m: f64) -> Self {
        Self {
            lat_rad,
            lon_rad,
            alt_m,
        }
    }

    pub fn from_degrees(lat_deg: f64, lon_deg: f64, alt_m: f64) -> Self {
        Self::new(lat_deg.to_radians(), lon_deg.to_radians(), alt_m)
    }
}

/// Geodetic -> Earth-centered, Earth-fixed Cartesian (meters).
pub fn geodetic_to_ecef(geo: Geodetic) -> Vec3 {
    let sin_lat = geo.lat_rad.sin();
    let cos_lat = geo.lat_rad.cos();
    let sin_lon = geo.lon_rad.sin();
    let cos_lon = geo.lon_rad.cos();

    let n = WGS84_A / (1.0 - WGS84_E2 * sin_lat * sin_lat).sqrt();
    Vec3::new(
        (n + geo.alt_m) * cos_lat * cos_lon,
        (n + geo.alt_m) * cos_lat * sin_lon,
        (n * (1.0 - WGS84_E2) + geo.alt_m) * sin_lat,
    )
}

/// ECEF -> geodetic using Bowring's closed-form approximation.
pub fn ecef_to_geodetic(ecef: Vec3) -> Geodetic {
    let p = (ecef.x * ecef.x + ecef.y * ecef.y).sqrt();
    let lon = ecef.y.atan2(ecef.x);

    let theta = (ecef.z * WGS84_A).atan2(p * WGS84_B);
    let sin_theta = theta.sin();
    let cos_theta = theta.cos();

    let lat = (ecef.z + WGS84_EP2 * WGS84_B * sin_theta * sin_theta * sin_theta)
        .atan2(p - WGS84_E2 * WGS84_A * cos_theta * cos_theta * cos_theta);

    let sin_lat = lat.sin();
    let cos_lat = lat.cos();
    let n = WGS84_A / (1.0 - WGS84_E2 * sin_lat * sin_lat).sqrt();
    // Near the poles p / cos(lat) is ill-conditioned; use the z form instead.
    let alt = if cos_lat.abs() > 1e-6 {
        p / cos_lat - n
    } else {
        ecef.z.abs() - WGS84_B
    };

    Geodetic::new(lat, lon, alt)
}

/// Height of an ECEF point above the WGS84 ellipsoid (meters), clamped at 0.
pub fn altitude_above_ellipsoid(ecef: Vec3) -> f64 {
    ecef_to_geodetic(ecef).alt_m.max(0.0)
}
