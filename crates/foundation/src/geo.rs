//! Geographic coordinates in degrees.
//!
//! `GeoCoord` can only be constructed with in-range latitude/longitude, so
//! everything downstream (clustering, marker placement) can assume valid input.

use thiserror::Error;

use crate::math::{Geodetic, Vec3, ecef_to_geodetic, geodetic_to_ecef};

/// Mean Earth radius used for haversine surface distances (kilometers).
pub const EARTH_MEAN_RADIUS_KM: f64 = 6371.0;

#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum GeoError {
    #[error("invalid coordinate: latitude {lat} / longitude {lon} out of range")]
    InvalidCoordinate { lat: f64, lon: f64 },
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct GeoCoord {
    lat_deg: f64,
    lon_deg: f64,
}

impl GeoCoord {
    /// Latitude must be in `[-90, 90]`, longitude in `[-180, 180]`; NaN is rejected.
    pub fn new(lat_deg: f64, lon_deg: f64) -> Result<Self, GeoError> {
        if !(-90.0..=90.0).contains(&lat_deg) || !(-180.0..=180.0).contains(&lon_deg) {
            return Err(GeoError::InvalidCoordinate {
                lat: lat_deg,
                lon: lon_deg,
            });
        }
        Ok(Self { lat_deg, lon_deg })
    }

    pub fn lat(&self) -> f64 {
        self.lat_deg
    }

    pub fn lon(&self) -> f64 {
        self.lon_deg
    }

    /// Position on (or `alt_m` above) the WGS84 ellipsoid.
    pub fn to_ecef(self, alt_m: f64) -> Vec3 {
        geodetic_to_ecef(Geodetic::from_degrees(self.lat_deg, self.lon_deg, alt_m))
    }

    /// Ground position of an ECEF point. `None` for non-finite input.
    pub fn from_ecef(ecef: Vec3) -> Option<Self> {
        if !ecef.is_finite() {
            return None;
        }
        let geo = ecef_to_geodetic(ecef);
        // Radian round-off can land a hair outside the valid range at the poles
        // and the antimeridian.
        let lat = geo.lat_rad.to_degrees().clamp(-90.0, 90.0);
        let lon = geo.lon_rad.to_degrees().clamp(-180.0, 180.0);
        Self::new(lat, lon).ok()
    }

    pub fn haversine_km(self, other: GeoCoord) -> f64 {
        haversine_km(self.lat_deg, self.lon_deg, other.lat_deg, other.lon_deg)
    }
}

/// Great-circle surface distance between two points, in kilometers.
///
/// All inputs in degrees.
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let dlat = (lat2 - lat1).to_radians();
    let dlon = (lon2 - lon1).to_radians();

    let a = (dlat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_MEAN_RADIUS_KM * c
}
