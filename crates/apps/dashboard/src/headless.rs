//! A renderer without a screen.
//!
//! Keeps a pinhole camera looking straight down at a ground point, the marker
//! table the core writes into, and answers picks by casting rays. Used by the
//! CLI and by tests that need real picking geometry.

use std::collections::BTreeMap;

use foundation::GeoCoord;
use foundation::math::{Vec2, Vec3};
use scene::picking::{Ray, pick_globe, pick_marker};
use scene::visibility::marker_position;
use scene::{CameraState, GlobeRenderer, MarkerKey, MarkerStyle};

/// Pick tolerance around a marker, in screen pixels.
const PICK_TOLERANCE_PX: f64 = 8.0;

const DEFAULT_FOV_Y_DEG: f64 = 45.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlacedMarker {
    pub position: GeoCoord,
    pub style: MarkerStyle,
    pub visible: bool,
}

#[derive(Debug, Clone)]
pub struct HeadlessGlobe {
    width: f64,
    height: f64,
    fov_y_rad: f64,
    eye: Vec3,
    /// Ground point the camera looks at.
    look_at: Vec3,
    markers: BTreeMap<MarkerKey, PlacedMarker>,
    last_flight: Option<(GeoCoord, f64)>,
}

struct Basis {
    forward: Vec3,
    right: Vec3,
    up: Vec3,
}

impl HeadlessGlobe {
    /// A `width` x `height` pixel viewport looking down at `target` from `altitude_m`.
    pub fn new(width: f64, height: f64, target: GeoCoord, altitude_m: f64) -> Self {
        Self {
            width,
            height,
            fov_y_rad: DEFAULT_FOV_Y_DEG.to_radians(),
            eye: target.to_ecef(altitude_m),
            look_at: target.to_ecef(0.0),
            markers: BTreeMap::new(),
            last_flight: None,
        }
    }

    pub fn viewport(&self) -> Vec2 {
        Vec2::new(self.width, self.height)
    }

    pub fn center(&self) -> Vec2 {
        Vec2::new(self.width * 0.5, self.height * 0.5)
    }

    pub fn eye(&self) -> Vec3 {
        self.eye
    }

    pub fn markers(&self) -> &BTreeMap<MarkerKey, PlacedMarker> {
        &self.markers
    }

    pub fn visible_markers(&self) -> impl Iterator<Item = (MarkerKey, &PlacedMarker)> {
        self.markers
            .iter()
            .filter(|(_, m)| m.visible)
            .map(|(k, m)| (*k, m))
    }

    pub fn last_flight(&self) -> Option<(GeoCoord, f64)> {
        self.last_flight
    }

    fn basis(&self) -> Option<Basis> {
        let forward = (self.look_at - self.eye).normalize()?;
        let right = forward
            .cross(Vec3::new(0.0, 0.0, 1.0))
            .normalize()
            // Looking straight down a pole.
            .or_else(|| forward.cross(Vec3::new(1.0, 0.0, 0.0)).normalize())?;
        let up = right.cross(forward);
        Some(Basis { forward, right, up })
    }

    /// Pick ray through a pixel, or `None` for a degenerate viewport or camera.
    pub fn screen_ray(&self, screen: Vec2) -> Option<Ray> {
        if self.width <= 1.0 || self.height <= 1.0 || !screen.is_finite() {
            return None;
        }
        let basis = self.basis()?;
        let aspect = self.width / self.height;
        let tan = (0.5 * self.fov_y_rad).tan();

        let ndc_x = (2.0 * (screen.x / self.width) - 1.0) * aspect;
        let ndc_y = 1.0 - 2.0 * (screen.y / self.height);

        let dir = basis.forward + basis.right.scale(ndc_x * tan) + basis.up.scale(ndc_y * tan);
        Some(Ray::new(self.eye, dir.normalize()?))
    }

    /// Pixel position of a world point, if it lies in front of the camera.
    pub fn project(&self, world: Vec3) -> Option<Vec2> {
        if self.width <= 1.0 || self.height <= 1.0 {
            return None;
        }
        let basis = self.basis()?;
        let rel = world - self.eye;
        let depth = rel.dot(basis.forward);
        if depth <= 0.0 {
            return None;
        }
        let aspect = self.width / self.height;
        let tan = (0.5 * self.fov_y_rad).tan();
        let ndc_x = rel.dot(basis.right) / (depth * tan);
        let ndc_y = rel.dot(basis.up) / (depth * tan);
        Some(Vec2::new(
            (ndc_x / aspect + 1.0) * 0.5 * self.width,
            (1.0 - ndc_y) * 0.5 * self.height,
        ))
    }

    /// Marker pick radius: the pick tolerance in pixels, measured at the ground.
    fn pick_radius_m(&self) -> f64 {
        let altitude = self.current_camera_state().altitude_m;
        let meters_per_px = 2.0 * (0.5 * self.fov_y_rad).tan() / self.height;
        altitude.max(1.0) * meters_per_px * PICK_TOLERANCE_PX
    }
}

impl GlobeRenderer for HeadlessGlobe {
    fn pick_entity_at(&self, screen: Vec2) -> Option<MarkerKey> {
        let ray = self.screen_ray(screen)?;
        let candidates = self
            .visible_markers()
            .map(|(key, m)| (key, marker_position(m.position)));
        pick_marker(ray, candidates, self.pick_radius_m()).map(|hit| hit.key)
    }

    fn pick_globe_at(&self, screen: Vec2) -> Option<GeoCoord> {
        pick_globe(self.screen_ray(screen)?)
    }

    fn current_camera_state(&self) -> CameraState {
        CameraState::from_position(self.eye)
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
    }

    fn fly_to(&mut self, target: GeoCoord, altitude_m: f64) {
        self.eye = target.to_ecef(altitude_m.max(0.0));
        self.look_at = target.to_ecef(0.0);
        self.last_flight = Some((target, altitude_m));
    }
}
