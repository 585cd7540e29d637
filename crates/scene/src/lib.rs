pub mod cluster;
pub mod entity;
pub mod interaction;
pub mod picking;
pub mod store;
pub mod surface;
pub mod visibility;

pub use cluster::{Cluster, ClusterId, cluster};
pub use entity::MarkerKey;
pub use interaction::{Interaction, PickOutcome, SelectedImage};
pub use store::{GeoPoint, GeoPointStore, PointRecord};
pub use surface::{GlobeRenderer, MarkerStyle, apply_decisions};
pub use visibility::{CameraState, VisibilityDecision, VisibilityStats, evaluate};
