use foundation::GeoPointId;

use crate::cluster::ClusterId;

/// Identity of a marker handed to the renderer.
///
/// The renderer reports these back from picking, so every drawn marker must be
/// traceable to a cluster, a stored point, or the provisional upload marker.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MarkerKey {
    /// Aggregate marker standing in for a whole cluster.
    Aggregate(ClusterId),
    /// Individual marker for one stored image.
    Point(GeoPointId),
    /// Provisional marker at the pending upload location.
    Pending,
}

impl MarkerKey {
    /// Stored point this marker was drawn for, if any.
    pub fn point(&self) -> Option<GeoPointId> {
        match self {
            MarkerKey::Point(id) => Some(*id),
            _ => None,
        }
    }
}
