/// Session-local identity of a located image.
///
/// Assigned by the point store in insertion order; never reused within a store.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GeoPointId(u64);

impl GeoPointId {
    pub fn new(n: u64) -> Self {
        GeoPointId(n)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for GeoPointId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "pt{}", self.0)
    }
}
