use foundation::{GeoCoord, GeoPointId};
use tracing::debug;

/// A located image. Immutable once stored.
#[derive(Debug, Clone, PartialEq)]
pub struct GeoPoint {
    pub id: GeoPointId,
    /// Opaque resource reference (usually an asset URL).
    pub url: String,
    pub coord: GeoCoord,
}

impl GeoPoint {
    pub fn lat(&self) -> f64 {
        self.coord.lat()
    }

    pub fn lon(&self) -> f64 {
        self.coord.lon()
    }
}

/// A point that has not been admitted to a store yet (no id).
#[derive(Debug, Clone, PartialEq)]
pub struct PointRecord {
    pub url: String,
    pub coord: GeoCoord,
}

impl PointRecord {
    pub fn new(url: impl Into<String>, coord: GeoCoord) -> Self {
        Self {
            url: url.into(),
            coord,
        }
    }
}

/// Owner of the current set of located images.
///
/// The store knows nothing about clusters. Consumers detect changes through
/// `generation()`, which advances on every mutation, and `epoch()`, which
/// advances only when the set is wholesale replaced or cleared.
#[derive(Debug, Default)]
pub struct GeoPointStore {
    next_id: u64,
    points: Vec<GeoPoint>,
    generation: u64,
    epoch: u64,
}

impl GeoPointStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn replace_all(&mut self, records: impl IntoIterator<Item = PointRecord>) {
        self.points.clear();
        for record in records {
            self.push(record);
        }
        self.generation += 1;
        self.epoch += 1;
        debug!(count = self.points.len(), "point store replaced");
    }

    pub fn add(&mut self, record: PointRecord) -> GeoPointId {
        let id = self.push(record);
        self.generation += 1;
        id
    }

    pub fn clear(&mut self) {
        self.points.clear();
        self.generation += 1;
        self.epoch += 1;
        debug!("point store cleared");
    }

    /// Points in insertion order.
    pub fn all(&self) -> &[GeoPoint] {
        &self.points
    }

    pub fn get(&self, id: GeoPointId) -> Option<&GeoPoint> {
        // Ids are assigned monotonically, so points stay sorted by id.
        self.points
            .binary_search_by(|p| p.id.cmp(&id))
            .ok()
            .map(|idx| &self.points[idx])
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    fn push(&mut self, record: PointRecord) -> GeoPointId {
        let id = GeoPointId::new(self.next_id);
        self.next_id += 1;
        self.points.push(GeoPoint {
            id,
            url: record.url,
            coord: record.coord,
        });
        id
    }
}

#[cfg(test)]
mod tests {
    use super::{GeoPointStore, PointRecord};
    use foundation::GeoCoord;

    fn rec(url: &str, lat: f64, lon: f64) -> PointRecord {
        PointRecord::new(url, GeoCoord::new(lat, lon).expect("valid"))
    }

    #[test]
    fn add_assigns_increasing_ids_and_bumps_generation() {
        let mut store = GeoPointStore::new();
        let g0 = store.generation();
        let a = store.add(rec("a", 1.0, 1.0));
        let b = store.add(rec("b", 2.0, 2.0));
        assert!(a < b);
        assert_eq!(store.len(), 2);
        assert_eq!(store.generation(), g0 + 2);
        assert_eq!(store.epoch(), 0);
        assert_eq!(store.get(b).map(|p| p.url.as_str()), Some("b"));
    }

    #[test]
    fn replace_all_swaps_contents_and_never_reuses_ids() {
        let mut store = GeoPointStore::new();
        let old = store.add(rec("old", 0.0, 0.0));
        store.replace_all([rec("x", 5.0, 5.0), rec("y", 6.0, 6.0)]);

        assert_eq!(store.len(), 2);
        assert!(store.get(old).is_none());
        let urls: Vec<&str> = store.all().iter().map(|p| p.url.as_str()).collect();
        assert_eq!(urls, vec!["x", "y"]);
        assert!(store.all().iter().all(|p| p.id > old));
        assert_eq!(store.epoch(), 1);
    }

    #[test]
    fn clear_empties_and_advances_epoch() {
        let mut store = GeoPointStore::new();
        store.add(rec("a", 1.0, 1.0));
        let generation = store.generation();
        store.clear();
        assert!(store.is_empty());
        assert!(store.generation() > generation);
        assert_eq!(store.epoch(), 1);
    }
}
