//! Bounded queue of points awaiting delivery

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, ErrorKind};
use std::path::PathBuf;
use std::rc::Rc;

use crate::error::ReportError;
use crate::motion::Point;

/// Points keyed by whole-second fix time. A later point for the same second
/// replaces the earlier one; past capacity the smallest key goes first,
/// whether or not it was ever sent.
#[derive(Debug)]
pub struct Outbox {
    entries: BTreeMap<i64, Point>,
    capacity: usize,
}

impl Outbox {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: BTreeMap::new(),
            capacity: capacity.max(1),
        }
    }

    /// Inserts or overwrites, then returns the keys evicted to fit
    pub fn insert(&mut self, point: Point) -> Vec<i64> {
        self.entries.insert(point.seconds(), point);

        let mut evicted = vec![];
        while self.entries.len() > self.capacity {
            match self.entries.pop_first() {
                Some((key, _)) => evicted.push(key),
                None => break,
            }
        }
        evicted
    }

    pub fn remove(&mut self, key: i64) -> Option<Point> {
        self.entries.remove(&key)
    }

    /// Up to `n` entries with the smallest keys
    pub fn oldest(&self, n: usize) -> Vec<(i64, Point)> {
        self.entries.iter().take(n).map(|(k, p)| (*k, *p)).collect()
    }

    pub fn contains(&self, key: i64) -> bool {
        self.entries.contains_key(&key)
    }

    pub fn keys(&self) -> Vec<i64> {
        self.entries.keys().copied().collect()
    }

    pub fn points(&self) -> Vec<Point> {
        self.entries.values().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Where the outbox survives restarts
pub trait OutboxStore {
    fn load(&mut self) -> Result<Vec<Point>, ReportError>;
    fn save(&mut self, points: &[Point]) -> Result<(), ReportError>;
}

/// In-memory store; clones share the same contents
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    points: Rc<RefCell<Vec<Point>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Vec<Point> {
        self.points.borrow().clone()
    }
}

impl OutboxStore for MemoryStore {
    fn load(&mut self) -> Result<Vec<Point>, ReportError> {
        Ok(self.snapshot())
    }

    fn save(&mut self, points: &[Point]) -> Result<(), ReportError> {
        *self.points.borrow_mut() = points.to_vec();
        Ok(())
    }
}

/// YAML file holding the pending points
pub struct YamlFileStore {
    path: PathBuf,
}

impl YamlFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl OutboxStore for YamlFileStore {
    fn load(&mut self) -> Result<Vec<Point>, ReportError> {
        let file = match File::open(&self.path) {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(vec![]),
            Err(e) => return Err(e.into()),
        };

        Ok(serde_yaml::from_reader(BufReader::new(file))?)
    }

    fn save(&mut self, points: &[Point]) -> Result<(), ReportError> {
        // Write aside and rename, so a crash never leaves half a file.
        let tmp = self.path.with_extension("tmp");
        {
            let writer = BufWriter::new(File::create(&tmp)?);
            serde_yaml::to_writer(writer, points)?;
        }
        fs::rename(&tmp, &self.path)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{MemoryStore, Outbox, OutboxStore, YamlFileStore};
    use crate::motion::{Fix, Point, PointType};

    fn point(seconds: i64, lat: f64) -> Point {
        Point::new(Fix::basic(seconds * 1000, lat, 0.0), PointType::Moving, 0)
    }

    #[test]
    fn same_second_overwrites() {
        let mut outbox = Outbox::new(4);
        outbox.insert(point(7, 1.0));
        outbox.insert(Point::new(
            Fix::basic(7_900, 2.0, 0.0),
            PointType::Stop,
            0,
        ));

        assert_eq!(1, outbox.len());
        assert_eq!(PointType::Stop, outbox.oldest(1)[0].1.kind);
    }

    #[test]
    fn capacity_drops_oldest_keys() {
        let capacity = 5;
        let mut outbox = Outbox::new(capacity);
        let keys = [40, 3, 17, 99, 8, 61, 25, 12, 70];

        let mut evicted = vec![];
        for k in keys {
            evicted.extend(outbox.insert(point(k, 0.0)));
        }

        assert_eq!(capacity, outbox.len());
        let mut sorted = keys.to_vec();
        sorted.sort_unstable_by(|a, b| b.cmp(a));
        let nth_largest = sorted[capacity - 1];
        assert!(outbox.keys().iter().all(|k| *k >= nth_largest));
        assert_eq!(keys.len() - capacity, evicted.len());
    }

    #[test]
    fn late_old_point_is_evicted_at_once() {
        let mut outbox = Outbox::new(2);
        outbox.insert(point(10, 0.0));
        outbox.insert(point(20, 0.0));

        assert_eq!(vec![5], outbox.insert(point(5, 0.0)));
        assert_eq!(vec![10, 20], outbox.keys());
    }

    #[test]
    fn oldest_in_key_order() {
        let mut outbox = Outbox::new(10);
        for k in [30, 10, 20] {
            outbox.insert(point(k, 0.0));
        }

        let keys: Vec<i64> = outbox.oldest(2).into_iter().map(|(k, _)| k).collect();
        assert_eq!(vec![10, 20], keys);
        assert_eq!(3, outbox.oldest(10).len());
    }

    #[test]
    fn memory_store_is_shared() -> Result<(), String> {
        let store = MemoryStore::new();
        let mut handle = store.clone();
        handle
            .save(&[point(1, 0.0), point(2, 0.0)])
            .map_err(|e| e.to_string())?;

        assert_eq!(2, store.snapshot().len());

        Ok(())
    }

    #[test]
    fn yaml_store_round_trip() -> Result<(), String> {
        let path = std::env::temp_dir().join(format!("fleetreport-outbox-{}.yaml", std::process::id()));
        let _ = std::fs::remove_file(&path);

        let mut store = YamlFileStore::new(&path);
        assert!(store.load().map_err(|e| e.to_string())?.is_empty());

        let points = vec![point(1, 37.5), point(2, -12.25)];
        store.save(&points).map_err(|e| e.to_string())?;
        assert_eq!(points, store.load().map_err(|e| e.to_string())?);

        std::fs::remove_file(&path).map_err(|e| e.to_string())?;

        Ok(())
    }
}
