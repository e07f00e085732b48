//! Receiver side of the override contract
//!
//! A point replaces any earlier point with the same whole-second timestamp,
//! and a resting point also replaces every earlier point inside its resting
//! segment. Retransmitted history can therefore be merged in any order of
//! arrival without leaving stale moving points in a span known to be rest.

use std::collections::BTreeMap;
use std::ops::Bound::Excluded;

use crate::motion::{Point, PointType};

#[derive(Debug, Default)]
pub struct Timeline {
    points: BTreeMap<i64, Point>,
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, point: Point) {
        let key = point.seconds();
        if point.kind == PointType::Resting {
            let start = point.last_transition.div_euclid(1000);
            if start < key {
                let covered: Vec<i64> = self
                    .points
                    .range((Excluded(start), Excluded(key)))
                    .map(|(k, _)| *k)
                    .collect();
                for k in covered {
                    self.points.remove(&k);
                }
            }
        }
        self.points.insert(key, point);
    }

    pub fn extend<I: IntoIterator<Item = Point>>(&mut self, points: I) {
        for point in points {
            self.insert(point);
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn get(&self, seconds: i64) -> Option<&Point> {
        self.points.get(&seconds)
    }

    /// Points in time order
    pub fn points(&self) -> impl Iterator<Item = &Point> {
        self.points.values()
    }
}
