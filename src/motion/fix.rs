//! Position sample definition

use std::fmt;

use geo::geometry::Point as GeoPoint;
use geo::{HaversineBearing, HaversineDistance};
use serde::{Deserialize, Serialize};

use crate::wire::format_utc_seconds;

/// One instantaneous position sample, as reported by the GPS receiver
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Fix {
    /// Capture time, ms since 1970-01-01 00:00:00 UTC (GPS time)
    pub time: i64,
    /// Degrees
    pub latitude: f64,
    /// Degrees
    pub longitude: f64,
    /// Meters
    pub altitude: f64,
    /// km/h
    pub speed: f64,
    /// Degrees
    pub bearing: f64,
    /// 68% confidence radius of the lat/lon position, meters
    pub accuracy: f64,
}

impl Fix {
    pub fn new(
        time: i64,
        latitude: f64,
        longitude: f64,
        altitude: f64,
        speed: f64,
        bearing: f64,
        accuracy: f64,
    ) -> Self {
        Self {
            time,
            latitude,
            longitude,
            altitude,
            speed,
            bearing,
            accuracy,
        }
    }

    /// Position only, no motion and no uncertainty
    pub fn basic(time: i64, latitude: f64, longitude: f64) -> Self {
        Self::new(time, latitude, longitude, 0.0, 0.0, 0.0, 0.0)
    }

    pub fn with_time(&self, time: i64) -> Self {
        Self { time, ..*self }
    }

    pub fn with_speed_and_bearing(&self, speed: f64, bearing: f64) -> Self {
        Self {
            speed,
            bearing,
            ..*self
        }
    }

    /// Whole seconds since the epoch, used as the outbox and receiver key
    pub fn seconds(&self) -> i64 {
        self.time.div_euclid(1000)
    }

    pub fn coordinates(&self) -> GeoPoint {
        GeoPoint::new(self.longitude, self.latitude)
    }

    /// Great-circle distance in meters
    pub fn distance_to(&self, other: &Fix) -> f64 {
        self.coordinates().haversine_distance(&other.coordinates())
    }

    /// Initial great-circle bearing towards `other`, degrees in [0, 360)
    pub fn bearing_to(&self, other: &Fix) -> f64 {
        self.coordinates()
            .haversine_bearing(other.coordinates())
            .rem_euclid(360.0)
    }
}

impl fmt::Display for Fix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stamp = format_utc_seconds(self.time).unwrap_or_else(|_| self.time.to_string());
        write!(
            f,
            "<{}: ({:+.5}, {:+.5}, {:+.0} m), {:.1} km/h brg {:.0}, sd={:.0} m>",
            stamp,
            self.latitude,
            self.longitude,
            self.altitude,
            self.speed,
            self.bearing,
            self.accuracy
        )
    }
}

/// What a fix source pushes: a sample, or the news that there is none
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum FixEvent {
    Fix(Fix),
    SignalLost,
}

impl From<Fix> for FixEvent {
    fn from(fix: Fix) -> Self {
        FixEvent::Fix(fix)
    }
}
