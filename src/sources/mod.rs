//! Fix sources API

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::motion::FixEvent;

/// Fix source
pub trait FixSource {
    /// Fetch the fixes and signal losses during the period, oldest first
    fn fetch(&mut self, start: OffsetDateTime, end: OffsetDateTime) -> Result<Vec<FixEvent>, String>;
}

/// Column names of the source
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldsConfiguration {
    pub time: String,
    pub coordinates: String,
    pub altitude: String,
    pub speed: String,
    pub bearing: String,
    pub accuracy: String,
    /// Coordinates given as `lat, lon` instead of `lon, lat`
    pub flip_coordinates: bool,
}

impl Default for FieldsConfiguration {
    fn default() -> Self {
        Self {
            time: "time".to_string(),
            coordinates: "coordinates".to_string(),
            altitude: "altitude".to_string(),
            speed: "speed".to_string(),
            bearing: "bearing".to_string(),
            accuracy: "accuracy".to_string(),
            flip_coordinates: false,
        }
    }
}

#[cfg(feature = "csv")]
mod csv_file;

#[cfg(feature = "csv")]
pub use csv_file::CsvSource;
