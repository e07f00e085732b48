//! GPX generator API

use gpx::{Gpx, GpxVersion, Track, TrackSegment, Waypoint};
use time::OffsetDateTime;

use crate::error::ReportError;
use crate::motion::{Point, PointType};

/// Builds a GPX document out of recorded points
pub struct GpxGenerator {
    /// Track name, eg.: vehicle or phone number
    pub name: Option<String>,
    points: Vec<Point>,
}

impl GpxGenerator {
    pub fn empty() -> Self {
        Self {
            name: None,
            points: vec![],
        }
    }

    pub fn new(points: Vec<Point>) -> Self {
        Self { name: None, points }
    }

    pub fn name(&mut self, name: String) -> &mut Self {
        self.name = Some(name);

        self
    }

    pub fn push(&mut self, point: Point) -> &mut Self {
        self.points.push(point);

        self
    }

    /// One track, split into a new segment at every GO and every STOP
    pub fn track(&self) -> Result<Track, ReportError> {
        let mut track = Track::new();
        track.name = self.name.clone();
        track.description = Some(format!("{} recorded points", self.points.len()));

        let mut points = self.points.clone();
        points.sort_by_key(|p| p.fix.time);

        let mut segment = TrackSegment::new();
        for point in points {
            if point.is_transition() && !segment.points.is_empty() {
                track.segments.push(segment);
                segment = TrackSegment::new();
            }
            segment.points.push(waypoint(&point)?);
        }
        if !segment.points.is_empty() {
            track.segments.push(segment);
        }

        Ok(track)
    }

    pub fn generate(&self) -> Result<Gpx, ReportError> {
        let mut gpx: Gpx = Default::default();
        gpx.version = GpxVersion::Gpx11;
        gpx.creator = Some("fleetreport".to_string());
        if !self.points.is_empty() {
            gpx.tracks.push(self.track()?);
        }

        Ok(gpx)
    }
}

fn waypoint(point: &Point) -> Result<Waypoint, ReportError> {
    let fix = &point.fix;
    let time = OffsetDateTime::from_unix_timestamp_nanos(fix.time as i128 * 1_000_000)
        .map_err(|_| ReportError::TimestampRange(fix.time))?;

    let mut wp = Waypoint::new(fix.coordinates());
    wp.time = Some(time.into());
    wp.elevation = Some(fix.altitude);
    // GPX speed is in m/s
    wp.speed = Some(fix.speed / 3.6);
    wp.name = Some(point.kind.name().to_string());
    if point.kind == PointType::Resting || point.kind == PointType::Stop {
        wp.description = Some(format!("resting for {} s", point.segment_seconds()));
    }

    Ok(wp)
}
