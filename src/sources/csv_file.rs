//! CSV file source integration

use std::io::Read;

use csv::{Reader, StringRecord};
use time::format_description::well_known;
use time::OffsetDateTime;
use tracing::debug;

use super::{FieldsConfiguration, FixSource};
use crate::motion::{Fix, FixEvent};

/// CSV fixes source, one row per GPS reading
pub struct CsvSource<T>
where
    T: Read,
{
    rdr: Reader<T>,
    fields: FieldsConfiguration,
}

impl<T> CsvSource<T>
where
    T: Read,
{
    pub fn new(rdr: Reader<T>, fields: Option<FieldsConfiguration>) -> Self {
        Self {
            rdr,
            fields: match fields {
                Some(f) => f,
                None => FieldsConfiguration::default(),
            },
        }
    }
}

impl<T> FixSource for CsvSource<T>
where
    T: Read,
{
    fn fetch(&mut self, start: OffsetDateTime, end: OffsetDateTime) -> Result<Vec<FixEvent>, String> {
        let mut events = vec![];

        let mut header = self
            .rdr
            .headers()
            .map_err(|e| format!("Failed on read the header: {}", e.to_string()))?
            .clone();
        let header_idx = parse_header(&self.fields, &mut header)?;

        let mut recs = self.rdr.records();
        while let Some(row) = recs.next() {
            let mut rec = row.map_err(|e| format!("Failed on read some row: {}", e.to_string()))?;

            if rec.len() < 2 {
                continue;
            }

            let (time, event) = match parse_row(&header_idx, &self.fields, &mut rec) {
                Ok(parsed) => Ok(parsed),
                Err(e) => Err(format!("Error with row {:?}: {}", rec, e)),
            }?;

            if start <= time && time <= end {
                events.push(event);
            }
        }

        debug!(events = events.len(), "csv rows fetched");

        Ok(events)
    }
}

/// Field to index map
#[derive(Debug)]
struct FieldsIndex {
    time: usize,
    coordinates: usize,
    altitude: Option<usize>,
    speed: Option<usize>,
    bearing: Option<usize>,
    accuracy: Option<usize>,
}

fn parse_header(fields: &FieldsConfiguration, header: &mut StringRecord) -> Result<FieldsIndex, String> {
    header.trim();

    let position = |name: &str| header.iter().position(|h| h.to_lowercase() == name);

    let time = match position(&fields.time) {
        Some(p) => Ok(p),
        None => Err("Time header not found"),
    }?;

    let coordinates = match position(&fields.coordinates) {
        Some(p) => Ok(p),
        None => Err("Coordinates header not found"),
    }?;

    Ok(FieldsIndex {
        time,
        coordinates,
        altitude: position(&fields.altitude),
        speed: position(&fields.speed),
        bearing: position(&fields.bearing),
        accuracy: position(&fields.accuracy),
    })
}

/// A row without usable coordinates stands for a lost signal
fn parse_row(
    header: &FieldsIndex,
    fields: &FieldsConfiguration,
    row: &mut StringRecord,
) -> Result<(OffsetDateTime, FixEvent), String> {
    row.trim();

    let time = match row.get(header.time) {
        Some(d) => OffsetDateTime::parse(d, &well_known::Rfc3339)
            .map_err(|e| format!("Failed on parse the time: {}", e.to_string())),
        None => Err("Time field not found".to_string()),
    }?;

    let (lat, lng) = match row.get(header.coordinates).and_then(|c| parse_coordinates(c, fields)) {
        Some(c) => c,
        None => return Ok((time, FixEvent::SignalLost)),
    };

    let optional = |idx: Option<usize>| -> f64 {
        idx.and_then(|i| row.get(i))
            .and_then(|d| d.parse::<f64>().ok())
            .unwrap_or(0.0)
    };

    let millis = (time.unix_timestamp_nanos() / 1_000_000) as i64;
    let fix = Fix::new(
        millis,
        lat,
        lng,
        optional(header.altitude),
        optional(header.speed),
        optional(header.bearing),
        optional(header.accuracy),
    );

    Ok((time, FixEvent::Fix(fix)))
}

/// `lon, lat` (or `lat, lon` when flipped) split by `,`, `;` or a space
fn parse_coordinates(raw: &str, fields: &FieldsConfiguration) -> Option<(f64, f64)> {
    let separator = match raw {
        s if s.contains(",") => ",",
        s if s.contains(";") => ";",
        _ => " ",
    };
    let scoordinates: Vec<&str> = raw.split(separator).map(|s| s.trim()).collect();
    if scoordinates.len() != 2 {
        return None;
    }

    let mut ilat = 1;
    let mut ilng = 0;
    if fields.flip_coordinates {
        ilat = 0;
        ilng = 1;
    }

    let lat = scoordinates[ilat].parse::<f64>().ok()?;
    let lng = scoordinates[ilng].parse::<f64>().ok()?;

    Some((lat, lng))
}
