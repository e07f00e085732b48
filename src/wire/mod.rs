//! Wire encoding of points
//!
//! One point encodes to at most 67 printable ASCII characters:
//!
//! ```text
//! 2018-01-01T00:02:00Z;+37.00000;-122.00000;+12;0;0;12;120s
//! ```
//!
//! timestamp, latitude, longitude, altitude (m), speed (km/h), bearing,
//! position sd (m), then the segment length in seconds followed by the
//! type code. Each number is clamped to a fixed range first so that the
//! width holds whatever the input.

mod receiver;

pub use receiver::Timeline;

use time::macros::format_description;
use time::{OffsetDateTime, PrimitiveDateTime};

use crate::error::ReportError;
use crate::motion::{Fix, Point, PointType};

/// 20 + 9 + 10 + 5 + 3 + 3 + 4 + 5 + 1 + 7 separators
pub const MAX_LINE_LEN: usize = 67;

/// Latest instant whose timestamp still fits the fixed width
const MAX_TIME_MS: i64 = 253_402_300_799_999;

const MAX_SEGMENT_SECONDS: i64 = 99_999;

/// Formats ms since the epoch as `YYYY-MM-DDTHH:MM:SSZ`
pub fn format_utc_seconds(time: i64) -> Result<String, ReportError> {
    if !(0..=MAX_TIME_MS).contains(&time) {
        return Err(ReportError::TimestampRange(time));
    }
    let format = format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]Z");
    let stamp = OffsetDateTime::from_unix_timestamp(time.div_euclid(1000))
        .map_err(|_| ReportError::TimestampRange(time))?
        .format(format)?;

    Ok(stamp)
}

/// Parses `YYYY-MM-DDTHH:MM:SSZ` back into ms since the epoch
pub fn parse_utc_seconds(stamp: &str) -> Option<i64> {
    let format = format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]Z");
    let parsed = PrimitiveDateTime::parse(stamp, format).ok()?;

    Some(parsed.assume_utc().unix_timestamp() * 1000)
}

/// Encodes one point; times before 1970 or after 9999 are clamped
pub fn encode(point: &Point) -> Result<String, ReportError> {
    let fix = &point.fix;
    let stamp = format_utc_seconds(fix.time.clamp(0, MAX_TIME_MS))?;

    Ok(format!(
        "{};{:+.5};{:+.5};{:+};{};{};{};{}{}",
        stamp,
        clamp_f64(fix.latitude, -90.0, 90.0),
        clamp_f64(fix.longitude, -180.0, 180.0),
        clamp_round(fix.altitude, -9999, 9999),
        clamp_round(fix.speed, 0, 999),
        clamp_round(fix.bearing, 0, 360) % 360,
        clamp_round(fix.accuracy, 0, 9999),
        point.segment_seconds().clamp(0, MAX_SEGMENT_SECONDS),
        point.kind.code()
    ))
}

/// Joins encoded points into one message body, one per line
pub fn encode_batch<'a, I>(points: I) -> Result<String, ReportError>
where
    I: IntoIterator<Item = &'a Point>,
{
    let lines = points
        .into_iter()
        .map(encode)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(lines.join("\n"))
}

/// Parses one encoded line
pub fn decode_line(line: &str) -> Result<Point, ReportError> {
    let line = line.trim();
    let fields: Vec<&str> = line.split(';').collect();
    if fields.len() != 8 {
        return Err(ReportError::malformed(line, format!("{} fields", fields.len())));
    }

    let time = parse_utc_seconds(fields[0])
        .ok_or_else(|| ReportError::malformed(line, "bad timestamp"))?;
    // Bounds match the encoder's clamps.
    let number = |idx: usize, name: &str, min: f64, max: f64| -> Result<f64, ReportError> {
        let value = fields[idx]
            .parse::<f64>()
            .map_err(|e| ReportError::malformed(line, format!("bad {}: {}", name, e)))?;
        if !(min..=max).contains(&value) {
            return Err(ReportError::malformed(line, format!("{} out of range", name)));
        }
        Ok(value)
    };

    let latitude = number(1, "latitude", -90.0, 90.0)?;
    let longitude = number(2, "longitude", -180.0, 180.0)?;
    let altitude = number(3, "altitude", -9999.0, 9999.0)?;
    let speed = number(4, "speed", 0.0, 999.0)?;
    let bearing = number(5, "bearing", 0.0, 360.0)?;
    let accuracy = number(6, "sd", 0.0, 9999.0)?;

    let tail = fields[7];
    let code = tail
        .chars()
        .last()
        .ok_or_else(|| ReportError::malformed(line, "missing type"))?;
    let kind = PointType::from_code(code)
        .ok_or_else(|| ReportError::malformed(line, format!("unknown type `{}`", code)))?;
    let segment = tail[..tail.len() - code.len_utf8()]
        .parse::<i64>()
        .map_err(|e| ReportError::malformed(line, format!("bad segment: {}", e)))?;
    if !(0..=MAX_SEGMENT_SECONDS).contains(&segment) {
        return Err(ReportError::malformed(line, "segment out of range"));
    }

    let fix = Fix::new(time, latitude, longitude, altitude, speed, bearing, accuracy);

    Ok(Point::new(fix, kind, time - segment * 1000))
}

/// Parses every non-empty line of a message body
pub fn decode_message(body: &str) -> Result<Vec<Point>, ReportError> {
    body.lines()
        .filter(|l| !l.trim().is_empty())
        .map(decode_line)
        .collect()
}

fn clamp_f64(value: f64, min: f64, max: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(min, max)
    }
}

fn clamp_round(value: f64, min: i64, max: i64) -> i64 {
    if value.is_nan() {
        return min.max(0);
    }
    (value.round() as i64).clamp(min, max)
}
