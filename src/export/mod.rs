//! Exports of recorded points

pub mod gpx;

pub use self::gpx::GpxGenerator;
