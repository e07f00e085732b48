//! Motion classification of position samples

pub mod classifier;
pub mod fix;
pub mod point;

#[cfg(test)]
mod tests;

pub use classifier::{ClassifiedPoint, MotionClassifier};
pub use fix::{Fix, FixEvent};
pub use point::{Point, PointType};
