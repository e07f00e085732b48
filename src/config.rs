//! Tunables for the motion classifier, recorder and transmitter
//!
//! Every struct deserializes from a partial document, missing keys take the
//! default. `sanitized()` swaps any out-of-range value for its default.

use serde::{Deserialize, Serialize};
use tracing::warn;

pub const SECOND: i64 = 1000;
pub const MINUTE: i64 = 60 * SECOND;

/// Thresholds of the resting/moving hysteresis
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionOptions {
    /// A fix is stable below this speed, km/h
    pub stable_max_speed: f64,
    /// A fix is stable below this uncertainty radius, meters
    pub stable_max_accuracy: f64,
    /// Fixes closer than this to the anchor keep settling, meters
    pub resting_radius: f64,
    /// How long the position must hold before a stop is confirmed, ms
    pub settling_period: i64,
    /// Once the anchor is this accurate it stops being refined, meters
    pub good_enough_anchor_accuracy: f64,
    /// While resting, the accuracy bound is multiplied and the radius
    /// bound divided by this factor
    pub resting_accuracy_multiplier: f64,
}

impl Default for MotionOptions {
    fn default() -> Self {
        Self {
            stable_max_speed: 5.0,
            stable_max_accuracy: 50.0,
            resting_radius: 20.0,
            settling_period: 2 * MINUTE,
            good_enough_anchor_accuracy: 10.0,
            resting_accuracy_multiplier: 2.0,
        }
    }
}

impl MotionOptions {
    pub fn sanitized(&self) -> Self {
        let d = Self::default();
        Self {
            stable_max_speed: positive("stable_max_speed", self.stable_max_speed, d.stable_max_speed),
            stable_max_accuracy: positive(
                "stable_max_accuracy",
                self.stable_max_accuracy,
                d.stable_max_accuracy,
            ),
            resting_radius: positive("resting_radius", self.resting_radius, d.resting_radius),
            settling_period: positive_millis("settling_period", self.settling_period, d.settling_period),
            good_enough_anchor_accuracy: positive(
                "good_enough_anchor_accuracy",
                self.good_enough_anchor_accuracy,
                d.good_enough_anchor_accuracy,
            ),
            resting_accuracy_multiplier: at_least_one(
                "resting_accuracy_multiplier",
                self.resting_accuracy_multiplier,
                d.resting_accuracy_multiplier,
            ),
        }
    }

    /// Accuracy bound for continuing to rest
    pub fn resting_loose_accuracy(&self) -> f64 {
        self.stable_max_accuracy * self.resting_accuracy_multiplier
    }

    /// Radius bound for continuing to rest
    pub fn resting_tight_radius(&self) -> f64 {
        self.resting_radius / self.resting_accuracy_multiplier
    }
}

/// Recording cadence and velocity smoothing
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordingOptions {
    /// Upper bound between the fix times of recorded points, ms
    pub interval: i64,
    /// Tighter bound applied right after a go point, ms
    pub interval_after_go: i64,
    /// Samples averaged at each end of the smoothing window
    pub velocity_samples: usize,
    /// Shortest span that yields a smoothed velocity, ms
    pub velocity_min_span: i64,
    /// Points older than this drop out of the smoothing window, ms
    pub velocity_max_age: i64,
}

impl Default for RecordingOptions {
    fn default() -> Self {
        Self {
            interval: 10 * MINUTE,
            interval_after_go: MINUTE,
            velocity_samples: 4,
            velocity_min_span: 20 * SECOND,
            velocity_max_age: 35 * SECOND,
        }
    }
}

impl RecordingOptions {
    pub fn sanitized(&self) -> Self {
        let d = Self::default();
        Self {
            interval: positive_millis("interval", self.interval, d.interval),
            interval_after_go: positive_millis(
                "interval_after_go",
                self.interval_after_go,
                d.interval_after_go,
            ),
            velocity_samples: nonzero("velocity_samples", self.velocity_samples, d.velocity_samples),
            velocity_min_span: positive_millis(
                "velocity_min_span",
                self.velocity_min_span,
                d.velocity_min_span,
            ),
            velocity_max_age: positive_millis(
                "velocity_max_age",
                self.velocity_max_age,
                d.velocity_max_age,
            ),
        }
    }
}

/// Outbox bounds and delivery retry
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransmissionOptions {
    /// Where every message goes; nothing is sent while unset
    pub destination: Option<String>,
    /// Wait between attempts on the same channel, ms
    pub retry_interval: i64,
    /// Points joined into one message
    pub points_per_message: usize,
    /// Outbox entries kept before the oldest are dropped
    pub outbox_capacity: usize,
    /// Period of the record/transmit poll, ms
    pub poll_interval: i64,
}

impl Default for TransmissionOptions {
    fn default() -> Self {
        Self {
            destination: None,
            retry_interval: 30 * SECOND,
            points_per_message: 2,
            outbox_capacity: 48,
            poll_interval: 10 * SECOND,
        }
    }
}

impl TransmissionOptions {
    pub fn sanitized(&self) -> Self {
        let d = Self::default();
        let destination = match &self.destination {
            Some(dest) if !dest.trim().is_empty() => Some(dest.trim().to_string()),
            _ => None,
        };
        Self {
            destination,
            retry_interval: positive_millis("retry_interval", self.retry_interval, d.retry_interval),
            points_per_message: nonzero(
                "points_per_message",
                self.points_per_message,
                d.points_per_message,
            ),
            outbox_capacity: nonzero("outbox_capacity", self.outbox_capacity, d.outbox_capacity),
            poll_interval: positive_millis("poll_interval", self.poll_interval, d.poll_interval),
        }
    }
}

fn positive(name: &str, value: f64, default: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        warn!(option = name, value, default, "out of range, using default");
        default
    }
}

fn at_least_one(name: &str, value: f64, default: f64) -> f64 {
    if value.is_finite() && value >= 1.0 {
        value
    } else {
        warn!(option = name, value, default, "out of range, using default");
        default
    }
}

fn positive_millis(name: &str, value: i64, default: i64) -> i64 {
    if value > 0 {
        value
    } else {
        warn!(option = name, value, default, "out of range, using default");
        default
    }
}

fn nonzero(name: &str, value: usize, default: usize) -> usize {
    if value > 0 {
        value
    } else {
        warn!(option = name, value, default, "out of range, using default");
        default
    }
}
