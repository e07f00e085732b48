//! Resting/moving hysteresis
//!
//! "Stable" is a property of one fix: its uncertainty radius and its speed
//! are both small. "Resting" and "moving" describe the classifier as a
//! whole: it enters the resting state once every fix of a settling period
//! has been stable and within `resting_radius` of a chosen anchor.

use tracing::debug;

use super::fix::{Fix, FixEvent};
use super::point::{Point, PointType};
use crate::config::MotionOptions;

/// A point as emitted for one fix
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ClassifiedPoint {
    pub point: Point,
    /// Set on moving points emitted while a settling attempt is under way;
    /// such a point may later be superseded by a retroactive stop.
    pub provisional: bool,
}

pub struct MotionClassifier {
    options: MotionOptions,
    resting: bool,
    last_transition: Option<i64>,
    /// Center of the resting circle; its time is not used
    anchor: Option<Fix>,
    /// Set iff the anchor is set
    settling_start: Option<i64>,
    /// Anchor as of the last fix that was in the resting state
    last_resting_fix: Option<Fix>,
}

impl MotionClassifier {
    pub fn new(options: &MotionOptions) -> Self {
        Self {
            options: options.sanitized(),
            resting: false,
            last_transition: None,
            anchor: None,
            settling_start: None,
            last_resting_fix: None,
        }
    }

    pub fn options(&self) -> &MotionOptions {
        &self.options
    }

    pub fn is_resting(&self) -> bool {
        self.resting
    }

    /// Classifies one event; signal loss yields `None` and touches no state
    pub fn classify(&mut self, event: &FixEvent) -> Option<ClassifiedPoint> {
        match event {
            FixEvent::Fix(fix) => Some(self.on_fix(fix)),
            FixEvent::SignalLost => {
                debug!("signal lost, classifier state kept");
                None
            }
        }
    }

    pub fn on_fix(&mut self, fix: &Fix) -> ClassifiedPoint {
        debug!(
            fix = %fix,
            anchor_distance = self.anchor.map(|a| fix.distance_to(&a)),
            settled_ms = self.settling_start.map(|s| fix.time - s),
            "classifying"
        );

        if self.last_transition.is_none() {
            self.last_transition = Some(fix.time);
        }

        // Decide whether we are waiting to see if the position holds
        // within the resting radius for a whole settling period.
        let mut settling = false;
        if self.is_stable(fix) || self.is_continuing_to_rest(fix) {
            let mut anchor = match self.anchor.take() {
                Some(anchor) if fix.distance_to(&anchor) < self.options.resting_radius => {
                    settling = true;
                    anchor
                }
                _ => {
                    self.settling_start = Some(fix.time);
                    *fix
                }
            };
            // Refine the anchor only until it is good enough, or it would
            // drift along with the fixes and hide slow motion.
            if anchor.accuracy > self.options.good_enough_anchor_accuracy
                && fix.accuracy < anchor.accuracy
            {
                anchor = *fix;
            }
            self.anchor = Some(anchor);
        } else {
            self.anchor = None;
            self.settling_start = None;
        }

        let settled = match (self.anchor, self.settling_start) {
            (Some(anchor), Some(start)) if fix.time - start >= self.options.settling_period => {
                Some((anchor, start))
            }
            _ => None,
        };

        let emitted = match (self.resting, settled) {
            // The rest began at the start of the settling period.
            (false, Some((anchor, start))) => self.emit(anchor.with_time(start), PointType::Stop, false),
            // The motion began after the last fix that still met the
            // conditions for resting.
            (true, None) => {
                let last = self.last_resting_fix.unwrap_or(*fix);
                self.emit(last, PointType::Go, false)
            }
            (true, Some((anchor, _))) => self.emit(anchor.with_time(fix.time), PointType::Resting, false),
            (false, None) => self.emit(*fix, PointType::Moving, settling),
        };

        self.resting = settled.is_some();
        self.last_resting_fix = settled.map(|(anchor, _)| anchor.with_time(fix.time));

        emitted
    }

    fn emit(&mut self, fix: Fix, kind: PointType, provisional: bool) -> ClassifiedPoint {
        let last_transition = self.last_transition.unwrap_or(fix.time);
        let point = Point::new(fix, kind, last_transition);
        if point.is_transition() {
            self.last_transition = Some(fix.time);
        }
        debug!(point = %point, provisional, "emitting");

        ClassifiedPoint { point, provisional }
    }

    fn is_stable(&self, fix: &Fix) -> bool {
        fix.speed < self.options.stable_max_speed && fix.accuracy < self.options.stable_max_accuracy
    }

    /// Once resting, a looser accuracy bound is accepted in exchange for a
    /// tighter position bound. Stationary receivers have been seen to drift
    /// their reported accuracy from 30 m to 90 m with under 3 m of motion.
    fn is_continuing_to_rest(&self, fix: &Fix) -> bool {
        if !self.resting {
            return false;
        }
        match self.anchor {
            Some(anchor) => {
                fix.distance_to(&anchor) < self.options.resting_tight_radius()
                    && fix.accuracy < self.options.resting_loose_accuracy()
            }
            None => false,
        }
    }
}
