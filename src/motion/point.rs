//! Classified point definition
//!
//! At any moment the tracked unit is either resting or moving. A segment is
//! a span of continuous rest or continuous movement; a new segment begins at
//! each transition. The span from `last_transition` to the fix time is the
//! segment leading up to the point, so `last_transition <= fix.time`.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::fix::Fix;
use crate::error::ReportError;
use crate::wire;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PointType {
    /// Resting before and after
    Resting,
    /// Moving before and after
    Moving,
    /// Transition from resting to moving
    Go,
    /// Transition from moving to resting
    Stop,
}

impl PointType {
    /// One-letter code used on the wire
    pub fn code(&self) -> char {
        match self {
            PointType::Resting => 'r',
            PointType::Moving => 'm',
            PointType::Go => 'g',
            PointType::Stop => 's',
        }
    }

    pub fn from_code(code: char) -> Option<Self> {
        match code {
            'r' => Some(PointType::Resting),
            'm' => Some(PointType::Moving),
            'g' => Some(PointType::Go),
            's' => Some(PointType::Stop),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            PointType::Resting => "resting",
            PointType::Moving => "moving",
            PointType::Go => "go",
            PointType::Stop => "stop",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub fix: Fix,
    pub kind: PointType,
    /// ms since the epoch, never later than `fix.time`
    pub last_transition: i64,
}

impl Point {
    pub fn new(fix: Fix, kind: PointType, last_transition: i64) -> Self {
        Self {
            fix,
            kind,
            last_transition: last_transition.min(fix.time),
        }
    }

    pub fn is_transition(&self) -> bool {
        matches!(self.kind, PointType::Go | PointType::Stop)
    }

    /// Whether the unit is at rest right after this point
    pub fn is_resting(&self) -> bool {
        matches!(self.kind, PointType::Resting | PointType::Stop)
    }

    /// Outbox key: the fix time truncated to whole seconds
    pub fn seconds(&self) -> i64 {
        self.fix.seconds()
    }

    pub fn segment_millis(&self) -> i64 {
        self.fix.time.saturating_sub(self.last_transition)
    }

    pub fn segment_seconds(&self) -> i64 {
        self.segment_millis() / 1000
    }

    pub fn with_fix(&self, fix: Fix) -> Self {
        Self::new(fix, self.kind, self.last_transition)
    }

    /// Fixed-width wire encoding, at most `wire::MAX_LINE_LEN` characters
    pub fn encode(&self) -> Result<String, ReportError> {
        wire::encode(self)
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = match self.kind {
            PointType::Resting | PointType::Go => "rested",
            PointType::Moving | PointType::Stop => "moved",
        };
        let tag = match self.kind {
            PointType::Go => ", go",
            PointType::Stop => ", stop",
            _ => "",
        };
        write!(f, "<{}, {} {} s{}>", self.fix, verb, self.segment_seconds(), tag)
    }
}
