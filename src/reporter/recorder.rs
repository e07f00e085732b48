//! Decides which points get queued for delivery
//!
//! Transitions are queued at once. Anything else waits until the recording
//! interval has elapsed since the *fix time* of the last recorded point, so
//! the interval bounds the gap between reported fixes no matter how late
//! the point is processed.

use std::collections::VecDeque;

use tracing::{debug, info};

use super::outbox::Outbox;
use crate::config::{RecordingOptions, MINUTE};
use crate::motion::{ClassifiedPoint, Fix, Point, PointType};

const HOUR: f64 = (60 * MINUTE) as f64;

/// What one promotion did to the outbox
#[derive(Clone, Debug, PartialEq)]
pub struct Promotion {
    pub point: Point,
    pub evicted: Vec<i64>,
}

pub struct Recorder {
    options: RecordingOptions,
    /// Latest non-provisional point not yet recorded
    pending: Option<Point>,
    last_recorded: Option<Point>,
    /// Recent points, provisional included, for smoothing velocity
    recent: VecDeque<Point>,
}

impl Recorder {
    pub fn new(options: &RecordingOptions) -> Self {
        Self {
            options: options.sanitized(),
            pending: None,
            last_recorded: None,
            recent: VecDeque::new(),
        }
    }

    pub fn pending(&self) -> Option<&Point> {
        self.pending.as_ref()
    }

    pub fn last_recorded(&self) -> Option<&Point> {
        self.last_recorded.as_ref()
    }

    /// Takes in a freshly classified point at device time `now`
    pub fn observe(&mut self, classified: &ClassifiedPoint, now: i64) {
        self.recent.push_back(classified.point);
        while let Some(front) = self.recent.front() {
            if front.fix.time < now - self.options.velocity_max_age {
                self.recent.pop_front();
            } else {
                break;
            }
        }

        if !classified.provisional {
            self.pending = Some(classified.point);
        }
    }

    /// When the next non-transition point may be recorded
    pub fn next_recording_time(&self, now: i64) -> i64 {
        match &self.last_recorded {
            None => now,
            Some(last) if last.kind == PointType::Go => last.fix.time + self.options.interval_after_go,
            Some(last) => last.fix.time + self.options.interval,
        }
    }

    pub fn is_due(&self, now: i64) -> bool {
        now >= self.next_recording_time(now)
    }

    /// Moves the pending point into the outbox if it is a transition or
    /// the recording interval is up
    pub fn check(&mut self, now: i64, outbox: &mut Outbox) -> Option<Promotion> {
        let due = match &self.pending {
            Some(point) => point.is_transition() || self.is_due(now),
            None => false,
        };
        if !due {
            return None;
        }

        let point = self.pending.take()?;
        Some(self.record(point, outbox))
    }

    /// Records the pending point, or the last recorded one again
    pub fn record_requested(&mut self, outbox: &mut Outbox) -> Option<Promotion> {
        let point = match self.pending.take() {
            Some(point) => point,
            None => {
                let last = self.last_recorded?;
                debug!(point = %last, "resending last recorded point");
                last
            }
        };

        Some(self.record(point, outbox))
    }

    fn record(&mut self, point: Point, outbox: &mut Outbox) -> Promotion {
        let point = self.smooth_velocity(point);
        let evicted = outbox.insert(point);
        self.last_recorded = Some(point);
        info!(point = %point, queued = outbox.len(), evicted = evicted.len(), "recorded");

        Promotion { point, evicted }
    }

    /// Replaces speed and bearing with the motion between the averaged
    /// start and end of the recent window, when the window is long enough
    fn smooth_velocity(&self, point: Point) -> Point {
        let n = self.recent.len();
        if n == 0 {
            return point;
        }
        let k = self.options.velocity_samples.min(n);
        let start = average_fix(self.recent.iter().take(k));
        let stop = average_fix(self.recent.iter().skip(n - k));

        let span = (stop.time - start.time) as f64;
        if span < self.options.velocity_min_span as f64 {
            return point;
        }

        let speed = (start.distance_to(&stop) / 1000.0) / (span / HOUR);
        let bearing = start.bearing_to(&stop);
        debug!(speed, bearing, span_ms = span, "smoothed velocity");

        point.with_fix(point.fix.with_speed_and_bearing(speed, bearing))
    }
}

fn average_fix<'a, I: Iterator<Item = &'a Point>>(points: I) -> Fix {
    let mut lat = 0.0;
    let mut lon = 0.0;
    let mut time: i128 = 0;
    let mut n = 0;
    for point in points {
        lat += point.fix.latitude;
        lon += point.fix.longitude;
        time += point.fix.time as i128;
        n += 1;
    }
    if n == 0 {
        return Fix::basic(0, 0.0, 0.0);
    }

    Fix::basic((time / n as i128) as i64, lat / n as f64, lon / n as f64)
}

#[cfg(test)]
mod tests {
    use super::Recorder;
    use crate::config::RecordingOptions;
    use crate::motion::{ClassifiedPoint, Fix, Point, PointType};
    use crate::reporter::outbox::Outbox;

    const T0: i64 = 1_514_764_800_000;
    const MIN: i64 = 60_000;

    fn classified(time: i64, kind: PointType, provisional: bool) -> ClassifiedPoint {
        ClassifiedPoint {
            point: Point::new(Fix::new(time, 37.0, -122.0, 0.0, 7.0, 45.0, 5.0), kind, T0),
            provisional,
        }
    }

    fn feed(recorder: &mut Recorder, outbox: &mut Outbox, time: i64, kind: PointType) -> bool {
        recorder.observe(&classified(time, kind, false), time);
        recorder.check(time, outbox).is_some()
    }

    #[test]
    fn first_point_is_recorded_at_once() {
        let mut recorder = Recorder::new(&RecordingOptions::default());
        let mut outbox = Outbox::new(48);

        assert!(feed(&mut recorder, &mut outbox, T0, PointType::Moving));
        assert_eq!(1, outbox.len());
    }

    #[test]
    fn provisional_points_are_held_back() {
        let mut recorder = Recorder::new(&RecordingOptions::default());
        let mut outbox = Outbox::new(48);

        recorder.observe(&classified(T0, PointType::Moving, true), T0);
        assert_eq!(None, recorder.check(T0, &mut outbox));
        assert!(outbox.is_empty());
    }

    #[test]
    fn interval_runs_from_fix_time() {
        let mut recorder = Recorder::new(&RecordingOptions::default());
        let mut outbox = Outbox::new(48);
        assert!(feed(&mut recorder, &mut outbox, T0, PointType::Moving));

        assert!(!feed(&mut recorder, &mut outbox, T0 + 5 * MIN, PointType::Moving));
        assert!(!feed(&mut recorder, &mut outbox, T0 + 10 * MIN - 1, PointType::Moving));

        // Processing late does not push the schedule back.
        recorder.observe(&classified(T0 + 10 * MIN, PointType::Moving, false), T0 + 10 * MIN);
        let promoted = recorder.check(T0 + 13 * MIN, &mut outbox);
        assert_eq!(Some(T0 + 10 * MIN), promoted.map(|p| p.point.fix.time));
        assert_eq!(T0 + 20 * MIN, recorder.next_recording_time(T0 + 13 * MIN));
    }

    #[test]
    fn transitions_skip_the_wait() {
        let mut recorder = Recorder::new(&RecordingOptions::default());
        let mut outbox = Outbox::new(48);
        assert!(feed(&mut recorder, &mut outbox, T0, PointType::Moving));

        assert!(feed(&mut recorder, &mut outbox, T0 + 1_000, PointType::Stop));
        assert!(feed(&mut recorder, &mut outbox, T0 + 2_000, PointType::Go));
        assert_eq!(3, outbox.len());
    }

    #[test]
    fn shorter_interval_after_go() {
        let options = RecordingOptions::default();
        let mut recorder = Recorder::new(&options);
        let mut outbox = Outbox::new(48);
        assert!(feed(&mut recorder, &mut outbox, T0, PointType::Go));

        assert!(!feed(&mut recorder, &mut outbox, T0 + options.interval_after_go - 1, PointType::Moving));
        assert!(feed(&mut recorder, &mut outbox, T0 + options.interval_after_go, PointType::Moving));
        assert_eq!(
            T0 + options.interval_after_go + options.interval,
            recorder.next_recording_time(T0)
        );
    }

    #[test]
    fn request_resends_last_recorded() {
        let mut recorder = Recorder::new(&RecordingOptions::default());
        let mut outbox = Outbox::new(48);
        assert_eq!(None, recorder.record_requested(&mut outbox));

        assert!(feed(&mut recorder, &mut outbox, T0, PointType::Moving));
        outbox.remove(T0 / 1000);

        let again = recorder.record_requested(&mut outbox);
        assert_eq!(Some(T0), again.map(|p| p.point.fix.time));
        assert!(outbox.contains(T0 / 1000));
    }

    #[test]
    fn velocity_is_smoothed_over_the_window() {
        let mut recorder = Recorder::new(&RecordingOptions::default());
        let mut outbox = Outbox::new(48);

        // Heading due north at about 0.0001 degrees (11.1 m) per second.
        for i in 0..=30 {
            let time = T0 + i * 1_000;
            let fix = Fix::new(time, 37.0 + 0.0001 * i as f64, -122.0, 0.0, 0.0, 270.0, 5.0);
            recorder.observe(
                &ClassifiedPoint {
                    point: Point::new(fix, PointType::Moving, T0),
                    provisional: i != 30,
                },
                time,
            );
        }

        let promoted = recorder.check(T0 + 30_000, &mut outbox).map(|p| p.point.fix);
        let fix = promoted.expect("nothing recorded");
        assert!((fix.speed - 40.0).abs() < 0.5, "speed {}", fix.speed);
        assert!(fix.bearing < 0.5 || fix.bearing > 359.5, "bearing {}", fix.bearing);
    }

    #[test]
    fn short_window_keeps_reported_velocity() {
        let mut recorder = Recorder::new(&RecordingOptions::default());
        let mut outbox = Outbox::new(48);

        recorder.observe(&classified(T0, PointType::Moving, true), T0);
        recorder.observe(&classified(T0 + 5_000, PointType::Moving, false), T0 + 5_000);

        let promoted = recorder.check(T0 + 5_000, &mut outbox).map(|p| p.point.fix);
        assert_eq!(Some(7.0), promoted.map(|f| f.speed));
        assert_eq!(Some(45.0), promoted.map(|f| f.bearing));
    }
}
