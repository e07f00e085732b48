use time::macros::datetime;

use super::{Fix, FixEvent, MotionClassifier, Point, PointType};
use crate::config::MotionOptions;

const SETTLING: i64 = 120_000;

fn t0() -> i64 {
    datetime!(2018-01-01 0:00 UTC).unix_timestamp() * 1000
}

/// Just before settling
fn t1() -> i64 {
    t0() + SETTLING - 1
}

/// Just after settling
fn t2() -> i64 {
    t0() + SETTLING + 1
}

fn l0() -> Fix {
    Fix::new(t0(), 37.0, -122.0, 0.0, 0.0, 0.0, 12.0)
}

/// About 11 m north of l0
fn l0_near() -> Fix {
    Fix::new(t0(), 37.00010, -122.0, 0.0, 0.0, 0.0, 12.0)
}

/// About 89 m north of l0
fn l0_far() -> Fix {
    Fix::new(t0(), 37.00080, -122.0, 0.0, 0.0, 0.0, 12.0)
}

/// Feeds fixes and keeps the points a recorder would keep
struct Harness {
    classifier: MotionClassifier,
    points: Vec<Point>,
}

impl Harness {
    fn new(options: &MotionOptions) -> Self {
        let mut h = Self {
            classifier: MotionClassifier::new(options),
            points: vec![],
        };
        h.simulate(l0(), t0());
        assert_eq!(vec![moving(l0(), t0(), t0())], h.take(), "for the very first fix");
        h
    }

    fn standard() -> Self {
        Self::new(&MotionOptions::default())
    }

    fn simulate(&mut self, fix: Fix, time: i64) {
        let classified = self.classifier.on_fix(&fix.with_time(time));
        if !classified.provisional {
            self.points.push(classified.point);
        }
    }

    fn take(&mut self) -> Vec<Point> {
        std::mem::take(&mut self.points)
    }
}

fn moving(fix: Fix, time: i64, last_transition: i64) -> Point {
    Point::new(fix.with_time(time), PointType::Moving, last_transition)
}

fn stop(fix: Fix, time: i64, last_transition: i64) -> Point {
    Point::new(fix.with_time(time), PointType::Stop, last_transition)
}

fn resting(fix: Fix, time: i64, last_transition: i64) -> Point {
    Point::new(fix.with_time(time), PointType::Resting, last_transition)
}

fn go(fix: Fix, time: i64, last_transition: i64) -> Point {
    Point::new(fix.with_time(time), PointType::Go, last_transition)
}

fn settle(h: &mut Harness) {
    h.simulate(l0(), t0() + 1);
    assert!(h.take().is_empty(), "nearby fix within the settling period");
    h.simulate(l0(), t1());
    assert!(h.take().is_empty(), "nearby fix within the settling period");
    h.simulate(l0(), t2());
    assert_eq!(vec![stop(l0(), t0(), t0())], h.take(), "retroactive stop");
}

#[test]
fn first_fix_is_moving_with_empty_segment() {
    let mut classifier = MotionClassifier::new(&MotionOptions::default());
    let fast = Fix::new(t0(), 37.0, -122.0, 10.0, 80.0, 90.0, 200.0);

    let classified = classifier.on_fix(&fast);
    assert!(!classified.provisional);
    assert_eq!(PointType::Moving, classified.point.kind);
    assert_eq!(0, classified.point.segment_millis());
}

#[test]
fn nearby_fixes_within_and_after_settling_period() {
    let mut h = Harness::standard();
    settle(&mut h);
    assert!(h.classifier.is_resting());
}

#[test]
fn additional_nearby_fixes_after_stopped() {
    let mut h = Harness::standard();
    settle(&mut h);

    for time in [t2() + 1, t2() + 2, t2() + 10_000] {
        h.simulate(l0(), time);
        assert_eq!(vec![resting(l0(), time, t0())], h.take());
    }
}

#[test]
fn departure_after_stopped() {
    let mut h = Harness::standard();
    settle(&mut h);

    h.simulate(l0_far(), t2() + 1);
    assert_eq!(vec![go(l0(), t2(), t0())], h.take(), "go at the last resting fix");

    h.simulate(l0_far(), t2() + 2);
    let points = h.take();
    assert!(points.is_empty(), "settling near the departure point: {:?}", points);
}

#[test]
fn go_opens_a_new_segment() {
    let mut h = Harness::standard();
    settle(&mut h);
    h.simulate(l0_far(), t2() + 1);
    h.take();

    let gone = l0_far().with_speed_and_bearing(40.0, 0.0);
    h.simulate(gone, t2() + 5_000);
    assert_eq!(vec![moving(gone, t2() + 5_000, t2())], h.take());
}

#[test]
fn immediate_faraway_fix() {
    let mut h = Harness::standard();
    h.simulate(l0_far(), t0() + 1);
    assert_eq!(vec![moving(l0_far(), t0() + 1, t0())], h.take());
}

#[test]
fn faraway_fix_within_settling_period() {
    let mut h = Harness::standard();
    h.simulate(l0_near(), t0() + 1);
    assert!(h.take().is_empty());
    h.simulate(l0_near(), t1() - 1);
    assert!(h.take().is_empty());
    h.simulate(l0_far(), t1());
    assert_eq!(vec![moving(l0_far(), t1(), t0())], h.take());
}

#[test]
fn faraway_fix_after_settling_period() {
    let mut h = Harness::standard();
    h.simulate(l0_near(), t0() + 1);
    h.simulate(l0_near(), t1());
    assert!(h.take().is_empty());
    h.simulate(l0_far(), t2());
    assert_eq!(vec![moving(l0_far(), t2(), t0())], h.take());
}

#[test]
fn moving_then_stopping() {
    let mut h = Harness::standard();
    h.simulate(l0_far(), t1());
    assert_eq!(vec![moving(l0_far(), t1(), t0())], h.take());
    h.simulate(l0_far(), t1() + 1);
    h.simulate(l0_far(), t1() + SETTLING - 1);
    assert!(h.take().is_empty());
    h.simulate(l0_far(), t1() + SETTLING + 1);
    assert_eq!(vec![stop(l0_far(), t1(), t0())], h.take());
}

#[test]
fn unstable_fix_restarts_settling() {
    let mut h = Harness::standard();
    h.simulate(l0(), t0() + 1);
    let fast = l0().with_speed_and_bearing(30.0, 180.0);
    h.simulate(fast, t1());
    assert_eq!(vec![moving(fast, t1(), t0())], h.take());

    // Settling starts over at the next stable fix.
    h.simulate(l0(), t2());
    assert_eq!(vec![moving(l0(), t2(), t0())], h.take());
    h.simulate(l0(), t2() + SETTLING);
    assert_eq!(vec![stop(l0(), t2(), t0())], h.take());
}

#[test]
fn signal_loss_keeps_settling_state() {
    let mut h = Harness::standard();
    h.simulate(l0(), t0() + 1);

    assert_eq!(None, h.classifier.classify(&FixEvent::SignalLost));
    assert_eq!(None, h.classifier.classify(&FixEvent::SignalLost));

    h.simulate(l0(), t2());
    assert_eq!(vec![stop(l0(), t0(), t0())], h.take());
}

#[test]
fn replay_is_deterministic() {
    let events: Vec<FixEvent> = vec![
        l0().into(),
        l0_near().with_time(t0() + 30_000).into(),
        FixEvent::SignalLost,
        l0().with_time(t2()).into(),
        l0().with_time(t2() + 60_000).into(),
        l0_far().with_speed_and_bearing(20.0, 0.0).with_time(t2() + 61_000).into(),
        l0_far().with_time(t2() + 62_000).into(),
    ];

    let run = || {
        let mut classifier = MotionClassifier::new(&MotionOptions::default());
        events
            .iter()
            .map(|e| classifier.classify(e))
            .collect::<Vec<_>>()
    };

    let first = run();
    assert_eq!(first, run());

    let kinds: Vec<Option<PointType>> = first.iter().map(|c| c.map(|c| c.point.kind)).collect();
    assert_eq!(
        vec![
            Some(PointType::Moving),
            Some(PointType::Moving),
            None,
            Some(PointType::Stop),
            Some(PointType::Resting),
            Some(PointType::Go),
            Some(PointType::Moving),
        ],
        kinds
    );
}

#[test]
fn anchor_refines_until_good_enough() {
    let options = MotionOptions::default();
    let mut classifier = MotionClassifier::new(&options);

    let coarse = Fix::new(t0(), 37.0, -122.0, 0.0, 0.0, 0.0, 40.0);
    let sharp = Fix::new(t0() + 1_000, 37.00010, -122.0, 0.0, 0.0, 0.0, 5.0);
    let sharper = Fix::new(t0() + 2_000, 37.00005, -122.0, 0.0, 0.0, 0.0, 2.0);

    classifier.on_fix(&coarse);
    assert!(classifier.on_fix(&sharp).provisional);
    assert!(classifier.on_fix(&sharper).provisional);

    // The anchor moved to the sharp fix, not the sharper one, and the
    // settling period still counts from the coarse fix.
    let c = classifier.on_fix(&sharper.with_time(t0() + SETTLING));
    assert_eq!(stop(sharp, t0(), t0()), c.point);
}

#[test]
fn loose_accuracy_continues_rest_only_when_tight() {
    let mut h = Harness::standard();
    settle(&mut h);

    let drifting = Fix {
        accuracy: 80.0,
        ..l0()
    };
    h.simulate(drifting, t2() + 1_000);
    assert_eq!(vec![resting(l0(), t2() + 1_000, t0())], h.take());

    // The same accuracy 11 m away is outside the tight radius.
    let wandering = Fix {
        accuracy: 80.0,
        ..l0_near()
    };
    h.simulate(wandering, t2() + 2_000);
    assert_eq!(vec![go(l0(), t2() + 1_000, t0())], h.take());
}

#[test]
fn loose_accuracy_does_not_start_rest() {
    let mut h = Harness::standard();
    let loose = Fix {
        accuracy: 80.0,
        ..l0()
    };
    h.simulate(loose, t0() + 1);
    assert_eq!(vec![moving(loose, t0() + 1, t0())], h.take());
    h.simulate(loose, t2());
    assert_eq!(vec![moving(loose, t2(), t0())], h.take());
}

#[test]
fn continuing_to_rest_boundaries_follow_multiplier() {
    for multiplier in [1.0, 1.5, 2.0, 4.0] {
        let options = MotionOptions {
            resting_accuracy_multiplier: multiplier,
            ..MotionOptions::default()
        };
        let loose = options.resting_loose_accuracy();

        // Just inside the loose accuracy bound, at the anchor, at speed.
        let mut h = Harness::new(&options);
        settle(&mut h);
        let inside = Fix {
            accuracy: loose - 0.01,
            speed: 50.0,
            ..l0()
        };
        h.simulate(inside, t2() + 1_000);
        assert_eq!(
            vec![resting(l0(), t2() + 1_000, t0())],
            h.take(),
            "multiplier {}",
            multiplier
        );

        // On the bound itself the fix no longer qualifies.
        let mut h = Harness::new(&options);
        settle(&mut h);
        let edge = Fix {
            accuracy: loose,
            ..l0()
        };
        h.simulate(edge, t2() + 1_000);
        assert_eq!(
            vec![go(l0(), t2(), t0())],
            h.take(),
            "multiplier {}",
            multiplier
        );
    }
}

#[test]
fn tight_radius_shrinks_with_multiplier() {
    // 11 m away with poor accuracy: inside r/1 = 20 m, outside r/2 = 10 m.
    let wandering = Fix {
        accuracy: 45.0,
        speed: 50.0,
        ..l0_near()
    };

    for (multiplier, continues) in [(1.0, true), (2.0, false)] {
        let options = MotionOptions {
            resting_accuracy_multiplier: multiplier,
            ..MotionOptions::default()
        };
        let mut h = Harness::new(&options);
        settle(&mut h);
        h.simulate(wandering, t2() + 1_000);
        let kind = h.take()[0].kind;
        assert_eq!(
            continues,
            kind == PointType::Resting,
            "multiplier {} gave {:?}",
            multiplier,
            kind
        );
    }
}
