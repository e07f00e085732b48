//! Composition root: one queue, one consumer
//!
//! Fixes, polls, delivery outcomes and on-demand requests all arrive as
//! `Event`s on a single queue and are handled to completion, one at a time,
//! on whichever thread calls `run_pending`. Nothing in the pipeline blocks.

use std::sync::mpsc::{channel, Receiver, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, info, warn};

use super::clock::{ClockOffset, WallClock};
use super::outbox::{MemoryStore, Outbox, OutboxStore};
use super::recorder::{Promotion, Recorder};
use super::transmitter::Transmitter;
use super::transport::{DeliveryReport, MessageTransport};
use crate::config::{MotionOptions, RecordingOptions, TransmissionOptions};
use crate::error::ReportError;
use crate::motion::{ClassifiedPoint, Fix, FixEvent, MotionClassifier, Point, PointType};
use crate::wire::format_utc_seconds;

/// Moves shorter than this never count as travel, meters
const MIN_TRAVEL_STEP: f64 = 20.0;

#[derive(Debug)]
pub enum Event {
    Fix(FixEvent),
    Poll,
    Delivery(DeliveryReport),
    PointRequest,
}

/// Handle for pushing events into a running reporter. Every method returns
/// false once the reporter has stopped.
#[derive(Clone, Debug)]
pub struct EventSender {
    tx: Sender<Event>,
    poll_interval: Duration,
}

impl EventSender {
    pub fn push_fix(&self, event: FixEvent) -> bool {
        self.tx.send(Event::Fix(event)).is_ok()
    }

    pub fn poll(&self) -> bool {
        self.tx.send(Event::Poll).is_ok()
    }

    pub fn request_point(&self) -> bool {
        self.tx.send(Event::PointRequest).is_ok()
    }

    /// Configured period between polls
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Posts a poll every `poll_interval` until the reporter stops
    pub fn spawn_ticker(&self) -> JoinHandle<()> {
        let tx = self.tx.clone();
        let interval = self.poll_interval;
        thread::spawn(move || loop {
            thread::sleep(interval);
            if tx.send(Event::Poll).is_err() {
                break;
            }
        })
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ReporterConfig {
    pub motion: MotionOptions,
    pub recording: RecordingOptions,
    pub transmission: TransmissionOptions,
}

/// Snapshot for display
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Status {
    pub running: bool,
    pub no_gps_since: Option<i64>,
    pub last_fix: Option<Fix>,
    pub resting: bool,
    pub millis_since_transition: Option<i64>,
    pub meters_travelled_since_stop: f64,
    pub outbox_len: usize,
    pub failing_since: Option<i64>,
    pub last_sent: Option<i64>,
}

/// What handling one event changed
#[derive(Default)]
struct Outcome {
    recorded: Vec<Point>,
    outbox_changed: bool,
}

impl Outcome {
    fn promoted(&mut self, promotion: Promotion) {
        self.recorded.push(promotion.point);
        self.outbox_changed = true;
    }
}

pub struct Reporter<T: MessageTransport, C: WallClock> {
    config: ReporterConfig,
    transport: T,
    clock: C,
    store: Box<dyn OutboxStore>,
    on_recorded: Option<Box<dyn FnMut(&Point)>>,
    running: Option<Pipeline>,
}

impl<T: MessageTransport, C: WallClock> Reporter<T, C> {
    pub fn new(config: ReporterConfig, transport: T, clock: C) -> Self {
        Self {
            config,
            transport,
            clock,
            store: Box::new(MemoryStore::new()),
            on_recorded: None,
            running: None,
        }
    }

    pub fn with_store(mut self, store: Box<dyn OutboxStore>) -> Self {
        self.store = store;
        self
    }

    /// Calls `observer` with every point moved into the outbox
    pub fn on_recorded<F: FnMut(&Point) + 'static>(mut self, observer: F) -> Self {
        self.on_recorded = Some(Box::new(observer));
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// Starts the pipeline; the returned sender is the fix source's handle
    pub fn start(&mut self) -> EventSender {
        if let Some(pipeline) = &self.running {
            return pipeline.sender();
        }

        let mut pipeline = Pipeline::new(&self.config, self.transport.channel_count(), self.clock.now_millis());
        match self.store.load() {
            Ok(points) => {
                for point in points {
                    pipeline.outbox.insert(point);
                }
            }
            Err(e) => warn!(error = %e, "failed on load the outbox, starting empty"),
        }
        info!(
            channels = self.transport.channel_count(),
            queued = pipeline.outbox.len(),
            "reporter started"
        );

        let sender = pipeline.sender();
        self.running = Some(pipeline);
        sender
    }

    /// Handle to the running pipeline
    pub fn sender(&self) -> Result<EventSender, ReportError> {
        self.running
            .as_ref()
            .map(|p| p.sender())
            .ok_or(ReportError::NotRunning)
    }

    /// Drops the queue: pushes and pending polls fail from now on, and
    /// in-flight sends complete into nothing
    pub fn stop(&mut self) {
        if let Some(pipeline) = self.running.take() {
            info!(queued = pipeline.outbox.len(), "reporter stopped");
        }
    }

    /// Handles every queued event; returns how many there were
    pub fn run_pending(&mut self) -> usize {
        let mut handled = 0;
        loop {
            let event = match &self.running {
                Some(pipeline) => match pipeline.queue.try_recv() {
                    Ok(event) => event,
                    Err(_) => break,
                },
                None => break,
            };
            self.handle(event);
            handled += 1;
        }
        handled
    }

    fn handle(&mut self, event: Event) {
        let wall = self.clock.now_millis();
        let pipeline = match self.running.as_mut() {
            Some(p) => p,
            None => return,
        };

        let outcome = pipeline.handle(event, wall, &mut self.transport);

        if outcome.outbox_changed {
            if let Err(e) = self.store.save(&pipeline.outbox.points()) {
                warn!(error = %e, "failed on save the outbox");
            }
        }
        if let Some(observer) = self.on_recorded.as_mut() {
            for point in &outcome.recorded {
                observer(point);
            }
        }
    }

    pub fn status(&self) -> Status {
        match &self.running {
            Some(pipeline) => pipeline.status(self.clock.now_millis()),
            None => Status::default(),
        }
    }

    /// Points still waiting for delivery, oldest first
    pub fn queued(&self) -> Vec<Point> {
        match &self.running {
            Some(pipeline) => pipeline.outbox.points(),
            None => vec![],
        }
    }
}

/// All state that lives between `start` and `stop`
struct Pipeline {
    events: Sender<Event>,
    queue: Receiver<Event>,
    poll_interval: Duration,
    recording: RecordingOptions,
    clock: ClockOffset,
    classifier: MotionClassifier,
    recorder: Recorder,
    outbox: Outbox,
    transmitter: Transmitter,
    /// Latest non-provisional point
    latest: Option<Point>,
    last_fix: Option<Fix>,
    no_gps_since: Option<i64>,
    last_outage_report: Option<i64>,
    distance_anchor: Option<Fix>,
    meters_since_stop: f64,
}

impl Pipeline {
    fn new(config: &ReporterConfig, channels: usize, wall: i64) -> Self {
        let (events, queue) = channel();
        let transmission = config.transmission.sanitized();
        Self {
            transmitter: Transmitter::new(&transmission, channels, events.clone()),
            events,
            queue,
            poll_interval: Duration::from_millis(transmission.poll_interval.unsigned_abs()),
            recording: config.recording.sanitized(),
            clock: ClockOffset::new(),
            classifier: MotionClassifier::new(&config.motion),
            recorder: Recorder::new(&config.recording),
            outbox: Outbox::new(transmission.outbox_capacity),
            latest: None,
            last_fix: None,
            no_gps_since: Some(wall),
            last_outage_report: None,
            distance_anchor: None,
            meters_since_stop: 0.0,
        }
    }

    fn sender(&self) -> EventSender {
        EventSender {
            tx: self.events.clone(),
            poll_interval: self.poll_interval,
        }
    }

    fn handle(&mut self, event: Event, wall: i64, transport: &mut dyn MessageTransport) -> Outcome {
        let mut outcome = Outcome::default();
        match event {
            Event::Fix(FixEvent::Fix(fix)) => {
                self.clock.observe(fix.time, wall);
                let now = self.clock.device_time(wall);
                let classified = self.classifier.on_fix(&fix);
                self.on_point(&classified, now);
                if !classified.provisional {
                    self.check_record(now, transport, &mut outcome);
                }
            }
            Event::Fix(FixEvent::SignalLost) => {
                let now = self.clock.device_time(wall);
                self.classifier.classify(&FixEvent::SignalLost);
                if self.no_gps_since.is_none() {
                    self.no_gps_since = Some(self.last_fix.map(|f| f.time).unwrap_or(now));
                    info!("gps signal lost");
                }
            }
            Event::Poll => {
                let now = self.clock.device_time(wall);
                self.check_record(now, transport, &mut outcome);
                self.transmitter.check(now, &self.outbox, transport);
            }
            Event::Delivery(report) => {
                let now = self.clock.device_time(wall);
                let removed = self.transmitter.on_report(&report, now, &mut self.outbox, transport);
                outcome.outbox_changed = !removed.is_empty();
            }
            Event::PointRequest => {
                let now = self.clock.device_time(wall);
                self.on_request(now, transport, &mut outcome);
            }
        }
        outcome
    }

    fn on_point(&mut self, classified: &ClassifiedPoint, now: i64) {
        let point = &classified.point;
        if self.no_gps_since.take().is_some() {
            info!("gps signal acquired");
        }
        self.last_fix = Some(point.fix);

        // Travel since the last stop, counting only moves clearly larger
        // than the position uncertainty.
        match point.kind {
            PointType::Go | PointType::Moving => match self.distance_anchor {
                None => {
                    self.distance_anchor = Some(point.fix);
                    self.meters_since_stop = 0.0;
                }
                Some(anchor) => {
                    let d = anchor.distance_to(&point.fix);
                    if d > 2.0 * point.fix.accuracy && d > MIN_TRAVEL_STEP {
                        self.meters_since_stop += d;
                        self.distance_anchor = Some(point.fix);
                    }
                }
            },
            PointType::Resting | PointType::Stop => self.distance_anchor = None,
        }

        self.recorder.observe(classified, now);
        if !classified.provisional {
            self.latest = Some(*point);
        }
    }

    fn check_record(&mut self, now: i64, transport: &mut dyn MessageTransport, outcome: &mut Outcome) {
        if self.no_gps_since.is_some() && self.recorder.is_due(now) {
            let quiet = match self.last_outage_report {
                Some(last) => now >= last + self.recording.interval,
                None => true,
            };
            if quiet {
                self.report_outage(now, transport);
            }
        }

        if let Some(promotion) = self.recorder.check(now, &mut self.outbox) {
            outcome.promoted(promotion);
            self.transmitter.check(now, &self.outbox, transport);
        }
    }

    fn on_request(&mut self, now: i64, transport: &mut dyn MessageTransport, outcome: &mut Outcome) {
        if self.no_gps_since.is_some() {
            self.report_outage(now, transport);
            return;
        }
        match self.recorder.record_requested(&mut self.outbox) {
            Some(promotion) => {
                outcome.promoted(promotion);
                self.transmitter.reset_attempts();
                self.transmitter.check(now, &self.outbox, transport);
            }
            None => debug!("no point available for the request"),
        }
    }

    fn report_outage(&mut self, now: i64, transport: &mut dyn MessageTransport) {
        match format_utc_seconds(now) {
            Ok(stamp) => {
                info!(since = ?self.no_gps_since, "reporting gps outage");
                self.transmitter.broadcast(&format!("fleet gpsoutage {}", stamp), transport);
                self.last_outage_report = Some(now);
            }
            Err(e) => warn!(error = %e, "failed on format the outage report"),
        }
    }

    fn status(&self, wall: i64) -> Status {
        let now = self.clock.device_time(wall);
        Status {
            running: true,
            no_gps_since: self.no_gps_since,
            last_fix: self.last_fix,
            resting: self.latest.map(|p| p.is_resting()).unwrap_or(false),
            millis_since_transition: self.latest.map(|p| now - p.last_transition),
            meters_travelled_since_stop: self.meters_since_stop,
            outbox_len: self.outbox.len(),
            failing_since: self.transmitter.failing_since(),
            last_sent: self.transmitter.last_sent(),
        }
    }
}
