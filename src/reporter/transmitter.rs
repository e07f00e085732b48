//! Batches the outbox onto the transport, with retry and channel failover
//!
//! Points leave the outbox only on a confirmed delivery (or by eviction),
//! so a message may be delivered more than once; the receiver resolves
//! duplicates by timestamp key.

use std::sync::mpsc::Sender;

use tracing::{debug, info, warn};

use super::outbox::Outbox;
use super::service::Event;
use super::transport::{DeliveryReceipt, DeliveryReport, MessageTransport};
use crate::config::TransmissionOptions;
use crate::wire;

pub struct Transmitter {
    options: TransmissionOptions,
    channels: usize,
    last_failure: Vec<Option<i64>>,
    next_attempt: Vec<i64>,
    current: usize,
    failing_since: Option<i64>,
    last_sent: Option<i64>,
    events: Sender<Event>,
}

impl Transmitter {
    pub fn new(options: &TransmissionOptions, channels: usize, events: Sender<Event>) -> Self {
        let channels = channels.max(1);
        Self {
            options: options.sanitized(),
            channels,
            last_failure: vec![None; channels],
            next_attempt: vec![0; channels],
            current: 0,
            failing_since: None,
            last_sent: None,
            events,
        }
    }

    pub fn current_channel(&self) -> usize {
        self.current
    }

    pub fn next_attempt(&self, channel: usize) -> Option<i64> {
        self.next_attempt.get(channel).copied()
    }

    /// Device time of the first failure since the last delivery
    pub fn failing_since(&self) -> Option<i64> {
        self.failing_since
    }

    pub fn last_sent(&self) -> Option<i64> {
        self.last_sent
    }

    /// Sends a batch if there is anything queued and the current channel
    /// is due; returns whether a send was started
    pub fn check(&mut self, now: i64, outbox: &Outbox, transport: &mut dyn MessageTransport) -> bool {
        if outbox.is_empty() || now < self.next_attempt[self.current] {
            return false;
        }
        // Hold every channel back while this send is in flight.
        let retry_at = now + self.options.retry_interval;
        self.next_attempt.iter_mut().for_each(|t| *t = retry_at);

        self.transmit(self.current, outbox, transport)
    }

    /// Makes every channel due at once, as for an on-demand report
    pub fn reset_attempts(&mut self) {
        self.next_attempt.iter_mut().for_each(|t| *t = 0);
    }

    fn transmit(&mut self, channel: usize, outbox: &Outbox, transport: &mut dyn MessageTransport) -> bool {
        let destination = match &self.options.destination {
            Some(d) => d.clone(),
            None => {
                debug!("no destination configured, not sending");
                return false;
            }
        };

        let batch = outbox.oldest(self.options.points_per_message);
        let body = match wire::encode_batch(batch.iter().map(|(_, p)| p)) {
            Ok(body) => body,
            Err(e) => {
                warn!(error = %e, "failed on encode the batch");
                return false;
            }
        };
        let keys: Vec<i64> = batch.iter().map(|(k, _)| *k).collect();
        info!(channel, queued = outbox.len(), ?keys, "transmitting");

        let receipt = DeliveryReceipt::new(channel, keys, self.events.clone());
        transport.send(channel, &destination, &body, Some(receipt));

        // Next time try another channel; a delivery brings it back to 0.
        self.current = (channel + 1) % self.channels;

        true
    }

    /// Applies a delivery outcome; returns the keys removed from the outbox
    pub fn on_report(
        &mut self,
        report: &DeliveryReport,
        now: i64,
        outbox: &mut Outbox,
        transport: &mut dyn MessageTransport,
    ) -> Vec<i64> {
        let channel = report.channel % self.channels;

        if report.delivered {
            let removed: Vec<i64> = report
                .keys
                .iter()
                .filter(|k| outbox.remove(**k).is_some())
                .copied()
                .collect();
            info!(channel, keys = ?report.keys, removed = removed.len(), "delivered");
            self.last_sent = Some(now);
            self.failing_since = None;
            self.current = 0;
            return removed;
        }

        if self.failing_since.is_none() {
            self.failing_since = Some(now);
        }
        warn!(channel, "failed on send");
        self.last_failure[channel] = Some(now);

        let next = (channel + 1) % self.channels;
        self.current = next;
        let recently_failed = match self.last_failure[next] {
            Some(failed) => now - failed <= self.options.retry_interval,
            None => false,
        };
        if recently_failed {
            info!(channel = next, "retrying eventually");
        } else {
            info!(channel = next, "retrying immediately");
            self.next_attempt[next] = now;
            self.check(now, outbox, transport);
        }

        vec![]
    }

    /// Sends an untracked message on every channel
    pub fn broadcast(&mut self, body: &str, transport: &mut dyn MessageTransport) {
        let destination = match &self.options.destination {
            Some(d) => d.clone(),
            None => return,
        };
        for channel in 0..self.channels {
            transport.send(channel, &destination, body, None);
        }
    }
}
