//! Outbound message channels
//!
//! A transport offers a fixed number of independent channels (for example
//! one per SIM). Sends are fire-and-forget: the outcome comes back later by
//! completing the receipt handed to `send`.

use std::sync::mpsc::Sender;

use tracing::info;

use super::service::Event;

/// Outcome of one batch send
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeliveryReport {
    pub channel: usize,
    /// Outbox keys carried by the message
    pub keys: Vec<i64>,
    pub delivered: bool,
}

/// Completion handle for a send; consuming it posts the outcome to the
/// reporter's queue
#[derive(Debug)]
pub struct DeliveryReceipt {
    channel: usize,
    keys: Vec<i64>,
    events: Sender<Event>,
}

impl DeliveryReceipt {
    pub(crate) fn new(channel: usize, keys: Vec<i64>, events: Sender<Event>) -> Self {
        Self {
            channel,
            keys,
            events,
        }
    }

    pub fn channel(&self) -> usize {
        self.channel
    }

    pub fn keys(&self) -> &[i64] {
        &self.keys
    }

    /// Returns false when the reporter has stopped in the meantime
    pub fn delivered(self) -> bool {
        self.complete(true)
    }

    pub fn failed(self) -> bool {
        self.complete(false)
    }

    fn complete(self, delivered: bool) -> bool {
        let report = DeliveryReport {
            channel: self.channel,
            keys: self.keys,
            delivered,
        };
        self.events.send(Event::Delivery(report)).is_ok()
    }
}

pub trait MessageTransport {
    /// Number of channels, at least one
    fn channel_count(&self) -> usize;

    /// Starts sending `body` on `channel`; `receipt` is `None` for messages
    /// whose outcome nobody tracks
    fn send(&mut self, channel: usize, destination: &str, body: &str, receipt: Option<DeliveryReceipt>);
}

/// Prints every message and reports it delivered right away
pub struct StdoutTransport {
    channels: usize,
}

impl StdoutTransport {
    pub fn new(channels: usize) -> Self {
        Self {
            channels: channels.max(1),
        }
    }
}

impl MessageTransport for StdoutTransport {
    fn channel_count(&self) -> usize {
        self.channels
    }

    fn send(&mut self, channel: usize, destination: &str, body: &str, receipt: Option<DeliveryReceipt>) {
        info!(channel, destination, "sending {} bytes", body.len());
        println!("[{} -> {}]\n{}", channel, destination, body);
        if let Some(receipt) = receipt {
            receipt.delivered();
        }
    }
}
