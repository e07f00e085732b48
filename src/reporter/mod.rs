//! Store-and-forward reporting pipeline

pub mod clock;
pub mod outbox;
pub mod recorder;
pub mod service;
pub mod transmitter;
pub mod transport;


pub use clock::{ClockOffset, ManualClock, SystemClock, WallClock};
pub use outbox::{MemoryStore, Outbox, OutboxStore, YamlFileStore};
pub use recorder::{Promotion, Recorder};
pub use service::{Event, EventSender, Reporter, ReporterConfig, Status};
pub use transmitter::Transmitter;
pub use transport::{DeliveryReceipt, DeliveryReport, MessageTransport, StdoutTransport};
