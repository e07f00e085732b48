//! fleetreport - motion-aware position reporting over store-and-forward channels

pub mod config;
pub mod error;
pub mod export;
pub mod motion;
pub mod reporter;
pub mod sources;
pub mod wire;

pub use config::{MotionOptions, RecordingOptions, TransmissionOptions};
pub use error::ReportError;
pub use export::GpxGenerator;
pub use motion::{ClassifiedPoint, Fix, FixEvent, MotionClassifier, Point, PointType};
pub use reporter::{
    ClockOffset, DeliveryReceipt, DeliveryReport, EventSender, ManualClock, MemoryStore,
    MessageTransport, Outbox, OutboxStore, Reporter, ReporterConfig, Status, StdoutTransport,
    SystemClock, WallClock, YamlFileStore,
};
pub use sources::{FieldsConfiguration, FixSource};
pub use wire::Timeline;
