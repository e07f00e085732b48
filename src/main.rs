//! fleetreport cli - replay recorded fixes through the reporting pipeline

use std::cell::RefCell;
use std::fs::{self, File};
use std::io::BufWriter;
use std::rc::Rc;

use argopt::{cmd_group, subcmd};
use csv::Reader;
use serde::Deserialize;
use time::format_description::well_known;
use time::OffsetDateTime;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use fleetreport::sources::CsvSource;
use fleetreport::{
    FieldsConfiguration, FixEvent, FixSource, GpxGenerator, ManualClock, MotionOptions, Point,
    RecordingOptions, Reporter, ReporterConfig, StdoutTransport, TransmissionOptions, YamlFileStore,
};

/// CLI of fleetreport - Classify GPS fixes and report them in compact messages
#[cmd_group(commands = [replay])]
fn main() -> Result<(), String> {}

/// Replay a CSV file of fixes, printing every outgoing message
#[subcmd]
fn replay(
    /// CSV file source
    csv_path: String,
    /// Start time, RFC3339 format
    start: String,
    /// End time, RFC3339 format
    end: String,
    /// Fields and reporter configuration. Default: .fleetreport.yaml, ~/.fleetreport.yaml
    #[opt(long)]
    config: Option<String>,
    /// GPX path file destination for the recorded points
    #[opt(long)]
    gpx: Option<String>,
    /// YAML file keeping the outbox between runs
    #[opt(long)]
    outbox: Option<String>,
    /// Number of outgoing channels. Default: 1
    #[opt(long)]
    channels: Option<usize>,
) -> Result<(), String> {
    init_logging();

    let start = OffsetDateTime::parse(&start, &well_known::Rfc3339)
        .map_err(|e| format!("Failed on parse the start time: {}", e.to_string()))?;
    let end = OffsetDateTime::parse(&end, &well_known::Rfc3339)
        .map_err(|e| format!("Failed on parse the end time: {}", e.to_string()))?;

    let destination = match gpx {
        Some(path) => Some(
            File::create(path)
                .map_err(|e| format!("Failed on create the destination file: {}", e.to_string()))?,
        ),
        None => None,
    };

    let csv = File::open(csv_path)
        .map_err(|e| format!("Failed on open the CSV file: {}", e.to_string()))?;
    let rcsv = Reader::from_reader(csv);

    let configs = load_configs(config);

    let mut source = CsvSource::new(rcsv, Some(configs.fields.clone()));
    let events = source.fetch(start, end)?;
    info!(events = events.len(), "replaying");

    let mut transmission = configs.transmission.clone();
    if transmission.destination.is_none() {
        transmission.destination = Some("receiver".to_string());
    }
    let reporter_config = ReporterConfig {
        motion: configs.motion.clone(),
        recording: configs.recording.clone(),
        transmission,
    };

    let recorded: Rc<RefCell<Vec<Point>>> = Rc::new(RefCell::new(vec![]));
    let sink = recorded.clone();
    let clock = ManualClock::new((start.unix_timestamp_nanos() / 1_000_000) as i64);

    let transport = StdoutTransport::new(channels.unwrap_or(1));
    let mut reporter = Reporter::new(reporter_config, transport, clock.clone())
        .on_recorded(move |p| sink.borrow_mut().push(*p));
    if let Some(path) = outbox {
        reporter = reporter.with_store(Box::new(YamlFileStore::new(path)));
    }

    let sender = reporter.start();
    for event in events {
        if let FixEvent::Fix(fix) = &event {
            clock.set(fix.time);
        }
        sender.push_fix(event);
        sender.poll();
        reporter.run_pending();
    }

    let status = reporter.status();
    info!(
        recorded = recorded.borrow().len(),
        queued = status.outbox_len,
        resting = status.resting,
        meters = status.meters_travelled_since_stop,
        "replay finished"
    );
    reporter.stop();

    if let Some(destination) = destination {
        let doc = GpxGenerator::new(recorded.borrow().clone())
            .generate()
            .map_err(|e| format!("Failed on generate the GPX: {}", e.to_string()))?;

        let mut writer = BufWriter::new(destination);
        gpx::write(&doc, &mut writer).map_err(|e| e.to_string())?;
    }

    Ok(())
}

/// Log to stderr, filtered by RUST_LOG
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let installed = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
    if let Err(e) = installed {
        // Another subscriber is already global; events still reach it.
        debug!(error = %e, "keeping the installed subscriber");
    }
}

/// Load the current config
fn load_configs(provided: Option<String>) -> Configs {
    let mut options = vec![];

    if let Some(sprovided) = provided {
        options.push(sprovided);
    }

    options.push(".fleetreport.yaml".to_string());

    if let Some(home) = dirs::home_dir() {
        if let Some(shome) = home.to_str() {
            options.push(format!("{}/.fleetreport.yaml", shome));
        }
    }

    let mut yaml: Option<String> = None;
    for fi in options {
        if let Ok(s) = fs::read_to_string(fi) {
            yaml = Some(s);
            break;
        }
    }

    if let Some(s) = yaml {
        match serde_yaml::from_str::<Configs>(&s) {
            Ok(conf) => return conf,
            Err(e) => warn!(error = %e, "failed on parse the config, using defaults"),
        }
    }

    Configs::default()
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default)]
struct Configs {
    pub fields: FieldsConfiguration,
    pub motion: MotionOptions,
    pub recording: RecordingOptions,
    pub transmission: TransmissionOptions,
}

#[test]
fn parse_configs() -> Result<(), String> {
    let yaml = "\nfields:\nmotion:";

    let conf: Configs = serde_yaml::from_str(&yaml).map_err(|e| e.to_string())?;

    assert_eq!(Configs::default(), conf);

    let yaml = "\nfields:\n  time: fix_time\nmotion:\n  resting_radius: 30.0\ntransmission:\n  destination: \"+15550100\"\n  points_per_message: 3";

    let conf: Configs = serde_yaml::from_str(&yaml).map_err(|e| e.to_string())?;

    assert_eq!(
        Configs {
            fields: FieldsConfiguration {
                time: "fix_time".to_string(),
                ..FieldsConfiguration::default()
            },
            motion: MotionOptions {
                resting_radius: 30.0,
                ..MotionOptions::default()
            },
            recording: RecordingOptions::default(),
            transmission: TransmissionOptions {
                destination: Some("+15550100".to_string()),
                points_per_message: 3,
                ..TransmissionOptions::default()
            },
        },
        conf
    );

    Ok(())
}
