//! Library error type

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("timestamp {0} ms is outside the encodable range")]
    TimestampRange(i64),

    #[error("failed on format the timestamp: {0}")]
    TimeFormat(#[from] time::error::Format),

    #[error("malformed wire line `{line}`: {reason}")]
    MalformedLine { line: String, reason: String },

    #[error("outbox store I/O: {0}")]
    StoreIo(#[from] std::io::Error),

    #[error("outbox store encoding: {0}")]
    StoreYaml(#[from] serde_yaml::Error),

    #[error("reporter is not running")]
    NotRunning,
}

impl ReportError {
    pub(crate) fn malformed(line: &str, reason: impl Into<String>) -> Self {
        ReportError::MalformedLine {
            line: line.to_string(),
            reason: reason.into(),
        }
    }
}
