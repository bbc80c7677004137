//! Error types for the entire application.
//!
//! We use `thiserror` for library-style errors with custom types,
//! and `anyhow` for application-level error propagation in main.rs and commands.
//!
//! Stack-walk contract violations are not represented here: a source that
//! hands out unknown stack or frame indices is a bug and panics.

use thiserror::Error;

/// Errors raised while configuring a frame filter
#[derive(Error, Debug)]
pub enum FilterError {
    #[error("invalid pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("invalid group spec '{0}': expected 'pattern->name' or 'pattern=>name'")]
    InvalidGroupSpec(String),

    #[error("invalid time range: start {start} is after end {end}")]
    InvalidTimeRange { start: f64, end: f64 },

    #[error("failed to read filter file: {0}")]
    ConfigRead(#[from] std::io::Error),

    #[error("failed to parse filter file: {0}")]
    ConfigParse(#[from] toml::de::Error),
}

/// Errors that can occur while loading collapsed-stack input
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("line {line}: {reason}")]
    InvalidLine { line: usize, reason: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Errors that can occur while writing reports
#[derive(Error, Debug)]
pub enum ReportError {
    #[error("XML emission failed: {0}")]
    XmlFailed(#[from] xml::writer::Error),

    #[error("Failed to write file: {0}")]
    WriteFailed(#[from] std::io::Error),

    #[error("Failed to serialize JSON: {0}")]
    SerializationFailed(#[from] serde_json::Error),

    #[error("Invalid output path: {0}")]
    InvalidPath(String),
}
