// src/error.rs
//! Error types for the GPS bridge

use std::fmt;

pub type Result<T> = std::result::Result<T, GpsError>;

#[derive(Debug)]
pub enum GpsError {
    Io(std::io::Error),
    Serial(tokio_serial::Error),
    Json(serde_json::Error),
    /// Configured device path does not exist; retried after the backoff delay
    DeviceMissing(String),
    Connection(String),
    /// A recognized sentence with too few comma-separated fields; the fix
    /// record is left untouched and the line is skipped
    MalformedSentence {
        sentence: &'static str,
        expected: usize,
        found: usize,
    },
    Other(String),
}

impl fmt::Display for GpsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GpsError::Io(e) => write!(f, "IO error: {}", e),
            GpsError::Serial(e) => write!(f, "Serial error: {}", e),
            GpsError::Json(e) => write!(f, "JSON error: {}", e),
            GpsError::DeviceMissing(device) => write!(f, "Device '{}' does not exist !", device),
            GpsError::Connection(msg) => write!(f, "Connection error: {}", msg),
            GpsError::MalformedSentence {
                sentence,
                expected,
                found,
            } => write!(
                f,
                "Malformed {} sentence: expected {} fields, found {}",
                sentence, expected, found
            ),
            GpsError::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for GpsError {}

impl From<std::io::Error> for GpsError {
    fn from(error: std::io::Error) -> Self {
        GpsError::Io(error)
    }
}

impl From<tokio_serial::Error> for GpsError {
    fn from(error: tokio_serial::Error) -> Self {
        GpsError::Serial(error)
    }
}

impl From<serde_json::Error> for GpsError {
    fn from(error: serde_json::Error) -> Self {
        GpsError::Json(error)
    }
}

impl From<anyhow::Error> for GpsError {
    fn from(error: anyhow::Error) -> Self {
        GpsError::Other(error.to_string())
    }
}
