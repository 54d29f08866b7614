// src/bus/stdout.rs
//! JSON-lines bus attachment on standard output

use std::io::{self, Write};

use chrono::Utc;
use log::warn;
use serde_json::{json, Value};

use super::BusPublisher;

/// Writes one JSON frame per event to stdout, where the host's bus client
/// picks them up. Diagnostics stay on the log facade so the data channel
/// carries nothing but frames.
pub struct StdoutBus;

impl StdoutBus {
    pub fn new() -> Self {
        Self
    }

    fn frame(topic: &str, payload: Value) -> Value {
        json!({
            "topic": topic,
            "timestamp": Utc::now().to_rfc3339(),
            "payload": payload,
        })
    }
}

impl Default for StdoutBus {
    fn default() -> Self {
        Self::new()
    }
}

impl BusPublisher for StdoutBus {
    fn publish(&self, topic: &str, payload: Value) {
        let frame = Self::frame(topic, payload);
        let mut stdout = io::stdout().lock();
        if writeln!(stdout, "{}", frame).is_err() {
            warn!("Bus frame dropped: stdout closed");
        }
    }
}
