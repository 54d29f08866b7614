// src/bus/mod.rs
//! Message bus publication

pub mod stdout;

use std::sync::Arc;

use log::warn;
use serde_json::{json, Value};

use crate::gps::data::FixRecord;

pub const TOPIC_ERROR: &str = "info.gps.status.error";
pub const TOPIC_CONNECTED: &str = "info.gps.status.connected";
pub const TOPIC_DISCONNECTED: &str = "info.gps.status.disconnected";
pub const TOPIC_DATA: &str = "info.gps.data";

/// Publish seam to the external message bus.
///
/// Fire-and-forget: transport failures are the transport's concern, the
/// caller never waits on or retries a publish.
pub trait BusPublisher: Send + Sync {
    fn publish(&self, topic: &str, payload: Value);
}

/// Maps connection loop and decoder outcomes onto bus topics.
#[derive(Clone)]
pub struct EventEmitter {
    bus: Arc<dyn BusPublisher>,
}

impl EventEmitter {
    pub fn new(bus: Arc<dyn BusPublisher>) -> Self {
        Self { bus }
    }

    pub fn error(&self, message: &str) {
        self.bus.publish(TOPIC_ERROR, json!({ "error": message }));
    }

    pub fn connected(&self, device: &str) {
        self.bus.publish(TOPIC_CONNECTED, json!({ "device": device }));
    }

    pub fn disconnected(&self, device: &str) {
        self.bus.publish(TOPIC_DISCONNECTED, json!({ "device": device }));
    }

    pub fn data(&self, record: &FixRecord) {
        match serde_json::to_value(record) {
            Ok(payload) => self.bus.publish(TOPIC_DATA, payload),
            Err(e) => warn!("Failed to serialize fix record: {}", e),
        }
    }
}
