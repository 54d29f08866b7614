// src/lib.rs
//! GPS Bridge Library
//!
//! Reads NMEA-0183 sentences from a serial GPS receiver, merges them into a
//! normalized fix record, and republishes the record on a message bus
//! whenever new data arrives.

pub mod bus;
pub mod config;
pub mod error;
pub mod gps;
pub mod monitor;

// Re-export main types for convenience
pub use bus::{BusPublisher, EventEmitter};
pub use config::BridgeConfig;
pub use error::{GpsError, Result};
pub use gps::data::FixRecord;
pub use monitor::{GpsMonitor, Shutdown};
