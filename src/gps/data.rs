// src/gps/data.rs
//! Fix record aggregate

use serde::Serialize;

/// Latest known fix state, merged in place by the sentence decoder.
///
/// Every field starts unset and keeps its previous value until a sentence
/// that owns it is decoded — GPRMC and GPGGA each update their own slots and
/// never clear the other's. Raw NMEA tokens are preserved verbatim next to
/// the derived decimal fields; parsing the timestamp and date tokens into
/// calendar types is left to downstream consumers.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FixRecord {
    pub fix_time: Option<String>,
    pub fix_date: Option<String>,
    pub validity: Option<String>,
    pub latitude: Option<String>,
    pub latitude_hemisphere: Option<String>,
    pub latitude_decimal: Option<f64>,
    pub longitude: Option<String>,
    pub longitude_hemisphere: Option<String>,
    pub longitude_decimal: Option<f64>,
    pub speed_knots: Option<String>,
    pub speed_kmh: Option<f64>,
    pub true_course: Option<String>,
    pub variation: Option<String>,
    pub variation_e_w: Option<String>,
    pub fix_quality: Option<String>,
    pub satellites: Option<String>,
    pub accuracy_m: Option<String>,
    pub altitude_m: Option<String>,
}

impl FixRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if the record holds a position fix
    pub fn has_fix(&self) -> bool {
        self.latitude_decimal.is_some() && self.longitude_decimal.is_some()
    }

    /// GPRMC validity flag: `A` = active fix, `V` = void
    pub fn is_active(&self) -> bool {
        self.validity.as_deref() == Some("A")
    }
}
