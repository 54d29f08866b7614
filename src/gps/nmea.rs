// src/gps/nmea.rs
//! NMEA sentence decoding

use log::debug;

use super::data::FixRecord;
use super::units::{self, SENTINEL};
use crate::error::{GpsError, Result};

/// Fix-bearing sentence types recognized by the decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SentenceKind {
    /// `$GPRMC` — recommended minimum: position, speed, course, date,
    /// magnetic variation
    Rmc,
    /// `$GPGGA` — fix data: position, fix quality, satellite count, altitude
    Gga,
}

const GPRMC_FIELDS: usize = 12;
const GPGGA_FIELDS: usize = 10;

/// Decode a single NMEA line and merge its fields into `record`.
///
/// Returns the matched sentence kind, or `Ok(None)` for lines that are not
/// one of the two fix-bearing talkers. A recognized sentence with too few
/// fields fails with `MalformedSentence` and leaves `record` untouched.
///
/// Dispatch is by substring containment, not strict prefix, so leading noise
/// bytes on a freshly opened port do not hide a sentence. No checksum
/// verification is performed.
pub fn apply_sentence(record: &mut FixRecord, line: &str) -> Result<Option<SentenceKind>> {
    if line.contains("$GPRMC") {
        apply_gprmc(record, line).map(Some)
    } else if line.contains("$GPGGA") {
        apply_gpgga(record, line).map(Some)
    } else {
        Ok(None)
    }
}

fn apply_gprmc(record: &mut FixRecord, line: &str) -> Result<SentenceKind> {
    let parts: Vec<&str> = line.split(',').collect();
    if parts.len() < GPRMC_FIELDS {
        return Err(GpsError::MalformedSentence {
            sentence: "GPRMC",
            expected: GPRMC_FIELDS,
            found: parts.len(),
        });
    }

    record.fix_time = Some(parts[1].to_string());
    record.validity = Some(parts[2].to_string());
    record.latitude = Some(parts[3].to_string());
    record.latitude_hemisphere = Some(parts[4].to_string());
    record.longitude = Some(parts[5].to_string());
    record.longitude_hemisphere = Some(parts[6].to_string());
    record.speed_knots = Some(parts[7].to_string());
    record.true_course = Some(parts[8].to_string());
    record.fix_date = Some(parts[9].to_string());
    record.variation = Some(parts[10].to_string());
    record.variation_e_w = Some(parts[11].to_string());

    record.latitude_decimal = Some(convert_coordinate(parts[3], parts[4]));
    record.longitude_decimal = Some(convert_coordinate(parts[5], parts[6]));
    record.speed_kmh = Some(convert_speed(parts[7]));

    Ok(SentenceKind::Rmc)
}

fn apply_gpgga(record: &mut FixRecord, line: &str) -> Result<SentenceKind> {
    let parts: Vec<&str> = line.split(',').collect();
    if parts.len() < GPGGA_FIELDS {
        return Err(GpsError::MalformedSentence {
            sentence: "GPGGA",
            expected: GPGGA_FIELDS,
            found: parts.len(),
        });
    }

    record.fix_time = Some(parts[1].to_string());
    record.latitude = Some(parts[2].to_string());
    record.latitude_hemisphere = Some(parts[3].to_string());
    record.longitude = Some(parts[4].to_string());
    record.longitude_hemisphere = Some(parts[5].to_string());
    record.fix_quality = Some(parts[6].to_string());
    record.satellites = Some(parts[7].to_string());
    record.accuracy_m = Some(parts[8].to_string());
    record.altitude_m = Some(parts[9].to_string());

    record.latitude_decimal = Some(convert_coordinate(parts[2], parts[3]));
    record.longitude_decimal = Some(convert_coordinate(parts[4], parts[5]));

    Ok(SentenceKind::Gga)
}

/// Conversion failures degrade to the sentinel so one bad token never drops
/// the whole sentence.
fn convert_coordinate(token: &str, hemisphere: &str) -> f64 {
    match units::degrees_to_decimal(token, hemisphere) {
        Ok(decimal) => decimal,
        Err(e) => {
            debug!("coordinate conversion failed for '{},{}': {}", token, hemisphere, e);
            SENTINEL
        }
    }
}

fn convert_speed(token: &str) -> f64 {
    match units::knots_to_kmh(token) {
        Ok(kmh) => kmh,
        Err(e) => {
            debug!("speed conversion failed for '{}': {}", token, e);
            SENTINEL
        }
    }
}
