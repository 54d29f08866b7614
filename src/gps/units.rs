// src/gps/units.rs
//! Pure unit conversions for raw NMEA tokens

use std::fmt;

/// Fallback value the decoder substitutes when a conversion fails, so a bad
/// token never aborts a merge.
pub const SENTINEL: f64 = -1.0;

const KMH_PER_KNOT: f64 = 1.852;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConvertError {
    Empty,
    MissingDecimalPoint,
    NotNumeric(String),
    UnknownHemisphere(String),
}

impl fmt::Display for ConvertError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConvertError::Empty => write!(f, "empty token"),
            ConvertError::MissingDecimalPoint => write!(f, "token has no decimal point"),
            ConvertError::NotNumeric(token) => write!(f, "token '{}' is not numeric", token),
            ConvertError::UnknownHemisphere(token) => {
                write!(f, "unknown hemisphere token '{}'", token)
            }
        }
    }
}

impl std::error::Error for ConvertError {}

/// Convert a sexagesimal NMEA coordinate token (`DDMM.MMMM` for latitude,
/// `DDDMM.MMMM` for longitude) plus hemisphere into signed decimal degrees.
///
/// Degrees are all characters up to 2 positions before the decimal point;
/// the remainder, decimal point included, is minutes. The result is negated
/// for the `S` and `W` hemispheres.
pub fn degrees_to_decimal(token: &str, hemisphere: &str) -> Result<f64, ConvertError> {
    if token.is_empty() {
        return Err(ConvertError::Empty);
    }
    if !token.is_ascii() {
        return Err(ConvertError::NotNumeric(token.to_string()));
    }

    let point = token.find('.').ok_or(ConvertError::MissingDecimalPoint)?;
    if point < 2 {
        return Err(ConvertError::NotNumeric(token.to_string()));
    }

    let degrees: f64 = token[..point - 2]
        .parse()
        .map_err(|_| ConvertError::NotNumeric(token.to_string()))?;
    let minutes: f64 = token[point - 2..]
        .parse()
        .map_err(|_| ConvertError::NotNumeric(token.to_string()))?;
    let decimal = degrees + minutes / 60.0;

    // Value equality on the hemisphere token, never identity
    match hemisphere {
        "N" | "E" => Ok(decimal),
        "S" | "W" => Ok(-decimal),
        other => Err(ConvertError::UnknownHemisphere(other.to_string())),
    }
}

/// Convert a speed-over-ground token in knots to km/h.
pub fn knots_to_kmh(token: &str) -> Result<f64, ConvertError> {
    if token.is_empty() {
        return Err(ConvertError::Empty);
    }
    token
        .parse::<f64>()
        .map(|knots| knots * KMH_PER_KNOT)
        .map_err(|_| ConvertError::NotNumeric(token.to_string()))
}
