//! Shared types and error enum for airboard-core.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// All errors produced by airboard-core.
#[derive(Debug, Error)]
pub enum AirboardError {
    #[error("invalid coordinate: {0}")]
    InvalidCoordinate(String),
    #[error("fallback airport {0} is not in the directory")]
    UnknownFallbackAirport(String),
    #[error("duplicate airport code in directory: {0}")]
    DuplicateAirport(String),
    #[error("directory error: {0}")]
    Directory(String),
    #[error("config error: {0}")]
    Config(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, AirboardError>;

// ---------------------------------------------------------------------------
// Coordinates
// ---------------------------------------------------------------------------

/// A validated WGS-84 position in decimal degrees.
///
/// Construction rejects NaN, infinities and out-of-range values so that a
/// malformed fix can never reach the resolver as `(0.0, 0.0)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Coordinate {
    latitude: f64,
    longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Result<Self> {
        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
            return Err(AirboardError::InvalidCoordinate(format!(
                "latitude {latitude} out of range"
            )));
        }
        if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
            return Err(AirboardError::InvalidCoordinate(format!(
                "longitude {longitude} out of range"
            )));
        }
        Ok(Coordinate {
            latitude,
            longitude,
        })
    }

    /// Parse a coordinate from textual latitude/longitude fields.
    pub fn parse(latitude: &str, longitude: &str) -> Result<Self> {
        let lat = parse_degrees(latitude)?;
        let lon = parse_degrees(longitude)?;
        Coordinate::new(lat, lon)
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }
}

/// Parse a decimal-degree field. Empty or non-numeric text is an error.
pub fn parse_degrees(text: &str) -> Result<f64> {
    let trimmed = text.trim();
    trimmed
        .parse::<f64>()
        .map_err(|_| AirboardError::InvalidCoordinate(format!("not a number: {text:?}")))
}

// ---------------------------------------------------------------------------
// Airports
// ---------------------------------------------------------------------------

/// A directory entry. `code` is the IATA code and the unique key.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AirportRecord {
    pub code: String,
    pub title: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl AirportRecord {
    pub fn new(code: &str, title: &str, latitude: f64, longitude: f64) -> Result<Self> {
        let position = Coordinate::new(latitude, longitude)?;
        let code = code.trim().to_ascii_uppercase();
        if code.is_empty() {
            return Err(AirboardError::Directory(format!(
                "airport {title:?} has an empty code"
            )));
        }
        Ok(AirportRecord {
            code,
            title: title.to_string(),
            latitude: position.latitude(),
            longitude: position.longitude(),
        })
    }

    pub fn position(&self) -> Coordinate {
        Coordinate {
            latitude: self.latitude,
            longitude: self.longitude,
        }
    }
}

/// Latitude/longitude as they appear in directory files: either JSON numbers
/// or numeric strings.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Degrees {
    Number(f64),
    Text(String),
}

impl Degrees {
    pub fn value(&self) -> Result<f64> {
        match self {
            Degrees::Number(v) => Ok(*v),
            Degrees::Text(s) => parse_degrees(s),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coordinate_valid() {
        let c = Coordinate::new(38.78, -9.14).unwrap();
        assert_eq!(c.latitude(), 38.78);
        assert_eq!(c.longitude(), -9.14);
    }

    #[test]
    fn test_coordinate_rejects_nan() {
        assert!(Coordinate::new(f64::NAN, 0.0).is_err());
        assert!(Coordinate::new(0.0, f64::INFINITY).is_err());
    }

    #[test]
    fn test_coordinate_rejects_out_of_range() {
        assert!(Coordinate::new(90.5, 0.0).is_err());
        assert!(Coordinate::new(0.0, -180.1).is_err());
    }

    #[test]
    fn test_coordinate_parse_does_not_coerce() {
        assert!(Coordinate::parse("", "-9.14").is_err());
        assert!(Coordinate::parse("abc", "-9.14").is_err());
        let c = Coordinate::parse(" 38.78 ", "-9.14").unwrap();
        assert_eq!(c.latitude(), 38.78);
    }

    #[test]
    fn test_airport_record_normalizes_code() {
        let apt = AirportRecord::new(" lis ", "Lisbon", 38.77, -9.13).unwrap();
        assert_eq!(apt.code, "LIS");
        assert!(AirportRecord::new("", "Nowhere", 0.0, 0.0).is_err());
    }

    #[test]
    fn test_degrees_from_json() {
        let n: Degrees = serde_json::from_str("38.77").unwrap();
        let s: Degrees = serde_json::from_str("\"-9.13\"").unwrap();
        let bad: Degrees = serde_json::from_str("\"north\"").unwrap();
        assert_eq!(n.value().unwrap(), 38.77);
        assert_eq!(s.value().unwrap(), -9.13);
        assert!(bad.value().is_err());
    }
}
