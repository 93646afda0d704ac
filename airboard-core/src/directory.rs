//! Airport directory: the ordered, read-only list the resolver scans.
//!
//! Order matters. The resolver breaks distance ties by directory position,
//! so the directory preserves insertion order and never re-sorts.

use std::collections::HashSet;
use std::path::Path;

use serde::Deserialize;

use crate::types::{AirboardError, AirportRecord, Degrees, Result};

/// Built-in airports (used when no directory file is configured).
const BUILTIN_AIRPORTS: &[(&str, &str, f64, f64)] = &[
    ("LIS", "Lisbon Humberto Delgado", 38.7742, -9.1342),
    ("OPO", "Porto Francisco Sa Carneiro", 41.2481, -8.6814),
    ("FAO", "Faro", 37.0144, -7.9659),
    ("MAD", "Madrid-Barajas Adolfo Suarez", 40.4719, -3.5626),
    ("BCN", "Barcelona-El Prat", 41.2971, 2.0785),
    ("LHR", "London Heathrow", 51.4700, -0.4543),
    ("CDG", "Paris Charles de Gaulle", 49.0097, 2.5479),
    ("FRA", "Frankfurt am Main", 50.0379, 8.5622),
    ("AMS", "Amsterdam Schiphol", 52.3105, 4.7683),
    ("GRU", "Sao Paulo Guarulhos", -23.4356, -46.4731),
    ("CGH", "Sao Paulo Congonhas", -23.6261, -46.6564),
    ("GIG", "Rio de Janeiro Galeao", -22.8090, -43.2506),
    ("SDU", "Rio de Janeiro Santos Dumont", -22.9105, -43.1631),
    ("JFK", "New York John F. Kennedy", 40.6413, -73.7781),
    ("ATL", "Atlanta Hartsfield-Jackson", 33.6407, -84.4277),
    ("CLT", "Charlotte Douglas", 35.2140, -80.9431),
];

/// Raw directory entry as stored in JSON files.
#[derive(Debug, Deserialize)]
struct AirportEntry {
    code: String,
    title: String,
    latitude: Degrees,
    longitude: Degrees,
}

/// Immutable, ordered airport list keyed by IATA code.
#[derive(Debug, Clone)]
pub struct AirportDirectory {
    airports: Vec<AirportRecord>,
}

impl AirportDirectory {
    /// Build a directory, rejecting duplicate codes.
    pub fn new(airports: Vec<AirportRecord>) -> Result<Self> {
        let mut seen = HashSet::new();
        for apt in &airports {
            if !seen.insert(apt.code.as_str()) {
                return Err(AirboardError::DuplicateAirport(apt.code.clone()));
            }
        }
        Ok(AirportDirectory { airports })
    }

    /// The built-in table.
    pub fn builtin() -> Self {
        let airports = BUILTIN_AIRPORTS
            .iter()
            .map(|&(code, title, latitude, longitude)| AirportRecord {
                code: code.to_string(),
                title: title.to_string(),
                latitude,
                longitude,
            })
            .collect();
        AirportDirectory { airports }
    }

    /// Parse a JSON array of `{code, title, latitude, longitude}` objects.
    ///
    /// Coordinates may be numbers or numeric strings. Anything else fails the
    /// whole load.
    pub fn from_json(text: &str) -> Result<Self> {
        let entries: Vec<AirportEntry> =
            serde_json::from_str(text).map_err(|e| AirboardError::Directory(e.to_string()))?;

        let mut airports = Vec::with_capacity(entries.len());
        for entry in entries {
            let latitude = entry.latitude.value().map_err(|e| {
                AirboardError::Directory(format!("{}: {e}", entry.code))
            })?;
            let longitude = entry.longitude.value().map_err(|e| {
                AirboardError::Directory(format!("{}: {e}", entry.code))
            })?;
            airports.push(AirportRecord::new(
                &entry.code,
                &entry.title,
                latitude,
                longitude,
            )?);
        }

        let directory = Self::new(airports)?;
        tracing::debug!(count = directory.len(), "Loaded airport directory");
        Ok(directory)
    }

    /// Load a directory from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Look up an airport by IATA code, case-insensitive.
    pub fn get(&self, code: &str) -> Option<&AirportRecord> {
        let code = code.trim();
        self.airports
            .iter()
            .find(|apt| apt.code.eq_ignore_ascii_case(code))
    }

    pub fn airports(&self) -> &[AirportRecord] {
        &self.airports
    }

    pub fn iter(&self) -> impl Iterator<Item = &AirportRecord> {
        self.airports.iter()
    }

    pub fn len(&self) -> usize {
        self.airports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.airports.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_contains_lis_and_gru() {
        let dir = AirportDirectory::builtin();
        assert!(dir.get("LIS").is_some());
        assert!(dir.get("gru").is_some());
        assert_eq!(dir.airports()[0].code, "LIS");
    }

    #[test]
    fn test_builtin_codes_unique() {
        let dir = AirportDirectory::builtin();
        assert!(AirportDirectory::new(dir.airports().to_vec()).is_ok());
    }

    #[test]
    fn test_from_json_mixed_coordinates() {
        let text = r#"[
            {"code": "LIS", "title": "Lisbon", "latitude": 38.77, "longitude": -9.13},
            {"code": "opo", "title": "Porto", "latitude": "41.24", "longitude": "-8.68"}
        ]"#;
        let dir = AirportDirectory::from_json(text).unwrap();
        assert_eq!(dir.len(), 2);
        let opo = dir.get("OPO").unwrap();
        assert_eq!(opo.code, "OPO");
        assert_eq!(opo.latitude, 41.24);
    }

    #[test]
    fn test_from_json_preserves_order() {
        let text = r#"[
            {"code": "OPO", "title": "Porto", "latitude": 41.24, "longitude": -8.68},
            {"code": "LIS", "title": "Lisbon", "latitude": 38.77, "longitude": -9.13}
        ]"#;
        let dir = AirportDirectory::from_json(text).unwrap();
        let codes: Vec<&str> = dir.iter().map(|a| a.code.as_str()).collect();
        assert_eq!(codes, vec!["OPO", "LIS"]);
    }

    #[test]
    fn test_from_json_rejects_bad_coordinate() {
        let text = r#"[{"code": "LIS", "title": "Lisbon", "latitude": "", "longitude": -9.13}]"#;
        assert!(matches!(
            AirportDirectory::from_json(text),
            Err(AirboardError::Directory(_))
        ));
    }

    #[test]
    fn test_rejects_duplicate_codes() {
        let text = r#"[
            {"code": "LIS", "title": "Lisbon", "latitude": 38.77, "longitude": -9.13},
            {"code": "lis", "title": "Lisbon again", "latitude": 38.77, "longitude": -9.13}
        ]"#;
        assert!(matches!(
            AirportDirectory::from_json(text),
            Err(AirboardError::DuplicateAirport(code)) if code == "LIS"
        ));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("airports.json");
        std::fs::write(
            &path,
            r#"[{"code": "GRU", "title": "Guarulhos", "latitude": -23.43, "longitude": -46.47}]"#,
        )
        .unwrap();
        let directory = AirportDirectory::load(&path).unwrap();
        assert_eq!(directory.get("GRU").unwrap().title, "Guarulhos");
    }
}
