//! Departure records as delivered by the schedules feed.
//!
//! Field names follow the upstream payload (`flight_iata`, `dep_time_ts`, ...)
//! so records deserialize straight from the wire. Everything except the
//! structure itself is optional; a record with no scheduled epoch is kept
//! as a value but never survives the recency filter.

use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Serialize};

const PLACEHOLDER: &str = "—";

/// Status string reported by the feed.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "Option<String>", into = "Option<String>")]
pub enum FlightStatus {
    Scheduled,
    Boarding,
    Active,
    EnRoute,
    Delayed,
    Landed,
    Cancelled,
    Incident,
    Diverted,
    Other(String),
    #[default]
    Unknown,
}

impl From<Option<String>> for FlightStatus {
    fn from(value: Option<String>) -> Self {
        let Some(raw) = value else {
            return FlightStatus::Unknown;
        };
        match raw.trim().to_ascii_lowercase().as_str() {
            "" => FlightStatus::Unknown,
            "scheduled" => FlightStatus::Scheduled,
            "boarding" => FlightStatus::Boarding,
            "active" => FlightStatus::Active,
            "en-route" => FlightStatus::EnRoute,
            "delayed" => FlightStatus::Delayed,
            "landed" => FlightStatus::Landed,
            "cancelled" => FlightStatus::Cancelled,
            "incident" => FlightStatus::Incident,
            "diverted" => FlightStatus::Diverted,
            _ => FlightStatus::Other(raw),
        }
    }
}

impl From<FlightStatus> for Option<String> {
    fn from(status: FlightStatus) -> Self {
        let s = match status {
            FlightStatus::Scheduled => "scheduled",
            FlightStatus::Boarding => "boarding",
            FlightStatus::Active => "active",
            FlightStatus::EnRoute => "en-route",
            FlightStatus::Delayed => "delayed",
            FlightStatus::Landed => "landed",
            FlightStatus::Cancelled => "cancelled",
            FlightStatus::Incident => "incident",
            FlightStatus::Diverted => "diverted",
            FlightStatus::Other(raw) => return Some(raw),
            FlightStatus::Unknown => return None,
        };
        Some(s.to_string())
    }
}

impl FlightStatus {
    /// Board label for this status.
    pub fn label(&self) -> String {
        match self {
            FlightStatus::Scheduled => "Scheduled".into(),
            FlightStatus::Boarding => "Boarding".into(),
            FlightStatus::Active => "Active".into(),
            FlightStatus::EnRoute => "En Route".into(),
            FlightStatus::Delayed => "Delayed".into(),
            FlightStatus::Landed => "Arrived".into(),
            FlightStatus::Cancelled => "Cancelled".into(),
            FlightStatus::Incident => "Incident".into(),
            FlightStatus::Diverted => "Diverted".into(),
            FlightStatus::Other(raw) => capitalize(&raw.to_ascii_lowercase()),
            FlightStatus::Unknown => PLACEHOLDER.into(),
        }
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// One scheduled departure.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FlightRecord {
    #[serde(rename = "flight_iata")]
    pub flight_code: Option<String>,
    pub flight_number: Option<String>,
    pub airline_iata: Option<String>,

    pub dep_iata: Option<String>,
    pub dep_terminal: Option<String>,
    pub dep_gate: Option<String>,
    pub arr_iata: Option<String>,
    pub arr_terminal: Option<String>,
    pub arr_gate: Option<String>,

    /// Local scheduled departure, `YYYY-MM-DD HH:MM`.
    #[serde(rename = "dep_time")]
    pub departure_scheduled_time: Option<String>,
    #[serde(rename = "dep_estimated")]
    pub departure_estimated_time: Option<String>,
    #[serde(rename = "dep_actual")]
    pub departure_actual_time: Option<String>,

    /// Scheduled departure, unix seconds.
    #[serde(rename = "dep_time_ts")]
    pub departure_scheduled_epoch: Option<i64>,
    #[serde(rename = "dep_estimated_ts")]
    pub departure_estimated_epoch: Option<i64>,
    #[serde(rename = "dep_actual_ts")]
    pub departure_actual_epoch: Option<i64>,

    #[serde(default)]
    pub status: FlightStatus,
    /// Departure delay in minutes.
    pub dep_delayed: Option<i64>,
    pub aircraft_icao: Option<String>,
    /// Block time in minutes.
    pub duration: Option<i64>,
}

impl FlightRecord {
    /// Scheduled epoch, with missing values treated as the unix epoch.
    pub fn scheduled_epoch(&self) -> i64 {
        self.departure_scheduled_epoch.unwrap_or(0)
    }

    /// Flight designator: IATA code, else bare flight number.
    pub fn display_code(&self) -> &str {
        non_empty(&self.flight_code)
            .or_else(|| non_empty(&self.flight_number))
            .unwrap_or(PLACEHOLDER)
    }

    pub fn destination(&self) -> &str {
        non_empty(&self.arr_iata).unwrap_or(PLACEHOLDER)
    }

    /// Scheduled departure as `HH:MM`.
    pub fn scheduled_clock(&self) -> String {
        clock_time(self.departure_scheduled_time.as_deref())
    }

    pub fn estimated_clock(&self) -> String {
        clock_time(self.departure_estimated_time.as_deref())
    }

    /// Gate and terminal, e.g. `A2 / T1`.
    pub fn gate_info(&self) -> String {
        let parts: Vec<String> = [
            non_empty(&self.dep_gate).map(str::to_string),
            non_empty(&self.dep_terminal).map(|t| format!("T{t}")),
        ]
        .into_iter()
        .flatten()
        .collect();

        if parts.is_empty() {
            PLACEHOLDER.into()
        } else {
            parts.join(" / ")
        }
    }
}

fn non_empty(field: &Option<String>) -> Option<&str> {
    field.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// Format a feed timestamp as `HH:MM`, or a placeholder when unparseable.
pub fn clock_time(value: Option<&str>) -> String {
    let Some(raw) = value.map(str::trim).filter(|s| !s.is_empty()) else {
        return PLACEHOLDER.into();
    };
    for fmt in ["%Y-%m-%d %H:%M", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return dt.format("%H:%M").to_string();
        }
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return dt.format("%H:%M").to_string();
    }
    PLACEHOLDER.into()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const TP102: &str = r#"{
        "airline_iata": "TP",
        "flight_iata": "TP102",
        "flight_number": "102",
        "dep_iata": "LIS",
        "dep_terminal": "1",
        "dep_gate": "A2",
        "dep_time": "2025-06-23 10:30",
        "dep_estimated": "2025-06-23 10:35",
        "arr_iata": "MAD",
        "arr_actual": null,
        "status": "active",
        "dep_delayed": 5,
        "aircraft_icao": "A320",
        "dep_time_ts": 1761270600,
        "dep_estimated_ts": 1761270900,
        "dep_actual_ts": null
    }"#;

    #[test]
    fn test_deserialize_upstream_record() {
        let rec: FlightRecord = serde_json::from_str(TP102).unwrap();
        assert_eq!(rec.flight_code.as_deref(), Some("TP102"));
        assert_eq!(rec.departure_scheduled_epoch, Some(1761270600));
        assert_eq!(rec.departure_actual_epoch, None);
        assert_eq!(rec.status, FlightStatus::Active);
        assert_eq!(rec.dep_delayed, Some(5));
    }

    #[test]
    fn test_missing_fields_default() {
        let rec: FlightRecord = serde_json::from_str("{}").unwrap();
        assert_eq!(rec.status, FlightStatus::Unknown);
        assert_eq!(rec.scheduled_epoch(), 0);
        assert_eq!(rec.display_code(), "—");
    }

    #[test]
    fn test_wrong_type_is_rejected() {
        let bad = r#"{"flight_iata": "TP1", "dep_time_ts": "soon"}"#;
        assert!(serde_json::from_str::<FlightRecord>(bad).is_err());
    }

    #[test]
    fn test_display_helpers() {
        let rec: FlightRecord = serde_json::from_str(TP102).unwrap();
        assert_eq!(rec.display_code(), "TP102");
        assert_eq!(rec.destination(), "MAD");
        assert_eq!(rec.scheduled_clock(), "10:30");
        assert_eq!(rec.estimated_clock(), "10:35");
        assert_eq!(rec.gate_info(), "A2 / T1");
        assert_eq!(rec.status.label(), "Active");
    }

    #[test]
    fn test_display_code_falls_back_to_number() {
        let rec = FlightRecord {
            flight_number: Some("3509".into()),
            ..FlightRecord::default()
        };
        assert_eq!(rec.display_code(), "3509");
    }

    #[test]
    fn test_gate_info_partial() {
        let gate_only = FlightRecord {
            dep_gate: Some("B5".into()),
            ..FlightRecord::default()
        };
        assert_eq!(gate_only.gate_info(), "B5");
        let terminal_only = FlightRecord {
            dep_terminal: Some("2".into()),
            ..FlightRecord::default()
        };
        assert_eq!(terminal_only.gate_info(), "T2");
        assert_eq!(FlightRecord::default().gate_info(), "—");
    }

    #[test]
    fn test_status_labels() {
        let cases = [
            ("en-route", "En Route"),
            ("landed", "Arrived"),
            ("SCHEDULED", "Scheduled"),
            ("cancelled", "Cancelled"),
            ("gate closed", "Gate closed"),
        ];
        for (raw, label) in cases {
            assert_eq!(FlightStatus::from(Some(raw.to_string())).label(), label);
        }
        assert_eq!(FlightStatus::from(None).label(), "—");
    }

    #[test]
    fn test_status_serializes_back_to_wire_form() {
        let rec = FlightRecord {
            status: FlightStatus::EnRoute,
            ..FlightRecord::default()
        };
        let json = serde_json::to_value(&rec).unwrap();
        assert_eq!(json["status"], "en-route");
        assert!(json["flight_iata"].is_null());
    }

    #[test]
    fn test_clock_time_formats() {
        assert_eq!(clock_time(Some("2025-06-23T13:10:00")), "13:10");
        assert_eq!(clock_time(Some("2025-06-23T13:10:00+01:00")), "13:10");
        assert_eq!(clock_time(Some("soon")), "—");
        assert_eq!(clock_time(None), "—");
    }
}
