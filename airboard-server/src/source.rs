//! Flight data sources.
//!
//! The controller only sees `FlightSource::fetch`. Two implementations:
//! the live schedules worker over HTTP, and an in-memory fixture sliced by
//! offset/limit. Payloads are validated here, at the boundary, so the feed
//! only ever handles typed `FlightRecord`s.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use airboard_core::flight::FlightRecord;

const BUNDLED_FIXTURE: &str = include_str!("../fixtures/departures.json");

/// Why a fetch produced no page.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("HTTP {0}")]
    Status(u16),
    #[error("malformed payload: {0}")]
    Payload(String),
    #[error("source reported an unsuccessful response")]
    Unsuccessful,
}

/// Fetch one page of departures for an airport.
#[async_trait]
pub trait FlightSource: Send + Sync {
    async fn fetch(
        &self,
        airport: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<FlightRecord>, FetchError>;

    /// Short label for logs.
    fn name(&self) -> &'static str;
}

// ---------------------------------------------------------------------------
// Payload envelope
// ---------------------------------------------------------------------------

/// Response envelope: `{"success": true, "type": "departure", "data": [...]}`.
#[derive(Debug, Deserialize)]
struct FlightPage {
    #[serde(default = "default_success")]
    success: bool,
    data: Option<Vec<FlightRecord>>,
}

fn default_success() -> bool {
    true
}

/// Decode and validate a page payload.
pub fn parse_page(body: &[u8]) -> Result<Vec<FlightRecord>, FetchError> {
    let page: FlightPage =
        serde_json::from_slice(body).map_err(|e| FetchError::Payload(e.to_string()))?;
    if !page.success {
        return Err(FetchError::Unsuccessful);
    }
    page.data
        .ok_or_else(|| FetchError::Payload("missing `data` array".into()))
}

// ---------------------------------------------------------------------------
// Live HTTP source
// ---------------------------------------------------------------------------

/// Schedules worker reached over HTTP GET.
///
/// Query: `?iataCode=LIS&type=departure&limit=50&offset=0`.
#[derive(Clone)]
pub struct HttpFlightSource {
    endpoint: String,
    client: reqwest::Client,
}

impl HttpFlightSource {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::Transport(format!("failed to create HTTP client: {e}")))?;
        Ok(HttpFlightSource {
            endpoint: endpoint.to_string(),
            client,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl FlightSource for HttpFlightSource {
    async fn fetch(
        &self,
        airport: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<FlightRecord>, FetchError> {
        let limit = limit.to_string();
        let offset = offset.to_string();
        tracing::debug!(airport, limit = %limit, offset = %offset, "Fetching departures");

        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("iataCode", airport),
                ("type", "departure"),
                ("limit", limit.as_str()),
                ("offset", offset.as_str()),
            ])
            .send()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(FetchError::Status(response.status().as_u16()));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;
        parse_page(&body)
    }

    fn name(&self) -> &'static str {
        "live"
    }
}

// ---------------------------------------------------------------------------
// Fixture source
// ---------------------------------------------------------------------------

/// Fixed in-memory departures, served as `[offset, offset + limit)` slices.
///
/// The airport code is ignored: the fixture is the whole world.
#[derive(Debug, Clone, Default)]
pub struct FixtureFlightSource {
    records: Vec<FlightRecord>,
}

impl FixtureFlightSource {
    pub fn new(records: Vec<FlightRecord>) -> Self {
        FixtureFlightSource { records }
    }

    /// Parse a fixture in the same envelope the live worker returns.
    pub fn from_json(text: &str) -> Result<Self, FetchError> {
        Ok(Self::new(parse_page(text.as_bytes())?))
    }

    /// The fixture shipped with the binary.
    pub fn bundled() -> Result<Self, FetchError> {
        Self::from_json(BUNDLED_FIXTURE)
    }

    /// Earliest scheduled departure in the fixture, if any record has one.
    ///
    /// Replaying the fixture with the clock pinned here keeps its flights
    /// inside the recency window.
    pub fn reference_time(&self) -> Option<i64> {
        self.records
            .iter()
            .filter_map(|r| r.departure_scheduled_epoch)
            .min()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl FlightSource for FixtureFlightSource {
    async fn fetch(
        &self,
        _airport: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<FlightRecord>, FetchError> {
        Ok(self
            .records
            .iter()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }

    fn name(&self) -> &'static str {
        "fixture"
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
