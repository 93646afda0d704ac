//! Departures feed state machine.
//!
//! Pure logic, no I/O and no timers. The caller asks the feed for a
//! `FetchRequest`, performs the fetch however it likes, and hands the result
//! back to `complete()` together with the current time. The feed decides
//! whether the result still applies:
//!
//! - Full fetches (offset 0, replace) carry an epoch assigned at initiation.
//!   Only the most recently initiated full fetch may touch the state, so a
//!   slow earlier refresh can never overwrite a faster later one.
//! - Page fetches ("load more", append) are serialized by `is_loading` and
//!   carry the generation of the records they extend. Once the records are
//!   replaced or reset, an outstanding page is dropped on arrival.

use std::fmt::Display;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use serde::Serialize;

use crate::flight::FlightRecord;

pub const DEFAULT_PAGE_SIZE: usize = 50;
pub const DEFAULT_RECENCY_WINDOW_SECS: i64 = 1800;
pub const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 300;

// ---------------------------------------------------------------------------
// Clock
// ---------------------------------------------------------------------------

/// Source of "now" for the recency filter, in unix seconds.
pub trait Clock: Send + Sync {
    fn now(&self) -> i64;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> i64 {
        chrono::Utc::now().timestamp()
    }
}

/// Manually driven clock, for replaying fixtures at a fixed instant.
#[derive(Debug, Default)]
pub struct FixedClock {
    now: AtomicI64,
}

impl FixedClock {
    pub fn new(now: i64) -> Self {
        FixedClock {
            now: AtomicI64::new(now),
        }
    }

    pub fn set(&self, now: i64) {
        self.now.store(now, Ordering::SeqCst);
    }

    pub fn advance(&self, secs: i64) {
        self.now.fetch_add(secs, Ordering::SeqCst);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

// ---------------------------------------------------------------------------
// Recency filter
// ---------------------------------------------------------------------------

/// True if the flight departs no earlier than `window_secs` before `now`.
pub fn is_recent(record: &FlightRecord, now: i64, window_secs: i64) -> bool {
    record.scheduled_epoch() >= now - window_secs
}

/// Drop departures older than the recency window. Order is preserved.
pub fn retain_recent(records: Vec<FlightRecord>, now: i64, window_secs: i64) -> Vec<FlightRecord> {
    records
        .into_iter()
        .filter(|r| is_recent(r, now, window_secs))
        .collect()
}

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct FeedSettings {
    pub page_size: usize,
    pub recency_window_secs: i64,
    pub refresh_interval: Duration,
}

impl Default for FeedSettings {
    fn default() -> Self {
        FeedSettings {
            page_size: DEFAULT_PAGE_SIZE,
            recency_window_secs: DEFAULT_RECENCY_WINDOW_SECS,
            refresh_interval: Duration::from_secs(DEFAULT_REFRESH_INTERVAL_SECS),
        }
    }
}

// ---------------------------------------------------------------------------
// Requests and completions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FetchKind {
    Full { epoch: u64 },
    Page { generation: u64, seq: u64 },
}

/// A fetch the caller must perform, then hand back to [`Feed::complete`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub airport: String,
    pub limit: usize,
    pub offset: usize,
    kind: FetchKind,
}

impl FetchRequest {
    /// Full fetches replace the feed; page fetches append to it.
    pub fn is_full(&self) -> bool {
        matches!(self.kind, FetchKind::Full { .. })
    }

    /// Epoch of a full fetch.
    pub fn epoch(&self) -> Option<u64> {
        match self.kind {
            FetchKind::Full { epoch } => Some(epoch),
            FetchKind::Page { .. } => None,
        }
    }
}

/// What `complete()` did with a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// Records replaced by a full fetch.
    Replaced { received: usize, retained: usize },
    /// Page appended.
    Appended { received: usize, retained: usize },
    /// Fetch failed; records untouched, no more pages.
    Failed,
    /// Superseded before it finished; result dropped.
    Stale,
}

/// Read-only view of the feed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedSnapshot {
    pub airport: Option<String>,
    pub records: Vec<FlightRecord>,
    pub cursor: usize,
    pub has_more: bool,
    pub is_loading: bool,
    pub is_refreshing: bool,
    pub epoch: u64,
}

// ---------------------------------------------------------------------------
// Feed
// ---------------------------------------------------------------------------

/// Feed state for one airport at a time.
#[derive(Debug, Clone)]
pub struct Feed {
    airport: Option<String>,
    records: Vec<FlightRecord>,
    cursor: usize,
    has_more: bool,
    is_loading: bool,
    is_refreshing: bool,

    page_size: usize,
    recency_window_secs: i64,

    // Highest full-fetch epoch initiated so far
    epoch: u64,
    // Bumped whenever records/cursor are replaced or reset
    generation: u64,
    // Id of the latest page fetch handed out
    page_seq: u64,
    // A full fetch has been initiated for the current airport
    primed: bool,
}

impl Feed {
    pub fn new(settings: &FeedSettings) -> Self {
        Feed {
            airport: None,
            records: Vec::new(),
            cursor: 0,
            has_more: true,
            is_loading: false,
            is_refreshing: false,
            page_size: settings.page_size.max(1),
            recency_window_secs: settings.recency_window_secs,
            epoch: 0,
            generation: 0,
            page_seq: 0,
            primed: false,
        }
    }

    /// Point the feed at an airport without fetching anything.
    ///
    /// Clears records and pagination. Outstanding fetches for the previous
    /// state are discarded when they land.
    pub fn reset(&mut self, airport: &str) {
        self.airport = Some(airport.trim().to_ascii_uppercase());
        self.records.clear();
        self.cursor = 0;
        self.has_more = true;
        self.is_loading = false;
        self.is_refreshing = false;
        self.primed = false;
        // Retire everything in flight
        self.epoch += 1;
        self.generation += 1;
        self.page_seq += 1;
    }

    /// Switch to `airport` and start the initial full fetch.
    ///
    /// Re-confirming the airport already loaded (or loading) returns `None`.
    pub fn confirm_airport(&mut self, airport: &str) -> Option<FetchRequest> {
        let code = airport.trim().to_ascii_uppercase();
        if self.primed && self.airport.as_deref() == Some(code.as_str()) {
            tracing::debug!(airport = %code, "Airport already confirmed");
            return None;
        }
        self.reset(&code);
        self.begin_refresh()
    }

    /// Start a full fetch at offset 0. `None` until an airport is set.
    pub fn begin_refresh(&mut self) -> Option<FetchRequest> {
        let airport = self.airport.clone()?;
        self.epoch += 1;
        self.is_refreshing = true;
        self.primed = true;
        Some(FetchRequest {
            airport,
            limit: self.page_size,
            offset: 0,
            kind: FetchKind::Full { epoch: self.epoch },
        })
    }

    /// Start a page fetch at the cursor.
    ///
    /// `None` while another page is outstanding, when no pages remain, or
    /// before an airport is set.
    pub fn begin_load_more(&mut self) -> Option<FetchRequest> {
        if self.is_loading || !self.has_more {
            return None;
        }
        let airport = self.airport.clone()?;
        self.is_loading = true;
        self.page_seq += 1;
        Some(FetchRequest {
            airport,
            limit: self.page_size,
            offset: self.cursor,
            kind: FetchKind::Page {
                generation: self.generation,
                seq: self.page_seq,
            },
        })
    }

    /// Apply the result of a fetch started by this feed.
    pub fn complete<E: Display>(
        &mut self,
        request: &FetchRequest,
        result: std::result::Result<Vec<FlightRecord>, E>,
        now: i64,
    ) -> Completion {
        match request.kind {
            FetchKind::Full { epoch } => self.complete_full(request, epoch, result, now),
            FetchKind::Page { generation, seq } => {
                self.complete_page(request, generation, seq, result, now)
            }
        }
    }

    fn complete_full<E: Display>(
        &mut self,
        request: &FetchRequest,
        epoch: u64,
        result: std::result::Result<Vec<FlightRecord>, E>,
        now: i64,
    ) -> Completion {
        if epoch != self.epoch {
            tracing::debug!(
                airport = %request.airport,
                epoch,
                current = self.epoch,
                "Discarding superseded full fetch"
            );
            return Completion::Stale;
        }
        self.is_refreshing = false;

        match result {
            Ok(page) => {
                let received = page.len();
                self.records = retain_recent(page, now, self.recency_window_secs);
                self.cursor = request.offset + request.limit;
                // Raw page length, before the recency filter
                self.has_more = received == request.limit;
                self.generation += 1;
                Completion::Replaced {
                    received,
                    retained: self.records.len(),
                }
            }
            Err(e) => {
                tracing::warn!(airport = %request.airport, error = %e, "Full fetch failed");
                self.has_more = false;
                Completion::Failed
            }
        }
    }

    fn complete_page<E: Display>(
        &mut self,
        request: &FetchRequest,
        generation: u64,
        seq: u64,
        result: std::result::Result<Vec<FlightRecord>, E>,
        now: i64,
    ) -> Completion {
        if seq == self.page_seq {
            self.is_loading = false;
        }
        if generation != self.generation {
            tracing::debug!(
                airport = %request.airport,
                offset = request.offset,
                "Discarding page fetched before the feed was replaced"
            );
            return Completion::Stale;
        }

        match result {
            Ok(page) => {
                let received = page.len();
                let fresh = retain_recent(page, now, self.recency_window_secs);
                let retained = fresh.len();
                self.records.extend(fresh);
                self.cursor = request.offset + request.limit;
                // Raw page length, before the recency filter
                self.has_more = received == request.limit;
                Completion::Appended { received, retained }
            }
            Err(e) => {
                tracing::warn!(
                    airport = %request.airport,
                    offset = request.offset,
                    error = %e,
                    "Page fetch failed"
                );
                self.has_more = false;
                Completion::Failed
            }
        }
    }

    pub fn snapshot(&self) -> FeedSnapshot {
        FeedSnapshot {
            airport: self.airport.clone(),
            records: self.records.clone(),
            cursor: self.cursor,
            has_more: self.has_more,
            is_loading: self.is_loading,
            is_refreshing: self.is_refreshing,
            epoch: self.epoch,
        }
    }

    pub fn airport(&self) -> Option<&str> {
        self.airport.as_deref()
    }

    pub fn records(&self) -> &[FlightRecord] {
        &self.records
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn has_more(&self) -> bool {
        self.has_more
    }

    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    pub fn is_refreshing(&self) -> bool {
        self.is_refreshing
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
