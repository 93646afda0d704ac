//! Async driver for the departures feed.
//!
//! `FeedController` owns a `Feed`, a `FlightSource`, the recurring refresh
//! timer and the lifecycle subscription. Fetches run without holding the feed
//! lock; the feed itself decides on completion whether a result still applies.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use airboard_core::feed::{Clock, Completion, Feed, FeedSettings, FeedSnapshot, FetchRequest};

use crate::lifecycle::{LifecycleObserver, LifecycleState};
use crate::source::FlightSource;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

struct Inner {
    source: Arc<dyn FlightSource>,
    clock: Arc<dyn Clock>,
    feed: Mutex<Feed>,
    refresh_interval: Duration,
    timer: Mutex<Option<JoinHandle<()>>>,
    subscription: Mutex<Option<JoinHandle<()>>>,
    // Bumped after every completion that touched the feed
    updates: watch::Sender<u64>,
    disposed: AtomicBool,
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Some(timer) = lock(&self.timer).take() {
            timer.abort();
        }
        if let Some(subscription) = lock(&self.subscription).take() {
            subscription.abort();
        }
    }
}

/// Cheap to clone; all clones drive the same feed.
#[derive(Clone)]
pub struct FeedController {
    inner: Arc<Inner>,
}

impl FeedController {
    pub fn new(
        source: Arc<dyn FlightSource>,
        clock: Arc<dyn Clock>,
        settings: &FeedSettings,
    ) -> Self {
        let (updates, _rx) = watch::channel(0);
        FeedController {
            inner: Arc::new(Inner {
                source,
                clock,
                feed: Mutex::new(Feed::new(settings)),
                refresh_interval: settings.refresh_interval,
                timer: Mutex::new(None),
                subscription: Mutex::new(None),
                updates,
                disposed: AtomicBool::new(false),
            }),
        }
    }

    fn upgrade(weak: &Weak<Inner>) -> Option<Self> {
        weak.upgrade().map(|inner| FeedController { inner })
    }

    // -- public operations --

    /// Reset the feed to `airport` and load its first page.
    ///
    /// Returns `None` when the airport is already loaded or loading.
    pub async fn confirm_airport(&self, airport: &str) -> Option<Completion> {
        let request = lock(&self.inner.feed).confirm_airport(airport)?;
        tracing::info!(
            airport = %request.airport,
            source = self.inner.source.name(),
            "Airport confirmed"
        );
        Some(self.run(request).await)
    }

    /// Replace the feed with a fresh first page. `None` before any airport.
    pub async fn refresh(&self) -> Option<Completion> {
        let request = lock(&self.inner.feed).begin_refresh()?;
        Some(self.run(request).await)
    }

    /// Append the next page. `None` while a page is outstanding or none remain.
    pub async fn load_more(&self) -> Option<Completion> {
        let request = lock(&self.inner.feed).begin_load_more()?;
        Some(self.run(request).await)
    }

    async fn run(&self, request: FetchRequest) -> Completion {
        let result = self
            .inner
            .source
            .fetch(&request.airport, request.limit, request.offset)
            .await;
        let now = self.inner.clock.now();
        let outcome = lock(&self.inner.feed).complete(&request, result, now);

        match outcome {
            Completion::Replaced { received, retained } => tracing::info!(
                airport = %request.airport,
                received,
                retained,
                "Departures refreshed"
            ),
            Completion::Appended { received, retained } => tracing::debug!(
                airport = %request.airport,
                offset = request.offset,
                received,
                retained,
                "Departures page appended"
            ),
            Completion::Failed | Completion::Stale => {}
        }
        if outcome != Completion::Stale {
            self.inner.updates.send_modify(|n| *n += 1);
        }
        outcome
    }

    // -- lifecycle --

    /// React to a lifecycle state.
    ///
    /// Foreground: spawn a refresh and arm the timer. Anything else: disarm
    /// the timer; fetches already in flight keep running. Ignored once
    /// disposed.
    pub fn on_lifecycle_change(
        &self,
        state: LifecycleState,
    ) -> Option<JoinHandle<Option<Completion>>> {
        if self.is_disposed() {
            return None;
        }
        if state.is_foreground() {
            let controller = self.clone();
            let refresh = tokio::spawn(async move { controller.refresh().await });
            self.arm_timer();
            Some(refresh)
        } else {
            self.disarm_timer();
            None
        }
    }

    /// Follow `observer` until disposed. Arms the timer right away if the
    /// host is already in the foreground.
    pub fn subscribe(&self, observer: &LifecycleObserver) {
        if self.is_disposed() {
            return;
        }
        let mut rx = observer.subscribe();
        let initial = *rx.borrow_and_update();
        if initial.is_foreground() {
            self.arm_timer();
        }

        let weak = Arc::downgrade(&self.inner);
        let handle = tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                let state = *rx.borrow_and_update();
                let Some(controller) = FeedController::upgrade(&weak) else {
                    break;
                };
                controller.on_lifecycle_change(state);
            }
        });

        if let Some(previous) = lock(&self.inner.subscription).replace(handle) {
            previous.abort();
        }
    }

    fn arm_timer(&self) {
        if self.is_disposed() {
            return;
        }
        let mut timer = lock(&self.inner.timer);
        if timer.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return;
        }

        let period = self.inner.refresh_interval;
        let Some(first) = Instant::now().checked_add(period) else {
            tracing::warn!(
                interval_secs = period.as_secs(),
                "Refresh interval out of range; timer not armed"
            );
            return;
        };
        let weak = Arc::downgrade(&self.inner);
        *timer = Some(tokio::spawn(async move {
            let mut ticks = tokio::time::interval_at(first, period);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticks.tick().await;
                let Some(controller) = FeedController::upgrade(&weak) else {
                    break;
                };
                tracing::debug!("Refresh timer fired");
                tokio::spawn(async move {
                    controller.refresh().await;
                });
            }
        }));
        tracing::debug!(interval_secs = period.as_secs(), "Refresh timer armed");
    }

    fn disarm_timer(&self) {
        if let Some(timer) = lock(&self.inner.timer).take() {
            timer.abort();
            tracing::debug!("Refresh timer disarmed");
        }
    }

    pub fn is_timer_armed(&self) -> bool {
        lock(&self.inner.timer)
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Stop the timer and drop the lifecycle subscription. Idempotent.
    pub fn dispose(&self) {
        if self.inner.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.disarm_timer();
        if let Some(subscription) = lock(&self.inner.subscription).take() {
            subscription.abort();
        }
        tracing::debug!("Feed controller disposed");
    }

    fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::SeqCst)
    }

    // -- reads --

    pub fn snapshot(&self) -> FeedSnapshot {
        lock(&self.inner.feed).snapshot()
    }

    /// Wakes after each completion that changed the feed.
    pub fn changes(&self) -> watch::Receiver<u64> {
        self.inner.updates.subscribe()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    use async_trait::async_trait;
    use tokio::sync::{mpsc, oneshot};

    use airboard_core::feed::FixedClock;
    use airboard_core::flight::FlightRecord;

    use crate::source::{FetchError, FixtureFlightSource};

    const NOW: i64 = 1_750_000_000;

    type Reply = oneshot::Sender<Result<Vec<FlightRecord>, FetchError>>;

    fn flight(code: &str) -> FlightRecord {
        FlightRecord {
            flight_code: Some(code.into()),
            departure_scheduled_epoch: Some(NOW + 600),
            ..FlightRecord::default()
        }
    }

    fn upcoming(n: usize) -> Vec<FlightRecord> {
        (0..n).map(|i| flight(&format!("F{i}"))).collect()
    }

    fn codes(controller: &FeedController) -> Vec<String> {
        controller
            .snapshot()
            .records
            .iter()
            .map(|r| r.display_code().to_string())
            .collect()
    }

    fn controller_with(source: impl FlightSource + 'static) -> FeedController {
        FeedController::new(
            Arc::new(source),
            Arc::new(FixedClock::new(NOW)),
            &FeedSettings::default(),
        )
    }

    /// Let spawned tasks run.
    async fn settle() {
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }
    }

    /// Each fetch waits until the test answers it.
    struct GatedSource {
        requests: mpsc::UnboundedSender<(usize, Reply)>,
    }

    impl GatedSource {
        fn new() -> (Self, mpsc::UnboundedReceiver<(usize, Reply)>) {
            let (requests, rx) = mpsc::unbounded_channel();
            (GatedSource { requests }, rx)
        }
    }

    #[async_trait]
    impl FlightSource for GatedSource {
        async fn fetch(
            &self,
            _airport: &str,
            _limit: usize,
            offset: usize,
        ) -> Result<Vec<FlightRecord>, FetchError> {
            let (tx, rx) = oneshot::channel();
            self.requests
                .send((offset, tx))
                .map_err(|_| FetchError::Transport("gate closed".into()))?;
            rx.await
                .map_err(|_| FetchError::Transport("reply dropped".into()))?
        }

        fn name(&self) -> &'static str {
            "gated"
        }
    }

    /// Fixture that records offsets and can be switched to failing.
    struct RecordingSource {
        fixture: FixtureFlightSource,
        offsets: Arc<Mutex<Vec<usize>>>,
        failing: Arc<AtomicBool>,
    }

    impl RecordingSource {
        fn new(records: Vec<FlightRecord>) -> (Self, Arc<Mutex<Vec<usize>>>, Arc<AtomicBool>) {
            let offsets = Arc::new(Mutex::new(Vec::new()));
            let failing = Arc::new(AtomicBool::new(false));
            let source = RecordingSource {
                fixture: FixtureFlightSource::new(records),
                offsets: offsets.clone(),
                failing: failing.clone(),
            };
            (source, offsets, failing)
        }
    }

    #[async_trait]
    impl FlightSource for RecordingSource {
        async fn fetch(
            &self,
            airport: &str,
            limit: usize,
            offset: usize,
        ) -> Result<Vec<FlightRecord>, FetchError> {
            self.offsets.lock().unwrap().push(offset);
            if self.failing.load(Ordering::SeqCst) {
                return Err(FetchError::Status(503));
            }
            self.fixture.fetch(airport, limit, offset).await
        }

        fn name(&self) -> &'static str {
            "recording"
        }
    }

    struct PendingSource {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl FlightSource for PendingSource {
        async fn fetch(
            &self,
            _airport: &str,
            _limit: usize,
            _offset: usize,
        ) -> Result<Vec<FlightRecord>, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            std::future::pending().await
        }

        fn name(&self) -> &'static str {
            "pending"
        }
    }

    #[tokio::test]
    async fn test_refresh_after_confirm_wins() {
        let (source, mut gate) = GatedSource::new();
        let controller = controller_with(source);

        let confirm = tokio::spawn({
            let c = controller.clone();
            async move { c.confirm_airport("LIS").await }
        });
        let (_, reply_a) = gate.recv().await.unwrap();

        let refresh = tokio::spawn({
            let c = controller.clone();
            async move { c.refresh().await }
        });
        let (_, reply_b) = gate.recv().await.unwrap();

        // B lands first, A afterwards
        reply_b.send(Ok(vec![flight("B")])).unwrap();
        assert!(matches!(
            refresh.await.unwrap(),
            Some(Completion::Replaced { retained: 1, .. })
        ));
        reply_a.send(Ok(vec![flight("A1"), flight("A2")])).unwrap();
        assert_eq!(confirm.await.unwrap(), Some(Completion::Stale));

        assert_eq!(codes(&controller), vec!["B"]);
        assert!(!controller.snapshot().is_refreshing);
    }

    #[tokio::test]
    async fn test_confirm_same_airport_fetches_once() {
        let (source, offsets, _) = RecordingSource::new(upcoming(3));
        let controller = controller_with(source);
        assert!(controller.confirm_airport("LIS").await.is_some());
        assert!(controller.confirm_airport("lis").await.is_none());
        assert_eq!(offsets.lock().unwrap().len(), 1);
        assert_eq!(controller.snapshot().airport.as_deref(), Some("LIS"));
    }

    #[tokio::test]
    async fn test_pagination_offsets() {
        let (source, offsets, _) = RecordingSource::new(upcoming(120));
        let controller = controller_with(source);

        controller.confirm_airport("LIS").await;
        let mut has_more = vec![controller.snapshot().has_more];
        while controller.load_more().await.is_some() {
            has_more.push(controller.snapshot().has_more);
        }

        assert_eq!(*offsets.lock().unwrap(), vec![0, 50, 100]);
        assert_eq!(has_more, vec![true, true, false]);
        assert_eq!(controller.snapshot().records.len(), 120);
    }

    #[tokio::test]
    async fn test_load_more_rejected_while_outstanding() {
        let (source, mut gate) = GatedSource::new();
        let controller = controller_with(source);

        let confirm = tokio::spawn({
            let c = controller.clone();
            async move { c.confirm_airport("LIS").await }
        });
        let (_, reply) = gate.recv().await.unwrap();
        reply.send(Ok(upcoming(50))).unwrap();
        confirm.await.unwrap();

        let first = tokio::spawn({
            let c = controller.clone();
            async move { c.load_more().await }
        });
        let (offset, reply) = gate.recv().await.unwrap();
        assert_eq!(offset, 50);
        assert!(controller.snapshot().is_loading);
        assert!(controller.load_more().await.is_none());

        reply.send(Ok(upcoming(10))).unwrap();
        assert!(matches!(first.await.unwrap(), Some(Completion::Appended { .. })));
        assert!(!controller.snapshot().has_more);
    }

    #[tokio::test]
    async fn test_failure_keeps_records() {
        let (source, _, failing) = RecordingSource::new(upcoming(3));
        let controller = controller_with(source);
        controller.confirm_airport("LIS").await;

        failing.store(true, Ordering::SeqCst);
        assert_eq!(controller.refresh().await, Some(Completion::Failed));

        let snapshot = controller.snapshot();
        assert_eq!(snapshot.records.len(), 3);
        assert!(!snapshot.has_more);
        assert!(!snapshot.is_refreshing);
    }

    #[tokio::test]
    async fn test_changes_notified_on_completion() {
        let (source, _, _) = RecordingSource::new(upcoming(2));
        let controller = controller_with(source);
        let mut changes = controller.changes();
        controller.confirm_airport("LIS").await;
        assert!(changes.has_changed().unwrap());
        assert_eq!(*changes.borrow_and_update(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_refreshes_on_interval() {
        let (source, offsets, _) = RecordingSource::new(upcoming(3));
        let controller = controller_with(source);
        controller.confirm_airport("LIS").await;

        let observer = LifecycleObserver::new(LifecycleState::Active);
        controller.subscribe(&observer);
        assert!(controller.is_timer_armed());

        let mut changes = controller.changes();
        changes.borrow_and_update();

        // Nothing before the interval elapses
        tokio::time::sleep(Duration::from_secs(299)).await;
        settle().await;
        assert_eq!(offsets.lock().unwrap().len(), 1);

        tokio::time::timeout(Duration::from_secs(5), changes.changed())
            .await
            .expect("timer refresh")
            .unwrap();
        assert_eq!(*offsets.lock().unwrap(), vec![0, 0]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_background_disarms_and_foreground_rearms() {
        let (source, offsets, _) = RecordingSource::new(upcoming(3));
        let controller = controller_with(source);
        controller.confirm_airport("LIS").await;

        let observer = LifecycleObserver::new(LifecycleState::Active);
        controller.subscribe(&observer);
        assert!(controller.is_timer_armed());

        observer.set(LifecycleState::Background);
        settle().await;
        assert!(!controller.is_timer_armed());

        tokio::time::sleep(Duration::from_secs(900)).await;
        settle().await;
        assert_eq!(offsets.lock().unwrap().len(), 1);

        // Back to the foreground: immediate refresh, timer armed again
        observer.set(LifecycleState::Active);
        settle().await;
        assert!(controller.is_timer_armed());
        assert_eq!(offsets.lock().unwrap().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_foreground_keeps_single_timer() {
        let (source, offsets, _) = RecordingSource::new(upcoming(3));
        let controller = controller_with(source);
        controller.confirm_airport("LIS").await;

        for _ in 0..2 {
            let refresh = controller
                .on_lifecycle_change(LifecycleState::Active)
                .unwrap();
            refresh.await.unwrap();
        }
        assert!(controller.is_timer_armed());
        let before = offsets.lock().unwrap().len();
        assert_eq!(before, 3);

        // One interval, one tick
        tokio::time::sleep(Duration::from_secs(301)).await;
        settle().await;
        let after = offsets.lock().unwrap().clone();
        assert_eq!(after.len(), before + 1);
        assert_eq!(after.last(), Some(&0));
        controller.dispose();
    }

    #[tokio::test(start_paused = true)]
    async fn test_background_keeps_fetch_in_flight() {
        let (source, mut gate) = GatedSource::new();
        let controller = controller_with(source);

        let confirm = tokio::spawn({
            let c = controller.clone();
            async move { c.confirm_airport("LIS").await }
        });
        let (_, reply) = gate.recv().await.unwrap();
        reply.send(Ok(vec![flight("OLD")])).unwrap();
        confirm.await.unwrap();

        let observer = LifecycleObserver::new(LifecycleState::Background);
        controller.subscribe(&observer);
        assert!(!controller.is_timer_armed());

        observer.set(LifecycleState::Active);
        let (offset, reply) = gate.recv().await.unwrap();
        assert_eq!(offset, 0);
        assert!(controller.is_timer_armed());
        assert!(controller.snapshot().is_refreshing);

        // Backgrounded while the refresh is still pending
        observer.set(LifecycleState::Background);
        settle().await;
        assert!(!controller.is_timer_armed());

        let mut changes = controller.changes();
        changes.borrow_and_update();
        reply.send(Ok(vec![flight("NEW")])).unwrap();
        changes.changed().await.unwrap();

        assert_eq!(codes(&controller), vec!["NEW"]);
        assert!(!controller.snapshot().is_refreshing);
    }

    #[tokio::test]
    async fn test_oversized_interval_is_not_armed() {
        let settings = FeedSettings {
            refresh_interval: Duration::from_secs(u64::MAX),
            ..FeedSettings::default()
        };
        let (source, offsets, _) = RecordingSource::new(upcoming(1));
        let controller = FeedController::new(
            Arc::new(source),
            Arc::new(FixedClock::new(NOW)),
            &settings,
        );
        controller.confirm_airport("LIS").await;

        let refresh = controller
            .on_lifecycle_change(LifecycleState::Active)
            .unwrap();
        assert!(!controller.is_timer_armed());
        assert!(matches!(
            refresh.await.unwrap(),
            Some(Completion::Replaced { .. })
        ));
        assert_eq!(offsets.lock().unwrap().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_inactive_is_not_foreground() {
        let (source, _, _) = RecordingSource::new(upcoming(1));
        let controller = controller_with(source);
        let observer = LifecycleObserver::new(LifecycleState::Inactive);
        controller.subscribe(&observer);
        assert!(!controller.is_timer_armed());
    }

    #[tokio::test]
    async fn test_lifecycle_change_without_airport() {
        let (source, offsets, _) = RecordingSource::new(upcoming(1));
        let controller = controller_with(source);
        let refresh = controller
            .on_lifecycle_change(LifecycleState::Active)
            .unwrap();
        assert_eq!(refresh.await.unwrap(), None);
        assert!(offsets.lock().unwrap().is_empty());
        assert!(controller.is_timer_armed());
        controller.dispose();
    }

    #[tokio::test(start_paused = true)]
    async fn test_dispose_is_idempotent_and_final() {
        let (source, offsets, _) = RecordingSource::new(upcoming(3));
        let controller = controller_with(source);
        controller.confirm_airport("LIS").await;

        let observer = LifecycleObserver::new(LifecycleState::Active);
        controller.subscribe(&observer);
        controller.dispose();
        controller.dispose();
        assert!(!controller.is_timer_armed());

        observer.set(LifecycleState::Background);
        observer.set(LifecycleState::Active);
        settle().await;
        tokio::time::sleep(Duration::from_secs(900)).await;
        settle().await;

        assert!(!controller.is_timer_armed());
        assert_eq!(offsets.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unresolved_fetch_leaves_flags_set() {
        // No timeout at this layer: a fetch that never resolves keeps its
        // loading flag set for good.
        let source = Arc::new(PendingSource {
            calls: AtomicUsize::new(0),
        });
        let controller = FeedController::new(
            source.clone(),
            Arc::new(FixedClock::new(NOW)),
            &FeedSettings::default(),
        );

        let confirm = tokio::spawn({
            let c = controller.clone();
            async move { c.confirm_airport("LIS").await }
        });
        settle().await;
        assert!(controller.snapshot().is_refreshing);

        let page = controller.clone();
        let outcome = tokio::time::timeout(Duration::from_secs(3600), page.load_more()).await;
        assert!(outcome.is_err());

        let snapshot = controller.snapshot();
        assert!(snapshot.is_refreshing);
        assert!(snapshot.is_loading);
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
        confirm.abort();
    }
}
