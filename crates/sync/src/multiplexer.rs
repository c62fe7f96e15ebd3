//! Update multiplexer
//!
//! One driver task per subscription owns the feed adapter. It runs the
//! adapter's init, then merges push messages (or upstream triggers for
//! derived feeds) with a fallback poll into a single, gated, deduplicated
//! stream of values.
//!
//! ```text
//!   push / trigger ──┐
//!                    ├──► fetch_update ──► cursor check ──► should_apply ──► apply ──► dedup ──► emit
//!   fallback poll ───┘
//! ```

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use ledgerwatch_core::Cursor;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::time::{Instant, sleep_until};

use crate::backoff::Backoff;
use crate::config::BackoffConfig;
use crate::error::SyncError;
use crate::stream_client::{LiveHandle, ReconnectingStreamClient, StreamHandlers, UrlFactory};
use crate::subscription::{Subscription, Trigger};

/// Decoded push message
pub struct Pushed<T> {
    pub value: T,
    /// Last message of the resource's lifetime
    pub terminal: bool,
}

pub type Decoder<T> = Box<dyn Fn(&str) -> Result<Pushed<T>, SyncError> + Send + Sync>;

/// A push channel owned by the feed
pub struct PushChannel<T> {
    pub url_factory: UrlFactory,
    pub decode: Decoder<T>,
}

/// Where a feed's updates come from once it is live
pub enum UpdateSource<T> {
    /// The feed opens its own push stream
    Push(PushChannel<T>),
    /// Every update of an upstream feed re-runs `fetch_update(None)`
    Derived(Trigger),
    /// Poll only
    None,
}

/// Per-resource behaviour plugged into the multiplexer
#[async_trait]
pub trait FeedAdapter: Send + 'static {
    type Value: Clone + Serialize + Send + Sync + 'static;

    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Baseline value; `None` goes live without emitting
    async fn init(&mut self) -> Result<Option<Self::Value>, SyncError>;

    /// Candidate for a pushed value, or a fresh read when `pushed` is `None`
    async fn fetch_update(
        &mut self,
        pushed: Option<Self::Value>,
    ) -> Result<Option<Self::Value>, SyncError>;

    fn should_apply_update(&self, candidate: &Self::Value) -> bool;

    /// Fold an accepted candidate into the feed state; returns the value to emit
    fn apply_update(&mut self, candidate: Self::Value) -> Self::Value;

    /// Paging cursor of a value, where the feed has one
    fn cursor_of(&self, _value: &Self::Value) -> Option<Cursor> {
        None
    }

    /// Called once, after init succeeded
    fn source(&mut self) -> UpdateSource<Self::Value>;

    /// Fallback poll interval; `None` disables polling
    fn poll_interval(&self) -> Option<Duration>;
}

enum Incoming<T> {
    Pushed(Pushed<T>),
    Trigger,
    Failed(SyncError),
    Closed,
}

struct PushHandlers<T> {
    tx: mpsc::Sender<Incoming<T>>,
    decode: Decoder<T>,
}

#[async_trait]
impl<T: Send + 'static> StreamHandlers for PushHandlers<T> {
    async fn on_message(&self, message: String) {
        match (self.decode)(&message) {
            Ok(pushed) => {
                let _ = self.tx.send(Incoming::Pushed(pushed)).await;
            }
            Err(e) => tracing::warn!("Dropping undecodable push message: {}", e),
        }
    }

    async fn on_unexpected_error(&self, error: SyncError) {
        let _ = self.tx.send(Incoming::Failed(error)).await;
    }
}

async fn forward_trigger<T>(mut trigger: Trigger, tx: mpsc::Sender<Incoming<T>>) {
    while let Some(signal) = trigger.next().await {
        let (message, last) = match signal {
            Ok(()) => (Incoming::Trigger, false),
            Err(e) => (Incoming::Failed(e), true),
        };
        if tx.send(message).await.is_err() || last {
            return;
        }
    }
    let _ = tx.send(Incoming::Closed).await;
}

/// Accept/apply gate with cursor and snapshot bookkeeping
struct Gate {
    last_cursor: Option<Cursor>,
    last_snapshot: Option<String>,
}

impl Gate {
    fn new() -> Self {
        Gate {
            last_cursor: None,
            last_snapshot: None,
        }
    }

    fn remember<A: FeedAdapter>(&mut self, adapter: &A, value: &A::Value) {
        if let Some(cursor) = adapter.cursor_of(value) {
            self.last_cursor = Some(cursor);
        }
        self.last_snapshot = serde_json::to_string(value).ok();
    }

    fn offer<A: FeedAdapter>(&mut self, adapter: &mut A, candidate: A::Value) -> Option<A::Value> {
        let cursor = adapter.cursor_of(&candidate);
        if let (Some(cursor), Some(last)) = (&cursor, &self.last_cursor)
            && cursor < last
        {
            tracing::debug!(
                "{}: dropping candidate with stale cursor {} < {}",
                adapter.name(),
                cursor,
                last
            );
            return None;
        }

        if !adapter.should_apply_update(&candidate) {
            tracing::trace!("{}: candidate rejected by gate", adapter.name());
            return None;
        }

        let value = adapter.apply_update(candidate);
        if let Some(cursor) = cursor {
            self.last_cursor = Some(cursor);
        }

        let snapshot = serde_json::to_string(&value).ok();
        if snapshot.is_some() && snapshot == self.last_snapshot {
            tracing::trace!("{}: suppressing duplicate value", adapter.name());
            return None;
        }
        self.last_snapshot = snapshot;
        Some(value)
    }
}

/// Fallback poll schedule: fires `interval` after the last accepted update,
/// backs off x2 up to 8x the interval while polls fail
struct PollSchedule {
    interval: Duration,
    backoff: Backoff,
    deadline: Instant,
}

impl PollSchedule {
    fn new(interval: Duration) -> Self {
        PollSchedule {
            interval,
            backoff: Backoff::new(BackoffConfig::new(interval * 2, 2.0, interval * 8)),
            deadline: Instant::now() + interval,
        }
    }

    fn restart(&mut self) {
        self.backoff.reset();
        self.deadline = Instant::now() + self.interval;
    }

    fn failed(&mut self) {
        self.deadline = Instant::now() + self.backoff.next_delay();
    }
}

enum Step<T> {
    Cancelled,
    Incoming(Option<Incoming<T>>),
    Poll,
}

/// Shared dependencies of every driver
#[derive(Clone)]
pub struct MultiplexerContext {
    pub streams: Arc<ReconnectingStreamClient>,
    pub channel_capacity: usize,
}

/// Spawn the driver task of `subscription`
pub fn spawn<A: FeedAdapter>(adapter: A, subscription: Subscription<A::Value>, ctx: MultiplexerContext) {
    tokio::spawn(drive(adapter, subscription, ctx));
}

async fn drive<A: FeedAdapter>(
    mut adapter: A,
    subscription: Subscription<A::Value>,
    ctx: MultiplexerContext,
) {
    let cancel = subscription.cancel_token();
    let key = subscription.key().clone();
    let mut gate = Gate::new();

    let init = tokio::select! {
        _ = cancel.cancelled() => return,
        result = adapter.init() => result,
    };
    match init {
        Ok(Some(value)) => {
            gate.remember(&adapter, &value);
            subscription.emit_baseline(value);
        }
        Ok(None) => subscription.set_live(),
        Err(e) => {
            subscription.fail(e);
            return;
        }
    }
    tracing::info!("{} {} is live", adapter.name(), key);

    let (tx, mut rx) = mpsc::channel(ctx.channel_capacity.max(1));
    // The live handle closes the push stream when the driver exits
    let (_live, forwarder): (Option<LiveHandle>, _) = match adapter.source() {
        UpdateSource::Push(channel) => {
            let handlers = Arc::new(PushHandlers {
                tx: tx.clone(),
                decode: channel.decode,
            });
            (Some(ctx.streams.open(channel.url_factory, handlers)), None)
        }
        UpdateSource::Derived(trigger) => (
            None,
            Some(tokio::spawn(forward_trigger(trigger, tx.clone()))),
        ),
        UpdateSource::None => (None, None),
    };

    let mut poll = adapter.poll_interval().map(PollSchedule::new);

    loop {
        let deadline = poll.as_ref().map(|p| p.deadline);
        let step = tokio::select! {
            _ = cancel.cancelled() => Step::Cancelled,
            incoming = rx.recv() => Step::Incoming(incoming),
            _ = async {
                match deadline {
                    Some(deadline) => sleep_until(deadline).await,
                    None => std::future::pending().await,
                }
            } => Step::Poll,
        };

        let (fetched, terminal, polled) = match step {
            Step::Cancelled => break,
            Step::Incoming(Some(Incoming::Pushed(pushed))) => {
                let fetched = adapter.fetch_update(Some(pushed.value)).await;
                (fetched, pushed.terminal, false)
            }
            Step::Incoming(Some(Incoming::Trigger)) => {
                (adapter.fetch_update(None).await, false, false)
            }
            Step::Incoming(Some(Incoming::Failed(e))) => {
                subscription.fail(e);
                break;
            }
            Step::Incoming(Some(Incoming::Closed)) | Step::Incoming(None) => {
                subscription.complete();
                break;
            }
            Step::Poll => {
                tracing::debug!("{} {}: no update for a while, polling", adapter.name(), key);
                (adapter.fetch_update(None).await, false, true)
            }
        };

        match fetched {
            Ok(Some(candidate)) => {
                if let Some(value) = gate.offer(&mut adapter, candidate) {
                    subscription.emit(value);
                    if let Some(poll) = poll.as_mut() {
                        poll.restart();
                    }
                } else if polled && let Some(poll) = poll.as_mut() {
                    poll.restart();
                }
            }
            Ok(None) => {
                if polled && let Some(poll) = poll.as_mut() {
                    poll.restart();
                }
            }
            Err(e) => {
                tracing::warn!("{} {}: fetching update failed: {}", adapter.name(), key, e);
                if polled && let Some(poll) = poll.as_mut() {
                    poll.failed();
                }
            }
        }

        if terminal {
            subscription.complete();
            break;
        }
    }

    if let Some(forwarder) = forwarder {
        forwarder.abort();
    }
    tracing::debug!("{} {} driver stopped", adapter.name(), key);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockTransport;
    use crate::subscription::SubscriptionStatus;
    use ledgerwatch_core::AccountKey;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use tokio::time::sleep;

    /// Feed whose reads come from a script; the gate accepts everything
    struct ScriptedFeed {
        init: Option<Result<Option<u32>, SyncError>>,
        reads: Arc<Mutex<VecDeque<Result<Option<u32>, SyncError>>>>,
        read_count: Arc<Mutex<usize>>,
        trigger: Option<Trigger>,
        poll: Option<Duration>,
        cursors: bool,
    }

    #[async_trait]
    impl FeedAdapter for ScriptedFeed {
        type Value = u32;

        fn name(&self) -> &'static str {
            "scripted"
        }

        async fn init(&mut self) -> Result<Option<u32>, SyncError> {
            self.init.take().unwrap_or(Ok(None))
        }

        async fn fetch_update(&mut self, pushed: Option<u32>) -> Result<Option<u32>, SyncError> {
            if let Some(value) = pushed {
                return Ok(Some(value));
            }
            *self.read_count.lock() += 1;
            self.reads.lock().pop_front().unwrap_or(Ok(None))
        }

        fn should_apply_update(&self, _candidate: &u32) -> bool {
            true
        }

        fn apply_update(&mut self, candidate: u32) -> u32 {
            candidate
        }

        fn cursor_of(&self, value: &u32) -> Option<Cursor> {
            self.cursors.then(|| Cursor::new(value.to_string()))
        }

        fn source(&mut self) -> UpdateSource<u32> {
            match self.trigger.take() {
                Some(trigger) => UpdateSource::Derived(trigger),
                None => UpdateSource::None,
            }
        }

        fn poll_interval(&self) -> Option<Duration> {
            self.poll
        }
    }

    struct Harness {
        upstream: Subscription<u32>,
        reads: Arc<Mutex<VecDeque<Result<Option<u32>, SyncError>>>>,
        read_count: Arc<Mutex<usize>>,
    }

    fn context() -> MultiplexerContext {
        MultiplexerContext {
            streams: Arc::new(ReconnectingStreamClient::new(
                Arc::new(MockTransport::new()),
                BackoffConfig::reconnect(),
            )),
            channel_capacity: 16,
        }
    }

    fn start(
        init: Result<Option<u32>, SyncError>,
        poll: Option<Duration>,
        cursors: bool,
    ) -> (Subscription<u32>, Harness) {
        let upstream = Subscription::new(AccountKey::new("https://h", "GUP"), 16);
        upstream.emit_baseline(0);
        let reads = Arc::new(Mutex::new(VecDeque::new()));
        let read_count = Arc::new(Mutex::new(0));
        let feed = ScriptedFeed {
            init: Some(init),
            reads: reads.clone(),
            read_count: read_count.clone(),
            trigger: Some(upstream.trigger()),
            poll,
            cursors,
        };
        let subscription = Subscription::new(AccountKey::new("https://h", "GABC"), 16);
        spawn(feed, subscription.clone(), context());
        (
            subscription,
            Harness {
                upstream,
                reads,
                read_count,
            },
        )
    }

    impl Harness {
        /// Script one read and fire the upstream trigger
        fn trigger_with(&self, read: Result<Option<u32>, SyncError>) {
            self.reads.lock().push_back(read);
            self.upstream.emit(1);
        }

        fn reads(&self) -> usize {
            *self.read_count.lock()
        }
    }

    async fn settle() {
        sleep(Duration::from_millis(1)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_consecutive_duplicates_are_suppressed() {
        let (sub, harness) = start(Ok(Some(1)), None, false);
        let mut consumer = sub.subscribe();
        settle().await;

        for value in [1, 2, 2, 3, 3, 3, 2] {
            harness.trigger_with(Ok(Some(value)));
            settle().await;
        }

        let mut seen = Vec::new();
        while let Ok(Some(Ok(value))) =
            tokio::time::timeout(Duration::from_millis(10), consumer.next()).await
        {
            seen.push(value);
        }
        assert_eq!(seen, vec![1, 2, 3, 2]);
        assert_eq!(harness.reads(), 7);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_cursor_is_dropped() {
        let (sub, harness) = start(Ok(Some(10)), None, true);
        let mut consumer = sub.subscribe();
        settle().await;

        harness.trigger_with(Ok(Some(9)));
        settle().await;
        harness.trigger_with(Ok(Some(11)));
        settle().await;

        assert_eq!(consumer.next().await, Some(Ok(10)));
        assert_eq!(consumer.next().await, Some(Ok(11)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_init_failure_fails_subscription() {
        let (sub, _harness) = start(Err(SyncError::RequestFailed { status: 500 }), None, false);
        let mut consumer = sub.subscribe();

        assert_eq!(
            consumer.next().await,
            Some(Err(SyncError::RequestFailed { status: 500 }))
        );
        assert_eq!(consumer.next().await, None);
        assert_eq!(sub.status(), SubscriptionStatus::Failed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_fetch_is_dropped() {
        let (sub, harness) = start(Ok(Some(1)), None, false);
        settle().await;

        harness.trigger_with(Err(SyncError::RequestFailed { status: 503 }));
        settle().await;
        harness.trigger_with(Ok(Some(2)));
        settle().await;

        assert_eq!(sub.status(), SubscriptionStatus::Live);
        assert_eq!(sub.latest(), Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_fires_after_quiet_period() {
        let (sub, harness) = start(Ok(Some(1)), Some(Duration::from_secs(10)), false);
        harness.reads.lock().push_back(Ok(Some(5)));
        settle().await;

        sleep(Duration::from_secs(9)).await;
        assert_eq!(harness.reads(), 0);

        sleep(Duration::from_secs(2)).await;
        assert_eq!(harness.reads(), 1);
        assert_eq!(sub.latest(), Some(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_accepted_update_postpones_poll() {
        let (_sub, harness) = start(Ok(Some(1)), Some(Duration::from_secs(10)), false);
        settle().await;

        sleep(Duration::from_secs(8)).await;
        harness.trigger_with(Ok(Some(2)));
        settle().await;
        assert_eq!(harness.reads(), 1);

        // Deadline moved to ~18 s
        sleep(Duration::from_secs(9)).await;
        assert_eq!(harness.reads(), 1);
        sleep(Duration::from_secs(2)).await;
        assert_eq!(harness.reads(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failing_poll_backs_off() {
        let (_sub, harness) = start(Ok(Some(1)), Some(Duration::from_secs(10)), false);
        for _ in 0..3 {
            harness
                .reads
                .lock()
                .push_back(Err(SyncError::RequestFailed { status: 500 }));
        }
        settle().await;

        // Polls at 10 s, then +20 s, then +40 s
        sleep(Duration::from_millis(10_100)).await;
        assert_eq!(harness.reads(), 1);
        sleep(Duration::from_secs(20)).await;
        assert_eq!(harness.reads(), 2);
        sleep(Duration::from_secs(39)).await;
        assert_eq!(harness.reads(), 2);
        sleep(Duration::from_secs(2)).await;
        assert_eq!(harness.reads(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_upstream_completion_completes() {
        let (sub, harness) = start(Ok(Some(1)), None, false);
        settle().await;

        harness.upstream.complete();
        settle().await;
        assert_eq!(sub.status(), SubscriptionStatus::Completed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_stops_driver() {
        let (sub, harness) = start(Ok(Some(1)), Some(Duration::from_secs(10)), false);
        settle().await;

        sub.close();
        sleep(Duration::from_secs(60)).await;
        assert_eq!(harness.reads(), 0);
    }
}
