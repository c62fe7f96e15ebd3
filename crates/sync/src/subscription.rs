//! Live subscription handles
//!
//! A subscription is the shared object bound to one entity key. Its driver
//! task emits values into it; any number of consumers read from it. A new
//! consumer first sees the latest value (and the terminal outcome, if the
//! subscription already finished) and then every later event. A consumer
//! that falls behind the channel loses the events it missed, but never sees
//! the same value twice in a row.

use std::collections::VecDeque;
use std::sync::Arc;

use futures_util::StreamExt;
use futures_util::stream::{self, BoxStream};
use ledgerwatch_core::EntityKey;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;

use crate::error::SyncError;

/// Lifecycle of a subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionStatus {
    /// Baseline not delivered yet
    Init,
    /// Baseline delivered, following updates
    Live,
    /// Resource reached the end of its lifetime, or the subscription was closed
    Completed,
    /// Init or the push stream failed
    Failed,
}

impl SubscriptionStatus {
    pub fn is_live(&self) -> bool {
        matches!(self, SubscriptionStatus::Live)
    }

    pub fn is_finished(&self) -> bool {
        matches!(self, SubscriptionStatus::Completed | SubscriptionStatus::Failed)
    }
}

/// Event broadcast to consumers
#[derive(Debug, Clone)]
pub enum FeedEvent<T> {
    /// First value, produced by the init phase
    Baseline(T),
    /// Accepted update
    Update(T),
    Completed,
    Failed(SyncError),
}

/// Stream of "an update happened" signals, used by derived feeds
pub type Trigger = BoxStream<'static, Result<(), SyncError>>;

struct SubscriptionState<T> {
    status: SubscriptionStatus,
    latest: Option<T>,
    error: Option<SyncError>,
}

struct Inner<T> {
    key: EntityKey,
    state: Mutex<SubscriptionState<T>>,
    tx: broadcast::Sender<FeedEvent<T>>,
    cancel: CancellationToken,
}

/// Shared handle to one live subscription
pub struct Subscription<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for Subscription<T> {
    fn clone(&self) -> Self {
        Subscription {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Clone + Send + 'static> Subscription<T> {
    pub fn new(key: impl Into<EntityKey>, capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Subscription {
            inner: Arc::new(Inner {
                key: key.into(),
                state: Mutex::new(SubscriptionState {
                    status: SubscriptionStatus::Init,
                    latest: None,
                    error: None,
                }),
                tx,
                cancel: CancellationToken::new(),
            }),
        }
    }

    /// Subscription that holds `value` and is already complete
    pub fn resolved(key: impl Into<EntityKey>, value: T) -> Self {
        let subscription = Self::new(key, 1);
        subscription.emit_baseline(value);
        subscription.complete();
        subscription
    }

    pub fn key(&self) -> &EntityKey {
        &self.inner.key
    }

    pub fn status(&self) -> SubscriptionStatus {
        self.inner.state.lock().status
    }

    pub fn is_finished(&self) -> bool {
        self.status().is_finished()
    }

    pub fn latest(&self) -> Option<T> {
        self.inner.state.lock().latest.clone()
    }

    pub fn error(&self) -> Option<SyncError> {
        self.inner.state.lock().error.clone()
    }

    /// Both handles refer to the same subscription
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Number of consumers currently attached
    pub fn consumer_count(&self) -> usize {
        self.inner.tx.receiver_count()
    }

    /// Stop the driver and complete for every consumer
    pub fn close(&self) {
        self.inner.cancel.cancel();
        self.complete();
    }

    pub(crate) fn cancel_token(&self) -> CancellationToken {
        self.inner.cancel.clone()
    }

    fn attach(&self, replay_latest: bool) -> Subscriber<T> {
        let state = self.inner.state.lock();
        let rx = self.inner.tx.subscribe();

        let mut replay = VecDeque::new();
        if replay_latest && let Some(value) = &state.latest {
            replay.push_back(FeedEvent::Update(value.clone()));
        }
        match state.status {
            SubscriptionStatus::Completed => replay.push_back(FeedEvent::Completed),
            SubscriptionStatus::Failed => {
                let error = state.error.clone().unwrap_or(SyncError::Cancelled);
                replay.push_back(FeedEvent::Failed(error));
            }
            SubscriptionStatus::Init | SubscriptionStatus::Live => {}
        }

        Subscriber {
            key: self.inner.key.clone(),
            replay,
            rx,
            skip_baseline: !replay_latest,
            last_delivered: None,
            lagged: false,
            done: false,
        }
    }

    pub(crate) fn emit_baseline(&self, value: T) {
        let mut state = self.inner.state.lock();
        if state.status.is_finished() {
            return;
        }
        state.status = SubscriptionStatus::Live;
        state.latest = Some(value.clone());
        let _ = self.inner.tx.send(FeedEvent::Baseline(value));
    }

    pub(crate) fn set_live(&self) {
        let mut state = self.inner.state.lock();
        if state.status == SubscriptionStatus::Init {
            state.status = SubscriptionStatus::Live;
        }
    }

    pub(crate) fn emit(&self, value: T) {
        let mut state = self.inner.state.lock();
        if state.status.is_finished() {
            return;
        }
        state.latest = Some(value.clone());
        let _ = self.inner.tx.send(FeedEvent::Update(value));
    }

    pub(crate) fn complete(&self) {
        let mut state = self.inner.state.lock();
        if state.status.is_finished() {
            return;
        }
        state.status = SubscriptionStatus::Completed;
        tracing::info!("Subscription {} completed", self.inner.key);
        let _ = self.inner.tx.send(FeedEvent::Completed);
    }

    pub(crate) fn fail(&self, error: SyncError) {
        let mut state = self.inner.state.lock();
        if state.status.is_finished() {
            return;
        }
        state.status = SubscriptionStatus::Failed;
        state.error = Some(error.clone());
        tracing::error!("Subscription {} failed: {}", self.inner.key, error);
        let _ = self.inner.tx.send(FeedEvent::Failed(error));
    }
}

impl<T: Clone + Serialize + Send + 'static> Subscription<T> {
    /// New consumer; replays the latest value and terminal state
    pub fn subscribe(&self) -> Subscriber<T> {
        self.attach(true)
    }

    pub fn into_stream(self) -> BoxStream<'static, Result<T, SyncError>> {
        let subscriber = self.subscribe();
        stream::unfold(subscriber, |mut subscriber| async move {
            subscriber.next().await.map(|item| (item, subscriber))
        })
        .boxed()
    }

    /// One `Ok(())` per update accepted from now on. The baseline is not an
    /// update. Ends when the subscription completes, yields the error when
    /// it fails.
    pub fn trigger(&self) -> Trigger {
        let subscriber = self.attach(false);
        stream::unfold(subscriber, |mut subscriber| async move {
            subscriber
                .next_event()
                .await
                .map(|item| (item.map(|_| ()), subscriber))
        })
        .boxed()
    }
}

/// One consumer of a subscription
pub struct Subscriber<T> {
    key: EntityKey,
    replay: VecDeque<FeedEvent<T>>,
    rx: broadcast::Receiver<FeedEvent<T>>,
    skip_baseline: bool,
    /// Last value handed out, kept by value consumers only
    last_delivered: Option<T>,
    /// Events were dropped since the last value handed out
    lagged: bool,
    done: bool,
}

impl<T: Clone + Serialize> Subscriber<T> {
    /// Next value; `None` once the subscription completed. A failure is
    /// delivered once as `Some(Err(..))`, then `None`.
    pub async fn next(&mut self) -> Option<Result<T, SyncError>> {
        self.next_event().await
    }

    async fn next_event(&mut self) -> Option<Result<T, SyncError>> {
        if self.done {
            return None;
        }

        loop {
            let event = match self.replay.pop_front() {
                Some(event) => event,
                None => match self.rx.recv().await {
                    Ok(event) => event,
                    Err(RecvError::Lagged(n)) => {
                        tracing::warn!("Consumer of {} lagged, skipped {} events", self.key, n);
                        self.lagged = true;
                        continue;
                    }
                    Err(RecvError::Closed) => {
                        self.done = true;
                        return None;
                    }
                },
            };

            return match event {
                FeedEvent::Baseline(_) if self.skip_baseline => continue,
                FeedEvent::Baseline(value) | FeedEvent::Update(value) => {
                    if self.skip_baseline {
                        return Some(Ok(value));
                    }
                    if std::mem::take(&mut self.lagged) && self.repeats_last(&value) {
                        tracing::debug!("Dropping repeated value of {} after lag", self.key);
                        continue;
                    }
                    self.last_delivered = Some(value.clone());
                    Some(Ok(value))
                }
                FeedEvent::Completed => {
                    self.done = true;
                    None
                }
                FeedEvent::Failed(error) => {
                    self.done = true;
                    Some(Err(error))
                }
            };
        }
    }

    /// Same structure as the last value handed out
    fn repeats_last(&self, value: &T) -> bool {
        let Some(last) = &self.last_delivered else {
            return false;
        };
        match (serde_json::to_value(last), serde_json::to_value(value)) {
            (Ok(last), Ok(value)) => last == value,
            _ => false,
        }
    }
}
