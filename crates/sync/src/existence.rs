//! Waiting for an account to exist
//!
//! A freshly generated account is unknown to Horizon until it is funded.
//! The poller reads it with a growing delay until the read succeeds.
//! Concurrent callers for the same account share one poll loop; each caller
//! may still give up on its own through a cancellation token. The registry
//! only holds a weak handle, so the loop is dropped together with its last
//! caller and releases any fetch slot it was waiting for or holding.

use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared, WeakShared};
use ledgerwatch_core::{AccountKey, AccountRecord};
use tokio_util::sync::CancellationToken;

use crate::backoff::Backoff;
use crate::config::BackoffConfig;
use crate::error::{SyncError, SyncResult};
use crate::reader::GovernedLedger;

/// Outcome of an existence wait
#[derive(Debug, Clone, PartialEq)]
pub struct Existence {
    pub record: AccountRecord,
    /// The first read answered 404
    pub had_to_wait: bool,
}

type WaitFuture = BoxFuture<'static, SyncResult<Existence>>;
type SharedWait = Shared<WaitFuture>;

#[derive(Clone)]
pub struct ExistencePoller {
    reader: GovernedLedger,
    backoff: BackoffConfig,
    waits: Arc<DashMap<AccountKey, WeakShared<WaitFuture>>>,
}

impl ExistencePoller {
    pub fn new(reader: GovernedLedger, backoff: BackoffConfig) -> Self {
        ExistencePoller {
            reader,
            backoff,
            waits: Arc::new(DashMap::new()),
        }
    }

    /// Accounts with a poll loop in progress
    pub fn pending(&self) -> usize {
        self.waits
            .iter()
            .filter(|entry| entry.value().upgrade().is_some())
            .count()
    }

    /// Resolve once the account exists
    ///
    /// Fails with `Cancelled` when `cancel` fires first and with
    /// `RequestFailed` for any status other than 200 or 404.
    pub async fn await_existence(
        &self,
        account_id: &str,
        cancel: Option<&CancellationToken>,
    ) -> SyncResult<Existence> {
        let key = AccountKey::new(self.reader.horizon_url(), account_id);
        let wait = self.join_wait(&key);

        let Some(token) = cancel else {
            return wait.await;
        };
        let outcome = tokio::select! {
            biased;
            _ = token.cancelled() => None,
            result = wait => Some(result),
        };
        match outcome {
            Some(result) => result,
            None => {
                // Our handle is gone; forget the loop if nobody else keeps it
                self.waits.remove_if(&key, |_, weak| weak.upgrade().is_none());
                Err(SyncError::Cancelled)
            }
        }
    }

    /// Handle on the running loop for `key`, starting one if none is alive
    fn join_wait(&self, key: &AccountKey) -> SharedWait {
        match self.waits.entry(key.clone()) {
            Entry::Occupied(mut entry) => {
                if let Some(wait) = entry.get().upgrade() {
                    return wait;
                }
                let wait = self.start_wait(key.clone());
                if let Some(weak) = wait.downgrade() {
                    entry.insert(weak);
                }
                wait
            }
            Entry::Vacant(entry) => {
                let wait = self.start_wait(key.clone());
                if let Some(weak) = wait.downgrade() {
                    entry.insert(weak);
                }
                wait
            }
        }
    }

    fn start_wait(&self, key: AccountKey) -> SharedWait {
        let reader = self.reader.clone();
        let backoff = self.backoff;
        let waits = Arc::clone(&self.waits);

        async move {
            let result = poll_until_exists(&reader, backoff, &key.account_id).await;
            waits.remove(&key);
            result
        }
        .boxed()
        .shared()
    }
}

async fn read_account(reader: &GovernedLedger, account_id: &str) -> SyncResult<AccountRecord> {
    reader
        .account(account_id)
        .await?
        .ok_or_else(|| SyncError::NotFoundYet(account_id.to_string()))
}

async fn poll_until_exists(
    reader: &GovernedLedger,
    config: BackoffConfig,
    account_id: &str,
) -> SyncResult<Existence> {
    let mut backoff = Backoff::new(config);
    let mut had_to_wait = false;

    loop {
        match read_account(reader, account_id).await {
            Ok(record) => {
                if had_to_wait {
                    tracing::info!("Account {} now exists", account_id);
                }
                return Ok(Existence {
                    record,
                    had_to_wait,
                });
            }
            Err(SyncError::NotFoundYet(_)) => {
                had_to_wait = true;
                let delay = backoff.next_delay();
                tracing::debug!(
                    "Account {} not found, retrying in {:?}",
                    account_id,
                    delay
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::governor::{FetchGovernor, FetchPriority};
    use crate::mock::{MockLedger, account_record};
    use ledgerwatch_ports::FetchError;
    use std::time::Duration;
    use tokio::time::Instant;

    const HORIZON: &str = "https://horizon.test";

    fn poller(ledger: &Arc<MockLedger>, backoff: BackoffConfig) -> ExistencePoller {
        let reader = GovernedLedger::new(ledger.clone(), Arc::new(FetchGovernor::new(8)));
        ExistencePoller::new(reader, backoff)
    }

    fn gaps(times: &[Instant]) -> Vec<Duration> {
        times.windows(2).map(|w| w[1] - w[0]).collect()
    }

    fn assert_gap(actual: Duration, expected_ms: f64) {
        let actual_ms = actual.as_secs_f64() * 1000.0;
        assert!(
            actual_ms >= expected_ms - 0.001 && actual_ms < expected_ms + 2.0,
            "gap {}ms, expected {}ms",
            actual_ms,
            expected_ms
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_existing_account_needs_no_wait() {
        let ledger = Arc::new(MockLedger::new(HORIZON));
        ledger.set_account(Some(account_record("GABC", "1")));

        let existence = poller(&ledger, BackoffConfig::existence())
            .await_existence("GABC", None)
            .await
            .unwrap();
        assert!(!existence.had_to_wait);
        assert_eq!(ledger.calls("account"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_schedule() {
        let ledger = Arc::new(MockLedger::new(HORIZON));
        for _ in 0..3 {
            ledger.script_account(Ok(None));
        }
        ledger.set_account(Some(account_record("GABC", "5")));

        let existence = poller(&ledger, BackoffConfig::existence())
            .await_existence("GABC", None)
            .await
            .unwrap();
        assert!(existence.had_to_wait);
        assert_eq!(existence.record.sequence, "5");

        let gaps = gaps(&ledger.call_times("account"));
        assert_eq!(gaps.len(), 3);
        assert_gap(gaps[0], 2500.0);
        assert_gap(gaps[1], 2625.0);
        assert_gap(gaps[2], 2756.25);
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_reaches_ceiling() {
        let ledger = Arc::new(MockLedger::new(HORIZON));
        for _ in 0..5 {
            ledger.script_account(Ok(None));
        }
        ledger.set_account(Some(account_record("GABC", "5")));

        let config = BackoffConfig::new(
            Duration::from_millis(100),
            2.0,
            Duration::from_millis(300),
        );
        poller(&ledger, config)
            .await_existence("GABC", None)
            .await
            .unwrap();

        let gaps = gaps(&ledger.call_times("account"));
        let expected = [100.0, 200.0, 300.0, 300.0, 300.0];
        for (gap, expected) in gaps.iter().zip(expected) {
            assert_gap(*gap, expected);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_waiters_share_one_loop() {
        let ledger = Arc::new(MockLedger::new(HORIZON));
        for _ in 0..2 {
            ledger.script_account(Ok(None));
        }
        ledger.set_account(Some(account_record("GABC", "9")));
        let poller = poller(&ledger, BackoffConfig::existence());

        let (a, b) = tokio::join!(
            poller.await_existence("GABC", None),
            poller.await_existence("GABC", None)
        );
        assert_eq!(a.unwrap(), b.unwrap());
        assert_eq!(ledger.calls("account"), 3);
        assert_eq!(poller.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation() {
        let ledger = Arc::new(MockLedger::new(HORIZON));
        ledger.set_account(None);
        let poller = poller(&ledger, BackoffConfig::existence());

        let token = CancellationToken::new();
        let cancel = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(6)).await;
            cancel.cancel();
        });

        let result = poller.await_existence("GABC", Some(&token)).await;
        assert_eq!(result, Err(SyncError::Cancelled));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_wait_releases_its_fetch_slot() {
        let ledger = Arc::new(MockLedger::new(HORIZON));
        ledger.set_account(None);
        let governor = Arc::new(FetchGovernor::new(1));
        let reader = GovernedLedger::new(ledger.clone(), governor.clone());
        let poller = ExistencePoller::new(reader, BackoffConfig::existence());

        let blocker = governor.acquire(FetchPriority::Probe).await;
        let token = CancellationToken::new();
        let waiting = {
            let poller = poller.clone();
            let token = token.clone();
            tokio::spawn(async move { poller.await_existence("GABC", Some(&token)).await })
        };
        for _ in 0..5 {
            tokio::task::yield_now().await;
        }
        assert_eq!(governor.queued(), 1);
        assert_eq!(poller.pending(), 1);

        token.cancel();
        assert_eq!(waiting.await.unwrap(), Err(SyncError::Cancelled));
        assert_eq!(governor.queued(), 0);
        assert_eq!(poller.pending(), 0);

        drop(blocker);
        assert_eq!(governor.in_flight(), 0);
        let permit = tokio::time::timeout(
            Duration::from_secs(1),
            governor.acquire(FetchPriority::Probe),
        )
        .await;
        assert!(permit.is_ok());
        assert_eq!(ledger.calls("account"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_wins_over_ready_result() {
        let ledger = Arc::new(MockLedger::new(HORIZON));
        ledger.set_account(Some(account_record("GABC", "1")));
        let poller = poller(&ledger, BackoffConfig::existence());

        let token = CancellationToken::new();
        token.cancel();
        let result = poller.await_existence("GABC", Some(&token)).await;
        assert_eq!(result, Err(SyncError::Cancelled));
        assert_eq!(poller.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_other_waiter_survives_cancellation() {
        let ledger = Arc::new(MockLedger::new(HORIZON));
        ledger.script_account(Ok(None));
        ledger.set_account(Some(account_record("GABC", "3")));
        let poller = poller(&ledger, BackoffConfig::existence());

        let token = CancellationToken::new();
        token.cancel();
        let (cancelled, waited) = tokio::join!(
            poller.await_existence("GABC", Some(&token)),
            poller.await_existence("GABC", None)
        );
        assert_eq!(cancelled, Err(SyncError::Cancelled));
        let existence = waited.unwrap();
        assert!(existence.had_to_wait);
        assert_eq!(ledger.calls("account"), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unexpected_status_fails() {
        let ledger = Arc::new(MockLedger::new(HORIZON));
        ledger.script_account(Err(FetchError::RequestFailed {
            status: 500,
            url: format!("{}/accounts/GABC", HORIZON),
        }));

        let result = poller(&ledger, BackoffConfig::existence())
            .await_existence("GABC", None)
            .await;
        assert_eq!(result, Err(SyncError::RequestFailed { status: 500 }));
    }
}
