//! Bounded, prioritized admission of outbound reads
//!
//! At most `max_concurrent` governed fetches run at once across the process.
//! Further fetches wait in one queue ordered by [`FetchPriority`], FIFO
//! within a class. A finishing fetch hands its slot directly to the best
//! waiter, so the count of running fetches never dips and rises again while
//! work is queued.

use std::cmp::Reverse;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use parking_lot::Mutex;
use priority_queue::PriorityQueue;
use tokio::sync::oneshot;

/// Service class of a governed fetch; higher variants are served first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FetchPriority {
    /// Full-resource reads (account record)
    Baseline,
    /// List reads (transactions, offers, order book)
    Collection,
    /// Single most-recent-item lookups (latest effect)
    Probe,
}

struct GovernorState {
    running: usize,
    queue: PriorityQueue<u64, (FetchPriority, Reverse<u64>)>,
    waiters: HashMap<u64, oneshot::Sender<Permit>>,
    next_seq: u64,
}

struct Shared {
    max_concurrent: usize,
    state: Mutex<GovernorState>,
}

impl Shared {
    fn release(self: &Arc<Self>) {
        loop {
            let waiter = {
                let mut state = self.state.lock();
                match state.queue.pop() {
                    Some((seq, _)) => state.waiters.remove(&seq),
                    None => {
                        state.running = state.running.saturating_sub(1);
                        return;
                    }
                }
            };

            let Some(tx) = waiter else { continue };
            let permit = Permit {
                shared: Arc::clone(self),
                armed: true,
            };
            match tx.send(permit) {
                Ok(()) => return,
                // Waiter gave up between pop and send; try the next one
                Err(mut permit) => permit.armed = false,
            }
        }
    }
}

/// One running slot; released when dropped
pub struct Permit {
    shared: Arc<Shared>,
    armed: bool,
}

impl Drop for Permit {
    fn drop(&mut self) {
        if self.armed {
            self.shared.release();
        }
    }
}

/// Removes an abandoned waiter from the queue
struct QueuedTicket {
    shared: Arc<Shared>,
    seq: u64,
    active: bool,
}

impl Drop for QueuedTicket {
    fn drop(&mut self) {
        if self.active {
            let mut state = self.shared.state.lock();
            state.queue.remove(&self.seq);
            state.waiters.remove(&self.seq);
        }
    }
}

enum Admission {
    Ready(Permit),
    Queued(QueuedTicket, oneshot::Receiver<Permit>),
}

/// Process-wide fetch governor, shared by `Arc`
pub struct FetchGovernor {
    shared: Arc<Shared>,
}

impl FetchGovernor {
    pub fn new(max_concurrent: usize) -> Self {
        FetchGovernor {
            shared: Arc::new(Shared {
                max_concurrent: max_concurrent.max(1),
                state: Mutex::new(GovernorState {
                    running: 0,
                    queue: PriorityQueue::new(),
                    waiters: HashMap::new(),
                    next_seq: 0,
                }),
            }),
        }
    }

    pub fn max_concurrent(&self) -> usize {
        self.shared.max_concurrent
    }

    /// Fetches currently holding a slot
    pub fn in_flight(&self) -> usize {
        self.shared.state.lock().running
    }

    /// Fetches waiting for a slot
    pub fn queued(&self) -> usize {
        self.shared.state.lock().queue.len()
    }

    fn admit(&self, priority: FetchPriority) -> Admission {
        let mut state = self.shared.state.lock();
        if state.running < self.shared.max_concurrent && state.queue.is_empty() {
            state.running += 1;
            return Admission::Ready(Permit {
                shared: Arc::clone(&self.shared),
                armed: true,
            });
        }

        let seq = state.next_seq;
        state.next_seq += 1;
        let (tx, rx) = oneshot::channel();
        state.queue.push(seq, (priority, Reverse(seq)));
        state.waiters.insert(seq, tx);

        Admission::Queued(
            QueuedTicket {
                shared: Arc::clone(&self.shared),
                seq,
                active: true,
            },
            rx,
        )
    }

    /// Wait for a running slot
    ///
    /// Dropping the returned future while queued removes the waiter.
    pub async fn acquire(&self, priority: FetchPriority) -> Permit {
        loop {
            match self.admit(priority) {
                Admission::Ready(permit) => return permit,
                Admission::Queued(mut ticket, rx) => {
                    if let Ok(permit) = rx.await {
                        ticket.active = false;
                        return permit;
                    }
                    // Sender vanished without a slot; queue again
                }
            }
        }
    }

    /// Run `task` once a slot is free; its result goes to this caller only
    pub async fn submit<F, Fut, T>(&self, priority: FetchPriority, task: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let _permit = self.acquire(priority).await;
        task().await
    }
}
