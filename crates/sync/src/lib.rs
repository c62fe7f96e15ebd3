//! Ledgerwatch Sync
//!
//! Synchronization engine that turns Horizon's request/response reads and
//! best-effort push streams into one live, ordered, deduplicated feed per
//! resource. Provides:
//! - `FetchGovernor`: bounded, prioritized outbound reads
//! - `ExistencePoller`: backoff wait for a not-yet-funded account
//! - `ReconnectingStreamClient`: one push connection kept alive
//! - `multiplexer`: per-resource driver merging baseline, push and poll
//! - `SubscriptionRegistry`: one live subscription per entity key
//! - `Feeds`: the facade wiring all of the above
//!
//! ## Architecture
//!
//! ```text
//!   Consumer
//!      │ feeds.account("G...")
//! ┌────▼─────┐     ┌──────────────┐
//! │ Registry │────►│ Subscription │◄─── driver task (multiplexer)
//! └──────────┘     └──────────────┘          │
//!                                  ┌─────────┼──────────────┐
//!                                  │         │              │
//!                           ┌──────▼───┐ ┌───▼──────┐ ┌─────▼─────┐
//!                           │ Governor │ │Existence │ │  Stream   │
//!                           │ (reads)  │ │  Poller  │ │  Client   │
//!                           └──────────┘ └──────────┘ └───────────┘
//! ```

pub mod account_cache;
pub mod backoff;
pub mod config;
pub mod error;
pub mod existence;
pub mod feeds;
pub mod governor;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod multiplexer;
pub mod reader;
pub mod registry;
pub mod stream_client;
pub mod subscription;

// Re-export commonly used types
pub use account_cache::AccountCache;
pub use config::{BackoffConfig, SyncConfig};
pub use error::{SyncError, SyncResult};
pub use existence::{Existence, ExistencePoller};
pub use feeds::Feeds;
pub use governor::{FetchGovernor, FetchPriority};
pub use multiplexer::{FeedAdapter, UpdateSource};
pub use registry::SubscriptionRegistry;
pub use stream_client::{LiveHandle, ReconnectingStreamClient, StreamHandlers};
pub use subscription::{Subscriber, Subscription, SubscriptionStatus};
