//! Ledgerwatch Gateway
//!
//! Infrastructure adapters for the Ledgerwatch synchronization engine:
//! - Horizon REST adapter implementing the `LedgerApi` port
//! - Server-sent-events transport implementing the `PushTransport` port
//! - Primary/secondary Horizon selection
//!
//! ## Architecture
//!
//! ```text
//!        Horizon (REST + SSE)
//!               │
//!     ┌─────────┴─────────┐
//!     │                   │
//! ┌───▼──────────┐  ┌─────▼────────┐
//! │HorizonClient │  │ SseTransport │
//! │ (LedgerApi)  │  │(PushTransport│
//! └───┬──────────┘  └─────┬────────┘
//!     │                   │
//!     └─────────┬─────────┘
//!          ┌────▼────┐
//!          │  Sync   │
//!          │ engine  │
//!          └─────────┘
//! ```

pub mod adapters;
pub mod error;
pub mod transport;

// Re-export commonly used types
pub use adapters::horizon::{HorizonClient, HorizonConfig, select_horizon};
pub use error::HorizonError;
pub use transport::{SseDecoder, SseEvent, SseTransport};
