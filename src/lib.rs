//! # Trade Window SDK
//!
//! Streaming trade aggregation over a live WebSocket feed (BitMEX `trade`
//! table by default). Keeps a trailing time window of recent trades and
//! running high/low statistics, exposed as immutable snapshots.
//!
//! ## Quick Start
//! ```rust,ignore
//! use trade_window_sdk::prelude::*;
//!
//! let mut client = TradeStreamClient::new(FeedConfig::default())?;
//! client.start().await?;
//!
//! let mut updates = client.subscribe();
//! while updates.changed().await.is_ok() {
//!     let snapshot = updates.borrow_and_update().clone();
//!     println!("{} trades, {}", snapshot.window.len(), snapshot.stats);
//! }
//! ```
//!
//! Without a network connection, drive an [`AggregationEngine`] directly:
//! ```rust,ignore
//! let mut engine = AggregationEngine::default();
//! engine.ingest_message(r#"{"table":"trade","action":"insert","data":[...]}"#);
//! let snapshot = engine.snapshot();
//! ```

pub mod client;
pub mod data;
pub mod engine;
pub mod error;
pub mod extrema;
pub mod feed;
pub mod normalizer;
pub mod retry;
pub mod transport;
pub mod window;

pub use client::{FeedConfigBuilder, TradeStreamClient};
pub use data::*;
pub use engine::{AggregationEngine, EngineSnapshot, IngestReport, IngestStats};
pub use error::*;
pub use extrema::ExtremaTracker;
pub use feed::{FeedAdapter, FeedExit};
pub use normalizer::{BitmexNormalizer, EventNormalizer, FeedMessage};
pub use retry::{ReconnectPolicy, ReconnectPolicyBuilder};
pub use transport::{ChannelTransport, Transport, TransportEvent, WebSocketTransport};
pub use window::WindowStore;

/// Prelude - minimal public API surface
///
/// Import with: `use trade_window_sdk::prelude::*;`
pub mod prelude {
    /// Main entry point
    pub use crate::client::{FeedConfigBuilder, TradeStreamClient};

    /// Engine and snapshots
    pub use crate::engine::{AggregationEngine, EngineSnapshot};

    /// Core data types
    pub use crate::data::{ConnectionState, FeedConfig, HighLowStats, TradeRecord, TradeSide};

    /// Errors
    pub use crate::error::SdkError;
}

/// Initialize logging for the SDK
pub fn init_logging() {
    tracing_subscriber::fmt::init();
}
