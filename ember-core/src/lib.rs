//! Ember Core - Single-Venue Crypto Market-Making Engine
//!
//! A market-making engine for one spot pair (default ETH-USD). Streams L2
//! order-book data, keeps a local top-of-book, quotes both sides at
//! configurable offsets, manages quote lifecycles, and arbitrates everything
//! through a risk subsystem with a circuit breaker.
//!
//! ## System Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                          ENGINE SUPERVISOR                       │
//! │                                                                  │
//! │  ┌────────────┐   SPSC ring    ┌────────────┐                    │
//! │  │ market-data│───────────────▶│  trading   │──▶ OrderGateway    │
//! │  │   worker   │                │   worker   │◀── fill events     │
//! │  └────────────┘                └────────────┘                    │
//! │       │   │                        │     │                       │
//! │       │   └─ MarketState (atomics) │     └─▶ Position / PnL      │
//! │       ▼                            ▼              │              │
//! │   Order Book                  Risk gate           ▼              │
//! │                                    ▲         PnL deltas          │
//! │  ┌────────────┐                    │              │              │
//! │  │ risk worker│────────────────────┴──────────────┘              │
//! │  └────────────┘   10 Hz: deltas → Risk, breaker → shutdown       │
//! │  ┌────────────┐                                                  │
//! │  │  metrics   │   1 Hz: rate window, 5 s / 10 s summaries        │
//! │  │   worker   │                                                  │
//! │  └────────────┘                                                  │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Data flows one way: market events apply to the [`orderbook::OrderBook`],
//! publish to [`market::MarketState`], and cross to the trading worker over a
//! lock-free [`sync::spsc`] ring. Quotes pass the [`risk::RiskManager`] gate
//! before submission; fills flow back into [`position::PositionTracker`],
//! which feeds realized-PnL deltas to risk. There are no cycles in the lock
//! graph - each component only ever takes its own lock.
//!
//! ## Core Modules
//!
//! - [`core`] - orders, fills, sides, identifiers, error taxonomy
//! - [`orderbook`] - L2 book mirror with top-of-book snapshots
//! - [`sync`] - bounded lock-free SPSC ring for inter-thread hand-off
//! - [`market`] - atomic top-of-book published by the market-data worker
//! - [`strategy`] - pure quote generation (offsets, skew, ladders)
//! - [`gateway`] - order submission capability + paper-mode simulator
//! - [`position`] - net position, average cost, realized PnL
//! - [`risk`] - pre-trade gate, limits, circuit breaker, event log
//! - [`metrics`] - hot counters, latency tracking, session report
//! - [`engine`] - worker threads, wiring, lifecycle
//!
//! ## Supporting Modules
//!
//! - [`config`] - `KEY=VALUE` configuration file
//! - [`data`] - market-data event types and source capability
//! - [`journal`] - append-only trade/pnl/orderbook/health log streams
//! - [`store`] - key-value order cache capability (may be a no-op)
//! - [`testing`] - scripted sources and helpers for tests

pub mod config;
pub mod core;
pub mod data;
pub mod engine;
pub mod gateway;
pub mod journal;
pub mod market;
pub mod metrics;
pub mod orderbook;
pub mod position;
pub mod risk;
pub mod store;
pub mod strategy;
pub mod sync;
pub mod testing;

pub use crate::core::{FillEvent, Order, OrderId, OrderKind, OrderStatus, Side};
pub use config::EngineConfig;
pub use engine::Engine;
pub use orderbook::{MarketSnapshot, OrderBook};

// Re-export error types
pub use anyhow::{Error, Result};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::config::EngineConfig;
    pub use crate::core::{FillEvent, Order, OrderId, OrderKind, OrderStatus, Side};
    pub use crate::data::{MarketDataSource, MarketEvent};
    pub use crate::engine::Engine;
    pub use crate::gateway::{OrderGateway, SubmitOutcome};
    pub use crate::orderbook::{MarketSnapshot, OrderBook};
    pub use crate::{Error, Result};
}
