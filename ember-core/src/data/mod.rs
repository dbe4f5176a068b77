//! Market-data event types and the ingress capability.
//!
//! The exchange transport (WebSocket subscription flow, authentication) is an
//! external collaborator; the engine consumes a [`MarketDataSource`] that
//! yields parsed L2 events. Numeric fields arrive as decimal strings and are
//! parsed by the order book.

use crate::core::TransportError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Side of the book an L2 update applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BookSide {
    Bid,
    Ask,
}

/// One price-level change. `quantity == "0"` removes the level.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LevelUpdate {
    pub side: BookSide,
    pub price: String,
    pub quantity: String,
}

impl LevelUpdate {
    pub fn new(side: BookSide, price: impl Into<String>, quantity: impl Into<String>) -> Self {
        Self {
            side,
            price: price.into(),
            quantity: quantity.into(),
        }
    }
}

/// A parsed L2 event from the venue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum MarketEvent {
    /// Replace the book with the listed levels.
    Snapshot {
        symbol: String,
        updates: Vec<LevelUpdate>,
    },
    /// Incremental changes; zero-quantity entries remove levels.
    Update {
        symbol: String,
        updates: Vec<LevelUpdate>,
    },
}

impl MarketEvent {
    pub fn symbol(&self) -> &str {
        match self {
            MarketEvent::Snapshot { symbol, .. } | MarketEvent::Update { symbol, .. } => symbol,
        }
    }
}

/// Ingress capability yielding parsed L2 events.
///
/// `next_event` blocks for at most `timeout` and returns `Ok(None)` when no
/// event arrived in that window. A `TransportError::Disconnected` return asks
/// the market-data worker to run its reconnect/backoff loop;
/// `TransportError::Closed` means the stream is finished for good.
pub trait MarketDataSource: Send {
    fn subscribe(&mut self, symbol: &str, depth: usize) -> Result<(), TransportError>;

    fn next_event(&mut self, timeout: Duration) -> Result<Option<MarketEvent>, TransportError>;

    /// Re-establish a dropped connection. Sources that cannot reconnect keep
    /// the default and the worker gives up after its reconnect attempts.
    fn reconnect(&mut self) -> Result<(), TransportError> {
        Err(TransportError::Closed)
    }

    fn close(&mut self);
}

/// Exponential reconnect backoff: 250 ms, 500 ms, 1 s, ... capped at 10 s.
#[derive(Debug, Clone)]
pub struct Backoff {
    attempt: u32,
    base: Duration,
    max: Duration,
}

impl Backoff {
    pub fn new() -> Self {
        Self {
            attempt: 0,
            base: Duration::from_millis(250),
            max: Duration::from_secs(10),
        }
    }

    /// Delay to sleep before the next attempt; doubles each call.
    pub fn next_delay(&mut self) -> Duration {
        let exp = self.attempt.min(16);
        self.attempt += 1;
        self.base.saturating_mul(1u32 << exp).min(self.max)
    }

    pub fn attempts(&self) -> u32 {
        self.attempt
    }

    pub fn reset(&mut self) {
        self.attempt = 0;
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_and_caps() {
        let mut backoff = Backoff::new();
        assert_eq!(backoff.next_delay(), Duration::from_millis(250));
        assert_eq!(backoff.next_delay(), Duration::from_millis(500));
        assert_eq!(backoff.next_delay(), Duration::from_secs(1));

        for _ in 0..10 {
            backoff.next_delay();
        }
        assert_eq!(backoff.next_delay(), Duration::from_secs(10));
    }

    #[test]
    fn test_backoff_reset() {
        let mut backoff = Backoff::new();
        backoff.next_delay();
        backoff.next_delay();
        assert_eq!(backoff.attempts(), 2);

        backoff.reset();
        assert_eq!(backoff.attempts(), 0);
        assert_eq!(backoff.next_delay(), Duration::from_millis(250));
    }

    #[test]
    fn test_event_symbol_accessor() {
        let event = MarketEvent::Update {
            symbol: "ETH-USD".to_string(),
            updates: vec![LevelUpdate::new(BookSide::Bid, "100.00", "1.5")],
        };
        assert_eq!(event.symbol(), "ETH-USD");
    }
}
