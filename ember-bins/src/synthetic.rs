//! Synthetic L2 feed: a seeded random walk around a base price.
//!
//! Stands in for the venue transport in paper sessions. Emits one full
//! snapshot on subscribe, then incremental top-of-book updates at a fixed
//! cadence as the mid drifts.

use ember_core::core::TransportError;
use ember_core::data::{BookSide, LevelUpdate, MarketDataSource, MarketEvent};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use std::time::{Duration, Instant};

pub struct SyntheticSource {
    symbol: String,
    mid_cents: i64,
    tick_interval: Duration,
    last_emit: Instant,
    rng: StdRng,
    depth: usize,
    sent_snapshot: bool,
    closed: bool,
}

impl SyntheticSource {
    pub fn new(base_price: f64, tick_interval: Duration, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            symbol: String::new(),
            mid_cents: (base_price * 100.0) as i64,
            tick_interval,
            last_emit: Instant::now(),
            rng,
            depth: 10,
            sent_snapshot: false,
            closed: false,
        }
    }

    fn price(cents: i64) -> String {
        format!("{}", Decimal::new(cents, 2))
    }

    fn qty(&mut self) -> String {
        let qty = self.rng.gen_range(0.1..5.0);
        format!("{}", Decimal::from_f64(qty).unwrap_or(Decimal::ONE).round_dp(4))
    }

    fn snapshot(&mut self) -> MarketEvent {
        let mut updates = Vec::with_capacity(self.depth * 2);
        for i in 0..self.depth as i64 {
            let qty = self.qty();
            updates.push(LevelUpdate::new(
                BookSide::Bid,
                Self::price(self.mid_cents - 1 - i),
                qty,
            ));
            let qty = self.qty();
            updates.push(LevelUpdate::new(
                BookSide::Ask,
                Self::price(self.mid_cents + 1 + i),
                qty,
            ));
        }
        MarketEvent::Snapshot {
            symbol: self.symbol.clone(),
            updates,
        }
    }

    fn step(&mut self) -> MarketEvent {
        // Drift the mid by -2..=2 cents and refresh the touch.
        self.mid_cents += self.rng.gen_range(-2..=2);
        let bid_qty = self.qty();
        let ask_qty = self.qty();
        MarketEvent::Update {
            symbol: self.symbol.clone(),
            updates: vec![
                LevelUpdate::new(BookSide::Bid, Self::price(self.mid_cents - 1), bid_qty),
                LevelUpdate::new(BookSide::Ask, Self::price(self.mid_cents + 1), ask_qty),
            ],
        }
    }
}

impl MarketDataSource for SyntheticSource {
    fn subscribe(&mut self, symbol: &str, depth: usize) -> Result<(), TransportError> {
        self.symbol = symbol.to_string();
        self.depth = depth.max(1);
        self.sent_snapshot = false;
        Ok(())
    }

    fn next_event(&mut self, timeout: Duration) -> Result<Option<MarketEvent>, TransportError> {
        if self.closed {
            return Err(TransportError::Closed);
        }
        if !self.sent_snapshot {
            self.sent_snapshot = true;
            return Ok(Some(self.snapshot()));
        }
        let since_last = self.last_emit.elapsed();
        if since_last < self.tick_interval {
            std::thread::sleep((self.tick_interval - since_last).min(timeout));
        }
        if self.last_emit.elapsed() >= self.tick_interval {
            self.last_emit = Instant::now();
            return Ok(Some(self.step()));
        }
        Ok(None)
    }

    fn reconnect(&mut self) -> Result<(), TransportError> {
        self.closed = false;
        self.sent_snapshot = false;
        Ok(())
    }

    fn close(&mut self) {
        self.closed = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_then_updates() {
        let mut source = SyntheticSource::new(2000.0, Duration::from_millis(1), Some(7));
        source.subscribe("ETH-USD", 5).unwrap();

        let first = source.next_event(Duration::from_millis(10)).unwrap().unwrap();
        assert!(matches!(first, MarketEvent::Snapshot { .. }));
        if let MarketEvent::Snapshot { updates, .. } = first {
            assert_eq!(updates.len(), 10);
        }

        let second = source.next_event(Duration::from_millis(10)).unwrap().unwrap();
        assert!(matches!(second, MarketEvent::Update { .. }));
    }

    #[test]
    fn test_prices_straddle_the_mid() {
        let mut source = SyntheticSource::new(2000.0, Duration::from_millis(1), Some(1));
        source.subscribe("ETH-USD", 3).unwrap();

        let event = source.next_event(Duration::from_millis(10)).unwrap().unwrap();
        let MarketEvent::Snapshot { updates, .. } = event else {
            panic!("expected snapshot");
        };
        for update in updates {
            let price: f64 = update.price.parse().unwrap();
            match update.side {
                BookSide::Bid => assert!(price < 2000.0),
                BookSide::Ask => assert!(price > 2000.0),
            }
        }
    }

    #[test]
    fn test_closed_source_errors() {
        let mut source = SyntheticSource::new(2000.0, Duration::from_millis(1), Some(1));
        source.subscribe("ETH-USD", 3).unwrap();
        source.close();
        assert!(source.next_event(Duration::from_millis(1)).is_err());
    }
}
