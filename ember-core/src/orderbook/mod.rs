//! Local L2 order-book mirror for one symbol.
//!
//! Two ordered maps keyed by price: bids iterated descending, asks ascending.
//! The book is mutated only by the market-data worker; consumers see state
//! through [`OrderBook::snapshot`], which copies the top levels under the
//! caller's borrow, so no consumer ever observes a half-applied batch.
//!
//! Invariants held after every mutation:
//! - no stored level has zero quantity
//! - at most [`MAX_DEPTH`] levels per side, pruned from the far end
//! - a crossed top of book (bid >= ask) is accepted as a transient venue
//!   artifact: counted and logged, never "repaired"
//!
//! Malformed numeric fields drop only the offending entry; the rest of the
//! batch still applies.

use crate::core::ParseError;
use crate::data::{BookSide, LevelUpdate};
use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Maximum price levels retained per side.
pub const MAX_DEPTH: usize = 100;

/// Immutable view of the book's top, handed to the trading worker.
#[derive(Debug, Clone, PartialEq)]
pub struct MarketSnapshot {
    pub symbol: String,
    pub best_bid: Decimal,
    pub best_bid_qty: Decimal,
    pub best_ask: Decimal,
    pub best_ask_qty: Decimal,
    pub spread: Decimal,
    pub spread_bps: f64,
    /// Top-N bid levels, best first.
    pub bids: Vec<(Decimal, Decimal)>,
    /// Top-N ask levels, best first.
    pub asks: Vec<(Decimal, Decimal)>,
    pub timestamp: DateTime<Utc>,
    /// True iff both sides were non-empty at snapshot time.
    pub valid: bool,
}

impl MarketSnapshot {
    pub fn mid(&self) -> Decimal {
        (self.best_bid + self.best_ask) / Decimal::from(2)
    }
}

/// Book statistics for health reporting.
#[derive(Debug, Clone, Copy, Default)]
pub struct BookStats {
    pub update_count: u64,
    pub parse_errors: u64,
    pub dropped_batches: u64,
    pub crossed_observations: u64,
}

/// L2 order book for a single symbol.
#[derive(Debug)]
pub struct OrderBook {
    symbol: String,
    bids: BTreeMap<Decimal, Decimal>,
    asks: BTreeMap<Decimal, Decimal>,
    last_update_time: DateTime<Utc>,
    stats: BookStats,
}

impl OrderBook {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            bids: BTreeMap::new(),
            asks: BTreeMap::new(),
            last_update_time: Utc::now(),
            stats: BookStats::default(),
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn stats(&self) -> BookStats {
        self.stats
    }

    pub fn bid_levels(&self) -> usize {
        self.bids.len()
    }

    pub fn ask_levels(&self) -> usize {
        self.asks.len()
    }

    pub fn last_update_time(&self) -> DateTime<Utc> {
        self.last_update_time
    }

    /// Replace the whole book with the listed levels.
    ///
    /// Zero-quantity entries are dropped rather than stored. Returns the
    /// number of entries applied.
    pub fn apply_snapshot(&mut self, updates: &[LevelUpdate]) -> usize {
        self.bids.clear();
        self.asks.clear();
        self.apply_entries(updates)
    }

    /// Apply incremental changes: `qty == 0` removes the price level, any
    /// other quantity overwrites it. Returns the number of entries applied.
    pub fn apply_incremental(&mut self, updates: &[LevelUpdate]) -> usize {
        self.apply_entries(updates)
    }

    fn apply_entries(&mut self, updates: &[LevelUpdate]) -> usize {
        let mut applied = 0;
        for update in updates {
            match parse_level(update) {
                Ok((price, qty)) => {
                    let side = match update.side {
                        BookSide::Bid => &mut self.bids,
                        BookSide::Ask => &mut self.asks,
                    };
                    if qty.is_zero() {
                        side.remove(&price);
                    } else {
                        side.insert(price, qty);
                    }
                    applied += 1;
                }
                Err(err) => {
                    self.stats.parse_errors += 1;
                    debug!(symbol = %self.symbol, %err, "dropping malformed book entry");
                }
            }
        }

        self.prune();
        self.check_crossed();
        self.last_update_time = Utc::now();
        self.stats.update_count += 1;
        applied
    }

    /// Count a batch the source could not shape into level updates.
    pub fn record_dropped_batch(&mut self) {
        self.stats.dropped_batches += 1;
    }

    /// Keep at most MAX_DEPTH levels per side, pruning the far end.
    fn prune(&mut self) {
        // Far end: lowest bid, highest ask.
        while self.bids.len() > MAX_DEPTH {
            self.bids.pop_first();
        }
        while self.asks.len() > MAX_DEPTH {
            self.asks.pop_last();
        }
    }

    fn check_crossed(&mut self) {
        if let (Some((bid, _)), Some((ask, _))) = (self.best_bid(), self.best_ask()) {
            if bid >= ask {
                self.stats.crossed_observations += 1;
                warn!(
                    symbol = %self.symbol,
                    %bid,
                    %ask,
                    "crossed book observed (transient, not repaired)"
                );
            }
        }
    }

    pub fn best_bid(&self) -> Option<(Decimal, Decimal)> {
        self.bids.iter().next_back().map(|(p, q)| (*p, *q))
    }

    pub fn best_ask(&self) -> Option<(Decimal, Decimal)> {
        self.asks.iter().next().map(|(p, q)| (*p, *q))
    }

    /// Snapshot the top `n` levels of each side.
    pub fn snapshot(&self, n: usize) -> MarketSnapshot {
        let bids: Vec<(Decimal, Decimal)> = self
            .bids
            .iter()
            .rev()
            .take(n)
            .map(|(p, q)| (*p, *q))
            .collect();
        let asks: Vec<(Decimal, Decimal)> =
            self.asks.iter().take(n).map(|(p, q)| (*p, *q)).collect();

        let valid = !bids.is_empty() && !asks.is_empty();
        let (best_bid, best_bid_qty) = bids.first().copied().unwrap_or_default();
        let (best_ask, best_ask_qty) = asks.first().copied().unwrap_or_default();

        let spread = if valid { best_ask - best_bid } else { Decimal::ZERO };
        let mid = (best_bid + best_ask) / Decimal::from(2);
        let spread_bps = if valid && !mid.is_zero() {
            (spread / mid * Decimal::from(10_000)).to_f64().unwrap_or(0.0)
        } else {
            0.0
        };

        MarketSnapshot {
            symbol: self.symbol.clone(),
            best_bid,
            best_bid_qty,
            best_ask,
            best_ask_qty,
            spread,
            spread_bps,
            bids,
            asks,
            timestamp: self.last_update_time,
            valid,
        }
    }
}

fn parse_level(update: &LevelUpdate) -> Result<(Decimal, Decimal), ParseError> {
    let price: Decimal = update
        .price
        .trim()
        .parse()
        .map_err(|_| ParseError::BadPrice(update.price.clone()))?;
    let qty: Decimal = update
        .quantity
        .trim()
        .parse()
        .map_err(|_| ParseError::BadQuantity(update.quantity.clone()))?;
    if price <= Decimal::ZERO {
        return Err(ParseError::BadPrice(update.price.clone()));
    }
    if qty < Decimal::ZERO {
        return Err(ParseError::BadQuantity(update.quantity.clone()));
    }
    Ok((price, qty))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::BookSide::{Ask, Bid};

    fn level(side: BookSide, price: &str, qty: &str) -> LevelUpdate {
        LevelUpdate::new(side, price, qty)
    }

    fn seeded_book() -> OrderBook {
        let mut book = OrderBook::new("ETH-USD");
        book.apply_snapshot(&[
            level(Bid, "100.00", "1"),
            level(Bid, "99.99", "2"),
            level(Ask, "100.02", "1"),
            level(Ask, "100.03", "3"),
        ]);
        book
    }

    #[test]
    fn test_snapshot_construction() {
        let book = seeded_book();
        let snap = book.snapshot(10);

        assert!(snap.valid);
        assert_eq!(snap.best_bid, Decimal::new(10000, 2));
        assert_eq!(snap.best_ask, Decimal::new(10002, 2));
        assert_eq!(snap.spread, Decimal::new(2, 2));
        assert!((snap.spread_bps - 2.0).abs() < 0.01);
        assert_eq!(snap.bids.len(), 2);
        assert_eq!(snap.asks.len(), 2);
    }

    #[test]
    fn test_zero_quantity_removes_level() {
        let mut book = seeded_book();
        book.apply_incremental(&[level(Bid, "100.00", "0")]);

        let snap = book.snapshot(10);
        assert_eq!(snap.best_bid, Decimal::new(9999, 2));
    }

    #[test]
    fn test_snapshot_is_idempotent() {
        let updates = vec![
            level(Bid, "100.00", "1"),
            level(Ask, "100.02", "1"),
        ];
        let mut book = OrderBook::new("ETH-USD");
        book.apply_snapshot(&updates);
        let first = book.snapshot(10);
        book.apply_snapshot(&updates);
        let second = book.snapshot(10);

        assert_eq!(first.bids, second.bids);
        assert_eq!(first.asks, second.asks);
    }

    #[test]
    fn test_self_update_is_noop() {
        let mut book = seeded_book();
        let before = book.snapshot(10);

        // Set every current level to its current quantity.
        book.apply_incremental(&[
            level(Bid, "100.00", "1"),
            level(Bid, "99.99", "2"),
            level(Ask, "100.02", "1"),
            level(Ask, "100.03", "3"),
        ]);
        let after = book.snapshot(10);

        assert_eq!(before.bids, after.bids);
        assert_eq!(before.asks, after.asks);
    }

    #[test]
    fn test_malformed_entry_dropped_rest_applied() {
        let mut book = OrderBook::new("ETH-USD");
        let applied = book.apply_snapshot(&[
            level(Bid, "not-a-price", "1"),
            level(Bid, "99.99", "2"),
            level(Ask, "100.02", "oops"),
            level(Ask, "100.03", "3"),
        ]);

        assert_eq!(applied, 2);
        assert_eq!(book.stats().parse_errors, 2);

        let snap = book.snapshot(10);
        assert!(snap.valid);
        assert_eq!(snap.best_bid, Decimal::new(9999, 2));
        assert_eq!(snap.best_ask, Decimal::new(10003, 2));
    }

    #[test]
    fn test_dropped_batches_are_counted() {
        let mut book = OrderBook::new("ETH-USD");
        book.record_dropped_batch();
        book.record_dropped_batch();
        assert_eq!(book.stats().dropped_batches, 2);
    }

    #[test]
    fn test_no_zero_quantity_levels_stored() {
        let mut book = OrderBook::new("ETH-USD");
        book.apply_snapshot(&[
            level(Bid, "100.00", "0"),
            level(Bid, "99.99", "1"),
        ]);

        assert_eq!(book.bid_levels(), 1);
        assert_eq!(book.snapshot(10).best_bid, Decimal::new(9999, 2));
    }

    #[test]
    fn test_depth_cap_prunes_far_end() {
        let mut book = OrderBook::new("ETH-USD");
        let mut updates = Vec::new();
        for i in 0..150 {
            updates.push(level(Bid, &format!("{}", 1000 - i), "1"));
            updates.push(level(Ask, &format!("{}", 2000 + i), "1"));
        }
        book.apply_snapshot(&updates);

        assert_eq!(book.bid_levels(), MAX_DEPTH);
        assert_eq!(book.ask_levels(), MAX_DEPTH);

        // Best levels survive pruning; the far ends are gone.
        let snap = book.snapshot(1);
        assert_eq!(snap.best_bid, Decimal::from(1000));
        assert_eq!(snap.best_ask, Decimal::from(2000));
    }

    #[test]
    fn test_crossed_book_counted_not_repaired() {
        let mut book = OrderBook::new("ETH-USD");
        book.apply_snapshot(&[
            level(Bid, "100.05", "1"),
            level(Ask, "100.01", "1"),
        ]);

        assert_eq!(book.stats().crossed_observations, 1);
        let snap = book.snapshot(10);
        assert_eq!(snap.best_bid, Decimal::new(10005, 2));
        assert_eq!(snap.best_ask, Decimal::new(10001, 2));
    }

    #[test]
    fn test_one_sided_book_is_invalid() {
        let mut book = OrderBook::new("ETH-USD");
        book.apply_snapshot(&[level(Bid, "100.00", "1")]);

        let snap = book.snapshot(10);
        assert!(!snap.valid);
    }

    #[test]
    fn test_mid_price() {
        let snap = seeded_book().snapshot(10);
        assert_eq!(snap.mid(), Decimal::new(10001, 2));
    }
}
