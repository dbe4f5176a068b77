//! Atomic top-of-book state published by the market-data worker.
//!
//! Five independent atomics: best bid, best ask, spread (bps), last update
//! timestamp and a monotonic sequence number. Prices are stored as u64
//! fixed-point with 9 decimal places so the fields stay lock-free on every
//! platform (no CAS-on-double). Readers get no cross-field consistency
//! guarantee; they treat the values as hints and must verify
//! `best_bid < best_ask` before acting, which [`MarketState::top_of_book`]
//! does for them.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Fixed-point conversion utilities (9 decimal places).
pub mod fixed_point {
    use super::*;

    /// Scale factor for 9 decimal places
    pub const SCALE: u64 = 1_000_000_000;

    /// Encode a decimal as u64 fixed-point. Out-of-range and negative values
    /// saturate to zero, which readers treat as "no price".
    #[inline]
    pub fn to_fixed(value: Decimal) -> u64 {
        (value * Decimal::from(SCALE)).to_u64().unwrap_or(0)
    }

    /// Decode u64 fixed-point back to a decimal.
    #[inline]
    pub fn from_fixed(value: u64) -> Decimal {
        Decimal::from(value) / Decimal::from(SCALE)
    }
}

/// Micro-bps scale for the spread field (1 bps = 1_000_000).
const BPS_SCALE: f64 = 1_000_000.0;

/// Lock-free snapshot of the top of book.
///
/// Written only by the market-data worker; read by the trading and risk
/// workers.
#[derive(Debug, Default)]
pub struct MarketState {
    best_bid: AtomicU64,
    best_ask: AtomicU64,
    spread_bps: AtomicU64,
    last_update_ns: AtomicU64,
    sequence: AtomicU64,
}

impl MarketState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish a new top of book. Returns the new sequence number.
    pub fn publish(&self, best_bid: Decimal, best_ask: Decimal, spread_bps: f64) -> u64 {
        self.best_bid
            .store(fixed_point::to_fixed(best_bid), Ordering::Release);
        self.best_ask
            .store(fixed_point::to_fixed(best_ask), Ordering::Release);
        self.spread_bps
            .store((spread_bps.max(0.0) * BPS_SCALE) as u64, Ordering::Release);
        self.last_update_ns.store(now_ns(), Ordering::Release);
        self.sequence.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Best bid, `None` until the first publish.
    pub fn best_bid(&self) -> Option<Decimal> {
        match self.best_bid.load(Ordering::Acquire) {
            0 => None,
            v => Some(fixed_point::from_fixed(v)),
        }
    }

    /// Best ask, `None` until the first publish.
    pub fn best_ask(&self) -> Option<Decimal> {
        match self.best_ask.load(Ordering::Acquire) {
            0 => None,
            v => Some(fixed_point::from_fixed(v)),
        }
    }

    /// Both sides, only when the observed pair is coherent (`bid < ask`).
    ///
    /// The two loads are not jointly consistent; an incoherent pair is
    /// dropped rather than acted on.
    pub fn top_of_book(&self) -> Option<(Decimal, Decimal)> {
        let bid = self.best_bid()?;
        let ask = self.best_ask()?;
        if bid < ask {
            Some((bid, ask))
        } else {
            None
        }
    }

    pub fn spread_bps(&self) -> f64 {
        self.spread_bps.load(Ordering::Acquire) as f64 / BPS_SCALE
    }

    pub fn sequence(&self) -> u64 {
        self.sequence.load(Ordering::Acquire)
    }

    pub fn last_update_ns(&self) -> u64 {
        self.last_update_ns.load(Ordering::Acquire)
    }

    /// Age of the last update in milliseconds.
    pub fn age_ms(&self) -> u64 {
        let last = self.last_update_ns();
        if last == 0 {
            return u64::MAX;
        }
        now_ns().saturating_sub(last) / 1_000_000
    }
}

fn now_ns() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_fixed_point_round_trip() {
        let price = dec!(2000.123456789);
        let fixed = fixed_point::to_fixed(price);
        assert_eq!(fixed, 2_000_123_456_789);
        assert_eq!(fixed_point::from_fixed(fixed), price);
    }

    #[test]
    fn test_fixed_point_negative_saturates() {
        assert_eq!(fixed_point::to_fixed(dec!(-1)), 0);
    }

    #[test]
    fn test_empty_state_reads_none() {
        let state = MarketState::new();
        assert!(state.best_bid().is_none());
        assert!(state.best_ask().is_none());
        assert!(state.top_of_book().is_none());
        assert_eq!(state.sequence(), 0);
    }

    #[test]
    fn test_publish_and_read_back() {
        let state = MarketState::new();
        let seq = state.publish(dec!(100.00), dec!(100.02), 2.0);

        assert_eq!(seq, 1);
        assert_eq!(state.best_bid(), Some(dec!(100.00)));
        assert_eq!(state.best_ask(), Some(dec!(100.02)));
        assert!((state.spread_bps() - 2.0).abs() < 1e-6);
        assert!(state.last_update_ns() > 0);
    }

    #[test]
    fn test_sequence_is_monotonic() {
        let state = MarketState::new();
        let a = state.publish(dec!(100), dec!(101), 100.0);
        let b = state.publish(dec!(100), dec!(101), 100.0);
        assert!(b > a);
    }

    #[test]
    fn test_crossed_hint_is_rejected() {
        let state = MarketState::new();
        state.publish(dec!(101), dec!(100), 0.0);
        assert!(state.top_of_book().is_none());
    }
}
