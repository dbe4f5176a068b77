//! Quote generation: market snapshot + inventory -> quoting decision.
//!
//! [`generate_quotes`] is a pure function of its inputs, so the whole
//! strategy is unit-testable without any of the engine's plumbing. The
//! resulting [`QuoteSet`] expands into a ladder of limit orders at widening
//! offsets.
//!
//! Quote shaping, in order:
//! 1. offset each side away from the touch by `spread_offset_ticks`
//! 2. enforce a minimum spread, recentering around mid when violated
//! 3. skew sizes against inventory outside the neutral band (halve the
//!    compounding side, scale the reducing side by `imbalance_factor`, widen
//!    the reducing offset) - a quote never crosses the market
//! 4. penalize the compounding side by `1 - |q|/hard_cap`; at the cap that
//!    side stops quoting entirely

use crate::core::Side;
use crate::orderbook::MarketSnapshot;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Parameters of the quoting function.
#[derive(Debug, Clone, PartialEq)]
pub struct QuoteParams {
    /// Price increment of the venue.
    pub tick_size: Decimal,
    /// Quote this many ticks away from the touch.
    pub spread_offset_ticks: Decimal,
    /// Never quote tighter than this many ticks.
    pub min_spread_ticks: Decimal,
    /// Base per-side quantity.
    pub order_size: Decimal,
    /// Inventory window within which quoting stays symmetric.
    pub neutral_band: Decimal,
    /// Size multiplier on the inventory-reducing side when skewed.
    pub imbalance_factor: Decimal,
    /// Hard cap on |net inventory|.
    pub hard_cap: Decimal,
    /// Number of ladder levels per side (>= 1).
    pub levels: u32,
}

impl Default for QuoteParams {
    fn default() -> Self {
        Self {
            tick_size: dec!(0.01),
            spread_offset_ticks: dec!(0.25),
            min_spread_ticks: dec!(0.5),
            order_size: dec!(0.01),
            neutral_band: dec!(0.01),
            imbalance_factor: dec!(1.5),
            hard_cap: dec!(0.1),
            levels: 5,
        }
    }
}

/// One rung of the quote ladder.
#[derive(Debug, Clone, PartialEq)]
pub struct QuoteLevel {
    pub side: Side,
    pub price: Decimal,
    pub quantity: Decimal,
    /// Ladder index, 0 = closest to the touch.
    pub level: u32,
}

/// A quoting decision for one market observation.
#[derive(Debug, Clone, PartialEq)]
pub struct QuoteSet {
    pub place_bid: bool,
    pub place_ask: bool,
    pub bid_price: Decimal,
    pub bid_quantity: Decimal,
    pub ask_price: Decimal,
    pub ask_quantity: Decimal,
    pub levels: u32,
}

impl QuoteSet {
    /// Expand into per-level orders: rung `k` sits `k * tick * 0.1` farther
    /// out with size scaled by `1 - 0.1k`.
    pub fn ladder(&self, tick_size: Decimal) -> Vec<QuoteLevel> {
        let step = tick_size * dec!(0.1);
        let mut out = Vec::with_capacity(self.levels as usize * 2);

        for k in 0..self.levels {
            let offset = step * Decimal::from(k);
            let scale = Decimal::ONE - dec!(0.1) * Decimal::from(k);
            if scale <= Decimal::ZERO {
                break;
            }

            if self.place_bid {
                let qty = self.bid_quantity * scale;
                if qty > Decimal::ZERO {
                    out.push(QuoteLevel {
                        side: Side::Buy,
                        price: self.bid_price - offset,
                        quantity: qty,
                        level: k,
                    });
                }
            }
            if self.place_ask {
                let qty = self.ask_quantity * scale;
                if qty > Decimal::ZERO {
                    out.push(QuoteLevel {
                        side: Side::Sell,
                        price: self.ask_price + offset,
                        quantity: qty,
                        level: k,
                    });
                }
            }
        }
        out
    }
}

/// Compute the quoting decision for the current market and inventory.
///
/// Returns `None` when the snapshot is not valid (one-sided book).
pub fn generate_quotes(
    snapshot: &MarketSnapshot,
    inventory: Decimal,
    params: &QuoteParams,
) -> Option<QuoteSet> {
    // A one-sided or crossed book is not quotable.
    if !snapshot.valid || snapshot.best_bid >= snapshot.best_ask {
        return None;
    }

    let tick = params.tick_size;
    let offset = params.spread_offset_ticks * tick;

    let mut bid_price = snapshot.best_bid - offset;
    let mut ask_price = snapshot.best_ask + offset;

    // Never quote tighter than the minimum spread.
    let min_width = params.min_spread_ticks * tick;
    if ask_price - bid_price < min_width {
        let mid = snapshot.mid();
        let half = min_width / Decimal::from(2);
        bid_price = mid - half;
        ask_price = mid + half;
    }

    let mut bid_qty = params.order_size;
    let mut ask_qty = params.order_size;

    // Inventory skew: bias toward mean reversion outside the neutral band,
    // keeping every quote passive.
    if inventory.abs() > params.neutral_band {
        if inventory > Decimal::ZERO {
            bid_qty *= dec!(0.5);
            ask_qty *= params.imbalance_factor;
            ask_price = snapshot.best_ask + tick * dec!(1.5);
        } else {
            ask_qty *= dec!(0.5);
            bid_qty *= params.imbalance_factor;
            bid_price = snapshot.best_bid - tick * dec!(1.5);
        }
    }

    // Inventory penalty on the side that would grow |q|; zero at the cap.
    if !params.hard_cap.is_zero() && !inventory.is_zero() {
        let utilization = (inventory.abs() / params.hard_cap).min(Decimal::ONE);
        let penalty = Decimal::ONE - utilization;
        if inventory > Decimal::ZERO {
            bid_qty *= penalty;
        } else {
            ask_qty *= penalty;
        }
    }

    // A limit quote must never cross the market.
    debug_assert!(bid_price < snapshot.best_ask);
    debug_assert!(ask_price > snapshot.best_bid);

    Some(QuoteSet {
        place_bid: bid_qty > Decimal::ZERO,
        place_ask: ask_qty > Decimal::ZERO,
        bid_price,
        bid_quantity: bid_qty,
        ask_price,
        ask_quantity: ask_qty,
        levels: params.levels.max(1),
    })
}
