//! Net position, average cost and realized PnL.
//!
//! All state lives behind a single mutex so a risk-gate decision that reads
//! the position observes every fill committed strictly before it. Fills apply
//! in arrival order; `prev_net` is always the net at the moment of the
//! previous fill.
//!
//! PnL accounting:
//! - a buy while flat or long re-weights the average cost over `|prev_net|`
//!   and the new lot; realized PnL is untouched
//! - a sell while long books `(price - avg_cost) * qty`
//! - the short side mirrors the long side: a sell while flat or short
//!   re-weights the average cost, a buy while short books
//!   `(avg_cost - price) * qty`

use crate::core::{FillEvent, Side};
use parking_lot::Mutex;
use rust_decimal::Decimal;

/// Point-in-time copy of the tracker state.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionSnapshot {
    pub net: Decimal,
    pub avg_cost: Decimal,
    pub realized_pnl: Decimal,
    /// Mark-to-last-fill estimate: `net * (last_fill_price - avg_cost)`.
    pub unrealized_pnl: Decimal,
    pub buy_trades: u64,
    pub sell_trades: u64,
    pub buy_volume: Decimal,
    pub sell_volume: Decimal,
}

impl PositionSnapshot {
    pub fn total_trades(&self) -> u64 {
        self.buy_trades + self.sell_trades
    }

    pub fn total_volume(&self) -> Decimal {
        self.buy_volume + self.sell_volume
    }

    pub fn total_pnl(&self) -> Decimal {
        self.realized_pnl + self.unrealized_pnl
    }
}

/// Result of applying one fill.
#[derive(Debug, Clone)]
pub struct FillOutcome {
    /// Realized-PnL increment from this fill (zero for inventory builds).
    pub pnl_delta: Decimal,
    /// State after the fill, for journaling.
    pub snapshot: PositionSnapshot,
}

#[derive(Debug, Default)]
struct PositionState {
    net: Decimal,
    avg_cost: Decimal,
    prev_net: Decimal,
    realized_pnl: Decimal,
    buy_trades: u64,
    sell_trades: u64,
    buy_volume: Decimal,
    sell_volume: Decimal,
    last_fill_price: Decimal,
    min_spread_bps: Option<f64>,
    max_spread_bps: Option<f64>,
}

impl PositionState {
    fn snapshot(&self) -> PositionSnapshot {
        let unrealized = self.net * (self.last_fill_price - self.avg_cost);
        PositionSnapshot {
            net: self.net,
            avg_cost: self.avg_cost,
            realized_pnl: self.realized_pnl,
            unrealized_pnl: unrealized,
            buy_trades: self.buy_trades,
            sell_trades: self.sell_trades,
            buy_volume: self.buy_volume,
            sell_volume: self.sell_volume,
        }
    }
}

/// Consumes fills; maintains net position, average cost and realized PnL.
#[derive(Debug, Default)]
pub struct PositionTracker {
    state: Mutex<PositionState>,
}

impl PositionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one fill and return the PnL delta plus the post-fill snapshot.
    pub fn on_fill(&self, fill: &FillEvent) -> FillOutcome {
        let mut state = self.state.lock();

        let prev = state.prev_net;
        let new_net = prev + fill.signed_qty();
        let mut pnl_delta = Decimal::ZERO;

        match fill.side {
            Side::Buy => {
                if prev < Decimal::ZERO {
                    // Reducing a short locks in PnL against its average cost.
                    pnl_delta = (state.avg_cost - fill.fill_price) * fill.fill_qty;
                } else if !new_net.is_zero() {
                    state.avg_cost = (state.avg_cost * prev.abs()
                        + fill.fill_qty * fill.fill_price)
                        / new_net.abs();
                } else {
                    state.avg_cost = fill.fill_price;
                }
                state.buy_trades += 1;
                state.buy_volume += fill.fill_qty;
            }
            Side::Sell => {
                if prev > Decimal::ZERO {
                    pnl_delta = (fill.fill_price - state.avg_cost) * fill.fill_qty;
                } else if !new_net.is_zero() {
                    state.avg_cost = (state.avg_cost * prev.abs()
                        + fill.fill_qty * fill.fill_price)
                        / new_net.abs();
                } else {
                    state.avg_cost = fill.fill_price;
                }
                state.sell_trades += 1;
                state.sell_volume += fill.fill_qty;
            }
        }

        state.net = new_net;
        state.prev_net = new_net;
        state.realized_pnl += pnl_delta;
        state.last_fill_price = fill.fill_price;

        FillOutcome {
            pnl_delta,
            snapshot: state.snapshot(),
        }
    }

    pub fn snapshot(&self) -> PositionSnapshot {
        self.state.lock().snapshot()
    }

    pub fn net(&self) -> Decimal {
        self.state.lock().net
    }

    pub fn realized_pnl(&self) -> Decimal {
        self.state.lock().realized_pnl
    }

    /// Record a spread observation for the session report.
    pub fn observe_spread(&self, spread_bps: f64) {
        if !spread_bps.is_finite() {
            return;
        }
        let mut state = self.state.lock();
        state.min_spread_bps = Some(state.min_spread_bps.map_or(spread_bps, |m| m.min(spread_bps)));
        state.max_spread_bps = Some(state.max_spread_bps.map_or(spread_bps, |m| m.max(spread_bps)));
    }

    /// `(min, max)` spread in bps observed this session, if any.
    pub fn spread_range(&self) -> Option<(f64, f64)> {
        let state = self.state.lock();
        match (state.min_spread_bps, state.max_spread_bps) {
            (Some(min), Some(max)) => Some((min, max)),
            _ => None,
        }
    }
}
