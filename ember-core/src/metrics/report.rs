//! End-of-session summary block.
//!
//! A fixed-format human-readable report bracketed by a banner of 80 `=`
//! characters, written to the session-summary log on shutdown.

use crate::metrics::MetricsSnapshot;
use crate::position::PositionSnapshot;
use chrono::{DateTime, Local};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::fmt::Write as _;

const BANNER_WIDTH: usize = 80;

/// Everything the reporter needs, gathered at shutdown.
#[derive(Debug, Clone)]
pub struct SessionReport {
    pub symbol: String,
    pub session_start: DateTime<Local>,
    pub session_end: DateTime<Local>,
    pub position: PositionSnapshot,
    pub metrics: MetricsSnapshot,
    /// `(min, max)` spread in bps observed during the session.
    pub spread_range: Option<(f64, f64)>,
}

impl SessionReport {
    /// Base currency of the symbol, e.g. `ETH` for `ETH-USD`.
    fn base_asset(&self) -> &str {
        self.symbol.split('-').next().unwrap_or(&self.symbol)
    }

    /// Render the fixed-format summary block.
    pub fn render(&self) -> String {
        let banner = "=".repeat(BANNER_WIDTH);
        let duration_secs = (self.session_end - self.session_start)
            .num_milliseconds()
            .max(0) as f64
            / 1_000.0;
        let position = &self.position;
        let metrics = &self.metrics;
        let base = self.base_asset();

        let total_trades = position.total_trades();
        let total_volume = position.total_volume();
        let trade_rate = if duration_secs > 0.0 {
            total_trades as f64 / duration_secs
        } else {
            0.0
        };

        let mut out = String::new();
        let _ = writeln!(out, "\n{}", banner);
        let _ = writeln!(out, "{:^80}", "TRADING SESSION SUMMARY");
        let _ = writeln!(out, "{}", banner);
        let _ = writeln!(
            out,
            "Session Start: {}",
            self.session_start.format("%Y-%m-%d %H:%M:%S")
        );
        let _ = writeln!(
            out,
            "Session End:   {}",
            self.session_end.format("%Y-%m-%d %H:%M:%S")
        );
        let _ = writeln!(
            out,
            "Duration: {:.0} seconds ({:.2} minutes)\n",
            duration_secs,
            duration_secs / 60.0
        );

        let _ = writeln!(out, "TRADING PERFORMANCE:");
        let _ = writeln!(out, "  Total Trades Executed: {}", total_trades);
        let _ = writeln!(out, "  Buy Trades: {}", position.buy_trades);
        let _ = writeln!(out, "  Sell Trades: {}", position.sell_trades);
        let _ = writeln!(out, "  Trade Rate: {:.2} trades/second", trade_rate);
        let _ = writeln!(out, "  Total Volume: {:.8} {}", total_volume, base);
        let _ = writeln!(out, "  Buy Volume:  {:.8} {}", position.buy_volume, base);
        let _ = writeln!(out, "  Sell Volume: {:.8} {}\n", position.sell_volume, base);

        let _ = writeln!(out, "SPREAD ANALYSIS:");
        match self.spread_range {
            Some((min, max)) => {
                let _ = writeln!(out, "  Min Spread: {:.3} bps", min);
                let _ = writeln!(out, "  Max Spread: {:.3} bps", max);
            }
            None => {
                let _ = writeln!(out, "  No spread data recorded");
            }
        }
        let _ = writeln!(out);

        let _ = writeln!(out, "PROFIT & LOSS:");
        let _ = writeln!(out, "  Final Position: {:.8}", position.net);
        let _ = writeln!(out, "  Realized PnL: ${:.4}", position.realized_pnl);
        let _ = writeln!(out, "  Average Cost: ${:.2}", position.avg_cost);
        if total_trades > 0 {
            let round_trips = (total_trades / 2).max(1);
            let per_trade = position.realized_pnl / Decimal::from(round_trips);
            let _ = writeln!(out, "  PnL per Round Trip: ${:.6}", per_trade);
        }
        let _ = writeln!(out);

        let _ = writeln!(out, "SYSTEM STATISTICS:");
        let _ = writeln!(out, "  Orders Placed: {}", metrics.orders_placed);
        let _ = writeln!(out, "  Orders Filled: {}", metrics.orders_filled);
        let _ = writeln!(out, "  Orders Canceled: {}", metrics.orders_canceled);
        let _ = writeln!(out, "  Orders Failed: {}", metrics.orders_failed);
        if metrics.orders_placed > 0 {
            let _ = writeln!(out, "  Fill Rate: {:.1}%", metrics.fill_rate_pct());
        }
        let _ = writeln!(out);

        let _ = writeln!(out, "MARKET MAKING:");
        if position.buy_trades > 0 && position.sell_trades > 0 {
            let balance = position.buy_trades.min(position.sell_trades) as f64 * 100.0
                / position.buy_trades.max(position.sell_trades) as f64;
            let _ = writeln!(out, "  Buy/Sell Balance: {:.1}%", balance);
        }
        if total_volume > Decimal::ZERO && duration_secs > 0.0 {
            let turnover = total_volume.to_f64().unwrap_or(0.0) / duration_secs;
            let _ = writeln!(out, "  Turnover Rate: {:.8} {}/second", turnover, base);
        }

        let _ = writeln!(out, "{}", banner);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{FillEvent, OrderId, Side};
    use crate::position::PositionTracker;
    use rust_decimal_macros::dec;

    fn matched_session_report() -> SessionReport {
        // Exactly 3 BUY fills and 3 SELL fills of 0.01 at 100/101.
        let tracker = PositionTracker::new();
        for _ in 0..3 {
            tracker.on_fill(&FillEvent::new(
                OrderId::generate(),
                Side::Buy,
                dec!(0.01),
                dec!(100),
            ));
            tracker.on_fill(&FillEvent::new(
                OrderId::generate(),
                Side::Sell,
                dec!(0.01),
                dec!(101),
            ));
        }

        let start = Local::now() - chrono::Duration::seconds(60);
        SessionReport {
            symbol: "ETH-USD".to_string(),
            session_start: start,
            session_end: Local::now(),
            position: tracker.snapshot(),
            metrics: MetricsSnapshot {
                orders_placed: 12,
                orders_filled: 6,
                orders_canceled: 4,
                orders_failed: 2,
                ..MetricsSnapshot::default()
            },
            spread_range: Some((1.0, 4.2)),
        }
    }

    #[test]
    fn test_matched_session_summary() {
        let report = matched_session_report();
        let text = report.render();

        assert!(text.contains("Total Trades Executed: 6"));
        assert!(text.contains("Buy Trades: 3"));
        assert!(text.contains("Sell Trades: 3"));
        assert!(text.contains("Final Position: 0.00000000"));
        // 3 round trips of 0.01 at a $1 edge each.
        assert!(text.contains("Realized PnL: $0.0300"));
    }

    #[test]
    fn test_banner_is_80_equals() {
        let text = matched_session_report().render();
        let banner = "=".repeat(80);
        assert!(text.contains(&banner));
        assert!(!text.contains(&"=".repeat(81)));
    }

    #[test]
    fn test_fill_rate_and_balance_lines() {
        let text = matched_session_report().render();
        assert!(text.contains("Fill Rate: 50.0%"));
        assert!(text.contains("Buy/Sell Balance: 100.0%"));
        assert!(text.contains("Orders Canceled: 4"));
        assert!(text.contains("Orders Failed: 2"));
    }

    #[test]
    fn test_empty_session_renders() {
        let report = SessionReport {
            symbol: "ETH-USD".to_string(),
            session_start: Local::now(),
            session_end: Local::now(),
            position: PositionTracker::new().snapshot(),
            metrics: MetricsSnapshot::default(),
            spread_range: None,
        };
        let text = report.render();
        assert!(text.contains("No spread data recorded"));
        assert!(text.contains("Total Trades Executed: 0"));
    }
}
