//! Append-only log streams: main, orderbook, trades, pnl, health.
//!
//! Every line starts with a `YYYY-MM-DD HH:MM:SS.mmm` local timestamp. The
//! trades and pnl streams use fixed formats consumed by downstream tooling:
//!
//! ```text
//! <ts> <symbol> <side> <qty:.8> @ $<price:.2> Value: $<value:.2> [ID: <id>]
//! <ts> <symbol> Position: <net:.8> AvgPrice: $<avg:.2> RealizedPnL: $<r:.2> \
//!      UnrealizedPnL: $<u:.2> TotalPnL: $<t:.2> [Trade: <id>]
//! ```
//!
//! Structured engine logging goes through `tracing`; these streams are the
//! flat files operators tail during a session.

use crate::core::{OrderId, Side};
use chrono::Local;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

/// One append-only stream.
struct Stream {
    writer: Mutex<Box<dyn Write + Send>>,
}

impl Stream {
    fn file(path: &Path) -> io::Result<Self> {
        let file: File = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            writer: Mutex::new(Box::new(file)),
        })
    }

    fn sink() -> Self {
        Self {
            writer: Mutex::new(Box::new(io::sink())),
        }
    }

    fn write_line(&self, line: &str) {
        let mut writer = self.writer.lock();
        // A failed journal write must never take down the trading path.
        let _ = writeln!(writer, "{}", line);
        let _ = writer.flush();
    }
}

/// The five session log streams.
pub struct Journals {
    main: Stream,
    orderbook: Stream,
    trades: Stream,
    pnl: Stream,
    health: Stream,
}

impl Journals {
    /// Open (creating as needed) the five streams under `dir`.
    pub fn open(dir: impl AsRef<Path>) -> io::Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;
        Ok(Self {
            main: Stream::file(&dir.join("main.log"))?,
            orderbook: Stream::file(&dir.join("orderbook.log"))?,
            trades: Stream::file(&dir.join("trades.log"))?,
            pnl: Stream::file(&dir.join("pnl.log"))?,
            health: Stream::file(&dir.join("health.log"))?,
        })
    }

    /// Journals that discard everything (file logging disabled, tests).
    pub fn disabled() -> Self {
        Self {
            main: Stream::sink(),
            orderbook: Stream::sink(),
            trades: Stream::sink(),
            pnl: Stream::sink(),
            health: Stream::sink(),
        }
    }

    fn timestamp() -> String {
        Local::now().format("%Y-%m-%d %H:%M:%S%.3f").to_string()
    }

    /// Engine lifecycle and free-form messages.
    pub fn log_main(&self, message: &str) {
        self.main
            .write_line(&format!("{} {}", Self::timestamp(), message));
    }

    /// Top-of-book observation.
    pub fn log_orderbook(
        &self,
        symbol: &str,
        best_bid: Decimal,
        bid_qty: Decimal,
        best_ask: Decimal,
        ask_qty: Decimal,
    ) {
        self.orderbook.write_line(&format!(
            "{} {} Bid: {:.2} x {:.8} | Ask: {:.2} x {:.8}",
            Self::timestamp(),
            symbol,
            best_bid,
            bid_qty,
            best_ask,
            ask_qty,
        ));
    }

    /// Executed trade, fixed format.
    pub fn log_trade(
        &self,
        symbol: &str,
        side: Side,
        quantity: Decimal,
        price: Decimal,
        order_id: &OrderId,
    ) {
        let value = quantity * price;
        self.trades.write_line(&format!(
            "{} {} {} {:.8} @ ${:.2} Value: ${:.2} [ID: {}]",
            Self::timestamp(),
            symbol,
            side,
            quantity,
            price,
            value,
            order_id,
        ));
    }

    /// Post-fill position and PnL, fixed format.
    #[allow(clippy::too_many_arguments)]
    pub fn log_pnl(
        &self,
        symbol: &str,
        net: Decimal,
        avg_price: Decimal,
        realized_pnl: Decimal,
        unrealized_pnl: Decimal,
        total_pnl: Decimal,
        trade_id: &OrderId,
    ) {
        self.pnl.write_line(&format!(
            "{} {} Position: {:.8} AvgPrice: ${:.2} RealizedPnL: ${:.2} UnrealizedPnL: ${:.2} TotalPnL: ${:.2} [Trade: {}]",
            Self::timestamp(),
            symbol,
            net,
            avg_price,
            realized_pnl,
            unrealized_pnl,
            total_pnl,
            trade_id,
        ));
    }

    /// Component health transition or probe.
    pub fn log_health(&self, component: &str, healthy: bool, details: &str) {
        let status = if healthy { "HEALTHY" } else { "UNHEALTHY" };
        self.health.write_line(&format!(
            "{} {} {} {}",
            Self::timestamp(),
            component,
            status,
            details,
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn read(path: &Path) -> String {
        fs::read_to_string(path).unwrap()
    }

    #[test]
    fn test_trade_line_format() {
        let dir = tempfile::tempdir().unwrap();
        let journals = Journals::open(dir.path()).unwrap();

        let id = OrderId::new("HFT_1700000000000_123456");
        journals.log_trade("ETH-USD", Side::Buy, dec!(0.01), dec!(2000.25), &id);

        let contents = read(&dir.path().join("trades.log"));
        let line = contents.lines().next().unwrap();

        // <ts> <symbol> <side> <qty> @ $<price> Value: $<value> [ID: <id>]
        assert!(line.contains(
            "ETH-USD BUY 0.01000000 @ $2000.25 Value: $20.00 [ID: HFT_1700000000000_123456]"
        ));

        // Timestamp prefix: YYYY-MM-DD HH:MM:SS.mmm
        let ts = &line[..23];
        assert_eq!(&ts[4..5], "-");
        assert_eq!(&ts[10..11], " ");
        assert_eq!(&ts[19..20], ".");
    }

    #[test]
    fn test_pnl_line_format() {
        let dir = tempfile::tempdir().unwrap();
        let journals = Journals::open(dir.path()).unwrap();

        let id = OrderId::new("abc123");
        journals.log_pnl(
            "ETH-USD",
            dec!(0.02),
            dec!(2000),
            dec!(1.5),
            dec!(-0.25),
            dec!(1.25),
            &id,
        );

        let contents = read(&dir.path().join("pnl.log"));
        assert!(contents.contains(
            "ETH-USD Position: 0.02000000 AvgPrice: $2000.00 RealizedPnL: $1.50 \
             UnrealizedPnL: $-0.25 TotalPnL: $1.25 [Trade: abc123]"
        ));
    }

    #[test]
    fn test_streams_are_separate_files() {
        let dir = tempfile::tempdir().unwrap();
        let journals = Journals::open(dir.path()).unwrap();

        journals.log_main("engine started");
        journals.log_health("gateway", true, "paper mode");
        journals.log_orderbook("ETH-USD", dec!(100.00), dec!(1), dec!(100.02), dec!(2));

        assert!(read(&dir.path().join("main.log")).contains("engine started"));
        assert!(read(&dir.path().join("health.log")).contains("gateway HEALTHY paper mode"));
        assert!(read(&dir.path().join("orderbook.log"))
            .contains("ETH-USD Bid: 100.00 x 1.00000000 | Ask: 100.02 x 2.00000000"));
    }

    #[test]
    fn test_append_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let journals = Journals::open(dir.path()).unwrap();
            journals.log_main("first");
        }
        {
            let journals = Journals::open(dir.path()).unwrap();
            journals.log_main("second");
        }

        let contents = read(&dir.path().join("main.log"));
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("first"));
        assert!(lines[1].ends_with("second"));
    }

    #[test]
    fn test_disabled_journals_swallow_writes() {
        let journals = Journals::disabled();
        journals.log_main("nowhere");
        journals.log_trade(
            "ETH-USD",
            Side::Sell,
            dec!(1),
            dec!(1),
            &OrderId::new("x"),
        );
    }
}
