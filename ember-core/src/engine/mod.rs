//! Engine supervisor: worker threads, wiring, lifecycle.
//!
//! Four long-lived OS threads cooperate over lock-free hand-offs:
//!
//! - **market-data worker** drains the [`MarketDataSource`], applies events
//!   to the order book, publishes the atomic [`MarketState`] and pushes
//!   snapshots into the market ring; reconnects with exponential backoff.
//! - **trading worker** drains the market ring, generates quotes, gates each
//!   ladder order through risk, submits via the gateway, applies fills to
//!   position/PnL, and expires stale quotes. Re-quotes on the configured
//!   refresh cadence even without a new market event, coalescing duplicates.
//! - **risk worker** (10 Hz) feeds realized-PnL deltas to risk, runs
//!   housekeeping, and initiates shutdown when the circuit breaker latches.
//! - **metrics worker** (1 Hz) maintains the order-rate window and writes the
//!   5 s one-line and 10 s multi-line summaries.
//!
//! Lifecycle: `Init -> Running -> Stopping -> Stopped`; an emergency (breaker
//! latch) forces `Running -> Stopping`. Shutdown flips the shared `running`
//! flag, closes the transport, joins every worker (workers sleep in small
//! chunks so joins stay prompt), then writes the session summary and risk
//! report.

use crate::config::EngineConfig;
use crate::core::{Order, OrderId, OrderStatus, TransportError};
use crate::data::{Backoff, MarketDataSource, MarketEvent};
use crate::gateway::{OrderGateway, SubmitOutcome};
use crate::journal::Journals;
use crate::market::MarketState;
use crate::metrics::report::SessionReport;
use crate::metrics::EngineMetrics;
use crate::orderbook::{MarketSnapshot, OrderBook};
use crate::position::PositionTracker;
use crate::risk::{RiskDecision, RiskLimits, RiskManager};
use crate::store::{save_order, KeyValueStore};
use crate::strategy::{generate_quotes, QuoteParams};
use crate::sync::{spsc_ring, Consumer, Producer};
use anyhow::{bail, Context, Result};
use chrono::{DateTime, Local, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::Write as _;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Capacity of the market-snapshot ring.
const MARKET_RING_CAPACITY: usize = 1_024;

/// Idle poll interval of the market-data worker.
const MD_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Cadence of the trading worker's main loop.
const TRADING_SPIN_INTERVAL: Duration = Duration::from_micros(200);

/// Cadence of the risk worker.
const RISK_INTERVAL: Duration = Duration::from_millis(100);

/// Quote staleness threshold in paper mode.
const PAPER_STALENESS: Duration = Duration::from_millis(100);

/// Engine lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum EngineState {
    Init = 0,
    Running = 1,
    Stopping = 2,
    Stopped = 3,
}

impl From<u8> for EngineState {
    fn from(value: u8) -> Self {
        match value {
            1 => EngineState::Running,
            2 => EngineState::Stopping,
            3 => EngineState::Stopped,
            _ => EngineState::Init,
        }
    }
}

/// Owns the workers and the component wiring.
pub struct Engine {
    cfg: EngineConfig,
    params: QuoteParams,
    running: Arc<AtomicBool>,
    emergency: Arc<AtomicBool>,
    state: AtomicU8,
    market: Arc<MarketState>,
    position: Arc<PositionTracker>,
    risk: Arc<RiskManager>,
    metrics: Arc<EngineMetrics>,
    journals: Arc<Journals>,
    store: Arc<dyn KeyValueStore>,
    source: Option<Box<dyn MarketDataSource>>,
    gateway: Option<Box<dyn OrderGateway>>,
    handles: Vec<(&'static str, JoinHandle<()>)>,
    session_start: DateTime<Local>,
}

impl Engine {
    pub fn new(
        cfg: EngineConfig,
        source: Box<dyn MarketDataSource>,
        gateway: Box<dyn OrderGateway>,
        store: Arc<dyn KeyValueStore>,
        journals: Arc<Journals>,
    ) -> Self {
        let params = QuoteParams {
            order_size: cfg.order_size,
            hard_cap: cfg.max_inventory,
            ..QuoteParams::default()
        };
        let risk = RiskManager::new(RiskLimits::single_symbol(
            &cfg.symbol,
            cfg.position_limit,
            cfg.max_daily_loss,
            cfg.max_drawdown,
            cfg.order_rate_limit,
            cfg.circuit_breaker_enabled,
        ));

        Self {
            params,
            running: Arc::new(AtomicBool::new(false)),
            emergency: Arc::new(AtomicBool::new(false)),
            state: AtomicU8::new(EngineState::Init as u8),
            market: Arc::new(MarketState::new()),
            position: Arc::new(PositionTracker::new()),
            risk: Arc::new(risk),
            metrics: Arc::new(EngineMetrics::new()),
            journals,
            store,
            source: Some(source),
            gateway: Some(gateway),
            handles: Vec::new(),
            session_start: Local::now(),
            cfg,
        }
    }

    pub fn state(&self) -> EngineState {
        self.state.load(Ordering::Acquire).into()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// True when shutdown was initiated by the circuit breaker.
    pub fn emergency_stopped(&self) -> bool {
        self.emergency.load(Ordering::Acquire)
    }

    pub fn position(&self) -> Arc<PositionTracker> {
        Arc::clone(&self.position)
    }

    pub fn risk(&self) -> Arc<RiskManager> {
        Arc::clone(&self.risk)
    }

    pub fn metrics(&self) -> Arc<EngineMetrics> {
        Arc::clone(&self.metrics)
    }

    pub fn market(&self) -> Arc<MarketState> {
        Arc::clone(&self.market)
    }

    /// Subscribe the source and spawn the four workers.
    pub fn start(&mut self) -> Result<()> {
        if self.state() != EngineState::Init {
            bail!("engine already started (state {:?})", self.state());
        }

        let mut source = self.source.take().context("market data source missing")?;
        source
            .subscribe(&self.cfg.symbol, self.cfg.orderbook_depth)
            .with_context(|| format!("subscribing to {}", self.cfg.symbol))?;
        let gateway = self.gateway.take().context("order gateway missing")?;

        info!(
            symbol = %self.cfg.symbol,
            paper = self.cfg.paper_trading,
            order_size = %self.cfg.order_size,
            spread_threshold_bps = self.cfg.spread_threshold_bps,
            "starting engine"
        );
        self.journals.log_main(&format!(
            "engine starting: symbol={} paper={} capital=${}",
            self.cfg.symbol, self.cfg.paper_trading, self.cfg.initial_capital
        ));

        self.session_start = Local::now();
        self.running.store(true, Ordering::Release);

        let (md_tx, md_rx) = spsc_ring::<MarketSnapshot>(MARKET_RING_CAPACITY);

        let md_ctx = MarketDataCtx {
            symbol: self.cfg.symbol.clone(),
            depth: self.cfg.orderbook_depth,
            max_reconnect_attempts: self.cfg.max_reconnect_attempts,
            source,
            md_tx,
            market: Arc::clone(&self.market),
            position: Arc::clone(&self.position),
            metrics: Arc::clone(&self.metrics),
            journals: Arc::clone(&self.journals),
            running: Arc::clone(&self.running),
        };
        let trading_ctx = TradingCtx {
            symbol: self.cfg.symbol.clone(),
            params: self.params.clone(),
            refresh_interval: self.cfg.order_refresh_interval,
            staleness: if self.cfg.paper_trading {
                PAPER_STALENESS
            } else {
                self.cfg.order_timeout
            },
            md_rx,
            gateway,
            market: Arc::clone(&self.market),
            position: Arc::clone(&self.position),
            risk: Arc::clone(&self.risk),
            metrics: Arc::clone(&self.metrics),
            journals: Arc::clone(&self.journals),
            store: Arc::clone(&self.store),
            running: Arc::clone(&self.running),
        };
        let risk_ctx = RiskCtx {
            position: Arc::clone(&self.position),
            risk: Arc::clone(&self.risk),
            journals: Arc::clone(&self.journals),
            running: Arc::clone(&self.running),
            emergency: Arc::clone(&self.emergency),
        };
        let metrics_ctx = MetricsCtx {
            metrics: Arc::clone(&self.metrics),
            position: Arc::clone(&self.position),
            risk: Arc::clone(&self.risk),
            running: Arc::clone(&self.running),
        };

        self.handles.push((
            "market-data",
            thread::Builder::new()
                .name("md-worker".to_string())
                .spawn(move || market_data_worker(md_ctx))
                .context("spawning market-data worker")?,
        ));
        self.handles.push((
            "trading",
            thread::Builder::new()
                .name("trading-worker".to_string())
                .spawn(move || trading_worker(trading_ctx))
                .context("spawning trading worker")?,
        ));
        self.handles.push((
            "risk",
            thread::Builder::new()
                .name("risk-worker".to_string())
                .spawn(move || risk_worker(risk_ctx))
                .context("spawning risk worker")?,
        ));
        self.handles.push((
            "metrics",
            thread::Builder::new()
                .name("metrics-worker".to_string())
                .spawn(move || metrics_worker(metrics_ctx))
                .context("spawning metrics worker")?,
        ));

        self.state
            .store(EngineState::Running as u8, Ordering::Release);
        info!("engine running: all workers spawned");
        Ok(())
    }

    /// Flip the running flag, join every worker, emit the session report.
    pub fn stop(&mut self) {
        match self.state() {
            EngineState::Init | EngineState::Stopped => return,
            EngineState::Running | EngineState::Stopping => {}
        }
        self.state
            .store(EngineState::Stopping as u8, Ordering::Release);
        info!("engine stopping");
        self.journals.log_main("engine stopping");
        self.running.store(false, Ordering::Release);

        for (name, handle) in self.handles.drain(..) {
            // A missed join is a bug, not a feature; workers exit at the next
            // loop boundary so this is bounded by their sleep chunk.
            if handle.join().is_err() {
                error!(worker = name, "worker panicked during session");
            }
        }

        self.write_reports();
        self.state
            .store(EngineState::Stopped as u8, Ordering::Release);
        info!("engine stopped");
        self.journals.log_main("engine stopped");
    }

    /// Gather the end-of-session report data.
    pub fn session_report(&self) -> SessionReport {
        SessionReport {
            symbol: self.cfg.symbol.clone(),
            session_start: self.session_start,
            session_end: Local::now(),
            position: self.position.snapshot(),
            metrics: self.metrics.snapshot(),
            spread_range: self.position.spread_range(),
        }
    }

    fn write_reports(&self) {
        let summary = self.session_report().render();
        let risk_report = self.risk.report();

        if self.cfg.log_to_file {
            if let Err(e) = std::fs::create_dir_all(&self.cfg.log_dir) {
                warn!(error = %e, "could not create log directory");
            }
            let summary_path = self.cfg.log_dir.join("session_summary.log");
            match OpenOptions::new().create(true).append(true).open(&summary_path) {
                Ok(mut file) => {
                    let _ = file.write_all(summary.as_bytes());
                }
                Err(e) => warn!(error = %e, "could not write session summary"),
            }
            if let Err(e) = std::fs::write(self.cfg.log_dir.join("risk_report.log"), &risk_report) {
                warn!(error = %e, "could not write risk report");
            }
        }

        let position = self.position.snapshot();
        info!(
            trades = position.total_trades(),
            realized_pnl = %position.realized_pnl,
            final_position = %position.net,
            "session summary written"
        );
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        if matches!(self.state(), EngineState::Running | EngineState::Stopping) {
            self.stop();
        }
    }
}

/// Sleep `total` in small chunks, returning early when `running` clears.
fn sleep_while_running(running: &AtomicBool, total: Duration) {
    let chunk = Duration::from_millis(25);
    let deadline = Instant::now() + total;
    while running.load(Ordering::Acquire) {
        let now = Instant::now();
        if now >= deadline {
            return;
        }
        thread::sleep(chunk.min(deadline - now));
    }
}

struct MarketDataCtx {
    symbol: String,
    depth: usize,
    max_reconnect_attempts: u32,
    source: Box<dyn MarketDataSource>,
    md_tx: Producer<MarketSnapshot>,
    market: Arc<MarketState>,
    position: Arc<PositionTracker>,
    metrics: Arc<EngineMetrics>,
    journals: Arc<Journals>,
    running: Arc<AtomicBool>,
}

fn market_data_worker(mut ctx: MarketDataCtx) {
    info!("market-data worker started");
    let mut book = OrderBook::new(ctx.symbol.clone());
    let mut backoff = Backoff::new();

    while ctx.running.load(Ordering::Acquire) {
        match ctx.source.next_event(MD_POLL_INTERVAL) {
            Ok(Some(event)) => {
                backoff.reset();
                if event.symbol() != ctx.symbol {
                    continue;
                }
                let t0 = Instant::now();
                let is_snapshot = matches!(event, MarketEvent::Snapshot { .. });
                match &event {
                    MarketEvent::Snapshot { updates, .. } => {
                        book.apply_snapshot(updates);
                    }
                    MarketEvent::Update { updates, .. } => {
                        book.apply_incremental(updates);
                    }
                }

                let snap = book.snapshot(ctx.depth);
                if snap.valid {
                    ctx.market.publish(snap.best_bid, snap.best_ask, snap.spread_bps);
                    ctx.position.observe_spread(snap.spread_bps);
                    if is_snapshot {
                        ctx.journals.log_orderbook(
                            &ctx.symbol,
                            snap.best_bid,
                            snap.best_bid_qty,
                            snap.best_ask,
                            snap.best_ask_qty,
                        );
                    }
                    if ctx.md_tx.push(snap).is_err() {
                        debug!("market ring full; dropping snapshot");
                    }
                }

                ctx.metrics.market_updates.fetch_add(1, Ordering::Relaxed);
                ctx.metrics
                    .md_latency
                    .record(t0.elapsed().as_nanos() as u64);
            }
            Ok(None) => {}
            Err(TransportError::Closed) | Err(TransportError::Canceled) => {
                info!("market data stream closed");
                break;
            }
            Err(TransportError::Disconnected(reason)) => {
                warn!(%reason, attempt = backoff.attempts() + 1, "market data disconnected");
                if backoff.attempts() >= ctx.max_reconnect_attempts {
                    error!("market data reconnect attempts exhausted; stopping engine");
                    ctx.journals
                        .log_health("market-data", false, "reconnect attempts exhausted");
                    ctx.running.store(false, Ordering::Release);
                    break;
                }
                let delay = backoff.next_delay();
                sleep_while_running(&ctx.running, delay);
                match ctx.source.reconnect() {
                    Ok(()) => {
                        if ctx.source.subscribe(&ctx.symbol, ctx.depth).is_ok() {
                            info!("market data reconnected");
                            ctx.journals.log_health("market-data", true, "reconnected");
                        }
                    }
                    Err(e) => warn!(error = %e, "reconnect failed"),
                }
            }
        }
    }

    ctx.source.close();
    info!(stats = ?book.stats(), "market-data worker exiting");
}

struct TradingCtx {
    symbol: String,
    params: QuoteParams,
    refresh_interval: Duration,
    staleness: Duration,
    md_rx: Consumer<MarketSnapshot>,
    gateway: Box<dyn OrderGateway>,
    market: Arc<MarketState>,
    position: Arc<PositionTracker>,
    risk: Arc<RiskManager>,
    metrics: Arc<EngineMetrics>,
    journals: Arc<Journals>,
    store: Arc<dyn KeyValueStore>,
    running: Arc<AtomicBool>,
}

fn trading_worker(mut ctx: TradingCtx) {
    info!("trading worker started");
    let mut active: HashMap<OrderId, Order> = HashMap::new();
    let mut last_quote_at: Option<Instant> = None;
    let mut last_quoted: Option<(Decimal, Decimal)> = None;

    while ctx.running.load(Ordering::Acquire) {
        // Drain the ring; quote off the freshest observation only.
        let mut latest: Option<MarketSnapshot> = None;
        while let Some(snap) = ctx.md_rx.pop() {
            latest = Some(snap);
        }

        let refresh_due = last_quote_at.map_or(true, |t| t.elapsed() >= ctx.refresh_interval);
        if let Some(snap) = latest {
            quote_round(&mut ctx, &snap, &mut active, &mut last_quoted);
            last_quote_at = Some(Instant::now());
        } else if refresh_due {
            // Re-quote off the atomic state at the target cadence even
            // without a fresh event; the coalescing check below suppresses
            // duplicate ladders.
            if let Some(snap) = synthetic_snapshot(&ctx) {
                quote_round(&mut ctx, &snap, &mut active, &mut last_quoted);
            }
            last_quote_at = Some(Instant::now());
        }

        for fill in ctx.gateway.poll_fills() {
            apply_fill(&mut ctx, &mut active, fill);
        }

        expire_stale(&mut ctx, &mut active);

        thread::sleep(TRADING_SPIN_INTERVAL);
    }

    // Cancel whatever is still resting before the gateway goes away.
    for (order_id, order) in active.iter_mut() {
        if ctx.gateway.cancel(order_id).is_ok() {
            let _ = order.transition(OrderStatus::Canceled);
            ctx.metrics.orders_canceled.fetch_add(1, Ordering::Relaxed);
        }
        let _ = ctx.store.remove(&order.client_id);
    }
    info!(open_orders = active.len(), "trading worker exiting");
}

/// Build a one-level snapshot from the atomic market state.
fn synthetic_snapshot(ctx: &TradingCtx) -> Option<MarketSnapshot> {
    let (bid, ask) = ctx.market.top_of_book()?;
    let spread = ask - bid;
    let mid = (bid + ask) / Decimal::from(2);
    let spread_bps = if mid.is_zero() {
        0.0
    } else {
        use rust_decimal::prelude::ToPrimitive;
        (spread / mid * Decimal::from(10_000)).to_f64().unwrap_or(0.0)
    };
    Some(MarketSnapshot {
        symbol: ctx.symbol.clone(),
        best_bid: bid,
        best_bid_qty: Decimal::ZERO,
        best_ask: ask,
        best_ask_qty: Decimal::ZERO,
        spread,
        spread_bps,
        bids: vec![(bid, Decimal::ZERO)],
        asks: vec![(ask, Decimal::ZERO)],
        timestamp: Utc::now(),
        valid: true,
    })
}

fn quote_round(
    ctx: &mut TradingCtx,
    snap: &MarketSnapshot,
    active: &mut HashMap<OrderId, Order>,
    last_quoted: &mut Option<(Decimal, Decimal)>,
) {
    let inventory = ctx.position.net();
    ctx.gateway.note_inventory(inventory);

    let Some(quotes) = generate_quotes(snap, inventory, &ctx.params) else {
        return;
    };

    // Coalesce: identical top-of-ladder prices with live orders out is a
    // duplicate quote, not a re-quote.
    if *last_quoted == Some((quotes.bid_price, quotes.ask_price)) && !active.is_empty() {
        return;
    }

    for rung in quotes.ladder(ctx.params.tick_size) {
        match ctx
            .risk
            .can_place_order(&ctx.symbol, rung.side, rung.price, rung.quantity)
        {
            RiskDecision::Reject(reason) => {
                ctx.metrics.orders_failed.fetch_add(1, Ordering::Relaxed);
                debug!(side = %rung.side, %reason, "risk gate rejected quote");
                continue;
            }
            RiskDecision::Allow => {}
        }

        let mut order = Order::limit(
            ctx.symbol.clone(),
            rung.side,
            rung.price,
            rung.quantity,
            rung.level,
        );

        let t0 = Instant::now();
        let outcome = ctx.gateway.submit(&order);
        ctx.metrics
            .order_latency
            .record(t0.elapsed().as_nanos() as u64);

        match outcome {
            Ok(SubmitOutcome::Accepted { order_id }) => {
                order.order_id = order_id.clone();
                ctx.risk.record_order_placed();
                ctx.metrics.orders_placed.fetch_add(1, Ordering::Relaxed);
                if let Err(e) = save_order(ctx.store.as_ref(), &order) {
                    debug!(error = %e, "order cache write failed");
                }
                active.insert(order_id, order);
            }
            Ok(SubmitOutcome::Rejected { reason }) => {
                let _ = order.transition(OrderStatus::Rejected);
                ctx.metrics.orders_failed.fetch_add(1, Ordering::Relaxed);
                debug!(%reason, "gateway rejected order");
            }
            Err(e) => {
                // Transport failure counts as a rejected submission; the
                // engine keeps trading.
                let _ = order.transition(OrderStatus::Rejected);
                ctx.metrics.orders_failed.fetch_add(1, Ordering::Relaxed);
                warn!(error = %e, "gateway transport failure");
            }
        }
    }

    *last_quoted = Some((quotes.bid_price, quotes.ask_price));
}

fn apply_fill(
    ctx: &mut TradingCtx,
    active: &mut HashMap<OrderId, Order>,
    fill: crate::core::FillEvent,
) {
    let Some(order) = active.get_mut(&fill.order_id) else {
        warn!(order_id = %fill.order_id, "fill for unknown order dropped");
        return;
    };

    if let Err(e) = order.apply_fill(fill.fill_qty) {
        error!(error = %e, "fill rejected by order state machine");
        return;
    }
    ctx.metrics.orders_filled.fetch_add(1, Ordering::Relaxed);

    let outcome = ctx.position.on_fill(&fill);
    ctx.risk.update_position(&ctx.symbol, fill.side, fill.fill_qty);

    ctx.journals
        .log_trade(&ctx.symbol, fill.side, fill.fill_qty, fill.fill_price, &fill.order_id);
    let snap = &outcome.snapshot;
    ctx.journals.log_pnl(
        &ctx.symbol,
        snap.net,
        snap.avg_cost,
        outcome.pnl_delta,
        snap.unrealized_pnl,
        snap.total_pnl(),
        &fill.order_id,
    );

    if !order.is_active() {
        let client_id = order.client_id.clone();
        active.remove(&fill.order_id);
        let _ = ctx.store.remove(&client_id);
    }
}

/// Expire quotes that stayed `New` past the staleness threshold.
fn expire_stale(ctx: &mut TradingCtx, active: &mut HashMap<OrderId, Order>) {
    let now = Utc::now();
    let threshold_ms = ctx.staleness.as_millis() as i64;
    let expired: Vec<OrderId> = active
        .values()
        .filter(|o| o.status == OrderStatus::New && o.age_ms(now) > threshold_ms)
        .map(|o| o.order_id.clone())
        .collect();

    for order_id in expired {
        let _ = ctx.gateway.cancel(&order_id);
        if let Some(mut order) = active.remove(&order_id) {
            let _ = order.transition(OrderStatus::Expired);
            ctx.metrics.orders_canceled.fetch_add(1, Ordering::Relaxed);
            let _ = ctx.store.remove(&order.client_id);
        }
    }
}

struct RiskCtx {
    position: Arc<PositionTracker>,
    risk: Arc<RiskManager>,
    journals: Arc<Journals>,
    running: Arc<AtomicBool>,
    emergency: Arc<AtomicBool>,
}

fn risk_worker(ctx: RiskCtx) {
    info!("risk worker started");
    let mut last_realized = Decimal::ZERO;

    while ctx.running.load(Ordering::Acquire) {
        let realized = ctx.position.realized_pnl();
        let delta = realized - last_realized;
        if !delta.is_zero() {
            ctx.risk.update_pnl(delta);
            last_realized = realized;
        }

        ctx.risk.housekeeping();

        if ctx.risk.breaker_active() {
            let reason = ctx.risk.breaker_reason();
            error!(%reason, "circuit breaker latched; initiating emergency stop");
            ctx.journals
                .log_health("risk", false, &format!("circuit breaker: {}", reason));
            ctx.emergency.store(true, Ordering::Release);
            ctx.running.store(false, Ordering::Release);
            break;
        }

        sleep_while_running(&ctx.running, RISK_INTERVAL);
    }
    info!("risk worker exiting");
}

struct MetricsCtx {
    metrics: Arc<EngineMetrics>,
    position: Arc<PositionTracker>,
    risk: Arc<RiskManager>,
    running: Arc<AtomicBool>,
}

fn metrics_worker(ctx: MetricsCtx) {
    info!("metrics worker started");
    let mut last_line = Instant::now();
    let mut last_block = Instant::now();
    let mut last_trades = 0u64;
    let mut last_pnl = Decimal::ZERO;

    while ctx.running.load(Ordering::Acquire) {
        ctx.metrics.update_order_rate();

        if last_line.elapsed() >= Duration::from_secs(5) {
            let position = ctx.position.snapshot();
            let trades_delta = position.total_trades().saturating_sub(last_trades);
            let pnl_delta = position.realized_pnl - last_pnl;
            let avg_latency_ms =
                ctx.metrics.order_latency.avg_ns() as f64 / 1_000_000.0;
            info!(
                "5s: {} trades | PnL: ${:.6} | Pos: {:.6} | Order: {:.3}ms | Total: {} | Cumulative PnL: ${:.6}",
                trades_delta,
                pnl_delta,
                position.net,
                avg_latency_ms,
                position.total_trades(),
                position.realized_pnl,
            );
            last_trades = position.total_trades();
            last_pnl = position.realized_pnl;
            last_line = Instant::now();
        }

        if last_block.elapsed() >= Duration::from_secs(10) {
            let snap = ctx.metrics.snapshot();
            let position = ctx.position.snapshot();
            info!("---- performance (10s) ----");
            info!(
                "orders placed/filled/canceled/failed: {}/{}/{}/{}",
                snap.orders_placed, snap.orders_filled, snap.orders_canceled, snap.orders_failed
            );
            info!(
                "market updates: {} | orders/sec: {} | risk: {}",
                snap.market_updates,
                snap.orders_per_second,
                ctx.risk.status()
            );
            info!(
                "position: {:.6} | realized PnL: ${:.6}",
                position.net, position.realized_pnl
            );
            last_block = Instant::now();
        }

        sleep_while_running(&ctx.running, Duration::from_secs(1));
    }
    info!("metrics worker exiting");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{PaperFillConfig, PaperGateway};
    use crate::store::NoopStore;
    use crate::testing::{snapshot_event, ScriptedSource};

    fn test_engine(events: Vec<MarketEvent>) -> Engine {
        let cfg = EngineConfig::from_str_contents(
            "TRADING_SYMBOL=ETH-USD\n\
             ORDER_REFRESH_INTERVAL_MS=10\n\
             ORDER_RATE_LIMIT=10000\n\
             LOG_TO_FILE=false\n",
        )
        .unwrap();
        Engine::new(
            cfg,
            Box::new(ScriptedSource::new(events)),
            Box::new(PaperGateway::with_seed(PaperFillConfig::default(), 7)),
            Arc::new(NoopStore),
            Arc::new(Journals::disabled()),
        )
    }

    #[test]
    fn test_lifecycle_states() {
        let mut engine = test_engine(vec![snapshot_event(
            "ETH-USD",
            &[("2000.00", "1")],
            &[("2000.10", "1")],
        )]);

        assert_eq!(engine.state(), EngineState::Init);
        engine.start().unwrap();
        assert_eq!(engine.state(), EngineState::Running);
        assert!(engine.is_running());

        engine.stop();
        assert_eq!(engine.state(), EngineState::Stopped);
        assert!(!engine.is_running());
        assert!(!engine.emergency_stopped());
    }

    #[test]
    fn test_double_start_fails() {
        let mut engine = test_engine(vec![]);
        engine.start().unwrap();
        assert!(engine.start().is_err());
        engine.stop();
    }

    #[test]
    fn test_stop_is_idempotent() {
        let mut engine = test_engine(vec![]);
        engine.start().unwrap();
        engine.stop();
        engine.stop();
        assert_eq!(engine.state(), EngineState::Stopped);
    }

    #[test]
    fn test_engine_quotes_and_fills_on_market_data() {
        let mut engine = test_engine(vec![snapshot_event(
            "ETH-USD",
            &[("2000.00", "1"), ("1999.99", "2")],
            &[("2000.10", "1"), ("2000.11", "3")],
        )]);

        engine.start().unwrap();
        thread::sleep(Duration::from_millis(400));
        engine.stop();

        let metrics = engine.metrics().snapshot();
        assert!(metrics.market_updates >= 1);
        assert!(metrics.orders_placed > 0, "refresh loop should keep quoting");

        // Market state reflects the script.
        let (bid, ask) = engine.market().top_of_book().unwrap();
        assert_eq!(bid, Decimal::new(200000, 2));
        assert_eq!(ask, Decimal::new(200010, 2));
    }

    #[test]
    fn test_events_for_other_symbols_are_skipped() {
        let mut engine = test_engine(vec![snapshot_event(
            "BTC-USD",
            &[("50000", "1")],
            &[("50010", "1")],
        )]);

        engine.start().unwrap();
        thread::sleep(Duration::from_millis(100));
        engine.stop();

        assert!(engine.market().top_of_book().is_none());
        assert_eq!(engine.metrics().snapshot().orders_placed, 0);
    }
}
