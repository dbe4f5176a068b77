//! Risk management: pre-trade gate, limit tracking, circuit breaker.
//!
//! State is partitioned into three mutex-guarded groups (positions,
//! financial, operational) plus an atomic circuit-breaker latch and a bounded
//! event ring. No call ever holds more than one group lock, so the manager
//! cannot participate in a lock cycle with its callers.
//!
//! ## Pre-trade gate
//!
//! ```text
//! can_place_order
//!   1. breaker latched?            -> Reject
//!   2. |net + signed qty| > limit  -> Reject + POSITION_LIMIT_EXCEEDED (CRIT)
//!   3. daily loss / drawdown hit   -> Reject
//!   4. >= max orders in last 1 s   -> Reject + ORDER_RATE_LIMIT_EXCEEDED (WARN)
//!   5. otherwise                   -> Allow
//! ```
//!
//! ## Circuit breaker
//!
//! The latch is explicit and set on EMERGENCY breaches (daily loss,
//! drawdown); everything else about the observed status is derived from the
//! recent event window, not stored. `reset_breaker` returns to NORMAL.

pub mod types;

pub use types::{RiskDecision, RiskEvent, RiskEventKind, RiskLevel, RiskLimits, RiskStatus};

use crate::core::Side;
use chrono::{DateTime, Local, NaiveDate, Utc};
use parking_lot::Mutex;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::{HashMap, VecDeque};
use std::fmt::Write as _;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// Bounded size of the event ring; oldest entries are discarded.
const MAX_RISK_EVENTS: usize = 1_000;

/// Window for deriving the risk status from recent events, in minutes.
const STATUS_WINDOW_MINUTES: i64 = 5;

/// Order timestamps older than this are pruned by housekeeping.
const ORDER_WINDOW: Duration = Duration::from_secs(5);

/// Warning threshold: fraction of a position limit.
const POSITION_WARN_RATIO: f64 = 0.80;

/// Cutoff instant `window` ago, saturating at process start.
fn window_start(window: Duration) -> Instant {
    let now = Instant::now();
    now.checked_sub(window).unwrap_or(now)
}

#[derive(Debug, Default)]
struct PositionsGroup {
    positions: HashMap<String, Decimal>,
    limits: HashMap<String, Decimal>,
}

#[derive(Debug)]
struct FinancialGroup {
    current_pnl: Decimal,
    daily_pnl: Decimal,
    peak_pnl: Decimal,
    daily_loss_limit: Decimal,
    drawdown_limit: Decimal,
    daily_reset_date: NaiveDate,
}

#[derive(Debug)]
struct OperationalGroup {
    recent_orders: VecDeque<Instant>,
    max_orders_per_second: u64,
    session_start: DateTime<Utc>,
    last_housekeeping: Instant,
}

/// Gates orders, evaluates position/loss/rate/drawdown, drives the breaker.
pub struct RiskManager {
    positions: Mutex<PositionsGroup>,
    financial: Mutex<FinancialGroup>,
    operational: Mutex<OperationalGroup>,
    breaker_active: AtomicBool,
    breaker_reason: Mutex<String>,
    breaker_enabled: bool,
    events: Mutex<VecDeque<RiskEvent>>,
}

impl RiskManager {
    pub fn new(limits: RiskLimits) -> Self {
        info!(
            daily_loss_limit = %limits.daily_loss_limit,
            drawdown_limit = %limits.drawdown_limit,
            max_orders_per_second = limits.max_orders_per_second,
            "risk manager initialized"
        );

        let manager = Self {
            positions: Mutex::new(PositionsGroup {
                positions: HashMap::new(),
                limits: limits.position_limits,
            }),
            financial: Mutex::new(FinancialGroup {
                current_pnl: Decimal::ZERO,
                daily_pnl: Decimal::ZERO,
                peak_pnl: Decimal::ZERO,
                daily_loss_limit: limits.daily_loss_limit,
                drawdown_limit: limits.drawdown_limit,
                daily_reset_date: Local::now().date_naive(),
            }),
            operational: Mutex::new(OperationalGroup {
                recent_orders: VecDeque::new(),
                max_orders_per_second: limits.max_orders_per_second,
                session_start: Utc::now(),
                last_housekeeping: Instant::now(),
            }),
            breaker_active: AtomicBool::new(false),
            breaker_reason: Mutex::new(String::new()),
            breaker_enabled: limits.circuit_breaker_enabled,
            events: Mutex::new(VecDeque::new()),
        };
        manager.record_event(
            RiskEventKind::SystemHealth,
            RiskLevel::Info,
            "risk manager initialized".to_string(),
            None,
            None,
            None,
        );
        manager
    }

    /// Pre-trade gate. See the module docs for the check ordering.
    pub fn can_place_order(
        &self,
        symbol: &str,
        side: Side,
        _price: Decimal,
        quantity: Decimal,
    ) -> RiskDecision {
        // 1. Circuit breaker
        if self.breaker_active.load(Ordering::Acquire) {
            let reason = self.breaker_reason.lock().clone();
            return RiskDecision::Reject(format!("Circuit breaker active: {}", reason));
        }

        // 2. Position projection
        {
            let group = self.positions.lock();
            if let Some(limit) = group.limits.get(symbol) {
                let limit = *limit;
                let current = group.positions.get(symbol).copied().unwrap_or_default();
                let projected = current + side.sign() * quantity;
                if projected.abs() > limit {
                    drop(group);
                    self.record_event(
                        RiskEventKind::PositionLimitExceeded,
                        RiskLevel::Critical,
                        "Order rejected: position limit exceeded".to_string(),
                        Some(symbol.to_string()),
                        Some(projected.abs()),
                        Some(limit),
                    );
                    return RiskDecision::Reject(format!(
                        "Position limit exceeded for {}",
                        symbol
                    ));
                }
            }
        }

        // 3. Financial limits
        {
            let group = self.financial.lock();
            if group.daily_pnl <= group.daily_loss_limit {
                return RiskDecision::Reject("Daily loss limit reached".to_string());
            }
            let drawdown = group.peak_pnl - group.current_pnl;
            if drawdown >= group.drawdown_limit.abs() {
                return RiskDecision::Reject("Drawdown limit reached".to_string());
            }
        }

        // 4. Order rate
        {
            let group = self.operational.lock();
            let one_second_ago = window_start(Duration::from_secs(1));
            let recent = group
                .recent_orders
                .iter()
                .filter(|t| **t > one_second_ago)
                .count() as u64;
            if recent >= group.max_orders_per_second {
                drop(group);
                self.record_event(
                    RiskEventKind::OrderRateLimitExceeded,
                    RiskLevel::Warning,
                    "Order rejected: rate limit exceeded".to_string(),
                    Some(symbol.to_string()),
                    Some(Decimal::from(recent)),
                    None,
                );
                return RiskDecision::Reject("Order rate limit exceeded".to_string());
            }
        }

        RiskDecision::Allow
    }

    /// Record an accepted order into the rate window.
    pub fn record_order_placed(&self) {
        let mut group = self.operational.lock();
        let now = Instant::now();
        group.recent_orders.push_back(now);
        let cutoff = now - ORDER_WINDOW;
        while group.recent_orders.front().is_some_and(|t| *t < cutoff) {
            group.recent_orders.pop_front();
        }
    }

    /// Orders placed within the last second.
    pub fn orders_last_second(&self) -> u64 {
        let group = self.operational.lock();
        let one_second_ago = window_start(Duration::from_secs(1));
        group
            .recent_orders
            .iter()
            .filter(|t| **t > one_second_ago)
            .count() as u64
    }

    /// Post-trade position update; warns at 80 % utilization.
    pub fn update_position(&self, symbol: &str, side: Side, quantity: Decimal) {
        let mut warn_event = None;
        {
            let mut group = self.positions.lock();
            let entry = group.positions.entry(symbol.to_string()).or_default();
            *entry += side.sign() * quantity;
            let position = *entry;

            if let Some(limit) = group.limits.get(symbol) {
                if !limit.is_zero() {
                    let utilization = (position.abs() / limit).to_f64().unwrap_or(0.0);
                    if utilization > POSITION_WARN_RATIO {
                        warn_event = Some((position.abs(), *limit, utilization));
                    }
                }
            }
        }

        if let Some((value, limit, utilization)) = warn_event {
            self.record_event(
                RiskEventKind::PositionWarning,
                RiskLevel::Warning,
                format!("Position utilization high: {:.1}%", utilization * 100.0),
                Some(symbol.to_string()),
                Some(value),
                Some(limit),
            );
        }
    }

    pub fn position(&self, symbol: &str) -> Decimal {
        self.positions
            .lock()
            .positions
            .get(symbol)
            .copied()
            .unwrap_or_default()
    }

    /// Post-trade PnL update: peak tracking, warnings, breaker triggers.
    pub fn update_pnl(&self, pnl_delta: Decimal) {
        let mut breach = None;
        let mut warning = None;
        {
            let mut group = self.financial.lock();
            group.current_pnl += pnl_delta;
            group.daily_pnl += pnl_delta;

            if group.current_pnl > group.peak_pnl {
                group.peak_pnl = group.current_pnl;
            }

            if group.daily_pnl <= group.daily_loss_limit {
                breach = Some((
                    RiskEventKind::DailyLossLimitExceeded,
                    format!("Daily loss limit exceeded: ${}", group.daily_pnl),
                    "Daily loss limit exceeded".to_string(),
                ));
            } else {
                let drawdown = group.peak_pnl - group.current_pnl;
                if drawdown >= group.drawdown_limit.abs() {
                    breach = Some((
                        RiskEventKind::DrawdownLimitExceeded,
                        format!("Drawdown limit exceeded: ${}", drawdown),
                        "Drawdown limit exceeded".to_string(),
                    ));
                } else if group.daily_pnl
                    <= group.daily_loss_limit * dec!(0.7)
                {
                    warning = Some(format!("Approaching daily loss limit: ${}", group.daily_pnl));
                }
            }
        }

        if let Some((kind, message, reason)) = breach {
            self.record_event(kind, RiskLevel::Emergency, message, None, None, None);
            self.trigger_breaker(&reason);
        } else if let Some(message) = warning {
            self.record_event(RiskEventKind::PnlWarning, RiskLevel::Warning, message, None, None, None);
        }
    }

    pub fn daily_pnl(&self) -> Decimal {
        self.financial.lock().daily_pnl
    }

    pub fn drawdown(&self) -> Decimal {
        let group = self.financial.lock();
        group.peak_pnl - group.current_pnl
    }

    /// Latch the breaker (a no-op latch when disabled by config; the event is
    /// still recorded either way).
    pub fn trigger_breaker(&self, reason: &str) {
        self.record_event(
            RiskEventKind::CircuitBreakerTriggered,
            RiskLevel::Emergency,
            format!("Circuit breaker triggered: {}", reason),
            None,
            None,
            None,
        );
        if !self.breaker_enabled {
            warn!(reason, "circuit breaker disabled by config; not latching");
            return;
        }
        error!(reason, "CIRCUIT BREAKER TRIGGERED");
        *self.breaker_reason.lock() = reason.to_string();
        self.breaker_active.store(true, Ordering::Release);
    }

    /// Explicit operator reset; returns the status to NORMAL.
    pub fn reset_breaker(&self) {
        self.breaker_active.store(false, Ordering::Release);
        self.breaker_reason.lock().clear();
        self.record_event(
            RiskEventKind::CircuitBreakerTriggered,
            RiskLevel::Info,
            "Circuit breaker reset".to_string(),
            None,
            None,
            None,
        );
    }

    pub fn breaker_active(&self) -> bool {
        self.breaker_active.load(Ordering::Acquire)
    }

    pub fn breaker_reason(&self) -> String {
        self.breaker_reason.lock().clone()
    }

    /// Status derived from the latch and the recent event window.
    pub fn status(&self) -> RiskStatus {
        if self.breaker_active.load(Ordering::Acquire) {
            return RiskStatus::Emergency;
        }

        let events = self.events.lock();
        let cutoff = Utc::now() - chrono::Duration::minutes(STATUS_WINDOW_MINUTES);
        let mut critical = 0usize;
        let mut warnings = 0usize;
        for event in events.iter() {
            if event.timestamp > cutoff {
                match event.level {
                    RiskLevel::Critical | RiskLevel::Emergency => critical += 1,
                    RiskLevel::Warning => warnings += 1,
                    RiskLevel::Info => {}
                }
            }
        }

        if critical > 0 {
            RiskStatus::Critical
        } else if warnings > 3 {
            RiskStatus::Warning
        } else {
            RiskStatus::Normal
        }
    }

    /// Most recent `count` events, oldest first.
    pub fn recent_events(&self, count: usize) -> Vec<RiskEvent> {
        let events = self.events.lock();
        let skip = events.len().saturating_sub(count);
        events.iter().skip(skip).cloned().collect()
    }

    /// Periodic maintenance: roll daily counters at local midnight and prune
    /// the order-timestamp window. Internally limited to once per second so
    /// callers can invoke it every cycle.
    pub fn housekeeping(&self) {
        {
            let mut group = self.operational.lock();
            if group.last_housekeeping.elapsed() < Duration::from_secs(1) {
                return;
            }
            group.last_housekeeping = Instant::now();
            let cutoff = Instant::now() - ORDER_WINDOW;
            while group.recent_orders.front().is_some_and(|t| *t < cutoff) {
                group.recent_orders.pop_front();
            }
        }

        let mut rolled = false;
        {
            let mut group = self.financial.lock();
            let today = Local::now().date_naive();
            if today > group.daily_reset_date {
                info!(daily_pnl = %group.daily_pnl, "new trading day, resetting daily PnL");
                group.daily_pnl = Decimal::ZERO;
                group.daily_reset_date = today;
                rolled = true;
            }
        }
        if rolled {
            self.record_event(
                RiskEventKind::SystemHealth,
                RiskLevel::Info,
                "Daily limits reset".to_string(),
                None,
                None,
                None,
            );
        }
    }

    /// Multi-section textual risk report for shutdown.
    pub fn report(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{}", "=".repeat(80));
        let _ = writeln!(out, "{:^80}", "RISK MANAGEMENT REPORT");
        let _ = writeln!(out, "{}", "=".repeat(80));
        let _ = writeln!(out, "Status: {}", self.status());

        {
            let group = self.financial.lock();
            let _ = writeln!(out, "\nFINANCIAL:");
            let _ = writeln!(out, "  Current PnL: ${:.4}", group.current_pnl);
            let _ = writeln!(out, "  Daily PnL: ${:.4}", group.daily_pnl);
            let _ = writeln!(out, "  Peak PnL: ${:.4}", group.peak_pnl);
            let _ = writeln!(out, "  Drawdown: ${:.4}", group.peak_pnl - group.current_pnl);
            let _ = writeln!(out, "  Daily Loss Limit: ${:.4}", group.daily_loss_limit.abs());
            let _ = writeln!(out, "  Drawdown Limit: ${:.4}", group.drawdown_limit.abs());
        }

        {
            let group = self.positions.lock();
            let _ = writeln!(out, "\nPOSITIONS:");
            for (symbol, position) in &group.positions {
                let limit = group.limits.get(symbol).copied().unwrap_or_default();
                let _ = writeln!(out, "  {}: {} (limit {})", symbol, position, limit);
            }
        }

        {
            let session_start = self.operational.lock().session_start;
            let _ = writeln!(out, "\nOPERATIONAL:");
            let _ = writeln!(
                out,
                "  Session Start: {}",
                session_start.format("%Y-%m-%d %H:%M:%S")
            );
            let _ = writeln!(out, "  Orders last second: {}", self.orders_last_second());
            let _ = writeln!(out, "  Circuit Breaker: {}", if self.breaker_active() { "ACTIVE" } else { "inactive" });
            if self.breaker_active() {
                let _ = writeln!(out, "  Breaker Reason: {}", self.breaker_reason());
            }
        }

        let _ = writeln!(out, "\nRECENT EVENTS:");
        for event in self.recent_events(20) {
            let _ = writeln!(out, "  {}", event);
        }
        let _ = writeln!(out, "{}", "=".repeat(80));
        out
    }

    fn record_event(
        &self,
        kind: RiskEventKind,
        level: RiskLevel,
        message: String,
        symbol: Option<String>,
        value: Option<Decimal>,
        limit: Option<Decimal>,
    ) {
        let event = RiskEvent {
            kind,
            level,
            message,
            symbol,
            value,
            limit,
            timestamp: Utc::now(),
        };

        if level >= RiskLevel::Critical {
            error!(event = %event, "risk event");
        } else if level == RiskLevel::Warning {
            warn!(event = %event, "risk event");
        }

        let mut events = self.events.lock();
        events.push_back(event);
        while events.len() > MAX_RISK_EVENTS {
            events.pop_front();
        }
    }
}
