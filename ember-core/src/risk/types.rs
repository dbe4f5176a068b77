//! Risk event and decision types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::fmt;

/// Severity of a risk event.
///
/// INFO and WARNING never block trading. CRITICAL events degrade the derived
/// status; EMERGENCY latches the circuit breaker until an explicit reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RiskLevel {
    Info,
    Warning,
    Critical,
    Emergency,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RiskLevel::Info => "INFO",
            RiskLevel::Warning => "WARN",
            RiskLevel::Critical => "CRIT",
            RiskLevel::Emergency => "EMER",
        };
        write!(f, "{}", s)
    }
}

/// What happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RiskEventKind {
    PositionLimitExceeded,
    PositionWarning,
    DailyLossLimitExceeded,
    DrawdownLimitExceeded,
    PnlWarning,
    OrderRateLimitExceeded,
    CircuitBreakerTriggered,
    SystemHealth,
}

impl fmt::Display for RiskEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RiskEventKind::PositionLimitExceeded => "POSITION_LIMIT_EXCEEDED",
            RiskEventKind::PositionWarning => "POSITION_WARNING",
            RiskEventKind::DailyLossLimitExceeded => "DAILY_LOSS_LIMIT_EXCEEDED",
            RiskEventKind::DrawdownLimitExceeded => "DRAWDOWN_LIMIT_EXCEEDED",
            RiskEventKind::PnlWarning => "PNL_WARNING",
            RiskEventKind::OrderRateLimitExceeded => "ORDER_RATE_LIMIT_EXCEEDED",
            RiskEventKind::CircuitBreakerTriggered => "CIRCUIT_BREAKER_TRIGGERED",
            RiskEventKind::SystemHealth => "SYSTEM_HEALTH",
        };
        write!(f, "{}", s)
    }
}

/// One entry of the bounded risk event log.
#[derive(Debug, Clone)]
pub struct RiskEvent {
    pub kind: RiskEventKind,
    pub level: RiskLevel,
    pub message: String,
    pub symbol: Option<String>,
    pub value: Option<Decimal>,
    pub limit: Option<Decimal>,
    pub timestamp: DateTime<Utc>,
}

impl fmt::Display for RiskEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}] {} {}",
            self.timestamp.format("%H:%M:%S"),
            self.level,
            self.kind,
            self.message
        )?;
        if let Some(symbol) = &self.symbol {
            write!(f, " ({})", symbol)?;
        }
        if let (Some(value), Some(limit)) = (self.value, self.limit) {
            write!(f, " Value:{} Limit:{}", value, limit)?;
        }
        Ok(())
    }
}

/// Overall risk status derived from the recent event window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RiskStatus {
    Normal,
    Warning,
    Critical,
    Emergency,
}

impl fmt::Display for RiskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RiskStatus::Normal => "NORMAL",
            RiskStatus::Warning => "WARNING",
            RiskStatus::Critical => "CRITICAL",
            RiskStatus::Emergency => "EMERGENCY",
        };
        write!(f, "{}", s)
    }
}

/// Pre-trade gate outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RiskDecision {
    Allow,
    Reject(String),
}

impl RiskDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RiskDecision::Allow)
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            RiskDecision::Allow => None,
            RiskDecision::Reject(reason) => Some(reason),
        }
    }
}

/// Static limits the manager enforces.
#[derive(Debug, Clone)]
pub struct RiskLimits {
    /// Max |net| per symbol.
    pub position_limits: HashMap<String, Decimal>,
    /// Daily-PnL floor; stored as a non-positive number.
    pub daily_loss_limit: Decimal,
    /// Peak-to-trough floor; stored as a non-positive number.
    pub drawdown_limit: Decimal,
    pub max_orders_per_second: u64,
    /// When false the breaker records events but never latches.
    pub circuit_breaker_enabled: bool,
}

impl RiskLimits {
    /// Build limits for one symbol, normalizing loss limits to be <= 0.
    pub fn single_symbol(
        symbol: &str,
        position_limit: Decimal,
        daily_loss_limit: Decimal,
        drawdown_limit: Decimal,
        max_orders_per_second: u64,
        circuit_breaker_enabled: bool,
    ) -> Self {
        let mut position_limits = HashMap::new();
        position_limits.insert(symbol.to_string(), position_limit);
        Self {
            position_limits,
            daily_loss_limit: -daily_loss_limit.abs(),
            drawdown_limit: -drawdown_limit.abs(),
            max_orders_per_second,
            circuit_breaker_enabled,
        }
    }
}
