//! Order, fill and identifier types shared across the engine.
//!
//! Orders are owned exclusively by the trading worker's active-orders table;
//! the gateway borrows an immutable view to submit. Status transitions are
//! enforced by [`Order::transition`] so an order can never move backwards
//! through its lifecycle.

use crate::core::errors::OrderStateError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Order side (Buy or Sell)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// Sign convention for position arithmetic: buys are positive.
    pub fn sign(&self) -> Decimal {
        match self {
            Side::Buy => Decimal::ONE,
            Side::Sell => -Decimal::ONE,
        }
    }

    pub fn opposite(&self) -> Side {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
        }
    }
}

/// Order kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderKind {
    Limit,
    Market,
}

/// Order status
///
/// Progresses monotonically `New -> PartiallyFilled -> Filled` except for the
/// terminal exits `Canceled`, `Rejected` and `Expired`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    New,
    PartiallyFilled,
    Filled,
    Canceled,
    Rejected,
    Expired,
}

impl OrderStatus {
    /// Terminal statuses admit no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Filled | OrderStatus::Canceled | OrderStatus::Rejected | OrderStatus::Expired
        )
    }

    /// Active orders can still receive fills or be canceled.
    pub fn is_active(&self) -> bool {
        matches!(self, OrderStatus::New | OrderStatus::PartiallyFilled)
    }

    fn rank(&self) -> u8 {
        match self {
            OrderStatus::New => 0,
            OrderStatus::PartiallyFilled => 1,
            OrderStatus::Filled => 2,
            OrderStatus::Canceled | OrderStatus::Rejected | OrderStatus::Expired => 3,
        }
    }

    /// Whether the monotone lifecycle admits `self -> next`.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        if next.is_terminal() && !matches!(next, OrderStatus::Filled) {
            // Cancel/reject/expire is allowed from any active state.
            return true;
        }
        next.rank() > self.rank() || (*self == OrderStatus::PartiallyFilled && next == *self)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OrderStatus::New => "NEW",
            OrderStatus::PartiallyFilled => "PARTIAL",
            OrderStatus::Filled => "FILLED",
            OrderStatus::Canceled => "CANCELED",
            OrderStatus::Rejected => "REJECTED",
            OrderStatus::Expired => "EXPIRED",
        };
        write!(f, "{}", s)
    }
}

/// Opaque order identifier.
///
/// Engine-assigned at creation; a live gateway may replace it with the
/// server-assigned identifier on acceptance. 128-bit values rendered as
/// 32 hex characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderId(String);

impl OrderId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh identifier: `[ms-timestamp:64][counter:64]` as hex.
    pub fn generate() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        let ms = Utc::now().timestamp_millis().max(0) as u128;
        let counter = COUNTER.fetch_add(1, Ordering::Relaxed) as u128;
        Self(format!("{:032x}", (ms << 64) | counter))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for OrderId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Generate a unique client order id of the form `HFT_<ms-epoch>_<6 digits>`.
pub fn next_client_id() -> String {
    static SEQ: AtomicU64 = AtomicU64::new(0);
    let ms = Utc::now().timestamp_millis();
    let seq = SEQ.fetch_add(1, Ordering::Relaxed);
    format!("HFT_{}_{:06}", ms, (100_000 + seq) % 1_000_000)
}

/// A working order in the engine's active-orders table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub order_id: OrderId,
    pub client_id: String,
    pub symbol: String,
    pub side: Side,
    pub kind: OrderKind,
    pub price: Decimal,
    pub quantity: Decimal,
    pub filled_quantity: Decimal,
    pub status: OrderStatus,
    pub create_time: DateTime<Utc>,
    pub update_time: DateTime<Utc>,
    /// Ladder index this order was quoted at (0 = top of ladder).
    pub priority_level: u32,
}

impl Order {
    /// Create a new limit order in `New` status.
    pub fn limit(
        symbol: impl Into<String>,
        side: Side,
        price: Decimal,
        quantity: Decimal,
        priority_level: u32,
    ) -> Self {
        let now = Utc::now();
        Self {
            order_id: OrderId::generate(),
            client_id: next_client_id(),
            symbol: symbol.into(),
            side,
            kind: OrderKind::Limit,
            price,
            quantity,
            filled_quantity: Decimal::ZERO,
            status: OrderStatus::New,
            create_time: now,
            update_time: now,
            priority_level,
        }
    }

    pub fn remaining(&self) -> Decimal {
        self.quantity - self.filled_quantity
    }

    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    /// Move to `next`, rejecting backwards transitions out of terminal states.
    pub fn transition(&mut self, next: OrderStatus) -> Result<(), OrderStateError> {
        if !self.status.can_transition_to(next) {
            return Err(OrderStateError {
                order_id: self.order_id.clone(),
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        self.update_time = Utc::now();
        Ok(())
    }

    /// Apply a fill, keeping `0 <= filled_quantity <= quantity` and moving the
    /// status to `PartiallyFilled` or `Filled`.
    pub fn apply_fill(&mut self, qty: Decimal) -> Result<(), OrderStateError> {
        let filled = (self.filled_quantity + qty).min(self.quantity);
        let next = if filled >= self.quantity {
            OrderStatus::Filled
        } else {
            OrderStatus::PartiallyFilled
        };
        self.transition(next)?;
        self.filled_quantity = filled;
        Ok(())
    }

    /// Age of the order since creation, in milliseconds.
    pub fn age_ms(&self, now: DateTime<Utc>) -> i64 {
        (now - self.create_time).num_milliseconds()
    }
}

/// Exchange (or simulator) acknowledgement that an order traded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FillEvent {
    pub order_id: OrderId,
    pub side: Side,
    pub fill_qty: Decimal,
    pub fill_price: Decimal,
    pub fill_time: DateTime<Utc>,
}

impl FillEvent {
    pub fn new(order_id: OrderId, side: Side, fill_qty: Decimal, fill_price: Decimal) -> Self {
        Self {
            order_id,
            side,
            fill_qty,
            fill_price,
            fill_time: Utc::now(),
        }
    }

    pub fn notional(&self) -> Decimal {
        self.fill_qty * self.fill_price
    }

    /// Signed quantity: positive for buys, negative for sells.
    pub fn signed_qty(&self) -> Decimal {
        self.side.sign() * self.fill_qty
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_client_id_format_and_uniqueness() {
        let a = next_client_id();
        let b = next_client_id();
        assert_ne!(a, b);
        assert!(a.starts_with("HFT_"));

        let parts: Vec<&str> = a.split('_').collect();
        assert_eq!(parts.len(), 3);
        assert!(parts[1].parse::<i64>().is_ok());
        assert_eq!(parts[2].len(), 6);
        assert!(parts[2].chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn test_order_id_generation_unique() {
        let a = OrderId::generate();
        let b = OrderId::generate();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 32);
    }

    #[test]
    fn test_order_creation() {
        let order = Order::limit("ETH-USD", Side::Buy, dec!(2000.00), dec!(0.01), 0);
        assert_eq!(order.status, OrderStatus::New);
        assert_eq!(order.remaining(), dec!(0.01));
        assert!(order.is_active());
    }

    #[test]
    fn test_fill_to_completion() {
        let mut order = Order::limit("ETH-USD", Side::Buy, dec!(2000), dec!(1.0), 0);

        order.apply_fill(dec!(0.4)).unwrap();
        assert_eq!(order.status, OrderStatus::PartiallyFilled);
        assert_eq!(order.remaining(), dec!(0.6));

        order.apply_fill(dec!(0.6)).unwrap();
        assert_eq!(order.status, OrderStatus::Filled);
        assert_eq!(order.remaining(), Decimal::ZERO);
    }

    #[test]
    fn test_overfill_is_clamped() {
        let mut order = Order::limit("ETH-USD", Side::Sell, dec!(2000), dec!(1.0), 0);
        order.apply_fill(dec!(5.0)).unwrap();
        assert_eq!(order.filled_quantity, dec!(1.0));
        assert_eq!(order.status, OrderStatus::Filled);
    }

    #[test]
    fn test_no_transitions_out_of_terminal() {
        let mut order = Order::limit("ETH-USD", Side::Buy, dec!(2000), dec!(1.0), 0);
        order.transition(OrderStatus::Canceled).unwrap();
        assert!(order.transition(OrderStatus::Filled).is_err());
        assert!(order.apply_fill(dec!(0.5)).is_err());
    }

    #[test]
    fn test_cancel_from_any_active_state() {
        let mut order = Order::limit("ETH-USD", Side::Buy, dec!(2000), dec!(1.0), 0);
        order.apply_fill(dec!(0.5)).unwrap();
        assert!(order.transition(OrderStatus::Expired).is_ok());
    }

    #[test]
    fn test_no_backwards_transition() {
        let mut order = Order::limit("ETH-USD", Side::Buy, dec!(2000), dec!(1.0), 0);
        order.apply_fill(dec!(1.0)).unwrap();
        assert_eq!(order.status, OrderStatus::Filled);
        assert!(order.transition(OrderStatus::New).is_err());
    }

    #[test]
    fn test_fill_event_sign() {
        let buy = FillEvent::new(OrderId::generate(), Side::Buy, dec!(0.5), dec!(2000));
        assert_eq!(buy.signed_qty(), dec!(0.5));
        assert_eq!(buy.notional(), dec!(1000));

        let sell = FillEvent::new(OrderId::generate(), Side::Sell, dec!(0.5), dec!(2000));
        assert_eq!(sell.signed_qty(), dec!(-0.5));
    }
}
