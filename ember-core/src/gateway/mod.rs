//! Order egress capability.
//!
//! The engine supervisor binds one [`OrderGateway`]: the paper simulator in
//! this crate, or a live venue adapter supplied by the deployment. `submit`
//! is synchronous best-effort; the trading worker treats a transport failure
//! as a rejected submission and keeps going.

pub mod paper;

pub use paper::{PaperFillConfig, PaperGateway};

use crate::core::{FillEvent, Order, OrderId, TransportError};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Outcome of a submit call that reached the venue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Accepted; carries the venue-assigned order id.
    Accepted { order_id: OrderId },
    /// Refused by the venue (or the simulator's validation).
    Rejected { reason: String },
}

/// Submit/cancel orders and deliver fill events.
pub trait OrderGateway: Send {
    /// Synchronous best-effort submission of an immutable order view.
    fn submit(&mut self, order: &Order) -> Result<SubmitOutcome, TransportError>;

    fn cancel(&mut self, order_id: &OrderId) -> Result<(), TransportError>;

    /// Drain fills produced since the last poll, in execution order.
    fn poll_fills(&mut self) -> Vec<FillEvent>;

    /// Inventory hint for adapters that model fills (paper). Default no-op.
    fn note_inventory(&mut self, _net: Decimal) {}
}

/// Venue-style order validation shared by gateway adapters.
///
/// Returns the rejection reason, or `None` when the order is acceptable.
pub fn validate_order(order: &Order) -> Option<String> {
    const MIN_QUANTITY: Decimal = dec!(0.001);
    const MAX_QUANTITY: Decimal = dec!(10.0);

    if order.symbol.is_empty() {
        return Some("empty symbol".to_string());
    }
    if order.price <= Decimal::ZERO {
        return Some(format!("non-positive price {}", order.price));
    }
    if order.quantity < MIN_QUANTITY {
        return Some(format!(
            "quantity {} below venue minimum {}",
            order.quantity, MIN_QUANTITY
        ));
    }
    if order.quantity > MAX_QUANTITY {
        return Some(format!(
            "quantity {} above venue maximum {}",
            order.quantity, MAX_QUANTITY
        ));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Side;

    #[test]
    fn test_validation_bounds() {
        let good = Order::limit("ETH-USD", Side::Buy, dec!(2000), dec!(0.01), 0);
        assert!(validate_order(&good).is_none());

        let tiny = Order::limit("ETH-USD", Side::Buy, dec!(2000), dec!(0.0001), 0);
        assert!(validate_order(&tiny).unwrap().contains("below venue minimum"));

        let huge = Order::limit("ETH-USD", Side::Buy, dec!(2000), dec!(50), 0);
        assert!(validate_order(&huge).unwrap().contains("above venue maximum"));

        let free = Order::limit("ETH-USD", Side::Buy, dec!(0), dec!(0.01), 0);
        assert!(validate_order(&free).unwrap().contains("non-positive price"));
    }
}
