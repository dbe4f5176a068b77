//! Deterministic single-threaded pipeline: gateway fills into position
//! tracking into risk, without the worker threads in the way.

use ember_core::core::{Order, OrderStatus, Side};
use ember_core::gateway::{OrderGateway, PaperFillConfig, PaperGateway, SubmitOutcome};
use ember_core::position::PositionTracker;
use ember_core::risk::{RiskLimits, RiskManager};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::time::Duration;

fn risk_manager() -> RiskManager {
    RiskManager::new(RiskLimits::single_symbol(
        "ETH-USD",
        dec!(1.0),
        dec!(50.0),
        dec!(100.0),
        1_000_000,
        true,
    ))
}

#[test]
fn gated_pipeline_keeps_position_and_risk_in_sync() {
    let mut gateway = PaperGateway::with_seed(PaperFillConfig::default(), 1234);
    let tracker = PositionTracker::new();
    let risk = risk_manager();

    let mut placed = 0u64;
    let mut rejected = 0u64;

    for round in 0..200 {
        let side = if round % 2 == 0 { Side::Buy } else { Side::Sell };
        let price = if side == Side::Buy {
            dec!(1999.95)
        } else {
            dec!(2000.15)
        };

        gateway.note_inventory(tracker.net());
        if !risk
            .can_place_order("ETH-USD", side, price, dec!(0.01))
            .is_allowed()
        {
            rejected += 1;
            continue;
        }

        let order = Order::limit("ETH-USD", side, price, dec!(0.01), 0);
        match gateway.submit(&order).unwrap() {
            SubmitOutcome::Accepted { .. } => {
                risk.record_order_placed();
                placed += 1;
            }
            SubmitOutcome::Rejected { .. } => rejected += 1,
        }

        for fill in gateway.poll_fills() {
            let outcome = tracker.on_fill(&fill);
            risk.update_position("ETH-USD", fill.side, fill.fill_qty);
            risk.update_pnl(outcome.pnl_delta);
        }
    }

    assert!(placed > 0);
    assert_eq!(placed + rejected, 200);

    let position = tracker.snapshot();
    // Risk's view of the position mirrors the tracker's.
    assert_eq!(risk.position("ETH-USD"), position.net);
    assert_eq!(position.net, position.buy_volume - position.sell_volume);
    // Alternating quotes at a fixed edge keep realized PnL from going
    // negative: every sell prints above every buy.
    assert!(position.realized_pnl >= Decimal::ZERO);
    assert!(!risk.breaker_active());
}

#[test]
fn every_order_reaches_exactly_one_terminal_status() {
    let mut gateway = PaperGateway::with_seed(
        PaperFillConfig {
            stale_after: Duration::from_millis(5),
            ..PaperFillConfig::default()
        },
        77,
    );

    let mut orders: Vec<Order> = Vec::new();
    for i in 0..100 {
        let side = if i % 2 == 0 { Side::Buy } else { Side::Sell };
        let order = Order::limit("ETH-USD", side, dec!(2000), dec!(0.01), 0);
        match gateway.submit(&order).unwrap() {
            SubmitOutcome::Accepted { .. } => orders.push(order),
            SubmitOutcome::Rejected { .. } => unreachable!("orders are valid"),
        }
    }

    // Resolve fills first.
    let mut filled = std::collections::HashSet::new();
    for fill in gateway.poll_fills() {
        filled.insert(fill.order_id.clone());
    }
    for order in orders.iter_mut() {
        if filled.contains(&order.order_id) {
            order.apply_fill(order.quantity).unwrap();
        }
    }

    // Everything else ages past the staleness window and expires.
    std::thread::sleep(Duration::from_millis(10));
    gateway.poll_fills();
    for order in orders.iter_mut() {
        if order.status == OrderStatus::New {
            gateway.cancel(&order.order_id).unwrap();
            order.transition(OrderStatus::Expired).unwrap();
        }
    }

    for order in &orders {
        assert!(
            matches!(order.status, OrderStatus::Filled | OrderStatus::Expired),
            "order {} ended as {}",
            order.order_id,
            order.status
        );
        // Terminal means terminal.
        let mut probe = order.clone();
        assert!(probe.transition(OrderStatus::New).is_err());
        assert!(probe.apply_fill(dec!(0.01)).is_err());
    }

    assert_eq!(gateway.resting_orders(), 0);
    assert!(orders.iter().any(|o| o.status == OrderStatus::Filled));
    assert!(orders.iter().any(|o| o.status == OrderStatus::Expired));
}

#[test]
fn losses_through_the_pipeline_latch_the_breaker() {
    let tracker = PositionTracker::new();
    let risk = RiskManager::new(RiskLimits::single_symbol(
        "ETH-USD",
        dec!(10.0),
        dec!(5.0),
        dec!(100.0),
        1_000_000,
        true,
    ));

    // Buy high, sell low: a $3 loss per round trip.
    use ember_core::core::{FillEvent, OrderId};
    for _ in 0..2 {
        let buy = FillEvent::new(OrderId::generate(), Side::Buy, dec!(1), dec!(2000));
        let sell = FillEvent::new(OrderId::generate(), Side::Sell, dec!(1), dec!(1997));
        for fill in [buy, sell] {
            let outcome = tracker.on_fill(&fill);
            risk.update_position("ETH-USD", fill.side, fill.fill_qty);
            risk.update_pnl(outcome.pnl_delta);
        }
    }

    // -$6 cumulative breaches the $5 daily floor on the second trip.
    assert_eq!(tracker.realized_pnl(), dec!(-6));
    assert!(risk.breaker_active());
    assert!(risk.breaker_reason().contains("Daily loss"));
    assert!(!risk
        .can_place_order("ETH-USD", Side::Buy, dec!(2000), dec!(0.01))
        .is_allowed());
}
