//! Paper-trading gateway: local fill simulation.
//!
//! Submissions never leave the process. Each order draws against a fill
//! probability shaped by current inventory:
//!
//! - base probability 0.30
//! - x1.8 when the order reduces inventory beyond the neutral band
//! - x0.4 when it compounds inventory beyond the neutral band
//! - clamped to at most 0.65
//!
//! A winning draw fills the full quantity at the order's own price
//! immediately. A losing draw leaves the order resting until the engine
//! expires it past the staleness window (default 100 ms).
//!
//! The RNG is injected so tests can drive the simulator deterministically.

use crate::core::{FillEvent, Order, OrderId, Side, TransportError};
use crate::gateway::{validate_order, OrderGateway, SubmitOutcome};
use crate::sync::{spsc_ring, Consumer, Producer};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// Capacity of the inbound fill ring.
const FILL_RING_CAPACITY: usize = 2_048;

/// Tuning of the fill simulator.
#[derive(Debug, Clone)]
pub struct PaperFillConfig {
    pub base_fill_probability: f64,
    /// Multiplier when the order opposes inventory (rebalancing).
    pub rebalance_boost: f64,
    /// Multiplier when the order compounds inventory.
    pub compounding_penalty: f64,
    /// Hard ceiling on the fill probability.
    pub max_fill_probability: f64,
    /// Inventory magnitude beyond which the bias kicks in.
    pub neutral_band: Decimal,
    /// Resting orders older than this are dead to the simulator.
    pub stale_after: Duration,
}

impl Default for PaperFillConfig {
    fn default() -> Self {
        Self {
            base_fill_probability: 0.30,
            rebalance_boost: 1.8,
            compounding_penalty: 0.4,
            max_fill_probability: 0.65,
            neutral_band: dec!(0.01),
            stale_after: Duration::from_millis(100),
        }
    }
}

/// Simulated venue for paper sessions.
pub struct PaperGateway {
    cfg: PaperFillConfig,
    rng: StdRng,
    fills_tx: Producer<FillEvent>,
    fills_rx: Consumer<FillEvent>,
    /// Orders that did not fill on submission, with their expiry deadline.
    resting: HashMap<OrderId, Instant>,
    /// Net position hint fed by the engine before each quoting round.
    inventory: Decimal,
    dropped_fills: u64,
}

impl PaperGateway {
    pub fn new(cfg: PaperFillConfig) -> Self {
        Self::with_rng(cfg, StdRng::from_entropy())
    }

    /// Deterministic simulator for tests.
    pub fn with_seed(cfg: PaperFillConfig, seed: u64) -> Self {
        Self::with_rng(cfg, StdRng::seed_from_u64(seed))
    }

    fn with_rng(cfg: PaperFillConfig, rng: StdRng) -> Self {
        let (fills_tx, fills_rx) = spsc_ring(FILL_RING_CAPACITY);
        Self {
            cfg,
            rng,
            fills_tx,
            fills_rx,
            resting: HashMap::new(),
            inventory: Decimal::ZERO,
            dropped_fills: 0,
        }
    }

    /// Fill probability for an order of `side` given the inventory hint.
    pub fn fill_probability(&self, side: Side) -> f64 {
        let mut p = self.cfg.base_fill_probability;
        if self.inventory.abs() > self.cfg.neutral_band {
            let long = self.inventory > Decimal::ZERO;
            let reduces = (side == Side::Sell && long) || (side == Side::Buy && !long);
            if reduces {
                p *= self.cfg.rebalance_boost;
            } else {
                p *= self.cfg.compounding_penalty;
            }
        }
        p.min(self.cfg.max_fill_probability)
    }

    pub fn resting_orders(&self) -> usize {
        self.resting.len()
    }

    pub fn dropped_fills(&self) -> u64 {
        self.dropped_fills
    }

    fn push_fill(&mut self, fill: FillEvent) {
        if let Err(fill) = self.fills_tx.push(fill) {
            // Consumer is behind; drop the oldest to keep the newest.
            self.dropped_fills += 1;
            self.fills_rx.pop();
            let _ = self.fills_tx.push(fill);
        }
    }

    fn expire_stale(&mut self) {
        let now = Instant::now();
        self.resting.retain(|_, deadline| *deadline > now);
    }
}

impl OrderGateway for PaperGateway {
    fn submit(&mut self, order: &Order) -> Result<SubmitOutcome, TransportError> {
        if let Some(reason) = validate_order(order) {
            debug!(order_id = %order.order_id, %reason, "paper gateway rejected order");
            return Ok(SubmitOutcome::Rejected { reason });
        }

        let p = self.fill_probability(order.side);
        if self.rng.gen::<f64>() < p {
            trace!(
                order_id = %order.order_id,
                side = %order.side,
                price = %order.price,
                probability = p,
                "paper fill"
            );
            self.push_fill(FillEvent::new(
                order.order_id.clone(),
                order.side,
                order.quantity,
                order.price,
            ));
        } else {
            self.resting
                .insert(order.order_id.clone(), Instant::now() + self.cfg.stale_after);
        }

        // Paper mode echoes the engine-assigned id as the venue id.
        Ok(SubmitOutcome::Accepted {
            order_id: order.order_id.clone(),
        })
    }

    fn cancel(&mut self, order_id: &OrderId) -> Result<(), TransportError> {
        self.resting.remove(order_id);
        Ok(())
    }

    fn poll_fills(&mut self) -> Vec<FillEvent> {
        self.expire_stale();
        let mut fills = Vec::with_capacity(self.fills_rx.len());
        while let Some(fill) = self.fills_rx.pop() {
            fills.push(fill);
        }
        fills
    }

    fn note_inventory(&mut self, net: Decimal) {
        self.inventory = net;
    }
}
