//! Hot-path counters and latency tracking.
//!
//! Everything here is an atomic so the workers never block on metrics. The
//! latency "average" is the cheap smoothing recurrence
//! `avg <- (avg + sample) / 2` - a recent-weighted estimate, deliberately not
//! a true mean. Min/max are maintained with CAS loops.

pub mod report;

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Latency track in nanoseconds: min/max plus the smoothing recurrence.
#[derive(Debug)]
pub struct LatencyStats {
    min_ns: AtomicU64,
    max_ns: AtomicU64,
    avg_ns: AtomicU64,
}

impl Default for LatencyStats {
    fn default() -> Self {
        Self {
            min_ns: AtomicU64::new(u64::MAX),
            max_ns: AtomicU64::new(0),
            avg_ns: AtomicU64::new(0),
        }
    }
}

impl LatencyStats {
    /// Record one sample.
    pub fn record(&self, sample_ns: u64) {
        let mut current = self.min_ns.load(Ordering::Relaxed);
        while sample_ns < current {
            match self.min_ns.compare_exchange_weak(
                current,
                sample_ns,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(actual) => current = actual,
            }
        }

        let mut current = self.max_ns.load(Ordering::Relaxed);
        while sample_ns > current {
            match self.max_ns.compare_exchange_weak(
                current,
                sample_ns,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(actual) => current = actual,
            }
        }

        // Smoothing recurrence, not a true mean.
        let avg = self.avg_ns.load(Ordering::Relaxed);
        self.avg_ns
            .store((avg + sample_ns) / 2, Ordering::Relaxed);
    }

    pub fn min_ns(&self) -> Option<u64> {
        match self.min_ns.load(Ordering::Relaxed) {
            u64::MAX => None,
            v => Some(v),
        }
    }

    pub fn max_ns(&self) -> u64 {
        self.max_ns.load(Ordering::Relaxed)
    }

    pub fn avg_ns(&self) -> u64 {
        self.avg_ns.load(Ordering::Relaxed)
    }
}

/// Point-in-time copy of the counters for reporting.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsSnapshot {
    pub orders_placed: u64,
    pub orders_filled: u64,
    pub orders_canceled: u64,
    pub orders_failed: u64,
    pub market_updates: u64,
    pub orders_per_second: u64,
    pub order_latency_avg_ns: u64,
    pub order_latency_min_ns: Option<u64>,
    pub order_latency_max_ns: u64,
    pub md_latency_avg_ns: u64,
}

impl MetricsSnapshot {
    /// Fraction of placed orders that filled, as a percentage.
    pub fn fill_rate_pct(&self) -> f64 {
        if self.orders_placed == 0 {
            return 0.0;
        }
        self.orders_filled as f64 * 100.0 / self.orders_placed as f64
    }
}

/// Engine-wide hot counters.
#[derive(Debug, Default)]
pub struct EngineMetrics {
    pub orders_placed: AtomicU64,
    pub orders_filled: AtomicU64,
    pub orders_canceled: AtomicU64,
    pub orders_failed: AtomicU64,
    pub market_updates: AtomicU64,
    orders_per_second: AtomicU64,
    rate_window_orders: AtomicU64,
    rate_window_start_ms: AtomicU64,
    /// Order-placement path latency.
    pub order_latency: LatencyStats,
    /// Market-data-to-state propagation latency.
    pub md_latency: LatencyStats,
}

impl EngineMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recompute the per-second order rate; call at >= 1 Hz.
    pub fn update_order_rate(&self) {
        let now_ms = now_millis();
        let window_start = self.rate_window_start_ms.load(Ordering::Relaxed);
        if window_start == 0 {
            self.rate_window_start_ms.store(now_ms, Ordering::Relaxed);
            self.rate_window_orders
                .store(self.orders_placed.load(Ordering::Relaxed), Ordering::Relaxed);
            return;
        }

        let elapsed_ms = now_ms.saturating_sub(window_start);
        if elapsed_ms < 1_000 {
            return;
        }

        let current = self.orders_placed.load(Ordering::Relaxed);
        let previous = self.rate_window_orders.load(Ordering::Relaxed);
        let rate = current.saturating_sub(previous) * 1_000 / elapsed_ms;
        self.orders_per_second.store(rate, Ordering::Relaxed);
        self.rate_window_orders.store(current, Ordering::Relaxed);
        self.rate_window_start_ms.store(now_ms, Ordering::Relaxed);
    }

    pub fn orders_per_second(&self) -> u64 {
        self.orders_per_second.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            orders_placed: self.orders_placed.load(Ordering::Relaxed),
            orders_filled: self.orders_filled.load(Ordering::Relaxed),
            orders_canceled: self.orders_canceled.load(Ordering::Relaxed),
            orders_failed: self.orders_failed.load(Ordering::Relaxed),
            market_updates: self.market_updates.load(Ordering::Relaxed),
            orders_per_second: self.orders_per_second(),
            order_latency_avg_ns: self.order_latency.avg_ns(),
            order_latency_min_ns: self.order_latency.min_ns(),
            order_latency_max_ns: self.order_latency.max_ns(),
            md_latency_avg_ns: self.md_latency.avg_ns(),
        }
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_running_average_matches_recurrence_exactly() {
        let stats = LatencyStats::default();
        let samples = [1_000u64, 3_000, 500, 10_000, 7];

        let mut expected = 0u64;
        for sample in samples {
            stats.record(sample);
            expected = (expected + sample) / 2;
            assert_eq!(stats.avg_ns(), expected);
        }
    }

    #[test]
    fn test_min_max_tracking() {
        let stats = LatencyStats::default();
        assert_eq!(stats.min_ns(), None);

        stats.record(500);
        stats.record(100);
        stats.record(900);

        assert_eq!(stats.min_ns(), Some(100));
        assert_eq!(stats.max_ns(), 900);
    }

    #[test]
    fn test_counters_and_snapshot() {
        let metrics = EngineMetrics::new();
        metrics.orders_placed.fetch_add(10, Ordering::Relaxed);
        metrics.orders_filled.fetch_add(4, Ordering::Relaxed);
        metrics.orders_canceled.fetch_add(2, Ordering::Relaxed);
        metrics.market_updates.fetch_add(100, Ordering::Relaxed);

        let snap = metrics.snapshot();
        assert_eq!(snap.orders_placed, 10);
        assert_eq!(snap.orders_filled, 4);
        assert_eq!(snap.orders_canceled, 2);
        assert_eq!(snap.market_updates, 100);
        assert!((snap.fill_rate_pct() - 40.0).abs() < 1e-9);
    }

    #[test]
    fn test_fill_rate_with_no_orders() {
        let snap = MetricsSnapshot::default();
        assert_eq!(snap.fill_rate_pct(), 0.0);
    }

    #[test]
    fn test_order_rate_needs_a_full_window() {
        let metrics = EngineMetrics::new();
        // First call only seeds the window.
        metrics.update_order_rate();
        metrics.orders_placed.fetch_add(50, Ordering::Relaxed);
        // Second immediate call: window under 1 s, rate unchanged.
        metrics.update_order_rate();
        assert_eq!(metrics.orders_per_second(), 0);
    }

    #[test]
    fn test_concurrent_latency_recording() {
        use std::sync::Arc;
        use std::thread;

        let stats = Arc::new(LatencyStats::default());
        let mut handles = Vec::new();
        for base in [10u64, 1_000, 100_000] {
            let stats = Arc::clone(&stats);
            handles.push(thread::spawn(move || {
                for i in 0..1_000 {
                    stats.record(base + i);
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(stats.min_ns(), Some(10));
        assert_eq!(stats.max_ns(), 100_999);
    }
}
