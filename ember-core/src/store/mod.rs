//! Key-value order cache capability.
//!
//! Tracked orders are persisted keyed by `client_id` so a restarted process
//! can reconcile against the venue. The backing store is a deployment
//! concern; the engine must function correctly when it is a no-op.

use crate::core::Order;
use anyhow::Result;
use parking_lot::Mutex;
use std::collections::HashMap;

pub trait KeyValueStore: Send + Sync {
    fn put(&self, key: &str, value: &str) -> Result<()>;
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn remove(&self, key: &str) -> Result<()>;
}

/// Persist an order under its client id.
pub fn save_order(store: &dyn KeyValueStore, order: &Order) -> Result<()> {
    let json = serde_json::to_string(order)?;
    store.put(&order.client_id, &json)
}

/// Load a persisted order back.
pub fn load_order(store: &dyn KeyValueStore, client_id: &str) -> Result<Option<Order>> {
    match store.get(client_id)? {
        None => Ok(None),
        Some(json) => Ok(Some(serde_json::from_str(&json)?)),
    }
}

/// Store that remembers nothing. The default deployment.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopStore;

impl KeyValueStore for NoopStore {
    fn put(&self, _key: &str, _value: &str) -> Result<()> {
        Ok(())
    }

    fn get(&self, _key: &str) -> Result<Option<String>> {
        Ok(None)
    }

    fn remove(&self, _key: &str) -> Result<()> {
        Ok(())
    }
}

/// In-memory store for tests and single-process runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KeyValueStore for MemoryStore {
    fn put(&self, key: &str, value: &str) -> Result<()> {
        self.entries.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.entries.lock().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Side;
    use rust_decimal_macros::dec;

    #[test]
    fn test_noop_store_accepts_everything() {
        let store = NoopStore;
        store.put("k", "v").unwrap();
        assert_eq!(store.get("k").unwrap(), None);
        store.remove("k").unwrap();
    }

    #[test]
    fn test_order_round_trip_through_memory_store() {
        let store = MemoryStore::new();
        let order = Order::limit("ETH-USD", Side::Buy, dec!(2000), dec!(0.01), 2);

        save_order(&store, &order).unwrap();
        assert_eq!(store.len(), 1);

        let loaded = load_order(&store, &order.client_id).unwrap().unwrap();
        assert_eq!(loaded.order_id, order.order_id);
        assert_eq!(loaded.price, order.price);
        assert_eq!(loaded.priority_level, 2);

        store.remove(&order.client_id).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_load_missing_is_none() {
        let store = MemoryStore::new();
        assert!(load_order(&store, "HFT_0_000000").unwrap().is_none());
    }
}
