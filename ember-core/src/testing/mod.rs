//! Test helpers: scripted market-data sources and event builders.

use crate::core::TransportError;
use crate::data::{BookSide, LevelUpdate, MarketDataSource, MarketEvent};
use std::collections::VecDeque;
use std::time::Duration;

/// Build a level update from string literals.
pub fn level(side: BookSide, price: &str, qty: &str) -> LevelUpdate {
    LevelUpdate::new(side, price, qty)
}

/// Build a snapshot event from `(price, qty)` string pairs.
pub fn snapshot_event(symbol: &str, bids: &[(&str, &str)], asks: &[(&str, &str)]) -> MarketEvent {
    let mut updates = Vec::new();
    for (price, qty) in bids {
        updates.push(level(BookSide::Bid, price, qty));
    }
    for (price, qty) in asks {
        updates.push(level(BookSide::Ask, price, qty));
    }
    MarketEvent::Snapshot {
        symbol: symbol.to_string(),
        updates,
    }
}

/// Build an incremental event from `(side, price, qty)` triples.
pub fn update_event(symbol: &str, updates: &[(BookSide, &str, &str)]) -> MarketEvent {
    MarketEvent::Update {
        symbol: symbol.to_string(),
        updates: updates
            .iter()
            .map(|(side, price, qty)| level(*side, price, qty))
            .collect(),
    }
}

/// Market-data source that replays a fixed script, then goes quiet.
///
/// Once the script is exhausted `next_event` idles (returns `Ok(None)` after
/// a short sleep), so an engine keeps running on the last published book
/// until it is stopped.
pub struct ScriptedSource {
    events: VecDeque<MarketEvent>,
    subscribed: Option<(String, usize)>,
    closed: bool,
}

impl ScriptedSource {
    pub fn new(events: Vec<MarketEvent>) -> Self {
        Self {
            events: events.into(),
            subscribed: None,
            closed: false,
        }
    }

    pub fn subscribed(&self) -> Option<&(String, usize)> {
        self.subscribed.as_ref()
    }
}

impl MarketDataSource for ScriptedSource {
    fn subscribe(&mut self, symbol: &str, depth: usize) -> Result<(), TransportError> {
        self.subscribed = Some((symbol.to_string(), depth));
        Ok(())
    }

    fn next_event(&mut self, timeout: Duration) -> Result<Option<MarketEvent>, TransportError> {
        if self.closed {
            return Err(TransportError::Closed);
        }
        match self.events.pop_front() {
            Some(event) => Ok(Some(event)),
            None => {
                std::thread::sleep(timeout.min(Duration::from_millis(5)));
                Ok(None)
            }
        }
    }

    fn close(&mut self) {
        self.closed = true;
    }
}

/// Source that fails a fixed number of times before handing over to an inner
/// script, for exercising the reconnect path.
pub struct FlakySource {
    failures_left: u32,
    inner: ScriptedSource,
    connected: bool,
}

impl FlakySource {
    pub fn new(failures: u32, inner: ScriptedSource) -> Self {
        Self {
            failures_left: failures,
            inner,
            connected: true,
        }
    }
}

impl MarketDataSource for FlakySource {
    fn subscribe(&mut self, symbol: &str, depth: usize) -> Result<(), TransportError> {
        self.inner.subscribe(symbol, depth)
    }

    fn next_event(&mut self, timeout: Duration) -> Result<Option<MarketEvent>, TransportError> {
        if !self.connected {
            return Err(TransportError::Disconnected("not connected".to_string()));
        }
        if self.failures_left > 0 {
            self.failures_left -= 1;
            self.connected = false;
            return Err(TransportError::Disconnected("simulated drop".to_string()));
        }
        self.inner.next_event(timeout)
    }

    fn reconnect(&mut self) -> Result<(), TransportError> {
        self.connected = true;
        Ok(())
    }

    fn close(&mut self) {
        self.inner.close();
    }
}
