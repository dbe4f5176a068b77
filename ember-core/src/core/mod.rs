//! Core trading types: sides, orders, fills, identifiers, error taxonomy.

pub mod errors;
pub mod types;

pub use errors::{ConfigError, OrderStateError, ParseError, TransportError};
pub use types::{next_client_id, FillEvent, Order, OrderId, OrderKind, OrderStatus, Side};
