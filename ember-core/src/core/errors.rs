//! Engine error taxonomy.
//!
//! Errors propagate as typed results along the data path they originate on:
//! configuration problems are fatal at startup, parse problems drop a single
//! update, transport problems drive reconnect/backoff, and risk breaches are
//! surfaced through the risk event log. Only an EMERGENCY risk breach stops
//! the engine.

use crate::core::types::{OrderId, OrderStatus};
use std::fmt;
use std::path::PathBuf;

/// Fatal configuration error (missing file, malformed line, bad value).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Config file could not be opened or read
    Unreadable { path: PathBuf, reason: String },
    /// Non-comment line without a `KEY=VALUE` shape
    MalformedLine { line_no: usize, line: String },
    /// A recognized key carried a value that does not parse
    BadValue { key: String, value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Unreadable { path, reason } => {
                write!(f, "could not read config file {}: {}", path.display(), reason)
            }
            ConfigError::MalformedLine { line_no, line } => {
                write!(f, "malformed config line {}: '{}'", line_no, line)
            }
            ConfigError::BadValue { key, value } => {
                write!(f, "bad value for config key {}: '{}'", key, value)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// A single malformed field in a market-data update.
///
/// The bad entry is dropped and counted; the rest of the batch still applies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    BadPrice(String),
    BadQuantity(String),
    /// Message shape the book does not understand; the batch is discarded.
    UnknownShape(String),
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::BadPrice(raw) => write!(f, "unparseable price field '{}'", raw),
            ParseError::BadQuantity(raw) => write!(f, "unparseable quantity field '{}'", raw),
            ParseError::UnknownShape(what) => write!(f, "unknown message shape: {}", what),
        }
    }
}

impl std::error::Error for ParseError {}

/// Ingress/egress transport failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Connection dropped; the market-data worker will attempt reconnect.
    Disconnected(String),
    /// The transport was closed deliberately and will not come back.
    Closed,
    /// A pending call was abandoned because the engine is shutting down.
    Canceled,
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::Disconnected(reason) => write!(f, "transport disconnected: {}", reason),
            TransportError::Closed => write!(f, "transport closed"),
            TransportError::Canceled => write!(f, "transport call canceled"),
        }
    }
}

impl std::error::Error for TransportError {}

/// Attempted transition that the order lifecycle does not admit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderStateError {
    pub order_id: OrderId,
    pub from: OrderStatus,
    pub to: OrderStatus,
}

impl fmt::Display for OrderStateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid order state transition for {}: {} -> {}",
            self.order_id, self.from, self.to
        )
    }
}

impl std::error::Error for OrderStateError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::MalformedLine {
            line_no: 7,
            line: "not a pair".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("line 7"));
        assert!(msg.contains("not a pair"));
    }

    #[test]
    fn test_parse_error_display() {
        let err = ParseError::BadPrice("12.x".to_string());
        assert!(format!("{}", err).contains("12.x"));
    }

    #[test]
    fn test_transport_error_display() {
        let err = TransportError::Disconnected("peer reset".to_string());
        assert!(format!("{}", err).contains("peer reset"));
    }
}
