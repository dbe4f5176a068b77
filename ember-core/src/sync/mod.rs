//! Inter-thread synchronization primitives.

pub mod spsc;

pub use spsc::{spsc_ring, Consumer, Producer};
