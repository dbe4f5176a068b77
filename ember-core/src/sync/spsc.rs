//! Bounded lock-free single-producer single-consumer ring.
//!
//! A fixed-capacity array-backed queue with two atomic cursors. The producer
//! publishes with release semantics on the tail index and the consumer
//! observes with acquire semantics on the head, so an item is fully written
//! before it becomes visible. No allocation happens after construction.
//!
//! The queue never re-orders, never duplicates and never loses an item that
//! was accepted by `push`. It is *strictly* SPSC: the handles returned by
//! [`spsc_ring`] are not `Clone`, and `push`/`pop` take `&mut self`, so the
//! 1:1 discipline is enforced at compile time.
//!
//! ```
//! use ember_core::sync::spsc_ring;
//!
//! let (mut tx, mut rx) = spsc_ring::<u64>(8);
//! assert!(tx.push(1).is_ok());
//! assert_eq!(rx.pop(), Some(1));
//! assert_eq!(rx.pop(), None);
//! ```

use crossbeam::utils::CachePadded;
use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

struct Ring<T> {
    buf: Box<[UnsafeCell<MaybeUninit<T>>]>,
    /// Consumer cursor. Slot `head` is the next item to read.
    head: CachePadded<AtomicUsize>,
    /// Producer cursor. Slot `tail` is the next slot to write.
    tail: CachePadded<AtomicUsize>,
}

// The ring hands each slot to exactly one side at a time; the cursors carry
// the release/acquire edge that orders the slot write before the read.
unsafe impl<T: Send> Send for Ring<T> {}
unsafe impl<T: Send> Sync for Ring<T> {}

impl<T> Ring<T> {
    fn with_capacity(capacity: usize) -> Self {
        assert!(capacity > 0, "ring capacity must be non-zero");
        // One slot is kept empty to distinguish full from empty.
        let slots = capacity + 1;
        let buf = (0..slots)
            .map(|_| UnsafeCell::new(MaybeUninit::uninit()))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Self {
            buf,
            head: CachePadded::new(AtomicUsize::new(0)),
            tail: CachePadded::new(AtomicUsize::new(0)),
        }
    }

    #[inline(always)]
    fn wrap(&self, idx: usize) -> usize {
        let next = idx + 1;
        if next == self.buf.len() {
            0
        } else {
            next
        }
    }

    #[inline]
    fn len(&self) -> usize {
        let tail = self.tail.load(Ordering::Acquire);
        let head = self.head.load(Ordering::Acquire);
        (tail + self.buf.len() - head) % self.buf.len()
    }
}

impl<T> Drop for Ring<T> {
    fn drop(&mut self) {
        // Drain whatever the consumer never read.
        let mut head = self.head.load(Ordering::Relaxed);
        let tail = self.tail.load(Ordering::Relaxed);
        while head != tail {
            unsafe {
                (*self.buf[head].get()).assume_init_drop();
            }
            head = self.wrap(head);
        }
    }
}

/// Producing half of an SPSC ring. Not `Clone`.
pub struct Producer<T> {
    ring: Arc<Ring<T>>,
}

/// Consuming half of an SPSC ring. Not `Clone`.
pub struct Consumer<T> {
    ring: Arc<Ring<T>>,
}

/// Create a bounded SPSC ring with the given usable capacity.
pub fn spsc_ring<T>(capacity: usize) -> (Producer<T>, Consumer<T>) {
    let ring = Arc::new(Ring::with_capacity(capacity));
    (
        Producer { ring: Arc::clone(&ring) },
        Consumer { ring },
    )
}

impl<T> Producer<T> {
    /// Enqueue `value`. Returns it back when the ring is full; the caller
    /// chooses whether to drop or back off.
    #[inline]
    pub fn push(&mut self, value: T) -> Result<(), T> {
        let ring = &*self.ring;
        let tail = ring.tail.load(Ordering::Relaxed);
        let next = ring.wrap(tail);
        if next == ring.head.load(Ordering::Acquire) {
            return Err(value);
        }
        unsafe {
            (*ring.buf[tail].get()).write(value);
        }
        ring.tail.store(next, Ordering::Release);
        Ok(())
    }

    /// Number of items currently queued (approximate under concurrency).
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.ring.buf.len() - 1
    }
}

impl<T> Consumer<T> {
    /// Dequeue the oldest item, or `None` when the ring is empty.
    #[inline]
    pub fn pop(&mut self) -> Option<T> {
        let ring = &*self.ring;
        let head = ring.head.load(Ordering::Relaxed);
        if head == ring.tail.load(Ordering::Acquire) {
            return None;
        }
        let value = unsafe { (*ring.buf[head].get()).assume_init_read() };
        ring.head.store(ring.wrap(head), Ordering::Release);
        Some(value)
    }

    /// Number of items currently queued (approximate under concurrency).
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.ring.buf.len() - 1
    }
}
