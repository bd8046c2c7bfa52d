//! Lock-free single-producer/single-consumer ring buffer of fixed-size items.
//!
//! This module implements the ring buffer that bridges the interrupt-context
//! acquisition loop and the task-context window consumer. It is designed for
//! exactly one writer and exactly one reader.
//!
//! # Features
//! - Lock-free operations using atomic instructions
//! - Caller-supplied backing store, never resized, never reallocated
//! - Peek/commit style access (`vacant_slot` + `write_reserve`,
//!   `peek_slot` + `read_reserve`) so callers can skip a second copy
//! - Type-level SPSC discipline via [`RingBuffer::split`]
//!
//! # Layout
//! ```text
//! storage: [item 0][item 1] ... [item capacity-1] [unused remainder]
//!           \_ item_size elements each
//!
//! written: AtomicU64   (items ever committed by the producer)
//! read:    AtomicU64   (items ever consumed by the consumer)
//! count        = written - read
//! write_index  = written % capacity
//! read_index   = read % capacity
//! ```
//!
//! Using two monotonically increasing counters instead of wrapping indices
//! removes the ambiguity between "empty" and "full" when both indices are
//! equal. Each counter has exactly one writer: the producer publishes
//! `written` with `Release` and the consumer observes it with `Acquire`, and the
//! other way around for `read`.

use crate::error::RingBufferError;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Backing store plus counters, shared by both halves after a split.
///
/// # Safety
/// This structure owns a raw allocation. It is safe to use as long as:
/// - Only one context calls the producer-side methods at a time
/// - Only one context calls the consumer-side methods at a time
/// - Producer-side methods only touch free slots and consumer-side methods only
///   touch stored slots, which the counter protocol guarantees are disjoint
struct Shared<T> {
    /// Start of the backing store.
    /// SAFETY: Comes from `Box::into_raw`, valid for `len` elements until drop
    data: NonNull<T>,
    /// Number of `T` elements in the backing store
    len: usize,
    /// Number of `T` elements per item
    item_size: usize,
    /// Number of items the store can hold
    capacity: usize,
    /// Items ever committed (producer-owned)
    written: AtomicU64,
    /// Items ever consumed (consumer-owned)
    read: AtomicU64,
}

// SAFETY: Shared only hands out slot references according to the SPSC counter
// protocol, so each slot is accessed by at most one side at a time. T: Send
// allows items to move between the producer and consumer contexts.
unsafe impl<T: Send> Send for Shared<T> {}
unsafe impl<T: Send> Sync for Shared<T> {}

impl<T> Drop for Shared<T> {
    fn drop(&mut self) {
        // SAFETY: data and len describe the boxed slice leaked in Shared::new,
        // and no slot references outlive the last owner of Shared.
        unsafe {
            drop(Box::from_raw(std::ptr::slice_from_raw_parts_mut(
                self.data.as_ptr(),
                self.len,
            )));
        }
    }
}

impl<T: Copy> Shared<T> {
    fn new(storage: Box<[T]>, item_size: usize) -> Result<Self, RingBufferError> {
        if storage.is_empty() {
            return Err(RingBufferError::BadArgument("storage is empty"));
        }
        if item_size == 0 {
            return Err(RingBufferError::BadArgument("item size is zero"));
        }
        let capacity = storage.len() / item_size;
        if capacity == 0 {
            return Err(RingBufferError::BadArgument(
                "storage cannot hold a single item",
            ));
        }

        let len = storage.len();
        let raw = Box::into_raw(storage) as *mut T;
        let data = NonNull::new(raw).ok_or(RingBufferError::BadArgument("null storage"))?;

        Ok(Self {
            data,
            len,
            item_size,
            capacity,
            written: AtomicU64::new(0),
            read: AtomicU64::new(0),
        })
    }

    fn count(&self) -> usize {
        let read = self.read.load(Ordering::Acquire);
        let written = self.written.load(Ordering::Acquire);
        written.wrapping_sub(read) as usize
    }

    fn items_in(&self, elements: usize) -> Result<usize, RingBufferError> {
        if elements % self.item_size != 0 {
            return Err(RingBufferError::BadArgument(
                "length is not a whole number of items",
            ));
        }
        Ok(elements / self.item_size)
    }

    fn slot_index(&self, counter: u64) -> usize {
        (counter % self.capacity as u64) as usize
    }

    /// Elements for `items` consecutive slots starting at slot `start`.
    ///
    /// # Safety
    /// `start + items <= capacity` and the caller must hold the side that owns
    /// these slots under the counter protocol.
    #[allow(clippy::mut_from_ref)]
    unsafe fn slots(&self, start: usize, items: usize) -> &mut [T] {
        debug_assert!(start + items <= self.capacity);
        std::slice::from_raw_parts_mut(
            self.data.as_ptr().add(start * self.item_size),
            items * self.item_size,
        )
    }

    /// Returns `(written, free_items)` as seen by the producer.
    fn producer_view(&self) -> (u64, usize) {
        let written = self.written.load(Ordering::Relaxed);
        let read = self.read.load(Ordering::Acquire);
        let stored = written.wrapping_sub(read) as usize;
        (written, self.capacity - stored)
    }

    /// Returns `(read, stored_items)` as seen by the consumer.
    fn consumer_view(&self) -> (u64, usize) {
        let read = self.read.load(Ordering::Relaxed);
        let written = self.written.load(Ordering::Acquire);
        (read, written.wrapping_sub(read) as usize)
    }

    /// # Safety
    /// Caller must be the only producer.
    unsafe fn write(&self, items: &[T]) -> Result<(), RingBufferError> {
        let count = self.items_in(items.len())?;
        let (written, free) = self.producer_view();
        if count > free {
            return Err(RingBufferError::Overflow {
                requested: count,
                available: free,
            });
        }

        let start = self.slot_index(written);
        let first = count.min(self.capacity - start);
        let split = first * self.item_size;
        self.slots(start, first).copy_from_slice(&items[..split]);
        if count > first {
            self.slots(0, count - first).copy_from_slice(&items[split..]);
        }

        self.written
            .store(written.wrapping_add(count as u64), Ordering::Release);
        Ok(())
    }

    /// # Safety
    /// Caller must be the only producer.
    unsafe fn write_reserve(&self, count: usize) -> Result<(), RingBufferError> {
        let (written, free) = self.producer_view();
        if count > free {
            return Err(RingBufferError::Overflow {
                requested: count,
                available: free,
            });
        }
        self.written
            .store(written.wrapping_add(count as u64), Ordering::Release);
        Ok(())
    }

    /// # Safety
    /// Caller must be the only producer, and must not keep the slice past the
    /// next commit.
    #[allow(clippy::mut_from_ref)]
    unsafe fn vacant_slot(&self) -> Result<&mut [T], RingBufferError> {
        let (written, free) = self.producer_view();
        if free == 0 {
            return Err(RingBufferError::Overflow {
                requested: 1,
                available: 0,
            });
        }
        Ok(self.slots(self.slot_index(written), 1))
    }

    /// # Safety
    /// Caller must be the only consumer.
    unsafe fn copy_out(&self, buffer: &mut [T]) -> Result<(u64, usize), RingBufferError> {
        let count = self.items_in(buffer.len())?;
        let (read, stored) = self.consumer_view();
        if count > stored {
            return Err(RingBufferError::Underflow {
                requested: count,
                available: stored,
            });
        }

        let start = self.slot_index(read);
        let first = count.min(self.capacity - start);
        let split = first * self.item_size;
        buffer[..split].copy_from_slice(self.slots(start, first));
        if count > first {
            buffer[split..].copy_from_slice(self.slots(0, count - first));
        }
        Ok((read, count))
    }

    /// # Safety
    /// Caller must be the only consumer.
    unsafe fn read(&self, buffer: &mut [T]) -> Result<(), RingBufferError> {
        let (read, count) = self.copy_out(buffer)?;
        self.read
            .store(read.wrapping_add(count as u64), Ordering::Release);
        Ok(())
    }

    /// # Safety
    /// Caller must be the only consumer.
    unsafe fn peek(&self, buffer: &mut [T]) -> Result<(), RingBufferError> {
        self.copy_out(buffer).map(|_| ())
    }

    /// # Safety
    /// Caller must be the only consumer.
    unsafe fn read_reserve(&self, count: usize) -> Result<(), RingBufferError> {
        let (read, stored) = self.consumer_view();
        if count > stored {
            return Err(RingBufferError::Underflow {
                requested: count,
                available: stored,
            });
        }
        self.read
            .store(read.wrapping_add(count as u64), Ordering::Release);
        Ok(())
    }

    /// # Safety
    /// Caller must be the only consumer, and must not keep the slice past the
    /// next `read`/`read_reserve`.
    unsafe fn peek_slot(&self, offset: usize) -> Option<&[T]> {
        let (read, stored) = self.consumer_view();
        if offset >= stored {
            return None;
        }
        let index = self.slot_index(read.wrapping_add(offset as u64));
        Some(&*self.slots(index, 1))
    }

    fn write_index(&self) -> usize {
        self.slot_index(self.written.load(Ordering::Acquire))
    }

    fn read_index(&self) -> usize {
        self.slot_index(self.read.load(Ordering::Acquire))
    }
}

/// Fixed-capacity circular store of fixed-size items.
///
/// The unsplit buffer gives single-context access to every operation through
/// `&mut self`. Use [`RingBuffer::split`] to hand the write side to the
/// acquisition loop and the read side to the window consumer.
///
/// # Example
/// ```
/// use imu_daq::data::ring_buffer::RingBuffer;
///
/// // Four items of three i16 axes each.
/// let mut rb = RingBuffer::new(vec![0i16; 12], 3).unwrap();
/// rb.write(&[1, 2, 3, 4, 5, 6]).unwrap();
/// assert_eq!(rb.count(), 2);
///
/// let mut out = [0i16; 3];
/// rb.read(&mut out).unwrap();
/// assert_eq!(out, [1, 2, 3]);
/// ```
pub struct RingBuffer<T> {
    shared: Shared<T>,
}

impl<T: Copy> RingBuffer<T> {
    /// Create a ring buffer over caller-supplied storage.
    ///
    /// # Arguments
    /// * `storage` - Backing store; ownership moves into the buffer
    /// * `item_size` - Number of `T` elements per item
    ///
    /// # Errors
    /// `BadArgument` if the storage is empty, `item_size` is zero, or the
    /// storage cannot hold at least one item. A trailing remainder smaller than
    /// one item is left unused.
    pub fn new(storage: impl Into<Box<[T]>>, item_size: usize) -> Result<Self, RingBufferError> {
        Ok(Self {
            shared: Shared::new(storage.into(), item_size)?,
        })
    }

    /// Create a ring buffer with freshly allocated storage for `capacity` items.
    pub fn with_capacity(capacity: usize, item_size: usize) -> Result<Self, RingBufferError>
    where
        T: Default,
    {
        let len = capacity
            .checked_mul(item_size)
            .ok_or(RingBufferError::BadArgument("storage size overflows usize"))?;
        Self::new(vec![T::default(); len], item_size)
    }

    /// Copy whole items in. Fails without writing anything if they do not fit.
    pub fn write(&mut self, items: &[T]) -> Result<(), RingBufferError> {
        // SAFETY: &mut self makes this the only producer.
        unsafe { self.shared.write(items) }
    }

    /// Commit `count` items already placed in the backing store.
    pub fn write_reserve(&mut self, count: usize) -> Result<(), RingBufferError> {
        // SAFETY: &mut self makes this the only producer.
        unsafe { self.shared.write_reserve(count) }
    }

    /// The next free item, for filling in place before `write_reserve(1)`.
    pub fn vacant_slot(&mut self) -> Result<&mut [T], RingBufferError> {
        // SAFETY: &mut self makes this the only producer, and the returned
        // borrow blocks any commit until it ends.
        unsafe { self.shared.vacant_slot() }
    }

    /// Copy whole items out and consume them.
    pub fn read(&mut self, buffer: &mut [T]) -> Result<(), RingBufferError> {
        // SAFETY: &mut self makes this the only consumer.
        unsafe { self.shared.read(buffer) }
    }

    /// Copy whole items out without consuming them.
    pub fn peek(&self, buffer: &mut [T]) -> Result<(), RingBufferError> {
        // SAFETY: &self excludes any concurrent &mut consumer call.
        unsafe { self.shared.peek(buffer) }
    }

    /// Consume `count` items without copying them.
    pub fn read_reserve(&mut self, count: usize) -> Result<(), RingBufferError> {
        // SAFETY: &mut self makes this the only consumer.
        unsafe { self.shared.read_reserve(count) }
    }

    /// The stored item `offset` positions after the read index.
    pub fn peek_slot(&self, offset: usize) -> Option<&[T]> {
        // SAFETY: &self excludes any concurrent &mut call on either side.
        unsafe { self.shared.peek_slot(offset) }
    }

    /// Reset both counters. Exclusive access guarantees both sides are quiesced.
    pub fn clear(&mut self) {
        self.shared.written.store(0, Ordering::Release);
        self.shared.read.store(0, Ordering::Release);
    }

    /// Number of stored items.
    pub fn count(&self) -> usize {
        self.shared.count()
    }

    /// Number of items the buffer can hold.
    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    /// Number of `T` elements per item.
    pub fn item_size(&self) -> usize {
        self.shared.item_size
    }

    /// Whether every item slot is occupied.
    pub fn is_full(&self) -> bool {
        self.count() == self.shared.capacity
    }

    /// Whether no items are stored.
    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    /// Slot the next write lands in, always `< capacity`.
    pub fn write_index(&self) -> usize {
        self.shared.write_index()
    }

    /// Slot the next read comes from, always `< capacity`.
    pub fn read_index(&self) -> usize {
        self.shared.read_index()
    }

    /// Split into a write half and a read half for two execution contexts.
    pub fn split(self) -> (Producer<T>, Consumer<T>) {
        let shared = Arc::new(self.shared);
        (
            Producer {
                shared: Arc::clone(&shared),
            },
            Consumer { shared },
        )
    }
}

/// Write half of a split [`RingBuffer`]. Not `Clone`: there is one producer.
pub struct Producer<T> {
    shared: Arc<Shared<T>>,
}

impl<T: Copy> Producer<T> {
    /// Copy whole items in. Fails without writing anything if they do not fit.
    pub fn write(&mut self, items: &[T]) -> Result<(), RingBufferError> {
        // SAFETY: Producer is unique and &mut self serializes calls.
        unsafe { self.shared.write(items) }
    }

    /// Commit `count` items already placed in the backing store.
    pub fn write_reserve(&mut self, count: usize) -> Result<(), RingBufferError> {
        // SAFETY: Producer is unique and &mut self serializes calls.
        unsafe { self.shared.write_reserve(count) }
    }

    /// The next free item, for filling in place before `write_reserve(1)`.
    pub fn vacant_slot(&mut self) -> Result<&mut [T], RingBufferError> {
        // SAFETY: Producer is unique; the slot is free so the consumer never
        // touches it, and the borrow ends before the next commit.
        unsafe { self.shared.vacant_slot() }
    }

    /// Number of stored items.
    pub fn count(&self) -> usize {
        self.shared.count()
    }

    /// Number of items the buffer can hold.
    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    /// Number of `T` elements per item.
    pub fn item_size(&self) -> usize {
        self.shared.item_size
    }

    /// Whether every item slot is occupied.
    pub fn is_full(&self) -> bool {
        self.count() == self.shared.capacity
    }

    /// Whether no items are stored.
    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    /// Slot the next write lands in.
    pub fn write_index(&self) -> usize {
        self.shared.write_index()
    }
}

/// Read half of a split [`RingBuffer`]. Not `Clone`: there is one consumer.
pub struct Consumer<T> {
    shared: Arc<Shared<T>>,
}

impl<T: Copy> Consumer<T> {
    /// Copy whole items out and consume them.
    pub fn read(&mut self, buffer: &mut [T]) -> Result<(), RingBufferError> {
        // SAFETY: Consumer is unique and &mut self serializes calls.
        unsafe { self.shared.read(buffer) }
    }

    /// Copy whole items out without consuming them.
    pub fn peek(&self, buffer: &mut [T]) -> Result<(), RingBufferError> {
        // SAFETY: Consumer is unique; &self excludes a concurrent read.
        unsafe { self.shared.peek(buffer) }
    }

    /// Consume `count` items without copying them.
    pub fn read_reserve(&mut self, count: usize) -> Result<(), RingBufferError> {
        // SAFETY: Consumer is unique and &mut self serializes calls.
        unsafe { self.shared.read_reserve(count) }
    }

    /// The stored item `offset` positions after the read index.
    pub fn peek_slot(&self, offset: usize) -> Option<&[T]> {
        // SAFETY: Consumer is unique; stored slots are never written by the
        // producer, and the borrow ends before the next read.
        unsafe { self.shared.peek_slot(offset) }
    }

    /// Number of stored items.
    pub fn count(&self) -> usize {
        self.shared.count()
    }

    /// Number of items the buffer can hold.
    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    /// Number of `T` elements per item.
    pub fn item_size(&self) -> usize {
        self.shared.item_size
    }

    /// Whether every item slot is occupied.
    pub fn is_full(&self) -> bool {
        self.count() == self.shared.capacity
    }

    /// Whether no items are stored.
    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    /// Slot the next read comes from.
    pub fn read_index(&self) -> usize {
        self.shared.read_index()
    }
}
