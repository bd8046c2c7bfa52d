//! Ring buffer property tests
//!
//! FIFO round-trip, all-or-nothing admission and peek/read equivalence over
//! arbitrary buffer geometries and write patterns.

use imu_daq::data::ring_buffer::RingBuffer;
use imu_daq::error::RingBufferError;
use proptest::prelude::*;

/// `(capacity, item_size, chunk sizes summing to at most capacity)`.
fn geometry_and_chunks() -> impl Strategy<Value = (usize, usize, Vec<usize>)> {
    (1usize..64, 1usize..8).prop_flat_map(|(capacity, item_size)| {
        let chunks = prop::collection::vec(1usize..=capacity, 0..16).prop_map(move |sizes| {
            let mut total = 0;
            sizes
                .into_iter()
                .take_while(|&s| {
                    total += s;
                    total <= capacity
                })
                .collect::<Vec<_>>()
        });
        (Just(capacity), Just(item_size), chunks)
    })
}

fn pattern(start: usize, items: usize, item_size: usize) -> Vec<u32> {
    (start * item_size..(start + items) * item_size)
        .map(|v| v as u32)
        .collect()
}

proptest! {
    #[test]
    fn fifo_round_trip((capacity, item_size, chunks) in geometry_and_chunks()) {
        let mut rb = RingBuffer::<u32>::with_capacity(capacity, item_size).unwrap();

        let mut written = 0;
        for &items in &chunks {
            rb.write(&pattern(written, items, item_size)).unwrap();
            written += items;
        }
        prop_assert_eq!(rb.count(), written);

        // Read back with the same chunking in reverse order of sizes.
        let mut read = 0;
        for &items in chunks.iter().rev() {
            let mut out = vec![0u32; items * item_size];
            rb.read(&mut out).unwrap();
            prop_assert_eq!(out, pattern(read, items, item_size));
            read += items;
        }
        prop_assert!(rb.is_empty());
    }

    #[test]
    fn fifo_across_wrap_around(
        capacity in 1usize..32,
        item_size in 1usize..6,
        rounds in 1usize..12,
    ) {
        let mut rb = RingBuffer::<u32>::with_capacity(capacity, item_size).unwrap();
        let half = capacity.div_ceil(2);
        let mut next_write = 0;
        let mut next_read = 0;

        for _ in 0..rounds {
            rb.write(&pattern(next_write, half, item_size)).unwrap();
            next_write += half;

            let mut out = vec![0u32; half * item_size];
            rb.read(&mut out).unwrap();
            prop_assert_eq!(out, pattern(next_read, half, item_size));
            next_read += half;
        }
        prop_assert_eq!(rb.write_index(), (rounds * half) % capacity);
    }

    #[test]
    fn overflow_leaves_state_unchanged(
        capacity in 1usize..32,
        item_size in 1usize..6,
        prefill in 0usize..32,
        extra in 1usize..8,
    ) {
        let prefill = prefill.min(capacity);
        let mut rb = RingBuffer::<u32>::with_capacity(capacity, item_size).unwrap();
        rb.write(&pattern(0, prefill, item_size)).unwrap();
        let write_index = rb.write_index();

        let too_many = capacity - prefill + extra;
        let err = rb.write(&pattern(prefill, too_many, item_size)).unwrap_err();
        prop_assert_eq!(err, RingBufferError::Overflow {
            requested: too_many,
            available: capacity - prefill,
        });
        prop_assert_eq!(rb.count(), prefill);
        prop_assert_eq!(rb.write_index(), write_index);

        let mut out = vec![0u32; prefill * item_size];
        rb.read(&mut out).unwrap();
        prop_assert_eq!(out, pattern(0, prefill, item_size));
    }

    #[test]
    fn underflow_leaves_state_unchanged(
        capacity in 1usize..32,
        item_size in 1usize..6,
        stored in 0usize..32,
        extra in 1usize..8,
    ) {
        let stored = stored.min(capacity);
        let mut rb = RingBuffer::<u32>::with_capacity(capacity, item_size).unwrap();
        rb.write(&pattern(0, stored, item_size)).unwrap();
        let read_index = rb.read_index();

        let mut out = vec![0u32; (stored + extra) * item_size];
        let err = rb.read(&mut out).unwrap_err();
        prop_assert_eq!(err, RingBufferError::Underflow {
            requested: stored + extra,
            available: stored,
        });
        prop_assert_eq!(rb.count(), stored);
        prop_assert_eq!(rb.read_index(), read_index);
        prop_assert!(out.iter().all(|&v| v == 0));
    }

    #[test]
    fn peek_then_reserve_equals_read(
        capacity in 1usize..32,
        item_size in 1usize..6,
        offset in 0usize..32,
        take in 1usize..32,
    ) {
        let offset = offset % capacity;
        let take = take.min(capacity);
        let mut a = RingBuffer::<u32>::with_capacity(capacity, item_size).unwrap();
        let mut b = RingBuffer::<u32>::with_capacity(capacity, item_size).unwrap();

        // Start both buffers at the same non-zero position.
        for rb in [&mut a, &mut b] {
            rb.write(&pattern(0, offset, item_size)).unwrap();
            rb.read_reserve(offset).unwrap();
            rb.write(&pattern(offset, take, item_size)).unwrap();
        }

        let mut peeked = vec![0u32; take * item_size];
        a.peek(&mut peeked).unwrap();
        prop_assert_eq!(a.count(), take);
        a.read_reserve(take).unwrap();

        let mut read = vec![0u32; take * item_size];
        b.read(&mut read).unwrap();

        prop_assert_eq!(peeked, read);
        prop_assert_eq!(a.count(), b.count());
        prop_assert_eq!(a.read_index(), b.read_index());
    }

    #[test]
    fn peek_then_read_equals_read(
        capacity in 1usize..32,
        item_size in 1usize..6,
        offset in 0usize..32,
        take in 1usize..32,
    ) {
        let offset = offset % capacity;
        let take = take.min(capacity);
        let mut a = RingBuffer::<u32>::with_capacity(capacity, item_size).unwrap();
        let mut b = RingBuffer::<u32>::with_capacity(capacity, item_size).unwrap();

        for rb in [&mut a, &mut b] {
            rb.write(&pattern(0, offset, item_size)).unwrap();
            rb.read_reserve(offset).unwrap();
            rb.write(&pattern(offset, take, item_size)).unwrap();
        }

        // Peek leaves the data in place for the following read.
        let mut peeked = vec![0u32; take * item_size];
        a.peek(&mut peeked).unwrap();
        let mut after_peek = vec![0u32; take * item_size];
        a.read(&mut after_peek).unwrap();

        let mut plain = vec![0u32; take * item_size];
        b.read(&mut plain).unwrap();

        prop_assert_eq!(&peeked, &after_peek);
        prop_assert_eq!(&after_peek, &plain);
        prop_assert_eq!(peeked, pattern(offset, take, item_size));
        prop_assert!(a.is_empty());
        prop_assert_eq!(a.count(), b.count());
        prop_assert_eq!(a.read_index(), b.read_index());
        prop_assert_eq!(a.write_index(), b.write_index());
    }
}

#[test]
fn test_rejects_invalid_geometry() {
    assert_eq!(
        RingBuffer::<u8>::with_capacity(0, 1).err(),
        Some(RingBufferError::BadArgument("storage is empty"))
    );
    assert!(RingBuffer::<u8>::with_capacity(4, 0).is_err());
    assert!(RingBuffer::<u8>::new(vec![0u8; 3], 4).is_err());
}

#[test]
fn test_partial_item_length_rejected() {
    let mut rb = RingBuffer::<u8>::with_capacity(4, 3).unwrap();
    assert!(matches!(
        rb.write(&[1, 2]),
        Err(RingBufferError::BadArgument(_))
    ));
    assert!(rb.is_empty());
}
