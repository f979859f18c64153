// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Lock-free circular byte queue over a double-mapped data region.
//!
//! Wait-free single-producer single-consumer protocol. The control block sits
//! in the first page of the region; the data region starts one page later and
//! is mapped twice back to back, so every span shorter than the capacity is
//! contiguous in the address space even when it wraps.
//!
//! ```text
//! | control page | data (capacity) | data again (capacity) |
//!                 ^                 ^
//!                 data[0]           data[capacity] == data[0]
//! ```
//!
//! [`CircularQueue`] is the shared view and only observes the indices. Bytes
//! are written through the single [`Producer`] and read through the single
//! [`Consumer`] a view hands out. Both take `&mut self`, so a writable span
//! ends before it is committed and a readable span ends before it is popped.
//!
//! Memory ordering: `commit` publishes `write_index` with a release store when
//! the queue is synchronized, and `peek` issues an acquire fence after its
//! relaxed load of `write_index`. `read_index` is always stored relaxed: the
//! producer only uses it to bound free space, and a stale value only makes
//! that bound smaller.

use std::cell::Cell;
use std::marker::PhantomData;
use std::mem::size_of;
use std::ptr::NonNull;
use std::sync::atomic::{fence, AtomicBool, AtomicUsize, Ordering};

use crate::error::SharedMemoryError;
use crate::shm::footprint::page_size;

/// Size of the slot each hot control field occupies.
pub const CACHE_LINE_SIZE: usize = 64;

type PhantomUnsync = PhantomData<Cell<&'static ()>>;

/// One cache line holding a single index.
#[repr(C)]
struct IndexSlot {
    value: AtomicUsize,
    _pad: [u8; CACHE_LINE_SIZE - size_of::<AtomicUsize>()],
}

/// Immutable queue properties, written once when the queue is created.
#[repr(C)]
struct PropertiesSlot {
    /// Capacity in bytes. Zero until creation completes.
    capacity: AtomicUsize,
    /// Release/acquire publication when set.
    sync: AtomicBool,
    _pad: [u8; CACHE_LINE_SIZE - size_of::<AtomicUsize>() - size_of::<AtomicBool>()],
}

/// Control block stored at the start of the region.
#[repr(C)]
struct ControlBlock {
    /// Next byte to read. Consumer writes, producer reads.
    read_index: IndexSlot,
    /// Next byte to write. Producer writes, consumer reads.
    write_index: IndexSlot,
    properties: PropertiesSlot,
}

const _: () = assert!(size_of::<ControlBlock>() == 3 * CACHE_LINE_SIZE);

/// Properties of a queue being created, as seen by its metadata hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueProperties {
    pub capacity: usize,
    pub sync: bool,
}

/// Signature of the creation-time metadata hook.
///
/// Receives the properties about to be published and the reserved metadata
/// span. Returning an error aborts creation.
pub type MetadataInit<'a> =
    dyn FnMut(&QueueProperties, &mut [u8]) -> Result<(), String> + 'a;

/// Shared view of a circular byte queue.
///
/// The queue does not own its memory; [`crate::shm::MappedQueue`] does.
/// Each view hands out at most one [`Producer`] and one [`Consumer`] at a
/// time. Other views of the same region (in this or another process) must
/// not hold the same role concurrently.
pub struct CircularQueue {
    control: NonNull<ControlBlock>,
    data: NonNull<u8>,
    producer_claimed: AtomicBool,
    consumer_claimed: AtomicBool,
}

// SAFETY: the shared view only touches the control block through atomics and
// the metadata span after it is published. Data bytes are reached through the
// role handles, which are unique per view.
unsafe impl Send for CircularQueue {}
unsafe impl Sync for CircularQueue {}

impl CircularQueue {
    /// Bytes used by the control fields. Metadata starts right after them.
    pub const CONTROL_SIZE: usize = size_of::<ControlBlock>();

    /// Bind a queue onto memory starting at `base`.
    ///
    /// # Safety
    /// `base` must be page aligned and valid for reads and writes of one page
    /// plus twice the capacity the queue has or will be initialized with, and
    /// must stay valid for the lifetime of the returned value. For wrapped
    /// spans to read back correctly, the second capacity bytes must alias the
    /// first.
    pub unsafe fn from_raw(base: NonNull<u8>) -> Self {
        Self {
            control: base.cast(),
            data: NonNull::new_unchecked(base.as_ptr().add(page_size())),
            producer_claimed: AtomicBool::new(false),
            consumer_claimed: AtomicBool::new(false),
        }
    }

    /// Start of the bound memory (the control block).
    pub fn as_ptr(&self) -> *mut u8 {
        self.control.as_ptr().cast()
    }

    fn control(&self) -> &ControlBlock {
        // SAFETY: `from_raw` guarantees the control page outlives `self`.
        unsafe { self.control.as_ref() }
    }

    /// Initialize a freshly created queue.
    ///
    /// Resets both indices, runs `initializer` against the metadata span, then
    /// stores `sync` and finally publishes `capacity` with release ordering.
    /// Attaching parties treat a non-zero capacity as the ready signal, so it
    /// is the last field written.
    ///
    /// # Safety
    /// Nothing else may read or write the region until this returns.
    ///
    /// # Panics
    /// Panics if `capacity` is zero.
    pub unsafe fn init(
        &self,
        capacity: usize,
        sync: bool,
        initializer: &mut MetadataInit<'_>,
    ) -> Result<(), String> {
        assert!(capacity > 0, "capacity must be positive");

        let control = self.control();
        control.read_index.value.store(0, Ordering::Relaxed);
        control.write_index.value.store(0, Ordering::Relaxed);

        let metadata = std::slice::from_raw_parts_mut(
            self.as_ptr().add(Self::CONTROL_SIZE),
            page_size() - Self::CONTROL_SIZE,
        );
        initializer(&QueueProperties { capacity, sync }, metadata)?;

        control.properties.sync.store(sync, Ordering::Relaxed);
        control
            .properties
            .capacity
            .store(capacity, Ordering::Release);
        Ok(())
    }

    /// Capacity published at `base`, loaded with acquire ordering.
    ///
    /// Zero means the creator has not finished initializing the region.
    ///
    /// # Safety
    /// `base` must be valid for reads of [`Self::CONTROL_SIZE`] bytes.
    pub(crate) unsafe fn published_capacity_at(base: NonNull<u8>) -> usize {
        base.cast::<ControlBlock>()
            .as_ref()
            .properties
            .capacity
            .load(Ordering::Acquire)
    }

    /// Capacity in bytes. Immutable after initialization.
    pub fn capacity(&self) -> usize {
        self.control().properties.capacity.load(Ordering::Relaxed)
    }

    /// Whether index publication uses release/acquire ordering.
    pub fn is_sync(&self) -> bool {
        self.control().properties.sync.load(Ordering::Relaxed)
    }

    /// Caller-defined bytes between the control fields and the data region.
    pub fn metadata(&self) -> &[u8] {
        // SAFETY: the metadata span lies inside the control page and is only
        // written during `init`, before the queue is published.
        unsafe {
            std::slice::from_raw_parts(
                self.as_ptr().add(Self::CONTROL_SIZE),
                page_size() - Self::CONTROL_SIZE,
            )
        }
    }

    /// True iff there is nothing to read.
    pub fn is_empty(&self) -> bool {
        let (rp, wp) = self.indices();
        rp == wp
    }

    /// Bytes ready to read, in `[0, capacity)`.
    pub fn available(&self) -> usize {
        let (rp, wp) = self.indices();
        self.available_between(rp, wp)
    }

    /// Bytes free to write, in `[0, capacity - 1]`.
    pub fn space(&self) -> usize {
        let (rp, wp) = self.indices();
        self.space_between(rp, wp)
    }

    /// Claim the write end of this view.
    ///
    /// Fails with [`SharedMemoryError::RoleInUse`] while another producer
    /// from this view is alive.
    pub fn producer(&self) -> Result<Producer<'_>, SharedMemoryError> {
        claim(&self.producer_claimed, "producer")?;
        Ok(Producer {
            queue: self,
            _unsync: PhantomData,
        })
    }

    /// Claim the read end of this view.
    ///
    /// Fails with [`SharedMemoryError::RoleInUse`] while another consumer
    /// from this view is alive.
    pub fn consumer(&self) -> Result<Consumer<'_>, SharedMemoryError> {
        claim(&self.consumer_claimed, "consumer")?;
        Ok(Consumer {
            queue: self,
            _unsync: PhantomData,
        })
    }

    fn indices(&self) -> (usize, usize) {
        let control = self.control();
        let rp = control.read_index.value.load(Ordering::Relaxed);
        let wp = control.write_index.value.load(Ordering::Relaxed);
        (rp, wp)
    }

    fn available_between(&self, rp: usize, wp: usize) -> usize {
        let capacity = self.capacity();
        let n = if wp >= rp {
            // _____xxxxx_____
            //      ^    ^
            //     rp    wp
            wp - rp
        } else {
            // xxxxx_____xxxxx
            //      ^    ^
            //     wp    rp
            capacity + wp - rp
        };
        debug_assert!(n < capacity);
        n
    }

    fn space_between(&self, rp: usize, wp: usize) -> usize {
        // One byte stays free to tell a full queue from an empty one.
        self.capacity() - 1 - self.available_between(rp, wp)
    }
}

fn claim(flag: &AtomicBool, role: &'static str) -> Result<(), SharedMemoryError> {
    flag.compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
        .map(|_| ())
        .map_err(|_| SharedMemoryError::RoleInUse { role })
}

/// Write end of a [`CircularQueue`].
///
/// A writable span borrows the producer, so it cannot outlive the next
/// `alloc` or the `commit` that publishes it:
///
/// ```compile_fail
/// use twinring_core::{shm::page_size, QueueFactory};
///
/// let mut factory = QueueFactory::private(page_size());
/// let queue = factory.get().unwrap();
/// let mut tx = queue.producer().unwrap();
/// let a = tx.alloc(4).unwrap();
/// let b = tx.alloc(4).unwrap();
/// a[0] = 1;
/// b[0] = 2;
/// ```
///
/// The producer can move to another thread but is not shared between threads:
///
/// ```compile_fail
/// fn shared<T: Sync>() {}
/// shared::<twinring_core::shm::Producer<'static>>();
/// ```
pub struct Producer<'a> {
    queue: &'a CircularQueue,
    _unsync: PhantomUnsync,
}

impl<'a> Producer<'a> {
    /// The shared view this producer writes to.
    pub fn queue(&self) -> &'a CircularQueue {
        self.queue
    }

    /// Bytes free to write, in `[0, capacity - 1]`.
    pub fn space(&self) -> usize {
        self.queue.space()
    }

    /// Writable span of `len` bytes at the write index, or `None` when there
    /// is not enough space. Nothing is published until [`commit`](Self::commit).
    ///
    /// # Panics
    /// Panics if `len` is zero or not smaller than the capacity.
    pub fn alloc(&mut self, len: usize) -> Option<&mut [u8]> {
        let queue = self.queue;
        let capacity = queue.capacity();
        assert!(len > 0, "alloc length must be positive");
        assert!(
            len < capacity,
            "alloc of {} bytes must be smaller than capacity {}",
            len,
            capacity
        );

        let (rp, wp) = queue.indices();
        if len > queue.space_between(rp, wp) {
            return None;
        }

        // SAFETY: wp < capacity and len < capacity keep the span inside the
        // doubled data region. The consumer never reads past the write index,
        // and the span's borrow of `self` ends before the next alloc or commit.
        Some(unsafe { std::slice::from_raw_parts_mut(queue.data.as_ptr().add(wp), len) })
    }

    /// Publish `len` bytes written through [`alloc`](Self::alloc).
    ///
    /// # Panics
    /// Panics if `len` is zero, not smaller than the capacity, or larger than
    /// [`space`](Self::space).
    pub fn commit(&mut self, len: usize) {
        let queue = self.queue;
        let capacity = queue.capacity();
        assert!(len > 0, "commit length must be positive");
        assert!(
            len < capacity,
            "commit of {} bytes must be smaller than capacity {}",
            len,
            capacity
        );
        assert!(
            len <= queue.space(),
            "commit of {} bytes exceeds free space",
            len
        );

        let order = if queue.is_sync() {
            Ordering::Release
        } else {
            Ordering::Relaxed
        };
        let index = &queue.control().write_index.value;
        let wp = index.load(Ordering::Relaxed);
        index.store((wp + len) % capacity, order);
    }

    /// Copy `payload` into the queue and publish it.
    ///
    /// Returns `false` when there is not enough space.
    ///
    /// # Panics
    /// Panics if `payload` is empty or not smaller than the capacity.
    pub fn push(&mut self, payload: &[u8]) -> bool {
        match self.alloc(payload.len()) {
            Some(span) => {
                span.copy_from_slice(payload);
                self.commit(payload.len());
                true
            }
            None => false,
        }
    }

    /// Copy a plain value into the queue and publish it.
    pub fn push_value<T: Copy>(&mut self, value: &T) -> bool {
        let len = size_of::<T>();
        match self.alloc(len) {
            Some(span) => {
                // SAFETY: span is exactly size_of::<T>() writable bytes.
                unsafe { std::ptr::write_unaligned(span.as_mut_ptr().cast::<T>(), *value) };
                self.commit(len);
                true
            }
            None => false,
        }
    }
}

impl Drop for Producer<'_> {
    fn drop(&mut self) {
        self.queue.producer_claimed.store(false, Ordering::Release);
    }
}

/// Read end of a [`CircularQueue`].
///
/// A readable view borrows the consumer, so the bytes cannot be popped (and
/// handed back to the producer) while the view is alive:
///
/// ```compile_fail
/// use twinring_core::{shm::page_size, QueueFactory};
///
/// let mut factory = QueueFactory::private(page_size());
/// let queue = factory.get().unwrap();
/// let mut tx = queue.producer().unwrap();
/// let mut rx = queue.consumer().unwrap();
/// assert!(tx.push(b"abcd"));
/// let view = rx.peek().unwrap();
/// rx.pop(4);
/// assert_eq!(view, b"abcd");
/// ```
pub struct Consumer<'a> {
    queue: &'a CircularQueue,
    _unsync: PhantomUnsync,
}

impl<'a> Consumer<'a> {
    /// The shared view this consumer reads from.
    pub fn queue(&self) -> &'a CircularQueue {
        self.queue
    }

    /// Bytes ready to read, in `[0, capacity)`.
    pub fn available(&self) -> usize {
        self.queue.available()
    }

    /// True iff there is nothing to read.
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Contiguous view of every readable byte, or `None` when empty.
    pub fn peek(&mut self) -> Option<&[u8]> {
        let queue = self.queue;
        let (rp, wp) = queue.indices();

        if rp == wp {
            return None;
        }

        if queue.is_sync() {
            // Pairs with the release store in `commit`.
            fence(Ordering::Acquire);
        }

        let len = queue.available_between(rp, wp);
        // SAFETY: rp < capacity and len < capacity, so the span ends inside
        // the doubled data region. The producer does not touch it until popped,
        // and popping needs the borrow this view holds.
        Some(unsafe { std::slice::from_raw_parts(queue.data.as_ptr().add(rp), len) })
    }

    /// Discard `len` readable bytes.
    ///
    /// # Panics
    /// Panics if `len` is zero or exceeds [`available`](Self::available).
    pub fn pop(&mut self, len: usize) {
        let queue = self.queue;
        assert!(len > 0, "pop length must be positive");
        assert!(
            len <= queue.available(),
            "pop of {} bytes exceeds available data",
            len
        );

        let capacity = queue.capacity();
        let index = &queue.control().read_index.value;
        let rp = index.load(Ordering::Relaxed);
        index.store((rp + len) % capacity, Ordering::Relaxed);
    }

    /// Read the value at the front of the queue without popping it.
    ///
    /// Returns `None` when fewer than `size_of::<T>()` bytes are available.
    ///
    /// # Safety
    /// The front bytes must hold a valid `T`, e.g. written by
    /// [`Producer::push_value`] with the same `T`.
    pub unsafe fn front_value<T: Copy>(&mut self) -> Option<T> {
        let bytes = self.peek()?;
        if bytes.len() < size_of::<T>() {
            return None;
        }
        Some(std::ptr::read_unaligned(bytes.as_ptr().cast::<T>()))
    }
}

impl Drop for Consumer<'_> {
    fn drop(&mut self) {
        self.queue.consumer_claimed.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::alloc::{alloc_zeroed, dealloc, Layout};

    use proptest::prelude::*;

    /// Page aligned heap memory big enough for a queue of `capacity` bytes.
    ///
    /// The data region is not aliased, so tests on it must not read spans
    /// that wrap.
    struct HeapRegion {
        ptr: NonNull<u8>,
        layout: Layout,
    }

    impl HeapRegion {
        fn new(capacity: usize) -> Self {
            let layout = Layout::from_size_align(page_size() + 2 * capacity, page_size()).unwrap();
            let ptr = NonNull::new(unsafe { alloc_zeroed(layout) }).unwrap();
            Self { ptr, layout }
        }

        fn queue(&self, capacity: usize, sync: bool) -> CircularQueue {
            let queue = unsafe { CircularQueue::from_raw(self.ptr) };
            unsafe { queue.init(capacity, sync, &mut |_, _| Ok(())) }.unwrap();
            queue
        }
    }

    impl Drop for HeapRegion {
        fn drop(&mut self) {
            unsafe { dealloc(self.ptr.as_ptr(), self.layout) };
        }
    }

    #[test]
    fn test_control_fields_on_separate_cache_lines() {
        assert_eq!(size_of::<IndexSlot>(), CACHE_LINE_SIZE);
        assert_eq!(size_of::<PropertiesSlot>(), CACHE_LINE_SIZE);
        assert_eq!(CircularQueue::CONTROL_SIZE, 3 * CACHE_LINE_SIZE);
    }

    #[test]
    fn test_fresh_queue_is_empty() {
        let region = HeapRegion::new(64);
        let queue = region.queue(64, true);
        let mut rx = queue.consumer().unwrap();

        assert!(queue.is_empty());
        assert_eq!(queue.capacity(), 64);
        assert!(queue.is_sync());
        assert_eq!(queue.available(), 0);
        assert_eq!(queue.space(), 63);
        assert!(rx.peek().is_none());
    }

    #[test]
    fn test_metadata_initializer_runs_before_publication() {
        let region = HeapRegion::new(64);
        let queue = unsafe { CircularQueue::from_raw(region.ptr) };

        let result = unsafe {
            queue.init(64, false, &mut |properties, metadata| {
                assert_eq!(*properties, QueueProperties { capacity: 64, sync: false });
                assert_eq!(
                    CircularQueue::published_capacity_at(region.ptr),
                    0,
                    "capacity published before the hook ran"
                );
                metadata[..5].copy_from_slice(b"hello");
                Ok(())
            })
        };
        result.unwrap();

        assert_eq!(&queue.metadata()[..5], b"hello");
        assert_eq!(queue.metadata().len(), page_size() - CircularQueue::CONTROL_SIZE);
        assert_eq!(unsafe { CircularQueue::published_capacity_at(region.ptr) }, 64);
        assert!(!queue.is_sync());
    }

    #[test]
    fn test_metadata_initializer_failure_leaves_queue_unpublished() {
        let region = HeapRegion::new(64);
        let queue = unsafe { CircularQueue::from_raw(region.ptr) };

        let result = unsafe { queue.init(64, true, &mut |_, _| Err("refused".to_string())) };

        assert_eq!(result, Err("refused".to_string()));
        assert_eq!(unsafe { CircularQueue::published_capacity_at(region.ptr) }, 0);
    }

    #[test]
    fn test_push_peek_pop() {
        let region = HeapRegion::new(64);
        let queue = region.queue(64, true);
        let mut tx = queue.producer().unwrap();
        let mut rx = queue.consumer().unwrap();

        assert!(tx.push(b"Hello World!"));
        assert_eq!(rx.available(), 12);
        assert_eq!(tx.space(), 63 - 12);
        assert_eq!(rx.peek(), Some(&b"Hello World!"[..]));

        rx.pop(6);
        assert_eq!(rx.peek(), Some(&b"World!"[..]));
        rx.pop(6);
        assert!(rx.is_empty());
    }

    #[test]
    fn test_alloc_commit_publishes_only_on_commit() {
        let region = HeapRegion::new(64);
        let queue = region.queue(64, true);
        let mut tx = queue.producer().unwrap();
        let mut rx = queue.consumer().unwrap();

        let span = tx.alloc(4).unwrap();
        span.copy_from_slice(b"abcd");
        assert!(rx.is_empty());

        tx.commit(4);
        assert_eq!(rx.peek(), Some(&b"abcd"[..]));
    }

    #[test]
    fn test_full_queue_rejects_push() {
        let region = HeapRegion::new(16);
        let queue = region.queue(16, true);
        let mut tx = queue.producer().unwrap();
        let mut rx = queue.consumer().unwrap();

        assert!(tx.push(&[1; 10]));
        assert!(tx.push(&[2; 5]));
        assert_eq!(tx.space(), 0);

        assert!(!tx.push(&[3]));
        assert!(tx.alloc(1).is_none());

        rx.pop(3);
        assert_eq!(tx.space(), 3);
        assert!(tx.alloc(4).is_none());
        assert!(tx.alloc(3).is_some());
    }

    #[test]
    fn test_typed_values() {
        let region = HeapRegion::new(64);
        let queue = region.queue(64, true);
        let mut tx = queue.producer().unwrap();
        let mut rx = queue.consumer().unwrap();

        assert!(tx.push_value(&42u64));
        assert_eq!(rx.available(), size_of::<u64>());
        assert_eq!(unsafe { rx.front_value::<u64>() }, Some(42));

        rx.pop(size_of::<u64>());
        assert_eq!(unsafe { rx.front_value::<u64>() }, None);
    }

    #[test]
    fn test_relaxed_queue_round_trip() {
        let region = HeapRegion::new(32);
        let queue = region.queue(32, false);
        let mut tx = queue.producer().unwrap();
        let mut rx = queue.consumer().unwrap();

        assert!(tx.push(b"xyz"));
        assert_eq!(rx.peek(), Some(&b"xyz"[..]));
    }

    #[test]
    fn test_each_role_is_claimed_once() {
        let region = HeapRegion::new(64);
        let queue = region.queue(64, true);

        let tx = queue.producer().unwrap();
        let rx = queue.consumer().unwrap();
        assert!(matches!(
            queue.producer(),
            Err(SharedMemoryError::RoleInUse { role: "producer" })
        ));
        assert!(matches!(
            queue.consumer(),
            Err(SharedMemoryError::RoleInUse { role: "consumer" })
        ));

        drop(tx);
        drop(rx);
        assert!(queue.producer().is_ok());
        assert!(queue.consumer().is_ok());
    }

    #[test]
    fn test_role_handles_move_between_threads() {
        let region = HeapRegion::new(64);
        let queue = region.queue(64, true);
        let mut tx = queue.producer().unwrap();
        let mut rx = queue.consumer().unwrap();

        std::thread::scope(|s| {
            s.spawn(move || assert!(tx.push(b"moved")));
        });
        assert_eq!(rx.peek(), Some(&b"moved"[..]));
        rx.pop(5);
        assert!(queue.producer().is_ok());
    }

    #[test]
    #[should_panic(expected = "smaller than capacity")]
    fn test_alloc_of_capacity_panics() {
        let region = HeapRegion::new(16);
        let queue = region.queue(16, true);
        queue.producer().unwrap().alloc(16);
    }

    #[test]
    #[should_panic(expected = "must be positive")]
    fn test_zero_length_commit_panics() {
        let region = HeapRegion::new(16);
        let queue = region.queue(16, true);
        queue.producer().unwrap().commit(0);
    }

    #[test]
    #[should_panic(expected = "exceeds available")]
    fn test_pop_beyond_available_panics() {
        let region = HeapRegion::new(16);
        let queue = region.queue(16, true);
        assert!(queue.producer().unwrap().push(b"ab"));
        queue.consumer().unwrap().pop(3);
    }

    #[test]
    #[should_panic(expected = "exceeds free space")]
    fn test_commit_beyond_space_panics() {
        let region = HeapRegion::new(16);
        let queue = region.queue(16, true);
        let mut tx = queue.producer().unwrap();
        assert!(tx.push(&[0; 14]));
        tx.commit(2);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Push(usize),
        Pop(usize),
    }

    fn arb_ops(capacity: usize) -> impl Strategy<Value = Vec<Op>> {
        proptest::collection::vec(
            prop_oneof![
                (1..capacity).prop_map(Op::Push),
                (1..capacity).prop_map(Op::Pop),
            ],
            1..200,
        )
    }

    fn arb_case() -> impl Strategy<Value = (usize, Vec<Op>)> {
        (2usize..512).prop_flat_map(|capacity| (Just(capacity), arb_ops(capacity)))
    }

    proptest! {
        #[test]
        fn available_plus_space_is_capacity_minus_one((capacity, ops) in arb_case()) {
            let region = HeapRegion::new(capacity);
            let queue = region.queue(capacity, true);
            let mut tx = queue.producer().unwrap();
            let mut rx = queue.consumer().unwrap();
            let mut model = 0usize;

            for op in ops {
                match op {
                    Op::Push(len) => {
                        let fits = len <= tx.space();
                        let allocated = tx.alloc(len).is_some();
                        prop_assert_eq!(allocated, fits);
                        if allocated {
                            tx.commit(len);
                            model += len;
                        }
                    }
                    Op::Pop(len) => {
                        let len = len.min(rx.available());
                        if len > 0 {
                            rx.pop(len);
                            model -= len;
                        }
                    }
                }

                prop_assert_eq!(queue.available(), model);
                prop_assert_eq!(queue.available() + queue.space(), capacity - 1);
                prop_assert_eq!(queue.is_empty(), model == 0);
            }
        }
    }
}
