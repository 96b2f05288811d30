use std::sync::atomic::{AtomicUsize, Ordering};

use super::error::RecordError;

// ── Lock-free ring buffer for realtime-safe recording ──

/// SPSC byte ring buffer: the tuner pipeline (producer) pushes PCM bytes
/// lock-free, the dedicated writer thread (consumer) drains them to disk.
///
/// Correctness depends on the single-producer/single-consumer discipline:
/// exactly one thread calls `push`, exactly one other thread calls
/// `pop_available`/`advance`. The cursors are atomics so stores on one side
/// become visible to the other, and an explicit occupied-byte counter
/// distinguishes "empty" from "exactly full" (`head == tail` in both cases).
pub struct RingBuffer {
    #[allow(dead_code)] // Keeps allocation alive; data_ptr points into it
    data: Box<[u8]>,
    data_ptr: *mut u8,
    capacity: usize,
    /// Read cursor, mutated only by the consumer
    head: AtomicUsize,
    /// Write cursor, mutated only by the producer
    tail: AtomicUsize,
    /// Occupied byte count, updated by both sides
    used: AtomicUsize,
    /// Number of pushes rejected because the buffer was full
    overrun_count: AtomicUsize,
    /// High-water mark of buffer usage (bytes)
    max_fill_level: AtomicUsize,
}

unsafe impl Send for RingBuffer {}
unsafe impl Sync for RingBuffer {}

impl RingBuffer {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "ring buffer capacity must be non-zero");
        let mut data = vec![0u8; capacity].into_boxed_slice();
        let data_ptr = data.as_mut_ptr();
        Self {
            data,
            data_ptr,
            capacity,
            head: AtomicUsize::new(0),
            tail: AtomicUsize::new(0),
            used: AtomicUsize::new(0),
            overrun_count: AtomicUsize::new(0),
            max_fill_level: AtomicUsize::new(0),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Occupied bytes. Exact on either SPSC endpoint, a snapshot elsewhere.
    pub fn available(&self) -> usize {
        self.used.load(Ordering::Acquire)
    }

    pub fn free(&self) -> usize {
        self.capacity - self.available()
    }

    pub fn is_empty(&self) -> bool {
        self.available() == 0
    }

    pub fn overruns(&self) -> usize {
        self.overrun_count.load(Ordering::Relaxed)
    }

    pub fn max_fill(&self) -> usize {
        self.max_fill_level.load(Ordering::Relaxed)
    }

    /// Push all of `data` or nothing. Non-blocking, producer side only.
    ///
    /// Returns `RecordError::Overflow` without modifying the buffer when the
    /// free space is insufficient; the caller owns the session and must treat
    /// that as a request to stop, since audio is about to be lost.
    pub fn push(&self, data: &[u8]) -> Result<(), RecordError> {
        let len = data.len();
        if len == 0 {
            return Ok(());
        }

        // Acquire pairs with the consumer's Release in advance(): space the
        // consumer freed is safe to overwrite once observed here.
        let used = self.used.load(Ordering::Acquire);
        let free = self.capacity - used;
        if len > free {
            self.overrun_count.fetch_add(1, Ordering::Relaxed);
            return Err(RecordError::Overflow {
                requested: len,
                free,
            });
        }

        // At most two contiguous copies across the wrap boundary
        let tail = self.tail.load(Ordering::Relaxed);
        let first = len.min(self.capacity - tail);
        unsafe {
            std::ptr::copy_nonoverlapping(data.as_ptr(), self.data_ptr.add(tail), first);
            if first < len {
                std::ptr::copy_nonoverlapping(data.as_ptr().add(first), self.data_ptr, len - first);
            }
        }
        self.tail.store((tail + len) % self.capacity, Ordering::Relaxed);

        // Release publishes the copied bytes to the consumer
        self.used.fetch_add(len, Ordering::Release);
        self.max_fill_level.fetch_max(used + len, Ordering::Relaxed);
        Ok(())
    }

    /// Borrow the contiguous occupied run starting at the read cursor, up to
    /// the write cursor or the buffer end; it never wraps within one call.
    /// A wrapped backlog takes two `pop_available`/`advance` rounds.
    ///
    /// Consumer side only. The span stays valid until `advance` retires it.
    pub fn pop_available(&self) -> &[u8] {
        let used = self.used.load(Ordering::Acquire);
        if used == 0 {
            return &[];
        }
        let head = self.head.load(Ordering::Relaxed);
        let len = used.min(self.capacity - head);
        unsafe { std::slice::from_raw_parts(self.data_ptr.add(head), len) }
    }

    /// Retire `n` consumed bytes, moving the read cursor forward.
    /// Consumer side only; `n` must not exceed the last `pop_available` span.
    pub fn advance(&self, n: usize) {
        if n == 0 {
            return;
        }
        debug_assert!(n <= self.used.load(Ordering::Relaxed));
        let head = self.head.load(Ordering::Relaxed);
        self.head.store((head + n) % self.capacity, Ordering::Relaxed);
        // Release hands the freed region back to the producer
        self.used.fetch_sub(n, Ordering::Release);
    }
}
