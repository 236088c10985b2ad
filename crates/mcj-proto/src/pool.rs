//! Reusable buffers backing inbound packets.
//!
//! Buffers are grouped into power-of-two size classes. A lease hands out a
//! [`PooledBuffer`] which returns its storage to the pool when dropped, so a
//! buffer can only be read through the value that owns it.

use std::ops::Deref;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::trace;

use crate::packet::RawPacket;

/// Smallest size class, in bytes.
const MIN_CLASS_SHIFT: u32 = 6;
/// Largest size class covers the biggest legal frame (2 MiB).
const MAX_CLASS_SHIFT: u32 = 21;
const CLASS_COUNT: usize = (MAX_CLASS_SHIFT - MIN_CLASS_SHIFT + 1) as usize;

/// Idle buffers kept per class by default.
pub const DEFAULT_BUFFERS_PER_CLASS: usize = 64;

struct PoolInner {
    classes: Mutex<Vec<Vec<Vec<u8>>>>,
    max_per_class: usize,
}

/// Thread-safe free-list of byte buffers. Cloning yields another handle to the
/// same pool.
#[derive(Clone)]
pub struct BufferPool {
    inner: Arc<PoolInner>,
}

impl BufferPool {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_BUFFERS_PER_CLASS)
    }

    /// Create a pool retaining at most `max_per_class` idle buffers per size class.
    pub fn with_capacity(max_per_class: usize) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                classes: Mutex::new(vec![Vec::new(); CLASS_COUNT]),
                max_per_class,
            }),
        }
    }

    /// Lease a buffer holding a copy of `data`.
    ///
    /// Reuses an idle buffer of the matching class or allocates a fresh one.
    pub fn lease(&self, data: &[u8]) -> PooledBuffer {
        let mut storage = match class_of(data.len()) {
            Some(class) => self
                .inner
                .classes
                .lock()
                .unwrap_or_else(PoisonError::into_inner)[class]
                .pop()
                .unwrap_or_else(|| {
                    trace!(len = data.len(), class, "buffer pool miss");
                    Vec::with_capacity(1 << (class as u32 + MIN_CLASS_SHIFT))
                }),
            None => Vec::with_capacity(data.len()),
        };
        storage.clear();
        storage.extend_from_slice(data);
        PooledBuffer {
            storage,
            pool: Some(Arc::clone(&self.inner)),
        }
    }

    /// Lease a buffer for `payload` and bind it as a packet cursor.
    pub fn acquire(&self, id: i32, payload: &[u8]) -> RawPacket {
        RawPacket::new(id, self.lease(payload))
    }

    /// Return a packet's buffer to the pool. The packet is consumed, so it
    /// cannot be read afterwards.
    pub fn release(&self, packet: RawPacket) {
        drop(packet);
    }

    /// Number of idle buffers currently held, across every class.
    pub fn idle(&self) -> usize {
        self.inner
            .classes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(Vec::len)
            .sum()
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new()
    }
}

impl PoolInner {
    fn give_back(&self, storage: Vec<u8>) {
        // Filed under the largest class the capacity fully covers.
        let cap = storage.capacity();
        if cap < 1 << MIN_CLASS_SHIFT || cap > 1 << MAX_CLASS_SHIFT {
            return;
        }
        let class = (usize::BITS - 1 - cap.leading_zeros() - MIN_CLASS_SHIFT) as usize;
        let mut classes = self.classes.lock().unwrap_or_else(PoisonError::into_inner);
        if classes[class].len() < self.max_per_class {
            classes[class].push(storage);
        }
    }
}

/// Size class index for a buffer of `len` bytes, or `None` if it is larger
/// than the biggest class.
fn class_of(len: usize) -> Option<usize> {
    let shift = len.max(1).next_power_of_two().trailing_zeros().max(MIN_CLASS_SHIFT);
    if shift > MAX_CLASS_SHIFT {
        None
    } else {
        Some((shift - MIN_CLASS_SHIFT) as usize)
    }
}

/// A leased buffer. Dereferences to its contents and goes back to the pool on drop.
pub struct PooledBuffer {
    storage: Vec<u8>,
    pool: Option<Arc<PoolInner>>,
}

impl PooledBuffer {
    /// A buffer that is not attached to any pool.
    pub fn detached(data: &[u8]) -> Self {
        Self {
            storage: data.to_vec(),
            pool: None,
        }
    }
}

impl Deref for PooledBuffer {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.storage
    }
}

impl Drop for PooledBuffer {
    fn drop(&mut self) {
        if let Some(pool) = self.pool.take() {
            pool.give_back(std::mem::take(&mut self.storage));
        }
    }
}

impl std::fmt::Debug for PooledBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledBuffer")
            .field("len", &self.storage.len())
            .field("capacity", &self.storage.capacity())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn class_boundaries() {
        assert_eq!(class_of(0), Some(0));
        assert_eq!(class_of(64), Some(0));
        assert_eq!(class_of(65), Some(1));
        assert_eq!(class_of(2_097_152), Some(CLASS_COUNT - 1));
        assert_eq!(class_of(2_097_153), None);
    }

    #[test]
    fn lease_copies_data() {
        let pool = BufferPool::new();
        let buf = pool.lease(b"hello");
        assert_eq!(&buf[..], b"hello");
    }

    #[test]
    fn dropped_buffer_is_reused() {
        let pool = BufferPool::new();
        assert_eq!(pool.idle(), 0);
        let buf = pool.lease(&[7u8; 100]);
        drop(buf);
        assert_eq!(pool.idle(), 1);

        // Same class: the idle buffer is taken back out.
        let again = pool.lease(&[1u8; 120]);
        assert_eq!(pool.idle(), 0);
        assert_eq!(&again[..], &[1u8; 120][..]);
    }

    #[test]
    fn reused_buffer_holds_only_new_data() {
        let pool = BufferPool::new();
        drop(pool.lease(&[9u8; 60]));
        let buf = pool.lease(b"ab");
        assert_eq!(&buf[..], b"ab");
    }

    #[test]
    fn idle_buffers_are_capped() {
        let pool = BufferPool::with_capacity(2);
        let leased: Vec<_> = (0..5).map(|_| pool.lease(&[0u8; 10])).collect();
        drop(leased);
        assert_eq!(pool.idle(), 2);
    }

    #[test]
    fn oversized_buffers_are_not_retained() {
        let pool = BufferPool::new();
        drop(pool.lease(&vec![0u8; 3_000_000]));
        assert_eq!(pool.idle(), 0);
    }

    #[test]
    fn release_consumes_packet() {
        let pool = BufferPool::new();
        let packet = pool.acquire(0x0B, &[0u8; 8]);
        pool.release(packet);
        assert_eq!(pool.idle(), 1);
    }

    #[test]
    fn concurrent_lease_and_release() {
        let pool = BufferPool::with_capacity(1024);
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let pool = pool.clone();
                std::thread::spawn(move || {
                    for i in 0..500 {
                        let data = vec![t as u8; (i % 300) + 1];
                        let buf = pool.lease(&data);
                        assert_eq!(&buf[..], &data[..]);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert!(pool.idle() > 0);
    }
}
