//! Size-keyed scratch buffer pool.
//!
//! Buffers are handed out as [`PooledBuffer`] guards and go back to the free
//! list of their size when the guard drops, including on early returns and
//! unwinding. An empty free list allocates a fresh buffer instead of blocking;
//! those allocations are counted as misses.

use std::collections::HashMap;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

#[derive(Debug)]
pub struct BufferPool {
    free: Mutex<HashMap<usize, Vec<Vec<f32>>>>,
    slots: usize,
    misses: AtomicU64,
}

impl BufferPool {
    /// Empty pool keeping at most `slots` idle buffers per size
    pub fn new(slots: usize) -> Self {
        Self {
            free: Mutex::new(HashMap::new()),
            slots,
            misses: AtomicU64::new(0),
        }
    }

    /// Pool pre-filled with `slots` buffers of each size
    pub fn with_sizes(sizes: &[usize], slots: usize) -> Self {
        let pool = Self::new(slots);
        if let Ok(mut free) = pool.free.lock() {
            for &len in sizes {
                let list = free.entry(len).or_default();
                while list.len() < slots {
                    list.push(vec![0.0; len]);
                }
            }
        }
        pool
    }

    /// Zeroed buffer of exactly `len` values
    pub fn acquire(&self, len: usize) -> PooledBuffer<'_> {
        let reused = self
            .free
            .lock()
            .ok()
            .and_then(|mut free| free.get_mut(&len).and_then(Vec::pop));

        let buf = match reused {
            Some(mut buf) => {
                buf.fill(0.0);
                buf
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                vec![0.0; len]
            }
        };

        PooledBuffer {
            pool: self,
            buf: Some(buf),
        }
    }

    fn release(&self, buf: Vec<f32>) {
        if let Ok(mut free) = self.free.lock() {
            let list = free.entry(buf.len()).or_default();
            if list.len() < self.slots {
                list.push(buf);
            }
        }
    }

    /// Acquisitions that had to allocate
    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    /// Idle buffers currently held for `len`
    pub fn available(&self, len: usize) -> usize {
        self.free
            .lock()
            .map(|free| free.get(&len).map_or(0, Vec::len))
            .unwrap_or(0)
    }
}

/// Scoped loan from a [`BufferPool`]
#[derive(Debug)]
pub struct PooledBuffer<'a> {
    pool: &'a BufferPool,
    buf: Option<Vec<f32>>,
}

impl Deref for PooledBuffer<'_> {
    type Target = [f32];

    fn deref(&self) -> &[f32] {
        self.buf.as_deref().unwrap_or(&[])
    }
}

impl DerefMut for PooledBuffer<'_> {
    fn deref_mut(&mut self) -> &mut [f32] {
        self.buf.as_deref_mut().unwrap_or(&mut [])
    }
}

impl Drop for PooledBuffer<'_> {
    fn drop(&mut self) {
        if let Some(buf) = self.buf.take() {
            self.pool.release(buf);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffers_return_on_drop() {
        let pool = BufferPool::with_sizes(&[8], 2);
        assert_eq!(pool.available(8), 2);
        {
            let a = pool.acquire(8);
            let _b = pool.acquire(8);
            assert_eq!(a.len(), 8);
            assert_eq!(pool.available(8), 0);
        }
        assert_eq!(pool.available(8), 2);
        assert_eq!(pool.misses(), 0);
    }

    #[test]
    fn exhaustion_allocates_and_counts() {
        let pool = BufferPool::with_sizes(&[4], 1);
        let _a = pool.acquire(4);
        let b = pool.acquire(4);
        assert_eq!(b.len(), 4);
        assert_eq!(pool.misses(), 1);
    }

    #[test]
    fn reused_buffers_are_zeroed() {
        let pool = BufferPool::new(1);
        {
            let mut a = pool.acquire(3);
            a.copy_from_slice(&[1.0, 2.0, 3.0]);
        }
        let a = pool.acquire(3);
        assert!(a.iter().all(|&x| x == 0.0));
    }

    #[test]
    fn idle_list_is_capped() {
        let pool = BufferPool::new(1);
        {
            let _a = pool.acquire(2);
            let _b = pool.acquire(2);
        }
        assert_eq!(pool.available(2), 1);
    }

    #[test]
    fn guard_returns_buffer_during_unwind() {
        let pool = BufferPool::with_sizes(&[16], 1);
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _buf = pool.acquire(16);
            panic!("frame failed");
        }));
        assert!(result.is_err());
        assert_eq!(pool.available(16), 1);
    }
}
