// ============================================================================
// SCRATCH POOL — recycle intermediate buffers between passes and renders
// ============================================================================

use std::collections::HashMap;

use crate::error::Result;
use crate::passes::PassBackend;

/// Key for pooled buffers: (width, height).
type PoolKey = (u32, u32);

/// Scratch buffers keyed by dimensions.
///
/// Buffers are handed out by value: a buffer that is out of the pool is owned
/// by exactly one caller, so it can never alias a channel's render target.
pub struct ScratchPool<T> {
    pool: HashMap<PoolKey, Vec<T>>,
    /// Maximum number of buffers to keep per key.
    max_per_key: usize,
}

impl<T> ScratchPool<T> {
    pub fn new() -> Self {
        Self {
            pool: HashMap::new(),
            max_per_key: 4,
        }
    }

    /// Reuse a pooled buffer of this size or create a new one through the
    /// backend.  Allocation failure is logged and returned.
    pub fn acquire<B>(&mut self, backend: &mut B, width: u32, height: u32) -> Result<T>
    where
        B: PassBackend<Target = T>,
    {
        if let Some(buf) = self.pool.get_mut(&(width, height)).and_then(|v| v.pop()) {
            return Ok(buf);
        }
        backend.create_target(width, height).inspect_err(|e| {
            crate::log_err!("Scratch allocation failed: {}", e);
        })
    }

    /// Return a buffer for future reuse.  If the pool is full for this size the
    /// buffer is dropped.
    pub fn release(&mut self, buf: T, width: u32, height: u32) {
        let entry = self.pool.entry((width, height)).or_default();
        if entry.len() < self.max_per_key {
            entry.push(buf);
        }
    }

    /// Drop all pooled buffers (resize, shutdown).
    pub fn clear(&mut self) {
        self.pool.clear();
    }

    pub fn pooled_count(&self) -> usize {
        self.pool.values().map(|v| v.len()).sum()
    }

    /// Approximate memory held by pooled buffers, at 8 bytes per texel.
    pub fn pooled_memory_bytes(&self) -> usize {
        self.pool
            .iter()
            .map(|((w, h), bufs)| (*w as usize) * (*h as usize) * 8 * bufs.len())
            .sum()
    }
}

impl<T> Default for ScratchPool<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::CpuBackend;

    #[test]
    fn pool_recycles_and_caps() {
        let mut backend = CpuBackend::new();
        let mut pool = ScratchPool::new();
        let bufs: Vec<_> = (0..6).map(|_| pool.acquire(&mut backend, 8, 4).unwrap()).collect();
        for b in bufs {
            pool.release(b, 8, 4);
        }
        assert_eq!(pool.pooled_count(), 4);
        assert_eq!(pool.pooled_memory_bytes(), 4 * 8 * 4 * 8);
        let _reused = pool.acquire(&mut backend, 8, 4).unwrap();
        assert_eq!(pool.pooled_count(), 3);
        pool.clear();
        assert_eq!(pool.pooled_count(), 0);
    }
}
