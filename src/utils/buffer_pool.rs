//! # Packet Pool
//!
//! Keyed object pool for packet buffers shared by every channel created from the
//! same owner. Each packet kind has its own bucket with its own lock, so a sender
//! acquiring an outbound buffer never contends with a receiver filling an inbound one.
//!
//! Buffers are fungible: nothing identifies a buffer beyond the bucket it belongs to.
//! A [`PooledBuffer`] goes back to its bucket when dropped (or through
//! [`PacketPool::release`]); buffers are never freed individually unless they grew
//! beyond the pooling limit.
//!
//! ## Usage
//! ```rust
//! use network_channel::utils::buffer_pool::{PacketPool, OUTBOUND};
//!
//! let pool = PacketPool::default();
//! let mut buffer = pool.acquire(OUTBOUND);
//! buffer.extend_from_slice(b"hello");
//! drop(buffer); // back into the OUTBOUND bucket, cleared
//! assert!(pool.available(OUTBOUND) > 0);
//! ```

use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use crate::config::PoolConfig;

/// Bucket used for serialized outbound packets.
pub const OUTBOUND: &str = "outbound";

/// Bucket used for packet bodies extracted from the receive stream.
pub const INBOUND: &str = "inbound";

type Bucket = Arc<Mutex<Vec<Vec<u8>>>>;

/// A pooled buffer that returns itself to its bucket when dropped
pub struct PooledBuffer {
    buffer: Vec<u8>,
    bucket: Bucket,
    max_pooled_size: usize,
    max_bucket_len: usize,
}

impl PooledBuffer {
    /// Get a mutable reference to the underlying buffer
    #[allow(clippy::should_implement_trait)]
    pub fn as_mut(&mut self) -> &mut Vec<u8> {
        &mut self.buffer
    }

    /// Get an immutable reference to the underlying buffer
    #[allow(clippy::should_implement_trait)]
    pub fn as_ref(&self) -> &[u8] {
        &self.buffer
    }

    /// Take the bytes out, leaving an empty buffer to go back to the pool.
    pub fn take(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.buffer)
    }
}

impl Drop for PooledBuffer {
    fn drop(&mut self) {
        let capacity = self.buffer.capacity();
        if capacity == 0 || capacity > self.max_pooled_size {
            return;
        }
        self.buffer.clear();
        let mut bucket = self.bucket.lock().unwrap_or_else(PoisonError::into_inner);
        if bucket.len() < self.max_bucket_len {
            bucket.push(std::mem::take(&mut self.buffer));
        }
    }
}

impl std::ops::Deref for PooledBuffer {
    type Target = Vec<u8>;

    fn deref(&self) -> &Self::Target {
        &self.buffer
    }
}

impl std::ops::DerefMut for PooledBuffer {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.buffer
    }
}

impl std::fmt::Debug for PooledBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledBuffer")
            .field("len", &self.buffer.len())
            .field("capacity", &self.buffer.capacity())
            .finish()
    }
}

/// Thread-safe keyed pool of packet buffers.
///
/// Cloning is cheap and yields a handle to the same buckets.
#[derive(Clone)]
pub struct PacketPool {
    buckets: Arc<RwLock<HashMap<Cow<'static, str>, Bucket>>>,
    config: PoolConfig,
}

impl PacketPool {
    pub fn new(config: PoolConfig) -> Self {
        Self {
            buckets: Arc::new(RwLock::new(HashMap::new())),
            config,
        }
    }

    /// Acquire a cleared buffer for `kind`, allocating when the bucket is empty.
    pub fn acquire(&self, kind: impl Into<Cow<'static, str>>) -> PooledBuffer {
        let bucket = self.bucket(kind.into());
        let buffer = bucket
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop()
            .unwrap_or_else(|| Vec::with_capacity(self.config.initial_buffer_capacity));

        PooledBuffer {
            buffer,
            bucket,
            max_pooled_size: self.config.max_pooled_buffer_size,
            max_bucket_len: self.config.max_buffers_per_kind,
        }
    }

    /// Return a buffer to its bucket. Equivalent to dropping it.
    pub fn release(&self, buffer: PooledBuffer) {
        drop(buffer);
    }

    /// Number of idle buffers in the bucket for `kind`.
    pub fn available(&self, kind: &str) -> usize {
        let buckets = self.buckets.read().unwrap_or_else(PoisonError::into_inner);
        buckets
            .get(kind)
            .map(|b| b.lock().unwrap_or_else(PoisonError::into_inner).len())
            .unwrap_or(0)
    }

    /// Drop all idle buffers of one kind. Buffers currently checked out are unaffected.
    pub fn clear(&self, kind: &str) {
        let buckets = self.buckets.read().unwrap_or_else(PoisonError::into_inner);
        if let Some(bucket) = buckets.get(kind) {
            bucket.lock().unwrap_or_else(PoisonError::into_inner).clear();
        }
    }

    fn bucket(&self, kind: Cow<'static, str>) -> Bucket {
        if let Some(bucket) = self
            .buckets
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(kind.as_ref())
        {
            return bucket.clone();
        }

        let mut buckets = self.buckets.write().unwrap_or_else(PoisonError::into_inner);
        let prealloc = self.config.buffers_per_kind;
        let capacity = self.config.initial_buffer_capacity;
        buckets
            .entry(kind)
            .or_insert_with(|| {
                let buffers = (0..prealloc)
                    .map(|_| Vec::with_capacity(capacity))
                    .collect();
                Arc::new(Mutex::new(buffers))
            })
            .clone()
    }
}

impl Default for PacketPool {
    fn default() -> Self {
        Self::new(PoolConfig::default())
    }
}

impl std::fmt::Debug for PacketPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kinds: Vec<String> = self
            .buckets
            .read()
            .map(|b| b.keys().map(|k| k.to_string()).collect())
            .unwrap_or_default();
        f.debug_struct("PacketPool").field("kinds", &kinds).finish()
    }
}
