// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Lossy ring buffer that evicts the oldest bytes instead of rejecting
//! writes. Used where producers must never block or fail (live signal
//! capture) and readers tolerate gaps.

use crate::error::BufferError;
use crate::ring::byte_ring::ByteRing;
use tracing::trace;

/// A ring buffer whose `write` always succeeds for writes up to the
/// capacity, overwriting the oldest unread bytes when short on space.
///
/// Readers get no stability guarantee: bytes they have not consumed yet can
/// vanish under a burst of writes. Everything except the write policy
/// behaves like [`ByteRing`].
#[derive(Debug)]
pub struct OverwriteRing {
    inner: ByteRing,
}

impl OverwriteRing {
    /// Create a ring with exactly `capacity` bytes of storage.
    pub fn with_capacity(capacity: usize) -> Result<Self, BufferError> {
        Ok(Self {
            inner: ByteRing::with_capacity(capacity)?,
        })
    }

    /// Write all of `data`, evicting the oldest unread bytes first when the
    /// free space is short. Returns `data.len()` on success.
    ///
    /// Writes larger than the capacity return 0 without touching the
    /// buffer: accepting only a suffix would hand readers a torn byte
    /// stream with no way to detect it.
    pub fn write(&mut self, data: &[u8]) -> usize {
        if data.len() > self.inner.capacity() {
            return 0;
        }
        let free = self.inner.available_write();
        if data.len() > free {
            let evicted = self.inner.discard(data.len() - free);
            trace!(evicted, "evicted oldest unread bytes");
        }
        self.inner.write(data)
    }

    /// See [`ByteRing::read`].
    pub fn read(&mut self, out: &mut [u8]) -> usize {
        self.inner.read(out)
    }

    /// See [`ByteRing::peek`].
    pub fn peek(&self, out: &mut [u8]) -> usize {
        self.inner.peek(out)
    }

    /// See [`ByteRing::discard`].
    pub fn discard(&mut self, len: usize) -> usize {
        self.inner.discard(len)
    }

    /// See [`ByteRing::clear`].
    pub fn clear(&mut self) {
        self.inner.clear();
    }

    /// Total storage size in bytes.
    pub fn capacity(&self) -> usize {
        self.inner.capacity()
    }

    /// Bytes available to read.
    pub fn available_read(&self) -> usize {
        self.inner.available_read()
    }

    /// Free bytes before the next write starts evicting.
    pub fn available_write(&self) -> usize {
        self.inner.available_write()
    }

    /// Whether the ring holds no unread bytes.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}
