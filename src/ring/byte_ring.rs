// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Fixed-capacity circular byte buffer.
//!
//! The ring performs no locking; `&mut self` on every mutating operation
//! makes the caller responsible for synchronization. [`FrameQueue`] wraps a
//! ring in a mutex for the multi-producer case.
//!
//! [`FrameQueue`]: crate::queue::framed::FrameQueue

use crate::error::BufferError;

/// A fixed-capacity circular byte buffer.
///
/// Writes are partial and never fail: `write` copies as many bytes as fit
/// and reports the count. Reads, peeks and discards are bounded by the
/// unread count. The capacity is exact, with no rounding to a power of two,
/// because callers build free-space arithmetic on top of it.
#[derive(Debug)]
pub struct ByteRing {
    buf: Box<[u8]>,
    /// Index of the oldest unread byte.
    head: usize,
    /// Number of unread bytes; `0 ..= capacity`.
    unread: usize,
}

impl ByteRing {
    /// Create a ring with exactly `capacity` bytes of storage.
    ///
    /// Fails with [`BufferError::CapacityTooSmall`] for capacities below 2.
    pub fn with_capacity(capacity: usize) -> Result<Self, BufferError> {
        if capacity < 2 {
            return Err(BufferError::CapacityTooSmall(capacity));
        }
        Ok(Self {
            buf: vec![0u8; capacity].into_boxed_slice(),
            head: 0,
            unread: 0,
        })
    }

    /// Total storage size in bytes.
    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Bytes available to `read`/`peek`/`discard`.
    pub fn available_read(&self) -> usize {
        self.unread
    }

    /// Bytes `write` can accept right now.
    ///
    /// `available_read() + available_write()` always equals the capacity.
    pub fn available_write(&self) -> usize {
        self.buf.len() - self.unread
    }

    /// Whether the ring holds no unread bytes.
    pub fn is_empty(&self) -> bool {
        self.unread == 0
    }

    /// Copy as much of `data` as fits and return the number of bytes
    /// written. Never fails; a full ring accepts 0 bytes.
    pub fn write(&mut self, data: &[u8]) -> usize {
        let n = data.len().min(self.available_write());
        if n == 0 {
            return 0;
        }
        let cap = self.buf.len();
        let tail = (self.head + self.unread) % cap;
        let first = n.min(cap - tail);
        self.buf[tail..tail + first].copy_from_slice(&data[..first]);
        let rest = n - first;
        if rest > 0 {
            self.buf[..rest].copy_from_slice(&data[first..n]);
        }
        self.unread += n;
        n
    }

    /// Copy up to `out.len()` unread bytes into `out`, consuming them.
    /// Returns the number of bytes read.
    pub fn read(&mut self, out: &mut [u8]) -> usize {
        let n = self.copy_out(out);
        self.head = (self.head + n) % self.buf.len();
        self.unread -= n;
        n
    }

    /// Like `read`, but leaves the bytes unread.
    pub fn peek(&self, out: &mut [u8]) -> usize {
        self.copy_out(out)
    }

    /// Drop up to `len` oldest unread bytes without copying them out.
    /// Returns the number of bytes discarded.
    pub fn discard(&mut self, len: usize) -> usize {
        let n = len.min(self.unread);
        self.head = (self.head + n) % self.buf.len();
        self.unread -= n;
        n
    }

    /// Drop all unread content and reset the indices.
    ///
    /// Callers must ensure no concurrent reader or writer is active; the
    /// ring itself performs no locking.
    pub fn clear(&mut self) {
        self.head = 0;
        self.unread = 0;
    }

    fn copy_out(&self, out: &mut [u8]) -> usize {
        let n = out.len().min(self.unread);
        if n == 0 {
            return 0;
        }
        let cap = self.buf.len();
        let first = n.min(cap - self.head);
        out[..first].copy_from_slice(&self.buf[self.head..self.head + first]);
        let rest = n - first;
        if rest > 0 {
            out[first..n].copy_from_slice(&self.buf[..rest]);
        }
        n
    }
}
