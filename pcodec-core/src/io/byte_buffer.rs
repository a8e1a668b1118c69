// pcodec
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::io;

use crate::errors::{Error, ErrorKind, Result};

/// The largest capacity a `ByteBuffer` may be initialized or grown to.
pub const MAX_USABLE_SIZE: usize = 1 << 30;

/// A `ByteBuffer` is a contiguous byte region with a live window delimited by a `start` cursor
/// (the oldest unread byte) and an `end` cursor (the newest written byte, inclusive; `None` when
/// empty). It is the innermost layer of the I/O stack: it knows nothing about files, bit packing,
/// or modes, only about keeping a compact run of bytes.
pub struct ByteBuffer {
    data: Box<[u8]>,
    start: usize,
    /// Index of the last live byte, or `None` when the buffer is empty.
    end: Option<usize>,
}

impl ByteBuffer {
    /// Allocates a new, empty `ByteBuffer` with the given capacity.
    pub fn init(capacity: usize) -> Result<ByteBuffer> {
        if capacity == 0 || capacity > MAX_USABLE_SIZE {
            return Err(Error::new(
                ErrorKind::InvalidValue,
                format!("byte buffer capacity {} out of range", capacity),
            ));
        }

        Ok(ByteBuffer { data: vec![0u8; capacity].into_boxed_slice(), start: 0, end: None })
    }

    /// The buffer's total capacity in bytes.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// The number of bytes currently live (written but not yet read).
    #[inline]
    pub fn used(&self) -> usize {
        match self.end {
            Some(end) => end + 1 - self.start,
            None => 0,
        }
    }

    /// The number of free bytes at the tail of the buffer before a compaction would be needed.
    #[inline]
    fn free_at_tail(&self) -> usize {
        match self.end {
            Some(end) => self.data.len() - (end + 1),
            None => self.data.len() - self.start,
        }
    }

    /// True when there are no live bytes.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.used() == 0
    }

    /// Discards all live bytes without freeing the backing storage.
    pub fn clear(&mut self) {
        self.start = 0;
        self.end = None;
    }

    /// Reallocates the buffer to `new_capacity`, preserving the live window at offset 0.
    pub fn resize(&mut self, new_capacity: usize) -> Result<()> {
        if new_capacity == 0 || new_capacity > MAX_USABLE_SIZE {
            return Err(Error::new(
                ErrorKind::InvalidValue,
                format!("byte buffer capacity {} out of range", new_capacity),
            ));
        }
        if new_capacity < self.used() {
            return Err(Error::new(
                ErrorKind::InvalidValue,
                "cannot resize byte buffer smaller than its live window",
            ));
        }

        let used = self.used();
        let mut new_data = vec![0u8; new_capacity].into_boxed_slice();
        if used > 0 {
            let end = self.end.unwrap();
            new_data[..used].copy_from_slice(&self.data[self.start..=end]);
        }

        self.data = new_data;
        self.start = 0;
        self.end = if used > 0 { Some(used - 1) } else { None };
        Ok(())
    }

    /// Compacts the live window to offset 0 in-place. A no-op if already compact or empty.
    fn compact(&mut self) {
        if self.start == 0 || self.is_empty() {
            return;
        }
        let used = self.used();
        let end = self.end.unwrap();
        self.data.copy_within(self.start..=end, 0);
        self.start = 0;
        self.end = Some(used - 1);
    }

    /// Copies up to `min(used, out.len())` bytes without advancing `start`. Returns the number of
    /// bytes copied.
    pub fn peek(&self, out: &mut [u8]) -> usize {
        let n = std::cmp::min(self.used(), out.len());
        if n > 0 {
            out[..n].copy_from_slice(&self.data[self.start..self.start + n]);
        }
        n
    }

    /// Like `peek`, but advances `start` by the number of bytes copied.
    pub fn read(&mut self, out: &mut [u8]) -> usize {
        let n = self.peek(out);
        self.start += n;
        if self.start > self.end.unwrap_or(0) {
            self.clear();
        }
        n
    }

    /// Copies up to `min(free, input.len())` bytes from `input` into the tail of the buffer,
    /// compacting first if the write would otherwise run off the end of the backing storage.
    /// Returns the number of bytes copied.
    pub fn write(&mut self, input: &[u8]) -> usize {
        if self.free_at_tail() < input.len() && self.start > 0 {
            self.compact();
        }

        let free = self.free_at_tail();
        let n = std::cmp::min(free, input.len());
        if n > 0 {
            let dst_start = match self.end {
                Some(end) => end + 1,
                None => self.start,
            };
            self.data[dst_start..dst_start + n].copy_from_slice(&input[..n]);
            self.end = Some(dst_start + n - 1);
        }
        n
    }

    /// Compacts the live window to the front, then calls `producer(dst)` where `dst` is the
    /// writable free region at the tail. `producer` returns the number of bytes it produced, or
    /// an I/O error. The produced bytes become part of the live window.
    pub fn refill(
        &mut self,
        mut producer: impl FnMut(&mut [u8]) -> io::Result<usize>,
    ) -> Result<usize> {
        self.compact();
        let free = self.free_at_tail();
        if free == 0 {
            return Ok(0);
        }

        let dst_start = match self.end {
            Some(end) => end + 1,
            None => self.start,
        };
        let n = producer(&mut self.data[dst_start..dst_start + free])?;
        if n > 0 {
            self.end = Some(dst_start + n - 1);
        }
        Ok(n)
    }

    /// If any bytes are live, calls `consumer(src)` with the live window and advances `start` by
    /// the number of bytes the consumer reports it persisted.
    pub fn flush(
        &mut self,
        mut consumer: impl FnMut(&[u8]) -> io::Result<usize>,
    ) -> Result<usize> {
        if self.is_empty() {
            return Ok(0);
        }
        let end = self.end.unwrap();
        let n = consumer(&self.data[self.start..=end])?;
        self.start += n;
        if self.start > end {
            self.clear();
        }
        Ok(n)
    }
}
