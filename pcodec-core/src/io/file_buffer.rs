// pcodec
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};

use super::byte_buffer::ByteBuffer;
use crate::errors::{Error, ErrorKind, Result};

/// The direction a `FileMemoryBuffer` is currently operating in. There is deliberately no
/// `Invalid` variant: the source models mode as a three-way enum including an unreachable
/// "invalid" state reached only by programming error. Here that state is simply unrepresentable,
/// since `set_mode` only ever accepts `Reading` or `Writing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Reading,
    Writing,
}

/// An opaque, file-like handle supplying the four operations the buffer layer needs: read,
/// write, tell, and seek. Standard input/output do not support seeking; calling `tell` or `seek`
/// on them is a `file-io` error, which is fine since only `actual_size()` (a diagnostic, not used
/// by any stage) ever calls them.
pub enum FileHandle {
    File(File),
    Stdin(io::Stdin),
    Stdout(io::Stdout),
}

impl FileHandle {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            FileHandle::File(f) => f.read(buf),
            FileHandle::Stdin(s) => s.lock().read(buf),
            FileHandle::Stdout(_) => Err(io::Error::new(io::ErrorKind::Other, "stdout is write-only")),
        }
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            FileHandle::File(f) => f.write(buf),
            FileHandle::Stdin(_) => Err(io::Error::new(io::ErrorKind::Other, "stdin is read-only")),
            FileHandle::Stdout(s) => s.lock().write(buf),
        }
    }

    fn tell(&mut self) -> io::Result<u64> {
        match self {
            FileHandle::File(f) => f.stream_position(),
            _ => Err(io::Error::new(io::ErrorKind::Other, "handle is not seekable")),
        }
    }

    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        match self {
            FileHandle::File(f) => f.seek(pos),
            _ => Err(io::Error::new(io::ErrorKind::Other, "handle is not seekable")),
        }
    }
}

enum Backing {
    File(FileHandle),
    Memory,
}

/// A `FileMemoryBuffer` wraps exactly one `ByteBuffer` and layers a mode (reading/writing) and a
/// backing (file-backed or memory-only) over it. A file-backed buffer performs real I/O on
/// refill/flush; a memory-only buffer never touches I/O: refill always yields zero bytes, and a
/// full write simply doubles the buffer's capacity instead of flushing.
pub struct FileMemoryBuffer {
    inner: ByteBuffer,
    mode: Mode,
    backing: Backing,
    eof: bool,
}

impl FileMemoryBuffer {
    /// Opens a file-backed buffer. If `mode` is `Reading`, immediately performs one refill so
    /// that `end_of_buffer()` is already meaningful before the first read.
    pub fn init_file(handle: FileHandle, mode: Mode, capacity: usize) -> Result<FileMemoryBuffer> {
        let mut buf = FileMemoryBuffer {
            inner: ByteBuffer::init(capacity)?,
            mode,
            backing: Backing::File(handle),
            eof: false,
        };
        if mode == Mode::Reading {
            buf.refill_once()?;
        }
        Ok(buf)
    }

    /// Creates a memory-only buffer. No I/O is ever performed on it.
    pub fn init_memory(mode: Mode, capacity: usize) -> Result<FileMemoryBuffer> {
        Ok(FileMemoryBuffer { inner: ByteBuffer::init(capacity)?, mode, backing: Backing::Memory, eof: false })
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// True when a memory-only buffer is backing this instance.
    pub fn is_memory(&self) -> bool {
        matches!(self.backing, Backing::Memory)
    }

    fn refill_once(&mut self) -> Result<usize> {
        match &mut self.backing {
            Backing::Memory => Ok(0),
            Backing::File(handle) => {
                let n = self.inner.refill(|dst| handle.read(dst))?;
                if n == 0 {
                    self.eof = true;
                }
                Ok(n)
            }
        }
    }

    /// Only meaningful in reading mode. If the internal buffer is empty, attempts one refill;
    /// reports end-of-stream iff the buffer is (still) empty afterwards.
    pub fn end_of_buffer(&mut self) -> Result<bool> {
        debug_assert_eq!(self.mode, Mode::Reading);
        if self.inner.is_empty() {
            self.refill_once()?;
        }
        Ok(self.inner.is_empty())
    }

    /// Same mode: no-op. Opposite mode: toggles. Byte contents are left untouched either way.
    pub fn set_mode(&mut self, mode: Mode) {
        self.mode = mode;
    }

    /// Resets a writing-mode buffer to a fresh, empty state (used by the pipeline driver to
    /// recycle the ping-pong buffer between stages).
    pub fn reset_writing(&mut self) {
        debug_assert!(matches!(self.backing, Backing::Memory));
        self.inner.clear();
        self.mode = Mode::Writing;
        self.eof = false;
    }

    /// Reads up to `out.len()` bytes, looping: drain the internal buffer, then refill, stopping
    /// once a refill returns 0 (end-of-stream). Returns the number of bytes actually copied.
    pub fn read(&mut self, out: &mut [u8]) -> Result<usize> {
        if self.mode != Mode::Reading {
            return Err(Error::new(ErrorKind::InvalidMode, "read() on a buffer not in reading mode"));
        }

        let mut total = 0;
        while total < out.len() {
            let n = self.inner.read(&mut out[total..]);
            total += n;
            if total == out.len() {
                break;
            }
            // The internal buffer is now empty; try to pull in more.
            let refilled = self.refill_once()?;
            if refilled == 0 {
                break;
            }
        }
        Ok(total)
    }

    /// Writes up to `input.len()` bytes, looping: append to the internal buffer; when full,
    /// either flush to the file (file-backed) or double capacity (memory-only).
    pub fn write(&mut self, input: &[u8]) -> Result<usize> {
        if self.mode != Mode::Writing {
            return Err(Error::new(ErrorKind::InvalidMode, "write() on a buffer not in writing mode"));
        }

        let mut total = 0;
        while total < input.len() {
            let n = self.inner.write(&input[total..]);
            total += n;
            if total == input.len() {
                break;
            }

            match &mut self.backing {
                Backing::File(handle) => {
                    let flushed = self.inner.flush(|src| handle.write(src))?;
                    if flushed == 0 {
                        return Err(Error::new(ErrorKind::FileIo, "short write: 0 bytes persisted"));
                    }
                }
                Backing::Memory => {
                    let new_cap = self.inner.capacity().saturating_mul(2);
                    self.inner.resize(new_cap)?;
                }
            }
        }
        Ok(total)
    }

    /// Flushes the entire live window to the file handle. An error for memory-only buffers.
    /// Succeeds iff every live byte was consumed by the handle.
    pub fn flush(&mut self) -> Result<()> {
        if self.mode != Mode::Writing {
            return Err(Error::new(ErrorKind::InvalidMode, "flush() on a buffer not in writing mode"));
        }
        match &mut self.backing {
            Backing::Memory => Err(Error::new(ErrorKind::InvalidMode, "cannot flush a memory-only buffer")),
            Backing::File(handle) => {
                while !self.inner.is_empty() {
                    let n = self.inner.flush(|src| handle.write(src))?;
                    if n == 0 {
                        return Err(Error::new(ErrorKind::FileIo, "short flush: 0 bytes persisted"));
                    }
                }
                Ok(())
            }
        }
    }

    /// The current offset of this buffer's logical stream position, in bytes.
    pub fn actual_offset(&mut self) -> Result<u64> {
        match (&mut self.backing, self.mode) {
            (Backing::Memory, _) => Ok(self.inner.used() as u64),
            (Backing::File(handle), Mode::Reading) => {
                let tell = handle.tell()?;
                Ok(tell.saturating_sub(self.inner.used() as u64))
            }
            (Backing::File(handle), Mode::Writing) => {
                let tell = handle.tell()?;
                Ok(tell + self.inner.used() as u64)
            }
        }
    }

    /// The total size of the underlying file, for file-backed reading buffers only: seeks to the
    /// end, reads the position, then restores the original position.
    pub fn actual_size(&mut self) -> Result<u64> {
        debug_assert_eq!(self.mode, Mode::Reading);
        match &mut self.backing {
            Backing::Memory => Err(Error::new(ErrorKind::InvalidMode, "memory-only buffer has no file size")),
            Backing::File(handle) => {
                let cur = handle.tell()?;
                let end = handle.seek(SeekFrom::End(0))?;
                handle.seek(SeekFrom::Start(cur))?;
                Ok(end)
            }
        }
    }
}
