// pcodec
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use super::file_buffer::{FileMemoryBuffer, Mode as FileMode};
use crate::errors::{Error, ErrorKind, Result};

/// A single-byte shift register. For a buffer in reading mode, `used` counts bits already
/// consumed from the MSB side; `total` is how many of the 8 bit positions are meaningful (8 for
/// a byte freshly pulled from the file/memory layer, or fewer when `primary` was populated from a
/// partially-filled carryover register). For a buffer in writing mode, `used` counts bits already
/// accumulated from the MSB side and `total` is always 8. The `carryover` register stores its
/// valid bit count in `used` (matching the writing convention it was copied from on a mode flip);
/// its `total` field is unused.
#[derive(Debug, Clone, Copy)]
struct ShiftReg {
    byte: u8,
    used: u8,
    total: u8,
}

impl Default for ShiftReg {
    fn default() -> ShiftReg {
        ShiftReg { byte: 0, used: 0, total: 8 }
    }
}

#[inline(always)]
fn mask_k(k: u32) -> u8 {
    if k == 0 {
        0
    } else if k >= 8 {
        0xFF
    } else {
        ((1u16 << k) - 1) as u8
    }
}

/// `BitBuffer` layers bit-granular, MSB-first reads and writes over exactly one
/// `FileMemoryBuffer`. It owns that buffer outright (no back-pointers): the ownership chain is
/// `BitBuffer -> FileMemoryBuffer -> ByteBuffer`, with no aliasing.
pub struct BitBuffer {
    file: FileMemoryBuffer,
    mode: FileMode,
    primary: ShiftReg,
    carryover: ShiftReg,
}

impl BitBuffer {
    /// Wraps a `FileMemoryBuffer`, taking ownership of it. In reading mode, `primary.used` starts
    /// at 8 to force a refill before the first bit is delivered. In writing mode, `primary` starts
    /// empty.
    pub fn init(file: FileMemoryBuffer) -> BitBuffer {
        let mode = file.mode();
        let primary = match mode {
            FileMode::Reading => ShiftReg { byte: 0, used: 8, total: 8 },
            FileMode::Writing => ShiftReg { byte: 0, used: 0, total: 8 },
        };
        BitBuffer { file, mode, primary, carryover: ShiftReg::default() }
    }

    pub fn mode(&self) -> FileMode {
        self.mode
    }

    /// Pulls one more source byte into `primary`, preferring the carryover register (it must be
    /// drained before the file/memory layer contributes any further bits) and falling back to the
    /// underlying buffer. Returns `false` when no more bits are available at all.
    fn refill_primary(&mut self) -> Result<bool> {
        if self.carryover.used > 0 {
            // The carryover's valid bits sit at the top of the byte, exactly where a freshly
            // pulled byte's bits would start; only its bit count differs from a full 8.
            self.primary = ShiftReg { byte: self.carryover.byte, used: 0, total: self.carryover.used };
            self.carryover = ShiftReg::default();
            return Ok(true);
        }

        let mut one = [0u8; 1];
        let n = self.file.read(&mut one)?;
        if n == 1 {
            self.primary = ShiftReg { byte: one[0], used: 0, total: 8 };
            Ok(true)
        }
        else {
            Ok(false)
        }
    }

    /// Reads up to 8 bits, MSB-first, pulling additional source bytes (carryover, then file) as
    /// `primary` is exhausted. Returns `(value, bits_actually_read)`; `bits_actually_read < k`
    /// signals a short read at end-of-stream, which is not itself an error at this layer.
    fn read_up_to_8(&mut self, k: u32) -> Result<(u64, u32)> {
        debug_assert!(k >= 1 && k <= 8);
        let mut value: u64 = 0;
        let mut got: u32 = 0;

        while got < k {
            let avail_valid = self.primary.total as u32 - self.primary.used as u32;
            if avail_valid == 0 {
                if !self.refill_primary()? {
                    break;
                }
                continue;
            }

            // Bit positions are always measured against the true 8-bit frame, regardless of how
            // many of those positions are valid (the carryover case may have fewer than 8).
            let avail_full = 8 - self.primary.used as u32;
            let need = k - got;
            let take = need.min(avail_valid);
            let shift = avail_full - take;
            let bits = ((self.primary.byte >> shift) & mask_k(take)) as u64;
            value = (value << take) | bits;
            self.primary.used += take as u8;
            got += take;
        }

        Ok((value, got))
    }

    fn emit_primary(&mut self) -> Result<()> {
        let byte = self.primary.byte;
        self.file.write(&[byte])?;
        self.primary = ShiftReg::default();
        Ok(())
    }

    /// Writes up to 8 bits, MSB-first, pushing `primary` out to the underlying buffer whenever it
    /// saturates.
    fn write_up_to_8(&mut self, k: u32, value: u64) -> Result<()> {
        debug_assert!(k >= 1 && k <= 8);
        let mut remaining = k;

        while remaining > 0 {
            let free = 8 - self.primary.used as u32;
            let take = remaining.min(free);
            let shift = remaining - take;
            let chunk = ((value >> shift) & mask_k(take) as u64) as u8;
            let dest_shift = free - take;
            self.primary.byte |= chunk << dest_shift;
            self.primary.used += take as u8;
            remaining -= take;

            if self.primary.used == 8 {
                self.emit_primary()?;
            }
        }

        Ok(())
    }

    /// Reads a single bit. Returns `None` at a clean end-of-bitstream.
    pub fn read_bit(&mut self) -> Result<Option<bool>> {
        if self.mode != FileMode::Reading {
            return Err(Error::new(ErrorKind::InvalidMode, "read_bit() on a buffer not in reading mode"));
        }
        let (v, got) = self.read_up_to_8(1)?;
        Ok(if got == 1 { Some(v != 0) } else { None })
    }

    /// Writes a single bit.
    pub fn write_bit(&mut self, bit: bool) -> Result<()> {
        if self.mode != FileMode::Writing {
            return Err(Error::new(ErrorKind::InvalidMode, "write_bit() on a buffer not in writing mode"));
        }
        self.write_up_to_8(1, bit as u64)
    }

    /// Reads up to 64 bits, MSB-first, as the full `⌊n/8⌋` bytes followed by the `n mod 8`
    /// residual bits. Returns `(value, bits_actually_read)`.
    pub fn read_bits(&mut self, n: u32) -> Result<(u64, u32)> {
        if self.mode != FileMode::Reading {
            return Err(Error::new(ErrorKind::InvalidMode, "read_bits() on a buffer not in reading mode"));
        }
        assert!(n <= 64, "bit width {} exceeds the native 64-bit value width", n);

        let full_bytes = n / 8;
        let residual = n % 8;
        let mut value: u64 = 0;
        let mut got: u32 = 0;

        for _ in 0..full_bytes {
            let (v, g) = self.read_up_to_8(8)?;
            value = (value << g) | v;
            got += g;
            if g < 8 {
                return Ok((value, got));
            }
        }

        if residual > 0 {
            let (v, g) = self.read_up_to_8(residual)?;
            value = (value << g) | v;
            got += g;
        }

        Ok((value, got))
    }

    /// Reads exactly `n` bits. A short read (end-of-stream reached mid-value) is an
    /// `invalid-format` error: the caller demanded exactly that many bits.
    pub fn read_value(&mut self, n: u32) -> Result<u64> {
        let (value, got) = self.read_bits(n)?;
        if got < n {
            return invalid_format_error(format!(
                "unexpected end of bitstream: wanted {} bits, got {}",
                n, got
            ));
        }
        Ok(value)
    }

    /// Writes `n` bits of `value`, MSB-first.
    pub fn write_bits(&mut self, n: u32, value: u64) -> Result<()> {
        if self.mode != FileMode::Writing {
            return Err(Error::new(ErrorKind::InvalidMode, "write_bits() on a buffer not in writing mode"));
        }
        assert!(n <= 64, "bit width {} exceeds the native 64-bit value width", n);

        let full_bytes = n / 8;
        let residual = n % 8;
        let mut shift = n;

        for _ in 0..full_bytes {
            shift -= 8;
            self.write_up_to_8(8, (value >> shift) & 0xFF)?;
        }
        if residual > 0 {
            shift -= residual;
            self.write_up_to_8(residual, (value >> shift) & mask_k(residual) as u64)?;
        }
        Ok(())
    }

    /// True iff the underlying byte buffer is at EOF, the carryover is drained, and `primary` has
    /// been fully consumed.
    pub fn is_end_of_bitstream(&mut self) -> Result<bool> {
        if self.mode != FileMode::Reading {
            return Err(Error::new(ErrorKind::InvalidMode, "is_end_of_bitstream() requires reading mode"));
        }
        Ok(self.carryover.used == 0 && self.primary.used == 8 && self.file.end_of_buffer()?)
    }

    /// Flips a writing-mode buffer to reading. The only supported mode transition: the
    /// read-to-write direction is a programming error and is rejected.
    pub fn flip_to_reading(&mut self) -> Result<()> {
        if self.mode != FileMode::Writing {
            return Err(Error::new(ErrorKind::InvalidMode, "only a writing-mode buffer can flip to reading"));
        }
        self.carryover = self.primary;
        self.primary = ShiftReg { byte: 0, used: 8, total: 8 };
        self.file.set_mode(FileMode::Reading);
        self.mode = FileMode::Reading;
        Ok(())
    }

    /// Resets a writing-mode memory buffer to a fresh, empty state, for reuse as a ping-pong
    /// buffer between pipeline stages.
    pub fn reset_writing(&mut self) {
        self.file.reset_writing();
        self.mode = FileMode::Writing;
        self.primary = ShiftReg::default();
        self.carryover = ShiftReg::default();
    }

    /// Writes only whole, already-accumulated bytes to the file; any fractional `primary` byte is
    /// left pending. Use `finish` at teardown to pad and emit the fractional byte too.
    pub fn flush_whole_bytes(&mut self) -> Result<()> {
        if self.mode != FileMode::Writing {
            return Err(Error::new(ErrorKind::InvalidMode, "flush_whole_bytes() requires writing mode"));
        }
        if !self.file.is_memory() {
            self.file.flush()?;
        }
        Ok(())
    }

    /// Teardown: in writing mode, pads any fractional `primary` byte with zero bits on the right
    /// and emits it, then flushes the underlying file-backed buffer (a no-op for memory-only
    /// buffers). Idempotent: calling it twice is harmless.
    pub fn finish(&mut self) -> Result<()> {
        if self.mode == FileMode::Writing {
            if self.primary.used > 0 {
                self.emit_primary()?;
            }
            if !self.file.is_memory() {
                self.file.flush()?;
            }
        }
        Ok(())
    }
}

impl Drop for BitBuffer {
    fn drop(&mut self) {
        if let Err(err) = self.finish() {
            log::warn!("error flushing bit buffer during teardown: {}", err);
        }
    }
}

fn invalid_format_error<T>(desc: impl Into<String>) -> Result<T> {
    Err(Error::new(ErrorKind::InvalidFormat, desc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::file_buffer::{FileMemoryBuffer, Mode};

    fn reader(bytes: &[u8]) -> BitBuffer {
        let mut fb = FileMemoryBuffer::init_memory(Mode::Writing, bytes.len().max(1)).unwrap();
        fb.write(bytes).unwrap();
        fb.set_mode(Mode::Reading);
        BitBuffer::init(fb)
    }

    fn writer(capacity: usize) -> BitBuffer {
        BitBuffer::init(FileMemoryBuffer::init_memory(Mode::Writing, capacity).unwrap())
    }

    #[test]
    fn verify_read_bit_msb_first() {
        let mut br = reader(&[0b1010_1010]);
        let expected = [true, false, true, false, true, false, true, false];
        for bit in expected {
            assert_eq!(br.read_bit().unwrap(), Some(bit));
        }
        assert_eq!(br.read_bit().unwrap(), None);
    }

    #[test]
    fn verify_read_bits_leq32() {
        let mut br = reader(&[0b1010_0101, 0b0111_1110, 0b1101_0011]);
        assert_eq!(br.read_value(4).unwrap(), 0b1010);
        assert_eq!(br.read_value(4).unwrap(), 0b0101);
        assert_eq!(br.read_value(13).unwrap(), 0b0_1111_1101_1010);
        assert_eq!(br.read_value(3).unwrap(), 0b011);
    }

    #[test]
    fn verify_read_bits_leq64() {
        let mut br = reader(&[
            0x99, 0xaa, 0x55, 0xff, 0xff, 0x55, 0xaa, 0x99, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88,
        ]);
        assert_eq!(br.read_value(40).unwrap(), 0x99aa55ffff);
        assert_eq!(br.read_value(4).unwrap(), 0x05);
        assert_eq!(br.read_value(4).unwrap(), 0x05);
        assert_eq!(br.read_value(16).unwrap(), 0xaa99);
        assert_eq!(br.read_value(64).unwrap(), 0x1122334455667788);
    }

    #[test]
    fn bit_ordering_matches_byte_write() {
        // Writing bytes 0x80, 0x40 is bit-equivalent to writing the 16-bit value 0x8040 at width 16.
        let mut bw = writer(4);
        bw.write_bits(8, 0x80).unwrap();
        bw.write_bits(8, 0x40).unwrap();
        bw.finish().unwrap();

        let mut bw2 = writer(4);
        bw2.write_bits(16, 0x8040).unwrap();
        bw2.finish().unwrap();

        let mut br1 = bw;
        br1.flip_to_reading().unwrap();
        let mut br2 = bw2;
        br2.flip_to_reading().unwrap();

        assert_eq!(br1.read_value(16).unwrap(), br2.read_value(16).unwrap());
    }

    #[test]
    fn write_then_read_round_trips_arbitrary_widths() {
        for &(n, b) in &[(1u32, 1u64), (3, 0b101), (8, 0xAB), (13, 0x1A2B & 0x1FFF), (32, 0xDEADBEEF), (64, u64::MAX)] {
            let mut bw = writer(16);
            bw.write_bits(n, b).unwrap();
            bw.finish().unwrap();
            let mut buf = bw;
            buf.flip_to_reading().unwrap();
            assert_eq!(buf.read_value(n).unwrap(), b, "round trip failed for width {}", n);
        }
    }

    #[test]
    fn single_bit_then_flush_produces_one_byte_with_zero_padding() {
        let mut bw = writer(4);
        bw.write_bit(true).unwrap();
        bw.finish().unwrap();

        let mut br = bw;
        br.flip_to_reading().unwrap();
        let byte = br.read_value(8).unwrap();
        assert_eq!(byte, 0b1000_0000);
        assert!(br.is_end_of_bitstream().unwrap());
    }

    #[test]
    fn write_flip_with_pending_bits_then_read_yields_those_bits_first() {
        let mut bw = writer(4);
        bw.write_bits(3, 0b101).unwrap();
        bw.flip_to_reading().unwrap();

        // The 3 pending bits (101) arrive first, MSB-first, then the stream is exhausted.
        assert_eq!(br_read_n_bits(&mut bw, 3), (0b101, 3));
        assert_eq!(br_read_n_bits(&mut bw, 8), (0, 0));
    }

    fn br_read_n_bits(br: &mut BitBuffer, n: u32) -> (u64, u32) {
        br.read_bits(n).unwrap()
    }

    #[test]
    fn read_to_write_flip_is_rejected() {
        let mut br = reader(&[0xFF]);
        // There is no flip_to_writing: the read-mode buffer simply cannot be asked to write.
        assert!(br.write_bit(true).is_err());
    }

    #[test]
    fn finish_is_idempotent() {
        let mut bw = writer(4);
        bw.write_bits(5, 0b10101).unwrap();
        bw.finish().unwrap();
        bw.finish().unwrap();
    }

    #[test]
    fn empty_input_is_immediately_end_of_bitstream() {
        let mut br = reader(&[]);
        assert!(br.is_end_of_bitstream().unwrap());
        assert_eq!(br.read_bit().unwrap(), None);
    }
}
