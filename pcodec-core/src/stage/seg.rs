// pcodec
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `seg` stage: signed exponential-Golomb coding. Each `valuesize`-bit sample is
//! sign-extended to a true signed value, zigzag-mapped onto the non-negative integers
//! (0, -1, 1, -2, 2, ... -> 0, 1, 2, 3, 4, ...), and written as an Exp-Golomb code: `k` zero bits,
//! a `1` bit, then `k` more bits giving a `(k+1)`-bit binary number one greater than the mapped
//! value. Decoding reverses both steps.

use crate::errors::{invalid_format_error, Result};
use crate::io::BitBuffer;
use crate::stage::StageOptions;
use crate::util::bits::sign_extend_leq64_to_i64;

fn width_mask(width: u32) -> u64 {
    if width >= 64 {
        u64::MAX
    } else {
        (1u64 << width) - 1
    }
}

fn zigzag_encode(v: i64) -> u64 {
    if v > 0 {
        (2i128 * v as i128 - 1) as u64
    } else {
        (-2i128 * v as i128) as u64
    }
}

fn zigzag_decode(code: u64) -> i64 {
    if code % 2 == 1 {
        ((code as i128 + 1) / 2) as i64
    } else {
        -((code as i128) / 2) as i64
    }
}

fn write_expgolomb(dst: &mut BitBuffer, code: u64) -> Result<()> {
    let n = code + 1;
    let numbits = 64 - n.leading_zeros();
    for _ in 0..numbits - 1 {
        dst.write_bit(false)?;
    }
    dst.write_bits(numbits, n)?;
    Ok(())
}

/// Reads one Exp-Golomb code. `Ok(None)` signals a clean end-of-bitstream (reached before any
/// bits of a new code were read); a stream ending partway through a code is a hard error, as is a
/// zero run reaching `width + 1` -- no valid code emitted by `write_expgolomb` for a value that
/// fits in `width` bits is ever that long, so a longer run can only be a corrupt stream.
fn read_expgolomb(src: &mut BitBuffer, width: u32) -> Result<Option<u64>> {
    let mut zeros: u32 = 0;
    loop {
        match src.read_bit()? {
            None => {
                return if zeros == 0 { Ok(None) } else { invalid_format_error("bitstream ended mid Exp-Golomb code") };
            }
            Some(false) => {
                zeros += 1;
                if zeros > width + 1 {
                    return invalid_format_error(format!("Exp-Golomb zero run exceeds the {}-bit bound", width));
                }
            }
            Some(true) => break,
        }
    }

    let mut n: u64 = 1;
    if zeros > 0 {
        let (more, got) = src.read_bits(zeros)?;
        if got < zeros {
            return invalid_format_error("bitstream ended mid Exp-Golomb code");
        }
        n = (n << zeros) | more;
    }
    Ok(Some(n - 1))
}

pub fn encode(src: &mut BitBuffer, dst: &mut BitBuffer, opts: &StageOptions) -> Result<()> {
    let width = opts.value_size_bits;
    while !src.is_end_of_bitstream()? {
        let raw = src.read_value(width)?;
        let v = sign_extend_leq64_to_i64(raw, width);
        write_expgolomb(dst, zigzag_encode(v))?;
    }
    Ok(())
}

pub fn decode(src: &mut BitBuffer, dst: &mut BitBuffer, opts: &StageOptions) -> Result<()> {
    let width = opts.value_size_bits;
    let mask = width_mask(width);
    while let Some(code) = read_expgolomb(src, width)? {
        let v = zigzag_decode(code);
        dst.write_bits(width, (v as u64) & mask)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::file_buffer::{FileMemoryBuffer, Mode};

    fn writer(capacity: usize) -> BitBuffer {
        BitBuffer::init(FileMemoryBuffer::init_memory(Mode::Writing, capacity).unwrap())
    }

    #[test]
    fn zigzag_mapping_matches_known_sequence() {
        assert_eq!(zigzag_encode(0), 0);
        assert_eq!(zigzag_encode(1), 1);
        assert_eq!(zigzag_encode(-1), 2);
        assert_eq!(zigzag_encode(2), 3);
        assert_eq!(zigzag_encode(-2), 4);
        for v in [0i64, 1, -1, 2, -2, 100, -100, i64::MIN, i64::MAX] {
            assert_eq!(zigzag_decode(zigzag_encode(v)), v, "roundtrip failed for {}", v);
        }
    }

    #[test]
    fn round_trips_deltas() {
        let opts = StageOptions { value_size_bits: 8, ..StageOptions::default() };
        let deltas: [i64; 6] = [0, 1, -1, 5, -5, 127];

        let mut src = writer(16);
        for &d in &deltas {
            src.write_bits(8, (d as u64) & 0xFF).unwrap();
        }
        src.flip_to_reading().unwrap();

        let mut coded = writer(32);
        encode(&mut src, &mut coded, &opts).unwrap();
        coded.finish().unwrap();
        coded.flip_to_reading().unwrap();

        let mut decoded = writer(16);
        decode(&mut coded, &mut decoded, &opts).unwrap();
        decoded.finish().unwrap();
        decoded.flip_to_reading().unwrap();

        for &expected in &deltas {
            let raw = decoded.read_value(8).unwrap();
            assert_eq!(sign_extend_leq64_to_i64(raw, 8), expected);
        }
    }

    #[test]
    fn truncated_code_is_invalid_format() {
        let mut coded = writer(4);
        coded.write_bit(false).unwrap();
        coded.write_bit(false).unwrap();
        coded.finish().unwrap();
        coded.flip_to_reading().unwrap();

        let opts = StageOptions { value_size_bits: 8, ..StageOptions::default() };
        let mut decoded = writer(4);
        let err = decode(&mut coded, &mut decoded, &opts).unwrap_err();
        assert_eq!(err.kind(), crate::errors::ErrorKind::InvalidFormat);
    }

    #[test]
    fn zero_run_past_width_bound_is_invalid_format_not_a_panic() {
        let width = 8u32;
        let mut coded = writer(8);
        for _ in 0..width + 2 {
            coded.write_bit(false).unwrap();
        }
        coded.write_bit(true).unwrap();
        coded.finish().unwrap();
        coded.flip_to_reading().unwrap();

        let opts = StageOptions { value_size_bits: width, ..StageOptions::default() };
        let mut decoded = writer(4);
        let err = decode(&mut coded, &mut decoded, &opts).unwrap_err();
        assert_eq!(err.kind(), crate::errors::ErrorKind::InvalidFormat);
    }
}
