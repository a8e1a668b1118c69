// pcodec
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `diff` stage: replaces each `valuesize`-bit unsigned sample with its signed delta from the
//! previous sample (the first sample's delta is taken against an implicit zero predecessor). The
//! delta is itself stored in `valuesize` bits, two's-complement; a delta that does not fit is a
//! hard error rather than a silent truncation, since differential coding is meant to be lossless.

use crate::errors::{value_too_large_error, Result};
use crate::io::BitBuffer;
use crate::stage::StageOptions;
use crate::util::bits::sign_extend_leq64_to_i64;

fn signed_range(width: u32) -> (i64, i64) {
    if width >= 64 {
        (i64::MIN, i64::MAX)
    } else {
        (-(1i64 << (width - 1)), (1i64 << (width - 1)) - 1)
    }
}

fn width_mask(width: u32) -> u64 {
    if width >= 64 {
        u64::MAX
    } else {
        (1u64 << width) - 1
    }
}

pub fn encode(src: &mut BitBuffer, dst: &mut BitBuffer, opts: &StageOptions) -> Result<()> {
    let width = opts.value_size_bits;
    let (min, max) = signed_range(width);
    let mut prev: i64 = 0;

    while !src.is_end_of_bitstream()? {
        let cur = src.read_value(width)? as i64;
        let delta = cur - prev;
        if delta < min || delta > max {
            return value_too_large_error(format!(
                "delta {} does not fit in {} signed bits between samples {} and {}",
                delta, width, prev, cur
            ));
        }
        dst.write_bits(width, (delta as u64) & width_mask(width))?;
        prev = cur;
    }
    Ok(())
}

pub fn decode(src: &mut BitBuffer, dst: &mut BitBuffer, opts: &StageOptions) -> Result<()> {
    let width = opts.value_size_bits;
    let mut prev: i64 = 0;

    while !src.is_end_of_bitstream()? {
        let raw = src.read_value(width)?;
        let delta = sign_extend_leq64_to_i64(raw, width);
        let cur = prev + delta;
        dst.write_bits(width, (cur as u64) & width_mask(width))?;
        prev = cur;
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

    fn feed(values: &[u64], width: u32) -> BitBuffer {
        let mut bw = writer(values.len() * 8 + 8);
        for &v in values {
            bw.write_bits(width, v).unwrap();
        }
        bw.flip_to_reading().unwrap();
        bw
    }

    fn drain(buf: &mut BitBuffer, width: u32) -> Vec<u64> {
        let mut out = Vec::new();
        while !buf.is_end_of_bitstream().unwrap() {
            out.push(buf.read_value(width).unwrap());
        }
        out
    }

    #[test]
    fn round_trips_monotonic_values() {
        let opts = StageOptions { value_size_bits: 8, ..StageOptions::default() };
        let values = [10u64, 12, 13, 13, 100, 0, 255];

        let mut src = feed(&values, 8);
        let mut encoded = writer(32);
        encode(&mut src, &mut encoded, &opts).unwrap();
        encoded.finish().unwrap();
        encoded.flip_to_reading().unwrap();

        let mut decoded = writer(32);
        decode(&mut encoded, &mut decoded, &opts).unwrap();
        decoded.finish().unwrap();
        decoded.flip_to_reading().unwrap();

        assert_eq!(drain(&mut decoded, 8), values);
    }

    #[test]
    fn delta_out_of_range_is_value_too_large() {
        // width 2 allows deltas in [-2, 1]; 0 -> 3 is a delta of +3, out of range.
        let opts = StageOptions { value_size_bits: 2, ..StageOptions::default() };
        let mut src = feed(&[0, 3], 2);
        let mut encoded = writer(8);
        let err = encode(&mut src, &mut encoded, &opts).unwrap_err();
        assert_eq!(err.kind(), crate::errors::ErrorKind::ValueTooLarge);
    }
}
