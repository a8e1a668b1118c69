// pcodec
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `normalize` stage converts between a 32-bit IEEE-754 float (as produced by the `csv`
//! stage) and a fixed-point `valuesize`-bit signed integer, scaled by `normalization_factor`.
//! `encode` is Normalize (float -> int); `decode` is Denormalize (int -> float).

use crate::errors::{value_too_large_error, Result};
use crate::io::BitBuffer;
use crate::stage::StageOptions;
use crate::util::{bits::sign_extend_leq64_to_i64, round_half_away_from_zero};

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

    while !src.is_end_of_bitstream()? {
        let raw = src.read_value(32)? as u32;
        let value = f32::from_bits(raw) as f64;
        let scaled = round_half_away_from_zero(value * opts.normalization_factor);
        if scaled < min as f64 || scaled > max as f64 {
            return value_too_large_error(format!(
                "normalized value {} does not fit in {} signed bits",
                scaled, width
            ));
        }
        dst.write_bits(width, (scaled as i64 as u64) & width_mask(width))?;
    }
    Ok(())
}

pub fn decode(src: &mut BitBuffer, dst: &mut BitBuffer, opts: &StageOptions) -> Result<()> {
    let width = opts.value_size_bits;

    while !src.is_end_of_bitstream()? {
        let raw = src.read_value(width)?;
        let scaled = sign_extend_leq64_to_i64(raw, width);
        let value = (scaled as f64 / opts.normalization_factor) as f32;
        dst.write_bits(32, value.to_bits() as u64)?;
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

    fn feed_floats(values: &[f32]) -> BitBuffer {
        let mut bw = writer(values.len() * 4 + 8);
        for &v in values {
            bw.write_bits(32, v.to_bits() as u64).unwrap();
        }
        bw.flip_to_reading().unwrap();
        bw
    }

    #[test]
    fn round_trips_through_fixed_point() {
        let opts = StageOptions { normalization_factor: 100.0, value_size_bits: 32, ..StageOptions::default() };
        let values: [f32; 5] = [1.0, 3.5, -2.25, 0.0, 12.345];

        let mut src = feed_floats(&values);
        let mut fixed = writer(64);
        encode(&mut src, &mut fixed, &opts).unwrap();
        fixed.finish().unwrap();
        fixed.flip_to_reading().unwrap();

        let mut floats = writer(64);
        decode(&mut fixed, &mut floats, &opts).unwrap();
        floats.finish().unwrap();
        floats.flip_to_reading().unwrap();

        for &expected in &values {
            let raw = floats.read_value(32).unwrap() as u32;
            let got = f32::from_bits(raw);
            assert!((got - expected).abs() < 0.01, "expected {} got {}", expected, got);
        }
    }

    #[test]
    fn value_exceeding_width_is_rejected() {
        let opts = StageOptions { normalization_factor: 100.0, value_size_bits: 8, ..StageOptions::default() };
        let mut src = feed_floats(&[1000.0]);
        let mut fixed = writer(16);
        let err = encode(&mut src, &mut fixed, &opts).unwrap_err();
        assert_eq!(err.kind(), crate::errors::ErrorKind::ValueTooLarge);
    }
}
