// pcodec
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `aggregate` stage folds consecutive runs of `num_values` 32-bit IEEE-754 floats into their
//! sum, emitted as a single 32-bit float. It is lossy (the individual samples cannot be recovered)
//! and so, unlike every other stage, has no decoder; the registry reflects that by leaving its
//! `decoder` slot `None`. A trailing run shorter than `num_values` is still summed and emitted
//! rather than dropped.

use crate::errors::Result;
use crate::io::BitBuffer;
use crate::stage::StageOptions;

pub fn encode(src: &mut BitBuffer, dst: &mut BitBuffer, opts: &StageOptions) -> Result<()> {
    let run_len = opts.num_values;

    loop {
        if src.is_end_of_bitstream()? {
            break;
        }

        let mut sum: f64 = 0.0;
        let mut count = 0u64;
        while count < run_len {
            if src.is_end_of_bitstream()? {
                break;
            }
            let value = f32::from_bits(src.read_value(32)? as u32);
            sum += value as f64;
            count += 1;
        }
        if count == 0 {
            break;
        }
        dst.write_bits(32, (sum as f32).to_bits() as u64)?;
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
    fn sums_runs_of_num_values() {
        let opts = StageOptions { num_values: 3, ..StageOptions::default() };
        let mut src = writer(32);
        for v in [1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0] {
            src.write_bits(32, v.to_bits() as u64).unwrap();
        }
        src.flip_to_reading().unwrap();

        let mut dst = writer(32);
        encode(&mut src, &mut dst, &opts).unwrap();
        dst.finish().unwrap();
        dst.flip_to_reading().unwrap();

        assert_eq!(f32::from_bits(dst.read_value(32).unwrap() as u32), 6.0); // 1+2+3
        assert_eq!(f32::from_bits(dst.read_value(32).unwrap() as u32), 15.0); // 4+5+6
        assert_eq!(f32::from_bits(dst.read_value(32).unwrap() as u32), 7.0); // trailing short run
        assert!(dst.is_end_of_bitstream().unwrap());
    }

    #[test]
    fn sums_fractional_values_as_floats_not_bit_patterns() {
        let opts = StageOptions { num_values: 2, ..StageOptions::default() };
        let mut src = writer(16);
        src.write_bits(32, 0.5f32.to_bits() as u64).unwrap();
        src.write_bits(32, 0.25f32.to_bits() as u64).unwrap();
        src.flip_to_reading().unwrap();

        let mut dst = writer(16);
        encode(&mut src, &mut dst, &opts).unwrap();
        dst.finish().unwrap();
        dst.flip_to_reading().unwrap();

        assert_eq!(f32::from_bits(dst.read_value(32).unwrap() as u32), 0.75);
    }
}
