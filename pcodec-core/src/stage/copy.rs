// pcodec
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `copy` stage: an identity transform, used mostly to exercise the pipeline driver and as a
//! baseline for measuring what the other stages actually buy. The same function serves both
//! directions, since passthrough is its own inverse.

use crate::errors::Result;
use crate::io::BitBuffer;
use crate::stage::StageOptions;

/// Copies `src` to `dst` `blocksize` bytes at a time (clamped to 8, the widest value
/// `BitBuffer::read_bits` can return in one call) until `src` is exhausted.
pub fn run(src: &mut BitBuffer, dst: &mut BitBuffer, opts: &StageOptions) -> Result<()> {
    let chunk_bytes = opts.blocksize.clamp(1, 8) as u32;
    let chunk_bits = chunk_bytes * 8;

    loop {
        let (value, got) = src.read_bits(chunk_bits)?;
        if got == 0 {
            break;
        }
        dst.write_bits(got, value)?;
        if got < chunk_bits {
            break;
        }
    }
    Ok(())
}
