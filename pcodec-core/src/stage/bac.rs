// pcodec
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `bac` stage: an adaptive binary arithmetic coder over a 3-symbol alphabet (bit 0, bit 1,
//! and an explicit EOF symbol that lets the decoder find the end of the coded stream without a
//! separately transmitted length), following Witten, Neal and Cleary's 1987 range-coding scheme at
//! `RANGE_BITS = 16` precision. The frequency model is kept as an index-sorted table
//! (`index_to_symbol`/`symbol_to_index`) rather than a flat per-symbol array: each update swaps the
//! just-coded symbol up past any ties so the table stays sorted by non-increasing frequency, which
//! is what lets the cumulative-frequency search in `decode_symbol` walk from index 1 upward and
//! stop at the first match. The model is local to each `encode`/`decode` call, not global state, so
//! concurrent pipelines never share a coder's statistics. When `adaptive` is unset the model's
//! counts are frozen at their initial equal weights -- still correct, just not compressive.

use crate::errors::{invalid_format_error, Result};
use crate::io::BitBuffer;
use crate::stage::StageOptions;

const RANGE_BITS: u32 = 16;
const MAX_RANGE: u32 = (1u32 << RANGE_BITS) - 1;
const QUARTER_RANGE_BORDER: u32 = MAX_RANGE / 4 + 1;
const HALF_RANGE_BORDER: u32 = 2 * QUARTER_RANGE_BORDER;
const THREE_QUARTERS_RANGE_BORDER: u32 = 3 * QUARTER_RANGE_BORDER;
const MAX_FREQUENCY: u32 = MAX_RANGE >> 2;

const NUMBER_OF_SYMBOLS: usize = 2;
const TOTAL_NUMBER_OF_SYMBOLS: usize = NUMBER_OF_SYMBOLS + 1;
const EOF_SYMBOL_INDEX: usize = NUMBER_OF_SYMBOLS + 1;

/// Index-sorted frequency model: `index_to_symbol[1..=TOTAL_NUMBER_OF_SYMBOLS]` and its inverse
/// `symbol_to_index` track which array slot each symbol currently occupies; `freq`/`cum` are kept
/// one entry longer with index 0 as a sentinel (`freq[0] = 0`, `cum[0]` the running total).
struct Model {
    symbol_to_index: [usize; NUMBER_OF_SYMBOLS],
    index_to_symbol: [i32; TOTAL_NUMBER_OF_SYMBOLS + 1],
    freq: [u32; TOTAL_NUMBER_OF_SYMBOLS + 1],
    cum: [u32; TOTAL_NUMBER_OF_SYMBOLS + 1],
}

impl Model {
    fn new() -> Model {
        let mut symbol_to_index = [0usize; NUMBER_OF_SYMBOLS];
        let mut index_to_symbol = [0i32; TOTAL_NUMBER_OF_SYMBOLS + 1];
        for i in 0..NUMBER_OF_SYMBOLS {
            symbol_to_index[i] = i + 1;
            index_to_symbol[i + 1] = i as i32;
        }

        let mut freq = [0u32; TOTAL_NUMBER_OF_SYMBOLS + 1];
        let mut cum = [0u32; TOTAL_NUMBER_OF_SYMBOLS + 1];
        for i in 0..=TOTAL_NUMBER_OF_SYMBOLS {
            freq[i] = if i == 0 { 0 } else { 1 };
            cum[i] = (TOTAL_NUMBER_OF_SYMBOLS - i) as u32;
        }

        Model { symbol_to_index, index_to_symbol, freq, cum }
    }

    fn total(&self) -> u32 {
        self.cum[0]
    }

    /// Promotes the symbol just coded at `last_symbol_index` one step up the frequency order
    /// (past any ties), increments its frequency, and keeps `cum` consistent.
    fn update(&mut self, last_symbol_index: usize) {
        if self.cum[0] == MAX_FREQUENCY {
            let mut running = 0u32;
            for i in (0..=TOTAL_NUMBER_OF_SYMBOLS).rev() {
                self.freq[i] = (self.freq[i] + 1) / 2;
                self.cum[i] = running;
                running += self.freq[i];
            }
        }

        let mut i = last_symbol_index;
        while i > 0 && self.freq[i] == self.freq[i - 1] {
            i -= 1;
        }
        if i < last_symbol_index {
            let current_symbol = self.index_to_symbol[i];
            let last_symbol = self.index_to_symbol[last_symbol_index];
            self.index_to_symbol[i] = last_symbol;
            self.index_to_symbol[last_symbol_index] = current_symbol;
            self.symbol_to_index[current_symbol as usize] = last_symbol_index;
            self.symbol_to_index[last_symbol as usize] = i;
            log::trace!("bac: promoted symbol {} from index {} to {}", last_symbol, last_symbol_index, i);
        }
        self.freq[i] += 1;
        while i > 0 {
            i -= 1;
            self.cum[i] += 1;
        }
    }
}

struct Encoder {
    start: u32,
    end: u32,
    next_bits: u64,
}

impl Encoder {
    fn new() -> Encoder {
        Encoder { start: 0, end: MAX_RANGE, next_bits: 0 }
    }

    fn output_next_bits(&mut self, dst: &mut BitBuffer, bit: bool) -> Result<()> {
        dst.write_bit(bit)?;
        while self.next_bits > 0 {
            dst.write_bit(!bit)?;
            self.next_bits -= 1;
        }
        Ok(())
    }

    fn encode_symbol(&mut self, dst: &mut BitBuffer, model: &Model, index: usize) -> Result<()> {
        let range = (self.end - self.start) as u64 + 1;
        let total = model.total() as u64;
        self.end = self.start + ((range * model.cum[index - 1] as u64) / total) as u32 - 1;
        self.start += ((range * model.cum[index] as u64) / total) as u32;

        loop {
            if self.end < HALF_RANGE_BORDER {
                self.output_next_bits(dst, false)?;
            } else if self.start >= HALF_RANGE_BORDER {
                self.output_next_bits(dst, true)?;
                self.start -= HALF_RANGE_BORDER;
                self.end -= HALF_RANGE_BORDER;
            } else if self.start >= QUARTER_RANGE_BORDER && self.end < THREE_QUARTERS_RANGE_BORDER {
                self.next_bits += 1;
                self.start -= QUARTER_RANGE_BORDER;
                self.end -= QUARTER_RANGE_BORDER;
            } else {
                break;
            }
            self.start *= 2;
            self.end = 2 * self.end + 1;
        }
        Ok(())
    }

    fn finish(&mut self, dst: &mut BitBuffer) -> Result<()> {
        self.next_bits += 1;
        let bit = self.start >= QUARTER_RANGE_BORDER;
        self.output_next_bits(dst, bit)
    }
}

struct Decoder {
    start: u32,
    end: u32,
    value: u32,
    after_eof_bits: u32,
}

impl Decoder {
    /// Reads one bit, substituting a synthetic zero (and spending one unit of
    /// `after_eof_bits`) once the physical stream is exhausted; a read past that budget is the
    /// one way a corrupted or truncated stream is detected here.
    fn read_bit_special(&mut self, src: &mut BitBuffer) -> Result<bool> {
        if src.is_end_of_bitstream()? {
            if self.after_eof_bits > 0 {
                self.after_eof_bits -= 1;
                Ok(false)
            } else {
                invalid_format_error("bac stream ended and exhausted its after-end-of-stream bit budget")
            }
        } else {
            Ok(src.read_bit()?.unwrap_or(false))
        }
    }

    fn start(src: &mut BitBuffer) -> Result<Decoder> {
        let mut dec = Decoder { start: 0, end: MAX_RANGE, value: 0, after_eof_bits: RANGE_BITS - 2 };
        for _ in 0..RANGE_BITS {
            let bit = dec.read_bit_special(src)?;
            dec.value = 2 * dec.value + bit as u32;
        }
        Ok(dec)
    }

    fn decode_symbol(&mut self, src: &mut BitBuffer, model: &Model) -> Result<usize> {
        let range = (self.end - self.start) as u64 + 1;
        let total = model.total() as u64;
        // `wrapping_sub` mirrors the unsigned-range-type subtraction the source relies on: a
        // corrupted stream can desynchronize `value` from `start`, and this keeps that a format
        // error discovered downstream rather than a debug-mode overflow panic here.
        let current_cum = ((self.value.wrapping_sub(self.start) as u64 + 1) * total - 1) / range;

        let mut index = 1usize;
        while index < TOTAL_NUMBER_OF_SYMBOLS && model.cum[index] as u64 > current_cum {
            index += 1;
        }

        self.end = self.start + ((range * model.cum[index - 1] as u64) / total) as u32 - 1;
        self.start += ((range * model.cum[index] as u64) / total) as u32;

        loop {
            if self.end < HALF_RANGE_BORDER {
                // settled: top bit already determined, fall through to shift and read
            } else if self.start >= HALF_RANGE_BORDER {
                self.value -= HALF_RANGE_BORDER;
                self.start -= HALF_RANGE_BORDER;
                self.end -= HALF_RANGE_BORDER;
            } else if self.start >= QUARTER_RANGE_BORDER && self.end < THREE_QUARTERS_RANGE_BORDER {
                self.value -= QUARTER_RANGE_BORDER;
                self.start -= QUARTER_RANGE_BORDER;
                self.end -= QUARTER_RANGE_BORDER;
            } else {
                break;
            }
            self.start *= 2;
            self.end = 2 * self.end + 1;
            let bit = self.read_bit_special(src)?;
            self.value = 2 * self.value + bit as u32;
        }

        Ok(index)
    }
}

pub fn encode(src: &mut BitBuffer, dst: &mut BitBuffer, opts: &StageOptions) -> Result<()> {
    log::debug!("bac encode: starting (adaptive={})", opts.adaptive);
    let mut model = Model::new();
    let mut enc = Encoder::new();

    while let Some(bit) = src.read_bit()? {
        let index = model.symbol_to_index[bit as usize];
        enc.encode_symbol(dst, &model, index)?;
        if opts.adaptive {
            model.update(index);
        }
    }
    enc.encode_symbol(dst, &model, EOF_SYMBOL_INDEX)?;
    enc.finish(dst)?;
    log::debug!("bac encode: done");
    Ok(())
}

pub fn decode(src: &mut BitBuffer, dst: &mut BitBuffer, opts: &StageOptions) -> Result<()> {
    log::debug!("bac decode: starting (adaptive={})", opts.adaptive);
    let mut model = Model::new();
    let mut dec = Decoder::start(src)?;

    loop {
        let index = dec.decode_symbol(src, &model)?;
        if index == EOF_SYMBOL_INDEX {
            break;
        }
        let bit = model.index_to_symbol[index];
        dst.write_bit(bit != 0)?;
        if opts.adaptive {
            model.update(index);
        }
    }
    log::debug!("bac decode: done");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::file_buffer::{FileMemoryBuffer, Mode};

    fn writer(capacity: usize) -> BitBuffer {
        BitBuffer::init(FileMemoryBuffer::init_memory(Mode::Writing, capacity).unwrap())
    }

    fn roundtrip(bits: &[bool], adaptive: bool) -> Vec<bool> {
        let opts = StageOptions { adaptive, ..StageOptions::default() };

        let mut src = writer(bits.len() / 8 + 4);
        for &b in bits {
            src.write_bit(b).unwrap();
        }
        src.flip_to_reading().unwrap();

        let mut coded = writer(bits.len() + 16);
        encode(&mut src, &mut coded, &opts).unwrap();
        coded.finish().unwrap();
        coded.flip_to_reading().unwrap();

        let mut decoded = writer(bits.len() / 8 + 4);
        decode(&mut coded, &mut decoded, &opts).unwrap();
        decoded.finish().unwrap();
        decoded.flip_to_reading().unwrap();

        let mut out = Vec::new();
        while !decoded.is_end_of_bitstream().unwrap() {
            out.push(decoded.read_bit().unwrap().unwrap());
        }
        out
    }

    #[test]
    fn round_trips_skewed_bitstream_adaptively() {
        let mut bits = Vec::new();
        for i in 0..200u32 {
            bits.push(i % 7 == 0); // mostly false, a skewed distribution an adaptive coder should like
        }
        assert_eq!(roundtrip(&bits, true), bits);
    }

    #[test]
    fn round_trips_with_static_model() {
        let bits = [true, false, true, true, false, false, false, true];
        assert_eq!(roundtrip(&bits, false), bits);
    }

    #[test]
    fn round_trips_empty_input() {
        assert_eq!(roundtrip(&[], true), Vec::<bool>::new());
    }

    #[test]
    fn round_trips_three_byte_sequence() {
        // The literal end-to-end scenario: 0x00 0xFF 0x55 through an adaptive bac round-trip.
        let mut bits = Vec::new();
        for &byte in &[0x00u8, 0xFF, 0x55] {
            for i in (0..8).rev() {
                bits.push((byte >> i) & 1 == 1);
            }
        }
        assert_eq!(roundtrip(&bits, true), bits);
    }

    #[test]
    fn cumulative_frequency_never_exceeds_max_and_stays_sorted() {
        let mut model = Model::new();
        for i in 0..5000usize {
            let index = model.symbol_to_index[i % 2];
            assert!(model.total() <= MAX_FREQUENCY);
            model.update(index);

            // freq must remain non-increasing as index increases (1..=TOTAL_NUMBER_OF_SYMBOLS).
            for k in 2..=TOTAL_NUMBER_OF_SYMBOLS {
                assert!(model.freq[k - 1] >= model.freq[k], "frequencies out of order at step {}", i);
            }
        }
    }

    #[test]
    fn model_promotes_a_frequently_coded_symbol_to_a_lower_index() {
        let mut model = Model::new();
        let starting_index = model.symbol_to_index[1]; // symbol `1` starts at index 2

        for _ in 0..10 {
            let current = model.symbol_to_index[1];
            model.update(current);
        }

        assert!(model.symbol_to_index[1] < starting_index, "symbol coded repeatedly should move to a lower index");
        assert_eq!(model.symbol_to_index[1], 1); // becomes the single most-frequent symbol
    }
}
