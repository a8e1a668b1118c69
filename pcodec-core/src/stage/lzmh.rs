// pcodec
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `lzmh` stage: a short-window LZ77 back-reference coder whose literals are coded through an
//! adaptive, frequency-sorted list with a precomputed Huffman code for its 19 most frequent
//! entries. Bit grammar (MSB-first):
//!
//! | Prefix    | Payload             | Meaning                          |
//! |-----------|---------------------|-----------------------------------|
//! | `00`      | 8-bit literal       | raw byte, bypasses the list       |
//! | `010`     | 7-bit offset-1, len | new back-reference                |
//! | `0110`    | len                 | repeat of the most-recent offset  |
//! | `01110`   | len                 | repeat of the 2nd most-recent     |
//! | `011110`  | len                 | repeat of the 3rd most-recent     |
//! | `011111`  | len                 | repeat of the 4th most-recent     |
//! | `1`       | Huffman code        | adaptive list lookup              |
//!
//! Length is `0` + 3 bits (3..10), `10` + 3 bits (11..18), or `11` + 8 bits (19..274). The window
//! is 128 bytes (`LZ_MAX_OFFSET`), the longest match 274 bytes (`LZ_MAX_LENGTH`); the literal list
//! holds 48 `(symbol, count)` entries kept sorted by descending count, with the top 19 ranks
//! spoken for by a fixed code table instead of a per-run transmitted one.

use crate::errors::{invalid_format_error, Error, ErrorKind, Result};
use crate::io::BitBuffer;
use crate::stage::StageOptions;

const LZ_MAX_OFFSET: usize = 128;
const LZ_MAX_LENGTH: usize = 274;
const HUFF_LIST_LENGTH: usize = 48;
const COUNT_CAP: u32 = (1 << 16) - 1;

struct CodeEntry {
    code: u32,
    length: u32,
}

const HUFFMAN_CODES: [CodeEntry; 19] = [
    CodeEntry { code: 0x0F, length: 4 },
    CodeEntry { code: 0x0E, length: 4 },
    CodeEntry { code: 0x0D, length: 4 },
    CodeEntry { code: 0x0C, length: 4 },
    CodeEntry { code: 0x17, length: 5 },
    CodeEntry { code: 0x16, length: 5 },
    CodeEntry { code: 0x15, length: 5 },
    CodeEntry { code: 0x14, length: 5 },
    CodeEntry { code: 0x13, length: 5 },
    CodeEntry { code: 0x25, length: 6 },
    CodeEntry { code: 0x24, length: 6 },
    CodeEntry { code: 0x23, length: 6 },
    CodeEntry { code: 0x22, length: 6 },
    CodeEntry { code: 0x43, length: 7 },
    CodeEntry { code: 0x42, length: 7 },
    CodeEntry { code: 0x83, length: 8 },
    CodeEntry { code: 0x82, length: 8 },
    CodeEntry { code: 0x81, length: 8 },
    CodeEntry { code: 0x80, length: 8 },
];

/// The adaptive, frequency-sorted literal list. Entries are kept in descending-count order by a
/// bubble-sort-on-update, with two distinct update shapes depending on which code path found the
/// byte (mirroring the source): a Huffman-coded rank is already known, so its update shifts only
/// the displaced neighbors' `symbol` fields; a literal/bytecode byte has to be found by value
/// first, and that update shifts the whole `(symbol, count)` entry.
struct FreqList {
    symbol: [u8; HUFF_LIST_LENGTH],
    count: [u32; HUFF_LIST_LENGTH],
}

impl FreqList {
    fn new() -> FreqList {
        FreqList { symbol: [0; HUFF_LIST_LENGTH], count: [0; HUFF_LIST_LENGTH] }
    }

    /// Searches for `byte`; if present, bumps its count and bubbles it up past ties (shifting only
    /// `symbol`). Returns the rank *before* that update -- the caller picks its output code from
    /// the position the byte held when it was looked up, not where it ends up afterwards.
    fn touch_by_symbol(&mut self, byte: u8) -> Option<usize> {
        let mut length = 0usize;
        while length < HUFF_LIST_LENGTH && self.count[length] > 0 {
            if self.symbol[length] == byte {
                let found = length;
                if self.count[length] < COUNT_CAP {
                    let new_count = self.count[length] + 1;
                    let mut i = length;
                    while i > 0 && new_count > self.count[i - 1] {
                        self.symbol[i] = self.symbol[i - 1];
                        i -= 1;
                    }
                    self.count[i] = new_count;
                    self.symbol[i] = byte;
                }
                return Some(found);
            }
            length += 1;
        }
        if length < HUFF_LIST_LENGTH {
            self.symbol[length] = byte;
            self.count[length] = 1;
        }
        None
    }

    /// Applies the Huffman-path update for a rank already known from the bit stream, returning
    /// the byte that was stored there before the bump.
    fn touch_by_rank(&mut self, rank: usize) -> u8 {
        let byte = self.symbol[rank];
        if self.count[rank] < COUNT_CAP {
            let new_count = self.count[rank] + 1;
            let mut i = rank;
            while i > 0 && new_count > self.count[i - 1] {
                self.symbol[i] = self.symbol[i - 1];
                i -= 1;
            }
            self.count[i] = new_count;
            self.symbol[i] = byte;
        }
        byte
    }

    /// The literal/bytecode decode path's update: find `byte` by value (or its first free slot),
    /// then bubble it up, this time shifting the whole entry for displaced neighbors.
    fn touch_by_symbol_full_copy(&mut self, byte: u8) {
        let mut length = 0usize;
        while length < HUFF_LIST_LENGTH && self.count[length] > 0 && self.symbol[length] != byte {
            length += 1;
        }
        if length < HUFF_LIST_LENGTH && self.count[length] < COUNT_CAP {
            let new_count = self.count[length] + 1;
            let mut i = length;
            while i > 0 && new_count > self.count[i - 1] {
                self.symbol[i] = self.symbol[i - 1];
                self.count[i] = self.count[i - 1];
                i -= 1;
            }
            self.count[i] = new_count;
            self.symbol[i] = byte;
        }
    }
}

fn promote_offset(offsets: &mut [usize; 4], idx: usize) {
    let value = offsets[idx];
    offsets.copy_within(0..idx, 1);
    offsets[0] = value;
}

fn push_new_offset(offsets: &mut [usize; 4], value: usize) {
    offsets.copy_within(0..3, 1);
    offsets[0] = value;
}

fn write_length(dst: &mut BitBuffer, length: usize) -> Result<()> {
    let l = length as u64;
    if length <= 10 {
        dst.write_bit(false)?;
        dst.write_bits(3, l - 3)
    } else if length <= 18 {
        dst.write_bits(2, 0b10)?;
        dst.write_bits(3, l - 11)
    } else {
        dst.write_bits(2, 0b11)?;
        dst.write_bits(8, l - 19)
    }
}

fn require_bit(src: &mut BitBuffer) -> Result<bool> {
    src.read_bit()?.ok_or_else(|| Error::new(ErrorKind::InvalidFormat, "lzmh stream ended mid token"))
}

fn read_length(src: &mut BitBuffer) -> Result<usize> {
    if !require_bit(src)? {
        Ok(src.read_value(3)? as usize + 3)
    } else if !require_bit(src)? {
        Ok(src.read_value(3)? as usize + 11)
    } else {
        Ok(src.read_value(8)? as usize + 19)
    }
}

fn write_literal(dst: &mut BitBuffer, byte: u8) -> Result<()> {
    dst.write_bits(2, 0b00)?;
    dst.write_bits(8, byte as u64)
}

fn write_huffman(dst: &mut BitBuffer, rank: usize) -> Result<()> {
    let entry = &HUFFMAN_CODES[rank];
    dst.write_bits(entry.length, entry.code as u64)
}

fn write_rep_prefix(dst: &mut BitBuffer, idx: usize) -> Result<()> {
    match idx {
        0 => dst.write_bits(4, 0b0110),
        1 => dst.write_bits(5, 0b01110),
        2 => dst.write_bits(6, 0b011110),
        3 => dst.write_bits(6, 0b011111),
        _ => unreachable!("the recent-offset stack has exactly 4 slots"),
    }
}

fn write_new_offset_prefix(dst: &mut BitBuffer, offset: usize) -> Result<()> {
    dst.write_bits(3, 0b010)?;
    dst.write_bits(7, (offset - 1) as u64)
}

fn decode_huffman_rank(src: &mut BitBuffer) -> Result<usize> {
    let mut code: u32 = 1; // the leading `1` prefix bit is itself part of every table code
    let mut len: u32 = 1;
    loop {
        if let Some(idx) = HUFFMAN_CODES.iter().position(|e| e.length == len && e.code == code) {
            return Ok(idx);
        }
        if len >= 8 {
            return invalid_format_error("lzmh Huffman code matched no known entry");
        }
        let bit = require_bit(src)?;
        code = (code << 1) | bit as u32;
        len += 1;
    }
}

fn find_best_match(data: &[u8], pos: usize, max_offset: usize, max_length: usize) -> (usize, usize) {
    if max_length < 3 {
        return (0, 0);
    }
    let mut best_length = 2usize;
    let mut best_offset = 0usize;
    let mut offset = 1usize;
    while offset <= max_offset && best_length < max_length {
        let start = pos - offset;
        if data[start] == data[pos] && data[start + best_length] == data[pos + best_length] {
            let mut len = 1usize;
            while len < max_length && data[start + len] == data[pos + len] {
                len += 1;
            }
            if len > best_length {
                best_length = len;
                best_offset = offset;
            }
        }
        offset += 1;
    }
    if best_length >= 3 {
        (best_offset, best_length)
    } else {
        (0, 0)
    }
}

pub fn encode(src: &mut BitBuffer, dst: &mut BitBuffer, _opts: &StageOptions) -> Result<()> {
    log::debug!("lzmh encode: starting");
    let mut data = Vec::new();
    while !src.is_end_of_bitstream()? {
        data.push(src.read_value(8)? as u8);
    }

    let mut list = FreqList::new();
    let mut offsets = [0usize; 4];
    let mut pos = 0usize;
    let (mut literals, mut matches) = (0u64, 0u64);

    while pos < data.len() {
        let max_offset = pos.min(LZ_MAX_OFFSET);
        let max_length = (data.len() - pos).min(LZ_MAX_LENGTH);
        let (best_offset, best_length) = find_best_match(&data, pos, max_offset, max_length);

        if best_length >= 3 {
            match offsets.iter().position(|&o| o == best_offset) {
                Some(0) => write_rep_prefix(dst, 0)?,
                Some(idx) => {
                    write_rep_prefix(dst, idx)?;
                    promote_offset(&mut offsets, idx);
                }
                None => {
                    write_new_offset_prefix(dst, best_offset)?;
                    push_new_offset(&mut offsets, best_offset);
                }
            }
            write_length(dst, best_length)?;
            pos += best_length;
            matches += 1;
        } else {
            let byte = data[pos];
            match list.touch_by_symbol(byte) {
                Some(rank) if rank < HUFFMAN_CODES.len() => write_huffman(dst, rank)?,
                _ => write_literal(dst, byte)?,
            }
            pos += 1;
            literals += 1;
        }
    }

    log::debug!("lzmh encode: done ({} byte(s) in, {} literal(s), {} match(es))", data.len(), literals, matches);
    Ok(())
}

pub fn decode(src: &mut BitBuffer, dst: &mut BitBuffer, _opts: &StageOptions) -> Result<()> {
    log::debug!("lzmh decode: starting");
    let mut out: Vec<u8> = Vec::new();
    let mut list = FreqList::new();
    let mut offsets = [0usize; 4];

    while !src.is_end_of_bitstream()? {
        let is_huffman = require_bit(src)?;
        if is_huffman {
            let rank = decode_huffman_rank(src)?;
            out.push(list.touch_by_rank(rank));
            continue;
        }

        let is_match = require_bit(src)?;
        if !is_match {
            let byte = src.read_value(8)? as u8;
            list.touch_by_symbol_full_copy(byte);
            out.push(byte);
            continue;
        }

        let is_new_offset = !require_bit(src)?;
        let offset = if is_new_offset {
            let new_offset = src.read_value(7)? as usize + 1;
            push_new_offset(&mut offsets, new_offset);
            new_offset
        } else if !require_bit(src)? {
            offsets[0] // rep of the most-recent offset, already in front
        } else if !require_bit(src)? {
            promote_offset(&mut offsets, 1);
            offsets[0]
        } else if !require_bit(src)? {
            promote_offset(&mut offsets, 2);
            offsets[0]
        } else {
            promote_offset(&mut offsets, 3);
            offsets[0]
        };

        let length = read_length(src)?;
        if offset == 0 || offset > out.len() {
            return invalid_format_error(format!("lzmh match offset {} exceeds decoded length {}", offset, out.len()));
        }
        for _ in 0..length {
            let byte = out[out.len() - offset];
            out.push(byte);
        }
    }

    log::debug!("lzmh decode: done ({} byte(s) out)", out.len());
    for b in out {
        dst.write_bits(8, b as u64)?;
    }
    Ok(())
}
