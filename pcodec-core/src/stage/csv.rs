// pcodec
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `csv` stage is the text boundary of the pipeline. `encode` (ReadCSV) pulls one delimited
//! column out of a text table and emits each value as a raw 32-bit IEEE-754 float; `decode`
//! (WriteCSV) takes such a stream of floats and renders it back out as one formatted value per
//! line. A blank line is skipped on read; a final line with no trailing newline is still read as
//! a complete record (resolved this way since a `diff`/`seg`-style pipeline upstream may leave the
//! last line un-terminated).

use crate::errors::{invalid_format_error, Error, ErrorKind, Result};
use crate::io::BitBuffer;
use crate::stage::StageOptions;

fn read_line(src: &mut BitBuffer) -> Result<Option<Vec<u8>>> {
    let mut line = Vec::new();
    loop {
        if src.is_end_of_bitstream()? {
            return Ok(if line.is_empty() { None } else { Some(line) });
        }
        let b = src.read_value(8)? as u8;
        if b == b'\n' {
            return Ok(Some(line));
        }
        line.push(b);
    }
}

pub fn encode(src: &mut BitBuffer, dst: &mut BitBuffer, opts: &StageOptions) -> Result<()> {
    let column = opts.column as usize;
    if column == 0 {
        return invalid_format_error("csv column is 1-indexed; 0 is not a valid column");
    }

    while let Some(raw_line) = read_line(src)? {
        let line = String::from_utf8(raw_line).map_err(|e| Error::new(ErrorKind::InvalidFormat, e.to_string()))?;
        if line.trim().is_empty() {
            continue;
        }
        let field = line
            .split(opts.separator)
            .nth(column - 1)
            .ok_or_else(|| Error::new(ErrorKind::InvalidFormat, format!("line has no column {}: `{}`", column, line)))?;
        let trimmed = field.trim();
        let value: f32 = if trimmed.is_empty() {
            log::warn!("empty cell in column {}, defaulting to 0.0: `{}`", column, line);
            0.0
        } else {
            trimmed.parse().map_err(|_| Error::new(ErrorKind::InvalidFormat, format!("`{}` is not a number", field)))?
        };
        dst.write_bits(32, value.to_bits() as u64)?;
    }
    Ok(())
}

pub fn decode(src: &mut BitBuffer, dst: &mut BitBuffer, opts: &StageOptions) -> Result<()> {
    let places = opts.num_decimal_places as usize;
    while !src.is_end_of_bitstream()? {
        let raw = src.read_value(32)? as u32;
        let value = f32::from_bits(raw);
        let text = format!("{:.*}\n", places, value);
        for b in text.bytes() {
            dst.write_bits(8, b as u64)?;
        }
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

    fn feed_text(text: &str) -> BitBuffer {
        let mut bw = writer(text.len().max(1));
        for b in text.bytes() {
            bw.write_bits(8, b as u64).unwrap();
        }
        bw.flip_to_reading().unwrap();
        bw
    }

    #[test]
    fn reads_one_column_as_floats() {
        let opts = StageOptions { column: 1, separator: ',', ..StageOptions::default() };
        let mut src = feed_text("1.0,2.0\n3.5,4.5\n");
        let mut floats = writer(32);
        encode(&mut src, &mut floats, &opts).unwrap();
        floats.finish().unwrap();
        floats.flip_to_reading().unwrap();

        assert_eq!(f32::from_bits(floats.read_value(32).unwrap() as u32), 1.0);
        assert_eq!(f32::from_bits(floats.read_value(32).unwrap() as u32), 3.5);
        assert!(floats.is_end_of_bitstream().unwrap());
    }

    #[test]
    fn missing_trailing_newline_still_reads_last_record() {
        let opts = StageOptions { column: 2, separator: ',', ..StageOptions::default() };
        let mut src = feed_text("1.0,2.0\n3.5,4.5");
        let mut floats = writer(32);
        encode(&mut src, &mut floats, &opts).unwrap();
        floats.finish().unwrap();
        floats.flip_to_reading().unwrap();

        assert_eq!(f32::from_bits(floats.read_value(32).unwrap() as u32), 2.0);
        assert_eq!(f32::from_bits(floats.read_value(32).unwrap() as u32), 4.5);
    }

    #[test]
    fn empty_cell_defaults_to_zero() {
        let opts = StageOptions { column: 2, separator: ',', ..StageOptions::default() };
        let mut src = feed_text("1.0,\n");
        let mut floats = writer(32);
        encode(&mut src, &mut floats, &opts).unwrap();
        floats.finish().unwrap();
        floats.flip_to_reading().unwrap();

        assert_eq!(f32::from_bits(floats.read_value(32).unwrap() as u32), 0.0);
    }

    #[test]
    fn writes_formatted_text_with_requested_decimal_places() {
        let opts = StageOptions { num_decimal_places: 1, ..StageOptions::default() };
        let mut floats = writer(32);
        floats.write_bits(32, 1.0f32.to_bits() as u64).unwrap();
        floats.write_bits(32, 3.5f32.to_bits() as u64).unwrap();
        floats.flip_to_reading().unwrap();

        let mut text = writer(32);
        decode(&mut floats, &mut text, &opts).unwrap();
        text.finish().unwrap();
        text.flip_to_reading().unwrap();

        let mut out = Vec::new();
        while !text.is_end_of_bitstream().unwrap() {
            out.push(text.read_value(8).unwrap() as u8);
        }
        assert_eq!(String::from_utf8(out).unwrap(), "1.0\n3.5\n");
    }

    #[test]
    fn missing_column_is_invalid_format() {
        let opts = StageOptions { column: 5, separator: ',', ..StageOptions::default() };
        let mut src = feed_text("1.0,2.0\n");
        let mut floats = writer(32);
        let err = encode(&mut src, &mut floats, &opts).unwrap_err();
        assert_eq!(err.kind(), crate::errors::ErrorKind::InvalidFormat);
    }
}
