// pcodec
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Stage option model. Rather than punning offsets into a packed options struct (the source's
//! approach), options are a closed set of typed fields on `StageOptions`, and each stage
//! advertises a sorted slice of `OptionSpec` describing which names it recognises, their kind,
//! numeric range, and a setter function that parses and validates a raw CLI value into the
//! corresponding field.

use crate::errors::{invalid_value_error, Error, ErrorKind, Result};

/// Which direction a configured stage instance runs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Encode,
    Decode,
}

/// The kind of value an option holds, used to drive CLI parsing and help text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionKind {
    Bool,
    Size,
    Float,
    Char,
}

/// The full, fixed set of stage options. Every stage reads only the subset it declared in its
/// `OptionSpec` table; the rest sit at their documented defaults.
#[derive(Debug, Clone)]
pub struct StageOptions {
    pub adaptive: bool,
    pub blocksize: u64,
    pub column: u64,
    pub normalization_factor: f64,
    pub num_decimal_places: u64,
    pub separator: char,
    pub value_size_bits: u32,
    pub num_values: u64,
}

impl Default for StageOptions {
    fn default() -> StageOptions {
        StageOptions {
            adaptive: false,
            blocksize: 8,
            column: 1,
            normalization_factor: 100.0,
            num_decimal_places: 2,
            separator: ',',
            value_size_bits: 32,
            num_values: 2,
        }
    }
}

/// Describes one option a stage recognises: its name (as it appears on the command line), kind,
/// inclusive numeric range (ignored for `Bool`/`Char`), and a setter that applies a raw value.
pub struct OptionSpec {
    pub name: &'static str,
    pub kind: OptionKind,
    pub min: f64,
    pub max: f64,
    pub set: fn(&mut StageOptions, Option<&str>, f64, f64) -> Result<()>,
}

fn parse_u64(raw: Option<&str>, name: &str) -> Result<u64> {
    let raw = raw.ok_or_else(|| Error::new(ErrorKind::InvalidFormat, format!("option `{}` requires a value", name)))?;
    raw.parse::<u64>().map_err(|_| Error::new(ErrorKind::InvalidFormat, format!("option `{}`: `{}` is not an integer", name, raw)))
}

fn parse_f64(raw: Option<&str>, name: &str) -> Result<f64> {
    let raw = raw.ok_or_else(|| Error::new(ErrorKind::InvalidFormat, format!("option `{}` requires a value", name)))?;
    raw.parse::<f64>().map_err(|_| Error::new(ErrorKind::InvalidFormat, format!("option `{}`: `{}` is not a number", name, raw)))
}

fn parse_char(raw: Option<&str>, name: &str) -> Result<char> {
    let raw = raw.ok_or_else(|| Error::new(ErrorKind::InvalidFormat, format!("option `{}` requires a value", name)))?;
    raw.chars().next().ok_or_else(|| Error::new(ErrorKind::InvalidFormat, format!("option `{}` requires a single character", name)))
}

fn check_range(name: &str, value: f64, min: f64, max: f64) -> Result<()> {
    if value < min || value > max {
        return invalid_value_error(format!("option `{}` = {} is outside the valid range [{}, {}]", name, value, min, max));
    }
    Ok(())
}

pub fn set_adaptive(opts: &mut StageOptions, raw: Option<&str>, _min: f64, _max: f64) -> Result<()> {
    opts.adaptive = match raw {
        None => true,
        Some(s) => s.parse::<bool>().map_err(|_| Error::new(ErrorKind::InvalidFormat, format!("`{}` is not a boolean", s)))?,
    };
    Ok(())
}

pub fn set_blocksize(opts: &mut StageOptions, raw: Option<&str>, min: f64, max: f64) -> Result<()> {
    let v = parse_u64(raw, "blocksize")?;
    check_range("blocksize", v as f64, min, max)?;
    opts.blocksize = v;
    Ok(())
}

pub fn set_column(opts: &mut StageOptions, raw: Option<&str>, min: f64, max: f64) -> Result<()> {
    let v = parse_u64(raw, "column")?;
    check_range("column", v as f64, min, max)?;
    opts.column = v;
    Ok(())
}

pub fn set_normalization_factor(opts: &mut StageOptions, raw: Option<&str>, min: f64, max: f64) -> Result<()> {
    let v = parse_f64(raw, "normalization_factor")?;
    check_range("normalization_factor", v, min, max)?;
    opts.normalization_factor = v;
    Ok(())
}

pub fn set_num_decimal_places(opts: &mut StageOptions, raw: Option<&str>, min: f64, max: f64) -> Result<()> {
    let v = parse_u64(raw, "num_decimal_places")?;
    check_range("num_decimal_places", v as f64, min, max)?;
    opts.num_decimal_places = v;
    Ok(())
}

pub fn set_separator_char(opts: &mut StageOptions, raw: Option<&str>, _min: f64, _max: f64) -> Result<()> {
    opts.separator = parse_char(raw, "separator_char")?;
    Ok(())
}

pub fn set_value_size_bits(opts: &mut StageOptions, raw: Option<&str>, min: f64, max: f64) -> Result<()> {
    let v = parse_u64(raw, "valuesize")?;
    check_range("valuesize", v as f64, min, max)?;
    opts.value_size_bits = v as u32;
    Ok(())
}

pub fn set_num_values(opts: &mut StageOptions, raw: Option<&str>, min: f64, max: f64) -> Result<()> {
    let v = parse_u64(raw, "num_values")?;
    check_range("num_values", v as f64, min, max)?;
    opts.num_values = v;
    Ok(())
}

/// Applies a single `name[=value]` option against `opts`, looking it up in `table` by binary
/// search (the table must be sorted by name).
pub fn apply_option(table: &[OptionSpec], opts: &mut StageOptions, name: &str, raw: Option<&str>) -> Result<()> {
    match table.binary_search_by_key(&name, |spec| spec.name) {
        Ok(idx) => {
            let spec = &table[idx];
            (spec.set)(opts, raw, spec.min, spec.max)
        }
        Err(_) => Err(Error::new(ErrorKind::InvalidFormat, format!("unrecognised option `{}`", name))),
    }
}
