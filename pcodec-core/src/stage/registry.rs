// pcodec
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The stage registry: a single, name-sorted table mapping a stage's command-line name to its
//! description, recognised options, and encoder/decoder functions. Lookups are a binary search
//! over `STAGES`, which must stay sorted by `name` — the `registry_is_sorted` test guards that.

use super::options::{set_adaptive, set_blocksize, set_column, set_normalization_factor, set_num_decimal_places, set_num_values, set_separator_char, set_value_size_bits, OptionKind, OptionSpec};
use super::{aggregate, bac, copy, csv, differential, lzmh, normalize, seg, StageFn};
use crate::errors::{Error, ErrorKind, Result};

/// One entry in the stage registry.
pub struct StageDescriptor {
    pub name: &'static str,
    pub description: &'static str,
    pub options: &'static [OptionSpec],
    /// `None` if this stage cannot run in the encode direction.
    pub encoder: Option<StageFn>,
    /// `None` if this stage cannot run in the decode direction (e.g. `aggregate` is lossy and
    /// encode-only).
    pub decoder: Option<StageFn>,
}

static AGGREGATE_OPTIONS: &[OptionSpec] = &[OptionSpec { name: "num_values", kind: OptionKind::Size, min: 1.0, max: 1_048_576.0, set: set_num_values }];

static BAC_OPTIONS: &[OptionSpec] = &[OptionSpec { name: "adaptive", kind: OptionKind::Bool, min: 0.0, max: 0.0, set: set_adaptive }];

static COPY_OPTIONS: &[OptionSpec] = &[OptionSpec { name: "blocksize", kind: OptionKind::Size, min: 1.0, max: 1_048_576.0, set: set_blocksize }];

static CSV_OPTIONS: &[OptionSpec] = &[
    OptionSpec { name: "column", kind: OptionKind::Size, min: 1.0, max: 4096.0, set: set_column },
    OptionSpec { name: "num_decimal_places", kind: OptionKind::Size, min: 0.0, max: 17.0, set: set_num_decimal_places },
    OptionSpec { name: "separator_char", kind: OptionKind::Char, min: 0.0, max: 0.0, set: set_separator_char },
];

static DIFF_OPTIONS: &[OptionSpec] = &[OptionSpec { name: "valuesize", kind: OptionKind::Size, min: 1.0, max: 64.0, set: set_value_size_bits }];

static LZMH_OPTIONS: &[OptionSpec] = &[];

static NORMALIZE_OPTIONS: &[OptionSpec] = &[
    OptionSpec { name: "normalization_factor", kind: OptionKind::Float, min: f64::MIN_POSITIVE, max: f64::MAX, set: set_normalization_factor },
    OptionSpec { name: "valuesize", kind: OptionKind::Size, min: 1.0, max: 64.0, set: set_value_size_bits },
];

static SEG_OPTIONS: &[OptionSpec] = &[OptionSpec { name: "valuesize", kind: OptionKind::Size, min: 1.0, max: 64.0, set: set_value_size_bits }];

/// The registry, sorted alphabetically by `name` so lookups can binary-search.
pub static STAGES: &[StageDescriptor] = &[
    StageDescriptor {
        name: "aggregate",
        description: "folds runs of num_values samples into their sum; encode-only (not invertible)",
        options: AGGREGATE_OPTIONS,
        encoder: Some(aggregate::encode),
        decoder: None,
    },
    StageDescriptor {
        name: "bac",
        description: "adaptive binary arithmetic coder over a 2-symbol + EOF alphabet",
        options: BAC_OPTIONS,
        encoder: Some(bac::encode),
        decoder: Some(bac::decode),
    },
    StageDescriptor {
        name: "copy",
        description: "passes bytes through blocksize bytes at a time, unchanged",
        options: COPY_OPTIONS,
        encoder: Some(copy::run),
        decoder: Some(copy::run),
    },
    StageDescriptor {
        name: "csv",
        description: "encode reads one column of a delimited text table into raw values; decode writes it back out as text",
        options: CSV_OPTIONS,
        encoder: Some(csv::encode),
        decoder: Some(csv::decode),
    },
    StageDescriptor {
        name: "diff",
        description: "encodes each value as the signed delta from its predecessor",
        options: DIFF_OPTIONS,
        encoder: Some(differential::encode),
        decoder: Some(differential::decode),
    },
    StageDescriptor {
        name: "lzmh",
        description: "LZ77 back-references combined with a move-to-front literal coder",
        options: LZMH_OPTIONS,
        encoder: Some(lzmh::encode),
        decoder: Some(lzmh::decode),
    },
    StageDescriptor {
        name: "normalize",
        description: "scales a floating point value by normalization_factor into a valuesize-bit integer, and back",
        options: NORMALIZE_OPTIONS,
        encoder: Some(normalize::encode),
        decoder: Some(normalize::decode),
    },
    StageDescriptor {
        name: "seg",
        description: "signed exponential-Golomb coding",
        options: SEG_OPTIONS,
        encoder: Some(seg::encode),
        decoder: Some(seg::decode),
    },
];

/// Looks up a stage by name via binary search.
pub fn lookup(name: &str) -> Result<&'static StageDescriptor> {
    STAGES
        .binary_search_by_key(&name, |d| d.name)
        .map(|idx| &STAGES[idx])
        .map_err(|_| Error::new(ErrorKind::InvalidFormat, format!("unknown stage `{}`", name)))
}

/// The full registry, in name order, for CLI help text.
pub fn list() -> &'static [StageDescriptor] {
    STAGES
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_is_sorted() {
        let mut sorted: Vec<&str> = STAGES.iter().map(|d| d.name).collect();
        let original = sorted.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, original, "STAGES must stay sorted by name for binary_search to work");
    }

    #[test]
    fn each_stage_options_table_is_sorted() {
        for desc in STAGES {
            let mut sorted: Vec<&str> = desc.options.iter().map(|o| o.name).collect();
            let original = sorted.clone();
            sorted.sort_unstable();
            assert_eq!(sorted, original, "options for stage `{}` must stay sorted by name", desc.name);
        }
    }

    #[test]
    fn lookup_finds_known_stages_and_rejects_unknown() {
        assert!(lookup("bac").is_ok());
        assert!(lookup("lzmh").is_ok());
        let err = lookup("not-a-stage").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidFormat);
    }

    #[test]
    fn aggregate_has_no_decoder() {
        let desc = lookup("aggregate").unwrap();
        assert!(desc.decoder.is_none());
    }
}
