// pcodec
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! A stage is one codec step in a pipeline: it reads a bitstream from one `BitBuffer` and writes
//! a (generally differently-shaped) bitstream to another. `registry` is the closed, name-sorted
//! table of stages the CLI and pipeline driver look stages up in; `options` is the typed options
//! model every stage configures itself from.

pub mod aggregate;
pub mod bac;
pub mod copy;
pub mod csv;
pub mod differential;
pub mod lzmh;
pub mod normalize;
pub mod options;
pub mod registry;
pub mod seg;

use crate::errors::Result;
use crate::io::BitBuffer;

pub use options::{Direction, OptionKind, OptionSpec, StageOptions};

/// The signature every stage encoder/decoder function implements: read from `src` (which must be
/// in reading mode), write to `dst` (which must be in writing mode), using `opts` for
/// configuration.
pub type StageFn = fn(&mut BitBuffer, &mut BitBuffer, &StageOptions) -> Result<()>;
