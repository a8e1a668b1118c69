// pcodec
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `pcodec-core` is the library half of the pcodec toolkit: buffered bit-granular I/O, a small
//! registry of codec stages, and a pipeline driver that chains them together. The CLI crate
//! (`pcodec-cli`) is a thin argument-parsing shell over this crate.

pub mod errors;
pub mod io;
pub mod pipeline;
pub mod stage;
pub mod util;

pub use errors::{Error, ErrorKind, Result};
pub use pipeline::{Pipeline, StageInvocation};
pub use stage::options::{Direction, StageOptions};
pub use stage::registry::{self, StageDescriptor};
