// pcodec
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `io` module is the buffered I/O substrate: a plain byte buffer at the bottom, a
//! file/memory buffer layered over it, and a bit-granular buffer layered over that. Each layer
//! only knows about the one directly beneath it.

pub mod bit_buffer;
pub mod byte_buffer;
pub mod file_buffer;

pub use bit_buffer::BitBuffer;
pub use byte_buffer::ByteBuffer;
pub use file_buffer::{FileHandle, FileMemoryBuffer, Mode};
