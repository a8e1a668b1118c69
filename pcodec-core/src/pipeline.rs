// pcodec
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The pipeline driver chains a sequence of configured stages together, feeding each stage's
//! output to the next over a pair of ping-ponged, memory-backed `BitBuffer`s so that only the
//! first stage ever reads from the real input and only the last ever writes to the real output.

use crate::errors::{Error, ErrorKind, Result};
use crate::io::file_buffer::{FileMemoryBuffer, Mode};
use crate::io::BitBuffer;
use crate::stage::{registry, Direction, StageFn, StageOptions};

const INTERNAL_BUFFER_CAPACITY: usize = 4096;

/// One configured step of a pipeline: which stage, which direction, and its options.
pub struct StageInvocation {
    pub name: String,
    pub direction: Direction,
    pub options: StageOptions,
}

impl StageInvocation {
    pub fn new(name: impl Into<String>, direction: Direction, options: StageOptions) -> StageInvocation {
        StageInvocation { name: name.into(), direction, options }
    }

    fn resolve(&self) -> Result<StageFn> {
        log::debug!("constructing stage `{}` ({})", self.name, direction_name(self.direction));
        let desc = registry::lookup(&self.name).map_err(|e| Error::wrap(ErrorKind::LibraryInit, format!("resolving stage `{}`", self.name), e))?;
        let stage_fn = match self.direction {
            Direction::Encode => desc.encoder,
            Direction::Decode => desc.decoder,
        };
        stage_fn.ok_or_else(|| {
            Error::new(
                ErrorKind::LibraryInit,
                format!("stage `{}` does not support the {} direction", self.name, direction_name(self.direction)),
            )
        })
    }
}

fn direction_name(d: Direction) -> &'static str {
    match d {
        Direction::Encode => "encode",
        Direction::Decode => "decode",
    }
}

fn new_internal_buffer() -> Result<BitBuffer> {
    Ok(BitBuffer::init(FileMemoryBuffer::init_memory(Mode::Writing, INTERNAL_BUFFER_CAPACITY)?))
}

fn run_stage(inv: &StageInvocation, src: &mut BitBuffer, dst: &mut BitBuffer) -> Result<()> {
    let stage_fn = inv.resolve()?;
    stage_fn(src, dst, &inv.options)
        .map_err(|e| Error::wrap(ErrorKind::LibraryCall, format!("stage `{}` ({})", inv.name, direction_name(inv.direction)), e))
}

/// A pipeline is simply an ordered list of stage invocations; `run` drives an input bitstream
/// through all of them into an output bitstream.
pub struct Pipeline {
    stages: Vec<StageInvocation>,
}

impl Pipeline {
    pub fn new(stages: Vec<StageInvocation>) -> Pipeline {
        Pipeline { stages }
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Runs every configured stage in order, reading from `input` and writing to `output`.
    /// `input` must be in reading mode; `output` must be in writing mode. `output` is finished
    /// (padded and flushed) before returning.
    pub fn run(&self, input: &mut BitBuffer, output: &mut BitBuffer) -> Result<()> {
        if self.stages.is_empty() {
            return Err(Error::new(ErrorKind::InvalidFormat, "pipeline has no stages configured"));
        }

        let n = self.stages.len();
        log::debug!("pipeline start: {} stage(s)", n);
        for (i, inv) in self.stages.iter().enumerate() {
            log::debug!("stage {}: `{}` ({})", i, inv.name, direction_name(inv.direction));
        }

        if n == 1 {
            run_stage(&self.stages[0], input, output)?;
            output.finish()?;
            log::debug!("pipeline stop");
            return Ok(());
        }

        let mut buf0 = new_internal_buffer()?;
        let mut buf1 = new_internal_buffer()?;

        run_stage(&self.stages[0], input, &mut buf0)?;
        buf0.flip_to_reading()?;
        let mut data_in_buf0 = true;

        for inv in &self.stages[1..n - 1] {
            if data_in_buf0 {
                run_stage(inv, &mut buf0, &mut buf1)?;
                buf1.flip_to_reading()?;
                buf0.reset_writing();
            } else {
                run_stage(inv, &mut buf1, &mut buf0)?;
                buf0.flip_to_reading()?;
                buf1.reset_writing();
            }
            data_in_buf0 = !data_in_buf0;
            log::debug!("ping-pong swap: data now in {}", if data_in_buf0 { "buf0" } else { "buf1" });
        }

        if data_in_buf0 {
            run_stage(&self.stages[n - 1], &mut buf0, output)?;
        } else {
            run_stage(&self.stages[n - 1], &mut buf1, output)?;
        }
        output.finish()?;
        log::debug!("pipeline stop");
        Ok(())
    }
}
