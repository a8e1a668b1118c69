// pcodec
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `errors` module defines the single `Error` type shared by every layer of the core, and
//! the small negative-integer taxonomy used as the process exit code by the CLI.

use std::fmt;
use std::io;
use std::result;

/// `ErrorKind` enumerates the reasons an operation anywhere in the core can fail. Each variant
/// carries the negative exit code it maps to at the CLI boundary (see `ErrorKind::exit_code`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// An out-of-range argument or a decoded symbol that cannot exist under the model.
    InvalidValue,
    /// A request exceeded the buffer-addressing half-width.
    ValueTooLarge,
    /// A malformed CLI argument, or a malformed coded stream.
    InvalidFormat,
    /// An operation was attempted against a buffer in the wrong mode.
    InvalidMode,
    /// Underlying read/write/open failure.
    FileIo,
    /// Allocation failure.
    Memory,
    /// A failure during stage/pipeline construction, wrapping a lower-layer error.
    LibraryInit,
    /// A failure during stage execution, wrapping a lower-layer error.
    LibraryCall,
}

impl ErrorKind {
    /// The stable process exit code for this kind, matching the taxonomy's small negative
    /// integers.
    pub fn exit_code(&self) -> i32 {
        match self {
            ErrorKind::InvalidValue => -1,
            ErrorKind::ValueTooLarge => -2,
            ErrorKind::InvalidFormat => -3,
            ErrorKind::InvalidMode => -4,
            ErrorKind::FileIo => -5,
            ErrorKind::Memory => -6,
            ErrorKind::LibraryInit => -7,
            ErrorKind::LibraryCall => -8,
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidValue => "invalid value",
            ErrorKind::ValueTooLarge => "value too large",
            ErrorKind::InvalidFormat => "invalid format",
            ErrorKind::InvalidMode => "invalid mode",
            ErrorKind::FileIo => "file I/O error",
            ErrorKind::Memory => "memory allocation failure",
            ErrorKind::LibraryInit => "library initialization failure",
            ErrorKind::LibraryCall => "library call failure",
        }
    }
}

/// `Error` is the single error type returned by every fallible operation in the core.
#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    message: String,
    source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl Error {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Error {
        Error { kind, message: message.into(), source: None }
    }

    /// Wraps a lower-layer error as a composite `library-init` or `library-call` error, per the
    /// propagation policy: the driver is the only layer allowed to re-kind an error this way.
    pub fn wrap(kind: ErrorKind, message: impl Into<String>, source: Error) -> Error {
        Error { kind, message: message.into(), source: Some(Box::new(source)) }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn exit_code(&self) -> i32 {
        self.kind.exit_code()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind.as_str(), self.message)?;
        if let Some(source) = &self.source {
            write!(f, " (caused by: {})", source)?;
        }
        Ok(())
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        Error::new(ErrorKind::FileIo, err.to_string())
    }
}

pub type Result<T> = result::Result<T, Error>;

/// Convenience function to create an invalid-value error.
pub fn invalid_value_error<T>(desc: impl Into<String>) -> Result<T> {
    Err(Error::new(ErrorKind::InvalidValue, desc))
}

/// Convenience function to create a value-too-large error.
pub fn value_too_large_error<T>(desc: impl Into<String>) -> Result<T> {
    Err(Error::new(ErrorKind::ValueTooLarge, desc))
}

/// Convenience function to create an invalid-format error.
pub fn invalid_format_error<T>(desc: impl Into<String>) -> Result<T> {
    Err(Error::new(ErrorKind::InvalidFormat, desc))
}

/// Convenience function to create an invalid-mode error.
pub fn invalid_mode_error<T>(desc: impl Into<String>) -> Result<T> {
    Err(Error::new(ErrorKind::InvalidMode, desc))
}
