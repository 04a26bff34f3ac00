//! Error types that can be emitted from this library

use miette::Diagnostic;
use thiserror::Error;

/// Error type for library
#[derive(Error, Diagnostic, Debug)]
pub enum Error {
    /// Transparent warpper for [`std::io::Error`]
    #[error(transparent)]
    IOError(#[from] std::io::Error),

    /// Transparent warpper for [`binrw::Error`]
    #[error(transparent)]
    BinRWError(#[from] binrw::Error),

    /// A signature, identity or version field did not match what the format requires
    #[error("invalid format: {0}")]
    #[diagnostic(code(ubi_bigfile::invalid_format))]
    InvalidFormat(String),

    /// More bytes were read than the enclosing region declared, or fewer were consumed
    #[error("read past end of a {size} byte region ({consumed} bytes consumed)")]
    #[diagnostic(code(ubi_bigfile::read_past_end))]
    ReadPastEnd {
        /// Declared size of the region
        size: u64,
        /// Bytes consumed when the region was checked
        consumed: u64,
    },

    /// More bytes were written than the enclosing region declared, or fewer were produced
    #[error("wrote past end of a {size} byte region ({written} bytes written)")]
    #[diagnostic(code(ubi_bigfile::wrote_past_end))]
    WrotePastEnd {
        /// Declared size of the region
        size: u64,
        /// Bytes written when the region was checked
        written: u64,
    },

    /// The resource declares a version older than this parser supports
    #[error("resource {id:#010X} has unsupported version {version} (expected at least {expected})")]
    #[diagnostic(code(ubi_bigfile::unsupported_version))]
    UnsupportedVersion {
        /// Identity code of the resource
        id: u32,
        /// Version found in the stream
        version: u32,
        /// Version the parser was configured for
        expected: u32,
    },

    /// unable to find requested file
    #[error("unable to find requested file")]
    FileNotFound(#[from] FileNotFoundError),

    /// Wraps an error with the archive path it was raised for
    #[error("{path}: {source}")]
    InFile {
        /// Path of the offending entry
        path: String,
        /// Underlying error
        #[source]
        source: Box<Error>,
    },

    /// {0}
    #[error("{0}")]
    CustomError(String),
}

impl Error {
    /// Attach the archive path the error was raised for
    pub fn in_file(self, path: impl ToString) -> Self {
        Error::InFile {
            path: path.to_string(),
            source: Box::new(self),
        }
    }

    /// Whether the error only invalidates the record being parsed.
    ///
    /// Malformed records, bounds violations, unsupported versions and truncated
    /// data are recoverable. Any other I/O failure means the stream itself is
    /// unusable.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Error::IOError(e) => e.kind() == std::io::ErrorKind::UnexpectedEof,
            Error::BinRWError(binrw::Error::Io(e)) => {
                e.kind() == std::io::ErrorKind::UnexpectedEof
            }
            Error::BinRWError(_) => true,
            Error::InvalidFormat(_)
            | Error::ReadPastEnd { .. }
            | Error::WrotePastEnd { .. }
            | Error::UnsupportedVersion { .. } => true,
            Error::InFile { source, .. } => source.is_recoverable(),
            Error::FileNotFound(_) | Error::CustomError(_) => false,
        }
    }
}

/// Error type to provide further information when a file has not been found
#[derive(Error, Diagnostic, Debug)]
#[error("unable to find requested file")]
pub enum FileNotFoundError {
    /// by path {0}
    #[error("by path {0}")]
    Path(String),

    /// in nested archive {0}
    #[error("in nested archive {0}")]
    Nested(String),
}

/// Generic result type with crate's Error as its error variant
pub type Result<T> = core::result::Result<T, Error>;

/// Outcome of a lookup that may legitimately miss.
///
/// A miss is an ordinary result, only [`Error`] is fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup<T> {
    /// The value was located
    Found(T),
    /// Nothing matched
    NotFound,
}

impl<T> Lookup<T> {
    /// Convert into an [`Option`]
    pub fn found(self) -> Option<T> {
        match self {
            Lookup::Found(value) => Some(value),
            Lookup::NotFound => None,
        }
    }

    /// Whether the lookup succeeded
    pub fn is_found(&self) -> bool {
        matches!(self, Lookup::Found(_))
    }
}

impl<T> From<Option<T>> for Lookup<T> {
    fn from(value: Option<T>) -> Self {
        value.map_or(Lookup::NotFound, Lookup::Found)
    }
}
