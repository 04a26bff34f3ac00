//! Error types that can be emitted from this library

use miette::Diagnostic;
use thiserror::Error;

/// Error type for library
#[derive(Error, Diagnostic, Debug)]
pub enum Error {
    /// Transparent warpper for [`std::io::Error`]
    #[error(transparent)]
    IOError(#[from] std::io::Error),

    /// Transparent wrapper for [`ubi_bigfile::error::Error`]
    #[error(transparent)]
    BigFile(#[from] ubi_bigfile::error::Error),

    /// The source of a file task ended before the declared count was read
    #[error("count is greater than the size of the source ({remaining} bytes missing)")]
    #[diagnostic(code(ubi_work::short_read))]
    ShortRead {
        /// Bytes that could not be read
        remaining: u64,
    },

    /// A stored path cannot be written below the output directory
    #[error("invalid path {0}")]
    #[diagnostic(code(ubi_work::invalid_path))]
    InvalidPath(String),

    /// The image codec failed
    #[error("codec: {0}")]
    #[diagnostic(code(ubi_work::codec))]
    Codec(String),

    /// The run was cancelled after another task failed
    #[error("cancelled")]
    #[diagnostic(code(ubi_work::cancelled))]
    Cancelled,

    /// A worker thread panicked
    #[error("worker thread panicked")]
    #[diagnostic(code(ubi_work::panicked))]
    Panicked,

    /// Wraps an error with the path of the file it was raised for
    #[error("{path}: {source}")]
    InFile {
        /// Path of the offending file
        path: String,
        /// Underlying error
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Attach the path of the file the error was raised for
    pub fn in_file(self, path: impl ToString) -> Self {
        Error::InFile {
            path: path.to_string(),
            source: Box::new(self),
        }
    }

    /// Whether the error only reports that the run was cancelled
    pub fn is_cancelled(&self) -> bool {
        match self {
            Error::Cancelled => true,
            Error::InFile { source, .. } => source.is_cancelled(),
            _ => false,
        }
    }
}

/// Generic result type with crate's Error as its error variant
pub type Result<T> = core::result::Result<T, Error>;
