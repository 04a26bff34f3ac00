//! Concurrent extraction and conversion of the files stored in **M4B** big files.
//!
//! The reading thread scans a big file and every big file nested in it, streaming the
//! bytes of each file through a bounded [`task::FileTask`]. A pool of workers hands the
//! tasks to a [`FileConsumer`], which writes them out unchanged ([`consume::Extract`]) or
//! converts their images through an external codec ([`codec::ConvertConsumer`]).
//!
//! ```no_run
//! # fn doit() -> ubi_work::error::Result<()>
//! # {
//! use std::fs::File;
//! use std::io::BufReader;
//! use ubi_bigfile::FormatProfile;
//! use ubi_work::consume::{DirectoryOutput, Extract};
//! use ubi_work::Pipeline;
//!
//! let mut reader = BufReader::new(File::open("data.m4b")?);
//! let consumer = Extract {
//!     output: DirectoryOutput::new("out"),
//! };
//!
//! let summary = Pipeline::builder()
//!     .threads(4)
//!     .build()
//!     .run(&mut reader, &FormatProfile::default(), &consumer)?;
//! println!("{} files", summary.files);
//! # Ok(())
//! # }
//! ```

pub mod codec;
pub mod consume;
pub mod error;
pub mod event;
pub mod pool;
pub mod task;

pub use pool::{FileConsumer, Pipeline, Summary};
pub use task::FileTask;
