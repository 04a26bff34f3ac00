//! Scoped checks that a parse or a write stays inside a declared region.
//!
//! A region is opened at the current stream position with a declared size. Reads or
//! writes done while it is open must end exactly at `start + size`. The check runs when
//! the scope is left, including when the scope is left with an error, in which case an
//! overrun is reported in place of the original error.
//!
//! A region without a size (`None`) is not checked at all. Callers use that when the
//! byte range was already validated by an enclosing region.

use std::io::{Seek, SeekFrom};

use crate::error::{Error, Result};

/// Which side of the stream a guard watches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Reports [`Error::ReadPastEnd`]
    Read,
    /// Reports [`Error::WrotePastEnd`]
    Write,
}

/// A declared region of a stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CursorGuard {
    start: u64,
    size: Option<u64>,
    direction: Direction,
}

impl CursorGuard {
    /// Open a region at the current position of `stream`
    pub fn enter<S: Seek + ?Sized>(
        stream: &mut S,
        size: Option<u64>,
        direction: Direction,
    ) -> Result<Self> {
        Ok(Self {
            start: stream.stream_position()?,
            size,
            direction,
        })
    }

    /// Position the region was opened at
    pub fn start(&self) -> u64 {
        self.start
    }

    /// Declared size, if any
    pub fn size(&self) -> Option<u64> {
        self.size
    }

    /// Bytes moved over since the region was opened
    pub fn consumed<S: Seek + ?Sized>(&self, stream: &mut S) -> Result<u64> {
        Ok(stream.stream_position()?.saturating_sub(self.start))
    }

    /// Fail if the stream has moved past the end of the region
    pub fn check<S: Seek + ?Sized>(&self, stream: &mut S) -> Result<()> {
        let Some(size) = self.size else {
            return Ok(());
        };

        let consumed = self.consumed(stream)?;
        if consumed > size {
            return Err(self.violation(size, consumed));
        }
        Ok(())
    }

    /// Fail unless the stream stands exactly at the end of the region
    pub fn finish<S: Seek + ?Sized>(&self, stream: &mut S) -> Result<()> {
        let Some(size) = self.size else {
            return Ok(());
        };

        let consumed = self.consumed(stream)?;
        if consumed != size {
            return Err(self.violation(size, consumed));
        }
        Ok(())
    }

    /// Close the region around `result`.
    ///
    /// A successful result must have consumed the whole region. A failed result is
    /// replaced only if the region was overrun.
    pub fn exit<S: Seek + ?Sized, T>(&self, stream: &mut S, result: Result<T>) -> Result<T> {
        match result {
            Ok(value) => self.finish(stream).map(|_| value),
            Err(e) => match self.check(stream) {
                Ok(()) => Err(e),
                Err(bounds) => {
                    tracing::debug!(error = %e, "region overrun while failing");
                    Err(bounds)
                }
            },
        }
    }

    fn violation(&self, size: u64, consumed: u64) -> Error {
        match self.direction {
            Direction::Read => Error::ReadPastEnd { size, consumed },
            Direction::Write => Error::WrotePastEnd {
                size,
                written: consumed,
            },
        }
    }
}

/// Move over `count` uninterpreted bytes
pub fn skip<S: Seek + ?Sized>(stream: &mut S, count: u64) -> Result<()> {
    let count = i64::try_from(count)
        .map_err(|_| Error::InvalidFormat(format!("cannot skip {count} bytes")))?;
    stream.seek(SeekFrom::Current(count))?;
    Ok(())
}

/// Run `f` at `position`, then put the stream back where it was
pub fn read_at<S, T, F>(stream: &mut S, position: u64, f: F) -> Result<T>
where
    S: Seek + ?Sized,
    F: FnOnce(&mut S) -> Result<T>,
{
    let saved = stream.stream_position()?;
    stream.seek(SeekFrom::Start(position))?;
    let result = f(stream);
    stream.seek(SeekFrom::Start(saved))?;
    result
}

/// Run `f` inside a read region of `size` bytes
pub fn read_bounded<R, T, F>(reader: &mut R, size: Option<u64>, f: F) -> Result<T>
where
    R: Seek + ?Sized,
    F: FnOnce(&mut R) -> Result<T>,
{
    let guard = CursorGuard::enter(reader, size, Direction::Read)?;
    let result = f(reader);
    guard.exit(reader, result)
}

/// Run `f` inside a write region of `size` bytes
pub fn write_bounded<W, T, F>(writer: &mut W, size: Option<u64>, f: F) -> Result<T>
where
    W: Seek + ?Sized,
    F: FnOnce(&mut W) -> Result<T>,
{
    let guard = CursorGuard::enter(writer, size, Direction::Write)?;
    let result = f(writer);
    guard.exit(writer, result)
}
