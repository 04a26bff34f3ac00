//! Types for writing big files
//!

use binrw::BinWrite;
use byteorder::{LittleEndian, WriteBytesExt};
use std::io::{self, Read, Seek, SeekFrom, Write};
use tracing::{debug, instrument, Level};

use crate::error::{Error, Result};
use crate::guard::write_bounded;
use crate::layout::{Layout, Naming};
use crate::path::Path;
use crate::profile::FormatProfile;
use crate::read::{Directory, File};
use crate::string::write_optional;
use crate::types::{BigFileHeader, FileRecord};

/// Big file generator
///
/// The metadata region is reserved up front, file data is appended after it and the
/// header and tree are written last, once every position is known.
///
/// ```
/// # fn doit() -> ubi_bigfile::error::Result<()>
/// # {
/// use std::io::Cursor;
/// use ubi_bigfile::profile::FormatProfile;
/// use ubi_bigfile::write::pack;
///
/// let profile = FormatProfile::default();
/// let archive = pack(
///     Cursor::new(Vec::new()),
///     &profile,
///     [("data/cube/hello.txt", b"Hello, World!".as_slice())],
/// )?;
///
/// assert!(!archive.get_ref().is_empty());
/// # Ok(())
/// # }
/// # doit().unwrap();
/// ```
pub struct BigFileWriter<W: Write + Seek> {
    inner: W,
    base: u64,
    metadata_size: u64,
    end: u64,
}

impl<W: Write + Seek> BigFileWriter<W> {
    /// Reserve `metadata_size` bytes at the current position for the header and tree
    pub fn new(mut inner: W, metadata_size: u64) -> Result<BigFileWriter<W>> {
        let base = inner.stream_position()?;
        inner.seek(SeekFrom::Start(base + metadata_size))?;

        Ok(BigFileWriter {
            inner,
            base,
            metadata_size,
            end: metadata_size,
        })
    }

    /// Position the next appended file will get
    pub fn position(&self) -> u64 {
        self.end
    }

    /// Append the data of one file, returning its position
    #[instrument(skip_all, err, ret(level = Level::TRACE), fields(size = data.len()))]
    pub fn append(&mut self, data: &[u8]) -> Result<u32> {
        self.append_from(data, data.len() as u64)
    }

    /// Append exactly `size` bytes taken from `reader`, returning their position
    pub fn append_from<R: Read>(&mut self, mut reader: R, size: u64) -> Result<u32> {
        let position = u32::try_from(self.end)
            .map_err(|_| Error::InvalidFormat(format!("position {} does not fit", self.end)))?;

        self.inner.seek(SeekFrom::Start(self.base + self.end))?;
        write_bounded(&mut self.inner, Some(size), |writer| {
            io::copy(&mut reader.by_ref().take(size), writer)?;
            Ok(())
        })?;

        self.end += size;
        Ok(position)
    }

    /// Write the header and tree into the reserved region
    ///
    /// The tree must serialize to exactly the reserved size.
    #[instrument(skip_all, err)]
    pub fn finish(mut self, header: &BigFileHeader, root: &Directory) -> Result<W> {
        self.inner.seek(SeekFrom::Start(self.base))?;
        write_bounded(&mut self.inner, Some(self.metadata_size), |writer| {
            header.write(writer)?;
            write_directory(writer, root)
        })?;

        self.inner.seek(SeekFrom::Start(self.base + self.end))?;
        debug!(size = self.end, "wrote big file");
        Ok(self.inner)
    }
}

/// Write a directory and everything below it
pub fn write_directory<W: Write + Seek>(writer: &mut W, directory: &Directory) -> Result<()> {
    write_optional(writer, directory.name.as_deref(), true)?;

    writer.write_u8(count(directory.directories.len(), "directories")?)?;
    for child in &directory.directories {
        write_directory(writer, child)?;
    }

    writer.write_u32::<LittleEndian>(count(directory.files.len(), "files")?)?;
    for file in &directory.files {
        file.record().write(writer)?;
    }
    Ok(())
}

fn count<T: TryFrom<usize>>(len: usize, what: &str) -> Result<T> {
    T::try_from(len)
        .map_err(|_| Error::InvalidFormat(format!("{len} {what} do not fit in one directory")))
}

// The unnamed root stands for the first directory of `path`
fn insert(root: &mut Directory, path: &Path, file: File) {
    let mut directory = root;
    for component in path.directories().iter().skip(1) {
        let index = match directory
            .directories
            .iter()
            .position(|child| child.name.as_deref() == Some(component.as_str()))
        {
            Some(index) => index,
            None => {
                directory.directories.push(Directory {
                    name: Some(component.clone()),
                    ..Default::default()
                });
                directory.directories.len() - 1
            }
        };
        directory = &mut directory.directories[index];
    }
    directory.files.push(file);
}

fn build_tree(
    entries: &[(Path, u32)],
    positions: impl Iterator<Item = u32>,
    profile: &FormatProfile,
) -> Directory {
    let mut root = Directory::default();
    for ((path, size), position) in entries.iter().zip(positions) {
        let record = FileRecord {
            name: Some(path.file_name().to_owned()),
            size: *size,
            position,
        };
        insert(&mut root, path, File::from_record(record, profile));
    }
    root
}

/// Pack `(path, data)` entries into a new big file below an unnamed root directory.
///
/// The first directory of every path is taken by the unnamed root, so entries are
/// found again under the paths they were packed with.
#[instrument(skip_all, err)]
pub fn pack<W, I, P, D>(inner: W, profile: &FormatProfile, entries: I) -> Result<W>
where
    W: Write + Seek,
    I: IntoIterator<Item = (P, D)>,
    P: AsRef<str>,
    D: AsRef<[u8]>,
{
    let header = BigFileHeader {
        signature: Some(profile.signature.clone()),
        version: profile.version,
    };

    let (paths, data): (Vec<_>, Vec<_>) = entries
        .into_iter()
        .map(|(path, data)| (Path::from(path.as_ref()), data))
        .unzip();

    let sized = paths
        .into_iter()
        .zip(&data)
        .map(|(path, data)| {
            let size = u32::try_from(data.as_ref().len())
                .map_err(|_| Error::InvalidFormat(format!("{path} is too large")))?;
            Ok((path, size))
        })
        .collect::<Result<Vec<_>>>()?;

    let structure = build_tree(&sized, std::iter::repeat(0), profile);
    let metadata_size = Layout::compute_tree(&header, &structure, profile, Naming::Stored)
        .file_system_size;

    let mut writer = BigFileWriter::new(inner, metadata_size)?;
    let positions = data
        .iter()
        .map(|data| writer.append(data.as_ref()))
        .collect::<Result<Vec<_>>>()?;

    let root = build_tree(&sized, positions.into_iter(), profile);
    writer.finish(&header, &root)
}
