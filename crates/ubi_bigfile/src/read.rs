//! Types for reading big files
//!

use binrw::BinRead;
use byteorder::{LittleEndian, ReadBytesExt};
use std::fmt;
use std::io::{Read, Seek, SeekFrom};
use tracing::{debug, instrument, trace};
use winnow::prelude::*;
use winnow::stream::AsChar;
use winnow::token::take_while;

use crate::error::{Error, FileNotFoundError, Lookup, Result};
use crate::guard::read_at;
use crate::path::Path;
use crate::profile::FormatProfile;
use crate::resolve::Layer;
use crate::string::{read_optional, read_sized};
use crate::types::{BigFileHeader, Face, FileKind, FileRecord};

/// Marks a file inside a layer archive as taking part in that layer
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Membership {
    /// Key of the layer in the resolved layer map
    pub layer: String,
    /// The layer is a mask, its images are left unconverted
    pub mask: bool,
    /// The image is a slice of a blended water overlay and keeps its alpha
    pub blended: bool,
}

/// A file entry of a big file
#[derive(Debug, Default, Clone, PartialEq)]
pub struct File {
    pub name: Option<String>,
    pub size: u32,
    /// Offset of the data from the start of the containing big file
    pub position: u32,
    pub kind: FileKind,
    /// Key of the layer this file holds, set by the resolver
    pub layer: Option<String>,
    /// Set when the file was read as part of a layer
    pub membership: Option<Membership>,
}

impl File {
    fn read<R: Read + Seek>(reader: &mut R, profile: &FormatProfile) -> Result<File> {
        let record = FileRecord::read(reader)?;
        Ok(File::from_record(record, profile))
    }

    /// Create a file from its stored entry
    pub fn from_record(record: FileRecord, profile: &FormatProfile) -> File {
        File {
            kind: profile.classify(record.name.as_deref()),
            name: record.name,
            size: record.size,
            position: record.position,
            ..Default::default()
        }
    }

    /// Stored entry of this file
    pub fn record(&self) -> FileRecord {
        FileRecord {
            name: self.name.clone(),
            size: self.size,
            position: self.position,
        }
    }

    /// Whether the file carries a resource record
    pub fn is_binary(&self) -> bool {
        self.kind == FileKind::Binary
    }

    fn annotate(&mut self, layer: LayerRef<'_>, profile: &FormatProfile) {
        if !self.kind.is_image() {
            return;
        }

        let blended = self
            .name
            .as_deref()
            .and_then(|name| face_slice(name, profile))
            .is_some_and(|(face, row, col)| layer.layer.masks.contains(face, row, col));

        self.membership = Some(Membership {
            layer: layer.key.to_owned(),
            mask: layer.layer.mask,
            blended,
        });
    }
}

fn face_slice_name<'s>(input: &mut &'s str) -> PResult<(&'s str, u32, u32)> {
    let face = take_while(1.., 'a'..='z').parse_next(input)?;
    '_'.parse_next(input)?;
    let row: u32 = take_while(2, AsChar::is_dec_digit)
        .parse_to()
        .parse_next(input)?;
    '_'.parse_next(input)?;
    let col: u32 = take_while(2, AsChar::is_dec_digit)
        .parse_to()
        .parse_next(input)?;
    '.'.parse_next(input)?;
    Ok((face, row, col))
}

/// Face, row and column of an image named `<face>_<RR>_<CC>.<extension>`
pub fn face_slice(name: &str, profile: &FormatProfile) -> Option<(Face, u32, u32)> {
    let mut input = name;
    let (face, row, col) = face_slice_name(&mut input).ok()?;
    let face = profile.slice_faces.get(face)?;
    Some((*face, row, col))
}

/// A layer being applied while a nested big file is read
#[derive(Debug, Clone, Copy)]
pub struct LayerRef<'a> {
    pub key: &'a str,
    pub layer: &'a Layer,
}

#[derive(Clone, Copy)]
enum Scope<'a> {
    Root(Option<LayerRef<'a>>),
    Child(Option<LayerRef<'a>>),
}

/// A directory of a big file
///
/// A directory without a name matches any name when looking up paths.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Directory {
    pub name: Option<String>,
    pub directories: Vec<Directory>,
    /// Files in the order they are stored
    pub files: Vec<File>,
}

impl Directory {
    fn read<R: Read + Seek>(
        reader: &mut R,
        profile: &FormatProfile,
        scope: Scope<'_>,
    ) -> Result<Directory> {
        let name = read_optional(reader)?;

        let named = |expected: &str| name.as_deref().map_or(true, |name| name == expected);
        let (inherited, annotate) = match scope {
            Scope::Root(layer) => (layer.filter(|_| named(&profile.layer_directory)), None),
            Scope::Child(layer) => (
                None,
                layer.filter(|layer| {
                    name.as_ref()
                        .map_or(true, |name| layer.layer.sets.contains(name))
                }),
            ),
        };

        let directory_count = reader.read_u8()?;
        let mut directories = Vec::with_capacity(directory_count as usize);
        for _ in 0..directory_count {
            directories.push(Directory::read(reader, profile, Scope::Child(inherited))?);
        }

        let file_count = reader.read_u32::<LittleEndian>()?;
        let mut files = Vec::new();
        for _ in 0..file_count {
            let mut file = File::read(reader, profile)?;
            if let Some(layer) = annotate {
                file.annotate(layer, profile);
            }
            files.push(file);
        }

        trace!(?name, directory_count, file_count, "read directory");
        Ok(Directory {
            name,
            directories,
            files,
        })
    }

    /// Files that do not carry resource records
    pub fn ordinary(&self) -> impl Iterator<Item = &File> {
        self.files.iter().filter(|file| !file.is_binary())
    }

    /// Files that carry resource records
    pub fn binaries(&self) -> impl Iterator<Item = &File> {
        self.files.iter().filter(|file| file.is_binary())
    }

    /// Direct child directory named `name`
    pub fn directory(&self, name: &str) -> Option<&Directory> {
        self.directories
            .iter()
            .find(|directory| directory.name.as_deref() == Some(name))
    }

    /// Number of files in this directory and all of its descendants
    pub fn file_count(&self) -> usize {
        self.files.len()
            + self
                .directories
                .iter()
                .map(Directory::file_count)
                .sum::<usize>()
    }

    /// Look up the ordinary file at `path`
    pub fn find(&self, path: &Path) -> Lookup<&File> {
        self.find_from(path, 0).into()
    }

    fn find_from(&self, path: &Path, index: usize) -> Option<&File> {
        let next = self.consume(path, index)?;

        if next < path.directories().len() {
            return self
                .directories
                .iter()
                .find_map(|directory| directory.find_from(path, next));
        }

        self.ordinary()
            .find(|file| file.name.as_deref() == Some(path.file_name()))
    }

    /// Look up the ordinary file at `path` for modification
    pub fn find_mut(&mut self, path: &Path) -> Lookup<&mut File> {
        self.find_from_mut(path, 0).into()
    }

    fn find_from_mut(&mut self, path: &Path, index: usize) -> Option<&mut File> {
        let next = self.consume(path, index)?;

        if next < path.directories().len() {
            return self
                .directories
                .iter_mut()
                .find_map(|directory| directory.find_from_mut(path, next));
        }

        self.files
            .iter_mut()
            .filter(|file| !file.is_binary())
            .find(|file| file.name.as_deref() == Some(path.file_name()))
    }

    /// Match this directory against the component at `index`, returning the next index
    fn consume(&self, path: &Path, index: usize) -> Option<usize> {
        let component = path.directories().get(index)?;
        match &self.name {
            Some(name) if name != component => None,
            _ => Some(index + 1),
        }
    }

    /// Visit every file with its path, skipping the names of unnamed directories
    pub fn walk<'a>(&'a self, prefix: &str, visit: &mut impl FnMut(String, &'a File)) {
        let prefix = match &self.name {
            Some(name) => format!("{prefix}{name}/"),
            None => prefix.to_owned(),
        };

        for directory in &self.directories {
            directory.walk(&prefix, visit);
        }

        for file in &self.files {
            visit(format!("{prefix}{}", file.name.as_deref().unwrap_or_default()), file);
        }
    }
}

/// A parsed big file
#[derive(Debug, Clone, PartialEq)]
pub struct BigFile {
    pub header: BigFileHeader,
    /// Stream position the big file starts at, file positions are relative to it
    pub base: u64,
    pub root: Directory,
}

/// An entry located without reading the whole tree
#[derive(Debug, Clone, PartialEq)]
pub struct Located {
    pub record: FileRecord,
    /// Start of the big file that stores the entry
    pub base: u64,
}

impl Located {
    /// Absolute stream position of the entry's data
    pub fn position(&self) -> u64 {
        self.base + self.record.position as u64
    }
}

impl fmt::Display for Located {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({} bytes at {:#X})",
            self.record.name.as_deref().unwrap_or_default(),
            self.record.size,
            self.position()
        )
    }
}

fn read_header<R: Read + Seek>(reader: &mut R, profile: &FormatProfile) -> Result<BigFileHeader> {
    let header = BigFileHeader::read(reader)?;

    if header.signature.as_deref() != Some(profile.signature.as_str()) {
        return Err(Error::InvalidFormat(format!(
            "signature {:?} is not {:?}",
            header.signature, profile.signature
        )));
    }

    if header.version != profile.version {
        return Err(Error::InvalidFormat(format!(
            "version {} is not {}",
            header.version, profile.version
        )));
    }

    Ok(header)
}

impl BigFile {
    /// Read a big file starting at the current position.
    #[instrument(skip_all, err)]
    pub fn read<R: Read + Seek>(reader: &mut R, profile: &FormatProfile) -> Result<BigFile> {
        Self::read_scoped(reader, profile, None)
    }

    /// Read a big file that holds the textures of a resolved layer.
    ///
    /// The files of the directories taking part in the layer are given a [`Membership`].
    #[instrument(skip(reader, profile, layer), err)]
    pub fn read_with_layer<R: Read + Seek>(
        reader: &mut R,
        profile: &FormatProfile,
        key: &str,
        layer: &Layer,
    ) -> Result<BigFile> {
        Self::read_scoped(reader, profile, Some(LayerRef { key, layer }))
    }

    fn read_scoped<R: Read + Seek>(
        reader: &mut R,
        profile: &FormatProfile,
        layer: Option<LayerRef<'_>>,
    ) -> Result<BigFile> {
        let base = reader.stream_position()?;
        let header = read_header(reader, profile)?;
        let root = Directory::read(reader, profile, Scope::Root(layer))?;

        debug!(base, files = root.file_count(), "read big file");
        Ok(BigFile { header, base, root })
    }

    /// Read the nested big file stored as `file`, leaving the stream where it was
    pub fn read_nested<R: Read + Seek>(
        &self,
        reader: &mut R,
        profile: &FormatProfile,
        file: &File,
    ) -> Result<BigFile> {
        read_at(reader, self.position_of(file), |reader| {
            BigFile::read(reader, profile)
        })
    }

    /// Absolute stream position of the data of `file`
    pub fn position_of(&self, file: &File) -> u64 {
        self.base + file.position as u64
    }

    /// Read the data of `file`, leaving the stream where it was
    pub fn read_payload<R: Read + Seek>(&self, reader: &mut R, file: &File) -> Result<Vec<u8>> {
        read_at(reader, self.position_of(file), |reader| {
            Ok(read_sized(reader, file.size as u64)?)
        })
    }

    /// Look up an ordinary file of the root directory tree
    pub fn find(&self, path: &Path) -> Lookup<&File> {
        self.root.find(path)
    }

    /// Locate a file through a chain of nested big files without reading whole trees.
    ///
    /// Every path but the last must name a nested big file. The stream must stand at
    /// the start of the outermost big file.
    #[instrument(skip(reader, profile), err)]
    pub fn find_file<R: Read + Seek>(
        reader: &mut R,
        profile: &FormatProfile,
        paths: &[Path],
    ) -> Result<Lookup<Located>> {
        let Some((last, nested)) = paths.split_last() else {
            return Ok(Lookup::NotFound);
        };

        let mut base = reader.stream_position()?;
        for path in nested {
            read_header(reader, profile)?;
            let Some(record) = seek_file(reader, path, Some(0))? else {
                return Ok(Lookup::NotFound);
            };

            if profile.classify(record.name.as_deref()) != FileKind::BigFile {
                return Err(FileNotFoundError::Nested(path.to_string()).into());
            }

            base += record.position as u64;
            reader.seek(SeekFrom::Start(base))?;
        }

        read_header(reader, profile)?;
        Ok(seek_file(reader, last, Some(0))?
            .map(|record| Located { record, base })
            .into())
    }
}

/// Scan one directory for `path`, `index` is `None` once the directory cannot match
fn seek_file<R: Read + Seek>(
    reader: &mut R,
    path: &Path,
    index: Option<usize>,
) -> Result<Option<FileRecord>> {
    let name = read_optional(reader)?;

    let next = index.and_then(|index| {
        let component = path.directories().get(index)?;
        match &name {
            Some(name) if name != component => None,
            _ => Some(index + 1),
        }
    });
    let matched = next == Some(path.directories().len());
    let descend = next.filter(|_| !matched);

    let directory_count = reader.read_u8()?;
    for _ in 0..directory_count {
        if let Some(record) = seek_file(reader, path, descend)? {
            return Ok(Some(record));
        }
    }

    let file_count = reader.read_u32::<LittleEndian>()?;
    for _ in 0..file_count {
        let record = FileRecord::read(reader)?;
        if matched && record.name.as_deref() == Some(path.file_name()) {
            return Ok(Some(record));
        }
    }

    Ok(None)
}

#[cfg(test)]
mod test {
    use std::io::Cursor;

    use pretty_assertions::assert_eq;

    use crate::error::{Error, Result};
    use crate::path::Path;
    use crate::profile::FormatProfile;
    use crate::read::{face_slice, BigFile};
    use crate::types::{Face, FileKind};

    #[rustfmt::skip]
    fn sample() -> Vec<u8> {
        vec![
            // Header (19)
            0x0B, 0x00, 0x00, 0x00,
            b'U', b'B', b'I', b'_', b'B', b'F', b'_', b'S', b'I', b'G', 0x00,
            0x01, 0x00, 0x00, 0x00,
            // Root: unnamed, 1 directory
            0x00, 0x00, 0x00, 0x00,
            0x01,
            // Directory "cube", no directories
            0x05, 0x00, 0x00, 0x00, b'c', b'u', b'b', b'e', 0x00,
            0x00,
            // 2 files
            0x02, 0x00, 0x00, 0x00,
            0x06, 0x00, 0x00, 0x00, b'a', b'.', b'j', b'p', b'g', 0x00,
            0x03, 0x00, 0x00, 0x00,
            0x60, 0x00, 0x00, 0x00,
            0x06, 0x00, 0x00, 0x00, b'n', b'.', b'b', b'i', b'n', 0x00,
            0x02, 0x00, 0x00, 0x00,
            0x63, 0x00, 0x00, 0x00,
            // Root files: 1
            0x01, 0x00, 0x00, 0x00,
            0x06, 0x00, 0x00, 0x00, b'r', b'.', b't', b'x', b't', 0x00,
            0x01, 0x00, 0x00, 0x00,
            0x65, 0x00, 0x00, 0x00,
            // Data (96)
            0x61, 0x62, 0x63,
            0x6E, 0x6E,
            0x72,
        ]
    }

    #[test]
    fn read_tree() -> Result<()> {
        let profile = FormatProfile::default();
        let mut reader = Cursor::new(sample());

        let big_file = BigFile::read(&mut reader, &profile)?;

        assert_eq!(big_file.base, 0);
        assert_eq!(big_file.root.name, None);
        assert_eq!(big_file.root.directories.len(), 1);
        assert_eq!(big_file.root.files.len(), 1);
        assert_eq!(big_file.root.file_count(), 3);

        let cube = big_file.root.directory("cube").expect("cube directory");
        assert_eq!(cube.files.len(), 2);
        assert_eq!(cube.ordinary().count(), 1);
        assert_eq!(cube.binaries().count(), 1);
        assert_eq!(cube.files[0].kind, FileKind::ImageStandard);
        assert_eq!(cube.files[1].kind, FileKind::Binary);

        assert_eq!(big_file.read_payload(&mut reader, &cube.files[0])?, b"abc");
        assert_eq!(big_file.read_payload(&mut reader, &big_file.root.files[0])?, b"r");

        Ok(())
    }

    #[test]
    fn huge_payload_size_fails() -> Result<()> {
        let profile = FormatProfile::default();
        let mut reader = Cursor::new(sample());
        let big_file = BigFile::read(&mut reader, &profile)?;

        let mut file = big_file.root.files[0].clone();
        file.size = u32::MAX;

        let result = big_file.read_payload(&mut reader, &file);
        assert!(matches!(result, Err(Error::IOError(_))));

        Ok(())
    }

    #[test]
    fn find_through_unnamed_root() -> Result<()> {
        let profile = FormatProfile::default();
        let big_file = BigFile::read(&mut Cursor::new(sample()), &profile)?;

        let found = big_file.find(&Path::from("data/cube/a.jpg")).found();
        assert_eq!(found.and_then(|f| f.name.as_deref()), Some("a.jpg"));

        let found = big_file.find(&Path::from("data/r.txt")).found();
        assert_eq!(found.map(|f| f.size), Some(1));

        assert!(!big_file.find(&Path::from("data/CUBE/a.jpg")).is_found());
        assert!(!big_file.find(&Path::from("data/cube/r.txt")).is_found());
        assert!(!big_file.find(&Path::from("a.jpg")).is_found());

        // Resource bearing files are not ordinary entries
        assert!(!big_file.find(&Path::from("data/cube/n.bin")).is_found());

        Ok(())
    }

    #[test]
    fn find_file_without_tree() -> Result<()> {
        let profile = FormatProfile::default();
        let mut reader = Cursor::new(sample());

        let located = BigFile::find_file(&mut reader, &profile, &[Path::from("data/cube/n.bin")])?
            .found()
            .expect("n.bin");
        assert_eq!(located.record.size, 2);
        assert_eq!(located.position(), 0x63);

        reader.set_position(0);
        let missing = BigFile::find_file(&mut reader, &profile, &[Path::from("data/cube/x.bin")])?;
        assert!(!missing.is_found());

        Ok(())
    }

    #[test]
    fn reject_signature() {
        let profile = FormatProfile::default();
        let mut input = sample();
        input[6] = b'b';

        let result = BigFile::read(&mut Cursor::new(input), &profile);
        assert!(matches!(result, Err(Error::InvalidFormat(_))));
    }

    #[test]
    fn reject_version() {
        let profile = FormatProfile::default();
        let mut input = sample();
        input[15] = 0x02;

        let result = BigFile::read(&mut Cursor::new(input), &profile);
        assert!(matches!(result, Err(Error::InvalidFormat(_))));
    }

    #[test]
    fn face_slice_names() {
        let profile = FormatProfile::default();

        assert_eq!(face_slice("front_02_11.jpg", &profile), Some((Face::Front, 2, 11)));
        assert_eq!(face_slice("top_01_01.dds", &profile), Some((Face::Top, 1, 1)));
        assert_eq!(face_slice("front_2_11.jpg", &profile), None);
        assert_eq!(face_slice("front_02_111.jpg", &profile), None);
        assert_eq!(face_slice("Front_02_11.jpg", &profile), None);
        assert_eq!(face_slice("side_02_11.jpg", &profile), None);
    }
}
