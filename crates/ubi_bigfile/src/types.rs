//! Base types for structure of M4B files and embedded resources.

use binrw::{BinRead, BinWrite};
use std::fmt;

use crate::string::{
    parse_optional, parse_optional_encrypted, serialized_size, write_encrypted,
    write_terminated,
};

/// Signature every big file starts with
pub const SIGNATURE: &str = "UBI_BF_SIG";

/// The only big file version that is supported
pub const CURRENT_VERSION: u32 = 1;

/// Size of the directory count field
pub const DIRECTORY_COUNT_SIZE: u64 = 1;

/// Size of the file count field
pub const FILE_COUNT_SIZE: u64 = 4;

/// Size of the version field
pub const VERSION_SIZE: u64 = 4;

/// Size of the file size field
pub const FILE_SIZE_SIZE: u64 = 4;

/// Size of the file position field
pub const POSITION_SIZE: u64 = 4;

/// Big file header
///
/// A length prefixed signature (stored with its terminator) followed by the version.
/// All data is stored in little endian format
#[derive(BinRead, BinWrite, Debug, Clone, PartialEq)]
#[brw(little)]
pub struct BigFileHeader {
    /// Must equal [`SIGNATURE`] exactly, case sensitively
    #[br(parse_with = parse_optional)]
    #[bw(write_with = write_terminated)]
    pub signature: Option<String>,

    /// Must equal [`CURRENT_VERSION`]
    pub version: u32,
}

impl Default for BigFileHeader {
    fn default() -> Self {
        Self {
            signature: Some(SIGNATURE.into()),
            version: CURRENT_VERSION,
        }
    }
}

impl BigFileHeader {
    /// Bytes the header occupies once written
    pub fn serialized_size(&self) -> u64 {
        serialized_size(self.signature.as_deref(), true) + VERSION_SIZE
    }
}

/// Big file entry
///
/// Defines a file inside a directory. The position is relative to the start of the
/// big file the entry belongs to.
#[derive(BinRead, BinWrite, Debug, Default, Clone, PartialEq)]
#[brw(little)]
pub struct FileRecord {
    /// Name of the file, including its extension
    #[br(parse_with = parse_optional)]
    #[bw(write_with = write_terminated)]
    pub name: Option<String>,

    /// Size of the file data
    pub size: u32,

    /// Offset of the file data from the start of the big file
    pub position: u32,
}

impl FileRecord {
    /// Bytes the entry occupies once written
    pub fn serialized_size(name: Option<&str>) -> u64 {
        serialized_size(name, true) + FILE_SIZE_SIZE + POSITION_SIZE
    }
}

/// Header shared by every resource record
#[derive(BinRead, BinWrite, Debug, Default, Clone, PartialEq)]
#[brw(little)]
pub struct ResourceHeader {
    /// Identity code selecting the record variant
    pub id: u32,

    /// Version the record was written with
    pub version: u32,

    /// Name of the resource, stored swizzled
    #[br(parse_with = parse_optional_encrypted)]
    #[bw(write_with = write_encrypted)]
    pub name: Option<String>,
}

/// Classification of a file, derived from its name's extension
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
pub enum FileKind {
    /// Not converted
    #[default]
    None,
    /// A nested big file
    BigFile,
    /// A resource bearing binary file
    Binary,
    /// A standard image (png, jpg, jtif)
    ImageStandard,
    /// A ZAP image
    ImageZap,
}

impl FileKind {
    /// Whether this kind is an image that may be converted
    pub fn is_image(self) -> bool {
        matches!(self, FileKind::ImageStandard | FileKind::ImageZap)
    }
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FileKind::None => "none",
            FileKind::BigFile => "big file",
            FileKind::Binary => "binary",
            FileKind::ImageStandard => "image",
            FileKind::ImageZap => "zap image",
        })
    }
}

/// A face of a cube node
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Face {
    Back,
    Bottom,
    Front,
    Left,
    Right,
    Top,
}

impl fmt::Display for Face {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Face::Back => "back",
            Face::Bottom => "bottom",
            Face::Front => "front",
            Face::Left => "left",
            Face::Right => "right",
            Face::Top => "top",
        })
    }
}

/// Bytes the metadata of a directory occupies once written, excluding its children
pub fn directory_serialized_size(name: Option<&str>) -> u64 {
    serialized_size(name, true) + DIRECTORY_COUNT_SIZE + FILE_COUNT_SIZE
}

#[cfg(test)]
mod test {
    use std::io::Cursor;

    use binrw::BinRead;
    use binrw::BinWrite;
    use pretty_assertions::assert_eq;

    use crate::error::Result;
    use crate::string::swizzle_byte;
    use crate::types::{BigFileHeader, FileRecord, ResourceHeader};

    #[test]
    fn read_header() -> Result<()> {
        #[rustfmt::skip]
        let mut input = Cursor::new(vec![
            0x0B, 0x00, 0x00, 0x00,
            b'U', b'B', b'I', b'_', b'B', b'F', b'_', b'S', b'I', b'G', 0x00,
            0x01, 0x00, 0x00, 0x00,
        ]);

        assert_eq!(BigFileHeader::read(&mut input)?, BigFileHeader::default());

        Ok(())
    }

    #[test]
    fn write_header() -> Result<()> {
        #[rustfmt::skip]
        let expected: Vec<u8> = vec![
            0x0B, 0x00, 0x00, 0x00,
            b'U', b'B', b'I', b'_', b'B', b'F', b'_', b'S', b'I', b'G', 0x00,
            0x01, 0x00, 0x00, 0x00,
        ];

        let header = BigFileHeader::default();

        let mut actual = Vec::new();
        header.write(&mut Cursor::new(&mut actual))?;

        assert_eq!(actual, expected);
        assert_eq!(header.serialized_size(), expected.len() as u64);

        Ok(())
    }

    #[test]
    fn read_record() -> Result<()> {
        #[rustfmt::skip]
        let mut input = Cursor::new(vec![
            0x06, 0x00, 0x00, 0x00,
            b'a', b'.', b'j', b'p', b'g', 0x00,
            0x0B, 0x00, 0x00, 0x00,
            0x24, 0x00, 0x00, 0x00,
        ]);

        let expected = FileRecord {
            name: Some("a.jpg".into()),
            size: 11,
            position: 36,
        };

        assert_eq!(FileRecord::read(&mut input)?, expected);
        assert_eq!(FileRecord::serialized_size(Some("a.jpg")), 18);

        Ok(())
    }

    #[test]
    fn read_resource_header() -> Result<()> {
        #[rustfmt::skip]
        let mut input = Cursor::new(vec![
            0x2A, 0x00, 0x00, 0x00,
            0x02, 0x00, 0x00, 0x00,
            0x03, 0x00, 0x00, 0x00,
            swizzle_byte(b'o'), swizzle_byte(b'k'), 0x00,
        ]);

        let expected = ResourceHeader {
            id: 42,
            version: 2,
            name: Some("ok".into()),
        };

        assert_eq!(ResourceHeader::read(&mut input)?, expected);

        Ok(())
    }
}
