//! Length prefixed optional strings and the swizzle transform applied to encrypted names.
//!
//! Every string is stored as a `u32` size followed by `size` raw bytes. A size of zero
//! encodes an absent string. Names inside the archive tree carry a trailing NUL, names
//! inside resources may or may not, depending on the field.

use binrw::BinResult;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Read, Write};

/// Size of the length prefix in bytes
pub const SIZE_SIZE: u64 = 4;

const MASK: u8 = 0x55;

/// Swizzle a single byte.
///
/// Exchanges every pair of adjacent bits, so applying it twice yields the input.
#[inline]
pub const fn swizzle_byte(byte: u8) -> u8 {
    let left = byte << 1;
    let right = byte >> 1;
    ((left ^ right) & MASK) ^ left
}

/// Swizzle a buffer in place. The same call encrypts and decrypts.
pub fn swizzle(bytes: &mut [u8]) {
    bytes.iter_mut().for_each(|b| *b = swizzle_byte(*b));
}

fn decode(raw: &[u8]) -> String {
    let end = raw.iter().position(|b| *b == 0).unwrap_or(raw.len());
    String::from_utf8_lossy(&raw[..end]).into_owned()
}

fn read_raw<R: Read + ?Sized>(reader: &mut R) -> io::Result<Option<Vec<u8>>> {
    let size = reader.read_u32::<LittleEndian>()?;
    if size == 0 {
        return Ok(None);
    }

    read_sized(reader, size as u64).map(Some)
}

/// Read exactly `size` bytes.
///
/// The buffer grows with the data actually read, so a corrupt size fails with
/// [`io::ErrorKind::UnexpectedEof`] instead of allocating it up front.
pub fn read_sized<R: Read + ?Sized>(reader: &mut R, size: u64) -> io::Result<Vec<u8>> {
    let mut data = Vec::new();
    Read::take(&mut *reader, size).read_to_end(&mut data)?;

    if (data.len() as u64) < size {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("{} of {size} bytes available", data.len()),
        ));
    }
    Ok(data)
}

/// Read an optional string, also reporting whether its last byte was a NUL terminator.
///
/// An absent string reports a terminator, matching what writers emit by default.
pub fn read_optional_terminated<R: Read + ?Sized>(
    reader: &mut R,
) -> io::Result<(Option<String>, bool)> {
    Ok(match read_raw(reader)? {
        Some(raw) => {
            let terminated = raw.last() == Some(&0);
            (Some(decode(&raw)), terminated)
        }
        None => (None, true),
    })
}

/// Read an optional string
pub fn read_optional<R: Read + ?Sized>(reader: &mut R) -> io::Result<Option<String>> {
    read_optional_terminated(reader).map(|(value, _)| value)
}

/// Read an optional string and reverse the swizzle applied to it
pub fn read_optional_encrypted<R: Read + ?Sized>(reader: &mut R) -> io::Result<Option<String>> {
    Ok(read_raw(reader)?.map(|raw| {
        let mut plain = raw;
        let end = plain.iter().position(|b| *b == 0).unwrap_or(plain.len());
        plain.truncate(end);
        swizzle(&mut plain);
        String::from_utf8_lossy(&plain).into_owned()
    }))
}

/// Write an optional string, with a NUL terminator if requested
pub fn write_optional<W: Write + ?Sized>(
    writer: &mut W,
    value: Option<&str>,
    null_terminator: bool,
) -> io::Result<()> {
    let Some(value) = value else {
        return writer.write_u32::<LittleEndian>(0);
    };

    writer.write_u32::<LittleEndian>((value.len() + null_terminator as usize) as u32)?;
    writer.write_all(value.as_bytes())?;
    if null_terminator {
        writer.write_u8(0)?;
    }
    Ok(())
}

/// Swizzle and write an optional string, terminated with a NUL
pub fn write_optional_encrypted<W: Write + ?Sized>(
    writer: &mut W,
    value: Option<&str>,
) -> io::Result<()> {
    let Some(value) = value else {
        return write_optional(writer, None, true);
    };

    let mut bytes = value.as_bytes().to_vec();
    swizzle(&mut bytes);

    writer.write_u32::<LittleEndian>(bytes.len() as u32 + 1)?;
    writer.write_all(&bytes)?;
    writer.write_u8(0)
}

/// Number of bytes [`write_optional`] emits for `value`
pub fn serialized_size(value: Option<&str>, null_terminator: bool) -> u64 {
    SIZE_SIZE + value.map_or(0, |v| v.len() as u64 + null_terminator as u64)
}

#[binrw::parser(reader)]
pub(crate) fn parse_optional() -> BinResult<Option<String>> {
    Ok(read_optional(reader)?)
}

#[binrw::parser(reader)]
pub(crate) fn parse_optional_encrypted() -> BinResult<Option<String>> {
    Ok(read_optional_encrypted(reader)?)
}

#[binrw::writer(writer)]
pub(crate) fn write_terminated(value: &Option<String>) -> BinResult<()> {
    Ok(write_optional(writer, value.as_deref(), true)?)
}

#[binrw::writer(writer)]
pub(crate) fn write_encrypted(value: &Option<String>) -> BinResult<()> {
    Ok(write_optional_encrypted(writer, value.as_deref())?)
}
