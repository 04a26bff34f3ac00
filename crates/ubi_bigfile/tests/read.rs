use byteorder::{LittleEndian, WriteBytesExt};
use pretty_assertions::assert_eq;
use std::io::{Cursor, Read, Seek, SeekFrom};
use tracing_test::traced_test;
use ubi_bigfile::{
    error::{Error, Result},
    layout::{Layout, Naming},
    path::Path,
    profile::FormatProfile,
    read::{BigFile, Directory},
    resource::Resource,
    string::write_optional_encrypted,
    write::pack,
};

fn packed<'a>(profile: &FormatProfile, entries: impl IntoIterator<Item = (&'a str, Vec<u8>)>) -> Vec<u8> {
    pack(Cursor::new(Vec::new()), profile, entries)
        .unwrap()
        .into_inner()
}

fn sample(profile: &FormatProfile) -> Vec<u8> {
    packed(
        profile,
        [
            ("data/cube/a.jpg", b"cube a".to_vec()),
            ("data/cube/sky/a.jpg", b"sky a".to_vec()),
            ("data/cube/sky/b.zap", b"sky b".to_vec()),
            ("data/water/a.jpg", b"water a".to_vec()),
            ("data/readme.txt", b"readme".to_vec()),
        ],
    )
}

fn assert_counts(directory: &Directory, declared: &[(usize, usize)], index: &mut usize) {
    assert_eq!(
        (directory.directories.len(), directory.files.len()),
        declared[*index],
        "directory {:?}",
        directory.name
    );
    *index += 1;
    for child in &directory.directories {
        assert_counts(child, declared, index);
    }
}

#[traced_test]
#[test]
fn scan_keeps_declared_counts() -> Result<()> {
    let profile = FormatProfile::default();
    let big_file = BigFile::read(&mut Cursor::new(sample(&profile)), &profile)?;

    // root, cube, sky, water in stored order
    let mut index = 0;
    assert_counts(&big_file.root, &[(2, 1), (1, 1), (0, 2), (0, 1)], &mut index);
    assert_eq!(index, 4);
    assert_eq!(big_file.root.file_count(), 5);

    Ok(())
}

#[test]
fn find_matches_whole_path() -> Result<()> {
    let profile = FormatProfile::default();
    let mut reader = Cursor::new(sample(&profile));
    let big_file = BigFile::read(&mut reader, &profile)?;

    let read = |reader: &mut Cursor<Vec<u8>>, path: &str| -> Result<Option<Vec<u8>>> {
        match big_file.find(&path.into()).found() {
            Some(file) => Ok(Some(big_file.read_payload(reader, file)?)),
            None => Ok(None),
        }
    };

    assert_eq!(read(&mut reader, "data/cube/a.jpg")?, Some(b"cube a".to_vec()));
    assert_eq!(read(&mut reader, "data/cube/sky/a.jpg")?, Some(b"sky a".to_vec()));
    assert_eq!(read(&mut reader, "data/water/a.jpg")?, Some(b"water a".to_vec()));
    assert_eq!(read(&mut reader, "anything/readme.txt")?, Some(b"readme".to_vec()));
    assert_eq!(read(&mut reader, "//data//cube/sky/b.zap")?, Some(b"sky b".to_vec()));

    assert_eq!(read(&mut reader, "data/sky/a.jpg")?, None);
    assert_eq!(read(&mut reader, "data/cube/b.zap")?, None);
    assert_eq!(read(&mut reader, "data/cube/A.jpg")?, None);
    assert_eq!(read(&mut reader, "")?, None);

    Ok(())
}

#[test]
fn find_file_through_nested_archives() -> Result<()> {
    let profile = FormatProfile::default();
    let inner = packed(&profile, [("inner/deep/x.txt", b"nested data".to_vec())]);
    let outer = packed(
        &profile,
        [
            ("data/first.txt", b"first".to_vec()),
            ("data/pack/inner.M4B", inner),
        ],
    );

    // Start the outer archive at a non-zero offset
    let mut stream = vec![0xEEu8; 7];
    stream.extend(outer);
    let mut reader = Cursor::new(stream);
    reader.seek(SeekFrom::Start(7))?;

    let located = BigFile::find_file(
        &mut reader,
        &profile,
        &[Path::from("data/pack/inner.M4B"), Path::from("inner/deep/x.txt")],
    )?
    .found()
    .expect("nested file");

    assert_eq!(located.record.size, 11);

    let mut data = vec![0u8; located.record.size as usize];
    reader.seek(SeekFrom::Start(located.position()))?;
    reader.read_exact(&mut data)?;
    assert_eq!(data, b"nested data");

    reader.seek(SeekFrom::Start(7))?;
    let result = BigFile::find_file(
        &mut reader,
        &profile,
        &[Path::from("data/first.txt"), Path::from("inner/deep/x.txt")],
    );
    assert!(matches!(result, Err(Error::FileNotFound(_))));

    Ok(())
}

#[test]
fn header_is_checked_before_tree() {
    let profile = FormatProfile::default();

    for index in 4..14 {
        let mut input = sample(&profile);
        input[index] ^= 0x20;
        // Cut the tree so that reading it would fail differently
        input.truncate(19);

        let result = BigFile::read(&mut Cursor::new(input), &profile);
        assert!(
            matches!(result, Err(Error::InvalidFormat(_))),
            "signature byte {index}"
        );
    }

    let mut input = sample(&profile);
    input[15] = 0x00;
    let result = BigFile::read(&mut Cursor::new(input), &profile);
    assert!(matches!(result, Err(Error::InvalidFormat(_))));
}

#[traced_test]
#[test]
fn unknown_resource_is_skipped() -> Result<()> {
    let profile = FormatProfile::default();

    let mut record = Vec::new();
    record.write_u32::<LittleEndian>(profile.binary_signature)?;
    record.write_u32::<LittleEndian>(u32::from_le_bytes(*b"ZZZZ"))?;
    record.write_u32::<LittleEndian>(7)?;
    write_optional_encrypted(&mut record, Some("mystery"))?;
    record.extend_from_slice(&[1, 2, 3, 4, 5]);

    let mut reader = Cursor::new(packed(&profile, [("data/cube/x.bin", record)]));
    let big_file = BigFile::read(&mut reader, &profile)?;
    let cube = big_file.root.directory("cube").expect("cube");
    let file = cube.binaries().next().expect("binary entry");

    reader.seek(SeekFrom::Start(big_file.position_of(file)))?;
    let resource = Resource::read(&mut reader, Some(file.size as u64), &profile)?;

    assert_eq!(resource, None);
    assert_eq!(
        reader.position(),
        big_file.position_of(file) + file.size as u64
    );
    assert!(logs_contain("unknown resource"));

    Ok(())
}

#[test]
fn converted_archive_has_predicted_layout() -> Result<()> {
    let profile = FormatProfile::default();
    let big_file = BigFile::read(&mut Cursor::new(sample(&profile)), &profile)?;
    let predicted = Layout::compute(&big_file, &profile, Naming::Converted);

    let mut renamed = big_file.root.clone();
    renamed.rename(&profile);

    let mut entries = Vec::new();
    renamed.walk("", &mut |path, file| {
        entries.push((format!("data/{path}"), vec![0u8; file.size as usize]))
    });
    assert_eq!(
        entries.iter().map(|(path, _)| path.as_str()).collect::<Vec<_>>(),
        vec![
            "data/cube/sky/a.dds",
            "data/cube/sky/b.dds",
            "data/cube/a.dds",
            "data/water/a.dds",
            "data/readme.txt",
        ]
    );

    let mut reader = Cursor::new(
        pack(Cursor::new(Vec::new()), &profile, entries)?.into_inner(),
    );
    let converted = BigFile::read(&mut reader, &profile)?;
    let layout = Layout::compute(&converted, &profile, Naming::Stored);

    assert_eq!(layout.file_system_size, predicted.file_system_size);
    assert_eq!(layout.files, 5);

    // Data follows the metadata directly
    let first = converted
        .find(&"data/cube/sky/a.dds".into())
        .found()
        .expect("first packed file");
    assert_eq!(first.position as u64, predicted.file_system_size);

    Ok(())
}

#[test]
fn too_many_directories() {
    let profile = FormatProfile::default();
    let entries: Vec<_> = (0..256)
        .map(|index| (format!("data/d{index}/f.txt"), vec![0u8]))
        .collect();

    let result = pack(Cursor::new(Vec::new()), &profile, entries);
    assert!(matches!(result, Err(Error::InvalidFormat(_))));
}
