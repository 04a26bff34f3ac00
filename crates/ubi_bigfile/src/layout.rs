//! Layout of a big file computed from its tree alone.
//!
//! The metadata of a big file (header, directories and file entries) precedes the data
//! of its files. Its size depends only on the names stored in the tree, so it can be
//! known before anything is written, including after files are renamed for conversion.

use std::collections::BTreeMap;

use crate::profile::FormatProfile;
use crate::read::{BigFile, Directory, File};
use crate::types::{directory_serialized_size, BigFileHeader, FileKind, FileRecord};

/// Which names the layout is computed for
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Naming {
    /// Names as they are stored
    #[default]
    Stored,
    /// Names the files get once converted
    Converted,
}

/// Sizes and shared positions of a big file
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Layout {
    /// Bytes of the header
    pub header_size: u64,
    /// Bytes of the header, directories and file entries
    pub file_system_size: u64,
    /// Number of file entries
    pub files: usize,
    /// Data position -> paths of the files stored there
    pub aliases: BTreeMap<u32, Vec<String>>,
}

impl Layout {
    /// Compute the layout of `big_file`
    pub fn compute(big_file: &BigFile, profile: &FormatProfile, naming: Naming) -> Layout {
        Layout::compute_tree(&big_file.header, &big_file.root, profile, naming)
    }

    /// Compute the layout of a tree written under `header`
    pub fn compute_tree(
        header: &BigFileHeader,
        root: &Directory,
        profile: &FormatProfile,
        naming: Naming,
    ) -> Layout {
        let header_size = header.serialized_size();
        let mut layout = Layout {
            header_size,
            file_system_size: header_size,
            ..Default::default()
        };

        layout.add_directory(root, "", profile, naming);
        layout
    }

    fn add_directory(
        &mut self,
        directory: &Directory,
        prefix: &str,
        profile: &FormatProfile,
        naming: Naming,
    ) {
        self.file_system_size += directory_serialized_size(directory.name.as_deref());

        let prefix = match &directory.name {
            Some(name) => format!("{prefix}{name}/"),
            None => prefix.to_owned(),
        };

        for child in &directory.directories {
            self.add_directory(child, &prefix, profile, naming);
        }

        for file in &directory.files {
            let name = match naming {
                Naming::Stored => file.name.clone(),
                Naming::Converted => output_name(file, profile),
            };

            self.file_system_size += FileRecord::serialized_size(name.as_deref());
            self.files += 1;
            self.aliases
                .entry(file.position)
                .or_default()
                .push(format!("{prefix}{}", name.unwrap_or_default()));
        }
    }

    /// Positions holding the data of more than one file
    pub fn shared(&self) -> impl Iterator<Item = (&u32, &Vec<String>)> {
        self.aliases.iter().filter(|(_, paths)| paths.len() > 1)
    }
}

/// Whether `file` is an image of a mask layer, which is never converted
pub fn is_layer_mask(file: &File) -> bool {
    file.kind.is_image() && file.membership.as_ref().is_some_and(|m| m.mask)
}

/// Name `file` has once converted
pub fn output_name(file: &File, profile: &FormatProfile) -> Option<String> {
    let name = file.name.as_deref()?;
    if !file.kind.is_image() || is_layer_mask(file) {
        return Some(name.to_owned());
    }
    Some(profile.converted_name(name).unwrap_or_else(|| name.to_owned()))
}

impl Directory {
    /// Give every convertible file the name it has once converted.
    ///
    /// Images of mask layers are reclassified as not converted and keep their names.
    pub fn rename(&mut self, profile: &FormatProfile) {
        for directory in &mut self.directories {
            directory.rename(profile);
        }

        for file in &mut self.files {
            if is_layer_mask(file) {
                file.kind = FileKind::None;
                continue;
            }

            if let Some(name) = output_name(file, profile) {
                file.name = Some(name);
            }
        }
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use crate::layout::{Layout, Naming};
    use crate::profile::FormatProfile;
    use crate::read::{Directory, File, Membership};
    use crate::types::{BigFileHeader, FileKind, FileRecord};

    fn file(profile: &FormatProfile, name: &str, position: u32) -> File {
        File::from_record(
            FileRecord {
                name: Some(name.into()),
                size: 1,
                position,
            },
            profile,
        )
    }

    fn tree(profile: &FormatProfile) -> Directory {
        let mut mask = file(profile, "front_01_01.jpg", 300);
        mask.membership = Some(Membership {
            layer: "data/bftex.m4b".into(),
            mask: true,
            blended: false,
        });

        Directory {
            name: None,
            directories: vec![Directory {
                name: Some("cube".into()),
                directories: Vec::new(),
                files: vec![
                    file(profile, "a.jpg", 100),
                    file(profile, "b.jtif", 100),
                    mask,
                ],
            }],
            files: vec![file(profile, "n.bin", 200)],
        }
    }

    #[test]
    fn stored_layout() {
        let profile = FormatProfile::default();
        let root = tree(&profile);

        let layout = Layout::compute_tree(&BigFileHeader::default(), &root, &profile, Naming::Stored);

        // header 19, root 9, cube 14, a.jpg 18, b.jtif 19, front_01_01.jpg 28, n.bin 18
        assert_eq!(layout.header_size, 19);
        assert_eq!(layout.file_system_size, 19 + 9 + 14 + 18 + 19 + 28 + 18);
        assert_eq!(layout.files, 4);

        let shared: Vec<_> = layout.shared().collect();
        assert_eq!(shared.len(), 1);
        assert_eq!(shared[0].0, &100);
        assert_eq!(shared[0].1, &vec!["cube/a.jpg".to_owned(), "cube/b.jtif".to_owned()]);
    }

    #[test]
    fn converted_layout_matches_renamed_tree() {
        let profile = FormatProfile::default();
        let root = tree(&profile);
        let header = BigFileHeader::default();

        let converted = Layout::compute_tree(&header, &root, &profile, Naming::Converted);

        let mut renamed = root.clone();
        renamed.rename(&profile);
        let stored = Layout::compute_tree(&header, &renamed, &profile, Naming::Stored);

        assert_eq!(converted, stored);
        // b.jtif -> b.dds is one byte shorter
        assert_eq!(
            converted.file_system_size,
            Layout::compute_tree(&header, &root, &profile, Naming::Stored).file_system_size - 1
        );
    }

    #[test]
    fn rename_files() {
        let profile = FormatProfile::default();
        let mut root = tree(&profile);

        root.rename(&profile);

        let cube = &root.directories[0];
        assert_eq!(cube.files[0].name.as_deref(), Some("a.dds"));
        assert_eq!(cube.files[1].name.as_deref(), Some("b.dds"));
        assert_eq!(cube.files[2].name.as_deref(), Some("front_01_01.jpg"));
        assert_eq!(cube.files[2].kind, FileKind::None);
        assert_eq!(root.files[0].name.as_deref(), Some("n.bin"));
    }
}
