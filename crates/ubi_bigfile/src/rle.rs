//! Decoder for the run length encoded water masks stored per cube face.
//!
//! Only which slices of a face are covered is kept. Region, group and pixel
//! payloads are skipped by their declared lengths.

use byteorder::{LittleEndian, ReadBytesExt};
use derive_more::{Deref, From, IntoIterator};
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};
use std::io::{Read, Seek};
use tracing::{instrument, trace};

use crate::error::Result;
use crate::guard::{read_bounded, skip};
use crate::profile::FormatProfile;
use crate::resource::read_binary_signature;
use crate::types::Face;

const PIXEL_SIZE: u64 = 2;

/// Row -> columns of the slices covered by a mask
#[derive(Debug, Default, Clone, PartialEq, Eq, Deref, From, IntoIterator)]
pub struct SliceMap(BTreeMap<u32, BTreeSet<u32>>);

impl SliceMap {
    /// Whether the slice at `row`, `col` is covered
    pub fn contains(&self, row: u32, col: u32) -> bool {
        self.0.get(&row).is_some_and(|cols| cols.contains(&col))
    }

    fn insert(&mut self, row: u32, col: u32) {
        self.0.entry(row).or_default().insert(col);
    }

    /// Decode a mask of `size` bytes starting at the current position
    ///
    /// A sized mask starts with the binary signature, like every binary payload.
    #[instrument(skip(reader, profile), err)]
    pub fn read<R: Read + Seek>(
        reader: &mut R,
        size: Option<u64>,
        profile: &FormatProfile,
    ) -> Result<SliceMap> {
        read_bounded(reader, size, |reader| {
            let sizes = profile.rle;
            let base = profile.slice_index_base;

            if size.is_some() {
                read_binary_signature(reader, profile)?;
            }
            skip(reader, sizes.face)?;
            let slices = reader.read_u32::<LittleEndian>()?;

            let mut map = SliceMap::default();
            for _ in 0..slices {
                let row = base.apply(reader.read_u32::<LittleEndian>()?);
                let col = base.apply(reader.read_u32::<LittleEndian>()?);
                map.insert(row, col);

                skip(reader, sizes.slice)?;

                let regions = reader.read_u32::<LittleEndian>()?;
                for _ in 0..regions {
                    skip(reader, sizes.region)?;

                    let groups = reader.read_u32::<LittleEndian>()?;
                    for _ in 0..groups {
                        skip(reader, sizes.group)?;

                        let subgroups = reader.read_u32::<LittleEndian>()?;
                        for _ in 0..subgroups {
                            let pixels = reader.read_u32::<LittleEndian>()?;
                            skip(reader, PIXEL_SIZE * pixels as u64)?;
                        }
                    }
                }
            }

            trace!(slices, rows = map.len(), "decoded mask");
            Ok(map)
        })
    }
}

/// Face -> covered slices of that face
#[derive(Debug, Default, Clone, PartialEq, Eq, Deref, From, IntoIterator)]
pub struct MaskMap(BTreeMap<Face, SliceMap>);

impl MaskMap {
    /// Keep `slices` for `face` unless the face was already decoded
    pub fn insert_first(&mut self, face: Face, slices: SliceMap) -> bool {
        match self.0.entry(face) {
            Entry::Vacant(entry) => {
                entry.insert(slices);
                true
            }
            Entry::Occupied(_) => false,
        }
    }

    /// Whether the slice at `row`, `col` of `face` is covered
    pub fn contains(&self, face: Face, row: u32, col: u32) -> bool {
        self.0
            .get(&face)
            .is_some_and(|slices| slices.contains(row, col))
    }
}

#[cfg(test)]
mod test {
    use std::collections::{BTreeMap, BTreeSet};
    use std::io::Cursor;

    use pretty_assertions::assert_eq;

    use crate::error::{Error, Result};
    use crate::profile::{FormatProfile, SliceIndexBase};
    use crate::rle::{MaskMap, SliceMap};
    use crate::types::Face;

    fn two_slices(first: [u8; 2], second: [u8; 2]) -> Vec<u8> {
        #[rustfmt::skip]
        let mut input = vec![
            // Binary signature
            0x42, 0x30, 0x5F, 0x4C,
            // Face fields
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            // Slices
            0x02, 0x00, 0x00, 0x00,
        ];

        for [row, col] in [first, second] {
            #[rustfmt::skip]
            let slice = [
                row, 0x00, 0x00, 0x00,
                col, 0x00, 0x00, 0x00,
                // Slice fields
                0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
                // Regions
                0x00, 0x00, 0x00, 0x00,
            ];
            input.extend_from_slice(&slice);
        }
        input
    }

    fn expected() -> SliceMap {
        SliceMap::from(BTreeMap::from([(3, BTreeSet::from([5, 7]))]))
    }

    #[test]
    fn decode_raw_indices() -> Result<()> {
        let profile = FormatProfile::builder()
            .slice_index_base(SliceIndexBase::Zero)
            .build();
        let input = two_slices([3, 5], [3, 7]);
        let size = input.len() as u64;

        let map = SliceMap::read(&mut Cursor::new(input), Some(size), &profile)?;

        assert_eq!(map, expected());
        Ok(())
    }

    #[test]
    fn decode_shifted_indices() -> Result<()> {
        let profile = FormatProfile::default();
        let input = two_slices([2, 4], [2, 6]);
        let size = input.len() as u64;

        let map = SliceMap::read(&mut Cursor::new(input), Some(size), &profile)?;

        assert_eq!(map, expected());
        assert!(map.contains(3, 5));
        assert!(!map.contains(2, 4));
        Ok(())
    }

    #[test]
    fn skip_pixel_payloads() -> Result<()> {
        let profile = FormatProfile::builder()
            .slice_index_base(SliceIndexBase::Zero)
            .build();

        #[rustfmt::skip]
        let mut input = vec![
            0x42, 0x30, 0x5F, 0x4C,
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x01, 0x00, 0x00, 0x00,
            // Row, col
            0x01, 0x00, 0x00, 0x00,
            0x02, 0x00, 0x00, 0x00,
            0xAA, 0xAA, 0xAA, 0xAA, 0xAA, 0xAA, 0xAA, 0xAA,
            // One region
            0x01, 0x00, 0x00, 0x00,
            0xBB, 0xBB, 0xBB, 0xBB, 0xBB, 0xBB, 0xBB, 0xBB, 0xBB, 0xBB,
            0xBB, 0xBB, 0xBB, 0xBB, 0xBB, 0xBB, 0xBB, 0xBB, 0xBB, 0xBB,
            // One group
            0x01, 0x00, 0x00, 0x00,
            0xCC, 0xCC, 0xCC, 0xCC,
            // Two subgroups of 1 and 3 pixels
            0x02, 0x00, 0x00, 0x00,
            0x01, 0x00, 0x00, 0x00,
            0xDD, 0xDD,
            0x03, 0x00, 0x00, 0x00,
            0xEE, 0xEE, 0xEE, 0xEE, 0xEE, 0xEE,
        ];
        let size = input.len() as u64;
        input.extend_from_slice(&[0xFF; 4]);

        let mut reader = Cursor::new(input);
        let map = SliceMap::read(&mut reader, Some(size), &profile)?;

        assert_eq!(reader.position(), size);
        assert!(map.contains(1, 2));
        Ok(())
    }

    #[test]
    fn oversized_declaration_is_rejected() {
        let profile = FormatProfile::default();
        let input = two_slices([0, 0], [0, 1]);
        let size = input.len() as u64 + 4;

        let result = SliceMap::read(&mut Cursor::new(input), Some(size), &profile);

        assert!(matches!(result, Err(Error::ReadPastEnd { .. })));
    }

    #[test]
    fn sized_mask_carries_signature() -> Result<()> {
        let profile = FormatProfile::default();

        #[rustfmt::skip]
        let input = vec![
            // Binary signature
            0x42, 0x30, 0x5F, 0x4C,
            // Face fields
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            // One slice at row 3, col 5
            0x01, 0x00, 0x00, 0x00,
            0x03, 0x00, 0x00, 0x00,
            0x05, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00,
        ];
        assert_eq!(input.len(), 48);

        let map = SliceMap::read(&mut Cursor::new(input), Some(48), &profile)?;

        assert_eq!(map, SliceMap::from(BTreeMap::from([(4, BTreeSet::from([6]))])));
        Ok(())
    }

    #[test]
    fn unsized_mask_has_no_signature() -> Result<()> {
        let profile = FormatProfile::builder()
            .slice_index_base(SliceIndexBase::Zero)
            .build();
        let input = two_slices([3, 5], [3, 7]);

        let map = SliceMap::read(&mut Cursor::new(&input[4..]), None, &profile)?;

        assert_eq!(map, expected());
        Ok(())
    }

    #[test]
    fn wrong_signature_is_invalid() {
        let profile = FormatProfile::default();
        let mut input = two_slices([3, 5], [3, 7]);
        input[0] = 0x00;
        let size = input.len() as u64;

        let result = SliceMap::read(&mut Cursor::new(input), Some(size), &profile);

        assert!(matches!(result, Err(Error::InvalidFormat(_))));
    }

    #[test]
    fn first_face_wins() {
        let mut masks = MaskMap::default();

        assert!(masks.insert_first(Face::Top, expected()));
        assert!(!masks.insert_first(Face::Top, SliceMap::default()));
        assert!(masks.contains(Face::Top, 3, 7));
        assert!(!masks.contains(Face::Back, 3, 7));
    }
}
