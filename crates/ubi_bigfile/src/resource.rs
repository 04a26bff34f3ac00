//! Versioned resource records embedded inside `.bin` entries.
//!
//! A binary entry holds a `B0_L` signature, a [`ResourceHeader`] and a body whose layout
//! depends on the identity code of the header. Nested records have no signature and no
//! declared size, they are bounded by the record that contains them.
//!
//! ```no_run
//! use std::io::Cursor;
//! use ubi_bigfile::profile::FormatProfile;
//! use ubi_bigfile::resource::{Resource, ResourceBody};
//!
//! # fn doit(bytes: Vec<u8>) -> ubi_bigfile::error::Result<()> {
//! let size = bytes.len() as u64;
//! let profile = FormatProfile::default();
//!
//! if let Some(resource) = Resource::read(&mut Cursor::new(bytes), Some(size), &profile)? {
//!     if let ResourceBody::TextureBox(texture_box) = resource.body {
//!         println!("layer file {:?}", texture_box.layer_file);
//!     }
//! }
//! # Ok(())
//! # }
//! ```

use binrw::BinRead;
use byteorder::{LittleEndian, ReadBytesExt};
use indexmap::IndexSet;
use std::io::{Read, Seek, SeekFrom};
use tracing::{debug, instrument, trace};

use crate::error::{Error, Result};
use crate::guard::{read_bounded, skip};
use crate::profile::{FormatProfile, ResourceSpec, WaterFieldOrder};
use crate::string::{read_optional, read_optional_encrypted};
use crate::types::ResourceHeader;

/// A parsed resource record
#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    pub header: ResourceHeader,
    pub body: ResourceBody,
}

/// Variant specific contents of a record
#[derive(Debug, Clone, PartialEq)]
pub enum ResourceBody {
    TextureBox(TextureBox),
    Water(Water),
    StateData(StateData),
    InteractiveOffsetProvider,
    TextureAlignedOffsetProvider,
}

/// Texture atlas declaring a layer file and the sets that belong to it
#[derive(Debug, Default, Clone, PartialEq)]
pub struct TextureBox {
    /// Archive path of the nested big file holding the layer textures
    pub layer_file: Option<String>,
    /// Whether the layer is a mask rather than a texture
    pub is_mask: bool,
    /// Names of the directories of the layer file that take part in the layer
    pub sets: IndexSet<String>,
    /// Number of states, their aliases are not retained
    pub states: u32,
}

/// Blended water overlay
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Water {
    pub resource_name: Option<String>,
    /// Atlas the overlay binds to, if any
    pub atlas: Option<String>,
    /// Archive paths of the masks describing the blended slices of the atlas
    pub mask_paths: IndexSet<String>,
    /// Nested records that were recognised
    pub resources: Vec<Resource>,
}

/// State machine data, carries the mask used by a water state
#[derive(Debug, Default, Clone, PartialEq)]
pub struct StateData {
    pub mask_path: Option<String>,
    pub resources: Vec<Resource>,
}

/// Read the binary signature that precedes every sized binary payload
pub fn read_binary_signature<R: Read>(reader: &mut R, profile: &FormatProfile) -> Result<()> {
    let signature = reader.read_u32::<LittleEndian>()?;
    if signature != profile.binary_signature {
        return Err(Error::InvalidFormat(format!(
            "binary signature {signature:#010X} is not {:#010X}",
            profile.binary_signature
        )));
    }
    Ok(())
}

impl Resource {
    /// Name of the record
    pub fn name(&self) -> Option<&str> {
        self.header.name.as_deref()
    }

    /// Parse a record starting at the current position.
    ///
    /// With a declared `size` the record must begin with the binary signature and
    /// consume exactly `size` bytes. Returns `None` for identity codes the profile
    /// does not know.
    #[instrument(skip(reader, profile), err)]
    pub fn read<R: Read + Seek>(
        reader: &mut R,
        size: Option<u64>,
        profile: &FormatProfile,
    ) -> Result<Option<Resource>> {
        let start = reader.stream_position()?;

        read_bounded(reader, size, |reader| {
            if size.is_some() {
                read_binary_signature(reader, profile)?;
            }

            let header = ResourceHeader::read(reader)?;
            let table = &profile.resources;

            let body = match header.id {
                id if id == table.texture_box.id => {
                    check_version(&header, table.texture_box)?;
                    ResourceBody::TextureBox(TextureBox::read(reader, profile)?)
                }
                id if id == table.water.id => {
                    check_version(&header, table.water)?;
                    ResourceBody::Water(Water::read(reader, profile)?)
                }
                id if id == table.state_data.id => {
                    check_version(&header, table.state_data)?;
                    ResourceBody::StateData(StateData::read(reader, profile)?)
                }
                id if id == table.interactive_offset_provider.id => {
                    check_version(&header, table.interactive_offset_provider)?;
                    skip(reader, profile.fields.interactive_offset_provider)?;
                    ResourceBody::InteractiveOffsetProvider
                }
                id if id == table.texture_aligned_offset_provider.id => {
                    check_version(&header, table.texture_aligned_offset_provider)?;
                    skip(reader, profile.fields.texture_aligned_offset_provider)?;
                    ResourceBody::TextureAlignedOffsetProvider
                }
                id => {
                    debug!(id = format_args!("{id:#010X}"), "unknown resource");
                    if let Some(size) = size {
                        reader.seek(SeekFrom::Start(start + size))?;
                    }
                    return Ok(None);
                }
            };

            trace!(name = ?header.name, "read resource");
            Ok(Some(Resource { header, body }))
        })
    }

    fn read_nested<R: Read + Seek>(
        reader: &mut R,
        count: u32,
        profile: &FormatProfile,
    ) -> Result<Vec<Resource>> {
        let mut resources = Vec::new();
        for _ in 0..count {
            if let Some(resource) = Resource::read(reader, None, profile)? {
                resources.push(resource);
            }
        }
        Ok(resources)
    }
}

fn check_version(header: &ResourceHeader, spec: ResourceSpec) -> Result<()> {
    if header.version < spec.version {
        return Err(Error::UnsupportedVersion {
            id: header.id,
            version: header.version,
            expected: spec.version,
        });
    }
    Ok(())
}

fn skip_aliases<R: Read>(reader: &mut R) -> Result<u32> {
    let aliases = reader.read_u32::<LittleEndian>()?;
    for _ in 0..aliases {
        read_optional(reader)?;
    }
    Ok(aliases)
}

impl TextureBox {
    fn read<R: Read + Seek>(reader: &mut R, profile: &FormatProfile) -> Result<TextureBox> {
        let fields = profile.fields;
        let mut texture_box = TextureBox {
            layer_file: read_optional_encrypted(reader)?,
            ..Default::default()
        };

        if texture_box.layer_file.is_some() {
            skip(reader, fields.atlas_layer)?;
            texture_box.is_mask = reader.read_u8()? != 0;
            skip(reader, fields.atlas_layer_trailer)?;
        } else {
            skip(reader, fields.atlas_no_layer)?;
        }

        let sets = reader.read_u32::<LittleEndian>()?;
        for _ in 0..sets {
            if let Some(set) = read_optional_encrypted(reader)? {
                texture_box.sets.insert(set);
            }
        }

        texture_box.states = reader.read_u32::<LittleEndian>()?;
        for _ in 0..texture_box.states {
            skip(reader, fields.atlas_state)?;
            skip_aliases(reader)?;
        }

        Ok(texture_box)
    }
}

impl Water {
    fn read<R: Read + Seek>(reader: &mut R, profile: &FormatProfile) -> Result<Water> {
        let resource_name = read_optional_encrypted(reader)?;

        let resources = match profile.water_field_order {
            WaterFieldOrder::NameFieldsCount => {
                skip(reader, profile.fields.water)?;
                reader.read_u32::<LittleEndian>()?
            }
            WaterFieldOrder::NameCountFields => {
                let resources = reader.read_u32::<LittleEndian>()?;
                skip(reader, profile.fields.water)?;
                resources
            }
        };

        let atlas = resource_name
            .as_deref()
            .and_then(|name| profile.water_atlas(name))
            .map(str::to_owned);

        let resources = Resource::read_nested(reader, resources, profile)?;

        let mut mask_paths = IndexSet::new();
        if atlas.is_some() {
            for resource in &resources {
                if let ResourceBody::StateData(StateData {
                    mask_path: Some(mask_path),
                    ..
                }) = &resource.body
                {
                    mask_paths.insert(mask_path.clone());
                }
            }
        }

        Ok(Water {
            resource_name,
            atlas,
            mask_paths,
            resources,
        })
    }
}

impl StateData {
    fn read<R: Read + Seek>(reader: &mut R, profile: &FormatProfile) -> Result<StateData> {
        skip_aliases(reader)?;
        skip(reader, profile.fields.state_refresh_rate)?;

        let mask_path = read_optional_encrypted(reader)?;

        let resources = reader.read_u32::<LittleEndian>()?;
        let resources = Resource::read_nested(reader, resources, profile)?;

        skip(reader, profile.fields.state_trailer)?;

        Ok(StateData {
            mask_path,
            resources,
        })
    }
}
