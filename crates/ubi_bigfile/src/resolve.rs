//! Cross references between texture boxes, water records and their masks.
//!
//! Texture boxes found under the `cube` directories declare layer files and the sets
//! taking part in them. Water records found under the `water` directories bind an atlas
//! name to mask files. Joining both on the atlas name tells which slices of a layer are
//! blended water overlays. The resolved layers are then attached by key to the files
//! holding them.
//!
//! Resolution is an optional enhancement. Entries that cannot be parsed contribute
//! nothing and are only logged.

use indexmap::{IndexMap, IndexSet};
use std::io::{Read, Seek};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::error::{Error, Lookup, Result};
use crate::guard::read_at;
use crate::path::Path;
use crate::profile::FormatProfile;
use crate::read::{BigFile, Directory, File};
use crate::resource::{Resource, ResourceBody};
use crate::rle::{MaskMap, SliceMap};

/// What is known about one layer file
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Layer {
    /// Name of the texture box that declared the layer
    pub atlas: Option<String>,
    /// Whether the layer is a mask
    pub mask: bool,
    /// Directories of the layer file that take part in the layer
    pub sets: IndexSet<String>,
    /// Blended slices per face
    pub masks: MaskMap,
}

/// Layer file path -> layer
pub type LayerMap = IndexMap<String, Arc<Layer>>;

/// Atlas name -> mask file paths
pub type WaterMap = IndexMap<String, IndexSet<String>>;

/// Outcome of resolving a big file
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Resolution {
    pub layers: Arc<LayerMap>,
}

impl Resolution {
    /// Resolve the layers of `big_file` and attach them to the files holding them
    #[instrument(skip_all, err)]
    pub fn resolve<R: Read + Seek>(
        reader: &mut R,
        profile: &FormatProfile,
        big_file: &mut BigFile,
    ) -> Result<Resolution> {
        let resolution = Resolution::build(reader, profile, big_file)?;
        resolution.attach(big_file);
        Ok(resolution)
    }

    /// Resolve the layers of `big_file` without touching it
    pub fn build<R: Read + Seek>(
        reader: &mut R,
        profile: &FormatProfile,
        big_file: &BigFile,
    ) -> Result<Resolution> {
        let mut layers = IndexMap::new();
        for directory in scanned(&big_file.root, &profile.cube_directory) {
            for file in directory.binaries() {
                let Some(resource) = parse_isolated(reader, profile, big_file, file)? else {
                    continue;
                };

                let ResourceBody::TextureBox(texture_box) = resource.body else {
                    continue;
                };

                let Some(layer_file) = texture_box.layer_file else {
                    continue;
                };

                let layer: &mut Layer = layers.entry(layer_file).or_default();
                layer.atlas = resource.header.name;
                layer.mask = texture_box.is_mask;
                layer.sets.extend(texture_box.sets);
            }
        }

        if layers.is_empty() {
            debug!("no layers");
            return Ok(Resolution::default());
        }

        let mut water = WaterMap::new();
        for directory in scanned(&big_file.root, &profile.water_directory) {
            for file in directory.binaries() {
                let Some(resource) = parse_isolated(reader, profile, big_file, file)? else {
                    continue;
                };

                if let ResourceBody::Water(body) = resource.body {
                    if let Some(atlas) = body.atlas {
                        water.entry(atlas).or_default().extend(body.mask_paths);
                    }
                }
            }
        }

        for layer in layers.values_mut() {
            let Some(mask_paths) = layer.atlas.as_ref().and_then(|atlas| water.get(atlas)) else {
                continue;
            };

            for mask_path in mask_paths {
                decode_masks(reader, profile, big_file, mask_path, &mut layer.masks)?;
            }
        }

        debug!(layers = layers.len(), atlases = water.len(), "resolved");
        Ok(Resolution {
            layers: Arc::new(
                layers
                    .into_iter()
                    .map(|(key, layer)| (key, Arc::new(layer)))
                    .collect(),
            ),
        })
    }

    /// Set the layer key of every file holding a resolved layer
    pub fn attach(&self, big_file: &mut BigFile) {
        for key in self.layers.keys() {
            match big_file.root.find_mut(&Path::from(key.as_str())) {
                Lookup::Found(file) => file.layer = Some(key.clone()),
                Lookup::NotFound => warn!(%key, "layer file not found"),
            }
        }
    }

    /// Layer stored under `key`
    pub fn layer(&self, key: &str) -> Option<&Arc<Layer>> {
        self.layers.get(key)
    }

    /// Layer held by `file`, if the resolver attached one
    pub fn layer_of(&self, file: &File) -> Option<(&str, &Arc<Layer>)> {
        let key = file.layer.as_deref()?;
        self.layers
            .get_key_value(key)
            .map(|(key, layer)| (key.as_str(), layer))
    }
}

/// Directories named `name` directly below `root`, followed by their children
fn scanned<'a>(root: &'a Directory, name: &'a str) -> impl Iterator<Item = &'a Directory> {
    root.directories
        .iter()
        .filter(move |directory| directory.name.as_deref() == Some(name))
        .flat_map(|directory| std::iter::once(directory).chain(directory.directories.iter()))
}

fn isolate<T>(result: Result<T>, what: &str) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(error) if error.is_recoverable() => {
            warn!(%error, "skipping {what}");
            Ok(None)
        }
        Err(error) => Err(error),
    }
}

fn parse_isolated<R: Read + Seek>(
    reader: &mut R,
    profile: &FormatProfile,
    big_file: &BigFile,
    file: &File,
) -> Result<Option<Resource>> {
    let name = file.name.as_deref().unwrap_or_default();
    let result = read_at(reader, big_file.position_of(file), |reader| {
        Resource::read(reader, Some(file.size as u64), profile)
    })
    .map_err(|error| error.in_file(name));

    Ok(isolate(result, "resource")?.flatten())
}

fn decode_masks<R: Read + Seek>(
    reader: &mut R,
    profile: &FormatProfile,
    big_file: &BigFile,
    mask_path: &str,
    masks: &mut MaskMap,
) -> Result<()> {
    let Lookup::Found(mask_file) = big_file.find(&Path::from(mask_path)) else {
        warn!(mask_path, "mask file not found");
        return Ok(());
    };

    let nested = big_file
        .read_nested(reader, profile, mask_file)
        .map_err(|error: Error| error.in_file(mask_path));
    let Some(nested) = isolate(nested, "mask archive")? else {
        return Ok(());
    };

    for file in nested.root.ordinary() {
        let Some(face) = file
            .name
            .as_deref()
            .and_then(|name| profile.mask_faces.get(name))
        else {
            continue;
        };

        if masks.contains_key(face) {
            continue;
        }

        let slices = read_at(reader, nested.position_of(file), |reader| {
            SliceMap::read(reader, Some(file.size as u64), profile)
        })
        .map_err(|error| error.in_file(format!("{mask_path}/{}", face)));

        if let Some(slices) = isolate(slices, "mask")? {
            masks.insert_first(*face, slices);
        }
    }

    Ok(())
}
