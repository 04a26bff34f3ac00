//! Versioned configuration describing one snapshot of the M4B and resource formats.
//!
//! Every fixed table the parsers need (signatures, identity codes, field block
//! lengths, extension classification, face names) lives in a [`FormatProfile`]. A
//! profile is built once and passed by reference to every parser, so supporting a
//! second snapshot of the format only takes a different profile value.
//!
//! ```
//! use ubi_bigfile::profile::{FormatProfile, SliceIndexBase};
//!
//! let profile = FormatProfile::builder()
//!     .slice_index_base(SliceIndexBase::Zero)
//!     .build();
//!
//! assert_eq!(profile.signature, "UBI_BF_SIG");
//! ```

use bon::Builder;
use indexmap::IndexMap;

use crate::types::{Face, FileKind, CURRENT_VERSION, SIGNATURE};

/// Identity code and minimum version of one resource variant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceSpec {
    /// Code found in the resource header
    pub id: u32,
    /// Oldest version the parser understands
    pub version: u32,
}

impl ResourceSpec {
    const fn fourcc(code: &[u8; 4], version: u32) -> Self {
        Self {
            id: u32::from_le_bytes(*code),
            version,
        }
    }
}

/// Identity code table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceTable {
    pub texture_box: ResourceSpec,
    pub water: ResourceSpec,
    pub state_data: ResourceSpec,
    pub interactive_offset_provider: ResourceSpec,
    pub texture_aligned_offset_provider: ResourceSpec,
}

impl Default for ResourceTable {
    fn default() -> Self {
        Self {
            texture_box: ResourceSpec::fourcc(b"TBOX", 1),
            water: ResourceSpec::fourcc(b"WATR", 1),
            state_data: ResourceSpec::fourcc(b"STDT", 1),
            interactive_offset_provider: ResourceSpec::fourcc(b"IOFP", 1),
            texture_aligned_offset_provider: ResourceSpec::fourcc(b"TAOP", 1),
        }
    }
}

/// Lengths of the uninterpreted field blocks skipped inside resource records
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSizes {
    /// Texture box fields following a present layer file name
    pub atlas_layer: u64,
    /// Texture box fields following the mask flag
    pub atlas_layer_trailer: u64,
    /// Texture box fields replacing the layer block when no layer file is named
    pub atlas_no_layer: u64,
    /// Fields of every texture box state
    pub atlas_state: u64,
    /// Reflection alpha fields of a water record
    pub water: u64,
    /// Refresh rate of a state data record
    pub state_refresh_rate: u64,
    /// Trailing fields of a state data record
    pub state_trailer: u64,
    pub interactive_offset_provider: u64,
    pub texture_aligned_offset_provider: u64,
}

impl Default for FieldSizes {
    fn default() -> Self {
        Self {
            atlas_layer: 17,
            atlas_layer_trailer: 4,
            atlas_no_layer: 22,
            atlas_state: 4,
            water: 9,
            state_refresh_rate: 4,
            state_trailer: 6,
            interactive_offset_provider: 33,
            texture_aligned_offset_provider: 65,
        }
    }
}

/// Lengths of the descriptor blocks skipped by the RLE mask decoder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RleSizes {
    /// Type, width, height, slice width, slice height
    pub face: u64,
    /// Slice width and height
    pub slice: u64,
    /// Texture coordinates in face and slice, region size
    pub region: u64,
    pub group: u64,
}

impl Default for RleSizes {
    fn default() -> Self {
        Self {
            face: 20,
            slice: 8,
            region: 20,
            group: 4,
        }
    }
}

/// Order of the fields following the name of a water record
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum WaterFieldOrder {
    /// Name, reflection fields, resource count
    #[default]
    NameFieldsCount,
    /// Name, resource count, reflection fields
    NameCountFields,
}

/// Base applied to the slice rows and columns stored in RLE masks
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum SliceIndexBase {
    /// Stored indices are shifted by one so they match face image names
    #[default]
    One,
    /// Stored indices are kept as they are
    Zero,
}

impl SliceIndexBase {
    /// Apply the base to a stored index
    pub fn apply(self, index: u32) -> u32 {
        match self {
            SliceIndexBase::One => index.wrapping_add(1),
            SliceIndexBase::Zero => index,
        }
    }
}

/// One row of the extension table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionRule {
    /// Extension without the leading period
    pub extension: String,
    /// Classification given to matching files
    pub kind: FileKind,
    /// Whether the extension must match case sensitively
    pub case_sensitive: bool,
    /// Extension the file gets once converted, if it is converted
    pub converted: Option<String>,
}

impl ExtensionRule {
    fn new(extension: &str, kind: FileKind, case_sensitive: bool, converted: Option<&str>) -> Self {
        Self {
            extension: extension.into(),
            kind,
            case_sensitive,
            converted: converted.map(Into::into),
        }
    }

    /// Whether `extension` selects this rule
    pub fn matches(&self, extension: &str) -> bool {
        if self.case_sensitive {
            self.extension == extension
        } else {
            self.extension.eq_ignore_ascii_case(extension)
        }
    }
}

/// Everything format specific the parsers, the resolver and the writer depend on
#[derive(Debug, Clone, Builder)]
pub struct FormatProfile {
    /// Archive signature, compared exactly and case sensitively
    #[builder(default = SIGNATURE.to_owned(), into)]
    pub signature: String,

    /// Archive version, compared exactly
    #[builder(default = CURRENT_VERSION)]
    pub version: u32,

    /// Signature heading every binary payload that declares its size
    #[builder(default = u32::from_le_bytes(*b"B0_L"))]
    pub binary_signature: u32,

    #[builder(default)]
    pub resources: ResourceTable,

    #[builder(default)]
    pub fields: FieldSizes,

    #[builder(default)]
    pub rle: RleSizes,

    #[builder(default)]
    pub water_field_order: WaterFieldOrder,

    #[builder(default)]
    pub slice_index_base: SliceIndexBase,

    /// Extension table, checked in order
    #[builder(default = default_extensions())]
    pub extensions: Vec<ExtensionRule>,

    /// Name of a file inside a mask archive -> face it describes
    #[builder(default = default_mask_faces())]
    pub mask_faces: IndexMap<String, Face>,

    /// Prefix of a face image name -> face it shows
    #[builder(default = default_slice_faces())]
    pub slice_faces: IndexMap<String, Face>,

    /// Top level directory holding texture boxes
    #[builder(default = "cube".to_owned(), into)]
    pub cube_directory: String,

    /// Top level directory holding water records
    #[builder(default = "water".to_owned(), into)]
    pub water_directory: String,

    /// Root directory name of an archive holding layer textures
    #[builder(default = "bftex".to_owned(), into)]
    pub layer_directory: String,

    /// Water contexts that never bind to an atlas
    #[builder(default = vec!["global".to_owned(), "shared".to_owned()])]
    pub shared_contexts: Vec<String>,
}

impl Default for FormatProfile {
    fn default() -> Self {
        Self::builder().build()
    }
}

const FACES: [Face; 6] = [
    Face::Back,
    Face::Bottom,
    Face::Front,
    Face::Left,
    Face::Right,
    Face::Top,
];

fn default_extensions() -> Vec<ExtensionRule> {
    vec![
        ExtensionRule::new("m4b", FileKind::BigFile, false, None),
        ExtensionRule::new("bin", FileKind::Binary, true, None),
        ExtensionRule::new("png", FileKind::ImageStandard, false, Some("dds")),
        ExtensionRule::new("jpg", FileKind::ImageStandard, false, Some("dds")),
        ExtensionRule::new("jtif", FileKind::ImageStandard, false, Some("dds")),
        ExtensionRule::new("zap", FileKind::ImageZap, false, Some("dds")),
    ]
}

fn default_mask_faces() -> IndexMap<String, Face> {
    FACES
        .iter()
        .map(|face| (format!("{face}.rle"), *face))
        .collect()
}

fn default_slice_faces() -> IndexMap<String, Face> {
    FACES.iter().map(|face| (face.to_string(), *face)).collect()
}

/// Extension of `name`, the text after its last period
pub fn extension(name: &str) -> Option<&str> {
    name.rsplit_once('.').map(|(_, extension)| extension)
}

impl FormatProfile {
    /// Find the extension rule classifying `name`
    pub fn rule(&self, name: &str) -> Option<&ExtensionRule> {
        let extension = extension(name)?;
        self.extensions.iter().find(|rule| rule.matches(extension))
    }

    /// Classify a file by the extension of its name
    pub fn classify(&self, name: Option<&str>) -> FileKind {
        name.and_then(|name| self.rule(name))
            .map_or(FileKind::None, |rule| rule.kind)
    }

    /// Name a file gets once converted, if its kind is converted at all
    pub fn converted_name(&self, name: &str) -> Option<String> {
        let rule = self.rule(name)?;
        let target = rule.converted.as_deref()?;
        let (stem, _) = name.rsplit_once('.')?;
        Some(format!("{stem}.{target}"))
    }

    /// Atlas bound by a water record name, the text after its first period.
    ///
    /// Names without a period or within a shared context bind nothing.
    pub fn water_atlas<'a>(&self, name: &'a str) -> Option<&'a str> {
        let (context, atlas) = name.split_once('.')?;
        if self.shared_contexts.iter().any(|shared| shared == context) {
            return None;
        }
        Some(atlas)
    }
}
