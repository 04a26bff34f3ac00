//! Conversion of the images of a big file through an external image codec.
//!
//! The codec itself lives outside this crate. [`ConvertConsumer`] only decides what
//! happens to each file: images are loaded, fitted into the configured texture bounds
//! and saved under their converted names, everything else is written unchanged.

use bon::Builder;
use std::sync::Arc;
use tracing::debug;
use ubi_bigfile::layout::{is_layer_mask, output_name};
use ubi_bigfile::profile::{extension, FormatProfile};

use crate::consume::Output;
use crate::error::Result;
use crate::pool::FileConsumer;
use crate::task::FileTask;

/// What a codec reports about encoded image data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageInfo {
    pub bits_per_pixel: u32,
    pub has_alpha: bool,
    pub width: u32,
    pub height: u32,
}

/// Decoded pixels
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawImage {
    pub width: u32,
    pub height: u32,
    pub has_alpha: bool,
    pub pixels: Vec<u8>,
}

/// Image codec service
pub trait ImageCodec: Sync {
    fn info(&self, data: &[u8], extension: &str) -> Result<ImageInfo>;

    fn load(&self, data: &[u8], extension: &str) -> Result<RawImage>;

    fn resize(&self, image: &RawImage, width: u32, height: u32) -> Result<RawImage>;

    fn save(&self, image: &RawImage, extension: &str, quality: u8) -> Result<Vec<u8>>;
}

/// Texture bounds converted images are fitted into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Builder)]
pub struct ConvertConfiguration {
    #[builder(default = 1)]
    pub min_texture_width: u32,
    #[builder(default = 2048)]
    pub max_texture_width: u32,
    #[builder(default = 1)]
    pub min_texture_height: u32,
    #[builder(default = 2048)]
    pub max_texture_height: u32,
    /// Quality handed to the codec when saving
    #[builder(default = 90)]
    pub quality: u8,
}

impl Default for ConvertConfiguration {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Largest power of two not above `extent`, then halved or doubled into `min..=max`
fn fit_extent(extent: u32, min: u32, max: u32) -> u32 {
    let mut fitted = match extent {
        0 => 1,
        extent => 1 << (u32::BITS - 1 - extent.leading_zeros()),
    };

    while fitted > max && fitted > 1 {
        fitted >>= 1;
    }
    while fitted < min && fitted < 1 << (u32::BITS - 1) {
        fitted <<= 1;
    }
    fitted
}

impl ConvertConfiguration {
    /// Size an image of `width` by `height` is converted to
    pub fn fit(&self, width: u32, height: u32) -> (u32, u32) {
        (
            fit_extent(width, self.min_texture_width, self.max_texture_width),
            fit_extent(height, self.min_texture_height, self.max_texture_height),
        )
    }
}

/// Converts the images of every task, writing the results to an [`Output`]
pub struct ConvertConsumer<C, O> {
    pub codec: C,
    pub output: O,
    pub profile: Arc<FormatProfile>,
    pub configuration: ConvertConfiguration,
}

/// `path` with its file name replaced by `name`
fn renamed(path: &str, name: &str) -> String {
    match path.rsplit_once('/') {
        Some((directory, _)) => format!("{directory}/{name}"),
        None => name.to_owned(),
    }
}

impl<C: ImageCodec, O: Output> FileConsumer for ConvertConsumer<C, O> {
    fn consume(&self, task: &FileTask) -> Result<()> {
        let file = task.file();
        let data = task.read_to_end()?;

        if !file.kind.is_image() || is_layer_mask(file) {
            return self.output.write(task.path(), &data);
        }

        let name = file.name.as_deref().unwrap_or_default();
        let source = extension(name).unwrap_or_default();
        let target_name = output_name(file, &self.profile).unwrap_or_else(|| name.to_owned());
        let target = extension(&target_name).unwrap_or_default();

        let info = self.codec.info(&data, source)?;
        let mut image = self.codec.load(&data, source)?;

        let (width, height) = self.configuration.fit(info.width, info.height);
        if (width, height) != (image.width, image.height) {
            image = self.codec.resize(&image, width, height)?;
        }

        let blended = file.membership.as_ref().is_some_and(|m| m.blended);
        image.has_alpha = info.has_alpha || blended;

        debug!(
            path = task.path(),
            width, height, alpha = image.has_alpha, "converting"
        );
        let converted = self
            .codec
            .save(&image, target, self.configuration.quality)?;
        self.output.write(&renamed(task.path(), &target_name), &converted)
    }
}
