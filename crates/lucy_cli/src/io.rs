//! Image file decode/encode for the command-line front end.

use std::path::Path;

use anyhow::{Context, Result};
use image::{DynamicImage, GrayImage, RgbImage};
use lucy_core::{normalize, Image};

/// Channel selection applied when decoding, following the classic loader flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadMode {
    /// `mode < 0`: keep channels and bit depth (alpha is dropped).
    Unchanged,
    /// `mode == 0`: convert to 8-bit intensity.
    Grayscale,
    /// `mode > 0`: convert to 8-bit, three-channel color.
    Color,
}

impl From<i32> for LoadMode {
    fn from(mode: i32) -> Self {
        match mode {
            m if m < 0 => LoadMode::Unchanged,
            0 => LoadMode::Grayscale,
            _ => LoadMode::Color,
        }
    }
}

fn samples<T: Into<f64> + Copy>(raw: &[T]) -> Vec<f64> {
    raw.iter().map(|&v| v.into()).collect()
}

/// Convert a decoded image to `f64` samples in the source's native range.
pub fn to_image(decoded: &DynamicImage, mode: LoadMode) -> Result<Image<f64>> {
    let (width, height) = (decoded.width() as usize, decoded.height() as usize);
    let color = decoded.color();
    let bits = color.bytes_per_pixel() as usize * 8 / color.channel_count() as usize;

    let (channels, data) = match mode {
        LoadMode::Grayscale => (1, samples(decoded.to_luma8().as_raw())),
        LoadMode::Color => (3, samples(decoded.to_rgb8().as_raw())),
        LoadMode::Unchanged => match (color.has_color(), bits) {
            (true, 8) => (3, samples(decoded.to_rgb8().as_raw())),
            (true, 16) => (3, samples(decoded.to_rgb16().as_raw())),
            (true, _) => (3, samples(decoded.to_rgb32f().as_raw())),
            (false, 8) => (1, samples(decoded.to_luma8().as_raw())),
            (false, 16) => (1, samples(decoded.to_luma16().as_raw())),
            (false, _) => (1, samples(decoded.to_luma32f().as_raw())),
        },
    };

    Image::from_vec(width, height, channels, data).context("decoded buffer has unexpected size")
}

/// Decode `path` into a floating-point image.
pub fn load_image(path: &Path, mode: LoadMode) -> Result<Image<f64>> {
    let decoded =
        image::open(path).with_context(|| format!("failed to read image {}", path.display()))?;
    log::info!(
        "loaded {} ({}x{}, {:?}, mode {:?})",
        path.display(),
        decoded.width(),
        decoded.height(),
        decoded.color(),
        mode
    );
    to_image(&decoded, mode)
}

/// Quantize `[0, 1]` samples to 8-bit.
fn quantize(image: &Image<f64>) -> Vec<u8> {
    image
        .view()
        .iter()
        .map(|&v| (v * 255.0).round().clamp(0.0, 255.0) as u8)
        .collect()
}

/// Write an image that is already normalized to `[0, 1]`.
pub fn save_normalized(image: &Image<f64>, path: &Path) -> Result<()> {
    let (width, height) = (image.width() as u32, image.height() as u32);
    let raw = quantize(image);

    let result = match image.channels() {
        1 => GrayImage::from_raw(width, height, raw)
            .context("gray buffer size mismatch")?
            .save(path),
        _ => RgbImage::from_raw(width, height, raw)
            .context("rgb buffer size mismatch")?
            .save(path),
    };
    result.with_context(|| format!("failed to write {}", path.display()))?;
    log::debug!("wrote {}", path.display());
    Ok(())
}

/// Min-max normalize, then write.
pub fn save_for_display(image: &Image<f64>, path: &Path) -> Result<()> {
    save_normalized(&normalize(image), path)
}
