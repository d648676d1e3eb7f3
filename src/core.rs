use std::sync::Arc;

use anyhow::Context as _;

use crate::error::{PixelwaveError, PixelwaveResult};

/// Horizontal gravity: which edge absorbs the crop overflow on the x axis.
///
/// Only two positions per axis exist; there is no "center".
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HorizontalGravity {
    Left,
    #[default]
    Right,
}

/// Vertical gravity: which edge absorbs the crop overflow on the y axis.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerticalGravity {
    Top,
    #[default]
    Bottom,
}

/// Block sizing for the pixelation overlay.
///
/// A block occupies `pixel_width x pixel_height` drawable pixels plus a
/// `border_width` gutter on its right and bottom edges. One border width is
/// shared by both axes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Style {
    pub pixel_width: u32,
    pub pixel_height: u32,
    pub border_width: u32,
}

impl Default for Style {
    fn default() -> Self {
        Self {
            pixel_width: 30,
            pixel_height: 30,
            border_width: 0,
        }
    }
}

impl Style {
    /// Block pitch on the x axis (block plus gutter).
    pub fn pitch_x(self) -> u32 {
        self.pixel_width + self.border_width
    }

    /// Block pitch on the y axis.
    pub fn pitch_y(self) -> u32 {
        self.pixel_height + self.border_width
    }
}

/// A decoded still image, straight (non-premultiplied) RGBA8, row-major.
///
/// Immutable for the lifetime of the renderer; cheap to clone.
#[derive(Clone, Debug)]
pub struct SourceImage {
    width: u32,
    height: u32,
    rgba8: Arc<Vec<u8>>,
}

impl SourceImage {
    /// Wrap an already-decoded RGBA8 buffer.
    pub fn from_rgba8(width: u32, height: u32, rgba8: Vec<u8>) -> PixelwaveResult<Self> {
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|px| px.checked_mul(4))
            .ok_or_else(|| PixelwaveError::setup("source dimensions overflow"))?;
        if rgba8.len() != expected {
            return Err(PixelwaveError::setup(format!(
                "source buffer is {} bytes, expected {} for {}x{} rgba8",
                rgba8.len(),
                expected,
                width,
                height
            )));
        }
        Ok(Self {
            width,
            height,
            rgba8: Arc::new(rgba8),
        })
    }

    /// Decode an encoded image (PNG, JPEG, ...) from memory.
    pub fn decode(bytes: &[u8]) -> PixelwaveResult<Self> {
        let dyn_img = image::load_from_memory(bytes).context("decode image from memory")?;
        let rgba = dyn_img.to_rgba8();
        let (width, height) = rgba.dimensions();
        Ok(Self {
            width,
            height,
            rgba8: Arc::new(rgba.into_raw()),
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Straight RGBA8 bytes, tightly packed, row-major.
    pub fn rgba8(&self) -> &[u8] {
        &self.rgba8
    }
}

/// A rasterized frame as straight RGBA8 pixels.
#[derive(Clone, Debug)]
pub struct FrameRgba {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// RGBA8 bytes, tightly packed, row-major, straight alpha.
    pub data: Vec<u8>,
}
