use std::io::Cursor;

use anyhow::Context as _;
use rand::Rng as _;

use crate::{
    core::{FrameRgba, SourceImage},
    error::{PixelwaveError, PixelwaveResult},
};

/// Drawing surface capability consumed by the renderer.
///
/// Coordinates may fall outside the surface; drawing operations clip silently
/// the way a 2-D canvas does. `read_pixels` is strict and rejects
/// out-of-range regions.
pub trait Surface {
    fn width(&self) -> u32;
    fn height(&self) -> u32;

    /// Resize the backing raster, clearing it to transparent.
    fn resize(&mut self, width: u32, height: u32);

    /// Scale `image` to `w x h` and composite it source-over at `(x, y)`.
    fn draw_image(
        &mut self,
        image: &SourceImage,
        x: i64,
        y: i64,
        w: u32,
        h: u32,
    ) -> PixelwaveResult<()>;

    /// Read back straight RGBA8 of the given region, row-major.
    fn read_pixels(&self, x: u32, y: u32, w: u32, h: u32) -> PixelwaveResult<Vec<u8>>;

    /// Composite a flat-colored rectangle source-over. `alpha` is clamped to
    /// `[0, 1]`.
    fn fill_rect(&mut self, x: i64, y: i64, w: u32, h: u32, rgb: [u8; 3], alpha: f64);

    /// Push the current raster to whatever displays it.
    fn present(&mut self) -> PixelwaveResult<()>;

    /// Snapshot the full raster.
    fn frame(&self) -> PixelwaveResult<FrameRgba> {
        Ok(FrameRgba {
            width: self.width(),
            height: self.height(),
            data: self.read_pixels(0, 0, self.width(), self.height())?,
        })
    }
}

/// Source-over for straight (non-premultiplied) RGBA8.
fn over_straight(dst: [u8; 4], src: [u8; 4]) -> [u8; 4] {
    let sa = u32::from(src[3]);
    if sa == 255 {
        return src;
    }
    if sa == 0 {
        return dst;
    }

    let da = u32::from(dst[3]);
    let inv = 255 - sa;
    let out_a = sa + (da * inv + 127) / 255;
    if out_a == 0 {
        return [0, 0, 0, 0];
    }

    let mut out = [0u8; 4];
    for i in 0..3 {
        let sc = u32::from(src[i]) * sa;
        let dc = u32::from(dst[i]) * da * inv / 255;
        out[i] = ((sc + dc + out_a / 2) / out_a) as u8;
    }
    out[3] = out_a as u8;
    out
}

/// Cached scaled copy of a source image, keyed by source identity and target
/// size. The draw geometry is stable between re-layouts, so every frame after
/// the first reuses the scaled raster.
struct ScaledSource {
    key: (usize, u32, u32),
    image: image::RgbaImage,
}

/// Direct in-memory raster surface (the "destination is already a canvas"
/// case). `present` is a no-op.
pub struct PixmapSurface {
    pixels: image::RgbaImage,
    scaled: Option<ScaledSource>,
}

impl PixmapSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            pixels: image::RgbaImage::new(width, height),
            scaled: None,
        }
    }

    fn scaled_source(&mut self, image: &SourceImage, w: u32, h: u32) -> &image::RgbaImage {
        let key = (image.rgba8().as_ptr() as usize, w, h);
        let stale = self.scaled.as_ref().is_none_or(|s| s.key != key);
        if stale {
            let src = image::RgbaImage::from_raw(
                image.width(),
                image.height(),
                image.rgba8().to_vec(),
            )
            .expect("SourceImage guarantees a well-formed buffer");
            let resized =
                image::imageops::resize(&src, w, h, image::imageops::FilterType::Triangle);
            self.scaled = Some(ScaledSource {
                key,
                image: resized,
            });
        }
        &self.scaled.as_ref().expect("just populated").image
    }

    fn blit_over(&mut self, x: i64, y: i64) {
        let Some(scaled) = self.scaled.take() else {
            return;
        };
        let (dw, dh) = self.pixels.dimensions();
        for (sx, sy, px) in scaled.image.enumerate_pixels() {
            let tx = x + i64::from(sx);
            let ty = y + i64::from(sy);
            if tx < 0 || ty < 0 || tx >= i64::from(dw) || ty >= i64::from(dh) {
                continue;
            }
            let dst = self.pixels.get_pixel_mut(tx as u32, ty as u32);
            dst.0 = over_straight(dst.0, px.0);
        }
        self.scaled = Some(scaled);
    }
}

impl Surface for PixmapSurface {
    fn width(&self) -> u32 {
        self.pixels.width()
    }

    fn height(&self) -> u32 {
        self.pixels.height()
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.pixels = image::RgbaImage::new(width, height);
        self.scaled = None;
    }

    fn draw_image(
        &mut self,
        image: &SourceImage,
        x: i64,
        y: i64,
        w: u32,
        h: u32,
    ) -> PixelwaveResult<()> {
        if w == 0 || h == 0 {
            return Ok(());
        }
        self.scaled_source(image, w, h);
        self.blit_over(x, y);
        Ok(())
    }

    fn read_pixels(&self, x: u32, y: u32, w: u32, h: u32) -> PixelwaveResult<Vec<u8>> {
        let (sw, sh) = self.pixels.dimensions();
        if x.checked_add(w).is_none_or(|r| r > sw) || y.checked_add(h).is_none_or(|b| b > sh) {
            return Err(PixelwaveError::surface(format!(
                "read region {w}x{h}+{x}+{y} exceeds surface {sw}x{sh}"
            )));
        }
        let mut out = Vec::with_capacity((w as usize) * (h as usize) * 4);
        for row in y..y + h {
            let start = ((row as usize) * (sw as usize) + (x as usize)) * 4;
            out.extend_from_slice(&self.pixels.as_raw()[start..start + (w as usize) * 4]);
        }
        Ok(out)
    }

    fn fill_rect(&mut self, x: i64, y: i64, w: u32, h: u32, rgb: [u8; 3], alpha: f64) {
        let sa = (alpha.clamp(0.0, 1.0) * 255.0).round() as u8;
        if sa == 0 || w == 0 || h == 0 {
            return;
        }
        let src = [rgb[0], rgb[1], rgb[2], sa];

        let (sw, sh) = self.pixels.dimensions();
        let x0 = x.clamp(0, i64::from(sw)) as u32;
        let y0 = y.clamp(0, i64::from(sh)) as u32;
        let x1 = (x + i64::from(w)).clamp(0, i64::from(sw)) as u32;
        let y1 = (y + i64::from(h)).clamp(0, i64::from(sh)) as u32;

        for py in y0..y1 {
            for px in x0..x1 {
                let dst = self.pixels.get_pixel_mut(px, py);
                dst.0 = over_straight(dst.0, src);
            }
        }
    }

    fn present(&mut self) -> PixelwaveResult<()> {
        Ok(())
    }
}

/// Receiver for the id-keyed background fallback: gets the encoded frame
/// after every present.
pub trait DisplayTarget {
    fn install_background(&mut self, id: &str, png: &[u8]) -> PixelwaveResult<()>;
}

/// Id-keyed fallback surface for targets that cannot be drawn into directly.
///
/// Owns an offscreen raster; `present` PNG-encodes it and installs it on the
/// [`DisplayTarget`] under a generated id, mirroring the background-image
/// style of display.
pub struct BackgroundSurface {
    inner: PixmapSurface,
    id: String,
    target: Box<dyn DisplayTarget>,
}

impl BackgroundSurface {
    pub fn new(width: u32, height: u32, target: Box<dyn DisplayTarget>) -> Self {
        Self {
            inner: PixmapSurface::new(width, height),
            id: generate_surface_id(20),
            target,
        }
    }

    /// The generated id this surface installs its frames under.
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl Surface for BackgroundSurface {
    fn width(&self) -> u32 {
        self.inner.width()
    }

    fn height(&self) -> u32 {
        self.inner.height()
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.inner.resize(width, height);
    }

    fn draw_image(
        &mut self,
        image: &SourceImage,
        x: i64,
        y: i64,
        w: u32,
        h: u32,
    ) -> PixelwaveResult<()> {
        self.inner.draw_image(image, x, y, w, h)
    }

    fn read_pixels(&self, x: u32, y: u32, w: u32, h: u32) -> PixelwaveResult<Vec<u8>> {
        self.inner.read_pixels(x, y, w, h)
    }

    fn fill_rect(&mut self, x: i64, y: i64, w: u32, h: u32, rgb: [u8; 3], alpha: f64) {
        self.inner.fill_rect(x, y, w, h, rgb, alpha);
    }

    fn present(&mut self) -> PixelwaveResult<()> {
        let mut png = Vec::new();
        image::DynamicImage::ImageRgba8(self.inner.pixels.clone())
            .write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
            .context("encode frame png")?;
        self.target.install_background(&self.id, &png)
    }
}

/// Generate a display id: a fixed prefix plus `len` random uppercase letters.
pub fn generate_surface_id(len: usize) -> String {
    let mut rng = rand::thread_rng();
    let mut id = String::with_capacity("pixelWaveCanvas".len() + len);
    id.push_str("pixelWaveCanvas");
    for _ in 0..len {
        id.push(char::from(b'A' + rng.gen_range(0..26u8)));
    }
    id
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn over_straight_edges() {
        let dst = [10, 20, 30, 255];
        assert_eq!(over_straight(dst, [1, 2, 3, 0]), dst);
        assert_eq!(over_straight(dst, [1, 2, 3, 255]), [1, 2, 3, 255]);
        // Transparent dst takes the source color.
        assert_eq!(over_straight([0, 0, 0, 0], [100, 110, 120, 128]), [
            100, 110, 120, 128
        ]);
    }

    #[test]
    fn fill_rect_blends_over_opaque_background() {
        let mut s = PixmapSurface::new(2, 1);
        s.fill_rect(0, 0, 2, 1, [0, 0, 0], 1.0);
        s.fill_rect(0, 0, 1, 1, [255, 255, 255], 0.5);

        let px = s.read_pixels(0, 0, 2, 1).unwrap();
        // 50% white over black, straight alpha on an opaque base.
        assert_eq!(&px[0..4], &[128, 128, 128, 255]);
        assert_eq!(&px[4..8], &[0, 0, 0, 255]);
    }

    #[test]
    fn fill_rect_clips_and_clamps_alpha() {
        let mut s = PixmapSurface::new(2, 2);
        // Larger than the surface, alpha beyond 1.
        s.fill_rect(-5, -5, 20, 20, [7, 8, 9], 2.0);
        let px = s.read_pixels(0, 0, 2, 2).unwrap();
        assert!(px.chunks_exact(4).all(|p| p == [7, 8, 9, 255]));
    }

    #[test]
    fn draw_image_scales_and_clips() {
        let src = SourceImage::from_rgba8(2, 2, [200u8, 0, 0, 255].repeat(4)).unwrap();
        let mut s = PixmapSurface::new(4, 4);
        s.draw_image(&src, -2, -2, 8, 8).unwrap();
        let px = s.read_pixels(0, 0, 4, 4).unwrap();
        assert!(px.chunks_exact(4).all(|p| p == [200, 0, 0, 255]));
    }

    #[test]
    fn read_pixels_rejects_out_of_range() {
        let s = PixmapSurface::new(4, 4);
        assert!(s.read_pixels(0, 0, 5, 4).is_err());
        assert!(s.read_pixels(2, 2, 3, 1).is_err());
    }

    struct Recording {
        calls: std::rc::Rc<std::cell::RefCell<Vec<(String, usize)>>>,
    }

    impl DisplayTarget for Recording {
        fn install_background(&mut self, id: &str, png: &[u8]) -> PixelwaveResult<()> {
            self.calls.borrow_mut().push((id.to_string(), png.len()));
            Ok(())
        }
    }

    #[test]
    fn background_surface_presents_png_under_stable_id() {
        let calls = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
        let mut s = BackgroundSurface::new(
            3,
            3,
            Box::new(Recording {
                calls: std::rc::Rc::clone(&calls),
            }),
        );
        s.fill_rect(0, 0, 3, 3, [1, 2, 3], 1.0);
        s.present().unwrap();
        s.present().unwrap();

        let calls = calls.borrow();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].0, calls[1].0);
        assert!(calls[0].0.starts_with("pixelWaveCanvas"));
        assert!(calls[0].1 > 0);
    }

    #[test]
    fn surface_id_shape() {
        let id = generate_surface_id(20);
        assert_eq!(id.len(), "pixelWaveCanvas".len() + 20);
        assert!(id["pixelWaveCanvas".len()..]
            .chars()
            .all(|c| c.is_ascii_uppercase()));
    }
}
