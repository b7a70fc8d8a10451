//! Preview icons down-sampled for terminal display.
//!
//! A preview is decoded once, resampled to a fixed cell grid, and drawn with
//! the half-block trick: each terminal cell shows two image rows, the top one
//! as the foreground of `▀` and the bottom one as the background.

use anyhow::{Context, Result};
use image::imageops::FilterType;
use ratatui::{layout::Rect, style::Color, Frame};
use std::path::Path;

/// An image resampled to terminal cells, two pixel rows per cell
#[derive(Debug, Clone)]
pub struct PreviewImage {
    width: u16,
    height: u16,
    // Row-major, `width * height * 2` entries
    pixels: Vec<[u8; 3]>,
}

impl PreviewImage {
    /// Decode an image file and resample it to `width x height` cells
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened or decoded
    pub fn load<P: AsRef<Path>>(path: P, width: u16, height: u16) -> Result<Self> {
        let img = image::open(path.as_ref())
            .with_context(|| format!("Failed to decode preview image {}", path.as_ref().display()))?;
        let resized = img.resize_exact(
            u32::from(width),
            u32::from(height) * 2,
            FilterType::Triangle,
        );
        let rgb = resized.to_rgb8();

        let mut pixels = Vec::with_capacity(usize::from(width) * usize::from(height) * 2);
        for y in 0..u32::from(height) * 2 {
            for x in 0..u32::from(width) {
                pixels.push(rgb.get_pixel(x, y).0);
            }
        }

        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    #[must_use]
    pub fn width(&self) -> u16 {
        self.width
    }

    #[must_use]
    pub fn height(&self) -> u16 {
        self.height
    }

    /// Draw the preview with its top-left corner at `(x, y)` cell coordinates
    pub fn render(&self, frame: &mut Frame<'_>, area: Rect, x: f32, y: f32) {
        let (ox, oy) = (x.round() as i32, y.round() as i32);
        let buf = frame.buffer_mut();
        for cy in 0..i32::from(self.height) {
            for cx in 0..i32::from(self.width) {
                let (px, py) = (ox + cx, oy + cy);
                if px < 0 || py < 0 || px >= i32::from(area.width) || py >= i32::from(area.height) {
                    continue;
                }
                let top = self.pixel(cx as u16, cy as u16 * 2);
                let bottom = self.pixel(cx as u16, cy as u16 * 2 + 1);
                buf.get_mut(area.x + px as u16, area.y + py as u16)
                    .set_char('▀')
                    .set_fg(Color::Rgb(top[0], top[1], top[2]))
                    .set_bg(Color::Rgb(bottom[0], bottom[1], bottom[2]));
            }
        }
    }

    fn pixel(&self, x: u16, row: u16) -> [u8; 3] {
        self.pixels[usize::from(row) * usize::from(self.width) + usize::from(x)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_rejects_missing_file() {
        let result = PreviewImage::load("/nonexistent/icon.png", 16, 8);
        assert!(result.is_err());
    }

    #[test]
    fn test_load_and_resample() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("icon.png");
        let img = image::RgbImage::from_pixel(32, 32, image::Rgb([200, 30, 60]));
        img.save(&path).unwrap();

        let preview = PreviewImage::load(&path, 10, 5).unwrap();
        assert_eq!(preview.width(), 10);
        assert_eq!(preview.height(), 5);
        assert_eq!(preview.pixel(0, 0), [200, 30, 60]);
        assert_eq!(preview.pixel(9, 9), [200, 30, 60]);
    }
}
