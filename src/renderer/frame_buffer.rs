use anyhow::{Context, Result};
use image::RgbaImage;
use std::path::Path;

/// RGBA frame buffer for rendering
#[derive(Debug, Clone)]
pub struct FrameBuffer {
    width: u32,
    height: u32,
    pixels: Vec<u8>, // RGBA, 4 bytes per pixel
}

impl FrameBuffer {
    /// Create new frame buffer with given dimensions
    pub fn new(width: u32, height: u32) -> Self {
        let size = width as usize * height as usize * 4;
        Self {
            width,
            height,
            pixels: vec![0; size],
        }
    }

    /// Clear buffer with color
    pub fn clear(&mut self, color: [u8; 4]) {
        for chunk in self.pixels.chunks_exact_mut(4) {
            chunk.copy_from_slice(&color);
        }
    }

    fn index(&self, x: u32, y: u32) -> Option<usize> {
        (x < self.width && y < self.height)
            .then(|| (y as usize * self.width as usize + x as usize) * 4)
    }

    pub fn set_pixel(&mut self, x: u32, y: u32, color: [u8; 4]) {
        if let Some(idx) = self.index(x, y) {
            self.pixels[idx..idx + 4].copy_from_slice(&color);
        }
    }

    pub fn get_pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        self.index(x, y).map(|idx| {
            let mut pixel = [0u8; 4];
            pixel.copy_from_slice(&self.pixels[idx..idx + 4]);
            pixel
        })
    }

    /// Alpha blend `color` onto the buffer, with its alpha further scaled by
    /// `opacity`. The frame itself stays opaque.
    pub fn blend_pixel(&mut self, x: u32, y: u32, color: [u8; 4], opacity: f64) {
        let alpha = (color[3] as f64 / 255.0) * opacity.clamp(0.0, 1.0);
        if alpha <= 0.0 {
            return;
        }
        if let Some(bg) = self.get_pixel(x, y) {
            let inv_alpha = 1.0 - alpha;
            let mix = |fg: u8, bg: u8| (fg as f64 * alpha + bg as f64 * inv_alpha).round() as u8;

            let blended = [
                mix(color[0], bg[0]),
                mix(color[1], bg[1]),
                mix(color[2], bg[2]),
                255,
            ];
            self.set_pixel(x, y, blended);
        }
    }

    /// Blend an axis-aligned rectangle; the part outside the frame is dropped
    pub fn fill_rect(
        &mut self,
        x: i64,
        y: i64,
        width: u32,
        height: u32,
        color: [u8; 4],
        opacity: f64,
    ) {
        let x0 = x.max(0);
        let y0 = y.max(0);
        let x1 = (x + width as i64).min(self.width as i64);
        let y1 = (y + height as i64).min(self.height as i64);

        for py in y0..y1 {
            for px in x0..x1 {
                self.blend_pixel(px as u32, py as u32, color, opacity);
            }
        }
    }

    /// Get buffer dimensions
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Get raw pixel data
    pub fn as_bytes(&self) -> &[u8] {
        &self.pixels
    }

    pub fn into_image(self) -> Option<RgbaImage> {
        RgbaImage::from_raw(self.width, self.height, self.pixels)
    }

    /// Save as PNG
    pub fn save_png(&self, path: &Path) -> Result<()> {
        image::save_buffer(
            path,
            &self.pixels,
            self.width,
            self.height,
            image::ExtendedColorType::Rgba8,
        )
        .with_context(|| format!("Failed to write frame: {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_buffer_creation() {
        let fb = FrameBuffer::new(1920, 1080);
        assert_eq!(fb.dimensions(), (1920, 1080));
        assert_eq!(fb.as_bytes().len(), 1920 * 1080 * 4);
    }

    #[test]
    fn test_clear() {
        let mut fb = FrameBuffer::new(100, 100);
        fb.clear([255, 0, 0, 255]); // Red

        assert_eq!(fb.get_pixel(0, 0), Some([255, 0, 0, 255]));
        assert_eq!(fb.get_pixel(50, 50), Some([255, 0, 0, 255]));
    }

    #[test]
    fn test_set_get_pixel() {
        let mut fb = FrameBuffer::new(100, 100);
        fb.set_pixel(10, 20, [100, 150, 200, 255]);

        assert_eq!(fb.get_pixel(10, 20), Some([100, 150, 200, 255]));
        assert_eq!(fb.get_pixel(100, 100), None); // Out of bounds
    }

    #[test]
    fn test_alpha_blending() {
        let mut fb = FrameBuffer::new(100, 100);
        fb.clear([255, 255, 255, 255]);

        // 50% transparent red
        fb.blend_pixel(50, 50, [255, 0, 0, 128], 1.0);
        let pixel = fb.get_pixel(50, 50).unwrap();
        assert_eq!(pixel[0], 255);
        assert!(pixel[1] > 120 && pixel[1] < 135);
        assert!(pixel[2] > 120 && pixel[2] < 135);
        assert_eq!(pixel[3], 255);

        // opacity 0 leaves the pixel alone
        fb.blend_pixel(10, 10, [0, 0, 0, 255], 0.0);
        assert_eq!(fb.get_pixel(10, 10), Some([255, 255, 255, 255]));
    }

    #[test]
    fn test_fill_rect_clips() {
        let mut fb = FrameBuffer::new(100, 100);
        fb.clear([0, 0, 0, 255]);
        fb.fill_rect(-10, 90, 20, 20, [255, 0, 0, 255], 1.0);

        assert_eq!(fb.get_pixel(5, 95), Some([255, 0, 0, 255]));
        assert_eq!(fb.get_pixel(15, 95), Some([0, 0, 0, 255]));
    }

    #[test]
    fn test_save_png() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("frame.png");
        let mut fb = FrameBuffer::new(8, 4);
        fb.clear([1, 2, 3, 255]);
        fb.save_png(&path).unwrap();

        let img = image::open(&path).unwrap().to_rgba8();
        assert_eq!(img.dimensions(), (8, 4));
        assert_eq!(img.get_pixel(3, 2).0, [1, 2, 3, 255]);
    }
}
