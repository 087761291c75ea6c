use crate::animation::AnimatedTransform;
use crate::assets::AssetLoader;
use crate::captions::style::{CaptionStyle, TextAlign};
use crate::captions::CaptionTrack;
use crate::eval::FrameState;
use crate::graph::{Asset, AssetKind, RenderScene};
use crate::renderer::FrameBuffer;
use image::RgbaImage;
use std::sync::Arc;
use unicode_segmentation::UnicodeSegmentation;

const BACKGROUND: [u8; 4] = [0, 0, 0, 255];
const VIDEO_PLACEHOLDER: [u8; 4] = [200, 100, 100, 255];
const IMAGE_PLACEHOLDER: [u8; 4] = [100, 100, 200, 255];
const HIGHLIGHT: [u8; 4] = [14, 165, 233, 179];
/// Caption sizes are authored against a 1080 pixel tall frame
const REFERENCE_HEIGHT: f64 = 1080.0;

/// Placement of a layer on the frame, in pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayerRect {
    pub center_x: f64,
    pub center_y: f64,
    pub width: f64,
    pub height: f64,
    pub scale: f64,
    /// Radians, clockwise
    pub rotation: f64,
}

impl LayerRect {
    /// Percent-based asset geometry mapped onto a `frame_width` x `frame_height` frame
    pub fn new(
        asset: &Asset,
        transform: &AnimatedTransform,
        frame_width: u32,
        frame_height: u32,
    ) -> Self {
        let fw = frame_width as f64;
        let fh = frame_height as f64;
        let width = asset.width / 100.0 * fw;
        let height = asset.height / 100.0 * fh;
        let left = transform.x / 100.0 * fw;
        let top = transform.y / 100.0 * fh;

        Self {
            center_x: left + width / 2.0,
            center_y: top + height / 2.0,
            width,
            height,
            scale: transform.scale,
            rotation: transform.rotation.to_radians(),
        }
    }

    /// Pixel bounds (x0, y0, x1, y1) covering the transformed rectangle
    pub fn bounds(&self) -> (f64, f64, f64, f64) {
        let (sin, cos) = self.rotation.sin_cos();
        let hw = self.width * self.scale / 2.0;
        let hh = self.height * self.scale / 2.0;
        let ex = hw * cos.abs() + hh * sin.abs();
        let ey = hw * sin.abs() + hh * cos.abs();
        (
            self.center_x - ex,
            self.center_y - ey,
            self.center_x + ex,
            self.center_y + ey,
        )
    }

    /// Map a frame point back into the layer. Returns normalized (0..1)
    /// coordinates when the point falls inside.
    pub fn to_local(&self, px: f64, py: f64) -> Option<(f64, f64)> {
        if self.scale <= 0.0 || self.width <= 0.0 || self.height <= 0.0 {
            return None;
        }
        let (sin, cos) = self.rotation.sin_cos();
        let dx = px - self.center_x;
        let dy = py - self.center_y;
        let u = (dx * cos + dy * sin) / self.scale;
        let v = (-dx * sin + dy * cos) / self.scale;

        let fx = u / self.width + 0.5;
        let fy = v / self.height + 0.5;
        ((0.0..1.0).contains(&fx) && (0.0..1.0).contains(&fy)).then_some((fx, fy))
    }
}

/// Paints evaluated frame states
pub struct Compositor {
    assets: Arc<AssetLoader>,
}

impl Compositor {
    pub fn new(assets: Arc<AssetLoader>) -> Self {
        Self { assets }
    }

    /// Paint one frame of `scene`
    pub fn paint(
        &self,
        buffer: &mut FrameBuffer,
        scene: &RenderScene,
        track: &CaptionTrack,
        state: &FrameState,
    ) {
        buffer.clear(BACKGROUND);

        for layer in &state.layers {
            let Some(asset) = scene.assets.get(layer.asset_index) else {
                continue;
            };
            let image = match asset.kind {
                AssetKind::Image => self.assets.load_image(&asset.url),
                _ => None,
            };
            Self::draw_layer(buffer, asset, &layer.transform, image.as_deref());
        }

        Self::draw_captions(buffer, &scene.caption_style, track, state);
    }

    /// Draw a layer, sampling `image` with cover fit, or a flat placeholder
    /// when there is no decoded image.
    pub fn draw_layer(
        buffer: &mut FrameBuffer,
        asset: &Asset,
        transform: &AnimatedTransform,
        image: Option<&RgbaImage>,
    ) {
        let (fw, fh) = buffer.dimensions();
        let rect = LayerRect::new(asset, transform, fw, fh);
        let (x0, y0, x1, y1) = rect.bounds();

        let x0 = x0.floor().max(0.0) as u32;
        let y0 = y0.floor().max(0.0) as u32;
        let x1 = x1.ceil().min(fw as f64).max(0.0) as u32;
        let y1 = y1.ceil().min(fh as f64).max(0.0) as u32;

        let placeholder = match asset.kind {
            AssetKind::Video => VIDEO_PLACEHOLDER,
            _ => IMAGE_PLACEHOLDER,
        };

        for py in y0..y1 {
            for px in x0..x1 {
                let Some((fx, fy)) = rect.to_local(px as f64 + 0.5, py as f64 + 0.5) else {
                    continue;
                };
                let color = match image {
                    Some(img) => sample_cover(img, fx, fy, rect.width, rect.height),
                    None => placeholder,
                };
                buffer.blend_pixel(px, py, color, transform.opacity);
            }
        }
    }

    /// Draw the active caption entry as a box of word blocks, the
    /// highlighted word on an accent pill.
    pub fn draw_captions(
        buffer: &mut FrameBuffer,
        style: &CaptionStyle,
        track: &CaptionTrack,
        state: &FrameState,
    ) {
        let Some(entry_index) = state.caption_entry else {
            return;
        };
        let (fw, fh) = buffer.dimensions();
        let layout = CaptionLayout::new(style, track, entry_index, fw, fh);
        if layout.lines.is_empty() {
            return;
        }

        let opacity = style.opacity.clamp(0.0, 1.0);
        let (bx, by, bw, bh) = layout.frame;
        buffer.fill_rect(bx, by, bw, bh, style.background_rgba(), 1.0);

        let border = (style.border_width * layout.unit).round() as u32;
        if border > 0 {
            let color = crate::captions::style::parse_hex_color(&style.border_color)
                .unwrap_or([255, 255, 255, 255]);
            buffer.fill_rect(bx, by, bw, border, color, opacity);
            buffer.fill_rect(bx, by + bh as i64 - border as i64, bw, border, color, opacity);
            buffer.fill_rect(bx, by, border, bh, color, opacity);
            buffer.fill_rect(bx + bw as i64 - border as i64, by, border, bh, color, opacity);
        }

        let text = style.text_rgba();
        let glyph_h = (layout.font_px * 0.6).round().max(1.0) as u32;
        for block in layout.lines.iter().flatten() {
            let highlighted = state.highlighted_word == Some(block.word_index);
            let top = block.y + ((layout.line_px - glyph_h as f64) / 2.0).round() as i64;
            if highlighted {
                let pad = (layout.font_px * 0.15).round() as i64;
                buffer.fill_rect(
                    block.x - pad,
                    top - pad,
                    block.width + 2 * pad as u32,
                    glyph_h + 2 * pad as u32,
                    HIGHLIGHT,
                    opacity,
                );
                buffer.fill_rect(block.x, top, block.width, glyph_h, [255, 255, 255, text[3]], 1.0);
            } else {
                buffer.fill_rect(block.x, top, block.width, glyph_h, text, 1.0);
            }
        }
    }
}

/// Cover-fit sample at normalized layer coordinates
fn sample_cover(img: &RgbaImage, fx: f64, fy: f64, rect_w: f64, rect_h: f64) -> [u8; 4] {
    let (iw, ih) = img.dimensions();
    if iw == 0 || ih == 0 {
        return IMAGE_PLACEHOLDER;
    }
    let k = (rect_w / iw as f64).max(rect_h / ih as f64);
    if !(k > 0.0) {
        return IMAGE_PLACEHOLDER;
    }
    let ix = ((fx - 0.5) * rect_w / k + iw as f64 / 2.0).floor();
    let iy = ((fy - 0.5) * rect_h / k + ih as f64 / 2.0).floor();
    let ix = ix.clamp(0.0, (iw - 1) as f64) as u32;
    let iy = iy.clamp(0.0, (ih - 1) as f64) as u32;
    img.get_pixel(ix, iy).0
}

#[derive(Debug, Clone, PartialEq)]
struct WordBlock {
    word_index: usize,
    x: i64,
    y: i64,
    width: u32,
}

/// Approximate text metrics: every grapheme is a fixed fraction of the
/// font size wide.
#[derive(Debug)]
struct CaptionLayout {
    unit: f64,
    font_px: f64,
    line_px: f64,
    /// x, y, width, height of the caption box
    frame: (i64, i64, u32, u32),
    lines: Vec<Vec<WordBlock>>,
}

impl CaptionLayout {
    fn new(
        style: &CaptionStyle,
        track: &CaptionTrack,
        entry_index: usize,
        fw: u32,
        fh: u32,
    ) -> Self {
        let scale = if style.scale.is_finite() && style.scale > 0.0 { style.scale } else { 1.0 };
        let unit = fh as f64 / REFERENCE_HEIGHT * scale;
        let font_px = style.font_size.max(1.0) * unit;
        let mut char_px = font_px * 0.55;
        if style.font_weight.is_bold() {
            char_px *= 1.08;
        }
        let line_px = font_px * 1.4;
        let pad = style.padding.max(0.0) * unit;
        let content_max = (style.max_width * unit).min(fw as f64) - 2.0 * pad;

        let range = track.entry_word_range(entry_index);
        let mut lines: Vec<Vec<(usize, f64, f64)>> = vec![Vec::new()];
        let mut cursor = 0.0;
        for (offset, word) in track.entry_words(entry_index).iter().enumerate() {
            let width = word.text.graphemes(true).count() as f64 * char_px;
            if word.is_whitespace() {
                if cursor > 0.0 {
                    cursor += width;
                }
                continue;
            }
            if cursor > 0.0 && cursor + width > content_max {
                lines.push(Vec::new());
                cursor = 0.0;
            }
            if let Some(line) = lines.last_mut() {
                line.push((range.start + offset, cursor, width));
            }
            cursor += width;
        }
        lines.retain(|l| !l.is_empty());

        let line_width = |l: &Vec<(usize, f64, f64)>| l.last().map_or(0.0, |&(_, x, w)| x + w);
        let content_w = lines.iter().map(line_width).fold(0.0, f64::max);
        let box_w = content_w + 2.0 * pad;
        let box_h = lines.len() as f64 * line_px + 2.0 * pad;

        let (ax, ay) = style.anchor();
        let left = ax / 100.0 * fw as f64 - box_w / 2.0;
        let top = ay / 100.0 * fh as f64 - box_h / 2.0;

        let blocks = lines
            .iter()
            .enumerate()
            .map(|(row, line)| {
                let slack = content_w - line_width(line);
                let shift = match style.text_align {
                    TextAlign::Center => slack / 2.0,
                    TextAlign::Right => slack,
                    TextAlign::Left | TextAlign::Justify => 0.0,
                };
                line.iter()
                    .map(|&(word_index, x, width)| WordBlock {
                        word_index,
                        x: (left + pad + shift + x).round() as i64,
                        y: (top + pad + row as f64 * line_px).round() as i64,
                        width: width.round().max(1.0) as u32,
                    })
                    .collect()
            })
            .collect();

        Self {
            unit,
            font_px,
            line_px,
            frame: (
                left.round() as i64,
                top.round() as i64,
                box_w.round().max(0.0) as u32,
                box_h.round().max(0.0) as u32,
            ),
            lines: blocks,
        }
    }
}
