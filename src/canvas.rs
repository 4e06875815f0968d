// src/canvas.rs
//! Pixel framebuffer and drawing primitives.
//!
//! All geometry and energy math in the analyzer is pure; this module is the
//! only place that touches pixels. The backing store is an `image::RgbaImage`
//! so the terminal front-end can hand the frame straight to ratatui-image.

use image::{DynamicImage, Rgba, RgbaImage};

/// Canvas color type.
pub type Color = Rgba<u8>;

/// Opaque color from RGB components.
pub const fn rgb(r: u8, g: u8, b: u8) -> Color {
    Rgba([r, g, b, 255])
}

/// Color with explicit alpha.
pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Color {
    Rgba([r, g, b, a])
}

/// HSL to RGB, hue in degrees, saturation/lightness in [0, 1].
pub fn hsl(hue: f32, sat: f32, light: f32) -> Color {
    let h = hue.rem_euclid(360.0) / 60.0;
    let c = (1.0 - (2.0 * light - 1.0).abs()) * sat;
    let x = c * (1.0 - (h % 2.0 - 1.0).abs());
    let (r, g, b) = match h as u32 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };
    let m = light - c / 2.0;
    rgb(
        ((r + m) * 255.0).round() as u8,
        ((g + m) * 255.0).round() as u8,
        ((b + m) * 255.0).round() as u8,
    )
}

/// Linear interpolation between two colors.
pub fn lerp_color(a: Color, b: Color, t: f32) -> Color {
    let t = t.clamp(0.0, 1.0);
    let mix = |x: u8, y: u8| (x as f32 + (y as f32 - x as f32) * t).round() as u8;
    Rgba([
        mix(a[0], b[0]),
        mix(a[1], b[1]),
        mix(a[2], b[2]),
        mix(a[3], b[3]),
    ])
}

/// Fill style for shapes. Gradient variants index a precomputed color LUT by
/// absolute canvas coordinate, so bars at different positions sample the same
/// overall gradient.
pub enum Paint<'a> {
    Solid(Color),
    /// LUT indexed by canvas y.
    VGrad(&'a [Color]),
    /// LUT indexed by canvas x.
    HGrad(&'a [Color]),
    /// LUT indexed by distance from (cx, cy).
    RGrad { lut: &'a [Color], cx: f32, cy: f32 },
}

impl Paint<'_> {
    fn at(&self, x: u32, y: u32) -> Color {
        match self {
            Paint::Solid(c) => *c,
            Paint::VGrad(lut) => lut_at(lut, y as usize),
            Paint::HGrad(lut) => lut_at(lut, x as usize),
            Paint::RGrad { lut, cx, cy } => {
                let dx = x as f32 - cx;
                let dy = y as f32 - cy;
                lut_at(lut, (dx * dx + dy * dy).sqrt() as usize)
            }
        }
    }
}

fn lut_at(lut: &[Color], i: usize) -> Color {
    if lut.is_empty() {
        rgb(255, 255, 255)
    } else {
        lut[i.min(lut.len() - 1)]
    }
}

/// Drawing surface exclusively owned by the analyzer.
pub struct Canvas {
    img: RgbaImage,
}

impl Canvas {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            img: RgbaImage::from_pixel(width.max(1), height.max(1), rgb(0, 0, 0)),
        }
    }

    pub fn width(&self) -> u32 {
        self.img.width()
    }

    pub fn height(&self) -> u32 {
        self.img.height()
    }

    /// Reallocate the backing buffer. Contents are reset to black.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.img = RgbaImage::from_pixel(width.max(1), height.max(1), rgb(0, 0, 0));
    }

    pub fn clear(&mut self, color: Color) {
        for px in self.img.pixels_mut() {
            *px = color;
        }
    }

    pub fn pixel(&self, x: u32, y: u32) -> Color {
        *self.img.get_pixel(x, y)
    }

    /// Clone the frame for display.
    pub fn to_image(&self) -> DynamicImage {
        DynamicImage::ImageRgba8(self.img.clone())
    }

    fn blend_px(&mut self, x: u32, y: u32, color: Color, alpha: f32) {
        let a = alpha.clamp(0.0, 1.0) * color[3] as f32 / 255.0;
        if a <= 0.0 {
            return;
        }
        let dst = self.img.get_pixel_mut(x, y);
        for i in 0..3 {
            dst[i] = (color[i] as f32 * a + dst[i] as f32 * (1.0 - a)).round() as u8;
        }
        dst[3] = 255;
    }

    /// Fill an axis-aligned rectangle, clipped to the canvas.
    pub fn fill_rect(&mut self, x: f32, y: f32, w: f32, h: f32, paint: &Paint, alpha: f32) {
        let (x0, y0, x1, y1) = self.clip_rect(x, y, w, h);
        for py in y0..y1 {
            for px in x0..x1 {
                self.blend_px(px, py, paint.at(px, py), alpha);
            }
        }
    }

    /// Stroke the border of a rectangle with the given line width.
    pub fn stroke_rect(&mut self, x: f32, y: f32, w: f32, h: f32, lw: f32, paint: &Paint) {
        let lw = lw.max(1.0);
        self.fill_rect(x, y, w, lw, paint, 1.0);
        self.fill_rect(x, y + h - lw, w, lw, paint, 1.0);
        self.fill_rect(x, y, lw, h, paint, 1.0);
        self.fill_rect(x + w - lw, y, lw, h, paint, 1.0);
    }

    fn clip_rect(&self, x: f32, y: f32, w: f32, h: f32) -> (u32, u32, u32, u32) {
        let x0 = x.max(0.0).round() as u32;
        let y0 = y.max(0.0).round() as u32;
        let x1 = (x + w).round().clamp(0.0, self.width() as f32) as u32;
        let y1 = (y + h).round().clamp(0.0, self.height() as f32) as u32;
        (x0.min(x1), y0.min(y1), x1, y1)
    }

    /// Fill a convex or mildly concave polygon by even-odd scanline.
    pub fn fill_polygon(&mut self, points: &[(f32, f32)], paint: &Paint, alpha: f32) {
        if points.len() < 3 {
            return;
        }
        let min_y = points.iter().map(|p| p.1).fold(f32::MAX, f32::min).max(0.0) as u32;
        let max_y = points
            .iter()
            .map(|p| p.1)
            .fold(f32::MIN, f32::max)
            .min(self.height() as f32 - 1.0);
        if max_y < 0.0 {
            return;
        }
        let mut xs: Vec<f32> = Vec::with_capacity(8);
        for py in min_y..=max_y as u32 {
            let yc = py as f32 + 0.5;
            xs.clear();
            for i in 0..points.len() {
                let (x0, y0) = points[i];
                let (x1, y1) = points[(i + 1) % points.len()];
                if (y0 <= yc && y1 > yc) || (y1 <= yc && y0 > yc) {
                    xs.push(x0 + (yc - y0) / (y1 - y0) * (x1 - x0));
                }
            }
            xs.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
            for pair in xs.chunks_exact(2) {
                let sx = pair[0].max(0.0).round() as u32;
                let ex = pair[1].min(self.width() as f32).round() as u32;
                for px in sx..ex {
                    self.blend_px(px, py, paint.at(px, py), alpha);
                }
            }
        }
    }

    /// Stroke a polyline with the given thickness, one filled quad per
    /// segment.
    pub fn stroke_polyline(&mut self, points: &[(f32, f32)], lw: f32, paint: &Paint, alpha: f32) {
        let half = lw.max(1.0) / 2.0;
        for seg in points.windows(2) {
            let (x0, y0) = seg[0];
            let (x1, y1) = seg[1];
            let (dx, dy) = (x1 - x0, y1 - y0);
            let len = (dx * dx + dy * dy).sqrt().max(1e-6);
            let (nx, ny) = (-dy / len * half, dx / len * half);
            self.fill_polygon(
                &[
                    (x0 + nx, y0 + ny),
                    (x1 + nx, y1 + ny),
                    (x1 - nx, y1 - ny),
                    (x0 - nx, y0 - ny),
                ],
                paint,
                alpha,
            );
        }
    }

    /// Draw a vertically flipped copy of the band starting at `src_y` with
    /// height `src_h` into the band at `dst_y` with height `dst_h`, applying
    /// opacity and a brightness filter. Used for the reflection effect; when
    /// `dst_h != src_h` the copy is scaled vertically (reflex "fit" mode).
    pub fn reflect_band(
        &mut self,
        src_y: u32,
        src_h: u32,
        dst_y: u32,
        dst_h: u32,
        alpha: f32,
        brightness: f32,
    ) {
        if src_h == 0 || dst_h == 0 {
            return;
        }
        let w = self.width();
        for dy in 0..dst_h.min(self.height().saturating_sub(dst_y)) {
            // dst row 0 shows the bottom of the source band (flip).
            let sy = src_y + ((dst_h - 1 - dy) as u64 * src_h as u64 / dst_h as u64) as u32;
            if sy >= self.height() {
                continue;
            }
            for x in 0..w {
                let src = self.pixel(x, sy);
                let lit = Rgba([
                    (src[0] as f32 * brightness).min(255.0) as u8,
                    (src[1] as f32 * brightness).min(255.0) as u8,
                    (src[2] as f32 * brightness).min(255.0) as u8,
                    255,
                ]);
                self.blend_px(x, dst_y + dy, lit, alpha);
            }
        }
    }

    /// Reflect one half of the canvas over the other. `left_to_right` copies
    /// the left half mirrored onto the right half; otherwise the reverse.
    pub fn mirror_horizontal(&mut self, left_to_right: bool) {
        let w = self.width();
        let half = w / 2;
        for y in 0..self.height() {
            for x in 0..half {
                let (src, dst) = if left_to_right {
                    (x, w - 1 - x)
                } else {
                    (w - 1 - x, x)
                };
                let px = self.pixel(src, y);
                self.img.put_pixel(dst, y, px);
            }
        }
    }

    /// Alpha-composite another canvas on top of this one at (x, y).
    pub fn blit(&mut self, other: &Canvas, x: i32, y: i32) {
        for sy in 0..other.height() {
            let dy = y + sy as i32;
            if dy < 0 || dy >= self.height() as i32 {
                continue;
            }
            for sx in 0..other.width() {
                let dx = x + sx as i32;
                if dx < 0 || dx >= self.width() as i32 {
                    continue;
                }
                let px = other.pixel(sx, sy);
                if px[3] > 0 {
                    self.blend_px(dx as u32, dy as u32, px, 1.0);
                }
            }
        }
    }

    /// Stamp a label using the built-in 3x5 glyph set, `scale` device pixels
    /// per glyph pixel. Returns the width drawn.
    pub fn draw_label(&mut self, x: f32, y: f32, text: &str, scale: f32, color: Color) -> f32 {
        let mut cx = x;
        let paint = Paint::Solid(color);
        for ch in text.chars() {
            let Some(glyph) = glyph_3x5(ch) else {
                cx += 2.0 * scale;
                continue;
            };
            for (row, bits) in glyph.iter().enumerate() {
                for col in 0..3 {
                    if bits & (0b100 >> col) != 0 {
                        self.fill_rect(
                            cx + col as f32 * scale,
                            y + row as f32 * scale,
                            scale,
                            scale,
                            &paint,
                            1.0,
                        );
                    }
                }
            }
            cx += 4.0 * scale;
        }
        cx - x
    }

    /// Width of a label drawn with [`draw_label`](Self::draw_label).
    pub fn label_width(text: &str, scale: f32) -> f32 {
        text.chars().count() as f32 * 4.0 * scale
    }
}

/// 3x5 bitmap glyphs for ruler labels: digits plus 'k' and 'H', 'z'.
fn glyph_3x5(ch: char) -> Option<[u8; 5]> {
    Some(match ch {
        '0' => [0b111, 0b101, 0b101, 0b101, 0b111],
        '1' => [0b010, 0b110, 0b010, 0b010, 0b111],
        '2' => [0b111, 0b001, 0b111, 0b100, 0b111],
        '3' => [0b111, 0b001, 0b011, 0b001, 0b111],
        '4' => [0b101, 0b101, 0b111, 0b001, 0b001],
        '5' => [0b111, 0b100, 0b111, 0b001, 0b111],
        '6' => [0b111, 0b100, 0b111, 0b101, 0b111],
        '7' => [0b111, 0b001, 0b010, 0b010, 0b010],
        '8' => [0b111, 0b101, 0b111, 0b101, 0b111],
        '9' => [0b111, 0b101, 0b111, 0b001, 0b111],
        'k' => [0b100, 0b101, 0b110, 0b110, 0b101],
        'H' => [0b101, 0b101, 0b111, 0b101, 0b101],
        'z' => [0b000, 0b111, 0b001, 0b010, 0b111],
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fill_rect_clips_to_canvas() {
        let mut canvas = Canvas::new(10, 10);
        canvas.fill_rect(-5.0, -5.0, 100.0, 100.0, &Paint::Solid(rgb(255, 0, 0)), 1.0);
        assert_eq!(canvas.pixel(0, 0), rgb(255, 0, 0));
        assert_eq!(canvas.pixel(9, 9), rgb(255, 0, 0));
    }

    #[test]
    fn mirror_copies_left_half_reversed() {
        let mut canvas = Canvas::new(4, 1);
        canvas.fill_rect(0.0, 0.0, 1.0, 1.0, &Paint::Solid(rgb(10, 20, 30)), 1.0);
        canvas.mirror_horizontal(true);
        assert_eq!(canvas.pixel(3, 0), rgb(10, 20, 30));
    }

    #[test]
    fn reflect_band_flips_vertically() {
        let mut canvas = Canvas::new(1, 4);
        canvas.fill_rect(0.0, 0.0, 1.0, 1.0, &Paint::Solid(rgb(200, 0, 0)), 1.0);
        // Source band rows 0..2, destination rows 2..4, full opacity.
        canvas.reflect_band(0, 2, 2, 2, 1.0, 1.0);
        // Row 0 of the source (red) lands on the bottom destination row.
        assert_eq!(canvas.pixel(0, 3), rgb(200, 0, 0));
    }

    #[test]
    fn hsl_primaries() {
        assert_eq!(hsl(0.0, 1.0, 0.5), rgb(255, 0, 0));
        assert_eq!(hsl(120.0, 1.0, 0.5), rgb(0, 255, 0));
        assert_eq!(hsl(240.0, 1.0, 0.5), rgb(0, 0, 255));
    }
}
