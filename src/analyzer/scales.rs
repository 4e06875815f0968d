// src/analyzer/scales.rs
//! Frequency ruler canvases.
//!
//! Two auxiliary canvases, rebuilt only on resize (or fullscreen change):
//! a horizontal X-axis strip with the standard frequency labels at their
//! log-scale positions, and a full-size transparent overlay placing the same
//! labels around a circle for the radial layout. The render loop composites
//! them over the frame every draw.

use crate::analyzer::bars::BarGeometry;
use crate::canvas::{Canvas, Paint, rgb, rgba};
use crate::config::Mirror;

/// Standard ruler frequencies.
const SCALE_FREQS: [(f32, &str); 11] = [
    (16.0, "16"),
    (31.0, "31"),
    (63.0, "63"),
    (125.0, "125"),
    (250.0, "250"),
    (500.0, "500"),
    (1000.0, "1k"),
    (2000.0, "2k"),
    (4000.0, "4k"),
    (8000.0, "8k"),
    (16000.0, "16k"),
];

/// A positioned ruler label, exposed so text-capable hosts can overlay real
/// glyphs on top of the stamped bitmap ones.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleLabel {
    pub x: f32,
    pub text: &'static str,
}

/// The X-axis ruler strip.
pub struct XAxisScale {
    pub canvas: Canvas,
    pub labels: Vec<ScaleLabel>,
}

/// Build the X-axis ruler for the current geometry.
pub fn build_x_scale(
    width: u32,
    height: u32,
    geometry: &BarGeometry,
    mirror: Mirror,
    pixel_ratio: f32,
) -> XAxisScale {
    let mut canvas = Canvas::new(width, height.max(1));
    canvas.clear(rgb(17, 17, 17));

    let glyph_scale = pixel_ratio.max(1.0);
    let tick = Paint::Solid(rgb(96, 96, 96));
    let ink = rgb(221, 221, 221);
    let mut labels = Vec::new();

    let mut place = |canvas: &mut Canvas, labels: &mut Vec<ScaleLabel>, x: f32, text: &'static str| {
        if x < 0.0 || x >= width as f32 {
            return;
        }
        canvas.fill_rect(x, 0.0, 1.0, height as f32 / 4.0, &tick, 1.0);
        let label_w = Canvas::label_width(text, glyph_scale);
        let lx = (x - label_w / 2.0).clamp(0.0, (width as f32 - label_w).max(0.0));
        canvas.draw_label(lx, height as f32 / 3.0, text, glyph_scale, ink);
        labels.push(ScaleLabel { x, text });
    };

    for (freq, text) in SCALE_FREQS {
        let x = geometry.x_of_freq(freq);
        place(&mut canvas, &mut labels, x, text);
        if mirror.is_active() {
            place(&mut canvas, &mut labels, width as f32 - x, text);
        }
    }

    XAxisScale { canvas, labels }
}

/// The radial ruler: labels rotated around the spectrum circle.
pub struct RadialScale {
    pub canvas: Canvas,
}

/// Build the radial ruler. `radius` is the label circle radius in pixels;
/// labels are placed at the angle corresponding to their log-scale position.
pub fn build_radial_scale(
    width: u32,
    height: u32,
    radius: f32,
    geometry: &BarGeometry,
    pixel_ratio: f32,
) -> RadialScale {
    let mut canvas = Canvas::new(width, height);
    canvas.clear(rgba(0, 0, 0, 0));

    let glyph_scale = pixel_ratio.max(1.0);
    let ink = rgb(221, 221, 221);
    let (cx, cy) = (width as f32 / 2.0, height as f32 / 2.0);

    for (freq, text) in SCALE_FREQS {
        // Map the linear ruler position onto a full turn, starting at the
        // top of the circle.
        let frac = geometry.x_of_freq(freq) / width as f32;
        if !(0.0..1.0).contains(&frac) {
            continue;
        }
        let angle = frac * std::f32::consts::TAU - std::f32::consts::FRAC_PI_2;
        let label_w = Canvas::label_width(text, glyph_scale);
        let x = cx + angle.cos() * radius - label_w / 2.0;
        let y = cy + angle.sin() * radius - 2.5 * glyph_scale;
        canvas.draw_label(x, y, text, glyph_scale, ink);
    }

    RadialScale { canvas }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::bars;
    use crate::config::Mode;

    fn geometry() -> BarGeometry {
        bars::compute(Mode::Discrete, 20.0, 22000.0, 8192, 44100, 640.0)
    }

    #[test]
    fn labels_in_range_are_placed_in_order() {
        let scale = build_x_scale(640, 20, &geometry(), Mirror::None, 1.0);
        // 16 Hz is below the 20 Hz floor, so 10 labels remain.
        assert_eq!(scale.labels.len(), 10);
        for pair in scale.labels.windows(2) {
            assert!(pair[0].x < pair[1].x);
        }
        assert_eq!(scale.labels[0].text, "31");
    }

    #[test]
    fn mirror_doubles_the_labels() {
        let plain = build_x_scale(640, 20, &geometry(), Mirror::None, 1.0);
        let mirrored = build_x_scale(640, 20, &geometry(), Mirror::Left, 1.0);
        assert_eq!(mirrored.labels.len(), plain.labels.len() * 2);
    }

    #[test]
    fn radial_scale_is_transparent_outside_labels() {
        let scale = build_radial_scale(200, 200, 80.0, &geometry(), 1.0);
        assert_eq!(scale.canvas.pixel(0, 0)[3], 0);
    }
}
