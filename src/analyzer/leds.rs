// src/analyzer/leds.rs
//! LED layout: discretizes bar columns into stacked segments.
//!
//! Active only for the octave-band modes with the LED flag on and radial
//! layout off. Layout comes from a per-mode preset table unless the caller
//! supplies an override, and is recomputed whenever the mode, canvas size,
//! pixel ratio or custom parameters change.

use crate::config::{LedOverride, Mode};

/// Reference analyzer height the preset spacing values are expressed at.
const REFERENCE_HEIGHT: f32 = 270.0;

/// Minimum visible LED block height / gap, in device pixels.
const MIN_THICKNESS: f32 = 2.0;

/// Preset rows: (max LEDs, vertical space at reference height in px,
/// horizontal space as a fraction of the bar width).
const PRESETS: [(usize, f32, f32); 9] = [
    (128, 3.0, 0.45),  // 24 bands per octave
    (128, 4.0, 0.225), // 12 bands
    (96, 6.0, 0.225),  // 8 bands
    (80, 6.0, 0.225),  // 6 bands
    (80, 6.0, 0.125),  // 4 bands
    (64, 6.0, 0.125),  // 3 bands
    (48, 8.0, 0.125),  // 2 bands
    (24, 16.0, 0.125), // full octaves
    (128, 3.0, 0.45),  // graph (unused for drawing, kept consistent)
];

/// Derived LED layout for the current configuration.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LedParams {
    /// Number of LEDs per column.
    pub count: usize,
    /// Vertical gap between LEDs, px.
    pub space_v: f32,
    /// Horizontal inset on each bar, px.
    pub space_h: f32,
    /// Height of one LED block, px.
    pub led_height: f32,
}

fn preset_for(mode: Mode) -> (usize, f32, f32) {
    match mode.band_step() {
        Some(_) => {
            let row = match mode {
                Mode::Bands24 => 0,
                Mode::Bands12 => 1,
                Mode::Bands8 => 2,
                Mode::Bands6 => 3,
                Mode::Bands4 => 4,
                Mode::Bands3 => 5,
                Mode::Bands2 => 6,
                Mode::Octave => 7,
                _ => 8,
            };
            PRESETS[row]
        }
        None => PRESETS[0],
    }
}

/// Compute the LED layout.
///
/// `height` is the analyzer height available to one channel, `bar_width` the
/// width of one bar column and `maximize` adds one extra spacing unit of
/// height before the count is derived (used when a single channel, or a
/// reflecting non-lumi layout, leaves room for it).
pub fn compute(
    mode: Mode,
    height: f32,
    bar_width: f32,
    pixel_ratio: f32,
    custom: Option<LedOverride>,
    maximize: bool,
) -> LedParams {
    let min_thick = MIN_THICKNESS * pixel_ratio;

    if let Some(over) = custom {
        // Shrink the count from the requested maximum until both the block
        // and the gap stay visible, or a single LED remains.
        let mut count = over.max_leds.max(1);
        loop {
            let cell = height / count as f32;
            let space_v = cell * over.space_v_ratio.clamp(0.0, 0.95);
            let led_height = cell - space_v;
            if count == 1 || (led_height >= min_thick && space_v >= min_thick) {
                return LedParams {
                    count,
                    space_v,
                    space_h: bar_width * over.space_h_ratio.clamp(0.0, 0.95),
                    led_height,
                };
            }
            count -= 1;
        }
    }

    let (max_leds, ref_space_v, space_h_ratio) = preset_for(mode);
    let space_v = (ref_space_v * (height / REFERENCE_HEIGHT) * pixel_ratio).max(min_thick);
    let height = if maximize { height + space_v } else { height };
    let count = ((height / (2.0 * space_v)).floor() as usize)
        .clamp(1, max_leds);
    let led_height = height / count as f32 - space_v;

    LedParams {
        count,
        space_v,
        space_h: bar_width * space_h_ratio,
        led_height,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preset_count_is_capped_and_visible() {
        let params = compute(Mode::Octave, 270.0, 40.0, 1.0, None, false);
        assert!(params.count >= 1 && params.count <= 24);
        assert!(params.led_height >= MIN_THICKNESS);
        assert!(params.space_v >= MIN_THICKNESS);
    }

    #[test]
    fn override_shrinks_until_leds_are_visible() {
        let over = LedOverride {
            max_leds: 500,
            space_v_ratio: 0.5,
            space_h_ratio: 0.25,
        };
        // 100 px tall: 500 LEDs of 0.1 px are invisible, so the count drops.
        let params = compute(Mode::Bands12, 100.0, 20.0, 1.0, Some(over), false);
        assert!(params.count < 500);
        assert!(params.led_height >= MIN_THICKNESS);
        assert!(params.space_v >= MIN_THICKNESS);
        assert_eq!(params.space_h, 5.0);
    }

    #[test]
    fn tiny_height_degrades_to_one_led() {
        let over = LedOverride {
            max_leds: 32,
            space_v_ratio: 0.5,
            space_h_ratio: 0.0,
        };
        let params = compute(Mode::Octave, 3.0, 10.0, 1.0, Some(over), false);
        assert_eq!(params.count, 1);
    }

    #[test]
    fn maximize_adds_headroom() {
        let normal = compute(Mode::Bands12, 270.0, 20.0, 1.0, None, false);
        let maxed = compute(Mode::Bands12, 270.0, 20.0, 1.0, None, true);
        assert!(maxed.count >= normal.count);
    }

    #[test]
    fn pixel_ratio_scales_minimum_thickness() {
        let hidpi = compute(Mode::Bands24, 270.0, 10.0, 2.0, None, false);
        assert!(hidpi.space_v >= 4.0);
    }
}
