// src/analyzer/render.rs
//! The per-frame render pass.
//!
//! Each frame is one synchronous unit of work on the host's refresh
//! callback: pull fresh magnitudes, update bar values/peaks and the global
//! energy (pure math over plain slices), then draw the active layout into
//! the canvas, apply reflection and mirroring, composite the ruler and call
//! the frame hook. Exactly one draw happens per callback while the loop is
//! running; nothing here recomputes geometry.

use std::time::{Duration, Instant};

use crate::analyzer::bars::{Bar, PEAK_HOLD_FRAMES};
use crate::analyzer::gradient::BuiltGradient;
use crate::analyzer::leds::LedParams;
use crate::analyzer::{Analyzer, FrameInfo};
use crate::canvas::{Canvas, Paint};
use crate::config::{Config, Mirror, Mode};

/// Peak marker thickness in logical pixels.
const PEAK_THICKNESS: f32 = 2.0;

/// Fraction of the smaller canvas dimension used as the radial base circle.
const RADIAL_BASE: f32 = 0.375;

/// Normalized bar amplitude: the maximum magnitude across the bar's bin
/// range, with linear interpolation into the neighbor bin at the two
/// fractional edges.
pub fn bar_amplitude(fft: &[u8], bin_lo: usize, bin_hi: usize, ratio_lo: f32, ratio_hi: f32) -> f32 {
    if fft.is_empty() {
        return 0.0;
    }
    let at = |i: usize| fft[i.min(fft.len() - 1)] as f32;
    let mut max = at(bin_lo) + (at(bin_lo + 1) - at(bin_lo)) * ratio_lo.clamp(0.0, 1.0);
    if bin_hi > bin_lo {
        let hi = at(bin_hi) + (at(bin_hi + 1) - at(bin_hi)) * ratio_hi.clamp(0.0, 1.0);
        max = max.max(hi);
        for bin in bin_lo + 1..bin_hi {
            max = max.max(at(bin));
        }
    }
    max / 255.0
}

/// Peak-hold policy: a new peak is held for [`PEAK_HOLD_FRAMES`] frames,
/// then decays proportionally to the frames elapsed past the hold window.
pub fn update_peak(peak: &mut f32, hold: &mut i32, value: f32) {
    if value >= *peak {
        *peak = value;
        *hold = PEAK_HOLD_FRAMES;
    } else {
        *hold -= 1;
        if *hold < 0 {
            let factor = (PEAK_HOLD_FRAMES + *hold).max(0) as f32 / PEAK_HOLD_FRAMES as f32;
            *peak *= factor;
        }
    }
}

/// Overall loudness: instantaneous average bar value plus a held peak.
#[derive(Debug, Clone, Copy, Default)]
pub struct Energy {
    pub val: f32,
    pub peak: f32,
    pub hold: i32,
}

impl Energy {
    pub fn update(&mut self, average: f32) {
        self.val = average;
        update_peak(&mut self.peak, &mut self.hold, average);
    }
}

/// Frames-per-second over rolling windows of at least one second.
pub struct FpsCounter {
    frames: u32,
    window_start: Instant,
    fps: f32,
}

impl FpsCounter {
    pub fn new() -> Self {
        Self {
            frames: 0,
            window_start: Instant::now(),
            fps: 0.0,
        }
    }

    pub fn reset(&mut self) {
        self.frames = 0;
        self.window_start = Instant::now();
        self.fps = 0.0;
    }

    pub fn tick(&mut self) {
        self.frames += 1;
        let elapsed = self.window_start.elapsed();
        if elapsed >= Duration::from_secs(1) {
            self.fps = self.frames as f32 / elapsed.as_secs_f32();
            self.frames = 0;
            self.window_start = Instant::now();
        }
    }

    pub fn value(&self) -> f32 {
        self.fps
    }
}

impl Default for FpsCounter {
    fn default() -> Self {
        Self::new()
    }
}

fn paint_for<'a>(gradient: &'a BuiltGradient, cx: f32, cy: f32) -> Paint<'a> {
    match gradient {
        BuiltGradient::Vertical(lut) => Paint::VGrad(lut),
        BuiltGradient::Horizontal(lut) => Paint::HGrad(lut),
        BuiltGradient::Radial(lut) => Paint::RGrad { lut, cx, cy },
    }
}

impl Analyzer {
    /// Render one frame. A no-op while the loop is stopped; the host calls
    /// this from its display refresh callback.
    pub fn render_frame(&mut self) {
        if !self.running {
            return;
        }
        self.source.advance();
        let channels = self.source.channels().min(2);

        // Math phase: update bar values, peaks and the energy accumulator.
        let mut energy_sum = 0.0f32;
        let mut energy_count = 0usize;
        for ch in 0..channels {
            self.fft_scratch.clear();
            self.fft_scratch.extend_from_slice(self.source.magnitudes(ch));
            for bar in &mut self.geometry.bars {
                let amp = bar_amplitude(
                    &self.fft_scratch,
                    bar.bin_lo,
                    bar.bin_hi,
                    bar.ratio_lo,
                    bar.ratio_hi,
                );
                bar.value[ch] = amp;
                update_peak(&mut bar.peak[ch], &mut bar.hold[ch], amp);
                energy_sum += amp;
                energy_count += 1;
            }
        }
        let average = if energy_count == 0 {
            0.0
        } else {
            energy_sum / energy_count as f32
        };
        self.energy.update(average);

        // Rotation speed follows the overall loudness.
        if self.config.radial && self.config.spin_speed != 0.0 {
            self.spin_angle += self.config.spin_speed * std::f32::consts::TAU / 3600.0
                * (0.5 + 1.5 * self.energy.val);
        }

        // Draw phase.
        self.canvas.clear(self.bg_color);
        let channel_h = self.channel_height();
        let analyzer_h = self.analyzer_height();
        let (w, h) = (self.canvas.width() as f32, self.canvas.height() as f32);
        let paint = paint_for(&self.gradient, w / 2.0, h / 2.0);

        for ch in 0..channels {
            let top = ch as f32 * channel_h;
            if self.config.radial {
                draw_radial(
                    &mut self.canvas,
                    &self.geometry.bars,
                    ch,
                    &self.config,
                    &paint,
                    self.spin_angle,
                );
            } else if self.config.mode == Mode::Graph {
                draw_graph(
                    &mut self.canvas,
                    &self.geometry.bars,
                    ch,
                    &self.config,
                    &paint,
                    top,
                    analyzer_h,
                    w,
                );
            } else {
                draw_bars(
                    &mut self.canvas,
                    &self.geometry.bars,
                    ch,
                    &self.config,
                    &self.leds,
                    &paint,
                    top,
                    channel_h,
                    analyzer_h,
                    self.pixel_ratio,
                );
            }

            // Reflection: flipped, alpha-blended, brightness-filtered copy
            // of the channel's analyzer band.
            if self.config.reflex_ratio > 0.0 && !self.config.lumi_bars && !self.config.radial {
                let src_y = top as u32;
                let src_h = analyzer_h as u32;
                let dst_y = (top + analyzer_h) as u32;
                let dst_h = (channel_h - analyzer_h).max(0.0) as u32;
                if self.config.reflex_fit {
                    self.canvas.reflect_band(
                        src_y,
                        src_h,
                        dst_y,
                        dst_h,
                        self.config.reflex_alpha,
                        self.config.reflex_bright,
                    );
                } else {
                    // Crop instead of scale: reflect only the bottom of the
                    // analyzer band, one source row per destination row.
                    let crop = dst_h.min(src_h);
                    self.canvas.reflect_band(
                        src_y + (src_h - crop),
                        crop,
                        dst_y,
                        crop,
                        self.config.reflex_alpha,
                        self.config.reflex_bright,
                    );
                }
            }
        }

        if self.config.mirror.is_active() {
            self.canvas
                .mirror_horizontal(self.config.mirror == Mirror::Left);
        }

        if self.config.show_scale_x {
            if self.config.radial {
                let overlay = std::mem::replace(&mut self.scale_r.canvas, Canvas::new(1, 1));
                self.canvas.blit(&overlay, 0, 0);
                self.scale_r.canvas = overlay;
            } else {
                let overlay = std::mem::replace(&mut self.scale_x.canvas, Canvas::new(1, 1));
                let y = h as i32 - overlay.height() as i32;
                self.canvas.blit(&overlay, 0, y);
                self.scale_x.canvas = overlay;
            }
        }

        self.fps.tick();
        let info = FrameInfo {
            energy: self.energy.val,
            peak_energy: self.energy.peak,
            fps: self.fps.value(),
            frame: self.frame_count,
        };
        if let Some(mut hook) = self.on_frame.take() {
            hook(&mut self.canvas, info);
            self.on_frame = Some(hook);
        }
        self.frame_count += 1;
    }
}

/// Rectangular bars, LED columns, lumi and outline variants.
#[allow(clippy::too_many_arguments)]
fn draw_bars(
    canvas: &mut Canvas,
    bars: &[Bar],
    ch: usize,
    cfg: &Config,
    leds: &LedParams,
    paint: &Paint,
    top: f32,
    channel_h: f32,
    analyzer_h: f32,
    pixel_ratio: f32,
) {
    let bottom = top + analyzer_h;
    let use_leds = cfg.led_bars && cfg.mode.is_bands() && cfg.mode != Mode::Graph;
    let cell = leds.led_height + leds.space_v;
    let peak_px = PEAK_THICKNESS * pixel_ratio;

    for bar in bars {
        let gap = bar.width * cfg.bar_space;
        let x = bar.pos_x + gap / 2.0;
        let bw = (bar.width - gap).max(1.0);
        let amp = bar.value[ch];

        if cfg.lumi_bars {
            canvas.fill_rect(x, top, bw, channel_h, paint, amp);
        } else if use_leds {
            let lx = x + leds.space_h / 2.0;
            let lw = (bw - leds.space_h).max(1.0);
            let lit = (amp * leds.count as f32).round() as usize;
            for led in 0..lit.min(leds.count) {
                let y = bottom - (led + 1) as f32 * cell + leds.space_v;
                canvas.fill_rect(lx, y, lw, leds.led_height, paint, 1.0);
            }
        } else {
            let height = amp * analyzer_h;
            let alpha = if cfg.alpha_bars { amp } else { 1.0 };
            if cfg.outline_bars {
                canvas.stroke_rect(x, bottom - height, bw, height, cfg.line_width.max(1.0), paint);
            } else {
                canvas.fill_rect(x, bottom - height, bw, height, paint, alpha);
            }
        }

        if cfg.show_peaks && !cfg.lumi_bars {
            let peak = bar.peak[ch];
            if peak > 0.0 {
                if use_leds {
                    // Snap the marker to the LED grid.
                    let led = ((peak * leds.count as f32).round() as usize).min(leds.count);
                    if led > 0 {
                        let y = bottom - led as f32 * cell + leds.space_v;
                        let lx = x + leds.space_h / 2.0;
                        let lw = (bw - leds.space_h).max(1.0);
                        canvas.fill_rect(lx, y, lw, leds.led_height, paint, 1.0);
                    }
                } else {
                    canvas.fill_rect(x, bottom - peak * analyzer_h - peak_px, bw, peak_px, paint, 1.0);
                }
            }
        }
    }
}

/// Mode 10: one connected outline across all bars with an optional area
/// fill down to the channel baseline.
#[allow(clippy::too_many_arguments)]
fn draw_graph(
    canvas: &mut Canvas,
    bars: &[Bar],
    ch: usize,
    cfg: &Config,
    paint: &Paint,
    top: f32,
    analyzer_h: f32,
    width: f32,
) {
    if bars.is_empty() {
        return;
    }
    let bottom = top + analyzer_h;
    let mut points: Vec<(f32, f32)> = Vec::with_capacity(bars.len() + 2);
    points.push((0.0, bottom - bars[0].value[ch] * analyzer_h));
    for bar in bars {
        points.push((
            bar.pos_x + bar.width / 2.0,
            bottom - bar.value[ch] * analyzer_h,
        ));
    }
    points.push((width, bottom - bars[bars.len() - 1].value[ch] * analyzer_h));

    if cfg.fill_alpha > 0.0 {
        let mut area = points.clone();
        area.push((width, bottom));
        area.push((0.0, bottom));
        canvas.fill_polygon(&area, paint, cfg.fill_alpha);
    }
    if cfg.line_width > 0.0 {
        canvas.stroke_polyline(&points, cfg.line_width, paint, 1.0);
    }
}

/// Radial layout: one wedge per bar around the base circle; in stereo the
/// second channel grows inward.
fn draw_radial(
    canvas: &mut Canvas,
    bars: &[Bar],
    ch: usize,
    cfg: &Config,
    paint: &Paint,
    spin: f32,
) {
    if bars.is_empty() {
        return;
    }
    let (w, h) = (canvas.width() as f32, canvas.height() as f32);
    let (cx, cy) = (w / 2.0, h / 2.0);
    let min_dim = w.min(h);
    let base = min_dim * RADIAL_BASE;
    let max_out = min_dim / 2.0 - base;
    let max_in = base * 0.95;

    let n = bars.len() as f32;
    let slice = std::f32::consts::TAU / n;
    let gap_angle = slice * cfg.bar_space / 2.0;

    for (i, bar) in bars.iter().enumerate() {
        let amp = bar.value[ch];
        let a0 = spin - std::f32::consts::FRAC_PI_2 + i as f32 * slice + gap_angle;
        let a1 = a0 + slice - 2.0 * gap_angle;
        let r1 = if ch == 0 {
            base + amp * max_out
        } else {
            base - amp * max_in
        };
        let wedge = wedge_points(cx, cy, a0, a1, base, r1);
        canvas.fill_polygon(&wedge, paint, if cfg.alpha_bars { amp } else { 1.0 });

        if cfg.show_peaks {
            let peak = bar.peak[ch];
            if peak > 0.0 {
                let rp = if ch == 0 {
                    base + peak * max_out
                } else {
                    base - peak * max_in
                };
                let marker = wedge_points(cx, cy, a0, a1, rp - 1.0, rp + 1.0);
                canvas.fill_polygon(&marker, paint, 1.0);
            }
        }
    }
}

fn wedge_points(cx: f32, cy: f32, a0: f32, a1: f32, r0: f32, r1: f32) -> [(f32, f32); 4] {
    let p = |angle: f32, radius: f32| (cx + angle.cos() * radius, cy + angle.sin() * radius);
    [p(a0, r0), p(a1, r0), p(a1, r1), p(a0, r1)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::bridge::{FixedSource, MagnitudeSource};
    use crate::config::ConfigPatch;
    use crate::display::HeadlessDisplay;

    fn test_analyzer(level: u8, stereo: bool) -> Analyzer {
        let config = Config {
            stereo,
            ..Config::default()
        };
        let channels = if stereo { 2 } else { 1 };
        let source = FixedSource::level(level, config.fft_size / 2, channels, 44100);
        let display = HeadlessDisplay::new(640, 270);
        let mut analyzer = Analyzer::new(config, Box::new(source), &display).unwrap();
        analyzer.start();
        analyzer
    }

    #[test]
    fn amplitude_of_silence_is_zero() {
        let fft = vec![0u8; 512];
        assert_eq!(bar_amplitude(&fft, 3, 10, 0.5, 0.25), 0.0);
    }

    #[test]
    fn amplitude_of_full_scale_is_one() {
        let fft = vec![255u8; 512];
        assert_eq!(bar_amplitude(&fft, 3, 10, 0.5, 0.25), 1.0);
    }

    #[test]
    fn amplitude_interpolates_edge_bins() {
        let mut fft = vec![0u8; 16];
        // Only the bin after the low edge carries signal.
        fft[4] = 200;
        // Bar covering exactly bin 3 with a 0.5 ratio into bin 4.
        let amp = bar_amplitude(&fft, 3, 3, 0.5, 0.0);
        assert!((amp - 100.0 / 255.0).abs() < 1e-6);
    }

    #[test]
    fn peak_holds_thirty_frames_then_decays() {
        let mut peak = 0.0f32;
        let mut hold = 0i32;
        update_peak(&mut peak, &mut hold, 0.8);
        assert_eq!(peak, 0.8);
        assert_eq!(hold, PEAK_HOLD_FRAMES);

        for _ in 0..PEAK_HOLD_FRAMES {
            update_peak(&mut peak, &mut hold, 0.0);
            assert_eq!(peak, 0.8, "peak must hold for the grace period");
        }
        update_peak(&mut peak, &mut hold, 0.0);
        assert!(peak < 0.8, "peak must start decaying after the hold");

        for _ in 0..200 {
            update_peak(&mut peak, &mut hold, 0.0);
        }
        assert_eq!(peak, 0.0, "peak must decay all the way to zero");
    }

    #[test]
    fn silent_frame_yields_zero_energy_and_no_peak() {
        let mut analyzer = test_analyzer(0, false);
        analyzer.render_frame();
        assert_eq!(analyzer.energy(), 0.0);
        assert_eq!(analyzer.peak_energy(), 0.0);
    }

    #[test]
    fn full_scale_frame_yields_unit_energy_and_held_peak() {
        let mut analyzer = test_analyzer(255, false);
        analyzer.render_frame();
        assert_eq!(analyzer.energy(), 1.0);
        assert_eq!(analyzer.peak_energy(), 1.0);
        assert_eq!(analyzer.energy.hold, PEAK_HOLD_FRAMES);
        // Every bar reports full value and a fresh hold.
        for bar in analyzer.bars() {
            assert_eq!(bar.value[0], 1.0);
            assert_eq!(bar.peak[0], 1.0);
            assert_eq!(bar.hold[0], PEAK_HOLD_FRAMES);
        }
    }

    #[test]
    fn stopped_analyzer_does_not_draw() {
        let mut analyzer = test_analyzer(255, false);
        analyzer.stop();
        analyzer.render_frame();
        assert_eq!(analyzer.energy(), 0.0);
        assert_eq!(analyzer.frame_count, 0);
    }

    #[test]
    fn band_energy_queries() {
        let mut analyzer = test_analyzer(255, false);
        analyzer.render_frame();
        assert_eq!(analyzer.band_energy("bass"), Some(1.0));
        assert_eq!(analyzer.band_energy("peak"), Some(1.0));
        assert_eq!(analyzer.band_energy("noSuchBand"), None);
        assert!((analyzer.energy_between(500.0, 2000.0) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn frame_hook_sees_the_frame() {
        use std::sync::Arc;
        use std::sync::atomic::{AtomicU32, Ordering};

        let mut analyzer = test_analyzer(255, false);
        let seen = Arc::new(AtomicU32::new(0));
        let seen_hook = seen.clone();
        analyzer.set_frame_hook(Some(Box::new(move |_canvas, info| {
            seen_hook.store((info.energy * 100.0) as u32, Ordering::SeqCst);
        })));
        analyzer.render_frame();
        assert_eq!(seen.load(Ordering::SeqCst), 100);
    }

    #[test]
    fn stereo_toggle_while_running_keeps_both_channels_fed() {
        let mut analyzer = test_analyzer(255, false);
        analyzer.render_frame();
        let patch = ConfigPatch {
            stereo: Some(true),
            ..Default::default()
        };
        analyzer.apply_patch(&patch).unwrap();
        assert_eq!(analyzer.source_mut().channels(), 2);
        analyzer.render_frame();
        // Second channel starts silent (fresh buffer) but is independent.
        let bars = analyzer.bars();
        assert!(bars.iter().all(|b| b.value[0] > 0.0 || b.value[1] >= 0.0));

        // Toggling to the same state is a no-op.
        let patch = ConfigPatch {
            stereo: Some(true),
            ..Default::default()
        };
        let dirty = analyzer.apply_patch(&patch).unwrap();
        assert!(!dirty.fft);
    }

    #[test]
    fn every_mode_renders_without_panicking() {
        for mode in [
            Mode::Discrete,
            Mode::Bands8,
            Mode::Octave,
            Mode::Graph,
        ] {
            for (radial, leds, lumi, outline) in [
                (false, false, false, false),
                (false, true, false, false),
                (false, false, true, false),
                (false, false, false, true),
                (true, false, false, false),
            ] {
                let mut analyzer = test_analyzer(200, true);
                let patch = ConfigPatch {
                    mode: Some(mode),
                    radial: Some(radial),
                    led_bars: Some(leds),
                    lumi_bars: Some(lumi),
                    outline_bars: Some(outline),
                    reflex_ratio: Some(0.3),
                    mirror: Some(Mirror::Left),
                    line_width: Some(2.0),
                    ..Default::default()
                };
                analyzer.apply_patch(&patch).unwrap();
                analyzer.render_frame();
                analyzer.render_frame();
            }
        }
    }

    #[test]
    fn unknown_gradient_patch_is_rejected_whole() {
        let mut analyzer = test_analyzer(0, false);
        let before_mode = analyzer.config().mode;
        let patch = ConfigPatch {
            gradient: Some("doesNotExist".into()),
            mode: Some(Mode::Octave),
            ..Default::default()
        };
        let err = analyzer.apply_patch(&patch).unwrap_err();
        assert_eq!(err.code(), "ERR_UNKNOWN_GRADIENT");
        assert_eq!(analyzer.config().mode, before_mode);
    }
}
