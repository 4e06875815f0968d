// src/analyzer/mod.rs
//! Real-time audio spectrum analyzer and renderer.
//!
//! The [`Analyzer`] owns the pixel canvas, the bar geometry, the gradient
//! and LED layouts and the per-frame render pass. It pulls byte-normalized
//! magnitudes from a [`MagnitudeSource`] (normally the FFT bridge fed by the
//! audio thread) once per render callback. Configuration changes go through
//! [`Analyzer::apply_patch`], which recomputes only the derived state the
//! patch invalidated; per-frame rendering never recomputes geometry.

pub mod bars;
pub mod bridge;
pub mod gradient;
pub mod leds;
pub mod render;
pub mod scales;

use log::{debug, info};

use crate::canvas::{Canvas, Color, rgb};
use crate::config::{Config, ConfigPatch, Dirty};
use crate::display::{DisplayEnv, ResizeReason};
use crate::error::{Result, WavescopeError};

use bars::BarGeometry;
use bridge::{FftBridge, MagnitudeSource, SampleBuffer, freq_to_bin};
use gradient::{BuiltGradient, GradientDef, GradientLayout, GradientRegistry};
use leds::LedParams;
use render::{Energy, FpsCounter};
use scales::{RadialScale, XAxisScale};

/// Height of the X-axis ruler strip in logical pixels.
const SCALE_HEIGHT: f32 = 20.0;

/// Snapshot of one bar for callers, without the internal bin bookkeeping.
#[derive(Debug, Clone, Copy)]
pub struct BarSnapshot {
    pub pos_x: f32,
    pub freq_lo: f32,
    pub freq_hi: f32,
    pub value: [f32; 2],
    pub peak: [f32; 2],
    pub hold: [i32; 2],
}

/// Per-frame data handed to the frame hook.
#[derive(Debug, Clone, Copy)]
pub struct FrameInfo {
    pub energy: f32,
    pub peak_energy: f32,
    pub fps: f32,
    pub frame: u64,
}

/// Hook invoked after each rendered frame, for caller-drawn overlays.
pub type FrameHook = Box<dyn FnMut(&mut Canvas, FrameInfo) + Send>;

/// Hook invoked when the canvas dimensions change.
pub type ResizeHook = Box<dyn FnMut(ResizeReason, u32, u32) + Send>;

pub struct Analyzer {
    config: Config,
    source: Box<dyn MagnitudeSource>,
    registry: GradientRegistry,

    // Derived state, rebuilt on configuration change only.
    pub(crate) geometry: BarGeometry,
    pub(crate) leds: LedParams,
    pub(crate) gradient: BuiltGradient,
    pub(crate) bg_color: Color,
    pub(crate) scale_x: XAxisScale,
    pub(crate) scale_r: RadialScale,
    pub(crate) pixel_ratio: f32,

    // Frame state.
    pub(crate) canvas: Canvas,
    pub(crate) energy: Energy,
    pub(crate) fps: FpsCounter,
    pub(crate) running: bool,
    pub(crate) frame_count: u64,
    pub(crate) spin_angle: f32,
    pub(crate) fft_scratch: Vec<u8>,
    pub(crate) on_frame: Option<FrameHook>,
    on_resize: Option<ResizeHook>,
}

impl Analyzer {
    /// Build an analyzer over an arbitrary magnitude source. Fails fast on
    /// an unknown gradient name; no partially constructed analyzer is left
    /// behind.
    pub fn new(
        config: Config,
        mut source: Box<dyn MagnitudeSource>,
        display: &dyn DisplayEnv,
    ) -> Result<Self> {
        let registry = GradientRegistry::new();
        registry.get(&config.gradient)?;

        source.set_fft_size(config.fft_size);
        source.set_smoothing(config.smoothing);
        source.set_db_range(config.min_decibels, config.max_decibels);
        source.set_channels(if config.stereo { 2 } else { 1 });

        let pixel_ratio = display.pixel_ratio() * config.resolution;
        let width = (config.width as f32 * pixel_ratio).round().max(1.0) as u32;
        let height = (config.height as f32 * pixel_ratio).round().max(1.0) as u32;

        let mut analyzer = Self {
            config,
            source,
            registry,
            geometry: BarGeometry::default(),
            leds: LedParams::default(),
            gradient: BuiltGradient::Vertical(vec![rgb(255, 255, 255)]),
            bg_color: rgb(17, 17, 17),
            scale_x: XAxisScale {
                canvas: Canvas::new(1, 1),
                labels: Vec::new(),
            },
            scale_r: RadialScale {
                canvas: Canvas::new(1, 1),
            },
            pixel_ratio,
            canvas: Canvas::new(width, height),
            energy: Energy::default(),
            fps: FpsCounter::new(),
            running: false,
            frame_count: 0,
            spin_angle: 0.0,
            fft_scratch: Vec::new(),
            on_frame: None,
            on_resize: None,
        };
        analyzer.rebuild_geometry();
        analyzer.rebuild_gradient()?;
        info!(
            "analyzer ready: {}x{} canvas, {} bars, mode {:?}",
            width,
            height,
            analyzer.geometry.bars.len(),
            analyzer.config.mode
        );
        Ok(analyzer)
    }

    /// Build an analyzer over live audio feeds (one buffer for mono, two
    /// for stereo).
    pub fn from_feeds(
        config: Config,
        feeds: Vec<SampleBuffer>,
        display: &dyn DisplayEnv,
    ) -> Result<Self> {
        if feeds.is_empty() {
            return Err(WavescopeError::InvalidAudioSource(
                "no sample feeds connected".into(),
            ));
        }
        let bridge = FftBridge::new(
            config.fft_size,
            config.sample_rate,
            config.smoothing,
            config.min_decibels,
            config.max_decibels,
            feeds,
            config.stereo,
        );
        Self::new(config, Box::new(bridge), display)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Apply a partial configuration update. The patch is validated before
    /// anything is touched; only the derived state it invalidates is
    /// recomputed.
    pub fn apply_patch(&mut self, patch: &ConfigPatch) -> Result<Dirty> {
        // An unknown gradient name must reject the whole patch up front.
        if let Some(name) = &patch.gradient {
            self.registry.get(name)?;
        }
        let dirty = self.config.merge(patch)?;

        if dirty.fft {
            self.source.set_fft_size(self.config.fft_size);
            self.source
                .set_channels(if self.config.stereo { 2 } else { 1 });
        }
        self.source.set_smoothing(self.config.smoothing);
        self.source
            .set_db_range(self.config.min_decibels, self.config.max_decibels);

        if dirty.canvas {
            let width =
                (self.config.width as f32 * self.pixel_ratio).round().max(1.0) as u32;
            let height =
                (self.config.height as f32 * self.pixel_ratio).round().max(1.0) as u32;
            self.canvas.resize(width, height);
            self.fire_resize(ResizeReason::Explicit);
        }
        if dirty.geometry || dirty.canvas {
            self.rebuild_geometry();
        } else if dirty.leds {
            self.rebuild_leds();
        }
        if dirty.gradient {
            self.rebuild_gradient()?;
        }
        if dirty.any() {
            debug!("config patch applied: {dirty:?}");
        }
        Ok(dirty)
    }

    /// Resize the canvas to track the display surface. Callers should
    /// debounce bursts through a [`crate::display::ResizeDebouncer`].
    pub fn resize(&mut self, width: u32, height: u32, reason: ResizeReason) {
        if width == self.config.width && height == self.config.height {
            return;
        }
        self.config.width = width.max(1);
        self.config.height = height.max(1);
        let pw = (width as f32 * self.pixel_ratio).round().max(1.0) as u32;
        let ph = (height as f32 * self.pixel_ratio).round().max(1.0) as u32;
        self.canvas.resize(pw, ph);
        self.rebuild_geometry();
        // Geometry feeds the gradient layout; the active name is known good.
        let _ = self.rebuild_gradient();
        self.fire_resize(reason);
    }

    fn fire_resize(&mut self, reason: ResizeReason) {
        let (w, h) = (self.canvas.width(), self.canvas.height());
        if let Some(mut hook) = self.on_resize.take() {
            hook(reason, w, h);
            self.on_resize = Some(hook);
        }
    }

    /// Register a gradient; if it is the active one the LUT is rebuilt
    /// immediately.
    pub fn register_gradient(&mut self, name: &str, def: GradientDef) -> Result<()> {
        self.registry.register(name, def)?;
        if name == self.config.gradient {
            self.rebuild_gradient()?;
        }
        Ok(())
    }

    pub fn gradient_names(&self) -> Vec<&str> {
        self.registry.names()
    }

    // ── render loop state machine ──

    /// Enter the running state and reset the frame/FPS counters. The host
    /// must call [`render::Analyzer::render_frame`] once per display refresh
    /// callback while running.
    pub fn start(&mut self) {
        if !self.running {
            self.running = true;
            self.frame_count = 0;
            self.fps.reset();
            debug!("render loop started");
        }
    }

    /// Leave the running state; pending frames are no longer drawn.
    pub fn stop(&mut self) {
        if self.running {
            self.running = false;
            debug!("render loop stopped");
        }
    }

    pub fn toggle(&mut self) -> bool {
        if self.running {
            self.stop()
        } else {
            self.start()
        }
        self.running
    }

    pub fn is_on(&self) -> bool {
        self.running
    }

    // ── hooks ──

    pub fn set_frame_hook(&mut self, hook: Option<FrameHook>) {
        self.on_frame = hook;
    }

    pub fn set_resize_hook(&mut self, hook: Option<ResizeHook>) {
        self.on_resize = hook;
    }

    // ── queryable outputs ──

    /// Current frame as an image for display.
    pub fn frame_image(&self) -> image::DynamicImage {
        self.canvas.to_image()
    }

    pub fn fps(&self) -> f32 {
        self.fps.value()
    }

    /// Ruler labels for hosts that overlay real text.
    pub fn scale_labels(&self) -> &[scales::ScaleLabel] {
        &self.scale_x.labels
    }

    /// Snapshot of the current bars.
    pub fn bars(&self) -> Vec<BarSnapshot> {
        self.geometry
            .bars
            .iter()
            .map(|bar| BarSnapshot {
                pos_x: bar.pos_x,
                freq_lo: bar.freq_lo,
                freq_hi: bar.freq_hi,
                value: bar.value,
                peak: bar.peak,
                hold: bar.hold,
            })
            .collect()
    }

    /// Last computed instantaneous energy: the average bar value, 0..1.
    pub fn energy(&self) -> f32 {
        self.energy.val
    }

    /// Last peak energy, held and decayed with the same policy as bar peaks.
    pub fn peak_energy(&self) -> f32 {
        self.energy.peak
    }

    /// Energy in a named preset band, or `None` for an unknown name.
    /// `"peak"` returns the held peak energy.
    pub fn band_energy(&self, band: &str) -> Option<f32> {
        let (lo, hi) = match band {
            "peak" => return Some(self.energy.peak),
            "bass" => (20.0, 250.0),
            "lowMid" => (250.0, 500.0),
            "mid" => (500.0, 2000.0),
            "highMid" => (2000.0, 4000.0),
            "treble" => (4000.0, 16000.0),
            _ => return None,
        };
        Some(self.energy_between(lo, hi))
    }

    /// Mean normalized magnitude across the bins covering an explicit
    /// frequency range, averaged over the active channels.
    pub fn energy_between(&self, start_freq: f32, end_freq: f32) -> f32 {
        let (lo, hi) = if start_freq <= end_freq {
            (start_freq, end_freq)
        } else {
            (end_freq, start_freq)
        };
        let fft_size = self.source.bin_count() * 2;
        let sample_rate = self.source.sample_rate();
        let bin_lo = freq_to_bin(lo, fft_size, sample_rate, true);
        let bin_hi = freq_to_bin(hi, fft_size, sample_rate, true).max(bin_lo);

        let mut sum = 0.0f32;
        let mut count = 0usize;
        for ch in 0..self.source.channels() {
            let bytes = self.source.magnitudes(ch);
            for bin in bin_lo..=bin_hi.min(bytes.len().saturating_sub(1)) {
                sum += bytes[bin] as f32 / 255.0;
                count += 1;
            }
        }
        if count == 0 { 0.0 } else { sum / count as f32 }
    }

    // ── derived-state rebuilds ──

    pub(crate) fn channel_height(&self) -> f32 {
        let h = self.canvas.height() as f32;
        if self.config.stereo { (h / 2.0).floor() } else { h }
    }

    pub(crate) fn analyzer_height(&self) -> f32 {
        let channel_h = self.channel_height();
        if self.config.lumi_bars || self.config.radial {
            channel_h
        } else {
            (channel_h * (1.0 - self.config.reflex_ratio)).floor()
        }
    }

    fn rebuild_geometry(&mut self) {
        self.geometry = bars::compute(
            self.config.mode,
            self.config.min_freq,
            self.config.max_freq,
            self.config.fft_size,
            self.config.sample_rate,
            self.canvas.width() as f32,
        );
        self.rebuild_leds();
        self.rebuild_scales();
    }

    fn rebuild_leds(&mut self) {
        let bar_width = self
            .geometry
            .bars
            .first()
            .map(|bar| bar.width)
            .unwrap_or(1.0);
        // Room for one extra spacing unit when a single channel is shown,
        // or when the reflection band frees vertical space.
        let maximize = !self.config.stereo
            || (self.config.reflex_ratio > 0.0 && !self.config.lumi_bars);
        self.leds = leds::compute(
            self.config.mode,
            self.analyzer_height(),
            bar_width,
            self.pixel_ratio,
            self.config.led_override,
            maximize,
        );
    }

    fn rebuild_scales(&mut self) {
        let width = self.canvas.width();
        let height = self.canvas.height();
        let scale_h = (SCALE_HEIGHT * self.pixel_ratio).round() as u32;
        self.scale_x = scales::build_x_scale(
            width,
            scale_h,
            &self.geometry,
            self.config.mirror,
            self.pixel_ratio,
        );
        let radius = width.min(height) as f32 * 0.45;
        self.scale_r =
            scales::build_radial_scale(width, height, radius, &self.geometry, self.pixel_ratio);
    }

    fn rebuild_gradient(&mut self) -> Result<()> {
        let def = self.registry.get(&self.config.gradient)?;
        let layout = GradientLayout {
            width: self.canvas.width(),
            height: self.canvas.height(),
            radial: self.config.radial,
            stereo: self.config.stereo,
            split: self.config.split_gradient,
            lumi: self.config.lumi_bars,
            reflex_ratio: self.config.reflex_ratio,
        };
        self.gradient = gradient::build(def, &layout);
        self.bg_color = def.bg_color;
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn source_mut(&mut self) -> &mut dyn MagnitudeSource {
        self.source.as_mut()
    }
}
