// src/config.rs
//! Analyzer configuration: the flat option set, partial updates, and
//! validation.
//!
//! Options are never mutated through individual side-effecting setters.
//! Callers build a [`ConfigPatch`] and apply it in one call; the patch is
//! validated first, then merged, and the returned [`Dirty`] flags tell the
//! analyzer which derived state (bar geometry, gradient, LED layout, FFT
//! buffers) must be recomputed. An invalid patch is rejected as a whole and
//! leaves the previous configuration untouched.

use crate::error::{Result, WavescopeError};

/// Valid FFT sizes are powers of two in this range.
pub const MIN_FFT_SIZE: usize = 32;
pub const MAX_FFT_SIZE: usize = 32768;

/// Display mode. The numeric values mirror the public option surface:
/// 0 is the discrete log-frequency analyzer, 1..=8 are octave-band modes of
/// decreasing resolution, 10 is the connected line/area graph. 9 is not a
/// valid mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Mode {
    /// One bar per distinct pixel column over the log frequency axis.
    Discrete = 0,
    /// 24 bands per octave (quarter tones).
    Bands24 = 1,
    /// 12 bands per octave.
    Bands12 = 2,
    /// 8 bands per octave.
    Bands8 = 3,
    /// 6 bands per octave.
    Bands6 = 4,
    /// 4 bands per octave.
    Bands4 = 5,
    /// 3 bands per octave.
    Bands3 = 6,
    /// 2 bands per octave.
    Bands2 = 7,
    /// Full octave bands.
    Octave = 8,
    /// Connected outline/area graph over quarter-tone bands.
    Graph = 10,
}

impl Mode {
    /// Parse a numeric mode, rejecting anything outside {0..8, 10}.
    pub fn from_u8(value: u8) -> Result<Self> {
        match value {
            0 => Ok(Self::Discrete),
            1 => Ok(Self::Bands24),
            2 => Ok(Self::Bands12),
            3 => Ok(Self::Bands8),
            4 => Ok(Self::Bands6),
            5 => Ok(Self::Bands4),
            6 => Ok(Self::Bands3),
            7 => Ok(Self::Bands2),
            8 => Ok(Self::Octave),
            10 => Ok(Self::Graph),
            other => Err(WavescopeError::InvalidMode(other)),
        }
    }

    /// Number of tempered-scale entries grouped into each bar, for the
    /// octave-band modes. `None` for the discrete analyzer.
    pub fn band_step(self) -> Option<usize> {
        match self {
            Self::Discrete => None,
            Self::Bands24 => Some(1),
            Self::Bands12 => Some(2),
            Self::Bands8 => Some(3),
            Self::Bands6 => Some(4),
            Self::Bands4 => Some(6),
            Self::Bands3 => Some(8),
            Self::Bands2 => Some(12),
            Self::Octave => Some(24),
            Self::Graph => Some(1),
        }
    }

    /// True for the modes that group bins by musical bands (1..=8 and 10).
    pub fn is_bands(self) -> bool {
        self.band_step().is_some()
    }
}

/// Horizontal mirror setting: reflect the left half over the right (`Left`),
/// the right half over the left (`Right`), or no mirroring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mirror {
    Left,
    #[default]
    None,
    Right,
}

impl Mirror {
    /// Parse from the numeric option value {-1, 0, 1}; anything else maps
    /// to `None`, matching the permissive source option.
    pub fn from_i8(value: i8) -> Self {
        match value {
            -1 => Self::Left,
            1 => Self::Right,
            _ => Self::None,
        }
    }

    pub fn is_active(self) -> bool {
        self != Self::None
    }
}

/// Custom LED parameters overriding the per-mode preset table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LedOverride {
    /// Requested maximum LED count per column.
    pub max_leds: usize,
    /// Vertical gap as a fraction of one LED cell.
    pub space_v_ratio: f32,
    /// Horizontal gap as a fraction of the bar width.
    pub space_h_ratio: f32,
}

/// The full flat analyzer configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// FFT window size per channel; power of two.
    pub fft_size: usize,
    /// Audio sample rate in Hz, fixed by the input stream.
    pub sample_rate: u32,
    /// Lowest displayed frequency (Hz).
    pub min_freq: f32,
    /// Highest displayed frequency (Hz).
    pub max_freq: f32,
    /// Decibel floor for byte normalization (maps to 0).
    pub min_decibels: f32,
    /// Decibel ceiling for byte normalization (maps to 255).
    pub max_decibels: f32,
    /// Exponential smoothing constant across frames, 0..1.
    pub smoothing: f32,
    /// Display mode.
    pub mode: Mode,
    /// Horizontal mirror setting.
    pub mirror: Mirror,
    /// Radial (circular) layout.
    pub radial: bool,
    /// Dual-channel analysis and display.
    pub stereo: bool,
    /// Full-height bars with magnitude encoded as opacity.
    pub lumi_bars: bool,
    /// Bars rendered as discrete stacked LED segments.
    pub led_bars: bool,
    /// Bars stroked as outlines instead of filled.
    pub outline_bars: bool,
    /// Bar opacity follows magnitude (at normal height).
    pub alpha_bars: bool,
    /// Gap between bars as a fraction of the bar width, 0..1.
    pub bar_space: f32,
    /// Stroke width for outlines and the mode-10 graph line.
    pub line_width: f32,
    /// Area fill opacity for the mode-10 graph.
    pub fill_alpha: f32,
    /// Fraction of each channel's height given to the reflection, [0, 1).
    pub reflex_ratio: f32,
    /// Reflection opacity.
    pub reflex_alpha: f32,
    /// Reflection brightness multiplier.
    pub reflex_bright: f32,
    /// Scale the reflection to fill its band instead of cropping it.
    pub reflex_fit: bool,
    /// Name of the active registered gradient.
    pub gradient: String,
    /// In stereo, give each channel the full gradient instead of splitting it.
    pub split_gradient: bool,
    /// Radial rotation speed, revolutions per minute at full energy.
    pub spin_speed: f32,
    /// Draw peak-hold markers.
    pub show_peaks: bool,
    /// Draw the frequency ruler.
    pub show_scale_x: bool,
    /// Output gain applied at the input seam, 0..1.
    pub volume: f32,
    /// Canvas resolution multiplier on top of the display pixel ratio.
    pub resolution: f32,
    /// Canvas width in pixels.
    pub width: u32,
    /// Canvas height in pixels.
    pub height: u32,
    /// Custom LED parameters; `None` selects the per-mode presets.
    pub led_override: Option<LedOverride>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            fft_size: 8192,
            sample_rate: 44100,
            min_freq: 20.0,
            max_freq: 22000.0,
            min_decibels: -85.0,
            max_decibels: -25.0,
            smoothing: 0.5,
            mode: Mode::Discrete,
            mirror: Mirror::None,
            radial: false,
            stereo: false,
            lumi_bars: false,
            led_bars: false,
            outline_bars: false,
            alpha_bars: false,
            bar_space: 0.1,
            line_width: 0.0,
            fill_alpha: 1.0,
            reflex_ratio: 0.0,
            reflex_alpha: 0.15,
            reflex_bright: 1.0,
            reflex_fit: true,
            gradient: "classic".into(),
            split_gradient: false,
            spin_speed: 0.0,
            show_peaks: true,
            show_scale_x: true,
            volume: 1.0,
            resolution: 1.0,
            width: 640,
            height: 270,
            led_override: None,
        }
    }
}

/// Partial configuration update. Unset fields keep their current value.
#[derive(Debug, Clone, Default)]
pub struct ConfigPatch {
    pub fft_size: Option<usize>,
    pub min_freq: Option<f32>,
    pub max_freq: Option<f32>,
    pub min_decibels: Option<f32>,
    pub max_decibels: Option<f32>,
    pub smoothing: Option<f32>,
    pub mode: Option<Mode>,
    pub mirror: Option<Mirror>,
    pub radial: Option<bool>,
    pub stereo: Option<bool>,
    pub lumi_bars: Option<bool>,
    pub led_bars: Option<bool>,
    pub outline_bars: Option<bool>,
    pub alpha_bars: Option<bool>,
    pub bar_space: Option<f32>,
    pub line_width: Option<f32>,
    pub fill_alpha: Option<f32>,
    pub reflex_ratio: Option<f32>,
    pub reflex_alpha: Option<f32>,
    pub reflex_bright: Option<f32>,
    pub reflex_fit: Option<bool>,
    pub gradient: Option<String>,
    pub split_gradient: Option<bool>,
    pub spin_speed: Option<f32>,
    pub show_peaks: Option<bool>,
    pub show_scale_x: Option<bool>,
    pub volume: Option<f32>,
    pub resolution: Option<f32>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub led_override: Option<Option<LedOverride>>,
}

/// Which derived state a merged patch invalidated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Dirty {
    /// Bar geometry (and everything downstream of it).
    pub geometry: bool,
    /// Gradient LUTs.
    pub gradient: bool,
    /// LED layout.
    pub leds: bool,
    /// FFT buffer reallocation / analyzer node settings.
    pub fft: bool,
    /// Canvas dimensions changed.
    pub canvas: bool,
}

impl Dirty {
    pub fn any(&self) -> bool {
        self.geometry || self.gradient || self.leds || self.fft || self.canvas
    }
}

impl Config {
    /// Validate a patch against the current configuration without applying
    /// it. Frequency bounds below 1 Hz and reflection ratios outside [0, 1)
    /// are rejected; a reversed frequency range is allowed (it is swapped on
    /// merge).
    pub fn validate(&self, patch: &ConfigPatch) -> Result<()> {
        for freq in [patch.min_freq, patch.max_freq].into_iter().flatten() {
            if freq < 1.0 {
                return Err(WavescopeError::FrequencyTooLow(freq));
            }
        }
        if let Some(ratio) = patch.reflex_ratio {
            if !(0.0..1.0).contains(&ratio) {
                return Err(WavescopeError::ReflexOutOfRange(ratio));
            }
        }
        Ok(())
    }

    /// Validate and merge a patch, returning the dirty flags for the fields
    /// that actually changed. On error nothing is merged.
    pub fn merge(&mut self, patch: &ConfigPatch) -> Result<Dirty> {
        self.validate(patch)?;

        let mut dirty = Dirty::default();

        if let Some(size) = patch.fft_size {
            let size = normalize_fft_size(size);
            if size != self.fft_size {
                self.fft_size = size;
                dirty.fft = true;
                dirty.geometry = true;
            }
        }

        // A reversed range is stored swapped so min_freq <= max_freq always.
        let (mut lo, mut hi) = (
            patch.min_freq.unwrap_or(self.min_freq),
            patch.max_freq.unwrap_or(self.max_freq),
        );
        if lo > hi {
            std::mem::swap(&mut lo, &mut hi);
        }
        if lo != self.min_freq || hi != self.max_freq {
            self.min_freq = lo;
            self.max_freq = hi;
            dirty.geometry = true;
        }

        if let Some(mode) = patch.mode {
            if mode != self.mode {
                self.mode = mode;
                dirty.geometry = true;
            }
        }

        if let Some(v) = patch.min_decibels {
            self.min_decibels = v.min(self.max_decibels - 1.0);
        }
        if let Some(v) = patch.max_decibels {
            self.max_decibels = v.max(self.min_decibels + 1.0);
        }
        if let Some(v) = patch.smoothing {
            self.smoothing = v.clamp(0.0, 1.0);
        }

        if let Some(v) = patch.mirror {
            if v != self.mirror {
                self.mirror = v;
                // The ruler bakes mirrored labels into its canvas.
                dirty.geometry = true;
            }
        }
        if let Some(v) = patch.radial {
            if v != self.radial {
                self.radial = v;
                dirty.gradient = true;
                dirty.leds = true;
            }
        }
        if let Some(v) = patch.stereo {
            if v != self.stereo {
                self.stereo = v;
                dirty.fft = true;
                dirty.gradient = true;
                dirty.leds = true;
            }
        }
        if let Some(v) = patch.lumi_bars {
            if v != self.lumi_bars {
                self.lumi_bars = v;
                dirty.gradient = true;
                dirty.leds = true;
            }
        }
        if let Some(v) = patch.led_bars {
            if v != self.led_bars {
                self.led_bars = v;
                dirty.leds = true;
            }
        }
        if let Some(v) = patch.outline_bars {
            self.outline_bars = v;
        }
        if let Some(v) = patch.alpha_bars {
            self.alpha_bars = v;
        }
        if let Some(v) = patch.bar_space {
            self.bar_space = v.clamp(0.0, 0.95);
        }
        if let Some(v) = patch.line_width {
            self.line_width = v.max(0.0);
        }
        if let Some(v) = patch.fill_alpha {
            self.fill_alpha = v.clamp(0.0, 1.0);
        }
        if let Some(v) = patch.reflex_ratio {
            if v != self.reflex_ratio {
                self.reflex_ratio = v;
                dirty.gradient = true;
                dirty.leds = true;
            }
        }
        if let Some(v) = patch.reflex_alpha {
            self.reflex_alpha = v.clamp(0.0, 1.0);
        }
        if let Some(v) = patch.reflex_bright {
            self.reflex_bright = v.max(0.0);
        }
        if let Some(v) = patch.reflex_fit {
            self.reflex_fit = v;
        }
        if let Some(name) = &patch.gradient {
            if *name != self.gradient {
                self.gradient = name.clone();
                dirty.gradient = true;
            }
        }
        if let Some(v) = patch.split_gradient {
            if v != self.split_gradient {
                self.split_gradient = v;
                dirty.gradient = true;
            }
        }
        if let Some(v) = patch.spin_speed {
            self.spin_speed = v;
        }
        if let Some(v) = patch.show_peaks {
            self.show_peaks = v;
        }
        if let Some(v) = patch.show_scale_x {
            self.show_scale_x = v;
        }
        if let Some(v) = patch.volume {
            self.volume = v.clamp(0.0, 1.0);
        }
        if let Some(v) = patch.resolution {
            let v = v.clamp(0.25, 4.0);
            if v != self.resolution {
                self.resolution = v;
                dirty.canvas = true;
                dirty.geometry = true;
            }
        }
        if let Some(w) = patch.width {
            if w != self.width {
                self.width = w.max(1);
                dirty.canvas = true;
                dirty.geometry = true;
            }
        }
        if let Some(h) = patch.height {
            if h != self.height {
                self.height = h.max(1);
                dirty.canvas = true;
                dirty.geometry = true;
            }
        }
        if let Some(over) = patch.led_override {
            if over != self.led_override {
                self.led_override = over;
                dirty.leds = true;
            }
        }

        // Geometry feeds the LED layout and the scale canvases.
        if dirty.geometry || dirty.canvas {
            dirty.leds = true;
            dirty.gradient = true;
        }

        Ok(dirty)
    }
}

/// Clamp to the valid range and round up to the next power of two.
fn normalize_fft_size(size: usize) -> usize {
    size.clamp(MIN_FFT_SIZE, MAX_FFT_SIZE).next_power_of_two()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_nine_is_rejected() {
        let err = Mode::from_u8(9).unwrap_err();
        assert_eq!(err.code(), "ERR_INVALID_MODE");
        for value in [0u8, 1, 2, 3, 4, 5, 6, 7, 8, 10] {
            assert!(Mode::from_u8(value).is_ok(), "mode {value} should parse");
        }
    }

    #[test]
    fn reversed_freq_range_is_swapped() {
        let mut cfg = Config::default();
        let patch = ConfigPatch {
            min_freq: Some(16000.0),
            max_freq: Some(30.0),
            ..Default::default()
        };
        cfg.merge(&patch).unwrap();
        assert_eq!(cfg.min_freq, 30.0);
        assert_eq!(cfg.max_freq, 16000.0);
    }

    #[test]
    fn low_frequency_is_rejected_without_mutation() {
        let mut cfg = Config::default();
        let before = cfg.clone();
        let patch = ConfigPatch {
            min_freq: Some(0.5),
            mode: Some(Mode::Octave),
            ..Default::default()
        };
        let err = cfg.merge(&patch).unwrap_err();
        assert_eq!(err.code(), "ERR_FREQUENCY_TOO_LOW");
        assert_eq!(cfg, before, "a rejected patch must not change anything");
    }

    #[test]
    fn reflex_ratio_must_stay_below_one() {
        let mut cfg = Config::default();
        let patch = ConfigPatch {
            reflex_ratio: Some(1.0),
            ..Default::default()
        };
        let err = cfg.merge(&patch).unwrap_err();
        assert_eq!(err.code(), "ERR_REFLEX_OUT_OF_RANGE");
        let patch = ConfigPatch {
            reflex_ratio: Some(0.4),
            ..Default::default()
        };
        assert!(cfg.merge(&patch).unwrap().gradient);
    }

    #[test]
    fn fft_size_change_marks_fft_and_geometry_dirty() {
        let mut cfg = Config::default();
        let patch = ConfigPatch {
            fft_size: Some(4096),
            ..Default::default()
        };
        let dirty = cfg.merge(&patch).unwrap();
        assert!(dirty.fft && dirty.geometry);
        assert_eq!(cfg.fft_size, 4096);

        // Odd sizes snap to the next power of two.
        let patch = ConfigPatch {
            fft_size: Some(5000),
            ..Default::default()
        };
        cfg.merge(&patch).unwrap();
        assert_eq!(cfg.fft_size, 8192);
    }

    #[test]
    fn unchanged_patch_is_clean() {
        let mut cfg = Config::default();
        let dirty = cfg.merge(&ConfigPatch::default()).unwrap();
        assert!(!dirty.any());
    }
}
