// src/analyzer/bars.rs
//! Bar geometry: maps FFT bins to visual columns.
//!
//! Two algorithms, selected by display mode. The discrete analyzer (mode 0)
//! creates one bar per distinct pixel column along the log-frequency axis,
//! merging bins that land on the same column. The band modes (1..=8 and 10)
//! walk a tempered scale of 24 steps per octave anchored near 16.35 Hz,
//! group consecutive scale entries per the mode's step count, and bind each
//! bar to the bin range spanned by its entries, with fractional ratios at
//! the edge bins for sub-bin precision.
//!
//! Geometry is rebuilt only when the mode, frequency range, FFT size or
//! canvas width changes; the per-frame fields (value/peak/hold) are mutated
//! in place across frames.

use crate::analyzer::bridge::{bin_to_freq, freq_to_bin};
use crate::config::Mode;

/// Frames a peak is held before it starts decaying.
pub const PEAK_HOLD_FRAMES: i32 = 30;

/// Entries in the tempered scale: 24 steps per octave over 11 octaves.
const SCALE_ENTRIES: usize = 264;

/// One visual column, bound to a range of FFT bins.
#[derive(Debug, Clone)]
pub struct Bar {
    /// Left edge in canvas pixels.
    pub pos_x: f32,
    /// Column width in pixels.
    pub width: f32,
    /// Lowest bound bin.
    pub bin_lo: usize,
    /// Highest bound bin.
    pub bin_hi: usize,
    /// Fraction into the bin after `bin_lo` where the bar really starts.
    pub ratio_lo: f32,
    /// Fraction into the bin after `bin_hi` where the bar really ends.
    pub ratio_hi: f32,
    /// Lowest bound frequency in Hz.
    pub freq_lo: f32,
    /// Highest bound frequency in Hz.
    pub freq_hi: f32,
    /// Current normalized value per channel.
    pub value: [f32; 2],
    /// Peak-hold value per channel.
    pub peak: [f32; 2],
    /// Frames remaining before the peak decays, per channel.
    pub hold: [i32; 2],
}

impl Bar {
    fn new(pos_x: f32, width: f32, bin_lo: usize, bin_hi: usize, freq_lo: f32, freq_hi: f32) -> Self {
        Self {
            pos_x,
            width,
            bin_lo,
            bin_hi,
            ratio_lo: 0.0,
            ratio_hi: 0.0,
            freq_lo,
            freq_hi,
            value: [0.0; 2],
            peak: [0.0; 2],
            hold: [0; 2],
        }
    }
}

/// The full ordered bar sequence plus the log-scale parameters used for
/// ruler label placement.
#[derive(Debug, Clone, Default)]
pub struct BarGeometry {
    pub bars: Vec<Bar>,
    /// log10 of the lowest displayed frequency.
    pub min_log: f32,
    /// Pixels per log10 unit across the canvas.
    pub log_width: f32,
}

impl BarGeometry {
    /// Horizontal pixel position of a frequency on the log axis.
    pub fn x_of_freq(&self, freq: f32) -> f32 {
        (freq.log10() - self.min_log) * self.log_width
    }
}

/// Compute the ordered bar sequence for the given configuration.
pub fn compute(
    mode: Mode,
    min_freq: f32,
    max_freq: f32,
    fft_size: usize,
    sample_rate: u32,
    canvas_width: f32,
) -> BarGeometry {
    let min_log = min_freq.log10();
    let log_width = canvas_width / (max_freq.log10() - min_log).max(f32::EPSILON);
    let bars = match mode.band_step() {
        None => discrete_bars(min_freq, max_freq, fft_size, sample_rate, min_log, log_width),
        Some(step) => band_bars(step, min_freq, max_freq, fft_size, sample_rate, canvas_width),
    };
    BarGeometry {
        bars,
        min_log,
        log_width,
    }
}

/// Mode 0: one bar per rounded pixel column between the min and max bins;
/// consecutive bins sharing a column merge into one bar.
fn discrete_bars(
    min_freq: f32,
    max_freq: f32,
    fft_size: usize,
    sample_rate: u32,
    min_log: f32,
    log_width: f32,
) -> Vec<Bar> {
    let min_bin = freq_to_bin(min_freq, fft_size, sample_rate, true);
    let max_bin = freq_to_bin(max_freq, fft_size, sample_rate, true);
    let mut bars: Vec<Bar> = Vec::with_capacity(max_bin - min_bin + 1);

    for bin in min_bin..=max_bin {
        let freq = bin_to_freq(bin, fft_size, sample_rate);
        let pos = ((freq.log10() - min_log) * log_width).round().max(0.0);
        match bars.last_mut() {
            Some(last) if last.pos_x == pos => {
                last.bin_hi = bin;
                last.freq_hi = freq;
            }
            _ => bars.push(Bar::new(pos, 1.0, bin, bin, freq, freq)),
        }
    }

    // Each column extends to its right neighbor.
    for i in 0..bars.len() {
        let next = bars.get(i + 1).map(|b| b.pos_x);
        if let Some(next_pos) = next {
            bars[i].width = (next_pos - bars[i].pos_x).max(1.0);
        }
    }
    bars
}

/// Modes 1..=8 and 10: tempered-scale grouping with gap filling.
fn band_bars(
    step: usize,
    min_freq: f32,
    max_freq: f32,
    fft_size: usize,
    sample_rate: u32,
    canvas_width: f32,
) -> Vec<Bar> {
    let scale = tempered_scale();
    let bin_limit = fft_size / 2 - 2;
    let mut bars: Vec<Bar> = Vec::new();

    let mut idx = 0;
    // Skip groups fully below the displayed range.
    while idx + step <= SCALE_ENTRIES && scale[idx + step - 1] < min_freq {
        idx += step;
    }

    while idx < SCALE_ENTRIES {
        let hi_idx = (idx + step - 1).min(SCALE_ENTRIES - 1);
        let freq_lo = scale[idx];
        let freq_hi = scale[hi_idx];
        if freq_hi > max_freq {
            break;
        }

        let exact_lo = freq_lo * fft_size as f32 / sample_rate as f32;
        let exact_hi = freq_hi * fft_size as f32 / sample_rate as f32;
        let bin_lo = exact_lo.floor().max(0.0) as usize;
        let bin_hi = exact_hi.floor().max(0.0) as usize;
        if bin_hi > bin_limit {
            break;
        }

        let mut bar = Bar::new(0.0, 0.0, bin_lo, bin_hi.max(bin_lo), freq_lo, freq_hi);
        bar.ratio_lo = exact_lo - bin_lo as f32;
        bar.ratio_hi = exact_hi - bin_hi as f32;
        bars.push(bar);
        idx += step;
    }

    fill_bin_gaps(&mut bars);

    // Terminal fix-up: the last band reaches one bin further so the top of
    // the displayed range is not starved.
    if let Some(last) = bars.last_mut() {
        if last.bin_hi < bin_limit {
            last.bin_hi += 1;
            last.ratio_hi = 0.0;
        }
    }

    // Band bars are evenly spaced across the canvas.
    let count = bars.len().max(1) as f32;
    let bar_width = canvas_width / count;
    for (i, bar) in bars.iter_mut().enumerate() {
        bar.pos_x = i as f32 * bar_width;
        bar.width = bar_width;
    }
    bars
}

/// Close unassigned bin gaps between neighbors by splitting each gap at its
/// midpoint, and pull overlapping ranges apart. Extended edges lose their
/// fractional ratio.
fn fill_bin_gaps(bars: &mut [Bar]) {
    for i in 1..bars.len() {
        let prev_hi = bars[i - 1].bin_hi;
        if bars[i].bin_lo > prev_hi + 1 {
            let mid = (prev_hi + bars[i].bin_lo) / 2;
            bars[i - 1].bin_hi = mid;
            bars[i - 1].ratio_hi = 0.0;
            bars[i].bin_lo = mid + 1;
            bars[i].ratio_lo = 0.0;
        } else if bars[i].bin_lo <= prev_hi {
            bars[i].bin_lo = prev_hi + 1;
            bars[i].ratio_lo = 0.0;
            if bars[i].bin_hi < bars[i].bin_lo {
                bars[i].bin_hi = bars[i].bin_lo;
                bars[i].ratio_hi = 0.0;
            }
        }
    }
}

/// 24-per-octave tempered scale anchored at C0 (~16.352 Hz), 264 entries.
fn tempered_scale() -> Vec<f32> {
    let root24 = 2f64.powf(1.0 / 24.0);
    let c0 = 440.0 * root24.powi(-114);
    (0..SCALE_ENTRIES as i32)
        .map(|i| (c0 * root24.powi(i)) as f32)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_invariants(geometry: &BarGeometry, label: &str) {
        let bars = &geometry.bars;
        assert!(!bars.is_empty(), "{label}: no bars computed");
        for (i, bar) in bars.iter().enumerate() {
            assert!(
                bar.bin_lo <= bar.bin_hi,
                "{label}: bar {i} has bin_lo {} > bin_hi {}",
                bar.bin_lo,
                bar.bin_hi
            );
            if i > 0 {
                assert!(
                    bars[i - 1].pos_x <= bar.pos_x,
                    "{label}: bar {i} out of order"
                );
                assert!(
                    bar.bin_lo > bars[i - 1].bin_hi,
                    "{label}: bar {i} bins overlap its neighbor ({} <= {})",
                    bar.bin_lo,
                    bars[i - 1].bin_hi
                );
            }
        }
    }

    #[test]
    fn scale_is_anchored_at_c0() {
        let scale = tempered_scale();
        assert_eq!(scale.len(), 264);
        assert!((scale[0] - 16.352).abs() < 0.01, "C0 was {}", scale[0]);
        // 114 quarter-tone steps above C0 is A4.
        assert!((scale[114] - 440.0).abs() < 0.01);
        // One octave is 24 entries.
        assert!((scale[24] / scale[0] - 2.0).abs() < 1e-3);
    }

    #[test]
    fn invariants_hold_for_all_modes_and_sizes() {
        let modes = [
            Mode::Discrete,
            Mode::Bands24,
            Mode::Bands12,
            Mode::Bands8,
            Mode::Bands6,
            Mode::Bands4,
            Mode::Bands3,
            Mode::Bands2,
            Mode::Octave,
            Mode::Graph,
        ];
        for mode in modes {
            for fft_size in [512usize, 2048, 8192, 32768] {
                for (lo, hi) in [(20.0, 22000.0), (30.0, 16000.0), (100.0, 4000.0)] {
                    let geometry = compute(mode, lo, hi, fft_size, 44100, 640.0);
                    assert_invariants(
                        &geometry,
                        &format!("mode {mode:?} fft {fft_size} range {lo}-{hi}"),
                    );
                }
            }
        }
    }

    #[test]
    fn discrete_merges_bins_sharing_a_column() {
        let geometry = compute(Mode::Discrete, 20.0, 22000.0, 8192, 44100, 640.0);
        // 8192-point FFT has far more bins in range than 640 columns; the
        // top of the range must have multi-bin bars.
        let multi = geometry.bars.iter().filter(|b| b.bin_hi > b.bin_lo).count();
        assert!(multi > 0, "expected merged bars");
        // No two bars share a pixel column.
        for pair in geometry.bars.windows(2) {
            assert!(pair[0].pos_x < pair[1].pos_x);
        }
    }

    #[test]
    fn octave_mode_yields_about_ten_bands_at_default_range() {
        let geometry = compute(Mode::Octave, 20.0, 22000.0, 8192, 44100, 640.0);
        let n = geometry.bars.len();
        assert!(
            (9..=11).contains(&n),
            "expected ~10 octave bands over 20-22000 Hz, got {n}"
        );
    }

    #[test]
    fn band_count_scales_with_resolution() {
        let full = compute(Mode::Bands24, 20.0, 22000.0, 8192, 44100, 640.0)
            .bars
            .len();
        let halves = compute(Mode::Bands12, 20.0, 22000.0, 8192, 44100, 640.0)
            .bars
            .len();
        assert!(full > halves * 3 / 2, "24-band mode should be much denser");
    }

    #[test]
    fn gap_fill_splits_at_midpoint() {
        let mut bars = vec![
            Bar::new(0.0, 1.0, 2, 4, 0.0, 0.0),
            Bar::new(1.0, 1.0, 11, 12, 0.0, 0.0),
        ];
        bars[1].ratio_lo = 0.7;
        fill_bin_gaps(&mut bars);
        // Gap 5..=10 splits at (4 + 11) / 2 = 7.
        assert_eq!(bars[0].bin_hi, 7);
        assert_eq!(bars[1].bin_lo, 8);
        assert_eq!(bars[0].ratio_hi, 0.0);
        assert_eq!(bars[1].ratio_lo, 0.0);
    }

    #[test]
    fn freq_positions_follow_log_scale() {
        let geometry = compute(Mode::Discrete, 20.0, 20000.0, 8192, 44100, 600.0);
        let x1k = geometry.x_of_freq(1000.0);
        let x10k = geometry.x_of_freq(10000.0);
        // One decade apart on a log axis is a constant pixel distance.
        let decade = geometry.log_width;
        assert!((x10k - x1k - decade).abs() < 0.5);
    }
}
