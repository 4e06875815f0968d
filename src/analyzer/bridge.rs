// src/analyzer/bridge.rs
//! Frequency analyzer bridge: one FFT unit per audio channel.
//!
//! Samples arrive over per-channel circular buffers written by the audio
//! thread (single writer) and read here on the render thread (single
//! reader). Each `advance()` takes the most recent window, applies a Hann
//! window and a forward FFT, smooths magnitudes across frames with an
//! exponential moving average, and normalizes them into bytes against the
//! configured decibel floor/ceiling: 0 at/below the floor, 255 at/above the
//! ceiling. Output length is always `fft_size / 2`.

use std::sync::{Arc, Mutex};

use log::debug;
use ringbuf::{HeapRb, traits::*};
use rustfft::{Fft, FftPlanner, num_complex::Complex};

/// Shared sample buffer for one channel, written by the audio feed.
pub type SampleBuffer = Arc<Mutex<HeapRb<f32>>>;

/// Map a frequency to its FFT bin, clamped to `[0, fft_size/2 - 2]`.
/// `round` selects round-to-nearest; otherwise the bin is floored.
pub fn freq_to_bin(freq: f32, fft_size: usize, sample_rate: u32, round: bool) -> usize {
    let exact = freq * fft_size as f32 / sample_rate as f32;
    let bin = if round { exact.round() } else { exact.floor() };
    (bin.max(0.0) as usize).min(fft_size / 2 - 2)
}

/// Center frequency of an FFT bin.
pub fn bin_to_freq(bin: usize, fft_size: usize, sample_rate: u32) -> f32 {
    bin as f32 * sample_rate as f32 / fft_size as f32
}

/// Per-frame magnitude provider, the seam between analysis and rendering.
/// The render loop only sees byte-normalized magnitude arrays, so tests can
/// substitute synthetic data for the FFT pipeline.
pub trait MagnitudeSource: Send {
    /// Compute a fresh frame for every active channel.
    fn advance(&mut self);

    fn channels(&self) -> usize;

    /// Switch between mono and stereo analysis. A no-op when the channel
    /// count already matches (duplicate connections must not glitch).
    fn set_channels(&mut self, count: usize);

    /// Output array length, `fft_size / 2`.
    fn bin_count(&self) -> usize;

    /// Last computed magnitudes for one channel.
    fn magnitudes(&self, channel: usize) -> &[u8];

    /// Reallocate for a new FFT window size.
    fn set_fft_size(&mut self, size: usize);

    fn set_smoothing(&mut self, smoothing: f32);

    fn set_db_range(&mut self, min_db: f32, max_db: f32);

    fn sample_rate(&self) -> u32;
}

struct ChannelState {
    feed: SampleBuffer,
    /// Linear magnitudes after smoothing, length fft_size/2.
    smoothed: Vec<f32>,
    /// Byte-normalized output, length fft_size/2.
    bytes: Vec<u8>,
}

impl ChannelState {
    fn new(feed: SampleBuffer, bins: usize) -> Self {
        Self {
            feed,
            smoothed: vec![0.0; bins],
            bytes: vec![0; bins],
        }
    }
}

/// FFT-backed magnitude source.
pub struct FftBridge {
    planner: FftPlanner<f32>,
    fft: Arc<dyn Fft<f32>>,
    fft_size: usize,
    sample_rate: u32,
    smoothing: f32,
    min_db: f32,
    max_db: f32,
    window: Vec<f32>,
    scratch: Vec<Complex<f32>>,
    samples: Vec<f32>,
    channels: Vec<ChannelState>,
    /// Feeds for channels 0 and 1; a mono feed is reused for both.
    feeds: Vec<SampleBuffer>,
}

impl FftBridge {
    pub fn new(
        fft_size: usize,
        sample_rate: u32,
        smoothing: f32,
        min_db: f32,
        max_db: f32,
        feeds: Vec<SampleBuffer>,
        stereo: bool,
    ) -> Self {
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(fft_size);
        let mut bridge = Self {
            planner,
            fft,
            fft_size,
            sample_rate,
            smoothing,
            min_db,
            max_db,
            window: hann_window(fft_size),
            scratch: vec![Complex::new(0.0, 0.0); fft_size],
            samples: vec![0.0; fft_size],
            channels: Vec::new(),
            feeds,
        };
        bridge.set_channels(if stereo { 2 } else { 1 });
        bridge
    }

    fn feed_for(&self, channel: usize) -> SampleBuffer {
        self.feeds
            .get(channel)
            .or_else(|| self.feeds.first())
            .cloned()
            .unwrap_or_else(|| Arc::new(Mutex::new(HeapRb::new(self.fft_size))))
    }

    /// Copy the most recent `fft_size` samples out of a feed without
    /// consuming them, zero-padding at the front when fewer are buffered.
    fn read_latest(&mut self, channel: usize) {
        self.samples.fill(0.0);
        let feed = self.channels[channel].feed.clone();
        if let Ok(buf) = feed.lock() {
            let available = buf.occupied_len();
            let take = available.min(self.fft_size);
            let skip = available - take;
            let offset = self.fft_size - take;
            for (i, sample) in buf.iter().skip(skip).take(take).enumerate() {
                self.samples[offset + i] = *sample;
            }
        }
    }
}

impl MagnitudeSource for FftBridge {
    fn advance(&mut self) {
        let bins = self.fft_size / 2;
        let scale = 1.0 / self.fft_size as f32;
        let db_span = self.max_db - self.min_db;
        for ch in 0..self.channels.len() {
            self.read_latest(ch);
            for (i, (&sample, &w)) in self.samples.iter().zip(&self.window).enumerate() {
                self.scratch[i] = Complex::new(sample * w, 0.0);
            }
            self.fft.process(&mut self.scratch);

            let state = &mut self.channels[ch];
            for bin in 0..bins {
                let c = self.scratch[bin];
                let mag = (c.re * c.re + c.im * c.im).sqrt() * scale;
                // Exponential moving average across frames.
                let smoothed =
                    self.smoothing * state.smoothed[bin] + (1.0 - self.smoothing) * mag;
                state.smoothed[bin] = smoothed;
                let db = 20.0 * smoothed.max(1e-10).log10();
                state.bytes[bin] =
                    (((db - self.min_db) / db_span).clamp(0.0, 1.0) * 255.0).round() as u8;
            }
        }
    }

    fn channels(&self) -> usize {
        self.channels.len()
    }

    fn set_channels(&mut self, count: usize) {
        let count = count.clamp(1, 2);
        if self.channels.len() == count {
            return;
        }
        debug!("analyzer channels: {} -> {}", self.channels.len(), count);
        let bins = self.fft_size / 2;
        while self.channels.len() < count {
            let feed = self.feed_for(self.channels.len());
            self.channels.push(ChannelState::new(feed, bins));
        }
        self.channels.truncate(count);
    }

    fn bin_count(&self) -> usize {
        self.fft_size / 2
    }

    fn magnitudes(&self, channel: usize) -> &[u8] {
        &self.channels[channel.min(self.channels.len() - 1)].bytes
    }

    fn set_fft_size(&mut self, size: usize) {
        if size == self.fft_size {
            return;
        }
        debug!("fft size: {} -> {}", self.fft_size, size);
        self.fft_size = size;
        self.fft = self.planner.plan_fft_forward(size);
        self.window = hann_window(size);
        self.scratch = vec![Complex::new(0.0, 0.0); size];
        self.samples = vec![0.0; size];
        let bins = size / 2;
        for state in &mut self.channels {
            state.smoothed = vec![0.0; bins];
            state.bytes = vec![0; bins];
        }
    }

    fn set_smoothing(&mut self, smoothing: f32) {
        self.smoothing = smoothing.clamp(0.0, 1.0);
    }

    fn set_db_range(&mut self, min_db: f32, max_db: f32) {
        self.min_db = min_db;
        self.max_db = max_db.max(min_db + 1.0);
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

fn hann_window(size: usize) -> Vec<f32> {
    (0..size)
        .map(|i| {
            0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / size as f32).cos())
        })
        .collect()
}

/// Magnitude source returning caller-supplied byte arrays, for tests and
/// offline rendering.
pub struct FixedSource {
    frames: Vec<Vec<u8>>,
    sample_rate: u32,
}

impl FixedSource {
    /// One frame per channel; all frames must share a power-of-two-over-two
    /// length.
    pub fn new(frames: Vec<Vec<u8>>, sample_rate: u32) -> Self {
        Self {
            frames,
            sample_rate,
        }
    }

    /// All channels at a constant byte level.
    pub fn level(level: u8, bins: usize, channels: usize, sample_rate: u32) -> Self {
        Self::new(vec![vec![level; bins]; channels], sample_rate)
    }

    pub fn set_level(&mut self, level: u8) {
        for frame in &mut self.frames {
            frame.fill(level);
        }
    }
}

impl MagnitudeSource for FixedSource {
    fn advance(&mut self) {}

    fn channels(&self) -> usize {
        self.frames.len()
    }

    fn set_channels(&mut self, count: usize) {
        let count = count.clamp(1, 2);
        let bins = self.bin_count();
        while self.frames.len() < count {
            self.frames.push(vec![0; bins]);
        }
        self.frames.truncate(count);
    }

    fn bin_count(&self) -> usize {
        self.frames.first().map(Vec::len).unwrap_or(0)
    }

    fn magnitudes(&self, channel: usize) -> &[u8] {
        &self.frames[channel.min(self.frames.len() - 1)]
    }

    fn set_fft_size(&mut self, size: usize) {
        for frame in &mut self.frames {
            frame.resize(size / 2, 0);
        }
    }

    fn set_smoothing(&mut self, _smoothing: f32) {}

    fn set_db_range(&mut self, _min_db: f32, _max_db: f32) {}

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed_with_sine(capacity: usize, bin: usize, fft_size: usize) -> SampleBuffer {
        let buffer = Arc::new(Mutex::new(HeapRb::new(capacity)));
        {
            let mut rb = buffer.lock().unwrap();
            for i in 0..capacity {
                let phase = 2.0 * std::f32::consts::PI * bin as f32 * i as f32 / fft_size as f32;
                let _ = rb.try_push(phase.sin());
            }
        }
        buffer
    }

    #[test]
    fn fft_size_change_resizes_output_arrays() {
        let feed: SampleBuffer = Arc::new(Mutex::new(HeapRb::new(1024)));
        let mut bridge = FftBridge::new(1024, 44100, 0.0, -85.0, -25.0, vec![feed], false);
        assert_eq!(bridge.bin_count(), 512);
        assert_eq!(bridge.magnitudes(0).len(), 512);

        bridge.set_fft_size(4096);
        assert_eq!(bridge.bin_count(), 2048);
        assert_eq!(bridge.magnitudes(0).len(), 2048);
    }

    #[test]
    fn sine_peaks_at_its_own_bin() {
        let fft_size = 1024;
        let bin = 100;
        let feed = feed_with_sine(fft_size, bin, fft_size);
        let mut bridge = FftBridge::new(fft_size, 44100, 0.0, -85.0, -25.0, vec![feed], false);
        bridge.advance();
        let bytes = bridge.magnitudes(0);
        // A full-scale sine sits well above the -25 dB ceiling at its bin.
        assert_eq!(bytes[bin], 255);
        // Far away from the tone the spectrum is at the floor.
        assert_eq!(bytes[400], 0);
    }

    #[test]
    fn empty_feed_yields_silence() {
        let feed: SampleBuffer = Arc::new(Mutex::new(HeapRb::new(256)));
        let mut bridge = FftBridge::new(256, 44100, 0.5, -85.0, -25.0, vec![feed], false);
        bridge.advance();
        assert!(bridge.magnitudes(0).iter().all(|&b| b == 0));
    }

    #[test]
    fn stereo_toggle_is_idempotent() {
        let feed: SampleBuffer = Arc::new(Mutex::new(HeapRb::new(256)));
        let mut bridge = FftBridge::new(256, 44100, 0.5, -85.0, -25.0, vec![feed], true);
        assert_eq!(bridge.channels(), 2);
        bridge.set_channels(2);
        assert_eq!(bridge.channels(), 2);
        bridge.set_channels(1);
        assert_eq!(bridge.channels(), 1);
        bridge.set_channels(2);
        assert_eq!(bridge.channels(), 2);
    }

    #[test]
    fn freq_to_bin_clamps_to_valid_range() {
        assert_eq!(freq_to_bin(0.0, 8192, 44100, true), 0);
        let top = freq_to_bin(f32::MAX, 8192, 44100, true);
        assert_eq!(top, 8192 / 2 - 2);
        // 1 kHz at 44.1 kHz / 8192 lands near bin 186.
        assert_eq!(freq_to_bin(1000.0, 8192, 44100, true), 186);
    }
}
