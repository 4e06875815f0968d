// src/audio/feed.rs
//! A wrapper source that tees audio samples into per-channel circular
//! buffers while passing them through to playback.
//!
//! This is the analyzer's input seam: a gain stage applied to every sample,
//! then a channel split routing left/right samples into their own ring
//! buffer (mono input feeds both). The audio thread is the only writer and
//! the render loop the only reader of each buffer. Playback continues
//! downstream unless the output is suppressed, in which case silence is
//! passed on but analysis still sees the real samples.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use ringbuf::{HeapRb, traits::*};
use rodio::Source;

use crate::analyzer::bridge::SampleBuffer;

/// Samples buffered per channel (~372 ms at 44.1 kHz).
pub const FEED_CAPACITY: usize = 16384;

/// Shared gain value, adjustable from any thread.
#[derive(Clone)]
pub struct Gain(Arc<AtomicU32>);

impl Gain {
    pub fn new(value: f32) -> Self {
        Self(Arc::new(AtomicU32::new(value.to_bits())))
    }

    pub fn get(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Relaxed))
    }

    pub fn set(&self, value: f32) {
        self.0.store(value.clamp(0.0, 1.0).to_bits(), Ordering::Relaxed);
    }
}

/// The two per-channel sample buffers the analyzer connects to.
#[derive(Clone)]
pub struct ChannelFeeds {
    pub left: SampleBuffer,
    pub right: SampleBuffer,
}

impl ChannelFeeds {
    pub fn new(capacity: usize) -> Self {
        Self {
            left: Arc::new(Mutex::new(HeapRb::new(capacity))),
            right: Arc::new(Mutex::new(HeapRb::new(capacity))),
        }
    }

    /// Buffers in channel order, for [`crate::analyzer::Analyzer::from_feeds`].
    pub fn buffers(&self) -> Vec<SampleBuffer> {
        vec![self.left.clone(), self.right.clone()]
    }

    pub fn clear(&self) {
        for buffer in [&self.left, &self.right] {
            if let Ok(mut rb) = buffer.lock() {
                rb.clear();
            }
        }
    }

    fn push(buffer: &SampleBuffer, sample: f32) {
        if let Ok(mut rb) = buffer.lock() {
            if rb.is_full() {
                let _ = rb.try_pop();
            }
            let _ = rb.try_push(sample);
        }
    }
}

impl Default for ChannelFeeds {
    fn default() -> Self {
        Self::new(FEED_CAPACITY)
    }
}

/// A pass-through source that captures gained samples into the feeds.
pub struct FeedSource<S> {
    source: S,
    feeds: ChannelFeeds,
    gain: Gain,
    output_enabled: Arc<AtomicBool>,
    position: u16,
}

impl<S> FeedSource<S>
where
    S: Source<Item = f32>,
{
    pub fn new(
        source: S,
        feeds: ChannelFeeds,
        gain: Gain,
        output_enabled: Arc<AtomicBool>,
    ) -> Self {
        Self {
            source,
            feeds,
            gain,
            output_enabled,
            position: 0,
        }
    }
}

impl<S> Iterator for FeedSource<S>
where
    S: Source<Item = f32>,
{
    type Item = f32;

    fn next(&mut self) -> Option<Self::Item> {
        let sample = self.source.next()? * self.gain.get();

        let channels = self.source.channels().max(1);
        match (channels, self.position) {
            // Mono feeds both analyzer channels.
            (1, _) => {
                ChannelFeeds::push(&self.feeds.left, sample);
                ChannelFeeds::push(&self.feeds.right, sample);
            }
            (_, 0) => ChannelFeeds::push(&self.feeds.left, sample),
            (_, 1) => ChannelFeeds::push(&self.feeds.right, sample),
            // Additional channels pass through unanalyzed.
            _ => {}
        }
        self.position = (self.position + 1) % channels;

        if self.output_enabled.load(Ordering::Relaxed) {
            Some(sample)
        } else {
            Some(0.0)
        }
    }
}

impl<S> Source for FeedSource<S>
where
    S: Source<Item = f32>,
{
    fn current_frame_len(&self) -> Option<usize> {
        self.source.current_frame_len()
    }

    fn channels(&self) -> u16 {
        self.source.channels()
    }

    fn sample_rate(&self) -> u32 {
        self.source.sample_rate()
    }

    fn total_duration(&self) -> Option<std::time::Duration> {
        self.source.total_duration()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    /// Minimal stereo test source: interleaved L=0.5, R=-0.5.
    struct StereoTone {
        remaining: usize,
    }

    impl Iterator for StereoTone {
        type Item = f32;

        fn next(&mut self) -> Option<f32> {
            if self.remaining == 0 {
                return None;
            }
            self.remaining -= 1;
            Some(if self.remaining % 2 == 1 { 0.5 } else { -0.5 })
        }
    }

    impl Source for StereoTone {
        fn current_frame_len(&self) -> Option<usize> {
            None
        }

        fn channels(&self) -> u16 {
            2
        }

        fn sample_rate(&self) -> u32 {
            44100
        }

        fn total_duration(&self) -> Option<Duration> {
            None
        }
    }

    #[test]
    fn stereo_samples_split_into_their_feeds() {
        let feeds = ChannelFeeds::new(64);
        let gain = Gain::new(1.0);
        let enabled = Arc::new(AtomicBool::new(true));
        let mut tee = FeedSource::new(
            StereoTone { remaining: 8 },
            feeds.clone(),
            gain,
            enabled,
        );
        while tee.next().is_some() {}

        let left = feeds.left.lock().unwrap();
        let right = feeds.right.lock().unwrap();
        assert_eq!(left.occupied_len(), 4);
        assert_eq!(right.occupied_len(), 4);
        assert!(left.iter().all(|&s| s == 0.5));
        assert!(right.iter().all(|&s| s == -0.5));
    }

    #[test]
    fn gain_scales_captured_samples() {
        let feeds = ChannelFeeds::new(64);
        let gain = Gain::new(0.5);
        let enabled = Arc::new(AtomicBool::new(true));
        let mut tee = FeedSource::new(
            StereoTone { remaining: 4 },
            feeds.clone(),
            gain,
            enabled,
        );
        assert_eq!(tee.next(), Some(0.25));
        let left = feeds.left.lock().unwrap();
        assert_eq!(left.iter().next().copied(), Some(0.25));
    }

    #[test]
    fn suppressed_output_still_feeds_the_analyzer() {
        let feeds = ChannelFeeds::new(64);
        let gain = Gain::new(1.0);
        let enabled = Arc::new(AtomicBool::new(false));
        let mut tee = FeedSource::new(
            StereoTone { remaining: 2 },
            feeds.clone(),
            gain,
            enabled,
        );
        // Playback hears silence...
        assert_eq!(tee.next(), Some(0.0));
        assert_eq!(tee.next(), Some(0.0));
        // ...but the analyzer sees the real samples.
        let left = feeds.left.lock().unwrap();
        assert_eq!(left.iter().next().copied(), Some(0.5));
    }
}
