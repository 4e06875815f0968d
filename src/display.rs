// src/display.rs
//! Injected display environment.
//!
//! The analyzer never talks to a real window or terminal; it queries an
//! implementation of [`DisplayEnv`] for the current surface size, pixel
//! density and fullscreen state. Hosts forward resize/fullscreen events
//! through a [`ResizeDebouncer`] so a continuous resize does not thrash the
//! geometry recomputation.

use std::time::{Duration, Instant};

/// Why the canvas dimensions changed; passed to the resize hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResizeReason {
    /// The containing surface was resized.
    Container,
    /// The caller set an explicit canvas size.
    Explicit,
    /// A fullscreen transition.
    Fullscreen,
}

/// Capability the analyzer queries for display properties.
pub trait DisplayEnv {
    /// Current surface size in logical pixels.
    fn size(&self) -> (u32, u32);

    /// Device pixel ratio (physical pixels per logical pixel).
    fn pixel_ratio(&self) -> f32 {
        1.0
    }

    fn is_fullscreen(&self) -> bool {
        false
    }
}

/// Fixed-size environment for tests and headless use.
#[derive(Debug, Clone, Copy)]
pub struct HeadlessDisplay {
    pub width: u32,
    pub height: u32,
    pub pixel_ratio: f32,
}

impl HeadlessDisplay {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixel_ratio: 1.0,
        }
    }
}

impl DisplayEnv for HeadlessDisplay {
    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn pixel_ratio(&self) -> f32 {
        self.pixel_ratio
    }
}

/// Default settle delay before a resize is acted upon.
pub const RESIZE_SETTLE: Duration = Duration::from_millis(60);

/// Collapses bursts of resize events into one, released only after the
/// stream of events has settled.
pub struct ResizeDebouncer {
    pending: Option<(Instant, ResizeReason)>,
    settle: Duration,
}

impl Default for ResizeDebouncer {
    fn default() -> Self {
        Self::new(RESIZE_SETTLE)
    }
}

impl ResizeDebouncer {
    pub fn new(settle: Duration) -> Self {
        Self {
            pending: None,
            settle,
        }
    }

    /// Record a resize event. A later event restarts the settle window; a
    /// fullscreen reason is kept over a container one.
    pub fn request(&mut self, reason: ResizeReason) {
        let reason = match self.pending {
            Some((_, ResizeReason::Fullscreen)) => ResizeReason::Fullscreen,
            _ => reason,
        };
        self.pending = Some((Instant::now(), reason));
    }

    /// Take the pending resize if the settle window has elapsed.
    pub fn ready(&mut self) -> Option<ResizeReason> {
        match self.pending {
            Some((at, reason)) if at.elapsed() >= self.settle => {
                self.pending = None;
                Some(reason)
            }
            _ => None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debouncer_holds_until_settled() {
        let mut deb = ResizeDebouncer::new(Duration::from_millis(20));
        deb.request(ResizeReason::Container);
        assert!(deb.ready().is_none(), "must not fire immediately");
        std::thread::sleep(Duration::from_millis(25));
        assert_eq!(deb.ready(), Some(ResizeReason::Container));
        assert!(deb.ready().is_none(), "fires once");
    }

    #[test]
    fn fullscreen_reason_wins_over_container() {
        let mut deb = ResizeDebouncer::new(Duration::from_millis(1));
        deb.request(ResizeReason::Fullscreen);
        deb.request(ResizeReason::Container);
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(deb.ready(), Some(ResizeReason::Fullscreen));
    }
}
