// src/audio/mod.rs
//! Audio input/output seam: playback, gain and the per-channel sample feeds
//! the analyzer reads from.

pub mod feed;
pub mod player;

pub use feed::{ChannelFeeds, FeedSource, Gain};
pub use player::MusicPlayer;
