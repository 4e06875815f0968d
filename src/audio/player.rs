// src/audio/player.rs
//! Playback engine: a dedicated audio thread owning the output stream,
//! driven over a command channel, with every decoded sample teed through
//! the analyzer feeds.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Sender};
use std::sync::Arc;
use std::thread;

use log::warn;
use rodio::{Decoder, OutputStream, Sink, Source};

use super::feed::{ChannelFeeds, FeedSource, Gain};
use crate::error::{Result, WavescopeError};

type BoxedSource = Box<dyn Source<Item = f32> + Send>;

/// Commands sent to the audio playback thread.
enum PlayerCommand {
    Play(BoxedSource),
    Pause,
    Resume,
    Stop,
}

/// Simple player that can `play()`, `pause()`, `resume()` or `stop()` a
/// file, stopping any prior playback. Decoded samples are captured into the
/// shared [`ChannelFeeds`] for the analyzer.
pub struct MusicPlayer {
    cmd_tx: Sender<PlayerCommand>,
    /// Flags mirrored from the audio thread for quick UI access.
    is_playing_flag: Arc<AtomicBool>,
    is_paused_flag: Arc<AtomicBool>,
    output_enabled: Arc<AtomicBool>,
    gain: Gain,
    feeds: ChannelFeeds,
}

impl MusicPlayer {
    /// Create an idle player. Fails if the system audio output cannot be
    /// opened; no thread is left running in that case.
    pub fn new(feeds: ChannelFeeds) -> Result<Self> {
        let (tx, rx) = mpsc::channel::<PlayerCommand>();
        let (ready_tx, ready_rx) = mpsc::channel::<std::result::Result<(), String>>();

        let is_playing_flag = Arc::new(AtomicBool::new(false));
        let is_paused_flag = Arc::new(AtomicBool::new(false));

        let playing = is_playing_flag.clone();
        let paused = is_paused_flag.clone();

        // The audio thread owns the OutputStream; it is not Send, so it is
        // created there and the outcome reported back once.
        thread::spawn(move || {
            let (stream, handle) = match OutputStream::try_default() {
                Ok(pair) => {
                    let _ = ready_tx.send(Ok(()));
                    pair
                }
                Err(err) => {
                    let _ = ready_tx.send(Err(err.to_string()));
                    return;
                }
            };

            let mut sink: Option<Sink> = None;

            while let Ok(cmd) = rx.recv() {
                match cmd {
                    PlayerCommand::Play(source) => {
                        if let Some(s) = sink.take() {
                            s.stop();
                        }
                        match Sink::try_new(&handle) {
                            Ok(new_sink) => {
                                new_sink.append(source);
                                new_sink.play();
                                playing.store(true, Ordering::SeqCst);
                                paused.store(false, Ordering::SeqCst);
                                sink = Some(new_sink);
                            }
                            Err(err) => warn!("could not create playback sink: {err}"),
                        }
                    }
                    PlayerCommand::Pause => {
                        if let Some(s) = &sink {
                            s.pause();
                            paused.store(true, Ordering::SeqCst);
                        }
                    }
                    PlayerCommand::Resume => {
                        if let Some(s) = &sink {
                            s.play();
                            paused.store(false, Ordering::SeqCst);
                        }
                    }
                    PlayerCommand::Stop => {
                        if let Some(s) = sink.take() {
                            s.stop();
                        }
                        playing.store(false, Ordering::SeqCst);
                        paused.store(false, Ordering::SeqCst);
                    }
                }
            }
            if let Some(s) = sink.take() {
                s.stop();
            }
            drop(stream);
        });

        match ready_rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(msg)) => return Err(WavescopeError::AudioOutputFail(msg)),
            Err(_) => {
                return Err(WavescopeError::AudioOutputFail(
                    "audio thread exited before startup".into(),
                ));
            }
        }

        Ok(Self {
            cmd_tx: tx,
            is_playing_flag,
            is_paused_flag,
            output_enabled: Arc::new(AtomicBool::new(true)),
            gain: Gain::new(1.0),
            feeds,
        })
    }

    /// Stop any existing playback and start playing `path`. The file is
    /// decoded on the caller's thread so decode failures surface here.
    pub fn play(&mut self, path: &Path) -> Result<()> {
        let file = File::open(path)
            .map_err(|err| WavescopeError::InvalidAudioSource(err.to_string()))?;
        let decoder = Decoder::new(BufReader::new(file))
            .map_err(|err| WavescopeError::InvalidAudioSource(err.to_string()))?;

        self.feeds.clear();
        let tee = FeedSource::new(
            decoder.convert_samples::<f32>(),
            self.feeds.clone(),
            self.gain.clone(),
            self.output_enabled.clone(),
        );
        let _ = self.cmd_tx.send(PlayerCommand::Play(Box::new(tee)));
        Ok(())
    }

    pub fn pause(&mut self) {
        let _ = self.cmd_tx.send(PlayerCommand::Pause);
    }

    pub fn resume(&mut self) {
        let _ = self.cmd_tx.send(PlayerCommand::Resume);
    }

    /// Immediately halt playback (if any).
    pub fn stop(&mut self) {
        let _ = self.cmd_tx.send(PlayerCommand::Stop);
    }

    /// Output gain; applied at the tee, before the analyzer split, so the
    /// display follows the audible level.
    pub fn set_volume(&mut self, volume: f32) {
        self.gain.set(volume);
    }

    /// Route (or stop routing) the processed signal to the speakers. The
    /// analyzer keeps receiving samples either way.
    pub fn set_output_enabled(&mut self, enabled: bool) {
        self.output_enabled.store(enabled, Ordering::SeqCst);
    }

    pub fn is_playing(&self) -> bool {
        self.is_playing_flag.load(Ordering::SeqCst)
    }

    pub fn is_paused(&self) -> bool {
        self.is_paused_flag.load(Ordering::SeqCst)
    }
}
