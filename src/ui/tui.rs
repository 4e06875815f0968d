// src/ui/tui.rs
//! Terminal front-end: runs the analyzer render loop and blits each frame
//! into the terminal through a graphics protocol, with keybindings to flip
//! every visual option at runtime.

use std::{
    io,
    path::PathBuf,
    time::{Duration, Instant},
};

use anyhow::Result;
use crossterm::{
    event::{self, Event as CEvent},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use log::warn;
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    widgets::Paragraph,
    Frame, Terminal,
};
use ratatui_image::{
    picker::{Picker, ProtocolType},
    Image, Resize,
};

use crate::{
    analyzer::Analyzer,
    audio::{ChannelFeeds, MusicPlayer},
    config::{Config, ConfigPatch, Mirror, Mode},
    display::{DisplayEnv, ResizeDebouncer, ResizeReason},
};

use super::keybindings::{help_line, key_to_action, UiAction};

/// Mode cycle order for the `m` key (9 is not a valid mode).
const MODE_CYCLE: [u8; 10] = [0, 1, 2, 3, 4, 5, 6, 7, 8, 10];

/// Gradient cycle order for the `g` key; all built-ins.
const GRADIENT_CYCLE: [&str; 4] = ["classic", "prism", "rainbow", "purple"];

/// Reflection depth presets for the `x` key.
const REFLEX_CYCLE: [f32; 3] = [0.0, 0.25, 0.4];

/// Display environment backed by the terminal: cell grid times the probed
/// font size, in pixels.
struct TerminalDisplay {
    cols: u16,
    rows: u16,
    font: (u16, u16),
}

impl DisplayEnv for TerminalDisplay {
    fn size(&self) -> (u32, u32) {
        (
            self.cols as u32 * self.font.0 as u32,
            self.rows as u32 * self.font.1 as u32,
        )
    }
}

pub struct App {
    analyzer: Analyzer,
    player: MusicPlayer,
    picker: Picker,
    debouncer: ResizeDebouncer,
    /// Cell area the spectrum occupied on the last draw.
    spectrum_cells: Rect,
    volume: f32,
    muted: bool,
    running: bool,
}

impl App {
    pub fn new(track: Option<PathBuf>) -> Result<Self> {
        // Probe terminal for graphics protocols & font-size
        let mut picker = Picker::from_query_stdio()?;
        picker.set_protocol_type(ProtocolType::Kitty);

        let (cols, rows) = crossterm::terminal::size()?;
        let display = TerminalDisplay {
            cols,
            rows,
            font: picker.font_size(),
        };

        let feeds = ChannelFeeds::default();
        let mut player = MusicPlayer::new(feeds.clone())?;

        let config = Config::default();
        let mut analyzer = Analyzer::from_feeds(config, feeds.buffers(), &display)?;
        analyzer.start();

        if let Some(path) = track {
            player.play(&path)?;
        }

        Ok(Self {
            analyzer,
            player,
            picker,
            debouncer: ResizeDebouncer::default(),
            spectrum_cells: Rect::default(),
            volume: 1.0,
            muted: false,
            running: true,
        })
    }

    /// Apply a one-field configuration patch, logging rejections.
    fn patch(&mut self, patch: ConfigPatch) {
        if let Err(err) = self.analyzer.apply_patch(&patch) {
            warn!("config patch rejected: {err}");
        }
    }

    fn on_action(&mut self, action: UiAction) {
        let config = self.analyzer.config().clone();
        match action {
            UiAction::Quit => {
                self.player.stop();
                self.running = false;
            }
            UiAction::TogglePause => {
                if self.player.is_paused() {
                    self.player.resume();
                } else {
                    self.player.pause();
                }
            }
            UiAction::ToggleAnalyzer => {
                self.analyzer.toggle();
            }
            UiAction::CycleMode => {
                let current = config.mode as u8;
                let at = MODE_CYCLE.iter().position(|&m| m == current).unwrap_or(0);
                let next = MODE_CYCLE[(at + 1) % MODE_CYCLE.len()];
                if let Ok(mode) = Mode::from_u8(next) {
                    self.patch(ConfigPatch {
                        mode: Some(mode),
                        ..Default::default()
                    });
                }
            }
            UiAction::CycleGradient => {
                let at = GRADIENT_CYCLE
                    .iter()
                    .position(|&g| g == config.gradient)
                    .unwrap_or(0);
                let next = GRADIENT_CYCLE[(at + 1) % GRADIENT_CYCLE.len()];
                self.patch(ConfigPatch {
                    gradient: Some(next.into()),
                    ..Default::default()
                });
            }
            UiAction::CycleMirror => {
                let next = match config.mirror {
                    Mirror::None => Mirror::Left,
                    Mirror::Left => Mirror::Right,
                    Mirror::Right => Mirror::None,
                };
                self.patch(ConfigPatch {
                    mirror: Some(next),
                    ..Default::default()
                });
            }
            UiAction::CycleReflex => {
                let at = REFLEX_CYCLE
                    .iter()
                    .position(|&r| (r - config.reflex_ratio).abs() < 1e-3)
                    .unwrap_or(0);
                let next = REFLEX_CYCLE[(at + 1) % REFLEX_CYCLE.len()];
                self.patch(ConfigPatch {
                    reflex_ratio: Some(next),
                    ..Default::default()
                });
            }
            UiAction::ToggleStereo => self.patch(ConfigPatch {
                stereo: Some(!config.stereo),
                ..Default::default()
            }),
            UiAction::ToggleSplitGradient => self.patch(ConfigPatch {
                split_gradient: Some(!config.split_gradient),
                ..Default::default()
            }),
            UiAction::ToggleLeds => self.patch(ConfigPatch {
                led_bars: Some(!config.led_bars),
                ..Default::default()
            }),
            UiAction::ToggleLumi => self.patch(ConfigPatch {
                lumi_bars: Some(!config.lumi_bars),
                ..Default::default()
            }),
            UiAction::ToggleOutline => self.patch(ConfigPatch {
                outline_bars: Some(!config.outline_bars),
                ..Default::default()
            }),
            UiAction::ToggleAlpha => self.patch(ConfigPatch {
                alpha_bars: Some(!config.alpha_bars),
                ..Default::default()
            }),
            UiAction::ToggleRadial => self.patch(ConfigPatch {
                radial: Some(!config.radial),
                spin_speed: Some(if config.radial { 0.0 } else { 2.0 }),
                ..Default::default()
            }),
            UiAction::TogglePeaks => self.patch(ConfigPatch {
                show_peaks: Some(!config.show_peaks),
                ..Default::default()
            }),
            UiAction::ToggleScale => self.patch(ConfigPatch {
                show_scale_x: Some(!config.show_scale_x),
                ..Default::default()
            }),
            UiAction::ToggleMute => {
                // Silences the speakers only; the analyzer keeps its feed.
                self.muted = !self.muted;
                self.player.set_output_enabled(!self.muted);
            }
            UiAction::VolumeUp => self.set_volume(self.volume + 0.05),
            UiAction::VolumeDown => self.set_volume(self.volume - 0.05),
            UiAction::None => {}
        }
    }

    fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 1.0);
        self.player.set_volume(self.volume);
        self.patch(ConfigPatch {
            volume: Some(self.volume),
            ..Default::default()
        });
    }

    /// Advance one animation tick: flush any settled resize, then render.
    fn tick(&mut self) {
        if let Some(reason) = self.debouncer.ready() {
            let (fw, fh) = self.picker.font_size();
            let width = self.spectrum_cells.width as u32 * fw as u32;
            let height = self.spectrum_cells.height as u32 * fh as u32;
            if width > 0 && height > 0 {
                self.analyzer.resize(width, height, reason);
            }
        }
        self.analyzer.render_frame();
    }

    fn status_line(&self) -> String {
        let config = self.analyzer.config();
        let state = if !self.player.is_playing() {
            "stopped"
        } else if self.player.is_paused() {
            "paused"
        } else {
            "playing"
        };
        format!(
            "{}{} | mode {} | {} | {:.0} fps | energy {:.2} peak {:.2} | vol {:.0}%",
            state,
            if self.muted { " (muted)" } else { "" },
            config.mode as u8,
            config.gradient,
            self.analyzer.fps(),
            self.analyzer.energy(),
            self.analyzer.peak_energy(),
            self.volume * 100.0,
        )
    }

    fn draw(&mut self, f: &mut Frame<'_>) {
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Min(4),
                Constraint::Length(1),
                Constraint::Length(1),
            ])
            .split(f.area());

        // A changed spectrum area means the terminal was resized; let the
        // debouncer collapse the burst before the canvas follows.
        if rows[0] != self.spectrum_cells {
            self.spectrum_cells = rows[0];
            self.debouncer.request(ResizeReason::Container);
        }

        let frame = self.analyzer.frame_image();
        if let Ok(proto) = self.picker.new_protocol(frame, rows[0], Resize::Fit(None)) {
            f.render_widget(Image::new(&proto), rows[0]);
        }

        f.render_widget(
            Paragraph::new(self.status_line())
                .style(Style::default().add_modifier(Modifier::BOLD)),
            rows[1],
        );
        f.render_widget(
            Paragraph::new(help_line()).style(Style::default().add_modifier(Modifier::DIM)),
            rows[2],
        );
    }
}

pub fn run(track: Option<PathBuf>) -> Result<()> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;

    let mut app = App::new(track)?;
    let tick_rate = Duration::from_millis(33);
    let mut last_tick = Instant::now();

    while app.running {
        terminal.draw(|f| app.draw(f))?;
        let timeout = tick_rate.checked_sub(last_tick.elapsed()).unwrap_or_default();

        if event::poll(timeout)? {
            if let CEvent::Key(key) = event::read()? {
                let action = key_to_action(&key);
                app.on_action(action);
            }
        }

        if last_tick.elapsed() >= tick_rate {
            last_tick = Instant::now();
            app.tick();
        }
    }

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}
