// src/ui/keybindings.rs
//! Keyboard input handling and key mappings for the demo front-end.

use crossterm::event::{KeyCode, KeyEvent};

/// Actions derived from key events.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UiAction {
    Quit,
    TogglePause,
    ToggleAnalyzer,
    CycleMode,
    CycleGradient,
    CycleMirror,
    CycleReflex,
    ToggleStereo,
    ToggleSplitGradient,
    ToggleLeds,
    ToggleLumi,
    ToggleOutline,
    ToggleAlpha,
    ToggleRadial,
    TogglePeaks,
    ToggleScale,
    ToggleMute,
    VolumeUp,
    VolumeDown,
    None,
}

/// Convert a key event to a UI action.
pub fn key_to_action(key: &KeyEvent) -> UiAction {
    match key.code {
        KeyCode::Char('q') | KeyCode::Esc => UiAction::Quit,
        KeyCode::Char(' ') => UiAction::TogglePause,
        KeyCode::Char('f') => UiAction::ToggleAnalyzer,
        KeyCode::Char('m') => UiAction::CycleMode,
        KeyCode::Char('g') => UiAction::CycleGradient,
        KeyCode::Char('i') => UiAction::CycleMirror,
        KeyCode::Char('x') => UiAction::CycleReflex,
        KeyCode::Char('s') => UiAction::ToggleStereo,
        KeyCode::Char('d') => UiAction::ToggleSplitGradient,
        KeyCode::Char('l') => UiAction::ToggleLeds,
        KeyCode::Char('u') => UiAction::ToggleLumi,
        KeyCode::Char('o') => UiAction::ToggleOutline,
        KeyCode::Char('t') => UiAction::ToggleAlpha,
        KeyCode::Char('r') => UiAction::ToggleRadial,
        KeyCode::Char('p') => UiAction::TogglePeaks,
        KeyCode::Char('a') => UiAction::ToggleScale,
        KeyCode::Char('e') => UiAction::ToggleMute,
        KeyCode::Char('+') | KeyCode::Char('=') | KeyCode::Up => UiAction::VolumeUp,
        KeyCode::Char('-') | KeyCode::Down => UiAction::VolumeDown,
        _ => UiAction::None,
    }
}

/// One-line help string shown in the status bar.
pub fn help_line() -> &'static str {
    "q quit | space pause | m mode | g gradient | r radial | s stereo | \
     l led | u lumi | o outline | t alpha | x reflex | i mirror | p peaks | \
     a scale | d split | e mute | +/- volume"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::{KeyEvent, KeyModifiers};

    fn key(c: char) -> KeyEvent {
        KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE)
    }

    #[test]
    fn maps_core_keys() {
        assert_eq!(key_to_action(&key('q')), UiAction::Quit);
        assert_eq!(key_to_action(&key('m')), UiAction::CycleMode);
        assert_eq!(key_to_action(&key('g')), UiAction::CycleGradient);
        assert_eq!(key_to_action(&key('z')), UiAction::None);
    }
}
