//! Keyboard state tracking with named keybinds and per-frame edge detection.
//!
//! Plain terminals only report key presses (and auto-repeats), not releases,
//! so "down" is approximated by holding each key for a short number of frames
//! after its last press event. Terminals that support the kitty keyboard
//! protocol report releases and get exact state.

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind};
use std::collections::HashMap;

/// Frames a key is considered held after its last press/repeat event,
/// for terminals that never deliver release events
const HOLD_FRAMES: u8 = 6;

/// Keyboard state for one frame of the host loop
#[derive(Debug, Default)]
pub struct InputState {
    // Key -> remaining hold frames; refreshed by press/repeat events
    held: HashMap<KeyCode, u8>,
    // Keys first pressed during the current frame
    pressed: Vec<KeyCode>,
    bindings: HashMap<String, KeyCode>,
}

impl InputState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a named keybind, e.g. `"menu_left" -> Left`
    pub fn bind(&mut self, name: &str, key: &str) {
        if let Some(code) = parse_key_name(key) {
            self.bindings.insert(name.to_string(), code);
        } else {
            tracing::warn!("Ignoring keybind '{name}': unknown key '{key}'");
        }
    }

    /// Start a new frame: clear edges and age held keys
    pub fn begin_frame(&mut self) {
        self.pressed.clear();
        self.held.retain(|_, frames| {
            *frames = frames.saturating_sub(1);
            *frames > 0
        });
    }

    /// Feed one crossterm key event into the state
    pub fn handle_key_event(&mut self, event: KeyEvent) {
        match event.kind {
            KeyEventKind::Press => {
                if !self.held.contains_key(&event.code) {
                    self.pressed.push(event.code);
                }
                self.held.insert(event.code, HOLD_FRAMES);
            }
            KeyEventKind::Repeat => {
                self.held.insert(event.code, HOLD_FRAMES);
            }
            KeyEventKind::Release => {
                self.held.remove(&event.code);
            }
        }
    }

    /// Is the raw key currently held?
    #[must_use]
    pub fn is_key_down(&self, key: &str) -> bool {
        parse_key_name(key).is_some_and(|code| self.held.contains_key(&code))
    }

    /// Was the raw key first pressed this frame?
    #[must_use]
    pub fn was_key_pressed(&self, key: &str) -> bool {
        parse_key_name(key).is_some_and(|code| self.pressed.contains(&code))
    }

    /// Is the named keybind currently held?
    #[must_use]
    pub fn is_bind_down(&self, name: &str) -> bool {
        self.bindings
            .get(name)
            .is_some_and(|code| self.held.contains_key(code))
    }

    /// Was the named keybind first pressed this frame?
    #[must_use]
    pub fn was_bind_pressed(&self, name: &str) -> bool {
        self.bindings
            .get(name)
            .is_some_and(|code| self.pressed.contains(code))
    }
}

/// Parse a key name from config or Lua into a crossterm key code.
/// Single characters map to themselves; named keys are case-insensitive.
fn parse_key_name(name: &str) -> Option<KeyCode> {
    let mut chars = name.chars();
    if let (Some(c), None) = (chars.next(), chars.next()) {
        return Some(KeyCode::Char(c.to_ascii_lowercase()));
    }
    match name.to_ascii_lowercase().as_str() {
        "enter" => Some(KeyCode::Enter),
        "esc" | "escape" => Some(KeyCode::Esc),
        "tab" => Some(KeyCode::Tab),
        "space" => Some(KeyCode::Char(' ')),
        "backspace" => Some(KeyCode::Backspace),
        "up" => Some(KeyCode::Up),
        "down" => Some(KeyCode::Down),
        "left" => Some(KeyCode::Left),
        "right" => Some(KeyCode::Right),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyModifiers;

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn test_parse_key_names() {
        assert_eq!(parse_key_name("a"), Some(KeyCode::Char('a')));
        assert_eq!(parse_key_name("A"), Some(KeyCode::Char('a')));
        assert_eq!(parse_key_name("Left"), Some(KeyCode::Left));
        assert_eq!(parse_key_name("space"), Some(KeyCode::Char(' ')));
        assert_eq!(parse_key_name("bogus"), None);
    }

    #[test]
    fn test_pressed_is_edge_triggered() {
        let mut input = InputState::new();
        input.begin_frame();
        input.handle_key_event(press(KeyCode::Char('h')));

        assert!(input.was_key_pressed("h"));
        assert!(input.is_key_down("h"));

        // Next frame without a release: still down, no longer an edge
        input.begin_frame();
        assert!(!input.was_key_pressed("h"));
        assert!(input.is_key_down("h"));
    }

    #[test]
    fn test_hold_decays_without_events() {
        let mut input = InputState::new();
        input.handle_key_event(press(KeyCode::Up));
        for _ in 0..HOLD_FRAMES {
            input.begin_frame();
        }
        assert!(!input.is_key_down("up"));
    }

    #[test]
    fn test_named_bindings() {
        let mut input = InputState::new();
        input.bind("menu_select", "enter");
        input.bind("broken", "notakey");

        input.begin_frame();
        input.handle_key_event(press(KeyCode::Enter));
        assert!(input.was_bind_pressed("menu_select"));
        assert!(input.is_bind_down("menu_select"));
        assert!(!input.was_bind_pressed("broken"));
    }
}
