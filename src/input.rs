//! Per-frame input state
//!
//! Clicks are edge-triggered latches, the keyboard keeps a single-slot latch
//! (a key typed while another is unread replaces it), and function keys are
//! translated to shortcuts through a fixed table.

use crate::platform_trait::{Event, KeyCode};
use log::{debug, trace};

pub const BUTTON_LEFT: u8 = 1;
pub const BUTTON_RIGHT: u8 = 2;

/// Verbs selectable from the function keys
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerCommand {
    Examine,
    Take,
    Inventory,
    Use,
    Activate,
    Speak,
}

impl PlayerCommand {
    /// Command bound to F1..F6
    pub fn from_function_key(n: u8) -> Option<Self> {
        match n {
            1 => Some(PlayerCommand::Examine),
            2 => Some(PlayerCommand::Take),
            3 => Some(PlayerCommand::Inventory),
            4 => Some(PlayerCommand::Use),
            5 => Some(PlayerCommand::Activate),
            6 => Some(PlayerCommand::Speak),
            _ => None,
        }
    }
}

/// Requests raised by shortcut keys, handed to the script host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shortcut {
    Command(PlayerCommand),
    ActionMenu,
    SystemMenu,
}

/// Engine flags that enable or disable the shortcut table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct KeyGates {
    pub allow_player_input: bool,
    pub in_menu: bool,
    pub disable_system_menu: bool,
}

/// What a key press turns into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    LeftClick,
    RightClick,
    Shortcut(Shortcut),
    /// A table key whose gate is closed
    Ignored,
    /// Not in the table; goes to the key latch
    Unmapped,
}

/// Look a key up in the shortcut table
pub fn map_key(key: KeyCode, gates: KeyGates) -> KeyAction {
    let gated = |action: KeyAction| {
        if gates.allow_player_input {
            action
        } else {
            KeyAction::Ignored
        }
    };

    match key {
        KeyCode::Return | KeyCode::KeypadEnter | KeyCode::Keypad(5) => gated(KeyAction::LeftClick),
        KeyCode::Escape => gated(KeyAction::RightClick),
        KeyCode::F(n @ 1..=6) => match PlayerCommand::from_function_key(n) {
            Some(cmd) => gated(KeyAction::Shortcut(Shortcut::Command(cmd))),
            None => KeyAction::Ignored,
        },
        KeyCode::F(9) => {
            if gates.allow_player_input && !gates.in_menu {
                KeyAction::Shortcut(Shortcut::ActionMenu)
            } else {
                KeyAction::Ignored
            }
        }
        KeyCode::F(10) => {
            if !gates.disable_system_menu && !gates.in_menu {
                KeyAction::Shortcut(Shortcut::SystemMenu)
            } else {
                KeyAction::Ignored
            }
        }
        _ => KeyAction::Unmapped,
    }
}

/// Button state and pointer position as seen by the scripts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MouseData {
    /// `BUTTON_LEFT | BUTTON_RIGHT` bitmask
    pub buttons: u8,
    pub x: i16,
    pub y: i16,
}

#[derive(Debug, Default)]
pub struct InputState {
    pending_left: bool,
    pending_right: bool,
    /// Click latches captured by the last snapshot
    snapshot_left: bool,
    snapshot_right: bool,
    position: (i16, i16),
    last_key: Option<KeyCode>,
    shortcuts: Vec<Shortcut>,
    quit_requested: bool,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one host event
    pub fn handle_event(&mut self, event: Event, gates: KeyGates) {
        match event {
            Event::LeftDown => self.pending_left = true,
            Event::RightDown => self.pending_right = true,
            Event::MouseMove { x, y } => self.position = (x, y),
            Event::Quit => {
                debug!("Quit event received");
                self.quit_requested = true;
            }
            Event::KeyDown(key) => match map_key(key, gates) {
                KeyAction::LeftClick => self.pending_left = true,
                KeyAction::RightClick => self.pending_right = true,
                KeyAction::Shortcut(shortcut) => {
                    debug!("Shortcut {:?} from {:?}", shortcut, key);
                    self.shortcuts.push(shortcut);
                }
                KeyAction::Ignored => trace!("Ignoring {:?}", key),
                KeyAction::Unmapped => {
                    if let Some(unread) = self.last_key.replace(key) {
                        trace!("Key {:?} overwritten by {:?}", unread, key);
                    }
                }
            },
        }
    }

    /// Move the click latches into the mouse snapshot and clear them
    pub fn snapshot_clicks(&mut self) {
        self.snapshot_left = self.pending_left;
        self.snapshot_right = self.pending_right;
        self.pending_left = false;
        self.pending_right = false;
    }

    pub fn mouse_data(&self) -> MouseData {
        let mut buttons = 0;
        if self.snapshot_right {
            buttons |= BUTTON_RIGHT;
        }
        if self.snapshot_left {
            buttons |= BUTTON_LEFT;
        }
        MouseData {
            buttons,
            x: self.position.0,
            y: self.position.1,
        }
    }

    pub fn pending_left_click(&self) -> bool {
        self.pending_left
    }

    pub fn pending_right_click(&self) -> bool {
        self.pending_right
    }

    /// Read and clear the key latch
    pub fn take_key(&mut self) -> Option<KeyCode> {
        self.last_key.take()
    }

    pub fn take_shortcuts(&mut self) -> Vec<Shortcut> {
        std::mem::take(&mut self.shortcuts)
    }

    pub fn quit_requested(&self) -> bool {
        self.quit_requested
    }

    /// Forget all latched input; the quit request survives
    pub fn reset(&mut self) {
        let quit = self.quit_requested;
        *self = Self::default();
        self.quit_requested = quit;
    }
}

/// Incremental matcher for the hidden exit phrase
#[derive(Debug, Clone)]
pub struct QuitPhraseMatcher {
    phrase: Vec<char>,
    progress: usize,
}

impl QuitPhraseMatcher {
    pub fn new(phrase: &str) -> Self {
        Self {
            phrase: phrase.chars().collect(),
            progress: 0,
        }
    }

    pub fn progress(&self) -> usize {
        self.progress
    }

    /// Feed one unmapped key; returns true when the phrase is complete
    ///
    /// A mismatch resets progress without re-testing the key against the
    /// start of the phrase.
    pub fn feed(&mut self, key: KeyCode) -> bool {
        if self.phrase.is_empty() {
            return false;
        }
        let expected = self.phrase.get(self.progress).copied();
        match key {
            KeyCode::Char(c) if Some(c) == expected => {
                self.progress += 1;
                self.progress == self.phrase.len()
            }
            _ => {
                self.progress = 0;
                false
            }
        }
    }

    pub fn reset(&mut self) {
        self.progress = 0;
    }
}
