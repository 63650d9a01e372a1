//! Key press to intent mapping.
//!
//! ## Learning: Lookup Tables over Match Chains
//!
//! Bindings live in a `HashMap<KeyPress, Intent>` rather than a hard-coded
//! `match` on key codes. Defaults are inserted first and user bindings from
//! `[keyboard.bindings]` overwrite them, so remapping a key is just another
//! insert.

use crate::config::Config;
use crate::intent::Intent;
use std::collections::HashMap;

/// Keyboard modifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Modifiers {
    pub ctrl: bool,
    pub alt: bool,
    pub shift: bool,
    pub meta: bool, // Cmd on macOS, Win on Windows
}

impl Modifiers {
    /// No modifiers pressed.
    pub const NONE: Modifiers = Modifiers {
        ctrl: false,
        alt: false,
        shift: false,
        meta: false,
    };

    /// Ctrl modifier.
    pub const CTRL: Modifiers = Modifiers {
        ctrl: true,
        alt: false,
        shift: false,
        meta: false,
    };

    /// Shift modifier.
    pub const SHIFT: Modifiers = Modifiers {
        ctrl: false,
        alt: false,
        shift: true,
        meta: false,
    };

    /// Returns true if no modifiers are pressed.
    pub fn is_empty(&self) -> bool {
        !self.ctrl && !self.alt && !self.shift && !self.meta
    }

    /// Parses modifiers from a string like "ctrl+shift".
    pub fn parse(s: &str) -> Self {
        let mut mods = Modifiers::NONE;
        for part in s.split('+').map(|p| p.trim().to_lowercase()) {
            match part.as_str() {
                "ctrl" | "control" => mods.ctrl = true,
                "alt" | "option" => mods.alt = true,
                "shift" => mods.shift = true,
                "meta" | "cmd" | "win" | "super" => mods.meta = true,
                _ => {}
            }
        }
        mods
    }
}

impl std::fmt::Display for Modifiers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut parts = Vec::new();
        if self.ctrl {
            parts.push("Ctrl");
        }
        if self.alt {
            parts.push("Alt");
        }
        if self.shift {
            parts.push("Shift");
        }
        if self.meta {
            #[cfg(target_os = "macos")]
            parts.push("Cmd");
            #[cfg(not(target_os = "macos"))]
            parts.push("Win");
        }
        write!(f, "{}", parts.join("+"))
    }
}

/// A key code.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    Char(char),
    Enter,
    Tab,
    Backspace,
    Delete,
    Escape,
    Up,
    Down,
    Left,
    Right,
    Home,
    End,
    Space,
}

impl Key {
    /// Parses a key from a string.
    pub fn parse(s: &str) -> Option<Self> {
        let lower = s.trim().to_lowercase();
        match lower.as_str() {
            "enter" | "return" => Some(Key::Enter),
            "tab" => Some(Key::Tab),
            "backspace" | "bs" => Some(Key::Backspace),
            "delete" | "del" => Some(Key::Delete),
            "escape" | "esc" => Some(Key::Escape),
            "up" | "arrowup" => Some(Key::Up),
            "down" | "arrowdown" => Some(Key::Down),
            "left" | "arrowleft" => Some(Key::Left),
            "right" | "arrowright" => Some(Key::Right),
            "home" => Some(Key::Home),
            "end" => Some(Key::End),
            "space" => Some(Key::Space),
            _ => {
                let mut chars = lower.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Some(Key::Char(c)),
                    _ => None,
                }
            }
        }
    }
}

impl std::fmt::Display for Key {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Key::Char(c) => write!(f, "{}", c.to_uppercase()),
            Key::Enter => write!(f, "Enter"),
            Key::Tab => write!(f, "Tab"),
            Key::Backspace => write!(f, "Backspace"),
            Key::Delete => write!(f, "Delete"),
            Key::Escape => write!(f, "Escape"),
            Key::Up => write!(f, "Up"),
            Key::Down => write!(f, "Down"),
            Key::Left => write!(f, "Left"),
            Key::Right => write!(f, "Right"),
            Key::Home => write!(f, "Home"),
            Key::End => write!(f, "End"),
            Key::Space => write!(f, "Space"),
        }
    }
}

/// A key press event.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyPress {
    pub key: Key,
    pub modifiers: Modifiers,
}

impl KeyPress {
    /// Creates a new key press.
    pub fn new(key: Key, modifiers: Modifiers) -> Self {
        Self { key, modifiers }
    }

    /// A key press with no modifiers.
    pub fn plain(key: Key) -> Self {
        Self::new(key, Modifiers::NONE)
    }

    /// Parses a key binding string like "shift+enter".
    pub fn parse(s: &str) -> Option<Self> {
        let (mods, key) = match s.rsplit_once('+') {
            Some((mods, key)) if !key.is_empty() => (mods, key),
            // "ctrl++" binds the plus key itself.
            Some((mods, _)) if s.ends_with("++") => (mods.trim_end_matches('+'), "+"),
            Some(_) => return None,
            None => ("", s),
        };
        let key = Key::parse(key)?;
        Some(Self {
            key,
            modifiers: Modifiers::parse(mods),
        })
    }
}

impl std::fmt::Display for KeyPress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.modifiers.is_empty() {
            write!(f, "{}", self.key)
        } else {
            write!(f, "{}+{}", self.modifiers, self.key)
        }
    }
}

/// Maps key presses to editing intents.
#[derive(Debug, Clone)]
pub struct Keymap {
    bindings: HashMap<KeyPress, Intent>,
}

impl Keymap {
    /// Creates a keymap with the default bindings.
    pub fn new() -> Self {
        let mut keymap = Self {
            bindings: HashMap::new(),
        };
        keymap.add_default_bindings();
        keymap
    }

    /// Creates a keymap from configuration.
    ///
    /// Unparseable entries are skipped with a warning.
    pub fn from_config(config: &Config) -> Self {
        let mut keymap = Self::new();

        for (key_str, intent_str) in &config.keyboard.bindings {
            let Some(key) = KeyPress::parse(key_str) else {
                tracing::warn!(key = %key_str, "ignoring binding with unknown key");
                continue;
            };
            match intent_str.parse::<Intent>() {
                Ok(intent) => keymap.bind(key, intent),
                Err(err) => tracing::warn!(key = %key_str, error = %err, "ignoring binding"),
            }
        }

        keymap
    }

    fn add_default_bindings(&mut self) {
        let defaults = [
            (KeyPress::plain(Key::Enter), Intent::Split),
            (KeyPress::new(Key::Enter, Modifiers::SHIFT), Intent::SoftBreak),
            (KeyPress::plain(Key::Backspace), Intent::Backspace),
            (KeyPress::plain(Key::Tab), Intent::Indent),
            (KeyPress::new(Key::Tab, Modifiers::SHIFT), Intent::Outdent),
            (KeyPress::plain(Key::Up), Intent::NavigateUp),
            (KeyPress::plain(Key::Down), Intent::NavigateDown),
        ];
        self.bindings.extend(defaults);
    }

    /// Binds `key` to `intent`, replacing any previous binding.
    pub fn bind(&mut self, key: KeyPress, intent: Intent) {
        self.bindings.insert(key, intent);
    }

    /// Removes the binding for `key`.
    pub fn unbind(&mut self, key: &KeyPress) -> Option<Intent> {
        self.bindings.remove(key)
    }

    /// Resolves a key press to an intent.
    pub fn resolve(&self, key: &KeyPress) -> Option<Intent> {
        self.bindings.get(key).copied()
    }

    /// Returns the keys bound to `intent`, sorted by their display form.
    pub fn keys_for(&self, intent: Intent) -> Vec<&KeyPress> {
        let mut keys: Vec<_> = self
            .bindings
            .iter()
            .filter(|(_, bound)| **bound == intent)
            .map(|(key, _)| key)
            .collect();
        keys.sort_by_key(|key| key.to_string());
        keys
    }
}

impl Default for Keymap {
    fn default() -> Self {
        Self::new()
    }
}
