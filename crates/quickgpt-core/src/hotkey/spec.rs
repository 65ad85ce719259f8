//! Parsing of '+'-joined hotkey strings such as `ctrl+alt+space`.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};
use std::str::FromStr;

use crate::error::{Error, Result};

/// Modifier bitset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Modifiers(u8);

impl Modifiers {
    pub const NONE: Modifiers = Modifiers(0);
    pub const CONTROL: Modifiers = Modifiers(1 << 0);
    pub const ALT: Modifiers = Modifiers(1 << 1);
    pub const SHIFT: Modifiers = Modifiers(1 << 2);
    pub const META: Modifiers = Modifiers(1 << 3);

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn contains(self, other: Modifiers) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn remove(&mut self, other: Modifiers) {
        self.0 &= !other.0;
    }
}

impl BitOr for Modifiers {
    type Output = Modifiers;

    fn bitor(self, rhs: Modifiers) -> Modifiers {
        Modifiers(self.0 | rhs.0)
    }
}

impl BitOrAssign for Modifiers {
    fn bitor_assign(&mut self, rhs: Modifiers) {
        self.0 |= rhs.0;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BaseKey {
    /// Lowercase ASCII letter
    Letter(char),
    Digit(u8),
    /// F1 through F24
    Function(u8),
    Space,
    Tab,
    Escape,
    Enter,
}

impl BaseKey {
    fn from_token(token: &str) -> Option<Self> {
        match token {
            "space" => return Some(BaseKey::Space),
            "tab" => return Some(BaseKey::Tab),
            "escape" | "esc" => return Some(BaseKey::Escape),
            "enter" => return Some(BaseKey::Enter),
            _ => {}
        }

        let mut chars = token.chars();
        if let (Some(c), None) = (chars.next(), chars.next()) {
            if c.is_ascii_lowercase() {
                return Some(BaseKey::Letter(c));
            }
            if let Some(d) = c.to_digit(10) {
                return Some(BaseKey::Digit(d as u8));
            }
        }

        token
            .strip_prefix('f')
            .and_then(|n| n.parse::<u8>().ok())
            .filter(|n| (1..=24).contains(n))
            .map(BaseKey::Function)
    }

    /// Keys that are part of ordinary typing when pressed without modifiers
    pub fn is_typing_key(&self) -> bool {
        matches!(self, BaseKey::Space | BaseKey::Enter)
    }
}

impl fmt::Display for BaseKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BaseKey::Letter(c) => write!(f, "{c}"),
            BaseKey::Digit(d) => write!(f, "{d}"),
            BaseKey::Function(n) => write!(f, "f{n}"),
            BaseKey::Space => f.write_str("space"),
            BaseKey::Tab => f.write_str("tab"),
            BaseKey::Escape => f.write_str("escape"),
            BaseKey::Enter => f.write_str("enter"),
        }
    }
}

/// A parsed global shortcut: modifier flags plus one base key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HotkeySpec {
    pub modifiers: Modifiers,
    pub key: BaseKey,
}

impl HotkeySpec {
    pub fn parse(spec: &str) -> Result<Self> {
        let mut modifiers = Modifiers::NONE;
        let mut key = None;

        let tokens = spec
            .split('+')
            .map(|t| t.trim().to_lowercase())
            .filter(|t| !t.is_empty());

        for token in tokens {
            match token.as_str() {
                "ctrl" | "control" => modifiers |= Modifiers::CONTROL,
                "alt" => modifiers |= Modifiers::ALT,
                "shift" => modifiers |= Modifiers::SHIFT,
                "win" | "meta" | "super" => modifiers |= Modifiers::META,
                other => match BaseKey::from_token(other) {
                    // Last resolvable key wins
                    Some(base) => key = Some(base),
                    None => tracing::debug!(token = other, "dropping unknown hotkey token"),
                },
            }
        }

        key.map(|key| HotkeySpec { modifiers, key })
            .ok_or_else(|| Error::InvalidHotkeySpec(spec.to_string()))
    }

    /// A bare Enter or Space would hijack normal typing in the popup
    pub fn is_bare_typing_key(&self) -> bool {
        self.modifiers.is_empty() && self.key.is_typing_key()
    }
}

impl FromStr for HotkeySpec {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        HotkeySpec::parse(s)
    }
}

impl fmt::Display for HotkeySpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = [
            (Modifiers::CONTROL, "ctrl"),
            (Modifiers::ALT, "alt"),
            (Modifiers::SHIFT, "shift"),
            (Modifiers::META, "meta"),
        ];
        for (flag, name) in names {
            if self.modifiers.contains(flag) {
                write!(f, "{name}+")?;
            }
        }
        write!(f, "{}", self.key)
    }
}
