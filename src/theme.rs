//! Color palettes and persisted theme preferences.
//!
//! The reader ships a handful of built-in palettes; users can override every
//! slot with custom colors. Preferences are persisted as JSON alongside the
//! other reader data.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const DEFAULT_THEME: &str = "dark";

/// One color scheme, hex `#RRGGBB` per slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThemePalette {
    pub bg: String,
    pub fg: String,
    pub accent: String,
    pub button: String,
    pub highlight: String,
}

impl ThemePalette {
    fn new(bg: &str, fg: &str, accent: &str, button: &str, highlight: &str) -> Self {
        Self {
            bg: bg.to_string(),
            fg: fg.to_string(),
            accent: accent.to_string(),
            button: button.to_string(),
            highlight: highlight.to_string(),
        }
    }

    /// Parse the highlight slot into RGB components for ANSI rendering.
    pub fn highlight_rgb(&self) -> Option<(u8, u8, u8)> {
        parse_hex(&self.highlight)
    }
}

/// Parse a `#RRGGBB` string into RGB components.
pub fn parse_hex(value: &str) -> Option<(u8, u8, u8)> {
    let hex = value.strip_prefix('#')?;
    if hex.len() != 6 {
        return None;
    }
    let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
    let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
    let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
    Some((r, g, b))
}

pub static BUILTIN_THEMES: Lazy<BTreeMap<&'static str, ThemePalette>> = Lazy::new(|| {
    BTreeMap::from([
        (
            "dark",
            ThemePalette::new("#1C1C3C", "#EAEAEA", "#2A2A5A", "#3A3A5A", "#FFD700"),
        ),
        (
            "light",
            ThemePalette::new("#F0F0F0", "#333333", "#E0E0E0", "#D0D0D0", "#FFA500"),
        ),
        (
            "ocean",
            ThemePalette::new("#1B3B4B", "#E0F4FF", "#2A4B5C", "#3A5B6C", "#00FFFF"),
        ),
        (
            "forest",
            ThemePalette::new("#1B3B1B", "#E0FFE0", "#2A4B2A", "#3A5B3A", "#00FF00"),
        ),
        (
            "sunset",
            ThemePalette::new("#4B1B1B", "#FFE0E0", "#5C2A2A", "#6C3A3A", "#FF4500"),
        ),
    ])
});

/// Per-slot user overrides; only applied when every slot is set.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct CustomColors {
    pub bg: Option<String>,
    pub fg: Option<String>,
    pub accent: Option<String>,
    pub button: Option<String>,
    pub highlight: Option<String>,
}

impl CustomColors {
    fn complete(&self) -> Option<ThemePalette> {
        Some(ThemePalette {
            bg: self.bg.clone()?,
            fg: self.fg.clone()?,
            accent: self.accent.clone()?,
            button: self.button.clone()?,
            highlight: self.highlight.clone()?,
        })
    }
}

/// Persisted theme selection.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ThemePreferences {
    pub current_theme: String,
    #[serde(default)]
    pub custom_colors: CustomColors,
}

impl Default for ThemePreferences {
    fn default() -> Self {
        Self {
            current_theme: DEFAULT_THEME.to_string(),
            custom_colors: CustomColors::default(),
        }
    }
}

impl ThemePreferences {
    /// Resolve the active palette: a fully specified custom set wins,
    /// otherwise the named built-in, otherwise the default theme.
    pub fn palette(&self) -> ThemePalette {
        if let Some(custom) = self.custom_colors.complete() {
            return custom;
        }
        BUILTIN_THEMES
            .get(self.current_theme.as_str())
            .or_else(|| BUILTIN_THEMES.get(DEFAULT_THEME))
            .cloned()
            .unwrap_or_else(|| {
                ThemePalette::new("#1C1C3C", "#EAEAEA", "#2A2A5A", "#3A3A5A", "#FFD700")
            })
    }

    pub fn is_known_theme(name: &str) -> bool {
        BUILTIN_THEMES.contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_theme_falls_back_to_default() {
        let prefs = ThemePreferences {
            current_theme: "nope".to_string(),
            custom_colors: CustomColors::default(),
        };
        assert_eq!(prefs.palette(), BUILTIN_THEMES["dark"]);
    }

    #[test]
    fn complete_custom_colors_win_over_builtin() {
        let prefs = ThemePreferences {
            current_theme: "ocean".to_string(),
            custom_colors: CustomColors {
                bg: Some("#000000".to_string()),
                fg: Some("#111111".to_string()),
                accent: Some("#222222".to_string()),
                button: Some("#333333".to_string()),
                highlight: Some("#444444".to_string()),
            },
        };
        assert_eq!(prefs.palette().bg, "#000000");
    }

    #[test]
    fn partial_custom_colors_are_ignored() {
        let prefs = ThemePreferences {
            current_theme: "ocean".to_string(),
            custom_colors: CustomColors {
                bg: Some("#000000".to_string()),
                ..CustomColors::default()
            },
        };
        assert_eq!(prefs.palette(), BUILTIN_THEMES["ocean"]);
    }

    #[test]
    fn highlight_parses_to_rgb() {
        assert_eq!(
            BUILTIN_THEMES["dark"].highlight_rgb(),
            Some((0xFF, 0xD7, 0x00))
        );
        let bad = ThemePalette::new("#", "#", "#", "#", "nope");
        assert_eq!(bad.highlight_rgb(), None);
    }
}
