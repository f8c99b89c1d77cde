//! Pure transformation of segment text into a render instruction.
//!
//! The renderer knows nothing about widgets or terminals; sinks decide how
//! to draw the instruction.

use serde::{Deserialize, Serialize};

/// Bounds for the dynamic font scale; also the valid range for the
/// user-configured base font size.
pub const MIN_FONT_SIZE: u32 = 20;
pub const MAX_FONT_SIZE: u32 = 60;

/// Policy selecting how a segment is presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayMode {
    Standard,
    Focus,
    Dynamic,
}

impl Default for DisplayMode {
    fn default() -> Self {
        DisplayMode::Standard
    }
}

impl std::fmt::Display for DisplayMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            DisplayMode::Standard => "standard",
            DisplayMode::Focus => "focus",
            DisplayMode::Dynamic => "dynamic",
        };
        write!(f, "{}", label)
    }
}

/// Three-way split around the focused middle character. Any part may be
/// empty for short inputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FocusSplit {
    pub before: String,
    pub middle: String,
    pub after: String,
}

/// What a display sink should draw for one segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderInstruction {
    pub text: String,
    pub font_size: u32,
    pub focus: Option<FocusSplit>,
}

/// Render `text` under the given display mode.
pub fn render(text: &str, mode: DisplayMode, base_font_size: u32) -> RenderInstruction {
    match mode {
        DisplayMode::Standard => RenderInstruction {
            text: text.to_string(),
            font_size: base_font_size,
            focus: None,
        },
        DisplayMode::Focus => {
            let split = focus_split(text);
            RenderInstruction {
                text: format!("{}|{}|{}", split.before, split.middle, split.after),
                font_size: base_font_size,
                focus: Some(split),
            }
        }
        DisplayMode::Dynamic => RenderInstruction {
            text: text.to_string(),
            font_size: dynamic_font_size(text),
            focus: None,
        },
    }
}

/// Split on the middle character, counting characters rather than bytes so
/// multi-byte text never slices mid-codepoint.
fn focus_split(text: &str) -> FocusSplit {
    let count = text.chars().count();
    let mid = count / 2;
    let mut before = String::new();
    let mut middle = String::new();
    let mut after = String::new();
    for (idx, ch) in text.chars().enumerate() {
        if idx < mid {
            before.push(ch);
        } else if idx == mid {
            middle.push(ch);
        } else {
            after.push(ch);
        }
    }
    FocusSplit {
        before,
        middle,
        after,
    }
}

/// Longer segments render smaller, within fixed bounds.
fn dynamic_font_size(text: &str) -> u32 {
    let length = text.chars().count() as i64;
    (60 - length).clamp(MIN_FONT_SIZE as i64, MAX_FONT_SIZE as i64) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_mode_passes_text_through() {
        let frame = render("unchanged", DisplayMode::Standard, 42);
        assert_eq!(frame.text, "unchanged");
        assert_eq!(frame.font_size, 42);
        assert!(frame.focus.is_none());
    }

    #[test]
    fn focus_mode_splits_around_middle_character() {
        let frame = render("cat", DisplayMode::Focus, 42);
        let split = frame.focus.expect("focus split");
        assert_eq!(split.before, "c");
        assert_eq!(split.middle, "a");
        assert_eq!(split.after, "t");
        assert_eq!(frame.text, "c|a|t");
        assert_eq!(frame.font_size, 42);
    }

    #[test]
    fn focus_mode_is_safe_on_degenerate_input() {
        let single = render("a", DisplayMode::Focus, 42);
        let split = single.focus.expect("single-char split");
        assert_eq!(split.before, "");
        assert_eq!(split.middle, "a");
        assert_eq!(split.after, "");

        let empty = render("", DisplayMode::Focus, 42);
        let split = empty.focus.expect("empty split");
        assert_eq!(split.middle, "");
    }

    #[test]
    fn focus_mode_counts_characters_not_bytes() {
        let frame = render("héllo", DisplayMode::Focus, 42);
        let split = frame.focus.expect("multi-byte split");
        assert_eq!(split.before, "hé");
        assert_eq!(split.middle, "l");
        assert_eq!(split.after, "lo");
    }

    #[test]
    fn dynamic_mode_scales_with_length_within_bounds() {
        assert_eq!(render(&"x".repeat(10), DisplayMode::Dynamic, 42).font_size, 50);
        assert_eq!(render(&"x".repeat(50), DisplayMode::Dynamic, 42).font_size, 20);
        assert_eq!(render("", DisplayMode::Dynamic, 42).font_size, 60);
    }
}
