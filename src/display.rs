//! Display sinks: where the playback loop pushes rendered frames.
//!
//! The controller only knows this trait; the shipped implementation rewrites
//! a single terminal line. Palette slots map onto console elements: fg/bg
//! color the text line, highlight marks the focus character, button colors
//! the progress readout, accent colors notices. The renderer's font-size
//! hint is approximated with text intensity, since a terminal cannot scale
//! glyphs.

use crate::render::RenderInstruction;
use crate::theme::{ThemePalette, parse_hex};
use std::io::{self, Write};
use std::sync::Mutex;

/// Where rendered segments, progress, and notices go.
pub trait DisplaySink: Send + Sync {
    fn show(&self, frame: &RenderInstruction);
    fn set_progress(&self, fraction: f64);
    fn notify(&self, message: &str);
}

/// Terminal sink. Frames overwrite one line; notices get their own line.
pub struct ConsoleDisplay {
    state: Mutex<ConsoleState>,
}

struct ConsoleState {
    colors: PaletteColors,
    line: String,
}

#[derive(Clone, Copy, Default)]
struct PaletteColors {
    bg: Option<(u8, u8, u8)>,
    fg: Option<(u8, u8, u8)>,
    accent: Option<(u8, u8, u8)>,
    button: Option<(u8, u8, u8)>,
    highlight: Option<(u8, u8, u8)>,
}

impl PaletteColors {
    fn from_palette(palette: &ThemePalette) -> Self {
        Self {
            bg: parse_hex(&palette.bg),
            fg: parse_hex(&palette.fg),
            accent: parse_hex(&palette.accent),
            button: parse_hex(&palette.button),
            highlight: palette.highlight_rgb(),
        }
    }
}

impl ConsoleDisplay {
    pub fn new(palette: &ThemePalette) -> Self {
        Self {
            state: Mutex::new(ConsoleState {
                colors: PaletteColors::from_palette(palette),
                line: String::new(),
            }),
        }
    }

    /// Swap colors when the user switches themes.
    pub fn set_palette(&self, palette: &ThemePalette) {
        if let Ok(mut state) = self.state.lock() {
            state.colors = PaletteColors::from_palette(palette);
        }
    }

    fn redraw(line: &str) {
        let mut stdout = io::stdout().lock();
        let _ = write!(stdout, "\r\x1b[2K{line}");
        let _ = stdout.flush();
    }
}

impl DisplaySink for ConsoleDisplay {
    fn show(&self, frame: &RenderInstruction) {
        if let Ok(mut state) = self.state.lock() {
            let body = match (&frame.focus, state.colors.highlight) {
                (Some(split), Some(rgb)) => format!(
                    "{}{}{}{}{}",
                    split.before,
                    fg_code(Some(rgb)),
                    split.middle,
                    fg_code(state.colors.fg),
                    split.after
                ),
                _ => frame.text.clone(),
            };
            state.line = format!(
                "{}{}{}{body}\x1b[0m",
                weight_code(frame.font_size),
                bg_code(state.colors.bg),
                fg_code(state.colors.fg),
            );
            Self::redraw(&state.line);
        }
    }

    fn set_progress(&self, fraction: f64) {
        if let Ok(state) = self.state.lock() {
            let percent = (fraction.clamp(0.0, 1.0) * 100.0).round() as u32;
            Self::redraw(&format!(
                "{}  {}[{percent:>3}%]\x1b[0m",
                state.line,
                fg_code(state.colors.button)
            ));
        }
    }

    fn notify(&self, message: &str) {
        let accent = self
            .state
            .lock()
            .map(|state| state.colors.accent)
            .unwrap_or(None);
        let mut stdout = io::stdout().lock();
        let _ = writeln!(stdout, "\n{}{message}\x1b[0m", fg_code(accent));
        let _ = stdout.flush();
    }
}

fn fg_code(rgb: Option<(u8, u8, u8)>) -> String {
    match rgb {
        Some((r, g, b)) => format!("\x1b[38;2;{r};{g};{b}m"),
        None => String::new(),
    }
}

fn bg_code(rgb: Option<(u8, u8, u8)>) -> String {
    match rgb {
        Some((r, g, b)) => format!("\x1b[48;2;{r};{g};{b}m"),
        None => String::new(),
    }
}

/// Approximate the font-size hint: large sizes render bold, small ones dim.
fn weight_code(font_size: u32) -> &'static str {
    if font_size >= 48 {
        "\x1b[1m"
    } else if font_size <= 28 {
        "\x1b[2m"
    } else {
        ""
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weight_tracks_the_font_size_hint() {
        assert_eq!(weight_code(60), "\x1b[1m");
        assert_eq!(weight_code(42), "");
        assert_eq!(weight_code(20), "\x1b[2m");
    }

    #[test]
    fn missing_colors_emit_no_escape_codes() {
        assert_eq!(fg_code(None), "");
        assert_eq!(bg_code(None), "");
        assert_eq!(fg_code(Some((255, 215, 0))), "\x1b[38;2;255;215;0m");
    }
}
