//! Color palette and theme selection
//!
//! The palette starts from a dark or light base and is then overridden slot
//! by slot from the `[colors]` config table. Theme mode comes from:
//! 1. the `theme` config value, unless it is "auto"
//! 2. TIGR_THEME environment variable
//! 3. COLORFGBG environment variable (set by xterm, rxvt, and others)

use ratatui::style::{Color, Modifier, Style};
use std::collections::BTreeMap;
use std::str::FromStr;

/// Theme mode for the application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ThemeMode {
    #[default]
    Dark,
    Light,
}

impl ThemeMode {
    /// Resolve the mode from the configured name, falling back to detection
    pub fn resolve(configured: &str) -> Self {
        Self::from_name(configured)
            .or_else(Self::from_env)
            .or_else(|| {
                std::env::var("COLORFGBG")
                    .ok()
                    .and_then(|value| Self::from_colorfgbg(&value))
            })
            .unwrap_or_default()
    }

    fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "light" => Some(Self::Light),
            "dark" => Some(Self::Dark),
            _ => None,
        }
    }

    fn from_env() -> Option<Self> {
        Self::from_name(&std::env::var("TIGR_THEME").ok()?)
    }

    /// Parse a COLORFGBG value ("fg;bg" or "fg;default;bg")
    fn from_colorfgbg(value: &str) -> Option<Self> {
        let bg: u8 = value.split(';').last()?.parse().ok()?;
        // ANSI colors 0-6,8 are dark backgrounds, 7 and 9+ are light
        if bg > 8 || bg == 7 {
            Some(Self::Light)
        } else {
            Some(Self::Dark)
        }
    }
}

/// Color palette shared by every view
#[derive(Debug, Clone, PartialEq)]
pub struct Colors {
    pub text: Color,
    pub muted: Color,
    pub header: Color,
    pub border: Color,
    pub border_focused: Color,
    pub cursor: Color,
    pub status_bar: Color,
    pub status_bar_text: Color,
    pub error: Color,
    pub diff_add: Color,
    pub diff_del: Color,
    pub diff_header: Color,
    pub diff_chunk: Color,
    pub diff_meta: Color,
    pub id: Color,
    pub date: Color,
    pub author: Color,
    pub branch: Color,
    pub tag: Color,
    pub remote: Color,
    pub staged: Color,
    pub modified: Color,
    pub untracked: Color,
    pub conflict: Color,
    pub directory: Color,
}

impl Colors {
    pub fn for_theme(theme: ThemeMode) -> Self {
        match theme {
            ThemeMode::Dark => Self::dark(),
            ThemeMode::Light => Self::light(),
        }
    }

    /// Dark theme, close to tig's stock ANSI colors
    pub fn dark() -> Self {
        Self {
            text: Color::Reset,
            muted: Color::DarkGray,
            header: Color::Blue,
            border: Color::DarkGray,
            border_focused: Color::Blue,
            cursor: Color::Rgb(49, 50, 68),
            status_bar: Color::Rgb(49, 50, 68),
            status_bar_text: Color::White,
            error: Color::LightRed,
            diff_add: Color::Green,
            diff_del: Color::Red,
            diff_header: Color::Cyan,
            diff_chunk: Color::Magenta,
            diff_meta: Color::Yellow,
            id: Color::Magenta,
            date: Color::Blue,
            author: Color::Green,
            branch: Color::Cyan,
            tag: Color::Yellow,
            remote: Color::Red,
            staged: Color::Green,
            modified: Color::Red,
            untracked: Color::Magenta,
            conflict: Color::LightRed,
            directory: Color::Blue,
        }
    }

    /// Light theme (darker foregrounds for light backgrounds)
    pub fn light() -> Self {
        Self {
            text: Color::Reset,
            muted: Color::Rgb(90, 90, 100),
            header: Color::Rgb(0, 60, 180),
            border: Color::Rgb(150, 155, 170),
            border_focused: Color::Rgb(0, 60, 180),
            cursor: Color::Rgb(210, 220, 240),
            status_bar: Color::Rgb(220, 225, 235),
            status_bar_text: Color::Rgb(10, 10, 15),
            error: Color::Rgb(180, 0, 30),
            diff_add: Color::Rgb(0, 110, 0),
            diff_del: Color::Rgb(180, 0, 30),
            diff_header: Color::Rgb(0, 100, 120),
            diff_chunk: Color::Rgb(90, 20, 180),
            diff_meta: Color::Rgb(160, 80, 0),
            id: Color::Rgb(90, 20, 180),
            date: Color::Rgb(0, 60, 180),
            author: Color::Rgb(0, 110, 0),
            branch: Color::Rgb(0, 100, 120),
            tag: Color::Rgb(160, 80, 0),
            remote: Color::Rgb(180, 0, 30),
            staged: Color::Rgb(0, 110, 0),
            modified: Color::Rgb(180, 0, 30),
            untracked: Color::Rgb(90, 20, 180),
            conflict: Color::Rgb(180, 0, 30),
            directory: Color::Rgb(0, 60, 180),
        }
    }

    /// Build the palette for a theme and apply `slot = "color"` overrides.
    pub fn from_config(theme: ThemeMode, overrides: &BTreeMap<String, String>) -> Self {
        let mut colors = Self::for_theme(theme);
        for (slot, value) in overrides {
            match parse_color(value) {
                Some(color) => {
                    if !colors.set(slot, color) {
                        log::warn!("Unknown color slot '{}' in config", slot);
                    }
                }
                None => log::warn!("Unknown color '{}' for slot '{}'", value, slot),
            }
        }
        colors
    }

    /// Set a palette slot by its config name. Returns false for unknown slots.
    pub fn set(&mut self, slot: &str, color: Color) -> bool {
        let target = match slot.replace('_', "-").as_str() {
            "text" | "default" => &mut self.text,
            "muted" => &mut self.muted,
            "header" | "title" => &mut self.header,
            "border" => &mut self.border,
            "border-focused" => &mut self.border_focused,
            "cursor" => &mut self.cursor,
            "status-bar" => &mut self.status_bar,
            "status-bar-text" => &mut self.status_bar_text,
            "error" => &mut self.error,
            "diff-add" => &mut self.diff_add,
            "diff-del" => &mut self.diff_del,
            "diff-header" => &mut self.diff_header,
            "diff-chunk" => &mut self.diff_chunk,
            "diff-meta" | "diff-index" => &mut self.diff_meta,
            "id" => &mut self.id,
            "date" => &mut self.date,
            "author" => &mut self.author,
            "branch" => &mut self.branch,
            "tag" => &mut self.tag,
            "remote" => &mut self.remote,
            "staged" => &mut self.staged,
            "modified" => &mut self.modified,
            "untracked" => &mut self.untracked,
            "conflict" => &mut self.conflict,
            "directory" => &mut self.directory,
            _ => return false,
        };
        *target = color;
        true
    }
}

impl Default for Colors {
    fn default() -> Self {
        Self::dark()
    }
}

/// Parse a color name. Accepts ratatui names ("red", "lightblue"),
/// "#rrggbb", ANSI indices, and the "gray"/"lightgray" spellings.
pub fn parse_color(name: &str) -> Option<Color> {
    let name = name.trim().to_lowercase();
    match name.as_str() {
        "lightgray" | "lightgrey" => Some(Color::Gray),
        "darkgrey" => Some(Color::DarkGray),
        "default" => Some(Color::Reset),
        _ => Color::from_str(&name).ok(),
    }
}

impl Colors {
    pub fn style_text(&self) -> Style {
        Style::default().fg(self.text)
    }

    pub fn style_muted(&self) -> Style {
        Style::default().fg(self.muted)
    }

    pub fn style_header(&self) -> Style {
        Style::default().fg(self.header).add_modifier(Modifier::BOLD)
    }

    pub fn style_cursor(&self) -> Style {
        Style::default().bg(self.cursor).add_modifier(Modifier::BOLD)
    }

    pub fn style_border(&self, focused: bool) -> Style {
        if focused {
            Style::default().fg(self.border_focused)
        } else {
            Style::default().fg(self.border)
        }
    }

    pub fn style_status_bar(&self) -> Style {
        Style::default().bg(self.status_bar).fg(self.status_bar_text)
    }

    pub fn style_error(&self) -> Style {
        Style::default().fg(self.error).add_modifier(Modifier::BOLD)
    }

    pub fn fg(&self, color: Color) -> Style {
        Style::default().fg(color)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn colorfgbg_light_and_dark() {
        assert_eq!(ThemeMode::from_colorfgbg("0;15"), Some(ThemeMode::Light));
        assert_eq!(ThemeMode::from_colorfgbg("0;default;7"), Some(ThemeMode::Light));
        assert_eq!(ThemeMode::from_colorfgbg("15;0"), Some(ThemeMode::Dark));
        assert_eq!(ThemeMode::from_colorfgbg("garbage"), None);
    }

    #[test]
    fn explicit_theme_name_wins() {
        assert_eq!(ThemeMode::resolve("light"), ThemeMode::Light);
        assert_eq!(ThemeMode::resolve("DARK"), ThemeMode::Dark);
    }

    #[test]
    fn parse_color_names() {
        assert_eq!(parse_color("red"), Some(Color::Red));
        assert_eq!(parse_color("Yellow"), Some(Color::Yellow));
        assert_eq!(parse_color("lightgray"), Some(Color::Gray));
        assert_eq!(parse_color("darkgray"), Some(Color::DarkGray));
        assert_eq!(parse_color("#ff0000"), Some(Color::Rgb(255, 0, 0)));
        assert_eq!(parse_color("not-a-color"), None);
    }

    #[test]
    fn overrides_replace_known_slots() {
        let mut overrides = BTreeMap::new();
        overrides.insert("diff-add".to_string(), "blue".to_string());
        overrides.insert("cursor".to_string(), "#102030".to_string());
        overrides.insert("no-such-slot".to_string(), "red".to_string());
        overrides.insert("branch".to_string(), "sparkly".to_string());

        let colors = Colors::from_config(ThemeMode::Dark, &overrides);
        assert_eq!(colors.diff_add, Color::Blue);
        assert_eq!(colors.cursor, Color::Rgb(16, 32, 48));
        // invalid color keeps the default
        assert_eq!(colors.branch, Colors::dark().branch);
    }

    #[test]
    fn slot_names_accept_underscores() {
        let mut colors = Colors::dark();
        assert!(colors.set("status_bar", Color::Black));
        assert_eq!(colors.status_bar, Color::Black);
        assert!(!colors.set("bogus", Color::Black));
    }
}
