use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Widget},
};
use std::any::Any;
use std::fmt;
use std::path::Path;
use std::rc::Rc;
use std::str::FromStr;
use thiserror::Error;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::git::{BackendError, GitBackend};
use crate::keymap::Action;
use crate::theme::Colors;

use super::scroll::{ListState, ScrollState};

/// Backend shared by every view on the UI thread
pub type Backend = Rc<dyn GitBackend>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ViewType {
    Main,
    Diff,
    Status,
    Tree,
    Refs,
    Help,
}

impl ViewType {
    pub const ALL: [ViewType; 6] = [
        ViewType::Main,
        ViewType::Diff,
        ViewType::Status,
        ViewType::Tree,
        ViewType::Refs,
        ViewType::Help,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Main => "main",
            Self::Diff => "diff",
            Self::Status => "status",
            Self::Tree => "tree",
            Self::Refs => "refs",
            Self::Help => "help",
        }
    }

    /// View opened by a view-switching action
    pub fn for_action(action: Action) -> Option<Self> {
        match action {
            Action::Log => Some(Self::Main),
            Action::Diff => Some(Self::Diff),
            Action::Status => Some(Self::Status),
            Action::Tree => Some(Self::Tree),
            Action::Refs => Some(Self::Refs),
            Action::Help => Some(Self::Help),
            _ => None,
        }
    }
}

impl fmt::Display for ViewType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ViewType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "main" | "log" => Ok(Self::Main),
            "diff" => Ok(Self::Diff),
            "status" => Ok(Self::Status),
            "tree" => Ok(Self::Tree),
            "refs" => Ok(Self::Refs),
            "help" => Ok(Self::Help),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Error)]
pub enum ViewError {
    #[error("view {0} not found")]
    ViewNotFound(ViewType),
    #[error("screen dimensions not set")]
    DimensionsNotSet,
    #[error("invalid dimensions {width}x{height}")]
    InvalidDimensions { width: u16, height: u16 },
    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl ViewError {
    /// Zero-size render targets only skip the frame
    pub fn is_skip_frame(&self) -> bool {
        matches!(self, Self::DimensionsNotSet | Self::InvalidDimensions { .. })
    }
}

/// Something a view needs from the manager after handling a key
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewRequest {
    /// Load this commit into the diff view and switch to it
    ShowDiff(String),
    /// Informational text for the status line
    Message(String),
    /// A failed action, shown in the error color
    Error(String),
}

pub trait View {
    fn view_type(&self) -> ViewType;

    /// Title shown in the frame and the status line
    fn title(&self) -> String;

    /// Draw inside `area` only.
    fn render(&mut self, buf: &mut Buffer, area: Rect) -> Result<(), ViewError>;

    /// Returns true when the key changed something worth redrawing.
    fn handle_key(&mut self, key: &KeyEvent) -> bool;

    /// View-scoped keymap actions such as staging.
    fn handle_action(&mut self, _action: Action) -> bool {
        false
    }

    fn focus(&mut self);
    fn blur(&mut self);
    fn is_focused(&self) -> bool;

    /// Reload data from the backend. A failure keeps the previous data.
    fn refresh(&mut self) -> Result<(), ViewError>;

    fn set_position(&mut self, area: Rect);
    fn position(&self) -> Rect;

    fn set_repo_path(&mut self, _path: &Path) {}

    fn take_request(&mut self) -> Option<ViewRequest> {
        None
    }

    /// Short position text for the status line, e.g. "3/42"
    fn status_hint(&self) -> String {
        String::new()
    }

    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

pub fn check_area(area: Rect) -> Result<(), ViewError> {
    if area.width == 0 || area.height == 0 {
        return Err(ViewError::InvalidDimensions {
            width: area.width,
            height: area.height,
        });
    }
    Ok(())
}

/// Bordered frame with the view title
pub fn frame_block<'a>(title: String, focused: bool, colors: &Colors) -> Block<'a> {
    Block::default()
        .borders(Borders::ALL)
        .border_style(colors.style_border(focused))
        .title(Span::styled(format!(" {} ", title), colors.style_header()))
}

/// Rows left for content inside a bordered frame with `extra` header rows
pub fn content_height(area: Rect, extra: u16) -> usize {
    area.height.saturating_sub(2 + extra) as usize
}

/// Centered message for views without data
pub fn render_placeholder(buf: &mut Buffer, area: Rect, text: &str, colors: &Colors) {
    if area.height == 0 || area.width == 0 {
        return;
    }
    let width = text.width() as u16;
    let x = area.x + area.width.saturating_sub(width) / 2;
    let y = area.y + area.height / 2;
    buf.set_stringn(x, y, text, area.width as usize, colors.style_muted());
}

/// Scrollbar drawn over the right border of `area`
pub fn render_scrollbar(buf: &mut Buffer, area: Rect, scroll: &ScrollState, colors: &Colors) {
    if area.width < 2 || area.height < 3 {
        return;
    }
    let track = (area.height - 2) as usize;
    let Some((pos, len)) = scroll.thumb(track) else {
        return;
    };
    let x = area.right() - 1;
    for row in 0..track {
        let symbol = if row >= pos && row < pos + len {
            "█"
        } else {
            "│"
        };
        if let Some(cell) = buf.cell_mut((x, area.y + 1 + row as u16)) {
            cell.set_symbol(symbol).set_style(colors.style_muted());
        }
    }
}

/// Draw one list row, highlighting it when it holds the cursor
pub fn render_row(buf: &mut Buffer, area: Rect, row: usize, line: &Line, cursor: Option<Style>) {
    let y = area.y + row as u16;
    if y >= area.bottom() {
        return;
    }
    buf.set_line(area.x, y, line, area.width);
    if let Some(style) = cursor {
        buf.set_style(Rect::new(area.x, y, area.width, 1), style);
    }
}

/// Truncate to `width` columns, appending "..." when cut
pub fn truncate(text: &str, width: usize) -> String {
    if text.width() <= width {
        return text.to_string();
    }
    if width <= 3 {
        return ".".repeat(width);
    }
    let mut out = String::new();
    let mut used = 0;
    for c in text.chars() {
        let w = c.width().unwrap_or(0);
        if used + w > width - 3 {
            break;
        }
        used += w;
        out.push(c);
    }
    out.push_str("...");
    out
}

/// Truncate or pad to exactly `width` columns
pub fn fit(text: &str, width: usize) -> String {
    let cut = truncate(text, width);
    let pad = width.saturating_sub(cut.width());
    format!("{}{}", cut, " ".repeat(pad))
}

/// Navigation keys shared by list views. Returns true when the key was a
/// navigation key, even if the list is empty and nothing moved.
pub fn handle_list_key(list: &mut ListState, key: &KeyEvent) -> bool {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    match key.code {
        KeyCode::Down | KeyCode::Char('j') if !ctrl => list.move_down(),
        KeyCode::Up | KeyCode::Char('k') if !ctrl => list.move_up(),
        KeyCode::PageDown => list.page_down(),
        KeyCode::PageUp => list.page_up(),
        KeyCode::Char('d') if ctrl => list.page_down(),
        KeyCode::Char('u') if ctrl => list.page_up(),
        KeyCode::Home => list.to_top(),
        KeyCode::End => list.to_bottom(),
        _ => return false,
    }
    true
}

/// Same keys for views that scroll without a selection
pub fn handle_scroll_key(scroll: &mut ScrollState, key: &KeyEvent) -> bool {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    match key.code {
        KeyCode::Down | KeyCode::Char('j') if !ctrl => scroll.scroll_down(),
        KeyCode::Up | KeyCode::Char('k') if !ctrl => scroll.scroll_up(),
        KeyCode::PageDown | KeyCode::Char(' ') => scroll.page_down(),
        KeyCode::PageUp => scroll.page_up(),
        KeyCode::Char('d') if ctrl => scroll.page_down(),
        KeyCode::Char('u') if ctrl => scroll.page_up(),
        KeyCode::Home => scroll.to_top(),
        KeyCode::End => scroll.to_bottom(),
        _ => return false,
    }
    true
}

/// Canonical key a navigation action stands for
pub fn navigation_key(action: Action) -> Option<KeyEvent> {
    let code = match action {
        Action::Up => KeyCode::Up,
        Action::Down => KeyCode::Down,
        Action::PageUp => KeyCode::PageUp,
        Action::PageDown => KeyCode::PageDown,
        Action::Top => KeyCode::Home,
        Action::Bottom => KeyCode::End,
        _ => return None,
    };
    Some(KeyEvent::new(code, KeyModifiers::NONE))
}

/// Render a one-line tab bar, e.g. " 1 Branches  2 Tags "
pub fn render_tabs(
    buf: &mut Buffer,
    area: Rect,
    tabs: &[&str],
    active: usize,
    colors: &Colors,
) {
    let mut spans = Vec::new();
    for (i, tab) in tabs.iter().enumerate() {
        let style = if i == active {
            colors.style_cursor()
        } else {
            colors.style_muted()
        };
        spans.push(Span::styled(format!(" {} {} ", i + 1, tab), style));
        spans.push(Span::raw(" "));
    }
    buf.set_line(area.x, area.y, &Line::from(spans), area.width);
}

/// Clear a rectangle
pub fn clear(buf: &mut Buffer, area: Rect) {
    ratatui::widgets::Clear.render(area, buf);
}

/// Rows of a buffer as plain strings
#[cfg(test)]
pub fn buffer_lines(buf: &Buffer) -> Vec<String> {
    let area = buf.area;
    (area.top()..area.bottom())
        .map(|y| {
            (area.left()..area.right())
                .map(|x| buf[(x, y)].symbol())
                .collect::<String>()
        })
        .collect()
}

#[cfg(test)]
pub fn buffer_contains(buf: &Buffer, text: &str) -> bool {
    buffer_lines(buf).iter().any(|line| line.contains(text))
}
