use crossterm::event::KeyEvent;
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::Widget,
};
use std::any::Any;
use std::path::Path;

use crate::theme::Colors;
use crate::ui::scroll::ScrollState;
use crate::ui::view::*;

/// Patch text of a single commit. Scrolls without a selection.
pub struct DiffView {
    backend: Backend,
    colors: Colors,
    commit: Option<String>,
    lines: Vec<String>,
    scroll: ScrollState,
    area: Rect,
    focused: bool,
    has_repo: bool,
}

impl DiffView {
    pub fn new(backend: Backend, colors: Colors) -> Self {
        let has_repo = backend.is_repository();
        Self {
            backend,
            colors,
            commit: None,
            lines: Vec::new(),
            scroll: ScrollState::new(),
            area: Rect::default(),
            focused: false,
            has_repo,
        }
    }

    /// Select the commit to show. Takes effect on the next refresh.
    pub fn set_commit(&mut self, id: &str) {
        if self.commit.as_deref() != Some(id) {
            self.commit = Some(id.to_string());
            self.scroll.to_top();
        }
    }

    pub fn commit(&self) -> Option<&str> {
        self.commit.as_deref()
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn scroll(&self) -> &ScrollState {
        &self.scroll
    }

    fn set_lines(&mut self, lines: Vec<String>) {
        self.lines = lines;
        self.scroll.set_content_len(self.lines.len());
    }

    fn line_style(&self, line: &str) -> Style {
        let c = &self.colors;
        if line.starts_with("+++ ") || line.starts_with("--- ") {
            c.fg(c.diff_header)
        } else if line.starts_with('+') {
            c.fg(c.diff_add)
        } else if line.starts_with('-') {
            c.fg(c.diff_del)
        } else if line.starts_with("@@ ") {
            c.fg(c.diff_chunk).add_modifier(Modifier::BOLD)
        } else if line.starts_with("diff ") {
            c.style_header()
        } else if line.starts_with("commit ") {
            c.fg(c.id).add_modifier(Modifier::BOLD)
        } else if line.starts_with("Author:") {
            c.fg(c.author)
        } else if line.starts_with("Date:") {
            c.fg(c.date)
        } else if [
            "index ",
            "new file mode",
            "deleted file mode",
            "old mode",
            "new mode",
            "similarity index",
            "rename from",
            "rename to",
            "Binary files",
            "Merge:",
        ]
        .iter()
        .any(|prefix| line.starts_with(prefix))
        {
            c.fg(c.diff_meta)
        } else {
            c.style_text()
        }
    }
}

impl View for DiffView {
    fn view_type(&self) -> ViewType {
        ViewType::Diff
    }

    fn title(&self) -> String {
        match &self.commit {
            Some(id) => format!("Diff {}", &id[..id.len().min(7)]),
            None => "Diff".to_string(),
        }
    }

    fn render(&mut self, buf: &mut Buffer, area: Rect) -> Result<(), ViewError> {
        check_area(area)?;
        if area != self.area {
            self.set_position(area);
        }
        let block = frame_block(self.title(), self.focused, &self.colors);
        let inner = block.inner(area);
        block.render(area, buf);

        let placeholder = if !self.has_repo {
            Some("Not in a git repository")
        } else if self.commit.is_none() {
            Some("No commit selected")
        } else if self.lines.is_empty() {
            Some("No diff to display")
        } else {
            None
        };
        if let Some(message) = placeholder {
            render_placeholder(buf, inner, message, &self.colors);
            return Ok(());
        }

        let visible = self
            .lines
            .iter()
            .skip(self.scroll.offset())
            .take(inner.height as usize);
        for (row, text) in visible.enumerate() {
            let line = Line::from(Span::styled(text.as_str(), self.line_style(text)));
            render_row(buf, inner, row, &line, None);
        }
        render_scrollbar(buf, area, &self.scroll, &self.colors);
        Ok(())
    }

    fn handle_key(&mut self, key: &KeyEvent) -> bool {
        if !self.focused {
            return false;
        }
        handle_scroll_key(&mut self.scroll, key)
    }

    fn focus(&mut self) {
        self.focused = true;
    }

    fn blur(&mut self) {
        self.focused = false;
    }

    fn is_focused(&self) -> bool {
        self.focused
    }

    fn refresh(&mut self) -> Result<(), ViewError> {
        self.has_repo = self.backend.is_repository();
        if !self.has_repo {
            self.set_lines(Vec::new());
            return Ok(());
        }
        let Some(id) = self.commit.clone() else {
            self.set_lines(Vec::new());
            return Ok(());
        };
        let text = self.backend.commit_diff(&id)?;
        let lines = text.lines().map(|l| l.replace('\t', "    ")).collect();
        self.set_lines(lines);
        Ok(())
    }

    fn set_position(&mut self, area: Rect) {
        self.area = area;
        self.scroll.set_viewport_height(content_height(area, 0));
    }

    fn position(&self) -> Rect {
        self.area
    }

    fn set_repo_path(&mut self, _path: &Path) {
        self.commit = None;
        self.set_lines(Vec::new());
        self.scroll.to_top();
    }

    fn status_hint(&self) -> String {
        if self.lines.is_empty() {
            return String::new();
        }
        let last = (self.scroll.offset() + self.scroll.viewport_height()).min(self.lines.len());
        format!(
            "line {}/{} {}",
            last,
            self.lines.len(),
            self.scroll.scroll_percent()
        )
        .trim_end()
        .to_string()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::stub::StubBackend;
    use crossterm::event::{KeyCode, KeyModifiers};
    use std::rc::Rc;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn patch(lines: usize) -> String {
        let mut text = String::from("diff --git a/f b/f\n@@ -1,1 +1,1 @@\n");
        for i in 0..lines {
            text.push_str(&format!("+line {}\n", i));
        }
        text
    }

    fn diff_view(stub: StubBackend) -> (DiffView, Rc<StubBackend>) {
        let stub = Rc::new(stub);
        let mut view = DiffView::new(stub.clone(), Colors::dark());
        view.set_position(Rect::new(0, 0, 60, 12));
        view.focus();
        (view, stub)
    }

    fn render(view: &mut DiffView) -> Buffer {
        let area = view.position();
        let mut buf = Buffer::empty(area);
        view.render(&mut buf, area).unwrap();
        buf
    }

    #[test]
    fn no_commit_selected_placeholder() {
        let (mut view, _) = diff_view(StubBackend::repository());
        view.refresh().unwrap();
        assert!(view.lines().is_empty());
        assert!(buffer_contains(&render(&mut view), "No commit selected"));
    }

    #[test]
    fn not_a_repository_placeholder() {
        let (mut view, _) = diff_view(StubBackend::default());
        view.set_commit("abc");
        view.refresh().unwrap();
        assert!(buffer_contains(&render(&mut view), "Not in a git repository"));
    }

    #[test]
    fn loads_and_renders_patch() {
        let (mut view, stub) = diff_view(StubBackend::repository());
        *stub.diff.borrow_mut() = patch(2);
        view.set_commit("abcdef1234");
        view.refresh().unwrap();

        assert_eq!(view.lines()[0], "commit abcdef1234");
        let buf = render(&mut view);
        assert!(buffer_contains(&buf, "+line 1"));
        assert!(buffer_contains(&buf, " Diff abcdef1 "));
    }

    #[test]
    fn scrolls_within_bounds() {
        let (mut view, stub) = diff_view(StubBackend::repository());
        *stub.diff.borrow_mut() = patch(30);
        view.set_commit("abc");
        view.refresh().unwrap();

        // 33 lines, 10 visible
        assert!(view.handle_key(&key(KeyCode::End)));
        assert_eq!(view.scroll().offset(), 23);
        view.handle_key(&key(KeyCode::Down));
        assert_eq!(view.scroll().offset(), 23);
        view.handle_key(&key(KeyCode::PageUp));
        assert_eq!(view.scroll().offset(), 13);
        assert!(!view.handle_key(&key(KeyCode::Char('x'))));
    }

    #[test]
    fn new_commit_resets_scroll() {
        let (mut view, stub) = diff_view(StubBackend::repository());
        *stub.diff.borrow_mut() = patch(30);
        view.set_commit("abc");
        view.refresh().unwrap();
        view.handle_key(&key(KeyCode::End));

        view.set_commit("def");
        view.refresh().unwrap();
        assert_eq!(view.scroll().offset(), 0);
    }

    #[test]
    fn failed_refresh_keeps_patch() {
        let (mut view, stub) = diff_view(StubBackend::repository());
        *stub.diff.borrow_mut() = patch(3);
        view.set_commit("abc");
        view.refresh().unwrap();
        stub.fail_commits.set(true);
        assert!(view.refresh().is_err());
        assert_eq!(view.lines().len(), 6);
    }

    #[test]
    fn line_colors() {
        let (view, _) = diff_view(StubBackend::repository());
        let colors = Colors::dark();
        assert_eq!(view.line_style("+added").fg, Some(colors.diff_add));
        assert_eq!(view.line_style("-removed").fg, Some(colors.diff_del));
        assert_eq!(view.line_style("+++ b/file").fg, Some(colors.diff_header));
        assert_eq!(view.line_style("@@ -1 +1 @@").fg, Some(colors.diff_chunk));
        assert_eq!(view.line_style("index 123..456").fg, Some(colors.diff_meta));
        assert_eq!(view.line_style(" context").fg, Some(colors.text));
    }
}
