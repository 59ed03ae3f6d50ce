use crossterm::event::{KeyCode, KeyEvent};
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::Modifier,
    text::{Line, Span},
    widgets::Widget,
};
use std::any::Any;
use std::collections::HashMap;
use std::path::Path;

use crate::config::MainViewConfig;
use crate::git::{Commit, LogOptions, Ref, RefKind};
use crate::theme::Colors;
use crate::ui::scroll::ListState;
use crate::ui::view::*;

/// Commit log
pub struct MainView {
    backend: Backend,
    colors: Colors,
    config: MainViewConfig,
    max_commits: usize,
    commits: Vec<Commit>,
    /// Branch and tag names by commit id
    decorations: HashMap<String, Vec<Ref>>,
    list: ListState,
    area: Rect,
    focused: bool,
    has_repo: bool,
    request: Option<ViewRequest>,
}

impl MainView {
    pub fn new(backend: Backend, colors: Colors, config: MainViewConfig, max_commits: usize) -> Self {
        let has_repo = backend.is_repository();
        Self {
            backend,
            colors,
            config,
            max_commits,
            commits: Vec::new(),
            decorations: HashMap::new(),
            list: ListState::new(),
            area: Rect::default(),
            focused: false,
            has_repo,
            request: None,
        }
    }

    pub fn commits(&self) -> &[Commit] {
        &self.commits
    }

    pub fn list(&self) -> &ListState {
        &self.list
    }

    pub fn selected_commit(&self) -> Option<&Commit> {
        self.commits.get(self.list.selected())
    }

    fn load_decorations(&self) -> HashMap<String, Vec<Ref>> {
        let mut decorations: HashMap<String, Vec<Ref>> = HashMap::new();
        let refs = self
            .backend
            .branches()
            .and_then(|mut branches| {
                branches.extend(self.backend.tags()?);
                Ok(branches)
            });
        match refs {
            Ok(refs) => {
                for r in refs {
                    decorations.entry(r.target.clone()).or_default().push(r);
                }
            }
            Err(e) => log::debug!("No ref decorations: {}", e),
        }
        decorations
    }

    fn format_line(&self, commit: &Commit) -> Line<'static> {
        let mut spans = Vec::new();
        if self.config.show_graph {
            spans.push(Span::styled("* ", self.colors.style_muted()));
        }
        if self.config.show_refs {
            for r in self.decorations.get(&commit.id).into_iter().flatten() {
                let (label, color) = match r.kind {
                    RefKind::Branch => (format!("[{}]", r.name), self.colors.branch),
                    RefKind::Tag => (format!("<{}>", r.name), self.colors.tag),
                    RefKind::Remote => (format!("{{{}}}", r.name), self.colors.remote),
                };
                let mut style = self.colors.fg(color);
                if r.is_head {
                    style = style.add_modifier(Modifier::BOLD);
                }
                spans.push(Span::styled(label, style));
                spans.push(Span::raw(" "));
            }
        }
        if self.config.show_id {
            spans.push(Span::styled(
                format!("{} ", commit.short_id()),
                self.colors.fg(self.colors.id),
            ));
        }
        if self.config.show_date {
            spans.push(Span::styled(
                format!("{} ", commit.date.format(&self.config.date_format)),
                self.colors.fg(self.colors.date),
            ));
        }
        if self.config.show_author {
            spans.push(Span::styled(
                format!("{} ", fit(&commit.author, self.config.author_width)),
                self.colors.fg(self.colors.author),
            ));
        }
        spans.push(Span::styled(commit.summary.clone(), self.colors.style_text()));
        Line::from(spans)
    }
}

impl View for MainView {
    fn view_type(&self) -> ViewType {
        ViewType::Main
    }

    fn title(&self) -> String {
        "Log".to_string()
    }

    fn render(&mut self, buf: &mut Buffer, area: Rect) -> Result<(), ViewError> {
        check_area(area)?;
        if area != self.area {
            self.set_position(area);
        }
        let block = frame_block(self.title(), self.focused, &self.colors);
        let inner = block.inner(area);
        block.render(area, buf);

        if self.commits.is_empty() {
            let message = if self.has_repo {
                "No commits found"
            } else {
                "Not in a git repository"
            };
            render_placeholder(buf, inner, message, &self.colors);
            return Ok(());
        }

        for (row, index) in self.list.visible_range().enumerate() {
            let line = self.format_line(&self.commits[index]);
            let cursor = (index == self.list.selected()).then(|| self.colors.style_cursor());
            render_row(buf, inner, row, &line, cursor);
        }
        render_scrollbar(buf, area, self.list.scroll(), &self.colors);
        Ok(())
    }

    fn handle_key(&mut self, key: &KeyEvent) -> bool {
        if !self.focused {
            return false;
        }
        if handle_list_key(&mut self.list, key) {
            return true;
        }
        match key.code {
            KeyCode::Enter => {
                if let Some(commit) = self.selected_commit() {
                    self.request = Some(ViewRequest::ShowDiff(commit.id.clone()));
                }
                true
            }
            _ => false,
        }
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
            self.commits.clear();
            self.decorations.clear();
            self.list.set_len(0);
            return Ok(());
        }

        let opts = LogOptions {
            max_count: self.max_commits,
            all: true,
            ..LogOptions::default()
        };
        self.commits = self.backend.commits(&opts)?;
        self.list.set_len(self.commits.len());
        if self.config.show_refs {
            self.decorations = self.load_decorations();
        }
        log::debug!("Loaded {} commits", self.commits.len());
        Ok(())
    }

    fn set_position(&mut self, area: Rect) {
        self.area = area;
        self.list.set_viewport_height(content_height(area, 0));
    }

    fn position(&self) -> Rect {
        self.area
    }

    fn set_repo_path(&mut self, _path: &Path) {
        self.list.reset();
    }

    fn take_request(&mut self) -> Option<ViewRequest> {
        self.request.take()
    }

    fn status_hint(&self) -> String {
        if self.commits.is_empty() {
            return String::new();
        }
        format!("commit {}/{}", self.list.selected() + 1, self.commits.len())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
