use crossterm::event::{KeyCode, KeyEvent};
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::Color,
    text::{Line, Span},
    widgets::Widget,
};
use std::any::Any;

use crate::config::StatusViewConfig;
use crate::git::{BackendResult, Status, StatusEntry};
use crate::keymap::Action;
use crate::theme::Colors;
use crate::ui::scroll::ListState;
use crate::ui::view::*;

/// Status sections in display order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    Staged,
    Modified,
    Untracked,
    Conflicts,
}

impl Section {
    fn heading(&self) -> &'static str {
        match self {
            Self::Staged => "Changes to be committed:",
            Self::Modified => "Changes not staged for commit:",
            Self::Untracked => "Untracked files:",
            Self::Conflicts => "Unmerged paths:",
        }
    }

    fn color(&self, colors: &Colors) -> Color {
        match self {
            Self::Staged => colors.staged,
            Self::Modified => colors.modified,
            Self::Untracked => colors.untracked,
            Self::Conflicts => colors.conflict,
        }
    }
}

/// Which sections are listed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Filter {
    #[default]
    All,
    Only(Section),
}

impl Filter {
    fn next(self) -> Self {
        match self {
            Self::All => Self::Only(Section::Staged),
            Self::Only(Section::Staged) => Self::Only(Section::Modified),
            Self::Only(Section::Modified) => Self::Only(Section::Untracked),
            Self::Only(Section::Untracked) => Self::Only(Section::Conflicts),
            Self::Only(Section::Conflicts) => Self::All,
        }
    }

    fn shows(&self, section: Section) -> bool {
        match self {
            Self::All => true,
            Self::Only(only) => *only == section,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Only(Section::Staged) => "staged",
            Self::Only(Section::Modified) => "modified",
            Self::Only(Section::Untracked) => "untracked",
            Self::Only(Section::Conflicts) => "conflicts",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Row {
    Header(Section),
    File(Section, StatusEntry),
}

/// Working tree status with staging actions
pub struct StatusView {
    backend: Backend,
    colors: Colors,
    config: StatusViewConfig,
    status: Option<Status>,
    rows: Vec<Row>,
    filter: Filter,
    list: ListState,
    area: Rect,
    focused: bool,
    has_repo: bool,
    request: Option<ViewRequest>,
}

impl StatusView {
    pub fn new(backend: Backend, colors: Colors, config: StatusViewConfig) -> Self {
        let has_repo = backend.is_repository();
        Self {
            backend,
            colors,
            config,
            status: None,
            rows: Vec::new(),
            filter: Filter::default(),
            list: ListState::new(),
            area: Rect::default(),
            focused: false,
            has_repo,
            request: None,
        }
    }

    pub fn status(&self) -> Option<&Status> {
        self.status.as_ref()
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn list(&self) -> &ListState {
        &self.list
    }

    pub fn filter(&self) -> Filter {
        self.filter
    }

    pub fn selected_row(&self) -> Option<&Row> {
        self.rows.get(self.list.selected())
    }

    fn rebuild_rows(&mut self) {
        self.rows.clear();
        if let Some(status) = &self.status {
            let sections = [
                (Section::Staged, &status.staged),
                (Section::Modified, &status.modified),
                (Section::Untracked, &status.untracked),
                (Section::Conflicts, &status.conflicts),
            ];
            for (section, entries) in sections {
                if entries.is_empty() || !self.filter.shows(section) {
                    continue;
                }
                if section == Section::Untracked && !self.config.show_untracked {
                    continue;
                }
                self.rows.push(Row::Header(section));
                self.rows
                    .extend(entries.iter().map(|e| Row::File(section, e.clone())));
            }
        }
        self.list.set_len(self.rows.len());
    }

    fn summary(status: &Status) -> String {
        if status.is_clean() {
            return "nothing to commit, working tree clean".to_string();
        }
        let mut parts = Vec::new();
        for (count, label) in [
            (status.staged.len(), "staged"),
            (status.modified.len(), "modified"),
            (status.untracked.len(), "untracked"),
            (status.conflicts.len(), "conflicted"),
        ] {
            if count > 0 {
                parts.push(format!("{} {}", count, label));
            }
        }
        parts.join(", ")
    }

    fn branch_line(status: &Status) -> String {
        let mut line = format!("On branch {}", status.branch);
        match (status.ahead, status.behind) {
            (0, 0) => {}
            (ahead, 0) => line.push_str(&format!(" (ahead {})", ahead)),
            (0, behind) => line.push_str(&format!(" (behind {})", behind)),
            (ahead, behind) => line.push_str(&format!(" (ahead {}, behind {})", ahead, behind)),
        }
        line
    }

    /// Files in one section of the current snapshot
    fn section_paths(&self, section: Section) -> Vec<String> {
        self.rows
            .iter()
            .filter_map(|row| match row {
                Row::File(s, entry) if *s == section => Some(entry.path.clone()),
                _ => None,
            })
            .collect()
    }

    /// Run a mutation, then reload. Errors become a status line message and
    /// leave the displayed snapshot untouched.
    fn mutate(&mut self, done: String, op: impl FnOnce(&Backend) -> BackendResult<()>) {
        if let Err(e) = op(&self.backend) {
            log::warn!("Status action failed: {}", e);
            self.request = Some(ViewRequest::Error(e.to_string()));
            return;
        }
        self.request = Some(match self.refresh() {
            Ok(()) => ViewRequest::Message(done),
            Err(e) => ViewRequest::Error(e.to_string()),
        });
    }

    /// Stage files one at a time. A failure part way through still reloads,
    /// since the files before it are already in the index.
    fn stage_paths(&mut self, paths: &[String]) {
        let mut staged = 0;
        for path in paths {
            if let Err(e) = self.backend.stage_file(path) {
                log::warn!("Staging {} failed after {} files: {}", path, staged, e);
                if staged > 0 {
                    if let Err(e) = self.refresh() {
                        log::warn!("Reload after partial staging failed: {}", e);
                    }
                }
                self.request = Some(ViewRequest::Error(e.to_string()));
                return;
            }
            staged += 1;
        }
        self.request = Some(match self.refresh() {
            Ok(()) => ViewRequest::Message(format!("Staged {} files", staged)),
            Err(e) => ViewRequest::Error(e.to_string()),
        });
    }

    fn stage_selected(&mut self) {
        match self.selected_row().cloned() {
            Some(Row::File(Section::Staged, entry)) => {
                self.request = Some(ViewRequest::Message(format!("{} is already staged", entry.path)));
            }
            Some(Row::File(_, entry)) => {
                let path = entry.path;
                self.mutate(format!("Staged {}", path), |b| b.stage_file(&path));
            }
            Some(Row::Header(Section::Staged)) => {}
            Some(Row::Header(section)) => {
                let paths = self.section_paths(section);
                self.stage_paths(&paths);
            }
            None => {}
        }
    }

    fn unstage_selected(&mut self) {
        match self.selected_row().cloned() {
            Some(Row::File(Section::Staged, entry)) => {
                let path = entry.path;
                self.mutate(format!("Unstaged {}", path), |b| b.unstage_file(&path));
            }
            Some(Row::Header(Section::Staged)) => {
                self.mutate("Unstaged all files".to_string(), |b| b.unstage_all());
            }
            Some(_) => {
                self.request = Some(ViewRequest::Message("Nothing staged here".to_string()));
            }
            None => {}
        }
    }

    fn discard_selected(&mut self) {
        match self.selected_row().cloned() {
            Some(Row::File(Section::Modified, entry)) => {
                let path = entry.path;
                self.mutate(format!("Discarded changes in {}", path), |b| {
                    b.discard_changes(&path)
                });
            }
            Some(_) => {
                self.request = Some(ViewRequest::Error(
                    "Only unstaged changes can be discarded".to_string(),
                ));
            }
            None => {}
        }
    }

    fn format_row(&self, row: &Row) -> Line<'static> {
        match row {
            Row::Header(section) => Line::from(Span::styled(
                section.heading().to_string(),
                self.colors.style_header(),
            )),
            Row::File(section, entry) => Line::from(vec![
                Span::raw("  "),
                Span::styled(
                    entry.status.as_char().to_string(),
                    self.colors.fg(section.color(&self.colors)),
                ),
                Span::raw(" "),
                Span::styled(entry.path.clone(), self.colors.style_text()),
            ]),
        }
    }
}

impl View for StatusView {
    fn view_type(&self) -> ViewType {
        ViewType::Status
    }

    fn title(&self) -> String {
        match self.filter {
            Filter::All => "Status".to_string(),
            filter => format!("Status [{}]", filter.label()),
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

        let Some(status) = &self.status else {
            let message = if self.has_repo {
                "No repository status available"
            } else {
                "Not in a git repository"
            };
            render_placeholder(buf, inner, message, &self.colors);
            return Ok(());
        };

        let header = Line::from(vec![
            Span::styled(Self::branch_line(status), self.colors.fg(self.colors.branch)),
            Span::styled(
                format!("  {}", Self::summary(status)),
                self.colors.style_muted(),
            ),
        ]);
        buf.set_line(inner.x, inner.y, &header, inner.width);

        let list_area = Rect {
            y: inner.y.saturating_add(1),
            height: inner.height.saturating_sub(1),
            ..inner
        };
        if self.rows.is_empty() {
            render_placeholder(buf, list_area, &Self::summary(status), &self.colors);
            return Ok(());
        }
        for (row, index) in self.list.visible_range().enumerate() {
            let line = self.format_row(&self.rows[index]);
            let cursor = (index == self.list.selected()).then(|| self.colors.style_cursor());
            render_row(buf, list_area, row, &line, cursor);
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
            KeyCode::Tab => {
                self.filter = self.filter.next();
                self.rebuild_rows();
                true
            }
            _ => false,
        }
    }

    fn handle_action(&mut self, action: Action) -> bool {
        if !self.focused || self.status.is_none() {
            return false;
        }
        match action {
            Action::Stage => self.stage_selected(),
            Action::Unstage => self.unstage_selected(),
            Action::Discard => self.discard_selected(),
            Action::StageAll => self.mutate("Staged all files".to_string(), |b| b.stage_all()),
            Action::UnstageAll => {
                self.mutate("Unstaged all files".to_string(), |b| b.unstage_all())
            }
            _ => return false,
        }
        true
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
            self.status = None;
            self.rebuild_rows();
            return Ok(());
        }
        self.status = Some(self.backend.status()?);
        self.rebuild_rows();
        Ok(())
    }

    fn set_position(&mut self, area: Rect) {
        self.area = area;
        // branch line above the list
        self.list.set_viewport_height(content_height(area, 1));
    }

    fn position(&self) -> Rect {
        self.area
    }

    fn take_request(&mut self) -> Option<ViewRequest> {
        self.request.take()
    }

    fn status_hint(&self) -> String {
        match &self.status {
            Some(status) => Self::summary(status),
            None => String::new(),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
