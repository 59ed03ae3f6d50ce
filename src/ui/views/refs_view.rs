use crossterm::event::{KeyCode, KeyEvent};
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::Modifier,
    text::{Line, Span},
    widgets::Widget,
};
use std::any::Any;
use std::path::Path;

use crate::git::{BackendResult, Ref};
use crate::theme::Colors;
use crate::ui::scroll::ListState;
use crate::ui::view::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RefSection {
    #[default]
    Branches,
    Tags,
    Remotes,
}

impl RefSection {
    pub const ALL: [RefSection; 3] = [Self::Branches, Self::Tags, Self::Remotes];

    fn index(self) -> usize {
        self as usize
    }

    fn label(self) -> &'static str {
        match self {
            Self::Branches => "Branches",
            Self::Tags => "Tags",
            Self::Remotes => "Remotes",
        }
    }

    fn empty_message(self) -> &'static str {
        match self {
            Self::Branches => "No branches",
            Self::Tags => "No tags",
            Self::Remotes => "No remote branches",
        }
    }
}

/// Branches, tags and remote branches, one tab each
pub struct RefsView {
    backend: Backend,
    colors: Colors,
    section: RefSection,
    refs: [Vec<Ref>; 3],
    lists: [ListState; 3],
    area: Rect,
    focused: bool,
    has_repo: bool,
    request: Option<ViewRequest>,
}

impl RefsView {
    pub fn new(backend: Backend, colors: Colors) -> Self {
        let has_repo = backend.is_repository();
        Self {
            backend,
            colors,
            section: RefSection::default(),
            refs: Default::default(),
            lists: Default::default(),
            area: Rect::default(),
            focused: false,
            has_repo,
            request: None,
        }
    }

    pub fn section(&self) -> RefSection {
        self.section
    }

    pub fn refs(&self, section: RefSection) -> &[Ref] {
        &self.refs[section.index()]
    }

    pub fn list(&self) -> &ListState {
        &self.lists[self.section.index()]
    }

    pub fn selected_ref(&self) -> Option<&Ref> {
        self.refs[self.section.index()].get(self.list().selected())
    }

    fn fetch(&self, section: RefSection) -> BackendResult<Vec<Ref>> {
        match section {
            RefSection::Branches => self.backend.branches(),
            RefSection::Tags => self.backend.tags(),
            RefSection::Remotes => self.backend.remotes(),
        }
    }

    fn format_ref(&self, r: &Ref, width: usize) -> Line<'static> {
        let marker = if r.is_head { "* " } else { "  " };
        let hash = r.short_target();
        let name_width = width.saturating_sub(marker.len() + hash.len() + 1);
        let color = match self.section {
            RefSection::Branches => self.colors.branch,
            RefSection::Tags => self.colors.tag,
            RefSection::Remotes => self.colors.remote,
        };
        let mut name_style = self.colors.fg(color);
        if r.is_head {
            name_style = name_style.add_modifier(Modifier::BOLD);
        }
        Line::from(vec![
            Span::styled(marker, self.colors.fg(self.colors.branch)),
            Span::styled(fit(&r.name, name_width), name_style),
            Span::raw(" "),
            Span::styled(hash.to_string(), self.colors.fg(self.colors.id)),
        ])
    }
}

impl View for RefsView {
    fn view_type(&self) -> ViewType {
        ViewType::Refs
    }

    fn title(&self) -> String {
        "References".to_string()
    }

    fn render(&mut self, buf: &mut Buffer, area: Rect) -> Result<(), ViewError> {
        check_area(area)?;
        if area != self.area {
            self.set_position(area);
        }
        let block = frame_block(self.title(), self.focused, &self.colors);
        let inner = block.inner(area);
        block.render(area, buf);
        if inner.height == 0 {
            return Ok(());
        }

        let labels: Vec<&str> = RefSection::ALL.iter().map(|s| s.label()).collect();
        render_tabs(buf, inner, &labels, self.section.index(), &self.colors);
        let list_area = Rect {
            y: inner.y + 1,
            height: inner.height - 1,
            ..inner
        };

        let refs = &self.refs[self.section.index()];
        if refs.is_empty() {
            let message = if self.has_repo {
                self.section.empty_message()
            } else {
                "Not in a git repository"
            };
            render_placeholder(buf, list_area, message, &self.colors);
            return Ok(());
        }

        let list = self.list();
        let width = list_area.width.saturating_sub(1) as usize;
        for (row, index) in list.visible_range().enumerate() {
            let line = self.format_ref(&refs[index], width);
            let cursor = (index == list.selected()).then(|| self.colors.style_cursor());
            render_row(buf, list_area, row, &line, cursor);
        }
        render_scrollbar(buf, area, list.scroll(), &self.colors);
        Ok(())
    }

    fn handle_key(&mut self, key: &KeyEvent) -> bool {
        if !self.focused {
            return false;
        }
        let current = self.section.index();
        if handle_list_key(&mut self.lists[current], key) {
            return true;
        }
        match key.code {
            KeyCode::Char('1') | KeyCode::Char('b') => self.section = RefSection::Branches,
            KeyCode::Char('2') => self.section = RefSection::Tags,
            KeyCode::Char('3') => self.section = RefSection::Remotes,
            KeyCode::Tab => self.section = RefSection::ALL[(current + 1) % 3],
            KeyCode::BackTab => self.section = RefSection::ALL[(current + 2) % 3],
            KeyCode::Enter => {
                if let Some(r) = self.selected_ref() {
                    self.request = Some(ViewRequest::ShowDiff(r.target.clone()));
                }
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

    /// Each list loads independently; the first failure is reported after
    /// the others have been tried.
    fn refresh(&mut self) -> Result<(), ViewError> {
        self.has_repo = self.backend.is_repository();
        if !self.has_repo {
            for (refs, list) in self.refs.iter_mut().zip(self.lists.iter_mut()) {
                refs.clear();
                list.set_len(0);
            }
            return Ok(());
        }

        let mut first_error = None;
        for section in RefSection::ALL {
            match self.fetch(section) {
                Ok(refs) => {
                    let i = section.index();
                    self.lists[i].set_len(refs.len());
                    self.refs[i] = refs;
                }
                Err(e) => {
                    log::warn!("Failed to load {}: {}", section.label(), e);
                    first_error.get_or_insert(e);
                }
            }
        }
        match first_error {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }

    fn set_position(&mut self, area: Rect) {
        self.area = area;
        for list in &mut self.lists {
            list.set_viewport_height(content_height(area, 1));
        }
    }

    fn position(&self) -> Rect {
        self.area
    }

    fn set_repo_path(&mut self, _path: &Path) {
        for list in &mut self.lists {
            list.reset();
        }
    }

    fn take_request(&mut self) -> Option<ViewRequest> {
        self.request.take()
    }

    fn status_hint(&self) -> String {
        let refs = &self.refs[self.section.index()];
        if refs.is_empty() {
            return self.section.label().to_string();
        }
        format!(
            "{} {}/{}",
            self.section.label(),
            self.list().selected() + 1,
            refs.len()
        )
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
