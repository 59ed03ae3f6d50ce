use crossterm::event::KeyEvent;
use ratatui::{buffer::Buffer, layout::Rect};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::keymap::{Action, KeyBindingManager};

use super::view::{clear, navigation_key, View, ViewError, ViewRequest, ViewType};
use super::views::{DiffView, MainView};

/// Status line text produced while handling input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Info(String),
    Error(String),
}

impl Notice {
    pub fn text(&self) -> &str {
        match self {
            Self::Info(text) | Self::Error(text) => text,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }
}

/// Owns every view and routes input, rendering and refreshes to them.
/// At most one view is focused at a time.
pub struct ViewManager {
    views: BTreeMap<ViewType, Box<dyn View>>,
    current: Option<ViewType>,
    width: u16,
    height: u16,
    repo_path: PathBuf,
    keymap: KeyBindingManager,
    notice: Option<Notice>,
}

impl ViewManager {
    pub fn new(keymap: KeyBindingManager) -> Self {
        Self {
            views: BTreeMap::new(),
            current: None,
            width: 0,
            height: 0,
            repo_path: PathBuf::new(),
            keymap,
            notice: None,
        }
    }

    /// Add a view, replacing any earlier one of the same type.
    pub fn register(&mut self, mut view: Box<dyn View>) {
        if self.width > 0 && self.height > 0 {
            view.set_position(self.area());
        }
        let view_type = view.view_type();
        if self.current == Some(view_type) {
            view.focus();
        }
        self.views.insert(view_type, view);
    }

    pub fn current(&self) -> Option<ViewType> {
        self.current
    }

    pub fn current_view(&self) -> Option<&dyn View> {
        self.view(self.current?)
    }

    pub fn view(&self, view_type: ViewType) -> Option<&dyn View> {
        self.views.get(&view_type).map(|v| &**v)
    }

    pub fn view_mut(&mut self, view_type: ViewType) -> Option<&mut (dyn View + 'static)> {
        self.views.get_mut(&view_type).map(|v| v.as_mut())
    }

    /// Concrete view behind a registered type
    pub fn view_as<T: View + 'static>(&self, view_type: ViewType) -> Option<&T> {
        self.view(view_type)?.as_any().downcast_ref::<T>()
    }

    pub fn view_as_mut<T: View + 'static>(&mut self, view_type: ViewType) -> Option<&mut T> {
        self.view_mut(view_type)?.as_any_mut().downcast_mut::<T>()
    }

    pub fn keymap(&self) -> &KeyBindingManager {
        &self.keymap
    }

    pub fn repo_path(&self) -> &Path {
        &self.repo_path
    }

    pub fn size(&self) -> (u16, u16) {
        (self.width, self.height)
    }

    fn area(&self) -> Rect {
        Rect::new(0, 0, self.width, self.height)
    }

    /// Move focus to `view_type`. The only place focus changes.
    pub fn switch_view(&mut self, view_type: ViewType) -> Result<(), ViewError> {
        if !self.views.contains_key(&view_type) {
            return Err(ViewError::ViewNotFound(view_type));
        }
        if self.current == Some(view_type) {
            return Ok(());
        }
        if let Some(old) = self.current.and_then(|t| self.views.get_mut(&t)) {
            old.blur();
        }
        if let Some(new) = self.views.get_mut(&view_type) {
            new.focus();
        }
        log::debug!("Switched to {} view", view_type);
        self.current = Some(view_type);
        Ok(())
    }

    pub fn render(&mut self, buf: &mut Buffer) -> Result<(), ViewError> {
        if self.width == 0 || self.height == 0 {
            return Err(ViewError::DimensionsNotSet);
        }
        let area = self.area().intersection(buf.area);
        clear(buf, area);
        match self.current.and_then(|t| self.views.get_mut(&t)) {
            Some(view) => view.render(buf, area),
            None => Ok(()),
        }
    }

    /// Route a key. Returns false for quit and for keys nobody wanted.
    pub fn handle_key(&mut self, key: &KeyEvent) -> bool {
        let handled = match self.keymap.match_event(key) {
            Some(Action::Quit) => return false,
            Some(Action::Refresh) => {
                match self.refresh_all() {
                    Ok(()) => self.notice = Some(Notice::Info("Refreshed".to_string())),
                    Err(e) => self.notice = Some(Notice::Error(e.to_string())),
                }
                true
            }
            Some(action) if action.is_view_scoped() => match self.current_mut() {
                Some(view) => view.handle_action(action) || view.handle_key(key),
                None => false,
            },
            Some(action) => {
                if let Some(target) = ViewType::for_action(action) {
                    self.open_view(target);
                    true
                } else if let Some(nav) = navigation_key(action) {
                    self.forward(&nav)
                } else {
                    self.forward(key)
                }
            }
            None => self.forward(key),
        };
        self.process_requests();
        handled
    }

    fn current_mut(&mut self) -> Option<&mut Box<dyn View>> {
        let current = self.current?;
        self.views.get_mut(&current)
    }

    fn forward(&mut self, key: &KeyEvent) -> bool {
        self.current_mut().is_some_and(|view| view.handle_key(key))
    }

    /// Switch views the way the keymap does, reporting failures as notices
    pub fn open_view(&mut self, target: ViewType) {
        if target == ViewType::Diff {
            self.load_selected_commit();
        }
        if let Err(e) = self.switch_view(target) {
            self.notice = Some(Notice::Error(e.to_string()));
        }
    }

    /// An empty diff view picks up the log's selected commit
    fn load_selected_commit(&mut self) {
        let loaded = self
            .view_as::<DiffView>(ViewType::Diff)
            .is_some_and(|diff| diff.commit().is_some());
        if loaded {
            return;
        }
        let selected = self
            .view_as::<MainView>(ViewType::Main)
            .and_then(|main| main.selected_commit())
            .map(|commit| commit.id.clone());
        if let Some(id) = selected {
            self.load_commit(&id);
        }
    }

    fn load_commit(&mut self, id: &str) {
        let Some(diff) = self.view_as_mut::<DiffView>(ViewType::Diff) else {
            return;
        };
        diff.set_commit(id);
        if let Err(e) = diff.refresh() {
            log::warn!("Failed to load diff for {}: {}", id, e);
            self.notice = Some(Notice::Error(e.to_string()));
        }
    }

    /// Load a commit into the diff view and focus it
    pub fn show_commit(&mut self, id: &str) {
        self.load_commit(id);
        if let Err(e) = self.switch_view(ViewType::Diff) {
            self.notice = Some(Notice::Error(e.to_string()));
        }
    }

    fn process_requests(&mut self) {
        let requests: Vec<ViewRequest> = self
            .views
            .values_mut()
            .filter_map(|view| view.take_request())
            .collect();
        for request in requests {
            match request {
                ViewRequest::ShowDiff(id) => self.show_commit(&id),
                ViewRequest::Message(text) => self.notice = Some(Notice::Info(text)),
                ViewRequest::Error(text) => self.notice = Some(Notice::Error(text)),
            }
        }
    }

    /// Refresh every view. A failing view keeps its data; the last error is
    /// returned once all views have been tried.
    pub fn refresh_all(&mut self) -> Result<(), ViewError> {
        let mut last_error = None;
        for (view_type, view) in self.views.iter_mut() {
            if let Err(e) = view.refresh() {
                log::warn!("Refreshing {} view failed: {}", view_type, e);
                last_error = Some(e);
            }
        }
        match last_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    pub fn refresh_current(&mut self) -> Result<(), ViewError> {
        match self.current_mut() {
            Some(view) => view.refresh(),
            None => Ok(()),
        }
    }

    pub fn set_size(&mut self, width: u16, height: u16) {
        self.width = width;
        self.height = height;
        let area = self.area();
        for view in self.views.values_mut() {
            view.set_position(area);
        }
    }

    pub fn set_repo_path(&mut self, path: &Path) -> Result<(), ViewError> {
        self.repo_path = path.to_path_buf();
        for view in self.views.values_mut() {
            view.set_repo_path(path);
        }
        self.refresh_all()
    }

    /// Status line text left by the last key, if any
    pub fn take_message(&mut self) -> Option<Notice> {
        self.notice.take()
    }
}
