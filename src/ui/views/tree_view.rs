use crossterm::event::{KeyCode, KeyEvent};
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    text::{Line, Span},
    widgets::Widget,
};
use std::any::Any;
use std::path::Path;
use unicode_width::UnicodeWidthStr;

use crate::git::{BackendError, TreeEntry};
use crate::theme::Colors;
use crate::ui::scroll::ListState;
use crate::ui::view::*;

/// Browser over the files of HEAD
pub struct TreeView {
    backend: Backend,
    colors: Colors,
    /// Directory being listed, relative to the repository root
    cwd: String,
    entries: Vec<TreeEntry>,
    /// Entry to select after the next load (the directory just left)
    reselect: Option<String>,
    list: ListState,
    area: Rect,
    focused: bool,
    has_repo: bool,
    request: Option<ViewRequest>,
}

impl TreeView {
    pub fn new(backend: Backend, colors: Colors) -> Self {
        let has_repo = backend.is_repository();
        Self {
            backend,
            colors,
            cwd: String::new(),
            entries: Vec::new(),
            reselect: None,
            list: ListState::new(),
            area: Rect::default(),
            focused: false,
            has_repo,
            request: None,
        }
    }

    pub fn cwd(&self) -> &str {
        &self.cwd
    }

    pub fn entries(&self) -> &[TreeEntry] {
        &self.entries
    }

    pub fn list(&self) -> &ListState {
        &self.list
    }

    pub fn selected_entry(&self) -> Option<&TreeEntry> {
        self.entries.get(self.list.selected())
    }

    /// Switch directory; restores the previous one if loading fails.
    fn change_dir(&mut self, dir: String, reselect: Option<String>) {
        let previous = std::mem::replace(&mut self.cwd, dir);
        self.reselect = reselect;
        let selected = self.list.selected();
        self.list.reset();
        if let Err(e) = self.load() {
            log::warn!("Failed to open {}: {}", self.cwd, e);
            self.request = Some(ViewRequest::Error(e.to_string()));
            self.cwd = previous;
            self.reselect = None;
            self.list.select(selected);
        }
    }

    fn enter_selected(&mut self) {
        if let Some(entry) = self.selected_entry().filter(|e| e.is_dir) {
            let dir = entry.path.clone();
            self.change_dir(dir, None);
        }
    }

    fn go_up(&mut self) {
        if self.cwd.is_empty() {
            return;
        }
        let (parent, name) = split_parent(&self.cwd);
        self.change_dir(parent, Some(name));
    }

    fn load(&mut self) -> Result<(), ViewError> {
        self.entries = self.backend.tree_entries(&self.cwd)?;
        self.list.set_len(self.entries.len());
        if let Some(name) = self.reselect.take() {
            if let Some(index) = self.entries.iter().position(|e| e.name == name) {
                self.list.select(index);
            }
        }
        Ok(())
    }

    fn format_entry(&self, entry: &TreeEntry, width: usize) -> Line<'static> {
        if entry.is_dir {
            return Line::from(Span::styled(
                format!("{}/", entry.name),
                self.colors.fg(self.colors.directory),
            ));
        }
        let size = entry.size.map(format_size).unwrap_or_default();
        let name_width = width.saturating_sub(size.width() + 1);
        Line::from(vec![
            Span::styled(fit(&entry.name, name_width), self.colors.style_text()),
            Span::raw(" "),
            Span::styled(size, self.colors.style_muted()),
        ])
    }
}

/// Split "a/b/c" into ("a/b", "c"); a top-level name has an empty parent
fn split_parent(dir: &str) -> (String, String) {
    match dir.rsplit_once('/') {
        Some((parent, name)) => (parent.to_string(), name.to_string()),
        None => (String::new(), dir.to_string()),
    }
}

fn format_size(bytes: usize) -> String {
    const UNITS: [&str; 4] = ["B", "K", "M", "G"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{}{}", bytes, UNITS[0])
    } else {
        format!("{:.1}{}", size, UNITS[unit])
    }
}

impl View for TreeView {
    fn view_type(&self) -> ViewType {
        ViewType::Tree
    }

    fn title(&self) -> String {
        if self.cwd.is_empty() {
            "Repository Tree".to_string()
        } else {
            format!("Tree: {}", self.cwd)
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

        if self.entries.is_empty() {
            let message = if self.has_repo {
                "No files found"
            } else {
                "No repository opened"
            };
            render_placeholder(buf, inner, message, &self.colors);
            return Ok(());
        }

        // leave the scrollbar column free
        let width = inner.width.saturating_sub(1) as usize;
        for (row, index) in self.list.visible_range().enumerate() {
            let line = self.format_entry(&self.entries[index], width);
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
            KeyCode::Enter | KeyCode::Right => self.enter_selected(),
            KeyCode::Left | KeyCode::Backspace => self.go_up(),
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
            self.cwd.clear();
            self.entries.clear();
            self.list.set_len(0);
            return Ok(());
        }
        loop {
            match self.load() {
                // directory gone from HEAD: fall back to the nearest ancestor
                Err(ViewError::Backend(BackendError::NotFound(_))) if !self.cwd.is_empty() => {
                    log::debug!("{} no longer in HEAD, moving up", self.cwd);
                    self.cwd = split_parent(&self.cwd).0;
                    self.reselect = None;
                    self.list.reset();
                }
                result => return result,
            }
        }
    }

    fn set_position(&mut self, area: Rect) {
        self.area = area;
        self.list.set_viewport_height(content_height(area, 0));
    }

    fn position(&self) -> Rect {
        self.area
    }

    fn set_repo_path(&mut self, _path: &Path) {
        self.cwd.clear();
        self.reselect = None;
        self.list.reset();
    }

    fn take_request(&mut self) -> Option<ViewRequest> {
        self.request.take()
    }

    fn status_hint(&self) -> String {
        match self.selected_entry() {
            Some(entry) => entry.path.clone(),
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::stub::StubBackend;
    use crossterm::event::KeyModifiers;
    use std::rc::Rc;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn entry(path: &str, is_dir: bool) -> TreeEntry {
        TreeEntry {
            name: path.rsplit('/').next().unwrap_or(path).to_string(),
            path: path.to_string(),
            is_dir,
            size: (!is_dir).then_some(2048),
        }
    }

    fn tree_view() -> TreeView {
        let stub = StubBackend::repository();
        *stub.tree.borrow_mut() = vec![
            entry("docs", true),
            entry("src", true),
            entry("README.md", false),
            entry("src/ui", true),
            entry("src/main.rs", false),
            entry("src/ui/view.rs", false),
        ];
        let mut view = TreeView::new(Rc::new(stub), Colors::dark());
        view.set_position(Rect::new(0, 0, 40, 10));
        view.focus();
        view.refresh().unwrap();
        view
    }

    #[test]
    fn lists_root_entries() {
        let view = tree_view();
        let names: Vec<&str> = view.entries().iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["docs", "src", "README.md"]);
        assert_eq!(view.title(), "Repository Tree");
    }

    #[test]
    fn enter_directory_and_back() {
        let mut view = tree_view();
        view.handle_key(&key(KeyCode::Down));
        assert!(view.handle_key(&key(KeyCode::Enter)));
        assert_eq!(view.cwd(), "src");
        assert_eq!(view.title(), "Tree: src");
        assert_eq!(view.list().selected(), 0);

        view.handle_key(&key(KeyCode::Right));
        assert_eq!(view.cwd(), "src/ui");

        assert!(view.handle_key(&key(KeyCode::Left)));
        assert_eq!(view.cwd(), "src");
        assert_eq!(view.selected_entry().map(|e| e.name.as_str()), Some("ui"));

        view.handle_key(&key(KeyCode::Backspace));
        assert_eq!(view.cwd(), "");
        assert_eq!(view.selected_entry().map(|e| e.name.as_str()), Some("src"));
    }

    #[test]
    fn enter_on_file_stays() {
        let mut view = tree_view();
        view.handle_key(&key(KeyCode::End));
        view.handle_key(&key(KeyCode::Enter));
        assert_eq!(view.cwd(), "");
    }

    #[test]
    fn up_at_root_is_noop() {
        let mut view = tree_view();
        assert!(view.handle_key(&key(KeyCode::Left)));
        assert_eq!(view.cwd(), "");
        assert_eq!(view.entries().len(), 3);
    }

    #[test]
    fn renders_directories_with_slash() {
        let mut view = tree_view();
        let area = view.position();
        let mut buf = Buffer::empty(area);
        view.render(&mut buf, area).unwrap();
        assert!(buffer_contains(&buf, "docs/"));
        assert!(buffer_contains(&buf, "2.0K"));
    }

    #[test]
    fn placeholders() {
        let mut view = TreeView::new(Rc::new(StubBackend::default()), Colors::dark());
        view.set_position(Rect::new(0, 0, 40, 10));
        view.refresh().unwrap();
        let mut buf = Buffer::empty(view.position());
        view.render(&mut buf, view.position()).unwrap();
        assert!(buffer_contains(&buf, "No repository opened"));

        let mut view = TreeView::new(Rc::new(StubBackend::repository()), Colors::dark());
        view.set_position(Rect::new(0, 0, 40, 10));
        view.refresh().unwrap();
        let mut buf = Buffer::empty(view.position());
        view.render(&mut buf, view.position()).unwrap();
        assert!(buffer_contains(&buf, "No files found"));
    }

    #[test]
    fn deleted_directory_falls_back_to_parent() {
        use crate::git::GitClient;
        use git2::{Repository, Signature};

        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        let sig = Signature::now("Test User", "test@example.com").unwrap();
        let commit = |message: &str| {
            let mut index = repo.index().unwrap();
            index
                .add_all(["*"], git2::IndexAddOption::DEFAULT, None)
                .unwrap();
            index.update_all(["*"], None).unwrap();
            index.write().unwrap();
            let tree = repo.find_tree(index.write_tree().unwrap()).unwrap();
            let parent = repo.head().ok().and_then(|h| h.peel_to_commit().ok());
            let parents: Vec<&git2::Commit> = parent.iter().collect();
            repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)
                .unwrap();
        };

        std::fs::create_dir_all(dir.path().join("src/ui")).unwrap();
        std::fs::write(dir.path().join("src/ui/view.rs"), "").unwrap();
        std::fs::write(dir.path().join("src/a.rs"), "").unwrap();
        std::fs::write(dir.path().join("README.md"), "readme").unwrap();
        commit("initial");

        let client = GitClient::discover(dir.path());
        let mut view = TreeView::new(Rc::new(client), Colors::dark());
        view.set_position(Rect::new(0, 0, 40, 10));
        view.focus();
        view.refresh().unwrap();
        view.handle_key(&key(KeyCode::Enter));
        view.handle_key(&key(KeyCode::Enter));
        assert_eq!(view.cwd(), "src/ui");

        std::fs::remove_dir_all(dir.path().join("src/ui")).unwrap();
        commit("drop ui");
        view.refresh().unwrap();
        assert_eq!(view.cwd(), "src");
        assert_eq!(view.entries().len(), 1);

        std::fs::remove_dir_all(dir.path().join("src")).unwrap();
        commit("drop src");
        view.refresh().unwrap();
        assert_eq!(view.cwd(), "");
        let names: Vec<&str> = view.entries().iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["README.md"]);
        // stays healthy afterwards
        view.refresh().unwrap();
        assert_eq!(view.title(), "Repository Tree");
    }

    #[test]
    fn sizes_are_human_readable() {
        assert_eq!(format_size(512), "512B");
        assert_eq!(format_size(2048), "2.0K");
        assert_eq!(format_size(5 * 1024 * 1024), "5.0M");
    }
}
