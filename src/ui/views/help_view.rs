use crossterm::event::{KeyCode, KeyEvent};
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    text::{Line, Span},
    widgets::Widget,
};
use std::any::Any;

use crate::config::AppInfo;
use crate::keymap::{Action, Category, KeyBindingManager};
use crate::theme::Colors;
use crate::ui::scroll::ListState;
use crate::ui::view::*;

const KEY_WIDTH: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HelpSection {
    pub title: &'static str,
    /// (keys, description)
    pub items: Vec<(String, String)>,
}

impl HelpSection {
    fn new(title: &'static str) -> Self {
        Self {
            title,
            items: Vec::new(),
        }
    }

    fn item(mut self, keys: &str, description: &str) -> Self {
        self.items.push((keys.to_string(), description.to_string()));
        self
    }
}

/// Build the help pages from the active key bindings plus the keys each
/// view handles on its own.
pub fn help_sections(keymap: &KeyBindingManager) -> Vec<HelpSection> {
    let mut navigation = HelpSection::new("Navigation");
    let mut views = HelpSection::new("Views");
    let mut actions = HelpSection::new("Actions");
    let mut general = HelpSection::new("General");

    for (category, bindings) in keymap.help_entries() {
        for binding in bindings {
            let section = match (category, binding.action) {
                (Category::Navigation, _) => &mut navigation,
                (Category::Views, _) | (_, Action::Help) => &mut views,
                (Category::Staging, _) | (_, Action::Refresh) => &mut actions,
                _ => &mut general,
            };
            section.items.push((binding.describe(), binding.help.to_string()));
        }
    }

    let navigation = navigation
        .item("j / k", "Move down / up")
        .item("Ctrl+d / Ctrl+u", "Page down / up")
        .item("Home / End", "First / last item")
        .item("Enter", "Open the selected item");
    let actions = actions.item("Tab", "Cycle status sections");
    let general = general
        .item(":", "Command prompt")
        .item("Ctrl+l", "Redraw and refresh")
        .item("Ctrl+c", "Quit immediately")
        .item("Esc", "Cancel the command prompt");
    let tree = HelpSection::new("Tree View")
        .item("Enter / Right", "Open directory")
        .item("Left / Backspace", "Parent directory");
    let refs = HelpSection::new("Refs View")
        .item("1 / 2 / 3", "Branches / Tags / Remotes")
        .item("Tab", "Next section")
        .item("Enter", "Show the commit");

    vec![navigation, views, actions, tree, refs, general]
}

/// Key reference, one page per section
pub struct HelpView {
    colors: Colors,
    info: AppInfo,
    sections: Vec<HelpSection>,
    section: usize,
    list: ListState,
    area: Rect,
    focused: bool,
}

impl HelpView {
    pub fn new(colors: Colors, keymap: &KeyBindingManager, info: AppInfo) -> Self {
        let sections = help_sections(keymap);
        let mut list = ListState::new();
        list.set_len(sections.first().map_or(0, |s| s.items.len()));
        Self {
            colors,
            info,
            sections,
            section: 0,
            list,
            area: Rect::default(),
            focused: false,
        }
    }

    pub fn sections(&self) -> &[HelpSection] {
        &self.sections
    }

    pub fn section(&self) -> usize {
        self.section
    }

    pub fn list(&self) -> &ListState {
        &self.list
    }

    fn select_section(&mut self, index: usize) {
        if index >= self.sections.len() || index == self.section {
            return;
        }
        self.section = index;
        self.list.reset();
        self.list.set_len(self.sections[index].items.len());
    }
}

impl View for HelpView {
    fn view_type(&self) -> ViewType {
        ViewType::Help
    }

    fn title(&self) -> String {
        format!("Help - {} {}", self.info.name, self.info.version)
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

        let titles: Vec<&str> = self.sections.iter().map(|s| s.title).collect();
        render_tabs(buf, inner, &titles, self.section, &self.colors);
        let list_area = Rect {
            y: inner.y + 1,
            height: inner.height - 1,
            ..inner
        };

        let Some(section) = self.sections.get(self.section) else {
            return Ok(());
        };
        for (row, index) in self.list.visible_range().enumerate() {
            let (keys, description) = &section.items[index];
            let line = Line::from(vec![
                Span::styled(format!(" {} ", fit(keys, KEY_WIDTH)), self.colors.fg(self.colors.id)),
                Span::styled(description.clone(), self.colors.style_text()),
            ]);
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
        let count = self.sections.len().max(1);
        match key.code {
            KeyCode::Tab => self.select_section((self.section + 1) % count),
            KeyCode::BackTab => self.select_section((self.section + count - 1) % count),
            KeyCode::Char(c @ '1'..='9') => {
                let index = c as usize - '1' as usize;
                if index >= self.sections.len() {
                    return false;
                }
                self.select_section(index);
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
        Ok(())
    }

    fn set_position(&mut self, area: Rect) {
        self.area = area;
        self.list.set_viewport_height(content_height(area, 1));
    }

    fn position(&self) -> Rect {
        self.area
    }

    fn status_hint(&self) -> String {
        self.sections
            .get(self.section)
            .map(|s| s.title.to_string())
            .unwrap_or_default()
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
    use crossterm::event::KeyModifiers;
    use std::collections::BTreeMap;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn help_view() -> HelpView {
        let mut view = HelpView::new(Colors::dark(), &KeyBindingManager::new(), AppInfo::default());
        view.set_position(Rect::new(0, 0, 100, 20));
        view.focus();
        view
    }

    #[test]
    fn sections_follow_keymap() {
        let sections = help_sections(&KeyBindingManager::new());
        let titles: Vec<&str> = sections.iter().map(|s| s.title).collect();
        assert_eq!(
            titles,
            ["Navigation", "Views", "Actions", "Tree View", "Refs View", "General"]
        );
        let views = &sections[1];
        assert!(views.items.iter().any(|(k, _)| k == "s"));
        assert!(views.items.iter().any(|(k, _)| k == "h"));
        let general = &sections[5];
        assert!(general.items.iter().any(|(k, _)| k == "q"));
    }

    #[test]
    fn reflects_rebound_keys() {
        let mut overrides = BTreeMap::new();
        overrides.insert("quit".to_string(), "x".to_string());
        let keymap = KeyBindingManager::with_overrides(&overrides).unwrap();
        let sections = help_sections(&keymap);
        assert!(sections[5].items.iter().any(|(k, _)| k == "x"));
        assert!(!sections[5].items.iter().any(|(k, _)| k == "q"));
    }

    #[test]
    fn switching_sections_resets_selection() {
        let mut view = help_view();
        view.handle_key(&key(KeyCode::Down));
        assert_eq!(view.list().selected(), 1);
        assert!(view.handle_key(&key(KeyCode::Char('3'))));
        assert_eq!(view.section(), 2);
        assert_eq!(view.list().selected(), 0);

        view.handle_key(&key(KeyCode::Tab));
        assert_eq!(view.section(), 3);
        view.handle_key(&key(KeyCode::BackTab));
        view.handle_key(&key(KeyCode::BackTab));
        assert_eq!(view.section(), 1);
        assert!(!view.handle_key(&key(KeyCode::Char('9'))));
        assert_eq!(view.section(), 1);
    }

    #[test]
    fn renders_version_and_entries() {
        let mut view = help_view();
        let area = view.position();
        let mut buf = Buffer::empty(area);
        view.render(&mut buf, area).unwrap();
        assert!(buffer_contains(&buf, env!("CARGO_PKG_VERSION")));
        assert!(buffer_contains(&buf, "1 Navigation"));
        assert!(buffer_contains(&buf, "Move down / up"));
    }
}
