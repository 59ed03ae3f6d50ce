use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::{
    backend::Backend as TerminalBackend,
    buffer::Buffer,
    layout::{Position, Rect},
    text::{Line, Span},
    Frame, Terminal,
};
use std::path::Path;
use unicode_width::UnicodeWidthStr;

use crate::command::{Command, CommandPrompt, PromptResult};
use crate::config::{AppInfo, Config};
use crate::event::{AppEvent, EventHandler};
use crate::keymap::Action;
use crate::theme::Colors;
use crate::ui::views::build_views;
use crate::ui::{AppLayout, Backend, Notice, ViewError, ViewManager, ViewType};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Created,
    Running,
    Stopped,
}

/// Main application state
pub struct App {
    state: RunState,
    manager: ViewManager,
    backend: Backend,
    colors: Colors,
    info: AppInfo,
    prompt: CommandPrompt,
    notice: Option<Notice>,
    layout: AppLayout,
    /// Ctrl-L asks for a full terminal repaint before the next frame
    clear_screen: bool,
}

impl App {
    pub fn new(backend: Backend, config: &Config, repo_path: &Path, info: AppInfo) -> Result<Self> {
        let keymap = config.keymap()?;
        let colors = config.colors();
        let mut manager = ViewManager::new(keymap.clone());
        for view in build_views(&backend, config, &colors, &keymap, &info) {
            manager.register(view);
        }
        manager.switch_view(ViewType::Main)?;

        let mut app = Self {
            state: RunState::Created,
            manager,
            backend,
            colors,
            info,
            prompt: CommandPrompt::new(),
            notice: None,
            layout: AppLayout,
            clear_screen: false,
        };
        if !app.backend.is_repository() {
            log::warn!("{} is not inside a git repository", repo_path.display());
        }
        if let Err(e) = app.manager.set_repo_path(repo_path) {
            app.notice = Some(Notice::Error(e.to_string()));
        }
        Ok(app)
    }

    #[cfg(test)]
    pub fn state(&self) -> RunState {
        self.state
    }

    #[cfg(test)]
    pub fn manager(&self) -> &ViewManager {
        &self.manager
    }

    #[cfg(test)]
    pub fn prompt(&self) -> &CommandPrompt {
        &self.prompt
    }

    #[cfg(test)]
    pub fn notice(&self) -> Option<&Notice> {
        self.notice.as_ref()
    }

    pub fn stop(&mut self) {
        self.state = RunState::Stopped;
    }

    /// Draw and consume events until quit
    pub fn run<B: TerminalBackend>(
        &mut self,
        terminal: &mut Terminal<B>,
        events: &EventHandler,
    ) -> Result<()> {
        self.state = RunState::Running;
        let size = terminal.size()?;
        self.resize(size.width, size.height);

        while self.state == RunState::Running {
            if self.clear_screen {
                terminal.clear()?;
                self.clear_screen = false;
            }
            terminal.draw(|frame| self.render(frame))?;

            // Take everything already queued so refreshes coalesce
            let mut batch = vec![events.next()?];
            while let Some(event) = events.try_next() {
                batch.push(event);
            }
            self.handle_events(batch);
        }
        events.stop();
        log::info!("Event loop stopped");
        Ok(())
    }

    /// Apply a batch of events in order; any number of refresh and file
    /// events in it cost a single refresh at the end. Ticks reload only the
    /// focused view, file changes reload every view.
    pub fn handle_events(&mut self, batch: Vec<AppEvent>) {
        let mut tick = false;
        let mut changed = false;
        for event in batch {
            if self.state == RunState::Stopped {
                return;
            }
            match event {
                AppEvent::Key(key) => self.handle_key(&key),
                AppEvent::Resize(width, height) => self.resize(width, height),
                AppEvent::Refresh => tick = true,
                AppEvent::FileChanged => changed = true,
            }
        }
        if self.state == RunState::Stopped {
            return;
        }
        if changed {
            self.refresh();
        } else if tick {
            let result = self.manager.refresh_current();
            self.apply_refresh(result);
        }
    }

    pub fn handle_key(&mut self, key: &KeyEvent) {
        if self.prompt.is_active() {
            if let PromptResult::Submit(line) = self.prompt.handle_key(key) {
                self.execute(&line);
            }
            return;
        }

        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Char('c') if ctrl => {
                self.stop();
                return;
            }
            KeyCode::Char('l') if ctrl => {
                self.clear_screen = true;
                self.refresh();
                return;
            }
            KeyCode::Char(':') if !ctrl => {
                self.notice = None;
                self.prompt.open();
                return;
            }
            _ => {}
        }

        if self.manager.keymap().match_event(key) == Some(Action::Quit) {
            self.stop();
            return;
        }
        self.notice = None;
        self.manager.handle_key(key);
        if let Some(notice) = self.manager.take_message() {
            self.notice = Some(notice);
        }
    }

    /// Run a line entered at the `:` prompt
    pub fn execute(&mut self, line: &str) {
        if line.is_empty() {
            return;
        }
        let command = match line.parse::<Command>() {
            Ok(command) => command,
            Err(e) => {
                self.notice = Some(Notice::Error(e.to_string()));
                return;
            }
        };
        log::debug!("Running command {:?}", command);
        match command {
            Command::View(view_type) => {
                self.manager.open_view(view_type);
                self.notice = self.manager.take_message();
            }
            Command::Refresh => self.refresh(),
            Command::Quit => self.stop(),
            Command::Add(paths) => {
                let result = paths.iter().try_for_each(|p| self.backend.stage_file(p));
                self.finish_mutation(result, format!("Staged {}", paths.join(" ")));
            }
            Command::Reset(paths) if paths.is_empty() => {
                let result = self.backend.unstage_all();
                self.finish_mutation(result, "Unstaged all files".to_string());
            }
            Command::Reset(paths) => {
                let result = paths.iter().try_for_each(|p| self.backend.unstage_file(p));
                self.finish_mutation(result, format!("Unstaged {}", paths.join(" ")));
            }
        }
    }

    fn finish_mutation(&mut self, result: crate::git::BackendResult<()>, done: String) {
        match result {
            Ok(()) => {
                self.refresh();
                if !self.notice.as_ref().is_some_and(Notice::is_error) {
                    self.notice = Some(Notice::Info(done));
                }
            }
            Err(e) => {
                log::warn!("Command failed: {}", e);
                self.notice = Some(Notice::Error(e.to_string()));
            }
        }
    }

    pub fn refresh(&mut self) {
        let result = self.manager.refresh_all();
        self.apply_refresh(result);
    }

    fn apply_refresh(&mut self, result: Result<(), ViewError>) {
        match result {
            Ok(()) => {
                if self.notice.as_ref().is_some_and(Notice::is_error) {
                    self.notice = None;
                }
            }
            Err(e) => self.notice = Some(Notice::Error(e.to_string())),
        }
    }

    /// The bottom row belongs to the status line
    pub fn resize(&mut self, width: u16, height: u16) {
        self.manager.set_size(width, height.saturating_sub(1));
    }

    pub fn render(&mut self, frame: &mut Frame) {
        let areas = self.layout.compute(frame.area());
        if areas.view.height > 0 {
            if let Err(e) = self.manager.render(frame.buffer_mut()) {
                if e.is_skip_frame() {
                    log::debug!("Skipping frame: {}", e);
                } else {
                    log::error!("Render failed: {}", e);
                }
            }
        }

        if self.prompt.is_active() {
            self.render_prompt(frame.buffer_mut(), areas.status_bar);
            let before: String = self.prompt.input().chars().take(self.prompt.cursor()).collect();
            let x = areas.status_bar.x + 1 + before.width() as u16;
            if x < areas.status_bar.right() {
                frame.set_cursor_position(Position::new(x, areas.status_bar.y));
            }
        } else {
            self.render_status_bar(frame.buffer_mut(), areas.status_bar);
        }
    }

    fn render_prompt(&self, buf: &mut Buffer, area: Rect) {
        let line = Line::from(vec![
            Span::styled(":", self.colors.style_header()),
            Span::styled(self.prompt.input().to_string(), self.colors.style_text()),
        ]);
        buf.set_style(area, self.colors.style_text());
        buf.set_line(area.x, area.y, &line, area.width);
    }

    fn render_status_bar(&self, buf: &mut Buffer, area: Rect) {
        let total_width = area.width as usize;

        // Left: view name, title and position
        let left_content = match self.manager.current_view() {
            Some(view) => {
                let hint = view.status_hint();
                if hint.is_empty() {
                    format!(" [{}] {}", view.view_type(), view.title())
                } else {
                    format!(" [{}] {}  {}", view.view_type(), view.title(), hint)
                }
            }
            None => format!(" {}", self.info.name),
        };

        // Right: latest message, or the version
        let (right_content, right_style) = match &self.notice {
            Some(notice) if notice.is_error() => {
                (format!("{} ", notice.text()), self.colors.style_error())
            }
            Some(notice) => (format!("{} ", notice.text()), self.colors.style_status_bar()),
            None => (
                format!("{} {} ", self.info.name, self.info.version),
                self.colors.style_status_bar(),
            ),
        };

        let left_width = left_content.width();
        let right_width = right_content.width();
        let padding = total_width.saturating_sub(left_width + right_width);

        let line = Line::from(vec![
            Span::styled(left_content, self.colors.style_status_bar()),
            Span::styled(" ".repeat(padding), self.colors.style_status_bar()),
            Span::styled(right_content, right_style),
        ]);
        buf.set_style(area, self.colors.style_status_bar());
        buf.set_line(area.x, area.y, &line, area.width);
    }
}
