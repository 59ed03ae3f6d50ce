use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use std::str::FromStr;
use thiserror::Error;

use crate::ui::ViewType;

const HISTORY_LIMIT: usize = 100;

/// Names accepted at the `:` prompt, sorted for completion
pub const COMMANDS: [&str; 13] = [
    "add", "diff", "exit", "help", "log", "main", "q", "quit", "refresh", "refs", "reset",
    "status", "tree",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    View(ViewType),
    Refresh,
    Quit,
    /// Stage the given paths
    Add(Vec<String>),
    /// Unstage the given paths, or everything when empty
    Reset(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("unknown command: {0}")]
    Unknown(String),
    #[error("usage: add <path>...")]
    MissingPath,
}

impl FromStr for Command {
    type Err = CommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let name = words.next().unwrap_or_default();
        let args: Vec<String> = words.map(str::to_string).collect();
        match name {
            "refresh" => Ok(Self::Refresh),
            "quit" | "q" | "exit" => Ok(Self::Quit),
            "add" if args.is_empty() => Err(CommandError::MissingPath),
            "add" => Ok(Self::Add(args)),
            "reset" => Ok(Self::Reset(args)),
            other => other
                .parse::<ViewType>()
                .map(Self::View)
                .map_err(|_| CommandError::Unknown(other.to_string())),
        }
    }
}

/// Outcome of a key typed into the prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptResult {
    Continue,
    Submit(String),
    Cancelled,
}

/// Single-line `:` prompt with history and completion
#[derive(Debug, Default)]
pub struct CommandPrompt {
    active: bool,
    input: String,
    /// Cursor position in chars
    cursor: usize,
    history: Vec<String>,
    /// Index into history while browsing it
    history_pos: Option<usize>,
    /// Line being typed before history browsing started
    draft: String,
}

impl CommandPrompt {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(&mut self) {
        self.active = true;
        self.set_input(String::new());
        self.history_pos = None;
    }

    pub fn close(&mut self) {
        self.active = false;
        self.set_input(String::new());
        self.history_pos = None;
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    #[cfg(test)]
    pub fn history(&self) -> &[String] {
        &self.history
    }

    fn set_input(&mut self, input: String) {
        self.cursor = input.chars().count();
        self.input = input;
    }

    fn byte_pos(&self, char_pos: usize) -> usize {
        self.input
            .char_indices()
            .nth(char_pos)
            .map(|(i, _)| i)
            .unwrap_or(self.input.len())
    }

    fn push_history(&mut self, line: &str) {
        if self.history.last().map(String::as_str) == Some(line) {
            return;
        }
        self.history.push(line.to_string());
        if self.history.len() > HISTORY_LIMIT {
            let excess = self.history.len() - HISTORY_LIMIT;
            self.history.drain(..excess);
        }
    }

    pub fn handle_key(&mut self, key: &KeyEvent) -> PromptResult {
        match key.code {
            KeyCode::Esc => {
                self.close();
                PromptResult::Cancelled
            }
            KeyCode::Enter => {
                let line = self.input.trim().to_string();
                if !line.is_empty() {
                    self.push_history(&line);
                }
                self.close();
                PromptResult::Submit(line)
            }
            KeyCode::Backspace if self.input.is_empty() => {
                self.close();
                PromptResult::Cancelled
            }
            KeyCode::Backspace => {
                if self.cursor > 0 {
                    self.cursor -= 1;
                    let pos = self.byte_pos(self.cursor);
                    self.input.remove(pos);
                }
                PromptResult::Continue
            }
            KeyCode::Delete => {
                if self.cursor < self.input.chars().count() {
                    let pos = self.byte_pos(self.cursor);
                    self.input.remove(pos);
                }
                PromptResult::Continue
            }
            KeyCode::Left => {
                self.cursor = self.cursor.saturating_sub(1);
                PromptResult::Continue
            }
            KeyCode::Right => {
                self.cursor = (self.cursor + 1).min(self.input.chars().count());
                PromptResult::Continue
            }
            KeyCode::Home => {
                self.cursor = 0;
                PromptResult::Continue
            }
            KeyCode::End => {
                self.cursor = self.input.chars().count();
                PromptResult::Continue
            }
            KeyCode::Up => {
                self.history_prev();
                PromptResult::Continue
            }
            KeyCode::Down => {
                self.history_next();
                PromptResult::Continue
            }
            KeyCode::Tab => {
                self.complete();
                PromptResult::Continue
            }
            KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.set_input(String::new());
                PromptResult::Continue
            }
            KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
                let pos = self.byte_pos(self.cursor);
                self.input.insert(pos, c);
                self.cursor += 1;
                PromptResult::Continue
            }
            _ => PromptResult::Continue,
        }
    }

    fn history_prev(&mut self) {
        if self.history.is_empty() {
            return;
        }
        let pos = match self.history_pos {
            None => {
                self.draft = self.input.clone();
                self.history.len() - 1
            }
            Some(pos) => pos.saturating_sub(1),
        };
        self.history_pos = Some(pos);
        self.set_input(self.history[pos].clone());
    }

    fn history_next(&mut self) {
        let Some(pos) = self.history_pos else {
            return;
        };
        if pos + 1 < self.history.len() {
            self.history_pos = Some(pos + 1);
            self.set_input(self.history[pos + 1].clone());
        } else {
            self.history_pos = None;
            let draft = std::mem::take(&mut self.draft);
            self.set_input(draft);
        }
    }

    /// Complete the command name up to the longest shared prefix
    fn complete(&mut self) {
        if self.input.contains(' ') {
            return;
        }
        let matches: Vec<&str> = COMMANDS
            .iter()
            .copied()
            .filter(|c| c.starts_with(self.input.as_str()))
            .collect();
        let Some(first) = matches.first() else {
            return;
        };
        if matches.len() == 1 {
            self.set_input(format!("{} ", first));
            return;
        }
        let shared = matches.iter().fold(first.len(), |len, c| {
            first
                .chars()
                .zip(c.chars())
                .take(len)
                .take_while(|(a, b)| a == b)
                .count()
        });
        if shared > self.input.len() {
            self.set_input(first[..shared].to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn type_text(prompt: &mut CommandPrompt, text: &str) {
        for c in text.chars() {
            prompt.handle_key(&key(KeyCode::Char(c)));
        }
    }

    fn submit(prompt: &mut CommandPrompt, text: &str) -> PromptResult {
        prompt.open();
        type_text(prompt, text);
        prompt.handle_key(&key(KeyCode::Enter))
    }

    #[test]
    fn parses_commands() {
        assert_eq!("status".parse(), Ok(Command::View(ViewType::Status)));
        assert_eq!("log".parse(), Ok(Command::View(ViewType::Main)));
        assert_eq!("q".parse(), Ok(Command::Quit));
        assert_eq!("exit".parse(), Ok(Command::Quit));
        assert_eq!("refresh".parse(), Ok(Command::Refresh));
        assert_eq!(
            "add a.txt b.txt".parse(),
            Ok(Command::Add(vec!["a.txt".to_string(), "b.txt".to_string()]))
        );
        assert_eq!("reset".parse(), Ok(Command::Reset(Vec::new())));
        assert_eq!("add".parse::<Command>(), Err(CommandError::MissingPath));
        assert_eq!(
            "frobnicate now".parse::<Command>().unwrap_err().to_string(),
            "unknown command: frobnicate"
        );
    }

    #[test]
    fn every_listed_command_parses() {
        for name in COMMANDS {
            let line = if name == "add" { "add x" } else { name };
            assert!(line.parse::<Command>().is_ok(), "{}", name);
        }
    }

    #[test]
    fn submit_and_cancel() {
        let mut prompt = CommandPrompt::new();
        assert_eq!(submit(&mut prompt, " tree "), PromptResult::Submit("tree".to_string()));
        assert!(!prompt.is_active());

        prompt.open();
        type_text(&mut prompt, "st");
        assert_eq!(prompt.handle_key(&key(KeyCode::Esc)), PromptResult::Cancelled);
        assert_eq!(prompt.input(), "");
    }

    #[test]
    fn backspace_on_empty_cancels() {
        let mut prompt = CommandPrompt::new();
        prompt.open();
        type_text(&mut prompt, "a");
        assert_eq!(prompt.handle_key(&key(KeyCode::Backspace)), PromptResult::Continue);
        assert_eq!(prompt.handle_key(&key(KeyCode::Backspace)), PromptResult::Cancelled);
    }

    #[test]
    fn edits_at_cursor() {
        let mut prompt = CommandPrompt::new();
        prompt.open();
        type_text(&mut prompt, "tre");
        prompt.handle_key(&key(KeyCode::Left));
        prompt.handle_key(&key(KeyCode::Char('x')));
        assert_eq!(prompt.input(), "trxe");
        prompt.handle_key(&key(KeyCode::Home));
        prompt.handle_key(&key(KeyCode::Delete));
        assert_eq!(prompt.input(), "rxe");
        assert_eq!(prompt.cursor(), 0);
    }

    #[test]
    fn history_browsing() {
        let mut prompt = CommandPrompt::new();
        submit(&mut prompt, "log");
        submit(&mut prompt, "status");
        submit(&mut prompt, "status");
        assert_eq!(prompt.history(), ["log", "status"]);

        prompt.open();
        type_text(&mut prompt, "dr");
        prompt.handle_key(&key(KeyCode::Up));
        assert_eq!(prompt.input(), "status");
        prompt.handle_key(&key(KeyCode::Up));
        assert_eq!(prompt.input(), "log");
        prompt.handle_key(&key(KeyCode::Up));
        assert_eq!(prompt.input(), "log");
        prompt.handle_key(&key(KeyCode::Down));
        assert_eq!(prompt.input(), "status");
        prompt.handle_key(&key(KeyCode::Down));
        assert_eq!(prompt.input(), "dr");
    }

    #[test]
    fn history_is_bounded() {
        let mut prompt = CommandPrompt::new();
        for i in 0..150 {
            submit(&mut prompt, &format!("add {}", i));
        }
        assert_eq!(prompt.history().len(), HISTORY_LIMIT);
        assert_eq!(prompt.history()[0], "add 50");
    }

    #[test]
    fn tab_completion() {
        let mut prompt = CommandPrompt::new();
        prompt.open();
        type_text(&mut prompt, "sta");
        prompt.handle_key(&key(KeyCode::Tab));
        assert_eq!(prompt.input(), "status ");

        prompt.open();
        type_text(&mut prompt, "re");
        prompt.handle_key(&key(KeyCode::Tab));
        // refresh, refs, reset
        assert_eq!(prompt.input(), "re");
        type_text(&mut prompt, "f");
        prompt.handle_key(&key(KeyCode::Tab));
        assert_eq!(prompt.input(), "ref");

        prompt.open();
        type_text(&mut prompt, "zz");
        prompt.handle_key(&key(KeyCode::Tab));
        assert_eq!(prompt.input(), "zz");
    }
}
