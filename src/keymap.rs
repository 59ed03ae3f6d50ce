use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Named operations that keys can be bound to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Action {
    Quit,
    Refresh,
    Help,
    Status,
    Diff,
    Log,
    Tree,
    Refs,
    Up,
    Down,
    PageUp,
    PageDown,
    Top,
    Bottom,
    Stage,
    Unstage,
    StageAll,
    UnstageAll,
    Discard,
}

/// Help section an action is listed under
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Category {
    Global,
    Views,
    Navigation,
    Staging,
}

impl Category {
    #[cfg(test)]
    pub fn title(&self) -> &'static str {
        match self {
            Self::Global => "Global",
            Self::Views => "Views",
            Self::Navigation => "Navigation",
            Self::Staging => "Staging",
        }
    }
}

impl Action {
    pub const ALL: [Action; 19] = [
        Action::Quit,
        Action::Refresh,
        Action::Help,
        Action::Status,
        Action::Diff,
        Action::Log,
        Action::Tree,
        Action::Refs,
        Action::Up,
        Action::Down,
        Action::PageUp,
        Action::PageDown,
        Action::Top,
        Action::Bottom,
        Action::Stage,
        Action::Unstage,
        Action::StageAll,
        Action::UnstageAll,
        Action::Discard,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Quit => "quit",
            Self::Refresh => "refresh",
            Self::Help => "help",
            Self::Status => "status",
            Self::Diff => "diff",
            Self::Log => "log",
            Self::Tree => "tree",
            Self::Refs => "refs",
            Self::Up => "up",
            Self::Down => "down",
            Self::PageUp => "page-up",
            Self::PageDown => "page-down",
            Self::Top => "top",
            Self::Bottom => "bottom",
            Self::Stage => "stage",
            Self::Unstage => "unstage",
            Self::StageAll => "stage-all",
            Self::UnstageAll => "unstage-all",
            Self::Discard => "discard",
        }
    }

    pub fn category(&self) -> Category {
        match self {
            Self::Quit | Self::Refresh | Self::Help => Category::Global,
            Self::Status | Self::Diff | Self::Log | Self::Tree | Self::Refs => Category::Views,
            Self::Up | Self::Down | Self::PageUp | Self::PageDown | Self::Top | Self::Bottom => {
                Category::Navigation
            }
            Self::Stage | Self::Unstage | Self::StageAll | Self::UnstageAll | Self::Discard => {
                Category::Staging
            }
        }
    }

    /// Staging actions only mean something to the view that owns a selection
    pub fn is_view_scoped(&self) -> bool {
        self.category() == Category::Staging
    }

    fn default_binding(&self) -> (KeyCode, KeyModifiers, &'static str) {
        let none = KeyModifiers::NONE;
        match self {
            Self::Quit => (KeyCode::Char('q'), none, "Quit"),
            Self::Refresh => (KeyCode::Char('R'), none, "Refresh all views"),
            Self::Help => (KeyCode::Char('h'), none, "Show help"),
            Self::Status => (KeyCode::Char('s'), none, "Status view"),
            Self::Diff => (KeyCode::Char('d'), none, "Diff view"),
            Self::Log => (KeyCode::Char('l'), none, "Log view"),
            Self::Tree => (KeyCode::Char('t'), none, "Tree view"),
            Self::Refs => (KeyCode::Char('r'), none, "Refs view"),
            Self::Up => (KeyCode::Up, none, "Move up"),
            Self::Down => (KeyCode::Down, none, "Move down"),
            Self::PageUp => (KeyCode::PageUp, none, "Page up"),
            Self::PageDown => (KeyCode::PageDown, none, "Page down"),
            Self::Top => (KeyCode::Char('g'), none, "Go to top"),
            Self::Bottom => (KeyCode::Char('G'), none, "Go to bottom"),
            Self::Stage => (KeyCode::Char('a'), none, "Stage file"),
            Self::Unstage => (KeyCode::Char('u'), none, "Unstage file"),
            Self::StageAll => (KeyCode::Char('A'), none, "Stage all files"),
            Self::UnstageAll => (KeyCode::Char('U'), none, "Unstage all files"),
            Self::Discard => (KeyCode::Char('!'), none, "Discard changes"),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Action {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_lowercase().replace('_', "-");
        Self::ALL.into_iter().find(|a| a.name() == s).ok_or(())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum KeymapError {
    #[error("invalid key binding '{binding}' for action '{action}'")]
    InvalidBinding { action: String, binding: String },
    #[error("key {key} is bound to both '{first}' and '{second}'")]
    Duplicate {
        key: String,
        first: Action,
        second: Action,
    },
    #[error("key {key} is reserved and cannot be bound to '{action}'")]
    Reserved { key: String, action: Action },
}

/// Keys the application handles before the keymap: the command prompt,
/// interrupt and redraw.
fn is_reserved(code: KeyCode, modifiers: KeyModifiers) -> bool {
    let ctrl = modifiers.contains(KeyModifiers::CONTROL);
    matches!(
        (code, ctrl),
        (KeyCode::Char(':'), false) | (KeyCode::Char('c'), true) | (KeyCode::Char('l'), true)
    )
}

/// Keys some view handles itself when no binding claims them
fn is_view_key(code: KeyCode, modifiers: KeyModifiers) -> bool {
    let ctrl = modifiers.contains(KeyModifiers::CONTROL);
    match code {
        KeyCode::Char('d' | 'u') => ctrl,
        KeyCode::Char('j' | 'k' | 'b' | ' ' | '1'..='9') => !ctrl,
        KeyCode::Tab
        | KeyCode::BackTab
        | KeyCode::Enter
        | KeyCode::Left
        | KeyCode::Right
        | KeyCode::Backspace => true,
        _ => false,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyBinding {
    pub action: Action,
    pub code: KeyCode,
    pub modifiers: KeyModifiers,
    pub help: &'static str,
}

impl KeyBinding {
    pub fn describe(&self) -> String {
        describe_key(self.code, self.modifiers)
    }
}

/// Maps key events to actions
#[derive(Debug, Clone)]
pub struct KeyBindingManager {
    bindings: Vec<KeyBinding>,
}

impl Default for KeyBindingManager {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyBindingManager {
    /// Built-in table
    pub fn new() -> Self {
        let bindings = Action::ALL
            .iter()
            .map(|&action| {
                let (code, modifiers, help) = action.default_binding();
                KeyBinding {
                    action,
                    code,
                    modifiers,
                    help,
                }
            })
            .collect();
        Self { bindings }
    }

    /// Built-in table with user overrides, validated for collisions
    pub fn with_overrides(overrides: &BTreeMap<String, String>) -> Result<Self, KeymapError> {
        let mut manager = Self::new();
        for (name, binding) in overrides {
            let Ok(action) = name.parse::<Action>() else {
                log::warn!("Ignoring binding for unknown action '{}'", name);
                continue;
            };
            let (code, modifiers) =
                parse_binding(binding).ok_or_else(|| KeymapError::InvalidBinding {
                    action: name.clone(),
                    binding: binding.clone(),
                })?;
            if action.category() != Category::Navigation && is_view_key(code, modifiers) {
                log::warn!(
                    "Binding '{}' to '{}' hides that key inside views that use it",
                    binding,
                    action
                );
            }
            manager.rebind(action, code, modifiers);
        }
        manager.validate()?;
        Ok(manager)
    }

    fn rebind(&mut self, action: Action, code: KeyCode, modifiers: KeyModifiers) {
        if let Some(binding) = self.bindings.iter_mut().find(|b| b.action == action) {
            binding.code = code;
            binding.modifiers = modifiers;
        }
    }

    /// Every (key, modifiers) pair must map to a single action
    pub fn validate(&self) -> Result<(), KeymapError> {
        if let Some(binding) = self.bindings.iter().find(|b| is_reserved(b.code, b.modifiers)) {
            return Err(KeymapError::Reserved {
                key: binding.describe(),
                action: binding.action,
            });
        }
        for (i, first) in self.bindings.iter().enumerate() {
            for second in &self.bindings[i + 1..] {
                if first.code == second.code && first.modifiers == second.modifiers {
                    return Err(KeymapError::Duplicate {
                        key: first.describe(),
                        first: first.action,
                        second: second.action,
                    });
                }
            }
        }
        Ok(())
    }

    pub fn match_event(&self, key: &KeyEvent) -> Option<Action> {
        let (code, modifiers) = normalize(key.code, key.modifiers);
        self.bindings
            .iter()
            .find(|b| b.code == code && b.modifiers == modifiers)
            .map(|b| b.action)
    }

    /// Bindings grouped by help category, in table order
    pub fn help_entries(&self) -> Vec<(Category, Vec<&KeyBinding>)> {
        let mut groups: BTreeMap<Category, Vec<&KeyBinding>> = BTreeMap::new();
        for binding in &self.bindings {
            groups.entry(binding.action.category()).or_default().push(binding);
        }
        groups.into_iter().collect()
    }
}

/// Character keys carry their case, so SHIFT is redundant for them.
fn normalize(code: KeyCode, modifiers: KeyModifiers) -> (KeyCode, KeyModifiers) {
    match code {
        KeyCode::Char(_) | KeyCode::BackTab => (code, modifiers - KeyModifiers::SHIFT),
        _ => (code, modifiers),
    }
}

/// Parse strings like "q", "G", "ctrl-l", "alt-x", "shift-tab", "pgdn", "f5".
pub fn parse_binding(input: &str) -> Option<(KeyCode, KeyModifiers)> {
    let mut rest = input.trim();
    let mut modifiers = KeyModifiers::NONE;
    loop {
        let prefix = [
            ("ctrl-", KeyModifiers::CONTROL),
            ("alt-", KeyModifiers::ALT),
            ("shift-", KeyModifiers::SHIFT),
        ]
        .into_iter()
        .find(|(p, _)| {
            rest.len() > p.len() && rest.get(..p.len()).is_some_and(|h| h.eq_ignore_ascii_case(p))
        });
        match prefix {
            Some((p, modifier)) => {
                modifiers |= modifier;
                rest = &rest[p.len()..];
            }
            None => break,
        }
    }

    let mut chars = rest.chars();
    let code = match (chars.next(), chars.next()) {
        (Some(c), None) => {
            if modifiers.contains(KeyModifiers::SHIFT) {
                KeyCode::Char(c.to_ascii_uppercase())
            } else if modifiers.contains(KeyModifiers::CONTROL) {
                KeyCode::Char(c.to_ascii_lowercase())
            } else {
                KeyCode::Char(c)
            }
        }
        (Some(_), Some(_)) => match rest.to_lowercase().as_str() {
            "up" => KeyCode::Up,
            "down" => KeyCode::Down,
            "left" => KeyCode::Left,
            "right" => KeyCode::Right,
            "pgup" | "pageup" => KeyCode::PageUp,
            "pgdn" | "pagedown" => KeyCode::PageDown,
            "home" => KeyCode::Home,
            "end" => KeyCode::End,
            "enter" | "return" => KeyCode::Enter,
            "esc" | "escape" => KeyCode::Esc,
            "tab" if modifiers.contains(KeyModifiers::SHIFT) => KeyCode::BackTab,
            "tab" => KeyCode::Tab,
            "backtab" => KeyCode::BackTab,
            "backspace" => KeyCode::Backspace,
            "del" | "delete" => KeyCode::Delete,
            "ins" | "insert" => KeyCode::Insert,
            "space" => KeyCode::Char(' '),
            name => {
                let n: u8 = name.strip_prefix('f')?.parse().ok()?;
                if !(1..=12).contains(&n) {
                    return None;
                }
                KeyCode::F(n)
            }
        },
        (None, _) => return None,
    };
    Some(normalize(code, modifiers))
}

/// Human readable key name for help text
pub fn describe_key(code: KeyCode, modifiers: KeyModifiers) -> String {
    let mut out = String::new();
    if modifiers.contains(KeyModifiers::CONTROL) {
        out.push_str("Ctrl+");
    }
    if modifiers.contains(KeyModifiers::ALT) {
        out.push_str("Alt+");
    }
    if modifiers.contains(KeyModifiers::SHIFT) {
        out.push_str("Shift+");
    }
    let name = match code {
        KeyCode::Char(' ') => "Space".to_string(),
        KeyCode::Char(c) => c.to_string(),
        KeyCode::Up => "↑".to_string(),
        KeyCode::Down => "↓".to_string(),
        KeyCode::Left => "←".to_string(),
        KeyCode::Right => "→".to_string(),
        KeyCode::PageUp => "PgUp".to_string(),
        KeyCode::PageDown => "PgDn".to_string(),
        KeyCode::Home => "Home".to_string(),
        KeyCode::End => "End".to_string(),
        KeyCode::Enter => "Enter".to_string(),
        KeyCode::Esc => "Esc".to_string(),
        KeyCode::Tab => "Tab".to_string(),
        KeyCode::BackTab => "Shift+Tab".to_string(),
        KeyCode::Backspace => "Backspace".to_string(),
        KeyCode::Delete => "Del".to_string(),
        KeyCode::Insert => "Ins".to_string(),
        KeyCode::F(n) => format!("F{}", n),
        other => format!("{:?}", other),
    };
    out.push_str(&name);
    out
}
