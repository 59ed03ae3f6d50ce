use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::keymap::{KeyBindingManager, KeymapError};
use crate::theme::{Colors, ThemeMode};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error(transparent)]
    Keymap(#[from] KeymapError),
}

/// Build identity, passed to the views that display it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppInfo {
    pub name: &'static str,
    pub version: &'static str,
}

impl Default for AppInfo {
    fn default() -> Self {
        Self {
            name: env!("CARGO_PKG_NAME"),
            version: env!("CARGO_PKG_VERSION"),
        }
    }
}

/// Application configuration, read once at startup
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,
    pub views: ViewsConfig,
    /// action name → key binding, e.g. `quit = "ctrl-q"`
    pub keymaps: BTreeMap<String, String>,
    /// palette slot → color name, e.g. `diff-add = "green"`
    pub colors: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Seconds between automatic refreshes, 0 disables them
    pub refresh_interval_secs: u64,
    /// Commits loaded into the log view, 0 for no limit
    pub max_commits: usize,
    /// "auto", "dark" or "light"
    pub theme: String,
    /// Refresh when files in the working tree change
    pub watch_files: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            refresh_interval_secs: 5,
            max_commits: 100,
            theme: "auto".to_string(),
            watch_files: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ViewsConfig {
    pub main: MainViewConfig,
    pub diff: DiffViewConfig,
    pub status: StatusViewConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct MainViewConfig {
    pub show_graph: bool,
    pub show_refs: bool,
    pub show_id: bool,
    pub show_date: bool,
    pub show_author: bool,
    pub author_width: usize,
    pub date_format: String,
}

impl Default for MainViewConfig {
    fn default() -> Self {
        Self {
            show_graph: true,
            show_refs: true,
            show_id: false,
            show_date: true,
            show_author: true,
            author_width: 20,
            date_format: "%Y-%m-%d".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct DiffViewConfig {
    pub context_lines: u32,
}

impl Default for DiffViewConfig {
    fn default() -> Self {
        Self { context_lines: 3 }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct StatusViewConfig {
    pub show_untracked: bool,
}

impl Default for StatusViewConfig {
    fn default() -> Self {
        Self {
            show_untracked: true,
        }
    }
}

impl Config {
    /// Load from an explicit file, or the first existing default location.
    /// Missing default files are not an error.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }
        match Self::candidate_paths().into_iter().find(|p| p.is_file()) {
            Some(path) => Self::from_file(&path),
            None => {
                log::debug!("No config file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        log::info!("Loading config from {}", path.display());
        Self::parse(&text, path)
    }

    fn parse(text: &str, path: &Path) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        // Surface bad bindings at startup rather than on first keypress
        config.keymap()?;
        Ok(config)
    }

    /// Default locations, most specific first
    fn candidate_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();
        if let Ok(path) = std::env::var("TIGR_CONFIG") {
            paths.push(PathBuf::from(path));
        }
        if let Ok(dir) = std::env::var("XDG_CONFIG_HOME") {
            paths.push(PathBuf::from(dir).join("tigr").join("config.toml"));
        }
        if let Ok(home) = std::env::var("HOME") {
            let home = PathBuf::from(home);
            paths.push(home.join(".config").join("tigr").join("config.toml"));
            paths.push(home.join(".tigrc.toml"));
        }
        paths
    }

    pub fn keymap(&self) -> Result<KeyBindingManager, ConfigError> {
        Ok(KeyBindingManager::with_overrides(&self.keymaps)?)
    }

    pub fn colors(&self) -> Colors {
        Colors::from_config(ThemeMode::resolve(&self.general.theme), &self.colors)
    }

    pub fn refresh_interval(&self) -> Option<Duration> {
        match self.general.refresh_interval_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn parse(text: &str) -> Result<Config, ConfigError> {
        Config::parse(text, Path::new("test.toml"))
    }

    #[test]
    fn empty_file_gives_defaults() {
        let config = parse("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.general.max_commits, 100);
        assert_eq!(config.refresh_interval(), Some(Duration::from_secs(5)));
        assert!(!config.views.main.show_id);
        assert_eq!(config.views.diff.context_lines, 3);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = parse(
            r#"
            [general]
            refresh_interval_secs = 0

            [views.main]
            show_id = true

            [keymaps]
            quit = "ctrl-q"

            [colors]
            diff-add = "blue"
            "#,
        )
        .unwrap();
        assert_eq!(config.refresh_interval(), None);
        assert_eq!(config.general.max_commits, 100);
        assert!(config.views.main.show_id);
        assert!(config.views.main.show_author);
        assert_eq!(config.keymaps.get("quit").map(String::as_str), Some("ctrl-q"));
        assert_eq!(config.colors().diff_add, ratatui::style::Color::Blue);
    }

    #[test]
    fn syntax_error_is_parse_error() {
        assert!(matches!(
            parse("[general\nmax_commits = "),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn duplicate_binding_fails_load() {
        let err = parse("[keymaps]\nhelp = \"q\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Keymap(KeymapError::Duplicate { .. })));
    }

    #[test]
    fn missing_explicit_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load(Some(&dir.path().join("nope.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn explicit_file_is_read() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[general]\nmax_commits = 7").unwrap();
        let config = Config::load(Some(file.path())).unwrap();
        assert_eq!(config.general.max_commits, 7);
    }
}
