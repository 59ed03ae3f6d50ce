use chrono::{DateTime, FixedOffset};
use std::fmt;

/// A commit as shown in the log
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commit {
    pub id: String,
    pub author: String,
    pub email: String,
    pub date: DateTime<FixedOffset>,
    pub summary: String,
    pub parents: Vec<String>,
}

impl Commit {
    /// Abbreviated id (7 characters)
    pub fn short_id(&self) -> &str {
        let end = self.id.len().min(7);
        &self.id[..end]
    }
}

/// Kind of reference
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RefKind {
    Branch,
    Tag,
    Remote,
}

/// Branch, tag, or remote-tracking branch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ref {
    pub name: String,
    pub kind: RefKind,
    /// Target commit id
    pub target: String,
    /// True for the checked-out branch
    pub is_head: bool,
}

impl Ref {
    pub fn short_target(&self) -> &str {
        let end = self.target.len().min(8);
        &self.target[..end]
    }
}

/// Status code of a file in the index or worktree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileStatus {
    Modified,
    Added,
    Deleted,
    Renamed,
    TypeChange,
    Untracked,
    Conflicted,
}

impl FileStatus {
    pub fn as_char(&self) -> char {
        match self {
            Self::Modified => 'M',
            Self::Added => 'A',
            Self::Deleted => 'D',
            Self::Renamed => 'R',
            Self::TypeChange => 'T',
            Self::Untracked => '?',
            Self::Conflicted => 'U',
        }
    }
}

impl fmt::Display for FileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

/// A file with its status
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusEntry {
    pub path: String,
    pub status: FileStatus,
}

impl StatusEntry {
    pub fn new(path: impl Into<String>, status: FileStatus) -> Self {
        Self {
            path: path.into(),
            status,
        }
    }
}

/// Working tree state
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Status {
    pub branch: String,
    pub ahead: usize,
    pub behind: usize,
    pub staged: Vec<StatusEntry>,
    pub modified: Vec<StatusEntry>,
    pub untracked: Vec<StatusEntry>,
    pub conflicts: Vec<StatusEntry>,
}

impl Status {
    pub fn is_clean(&self) -> bool {
        self.staged.is_empty()
            && self.modified.is_empty()
            && self.untracked.is_empty()
            && self.conflicts.is_empty()
    }
}

/// Options for walking the commit log
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogOptions {
    /// Zero means unlimited
    pub max_count: usize,
    pub skip: usize,
    /// Start from this branch instead of HEAD
    pub branch: Option<String>,
    /// Only commits touching this path
    pub path: Option<String>,
    /// Walk every local branch
    pub all: bool,
    /// Oldest first
    pub reverse: bool,
}

/// Entry of a tree listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    pub name: String,
    /// Path relative to the repository root
    pub path: String,
    pub is_dir: bool,
    pub size: Option<usize>,
}
