mod client;
#[cfg(test)]
pub mod stub;
mod types;

pub use client::GitClient;
pub use types::*;

use thiserror::Error;

/// Failure of a repository query or mutation
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("not in a git repository")]
    NotARepository,
    #[error("{0} not found")]
    NotFound(String),
    #[error("{context}: {source}")]
    Git {
        context: String,
        #[source]
        source: git2::Error,
    },
}

pub type BackendResult<T> = Result<T, BackendError>;

/// Attach a description to git2 failures
pub(crate) trait GitContext<T> {
    fn git_context(self, context: &str) -> BackendResult<T>;
}

impl<T> GitContext<T> for Result<T, git2::Error> {
    fn git_context(self, context: &str) -> BackendResult<T> {
        self.map_err(|source| BackendError::Git {
            context: context.to_string(),
            source,
        })
    }
}

/// Repository queries and mutations used by the views
pub trait GitBackend {
    fn is_repository(&self) -> bool;
    fn branches(&self) -> BackendResult<Vec<Ref>>;
    fn tags(&self) -> BackendResult<Vec<Ref>>;
    fn remotes(&self) -> BackendResult<Vec<Ref>>;
    fn commits(&self, opts: &LogOptions) -> BackendResult<Vec<Commit>>;
    fn status(&self) -> BackendResult<Status>;
    fn stage_file(&self, path: &str) -> BackendResult<()>;
    fn unstage_file(&self, path: &str) -> BackendResult<()>;
    fn stage_all(&self) -> BackendResult<()>;
    fn unstage_all(&self) -> BackendResult<()>;
    fn discard_changes(&self, path: &str) -> BackendResult<()>;
    fn commit_diff(&self, id: &str) -> BackendResult<String>;
    /// Entries of HEAD's tree under `dir` ("" for the root)
    fn tree_entries(&self, dir: &str) -> BackendResult<Vec<TreeEntry>>;
}
