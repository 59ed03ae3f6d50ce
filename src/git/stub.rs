//! In-memory backend for view tests

use chrono::DateTime;
use std::cell::{Cell, RefCell};

use super::*;

/// Backend serving canned data. Individual calls can be made to fail.
#[derive(Default)]
pub struct StubBackend {
    pub repository: bool,
    pub commits: RefCell<Vec<Commit>>,
    pub status: RefCell<Status>,
    pub branches: RefCell<Vec<Ref>>,
    pub tags: RefCell<Vec<Ref>>,
    pub remotes: RefCell<Vec<Ref>>,
    pub tree: RefCell<Vec<TreeEntry>>,
    pub diff: RefCell<String>,
    pub fail_commits: Cell<bool>,
    pub fail_status: Cell<bool>,
    pub fail_refs: Cell<bool>,
    pub fail_mutations: Cell<bool>,
    /// Mutations naming this path fail
    pub fail_path: RefCell<Option<String>>,
    /// Log of mutating calls, e.g. "stage a.txt"
    pub calls: RefCell<Vec<String>>,
    /// Number of `commits` queries served
    pub log_queries: Cell<usize>,
    /// Number of `status` queries served
    pub status_queries: Cell<usize>,
}

impl StubBackend {
    pub fn repository() -> Self {
        Self {
            repository: true,
            ..Self::default()
        }
    }

    pub fn with_commits(self, count: usize) -> Self {
        *self.commits.borrow_mut() = (0..count).map(make_commit).collect();
        self
    }

    fn failure(what: &str) -> BackendError {
        BackendError::NotFound(format!("stubbed {}", what))
    }

    fn check(&self, flag: &Cell<bool>, what: &str) -> BackendResult<()> {
        if !self.repository {
            return Err(BackendError::NotARepository);
        }
        if flag.get() {
            return Err(Self::failure(what));
        }
        Ok(())
    }

    fn mutate(&self, call: String) -> BackendResult<()> {
        self.check(&self.fail_mutations, "mutation")?;
        if let Some(path) = self.fail_path.borrow().as_deref() {
            if call.ends_with(path) {
                return Err(Self::failure(path));
            }
        }
        self.calls.borrow_mut().push(call);
        Ok(())
    }
}

pub fn make_commit(n: usize) -> Commit {
    Commit {
        id: format!("{:040x}", n + 1),
        author: format!("Author {}", n),
        email: format!("author{}@example.com", n),
        date: DateTime::from_timestamp(1_700_000_000 + n as i64 * 86_400, 0)
            .unwrap()
            .fixed_offset(),
        summary: format!("Commit number {}", n),
        parents: Vec::new(),
    }
}

impl GitBackend for StubBackend {
    fn is_repository(&self) -> bool {
        self.repository
    }

    fn branches(&self) -> BackendResult<Vec<Ref>> {
        self.check(&self.fail_refs, "branches")?;
        Ok(self.branches.borrow().clone())
    }

    fn tags(&self) -> BackendResult<Vec<Ref>> {
        self.check(&self.fail_refs, "tags")?;
        Ok(self.tags.borrow().clone())
    }

    fn remotes(&self) -> BackendResult<Vec<Ref>> {
        self.check(&self.fail_refs, "remotes")?;
        Ok(self.remotes.borrow().clone())
    }

    fn commits(&self, opts: &LogOptions) -> BackendResult<Vec<Commit>> {
        self.log_queries.set(self.log_queries.get() + 1);
        self.check(&self.fail_commits, "commits")?;
        let commits = self.commits.borrow();
        let limit = if opts.max_count == 0 {
            usize::MAX
        } else {
            opts.max_count
        };
        Ok(commits.iter().skip(opts.skip).take(limit).cloned().collect())
    }

    fn status(&self) -> BackendResult<Status> {
        self.status_queries.set(self.status_queries.get() + 1);
        self.check(&self.fail_status, "status")?;
        Ok(self.status.borrow().clone())
    }

    fn stage_file(&self, path: &str) -> BackendResult<()> {
        self.mutate(format!("stage {}", path))
    }

    fn unstage_file(&self, path: &str) -> BackendResult<()> {
        self.mutate(format!("unstage {}", path))
    }

    fn stage_all(&self) -> BackendResult<()> {
        self.mutate("stage-all".to_string())
    }

    fn unstage_all(&self) -> BackendResult<()> {
        self.mutate("unstage-all".to_string())
    }

    fn discard_changes(&self, path: &str) -> BackendResult<()> {
        self.mutate(format!("discard {}", path))
    }

    fn commit_diff(&self, id: &str) -> BackendResult<String> {
        self.check(&self.fail_commits, "diff")?;
        Ok(format!("commit {}\n{}", id, self.diff.borrow()))
    }

    fn tree_entries(&self, dir: &str) -> BackendResult<Vec<TreeEntry>> {
        self.check(&Cell::new(false), "tree")?;
        Ok(self
            .tree
            .borrow()
            .iter()
            .filter(|e| match e.path.rsplit_once('/') {
                Some((parent, _)) => parent == dir,
                None => dir.is_empty(),
            })
            .cloned()
            .collect())
    }
}
