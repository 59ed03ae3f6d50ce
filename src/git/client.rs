use chrono::{DateTime, FixedOffset, Offset, Utc};
use git2::build::CheckoutBuilder;
use git2::{
    BranchType, DiffFormat, DiffOptions, IndexAddOption, ObjectType, Repository, ResetType, Sort,
    StatusOptions,
};
use std::path::{Path, PathBuf};

use super::types::*;
use super::{BackendError, BackendResult, GitBackend, GitContext};

/// Git client using libgit2 for native performance
pub struct GitClient {
    repo: Option<Repository>,
    path: PathBuf,
    context_lines: u32,
}

impl GitClient {
    /// Open the repository containing `path`. A directory outside any
    /// repository still yields a client; every query then reports
    /// `NotARepository`.
    pub fn discover(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let repo = match Repository::discover(&path) {
            Ok(repo) => Some(repo),
            Err(e) => {
                log::info!("No repository at {}: {}", path.display(), e.message());
                None
            }
        };
        let path = repo
            .as_ref()
            .and_then(|r| r.workdir().map(Path::to_path_buf))
            .unwrap_or(path);
        Self {
            repo,
            path,
            context_lines: 3,
        }
    }

    /// Lines of context around each diff hunk
    pub fn with_context_lines(mut self, lines: u32) -> Self {
        self.context_lines = lines;
        self
    }

    /// Working directory (or the requested path when not in a repository)
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn repo(&self) -> BackendResult<&Repository> {
        self.repo.as_ref().ok_or(BackendError::NotARepository)
    }

    fn head_commit(repo: &Repository) -> Option<git2::Commit<'_>> {
        repo.head().ok()?.peel_to_commit().ok()
    }

    /// Name of the checked-out branch, also for unborn branches
    fn current_branch(repo: &Repository) -> String {
        match repo.head() {
            Ok(head) if head.is_branch() => head.shorthand().unwrap_or("HEAD").to_string(),
            Ok(head) => {
                let id = head.target().map(|id| id.to_string()).unwrap_or_default();
                format!("HEAD (detached at {})", &id[..id.len().min(7)])
            }
            Err(_) => repo
                .find_reference("HEAD")
                .ok()
                .and_then(|r| r.symbolic_target().map(str::to_string))
                .map(|target| target.trim_start_matches("refs/heads/").to_string())
                .unwrap_or_else(|| "HEAD".to_string()),
        }
    }

    fn ahead_behind(repo: &Repository) -> Option<(usize, usize)> {
        let head = repo.head().ok()?;
        if !head.is_branch() {
            return None;
        }
        let branch = repo.find_branch(head.shorthand()?, BranchType::Local).ok()?;
        let upstream = branch.upstream().ok()?;
        let local = head.target()?;
        let remote = upstream.get().target()?;
        repo.graph_ahead_behind(local, remote).ok()
    }

    fn list_branches(&self, kind: BranchType) -> BackendResult<Vec<Ref>> {
        let repo = self.repo()?;
        let ref_kind = match kind {
            BranchType::Local => RefKind::Branch,
            BranchType::Remote => RefKind::Remote,
        };
        let mut refs = Vec::new();
        for item in repo.branches(Some(kind)).git_context("Failed to list branches")? {
            let (branch, _) = item.git_context("Failed to read branch")?;
            // Symbolic refs such as origin/HEAD have no direct target
            let Some(target) = branch.get().target() else {
                continue;
            };
            let name = branch
                .name()
                .git_context("Failed to read branch name")?
                .unwrap_or_default()
                .to_string();
            refs.push(Ref {
                name,
                kind: ref_kind,
                target: target.to_string(),
                is_head: branch.is_head(),
            });
        }
        refs.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(refs)
    }

    fn to_commit(commit: &git2::Commit) -> Commit {
        let author = commit.author();
        let time = commit.time();
        let offset = FixedOffset::east_opt(time.offset_minutes() * 60).unwrap_or_else(|| Utc.fix());
        let date = DateTime::from_timestamp(time.seconds(), 0)
            .unwrap_or_default()
            .with_timezone(&offset);
        Commit {
            id: commit.id().to_string(),
            author: author.name().unwrap_or_default().to_string(),
            email: author.email().unwrap_or_default().to_string(),
            date,
            summary: commit.summary().unwrap_or_default().to_string(),
            parents: commit.parent_ids().map(|id| id.to_string()).collect(),
        }
    }

    fn touches_path(
        repo: &Repository,
        commit: &git2::Commit,
        path: &str,
    ) -> Result<bool, git2::Error> {
        let tree = commit.tree()?;
        let parent_tree = match commit.parent_count() {
            0 => None,
            _ => Some(commit.parent(0)?.tree()?),
        };
        let mut opts = DiffOptions::new();
        opts.pathspec(path);
        let diff = repo.diff_tree_to_tree(parent_tree.as_ref(), Some(&tree), Some(&mut opts))?;
        Ok(diff.deltas().len() > 0)
    }

    fn commit_header(commit: &git2::Commit) -> String {
        let info = Self::to_commit(commit);
        let mut header = format!("commit {}\n", info.id);
        if info.parents.len() > 1 {
            let short: Vec<&str> = info.parents.iter().map(|p| &p[..p.len().min(7)]).collect();
            header.push_str(&format!("Merge: {}\n", short.join(" ")));
        }
        header.push_str(&format!("Author: {} <{}>\n", info.author, info.email));
        header.push_str(&format!(
            "Date:   {}\n\n",
            info.date.format("%a %b %e %H:%M:%S %Y %z")
        ));
        for line in commit.message().unwrap_or_default().lines() {
            header.push_str("    ");
            header.push_str(line);
            header.push('\n');
        }
        header.push('\n');
        header
    }

    fn diff_to_string(diff: &git2::Diff) -> BackendResult<String> {
        let mut result = String::new();
        diff.print(DiffFormat::Patch, |_delta, _hunk, line| {
            if matches!(line.origin(), '+' | '-' | ' ') {
                result.push(line.origin());
            }
            result.push_str(&String::from_utf8_lossy(line.content()));
            true
        })
        .git_context("Failed to format diff")?;
        Ok(result)
    }

    fn index(repo: &Repository) -> BackendResult<git2::Index> {
        let mut index = repo.index().git_context("Failed to open index")?;
        index.read(false).git_context("Failed to read index")?;
        Ok(index)
    }
}

impl GitBackend for GitClient {
    fn is_repository(&self) -> bool {
        self.repo.is_some()
    }

    fn branches(&self) -> BackendResult<Vec<Ref>> {
        self.list_branches(BranchType::Local)
    }

    fn remotes(&self) -> BackendResult<Vec<Ref>> {
        self.list_branches(BranchType::Remote)
    }

    fn tags(&self) -> BackendResult<Vec<Ref>> {
        let repo = self.repo()?;
        let names = repo.tag_names(None).git_context("Failed to list tags")?;
        let mut tags = Vec::new();
        for name in names.iter().flatten() {
            let Ok(reference) = repo.find_reference(&format!("refs/tags/{}", name)) else {
                continue;
            };
            // Annotated tags point at a tag object; show the commit instead
            let target = reference
                .peel_to_commit()
                .map(|c| c.id().to_string())
                .ok()
                .or_else(|| reference.target().map(|id| id.to_string()))
                .unwrap_or_default();
            tags.push(Ref {
                name: name.to_string(),
                kind: RefKind::Tag,
                target,
                is_head: false,
            });
        }
        tags.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(tags)
    }

    fn commits(&self, opts: &LogOptions) -> BackendResult<Vec<Commit>> {
        let repo = self.repo()?;
        let mut walk = repo.revwalk().git_context("Failed to walk history")?;
        walk.set_sorting(Sort::TIME)
            .git_context("Failed to sort history")?;

        if let Some(branch) = &opts.branch {
            let start = repo
                .revparse_single(branch)
                .and_then(|obj| obj.peel_to_commit())
                .map_err(|_| BackendError::NotFound(format!("branch {}", branch)))?;
            walk.push(start.id()).git_context("Failed to start walk")?;
        } else {
            let has_head = Self::head_commit(repo).is_some();
            if has_head {
                walk.push_head().git_context("Failed to start walk at HEAD")?;
            }
            if opts.all {
                walk.push_glob("refs/heads/*")
                    .git_context("Failed to add branches to walk")?;
            } else if !has_head {
                return Ok(Vec::new());
            }
        }

        let limit = match opts.max_count {
            0 => usize::MAX,
            n => n,
        };
        let mut commits = Vec::new();
        let mut skipped = 0;
        for oid in walk {
            if commits.len() >= limit {
                break;
            }
            let oid = oid.git_context("Failed to walk history")?;
            let commit = repo.find_commit(oid).git_context("Failed to read commit")?;
            if let Some(path) = &opts.path {
                if !Self::touches_path(repo, &commit, path).git_context("Failed to diff commit")? {
                    continue;
                }
            }
            if skipped < opts.skip {
                skipped += 1;
                continue;
            }
            commits.push(Self::to_commit(&commit));
        }
        if opts.reverse {
            commits.reverse();
        }
        Ok(commits)
    }

    fn status(&self) -> BackendResult<Status> {
        let repo = self.repo()?;
        let mut opts = StatusOptions::new();
        opts.include_untracked(true)
            .recurse_untracked_dirs(true)
            .renames_head_to_index(true);
        let statuses = repo
            .statuses(Some(&mut opts))
            .git_context("Failed to read status")?;

        let (ahead, behind) = Self::ahead_behind(repo).unwrap_or((0, 0));
        let mut status = Status {
            branch: Self::current_branch(repo),
            ahead,
            behind,
            ..Status::default()
        };

        for entry in statuses.iter() {
            let Some(path) = entry.path() else {
                continue;
            };
            let flags = entry.status();
            if flags.is_conflicted() {
                status
                    .conflicts
                    .push(StatusEntry::new(path, FileStatus::Conflicted));
                continue;
            }

            let staged = if flags.is_index_new() {
                Some(FileStatus::Added)
            } else if flags.is_index_modified() {
                Some(FileStatus::Modified)
            } else if flags.is_index_deleted() {
                Some(FileStatus::Deleted)
            } else if flags.is_index_renamed() {
                Some(FileStatus::Renamed)
            } else if flags.is_index_typechange() {
                Some(FileStatus::TypeChange)
            } else {
                None
            };
            if let Some(code) = staged {
                status.staged.push(StatusEntry::new(path, code));
            }

            let unstaged = if flags.is_wt_modified() {
                Some(FileStatus::Modified)
            } else if flags.is_wt_deleted() {
                Some(FileStatus::Deleted)
            } else if flags.is_wt_renamed() {
                Some(FileStatus::Renamed)
            } else if flags.is_wt_typechange() {
                Some(FileStatus::TypeChange)
            } else {
                None
            };
            if let Some(code) = unstaged {
                status.modified.push(StatusEntry::new(path, code));
            }

            if flags.is_wt_new() {
                status
                    .untracked
                    .push(StatusEntry::new(path, FileStatus::Untracked));
            }
        }
        Ok(status)
    }

    fn stage_file(&self, path: &str) -> BackendResult<()> {
        let repo = self.repo()?;
        let workdir = repo.workdir().ok_or(BackendError::NotARepository)?;
        let mut index = Self::index(repo)?;
        let context = format!("Failed to stage {}", path);
        if workdir.join(path).exists() {
            index.add_path(Path::new(path)).git_context(&context)?;
        } else {
            index.remove_path(Path::new(path)).git_context(&context)?;
        }
        index.write().git_context("Failed to write index")
    }

    fn unstage_file(&self, path: &str) -> BackendResult<()> {
        let repo = self.repo()?;
        let context = format!("Failed to unstage {}", path);
        match Self::head_commit(repo) {
            Some(head) => repo
                .reset_default(Some(head.as_object()), [path])
                .git_context(&context),
            None => {
                let mut index = Self::index(repo)?;
                index.remove_path(Path::new(path)).git_context(&context)?;
                index.write().git_context("Failed to write index")
            }
        }
    }

    fn stage_all(&self) -> BackendResult<()> {
        let repo = self.repo()?;
        let mut index = Self::index(repo)?;
        index
            .add_all(["*"], IndexAddOption::DEFAULT, None)
            .git_context("Failed to stage files")?;
        // add_all does not record deletions
        index
            .update_all(["*"], None)
            .git_context("Failed to stage deletions")?;
        index.write().git_context("Failed to write index")
    }

    fn unstage_all(&self) -> BackendResult<()> {
        let repo = self.repo()?;
        match Self::head_commit(repo) {
            Some(head) => repo
                .reset(head.as_object(), ResetType::Mixed, None)
                .git_context("Failed to reset index"),
            None => {
                let mut index = Self::index(repo)?;
                index.clear().git_context("Failed to clear index")?;
                index.write().git_context("Failed to write index")
            }
        }
    }

    fn discard_changes(&self, path: &str) -> BackendResult<()> {
        let repo = self.repo()?;
        let mut checkout = CheckoutBuilder::new();
        checkout.force().path(path);
        repo.checkout_index(None, Some(&mut checkout))
            .git_context(&format!("Failed to discard changes in {}", path))
    }

    fn commit_diff(&self, id: &str) -> BackendResult<String> {
        let repo = self.repo()?;
        let commit = repo
            .revparse_single(id)
            .and_then(|obj| obj.peel_to_commit())
            .map_err(|_| BackendError::NotFound(format!("commit {}", id)))?;
        let tree = commit.tree().git_context("Failed to read commit tree")?;
        let parent_tree = match commit.parent(0) {
            Ok(parent) => Some(parent.tree().git_context("Failed to read parent tree")?),
            Err(_) => None,
        };

        let mut opts = DiffOptions::new();
        opts.context_lines(self.context_lines);
        let diff = repo
            .diff_tree_to_tree(parent_tree.as_ref(), Some(&tree), Some(&mut opts))
            .git_context("Failed to diff commit")?;

        let mut text = Self::commit_header(&commit);
        text.push_str(&Self::diff_to_string(&diff)?);
        Ok(text)
    }

    fn tree_entries(&self, dir: &str) -> BackendResult<Vec<TreeEntry>> {
        let repo = self.repo()?;
        let Some(head) = Self::head_commit(repo) else {
            return Ok(Vec::new());
        };
        let root = head.tree().git_context("Failed to read HEAD tree")?;
        let tree = if dir.is_empty() {
            root
        } else {
            let entry = root
                .get_path(Path::new(dir))
                .map_err(|_| BackendError::NotFound(dir.to_string()))?;
            repo.find_tree(entry.id())
                .map_err(|_| BackendError::NotFound(dir.to_string()))?
        };

        let mut entries: Vec<TreeEntry> = tree
            .iter()
            .map(|entry| {
                let name = entry.name().unwrap_or_default().to_string();
                let is_dir = entry.kind() == Some(ObjectType::Tree);
                let size = match entry.kind() {
                    Some(ObjectType::Blob) => repo.find_blob(entry.id()).ok().map(|b| b.size()),
                    _ => None,
                };
                let path = if dir.is_empty() {
                    name.clone()
                } else {
                    format!("{}/{}", dir, name)
                };
                TreeEntry {
                    name,
                    path,
                    is_dir,
                    size,
                }
            })
            .collect();
        entries.sort_by(|a, b| b.is_dir.cmp(&a.is_dir).then_with(|| a.name.cmp(&b.name)));
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use git2::Signature;
    use std::fs;
    use tempfile::TempDir;

    fn init_repo() -> TempDir {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        let mut config = repo.config().unwrap();
        config.set_str("user.name", "Test User").unwrap();
        config.set_str("user.email", "test@example.com").unwrap();
        dir
    }

    fn commit_file(dir: &Path, name: &str, content: &str, message: &str) {
        let repo = Repository::open(dir).unwrap();
        let file = dir.join(name);
        if let Some(parent) = file.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&file, content).unwrap();

        let mut index = repo.index().unwrap();
        index.add_path(Path::new(name)).unwrap();
        index.write().unwrap();
        let tree = repo.find_tree(index.write_tree().unwrap()).unwrap();
        let sig = Signature::now("Test User", "test@example.com").unwrap();
        let parents: Vec<git2::Commit> = GitClient::head_commit(&repo).into_iter().collect();
        let parent_refs: Vec<&git2::Commit> = parents.iter().collect();
        repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &parent_refs)
            .unwrap();
    }

    // --- Repository detection ---

    #[test]
    fn outside_repository_reports_not_a_repository() {
        let dir = tempfile::tempdir().unwrap();
        let client = GitClient::discover(dir.path());
        assert!(!client.is_repository());
        assert!(matches!(
            client.commits(&LogOptions::default()),
            Err(BackendError::NotARepository)
        ));
        assert!(matches!(client.status(), Err(BackendError::NotARepository)));
    }

    #[test]
    fn empty_repository_has_no_commits() {
        let dir = init_repo();
        let client = GitClient::discover(dir.path());
        assert!(client.is_repository());
        assert!(client.commits(&LogOptions::default()).unwrap().is_empty());
        assert!(client.tree_entries("").unwrap().is_empty());
    }

    // --- Log ---

    #[test]
    fn commits_newest_first_with_limits() {
        let dir = init_repo();
        commit_file(dir.path(), "a.txt", "a", "first");
        commit_file(dir.path(), "b.txt", "b", "second");
        commit_file(dir.path(), "a.txt", "aa", "third");
        let client = GitClient::discover(dir.path());

        let all = client.commits(&LogOptions::default()).unwrap();
        let summaries: Vec<&str> = all.iter().map(|c| c.summary.as_str()).collect();
        assert_eq!(summaries, ["third", "second", "first"]);
        assert_eq!(all[0].author, "Test User");
        assert_eq!(all[0].short_id().len(), 7);

        let limited = client
            .commits(&LogOptions {
                max_count: 1,
                skip: 1,
                ..LogOptions::default()
            })
            .unwrap();
        assert_eq!(limited.len(), 1);
        assert_eq!(limited[0].summary, "second");

        let reversed = client
            .commits(&LogOptions {
                reverse: true,
                ..LogOptions::default()
            })
            .unwrap();
        assert_eq!(reversed[0].summary, "first");
    }

    #[test]
    fn commits_filtered_by_path() {
        let dir = init_repo();
        commit_file(dir.path(), "a.txt", "a", "first");
        commit_file(dir.path(), "b.txt", "b", "second");
        commit_file(dir.path(), "a.txt", "aa", "third");
        let client = GitClient::discover(dir.path());

        let commits = client
            .commits(&LogOptions {
                path: Some("a.txt".to_string()),
                ..LogOptions::default()
            })
            .unwrap();
        let summaries: Vec<&str> = commits.iter().map(|c| c.summary.as_str()).collect();
        assert_eq!(summaries, ["third", "first"]);
    }

    // --- Refs ---

    #[test]
    fn branches_and_tags() {
        let dir = init_repo();
        commit_file(dir.path(), "a.txt", "a", "first");
        {
            let repo = Repository::open(dir.path()).unwrap();
            let head = GitClient::head_commit(&repo).unwrap();
            repo.branch("feature", &head, false).unwrap();
            repo.tag_lightweight("v1.0", head.as_object(), false).unwrap();
        }
        let client = GitClient::discover(dir.path());

        let branches = client.branches().unwrap();
        assert_eq!(branches.len(), 2);
        assert_eq!(branches.iter().filter(|b| b.is_head).count(), 1);
        assert!(branches.iter().any(|b| b.name == "feature" && !b.is_head));

        let tags = client.tags().unwrap();
        assert_eq!(tags.len(), 1);
        assert_eq!(tags[0].name, "v1.0");
        assert_eq!(tags[0].target, branches[0].target);
        assert!(client.remotes().unwrap().is_empty());
    }

    // --- Status and staging ---

    #[test]
    fn status_sections() {
        let dir = init_repo();
        commit_file(dir.path(), "tracked.txt", "one\n", "first");
        fs::write(dir.path().join("tracked.txt"), "two\n").unwrap();
        fs::write(dir.path().join("new.txt"), "new\n").unwrap();
        let client = GitClient::discover(dir.path());

        let status = client.status().unwrap();
        assert!(!status.branch.is_empty());
        assert_eq!(
            status.modified,
            vec![StatusEntry::new("tracked.txt", FileStatus::Modified)]
        );
        assert_eq!(
            status.untracked,
            vec![StatusEntry::new("new.txt", FileStatus::Untracked)]
        );
        assert!(status.staged.is_empty());
        assert!(!status.is_clean());
    }

    #[test]
    fn stage_and_unstage_file() {
        let dir = init_repo();
        commit_file(dir.path(), "tracked.txt", "one\n", "first");
        fs::write(dir.path().join("tracked.txt"), "two\n").unwrap();
        let client = GitClient::discover(dir.path());

        client.stage_file("tracked.txt").unwrap();
        let status = client.status().unwrap();
        assert_eq!(
            status.staged,
            vec![StatusEntry::new("tracked.txt", FileStatus::Modified)]
        );
        assert!(status.modified.is_empty());

        client.unstage_file("tracked.txt").unwrap();
        let status = client.status().unwrap();
        assert!(status.staged.is_empty());
        assert_eq!(status.modified.len(), 1);
    }

    #[test]
    fn stage_all_then_unstage_all() {
        let dir = init_repo();
        commit_file(dir.path(), "tracked.txt", "one\n", "first");
        fs::write(dir.path().join("tracked.txt"), "two\n").unwrap();
        fs::write(dir.path().join("new.txt"), "new\n").unwrap();
        let client = GitClient::discover(dir.path());

        client.stage_all().unwrap();
        let status = client.status().unwrap();
        assert_eq!(status.staged.len(), 2);
        assert!(status.untracked.is_empty());

        client.unstage_all().unwrap();
        let status = client.status().unwrap();
        assert!(status.staged.is_empty());
        assert_eq!(status.modified.len(), 1);
        assert_eq!(status.untracked.len(), 1);
    }

    #[test]
    fn discard_restores_file() {
        let dir = init_repo();
        commit_file(dir.path(), "tracked.txt", "one\n", "first");
        fs::write(dir.path().join("tracked.txt"), "changed\n").unwrap();
        let client = GitClient::discover(dir.path());

        client.discard_changes("tracked.txt").unwrap();
        let content = fs::read_to_string(dir.path().join("tracked.txt")).unwrap();
        assert_eq!(content, "one\n");
        assert!(client.status().unwrap().is_clean());
    }

    // --- Diff and tree ---

    #[test]
    fn commit_diff_has_header_and_patch() {
        let dir = init_repo();
        commit_file(dir.path(), "a.txt", "hello\n", "add greeting");
        let client = GitClient::discover(dir.path());
        let head = client.commits(&LogOptions::default()).unwrap().remove(0);

        let diff = client.commit_diff(&head.id).unwrap();
        assert!(diff.starts_with(&format!("commit {}", head.id)));
        assert!(diff.contains("Author: Test User <test@example.com>"));
        assert!(diff.contains("    add greeting"));
        assert!(diff.contains("diff --git a/a.txt b/a.txt"));
        assert!(diff.contains("+hello"));
    }

    #[test]
    fn commit_diff_unknown_id() {
        let dir = init_repo();
        commit_file(dir.path(), "a.txt", "a", "first");
        let client = GitClient::discover(dir.path());
        assert!(matches!(
            client.commit_diff("deadbeef"),
            Err(BackendError::NotFound(_))
        ));
    }

    #[test]
    fn tree_entries_directories_first() {
        let dir = init_repo();
        commit_file(dir.path(), "zebra.txt", "z", "one");
        commit_file(dir.path(), "src/main.rs", "fn main() {}", "two");
        let client = GitClient::discover(dir.path());

        let root = client.tree_entries("").unwrap();
        let names: Vec<&str> = root.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["src", "zebra.txt"]);
        assert!(root[0].is_dir);
        assert_eq!(root[1].size, Some(1));

        let src = client.tree_entries("src").unwrap();
        assert_eq!(src[0].path, "src/main.rs");
        assert!(matches!(
            client.tree_entries("missing"),
            Err(BackendError::NotFound(_))
        ));
    }
}
