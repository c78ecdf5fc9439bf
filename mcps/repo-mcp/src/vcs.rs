//! Version-control queries
//!
//! The registry only needs two read-only answers from git, so the seam is a
//! small trait; [`GitRepository`] answers it with libgit2.

use chrono::{DateTime, TimeZone, Utc};
use git2::{Repository, Status, StatusOptions};

use crate::guard::Root;
use crate::types::{CommitInfo, FileStatus, StatusReport, VcsError};

pub trait VcsQuery: Send + Sync {
    fn status(&self) -> Result<StatusReport, VcsError>;

    /// Newest first, at most `max` entries
    fn log(&self, max: usize) -> Result<Vec<CommitInfo>, VcsError>;
}

/// Git repository discovered from the root
#[derive(Debug, Clone)]
pub struct GitRepository {
    root: Root,
}

impl GitRepository {
    pub fn new(root: Root) -> Self {
        Self { root }
    }

    fn open(&self) -> Result<Repository, VcsError> {
        Repository::discover(self.root.as_path())
            .map_err(|_| VcsError::RepoNotFound(self.root.as_path().display().to_string()))
    }
}

impl VcsQuery for GitRepository {
    fn status(&self) -> Result<StatusReport, VcsError> {
        let repo = self.open()?;

        let mut opts = StatusOptions::new();
        opts.include_untracked(true)
            .include_ignored(false)
            .include_unmodified(false);
        let statuses = repo.statuses(Some(&mut opts))?;

        let head = repo.head().ok();
        let branch = head.as_ref().and_then(|h| h.shorthand().map(String::from));
        let head_commit = head.and_then(|h| h.target()).map(|id| id.to_string());

        let mut report = StatusReport {
            branch,
            head_commit,
            is_clean: true,
            staged: Vec::new(),
            modified: Vec::new(),
            untracked: Vec::new(),
            conflicted: Vec::new(),
        };

        for entry in statuses.iter() {
            let path = entry.path().unwrap_or("").to_string();
            let status = entry.status();

            if status.is_conflicted() {
                report.conflicted.push(path);
                continue;
            }
            if status.is_wt_new() {
                report.untracked.push(path);
                continue;
            }

            if let Some(kind) = index_change(status) {
                let old_path = if status.is_index_renamed() {
                    entry
                        .head_to_index()
                        .and_then(|d| d.old_file().path().map(|p| p.to_string_lossy().to_string()))
                } else {
                    None
                };
                report.staged.push(FileStatus {
                    path: path.clone(),
                    status: kind.to_string(),
                    old_path,
                });
            }

            if let Some(kind) = worktree_change(status) {
                let old_path = if status.is_wt_renamed() {
                    entry
                        .index_to_workdir()
                        .and_then(|d| d.old_file().path().map(|p| p.to_string_lossy().to_string()))
                } else {
                    None
                };
                report.modified.push(FileStatus {
                    path,
                    status: kind.to_string(),
                    old_path,
                });
            }
        }

        report.is_clean = report.staged.is_empty()
            && report.modified.is_empty()
            && report.untracked.is_empty()
            && report.conflicted.is_empty();

        Ok(report)
    }

    fn log(&self, max: usize) -> Result<Vec<CommitInfo>, VcsError> {
        let repo = self.open()?;

        let mut revwalk = repo.revwalk()?;
        revwalk.push_head()?;
        revwalk.set_sorting(git2::Sort::TIME)?;

        let mut commits = Vec::new();
        for oid in revwalk.take(max) {
            let commit = repo.find_commit(oid?)?;
            commits.push(commit_to_info(&commit));
        }
        Ok(commits)
    }
}

fn index_change(status: Status) -> Option<&'static str> {
    if status.is_index_new() {
        Some("new")
    } else if status.is_index_modified() {
        Some("modified")
    } else if status.is_index_deleted() {
        Some("deleted")
    } else if status.is_index_renamed() {
        Some("renamed")
    } else if status.is_index_typechange() {
        Some("typechange")
    } else {
        None
    }
}

fn worktree_change(status: Status) -> Option<&'static str> {
    if status.is_wt_modified() {
        Some("modified")
    } else if status.is_wt_deleted() {
        Some("deleted")
    } else if status.is_wt_renamed() {
        Some("renamed")
    } else if status.is_wt_typechange() {
        Some("typechange")
    } else {
        None
    }
}

fn git_time_to_datetime(time: git2::Time) -> DateTime<Utc> {
    Utc.timestamp_opt(time.seconds(), 0)
        .single()
        .unwrap_or_else(Utc::now)
}

fn commit_to_info(commit: &git2::Commit) -> CommitInfo {
    let id = commit.id().to_string();
    CommitInfo {
        short_id: id.chars().take(7).collect(),
        id,
        message: commit.message().unwrap_or("").to_string(),
        author_name: commit.author().name().unwrap_or("").to_string(),
        author_email: commit.author().email().unwrap_or("").to_string(),
        date: git_time_to_datetime(commit.author().when()),
        parent_ids: commit.parent_ids().map(|id| id.to_string()).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use git2::Signature;
    use std::path::Path;
    use tempfile::TempDir;

    fn commit_file(repo: &Repository, dir: &Path, name: &str, message: &str) {
        std::fs::write(dir.join(name), message).unwrap();
        let mut index = repo.index().unwrap();
        index.add_path(Path::new(name)).unwrap();
        index.write().unwrap();
        let tree_id = index.write_tree().unwrap();
        let tree = repo.find_tree(tree_id).unwrap();
        let sig = Signature::now("Test", "test@example.com").unwrap();
        let parent = repo.head().ok().and_then(|h| h.peel_to_commit().ok());
        let parents: Vec<&git2::Commit> = parent.iter().collect();
        repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)
            .unwrap();
    }

    fn repo_with_history() -> (TempDir, GitRepository) {
        let dir = TempDir::new().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        commit_file(&repo, dir.path(), "a.txt", "first");
        commit_file(&repo, dir.path(), "b.txt", "second");
        commit_file(&repo, dir.path(), "c.txt", "third");
        let root = Root::new(dir.path()).unwrap();
        (dir, GitRepository::new(root))
    }

    #[test]
    fn test_log_is_newest_first_and_limited() {
        let (_dir, git) = repo_with_history();

        let commits = git.log(2).unwrap();
        assert_eq!(commits.len(), 2);
        assert_eq!(commits[0].message, "third");
        assert_eq!(commits[0].short_id.len(), 7);
        assert_eq!(commits[0].parent_ids.len(), 1);
    }

    #[test]
    fn test_status_reports_untracked_and_modified() {
        let (dir, git) = repo_with_history();
        assert!(git.status().unwrap().is_clean);

        std::fs::write(dir.path().join("a.txt"), "changed").unwrap();
        std::fs::write(dir.path().join("new.txt"), "fresh").unwrap();

        let status = git.status().unwrap();
        assert!(!status.is_clean);
        assert_eq!(status.untracked, vec!["new.txt".to_string()]);
        assert_eq!(status.modified.len(), 1);
        assert_eq!(status.modified[0].path, "a.txt");
        assert!(status.head_commit.is_some());
    }

    #[test]
    fn test_outside_a_repository() {
        let dir = TempDir::new().unwrap();
        let git = GitRepository::new(Root::new(dir.path()).unwrap());
        // A temp dir may sit below some unrelated checkout; only assert when it does not
        if Repository::discover(dir.path()).is_err() {
            assert!(matches!(git.status(), Err(VcsError::RepoNotFound(_))));
        }
    }
}
