//! Historical layer from the version-control collaborator.
//!
//! Shells out to `git` for the current branch, recent commits, and
//! uncommitted paths. Any failure here (no git, no repo, hostile exit
//! code) degrades to "no historical context available" rather than an
//! error; the rest of the snapshot is still useful without it.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::debug;

use crate::context::types::{CommitInfo, HistoryContext};

/// Version-control collaborator seam. The default implementation shells
/// out to git; tests substitute a fixed provider.
#[async_trait]
pub trait GitHistoryProvider: Send + Sync {
    /// Gather the history layer, or `None` when no repository is usable.
    async fn gather(&self, root: &Path, max_commits: usize) -> Option<HistoryContext>;
}

/// Field separator for the commit log format string.
const LOG_FIELD_SEP: &str = "\x1f";

/// `git` CLI provider.
pub struct GitCli;

impl GitCli {
    async fn run_git(root: &Path, args: &[&str]) -> Option<String> {
        let output = Command::new("git")
            .args(args)
            .current_dir(root)
            .output()
            .await
            .ok()?;
        if !output.status.success() {
            debug!("git {:?} exited with {}", args, output.status);
            return None;
        }
        Some(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl GitHistoryProvider for GitCli {
    async fn gather(&self, root: &Path, max_commits: usize) -> Option<HistoryContext> {
        let branch = Self::run_git(root, &["rev-parse", "--abbrev-ref", "HEAD"])
            .await
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())?;

        let log_format = format!("%H{sep}%s{sep}%an{sep}%aI", sep = LOG_FIELD_SEP);
        let count_arg = format!("-{}", max_commits.max(1));
        let recent_commits = Self::run_git(
            root,
            &["log", &count_arg, &format!("--format={}", log_format)],
        )
        .await
        .map(|out| parse_log_output(&out))
        .unwrap_or_default();

        let uncommitted_files = Self::run_git(root, &["status", "--porcelain"])
            .await
            .map(|out| parse_status_output(&out))
            .unwrap_or_default();

        Some(HistoryContext {
            branch: Some(branch),
            recent_commits,
            uncommitted_files,
        })
    }
}

fn parse_log_output(output: &str) -> Vec<CommitInfo> {
    output
        .lines()
        .filter_map(|line| {
            let mut fields = line.split(LOG_FIELD_SEP);
            let hash = fields.next()?.trim();
            if hash.is_empty() {
                return None;
            }
            let message = fields.next()?.to_string();
            let author = fields.next()?.to_string();
            let date = fields
                .next()
                .and_then(|d| DateTime::parse_from_rfc3339(d.trim()).ok())
                .map(|d| d.with_timezone(&Utc))
                .unwrap_or_else(Utc::now);
            Some(CommitInfo {
                hash: hash.to_string(),
                message,
                author,
                date,
            })
        })
        .collect()
}

fn parse_status_output(output: &str) -> Vec<String> {
    output
        .lines()
        .filter_map(|line| {
            // Porcelain format: two status columns, a space, then the path.
            let path = line.get(3..)?.trim();
            if path.is_empty() {
                return None;
            }
            // Renames read "old -> new"; keep the new path.
            let path = path.rsplit(" -> ").next().unwrap_or(path);
            Some(path.trim_matches('"').replace('\\', "/"))
        })
        .collect()
}

/// Fixed provider for tests and for callers that already hold the data.
pub struct StaticHistory(pub Option<HistoryContext>);

#[async_trait]
impl GitHistoryProvider for StaticHistory {
    async fn gather(&self, _root: &Path, _max_commits: usize) -> Option<HistoryContext> {
        self.0.clone()
    }
}

/// Locate the repository root by walking upward looking for `.git`.
pub fn find_repo_root(start: &Path) -> Option<PathBuf> {
    let mut current = if start.is_dir() {
        start
    } else {
        start.parent()?
    };
    loop {
        if current.join(".git").exists() {
            return Some(current.to_path_buf());
        }
        current = current.parent()?;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_log_output() {
        let sep = LOG_FIELD_SEP;
        let out = format!(
            "abc123{sep}Fix parser{sep}Alice{sep}2026-01-02T03:04:05+00:00\n\
             def456{sep}Add tests{sep}Bob{sep}2026-01-01T00:00:00+00:00\n"
        );
        let commits = parse_log_output(&out);
        assert_eq!(commits.len(), 2);
        assert_eq!(commits[0].hash, "abc123");
        assert_eq!(commits[0].message, "Fix parser");
        assert_eq!(commits[0].author, "Alice");
        assert_eq!(commits[1].hash, "def456");
    }

    #[test]
    fn test_parse_status_output() {
        let out = " M src/lib.rs\n?? notes.txt\nR  old.rs -> new.rs\n";
        let files = parse_status_output(out);
        assert_eq!(files, vec!["src/lib.rs", "notes.txt", "new.rs"]);
    }

    #[test]
    fn test_find_repo_root() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let nested = temp_dir.path().join("a/b/c");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::create_dir(temp_dir.path().join(".git")).unwrap();
        assert_eq!(
            find_repo_root(&nested).unwrap(),
            temp_dir.path().to_path_buf()
        );
    }

    #[tokio::test]
    async fn test_gather_outside_repo_is_none() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        // Not a git repository: the layer must simply be absent.
        let history = GitCli.gather(temp_dir.path(), 5).await;
        assert!(history.is_none());
    }
}
