use crate::error::{DevMetricsError, Result};
use crate::model::{CommitData, SnapshotData};
use chrono::DateTime;
use gix::object::tree::diff::ChangeDetached;
use gix::{discover, ObjectId, Repository};
use indicatif::{ProgressBar, ProgressStyle};
use similar::{ChangeTag, TextDiff};
use std::collections::{BinaryHeap, HashSet};
use std::path::{Path, PathBuf};
use tracing::debug;

pub const DEFAULT_COMMIT_LIMIT: usize = 100;

pub struct GitRepo {
    repo: Repository,
    path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct FileChange {
    path: String,
    added: u64,
    removed: u64,
}

impl GitRepo {
    /// Open a repository at `path`, or current dir if `None`
    pub fn open<P: AsRef<Path>>(path: Option<P>) -> Result<Self> {
        let repo_path = match path {
            Some(p) => p.as_ref().to_path_buf(),
            None => std::env::current_dir()?,
        };

        let repo = discover(&repo_path)?;
        let path = repo.workdir().unwrap_or_else(|| repo.path()).to_path_buf();

        Ok(Self { repo, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Name from `remote.origin.url`, else the working directory's name.
    pub fn repository_name(&self) -> String {
        let remote = self
            .repo
            .config_snapshot()
            .string("remote.origin.url")
            .map(|url| url.to_string());

        remote
            .as_deref()
            .and_then(name_from_remote_url)
            .or_else(|| {
                self.path
                    .file_name()
                    .map(|name| name.to_string_lossy().to_string())
            })
            .unwrap_or_else(|| "repository".to_string())
    }

    /// Newest-first walk from HEAD producing at most `limit` commits.
    pub fn collect_snapshot(&self, limit: usize) -> Result<SnapshotData> {
        let mut head = self.repo.head()?;
        let head_commit = head.peel_to_commit_in_place()?;

        let mut queue: BinaryHeap<(i64, ObjectId)> = BinaryHeap::new();
        let mut seen: HashSet<ObjectId> = HashSet::new();
        queue.push((head_commit.time()?.seconds, head_commit.id));
        seen.insert(head_commit.id);

        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {msg} [{pos}]")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message("Reading commits...");

        let mut commits = Vec::new();
        while let Some((_, commit_id)) = queue.pop() {
            if commits.len() >= limit {
                break;
            }

            let commit = self.repo.find_commit(commit_id)?;
            let parents: Vec<ObjectId> = commit.parent_ids().map(|id| id.into()).collect();
            for pid in &parents {
                if seen.insert(*pid) {
                    let parent_secs = self.repo.find_commit(*pid)?.time()?.seconds;
                    queue.push((parent_secs, *pid));
                }
            }

            // committer time orders the walk; the record carries the author time
            let author = commit.author()?;
            let secs = author
                .time()
                .map_err(|e| DevMetricsError::InvalidDate(format!("Invalid author time on {commit_id}: {e}")))?
                .seconds;
            let timestamp = DateTime::from_timestamp(secs, 0)
                .ok_or_else(|| DevMetricsError::InvalidDate(format!("Invalid timestamp: {secs}")))?;
            let changes = self.commit_changes(commit_id, parents.first().copied())?;

            commits.push(CommitData {
                hash: commit_id.to_string(),
                author: author.name.to_string(),
                email: author.email.to_string(),
                timestamp,
                lines_added: changes.iter().map(|c| c.added).sum(),
                lines_removed: changes.iter().map(|c| c.removed).sum(),
                files_modified: changes.into_iter().map(|c| c.path).collect(),
            });
            pb.inc(1);
        }

        pb.finish_and_clear();
        debug!(commits = commits.len(), "snapshot collected");

        Ok(SnapshotData {
            repository: self.repository_name(),
            commits,
        })
    }

    fn commit_changes(&self, commit_id: ObjectId, parent_id: Option<ObjectId>) -> Result<Vec<FileChange>> {
        let commit_tree = self.repo.find_commit(commit_id)?.tree()?;
        let parent_tree = match parent_id {
            Some(pid) => Some(self.repo.find_commit(pid)?.tree()?),
            None => None,
        };

        let changes: Vec<ChangeDetached> =
            self.repo
                .diff_tree_to_tree(parent_tree.as_ref(), Some(&commit_tree), None)?;

        Ok(changes
            .into_iter()
            // directories show up as their own entries; list files only
            .filter(|c| !c.entry_mode().is_tree())
            .map(|c| self.file_change(c))
            .collect())
    }

    fn file_change(&self, change: ChangeDetached) -> FileChange {
        let (path, old_id, new_id) = match change {
            ChangeDetached::Addition { id, location, .. } => (location, None, Some(id)),
            ChangeDetached::Deletion { id, location, .. } => (location, Some(id), None),
            ChangeDetached::Modification {
                previous_id,
                id,
                location,
                ..
            } => (location, Some(previous_id), Some(id)),
            ChangeDetached::Rewrite {
                source_id,
                id,
                location,
                ..
            } => (location, Some(source_id), Some(id)),
        };

        let old = old_id.and_then(|id| self.blob_text(id));
        let new = new_id.and_then(|id| self.blob_text(id));
        // binary content is listed with zero line counts
        let (added, removed) = match (old, new) {
            (Some(Blob::Text(old)), Some(Blob::Text(new))) => line_diff(&old, &new),
            (None, Some(Blob::Text(new))) => (new.lines().count() as u64, 0),
            (Some(Blob::Text(old)), None) => (0, old.lines().count() as u64),
            _ => (0, 0),
        };

        FileChange {
            path: path.to_string(),
            added,
            removed,
        }
    }

    fn blob_text(&self, id: ObjectId) -> Option<Blob> {
        let object = self.repo.find_object(id).ok()?;
        let data = object.data.as_slice();
        if data.iter().take(8192).any(|&b| b == 0) {
            return Some(Blob::Binary);
        }
        Some(Blob::Text(String::from_utf8_lossy(data).into_owned()))
    }
}

enum Blob {
    Text(String),
    Binary,
}

fn line_diff(old: &str, new: &str) -> (u64, u64) {
    let diff = TextDiff::from_lines(old, new);
    let mut added = 0;
    let mut removed = 0;
    for change in diff.iter_all_changes() {
        match change.tag() {
            ChangeTag::Insert => added += 1,
            ChangeTag::Delete => removed += 1,
            ChangeTag::Equal => {}
        }
    }
    (added, removed)
}

fn name_from_remote_url(url: &str) -> Option<String> {
    let last = url
        .trim_end_matches('/')
        .rsplit(['/', ':'])
        .next()?;
    let name = last.strip_suffix(".git").unwrap_or(last);
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}
