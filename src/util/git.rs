//! Git integration: repository discovery, the clean-tree precondition and
//! manifest restoration.
//!
//! The committed state of the repository is the only undo log linkpack
//! keeps. Restoring therefore means checking the manifests out of the
//! index again, which is why a run refuses to start on a dirty tree.

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::Context;
use git2::build::CheckoutBuilder;
use git2::{Repository, Status, StatusOptions};
use thiserror::Error;

use crate::core::transaction::Restore;
use crate::util::fs::normalize_path;

/// Version-control errors.
#[derive(Debug, Error)]
pub enum VcsError {
    #[error("no git repository found at or above {}", path.display())]
    NotARepository {
        path: PathBuf,
        #[source]
        source: git2::Error,
    },

    #[error("git repository at {} has no working directory", path.display())]
    Bare { path: PathBuf },

    #[error("please commit your change: `git status` is not empty ({} entries)", entries.len())]
    DirtyTree { entries: Vec<StatusEntry> },

    #[error(transparent)]
    Git(#[from] git2::Error),
}

/// One line of `git status --porcelain`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusEntry {
    pub path: String,
    pub status: Status,
}

impl StatusEntry {
    /// Two-letter porcelain code, e.g. `M `, ` M`, `??`.
    pub fn code(&self) -> String {
        porcelain_code(self.status)
    }
}

impl fmt::Display for StatusEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.code(), self.path)
    }
}

fn porcelain_code(status: Status) -> String {
    if status.is_conflicted() {
        return "UU".to_string();
    }
    if status == Status::WT_NEW {
        return "??".to_string();
    }

    let index = if status.is_index_new() {
        'A'
    } else if status.is_index_modified() {
        'M'
    } else if status.is_index_deleted() {
        'D'
    } else if status.is_index_renamed() {
        'R'
    } else if status.is_index_typechange() {
        'T'
    } else {
        ' '
    };

    let worktree = if status.is_wt_modified() {
        'M'
    } else if status.is_wt_deleted() {
        'D'
    } else if status.is_wt_renamed() {
        'R'
    } else if status.is_wt_typechange() {
        'T'
    } else if status.is_wt_new() {
        '?'
    } else {
        ' '
    };

    format!("{}{}", index, worktree)
}

/// Find the working directory of the repository containing `start`.
pub fn discover_root(start: &Path) -> Result<PathBuf, VcsError> {
    let repo = Repository::discover(start).map_err(|source| VcsError::NotARepository {
        path: start.to_path_buf(),
        source,
    })?;

    let workdir = repo.workdir().ok_or_else(|| VcsError::Bare {
        path: repo.path().to_path_buf(),
    })?;

    Ok(normalize_path(workdir))
}

/// Pending changes in the working tree, the way `git status --porcelain`
/// lists them: untracked files count, ignored files do not.
pub fn status_entries(root: &Path) -> Result<Vec<StatusEntry>, VcsError> {
    let repo = Repository::open(root)?;

    let mut opts = StatusOptions::new();
    opts.include_untracked(true)
        .recurse_untracked_dirs(false)
        .include_ignored(false)
        .renames_head_to_index(true);

    let statuses = repo.statuses(Some(&mut opts))?;

    let entries = statuses
        .iter()
        .filter(|entry| entry.status() != Status::CURRENT && !entry.status().is_ignored())
        .map(|entry| StatusEntry {
            path: String::from_utf8_lossy(entry.path_bytes()).into_owned(),
            status: entry.status(),
        })
        .collect();

    Ok(entries)
}

/// Fail with [`VcsError::DirtyTree`] unless the working tree is clean.
pub fn ensure_clean(root: &Path) -> Result<(), VcsError> {
    let entries = status_entries(root)?;
    if entries.is_empty() {
        Ok(())
    } else {
        Err(VcsError::DirtyTree { entries })
    }
}

/// Restores every file matching a pathspec from the index, discarding
/// working-tree changes. Equivalent to `git checkout -- <pathspec>`.
#[derive(Debug, Clone)]
pub struct GitRestore {
    root: PathBuf,
    pathspec: String,
}

impl GitRestore {
    pub fn new(root: impl Into<PathBuf>, pathspec: impl Into<String>) -> Self {
        GitRestore {
            root: root.into(),
            pathspec: pathspec.into(),
        }
    }
}

impl Restore for GitRestore {
    fn restore(&self) -> anyhow::Result<()> {
        // Opened fresh: `Repository` is not `Sync`, and the restore may run on
        // the interrupt handler thread.
        let repo = Repository::open(&self.root)
            .with_context(|| format!("failed to open repository at {}", self.root.display()))?;

        let mut checkout = CheckoutBuilder::new();
        checkout.force().path(self.pathspec.as_str());

        repo.checkout_index(None, Some(&mut checkout))
            .with_context(|| format!("failed to check out `{}`", self.pathspec))?;

        tracing::debug!("checked out {} in {}", self.pathspec, self.root.display());
        Ok(())
    }

    fn describe(&self) -> String {
        format!("git checkout -- {}", self.pathspec)
    }
}
