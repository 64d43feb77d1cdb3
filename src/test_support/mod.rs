//! Test fixtures for linkpack unit tests.
//!
//! [`GitFixture`] builds a throwaway git repository in a temp directory so
//! the precondition, rewrite and restore paths can run against real files.

use std::path::{Path, PathBuf};

use git2::{IndexAddOption, Repository, Signature};
use tempfile::TempDir;

/// A temporary git repository.
pub struct GitFixture {
    _dir: TempDir,
    root: PathBuf,
    repo: Repository,
}

impl GitFixture {
    /// Create an empty repository.
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let root = dir.path().canonicalize().unwrap();
        let repo = Repository::init(&root).unwrap();
        GitFixture {
            _dir: dir,
            root,
            repo,
        }
    }

    /// Canonical repository root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write a file relative to the root, creating parent directories.
    pub fn write(&self, rel: &str, contents: &str) -> PathBuf {
        let path = self.root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, contents).unwrap();
        path
    }

    /// Read a file relative to the root.
    pub fn read(&self, rel: &str) -> String {
        std::fs::read_to_string(self.root.join(rel)).unwrap()
    }

    /// Write `packages/<name>/package.json`.
    pub fn add_package(&self, name: &str, manifest: &str) -> PathBuf {
        self.write(&format!("packages/{}/package.json", name), manifest)
    }

    /// Stage everything and commit it on HEAD.
    pub fn commit(&self, message: &str) {
        let mut index = self.repo.index().unwrap();
        index
            .add_all(["*"].iter(), IndexAddOption::DEFAULT, None)
            .unwrap();
        index.write().unwrap();

        let tree_id = index.write_tree().unwrap();
        let tree = self.repo.find_tree(tree_id).unwrap();
        let sig = Signature::now("linkpack", "linkpack@example.com").unwrap();

        let parent = self
            .repo
            .head()
            .ok()
            .and_then(|head| head.peel_to_commit().ok());
        let parents: Vec<_> = parent.iter().collect();

        self.repo
            .commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)
            .unwrap();
    }
}

impl Default for GitFixture {
    fn default() -> Self {
        Self::new()
    }
}
