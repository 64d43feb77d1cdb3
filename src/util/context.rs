//! Global context for linkpack operations.
//!
//! Resolves the workspace root from the current directory and loads the
//! configuration stored in the root manifest.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::util::config::Config;
use crate::util::git;

/// Global context containing configuration and paths.
#[derive(Debug, Clone)]
pub struct GlobalContext {
    /// Current working directory
    cwd: PathBuf,

    /// Working directory of the enclosing git repository
    root: PathBuf,

    /// Configuration from the root manifest
    config: Config,
}

impl GlobalContext {
    /// Create a context for the current working directory.
    pub fn new() -> Result<Self> {
        let cwd = std::env::current_dir().context("failed to get current directory")?;
        Self::with_cwd(cwd)
    }

    /// Create a context for a specific working directory.
    pub fn with_cwd(cwd: PathBuf) -> Result<Self> {
        let root = git::discover_root(&cwd)?;
        let config = Config::load_from_root(&root)?;

        Ok(GlobalContext { cwd, root, config })
    }

    /// Get the current working directory.
    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    /// Get the workspace root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Get the configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Pathspec covering every sub-package manifest.
    pub fn manifest_pathspec(&self) -> String {
        self.config.manifest_pathspec()
    }
}
