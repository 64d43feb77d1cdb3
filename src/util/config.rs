//! Configuration for linkpack.
//!
//! Configuration lives in an optional `"linkpack"` object inside the
//! workspace root `package.json`, so no separate file format is needed:
//!
//! ```json
//! {
//!   "name": "my-monorepo",
//!   "linkpack": {
//!     "scriptsPackage": "ccws-scripts",
//!     "generatorPackage": "create-ccws",
//!     "peerRewrite": "in-place"
//!   }
//! }
//! ```
//!
//! Every key is optional; missing keys fall back to the defaults below.

use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::manifest::MANIFEST_NAME;

/// Key of the configuration object in the root manifest.
pub const CONFIG_KEY: &str = "linkpack";

/// Where a matching peer or optional dependency gets rewritten.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PeerRewrite {
    /// Write the `file:` reference into `devDependencies`, leaving the
    /// peer/optional entry untouched.
    #[default]
    DevDependencies,
    /// Rewrite the matching peer/optional entry itself.
    InPlace,
}

/// linkpack configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
    /// Directory holding the sub-packages, relative to the workspace root.
    pub packages_dir: String,

    /// Manifest file name inside each sub-package.
    pub manifest: String,

    /// Sub-package that gets packed into an archive.
    pub scripts_package: String,

    /// Sub-package whose entry point is run against the archive.
    pub generator_package: String,

    /// Entry point inside the generator package.
    pub generator_entry: String,

    /// Program used to run the generator entry point.
    pub runtime: String,

    /// Packager command line, run inside the scripts package.
    pub pack_command: Vec<String>,

    /// Option name carrying the archive path to the generator.
    pub archive_flag: String,

    /// Rewrite target for peer and optional dependencies.
    pub peer_rewrite: PeerRewrite,

    /// Require the archive to be a gzipped tarball with a `package/package.json`.
    pub verify_archive: bool,

    /// Enable debug logging.
    pub verbose: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            packages_dir: "packages".to_string(),
            manifest: MANIFEST_NAME.to_string(),
            scripts_package: "ccws-scripts".to_string(),
            generator_package: "create-ccws".to_string(),
            generator_entry: "index.js".to_string(),
            runtime: "node".to_string(),
            pack_command: vec!["npm".to_string(), "pack".to_string()],
            archive_flag: "--script-version".to_string(),
            peer_rewrite: PeerRewrite::default(),
            verify_archive: true,
            verbose: false,
        }
    }
}

impl Config {
    /// Load configuration from the root manifest of a workspace.
    ///
    /// A missing manifest or a manifest without a `"linkpack"` key yields the
    /// default configuration.
    pub fn load_from_root(root: &Path) -> Result<Self> {
        let path = root.join(MANIFEST_NAME);
        if !path.is_file() {
            tracing::debug!("no root manifest at {}, using defaults", path.display());
            return Ok(Config::default());
        }

        let contents = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read root manifest: {}", path.display()))?;
        let doc: Value = serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse root manifest: {}", path.display()))?;

        let config = match doc.get(CONFIG_KEY) {
            Some(value) => Self::from_value(value.clone())
                .with_context(|| format!("invalid `{}` section in {}", CONFIG_KEY, path.display()))?,
            None => Config::default(),
        };

        Ok(config)
    }

    /// Build a configuration from the `"linkpack"` JSON value.
    pub fn from_value(value: Value) -> Result<Self> {
        let config: Config = serde_json::from_value(value)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.pack_command.is_empty() {
            bail!("`packCommand` must name at least a program");
        }
        if self.packages_dir.trim().is_empty() {
            bail!("`packagesDir` must not be empty");
        }
        if self.manifest.contains(['/', '\\']) {
            bail!("`manifest` must be a file name, got `{}`", self.manifest);
        }
        Ok(())
    }

    /// Program and arguments of the packager command.
    pub fn pack_program(&self) -> (&str, &[String]) {
        match self.pack_command.split_first() {
            Some((program, args)) => (program.as_str(), args),
            None => ("npm", &[]),
        }
    }

    /// Pathspec matching every sub-package manifest, relative to the
    /// workspace root.
    pub fn manifest_pathspec(&self) -> String {
        let dir = self.packages_dir.replace('\\', "/");
        format!("{}/*/{}", dir.trim_end_matches('/'), self.manifest)
    }
}
