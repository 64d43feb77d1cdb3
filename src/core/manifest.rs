//! `package.json` manifest loading, editing and persistence.
//!
//! Manifests are held as an ordered JSON object rather than a typed struct,
//! so fields this tool never touches survive a rewrite unchanged and in
//! their original order.

use std::fmt;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use thiserror::Error;

/// Default manifest file name for a sub-package.
pub const MANIFEST_NAME: &str = "package.json";

/// Errors raised while reading, editing or writing a manifest.
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("failed to read manifest {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse manifest {}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("manifest {} is not a JSON object", path.display())]
    NotAnObject { path: PathBuf },

    #[error("`{section}` in {} is not an object", path.display())]
    SectionNotObject { path: PathBuf, section: &'static str },

    #[error("failed to serialize manifest {}", path.display())]
    Serialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to write manifest {}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// One of the four dependency sections of a manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DependencyKind {
    /// `dependencies`
    Normal,
    /// `devDependencies`
    Development,
    /// `peerDependencies`
    Peer,
    /// `optionalDependencies`
    Optional,
}

impl DependencyKind {
    /// All sections, in the order they are visited when rewriting.
    pub const ALL: [DependencyKind; 4] = [
        DependencyKind::Normal,
        DependencyKind::Development,
        DependencyKind::Peer,
        DependencyKind::Optional,
    ];

    /// The JSON key of this section.
    pub fn key(&self) -> &'static str {
        match self {
            DependencyKind::Normal => "dependencies",
            DependencyKind::Development => "devDependencies",
            DependencyKind::Peer => "peerDependencies",
            DependencyKind::Optional => "optionalDependencies",
        }
    }
}

impl fmt::Display for DependencyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// A parsed `package.json`.
#[derive(Debug, Clone, PartialEq)]
pub struct Manifest {
    path: PathBuf,
    doc: Map<String, Value>,
    trailing_newline: bool,
}

impl Manifest {
    /// Load a manifest from disk.
    pub fn load(path: &Path) -> Result<Self, ManifestError> {
        let content = std::fs::read_to_string(path).map_err(|source| ManifestError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(path, &content)
    }

    /// Parse manifest content that was read from `path`.
    pub fn parse(path: &Path, content: &str) -> Result<Self, ManifestError> {
        let value: Value = serde_json::from_str(content).map_err(|source| ManifestError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        let Value::Object(doc) = value else {
            return Err(ManifestError::NotAnObject {
                path: path.to_path_buf(),
            });
        };

        Ok(Manifest {
            path: path.to_path_buf(),
            doc,
            trailing_newline: content.ends_with('\n'),
        })
    }

    /// Path the manifest was loaded from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The `name` field, if present and a string.
    pub fn name(&self) -> Option<&str> {
        self.doc.get("name").and_then(Value::as_str)
    }

    /// The `version` field, if present and a string.
    pub fn version(&self) -> Option<&str> {
        self.doc.get("version").and_then(Value::as_str)
    }

    /// Get a dependency section, if present and an object.
    pub fn dependencies(&self, kind: DependencyKind) -> Option<&Map<String, Value>> {
        self.doc.get(kind.key()).and_then(Value::as_object)
    }

    /// Get a single dependency entry.
    pub fn dependency(&self, kind: DependencyKind, name: &str) -> Option<&Value> {
        self.dependencies(kind).and_then(|deps| deps.get(name))
    }

    /// Set a dependency entry, creating the section at the end of the
    /// document if it does not exist yet.
    ///
    /// Returns the previous value of the entry.
    pub fn set_dependency(
        &mut self,
        kind: DependencyKind,
        name: &str,
        spec: impl Into<String>,
    ) -> Result<Option<Value>, ManifestError> {
        let section = self
            .doc
            .entry(kind.key())
            .or_insert_with(|| Value::Object(Map::new()));

        let Value::Object(deps) = section else {
            return Err(ManifestError::SectionNotObject {
                path: self.path.clone(),
                section: kind.key(),
            });
        };

        Ok(deps.insert(name.to_string(), Value::String(spec.into())))
    }

    /// Serialize with 2-space indentation, keeping the original file's
    /// trailing newline if it had one.
    pub fn to_json_string(&self) -> Result<String, ManifestError> {
        let mut out =
            serde_json::to_string_pretty(&self.doc).map_err(|source| ManifestError::Serialize {
                path: self.path.clone(),
                source,
            })?;
        if self.trailing_newline {
            out.push('\n');
        }
        Ok(out)
    }

    /// Write the manifest back to the path it was loaded from.
    pub fn save(&self) -> Result<(), ManifestError> {
        let contents = self.to_json_string()?;
        std::fs::write(&self.path, contents).map_err(|source| {
            ManifestError::Write {
                path: self.path.clone(),
                source,
            }
        })
    }
}
