//! Workspace - the monorepo root and its sub-packages.
//!
//! A Workspace is the explicit, read-only context threaded through the
//! scanner and the rewriter: the root directory, the packages directory,
//! and the package map discovered one level below it.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::util::fs::normalize_path;
use crate::util::Config;

/// Mapping from sub-package directory name to its absolute directory.
///
/// Iteration is sorted by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageMap {
    packages: BTreeMap<String, PathBuf>,
}

impl PackageMap {
    /// Create an empty package map.
    pub fn new() -> Self {
        PackageMap::default()
    }

    /// Record a sub-package.
    pub fn insert(&mut self, name: impl Into<String>, dir: impl Into<PathBuf>) {
        self.packages.insert(name.into(), dir.into());
    }

    /// Directory of a sub-package.
    pub fn get(&self, name: &str) -> Option<&Path> {
        self.packages.get(name).map(PathBuf::as_path)
    }

    /// Iterate over `(name, dir)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Path)> {
        self.packages
            .iter()
            .map(|(name, dir)| (name.as_str(), dir.as_path()))
    }

    /// Sub-package names.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.packages.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }
}

/// Find every immediate subdirectory of `packages_dir` that holds a
/// manifest file. Does not recurse and does not look inside manifests.
pub fn scan_packages(packages_dir: &Path, manifest_name: &str) -> Result<PackageMap> {
    let mut map = PackageMap::new();

    let entries = std::fs::read_dir(packages_dir).with_context(|| {
        format!(
            "failed to read packages directory: {}",
            packages_dir.display()
        )
    })?;

    for entry in entries {
        let entry = entry?;
        let dir = entry.path();

        if !dir.join(manifest_name).is_file() {
            continue;
        }

        match entry.file_name().into_string() {
            Ok(name) => map.insert(name, dir),
            Err(name) => tracing::warn!("skipping package with non-UTF-8 name: {:?}", name),
        }
    }

    Ok(map)
}

/// The monorepo being linked.
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
    packages_dir: PathBuf,
    manifest_name: String,
    packages: PackageMap,
}

impl Workspace {
    /// Scan the packages directory under `root`.
    pub fn scan(root: &Path, config: &Config) -> Result<Self> {
        let root = normalize_path(root);
        let packages_dir = root.join(&config.packages_dir);
        let packages = scan_packages(&packages_dir, &config.manifest)?;

        tracing::debug!(
            "found {} packages in {}",
            packages.len(),
            packages_dir.display()
        );

        Ok(Workspace {
            root,
            packages_dir,
            manifest_name: config.manifest.clone(),
            packages,
        })
    }

    /// Build a workspace from an already known package map.
    pub fn from_parts(
        root: impl Into<PathBuf>,
        packages_dir: impl Into<PathBuf>,
        manifest_name: impl Into<String>,
        packages: PackageMap,
    ) -> Self {
        Workspace {
            root: root.into(),
            packages_dir: packages_dir.into(),
            manifest_name: manifest_name.into(),
            packages,
        }
    }

    /// Workspace root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding the sub-packages.
    pub fn packages_dir(&self) -> &Path {
        &self.packages_dir
    }

    /// The package map.
    pub fn packages(&self) -> &PackageMap {
        &self.packages
    }

    /// Directory of a sub-package.
    pub fn package_dir(&self, name: &str) -> Option<&Path> {
        self.packages.get(name)
    }

    /// Manifest path of a sub-package.
    pub fn manifest_path(&self, name: &str) -> Option<PathBuf> {
        self.packages
            .get(name)
            .map(|dir| dir.join(&self.manifest_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(path: &Path) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, "{}").unwrap();
    }

    #[test]
    fn test_scan_finds_exactly_packages_with_manifest() {
        let tmp = TempDir::new().unwrap();
        let packages = tmp.path().join("packages");

        touch(&packages.join("pkgA/package.json"));
        touch(&packages.join("pkgB/package.json"));
        std::fs::create_dir_all(packages.join("no-manifest/src")).unwrap();
        touch(&packages.join("nested/inner/package.json"));
        touch(&packages.join("stray-file.json"));

        let map = scan_packages(&packages, "package.json").unwrap();
        let names: Vec<_> = map.names().collect();
        assert_eq!(names, ["pkgA", "pkgB"]);
        assert_eq!(map.get("pkgA"), Some(packages.join("pkgA").as_path()));
        assert!(map.get("nested").is_none());
    }

    #[test]
    fn test_scan_empty_and_missing() {
        let tmp = TempDir::new().unwrap();
        let packages = tmp.path().join("packages");
        std::fs::create_dir_all(&packages).unwrap();

        assert!(scan_packages(&packages, "package.json").unwrap().is_empty());
        assert!(scan_packages(&tmp.path().join("missing"), "package.json").is_err());
    }

    #[test]
    fn test_workspace_paths() {
        let tmp = TempDir::new().unwrap();
        touch(&tmp.path().join("packages/pkgA/package.json"));

        let ws = Workspace::scan(tmp.path(), &Config::default()).unwrap();
        let root = normalize_path(tmp.path());

        assert_eq!(ws.root(), root);
        assert_eq!(ws.packages_dir(), root.join("packages"));
        assert_eq!(
            ws.manifest_path("pkgA"),
            Some(root.join("packages/pkgA/package.json"))
        );
        assert!(ws.package_dir("pkgA").unwrap().is_absolute());
        assert_eq!(ws.manifest_path("missing"), None);
    }
}
