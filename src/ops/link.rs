//! Rewrite intra-workspace dependencies to `file:` references.
//!
//! For every sub-package, entries in `dependencies`, `devDependencies`,
//! `peerDependencies` and `optionalDependencies` that name another
//! sub-package are pointed at that sub-package's directory:
//!
//! ```text
//! "dependencies": { "pkgB": "^1.0.0" }  =>  "dependencies": { "pkgB": "file:/repo/packages/pkgB" }
//! ```
//!
//! Matches in `peerDependencies` and `optionalDependencies` are written to
//! `devDependencies` unless [`PeerRewrite::InPlace`] is configured.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde_json::Value;

use crate::core::manifest::{DependencyKind, Manifest, ManifestError};
use crate::core::transaction::Transaction;
use crate::core::Workspace;
use crate::util::config::PeerRewrite;
use crate::util::fs::display_relative;
use crate::util::shell::{Shell, Status};

/// The `file:` specifier pointing at a package directory.
pub fn file_spec(dir: &Path) -> String {
    format!("file:{}", dir.display())
}

/// A single rewritten dependency entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkedEntry {
    /// Section the match was found in.
    pub matched: DependencyKind,
    /// Section the `file:` reference was written to.
    pub written: DependencyKind,
    /// Dependency name.
    pub name: String,
    /// The `file:` specifier written.
    pub spec: String,
}

/// Result of linking one sub-package.
#[derive(Debug, Clone)]
pub struct LinkReport {
    pub package: String,
    pub manifest_path: PathBuf,
    pub entries: Vec<LinkedEntry>,
    /// Whether the manifest content differs from what was on disk.
    pub changed: bool,
}

// Entries whose value is falsy in JSON terms ("" or null, false, 0) are
// left alone.
fn is_set(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn target_section(matched: DependencyKind, policy: PeerRewrite) -> DependencyKind {
    match (matched, policy) {
        (DependencyKind::Peer | DependencyKind::Optional, PeerRewrite::DevDependencies) => {
            DependencyKind::Development
        }
        _ => matched,
    }
}

/// Rewrite one manifest in memory.
///
/// `package` is the sub-package owning the manifest; it is never linked to
/// itself. Returns the entries whose value actually changed, so a second
/// pass over the same manifest returns nothing.
pub fn rewrite_manifest(
    manifest: &mut Manifest,
    package: &str,
    ws: &Workspace,
    policy: PeerRewrite,
) -> Result<Vec<LinkedEntry>, ManifestError> {
    let mut entries = Vec::new();

    for (name, dir) in ws.packages().iter() {
        if name == package {
            continue;
        }

        for matched in DependencyKind::ALL {
            if !manifest.dependency(matched, name).is_some_and(is_set) {
                continue;
            }

            let written = target_section(matched, policy);
            let spec = file_spec(dir);
            let previous = manifest.set_dependency(written, name, spec.clone())?;

            if previous.as_ref().and_then(Value::as_str) != Some(spec.as_str()) {
                tracing::debug!(
                    "{}: {}.{} -> {}.{} = {}",
                    package,
                    matched,
                    name,
                    written,
                    name,
                    spec
                );
                entries.push(LinkedEntry {
                    matched,
                    written,
                    name: name.to_string(),
                    spec,
                });
            }
        }
    }

    Ok(entries)
}

/// Link every sub-package of the workspace, writing changed manifests in
/// place through the transaction.
pub fn link_workspace(
    ws: &Workspace,
    txn: &Transaction,
    shell: &Arc<Shell>,
    policy: PeerRewrite,
) -> Result<Vec<LinkReport>> {
    let mut reports = Vec::with_capacity(ws.packages().len());

    for (package, _) in ws.packages().iter() {
        let Some(manifest_path) = ws.manifest_path(package) else {
            continue;
        };

        let mut manifest = Manifest::load(&manifest_path)?;
        let entries = rewrite_manifest(&mut manifest, package, ws, policy)
            .with_context(|| format!("failed to link package `{}`", package))?;

        let changed = !entries.is_empty();
        let shown = display_relative(ws.root(), &manifest_path);

        if changed {
            txn.write(&manifest_path, || Ok(manifest.save()?))?;
            shell.status(
                Status::Linking,
                format!("{} ({} local dependencies)", shown, entries.len()),
            );
            for entry in &entries {
                shell.verbose(
                    Status::Info,
                    format!("{}.{} = {}", entry.written, entry.name, entry.spec),
                );
            }
        } else {
            shell.verbose(Status::Info, format!("{} has no local dependencies", shown));
        }

        reports.push(LinkReport {
            package: package.to_string(),
            manifest_path,
            entries,
            changed,
        });
    }

    Ok(reports)
}
