//! Packaging step: turn the scripts package into a distributable archive.
//!
//! The packager (`npm pack` by default) runs inside the package directory
//! and prints the archive file name as the last line of its stdout.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use flate2::read::GzDecoder;
use semver::Version;

use crate::core::manifest::Manifest;
use crate::util::process::ProcessBuilder;
use crate::util::shell::{format_duration, Shell, Status};

/// Entry every packed archive must contain.
pub const ARCHIVE_MANIFEST: &str = "package/package.json";

/// How to invoke the packager.
#[derive(Debug, Clone)]
pub struct PackOptions {
    /// Resolved packager program.
    pub program: PathBuf,
    /// Packager arguments.
    pub args: Vec<String>,
    /// Manifest file name inside the package.
    pub manifest: String,
    /// Require the archive to be a gzipped tarball with a package manifest.
    pub verify: bool,
}

/// An archive produced by the packager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackedArchive {
    /// Absolute path of the archive.
    pub path: PathBuf,
    /// Number of entries, if the archive was verified.
    pub entries: Option<usize>,
}

/// Archive name the packager is expected to produce for a package:
/// `<name>-<version>.tgz`, with `@scope/name` flattened to `scope-name`.
pub fn expected_archive_name(name: &str, version: &str) -> Result<String> {
    let version = Version::parse(version.trim().trim_start_matches(['v', '=']))
        .with_context(|| format!("`{}` is not a valid version", version))?;

    let flat = name.trim_start_matches('@').replace('/', "-");
    Ok(format!("{}-{}.tgz", flat, version))
}

/// Archive file name reported by the packager: its last non-empty stdout line.
pub fn parse_pack_output(stdout: &str) -> Option<&str> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .last()
}

/// Count the entries of a gzipped tarball, requiring [`ARCHIVE_MANIFEST`].
pub fn inspect_archive(path: &Path) -> Result<usize> {
    let file = File::open(path)
        .with_context(|| format!("failed to open archive: {}", path.display()))?;
    let mut archive = tar::Archive::new(GzDecoder::new(file));

    let mut count = 0;
    let mut has_manifest = false;
    for entry in archive
        .entries()
        .with_context(|| format!("failed to read archive: {}", path.display()))?
    {
        let entry = entry.with_context(|| format!("corrupt archive: {}", path.display()))?;
        let entry_path = entry.path()?;
        if entry_path == Path::new(ARCHIVE_MANIFEST) {
            has_manifest = true;
        }
        count += 1;
    }

    if !has_manifest {
        bail!(
            "archive {} has no `{}` entry",
            path.display(),
            ARCHIVE_MANIFEST
        );
    }

    Ok(count)
}

/// Pack the package in `package_dir`.
pub fn pack(package_dir: &Path, opts: &PackOptions, shell: &Arc<Shell>) -> Result<PackedArchive> {
    let manifest = Manifest::load(&package_dir.join(&opts.manifest))?;
    let label = match (manifest.name(), manifest.version()) {
        (Some(name), Some(version)) => format!("{} v{}", name, version),
        (Some(name), None) => name.to_string(),
        _ => package_dir.display().to_string(),
    };

    let cmd = ProcessBuilder::new(&opts.program)
        .args(&opts.args)
        .cwd(package_dir);

    let spinner = shell.spinner(Status::Packing, &label);
    let output = cmd.exec_and_check();
    let elapsed = spinner.finish();
    let output = output?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    let Some(file_name) = parse_pack_output(&stdout) else {
        bail!(
            "`{}` did not report an archive name",
            cmd.display_command()
        );
    };

    let path = package_dir.join(file_name);
    if !path.is_file() {
        bail!(
            "`{}` reported `{}`, but {} does not exist",
            cmd.display_command(),
            file_name,
            path.display()
        );
    }

    if let (Some(name), Some(version)) = (manifest.name(), manifest.version()) {
        match expected_archive_name(name, version) {
            Ok(expected) if expected != file_name => shell.warn(format!(
                "packager produced `{}`, expected `{}`",
                file_name, expected
            )),
            Ok(_) => {}
            Err(e) => tracing::warn!("cannot check archive name: {:#}", e),
        }
    }

    let entries = if opts.verify {
        Some(inspect_archive(&path)?)
    } else {
        None
    };

    let detail = match entries {
        Some(n) => format!("{} ({} files) in {}", file_name, n, format_duration(elapsed)),
        None => format!("{} in {}", file_name, format_duration(elapsed)),
    };
    shell.status(Status::Packed, detail);

    Ok(PackedArchive { path, entries })
}
