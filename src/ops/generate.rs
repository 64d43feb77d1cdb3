//! Generation step: run the generator entry point against the packed archive.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;

use crate::util::process::ProcessBuilder;
use crate::util::shell::{Shell, Status};

/// How to invoke the generator.
#[derive(Debug, Clone)]
pub struct GenerateOptions {
    /// Resolved runtime program, e.g. `node`.
    pub runtime: PathBuf,
    /// Generator entry point passed to the runtime.
    pub entry: PathBuf,
    /// Working directory, the workspace root.
    pub cwd: PathBuf,
    /// Option carrying the archive path, e.g. `--script-version`.
    pub archive_flag: String,
    /// User arguments, passed through verbatim.
    pub passthrough: Vec<OsString>,
}

/// The `--flag=<archive>` argument appended after the user's arguments.
pub fn archive_arg(flag: &str, archive: &Path) -> OsString {
    let mut arg = OsString::from(flag);
    arg.push("=");
    arg.push(archive);
    arg
}

/// The full generator command line for an archive.
pub fn generator_command(opts: &GenerateOptions, archive: &Path) -> ProcessBuilder {
    ProcessBuilder::new(&opts.runtime)
        .arg(&opts.entry)
        .args(&opts.passthrough)
        .arg(archive_arg(&opts.archive_flag, archive))
        .cwd(&opts.cwd)
}

/// Run the generator with inherited stdio, failing on a non-zero exit.
pub fn generate(opts: &GenerateOptions, archive: &Path, shell: &Arc<Shell>) -> Result<()> {
    let cmd = generator_command(opts, archive);
    shell.status(Status::Running, cmd.display_command());
    cmd.status_and_check()
}
