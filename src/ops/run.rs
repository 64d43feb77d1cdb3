//! The linked run: check, link, pack, generate.
//!
//! [`run`] drives a [`Transaction`] through its phases but never restores
//! by itself; whatever it returns goes to [`Transaction::finish`].

use std::ffi::OsString;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use thiserror::Error;

use crate::core::transaction::Transaction;
use crate::core::Workspace;
use crate::ops::generate::{generate, GenerateOptions};
use crate::ops::link::{link_workspace, LinkReport};
use crate::ops::pack::{pack, PackOptions, PackedArchive};
use crate::util::git::{self, VcsError};
use crate::util::process::resolve_program;
use crate::util::shell::{Shell, Status};
use crate::util::{Config, GlobalContext};

/// Shown for at most this many dirty entries.
const MAX_DIRTY_SHOWN: usize = 10;

/// Problems found before anything is mutated.
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("package `{package}` not found in {}", packages_dir.display())]
    MissingPackage {
        package: String,
        packages_dir: PathBuf,
    },

    #[error("generator entry point {} does not exist", path.display())]
    MissingEntry { path: PathBuf },

    #[error("`{program}` not found in PATH")]
    MissingProgram { program: String },
}

/// Options for a linked run.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Arguments passed through verbatim to the generator.
    pub passthrough: Vec<OsString>,
}

/// Everything the external steps need, resolved up front.
#[derive(Debug, Clone)]
pub struct Plan {
    pub scripts_dir: PathBuf,
    pub pack: PackOptions,
    pub generate: GenerateOptions,
}

/// What a completed run did.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub links: Vec<LinkReport>,
    pub archive: PackedArchive,
}

/// Resolve the packaging and generation steps against the workspace.
pub fn plan(ws: &Workspace, config: &Config, opts: &RunOptions) -> Result<Plan, PlanError> {
    let scripts_dir = ws
        .package_dir(&config.scripts_package)
        .ok_or_else(|| PlanError::MissingPackage {
            package: config.scripts_package.clone(),
            packages_dir: ws.packages_dir().to_path_buf(),
        })?
        .to_path_buf();

    let entry = ws
        .packages_dir()
        .join(&config.generator_package)
        .join(&config.generator_entry);
    if !entry.is_file() {
        return Err(PlanError::MissingEntry { path: entry });
    }

    let (pack_program, pack_args) = config.pack_program();
    let program = resolve_program(pack_program).ok_or_else(|| PlanError::MissingProgram {
        program: pack_program.to_string(),
    })?;
    let runtime = resolve_program(&config.runtime).ok_or_else(|| PlanError::MissingProgram {
        program: config.runtime.clone(),
    })?;

    Ok(Plan {
        scripts_dir,
        pack: PackOptions {
            program,
            args: pack_args.to_vec(),
            manifest: config.manifest.clone(),
            verify: config.verify_archive,
        },
        generate: GenerateOptions {
            runtime,
            entry,
            cwd: ws.root().to_path_buf(),
            archive_flag: config.archive_flag.clone(),
            passthrough: opts.passthrough.clone(),
        },
    })
}

fn check_clean(ctx: &GlobalContext, shell: &Shell) -> Result<(), VcsError> {
    let result = git::ensure_clean(ctx.root());
    if let Err(VcsError::DirtyTree { entries }) = &result {
        for entry in entries.iter().take(MAX_DIRTY_SHOWN) {
            shell.note(entry);
        }
        if entries.len() > MAX_DIRTY_SHOWN {
            shell.note(format!("... and {} more", entries.len() - MAX_DIRTY_SHOWN));
        }
    }
    result
}

/// Perform a linked run inside `txn`.
pub fn run(
    ctx: &GlobalContext,
    txn: &Transaction,
    shell: &Arc<Shell>,
    opts: &RunOptions,
) -> Result<RunSummary> {
    let config = ctx.config();

    check_clean(ctx, shell)?;
    txn.precondition_checked()?;

    let ws = Workspace::scan(ctx.root(), config)?;
    let plan = plan(&ws, config, opts)?;

    txn.begin_rewrite()?;
    let links = link_workspace(&ws, txn, shell, config.peer_rewrite)?;
    let linked = links.iter().filter(|report| report.changed).count();
    shell.status(
        Status::Linked,
        format!("{} of {} packages to local paths", linked, ws.packages().len()),
    );
    shell.note("don't touch the package manifests while this runs");

    txn.begin_execute()?;
    let archive = pack(&plan.scripts_dir, &plan.pack, shell)?;
    generate(&plan.generate, &archive.path, shell)?;

    Ok(RunSummary { links, archive })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::GitFixture;

    fn config() -> Config {
        Config {
            runtime: "sh".to_string(),
            pack_command: vec!["sh".to_string(), "pack.sh".to_string()],
            generator_entry: "index.sh".to_string(),
            ..Config::default()
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_plan_resolves_steps() {
        let fixture = GitFixture::new();
        fixture.add_package("ccws-scripts", r#"{"name":"ccws-scripts","version":"1.0.0"}"#);
        fixture.add_package("create-ccws", r#"{"name":"create-ccws"}"#);
        fixture.write("packages/create-ccws/index.sh", "exit 0\n");

        let config = config();
        let ws = Workspace::scan(fixture.root(), &config).unwrap();
        let opts = RunOptions {
            passthrough: vec!["demo".into()],
        };
        let plan = plan(&ws, &config, &opts).unwrap();

        assert_eq!(plan.scripts_dir, fixture.root().join("packages/ccws-scripts"));
        assert_eq!(plan.pack.args, ["pack.sh"]);
        assert_eq!(
            plan.generate.entry,
            fixture.root().join("packages/create-ccws/index.sh")
        );
        assert_eq!(plan.generate.cwd, fixture.root());
        assert_eq!(plan.generate.passthrough, ["demo"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_plan_reports_missing_pieces() {
        let fixture = GitFixture::new();
        fixture.add_package("create-ccws", r#"{"name":"create-ccws"}"#);

        let config = config();
        let ws = Workspace::scan(fixture.root(), &config).unwrap();
        let err = plan(&ws, &config, &RunOptions::default()).unwrap_err();
        assert!(matches!(err, PlanError::MissingPackage { ref package, .. } if package == "ccws-scripts"));

        fixture.add_package("ccws-scripts", r#"{"name":"ccws-scripts"}"#);
        let ws = Workspace::scan(fixture.root(), &config).unwrap();
        let err = plan(&ws, &config, &RunOptions::default()).unwrap_err();
        assert!(matches!(err, PlanError::MissingEntry { .. }));

        fixture.write("packages/create-ccws/index.sh", "exit 0\n");
        let missing_runtime = Config {
            runtime: "no-such-runtime-linkpack".to_string(),
            ..config
        };
        let err = plan(&ws, &missing_runtime, &RunOptions::default()).unwrap_err();
        assert!(matches!(err, PlanError::MissingProgram { ref program } if program == "no-such-runtime-linkpack"));
    }
}
