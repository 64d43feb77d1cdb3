//! linkpack CLI - run a generator against locally linked workspace packages

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use anyhow::anyhow;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use linkpack::ops::{self, RunOptions};
use linkpack::util::git::GitRestore;
use linkpack::util::shell::{ColorChoice, Shell, Status, Verbosity};
use linkpack::{GlobalContext, Outcome, Transaction};

mod cli;

use cli::Cli;

fn main() {
    let cli = Cli::parse();
    std::process::exit(execute(cli));
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("linkpack=debug")
    } else {
        EnvFilter::new("linkpack=info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn execute(cli: Cli) -> i32 {
    let ctx = match GlobalContext::new() {
        Ok(ctx) => ctx,
        Err(e) => {
            Shell::default().error(format!("{:#}", e));
            return 1;
        }
    };

    let verbose = ctx.config().verbose;
    init_logging(verbose);

    let verbosity = if verbose {
        Verbosity::Verbose
    } else {
        Verbosity::Normal
    };
    let shell = Arc::new(Shell::new(verbosity, ColorChoice::Auto));

    let restore = GitRestore::new(ctx.root(), ctx.manifest_pathspec());
    let txn = Transaction::new(restore, shell.clone());
    if let Err(e) = txn.install_interrupt_handler() {
        return txn.finish(Outcome::Failed(e));
    }

    let opts = RunOptions {
        passthrough: cli.args,
    };

    let result = panic::catch_unwind(AssertUnwindSafe(|| ops::run(&ctx, &txn, &shell, &opts)));
    let (outcome, archive) = match result {
        Ok(Ok(summary)) => (Outcome::Completed, Some(summary.archive.path)),
        Ok(Err(e)) => (Outcome::Failed(e), None),
        Err(payload) => (
            Outcome::Failed(anyhow!("panicked: {}", panic_message(payload.as_ref()))),
            None,
        ),
    };

    let code = txn.finish(outcome);
    if let (0, Some(archive)) = (code, archive) {
        shell.status(
            Status::Finished,
            format!("generator run against {}", archive.display()),
        );
    }
    code
}
