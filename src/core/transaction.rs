//! Transaction guard around the in-place manifest rewrite.
//!
//! A run moves through
//! `Idle -> PreconditionChecked -> Rewriting -> Executing -> Restoring -> Done`.
//! Every way out of a run (success, error, panic, Ctrl-C) ends in
//! [`Transaction::finish`], which restores the manifests at most once and
//! picks the exit code. Restoration is only performed once mutation has
//! begun: before that, the working tree still belongs to the user.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};

use anyhow::{Context, Result};
use thiserror::Error;

use crate::util::shell::{Shell, Status};

/// Something that can put the manifests back into their committed state.
pub trait Restore: Send + Sync {
    /// Discard every uncommitted manifest change. Must be idempotent.
    fn restore(&self) -> Result<()>;

    /// Equivalent shell command, shown when restoring fails.
    fn describe(&self) -> String;
}

/// Lifecycle of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Phase {
    Idle,
    PreconditionChecked,
    Rewriting,
    Executing,
    Restoring,
    Done,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::Idle => "idle",
            Phase::PreconditionChecked => "precondition-checked",
            Phase::Rewriting => "rewriting",
            Phase::Executing => "executing",
            Phase::Restoring => "restoring",
            Phase::Done => "done",
        };
        f.write_str(s)
    }
}

/// How a run ended.
#[derive(Debug)]
pub enum Outcome {
    Completed,
    Interrupted,
    Failed(anyhow::Error),
}

#[derive(Debug, Error)]
pub enum TransactionError {
    #[error("manifests are being restored; refusing to write {}", path.display())]
    Restoring { path: PathBuf },

    #[error("cannot move from `{from}` to `{to}`")]
    InvalidTransition { from: Phase, to: Phase },

    #[error("cannot write {} while the transaction is `{phase}`", path.display())]
    NotRewriting { path: PathBuf, phase: Phase },
}

struct Inner {
    phase: Mutex<Phase>,
    interrupted: AtomicBool,
    restored: OnceLock<Result<bool, String>>,
    exit_code: OnceLock<i32>,
    restorer: Box<dyn Restore>,
    shell: Arc<Shell>,
}

/// Shared handle to the run's transaction state.
///
/// Clones share state; one clone lives in the interrupt handler.
#[derive(Clone)]
pub struct Transaction {
    inner: Arc<Inner>,
}

impl fmt::Debug for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transaction")
            .field("phase", &self.phase())
            .field("interrupted", &self.is_interrupted())
            .finish()
    }
}

impl Transaction {
    pub fn new(restorer: impl Restore + 'static, shell: Arc<Shell>) -> Self {
        Transaction {
            inner: Arc::new(Inner {
                phase: Mutex::new(Phase::Idle),
                interrupted: AtomicBool::new(false),
                restored: OnceLock::new(),
                exit_code: OnceLock::new(),
                restorer: Box::new(restorer),
                shell,
            }),
        }
    }

    // A panic while holding the lock must not block restoration.
    fn lock(&self) -> MutexGuard<'_, Phase> {
        self.inner
            .phase
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Current phase.
    pub fn phase(&self) -> Phase {
        *self.lock()
    }

    /// Whether an interrupt has been received.
    pub fn is_interrupted(&self) -> bool {
        self.inner.interrupted.load(Ordering::SeqCst)
    }

    fn advance(&self, from: Phase, to: Phase) -> Result<(), TransactionError> {
        let mut phase = self.lock();
        if *phase != from {
            return Err(TransactionError::InvalidTransition { from: *phase, to });
        }
        tracing::debug!("transaction: {} -> {}", from, to);
        *phase = to;
        Ok(())
    }

    /// The clean-tree precondition holds.
    pub fn precondition_checked(&self) -> Result<(), TransactionError> {
        self.advance(Phase::Idle, Phase::PreconditionChecked)
    }

    /// Manifests are about to be mutated; from now on every exit restores.
    pub fn begin_rewrite(&self) -> Result<(), TransactionError> {
        self.advance(Phase::PreconditionChecked, Phase::Rewriting)
    }

    /// All manifests are rewritten; external steps are about to run.
    pub fn begin_execute(&self) -> Result<(), TransactionError> {
        self.advance(Phase::Rewriting, Phase::Executing)
    }

    /// Run a manifest write under the transaction lock.
    ///
    /// Restoration takes the same lock, so a write either completes before
    /// restoration starts or is refused.
    pub fn write<T>(&self, path: &Path, write: impl FnOnce() -> Result<T>) -> Result<T> {
        let phase = self.lock();
        match *phase {
            Phase::Rewriting => write(),
            Phase::Restoring | Phase::Done => Err(TransactionError::Restoring {
                path: path.to_path_buf(),
            }
            .into()),
            other => Err(TransactionError::NotRewriting {
                path: path.to_path_buf(),
                phase: other,
            }
            .into()),
        }
    }

    /// Restore the manifests, at most once per transaction.
    ///
    /// Returns `Ok(true)` if manifests were restored, `Ok(false)` if mutation
    /// never began. Concurrent callers wait for the first one and share its
    /// result.
    pub fn restore(&self) -> Result<bool> {
        let result = self.inner.restored.get_or_init(|| {
            let mutated = {
                let mut phase = self.lock();
                let mutated = *phase >= Phase::Rewriting;
                *phase = Phase::Restoring;
                mutated
            };

            if !mutated {
                return Ok(false);
            }

            self.inner
                .shell
                .status(Status::Restoring, "package manifests");
            self.inner
                .restorer
                .restore()
                .map(|()| true)
                .map_err(|e| format!("{:#}", e))
        });

        match result {
            Ok(restored) => Ok(*restored),
            Err(msg) => Err(anyhow::anyhow!("{}", msg)).context("failed to restore manifests"),
        }
    }

    /// Record an interrupt and settle the transaction.
    ///
    /// Returns the exit code; the caller is expected to exit with it.
    pub fn interrupt(&self) -> i32 {
        self.inner.interrupted.store(true, Ordering::SeqCst);
        self.finish(Outcome::Interrupted)
    }

    /// Settle the run: report the outcome, restore, and return the exit code.
    ///
    /// Only the first call has any effect; later calls wait for it and
    /// return the same code.
    pub fn finish(&self, outcome: Outcome) -> i32 {
        *self.inner.exit_code.get_or_init(|| self.settle(outcome))
    }

    fn settle(&self, outcome: Outcome) -> i32 {
        let shell = &self.inner.shell;

        // A child killed by the same Ctrl-C surfaces as a failure on the main
        // thread; the interrupt wins.
        let outcome = match outcome {
            Outcome::Failed(err) if self.is_interrupted() => {
                tracing::debug!("ignoring failure after interrupt: {:#}", err);
                Outcome::Interrupted
            }
            other => other,
        };

        let mut code = match &outcome {
            Outcome::Completed => 0,
            Outcome::Interrupted => {
                shell.status(Status::Interrupted, "cleaning up before exit");
                0
            }
            Outcome::Failed(err) => {
                shell.error(format!("{:#}", err));
                1
            }
        };

        match self.restore() {
            Ok(true) => shell.status(Status::Restored, "package manifests"),
            Ok(false) => {}
            Err(err) => {
                shell.error(format!("{:#}", err));
                shell.note(format!(
                    "run `{}` to restore them by hand",
                    self.inner.restorer.describe()
                ));
                code = 1;
            }
        }

        *self.lock() = Phase::Done;
        code
    }

    /// Route Ctrl-C (and SIGTERM) into [`Transaction::interrupt`], then exit.
    ///
    /// Can only be installed once per process.
    pub fn install_interrupt_handler(&self) -> Result<()> {
        let txn = self.clone();
        ctrlc::set_handler(move || {
            let code = txn.interrupt();
            std::process::exit(code);
        })
        .context("unable to set ctrl-c handler")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::thread;

    use crate::util::shell::{ColorChoice, Verbosity};

    #[derive(Clone, Default)]
    struct CountingRestore {
        calls: Arc<AtomicUsize>,
        fail: bool,
    }

    impl Restore for CountingRestore {
        fn restore(&self) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                anyhow::bail!("checkout exploded");
            }
            Ok(())
        }

        fn describe(&self) -> String {
            "restore by hand".to_string()
        }
    }

    fn shell() -> Arc<Shell> {
        Arc::new(Shell::new(Verbosity::Normal, ColorChoice::Never))
    }

    fn mutated(restore: CountingRestore) -> Transaction {
        let txn = Transaction::new(restore, shell());
        txn.precondition_checked().unwrap();
        txn.begin_rewrite().unwrap();
        txn
    }

    #[test]
    fn test_phase_transitions() {
        let txn = Transaction::new(CountingRestore::default(), shell());
        assert_eq!(txn.phase(), Phase::Idle);

        assert!(matches!(
            txn.begin_rewrite(),
            Err(TransactionError::InvalidTransition { .. })
        ));

        txn.precondition_checked().unwrap();
        txn.begin_rewrite().unwrap();
        txn.begin_execute().unwrap();
        assert_eq!(txn.phase(), Phase::Executing);

        assert_eq!(txn.finish(Outcome::Completed), 0);
        assert_eq!(txn.phase(), Phase::Done);
    }

    #[test]
    fn test_no_restore_before_mutation() {
        let restore = CountingRestore::default();
        let txn = Transaction::new(restore.clone(), shell());

        let code = txn.finish(Outcome::Failed(anyhow::anyhow!("dirty tree")));
        assert_eq!(code, 1);
        assert_eq!(restore.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_failure_restores_and_exits_nonzero() {
        let restore = CountingRestore::default();
        let txn = mutated(restore.clone());

        assert_eq!(txn.finish(Outcome::Failed(anyhow::anyhow!("pack failed"))), 1);
        assert_eq!(restore.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_interrupt_restores_and_exits_zero() {
        let restore = CountingRestore::default();
        let txn = mutated(restore.clone());
        txn.begin_execute().unwrap();

        assert_eq!(txn.interrupt(), 0);
        assert!(txn.is_interrupted());
        assert_eq!(restore.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_restore_runs_once() {
        let restore = CountingRestore::default();
        let txn = mutated(restore.clone());

        assert!(txn.restore().unwrap());
        assert!(txn.restore().unwrap());
        assert_eq!(txn.finish(Outcome::Completed), 0);
        assert_eq!(txn.interrupt(), 0);
        assert_eq!(restore.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_concurrent_finish_restores_once() {
        let restore = CountingRestore::default();
        let txn = mutated(restore.clone());

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let txn = txn.clone();
                thread::spawn(move || {
                    if i % 2 == 0 {
                        txn.interrupt()
                    } else {
                        txn.finish(Outcome::Completed)
                    }
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), 0);
        }
        assert_eq!(restore.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failure_after_interrupt_exits_zero() {
        let restore = CountingRestore::default();
        let txn = mutated(restore.clone());
        txn.inner.interrupted.store(true, Ordering::SeqCst);

        let code = txn.finish(Outcome::Failed(anyhow::anyhow!("child killed by SIGINT")));
        assert_eq!(code, 0);
    }

    #[test]
    fn test_writes_refused_after_restore() {
        let txn = mutated(CountingRestore::default());
        let path = Path::new("packages/pkgA/package.json");

        assert_eq!(txn.write(path, || Ok(42)).unwrap(), 42);

        txn.restore().unwrap();
        let err = txn.write(path, || Ok(())).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<TransactionError>(),
            Some(TransactionError::Restoring { .. })
        ));
    }

    #[test]
    fn test_writes_refused_outside_rewrite() {
        let txn = Transaction::new(CountingRestore::default(), shell());
        let err = txn
            .write(Path::new("package.json"), || Ok(()))
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<TransactionError>(),
            Some(TransactionError::NotRewriting {
                phase: Phase::Idle,
                ..
            })
        ));
    }

    #[test]
    fn test_restore_failure_forces_nonzero_exit() {
        let restore = CountingRestore {
            fail: true,
            ..Default::default()
        };
        let txn = mutated(restore.clone());

        assert!(txn.restore().is_err());
        assert_eq!(txn.finish(Outcome::Completed), 1);
        assert_eq!(restore.calls.load(Ordering::SeqCst), 1);
    }
}
