//! linkpack - test a monorepo package against its local siblings.
//!
//! Rewrites intra-workspace dependencies to `file:` references, packs one
//! package, runs a generator against the archive, and restores every
//! manifest from git afterwards, whether the run succeeded, failed or was
//! interrupted.

pub mod core;
pub mod ops;
pub mod util;

/// Test fixtures backed by temporary git repositories.
#[cfg(test)]
pub mod test_support;

pub use crate::core::{
    manifest::{DependencyKind, Manifest},
    transaction::{Outcome, Transaction},
    workspace::{PackageMap, Workspace},
};

pub use util::context::GlobalContext;
