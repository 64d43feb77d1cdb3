//! Core data structures: manifests, the workspace and the run transaction.

pub mod manifest;
pub mod transaction;
pub mod workspace;

pub use manifest::{DependencyKind, Manifest, ManifestError};
pub use transaction::{Outcome, Phase, Restore, Transaction, TransactionError};
pub use workspace::{PackageMap, Workspace};
