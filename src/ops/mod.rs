//! High-level operations.
//!
//! Each step of a linked run lives in its own module; [`run`] strings them
//! together.

pub mod generate;
pub mod link;
pub mod pack;
pub mod run;

pub use generate::{archive_arg, generate, GenerateOptions};
pub use link::{file_spec, link_workspace, rewrite_manifest, LinkReport, LinkedEntry};
pub use pack::{expected_archive_name, inspect_archive, pack, PackOptions, PackedArchive};
pub use run::{plan, run, Plan, PlanError, RunOptions, RunSummary};
