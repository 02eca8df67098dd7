//! Application layer - Use cases that coordinate domain services.
//!
//! This layer sits between the CLI and the domain services: it owns the
//! order in which planning, materialization and installation happen.

mod install;
mod link;

pub use install::{InstallAction, InstallReport, RootManifest, add_root_component_aliases};
pub use link::{LinkAction, LinkSummary};
