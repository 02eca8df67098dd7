//! Command entry points behind the CLI.

mod group;
mod link;

pub use group::group;
pub use link::link;
