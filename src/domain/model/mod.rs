pub mod component;
pub mod install;
pub mod link;
pub mod manifest;
pub mod store;

pub use component::*;
pub use install::*;
pub use link::*;
pub use manifest::*;
pub use store::*;
