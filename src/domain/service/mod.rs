pub mod grouper;
pub use grouper::*;

pub mod hooks;
pub use hooks::*;

pub mod installer;
pub use installer::*;

pub mod materializer;
pub use materializer::*;

pub mod naming;
pub use naming::*;

pub mod planner;
pub use planner::*;

pub mod resolver;
pub use resolver::*;

pub mod store;
pub use store::*;

pub mod synthesizer;
pub use synthesizer::*;
