pub mod application;
pub mod commands;
pub mod config;
pub mod domain;
pub mod error;
pub mod runtime;
