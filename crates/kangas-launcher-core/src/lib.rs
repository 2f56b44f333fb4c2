//! Kangas launcher core - platform-independent types, traits and configuration
//!
//! This crate provides the data model, collaborator traits, configuration and
//! error types shared by the platform process managers and the launcher.

pub mod config;
pub mod context;
pub mod display;
pub mod endpoint;
pub mod error;
pub mod process;
pub mod scanner;

pub use config::*;
pub use context::*;
pub use display::*;
pub use endpoint::*;
pub use error::*;
pub use process::*;
pub use scanner::*;
