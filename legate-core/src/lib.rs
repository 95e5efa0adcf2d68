//! The legate dispatch engine.
//!
//! Takes the command definitions built with the `legate` crate,
//! registers them into an immutable command tree, and resolves raw input
//! lines into typed, ready-to-invoke parameter sets.

pub mod ambiguity;
pub mod config;
pub mod cooldown;
pub mod cursor;
pub mod dispatcher;
pub mod flags;
pub mod handlers;
pub mod pipeline;
pub mod suggestions;
pub mod tree;

pub use legate;

pub use ambiguity::RegistrationError;
pub use config::EngineConfig;
pub use dispatcher::CommandDispatcher;
