//! Command dispatch primitives.
//!
//! This crate holds the data shapes a dispatcher front-end builds —
//! commands, usages, parameters, permission conditions — plus the typed
//! value model and the executor primitive. The matching engine lives in
//! `legate-core`.

pub mod arguments;
pub mod command;
pub mod context;
pub mod error;
pub mod executor;
pub mod parameter;
pub mod permissions;
pub mod suggestions;
pub mod types;
pub mod value;

pub use command::{Command, CommandUsage};
pub use context::{ExecutionContext, Source};
pub use error::{Error, Result};
pub use executor::Executor;
pub use parameter::{DefaultValue, FlagSpec, Parameter, ParameterKind, Validator};
pub use permissions::{PermissionChecker, PermissionCondition};
pub use suggestions::{StaticSuggestions, SuggestionProvider};
pub use value::Value;
