use std::collections::HashMap;
use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;

use crate::arguments::OwnedArguments;
use crate::command::CommandUsage;
use crate::value::Value;

/// The origin of a dispatch: a player, a console, a remote session.
///
/// The engine only needs a stable identity per source for cooldown
/// bookkeeping; everything else about the source is opaque and flows
/// through to executors, permission checkers and suggestion providers.
pub trait Source: Send + Sync + 'static {
    fn id(&self) -> u64;
}

impl Source for u64 {
    fn id(&self) -> u64 {
        *self
    }
}

/// The per-invocation state handed to an executor: the source, the
/// matched usage and every resolved argument and flag.
///
/// Created fresh for one dispatch and discarded after the executor ran
/// or a failure was raised.
pub struct ExecutionContext<S> {
    pub source: S,
    /// The matched command labels, root first, subcommands following.
    pub path: Vec<String>,
    pub usage: Arc<CommandUsage<S>>,
    raws: OwnedArguments,
    arguments: HashMap<String, Value>,
    flags: HashMap<String, Value>,
}

impl<S> ExecutionContext<S> {
    pub fn new(
        source: S,
        path: Vec<String>,
        usage: Arc<CommandUsage<S>>,
        raws: OwnedArguments,
    ) -> Self {
        Self {
            source,
            path,
            usage,
            raws,
            arguments: HashMap::new(),
            flags: HashMap::new(),
        }
    }

    /// The raw tokens of the invocation, excluding the command label.
    pub fn raws(&self) -> &OwnedArguments {
        &self.raws
    }

    pub fn raw(&self, index: usize) -> Option<&str> {
        self.raws.get(index).map(String::as_str)
    }

    /// A resolved positional argument by parameter name.
    pub fn argument(&self, name: &str) -> Option<&Value> {
        self.arguments.get(name)
    }

    /// A resolved flag by flag name. Switches resolve to booleans.
    pub fn flag(&self, name: &str) -> Option<&Value> {
        self.flags.get(name)
    }

    pub fn has_flag(&self, name: &str) -> bool {
        self.flags.contains_key(name)
    }

    /// Stores a resolved argument. Called by the resolution pipeline.
    pub fn resolve_argument(&mut self, name: impl ToString, value: Value) {
        self.arguments.insert(name.to_string(), value);
    }

    /// Stores a resolved flag. Called by the flag extraction pass.
    pub fn resolve_flag(&mut self, name: impl ToString, value: Value) {
        self.flags.insert(name.to_string(), value);
    }
}

impl<S> Debug for ExecutionContext<S> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("path", &self.path)
            .field("raws", &self.raws)
            .field("arguments", &self.arguments)
            .field("flags", &self.flags)
            .finish_non_exhaustive()
    }
}
