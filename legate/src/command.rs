use std::borrow::Borrow;
use std::collections::HashSet;
use std::fmt::{self, Debug, Formatter};
use std::hash::{Hash, Hasher};
use std::time::Duration;

use crate::executor::Executor;
use crate::parameter::{label_matches, Parameter};
use crate::permissions::PermissionCondition;

/// A registered command: a name, aliases, overloads and child commands.
///
/// Commands hash and compare by name only so a [`HashSet`] of commands
/// can be indexed by `&str`.
pub struct Command<S> {
    pub name: String,
    pub aliases: HashSet<String>,
    pub description: String,
    pub permission: PermissionCondition,
    /// The command's overloads, in declaration order. Declaration order
    /// is also the tie-break order during dispatch.
    pub usages: Vec<CommandUsage<S>>,
    pub sub_commands: HashSet<Command<S>>,
    /// Skip permission filtering when suggesting this command's subtree.
    pub open_suggestions: bool,
}

impl<S> Command<S> {
    /// Creates a new `Command` with a name and defaulted fields.
    pub fn new(name: impl ToString) -> Self {
        Self {
            name: name.to_string(),
            aliases: HashSet::new(),
            description: String::new(),
            permission: PermissionCondition::True,
            usages: Vec::new(),
            sub_commands: HashSet::new(),
            open_suggestions: false,
        }
    }

    pub fn alias(mut self, alias: impl ToString) -> Self {
        self.aliases.insert(alias.to_string());
        self
    }

    pub fn description(mut self, description: impl ToString) -> Self {
        self.description = description.to_string();
        self
    }

    pub fn permission(mut self, condition: PermissionCondition) -> Self {
        self.permission = condition;
        self
    }

    /// Appends an overload.
    pub fn usage(mut self, usage: CommandUsage<S>) -> Self {
        self.usages.push(usage);
        self
    }

    /// Attaches a child command.
    pub fn sub_command(mut self, command: Command<S>) -> Self {
        self.sub_commands.insert(command);
        self
    }

    pub fn open_suggestions(mut self, open: bool) -> Self {
        self.open_suggestions = open;
        self
    }

    /// The command's name followed by its aliases.
    pub fn labels(&self) -> Vec<String> {
        let mut labels = vec![self.name.clone()];
        labels.extend(self.aliases.iter().cloned());
        labels
    }

    /// Returns whether `label` is the command's name or one of its
    /// aliases.
    pub fn has_label(&self, label: &str, ignore_case: bool) -> bool {
        label_matches(&self.name, label, ignore_case)
            || self
                .aliases
                .iter()
                .any(|a| label_matches(a, label, ignore_case))
    }

    /// Looks up a child command by name or alias.
    pub fn find_sub(&self, label: &str, ignore_case: bool) -> Option<&Command<S>> {
        self.sub_commands
            .iter()
            .find(|c| c.has_label(label, ignore_case))
    }
}

impl<S> Clone for Command<S> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            aliases: self.aliases.clone(),
            description: self.description.clone(),
            permission: self.permission.clone(),
            usages: self.usages.clone(),
            sub_commands: self.sub_commands.clone(),
            open_suggestions: self.open_suggestions,
        }
    }
}

impl<S> Debug for Command<S> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("name", &self.name)
            .field("aliases", &self.aliases)
            .field("usages", &self.usages.len())
            .field("sub_commands", &self.sub_commands)
            .finish_non_exhaustive()
    }
}

impl<S> Borrow<str> for Command<S> {
    fn borrow(&self) -> &str {
        &self.name
    }
}

impl<S> PartialEq for Command<S> {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl<S> Eq for Command<S> {}

impl<S> Hash for Command<S> {
    fn hash<H>(&self, state: &mut H)
    where
        H: Hasher,
    {
        self.name.hash(state);
    }
}

/// One overload of a command: an ordered parameter signature, gates and
/// an executor.
pub struct CommandUsage<S> {
    pub parameters: Vec<Parameter<S>>,
    pub description: String,
    pub permission: PermissionCondition,
    /// Minimum delay between two invocations per source.
    pub cooldown: Option<Duration>,
    pub executor: Option<Executor<S>>,
}

impl<S> CommandUsage<S> {
    pub fn new() -> Self {
        Self {
            parameters: Vec::new(),
            description: String::new(),
            permission: PermissionCondition::True,
            cooldown: None,
            executor: None,
        }
    }

    /// Appends a parameter to the signature.
    pub fn parameter(mut self, parameter: Parameter<S>) -> Self {
        self.parameters.push(parameter);
        self
    }

    pub fn description(mut self, description: impl ToString) -> Self {
        self.description = description.to_string();
        self
    }

    pub fn permission(mut self, condition: PermissionCondition) -> Self {
        self.permission = condition;
        self
    }

    pub fn cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = Some(cooldown);
        self
    }

    pub fn executor(mut self, executor: Executor<S>) -> Self {
        self.executor = Some(executor);
        self
    }

    /// The number of tokens the usage cannot do without: its required,
    /// non-flag parameters.
    pub fn min_length(&self) -> usize {
        self.parameters.iter().filter(|p| p.is_required()).count()
    }

    /// The positional (non-flag) parameters in order.
    pub fn positional_parameters(&self) -> impl Iterator<Item = &Parameter<S>> {
        self.parameters.iter().filter(|p| !p.is_flag())
    }

    /// The flag and switch parameters in order.
    pub fn flag_parameters(&self) -> impl Iterator<Item = &Parameter<S>> {
        self.parameters.iter().filter(|p| p.is_flag())
    }

    pub fn format(&self) -> String {
        let parts: Vec<_> = self.parameters.iter().map(|p| p.format()).collect();
        parts.join(" ")
    }
}

impl<S> Default for CommandUsage<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> Clone for CommandUsage<S> {
    fn clone(&self) -> Self {
        Self {
            parameters: self.parameters.clone(),
            description: self.description.clone(),
            permission: self.permission.clone(),
            cooldown: self.cooldown,
            executor: self.executor.clone(),
        }
    }
}

impl<S> Debug for CommandUsage<S> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandUsage")
            .field("parameters", &self.parameters)
            .field("cooldown", &self.cooldown)
            .finish_non_exhaustive()
    }
}
