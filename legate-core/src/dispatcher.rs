//! The dispatcher front door.
//!
//! Owns the registered command set and every piece of engine state:
//! config, permission checker, suggestion registry and cooldowns.
//! Registration builds and verifies the immutable command tree; dispatch
//! clones the registered command out of the lock and works on shared
//! `Arc` internals from there.

use std::borrow::Borrow;
use std::collections::HashSet;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use log::{debug, trace};
use parking_lot::RwLock;

use legate::arguments::{parse_line, OwnedArguments};
use legate::context::{ExecutionContext, Source};
use legate::parameter::label_matches;
use legate::permissions::{PermissionChecker, PermissionCondition};
use legate::{Command, Error};

use crate::ambiguity::RegistrationError;
use crate::config::EngineConfig;
use crate::cooldown::CooldownTracker;
use crate::cursor::Cursor;
use crate::flags;
use crate::pipeline::{ParameterChain, PipelineEnv};
use crate::suggestions::{self, starts_with, SuggestionRegistry};
use crate::tree::CommandTree;

/// A command after registration: immutable metadata plus the verified
/// tree. Cloning shares the tree.
pub struct RegisteredCommand<S> {
    name: String,
    aliases: Vec<String>,
    permission: PermissionCondition,
    open_suggestions: bool,
    tree: Arc<CommandTree<S>>,
}

impl<S> RegisteredCommand<S> {
    fn from(command: &Command<S>) -> Result<Self, RegistrationError> {
        let tree = CommandTree::build(command)?;

        Ok(Self {
            name: command.name.clone(),
            aliases: command.aliases.iter().cloned().collect(),
            permission: command.permission.clone(),
            open_suggestions: command.open_suggestions,
            tree: Arc::new(tree),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tree(&self) -> &CommandTree<S> {
        &self.tree
    }

    fn has_label(&self, label: &str, ignore_case: bool) -> bool {
        label_matches(&self.name, label, ignore_case)
            || self
                .aliases
                .iter()
                .any(|a| label_matches(a, label, ignore_case))
    }
}

impl<S> Clone for RegisteredCommand<S> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            aliases: self.aliases.clone(),
            permission: self.permission.clone(),
            open_suggestions: self.open_suggestions,
            tree: self.tree.clone(),
        }
    }
}

impl<S> Borrow<str> for RegisteredCommand<S> {
    fn borrow(&self) -> &str {
        &self.name
    }
}

impl<S> PartialEq for RegisteredCommand<S> {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl<S> Eq for RegisteredCommand<S> {}

impl<S> Hash for RegisteredCommand<S> {
    fn hash<H>(&self, state: &mut H)
    where
        H: Hasher,
    {
        self.name.hash(state);
    }
}

/// Grants everything. The default checker until one is installed.
struct AllowAll;

impl<S> PermissionChecker<S> for AllowAll {
    fn has_permission(&self, _source: &S, _permission: &str) -> bool {
        true
    }
}

pub struct CommandDispatcher<S> {
    commands: Arc<RwLock<HashSet<RegisteredCommand<S>>>>,
    config: EngineConfig,
    checker: Arc<dyn PermissionChecker<S>>,
    suggestions: SuggestionRegistry<S>,
    cooldowns: CooldownTracker,
    chain: ParameterChain<S>,
}

impl<S> CommandDispatcher<S> {
    /// Creates a new dispatcher with no commands registered.
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        Self {
            commands: Arc::new(RwLock::new(HashSet::new())),
            config,
            checker: Arc::new(AllowAll),
            suggestions: SuggestionRegistry::new(),
            cooldowns: CooldownTracker::new(),
            chain: ParameterChain::new(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn set_permission_checker(&mut self, checker: Arc<dyn PermissionChecker<S>>) {
        self.checker = checker;
    }

    /// The per-dispatcher suggestion registry, keyed by parameter type
    /// name.
    pub fn suggestions_mut(&mut self) -> &mut SuggestionRegistry<S> {
        &mut self.suggestions
    }

    /// Verifies and registers a command. Ambiguous or malformed usage
    /// sets abort the whole registration.
    pub fn register_command(&self, command: Command<S>) -> Result<(), RegistrationError> {
        let registered = RegisteredCommand::from(&command)?;

        let mut commands = self.commands.write();
        for existing in commands.iter() {
            for label in std::iter::once(&registered.name).chain(registered.aliases.iter()) {
                if existing.has_label(label, true) {
                    return Err(RegistrationError::DuplicateName(label.clone()));
                }
            }
        }

        debug!(
            "registered command `{}`:\n{}",
            registered.name,
            registered.tree.visualize()
        );
        commands.insert(registered);
        Ok(())
    }

    /// Removes the command registered under `name`.
    pub fn unregister_command(&self, name: &str) -> Result<(), RegistrationError> {
        let mut commands = self.commands.write();
        if commands.remove(name) {
            Ok(())
        } else {
            Err(RegistrationError::NotRegistered(name.to_string()))
        }
    }

    /// Looks up a registered command by name or alias.
    pub fn get_command(&self, label: &str) -> Option<RegisteredCommand<S>> {
        let commands = self.commands.read();
        if let Some(command) = commands.get(label) {
            return Some(command.clone());
        }
        commands
            .iter()
            .find(|c| c.has_label(label, self.config.ignore_case))
            .cloned()
    }
}

impl<S> CommandDispatcher<S>
where
    S: Source,
{
    /// Dispatches a raw input line: matches the usage, resolves every
    /// parameter and flag, and runs the executor.
    pub async fn execute(&self, source: S, line: &str) -> legate::Result<()> {
        let raws = parse_line(line);
        let label = match raws.first() {
            Some(label) => label.clone(),
            None => return Err(Error::UnknownCommand(String::new())),
        };

        let command = self
            .get_command(&label)
            .ok_or_else(|| Error::UnknownCommand(label.clone()))?;

        if !command.permission.evaluate(&source, &*self.checker) {
            return Err(Error::PermissionDenied);
        }

        let args: Vec<String> = raws[1..].to_vec();
        let terminal = command.tree.select(&args, &self.config)?;
        trace!("`{}` matched `{}`", line, terminal.format());

        if !terminal.usage.permission.evaluate(&source, &*self.checker) {
            return Err(Error::PermissionDenied);
        }

        if let Some(cooldown) = terminal.usage.cooldown {
            let usage_key = Arc::as_ptr(&terminal.usage) as usize;
            self.cooldowns.check(source.id(), usage_key, cooldown)?;
        }

        let mask = flags::compute_mask(
            &args,
            &self.config,
            &terminal.flags,
            Some(command.tree.all_flags()),
        );
        let usage_format = terminal.format();

        let mut ctx = ExecutionContext::new(
            source,
            terminal.path.clone(),
            terminal.usage.clone(),
            OwnedArguments::from(args.clone()),
        );
        let mut cursor = Cursor::new(terminal.parameters.clone(), args, mask);

        let env = PipelineEnv {
            config: &self.config,
            flags: &*terminal.flags,
            all_flags: command.tree.all_flags(),
            checker: &*self.checker,
            usage: &usage_format,
        };
        self.chain.execute(&mut ctx, &mut cursor, &env)?;

        let executor = terminal.usage.executor.clone().ok_or(Error::NoExecutor)?;
        executor.send(ctx).await
    }

    /// Completion candidates for a partially typed line. The final token
    /// may be incomplete; a trailing space starts a fresh token.
    pub async fn auto_complete(&self, source: &S, line: &str) -> Vec<String> {
        let tokens = parse_line(line);
        let fresh = line.is_empty() || line.ends_with(char::is_whitespace);

        if tokens.is_empty() {
            return self.command_candidates(source, "");
        }
        if tokens.len() == 1 && !fresh {
            return self.command_candidates(source, &tokens[0]);
        }

        let command = match self.get_command(&tokens[0]) {
            Some(command) => command,
            None => return Vec::new(),
        };

        let (before, prefix) = if fresh {
            (tokens[1..].to_vec(), String::new())
        } else {
            (
                tokens[1..tokens.len() - 1].to_vec(),
                tokens[tokens.len() - 1].clone(),
            )
        };

        suggestions::complete(
            &command.tree,
            &before,
            &prefix,
            source,
            &*self.checker,
            &self.config,
            &self.suggestions,
        )
        .await
    }

    fn command_candidates(&self, source: &S, prefix: &str) -> Vec<String> {
        let commands = self.commands.read();

        let mut out = Vec::new();
        for command in commands.iter() {
            if self.config.check_suggestion_permissions
                && !command.open_suggestions
                && !command.permission.evaluate(source, &*self.checker)
            {
                continue;
            }
            for label in std::iter::once(&command.name).chain(command.aliases.iter()) {
                if starts_with(label, prefix, self.config.ignore_case) {
                    out.push(label.clone());
                }
            }
        }

        out.sort();
        out
    }
}

impl<S> Default for CommandDispatcher<S> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use tokio::sync::mpsc;

    use super::CommandDispatcher;
    use crate::ambiguity::RegistrationError;
    use legate::parameter::Parameter;
    use legate::value::Value;
    use legate::{types, Command, CommandUsage, Error, ExecutionContext, Executor};

    type Snapshot = Vec<(String, Option<Value>)>;

    /// An executor that reports the named arguments and flags of every
    /// invocation over a channel.
    fn reporting_executor(
        arguments: &'static [&'static str],
        flags: &'static [&'static str],
    ) -> (Executor<u64>, mpsc::UnboundedReceiver<Snapshot>) {
        let (tx, rx) = mpsc::unbounded_channel();

        let executor = Executor::from_fn(move |ctx: ExecutionContext<u64>| {
            let tx = tx.clone();
            async move {
                let mut snapshot = Snapshot::new();
                for name in arguments {
                    snapshot.push((name.to_string(), ctx.argument(name).cloned()));
                }
                for name in flags {
                    snapshot.push((name.to_string(), ctx.flag(name).cloned()));
                }
                let _ = tx.send(snapshot);
                Ok(())
            }
        });

        (executor, rx)
    }

    fn str_value(value: &str) -> Option<Value> {
        Some(Value::Str(value.to_string()))
    }

    fn ban_command(executor: Executor<u64>) -> Command<u64> {
        Command::new("ban").usage(
            CommandUsage::new()
                .parameter(Parameter::required("target", types::word()))
                .parameter(Parameter::switch("silent").alias("s"))
                .parameter(Parameter::switch("ip"))
                .parameter(Parameter::optional("duration", types::word()).default_value("permanent"))
                .parameter(
                    Parameter::optional("reason", types::word())
                        .greedy()
                        .default_value("Breaking server laws"),
                )
                .executor(executor),
        )
    }

    #[tokio::test]
    async fn test_ban_defaults() {
        let (executor, mut rx) =
            reporting_executor(&["target", "duration", "reason"], &["silent", "ip"]);

        let dispatcher = CommandDispatcher::new();
        dispatcher.register_command(ban_command(executor)).unwrap();

        dispatcher.execute(1, "ban troublemaker").await.unwrap();

        let snapshot = rx.recv().await.unwrap();
        assert_eq!(
            snapshot,
            vec![
                (String::from("target"), str_value("troublemaker")),
                (String::from("duration"), str_value("permanent")),
                (String::from("reason"), str_value("Breaking server laws")),
                (String::from("silent"), Some(Value::Bool(false))),
                (String::from("ip"), Some(Value::Bool(false))),
            ]
        );
    }

    #[tokio::test]
    async fn test_ban_full_input() {
        let (executor, mut rx) =
            reporting_executor(&["target", "duration", "reason"], &["silent", "ip"]);

        let dispatcher = CommandDispatcher::new();
        dispatcher.register_command(ban_command(executor)).unwrap();

        dispatcher
            .execute(1, "ban griefer -s -ip 7d Griefing spawn")
            .await
            .unwrap();

        let snapshot = rx.recv().await.unwrap();
        assert_eq!(
            snapshot,
            vec![
                (String::from("target"), str_value("griefer")),
                (String::from("duration"), str_value("7d")),
                (String::from("reason"), str_value("Griefing spawn")),
                (String::from("silent"), Some(Value::Bool(true))),
                (String::from("ip"), Some(Value::Bool(true))),
            ]
        );
    }

    #[tokio::test]
    async fn test_required_parameters_bind_positionally() {
        let (executor, mut rx) = reporting_executor(&["a", "b", "c"], &[]);

        let dispatcher = CommandDispatcher::new();
        dispatcher
            .register_command(
                Command::new("mix").usage(
                    CommandUsage::new()
                        .parameter(Parameter::required("a", types::word()))
                        .parameter(Parameter::required("b", types::int()))
                        .parameter(Parameter::required("c", types::word()))
                        .executor(executor),
                ),
            )
            .unwrap();

        dispatcher.execute(1, "mix left 7 right").await.unwrap();

        let snapshot = rx.recv().await.unwrap();
        assert_eq!(
            snapshot,
            vec![
                (String::from("a"), str_value("left")),
                (String::from("b"), Some(Value::Int(7))),
                (String::from("c"), str_value("right")),
            ]
        );
    }

    #[tokio::test]
    async fn test_optional_disambiguation_by_type() {
        let (executor, mut rx) = reporting_executor(&["amount", "note"], &[]);

        let dispatcher = CommandDispatcher::new();
        dispatcher
            .register_command(
                Command::new("pay").usage(
                    CommandUsage::new()
                        .parameter(Parameter::optional("amount", types::int()).default_value("0"))
                        .parameter(
                            Parameter::optional("note", types::word()).default_value("none"),
                        )
                        .executor(executor),
                ),
            )
            .unwrap();

        // An integer binds the first optional.
        dispatcher.execute(1, "pay 5").await.unwrap();
        let snapshot = rx.recv().await.unwrap();
        assert_eq!(
            snapshot,
            vec![
                (String::from("amount"), Some(Value::Int(5))),
                (String::from("note"), str_value("none")),
            ]
        );

        // A non-integer skips to the second optional.
        dispatcher.execute(1, "pay hello").await.unwrap();
        let snapshot = rx.recv().await.unwrap();
        assert_eq!(
            snapshot,
            vec![
                (String::from("amount"), Some(Value::Int(0))),
                (String::from("note"), str_value("hello")),
            ]
        );
    }

    #[tokio::test]
    async fn test_subcommand_dispatch() {
        let (executor, mut rx) = reporting_executor(&["user"], &[]);

        let dispatcher = CommandDispatcher::new();
        dispatcher
            .register_command(
                Command::new("guild").sub_command(
                    Command::new("member").alias("m").usage(
                        CommandUsage::new()
                            .parameter(Parameter::required("user", types::word()))
                            .executor(executor),
                    ),
                ),
            )
            .unwrap();

        dispatcher.execute(1, "guild member alice").await.unwrap();
        assert_eq!(
            rx.recv().await.unwrap(),
            vec![(String::from("user"), str_value("alice"))]
        );

        // The alias routes to the same subcommand.
        dispatcher.execute(1, "guild m bob").await.unwrap();
        assert_eq!(
            rx.recv().await.unwrap(),
            vec![(String::from("user"), str_value("bob"))]
        );
    }

    #[tokio::test]
    async fn test_error_taxonomy() {
        let (executor, _rx) = reporting_executor(&[], &[]);

        let dispatcher = CommandDispatcher::new();
        dispatcher
            .register_command(
                Command::new("kick").usage(
                    CommandUsage::new()
                        .parameter(Parameter::required("target", types::word()))
                        .executor(executor),
                ),
            )
            .unwrap();

        assert_eq!(
            dispatcher.execute(1, "vanish").await.unwrap_err(),
            Error::UnknownCommand(String::from("vanish"))
        );

        assert!(matches!(
            dispatcher.execute(1, "kick").await.unwrap_err(),
            Error::MissingArgument { parameter, .. } if parameter == "target"
        ));

        assert!(matches!(
            dispatcher.execute(1, "kick a b").await.unwrap_err(),
            Error::InvalidSyntax { .. }
        ));
    }

    #[tokio::test]
    async fn test_parse_error_carries_token() {
        let (executor, _rx) = reporting_executor(&[], &[]);

        let dispatcher = CommandDispatcher::new();
        dispatcher
            .register_command(
                Command::new("slot").usage(
                    CommandUsage::new()
                        .parameter(Parameter::required("index", types::int()))
                        .executor(executor),
                ),
            )
            .unwrap();

        assert_eq!(
            dispatcher.execute(1, "slot third").await.unwrap_err(),
            Error::Parse {
                token: String::from("third"),
                expected: String::from("int"),
            }
        );
    }

    #[tokio::test]
    async fn test_permission_gate() {
        let (executor, _rx) = reporting_executor(&[], &[]);

        let mut dispatcher = CommandDispatcher::new();
        dispatcher.set_permission_checker(Arc::new(|source: &u64, permission: &str| {
            *source == 42 && permission == "server.stop"
        }));
        dispatcher
            .register_command(
                Command::new("stop")
                    .permission(legate::PermissionCondition::has("server.stop"))
                    .usage(CommandUsage::new().executor(executor)),
            )
            .unwrap();

        assert_eq!(
            dispatcher.execute(1, "stop").await.unwrap_err(),
            Error::PermissionDenied
        );
        assert!(dispatcher.execute(42, "stop").await.is_ok());
    }

    #[tokio::test]
    async fn test_cooldown_gate() {
        let (executor, _rx) = reporting_executor(&[], &[]);

        let dispatcher = CommandDispatcher::new();
        dispatcher
            .register_command(
                Command::new("daily").usage(
                    CommandUsage::new()
                        .cooldown(Duration::from_secs(3600))
                        .executor(executor),
                ),
            )
            .unwrap();

        assert!(dispatcher.execute(1, "daily").await.is_ok());
        assert!(matches!(
            dispatcher.execute(1, "daily").await.unwrap_err(),
            Error::CooldownActive { .. }
        ));

        // Another source is unaffected.
        assert!(dispatcher.execute(2, "daily").await.is_ok());
    }

    #[tokio::test]
    async fn test_flag_out_of_scope() {
        let (executor, _rx) = reporting_executor(&[], &[]);
        let (other, _rx2) = reporting_executor(&[], &[]);

        let dispatcher = CommandDispatcher::new();
        dispatcher
            .register_command(
                Command::new("warn")
                    .usage(
                        CommandUsage::new()
                            .parameter(Parameter::required("name", types::word()))
                            .parameter(Parameter::switch("silent"))
                            .executor(executor),
                    )
                    .usage(
                        CommandUsage::new()
                            .parameter(Parameter::required("count", types::int()))
                            .executor(other),
                    ),
            )
            .unwrap();

        // `-silent` is registered on the string usage only.
        assert_eq!(
            dispatcher.execute(1, "warn 3 -silent").await.unwrap_err(),
            Error::FlagOutOfScope {
                flag: String::from("silent")
            }
        );
    }

    #[tokio::test]
    async fn test_registration_rejects_broken_definitions() {
        let dispatcher: CommandDispatcher<u64> = CommandDispatcher::new();

        let ambiguous: Command<u64> = Command::new("a")
            .usage(CommandUsage::new().parameter(Parameter::required("x", types::word())))
            .usage(CommandUsage::new().parameter(Parameter::required("y", types::word())));
        assert!(matches!(
            dispatcher.register_command(ambiguous).unwrap_err(),
            RegistrationError::AmbiguousUsages { .. }
        ));

        let greedy: Command<u64> = Command::new("b").usage(
            CommandUsage::new()
                .parameter(Parameter::required("message", types::word()).greedy())
                .parameter(Parameter::required("suffix", types::word())),
        );
        assert!(matches!(
            dispatcher.register_command(greedy).unwrap_err(),
            RegistrationError::GreedyNotLast { .. }
        ));
    }

    #[tokio::test]
    async fn test_unregister_command() {
        let (executor, _rx) = reporting_executor(&[], &[]);

        let dispatcher = CommandDispatcher::new();
        dispatcher
            .register_command(Command::new("ping").usage(CommandUsage::new().executor(executor)))
            .unwrap();

        assert!(dispatcher.execute(1, "ping").await.is_ok());

        dispatcher.unregister_command("ping").unwrap();
        assert_eq!(
            dispatcher.execute(1, "ping").await.unwrap_err(),
            Error::UnknownCommand(String::from("ping"))
        );
        assert_eq!(
            dispatcher.unregister_command("ping").unwrap_err(),
            RegistrationError::NotRegistered(String::from("ping"))
        );
    }

    #[tokio::test]
    async fn test_validator_rejects_resolved_value() {
        struct MaxLen(usize);

        impl legate::Validator for MaxLen {
            fn validate(&self, parameter: &str, value: &Value) -> legate::Result<()> {
                match value.as_str() {
                    Some(s) if s.len() > self.0 => Err(Error::Validation {
                        parameter: parameter.to_string(),
                        message: format!("longer than {} characters", self.0),
                    }),
                    _ => Ok(()),
                }
            }
        }

        let (executor, _rx) = reporting_executor(&[], &[]);

        let dispatcher = CommandDispatcher::new();
        dispatcher
            .register_command(
                Command::new("nick").usage(
                    CommandUsage::new()
                        .parameter(
                            Parameter::required("name", types::word())
                                .validator(Arc::new(MaxLen(8))),
                        )
                        .executor(executor),
                ),
            )
            .unwrap();

        assert!(dispatcher.execute(1, "nick shorty").await.is_ok());
        assert!(matches!(
            dispatcher.execute(1, "nick far-too-long-name").await.unwrap_err(),
            Error::Validation { parameter, .. } if parameter == "name"
        ));
    }

    #[tokio::test]
    async fn test_default_supplier_runs_per_invocation() {
        use std::sync::atomic::{AtomicU32, Ordering};

        static COUNTER: AtomicU32 = AtomicU32::new(0);

        let (executor, mut rx) = reporting_executor(&["label"], &[]);

        let dispatcher = CommandDispatcher::new();
        dispatcher
            .register_command(
                Command::new("tag").usage(
                    CommandUsage::new()
                        .parameter(Parameter::optional("label", types::word()).default_supplier(
                            || format!("tag-{}", COUNTER.fetch_add(1, Ordering::SeqCst)),
                        ))
                        .executor(executor),
                ),
            )
            .unwrap();

        dispatcher.execute(1, "tag").await.unwrap();
        dispatcher.execute(1, "tag").await.unwrap();

        assert_eq!(
            rx.recv().await.unwrap(),
            vec![(String::from("label"), str_value("tag-0"))]
        );
        assert_eq!(
            rx.recv().await.unwrap(),
            vec![(String::from("label"), str_value("tag-1"))]
        );
    }

    #[tokio::test]
    async fn test_strict_positional_order_without_skipping() {
        let mut config = crate::EngineConfig::default();
        config.middle_optional_skipping = false;

        let (executor, _rx) = reporting_executor(&[], &[]);

        let dispatcher = CommandDispatcher::with_config(config);
        dispatcher
            .register_command(
                Command::new("pay").usage(
                    CommandUsage::new()
                        .parameter(Parameter::optional("amount", types::int()).default_value("0"))
                        .parameter(Parameter::optional("note", types::word()).default_value("none"))
                        .executor(executor),
                ),
            )
            .unwrap();

        // With skipping disabled the first optional must consume the
        // token, so a non-integer is a parse error.
        assert!(matches!(
            dispatcher.execute(1, "pay hello").await.unwrap_err(),
            Error::Parse { token, .. } if token == "hello"
        ));
    }

    #[tokio::test]
    async fn test_auto_complete_command_labels() {
        let (executor, _rx) = reporting_executor(&[], &[]);

        let dispatcher = CommandDispatcher::new();
        dispatcher
            .register_command(
                Command::new("ban").alias("banish").usage(
                    CommandUsage::new()
                        .parameter(
                            Parameter::required("target", types::word())
                                .suggestions(legate::StaticSuggestions::new(["alice", "bob"])),
                        )
                        .executor(executor),
                ),
            )
            .unwrap();

        assert_eq!(
            dispatcher.auto_complete(&1, "ba").await,
            vec!["ban", "banish"]
        );
        assert_eq!(
            dispatcher.auto_complete(&1, "ban ").await,
            vec!["alice", "bob"]
        );
        assert_eq!(dispatcher.auto_complete(&1, "ban al").await, vec!["alice"]);
    }
}
