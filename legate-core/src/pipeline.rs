//! The parameter resolution pipeline.
//!
//! A fixed chain of handlers runs once per iteration of the main loop;
//! each handler either falls through to the next, restarts the chain for
//! the next parameter, terminates, or fails the whole dispatch with a
//! typed error. After the positional loop a second pass resolves flags
//! out of order and fills in their defaults.

use legate::context::ExecutionContext;
use legate::permissions::PermissionChecker;
use legate::value::Value;
use legate::{Error, Result};

use crate::config::EngineConfig;
use crate::cursor::Cursor;
use crate::flags::{validate_shorthand, FlagExtractor};
use crate::handlers::{
    run_validators, EmptyInputHandler, OptionalParameterHandler, RequiredParameterHandler,
    SubCommandHandler,
};

/// The outcome of one handler invocation.
pub enum HandleResult {
    /// Stop the pipeline, resolution is complete.
    Terminate,
    /// Restart the chain for the next parameter or token.
    NextIteration,
    /// Fall through to the next handler in the chain.
    NextHandler,
    /// Abort the dispatch.
    Failure(Error),
}

/// Everything a handler may consult besides the context and the cursor.
pub struct PipelineEnv<'a, S> {
    pub config: &'a EngineConfig,
    /// The active usage's flag automaton.
    pub flags: &'a FlagExtractor<S>,
    /// Every flag registered on the command, for scope errors.
    pub all_flags: &'a FlagExtractor<S>,
    pub checker: &'a dyn PermissionChecker<S>,
    /// The formatted usage, carried into error payloads.
    pub usage: &'a str,
}

pub trait ParameterHandler<S>: Send + Sync {
    fn handle(
        &self,
        ctx: &mut ExecutionContext<S>,
        cursor: &mut Cursor<S>,
        env: &PipelineEnv<'_, S>,
    ) -> HandleResult;
}

/// The handler chain, executed in fixed order per pipeline iteration.
pub struct ParameterChain<S> {
    handlers: Vec<Box<dyn ParameterHandler<S>>>,
}

impl<S> ParameterChain<S> {
    /// The default chain: empty input, subcommands, required
    /// parameters, optional parameters.
    pub fn new() -> Self {
        Self {
            handlers: vec![
                Box::new(EmptyInputHandler),
                Box::new(SubCommandHandler),
                Box::new(RequiredParameterHandler),
                Box::new(OptionalParameterHandler),
            ],
        }
    }

    /// Walks the cursor through every parameter, then resolves flags.
    pub fn execute(
        &self,
        ctx: &mut ExecutionContext<S>,
        cursor: &mut Cursor<S>,
        env: &PipelineEnv<'_, S>,
    ) -> Result<()> {
        'pipeline: while cursor.current_parameter().is_some() {
            for handler in &self.handlers {
                match handler.handle(ctx, cursor, env) {
                    HandleResult::Terminate => break 'pipeline,
                    HandleResult::NextIteration => continue 'pipeline,
                    HandleResult::NextHandler => (),
                    HandleResult::Failure(err) => return Err(err),
                }
            }

            // Every handler fell through; nothing can make progress.
            break;
        }

        if cursor.current_raw().is_some() {
            return Err(Error::InvalidSyntax {
                usage: env.usage.to_string(),
            });
        }

        resolve_flags(ctx, cursor.raws(), env)
    }
}

impl<S> Default for ParameterChain<S> {
    fn default() -> Self {
        Self::new()
    }
}

/// The flag pass: scans every raw token for flag input, resolves the
/// named flags against the active usage, enforces shorthand homogeneity
/// and fills defaults for absent flags.
fn resolve_flags<S>(
    ctx: &mut ExecutionContext<S>,
    raws: &[String],
    env: &PipelineEnv<'_, S>,
) -> Result<()> {
    let mut i = 0;
    while i < raws.len() {
        let raw = &raws[i];
        if !env.config.is_flag_token(raw) {
            i += 1;
            continue;
        }

        let stripped = env.config.strip_flag_prefix(raw);
        let extracted = match env.flags.extract(stripped) {
            Ok(extracted) => extracted,
            Err(_) => {
                // Known on the command but not on this usage?
                if env.all_flags.extract(stripped).is_ok() {
                    return Err(Error::FlagOutOfScope {
                        flag: stripped.to_string(),
                    });
                }
                // Unknown everywhere: the token was treated as
                // positional input.
                i += 1;
                continue;
            }
        };

        let all_switches = validate_shorthand(&extracted)?;

        if all_switches {
            for parameter in extracted {
                ctx.resolve_flag(&parameter.name, Value::Bool(true));
            }
            i += 1;
        } else {
            // Value flags share the following token as their input.
            let value_token = raws.get(i + 1).ok_or_else(|| Error::MissingFlagValue {
                flag: stripped.to_string(),
            })?;

            for parameter in extracted {
                let value = parameter.resolve(value_token)?;
                run_validators(parameter, &value)?;
                ctx.resolve_flag(&parameter.name, value);
            }
            i += 2;
        }
    }

    // Registered flags absent from the input fall back to defaults.
    for parameter in env.flags.registered() {
        if ctx.has_flag(&parameter.name) {
            continue;
        }

        if parameter.is_switch() {
            ctx.resolve_flag(&parameter.name, Value::Bool(false));
        } else if let Some(default) = &parameter.default {
            let value = parameter.resolve(&default.get())?;
            ctx.resolve_flag(&parameter.name, value);
        }
    }

    Ok(())
}
