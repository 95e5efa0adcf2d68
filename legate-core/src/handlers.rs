//! The pipeline's handlers, in chain order.

use legate::context::ExecutionContext;
use legate::parameter::Parameter;
use legate::value::Value;
use legate::{Error, Result};

use crate::cursor::Cursor;
use crate::pipeline::{HandleResult, ParameterHandler, PipelineEnv};

/// Resolves an optional parameter's default, if it has one.
fn resolve_default<S>(parameter: &Parameter<S>) -> Result<Option<Value>> {
    match &parameter.default {
        Some(default) => parameter.resolve(&default.get()).map(Some),
        None => Ok(None),
    }
}

/// Runs a parameter's validators against a resolved value.
pub(crate) fn run_validators<S>(parameter: &Parameter<S>, value: &Value) -> Result<()> {
    for validator in &parameter.validators {
        validator.validate(&parameter.name, value)?;
    }
    Ok(())
}

fn store_default<S>(
    ctx: &mut ExecutionContext<S>,
    cursor: &mut Cursor<S>,
    parameter: &Parameter<S>,
) -> Result<()> {
    if let Some(value) = resolve_default(parameter)? {
        ctx.resolve_argument(&parameter.name, value);
    }
    cursor.skip_parameter();
    Ok(())
}

/// Ends the loop when tokens run out: optionals fall back to their
/// defaults, a required parameter is a missing-argument failure.
pub struct EmptyInputHandler;

impl<S> ParameterHandler<S> for EmptyInputHandler {
    fn handle(
        &self,
        ctx: &mut ExecutionContext<S>,
        cursor: &mut Cursor<S>,
        env: &PipelineEnv<'_, S>,
    ) -> HandleResult {
        let parameter = match cursor.current_parameter() {
            Some(parameter) => parameter.clone(),
            None => return HandleResult::Terminate,
        };

        if cursor.current_raw().is_some() {
            return HandleResult::NextHandler;
        }

        if parameter.optional {
            return match store_default(ctx, cursor, &parameter) {
                Ok(()) => HandleResult::NextIteration,
                Err(err) => HandleResult::Failure(err),
            };
        }

        if parameter.is_command() {
            return HandleResult::Failure(Error::InvalidSyntax {
                usage: env.usage.to_string(),
            });
        }

        HandleResult::Failure(Error::MissingArgument {
            parameter: parameter.name,
            usage: env.usage.to_string(),
        })
    }
}

/// Consumes subcommand steps, switching the active command deeper into
/// the tree.
pub struct SubCommandHandler;

impl<S> ParameterHandler<S> for SubCommandHandler {
    fn handle(
        &self,
        _ctx: &mut ExecutionContext<S>,
        cursor: &mut Cursor<S>,
        env: &PipelineEnv<'_, S>,
    ) -> HandleResult {
        let parameter = match cursor.current_parameter() {
            Some(parameter) => parameter.clone(),
            None => return HandleResult::Terminate,
        };
        let raw = match cursor.current_raw() {
            Some(raw) => raw.to_string(),
            None => return HandleResult::NextHandler,
        };

        if !parameter.is_command() {
            return HandleResult::NextHandler;
        }

        if parameter.matches_input(&raw, env.config.ignore_case) {
            cursor.advance();
            HandleResult::NextIteration
        } else {
            HandleResult::Failure(Error::UnknownSubCommand(raw))
        }
    }
}

/// Consumes one token for the current required parameter.
pub struct RequiredParameterHandler;

impl<S> ParameterHandler<S> for RequiredParameterHandler {
    fn handle(
        &self,
        ctx: &mut ExecutionContext<S>,
        cursor: &mut Cursor<S>,
        env: &PipelineEnv<'_, S>,
    ) -> HandleResult {
        let parameter = match cursor.current_parameter() {
            Some(parameter) => parameter.clone(),
            None => return HandleResult::Terminate,
        };
        let raw = match cursor.current_raw() {
            Some(raw) => raw.to_string(),
            None => return HandleResult::NextHandler,
        };

        if parameter.optional {
            return HandleResult::NextHandler;
        }

        if !parameter.permission.is_true()
            && !parameter.permission.evaluate(&ctx.source, env.checker)
        {
            return HandleResult::Failure(Error::PermissionDenied);
        }

        let resolved = if parameter.greedy {
            Ok(Value::Str(cursor.join_remaining()))
        } else {
            parameter.resolve(&raw)
        };

        match resolved.and_then(|value| {
            run_validators(&parameter, &value)?;
            Ok(value)
        }) {
            Ok(value) => {
                ctx.resolve_argument(&parameter.name, value);
                if parameter.greedy {
                    cursor.skip_parameter();
                } else {
                    cursor.advance();
                }
                HandleResult::NextIteration
            }
            Err(err) => HandleResult::Failure(err),
        }
    }
}

/// The most intricate handler: decides whether the current optional
/// parameter consumes the token, or defaults and passes the token on.
///
/// In order: a token is reserved for pending required parameters when
/// they outnumber the remaining tokens; a type-matching token is
/// consumed; a mismatching token is offered to an immediately following
/// optional parameter (when enabled); otherwise the parameter consumes
/// the token and falls back to its default when parsing fails.
pub struct OptionalParameterHandler;

impl<S> ParameterHandler<S> for OptionalParameterHandler {
    fn handle(
        &self,
        ctx: &mut ExecutionContext<S>,
        cursor: &mut Cursor<S>,
        env: &PipelineEnv<'_, S>,
    ) -> HandleResult {
        let parameter = match cursor.current_parameter() {
            Some(parameter) => parameter.clone(),
            None => return HandleResult::Terminate,
        };
        let raw = match cursor.current_raw() {
            Some(raw) => raw.to_string(),
            None => return HandleResult::NextHandler,
        };

        if !parameter.optional {
            return HandleResult::NextHandler;
        }

        // A parameter the source may not use behaves as if absent.
        if !parameter.permission.is_true()
            && !parameter.permission.evaluate(&ctx.source, env.checker)
        {
            return match store_default(ctx, cursor, &parameter) {
                Ok(()) => HandleResult::NextIteration,
                Err(err) => HandleResult::Failure(err),
            };
        }

        // Pending required parameters outnumber the remaining tokens:
        // this token is reserved for them.
        if cursor.remaining_required_after_current() > cursor.remaining_raws_after_current() {
            return match store_default(ctx, cursor, &parameter) {
                Ok(()) => HandleResult::NextIteration,
                Err(err) => HandleResult::Failure(err),
            };
        }

        if parameter.greedy {
            let value = Value::Str(cursor.join_remaining());
            if let Err(err) = run_validators(&parameter, &value) {
                return HandleResult::Failure(err);
            }
            ctx.resolve_argument(&parameter.name, value);
            cursor.skip_parameter();
            return HandleResult::NextIteration;
        }

        // With skipping disabled, positional order is strict: the
        // parameter must consume the token and parse failures surface.
        if !env.config.middle_optional_skipping {
            return match consume(ctx, cursor, &parameter, &raw) {
                Ok(()) => HandleResult::NextIteration,
                Err(err) => HandleResult::Failure(err),
            };
        }

        if parameter.matches_input(&raw, env.config.ignore_case) {
            return match consume(ctx, cursor, &parameter, &raw) {
                Ok(()) => HandleResult::NextIteration,
                Err(err) => HandleResult::Failure(err),
            };
        }

        // Offer the mismatching token to the immediately following
        // optional parameter.
        if let Some(next) = cursor.peek_parameter(1) {
            if next.optional && next.matches_input(&raw, env.config.ignore_case) {
                return match store_default(ctx, cursor, &parameter) {
                    Ok(()) => HandleResult::NextIteration,
                    Err(err) => HandleResult::Failure(err),
                };
            }
        }

        // No better match downstream; consume anyway and fall back to
        // the default when parsing fails, leaving the token in place.
        match consume(ctx, cursor, &parameter, &raw) {
            Ok(()) => HandleResult::NextIteration,
            Err(_) => match store_default(ctx, cursor, &parameter) {
                Ok(()) => HandleResult::NextIteration,
                Err(err) => HandleResult::Failure(err),
            },
        }
    }
}

/// Resolves and stores one token for an optional parameter.
fn consume<S>(
    ctx: &mut ExecutionContext<S>,
    cursor: &mut Cursor<S>,
    parameter: &Parameter<S>,
    raw: &str,
) -> Result<()> {
    let value = parameter.resolve(raw)?;
    run_validators(parameter, &value)?;
    ctx.resolve_argument(&parameter.name, value);
    cursor.advance();
    Ok(())
}
