use std::time::Duration;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Every way a single dispatch can fail.
///
/// Dispatch never panics on bad user input; handlers return one of these
/// values and the pipeline short-circuits. Each variant carries enough
/// structured data to render a message for the command source.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum Error {
    #[error("unknown command `{0}`")]
    UnknownCommand(String),
    #[error("missing required argument `{parameter}`, usage: {usage}")]
    MissingArgument { parameter: String, usage: String },
    #[error("cannot parse `{token}` as {expected}")]
    Parse { token: String, expected: String },
    #[error("invalid syntax, closest usage: {usage}")]
    InvalidSyntax { usage: String },
    #[error("unknown subcommand `{0}`")]
    UnknownSubCommand(String),
    #[error("unknown flag `{input}`")]
    UnknownFlag { input: String },
    #[error("cannot mix switches and value flags in one shorthand token")]
    ShorthandFlagMix,
    #[error("compressed value flags must share a single input type")]
    ShorthandFlagType,
    #[error("flag `{flag}` requires a value")]
    MissingFlagValue { flag: String },
    #[error("flag `{flag}` is not accepted here")]
    FlagOutOfScope { flag: String },
    #[error("missing permission")]
    PermissionDenied,
    #[error("command is on cooldown for another {remaining:?}")]
    CooldownActive { remaining: Duration },
    #[error("invalid value for `{parameter}`: {message}")]
    Validation { parameter: String, message: String },
    #[error("matched usage has no executor")]
    NoExecutor,
    /// The executor task dropped its response channel, most likely
    /// because the command body panicked.
    #[error("no response")]
    NoResponse,
}
