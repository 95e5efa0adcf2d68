//! Registration-time usage verification.
//!
//! Runs once per registration, never during dispatch. Rejected commands
//! indicate a broken definition, so every failure here aborts the whole
//! registration with a descriptive error.

use legate::parameter::Parameter;

use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum RegistrationError {
    #[error("a command with name or alias `{0}` is already registered")]
    DuplicateName(String),
    #[error("command `{0}` is not registered")]
    NotRegistered(String),
    #[error("usages `{first}` and `{second}` cannot be told apart")]
    AmbiguousUsages { first: String, second: String },
    #[error("usage `{usage}` declares more than one greedy parameter")]
    MultipleGreedy { usage: String },
    #[error("greedy parameter `{parameter}` in usage `{usage}` must be the last parameter")]
    GreedyNotLast { parameter: String, usage: String },
    #[error("usage references unknown subcommand `{0}`")]
    UnknownSubCommand(String),
}

/// Formats a positional sequence for error messages.
pub(crate) fn format_sequence<S>(parameters: &[Parameter<S>]) -> String {
    let parts: Vec<_> = parameters.iter().map(|p| p.format()).collect();
    parts.join(" ")
}

/// The number of tokens a sequence cannot do without.
pub(crate) fn min_length<S>(parameters: &[Parameter<S>]) -> usize {
    parameters.iter().filter(|p| p.is_required()).count()
}

/// Verifies a single usage's positional sequence: at most one greedy
/// parameter, and a greedy parameter only in last position. The
/// sequence passed in includes inherited (prefix) parameters.
pub(crate) fn verify_sequence<S>(parameters: &[Parameter<S>]) -> Result<(), RegistrationError> {
    let greedy = parameters.iter().filter(|p| p.greedy).count();
    if greedy > 1 {
        return Err(RegistrationError::MultipleGreedy {
            usage: format_sequence(parameters),
        });
    }

    for (i, parameter) in parameters.iter().enumerate() {
        if parameter.greedy && i != parameters.len() - 1 {
            return Err(RegistrationError::GreedyNotLast {
                parameter: parameter.name.clone(),
                usage: format_sequence(parameters),
            });
        }
    }

    Ok(())
}

/// Verifies that two positional sequences of the same command can be
/// told apart by the dispatcher.
///
/// They cannot when their minimum lengths are equal and, at every
/// position up to that length, both carry the same subcommand or both
/// carry a value parameter of the same type identity. Differing types,
/// differing subcommands or a literal opposite a value parameter all
/// disambiguate.
pub(crate) fn verify_distinct<S>(
    a: &[Parameter<S>],
    b: &[Parameter<S>],
) -> Result<(), RegistrationError> {
    let min = min_length(a);
    if min != min_length(b) {
        return Ok(());
    }

    for position in 0..min {
        let (pa, pb) = (&a[position], &b[position]);

        if pa.is_command() != pb.is_command() {
            return Ok(());
        }
        if pa.type_id() != pb.type_id() {
            return Ok(());
        }
    }

    Err(RegistrationError::AmbiguousUsages {
        first: format_sequence(a),
        second: format_sequence(b),
    })
}

#[cfg(test)]
mod tests {
    use super::{verify_distinct, verify_sequence, RegistrationError};
    use legate::parameter::Parameter;
    use legate::types;

    fn seq(parameters: Vec<Parameter<u64>>) -> Vec<Parameter<u64>> {
        parameters
    }

    #[test]
    fn test_same_type_same_position_rejected() {
        let a = seq(vec![Parameter::required("name", types::word())]);
        let b = seq(vec![Parameter::required("title", types::word())]);

        assert!(matches!(
            verify_distinct(&a, &b).unwrap_err(),
            RegistrationError::AmbiguousUsages { .. }
        ));
    }

    #[test]
    fn test_different_types_accepted() {
        let a = seq(vec![Parameter::required("name", types::word())]);
        let b = seq(vec![Parameter::required("age", types::int())]);

        assert!(verify_distinct(&a, &b).is_ok());
    }

    #[test]
    fn test_different_min_length_accepted() {
        let a = seq(vec![Parameter::required("name", types::word())]);
        let b = seq(vec![
            Parameter::required("name", types::word()),
            Parameter::required("reason", types::word()),
        ]);

        assert!(verify_distinct(&a, &b).is_ok());
    }

    #[test]
    fn test_literal_opposite_value_accepted() {
        let a = seq(vec![
            Parameter::sub_command("list"),
            Parameter::required("page", types::int()),
        ]);
        let b = seq(vec![
            Parameter::required("target", types::word()),
            Parameter::required("page", types::int()),
        ]);

        assert!(verify_distinct(&a, &b).is_ok());
    }

    #[test]
    fn test_all_optional_pair_rejected() {
        // Neither usage needs a token, so empty input cannot choose.
        let a = seq(vec![Parameter::optional("amount", types::int())]);
        let b = seq(vec![Parameter::optional("reason", types::word())]);

        assert!(verify_distinct(&a, &b).is_err());
    }

    #[test]
    fn test_greedy_placement() {
        let ok = seq(vec![
            Parameter::required("name", types::word()),
            Parameter::required("message", types::word()).greedy(),
        ]);
        assert!(verify_sequence(&ok).is_ok());

        let bad = seq(vec![
            Parameter::required("message", types::word()).greedy(),
            Parameter::required("suffix", types::word()),
        ]);
        assert!(matches!(
            verify_sequence(&bad).unwrap_err(),
            RegistrationError::GreedyNotLast { .. }
        ));

        let double = seq(vec![
            Parameter::required("a", types::word()).greedy(),
            Parameter::required("b", types::word()).greedy(),
        ]);
        assert!(matches!(
            verify_sequence(&double).unwrap_err(),
            RegistrationError::MultipleGreedy { .. }
        ));
    }
}
