//! Parameter value types.
//!
//! A [`ParameterType`] turns one raw token into a typed [`Value`] and
//! answers whether a token even looks like the type (used by the
//! optional-parameter disambiguation and by tree traversal). The set is
//! open: implement the trait for domain types and hand the engine an
//! `Arc` of it.

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::value::Value;

pub trait ParameterType: Send + Sync {
    /// A stable identity for the type, compared by the ambiguity
    /// verifier and the shorthand-flag homogeneity rule.
    fn name(&self) -> &str;

    /// Resolves a single raw token into a value.
    fn resolve(&self, token: &str) -> Result<Value>;

    /// Returns whether a token is acceptable input, without resolving it.
    fn matches_input(&self, token: &str) -> bool {
        self.resolve(token).is_ok()
    }

    /// Ordering weight among sibling parameters during dispatch; lower
    /// weights are tried first. Types that accept any token should stay
    /// near the end so specific types get the token first.
    fn priority(&self) -> u8 {
        50
    }

    /// Static completion candidates for the type.
    fn suggestions(&self) -> Vec<String> {
        Vec::new()
    }
}

/// A single-word string. Accepts any token.
pub struct WordType;

impl ParameterType for WordType {
    fn name(&self) -> &str {
        "string"
    }

    fn resolve(&self, token: &str) -> Result<Value> {
        Ok(Value::Str(token.to_string()))
    }

    fn matches_input(&self, _token: &str) -> bool {
        true
    }

    fn priority(&self) -> u8 {
        100
    }
}

/// A signed integer, optionally restricted to an inclusive range.
#[derive(Default)]
pub struct IntType {
    min: Option<i64>,
    max: Option<i64>,
}

impl IntType {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ranged(min: i64, max: i64) -> Self {
        Self {
            min: Some(min),
            max: Some(max),
        }
    }
}

impl ParameterType for IntType {
    fn name(&self) -> &str {
        "int"
    }

    fn resolve(&self, token: &str) -> Result<Value> {
        let value: i64 = token.parse().map_err(|_| Error::Parse {
            token: token.to_string(),
            expected: self.name().to_string(),
        })?;

        if self.min.map_or(false, |min| value < min) || self.max.map_or(false, |max| value > max) {
            return Err(Error::Parse {
                token: token.to_string(),
                expected: format!(
                    "int in {}..={}",
                    self.min.unwrap_or(i64::MIN),
                    self.max.unwrap_or(i64::MAX)
                ),
            });
        }

        Ok(Value::Int(value))
    }
}

pub struct FloatType;

impl ParameterType for FloatType {
    fn name(&self) -> &str {
        "float"
    }

    fn resolve(&self, token: &str) -> Result<Value> {
        let value: f64 = token.parse().map_err(|_| Error::Parse {
            token: token.to_string(),
            expected: self.name().to_string(),
        })?;

        Ok(Value::Float(value))
    }
}

pub struct BoolType;

impl ParameterType for BoolType {
    fn name(&self) -> &str {
        "bool"
    }

    fn resolve(&self, token: &str) -> Result<Value> {
        match token.to_ascii_lowercase().as_str() {
            "true" | "yes" | "on" => Ok(Value::Bool(true)),
            "false" | "no" | "off" => Ok(Value::Bool(false)),
            _ => Err(Error::Parse {
                token: token.to_string(),
                expected: self.name().to_string(),
            }),
        }
    }

    fn suggestions(&self) -> Vec<String> {
        vec![String::from("true"), String::from("false")]
    }
}

/// A closed set of named variants. Resolution is case-insensitive and
/// yields the canonical variant spelling.
pub struct EnumType {
    name: String,
    variants: Vec<String>,
}

impl EnumType {
    pub fn new<T, I, V>(name: T, variants: I) -> Self
    where
        T: ToString,
        I: IntoIterator<Item = V>,
        V: ToString,
    {
        Self {
            name: name.to_string(),
            variants: variants.into_iter().map(|v| v.to_string()).collect(),
        }
    }
}

impl ParameterType for EnumType {
    fn name(&self) -> &str {
        &self.name
    }

    fn resolve(&self, token: &str) -> Result<Value> {
        self.variants
            .iter()
            .find(|v| v.eq_ignore_ascii_case(token))
            .map(|v| Value::Str(v.clone()))
            .ok_or_else(|| Error::Parse {
                token: token.to_string(),
                expected: format!("{} ({})", self.name, self.variants.join("|")),
            })
    }

    fn suggestions(&self) -> Vec<String> {
        self.variants.clone()
    }
}

pub fn word() -> Arc<dyn ParameterType> {
    Arc::new(WordType)
}

pub fn int() -> Arc<dyn ParameterType> {
    Arc::new(IntType::new())
}

pub fn int_range(min: i64, max: i64) -> Arc<dyn ParameterType> {
    Arc::new(IntType::ranged(min, max))
}

pub fn float() -> Arc<dyn ParameterType> {
    Arc::new(FloatType)
}

pub fn boolean() -> Arc<dyn ParameterType> {
    Arc::new(BoolType)
}

pub fn enumeration<T, I, V>(name: T, variants: I) -> Arc<dyn ParameterType>
where
    T: ToString,
    I: IntoIterator<Item = V>,
    V: ToString,
{
    Arc::new(EnumType::new(name, variants))
}

#[cfg(test)]
mod tests {
    use super::{BoolType, EnumType, IntType, ParameterType, WordType};
    use crate::error::Error;
    use crate::value::Value;

    #[test]
    fn test_int_resolve() {
        let kind = IntType::new();
        assert_eq!(kind.resolve("42").unwrap(), Value::Int(42));
        assert_eq!(kind.resolve("-3").unwrap(), Value::Int(-3));
        assert!(matches!(
            kind.resolve("4x").unwrap_err(),
            Error::Parse { .. }
        ));

        let kind = IntType::ranged(1, 64);
        assert!(kind.resolve("65").is_err());
        assert!(kind.matches_input("64"));
        assert!(!kind.matches_input("0"));
    }

    #[test]
    fn test_word_matches_everything() {
        assert!(WordType.matches_input("anything"));
        assert!(WordType.matches_input("123"));
    }

    #[test]
    fn test_bool_resolve() {
        assert_eq!(BoolType.resolve("TRUE").unwrap(), Value::Bool(true));
        assert_eq!(BoolType.resolve("off").unwrap(), Value::Bool(false));
        assert!(BoolType.resolve("maybe").is_err());
    }

    #[test]
    fn test_enum_resolve() {
        let kind = EnumType::new("gamemode", ["survival", "creative"]);
        assert_eq!(
            kind.resolve("CREATIVE").unwrap(),
            Value::Str(String::from("creative"))
        );
        assert!(kind.resolve("peaceful").is_err());
        assert_eq!(kind.suggestions(), vec!["survival", "creative"]);
    }
}
