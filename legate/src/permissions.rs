use std::fmt::{self, Display, Formatter};

use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("unbalanced parentheses in condition text")]
    UnbalancedParens,
    #[error("`!` must have a target")]
    EmptyNot,
}

/// Checks whether a source holds a single permission node.
///
/// The engine never interprets permission strings itself; every leaf of a
/// [`PermissionCondition`] is delegated to this function. Any
/// `Fn(&S, &str) -> bool` closure qualifies.
pub trait PermissionChecker<S>: Send + Sync {
    fn has_permission(&self, source: &S, permission: &str) -> bool;
}

impl<S, F> PermissionChecker<S> for F
where
    F: Fn(&S, &str) -> bool + Send + Sync,
{
    fn has_permission(&self, source: &S, permission: &str) -> bool {
        self(source, permission)
    }
}

/// A boolean expression over permission nodes.
///
/// Built either through the fluent [`and`]/[`or`]/[`not`] methods or by
/// parsing the text grammar `a & b`, `a | b`, `!a` with `(...)` grouping
/// (precedence low to high: OR, AND, NOT). Immutable once built.
///
/// [`and`]: Self::and
/// [`or`]: Self::or
/// [`not`]: Self::not
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PermissionCondition {
    /// Always satisfied. The condition of an unrestricted command.
    True,
    Leaf(String),
    And(Vec<PermissionCondition>),
    Or(Vec<PermissionCondition>),
    Not(Box<PermissionCondition>),
}

impl PermissionCondition {
    /// A condition satisfied when the source holds `permission`.
    pub fn has<T>(permission: T) -> Self
    where
        T: ToString,
    {
        Self::Leaf(permission.to_string())
    }

    /// A condition satisfied when the source holds every listed permission.
    pub fn all<I, T>(permissions: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: ToString,
    {
        let mut children: Vec<_> = permissions.into_iter().map(Self::has).collect();
        match children.len() {
            0 => Self::True,
            1 => children.remove(0),
            _ => Self::And(children),
        }
    }

    /// A condition satisfied when the source holds any listed permission.
    pub fn any<I, T>(permissions: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: ToString,
    {
        let mut children: Vec<_> = permissions.into_iter().map(Self::has).collect();
        match children.len() {
            0 => Self::True,
            1 => children.remove(0),
            _ => Self::Or(children),
        }
    }

    pub fn and(self, other: Self) -> Self {
        match self {
            Self::And(mut children) => {
                children.push(other);
                Self::And(children)
            }
            _ => Self::And(vec![self, other]),
        }
    }

    pub fn or(self, other: Self) -> Self {
        match self {
            Self::Or(mut children) => {
                children.push(other);
                Self::Or(children)
            }
            _ => Self::Or(vec![self, other]),
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Self {
        Self::Not(Box::new(self))
    }

    pub fn is_true(&self) -> bool {
        matches!(self, Self::True)
    }

    /// Parses the text grammar.
    ///
    /// Splits top-level occurrences of each operator outside balanced
    /// parentheses, scanning left to right at paren depth 0, after
    /// stripping redundant fully-wrapping outer parentheses. An empty
    /// string parses to [`PermissionCondition::True`].
    pub fn from_text(text: &str) -> Result<Self, ParseError> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(Self::True);
        }

        let text = strip_outer_parens(text)?;

        // OR binds loosest.
        let parts = split_outside_parens(text, '|')?;
        if parts.len() > 1 {
            let children = parts
                .into_iter()
                .map(Self::from_text)
                .collect::<Result<_, _>>()?;
            return Ok(Self::Or(children));
        }

        let parts = split_outside_parens(text, '&')?;
        if parts.len() > 1 {
            let children = parts
                .into_iter()
                .map(Self::from_text)
                .collect::<Result<_, _>>()?;
            return Ok(Self::And(children));
        }

        // NOT binds tightest.
        if let Some(target) = text.strip_prefix('!') {
            let target = target.trim();
            if target.is_empty() {
                return Err(ParseError::EmptyNot);
            }
            return Ok(Self::Not(Box::new(Self::from_text(target)?)));
        }

        Ok(Self::Leaf(text.to_string()))
    }

    /// Evaluates the condition against a checker.
    ///
    /// The checker is assumed side-effect free, so short-circuiting is
    /// indistinguishable from full evaluation.
    pub fn evaluate<S>(&self, source: &S, checker: &dyn PermissionChecker<S>) -> bool {
        match self {
            Self::True => true,
            Self::Leaf(permission) => checker.has_permission(source, permission),
            Self::And(children) => children.iter().all(|c| c.evaluate(source, checker)),
            Self::Or(children) => children.iter().any(|c| c.evaluate(source, checker)),
            Self::Not(child) => !child.evaluate(source, checker),
        }
    }

    /// Collects every permission node mentioned in the condition tree.
    pub fn permissions(&self) -> Vec<&str> {
        let mut nodes = Vec::new();
        self.collect_permissions(&mut nodes);
        nodes
    }

    fn collect_permissions<'a>(&'a self, nodes: &mut Vec<&'a str>) {
        match self {
            Self::True => {}
            Self::Leaf(permission) => nodes.push(permission),
            Self::And(children) | Self::Or(children) => {
                for child in children {
                    child.collect_permissions(nodes);
                }
            }
            Self::Not(child) => child.collect_permissions(nodes),
        }
    }
}

impl Default for PermissionCondition {
    fn default() -> Self {
        Self::True
    }
}

impl Display for PermissionCondition {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::True => write!(f, "TRUE"),
            Self::Leaf(permission) => write!(f, "{}", permission),
            Self::And(children) => {
                let parts: Vec<_> = children.iter().map(ToString::to_string).collect();
                write!(f, "({})", parts.join(" & "))
            }
            Self::Or(children) => {
                let parts: Vec<_> = children.iter().map(ToString::to_string).collect();
                write!(f, "({})", parts.join(" | "))
            }
            Self::Not(child) => write!(f, "(!{})", child),
        }
    }
}

fn split_outside_parens(text: &str, symbol: char) -> Result<Vec<&str>, ParseError> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut last_split = 0;

    for (i, c) in text.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth < 0 {
                    return Err(ParseError::UnbalancedParens);
                }
            }
            c if c == symbol && depth == 0 => {
                parts.push(text[last_split..i].trim());
                last_split = i + c.len_utf8();
            }
            _ => (),
        }
    }

    if depth != 0 {
        return Err(ParseError::UnbalancedParens);
    }

    parts.push(text[last_split..].trim());
    Ok(parts)
}

fn strip_outer_parens(mut text: &str) -> Result<&str, ParseError> {
    while text.len() >= 2 && text.starts_with('(') && text.ends_with(')') {
        let mut depth = 0i32;
        let mut wraps = true;

        for (i, c) in text.char_indices() {
            match c {
                '(' => depth += 1,
                ')' => depth -= 1,
                _ => (),
            }
            if depth < 0 {
                return Err(ParseError::UnbalancedParens);
            }
            if depth == 0 && i < text.len() - 1 {
                wraps = false;
                break;
            }
        }

        if !wraps {
            break;
        }
        text = text[1..text.len() - 1].trim();
    }

    Ok(text)
}
