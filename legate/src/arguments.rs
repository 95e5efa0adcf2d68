use std::fmt::{self, Display, Formatter};
use std::iter::FromIterator;
use std::mem;
use std::ops::Deref;

/// Splits a raw input line into tokens.
///
/// Tokens are separated by whitespace. Double quotes group multiple
/// words into a single token; the quotes themselves are stripped. An
/// unterminated quote extends to the end of the line. Empty tokens are
/// discarded.
pub fn parse_line(input: &str) -> OwnedArguments {
    let mut args = OwnedArguments::new();

    let mut current = String::new();
    let mut quoted = false;
    for c in input.chars() {
        match c {
            '"' => {
                if quoted && !current.is_empty() {
                    args.push(mem::take(&mut current));
                }
                quoted = !quoted;
            }
            c if c.is_whitespace() && !quoted => {
                if !current.is_empty() {
                    args.push(mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }

    if !current.is_empty() {
        args.push(current);
    }

    args
}

/// A list of owned raw tokens.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OwnedArguments(Vec<String>);

impl OwnedArguments {
    /// Creates a new empty `OwnedArguments` list.
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Appends a new token at the end of the list.
    pub fn push(&mut self, item: String) {
        self.0.push(item);
    }

    /// Returns the tokens as a string slice vector, mainly useful in
    /// assertions.
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<String> {
        self.0
    }
}

impl Deref for OwnedArguments {
    type Target = [String];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<Vec<String>> for OwnedArguments {
    fn from(args: Vec<String>) -> Self {
        Self(args)
    }
}

impl<I> FromIterator<I> for OwnedArguments
where
    I: ToString,
{
    fn from_iter<T>(iter: T) -> Self
    where
        T: IntoIterator<Item = I>,
    {
        Self(iter.into_iter().map(|item| item.to_string()).collect())
    }
}

impl<'a, T> PartialEq<T> for OwnedArguments
where
    T: AsRef<[&'a str]>,
{
    fn eq(&self, other: &T) -> bool {
        self.0 == other.as_ref()
    }
}

impl Display for OwnedArguments {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::parse_line;

    #[test]
    fn test_parse_line() {
        let args = parse_line("ban griefer 7d");
        assert_eq!(args, vec!["ban", "griefer", "7d"]);

        let args = parse_line("  ban   griefer ");
        assert_eq!(args, vec!["ban", "griefer"]);

        let args = parse_line("");
        assert!(args.is_empty());
    }

    #[test]
    fn test_parse_line_quoted() {
        let args = parse_line("say \"hello world\" now");
        assert_eq!(args, vec!["say", "hello world", "now"]);

        // Unterminated quotes extend to the end of the line.
        let args = parse_line("say \"hello world");
        assert_eq!(args, vec!["say", "hello world"]);

        let args = parse_line("say \"\"");
        assert_eq!(args, vec!["say"]);
    }
}
