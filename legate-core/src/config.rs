use serde::{Deserialize, Serialize};

/// Engine behavior toggles, loadable from a config file.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Match command labels and subcommand literals case-insensitively.
    pub ignore_case: bool,
    /// The character sequence that introduces a flag token.
    pub flag_prefix: String,
    /// Allow an optional parameter in the middle of a usage to pass its
    /// token on to a following optional parameter when the token does
    /// not match its own type.
    pub middle_optional_skipping: bool,
    /// Filter completion candidates by the source's permissions.
    pub check_suggestion_permissions: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            ignore_case: true,
            flag_prefix: String::from("-"),
            middle_optional_skipping: true,
            check_suggestion_permissions: true,
        }
    }
}

impl EngineConfig {
    /// Returns whether a raw token is flag input: the flag prefix
    /// followed by an alphabetic character. The alphabetic requirement
    /// keeps negative numbers out of flag handling.
    pub fn is_flag_token(&self, token: &str) -> bool {
        match token.strip_prefix(&self.flag_prefix) {
            Some(rest) => rest.chars().next().map_or(false, |c| c.is_alphabetic()),
            None => false,
        }
    }

    /// Strips the flag prefix from a token. Returns the token unchanged
    /// when it does not carry the prefix.
    pub fn strip_flag_prefix<'a>(&self, token: &'a str) -> &'a str {
        token.strip_prefix(&self.flag_prefix).unwrap_or(token)
    }
}

#[cfg(test)]
mod tests {
    use super::EngineConfig;

    #[test]
    fn test_flag_token() {
        let config = EngineConfig::default();

        assert!(config.is_flag_token("-silent"));
        assert!(config.is_flag_token("-s"));
        assert!(!config.is_flag_token("-5"));
        assert!(!config.is_flag_token("-"));
        assert!(!config.is_flag_token("silent"));

        assert_eq!(config.strip_flag_prefix("-silent"), "silent");
        assert_eq!(config.strip_flag_prefix("silent"), "silent");
    }
}
