use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;

use crate::error::Result;
use crate::permissions::PermissionCondition;
use crate::suggestions::SuggestionProvider;
use crate::types::{self, ParameterType};
use crate::value::Value;

/// How a parameter consumes its token.
#[derive(Clone)]
pub enum ParameterKind {
    /// Resolves the token through a value type.
    Value(Arc<dyn ParameterType>),
    /// A nested command reference: the token must be one of the child
    /// command's labels. Aliases are filled in at registration from the
    /// actual child command.
    SubCommand { name: String, aliases: Vec<String> },
}

impl ParameterKind {
    /// A stable identity used by the ambiguity verifier.
    pub fn type_id(&self) -> String {
        match self {
            Self::Value(kind) => kind.name().to_string(),
            Self::SubCommand { name, .. } => format!("command:{}", name),
        }
    }

    pub fn is_command(&self) -> bool {
        matches!(self, Self::SubCommand { .. })
    }
}

impl Debug for ParameterKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(kind) => write!(f, "Value({})", kind.name()),
            Self::SubCommand { name, .. } => write!(f, "SubCommand({})", name),
        }
    }
}

/// The default of an optional parameter, either a fixed raw string or a
/// supplier evaluated per invocation. The raw string is resolved through
/// the parameter's value type like typed input.
#[derive(Clone)]
pub enum DefaultValue {
    Static(String),
    Supplier(Arc<dyn Fn() -> String + Send + Sync>),
}

impl DefaultValue {
    pub fn get(&self) -> String {
        match self {
            Self::Static(value) => value.clone(),
            Self::Supplier(supplier) => supplier(),
        }
    }
}

impl Debug for DefaultValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Static(value) => write!(f, "Static({:?})", value),
            Self::Supplier(_) => write!(f, "Supplier(..)"),
        }
    }
}

/// Flag metadata of a flag or switch parameter.
#[derive(Clone, Debug, Default)]
pub struct FlagSpec {
    pub aliases: Vec<String>,
    /// A switch is set by mere presence and takes no value token; a
    /// "true flag" consumes the next raw token as its value.
    pub switch: bool,
}

/// Checks a resolved value before it is stored, e.g. range or domain
/// rules beyond what the value type enforces.
pub trait Validator: Send + Sync {
    fn validate(&self, parameter: &str, value: &Value) -> Result<()>;
}

/// One position in a usage's signature.
pub struct Parameter<S> {
    pub name: String,
    pub kind: ParameterKind,
    pub optional: bool,
    /// Consumes all remaining raw tokens as one value. Must be the last
    /// parameter of its usage.
    pub greedy: bool,
    pub flag: Option<FlagSpec>,
    pub default: Option<DefaultValue>,
    pub permission: PermissionCondition,
    pub suggestions: Option<Arc<dyn SuggestionProvider<S>>>,
    pub validators: Vec<Arc<dyn Validator>>,
}

impl<S> Parameter<S> {
    fn new(name: impl ToString, kind: ParameterKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            optional: false,
            greedy: false,
            flag: None,
            default: None,
            permission: PermissionCondition::True,
            suggestions: None,
            validators: Vec::new(),
        }
    }

    /// A required positional parameter.
    pub fn required(name: impl ToString, kind: Arc<dyn ParameterType>) -> Self {
        Self::new(name, ParameterKind::Value(kind))
    }

    /// An optional positional parameter without a default.
    pub fn optional(name: impl ToString, kind: Arc<dyn ParameterType>) -> Self {
        let mut parameter = Self::new(name, ParameterKind::Value(kind));
        parameter.optional = true;
        parameter
    }

    /// A value-taking flag (`-name <value>`). Flags are optional and
    /// extracted out of positional order.
    pub fn flag(name: impl ToString, kind: Arc<dyn ParameterType>) -> Self {
        let mut parameter = Self::new(name, ParameterKind::Value(kind));
        parameter.optional = true;
        parameter.flag = Some(FlagSpec {
            aliases: Vec::new(),
            switch: false,
        });
        parameter
    }

    /// A boolean switch (`-name`), true when present.
    pub fn switch(name: impl ToString) -> Self {
        let mut parameter = Self::new(name, ParameterKind::Value(types::boolean()));
        parameter.optional = true;
        parameter.flag = Some(FlagSpec {
            aliases: Vec::new(),
            switch: true,
        });
        parameter
    }

    /// A reference to a child command at this position.
    pub fn sub_command(name: impl ToString) -> Self {
        let name = name.to_string();
        Self::new(
            name.clone(),
            ParameterKind::SubCommand {
                name,
                aliases: Vec::new(),
            },
        )
    }

    pub fn greedy(mut self) -> Self {
        self.greedy = true;
        self
    }

    pub fn default_value(mut self, value: impl ToString) -> Self {
        self.default = Some(DefaultValue::Static(value.to_string()));
        self
    }

    pub fn default_supplier<F>(mut self, supplier: F) -> Self
    where
        F: Fn() -> String + Send + Sync + 'static,
    {
        self.default = Some(DefaultValue::Supplier(Arc::new(supplier)));
        self
    }

    /// Adds a flag alias. Only meaningful on flag and switch parameters.
    pub fn alias(mut self, alias: impl ToString) -> Self {
        if let Some(flag) = &mut self.flag {
            flag.aliases.push(alias.to_string());
        }
        self
    }

    pub fn permission(mut self, condition: PermissionCondition) -> Self {
        self.permission = condition;
        self
    }

    pub fn suggestions(mut self, provider: Arc<dyn SuggestionProvider<S>>) -> Self {
        self.suggestions = Some(provider);
        self
    }

    pub fn validator(mut self, validator: Arc<dyn Validator>) -> Self {
        self.validators.push(validator);
        self
    }

    pub fn is_flag(&self) -> bool {
        self.flag.is_some()
    }

    pub fn is_switch(&self) -> bool {
        self.flag.as_ref().map_or(false, |f| f.switch)
    }

    pub fn is_true_flag(&self) -> bool {
        self.flag.as_ref().map_or(false, |f| !f.switch)
    }

    pub fn is_command(&self) -> bool {
        self.kind.is_command()
    }

    pub fn is_required(&self) -> bool {
        !self.optional && !self.is_flag()
    }

    /// The type identity at this position, used for ambiguity checks and
    /// shorthand-flag homogeneity.
    pub fn type_id(&self) -> String {
        self.kind.type_id()
    }

    /// Dispatch ordering weight among sibling parameters, taken from the
    /// value type.
    pub fn priority(&self) -> u8 {
        match &self.kind {
            ParameterKind::Value(kind) => kind.priority(),
            ParameterKind::SubCommand { .. } => 0,
        }
    }

    /// Returns whether `token` is acceptable input for this parameter.
    pub fn matches_input(&self, token: &str, ignore_case: bool) -> bool {
        if self.greedy {
            return true;
        }

        match &self.kind {
            ParameterKind::Value(kind) => kind.matches_input(token),
            ParameterKind::SubCommand { name, aliases } => {
                label_matches(name, token, ignore_case)
                    || aliases.iter().any(|a| label_matches(a, token, ignore_case))
            }
        }
    }

    /// Resolves a raw token through the parameter's value type.
    pub fn resolve(&self, token: &str) -> Result<Value> {
        match &self.kind {
            ParameterKind::Value(kind) => kind.resolve(token),
            // Subcommand steps resolve to their canonical label.
            ParameterKind::SubCommand { name, .. } => Ok(Value::Str(name.clone())),
        }
    }

    /// Renders the parameter the way usage strings show it: `<name>` for
    /// required, `[name]` for optional, `-name` for flags, a bare label
    /// for subcommands.
    pub fn format(&self) -> String {
        if let Some(flag) = &self.flag {
            return if flag.switch {
                format!("[-{}]", self.name)
            } else {
                format!("[-{} <value>]", self.name)
            };
        }

        match &self.kind {
            ParameterKind::SubCommand { name, .. } => name.clone(),
            ParameterKind::Value(_) => {
                let dots = if self.greedy { "..." } else { "" };
                if self.optional {
                    format!("[{}{}]", self.name, dots)
                } else {
                    format!("<{}{}>", self.name, dots)
                }
            }
        }
    }
}

impl<S> Clone for Parameter<S> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            kind: self.kind.clone(),
            optional: self.optional,
            greedy: self.greedy,
            flag: self.flag.clone(),
            default: self.default.clone(),
            permission: self.permission.clone(),
            suggestions: self.suggestions.clone(),
            validators: self.validators.clone(),
        }
    }
}

impl<S> Debug for Parameter<S> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Parameter")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("optional", &self.optional)
            .field("greedy", &self.greedy)
            .field("flag", &self.flag)
            .finish_non_exhaustive()
    }
}

/// Compares a literal label against a token, honoring the engine's case
/// configuration.
pub fn label_matches(label: &str, token: &str, ignore_case: bool) -> bool {
    if ignore_case {
        label.eq_ignore_ascii_case(token)
    } else {
        label == token
    }
}

#[cfg(test)]
mod tests {
    use super::Parameter;
    use crate::types;

    #[test]
    fn test_parameter_format() {
        let parameter: Parameter<u64> = Parameter::required("target", types::word());
        assert_eq!(parameter.format(), "<target>");

        let parameter: Parameter<u64> = Parameter::optional("reason", types::word()).greedy();
        assert_eq!(parameter.format(), "[reason...]");

        let parameter: Parameter<u64> = Parameter::switch("silent").alias("s");
        assert_eq!(parameter.format(), "[-silent]");
    }

    #[test]
    fn test_matches_input() {
        let parameter: Parameter<u64> = Parameter::required("age", types::int());
        assert!(parameter.matches_input("17", true));
        assert!(!parameter.matches_input("young", true));

        let parameter: Parameter<u64> = Parameter::sub_command("Member");
        assert!(parameter.matches_input("member", true));
        assert!(!parameter.matches_input("member", false));
    }
}
