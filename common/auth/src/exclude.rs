use std::collections::HashSet;

use serde::Deserialize;
use thiserror::Error;

/// Sentinel accepted in the `methods` position of a scoped rule.
const ALL_METHODS: &str = "ALL";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExclusionError {
    #[error("path must not be empty")]
    EmptyPath,
    #[error("path '{0}' must start with '/'")]
    MissingLeadingSlash(String),
    #[error("methods sentinel must be '{ALL_METHODS}', got '{0}'")]
    InvalidSentinel(String),
    #[error("methods array must not be empty")]
    EmptyMethods,
    #[error("method token must not be empty")]
    EmptyMethodToken,
}

/// Raw exclusion entry as it appears in configuration input: either a bare
/// path prefix or a `{path, methods}` table with exactly those two keys.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawExclusion {
    Path(String),
    Scoped(ScopedRule),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScopedRule {
    pub path: String,
    pub methods: RawMethods,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawMethods {
    Sentinel(String),
    List(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MethodSet {
    All,
    Only(HashSet<String>),
}

impl MethodSet {
    fn contains(&self, method: &str) -> bool {
        match self {
            MethodSet::All => true,
            MethodSet::Only(set) => set.contains(method),
        }
    }
}

/// A validated exclusion rule. Resolved once at configuration time so the
/// per-request path never re-inspects the raw shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExclusionRule {
    PathOnly(String),
    PathAndMethods { prefix: String, methods: MethodSet },
}

impl ExclusionRule {
    fn matches(&self, path: &str, method: &str) -> bool {
        match self {
            ExclusionRule::PathOnly(prefix) => path.starts_with(prefix.as_str()),
            ExclusionRule::PathAndMethods { prefix, methods } => {
                path.starts_with(prefix.as_str()) && methods.contains(method)
            }
        }
    }
}

impl RawExclusion {
    pub fn resolve(self) -> Result<ExclusionRule, ExclusionError> {
        match self {
            RawExclusion::Path(prefix) => {
                validate_prefix(&prefix)?;
                Ok(ExclusionRule::PathOnly(prefix))
            }
            RawExclusion::Scoped(rule) => {
                validate_prefix(&rule.path)?;
                let methods = rule.methods.resolve()?;
                Ok(ExclusionRule::PathAndMethods {
                    prefix: rule.path,
                    methods,
                })
            }
        }
    }
}

impl RawMethods {
    fn resolve(self) -> Result<MethodSet, ExclusionError> {
        match self {
            RawMethods::Sentinel(word) => {
                if word == ALL_METHODS {
                    Ok(MethodSet::All)
                } else {
                    Err(ExclusionError::InvalidSentinel(word))
                }
            }
            RawMethods::List(tokens) => {
                if tokens.is_empty() {
                    return Err(ExclusionError::EmptyMethods);
                }
                let mut set = HashSet::with_capacity(tokens.len());
                for token in tokens {
                    let token = token.trim();
                    if token.is_empty() {
                        return Err(ExclusionError::EmptyMethodToken);
                    }
                    set.insert(token.to_ascii_uppercase());
                }
                Ok(MethodSet::Only(set))
            }
        }
    }
}

fn validate_prefix(prefix: &str) -> Result<(), ExclusionError> {
    if prefix.is_empty() {
        return Err(ExclusionError::EmptyPath);
    }
    if !prefix.starts_with('/') {
        return Err(ExclusionError::MissingLeadingSlash(prefix.to_string()));
    }
    Ok(())
}

/// The ordered set of validated exclusion rules.
#[derive(Debug, Clone, Default)]
pub struct ExclusionList {
    rules: Vec<ExclusionRule>,
}

impl ExclusionList {
    pub fn new(rules: Vec<ExclusionRule>) -> Self {
        Self { rules }
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// True if any rule matches the pair. Prefix match, not exact:
    /// exempting `/docs` also exempts `/docs/anything`. Methods compare
    /// case-insensitively.
    pub fn is_exempt(&self, path: &str, method: &str) -> bool {
        let method = method.to_ascii_uppercase();
        self.rules.iter().any(|rule| rule.matches(path, &method))
    }
}
