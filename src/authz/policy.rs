//! Policy statements and where they come from
//!
//! A statement combines resource, principal and action templates with an
//! effect. Templates may hold `${key}` placeholders that are resolved at
//! decision time.

use crate::error::{AuthzError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Effect of a policy statement
///
/// Parsed case-insensitively. Unknown values are kept so a statement carrying
/// one can be skipped at match time instead of failing the whole document.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Effect {
    /// Allow the action
    Allow,
    /// Deny the action
    Deny,
    /// Anything else found in a policy
    Unsupported(String),
}

impl Effect {
    /// The verdict this effect stands for, `None` when unsupported
    pub fn verdict(&self) -> Option<bool> {
        match self {
            Effect::Allow => Some(true),
            Effect::Deny => Some(false),
            Effect::Unsupported(_) => None,
        }
    }
}

impl From<String> for Effect {
    fn from(value: String) -> Self {
        if value.eq_ignore_ascii_case("allow") {
            Effect::Allow
        } else if value.eq_ignore_ascii_case("deny") {
            Effect::Deny
        } else {
            Effect::Unsupported(value)
        }
    }
}

impl From<&str> for Effect {
    fn from(value: &str) -> Self {
        Effect::from(value.to_string())
    }
}

impl From<Effect> for String {
    fn from(effect: Effect) -> Self {
        match effect {
            Effect::Allow => "ALLOW".to_string(),
            Effect::Deny => "DENY".to_string(),
            Effect::Unsupported(value) => value,
        }
    }
}

impl fmt::Display for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Effect::Allow => f.write_str("ALLOW"),
            Effect::Deny => f.write_str("DENY"),
            Effect::Unsupported(value) => f.write_str(value),
        }
    }
}

/// A single policy statement
///
/// Components are lists at this boundary. Duplicates are legal and an empty
/// component matches anything.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Statement {
    /// Statement ID
    pub identifier: String,

    /// Effect of this statement
    pub effect: Effect,

    /// Resources this statement applies to (supports wildcards and placeholders)
    #[serde(default)]
    pub resources: Vec<String>,

    #[serde(default)]
    pub principals: Vec<String>,

    #[serde(default)]
    pub actions: Vec<String>,
}

impl Statement {
    pub fn new(identifier: impl Into<String>, effect: Effect) -> Self {
        Statement {
            identifier: identifier.into(),
            effect,
            resources: Vec::new(),
            principals: Vec::new(),
            actions: Vec::new(),
        }
    }

    pub fn with_resources<I, S>(mut self, resources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.resources = resources.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_principals<I, S>(mut self, principals: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.principals = principals.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_actions<I, S>(mut self, actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.actions = actions.into_iter().map(Into::into).collect();
        self
    }
}

/// A set of statements loaded together
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyDocument {
    /// Policy format version
    pub version: String,

    #[serde(default)]
    pub statements: Vec<Statement>,
}

impl PolicyDocument {
    /// Create a new empty document
    pub fn new() -> Self {
        PolicyDocument {
            version: "2024-01-01".to_string(),
            statements: Vec::new(),
        }
    }

    pub fn add_statement(&mut self, statement: Statement) {
        self.statements.push(statement);
    }

    /// Parse a document from JSON
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Validate document structure
    pub fn validate(&self) -> Result<()> {
        if self.statements.is_empty() {
            return Err(AuthzError::InvalidPolicy(
                "Policy must have at least one statement".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for (i, stmt) in self.statements.iter().enumerate() {
            if stmt.identifier.is_empty() {
                return Err(AuthzError::InvalidPolicy(format!(
                    "Statement {} has no identifier",
                    i
                )));
            }
            if !seen.insert(stmt.identifier.as_str()) {
                return Err(AuthzError::InvalidPolicy(format!(
                    "Duplicate statement identifier: {}",
                    stmt.identifier
                )));
            }
        }

        Ok(())
    }
}

impl Default for PolicyDocument {
    fn default() -> Self {
        Self::new()
    }
}

/// Supplier of candidate statements, consulted once per decision
pub trait StatementSource: Send + Sync {
    fn statements(&self) -> anyhow::Result<Vec<Statement>>;
}

impl StatementSource for PolicyDocument {
    fn statements(&self) -> anyhow::Result<Vec<Statement>> {
        Ok(self.statements.clone())
    }
}

impl<F> StatementSource for F
where
    F: Fn() -> anyhow::Result<Vec<Statement>> + Send + Sync,
{
    fn statements(&self) -> anyhow::Result<Vec<Statement>> {
        self()
    }
}

/// Source with no statements, the default for a fresh context
pub fn no_statements() -> anyhow::Result<Vec<Statement>> {
    Ok(Vec::new())
}
