//! Error types for authorization decisions

use thiserror::Error;

/// Authorization engine errors
#[derive(Error, Debug)]
pub enum AuthzError {
    /// An expression with unresolved placeholders was treated as final
    #[error("Expression is not fully resolved: {0}")]
    NotFullyResolved(String),

    /// Wildcard pattern could not be compiled
    #[error("Invalid wildcard pattern: {0}")]
    Pattern(#[from] regex::Error),

    /// An attribute contributor failed; `contributor` is its list position
    #[error("Attribute contributor #{contributor} failed: {source}")]
    Contributor {
        contributor: usize,
        #[source]
        source: anyhow::Error,
    },

    /// The statement supplier failed
    #[error("Statement source failed: {0}")]
    StatementSource(#[source] anyhow::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid policy: {0}")]
    InvalidPolicy(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, AuthzError>;
