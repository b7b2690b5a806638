//! # Incremental Authz - Lazily Resolved Authorization Decisions
//!
//! `incremental-authz` decides whether principals may perform actions on
//! resources. Statements and request targets may carry `${key}` placeholders
//! whose values come from attribute contributors, and contributors are only
//! consulted until a decision is reached:
//!
//! - **Placeholders** resolved one attribute at a time, fanning out per value
//! - **Segment-aware wildcards**: `*` never crosses a `/`
//! - **Early exit**: the first conclusive batch of statements decides
//! - **Default-deny** when nothing matches
//!
//! ## Quick Start
//!
//! ```rust
//! use incremental_authz::{AuthContext, Authorizer, Effect, RequestTarget, Statement};
//!
//! # fn main() -> incremental_authz::Result<()> {
//! let statements = || -> anyhow::Result<Vec<Statement>> {
//!     Ok(vec![Statement::new("read-public", Effect::Allow)
//!         .with_resources(["public/*"])
//!         .with_actions(["read"])])
//! };
//!
//! let ctx = AuthContext::builder()
//!     .principal("users/alice")
//!     .target(RequestTarget::new("public/readme", "read"))
//!     .statement_source(statements)
//!     .build();
//!
//! let decision = Authorizer::new_default().decide(ctx)?;
//! assert!(decision.is_authorized());
//! # Ok(())
//! # }
//! ```
//!
//! ## Configuration
//!
//! ```rust,no_run
//! use incremental_authz::{Authorizer, EngineConfig};
//!
//! # fn main() -> incremental_authz::Result<()> {
//! let config = EngineConfig::from_file("authz.toml")?;
//! let authorizer = Authorizer::new(config)?;
//! # Ok(())
//! # }
//! ```

pub mod authz;
pub mod config;
pub mod error;
pub mod handler;

pub use crate::authz::{
    AttributeContributor, Attribute, Attributes, AuthContext, AuthContextBuilder, AuthRequest,
    Authorizer, ConflictStrategy, Contribution, Decision, Effect, Expression,
    MatchableExpression, MatcherCache, PolicyDocument, RequestTarget, Statement,
    StatementSource, StaticContributor, StepStatus, StringExpression, WildcardMatcher,
};
pub use crate::config::EngineConfig;
pub use crate::error::{AuthzError, Result};
pub use crate::handler::{Authorization, TargetSpec};
