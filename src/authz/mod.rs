//! Incremental authorization
//!
//! Provides lazily resolved access control with:
//! - `${key}` placeholders in statements and request targets
//! - Segment-aware wildcard matching for resources, principals and actions
//! - Attribute contributors consulted in order, only as long as needed
//! - Allow/Deny statements with a configurable conflict strategy
//! - LRU caching of compiled matchers

mod authorize;
mod cache;
mod context;
mod engine;
mod evaluator;
mod expression;
mod matchable;
mod pattern;
mod pipeline;
mod policy;
mod resolve;

pub use authorize::{MatchStatementsStep, StatementToEvaluate};
pub use cache::{MatcherCache, DEFAULT_CAPACITY};
pub use context::{
    AttributeContributor, AuthContext, AuthContextBuilder, AuthRequest, Contribution,
    RequestTarget, StaticContributor,
};
pub use engine::{Authorizer, Decision};
pub use evaluator::{
    CompletionAdapter, ConflictStrategy, Decided, Evaluation, IncrementalEvaluator, Lens,
    TriState,
};
pub use expression::{has_placeholder, substitute, Attribute, Attributes, Expression, StringExpression};
pub use matchable::MatchableExpression;
pub use pattern::{WildcardMatcher, DEFAULT_SEPARATOR};
pub use pipeline::{PipelineStep, StepResult, StepStatus};
pub use policy::{no_statements, Effect, PolicyDocument, Statement, StatementSource};
pub use resolve::{request_targets, RequestTargetToEvaluate, ResolveRequestStep};
