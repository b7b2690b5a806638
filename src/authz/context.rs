//! The authorization context threaded through the pipeline
//!
//! Contexts are values. Every `with_*` method consumes the context and returns
//! the next one; nothing is changed through a shared reference.

use super::authorize::StatementToEvaluate;
use super::expression::{Attribute, Attributes};
use super::policy::{no_statements, StatementSource};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

/// A requested (resource, action) pair
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestTarget {
    pub resource: String,
    pub action: String,
}

impl RequestTarget {
    pub fn new(resource: impl Into<String>, action: impl Into<String>) -> Self {
        RequestTarget {
            resource: resource.into(),
            action: action.into(),
        }
    }
}

/// The set of targets a caller asks for
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthRequest {
    targets: BTreeSet<RequestTarget>,
}

impl AuthRequest {
    pub fn new(targets: impl IntoIterator<Item = RequestTarget>) -> Self {
        AuthRequest {
            targets: targets.into_iter().collect(),
        }
    }

    /// Request for a single pair
    pub fn single(resource: impl Into<String>, action: impl Into<String>) -> Self {
        Self::new([RequestTarget::new(resource, action)])
    }

    pub fn targets(&self) -> &BTreeSet<RequestTarget> {
        &self.targets
    }

    /// Distinct requested resources
    pub fn resources(&self) -> BTreeSet<&str> {
        self.targets.iter().map(|t| t.resource.as_str()).collect()
    }

    /// Distinct requested actions
    pub fn actions(&self) -> BTreeSet<&str> {
        self.targets.iter().map(|t| t.action.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

impl FromIterator<RequestTarget> for AuthRequest {
    fn from_iter<I: IntoIterator<Item = RequestTarget>>(iter: I) -> Self {
        Self::new(iter)
    }
}

/// Attributes returned by one contributor call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contribution {
    pub contributor_id: String,
    pub attributes: Attributes,
}

impl Contribution {
    pub fn new(contributor_id: impl Into<String>, attributes: Attributes) -> Self {
        Contribution {
            contributor_id: contributor_id.into(),
            attributes,
        }
    }
}

/// External supplier of attributes
///
/// Called at most once per pipeline step, in list order. Any retrying is up to
/// the implementation; an error aborts the decision.
pub trait AttributeContributor: Send + Sync {
    fn contribute(&self, context: &AuthContext) -> anyhow::Result<Contribution>;
}

impl<F> AttributeContributor for F
where
    F: Fn(&AuthContext) -> anyhow::Result<Contribution> + Send + Sync,
{
    fn contribute(&self, context: &AuthContext) -> anyhow::Result<Contribution> {
        self(context)
    }
}

/// Contributor returning a fixed attribute set
#[derive(Debug, Clone)]
pub struct StaticContributor {
    id: String,
    attributes: Attributes,
}

impl StaticContributor {
    pub fn new(id: impl Into<String>, attributes: Attributes) -> Self {
        StaticContributor {
            id: id.into(),
            attributes,
        }
    }

    pub fn from_pairs<I, K, V>(id: impl Into<String>, pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self::new(id, Attributes::from_pairs(pairs))
    }
}

impl AttributeContributor for StaticContributor {
    fn contribute(&self, _context: &AuthContext) -> anyhow::Result<Contribution> {
        Ok(Contribution::new(self.id.clone(), self.attributes.clone()))
    }
}

/// Everything a decision needs
#[derive(Clone)]
pub struct AuthContext {
    principals: BTreeSet<String>,
    statement_source: Arc<dyn StatementSource>,
    statements: BTreeSet<StatementToEvaluate>,
    request: AuthRequest,
    request_attributes: Attributes,
    request_contributors: Vec<Arc<dyn AttributeContributor>>,
    profile_attributes: Attributes,
    profile_contributors: Vec<Arc<dyn AttributeContributor>>,
}

impl AuthContext {
    pub fn builder() -> AuthContextBuilder {
        AuthContextBuilder::new()
    }

    pub fn principals(&self) -> &BTreeSet<String> {
        &self.principals
    }

    pub fn statement_source(&self) -> &Arc<dyn StatementSource> {
        &self.statement_source
    }

    /// Statements currently being resolved
    pub fn statements(&self) -> &BTreeSet<StatementToEvaluate> {
        &self.statements
    }

    pub fn request(&self) -> &AuthRequest {
        &self.request
    }

    pub fn request_attributes(&self) -> &Attributes {
        &self.request_attributes
    }

    pub fn request_contributors(&self) -> &[Arc<dyn AttributeContributor>] {
        &self.request_contributors
    }

    pub fn profile_attributes(&self) -> &Attributes {
        &self.profile_attributes
    }

    pub fn profile_contributors(&self) -> &[Arc<dyn AttributeContributor>] {
        &self.profile_contributors
    }

    pub fn with_principals(mut self, principals: BTreeSet<String>) -> Self {
        self.principals = principals;
        self
    }

    pub fn with_statement_source(mut self, source: Arc<dyn StatementSource>) -> Self {
        self.statement_source = source;
        self
    }

    pub fn with_statements(mut self, statements: BTreeSet<StatementToEvaluate>) -> Self {
        self.statements = statements;
        self
    }

    pub fn with_request(mut self, request: AuthRequest) -> Self {
        self.request = request;
        self
    }

    pub fn with_request_attributes(mut self, attributes: Attributes) -> Self {
        self.request_attributes = attributes;
        self
    }

    pub fn with_request_contributors(
        mut self,
        contributors: Vec<Arc<dyn AttributeContributor>>,
    ) -> Self {
        self.request_contributors = contributors;
        self
    }

    pub fn with_profile_attributes(mut self, attributes: Attributes) -> Self {
        self.profile_attributes = attributes;
        self
    }

    pub fn with_profile_contributors(
        mut self,
        contributors: Vec<Arc<dyn AttributeContributor>>,
    ) -> Self {
        self.profile_contributors = contributors;
        self
    }
}

impl Default for AuthContext {
    fn default() -> Self {
        AuthContextBuilder::new().build()
    }
}

impl fmt::Debug for AuthContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthContext")
            .field("principals", &self.principals)
            .field("statements", &self.statements.len())
            .field("request", &self.request)
            .field("request_attributes", &self.request_attributes)
            .field("request_contributors", &self.request_contributors.len())
            .field("profile_attributes", &self.profile_attributes)
            .field("profile_contributors", &self.profile_contributors.len())
            .finish()
    }
}

/// Builder for an [`AuthContext`]
///
/// # Examples
///
/// ```
/// use incremental_authz::{AuthContext, RequestTarget, StaticContributor};
///
/// let ctx = AuthContext::builder()
///     .principal("principals/p1")
///     .target(RequestTarget::new("resources/${id}", "actions/read"))
///     .request_contributor(StaticContributor::from_pairs("ids", [("id", "42")]))
///     .build();
///
/// assert_eq!(ctx.principals().len(), 1);
/// assert_eq!(ctx.request_contributors().len(), 1);
/// ```
pub struct AuthContextBuilder {
    context: AuthContext,
}

impl AuthContextBuilder {
    pub fn new() -> Self {
        AuthContextBuilder {
            context: AuthContext {
                principals: BTreeSet::new(),
                statement_source: Arc::new(no_statements),
                statements: BTreeSet::new(),
                request: AuthRequest::default(),
                request_attributes: Attributes::new(),
                request_contributors: Vec::new(),
                profile_attributes: Attributes::new(),
                profile_contributors: Vec::new(),
            },
        }
    }

    pub fn principal(mut self, principal: impl Into<String>) -> Self {
        self.context.principals.insert(principal.into());
        self
    }

    pub fn principals<I, S>(mut self, principals: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.context
            .principals
            .extend(principals.into_iter().map(Into::into));
        self
    }

    pub fn statement_source(mut self, source: impl StatementSource + 'static) -> Self {
        self.context.statement_source = Arc::new(source);
        self
    }

    pub fn target(mut self, target: RequestTarget) -> Self {
        self.context.request.targets.insert(target);
        self
    }

    pub fn request(mut self, request: AuthRequest) -> Self {
        self.context.request = request;
        self
    }

    pub fn request_attribute(mut self, attribute: impl Into<Attribute>) -> Self {
        self.context.request_attributes.insert(attribute.into());
        self
    }

    pub fn request_contributor(mut self, contributor: impl AttributeContributor + 'static) -> Self {
        self.context.request_contributors.push(Arc::new(contributor));
        self
    }

    pub fn profile_attribute(mut self, attribute: impl Into<Attribute>) -> Self {
        self.context.profile_attributes.insert(attribute.into());
        self
    }

    pub fn profile_contributor(mut self, contributor: impl AttributeContributor + 'static) -> Self {
        self.context.profile_contributors.push(Arc::new(contributor));
        self
    }

    pub fn build(self) -> AuthContext {
        self.context
    }
}

impl Default for AuthContextBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl From<AuthContext> for AuthContextBuilder {
    fn from(context: AuthContext) -> Self {
        AuthContextBuilder { context }
    }
}
