//! Decision entry point
//!
//! Runs request resolution, then statement matching, and stops at the first
//! step that does not continue.

use super::cache::MatcherCache;
use super::context::{AttributeContributor, AuthContext, AuthRequest};
use super::authorize::MatchStatementsStep;
use super::pipeline::{PipelineStep, StepStatus};
use super::policy::StatementSource;
use super::resolve::ResolveRequestStep;
use crate::config::EngineConfig;
use crate::error::Result;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::debug;

/// Final outcome of a decision
#[derive(Debug, Clone)]
pub struct Decision {
    pub status: StepStatus,
    /// Identifier of the deciding statement, `None` on default-deny
    pub statement_id: Option<String>,
    pub context: AuthContext,
}

impl Decision {
    pub fn is_authorized(&self) -> bool {
        self.status == StepStatus::Authorized
    }
}

/// Authorization engine
///
/// Holds the configuration and a cache of compiled matchers shared by every
/// decision made through it.
///
/// # Examples
///
/// ```
/// use incremental_authz::{Authorizer, Effect, PolicyDocument, Statement};
/// use incremental_authz::{AuthContext, RequestTarget, StaticContributor};
///
/// let mut policy = PolicyDocument::new();
/// policy.add_statement(
///     Statement::new("stmt1", Effect::Allow)
///         .with_resources(["resources/${r1}"])
///         .with_principals(["principals/p1"])
///         .with_actions(["actions/action1"]),
/// );
///
/// let ctx = AuthContext::builder()
///     .principal("principals/p1")
///     .target(RequestTarget::new("resources/resource1", "actions/action1"))
///     .statement_source(policy)
///     .profile_contributor(StaticContributor::from_pairs("id1", [("r1", "resource1")]))
///     .build();
///
/// let authorizer = Authorizer::new_default();
/// let decision = authorizer.decide(ctx).unwrap();
/// assert!(decision.is_authorized());
/// assert_eq!(decision.statement_id.as_deref(), Some("stmt1"));
/// ```
#[derive(Debug)]
pub struct Authorizer {
    config: EngineConfig,
    cache: Arc<MatcherCache>,
}

impl Authorizer {
    /// Create an authorizer from a validated configuration
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let cache = Arc::new(MatcherCache::new(config.matcher_cache_capacity));
        Ok(Authorizer { config, cache })
    }

    pub fn new_default() -> Self {
        let config = EngineConfig::default();
        Authorizer {
            cache: Arc::new(MatcherCache::new(config.matcher_cache_capacity)),
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn steps(&self) -> Vec<Box<dyn PipelineStep>> {
        vec![
            Box::new(ResolveRequestStep::new()),
            Box::new(
                MatchStatementsStep::new(Arc::clone(&self.cache))
                    .separator(self.config.separator)
                    .conflict_strategy(self.config.conflict_strategy),
            ),
        ]
    }

    /// Run the pipeline on a prepared context
    pub fn decide(&self, context: AuthContext) -> Result<Decision> {
        let mut context = context;
        for step in self.steps() {
            let result = step.execute(context)?;
            if result.status.is_final() {
                debug!(
                    "Decision: {}, statement: {:?}",
                    result.status, result.statement_id
                );
                return Ok(Decision {
                    status: result.status,
                    statement_id: result.statement_id,
                    context: result.context,
                });
            }
            context = result.context;
        }

        debug!("Pipeline finished without a decision, denying by default");
        Ok(Decision {
            status: StepStatus::Stop,
            statement_id: None,
            context,
        })
    }

    /// Build a context from parts and decide it
    pub fn authorize(
        &self,
        principals: BTreeSet<String>,
        request: AuthRequest,
        statement_source: Arc<dyn StatementSource>,
        request_contributors: Vec<Arc<dyn AttributeContributor>>,
        profile_contributors: Vec<Arc<dyn AttributeContributor>>,
    ) -> Result<Decision> {
        let context = AuthContext::default()
            .with_principals(principals)
            .with_request(request)
            .with_statement_source(statement_source)
            .with_request_contributors(request_contributors)
            .with_profile_contributors(profile_contributors);
        self.decide(context)
    }

    /// Drop every compiled matcher
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    pub fn cache_size(&self) -> usize {
        self.cache.len()
    }
}

impl Default for Authorizer {
    fn default() -> Self {
        Self::new_default()
    }
}
