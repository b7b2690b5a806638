//! Matching policy statements against the resolved request
//!
//! Statements are resolved with profile-scoped contributors. A statement
//! concludes once one of its principals matches a caller principal and both a
//! resource and an action match the request. Its effect then decides.

use super::cache::MatcherCache;
use super::context::AuthContext;
use super::evaluator::{
    CompletionAdapter, ConflictStrategy, Decided, IncrementalEvaluator, Lens, TriState,
};
use super::expression::{Attribute, Expression};
use super::matchable::MatchableExpression;
use super::pattern::DEFAULT_SEPARATOR;
use super::pipeline::{PipelineStep, StepResult, StepStatus};
use super::policy::Statement;
use crate::error::{AuthzError, Result};
use std::borrow::Cow;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A statement lifted into matchable components
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StatementToEvaluate {
    resources: BTreeSet<MatchableExpression>,
    principals: BTreeSet<MatchableExpression>,
    actions: BTreeSet<MatchableExpression>,
    statement: Arc<Statement>,
}

impl StatementToEvaluate {
    /// Lift a statement, dropping duplicate entries
    pub fn from_statement(statement: Arc<Statement>, separator: char) -> Self {
        let lift = |values: &[String]| -> BTreeSet<MatchableExpression> {
            values
                .iter()
                .map(|v| MatchableExpression::with_separator(v.as_str(), separator))
                .collect()
        };
        StatementToEvaluate {
            resources: lift(&statement.resources),
            principals: lift(&statement.principals),
            actions: lift(&statement.actions),
            statement,
        }
    }

    pub fn resources(&self) -> &BTreeSet<MatchableExpression> {
        &self.resources
    }

    pub fn principals(&self) -> &BTreeSet<MatchableExpression> {
        &self.principals
    }

    pub fn actions(&self) -> &BTreeSet<MatchableExpression> {
        &self.actions
    }

    pub fn statement(&self) -> &Statement {
        &self.statement
    }

    fn components(&self) -> impl Iterator<Item = &MatchableExpression> {
        self.resources
            .iter()
            .chain(self.principals.iter())
            .chain(self.actions.iter())
    }
}

impl From<Statement> for StatementToEvaluate {
    fn from(statement: Statement) -> Self {
        Self::from_statement(Arc::new(statement), DEFAULT_SEPARATOR)
    }
}

fn enhance_set(
    set: &BTreeSet<MatchableExpression>,
    attribute: &Attribute,
) -> BTreeSet<MatchableExpression> {
    set.iter().map(|e| e.enhance(attribute)).collect()
}

fn join(set: &BTreeSet<MatchableExpression>) -> String {
    set.iter()
        .map(|e| e.as_str())
        .collect::<Vec<_>>()
        .join(",")
}

impl Expression for StatementToEvaluate {
    fn enhance(&self, attribute: &Attribute) -> Self {
        StatementToEvaluate {
            resources: enhance_set(&self.resources, attribute),
            principals: enhance_set(&self.principals, attribute),
            actions: enhance_set(&self.actions, attribute),
            statement: Arc::clone(&self.statement),
        }
    }

    fn value(&self) -> Cow<'_, str> {
        Cow::Owned(format!(
            "{};{};{}",
            join(&self.resources),
            join(&self.principals),
            join(&self.actions)
        ))
    }

    fn is_fully_resolved(&self) -> bool {
        self.components().all(|e| e.is_fully_resolved())
    }
}

/// Lens over the statements being resolved
pub fn statements() -> Lens<BTreeSet<StatementToEvaluate>> {
    Lens::new(
        |ctx| ctx.statements().clone(),
        AuthContext::with_statements,
    )
}

/// Verdict of the deciding statement
#[derive(Debug, Clone, PartialEq, Eq)]
struct Verdict {
    statement_id: String,
    allowed: bool,
}

/// Completion adapter comparing statements with the caller and request
struct StatementMatcher {
    principals: Vec<String>,
    resources: Vec<String>,
    actions: Vec<String>,
    cache: Arc<MatcherCache>,
    strategy: ConflictStrategy,
}

impl StatementMatcher {
    fn new(context: &AuthContext, cache: Arc<MatcherCache>, strategy: ConflictStrategy) -> Self {
        let request = context.request();
        StatementMatcher {
            principals: context.principals().iter().cloned().collect(),
            resources: request.resources().into_iter().map(String::from).collect(),
            actions: request.actions().into_iter().map(String::from).collect(),
            cache,
            strategy,
        }
    }

    /// Whether any resolved pattern matches any target. An empty component
    /// matches every target.
    fn component_matches(
        &self,
        patterns: &BTreeSet<MatchableExpression>,
        targets: &[String],
    ) -> Result<bool> {
        if patterns.is_empty() {
            return Ok(!targets.is_empty());
        }
        for pattern in patterns.iter().filter(|p| p.is_fully_resolved()) {
            let matcher = pattern.matcher_in(&self.cache)?;
            for target in targets {
                if matcher.matches(target)? {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }
}

impl CompletionAdapter<StatementToEvaluate> for StatementMatcher {
    type Output = Verdict;

    fn supports_partial_completion(&self) -> bool {
        true
    }

    fn conflict_strategy(&self) -> ConflictStrategy {
        self.strategy
    }

    fn completion(&self, item: &StatementToEvaluate) -> Result<TriState> {
        let statement = item.statement();

        let principal_matched = self.component_matches(item.principals(), &self.principals)?;
        debug!(
            "Principal matched: {}, request: {:?}, statement: {}",
            principal_matched, self.principals, statement.identifier
        );
        if !principal_matched {
            return Ok(TriState::Undefined);
        }

        let resource_matched = self.component_matches(item.resources(), &self.resources)?;
        let action_matched = self.component_matches(item.actions(), &self.actions)?;
        debug!(
            "Resource matched: {}, action matched: {}, statement: {}",
            resource_matched, action_matched, statement.identifier
        );
        if !(resource_matched && action_matched) {
            return Ok(TriState::Undefined);
        }

        let verdict = statement.effect.verdict();
        match verdict {
            Some(true) => info!("Access granted by statement: {}", statement.identifier),
            Some(false) => info!("Access denied by statement: {}", statement.identifier),
            None => warn!(
                "Unknown effect '{}' in statement: {}",
                statement.effect, statement.identifier
            ),
        }
        Ok(TriState::from(verdict))
    }

    fn map_result(&self, decided: Decided<StatementToEvaluate>) -> Verdict {
        Verdict {
            allowed: decided.is_success(),
            statement_id: decided.item().statement().identifier.clone(),
        }
    }
}

/// Pipeline step matching statements with profile-scoped contributors
#[derive(Debug, Clone)]
pub struct MatchStatementsStep {
    cache: Arc<MatcherCache>,
    separator: char,
    strategy: ConflictStrategy,
}

impl MatchStatementsStep {
    pub fn new(cache: Arc<MatcherCache>) -> Self {
        MatchStatementsStep {
            cache,
            separator: DEFAULT_SEPARATOR,
            strategy: ConflictStrategy::DenyOverrides,
        }
    }

    pub fn separator(mut self, separator: char) -> Self {
        self.separator = separator;
        self
    }

    pub fn conflict_strategy(mut self, strategy: ConflictStrategy) -> Self {
        self.strategy = strategy;
        self
    }
}

impl Default for MatchStatementsStep {
    fn default() -> Self {
        Self::new(Arc::new(MatcherCache::default()))
    }
}

impl PipelineStep for MatchStatementsStep {
    fn execute(&self, context: AuthContext) -> Result<StepResult> {
        let lifted: BTreeSet<StatementToEvaluate> = context
            .statement_source()
            .statements()
            .map_err(AuthzError::StatementSource)?
            .into_iter()
            .map(|s| StatementToEvaluate::from_statement(Arc::new(s), self.separator))
            .collect();
        debug!("Matching {} statements", lifted.len());
        let context = context.with_statements(lifted);

        let adapter = StatementMatcher::new(&context, Arc::clone(&self.cache), self.strategy);
        let evaluator = IncrementalEvaluator::new(
            statements(),
            Lens::profile_attributes(),
            context.profile_contributors().to_vec(),
            adapter,
        );
        debug!(
            "Matching with conflict strategy {}",
            evaluator.adapter().conflict_strategy()
        );
        let evaluation = evaluator.evaluate(context)?;

        let (status, statement_id) = match evaluation.result {
            Some(verdict) => (
                StepStatus::from_outcome(Some(verdict.allowed)),
                Some(verdict.statement_id),
            ),
            None => {
                debug!("No statement matched, denying by default");
                (StepStatus::from_outcome(None), None)
            }
        };

        Ok(StepResult {
            status,
            context: evaluation.context,
            statement_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authz::policy::Effect;

    fn lifted(resources: &[&str], principals: &[&str], actions: &[&str]) -> StatementToEvaluate {
        Statement::new("stmt", Effect::Allow)
            .with_resources(resources.iter().copied())
            .with_principals(principals.iter().copied())
            .with_actions(actions.iter().copied())
            .into()
    }

    #[test]
    fn test_fully_resolved() {
        let stmt = lifted(&["resources/foo"], &["principals/bar"], &["actions/baz"]);
        assert!(stmt.is_fully_resolved());
    }

    #[test]
    fn test_mixed_is_not_fully_resolved() {
        let stmts = [
            lifted(&["resources/foo", "dynamic/${name}"], &["principals/bar"], &["actions/baz"]),
            lifted(&["resources/foo"], &["dynamic/${name}", "principals/bar"], &["actions/baz"]),
            lifted(&["resources/foo"], &["dynamic/${name}"], &["actions/baz", "principals/bar"]),
        ];
        for stmt in &stmts {
            assert!(!stmt.is_fully_resolved());
        }
    }

    #[test]
    fn test_enhance_all_components() {
        let stmt = lifted(&["resources/${id}"], &["users/${id}"], &["actions/read"]);
        let resolved = stmt.enhance(&Attribute::new("id", "7"));

        assert!(resolved.is_fully_resolved());
        assert_eq!(resolved.value(), "resources/7;users/7;actions/read");
        assert_eq!(resolved.statement(), stmt.statement());
    }

    #[test]
    fn test_duplicates_are_collapsed() {
        let stmt = lifted(&["a", "a", "b"], &[], &[]);
        assert_eq!(stmt.resources().len(), 2);
        assert_eq!(stmt.statement().resources.len(), 3);
    }

    #[test]
    fn test_empty_component_is_wildcard() {
        let matcher = StatementMatcher {
            principals: vec!["users/1".to_string()],
            resources: vec!["resources/1".to_string()],
            actions: Vec::new(),
            cache: Arc::new(MatcherCache::new(8)),
            strategy: ConflictStrategy::FirstConclusive,
        };
        let stmt = lifted(&[], &["users/*"], &[]);

        assert!(matcher.component_matches(stmt.resources(), &matcher.resources).unwrap());
        assert!(!matcher.component_matches(stmt.actions(), &matcher.actions).unwrap());
        assert_eq!(matcher.completion(&stmt).unwrap(), TriState::Undefined);
    }

    #[test]
    fn test_effect_decides_completion() {
        let matcher = StatementMatcher {
            principals: vec!["users/1".to_string()],
            resources: vec!["docs/a".to_string()],
            actions: vec!["read".to_string()],
            cache: Arc::new(MatcherCache::new(8)),
            strategy: ConflictStrategy::FirstConclusive,
        };
        let with_effect = |effect: Effect| -> StatementToEvaluate {
            Statement::new("stmt", effect)
                .with_resources(["docs/*"])
                .with_actions(["read"])
                .into()
        };

        assert_eq!(matcher.completion(&with_effect(Effect::Allow)).unwrap(), TriState::True);
        assert_eq!(matcher.completion(&with_effect(Effect::Deny)).unwrap(), TriState::False);
        assert_eq!(
            matcher.completion(&with_effect(Effect::from("audit"))).unwrap(),
            TriState::Undefined
        );
    }

    #[test]
    fn test_unresolved_patterns_are_skipped() {
        let matcher = StatementMatcher {
            principals: vec!["users/${id}".to_string()],
            resources: Vec::new(),
            actions: Vec::new(),
            cache: Arc::new(MatcherCache::new(8)),
            strategy: ConflictStrategy::FirstConclusive,
        };
        let stmt = lifted(&[], &["users/${id}"], &[]);

        assert!(!matcher.component_matches(stmt.principals(), &matcher.principals).unwrap());
        assert!(matcher.cache.is_empty());
    }
}
