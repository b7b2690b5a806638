//! Resolving placeholders in the requested targets
//!
//! Runs the request-scoped contributors to completion. Targets that resolve
//! in any round make up the new request; targets that never resolve are
//! dropped with a warning.

use super::context::{AuthContext, AuthRequest, RequestTarget};
use super::evaluator::{
    CompletionAdapter, Decided, IncrementalEvaluator, Lens, TriState,
};
use super::expression::{Attribute, Expression, StringExpression};
use super::pipeline::{PipelineStep, StepResult};
use crate::error::Result;
use std::borrow::Cow;
use std::collections::BTreeSet;
use tracing::{debug, warn};

/// A request target whose resource and action may hold placeholders
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestTargetToEvaluate {
    resource: StringExpression,
    action: StringExpression,
}

impl RequestTargetToEvaluate {
    pub fn new(resource: StringExpression, action: StringExpression) -> Self {
        RequestTargetToEvaluate { resource, action }
    }

    pub fn resource(&self) -> &StringExpression {
        &self.resource
    }

    pub fn action(&self) -> &StringExpression {
        &self.action
    }

    /// The target with current values
    pub fn to_target(&self) -> RequestTarget {
        RequestTarget::new(self.resource.as_str(), self.action.as_str())
    }
}

impl From<&RequestTarget> for RequestTargetToEvaluate {
    fn from(target: &RequestTarget) -> Self {
        RequestTargetToEvaluate::new(
            StringExpression::new(target.resource.as_str()),
            StringExpression::new(target.action.as_str()),
        )
    }
}

impl Expression for RequestTargetToEvaluate {
    fn enhance(&self, attribute: &Attribute) -> Self {
        RequestTargetToEvaluate {
            resource: self.resource.enhance(attribute),
            action: self.action.enhance(attribute),
        }
    }

    fn value(&self) -> Cow<'_, str> {
        Cow::Owned(format!("{}\t{}", self.resource, self.action))
    }

    fn is_fully_resolved(&self) -> bool {
        self.resource.is_fully_resolved() && self.action.is_fully_resolved()
    }
}

/// Lens over the request targets of a context
pub fn request_targets() -> Lens<BTreeSet<RequestTargetToEvaluate>> {
    Lens::new(
        |ctx| {
            ctx.request()
                .targets()
                .iter()
                .map(RequestTargetToEvaluate::from)
                .collect()
        },
        |ctx, targets: BTreeSet<RequestTargetToEvaluate>| {
            ctx.with_request(targets.iter().map(|t| t.to_target()).collect::<AuthRequest>())
        },
    )
}

struct NeverConcludes;

impl CompletionAdapter<RequestTargetToEvaluate> for NeverConcludes {
    type Output = ();

    fn completion(&self, _item: &RequestTargetToEvaluate) -> Result<TriState> {
        Ok(TriState::Undefined)
    }

    fn map_result(&self, _decided: Decided<RequestTargetToEvaluate>) {}
}

/// Pipeline step resolving the request with request-scoped contributors
///
/// Always continues. Contributor errors propagate.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResolveRequestStep;

impl ResolveRequestStep {
    pub fn new() -> Self {
        ResolveRequestStep
    }
}

impl PipelineStep for ResolveRequestStep {
    fn execute(&self, context: AuthContext) -> Result<StepResult> {
        let evaluator = IncrementalEvaluator::new(
            request_targets(),
            Lens::request_attributes(),
            context.request_contributors().to_vec(),
            NeverConcludes,
        );
        let evaluation = evaluator.evaluate(context)?;

        if !evaluation.unresolved.is_empty() {
            let dropped: Vec<String> = evaluation
                .unresolved
                .iter()
                .map(|t| t.value().into_owned())
                .collect();
            warn!("Dropping unresolved request targets: {:?}", dropped);
        }
        debug!(
            "Resolved request into {} targets",
            evaluation.context.request().len()
        );

        Ok(StepResult::proceed(evaluation.context))
    }
}
