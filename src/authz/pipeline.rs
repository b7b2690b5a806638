//! Pipeline steps and their results

use super::context::AuthContext;
use crate::error::Result;
use std::fmt;

/// What the pipeline should do after a step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StepStatus {
    /// Access granted, stop here
    Authorized,
    /// Nothing decided yet, run the next step
    Continue,
    /// Access denied, stop here
    Stop,
}

impl StepStatus {
    /// Map a verdict to a status. No verdict means default-deny.
    pub fn from_outcome(outcome: Option<bool>) -> Self {
        match outcome {
            Some(true) => StepStatus::Authorized,
            Some(false) | None => StepStatus::Stop,
        }
    }

    pub fn is_final(self) -> bool {
        self != StepStatus::Continue
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepStatus::Authorized => f.write_str("AUTHORIZED"),
            StepStatus::Continue => f.write_str("CONTINUE"),
            StepStatus::Stop => f.write_str("STOP"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StepResult {
    pub status: StepStatus,
    pub context: AuthContext,
    /// Identifier of the statement that decided, if any
    pub statement_id: Option<String>,
}

impl StepResult {
    pub fn proceed(context: AuthContext) -> Self {
        StepResult {
            status: StepStatus::Continue,
            context,
            statement_id: None,
        }
    }
}

/// One stage of a decision
pub trait PipelineStep {
    fn execute(&self, context: AuthContext) -> Result<StepResult>;
}
