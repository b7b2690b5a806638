//! Per-handler authorization metadata
//!
//! A host framework attaches an [`Authorization`] to each handler and turns it
//! into the request the engine decides on. Interception itself lives in the
//! host.

use crate::authz::{AuthRequest, RequestTarget};
use serde::{Deserialize, Serialize};

/// One group of resource and action patterns
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetSpec {
    pub resources: Vec<String>,
    pub actions: Vec<String>,
}

impl TargetSpec {
    pub fn new<R, A, S, T>(resources: R, actions: A) -> Self
    where
        R: IntoIterator<Item = S>,
        A: IntoIterator<Item = T>,
        S: Into<String>,
        T: Into<String>,
    {
        TargetSpec {
            resources: resources.into_iter().map(Into::into).collect(),
            actions: actions.into_iter().map(Into::into).collect(),
        }
    }

    /// Every (resource, action) pair of this group
    pub fn targets(&self) -> impl Iterator<Item = RequestTarget> + '_ {
        self.resources.iter().flat_map(move |resource| {
            self.actions
                .iter()
                .map(move |action| RequestTarget::new(resource.as_str(), action.as_str()))
        })
    }
}

/// Authorization requirements declared on a handler
///
/// # Examples
///
/// ```
/// use incremental_authz::{Authorization, TargetSpec};
///
/// let auth = Authorization::new([TargetSpec::new(
///     ["documents/${documentId}"],
///     ["documents:read", "documents:list"],
/// )]);
///
/// assert_eq!(auth.to_request().len(), 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Authorization {
    pub targets: Vec<TargetSpec>,
}

impl Authorization {
    pub fn new(targets: impl IntoIterator<Item = TargetSpec>) -> Self {
        Authorization {
            targets: targets.into_iter().collect(),
        }
    }

    /// The request described by this metadata, duplicates removed
    pub fn to_request(&self) -> AuthRequest {
        self.targets.iter().flat_map(TargetSpec::targets).collect()
    }
}
